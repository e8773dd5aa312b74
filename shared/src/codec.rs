//! Word tokenizer for command lines typed by humans or read from logs
//!
//! Splits on whitespace, keeps `"quoted runs"` together and understands the
//! escapes `\\`, `\"`, `\n`, `\r` and `\t`. Tokenizing never fails: an
//! unterminated quote simply runs to the end of the input.

/// Splits a raw line into words
pub fn tokenize(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some('n') => current.push('\n'),
                    Some('r') => current.push('\r'),
                    Some('t') => current.push('\t'),
                    Some(other) => current.push(other),
                    // Trailing backslash is kept as-is
                    None => current.push('\\'),
                }
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }

    words
}

/// Joins words back into a single line that `tokenize` splits identically
pub fn join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|word| quote(word.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn needs_quoting(word: &str) -> bool {
    word.is_empty() || word.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\')
}

fn quote(word: &str) -> String {
    if !needs_quoting(word) {
        return word.to_string();
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('"');
    for c in word.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_plain_words() {
        assert_eq!(tokenize("admin.listPlayers  all"), vec!["admin.listPlayers", "all"]);
    }

    #[test]
    fn test_tokenize_quoted_word() {
        assert_eq!(
            tokenize(r#"admin.say "hello there" all"#),
            vec!["admin.say", "hello there", "all"]
        );
    }

    #[test]
    fn test_tokenize_escapes() {
        assert_eq!(
            tokenize(r#""say \"hi\"" a\\b "tab\there" line\nbreak"#),
            vec!["say \"hi\"", "a\\b", "tab\there", "line\nbreak"]
        );
    }

    #[test]
    fn test_tokenize_unterminated_quote_runs_to_end() {
        assert_eq!(tokenize(r#"admin.say "never closed"#), vec!["admin.say", "never closed"]);
    }

    #[test]
    fn test_tokenize_empty_quotes_make_empty_word() {
        assert_eq!(tokenize(r#"a "" b"#), vec!["a", "", "b"]);
    }

    #[test]
    fn test_tokenize_blank_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t ").is_empty());
    }

    #[test]
    fn test_join_quotes_only_when_needed() {
        assert_eq!(join(&["admin.kickPlayer", "Phogue"]), "admin.kickPlayer Phogue");
        assert_eq!(join(&["admin.say", "hi all"]), r#"admin.say "hi all""#);
        assert_eq!(join(&["a\"b"]), r#""a\"b""#);
        assert_eq!(join(&[""]), r#""""#);
    }

    #[test]
    fn test_join_then_tokenize_is_identity() {
        let words = vec![
            "admin.say".to_string(),
            "quote \" and back\\slash".to_string(),
            "multi\nline\ttext".to_string(),
            String::new(),
            "plain".to_string(),
        ];
        assert_eq!(tokenize(&join(&words)), words);
    }
}
