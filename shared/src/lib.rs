//! # Shared protocol model
//!
//! Types and codecs used by both ends of a Frostbite-style RCON connection:
//!
//! - [`packet`]: the packet model (origin, kind, sequence number, words)
//! - [`codec`]: quote-aware tokenizing of command lines into words and back
//! - [`lists`], [`maps`], [`groupings`], [`bans`]: typed records decoded from
//!   the structured sub-payloads servers answer with
//! - [`framing`]: length-prefixed frames carrying packets over a byte stream
//!
//! Every decoder here is total. Malformed payloads produce empty or partial
//! results instead of errors, so a single bad packet can never take down the
//! receive loop that called it.

pub mod bans;
pub mod codec;
pub mod framing;
pub mod groupings;
pub mod lists;
pub mod maps;
pub mod packet;

pub use bans::{decode_bans, encode_bans, Ban, BanDuration, BanLayout};
pub use codec::{join, tokenize};
pub use framing::{read_packet, write_packet, FrameError, MAX_FRAME_SIZE};
pub use groupings::{decode_groupings, encode_subsets, Grouping, GroupingKind};
pub use lists::{decode_list, decode_players, encode_list, ListRecord, Player};
pub use maps::{decode_maps, encode_maps, MapEntry, DEFAULT_ROUNDS};
pub use packet::{Origin, Packet, PacketKind, OK};
