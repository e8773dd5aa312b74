//! Tracking of multi-packet actions to completion or expiry
//!
//! A deferred action moves through
//!
//! ```text
//! Created -> Sent -> Completing* -> Done | Expired
//! ```
//!
//! and reports each step through its callbacks. `always` runs exactly once
//! after `done` or `expired`, on every path, including connection teardown.
//! Each action owns the sequence numbers of its own requests, so expiring one
//! action never touches another's state.

use log::{debug, warn};
use rcon_shared::Packet;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::action::NetworkAction;

pub type ActionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Created,
    Sent,
    Completing,
    Done,
    Expired,
}

impl ActionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Expired)
    }
}

type SentCallback = Box<dyn FnOnce(&NetworkAction, &[Packet]) + Send>;
type EachCallback = Box<dyn FnMut(&NetworkAction, &Packet, &Packet) + Send>;
type OutcomeCallback = Box<dyn FnOnce(&NetworkAction, &[Packet], &[Packet]) + Send>;
type AlwaysCallback = Box<dyn FnOnce(&NetworkAction) + Send>;

/// A logical action plus the callbacks observing its progress
pub struct DeferredAction {
    action: NetworkAction,
    pub(crate) packets: Vec<Packet>,
    requests: Vec<Packet>,
    responses: Vec<Packet>,
    state: ActionState,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    on_sent: Option<SentCallback>,
    on_each: Option<EachCallback>,
    on_done: Option<OutcomeCallback>,
    on_expired: Option<OutcomeCallback>,
    on_always: Option<AlwaysCallback>,
}

impl fmt::Debug for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("action", &self.action)
            .field("state", &self.state)
            .field("requests", &self.requests.len())
            .field("responses", &self.responses.len())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl DeferredAction {
    pub fn new(action: NetworkAction) -> Self {
        Self {
            action,
            packets: Vec::new(),
            requests: Vec::new(),
            responses: Vec::new(),
            state: ActionState::Created,
            timeout: None,
            deadline: None,
            on_sent: None,
            on_each: None,
            on_done: None,
            on_expired: None,
            on_always: None,
        }
    }

    /// Uses already translated packets instead of the connection's variant
    pub fn with_packets(mut self, packets: Vec<Packet>) -> Self {
        self.packets = packets;
        self
    }

    /// Overrides the connection's default action timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_sent(mut self, f: impl FnOnce(&NetworkAction, &[Packet]) + Send + 'static) -> Self {
        self.on_sent = Some(Box::new(f));
        self
    }

    pub fn on_each(mut self, f: impl FnMut(&NetworkAction, &Packet, &Packet) + Send + 'static) -> Self {
        self.on_each = Some(Box::new(f));
        self
    }

    pub fn on_done(
        mut self,
        f: impl FnOnce(&NetworkAction, &[Packet], &[Packet]) + Send + 'static,
    ) -> Self {
        self.on_done = Some(Box::new(f));
        self
    }

    pub fn on_expired(
        mut self,
        f: impl FnOnce(&NetworkAction, &[Packet], &[Packet]) + Send + 'static,
    ) -> Self {
        self.on_expired = Some(Box::new(f));
        self
    }

    pub fn on_always(mut self, f: impl FnOnce(&NetworkAction) + Send + 'static) -> Self {
        self.on_always = Some(Box::new(f));
        self
    }

    pub fn action(&self) -> &NetworkAction {
        &self.action
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn requests(&self) -> &[Packet] {
        &self.requests
    }

    pub fn responses(&self) -> &[Packet] {
        &self.responses
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Expires an action that never reached a connection
    pub(crate) fn abandon(self) {
        self.finish(ActionState::Expired);
    }

    fn finish(mut self, state: ActionState) {
        self.state = state;
        let callback = match state {
            ActionState::Done => self.on_done.take(),
            _ => self.on_expired.take(),
        };
        if let Some(callback) = callback {
            callback(&self.action, &self.requests, &self.responses);
        }
        if let Some(always) = self.on_always.take() {
            always(&self.action);
        }
    }
}

/// Owner of every in-flight deferred action on a connection
#[derive(Debug, Default)]
pub struct Coordinator {
    next_id: ActionId,
    in_flight: HashMap<ActionId, DeferredAction>,
    owners: HashMap<u32, ActionId>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an action whose packets were all sent or queued as
    /// `requests`. Fires `sent` before returning.
    pub fn begin(
        &mut self,
        mut deferred: DeferredAction,
        requests: Vec<Packet>,
        now: Instant,
        default_timeout: Duration,
    ) -> ActionId {
        self.next_id += 1;
        let id = self.next_id;

        deferred.requests = requests;
        deferred.state = ActionState::Sent;
        deferred.deadline = Some(now + deferred.timeout.unwrap_or(default_timeout));

        if let Some(sent) = deferred.on_sent.take() {
            sent(&deferred.action, &deferred.requests);
        }

        if deferred.requests.is_empty() {
            debug!("Action {} produced no packets, completing immediately", id);
            deferred.finish(ActionState::Done);
            return id;
        }

        for sequence in deferred.requests.iter().filter_map(Packet::sequence) {
            if let Some(previous) = self.owners.insert(sequence, id) {
                warn!("Request #{} moved from action {} to action {}", sequence, previous, id);
            }
        }
        self.in_flight.insert(id, deferred);
        id
    }

    /// Records a correlated response. Returns false when no action owns the
    /// request.
    pub fn on_response(&mut self, request: &Packet, response: &Packet) -> bool {
        let Some(id) = request.sequence().and_then(|seq| self.owners.remove(&seq)) else {
            return false;
        };
        let Some(deferred) = self.in_flight.get_mut(&id) else {
            return false;
        };

        deferred.state = ActionState::Completing;
        deferred.responses.push(response.clone());
        if let Some(each) = deferred.on_each.as_mut() {
            each(&deferred.action, request, response);
        }

        if deferred.responses.len() >= deferred.requests.len() {
            if let Some(done) = self.in_flight.remove(&id) {
                done.finish(ActionState::Done);
            }
        }
        true
    }

    /// Expires every action whose deadline has passed. Returns the sequence
    /// numbers those actions still owned.
    pub fn expire_due(&mut self, now: Instant) -> Vec<u32> {
        let mut due: Vec<ActionId> = self
            .in_flight
            .iter()
            .filter(|(_, deferred)| deferred.deadline.is_some_and(|deadline| now >= deadline))
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();

        due.into_iter().flat_map(|id| self.expire(id)).collect()
    }

    /// Expires everything; used on teardown
    pub fn expire_all(&mut self) -> Vec<u32> {
        let mut ids: Vec<ActionId> = self.in_flight.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().flat_map(|id| self.expire(id)).collect()
    }

    fn expire(&mut self, id: ActionId) -> Vec<u32> {
        let Some(deferred) = self.in_flight.remove(&id) else {
            return Vec::new();
        };

        let owned: Vec<u32> = deferred
            .requests
            .iter()
            .filter_map(Packet::sequence)
            .filter(|sequence| self.owners.get(sequence) == Some(&id))
            .collect();
        for sequence in &owned {
            self.owners.remove(sequence);
        }

        warn!(
            "Action {} expired with {}/{} responses",
            id,
            deferred.responses.len(),
            deferred.requests.len()
        );
        deferred.finish(ActionState::Expired);
        owned
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn owner_of(&self, sequence: u32) -> Option<ActionId> {
        self.owners.get(&sequence).copied()
    }

    pub fn state_of(&self, id: ActionId) -> Option<ActionState> {
        self.in_flight.get(&id).map(DeferredAction::state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_shared::OK;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<String>>>;

    fn numbered(words: &[&str], sequence: u32) -> Packet {
        let mut packet = Packet::request(words.iter().copied());
        packet.assign_sequence(sequence);
        packet
    }

    fn observed(events: &Events) -> DeferredAction {
        let (sent, each, done, expired, always) = (
            Arc::clone(events),
            Arc::clone(events),
            Arc::clone(events),
            Arc::clone(events),
            Arc::clone(events),
        );
        DeferredAction::new(NetworkAction::kick("Phogue", "AFK"))
            .on_sent(move |_, requests| sent.lock().unwrap().push(format!("sent:{}", requests.len())))
            .on_each(move |_, request, _| {
                each.lock()
                    .unwrap()
                    .push(format!("each:{}", request.sequence().unwrap_or_default()))
            })
            .on_done(move |_, requests, responses| {
                done.lock()
                    .unwrap()
                    .push(format!("done:{}/{}", responses.len(), requests.len()))
            })
            .on_expired(move |_, requests, responses| {
                expired
                    .lock()
                    .unwrap()
                    .push(format!("expired:{}/{}", responses.len(), requests.len()))
            })
            .on_always(move |_| always.lock().unwrap().push("always".to_string()))
    }

    fn count(events: &Events, prefix: &str) -> usize {
        events.lock().unwrap().iter().filter(|e| e.starts_with(prefix)).count()
    }

    #[test]
    fn test_all_responses_complete_the_action() {
        let events: Events = Arc::default();
        let mut coordinator = Coordinator::new();
        let now = Instant::now();
        let requests = vec![numbered(&["a"], 1), numbered(&["b"], 2)];

        coordinator.begin(observed(&events), requests.clone(), now, Duration::from_secs(5));
        assert_eq!(*events.lock().unwrap(), vec!["sent:2"]);

        assert!(coordinator.on_response(&requests[0], &Packet::response_to(&requests[0], [OK])));
        assert_eq!(coordinator.in_flight(), 1);
        assert!(coordinator.on_response(&requests[1], &Packet::response_to(&requests[1], [OK])));

        assert_eq!(
            *events.lock().unwrap(),
            vec!["sent:2", "each:1", "each:2", "done:2/2", "always"]
        );
        assert_eq!(coordinator.in_flight(), 0);

        // Nothing left to expire
        assert!(coordinator.expire_due(now + Duration::from_secs(60)).is_empty());
        assert_eq!(count(&events, "expired"), 0);
        assert_eq!(count(&events, "always"), 1);
    }

    #[test]
    fn test_deadline_expires_with_partial_responses() {
        let events: Events = Arc::default();
        let mut coordinator = Coordinator::new();
        let now = Instant::now();
        let requests = vec![numbered(&["a"], 1), numbered(&["b"], 2), numbered(&["c"], 3)];

        coordinator.begin(observed(&events), requests.clone(), now, Duration::from_secs(5));
        coordinator.on_response(&requests[0], &Packet::response_to(&requests[0], [OK]));

        assert!(coordinator.expire_due(now + Duration::from_secs(4)).is_empty());
        let released = coordinator.expire_due(now + Duration::from_secs(5));

        assert_eq!(released, vec![2, 3]);
        assert_eq!(count(&events, "expired:1/3"), 1);
        assert_eq!(count(&events, "done"), 0);
        assert_eq!(count(&events, "always"), 1);

        // A late response belongs to nobody
        assert!(!coordinator.on_response(&requests[1], &Packet::response_to(&requests[1], [OK])));
        assert_eq!(count(&events, "always"), 1);
    }

    #[test]
    fn test_expiring_one_action_leaves_others_alone() {
        let short: Events = Arc::default();
        let long: Events = Arc::default();
        let mut coordinator = Coordinator::new();
        let now = Instant::now();

        let a = numbered(&["a"], 1);
        let b = numbered(&["b"], 2);
        coordinator.begin(observed(&short).timeout(Duration::from_secs(1)), vec![a], now, Duration::from_secs(30));
        let long_id = coordinator.begin(observed(&long), vec![b.clone()], now, Duration::from_secs(30));

        assert_eq!(coordinator.expire_due(now + Duration::from_secs(2)), vec![1]);
        assert_eq!(coordinator.owner_of(2), Some(long_id));
        assert_eq!(coordinator.state_of(long_id), Some(ActionState::Sent));

        assert!(coordinator.on_response(&b, &Packet::response_to(&b, [OK])));
        assert_eq!(count(&long, "done:1/1"), 1);
        assert_eq!(count(&short, "expired"), 1);
    }

    #[test]
    fn test_expire_all_fires_always_once_each() {
        let first: Events = Arc::default();
        let second: Events = Arc::default();
        let mut coordinator = Coordinator::new();
        let now = Instant::now();

        coordinator.begin(observed(&first), vec![numbered(&["a"], 1)], now, Duration::from_secs(30));
        coordinator.begin(observed(&second), vec![numbered(&["b"], 2)], now, Duration::from_secs(30));

        let mut released = coordinator.expire_all();
        released.sort_unstable();
        assert_eq!(released, vec![1, 2]);
        assert!(coordinator.expire_all().is_empty());

        for events in [&first, &second] {
            assert_eq!(count(events, "expired:0/1"), 1);
            assert_eq!(count(events, "always"), 1);
        }
    }

    #[test]
    fn test_empty_action_completes_immediately() {
        let events: Events = Arc::default();
        let mut coordinator = Coordinator::new();

        coordinator.begin(observed(&events), Vec::new(), Instant::now(), Duration::from_secs(1));

        assert_eq!(*events.lock().unwrap(), vec!["sent:0", "done:0/0", "always"]);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[test]
    fn test_unowned_response_is_ignored() {
        let mut coordinator = Coordinator::new();
        let request = numbered(&["version"], 7);
        assert!(!coordinator.on_response(&request, &Packet::response_to(&request, [OK])));
    }
}
