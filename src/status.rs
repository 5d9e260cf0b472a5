use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

/// How many notifications are kept. Older ones fall off the end.
pub const STATUS_QUEUE_LEN: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// A transient message for the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Unique for the life of the queue, used to dismiss
    pub id: u64,
    pub level: Level,
    pub message: String,
}

/// A short queue of notifications, newest first, generally reporting the
/// outcome of actions and failures in background polling.
#[derive(Debug, Default)]
pub struct StatusQueue {
    next_id: u64,
    messages: VecDeque<Notification>,
}

impl StatusQueue {
    pub fn write(&mut self, level: Level, message: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push_front(Notification { id, level, message });
        self.messages.truncate(STATUS_QUEUE_LEN);
        id
    }

    pub fn read_all(&self) -> Vec<Notification> {
        self.messages.iter().cloned().collect()
    }

    pub fn read_last(&self) -> Option<Notification> {
        self.messages.front().cloned()
    }

    /// Returns false if it was already gone
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.messages.len();
        self.messages.retain(|n| n.id != id);
        self.messages.len() != before
    }

    pub fn dismiss_all(&mut self) {
        self.messages.clear();
    }
}

/// Shared handle to a status queue. Every write or dismissal bumps a
/// counter that watchers can wait on.
#[derive(Clone, Debug)]
pub struct Notifications {
    queue: Arc<RwLock<StatusQueue>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for Notifications {
    fn default() -> Notifications {
        let (version, _) = watch::channel(0);
        Notifications {
            queue: Arc::new(RwLock::new(StatusQueue::default())),
            version: Arc::new(version),
        }
    }
}

impl Notifications {
    pub fn new() -> Notifications {
        Notifications::default()
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(Level::Info, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(Level::Error, message.into())
    }

    fn push(&self, level: Level, message: String) -> u64 {
        let id = self.queue.write().write(level, message);
        self.bump();
        id
    }

    pub fn read_all(&self) -> Vec<Notification> {
        self.queue.read().read_all()
    }

    pub fn read_last(&self) -> Option<Notification> {
        self.queue.read().read_last()
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let gone = self.queue.write().dismiss(id);
        if gone {
            self.bump();
        }
        gone
    }

    pub fn dismiss_all(&self) {
        self.queue.write().dismiss_all();
        self.bump();
    }

    /// A receiver that sees every change made after it was last marked
    /// seen, including ones made while nobody was waiting
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    // send_modify updates the value even with no receivers around
    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_newest_first_and_bounded() {
        let mut sq = StatusQueue::default();
        for i in 0..5 {
            sq.write(Level::Info, format!("m{i}"));
        }
        let all = sq.read_all();
        assert_eq!(all.len(), STATUS_QUEUE_LEN);
        assert_eq!(all[0].message, "m4");
        assert_eq!(all[2].message, "m2");
        assert_eq!(sq.read_last().unwrap().message, "m4");
    }

    #[test]
    fn test_dismiss() {
        let notes = Notifications::new();
        let a = notes.info("followed");
        let b = notes.error("Already subscribed");
        assert!(notes.dismiss(a));
        assert!(!notes.dismiss(a));
        let all = notes.read_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, b);
        assert_eq!(all[0].level, Level::Error);
        notes.dismiss_all();
        assert!(notes.read_last().is_none());
    }

    #[test]
    fn test_changes_are_seen_without_a_waiter() {
        let notes = Notifications::new();
        let mut rx = notes.subscribe();
        assert!(!rx.has_changed().unwrap());

        // Nobody is awaiting when these happen
        notes.info("one");
        notes.error("two");
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
        assert!(!rx.has_changed().unwrap());

        notes.dismiss_all();
        assert!(rx.has_changed().unwrap());
    }
}
