//! Diagnostic Message Queue
//!
//! A bounded FIFO of engine diagnostics that applications drain one message at a
//! time. Every queued message is also forwarded to the `log` facade, so hosts that
//! install a logger see the same stream without polling.

use std::collections::VecDeque;

/// Importance of a message. Lower values are more important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum LogLevel {
    Error = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// A single diagnostic entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub level: LogLevel,
    /// Engine time in seconds at which the message was queued.
    pub time: f32,
    pub text: String,
}

/// Bounded diagnostic queue.
///
/// Messages above `max_level` are dropped; once `capacity` messages are pending,
/// new ones are discarded until the application drains the queue.
#[derive(Debug)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
    capacity: usize,
    max_level: i32,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(512, 4)
    }
}

impl MessageQueue {
    #[must_use]
    pub fn new(capacity: usize, max_level: i32) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            max_level,
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.messages.truncate(capacity);
    }

    pub fn set_max_level(&mut self, max_level: i32) {
        self.max_level = max_level;
    }

    /// Queues a message. Returns `false` if it was filtered or the queue is full.
    pub fn push(&mut self, level: LogLevel, time: f32, text: impl Into<String>) -> bool {
        let text = text.into();
        match level {
            LogLevel::Error => log::error!("{text}"),
            LogLevel::Warning => log::warn!("{text}"),
            LogLevel::Info => log::info!("{text}"),
            LogLevel::Debug => log::debug!("{text}"),
        }

        if level.as_i32() > self.max_level || self.messages.len() >= self.capacity {
            return false;
        }
        self.messages.push_back(Message { level, time, text });
        true
    }

    /// Takes the oldest pending message.
    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = MessageQueue::default();
        queue.push(LogLevel::Warning, 0.5, "first");
        queue.push(LogLevel::Error, 1.0, "second");

        let first = queue.pop().unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(first.level, LogLevel::Warning);
        assert_eq!(queue.pop().unwrap().text, "second");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_level_filter_and_capacity() {
        let mut queue = MessageQueue::new(2, 2);
        assert!(!queue.push(LogLevel::Info, 0.0, "filtered"));
        assert!(queue.push(LogLevel::Warning, 0.0, "a"));
        assert!(queue.push(LogLevel::Error, 0.0, "b"));
        assert!(!queue.push(LogLevel::Error, 0.0, "overflow"));
        assert_eq!(queue.len(), 2);
        // Pending messages are kept; the overflowing one is lost.
        assert_eq!(queue.pop().map(|m| m.text), Some("a".to_string()));
    }
}
