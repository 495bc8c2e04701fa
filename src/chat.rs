use serde::{Deserialize, Serialize};

use crate::rules::Color;

/// A single chat message, append-only and ordered by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub timestamp: f64,
    pub color: Color,
    pub message: String,
}

/// An ordered run of chat messages cached by a session. `is_complete` is true
/// when the thread contains every message from id 1; false when it only
/// holds a tail delivered incrementally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatThread {
    pub thread: Vec<ChatMessage>,
    #[serde(rename = "isComplete")]
    pub is_complete: bool,
}

impl ChatThread {
    pub fn empty_complete() -> Self {
        ChatThread {
            thread: Vec::new(),
            is_complete: true,
        }
    }

    /// Merge `other` into `self`. If `other` is complete, it replaces
    /// `self` wholesale (the reconnect path always retransmits complete
    /// threads so clients replace rather than duplicate-append). Otherwise
    /// its messages are appended as a delta.
    pub fn merge(&mut self, other: ChatThread) {
        if other.is_complete {
            *self = other;
        } else {
            self.thread.extend(other.thread);
            // the merged thread's completeness is unaffected by an
            // incremental delta
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, text: &str) -> ChatMessage {
        ChatMessage {
            id,
            timestamp: id as f64,
            color: Color::Black,
            message: text.into(),
        }
    }

    #[test]
    fn incomplete_merge_appends() {
        let mut thread = ChatThread {
            thread: vec![msg(1, "hi")],
            is_complete: false,
        };
        thread.merge(ChatThread {
            thread: vec![msg(2, "there")],
            is_complete: false,
        });
        assert_eq!(thread.thread.len(), 2);
        assert!(!thread.is_complete);
    }

    #[test]
    fn complete_merge_replaces() {
        let mut thread = ChatThread {
            thread: vec![msg(1, "stale"), msg(2, "also stale")],
            is_complete: false,
        };
        thread.merge(ChatThread {
            thread: vec![msg(1, "hi"), msg(2, "there"), msg(3, "fresh")],
            is_complete: true,
        });
        assert_eq!(thread.thread.len(), 3);
        assert!(thread.is_complete);
    }

    #[test]
    fn chat_thread_round_trips() {
        let thread = ChatThread {
            thread: vec![msg(1, "hi")],
            is_complete: true,
        };
        let json = serde_json::to_string(&thread).unwrap();
        let back: ChatThread = serde_json::from_str(&json).unwrap();
        assert_eq!(back, thread);
    }
}
