//! The conversation store.
//!
//! A [`Conversation`] is an ordered log of [`Message`]s. Messages are only ever
//! appended; the one exception to immutability is the active assistant message,
//! which grows as protocol events are folded into it. Observers are told about
//! every change so that a renderer can redraw only the message that changed.

use crate::types::{Message, MessageId, MessageStatus, ProtocolEvent};

/// Kind of change reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChange {
    /// The message was added to the conversation.
    Appended,
    /// Text was appended to a streaming message.
    Extended,
    /// The message reached `Complete` or `Failed`.
    Finalized,
}

/// Receives change notifications from a [`Conversation`].
pub trait ConversationObserver: Send {
    /// Called after `message` changed.
    fn message_changed(&mut self, message: &Message, change: MessageChange);

    /// Called after the conversation was emptied.
    fn conversation_cleared(&mut self) {}
}

/// Render an error description the way it is shown in place of an answer.
pub fn render_error(message: &str) -> String {
    format!("Sorry, something went wrong: {message}")
}

/// An ordered, append-only log of messages with at most one streaming message.
#[derive(Default)]
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
    observers: Vec<Box<dyn ConversationObserver>>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for all subsequent changes.
    pub fn subscribe(&mut self, observer: Box<dyn ConversationObserver>) {
        self.observers.push(observer);
    }

    /// Appends a complete user message and returns its id.
    pub fn append_user(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message::user(id, text.into()));
        self.notify(self.messages.len() - 1, MessageChange::Appended);
        id
    }

    /// Appends an empty assistant message that becomes the streaming target.
    ///
    /// If a message is already streaming, nothing is appended and the id of the
    /// streaming message is returned instead.
    pub fn append_pending_assistant(&mut self) -> MessageId {
        if let Some(active) = self.active() {
            tracing::debug!(%active, "a message is already streaming");
            return active;
        }
        let id = self.allocate_id();
        self.messages.push(Message::pending_assistant(id));
        self.notify(self.messages.len() - 1, MessageChange::Appended);
        id
    }

    /// Folds a protocol event into the message `id`.
    ///
    /// Events for a message that is not streaming (already finalized, a user
    /// message, or an unknown id) are ignored.
    pub fn apply_event(&mut self, id: MessageId, event: &ProtocolEvent) {
        let Some(index) = self.index_of(id) else {
            tracing::debug!(%id, "event for unknown message ignored");
            return;
        };
        let message = &mut self.messages[index];
        if !message.is_streaming() {
            tracing::debug!(%id, status = ?message.status, "event for finalized message ignored");
            return;
        }

        let change = match event {
            ProtocolEvent::TextDelta { chunk } => {
                message.text.push_str(chunk);
                MessageChange::Extended
            }
            ProtocolEvent::Error { message: error } => {
                message.text = render_error(error);
                message.status = MessageStatus::Failed;
                MessageChange::Finalized
            }
            ProtocolEvent::Done => {
                message.status = MessageStatus::Complete;
                MessageChange::Finalized
            }
        };
        self.notify(index, change);
    }

    /// Returns a copy of every message, in order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Borrows the messages, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Looks up a message by id.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.index_of(id).map(|index| &self.messages[index])
    }

    /// The id of the streaming message, if any.
    pub fn active(&self) -> Option<MessageId> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.is_streaming())
            .map(|message| message.id)
    }

    /// The most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == crate::MessageRole::Assistant)
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Removes every message.
    ///
    /// Refused (returns false) while a message is streaming. Ids are not reused.
    pub fn clear(&mut self) -> bool {
        if self.active().is_some() {
            return false;
        }
        self.messages.clear();
        for observer in &mut self.observers {
            observer.conversation_cleared();
        }
        true
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId::new(self.next_id)
    }

    fn index_of(&self, id: MessageId) -> Option<usize> {
        // Ids are allocated in increasing order, so the log is sorted by id.
        self.messages
            .binary_search_by_key(&id, |message| message.id)
            .ok()
    }

    fn notify(&mut self, index: usize, change: MessageChange) {
        let message = &self.messages[index];
        for observer in &mut self.observers {
            observer.message_changed(message, change);
        }
    }
}
