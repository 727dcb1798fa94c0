//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! and drives one streaming exchange at a time over a [`Transport`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::client::{ByteStream, Transport};
use crate::client_logger::ClientLogger;
use crate::conversation::{Conversation, ConversationObserver};
use crate::decoder::decode_stream;
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_EXCHANGE_DURATION, SESSION_EXCHANGES, SESSION_FAILED_EXCHANGES,
    SESSION_UNTERMINATED_STREAMS,
};
use crate::types::{Attachment, ChatRequest, MessageId, MessageStatus, ProtocolEvent};

/// How often the interrupt flag is checked while waiting for the next event.
pub const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Text recorded when the stream ends without `Done` or an error.
pub const UNTERMINATED: &str = "the response ended before it was complete";

/// Text recorded when the user interrupts a response.
pub const INTERRUPTED: &str = "response interrupted";

/// The result of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeOutcome {
    /// The user message that started the exchange.
    pub user: MessageId,
    /// The assistant message that received the answer.
    pub assistant: MessageId,
    /// Final status of the assistant message.
    pub status: MessageStatus,
    /// True if the user stopped the response.
    pub interrupted: bool,
    /// Wall time from sending the request to the final status.
    pub elapsed: Duration,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Total number of exchanges attempted.
    pub total_exchanges: u64,
    /// Exchanges whose answer ended Failed, interrupted ones included.
    pub failed_exchanges: u64,
    /// Exchanges the user interrupted.
    pub interrupted_exchanges: u64,
    /// Duration of the most recent exchange, if any.
    pub last_exchange: Option<Duration>,
}

/// A chat session that manages conversation state and service interactions.
pub struct ChatSession {
    transport: Box<dyn Transport>,
    conversation: Conversation,
    logger: Option<Arc<dyn ClientLogger>>,
    interrupt: Arc<AtomicBool>,
    stats: SessionStats,
}

impl ChatSession {
    /// Creates a new chat session over `transport`.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            conversation: Conversation::new(),
            logger: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            stats: SessionStats::default(),
        }
    }

    /// Attaches a logger that sees every request and event.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Uses `flag` as the interrupt flag; setting it stops the active response.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// The flag that interrupts the active response when set.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Registers an observer on the conversation.
    pub fn subscribe(&mut self, observer: Box<dyn ConversationObserver>) {
        self.conversation.subscribe(observer);
    }

    /// The conversation so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Sends a user message and streams the answer into the conversation.
    ///
    /// Transport and protocol failures do not surface as `Err`: they end up as
    /// the text of a Failed assistant message. The only error is
    /// [`Error::Busy`], returned without touching the conversation when a
    /// response is still streaming.
    pub async fn send(
        &mut self,
        input: &str,
        attachment: Option<&Attachment>,
    ) -> Result<ExchangeOutcome> {
        if let Some(active) = self.conversation.active() {
            return Err(Error::busy(format!("{active} is still streaming")));
        }
        self.interrupt.store(false, Ordering::SeqCst);

        let shown = match attachment {
            Some(attachment) if input.is_empty() => attachment.note(),
            Some(attachment) => format!("{input}\n{}", attachment.note()),
            None => input.to_string(),
        };
        let user = self.conversation.append_user(shown);
        let assistant = self.conversation.append_pending_assistant();

        let mut request = ChatRequest::new(input);
        if let Some(attachment) = attachment {
            request = request.with_file_data(attachment.file_data.clone());
        }
        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }

        SESSION_EXCHANGES.click();
        let start = Instant::now();
        let interrupted = match self.open_stream(&request).await {
            Some(Ok(bytes)) => self.drain(assistant, bytes).await,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "could not open response stream");
                self.apply(assistant, &ProtocolEvent::error(err.to_string()));
                false
            }
            None => {
                tracing::info!(%assistant, "request interrupted by user before the response began");
                true
            }
        };
        self.reconcile(assistant, interrupted);
        let elapsed = start.elapsed();
        SESSION_EXCHANGE_DURATION.add(elapsed.as_secs_f64());

        let status = match self.conversation.get(assistant) {
            Some(message) => {
                if let Some(logger) = &self.logger {
                    logger.log_exchange(message);
                }
                message.status
            }
            None => MessageStatus::Failed,
        };
        self.stats.total_exchanges += 1;
        self.stats.last_exchange = Some(elapsed);
        if status == MessageStatus::Failed {
            SESSION_FAILED_EXCHANGES.click();
            self.stats.failed_exchanges += 1;
        }
        if interrupted {
            self.stats.interrupted_exchanges += 1;
        }
        tracing::debug!(%assistant, ?status, ?elapsed, "exchange finished");

        Ok(ExchangeOutcome {
            user,
            assistant,
            status,
            interrupted,
            elapsed,
        })
    }

    /// Clears the conversation. Refused while a response is streaming.
    pub fn clear(&mut self) -> Result<()> {
        if self.conversation.clear() {
            Ok(())
        } else {
            Err(Error::busy("cannot clear while a response is streaming"))
        }
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.message_count(),
            ..self.stats.clone()
        }
    }

    /// Opens the response stream. Returns `None` if interrupted while waiting.
    async fn open_stream(&self, request: &ChatRequest) -> Option<Result<ByteStream>> {
        let mut opening = std::pin::pin!(self.transport.open(request));
        loop {
            if self.interrupt.swap(false, Ordering::SeqCst) {
                return None;
            }
            if let Ok(opened) = tokio::time::timeout(INTERRUPT_POLL, opening.as_mut()).await {
                return Some(opened);
            }
        }
    }

    /// Feeds decoded events into message `id`. Returns true if interrupted.
    async fn drain(&mut self, id: MessageId, bytes: ByteStream) -> bool {
        let mut events = std::pin::pin!(decode_stream(bytes));
        loop {
            if self.interrupt.swap(false, Ordering::SeqCst) {
                tracing::info!(%id, "response interrupted by user");
                return true;
            }
            let next = match tokio::time::timeout(INTERRUPT_POLL, events.next()).await {
                Ok(next) => next,
                Err(_) => continue,
            };
            match next {
                Some(Ok(event)) => {
                    self.apply(id, &event);
                    if event.is_terminal() {
                        return false;
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(%id, error = %err, "response stream failed");
                    self.apply(id, &ProtocolEvent::error(err.to_string()));
                    return false;
                }
                None => return false,
            }
        }
    }

    /// Fails message `id` if it is still streaming after the stream ended.
    fn reconcile(&mut self, id: MessageId, interrupted: bool) {
        if !self
            .conversation
            .get(id)
            .is_some_and(|message| message.is_streaming())
        {
            return;
        }
        let reason = if interrupted {
            INTERRUPTED
        } else {
            SESSION_UNTERMINATED_STREAMS.click();
            tracing::warn!(%id, "response ended without a terminal event");
            UNTERMINATED
        };
        self.apply(id, &ProtocolEvent::error(reason));
    }

    fn apply(&mut self, id: MessageId, event: &ProtocolEvent) {
        if let Some(logger) = &self.logger {
            logger.log_stream_event(event);
        }
        self.conversation.apply_event(id, event);
    }
}
