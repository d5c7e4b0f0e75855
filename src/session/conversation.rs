use crate::models::{ConversationEntry, Sender, Transcript};
use crate::services::ServiceError;
use indexmap::IndexMap;

/// Bot reply recorded when a conversation round trip fails.
pub const CONNECTION_ERROR_MESSAGE: &str = "⚠️ Error connecting to AI server.";

/// An accepted question that must now be sent to the conversation service.
///
/// `sequence` is the user entry's number and doubles as the correlation key;
/// the answer will occupy `sequence + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTicket {
    pub sequence: u64,
    pub question: String,
}

impl ChatTicket {
    pub fn reply_sequence(&self) -> u64 {
        self.sequence + 1
    }
}

/// Owns the transcript and the round trips still waiting for an answer.
///
/// Each submission reserves two consecutive sequence numbers up front, so
/// answers land next to their own question no matter which call finishes first.
#[derive(Debug)]
pub struct ConversationController {
    next_sequence: u64,
    transcript: Transcript,
    pending: IndexMap<u64, String>,
}

impl ConversationController {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            transcript: Transcript::new(),
            pending: IndexMap::new(),
        }
    }

    /// Record the user's message and reserve the slot for its answer.
    ///
    /// Returns `None` for empty or whitespace-only text; nothing is recorded and
    /// no call should be issued.
    pub fn submit(&mut self, text: &str) -> Option<ChatTicket> {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring empty chat submission");
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 2;

        self.transcript.insert(ConversationEntry {
            sequence,
            sender: Sender::User,
            text: text.to_string(),
        });
        self.pending.insert(sequence, text.to_string());

        tracing::info!(
            "Question #{} submitted ({} in flight)",
            sequence,
            self.pending.len()
        );

        Some(ChatTicket {
            sequence,
            question: text.to_string(),
        })
    }

    /// Record the answer (or failure) for the question submitted as `sequence`.
    ///
    /// Returns the bot entry that was added, or `None` if `sequence` is not a
    /// pending round trip (already answered, or never submitted).
    pub fn complete(
        &mut self,
        sequence: u64,
        result: Result<String, ServiceError>,
    ) -> Option<&ConversationEntry> {
        if self.pending.shift_remove(&sequence).is_none() {
            tracing::warn!("Answer for unknown question #{} ignored", sequence);
            return None;
        }

        let text = match result {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Chat round trip #{} failed: {}", sequence, e);
                CONNECTION_ERROR_MESSAGE.to_string()
            }
        };

        let reply = sequence + 1;
        self.transcript.insert(ConversationEntry {
            sequence: reply,
            sender: Sender::Bot,
            text,
        });

        tracing::info!(
            "Answer #{} recorded ({} still in flight)",
            reply,
            self.pending.len()
        );

        self.transcript.get(reply)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Questions still awaiting an answer, in submission order.
    pub fn pending(&self) -> impl Iterator<Item = (u64, &str)> {
        self.pending.iter().map(|(seq, q)| (*seq, q.as_str()))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new()
    }
}
