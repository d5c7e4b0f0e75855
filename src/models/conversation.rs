use serde::Serialize;
use std::fmt;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Bot => f.write_str("bot"),
        }
    }
}

/// Immutable transcript record. The sequence number is fixed at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationEntry {
    pub sequence: u64,
    pub sender: Sender,
    pub text: String,
}

/// Ordered, append-only log of conversation entries.
///
/// Entries are kept sorted by sequence number. A late entry whose number was
/// reserved earlier lands at its reserved position; nothing already in the
/// transcript is ever changed or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    entries: Vec<ConversationEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `entry` at the position of its sequence number.
    ///
    /// Returns `false` (and leaves the transcript untouched) if that sequence
    /// number is already occupied.
    pub fn insert(&mut self, entry: ConversationEntry) -> bool {
        let index = self
            .entries
            .partition_point(|existing| existing.sequence < entry.sequence);

        if self
            .entries
            .get(index)
            .is_some_and(|existing| existing.sequence == entry.sequence)
        {
            tracing::warn!(
                "Transcript slot {} already occupied, dropping {} entry",
                entry.sequence,
                entry.sender
            );
            return false;
        }

        self.entries.insert(index, entry);
        true
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    pub fn get(&self, sequence: u64) -> Option<&ConversationEntry> {
        self.entries
            .binary_search_by_key(&sequence, |entry| entry.sequence)
            .ok()
            .map(|index| &self.entries[index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
