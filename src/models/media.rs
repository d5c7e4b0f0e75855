use std::fmt;
use std::sync::Arc;

/// A user-selected image, owned by the session that selected it.
///
/// The bytes live behind an `Arc` so the payload can be handed to a spawned
/// service call without copying while the session keeps its own reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl MediaPayload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lifecycle status of the current media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionStatus {
    #[default]
    Idle,
    Previewing,
    Detecting,
    Detected,
    Failed,
}

impl DetectionStatus {
    /// Whether a detect request may be issued from this status (input permitting).
    pub fn accepts_detect(self) -> bool {
        matches!(self, Self::Previewing | Self::Detected | Self::Failed)
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Previewing => "previewing",
            Self::Detecting => "detecting",
            Self::Detected => "detected",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
