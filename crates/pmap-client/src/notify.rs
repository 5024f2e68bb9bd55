use std::fmt;

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

/// User-facing messages emitted by the workflows.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    SignInRequired,
    SessionExpired,
    /// The image could not be uploaded; the marker went out without it.
    ImageUploadSkipped(String),
    MarkerCreated { id: i64 },
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignInRequired => write!(f, "Sign in to add problems to the map"),
            Self::SessionExpired => write!(f, "Your session has expired, please sign in again"),
            Self::ImageUploadSkipped(reason) => {
                write!(f, "Image upload failed ({}), the problem was saved without it", reason)
            }
            Self::MarkerCreated { .. } => write!(f, "Problem added to the map"),
            Self::Error(message) => write!(f, "{}", message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.tx.send(notice);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
