//! Client core of the problem map: API access, session handling and the
//! view-level workflows a UI layer drives.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod map;
pub mod notify;
pub mod profile;
pub mod route;
pub mod storage;

pub use api::{ApiClient, RegisterOutcome};
pub use auth::{AuthState, AuthStore};
pub use config::ClientConfig;
pub use error::{ClientError, ValidationError};
pub use map::{DraftMarker, ImageAttachment, MapView, WorkflowState};
pub use notify::{Notice, Notifier};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError};
pub use profile::ProfileSummary;
pub use route::Route;
