//! Map view: the marker list, pins and the add-marker workflow.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use pmap_types::api::CreateMarkerRequest;
use pmap_types::{Coordinates, Marker, MarkerStatus};

use crate::api::ApiClient;
use crate::auth::AuthStore;
use crate::error::{ClientError, ValidationError};
use crate::notify::{Notice, Notifier};

/// Pin colours, picked by author id.
pub const PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
];

pub fn pin_color(user_id: i64) -> &'static str {
    PALETTE[user_id.rem_euclid(PALETTE.len() as i64) as usize]
}

/// An image picked by the user, held in memory until submit.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let content_type = content_type.into();
        if !content_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage);
        }
        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    /// Read a file from disk, guessing the content type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(image_content_type)
            .ok_or(ValidationError::NotAnImage)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(crate::storage::StorageError::from)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        Ok(Self::new(file_name, content_type, bytes)?)
    }

    /// `data:` URL for previewing the image before it is uploaded.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.bytes))
    }
}

fn image_content_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Unsaved marker data, alive for one add cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftMarker {
    pub coordinates: Coordinates,
    pub text: String,
    pub image: Option<ImageAttachment>,
    /// Set once the image made it to the server, so a retry skips re-uploading.
    pub uploaded_image_url: Option<String>,
}

impl DraftMarker {
    fn at(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            text: String::new(),
            image: None,
            uploaded_image_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    AwaitingFormInput(DraftMarker),
    Submitting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub marker: Marker,
    /// True when the attached image failed to upload and was left out.
    pub image_skipped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub marker_id: i64,
    pub coordinates: Coordinates,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDetail {
    pub marker_id: i64,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub image_url: Option<String>,
    pub coordinates: Coordinates,
    pub status: Option<MarkerStatus>,
}

/// A draft that is being submitted. Unless settled, dropping it puts the
/// draft back into `AwaitingFormInput`.
struct InFlight<'a> {
    workflow: &'a mut WorkflowState,
    draft: DraftMarker,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn start(workflow: &'a mut WorkflowState, draft: DraftMarker) -> Self {
        *workflow = WorkflowState::Submitting;
        Self {
            workflow,
            draft,
            settled: false,
        }
    }

    /// The draft is done with; the view goes back to `Idle`.
    fn settle(mut self) {
        self.settled = true;
        *self.workflow = WorkflowState::Idle;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Submit did not settle, restoring the draft");
            *self.workflow = WorkflowState::AwaitingFormInput(self.draft.clone());
        }
    }
}

/// Mounted flag shared with whoever owns the view's lifetime. Responses
/// arriving after `unmount` are dropped.
#[derive(Debug, Clone)]
pub struct Lifecycle(Arc<AtomicBool>);

impl Lifecycle {
    fn mounted() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MapView {
    api: ApiClient,
    session: Arc<AuthStore>,
    notifier: Notifier,
    markers: Vec<Marker>,
    workflow: WorkflowState,
    lifecycle: Lifecycle,
}

impl MapView {
    pub fn new(api: ApiClient, session: Arc<AuthStore>, notifier: Notifier) -> Self {
        Self {
            api,
            session,
            notifier,
            markers: Vec::new(),
            workflow: WorkflowState::Idle,
            lifecycle: Lifecycle::mounted(),
        }
    }

    /// Create the view and fetch the marker list once.
    pub async fn mount(api: ApiClient, session: Arc<AuthStore>, notifier: Notifier) -> Result<Self, ClientError> {
        let mut view = Self::new(api, session, notifier);
        view.reload().await?;
        Ok(view)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn state(&self) -> &WorkflowState {
        &self.workflow
    }

    pub fn draft(&self) -> Option<&DraftMarker> {
        match &self.workflow {
            WorkflowState::AwaitingFormInput(draft) => Some(draft),
            _ => None,
        }
    }

    fn draft_mut(&mut self) -> Option<&mut DraftMarker> {
        match &mut self.workflow {
            WorkflowState::AwaitingFormInput(draft) => Some(draft),
            _ => None,
        }
    }

    /// Replace the marker list with the server's. Returns false when the view
    /// was unmounted while the request was in flight.
    pub async fn reload(&mut self) -> Result<bool, ClientError> {
        let markers = self.api.get_markers().await?;
        if !self.lifecycle.is_mounted() {
            debug!("Discarding {} markers for an unmounted map", markers.len());
            return Ok(false);
        }
        debug!("Loaded {} markers", markers.len());
        self.markers = markers;
        Ok(true)
    }

    /// A click on the map. Signed-in users get a draft at that point (or the
    /// existing draft moves there); everyone else gets a notice.
    pub fn click(&mut self, coordinates: Coordinates) -> Result<(), ClientError> {
        if !self.session.is_signed_in() {
            self.notifier.notify(Notice::SignInRequired);
            return Err(ClientError::NotSignedIn);
        }
        if !coordinates.is_valid() {
            return Err(ValidationError::MissingCoordinates.into());
        }

        if let WorkflowState::AwaitingFormInput(draft) = &mut self.workflow {
            draft.coordinates = coordinates;
        } else if self.workflow == WorkflowState::Idle {
            self.workflow = WorkflowState::AwaitingFormInput(DraftMarker::at(coordinates));
        } else {
            debug!("Ignoring map click while submitting");
        }
        Ok(())
    }

    /// Returns false when there is no draft to edit.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        match self.draft_mut() {
            Some(draft) => {
                draft.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn attach_image(&mut self, image: ImageAttachment) -> bool {
        match self.draft_mut() {
            Some(draft) => {
                draft.image = Some(image);
                draft.uploaded_image_url = None;
                true
            }
            None => false,
        }
    }

    pub fn remove_image(&mut self) {
        if let Some(draft) = self.draft_mut() {
            draft.image = None;
            draft.uploaded_image_url = None;
        }
    }

    pub fn cancel(&mut self) {
        if matches!(self.workflow, WorkflowState::AwaitingFormInput(_)) {
            self.workflow = WorkflowState::Idle;
        }
    }

    /// Upload the staged image (if any), create the marker, reload the list.
    ///
    /// A failed image upload only drops the image. A failed creation puts the
    /// draft back for another try; an expired session discards it. Dropping
    /// the future before it settles also puts the draft back.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, ClientError> {
        let draft = match std::mem::replace(&mut self.workflow, WorkflowState::Idle) {
            WorkflowState::AwaitingFormInput(draft) => draft,
            other => {
                self.workflow = other;
                return Err(ValidationError::MissingCoordinates.into());
            }
        };

        let text = draft.text.trim().to_string();
        if text.is_empty() {
            self.workflow = WorkflowState::AwaitingFormInput(draft);
            return Err(ValidationError::EmptyText.into());
        }

        let Some(user) = self.session.user() else {
            self.notifier.notify(Notice::SignInRequired);
            return Err(ClientError::NotSignedIn);
        };

        let api = &self.api;
        let session = self.session.as_ref();
        let notifier = &self.notifier;
        let mut in_flight = InFlight::start(&mut self.workflow, draft);

        let mut image_skipped = false;
        let pending_image = if in_flight.draft.uploaded_image_url.is_none() {
            in_flight.draft.image.clone()
        } else {
            None
        };
        if let Some(image) = pending_image {
            match api.upload_image(session, &image).await {
                Ok(uploaded) => in_flight.draft.uploaded_image_url = Some(uploaded.image_url),
                Err(ClientError::SessionExpired) => {
                    in_flight.settle();
                    notifier.notify(Notice::SessionExpired);
                    return Err(ClientError::SessionExpired);
                }
                Err(e) => {
                    warn!("Image upload failed, creating marker without it: {}", e);
                    notifier.notify(Notice::ImageUploadSkipped(e.to_string()));
                    in_flight.draft.image = None;
                    image_skipped = true;
                }
            }
        }

        let request = CreateMarkerRequest {
            text,
            latitude: in_flight.draft.coordinates.latitude,
            longitude: in_flight.draft.coordinates.longitude,
            image_url: in_flight.draft.uploaded_image_url.clone(),
            user_id: Some(user.id),
        };

        let marker = match api.create_marker(session, &request).await {
            Ok(marker) => marker,
            Err(ClientError::SessionExpired) => {
                in_flight.settle();
                notifier.notify(Notice::SessionExpired);
                return Err(ClientError::SessionExpired);
            }
            Err(e) => {
                // Dropping `in_flight` hands the draft back for editing.
                warn!("Marker creation failed: {}", e);
                notifier.notify(Notice::Error(e.to_string()));
                return Err(e);
            }
        };

        in_flight.settle();
        info!("Created marker {} at ({}, {})", marker.id, marker.latitude, marker.longitude);
        self.notifier.notify(Notice::MarkerCreated { id: marker.id });

        if let Err(e) = self.reload().await {
            warn!("Marker list reload failed after create: {}", e);
            if self.lifecycle.is_mounted() && !self.markers.iter().any(|m| m.id == marker.id) {
                self.markers.insert(0, marker.clone());
            }
        }

        Ok(SubmitOutcome { marker, image_skipped })
    }

    pub fn pins(&self) -> Vec<Pin> {
        self.markers
            .iter()
            .map(|m| Pin {
                marker_id: m.id,
                coordinates: m.coordinates(),
                color: pin_color(m.user_id),
            })
            .collect()
    }

    pub fn detail(&self, marker_id: i64) -> Option<MarkerDetail> {
        let marker = self.markers.iter().find(|m| m.id == marker_id)?;
        Some(MarkerDetail {
            marker_id: marker.id,
            author: marker
                .user_email
                .clone()
                .unwrap_or_else(|| format!("User #{}", marker.user_id)),
            created_at: marker.created_at,
            text: marker.text.clone(),
            image_url: marker
                .image_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .map(|url| self.api.config().resolve_asset(url)),
            coordinates: marker.coordinates(),
            status: marker.status,
        })
    }
}
