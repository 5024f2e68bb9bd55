use pmap_types::{Marker, MarkerStatus, User};

use crate::api::ApiClient;
use crate::auth::AuthStore;
use crate::error::ClientError;

pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub user: User,
    pub total: usize,
    pub pending: usize,
    pub resolved: usize,
    /// Newest first, at most `RECENT_LIMIT`.
    pub recent: Vec<Marker>,
}

/// Derive the profile page from the full marker list.
pub fn summarize(user: &User, markers: &[Marker]) -> ProfileSummary {
    let mut own: Vec<&Marker> = markers.iter().filter(|m| m.user_id == user.id).collect();

    let count = |status: MarkerStatus| own.iter().filter(|m| m.status == Some(status)).count();
    let pending = count(MarkerStatus::Pending);
    let resolved = count(MarkerStatus::Resolved);

    own.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    ProfileSummary {
        user: user.clone(),
        total: own.len(),
        pending,
        resolved,
        recent: own.into_iter().take(RECENT_LIMIT).cloned().collect(),
    }
}

/// Fetch markers and summarize them for whoever is signed in.
pub async fn load(api: &ApiClient, session: &AuthStore) -> Result<ProfileSummary, ClientError> {
    let user = session.user().ok_or(ClientError::NotSignedIn)?;
    let markers = api.get_markers().await?;
    Ok(summarize(&user, &markers))
}
