mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use pmap_client::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};

use pmap_client::map::{MapView, WorkflowState, pin_color};
use pmap_client::{ClientError, Notice, Notifier, ValidationError};
use pmap_types::Coordinates;

use common::Backend;

fn orenburg() -> Coordinates {
    Coordinates::new(51.7682, 55.097)
}

#[tokio::test]
async fn signed_out_click_creates_no_draft() {
    let api = common::api_for(&common::dead_origin());
    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    let mut view = MapView::new(api, common::signed_out(), notifier);

    let err = view.click(orenburg()).unwrap_err();
    assert!(matches!(err, ClientError::NotSignedIn));
    assert_eq!(view.state(), &WorkflowState::Idle);
    assert!(view.draft().is_none());
    assert_eq!(notices.try_recv().unwrap(), Notice::SignInRequired);
}

#[tokio::test]
async fn second_click_moves_the_draft_and_cancel_drops_it() {
    let api = common::api_for(&common::dead_origin());
    let (_, session) = common::stored_session("token");
    let mut view = MapView::new(api, session, Notifier::new());

    view.click(orenburg()).unwrap();
    assert!(view.set_text("Broken bench"));
    view.click(Coordinates::new(51.0, 55.0)).unwrap();

    let draft = view.draft().unwrap();
    assert_eq!(draft.coordinates, Coordinates::new(51.0, 55.0));
    assert_eq!(draft.text, "Broken bench");

    view.cancel();
    assert_eq!(view.state(), &WorkflowState::Idle);
    assert!(!view.set_text("too late"));
}

#[tokio::test]
async fn blank_text_is_rejected_locally() {
    let backend = Backend::spawn().await;
    let api = backend.api();
    let session = common::sign_up(&api, "ann@example.com").await;
    let mut view = MapView::mount(api.clone(), session, Notifier::new()).await.unwrap();

    view.click(orenburg()).unwrap();
    view.set_text("   \n");
    let err = view.submit().await.unwrap_err();

    assert!(matches!(err, ClientError::Validation(ValidationError::EmptyText)));
    assert!(matches!(view.state(), WorkflowState::AwaitingFormInput(_)));
    assert!(api.get_markers().await.unwrap().is_empty());
}

#[tokio::test]
async fn submit_uploads_image_then_creates_marker() {
    let backend = Backend::spawn().await;
    let api = backend.api();
    let session = common::sign_up(&api, "ann@example.com").await;
    let user = session.user().unwrap();
    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    let mut view = MapView::mount(api.clone(), session, notifier).await.unwrap();
    assert!(view.markers().is_empty());

    view.click(orenburg()).unwrap();
    view.set_text("  Pothole on the corner ");
    view.attach_image(common::png());
    let outcome = view.submit().await.unwrap();

    assert!(!outcome.image_skipped);
    assert_eq!(outcome.marker.text, "Pothole on the corner");
    assert_eq!(outcome.marker.user_id, user.id);
    let image_url = outcome.marker.image_url.clone().unwrap();
    assert!(image_url.starts_with("/uploads/"));

    assert_eq!(view.state(), &WorkflowState::Idle);
    assert_eq!(view.markers().len(), 1);
    assert_eq!(notices.try_recv().unwrap(), Notice::MarkerCreated { id: outcome.marker.id });

    let pins = view.pins();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].color, pin_color(user.id));
    assert_eq!(pins[0].coordinates, orenburg());

    let detail = view.detail(outcome.marker.id).unwrap();
    assert_eq!(detail.author, "ann@example.com");
    assert_eq!(detail.text, "Pothole on the corner");
    let absolute = detail.image_url.unwrap();
    assert_eq!(absolute, format!("{}{}", backend.origin, image_url));

    let served = reqwest::get(&absolute).await.unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.bytes().await.unwrap().to_vec(), common::png().bytes);
}

#[tokio::test]
async fn failed_upload_still_creates_one_marker_without_image() {
    // A regular file where the upload directory should be makes every upload fail.
    let blocker = std::env::temp_dir().join(format!("pmap_blocker_{}", uuid::Uuid::new_v4()));
    std::fs::write(&blocker, b"not a directory").unwrap();
    let backend = Backend::spawn_with_upload_dir(blocker).await;

    let api = backend.api();
    let session = common::sign_up(&api, "ann@example.com").await;
    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    let mut view = MapView::mount(api.clone(), session, notifier).await.unwrap();

    view.click(orenburg()).unwrap();
    view.set_text("Graffiti");
    view.attach_image(common::png());
    let outcome = view.submit().await.unwrap();

    assert!(outcome.image_skipped);
    assert_eq!(outcome.marker.image_url, None);
    assert_eq!(view.state(), &WorkflowState::Idle);

    let markers = api.get_markers().await.unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].image_url, None);

    assert!(matches!(notices.try_recv().unwrap(), Notice::ImageUploadSkipped(_)));
    assert_eq!(notices.try_recv().unwrap(), Notice::MarkerCreated { id: outcome.marker.id });
}

#[tokio::test]
async fn failed_creation_keeps_the_draft() {
    let stub = Router::new().route(
        "/api/markers",
        get(|| async { Json(json!([])) }).post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "database is locked" })),
            )
        }),
    );
    let api = common::api_for(&common::serve(stub).await);
    let (_, session) = common::stored_session("token");
    let mut view = MapView::mount(api, session.clone(), Notifier::new()).await.unwrap();

    view.click(orenburg()).unwrap();
    view.set_text("Fallen tree");
    let err = view.submit().await.unwrap_err();

    match err {
        ClientError::Http { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database is locked");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    let draft = view.draft().unwrap();
    assert_eq!(draft.text, "Fallen tree");
    assert_eq!(draft.coordinates, orenburg());
    assert!(session.is_signed_in());
}

#[tokio::test]
async fn expired_session_drops_the_draft() {
    let backend = Backend::spawn().await;
    let (storage, session) = common::stored_session("forged-or-expired");
    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    let mut view = MapView::mount(backend.api(), session.clone(), notifier).await.unwrap();

    view.click(orenburg()).unwrap();
    view.set_text("Flooded underpass");
    let err = view.submit().await.unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired));
    assert_eq!(view.state(), &WorkflowState::Idle);
    assert!(!session.is_signed_in());
    assert!(storage.get(TOKEN_KEY).is_none());
    assert_eq!(notices.try_recv().unwrap(), Notice::SessionExpired);
}

#[tokio::test]
async fn unmounted_view_ignores_late_marker_lists() {
    let backend = Backend::spawn().await;
    let api = backend.api();
    let session = common::sign_up(&api, "ann@example.com").await;
    let mut view = MapView::mount(api.clone(), session.clone(), Notifier::new()).await.unwrap();

    let request = pmap_types::api::CreateMarkerRequest {
        text: "Created elsewhere".into(),
        latitude: 51.0,
        longitude: 55.0,
        image_url: None,
        user_id: None,
    };
    api.create_marker(&session, &request).await.unwrap();

    let lifecycle = view.lifecycle();
    lifecycle.unmount();
    assert!(!view.reload().await.unwrap());
    assert!(view.markers().is_empty());
}

fn created_marker(image_url: &str) -> serde_json::Value {
    json!({
        "id": 1,
        "user_id": 1,
        "text": "Broken swing",
        "latitude": 51.7682,
        "longitude": 55.097,
        "image_url": image_url,
        "status": "pending",
        "created_at": "2024-05-01T10:00:00Z"
    })
}

#[tokio::test]
async fn retry_after_failed_creation_reuses_uploaded_image() {
    let uploads = Arc::new(AtomicUsize::new(0));
    let creates = Arc::new(AtomicUsize::new(0));
    let (upload_hits, create_hits) = (uploads.clone(), creates.clone());

    let stub = Router::new()
        .route(
            "/api/upload",
            post(move || {
                let hits = upload_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "image_url": "/uploads/abc_swing.png" }))
                }
            }),
        )
        .route(
            "/api/markers",
            get(|| async { Json(json!([])) }).post(move || {
                let hits = create_hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "try again" }))).into_response()
                    } else {
                        (StatusCode::CREATED, Json(created_marker("/uploads/abc_swing.png"))).into_response()
                    }
                }
            }),
        );
    let api = common::api_for(&common::serve(stub).await);
    let (_, session) = common::stored_session("token");
    let mut view = MapView::mount(api, session, Notifier::new()).await.unwrap();

    view.click(orenburg()).unwrap();
    view.set_text("Broken swing");
    view.attach_image(common::png());

    let err = view.submit().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    let draft = view.draft().unwrap();
    assert_eq!(draft.text, "Broken swing");
    assert_eq!(draft.uploaded_image_url.as_deref(), Some("/uploads/abc_swing.png"));

    let outcome = view.submit().await.unwrap();
    assert!(!outcome.image_skipped);
    assert_eq!(outcome.marker.image_url.as_deref(), Some("/uploads/abc_swing.png"));
    assert_eq!(view.state(), &WorkflowState::Idle);

    assert_eq!(uploads.load(Ordering::SeqCst), 1);
    assert_eq!(creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_upload_token_ends_the_submit() {
    let creates = Arc::new(AtomicUsize::new(0));
    let create_hits = creates.clone();

    let stub = Router::new()
        .route(
            "/api/upload",
            post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid token" }))) }),
        )
        .route(
            "/api/markers",
            get(|| async { Json(json!([])) }).post(move || {
                let hits = create_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::CREATED, Json(created_marker("")))
                }
            }),
        );
    let api = common::api_for(&common::serve(stub).await);
    let (storage, session) = common::stored_session("stale-token");
    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    let mut view = MapView::mount(api, session.clone(), notifier).await.unwrap();

    view.click(orenburg()).unwrap();
    view.set_text("Overflowing bin");
    view.attach_image(common::png());
    let err = view.submit().await.unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired));
    assert_eq!(view.state(), &WorkflowState::Idle);
    assert!(!session.is_signed_in());
    assert_eq!(storage.get(USER_KEY), None);
    assert_eq!(storage.get(TOKEN_KEY), None);
    assert_eq!(creates.load(Ordering::SeqCst), 0);
    assert_eq!(notices.try_recv().unwrap(), Notice::SessionExpired);
}

#[tokio::test]
async fn abandoned_submit_hands_the_draft_back() {
    let stub = Router::new().route(
        "/api/markers",
        get(|| async { Json(json!([])) }).post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (StatusCode::CREATED, Json(created_marker("")))
        }),
    );
    let api = common::api_for(&common::serve(stub).await);
    let (_, session) = common::stored_session("token");
    let mut view = MapView::mount(api, session, Notifier::new()).await.unwrap();

    view.click(orenburg()).unwrap();
    view.set_text("Stuck gate");
    let timed_out = tokio::time::timeout(Duration::from_millis(200), view.submit()).await;
    assert!(timed_out.is_err());

    let draft = view.draft().unwrap();
    assert_eq!(draft.text, "Stuck gate");
    assert_eq!(draft.coordinates, orenburg());

    view.cancel();
    assert_eq!(view.state(), &WorkflowState::Idle);
    view.click(orenburg()).unwrap();
    assert!(matches!(view.state(), WorkflowState::AwaitingFormInput(_)));
}
