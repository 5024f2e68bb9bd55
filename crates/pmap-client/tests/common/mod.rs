#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use pmap_api::auth::AppStateInner;
use pmap_client::forms::RegisterForm;
use pmap_client::storage::{KeyValueStore, MemoryStorage, TOKEN_KEY, USER_KEY};
use pmap_client::{ApiClient, AuthStore, ClientConfig};
use pmap_db::Database;

pub const PASSWORD: &str = "secret123";

pub const STORED_USER: &str =
    r#"{"id":1,"email":"ann@example.com","created_at":"2024-05-01T10:00:00Z"}"#;

pub struct Backend {
    pub origin: String,
    pub state: Arc<AppStateInner>,
}

impl Backend {
    pub async fn spawn() -> Self {
        let upload_dir = std::env::temp_dir().join(format!("pmap_client_test_{}", uuid::Uuid::new_v4()));
        Self::spawn_with_upload_dir(upload_dir).await
    }

    pub async fn spawn_with_upload_dir(upload_dir: PathBuf) -> Self {
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "client-test-secret".into(),
            upload_dir,
        });
        let origin = serve(pmap_api::router(state.clone())).await;
        Self { origin, state }
    }

    pub fn api(&self) -> ApiClient {
        api_for(&self.origin)
    }
}

/// Serve any router on a loopback port and return its origin.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// An origin nothing is listening on.
pub fn dead_origin() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn api_for(origin: &str) -> ApiClient {
    ApiClient::new(ClientConfig::new(&format!("{}/api", origin)).unwrap()).unwrap()
}

pub fn signed_out() -> Arc<AuthStore> {
    Arc::new(AuthStore::load(Arc::new(MemoryStorage::new())))
}

/// A session restored from storage, without asking any server.
pub fn stored_session(token: &str) -> (Arc<MemoryStorage>, Arc<AuthStore>) {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(USER_KEY, STORED_USER).unwrap();
    storage.set(TOKEN_KEY, token).unwrap();
    let session = Arc::new(AuthStore::load(storage.clone()));
    assert!(session.is_signed_in());
    (storage, session)
}

pub async fn sign_up(api: &ApiClient, email: &str) -> Arc<AuthStore> {
    let session = signed_out();
    let form = RegisterForm {
        email: email.into(),
        password: PASSWORD.into(),
        repeat_password: PASSWORD.into(),
    };
    form.submit(api, &session).await.unwrap();
    session
}

pub fn png() -> pmap_client::ImageAttachment {
    pmap_client::ImageAttachment::new("pot hole.png", "image/png", vec![0x89, b'P', b'N', b'G', 7, 7, 7]).unwrap()
}
