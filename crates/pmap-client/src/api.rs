use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use pmap_types::api::{
    CommentsResponse, CreateCommentRequest, CreateMarkerRequest, LoginRequest, LoginResponse,
    ProfileResponse, RegisterRequest, RegisterResponse, UploadResponse,
};
use pmap_types::{Comment, Marker, User};

use crate::auth::AuthStore;
use crate::config::ClientConfig;
use crate::error::{ClientError, ValidationError};
use crate::map::ImageAttachment;

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterOutcome {
    pub status: String,
    pub message: Option<String>,
    pub user: Option<User>,
}

/// Marker listings come either wrapped or as a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum MarkerList {
    Envelope { markers: Vec<Marker> },
    Bare(Vec<Marker>),
}

/// Thin typed wrapper over the backend's HTTP routes. One request per call,
/// no retries.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<RegisterOutcome, ClientError> {
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = self.http.post(self.config.endpoint("/register")).json(&body);
        let (status, text) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }

        let envelope: RegisterResponse = decode(&text)?;
        if let Some(error) = envelope.error {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: error,
            });
        }

        // Servers that skip the envelope status still mean success on 2xx.
        let outcome_status = envelope.status.unwrap_or_else(|| "success".to_string());
        if outcome_status != "success" {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: envelope.message.unwrap_or(outcome_status),
            });
        }

        Ok(RegisterOutcome {
            status: outcome_status,
            message: envelope.message,
            user: envelope.user,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = self.http.post(self.config.endpoint("/login")).json(&body);
        let (status, text) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        decode(&text)
    }

    /// Best effort. Callers sign out locally whatever this returns.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), ClientError> {
        let mut request = self.http.post(self.config.endpoint("/logout"));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let (status, text) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        Ok(())
    }

    pub async fn get_markers(&self) -> Result<Vec<Marker>, ClientError> {
        let request = self.http.get(self.config.endpoint("/markers"));
        let (status, text) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }

        match decode::<MarkerList>(&text)? {
            MarkerList::Envelope { markers } | MarkerList::Bare(markers) => Ok(markers),
        }
    }

    pub async fn create_marker(
        &self,
        session: &AuthStore,
        marker: &CreateMarkerRequest,
    ) -> Result<Marker, ClientError> {
        let token = session.token().ok_or(ClientError::NotSignedIn)?;
        let request = self
            .http
            .post(self.config.endpoint("/markers"))
            .bearer_auth(token)
            .json(marker);
        self.authorized(session, request).await
    }

    /// Upload one image as multipart field `image`. The token is attached
    /// when there is one; anonymous uploads are allowed by the server.
    pub async fn upload_image(
        &self,
        session: &AuthStore,
        image: &ImageAttachment,
    ) -> Result<UploadResponse, ClientError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|_| ClientError::Validation(ValidationError::NotAnImage))?;
        let form = Form::new().part("image", part);

        let request = self.http.post(self.config.endpoint("/upload")).multipart(form);
        match session.token() {
            Some(token) => self.authorized(session, request.bearer_auth(token)).await,
            None => {
                let (status, text) = self.send(request).await?;
                if !status.is_success() {
                    return Err(http_error(status, &text));
                }
                decode(&text)
            }
        }
    }

    pub async fn get_profile(&self, session: &AuthStore) -> Result<ProfileResponse, ClientError> {
        let token = session.token().ok_or(ClientError::NotSignedIn)?;
        let request = self.http.get(self.config.endpoint("/profile")).bearer_auth(token);
        self.authorized(session, request).await
    }

    pub async fn delete_marker(&self, session: &AuthStore, marker_id: i64) -> Result<(), ClientError> {
        let token = session.token().ok_or(ClientError::NotSignedIn)?;
        let request = self
            .http
            .delete(self.config.endpoint(&format!("/markers/{}", marker_id)))
            .bearer_auth(token);
        let _: Value = self.authorized(session, request).await?;
        Ok(())
    }

    pub async fn get_comments(&self, marker_id: i64) -> Result<Vec<Comment>, ClientError> {
        let request = self
            .http
            .get(self.config.endpoint(&format!("/markers/{}/comments", marker_id)));
        let (status, text) = self.send(request).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        decode::<CommentsResponse>(&text).map(|r| r.comments)
    }

    pub async fn add_comment(
        &self,
        session: &AuthStore,
        marker_id: i64,
        text: &str,
    ) -> Result<Comment, ClientError> {
        if text.trim().is_empty() {
            return Err(ValidationError::Required("Comment").into());
        }
        let token = session.token().ok_or(ClientError::NotSignedIn)?;
        let request = self
            .http
            .post(self.config.endpoint(&format!("/markers/{}/comments", marker_id)))
            .bearer_auth(token)
            .json(&CreateCommentRequest {
                text: text.to_string(),
            });
        self.authorized(session, request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), ClientError> {
        let response: Response = request.send().await?;
        let status = response.status();
        debug!("{} -> {}", response.url().path(), status);
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Send a request that carried the session token. A 401 means the server
    /// no longer honours it, so the session is cleared before reporting.
    async fn authorized<T: DeserializeOwned>(
        &self,
        session: &AuthStore,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let (status, text) = self.send(request).await?;
        if status == StatusCode::UNAUTHORIZED {
            warn!("Server rejected the session token: {}", error_message(status, &text));
            session.expire();
            return Err(ClientError::SessionExpired);
        }
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        decode(&text)
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ClientError> {
    serde_json::from_str(text).map_err(|e| ClientError::Decode(e.to_string()))
}

fn http_error(status: StatusCode, body: &str) -> ClientError {
    ClientError::Http {
        status: status.as_u16(),
        message: error_message(status, body),
    }
}

/// Pull the most useful message out of an error body: the JSON `error` (or
/// `message`) field, otherwise the raw text, otherwise the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }

    if !body.is_empty() {
        return body.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}
