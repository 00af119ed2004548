//! Google Drive client for the session mirror.
//!
//! The document lives as a single JSON file in the hidden `appDataFolder`
//! space of the authorized account.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::{AuthCallback, AuthorizationProvider};
use crate::cloud::CloudStore;
use crate::error::ConnectionError;
use crate::logging;
use crate::models::SessionDocument;

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DriveErrorWrapper {
    error: DriveErrorBody,
}

#[derive(Debug, Deserialize)]
struct DriveErrorBody {
    message: String,
}

pub struct DriveStore {
    http: Client,
    auth: Arc<dyn AuthorizationProvider>,
    file_name: String,
    file_id: Mutex<Option<String>>,
}

impl DriveStore {
    pub fn new(auth: Arc<dyn AuthorizationProvider>, file_name: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            auth,
            file_name: file_name.into(),
            file_id: Mutex::new(None),
        }
    }

    fn token(&self) -> Result<String, ConnectionError> {
        self.auth.access_token().ok_or(ConnectionError::NotAuthenticated)
    }

    fn cached_file_id(&self) -> Option<String> {
        self.file_id.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn cache_file_id(&self, id: Option<String>) {
        *self.file_id.lock().unwrap_or_else(|p| p.into_inner()) = id;
    }

    async fn check(response: Response) -> Result<Response, ConnectionError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<DriveErrorWrapper>(&error_text)
            .map(|w| w.error.message)
            .unwrap_or(error_text);

        Err(ConnectionError::Api { status, message })
    }

    /// Locate the session file, using the cached id when known
    async fn find_file_id(&self, token: &str) -> Result<Option<String>, ConnectionError> {
        if let Some(id) = self.cached_file_id() {
            return Ok(Some(id));
        }

        let query = format!("name = '{}' and trashed = false", self.file_name.replace('\'', "\\'"));
        let response = self.http
            .get(format!("{}/files", DRIVE_API_BASE))
            .bearer_auth(token)
            .query(&[
                ("spaces", "appDataFolder"),
                ("q", query.as_str()),
                ("fields", "files(id)"),
                ("pageSize", "1"),
            ])
            .send()
            .await?;

        let list: FileList = Self::check(response).await?.json().await?;
        let id = list.files.into_iter().next().map(|f| f.id);
        if id.is_some() {
            self.cache_file_id(id.clone());
        }
        Ok(id)
    }

    async fn create_file(&self, token: &str) -> Result<String, ConnectionError> {
        let response = self.http
            .post(format!("{}/files", DRIVE_API_BASE))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&json!({
                "name": self.file_name,
                "parents": ["appDataFolder"],
                "mimeType": "application/json",
            }))
            .send()
            .await?;

        let file: DriveFile = Self::check(response).await?.json().await?;
        self.cache_file_id(Some(file.id.clone()));
        logging::log_sync(None, &format!("Created Drive session file {}", file.id));
        Ok(file.id)
    }

    async fn upload(&self, token: &str, file_id: &str, body: String) -> Result<(), ConnectionError> {
        let response = self.http
            .patch(format!("{}/files/{}", DRIVE_UPLOAD_BASE, file_id))
            .bearer_auth(token)
            .query(&[("uploadType", "media")])
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CloudStore for DriveStore {
    fn is_authenticated(&self) -> bool {
        self.auth.is_granted()
    }

    fn init_auth(&self, on_success: AuthCallback) {
        self.auth.init(on_success);
    }

    fn request_token(&self) {
        self.auth.request_token();
    }

    fn sign_out(&self) {
        self.auth.sign_out();
        self.cache_file_id(None);
    }

    async fn load(&self) -> Result<Option<SessionDocument>, ConnectionError> {
        let token = self.token()?;
        let Some(file_id) = self.find_file_id(&token).await? else {
            return Ok(None);
        };

        let response = self.http
            .get(format!("{}/files/{}", DRIVE_API_BASE, file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            self.cache_file_id(None);
            return Ok(None);
        }

        let text = Self::check(response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn save(&self, doc: &SessionDocument) -> Result<(), ConnectionError> {
        let token = self.token()?;
        let body = serde_json::to_string(doc)?;

        let file_id = match self.find_file_id(&token).await? {
            Some(id) => id,
            None => self.create_file(&token).await?,
        };

        match self.upload(&token, &file_id, body.clone()).await {
            // Cached id went stale (file deleted elsewhere): recreate once
            Err(ConnectionError::Api { status: 404, .. }) => {
                self.cache_file_id(None);
                let file_id = self.create_file(&token).await?;
                self.upload(&token, &file_id, body).await
            }
            other => other,
        }
    }
}
