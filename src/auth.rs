//! Authorization collaborator for the cloud drive (OAuth implicit grant).
//!
//! The consent step happens outside this crate: the host opens the consent
//! URL and hands the redirect (or the bare token) back through `complete*`.

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use std::sync::Mutex;

use crate::logging;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DRIVE_APPDATA_SCOPE: &str = "https://www.googleapis.com/auth/drive.appdata";

/// Invoked once when a token has been granted
pub type AuthCallback = Box<dyn FnOnce() + Send + 'static>;

pub trait AuthorizationProvider: Send + Sync {
    /// Register the callback for the next successful grant
    fn init(&self, on_granted: AuthCallback);
    /// Start the interactive consent step
    fn request_token(&self);
    fn is_granted(&self) -> bool;
    fn access_token(&self) -> Option<String>;
    /// Forget the granted token and any pending callback
    fn sign_out(&self);
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_valid(&self) -> bool {
        self.expires_at.map(|at| Utc::now() < at).unwrap_or(true)
    }
}

#[derive(Default)]
struct AuthState {
    token: Option<AccessToken>,
    pending: Option<AuthCallback>,
    consent_url: Option<String>,
}

pub struct ImplicitGrantAuth {
    client_id: String,
    redirect_uri: String,
    scope: String,
    state: Mutex<AuthState>,
}

impl ImplicitGrantAuth {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: DRIVE_APPDATA_SCOPE.to_string(),
            state: Mutex::new(AuthState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Consent URL for the implicit (token) flow
    pub fn build_consent_url(&self) -> Option<String> {
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "token"),
                ("scope", self.scope.as_str()),
                ("include_granted_scopes", "true"),
            ],
        )
        .ok()
        .map(String::from)
    }

    /// Last consent URL produced by `request_token`
    pub fn consent_url(&self) -> Option<String> {
        self.lock().consent_url.clone()
    }

    /// Store a granted token and fire the pending callback
    pub fn complete(&self, access_token: impl Into<String>, expires_in_secs: Option<i64>) {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            self.cancel();
            return;
        }

        let callback = {
            let mut state = self.lock();
            state.token = Some(AccessToken {
                value: access_token,
                expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            });
            state.pending.take()
        };

        logging::log_sync(None, "Drive authorization granted");

        // Outside the lock: the callback may query this provider
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Complete from a redirect URL carrying `#access_token=..&expires_in=..`.
    /// An `error` fragment or a missing token cancels the pending grant.
    pub fn complete_from_redirect(&self, redirect_url: &str) -> bool {
        let fragment = match Url::parse(redirect_url) {
            Ok(url) => url.fragment().unwrap_or_default().to_string(),
            Err(_) => redirect_url.trim_start_matches('#').to_string(),
        };

        let mut token = None;
        let mut expires_in = None;
        let mut error = None;

        if let Ok(parsed) = Url::parse(&format!("http://redirect/?{}", fragment)) {
            for (key, value) in parsed.query_pairs() {
                match key.as_ref() {
                    "access_token" => token = Some(value.into_owned()),
                    "expires_in" => expires_in = value.parse::<i64>().ok(),
                    "error" => error = Some(value.into_owned()),
                    _ => {}
                }
            }
        }

        match (token, error) {
            (Some(token), None) => {
                self.complete(token, expires_in);
                true
            }
            (_, error) => {
                logging::log_error(None, &format!(
                    "Drive authorization failed: {}",
                    error.unwrap_or_else(|| "no access token in redirect".to_string())
                ));
                self.cancel();
                false
            }
        }
    }

    /// Drop the pending callback without invoking it (denied or cancelled)
    pub fn cancel(&self) {
        self.lock().pending = None;
    }

    pub fn revoke(&self) {
        let mut state = self.lock();
        state.token = None;
        state.pending = None;
    }
}

impl AuthorizationProvider for ImplicitGrantAuth {
    fn init(&self, on_granted: AuthCallback) {
        self.lock().pending = Some(on_granted);
    }

    fn request_token(&self) {
        let url = self.build_consent_url();
        match &url {
            Some(url) => logging::log_sync(None, &format!("Drive consent requested: {}", url)),
            None => logging::log_error(None, "Drive consent URL could not be built"),
        }
        self.lock().consent_url = url;
    }

    fn is_granted(&self) -> bool {
        self.lock().token.as_ref().map(AccessToken::is_valid).unwrap_or(false)
    }

    fn access_token(&self) -> Option<String> {
        self.lock()
            .token
            .as_ref()
            .filter(|t| t.is_valid())
            .map(|t| t.value.clone())
    }

    fn sign_out(&self) {
        self.revoke();
        logging::log_sync(None, "Drive authorization dropped");
    }
}
