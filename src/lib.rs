mod auth;
mod backend;
mod cloud;
mod config;
mod conversation;
mod db;
mod drive;
mod emotion;
mod error;
mod gemini;
mod local_store;
pub mod logging;
mod models;
mod persona;
mod session;

#[cfg(test)]
mod testing;

pub use auth::{AuthCallback, AuthorizationProvider, ImplicitGrantAuth};
pub use backend::CompanionBackend;
pub use cloud::{BestEffortChannel, CloudStore};
pub use config::LyraConfig;
pub use conversation::{is_artifact_request, TurnOutcome};
pub use db::{Database, Settings};
pub use drive::DriveStore;
pub use emotion::EmotionalState;
pub use error::{BackendError, ConnectionError, LyraError, PersistenceError};
pub use gemini::GeminiClient;
pub use local_store::{KeyValueStore, LocalStore, MemoryStore};
pub use models::{ArtifactMetadata, CreateResult, Message, Role, SessionDocument};
pub use session::{SessionController, SessionView, SyncOutcome};

use std::sync::Arc;

/// Host-facing command surface of LYRA_OS.
///
/// Owns the device database, the drive authorization, the Gemini client and
/// the session controller. Build it inside a tokio runtime.
pub struct LyraApp {
    config: LyraConfig,
    db: Arc<Database>,
    auth: Arc<ImplicitGrantAuth>,
    gemini: Arc<GeminiClient>,
    controller: SessionController,
}

impl LyraApp {
    pub fn init(config: LyraConfig) -> Result<Self, LyraError> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        if let Err(e) = logging::init_logging(&config.log_dir) {
            eprintln!("Failed to initialize logging: {}", e);
        }

        // Clean up old log files (keep last 7 days)
        let _ = logging::cleanup_old_logs();

        let db = Arc::new(Database::open(&config.db_path())?);

        let api_key = db
            .get_settings()
            .ok()
            .and_then(|s| s.gemini_api_key)
            .or_else(|| config.gemini_api_key.clone());
        let gemini = Arc::new(GeminiClient::new(api_key, config.gemini_model.clone()));

        let auth = Arc::new(ImplicitGrantAuth::new(
            config.oauth_client_id.clone().unwrap_or_default(),
            config.oauth_redirect_uri.clone(),
        ));
        let drive = Arc::new(DriveStore::new(auth.clone(), config.drive_file_name.clone()));

        let local = LocalStore::new(db.clone(), config.session_key.clone());
        let controller = SessionController::start(local, drive, gemini.clone(), config.trigger_token.clone());

        logging::log_session(None, "LYRA_OS initialized");

        Ok(Self {
            config,
            db,
            auth,
            gemini,
            controller,
        })
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    // ============ Session ============

    pub fn get_session(&self) -> SessionView {
        self.controller.view()
    }

    pub async fn send_message(&self, text: &str) -> TurnOutcome {
        self.controller.submit(text).await
    }

    pub fn close_artifact(&self) {
        self.controller.close_artifact();
    }

    /// Destructive: only acts when the user confirmed
    pub fn reset_signal(&self, confirmed: bool) -> bool {
        self.controller.reset(confirmed)
    }

    // ============ Cloud Drive ============

    /// Start drive authorization and return the consent URL to open
    pub fn connect_drive(&self) -> Result<String, String> {
        if self.config.oauth_client_id.is_none() {
            return Err("Google client id not configured".to_string());
        }
        self.controller.connect_cloud();
        self.auth
            .consent_url()
            .ok_or_else(|| "Failed to build consent URL".to_string())
    }

    /// Hand back the OAuth redirect; a granted token kicks off a sync
    pub fn complete_drive_auth(&self, redirect_url: &str) -> bool {
        self.auth.complete_from_redirect(redirect_url)
    }

    pub fn cancel_drive_auth(&self) {
        self.auth.cancel();
    }

    pub fn is_drive_connected(&self) -> bool {
        self.auth.is_granted()
    }

    pub async fn sync_now(&self) -> SyncOutcome {
        self.controller.sync_with_cloud().await
    }

    // ============ Settings ============

    pub fn save_api_key(&self, api_key: &str) -> Result<(), String> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err("API key must not be empty".to_string());
        }
        self.db.update_api_key(api_key).map_err(|e| e.to_string())?;
        self.gemini.set_api_key(Some(api_key.to_string()));
        Ok(())
    }

    pub fn remove_api_key(&self) -> Result<(), String> {
        self.db.clear_api_key().map_err(|e| e.to_string())?;
        self.gemini.set_api_key(None);
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.gemini.has_api_key()
    }

    // ============ Shutdown ============

    /// Let queued best-effort cloud writes settle
    pub async fn shutdown(&self) {
        self.controller.flush_cloud().await;
        logging::log_session(None, "LYRA_OS shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> LyraConfig {
        LyraConfig::with_data_dir(dir.join("data"))
    }

    #[tokio::test]
    async fn test_init_seeds_and_persists_to_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let app = LyraApp::init(config(dir.path())).unwrap();

        let view = app.get_session();
        assert_eq!(view.messages.len(), 1);
        assert!(!view.cloud_connected);
        assert!(dir.path().join("data/lyra.db").exists());
    }

    #[tokio::test]
    async fn test_missing_api_key_yields_fallback_turn() {
        let dir = tempfile::tempdir().unwrap();
        let app = LyraApp::init(config(dir.path())).unwrap();
        assert!(!app.has_api_key());

        assert_eq!(app.send_message("oi").await, TurnOutcome::Fallback);

        let view = app.get_session();
        assert_eq!(view.messages.len(), 3);
        assert!(!view.is_processing);
    }

    #[tokio::test]
    async fn test_session_and_api_key_survive_restart() {
        let dir = tempfile::tempdir().unwrap();

        {
            let app = LyraApp::init(config(dir.path())).unwrap();
            app.save_api_key("  secret  ").unwrap();
            app.remove_api_key().unwrap();
            app.save_api_key("secret").unwrap();
            app.reset_signal(true);
        }

        let app = LyraApp::init(config(dir.path())).unwrap();
        assert!(app.has_api_key());
        assert_eq!(app.get_session().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_api_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = LyraApp::init(config(dir.path())).unwrap();
        assert!(app.save_api_key("   ").is_err());
    }

    #[tokio::test]
    async fn test_connect_drive_requires_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let app = LyraApp::init(config(dir.path())).unwrap();
        assert!(app.connect_drive().is_err());

        let mut with_client = config(dir.path());
        with_client.data_dir = dir.path().join("other");
        with_client.oauth_client_id = Some("client-1".to_string());
        let app = LyraApp::init(with_client).unwrap();

        let url = app.connect_drive().unwrap();
        assert!(url.contains("client_id=client-1"));
        assert!(!app.is_drive_connected());

        app.cancel_drive_auth();
        assert_eq!(app.sync_now().await, SyncOutcome::Skipped);
    }
}
