use std::path::PathBuf;

use crate::error::LyraError;

pub const DEFAULT_SESSION_KEY: &str = "lyra_os_session";
pub const DEFAULT_DRIVE_FILE_NAME: &str = "lyra_session.json";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TRIGGER_TOKEN: &str = "LYRA_CREATE";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000";

/// Runtime configuration for a LYRA_OS host
#[derive(Debug, Clone)]
pub struct LyraConfig {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Namespace key of the local session entry
    pub session_key: String,
    pub drive_file_name: String,
    pub gemini_model: String,
    /// Case-insensitive token that routes a submit to the artifact path
    pub trigger_token: String,
    pub oauth_client_id: Option<String>,
    pub oauth_redirect_uri: String,
    /// Used only when no key has been saved in settings
    pub gemini_api_key: Option<String>,
}

impl LyraConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            log_dir: data_dir.join("logs"),
            data_dir,
            session_key: DEFAULT_SESSION_KEY.to_string(),
            drive_file_name: DEFAULT_DRIVE_FILE_NAME.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            trigger_token: DEFAULT_TRIGGER_TOKEN.to_string(),
            oauth_client_id: None,
            oauth_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            gemini_api_key: None,
        }
    }

    /// Platform defaults with environment overrides
    pub fn from_env() -> Result<Self, LyraError> {
        let data_dir = match env_var("LYRA_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| LyraError::Config("Failed to resolve platform data dir".to_string()))?
                .join("lyra"),
        };

        let mut config = Self::with_data_dir(data_dir);

        if let Some(dir) = env_var("LYRA_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(model) = env_var("LYRA_GEMINI_MODEL") {
            config.gemini_model = model;
        }
        if let Some(trigger) = env_var("LYRA_TRIGGER") {
            config.trigger_token = trigger;
        }
        if let Some(uri) = env_var("GOOGLE_REDIRECT_URI") {
            config.oauth_redirect_uri = uri;
        }
        config.oauth_client_id = env_var("GOOGLE_CLIENT_ID");
        config.gemini_api_key = env_var("GEMINI_API_KEY");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LyraError> {
        if self.trigger_token.trim().is_empty() {
            return Err(LyraError::Config("Trigger token must not be empty".to_string()));
        }
        if self.session_key.trim().is_empty() {
            return Err(LyraError::Config("Session key must not be empty".to_string()));
        }
        if self.drive_file_name.trim().is_empty() {
            return Err(LyraError::Config("Drive file name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("lyra.db")
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_rooted_at_data_dir() {
        let config = LyraConfig::with_data_dir("/tmp/lyra-test");
        assert_eq!(config.log_dir, PathBuf::from("/tmp/lyra-test/logs"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/lyra-test/lyra.db"));
        assert_eq!(config.trigger_token, "LYRA_CREATE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_trigger_is_rejected() {
        let mut config = LyraConfig::with_data_dir("/tmp/lyra-test");
        config.trigger_token = "  ".to_string();
        assert!(matches!(config.validate(), Err(LyraError::Config(_))));
    }
}
