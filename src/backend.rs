use async_trait::async_trait;

use crate::error::BackendError;
use crate::models::{CreateResult, Message};

/// Generative collaborator behind the conversation engine
#[async_trait]
pub trait CompanionBackend: Send + Sync {
    /// Conversational reply given the prior history and the new user text
    async fn send_reply(&self, history: &[Message], new_text: &str) -> Result<String, BackendError>;

    /// Structured creative artifact for a prompt containing the trigger token
    async fn generate_artifact(&self, prompt: &str) -> Result<CreateResult, BackendError>;
}
