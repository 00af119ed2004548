use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::auth::AuthCallback;
use crate::error::ConnectionError;
use crate::logging;
use crate::models::SessionDocument;

/// Remote, user-authorized mirror of the session document
#[async_trait]
pub trait CloudStore: Send + Sync {
    /// Cached token presence; never touches the network
    fn is_authenticated(&self) -> bool;

    /// Begin authorization; `on_success` runs once, and only on success
    fn init_auth(&self, on_success: AuthCallback);

    /// Trigger the interactive consent step
    fn request_token(&self);

    /// Drop the authorization; later reads and writes fail as unauthenticated
    fn sign_out(&self);

    async fn load(&self) -> Result<Option<SessionDocument>, ConnectionError>;

    async fn save(&self, doc: &SessionDocument) -> Result<(), ConnectionError>;
}

enum Command {
    Write(SessionDocument),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget cloud writes.
///
/// One worker drains the queue in order; failures are logged and dropped,
/// never retried and never reported back to the sender.
#[derive(Clone)]
pub struct BestEffortChannel {
    tx: mpsc::UnboundedSender<Command>,
}

impl BestEffortChannel {
    /// Must be called from within a tokio runtime
    pub fn spawn(cloud: Arc<dyn CloudStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Write(doc) => {
                        if let Err(e) = cloud.save(&doc).await {
                            logging::log_sync(None, &format!("Cloud write discarded: {}", e));
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx }
    }

    pub fn send(&self, doc: SessionDocument) {
        if self.tx.send(Command::Write(doc)).is_err() {
            logging::log_sync(None, "Cloud writer stopped; write dropped");
        }
    }

    /// Wait until every write queued before this call has settled
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionalState;
    use crate::models::Message;
    use crate::testing::MockCloud;

    fn doc(text: &str) -> SessionDocument {
        SessionDocument::new(vec![Message::user(text)], EmotionalState::default())
    }

    #[tokio::test]
    async fn test_writes_are_applied_in_order() {
        let cloud = Arc::new(MockCloud::authenticated());
        let channel = BestEffortChannel::spawn(cloud.clone());

        channel.send(doc("first"));
        channel.send(doc("second"));
        channel.flush().await;

        assert_eq!(cloud.save_count(), 2);
        assert_eq!(cloud.stored().unwrap().messages[0].text, "second");
    }

    #[tokio::test]
    async fn test_failures_are_swallowed_and_worker_keeps_running() {
        let cloud = Arc::new(MockCloud::authenticated());
        cloud.fail_saves(true);
        let channel = BestEffortChannel::spawn(cloud.clone());

        channel.send(doc("lost"));
        channel.flush().await;
        assert!(cloud.stored().is_none());

        cloud.fail_saves(false);
        channel.send(doc("kept"));
        channel.flush().await;
        assert_eq!(cloud.stored().unwrap().messages[0].text, "kept");
        assert_eq!(cloud.save_count(), 2);
    }
}
