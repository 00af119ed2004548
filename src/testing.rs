//! Test doubles for the external collaborators

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::auth::AuthCallback;
use crate::backend::CompanionBackend;
use crate::cloud::CloudStore;
use crate::error::{BackendError, ConnectionError, PersistenceError};
use crate::local_store::{KeyValueStore, LocalStore};
use crate::models::{ArtifactMetadata, CreateResult, Message, SessionDocument};
use crate::session::SessionController;

pub const TRIGGER: &str = "LYRA_CREATE";

pub fn controller_with(
    local: LocalStore,
    cloud: Arc<dyn CloudStore>,
    backend: Arc<dyn CompanionBackend>,
) -> SessionController {
    SessionController::start_with_rng(local, cloud, backend, TRIGGER, StdRng::seed_from_u64(2024))
}

/// Key-value store whose every operation fails
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
        Err(PersistenceError::Unavailable("disk gone".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("disk gone".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("disk gone".to_string()))
    }
}

#[derive(Default)]
pub struct MockCloud {
    authenticated: AtomicBool,
    remote: Mutex<Option<SessionDocument>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
    token_requests: AtomicUsize,
    pending: Mutex<Option<AuthCallback>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        let cloud = Self::default();
        cloud.authenticated.store(true, Ordering::SeqCst);
        cloud
    }

    pub fn set_remote(&self, doc: Option<SessionDocument>) {
        *self.remote.lock().unwrap() = doc;
    }

    pub fn stored(&self) -> Option<SessionDocument> {
        self.remote.lock().unwrap().clone()
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Save attempts, failed ones included
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn grant(&self) {
        self.authenticated.store(true, Ordering::SeqCst);
        let callback = self.pending.lock().unwrap().take();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn deny(&self) {
        self.pending.lock().unwrap().take();
    }
}

#[async_trait]
impl CloudStore for MockCloud {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn init_auth(&self, on_success: AuthCallback) {
        *self.pending.lock().unwrap() = Some(on_success);
    }

    fn request_token(&self) {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn sign_out(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        self.pending.lock().unwrap().take();
    }

    async fn load(&self) -> Result<Option<SessionDocument>, ConnectionError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.is_authenticated() {
            return Err(ConnectionError::NotAuthenticated);
        }
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(ConnectionError::Api { status: 503, message: "unreachable".to_string() });
        }
        Ok(self.stored())
    }

    async fn save(&self, doc: &SessionDocument) -> Result<(), ConnectionError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if !self.is_authenticated() {
            return Err(ConnectionError::NotAuthenticated);
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ConnectionError::Api { status: 503, message: "unreachable".to_string() });
        }
        self.set_remote(Some(doc.clone()));
        Ok(())
    }
}

struct Gate {
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
pub struct MockBackend {
    fail: AtomicBool,
    reply_calls: AtomicUsize,
    artifact_calls: AtomicUsize,
    last_history_len: Mutex<Option<usize>>,
    gate: Option<Gate>,
}

impl MockBackend {
    pub const REPLY: &'static str = "Sua voz atravessou o vácuo.";

    pub fn new() -> Self {
        Self::default()
    }

    /// Every call blocks until `release` is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Gate {
                entered: Notify::new(),
                release: Notify::new(),
            }),
            ..Self::default()
        }
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn artifact_calls(&self) -> usize {
        self.artifact_calls.load(Ordering::SeqCst)
    }

    pub fn last_history_len(&self) -> Option<usize> {
        *self.last_history_len.lock().unwrap()
    }

    pub async fn wait_until_entered(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notified().await;
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.release.notify_one();
        }
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }

    pub fn artifact() -> CreateResult {
        CreateResult {
            lyrics: "ondas de estática".to_string(),
            suno_prompt: "dreamy synthwave, female vocals".to_string(),
            emotional_context: "saudade de alguém do outro lado".to_string(),
            metadata: ArtifactMetadata {
                signal_strength: "91%".to_string(),
                emotion: "saudade".to_string(),
                energy: "low".to_string(),
            },
        }
    }
}

#[async_trait]
impl CompanionBackend for MockBackend {
    async fn send_reply(&self, history: &[Message], _new_text: &str) -> Result<String, BackendError> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_history_len.lock().unwrap() = Some(history.len());
        self.pass_gate().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Api { status: 500, message: "boom".to_string() });
        }
        Ok(Self::REPLY.to_string())
    }

    async fn generate_artifact(&self, _prompt: &str) -> Result<CreateResult, BackendError> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::EmptyResponse);
        }
        Ok(Self::artifact())
    }
}
