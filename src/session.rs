//! Session controller: the single owner of in-memory session state.
//!
//! Startup reads the local store (seeding a greeting on a first run),
//! every mutation is written through to the local store and, when the
//! drive is authorized, pushed to the cloud on a best-effort channel. A
//! successful cloud read with a non-empty history replaces local state
//! wholesale. The state mutex is never held across an `.await`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::backend::CompanionBackend;
use crate::cloud::{BestEffortChannel, CloudStore};
use crate::emotion::EmotionalState;
use crate::local_store::LocalStore;
use crate::logging;
use crate::models::{CreateResult, Message, SessionDocument};
use crate::persona;

pub(crate) struct SessionState {
    pub messages: Vec<Message>,
    pub emotional_state: EmotionalState,
    pub processing: bool,
    pub syncing: bool,
    pub create_result: Option<CreateResult>,
    pub artifact_open: bool,
    /// Bumped on reset; work started under an older epoch is dropped
    pub epoch: u64,
    pub rng: StdRng,
}

impl SessionState {
    fn seeded(epoch: u64, rng: StdRng) -> Self {
        Self {
            messages: vec![Message::assistant(persona::GREETING).with_id(persona::GREETING_ID)],
            emotional_state: EmotionalState::default(),
            processing: false,
            syncing: false,
            create_result: None,
            artifact_open: false,
            epoch,
            rng,
        }
    }

    pub fn document(&self) -> SessionDocument {
        SessionDocument::new(self.messages.clone(), self.emotional_state)
    }
}

pub(crate) struct Inner {
    pub state: Mutex<SessionState>,
    pub local: LocalStore,
    pub cloud: Arc<dyn CloudStore>,
    pub cloud_writer: BestEffortChannel,
    pub backend: Arc<dyn CompanionBackend>,
    pub trigger_token: String,
}

impl Inner {
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    Processing,
    Syncing,
}

/// Releases a busy flag when dropped, on every exit path
pub(crate) struct FlagGuard {
    inner: Arc<Inner>,
    flag: Flag,
    epoch: u64,
}

impl FlagGuard {
    pub fn new(inner: Arc<Inner>, flag: Flag, epoch: u64) -> Self {
        Self { inner, flag, epoch }
    }
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        // A reset already cleared the flag for the old epoch
        if state.epoch != self.epoch {
            return;
        }
        match self.flag {
            Flag::Processing => state.processing = false,
            Flag::Syncing => state.syncing = false,
        }
    }
}

/// Read-only snapshot for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub messages: Vec<Message>,
    pub emotional_state: EmotionalState,
    pub is_processing: bool,
    pub is_syncing: bool,
    pub cloud_connected: bool,
    pub create_result: Option<CreateResult>,
    pub artifact_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Drive not authorized; nothing was read
    Skipped,
    /// Another sync read is still in flight
    AlreadySyncing,
    /// Remote document was empty or missing; local state kept
    NoRemoteSession,
    /// Remote document replaced in-memory and local state
    Replaced,
    /// Read failed; local state kept
    Failed,
    /// Session was reset while the read was in flight
    Discarded,
}

#[derive(Clone)]
pub struct SessionController {
    pub(crate) inner: Arc<Inner>,
}

impl SessionController {
    /// Load the last local session (or seed a first run). Requires a tokio runtime.
    pub fn start(
        local: LocalStore,
        cloud: Arc<dyn CloudStore>,
        backend: Arc<dyn CompanionBackend>,
        trigger_token: impl Into<String>,
    ) -> Self {
        Self::start_with_rng(local, cloud, backend, trigger_token, StdRng::from_os_rng())
    }

    pub fn start_with_rng(
        local: LocalStore,
        cloud: Arc<dyn CloudStore>,
        backend: Arc<dyn CompanionBackend>,
        trigger_token: impl Into<String>,
        rng: StdRng,
    ) -> Self {
        let (state, seeded) = match local.load() {
            Some(doc) if !doc.messages.is_empty() => {
                logging::log_session(None, &format!(
                    "Restored local session with {} messages", doc.messages.len()
                ));
                let mut state = SessionState::seeded(0, rng);
                state.messages = doc.messages;
                state.emotional_state = doc.emotional_state.clamped();
                (state, false)
            }
            _ => {
                logging::log_session(None, "No local session, seeding greeting");
                (SessionState::seeded(0, rng), true)
            }
        };

        if seeded {
            local.save(&state.document());
        }

        let cloud_writer = BestEffortChannel::spawn(cloud.clone());

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                local,
                cloud,
                cloud_writer,
                backend,
                trigger_token: trigger_token.into(),
            }),
        }
    }

    pub fn view(&self) -> SessionView {
        let cloud_connected = self.inner.cloud.is_authenticated();
        let state = self.inner.lock();
        SessionView {
            messages: state.messages.clone(),
            emotional_state: state.emotional_state,
            is_processing: state.processing,
            is_syncing: state.syncing,
            cloud_connected,
            create_result: state.create_result.clone(),
            artifact_open: state.artifact_open,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().messages.clone()
    }

    pub fn emotional_state(&self) -> EmotionalState {
        self.inner.lock().emotional_state
    }

    pub fn is_processing(&self) -> bool {
        self.inner.lock().processing
    }

    pub fn close_artifact(&self) {
        self.inner.lock().artifact_open = false;
    }

    /// Write-through after a mutation: local now, cloud best-effort
    pub(crate) fn persist(&self, doc: SessionDocument) {
        self.inner.local.save(&doc);
        if self.inner.cloud.is_authenticated() {
            self.inner.cloud_writer.send(doc);
        }
    }

    /// Start drive authorization; a granted token triggers one sync read
    pub fn connect_cloud(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                logging::log_error(None, &format!("Cloud connect needs a runtime: {}", e));
                return;
            }
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.cloud.init_auth(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let controller = SessionController { inner };
                handle.spawn(async move {
                    controller.sync_with_cloud().await;
                });
            }
        }));
        self.inner.cloud.request_token();
    }

    /// Pull the cloud copy; a non-empty remote history wins outright
    pub async fn sync_with_cloud(&self) -> SyncOutcome {
        if !self.inner.cloud.is_authenticated() {
            return SyncOutcome::Skipped;
        }

        let epoch = {
            let mut state = self.inner.lock();
            if state.syncing {
                return SyncOutcome::AlreadySyncing;
            }
            state.syncing = true;
            state.epoch
        };
        let _syncing = FlagGuard::new(self.inner.clone(), Flag::Syncing, epoch);

        match self.inner.cloud.load().await {
            Ok(Some(mut doc)) if !doc.messages.is_empty() => {
                doc.emotional_state = doc.emotional_state.clamped();
                {
                    let mut state = self.inner.lock();
                    if state.epoch != epoch {
                        logging::log_sync(None, "Session reset during sync; cloud copy dropped");
                        return SyncOutcome::Discarded;
                    }
                    state.messages = doc.messages.clone();
                    state.emotional_state = doc.emotional_state;
                }
                self.inner.local.save(&doc);
                logging::log_sync(None, &format!(
                    "Cloud session restored ({} messages)", doc.messages.len()
                ));
                SyncOutcome::Replaced
            }
            Ok(_) => {
                logging::log_sync(None, "No cloud session found; keeping local state");
                SyncOutcome::NoRemoteSession
            }
            Err(e) => {
                logging::log_sync(None, &format!("Cloud sync failed, keeping local state: {}", e));
                SyncOutcome::Failed
            }
        }
    }

    /// Clear the local store, drop the drive grant and restart from a
    /// first-run state. Nothing happens unless the caller confirmed the data loss.
    pub fn reset(&self, confirmed: bool) -> bool {
        if !confirmed {
            return false;
        }

        self.inner.local.clear();
        // Without this the next turn would overwrite the cloud history
        self.inner.cloud.sign_out();

        let doc = {
            let mut state = self.inner.lock();
            let epoch = state.epoch + 1;
            let rng = StdRng::from_rng(&mut state.rng);
            *state = SessionState::seeded(epoch, rng);
            state.document()
        };

        self.inner.local.save(&doc);
        logging::log_session(None, "Session reset; greeting re-seeded");
        true
    }

    /// Wait for queued cloud writes to settle
    pub async fn flush_cloud(&self) {
        self.inner.cloud_writer.flush().await;
    }
}
