use crate::logging;
use crate::models::{CreateResult, Message};
use crate::persona;
use crate::session::{Flag, FlagGuard, SessionController};

/// How a submit settled
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// A request is already outstanding; nothing changed
    Busy,
    /// Blank input; nothing changed
    EmptyInput,
    Replied(String),
    Artifact(CreateResult),
    /// Backend failed; the fallback line was appended
    Fallback,
    /// Session was reset while the request was in flight
    Discarded,
}

/// Case-insensitive trigger match
pub fn is_artifact_request(text: &str, trigger_token: &str) -> bool {
    text.to_uppercase().contains(&trigger_token.to_uppercase())
}

impl SessionController {
    /// One conversational turn.
    ///
    /// Phase 1 (synchronous): engage the guard, append the user message,
    /// jitter the emotional state and write through. Phase 2: a single
    /// backend call whose result (or the fallback line) is appended. The
    /// guard is released on every path once the call settles.
    pub async fn submit(&self, text: &str) -> TurnOutcome {
        if text.trim().is_empty() {
            return TurnOutcome::EmptyInput;
        }

        let (history, doc, epoch) = {
            let mut guard = self.inner.lock();
            if guard.processing {
                logging::log_conversation(None, "Submit ignored: response still pending");
                return TurnOutcome::Busy;
            }
            let state = &mut *guard;
            state.processing = true;

            let history = state.messages.clone();
            state.messages.push(Message::user(text));
            state.emotional_state.apply_turn_jitter(&mut state.rng);

            (history, state.document(), state.epoch)
        };
        let _processing = FlagGuard::new(self.inner.clone(), Flag::Processing, epoch);
        self.persist(doc);

        let (reply, outcome) = if is_artifact_request(text, &self.inner.trigger_token) {
            logging::log_conversation(None, "Trigger token found; requesting artifact");
            match self.inner.backend.generate_artifact(text).await {
                Ok(result) => {
                    let summary = persona::artifact_summary(
                        &result.metadata.signal_strength,
                        &result.metadata.emotion,
                    );
                    (Message::assistant(summary).marked_create_result(), TurnOutcome::Artifact(result))
                }
                Err(e) => {
                    logging::log_error(None, &format!("Artifact generation failed: {}", e));
                    (Message::assistant(persona::FALLBACK_REPLY), TurnOutcome::Fallback)
                }
            }
        } else {
            match self.inner.backend.send_reply(&history, text).await {
                Ok(reply) => (Message::assistant(reply.clone()), TurnOutcome::Replied(reply)),
                Err(e) => {
                    logging::log_error(None, &format!("Reply failed: {}", e));
                    (Message::assistant(persona::FALLBACK_REPLY), TurnOutcome::Fallback)
                }
            }
        };

        let doc = {
            let mut state = self.inner.lock();
            if state.epoch != epoch {
                logging::log_conversation(None, "Session reset mid-turn; reply dropped");
                return TurnOutcome::Discarded;
            }
            if let TurnOutcome::Artifact(result) = &outcome {
                state.create_result = Some(result.clone());
                state.artifact_open = true;
            }
            state.messages.push(reply);
            state.document()
        };
        self.persist(doc);

        outcome
    }
}
