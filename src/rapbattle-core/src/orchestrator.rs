//! Debate orchestration: the per-session turn state machine.
//!
//! One spawned task owns one [`DebateSession`] and drives it from the first
//! verse through judging. The client only touches the session through its
//! [`DebateHandle`]: acking audio playback and cancelling.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::DebateError;
use crate::judge::{self, JudgeResult, Winner};
use crate::llm::{self, ChatCompleter, ChatMessage, CompletionOpts};
use crate::prompt::{self, Topic};
use crate::session::EventChannel;
use crate::store::PersonaStore;
use crate::tts::{AudioClip, SpeechSynthesizer, VoiceTable};

/// Six turns: three rounds of two verses.
pub const TOTAL_TURNS: u32 = 6;

/// Character cap for one verse.
pub const MAX_TURN_CHARS: usize = 550;

const TURN_OPTS: CompletionOpts = CompletionOpts {
    temperature: 0.9,
    max_chars: MAX_TURN_CHARS,
};
const JUDGE_OPTS: CompletionOpts = CompletionOpts {
    temperature: 0.2,
    max_chars: 1500,
};

const LLM_TIMEOUT: Duration = Duration::from_secs(60);
const TTS_TIMEOUT: Duration = Duration::from_secs(30);
const NO_AUDIO_GRACE: Duration = Duration::from_secs(1);
const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Spoken line substituted when a verse cannot be generated.
pub const MIC_CUT_LINE: &str = "Yo, my mic just cut out... hold the beat, I'll catch the next verse.";

/// Where a session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    GeneratingText,
    SynthesizingAudio,
    AwaitingPlaybackAck,
    Judging,
    Finished,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Cancelled | Phase::Failed)
    }
}

/// Immutable view of a session, delivered over the event channel.
#[derive(Debug, Clone, Serialize)]
pub struct DebateSnapshot {
    pub pro: String,
    pub con: String,
    pub topic: Topic,
    pub phase: Phase,
    pub current_turn: u32,
    pub total_turns: u32,
    pub is_pro_turn: bool,
    pub current_turn_text: String,
    pub current_turn_audio: Option<AudioClip>,
    pub history: Vec<String>,
    pub winner: Option<String>,
    pub reasoning: Option<String>,
    pub rubric: Option<judge::Rubric>,
    pub error_message: Option<String>,
}

/// Client-facing side of a running session.
///
/// Safe to share; every method is idempotent from the client's point of
/// view. The orchestrator task is the only writer of session state.
pub struct DebateHandle {
    id: Uuid,
    cancel: CancellationToken,
    ack: Mutex<Option<oneshot::Sender<()>>>,
    audio_published: AtomicBool,
    terminal_at: Mutex<Option<Instant>>,
    events: EventChannel,
}

impl DebateHandle {
    pub(crate) fn new(events: EventChannel) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            ack: Mutex::new(None),
            audio_published: AtomicBool::new(false),
            terminal_at: Mutex::new(None),
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Signal that the current turn's audio finished playing.
    ///
    /// A no-op when nothing is pending; an ack that arrives before any audio
    /// snapshot was ever published is out of order and only logged.
    pub async fn ack_audio(&self) {
        let pending = self.ack.lock().await.take();
        match pending {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => {
                if !self.audio_published.load(Ordering::Acquire) {
                    tracing::warn!(session = %self.id, "out-of-order ack ignored: no audio published yet");
                }
            }
        }
    }

    /// Abort the session. Idempotent; in-flight upstream calls unwind
    /// through the shared cancellation token.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn events(&self) -> &EventChannel {
        &self.events
    }

    async fn arm_ack(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.ack.lock().await = Some(tx);
        self.audio_published.store(true, Ordering::Release);
        rx
    }

    pub(crate) async fn mark_terminal(&self) {
        *self.terminal_at.lock().await = Some(Instant::now());
    }

    pub(crate) async fn terminal_at(&self) -> Option<Instant> {
        *self.terminal_at.lock().await
    }
}

/// External collaborators one session needs.
pub(crate) struct OrchestratorDeps {
    pub llm: Arc<dyn ChatCompleter>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub store: Arc<dyn PersonaStore>,
    pub voices: VoiceTable,
}

/// Mutable state owned exclusively by the orchestrator task.
pub(crate) struct DebateSession {
    pro: String,
    con: String,
    topic: Topic,
    phase: Phase,
    current_turn: u32,
    is_pro_turn: bool,
    current_text: String,
    current_audio: Option<AudioClip>,
    history: Vec<String>,
    result: Option<JudgeResult>,
    error_message: Option<String>,
}

impl DebateSession {
    pub(crate) fn new(pro: String, con: String, topic: Topic) -> Self {
        Self {
            pro,
            con,
            topic,
            phase: Phase::Idle,
            current_turn: 0,
            is_pro_turn: true,
            current_text: String::new(),
            current_audio: None,
            history: Vec::new(),
            result: None,
            error_message: None,
        }
    }

    fn snapshot(&self) -> DebateSnapshot {
        DebateSnapshot {
            pro: self.pro.clone(),
            con: self.con.clone(),
            topic: self.topic.clone(),
            phase: self.phase,
            current_turn: self.current_turn,
            total_turns: TOTAL_TURNS,
            is_pro_turn: self.is_pro_turn,
            current_turn_text: self.current_text.clone(),
            current_turn_audio: self.current_audio.clone(),
            history: self.history.clone(),
            winner: self
                .result
                .as_ref()
                .map(|r| r.winner.label().to_string()),
            reasoning: self
                .result
                .as_ref()
                .map(|r| r.reasoning.clone())
                .filter(|r| !r.is_empty()),
            rubric: self.result.as_ref().and_then(|r| r.rubric),
            error_message: self.error_message.clone(),
        }
    }
}

/// Drive one debate from start to a terminal snapshot.
///
/// Never returns early without publishing a terminal snapshot: the event
/// channel always closes.
pub(crate) async fn run_debate(
    deps: OrchestratorDeps,
    mut session: DebateSession,
    handle: Arc<DebateHandle>,
) {
    handle.events().publish(session.snapshot()).await;

    while session.current_turn < TOTAL_TURNS {
        session.current_turn += 1;
        session.phase = Phase::GeneratingText;
        session.current_text.clear();
        session.current_audio = None;
        handle.events().publish(session.snapshot()).await;

        let (active, opponent) = if session.is_pro_turn {
            (session.pro.clone(), session.con.clone())
        } else {
            (session.con.clone(), session.pro.clone())
        };

        let system = prompt::turn_system_prompt(
            &active,
            &opponent,
            &session.topic,
            session.is_pro_turn,
            session.current_turn,
            MAX_TURN_CHARS,
        );
        let messages = prompt::history_messages(&session.history, session.is_pro_turn);

        let mut synthesis_allowed = true;
        let text = match call_with_retry("turn completion", handle.cancel_token(), LLM_TIMEOUT, || {
            deps.llm.complete(&system, &messages, TURN_OPTS)
        })
        .await
        {
            Ok(raw) => {
                llm::truncate_at_whitespace(&llm::sanitize_utterance(&raw), MAX_TURN_CHARS)
            }
            Err(DebateError::Cancelled) => {
                finish_cancelled(&mut session, &handle).await;
                return;
            }
            Err(err) => {
                tracing::error!(
                    session = %handle.id(),
                    turn = session.current_turn,
                    "verse generation failed, substituting placeholder: {err}"
                );
                synthesis_allowed = false;
                MIC_CUT_LINE.to_string()
            }
        };
        session.current_text = text;

        session.phase = Phase::SynthesizingAudio;
        let clip = if synthesis_allowed {
            let voice = deps.voices.voice_for(&active).to_string();
            let spoken = session.current_text.clone();
            match call_with_retry("speech synthesis", handle.cancel_token(), TTS_TIMEOUT, || {
                deps.tts.synthesize(&spoken, &voice)
            })
            .await
            {
                Ok(clip) => clip,
                Err(DebateError::Cancelled) => {
                    finish_cancelled(&mut session, &handle).await;
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        session = %handle.id(),
                        turn = session.current_turn,
                        "synthesis failed, turn stays text-only: {err}"
                    );
                    None
                }
            }
        } else {
            None
        };

        match clip {
            Some(clip) => {
                let ack = handle.arm_ack().await;
                session.current_audio = Some(clip);
                session.phase = Phase::AwaitingPlaybackAck;
                handle.events().publish(session.snapshot()).await;
                tokio::select! {
                    biased;
                    _ = handle.cancel_token().cancelled() => {
                        finish_cancelled(&mut session, &handle).await;
                        return;
                    }
                    acked = ack => {
                        if acked.is_err() {
                            finish_failed(&mut session, &handle, "playback ack channel dropped").await;
                            return;
                        }
                    }
                }
            }
            None => {
                session.current_audio = None;
                handle.events().publish(session.snapshot()).await;
                tokio::select! {
                    biased;
                    _ = handle.cancel_token().cancelled() => {
                        finish_cancelled(&mut session, &handle).await;
                        return;
                    }
                    _ = tokio::time::sleep(NO_AUDIO_GRACE) => {}
                }
            }
        }

        // The turn is committed only after playback settled.
        session.current_audio = None;
        session
            .history
            .push(std::mem::take(&mut session.current_text));
        session.is_pro_turn = !session.is_pro_turn;
    }

    session.phase = Phase::Judging;
    handle.events().publish(session.snapshot()).await;

    let judged = judge_debate(&deps, &session, &handle).await;
    match judged {
        Ok(result) => {
            if let Winner::Persona(winner) = &result.winner {
                let loser = if winner == &session.pro {
                    session.con.clone()
                } else {
                    session.pro.clone()
                };
                if let Err(err) = deps.store.record_outcome(winner, &loser).await {
                    tracing::warn!(
                        session = %handle.id(),
                        "outcome not recorded for {winner} over {loser}: {err}"
                    );
                }
            }
            session.result = Some(result);
        }
        Err(DebateError::Cancelled) => {
            finish_cancelled(&mut session, &handle).await;
            return;
        }
        Err(err) => {
            tracing::error!(session = %handle.id(), "judging failed: {err}");
            session.result = Some(JudgeResult::judging_failed());
            session.error_message = Some(err.to_string());
        }
    }

    session.phase = Phase::Finished;
    handle.mark_terminal().await;
    handle.events().publish(session.snapshot()).await;
    tracing::info!(session = %handle.id(), "debate finished");
}

async fn judge_debate(
    deps: &OrchestratorDeps,
    session: &DebateSession,
    handle: &DebateHandle,
) -> Result<JudgeResult, DebateError> {
    let system = prompt::judge_system_prompt(&session.pro, &session.con, &session.topic);
    let transcript = prompt::judge_transcript(&session.pro, &session.con, &session.history);
    let messages = [ChatMessage::user(transcript)];
    let raw = call_with_retry("judging", handle.cancel_token(), LLM_TIMEOUT, || {
        deps.llm.complete(&system, &messages, JUDGE_OPTS)
    })
    .await?;
    Ok(judge::parse_judge_response(&raw, &session.pro, &session.con))
}

async fn finish_cancelled(session: &mut DebateSession, handle: &DebateHandle) {
    session.phase = Phase::Cancelled;
    session.current_audio = None;
    handle.mark_terminal().await;
    handle.events().publish(session.snapshot()).await;
    tracing::info!(session = %handle.id(), "debate cancelled");
}

async fn finish_failed(session: &mut DebateSession, handle: &DebateHandle, message: &str) {
    session.phase = Phase::Failed;
    session.current_audio = None;
    session.error_message = Some(message.to_string());
    handle.mark_terminal().await;
    handle.events().publish(session.snapshot()).await;
    tracing::error!(session = %handle.id(), "debate failed: {message}");
}

/// Run an upstream call with the session's cancellation token, a soft
/// timeout, and transient-failure retries.
///
/// Timeouts count as `Transient` once, then `Permanent`. Retries back off
/// exponentially from 500 ms; at most two are attempted.
async fn call_with_retry<T, F, Fut>(
    what: &str,
    cancel: &CancellationToken,
    soft_timeout: Duration,
    mut call: F,
) -> Result<T, DebateError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, DebateError>>,
{
    let mut timeouts = 0u32;
    let mut attempt = 0u32;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DebateError::Cancelled),
            res = tokio::time::timeout(soft_timeout, call()) => match res {
                Ok(inner) => inner,
                Err(_) => {
                    timeouts += 1;
                    if timeouts > 1 {
                        Err(DebateError::Permanent(format!("{what} timed out repeatedly")))
                    } else {
                        Err(DebateError::Transient(format!("{what} timed out")))
                    }
                }
            },
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_RETRIES => {
                attempt += 1;
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                tracing::warn!(attempt, "{what} failed transiently, retrying in {delay:?}: {err}");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(DebateError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}
