//! Transport-agnostic operations facade.
//!
//! Front-ends (CLI, web, tests) drive debates exclusively through
//! [`DebateService`]; it owns the session registry and hands each new
//! debate to its own orchestrator task.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::DebateError;
use crate::headlines::HeadlineSource;
use crate::llm::ChatCompleter;
use crate::orchestrator::{self, DebateHandle, DebateSession, OrchestratorDeps};
use crate::persona::{validate_name, LeaderboardEntry, Persona};
use crate::prompt::Topic;
use crate::session::{EventChannel, EventStream, SessionRegistry};
use crate::store::PersonaStore;
use crate::tts::{SpeechSynthesizer, VoiceTable};

/// Leaderboard rows returned at most.
pub const LEADERBOARD_LIMIT: usize = 10;

pub struct DebateService {
    llm: Arc<dyn ChatCompleter>,
    tts: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn PersonaStore>,
    headlines: Arc<dyn HeadlineSource>,
    voices: VoiceTable,
    registry: Arc<SessionRegistry>,
}

impl DebateService {
    pub fn new(
        llm: Arc<dyn ChatCompleter>,
        tts: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn PersonaStore>,
        headlines: Arc<dyn HeadlineSource>,
        voices: VoiceTable,
        session_ttl: Duration,
    ) -> Self {
        Self {
            llm,
            tts,
            store,
            headlines,
            voices,
            registry: Arc::new(SessionRegistry::new(session_ttl)),
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Start a new debate and return its session id plus the event stream.
    pub async fn start_debate(
        &self,
        pro: &str,
        con: &str,
        topic_title: &str,
        topic_description: Option<String>,
    ) -> Result<(Uuid, EventStream), DebateError> {
        let pro = pro.trim();
        let con = con.trim();
        validate_name(pro)?;
        validate_name(con)?;
        if pro == con {
            return Err(DebateError::InvalidArgument(
                "a persona cannot battle itself".to_string(),
            ));
        }
        let topic = Topic::new(topic_title, topic_description)?;

        let (events, stream) = EventChannel::new();
        let handle = Arc::new(DebateHandle::new(events));
        let id = self.registry.insert(handle.clone()).await;

        let deps = OrchestratorDeps {
            llm: self.llm.clone(),
            tts: self.tts.clone(),
            store: self.store.clone(),
            voices: self.voices.clone(),
        };
        let session = DebateSession::new(pro.to_string(), con.to_string(), topic);
        tokio::spawn(orchestrator::run_debate(deps, session, handle));

        tracing::info!(session = %id, pro, con, "debate started");
        Ok((id, stream))
    }

    /// Report that the current turn's audio finished playing.
    pub async fn ack_audio(&self, id: Uuid) -> Result<(), DebateError> {
        let handle = self
            .registry
            .get(&id)
            .await
            .ok_or(DebateError::SessionNotFound(id))?;
        handle.ack_audio().await;
        Ok(())
    }

    /// Cancel a debate. Idempotent; unknown or already-swept sessions are
    /// treated as already cancelled.
    pub async fn cancel(&self, id: Uuid) -> Result<(), DebateError> {
        if let Some(handle) = self.registry.get(&id).await {
            handle.cancel();
        }
        Ok(())
    }

    /// Top personas by win percentage, then wins, then fewest losses.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, DebateError> {
        let personas = self.store.list().await?;
        let mut entries: Vec<LeaderboardEntry> =
            personas.iter().map(LeaderboardEntry::from).collect();
        entries.sort_by(|a, b| {
            b.win_pct
                .partial_cmp(&a.win_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.wins.cmp(&a.wins))
                .then_with(|| a.losses.cmp(&b.losses))
        });
        entries.truncate(LEADERBOARD_LIMIT);
        Ok(entries)
    }

    pub async fn list_personas(&self) -> Result<Vec<Persona>, DebateError> {
        self.store.list().await
    }

    /// Suggested topic from the configured headline source.
    pub async fn top_headline(&self) -> Result<Option<String>, DebateError> {
        self.headlines.top_headline().await
    }
}
