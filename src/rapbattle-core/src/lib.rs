//! RapBattle Core Library
//!
//! Orchestrates AI rap debates: two personas trade verses over a topic,
//! a judge model scores the transcript, and per-persona records persist.

pub mod config;
pub mod error;
pub mod headlines;
pub mod judge;
pub mod llm;
pub mod orchestrator;
pub mod persona;
pub mod prompt;
pub mod service;
pub mod session;
pub mod store;
pub mod tts;

pub use config::{default_config, Config};
pub use error::DebateError;
pub use headlines::{HeadlineSource, HttpHeadlineClient, NoHeadlines};
pub use judge::{JudgeResult, Rubric, ScoreCard, Winner};
pub use llm::{ChatCompleter, ChatMessage, ChatRole, CompletionOpts, OpenAiChatClient};
pub use orchestrator::{DebateHandle, DebateSnapshot, Phase, TOTAL_TURNS};
pub use persona::{LeaderboardEntry, Persona};
pub use prompt::Topic;
pub use service::DebateService;
pub use session::{EventStream, SessionRegistry};
pub use store::{MemoryPersonaStore, PersonaStore};
pub use tts::{AudioClip, DisabledSpeech, HttpSpeechClient, SpeechSynthesizer, VoiceTable};
