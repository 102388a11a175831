//! Speech synthesis client and persona voice mapping.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{TtsConfig, VoicesConfig};
use crate::error::DebateError;

const OUTPUT_FORMAT: &str = "audio-16khz-32kbitrate-mono-mp3";
const DEFAULT_MIME: &str = "audio/mpeg";

/// Encoded audio for one utterance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl AudioClip {
    /// File extension matching the declared codec.
    pub fn file_extension(&self) -> &'static str {
        match self.mime.as_str() {
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" => "ogg",
            _ => "mp3",
        }
    }
}

/// Speech-synthesis seam.
///
/// Empty or whitespace-only text resolves to `None` without touching the
/// backend; a backend that produces zero bytes also resolves to `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str)
        -> Result<Option<AudioClip>, DebateError>;
}

/// Persona to voice-id lookup with explicit defaults.
///
/// Map values may be concrete voice ids or the aliases `male` / `female`;
/// personas without an entry fall back to the male default.
#[derive(Debug, Clone)]
pub struct VoiceTable {
    map: HashMap<String, String>,
    default_male: String,
    default_female: String,
}

impl VoiceTable {
    pub fn from_config(config: &VoicesConfig) -> Self {
        Self {
            map: config.map.clone(),
            default_male: config.default_male.clone(),
            default_female: config.default_female.clone(),
        }
    }

    pub fn voice_for(&self, persona: &str) -> &str {
        match self.map.get(persona).map(String::as_str) {
            Some("male") => &self.default_male,
            Some("female") => &self.default_female,
            Some(voice) => voice,
            None => &self.default_male,
        }
    }
}

/// Client for a subscription-key speech endpoint speaking SSML.
pub struct HttpSpeechClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSpeechClient {
    pub fn new(endpoint: &str, api_key: &str, region: &str) -> Result<Self, DebateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DebateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = if endpoint.is_empty() {
            format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", region)
        } else {
            endpoint.to_string()
        };

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &TtsConfig) -> Result<Self, DebateError> {
        Self::new(&config.endpoint, &config.api_key, &config.region)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechClient {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<Option<AudioClip>, DebateError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(build_ssml(text, voice_id))
            .send()
            .await
            .map_err(|e| DebateError::Transient(format!("synthesis request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(DebateError::Transient(format!(
                "synthesis endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(DebateError::Permanent(format!(
                "synthesis endpoint rejected request: {}",
                status
            )));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_MIME)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DebateError::Transient(format!("synthesis body read failed: {}", e)))?
            .to_vec();

        if bytes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(AudioClip { bytes, mime }))
        }
    }
}

/// Synthesizer that produces no audio; used for text-only battles.
pub struct DisabledSpeech;

#[async_trait]
impl SpeechSynthesizer for DisabledSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        _voice_id: &str,
    ) -> Result<Option<AudioClip>, DebateError> {
        Ok(None)
    }
}

fn build_ssml(text: &str, voice_id: &str) -> String {
    format!(
        r#"<speak version="1.0" xml:lang="en-US"><voice name="{}">{}</voice></speak>"#,
        escape_xml(voice_id),
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> VoiceTable {
        let mut map = HashMap::new();
        map.insert("MC Circuit".to_string(), "en-US-DavisNeural".to_string());
        map.insert("Lady Cache".to_string(), "female".to_string());
        VoiceTable {
            map,
            default_male: "en-US-GuyNeural".to_string(),
            default_female: "en-US-JennyNeural".to_string(),
        }
    }

    #[test]
    fn test_voice_for_mapped_persona() {
        assert_eq!(table().voice_for("MC Circuit"), "en-US-DavisNeural");
    }

    #[test]
    fn test_voice_for_alias() {
        assert_eq!(table().voice_for("Lady Cache"), "en-US-JennyNeural");
    }

    #[test]
    fn test_voice_for_unmapped_persona_gets_default() {
        assert_eq!(table().voice_for("Unknown MC"), "en-US-GuyNeural");
    }

    #[test]
    fn test_build_ssml_escapes_text() {
        let ssml = build_ssml("bars & <hooks>", "en-US-GuyNeural");
        assert!(ssml.contains("bars &amp; &lt;hooks&gt;"));
        assert!(ssml.contains(r#"name="en-US-GuyNeural""#));
    }

    #[test]
    fn test_file_extension_from_mime() {
        let wav = AudioClip {
            bytes: vec![0],
            mime: "audio/wav".to_string(),
        };
        assert_eq!(wav.file_extension(), "wav");
        let mp3 = AudioClip {
            bytes: vec![0],
            mime: "audio/mpeg".to_string(),
        };
        assert_eq!(mp3.file_extension(), "mp3");
    }

    #[tokio::test]
    async fn test_synthesize_empty_text_skips_backend() {
        let client = HttpSpeechClient::new("https://unreachable.invalid", "key", "eastus").unwrap();
        let result = client.synthesize("   ", "en-US-GuyNeural").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_disabled_speech_returns_none() {
        let result = DisabledSpeech
            .synthesize("some bars", "en-US-GuyNeural")
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
