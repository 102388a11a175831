//! Battle personas and their win/loss records.

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// Characters that the tabular backend cannot accept in row keys.
const UNSAFE_NAME_CHARS: [char; 4] = ['/', '\\', '#', '?'];

/// A rapper persona with its lifetime record.
///
/// `total_debates` always equals `wins + losses`; both counters are only
/// mutated through the store's pairwise outcome update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub total_debates: u32,
}

impl Persona {
    /// Create a persona with a zeroed record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wins: 0,
            losses: 0,
            total_debates: 0,
        }
    }

    /// Win percentage in `[0, 100]`; personas with no debates score zero.
    pub fn win_pct(&self) -> f64 {
        if self.total_debates == 0 {
            0.0
        } else {
            f64::from(self.wins) * 100.0 / f64::from(self.total_debates)
        }
    }
}

/// One row of the public leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub total_debates: u32,
    pub win_pct: f64,
}

impl From<&Persona> for LeaderboardEntry {
    fn from(persona: &Persona) -> Self {
        Self {
            name: persona.name.clone(),
            wins: persona.wins,
            losses: persona.losses,
            total_debates: persona.total_debates,
            win_pct: persona.win_pct(),
        }
    }
}

/// Validate a persona name for use as a store row key.
pub fn validate_name(name: &str) -> Result<(), DebateError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DebateError::InvalidArgument(
            "persona name cannot be empty".to_string(),
        ));
    }
    if let Some(bad) = trimmed.chars().find(|c| UNSAFE_NAME_CHARS.contains(c)) {
        return Err(DebateError::InvalidArgument(format!(
            "persona name '{}' contains unsupported character '{}'",
            trimmed, bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_pct_zero_debates() {
        let persona = Persona::new("MC Fresh");
        assert_eq!(persona.win_pct(), 0.0);
    }

    #[test]
    fn test_win_pct() {
        let persona = Persona {
            name: "MC Fresh".to_string(),
            wins: 3,
            losses: 1,
            total_debates: 4,
        };
        assert_eq!(persona.win_pct(), 75.0);
    }

    #[test]
    fn test_validate_name_ok() {
        assert!(validate_name("Lil Latency").is_ok());
    }

    #[test]
    fn test_validate_name_rejects_empty() {
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_validate_name_rejects_separators() {
        for name in ["a/b", "a\\b", "a#b", "a?b"] {
            assert!(validate_name(name).is_err(), "{name} should be rejected");
        }
    }
}
