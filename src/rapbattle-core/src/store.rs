//! Persona persistence.
//!
//! The orchestrator and service only see the [`PersonaStore`] trait; the
//! in-memory implementation here is the default backend. Its interior lock
//! makes the pairwise outcome update transactional, and each row carries an
//! opaque version so a remote tabular backend can swap in behind the same
//! trait with compare-and-swap semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::DebateError;
use crate::persona::{validate_name, Persona};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersonaStore: Send + Sync {
    /// All personas, ordered by name.
    async fn list(&self) -> Result<Vec<Persona>, DebateError>;

    async fn get(&self, name: &str) -> Result<Option<Persona>, DebateError>;

    async fn upsert(&self, persona: Persona) -> Result<(), DebateError>;

    /// Insert zeroed personas, but only when the store holds none at all.
    async fn seed_if_empty(&self, names: &[String]) -> Result<(), DebateError>;

    /// Record one debate outcome for both sides.
    ///
    /// Winner and loser are read, incremented and written back as one unit;
    /// concurrent outcomes touching the same persona never lose an
    /// increment. Fails with `NotFound` when either persona is missing.
    async fn record_outcome(&self, winner: &str, loser: &str) -> Result<(), DebateError>;
}

#[derive(Debug, Clone)]
struct VersionedRow {
    persona: Persona,
    version: u64,
}

/// In-process persona store.
#[derive(Debug, Default)]
pub struct MemoryPersonaStore {
    rows: Mutex<HashMap<String, VersionedRow>>,
}

impl MemoryPersonaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersonaStore for MemoryPersonaStore {
    async fn list(&self) -> Result<Vec<Persona>, DebateError> {
        let rows = self.rows.lock().await;
        let mut personas: Vec<Persona> = rows.values().map(|r| r.persona.clone()).collect();
        personas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(personas)
    }

    async fn get(&self, name: &str) -> Result<Option<Persona>, DebateError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(name).map(|r| r.persona.clone()))
    }

    async fn upsert(&self, persona: Persona) -> Result<(), DebateError> {
        validate_name(&persona.name)?;
        let mut rows = self.rows.lock().await;
        let entry = rows
            .entry(persona.name.clone())
            .or_insert_with(|| VersionedRow {
                persona: persona.clone(),
                version: 0,
            });
        entry.persona = persona;
        entry.version += 1;
        Ok(())
    }

    async fn seed_if_empty(&self, names: &[String]) -> Result<(), DebateError> {
        for name in names {
            validate_name(name)?;
        }
        let mut rows = self.rows.lock().await;
        if !rows.is_empty() {
            return Ok(());
        }
        for name in names {
            rows.insert(
                name.clone(),
                VersionedRow {
                    persona: Persona::new(name.clone()),
                    version: 0,
                },
            );
        }
        Ok(())
    }

    async fn record_outcome(&self, winner: &str, loser: &str) -> Result<(), DebateError> {
        // One lock spans read and write-back of both rows.
        let mut rows = self.rows.lock().await;
        if !rows.contains_key(winner) {
            return Err(DebateError::NotFound(winner.to_string()));
        }
        if !rows.contains_key(loser) {
            return Err(DebateError::NotFound(loser.to_string()));
        }
        if let Some(row) = rows.get_mut(winner) {
            row.persona.wins += 1;
            row.persona.total_debates += 1;
            row.version += 1;
        }
        if let Some(row) = rows.get_mut(loser) {
            row.persona.losses += 1;
            row.persona.total_debates += 1;
            row.version += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_seed_if_empty_populates_zeroed_records() {
        let store = MemoryPersonaStore::new();
        store.seed_if_empty(&names(&["A", "B"])).await.unwrap();
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|p| p.wins == 0 && p.total_debates == 0));
    }

    #[tokio::test]
    async fn test_seed_if_empty_is_a_noop_when_populated() {
        let store = MemoryPersonaStore::new();
        store.seed_if_empty(&names(&["A"])).await.unwrap();
        store.seed_if_empty(&names(&["B", "C"])).await.unwrap();
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "A");
    }

    #[tokio::test]
    async fn test_record_outcome_updates_both_sides() {
        let store = MemoryPersonaStore::new();
        store.seed_if_empty(&names(&["A", "B"])).await.unwrap();
        store.record_outcome("A", "B").await.unwrap();

        let winner = store.get("A").await.unwrap().unwrap();
        let loser = store.get("B").await.unwrap().unwrap();
        assert_eq!((winner.wins, winner.losses, winner.total_debates), (1, 0, 1));
        assert_eq!((loser.wins, loser.losses, loser.total_debates), (0, 1, 1));
    }

    #[tokio::test]
    async fn test_record_outcome_missing_persona_is_not_found() {
        let store = MemoryPersonaStore::new();
        store.seed_if_empty(&names(&["A"])).await.unwrap();
        let err = store.record_outcome("A", "Ghost").await.unwrap_err();
        assert!(matches!(err, DebateError::NotFound(_)));
        // The winner must not have been half-updated.
        let a = store.get("A").await.unwrap().unwrap();
        assert_eq!(a.total_debates, 0);
    }

    #[tokio::test]
    async fn test_record_outcome_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryPersonaStore::new());
        store.seed_if_empty(&names(&["A", "B", "C"])).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                // Every outcome involves A so the pair overlaps.
                let loser = if i % 2 == 0 { "B" } else { "C" };
                store.record_outcome("A", loser).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let a = store.get("A").await.unwrap().unwrap();
        assert_eq!(a.wins, 20);
        assert_eq!(a.total_debates, 20);
        let b = store.get("B").await.unwrap().unwrap();
        let c = store.get("C").await.unwrap().unwrap();
        assert_eq!(b.losses + c.losses, 20);
        assert_eq!(a.total_debates, a.wins + a.losses);
    }

    #[tokio::test]
    async fn test_upsert_inserts_and_replaces() {
        let store = MemoryPersonaStore::new();
        store.upsert(Persona::new("A")).await.unwrap();
        let mut updated = Persona::new("A");
        updated.wins = 7;
        updated.total_debates = 7;
        store.upsert(updated).await.unwrap();
        assert_eq!(store.get("A").await.unwrap().unwrap().wins, 7);
    }

    #[tokio::test]
    async fn test_upsert_rejects_unsafe_name() {
        let store = MemoryPersonaStore::new();
        assert!(store.upsert(Persona::new("a/b")).await.is_err());
    }
}
