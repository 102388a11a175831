//! Session registry and the per-session event channel.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::orchestrator::{DebateHandle, DebateSnapshot};

/// Snapshots buffered per session before the oldest non-final one is shed.
pub const CHANNEL_CAPACITY: usize = 4;

#[derive(Debug, Default)]
struct ChannelState {
    queue: VecDeque<DebateSnapshot>,
    closed: bool,
}

#[derive(Debug, Default)]
struct ChannelInner {
    state: Mutex<ChannelState>,
    notify: Notify,
}

/// Publisher half of a session's snapshot stream.
///
/// Snapshots are delivered in publish order. When the buffer is full the
/// oldest non-terminal snapshot is dropped; the newest snapshot and any
/// terminal snapshot always survive. Publishing a terminal snapshot closes
/// the channel.
#[derive(Debug, Clone, Default)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
}

impl EventChannel {
    pub fn new() -> (EventChannel, EventStream) {
        let channel = EventChannel::default();
        let stream = EventStream {
            inner: channel.inner.clone(),
        };
        (channel, stream)
    }

    pub async fn publish(&self, snapshot: DebateSnapshot) {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            tracing::warn!(phase = ?snapshot.phase, "snapshot published after channel close; ignoring");
            return;
        }
        if state.queue.len() >= CHANNEL_CAPACITY {
            if let Some(idx) = state.queue.iter().position(|s| !s.phase.is_terminal()) {
                state.queue.remove(idx);
                tracing::debug!("shed oldest snapshot for a slow consumer");
            }
        }
        let terminal = snapshot.phase.is_terminal();
        state.queue.push_back(snapshot);
        if terminal {
            state.closed = true;
        }
        drop(state);
        self.inner.notify.notify_waiters();
    }

    /// Close without a terminal snapshot. Normal shutdown publishes one
    /// instead; this is the escape hatch for a dying publisher.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        drop(state);
        self.inner.notify.notify_waiters();
    }
}

/// Consumer half of a session's snapshot stream.
#[derive(Debug)]
pub struct EventStream {
    inner: Arc<ChannelInner>,
}

impl EventStream {
    /// Next snapshot, or `None` once the channel is closed and drained.
    pub async fn next(&mut self) -> Option<DebateSnapshot> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.inner.state.lock().await;
                if let Some(snapshot) = state.queue.pop_front() {
                    return Some(snapshot);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }
}

/// Live sessions by id.
///
/// Handles stay resident for `ttl` after reaching a terminal phase so late
/// acks and status reads resolve, then a sweep cancels and drops them.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Arc<DebateHandle>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(&self, handle: Arc<DebateHandle>) -> Uuid {
        let id = handle.id();
        self.sessions.lock().await.insert(id, handle);
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<DebateHandle>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Remove a session outright, cancelling whatever it was doing.
    pub async fn remove(&self, id: &Uuid) -> Option<Arc<DebateHandle>> {
        let handle = self.sessions.lock().await.remove(id);
        if let Some(handle) = &handle {
            handle.cancel();
        }
        handle
    }

    /// Drop sessions whose terminal phase is older than the TTL.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        {
            let sessions = self.sessions.lock().await;
            for (id, handle) in sessions.iter() {
                if let Some(at) = handle.terminal_at().await {
                    if now.duration_since(at) >= self.ttl {
                        expired.push(*id);
                    }
                }
            }
        }
        for id in &expired {
            if let Some(handle) = self.sessions.lock().await.remove(id) {
                handle.cancel();
                tracing::debug!(session = %id, "swept expired session");
            }
        }
        expired.len()
    }

    /// Background sweep loop; abort the returned handle to stop it.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                registry.sweep_expired().await;
            }
        })
    }
}
