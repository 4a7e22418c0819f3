//! # termgpt Server State
//!
//! File: cli/src/commands/srv/state.rs
//! Author: Christi Mahu
//!
//! Shared state of the web terminal server. Each browser tab owns one
//! `Conversation`, keyed by a random session id. A session's conversation sits
//! behind its own async mutex so that at most one turn runs per session while
//! different sessions proceed in parallel.
//!
//! The page deletes its session when the tab goes away. Tabs that never say
//! goodbye (crashed browser, lost network) are dropped by a periodic sweep once
//! their session has been idle for the configured time. A session with a turn
//! in flight is never swept.
//!
use crate::core::error::Result;
use crate::core::service::ChatService;
use crate::core::session::Conversation;
use crate::core::templating;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

pub type SessionHandle = Arc<Mutex<Conversation>>;

struct SessionSlot {
    handle: SessionHandle,
    last_used: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub service: ChatService,
    sessions: Arc<RwLock<HashMap<Uuid, SessionSlot>>>,
    page: Arc<str>,
}

impl AppState {
    /// Prepares the state and renders the terminal page once.
    pub fn new(service: ChatService) -> Result<Self> {
        let page = templating::render_index_page(service.registry())?;
        Ok(Self {
            service,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            page: Arc::from(page),
        })
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// Opens a conversation and returns its id and handle.
    pub async fn create_session(&self, persona_id: Option<&str>) -> (Uuid, SessionHandle) {
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(self.service.new_conversation(persona_id)));
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            SessionSlot {
                handle: handle.clone(),
                last_used: Instant::now(),
            },
        );
        debug!("Opened session {} ({} open)", id, sessions.len());
        (id, handle)
    }

    /// Looks up a session and marks it as used.
    pub async fn session(&self, id: &Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(id)?;
        slot.last_used = Instant::now();
        Some(slot.handle.clone())
    }

    pub async fn remove_session(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!("Closed session {}", id);
        }
        removed
    }

    /// Drops every session unused for at least `idle`. Returns how many went.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        self.evict_idle_at(Instant::now(), idle).await
    }

    async fn evict_idle_at(&self, now: Instant, idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let unused_for = now.saturating_duration_since(slot.last_used);
            // A running turn holds the conversation lock.
            let busy = slot.handle.try_lock().is_err();
            let keep = busy || unused_for < idle;
            if !keep {
                debug!("Evicting session {} (unused for {:?})", id, unused_for);
            }
            keep
        });
        before - sessions.len()
    }

    /// Runs `evict_idle(idle)` every `every` until the task is aborted.
    pub fn spawn_session_sweeper(&self, idle: Duration, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = state.evict_idle(idle).await;
                if evicted > 0 {
                    info!("Dropped {} idle web session(s)", evicted);
                }
            }
        })
    }
}
