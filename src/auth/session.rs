//! Server side bookkeeping of live token sessions.
//!
//! A token is usable while its session is active: it must have been used
//! within the expiration window. Each authenticated request moves the window
//! forward (sliding expiration). Sessions for tokens that are never presented
//! again are removed by a periodic sweep.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

/// Tracks when each live token was last used.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, Instant>,
    expiration: Duration,
}

impl SessionManager {
    /// Create an empty session manager whose sessions expire after `expiration` of idleness.
    pub fn new(expiration: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            expiration,
        }
    }

    /// The expiration window.
    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// The number of sessions currently held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are held.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_stale(&self, last_access: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_access) >= self.expiration
    }

    /// Whether `token` should be refused.
    ///
    /// Unknown tokens are reported as expired. A known token past its window is
    /// removed on the spot.
    pub fn is_expired(&self, token: &str) -> bool {
        let now = Instant::now();

        if self
            .sessions
            .remove_if(token, |_, last_access| self.is_stale(*last_access, now))
            .is_some()
        {
            tracing::debug!("Removed expired session on lookup");
            return true;
        }

        !self.sessions.contains_key(token)
    }

    /// Record a use of `token`, starting or extending its session.
    pub fn touch(&self, token: &str) {
        self.sessions.insert(token.to_owned(), Instant::now());
    }

    /// Extend the session of `token` if it still has one.
    ///
    /// Unlike [SessionManager::touch], a session that was ended in the
    /// meantime stays ended. Returns whether the session was extended.
    pub fn refresh(&self, token: &str) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut last_access) => {
                *last_access = Instant::now();
                true
            }
            None => false,
        }
    }

    /// End the session for `token`, if there is one.
    pub fn invalidate(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Remove every expired session and return how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.sessions.retain(|_, last_access| {
            let keep = !self.is_stale(*last_access, now);
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    /// Start a background task that calls [SessionManager::sweep] every `interval`.
    ///
    /// The first sweep happens one `interval` after the task starts. Use the
    /// returned [SessionSweeper] to stop the task.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SessionSweeper {
        let (shutdown, mut shutdown_signal) = watch::channel(false);
        let sessions = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = sessions.sweep();
                        if removed > 0 {
                            tracing::info!("Swept {removed} expired session(s), {} remaining", sessions.len());
                        }
                    }
                    // Also fires if the sweeper handle was dropped without calling stop.
                    _ = shutdown_signal.changed() => break,
                }
            }

            tracing::debug!("Session sweeper stopped");
        });

        SessionSweeper { shutdown, task }
    }
}

/// A handle to the background task started by [SessionManager::spawn_sweeper].
#[derive(Debug)]
pub struct SessionSweeper {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionSweeper {
    /// Signal the sweep task to stop and wait for it to finish.
    pub async fn stop(self) {
        // An error means the task already exited, which is what we want anyway.
        let _ = self.shutdown.send(true);

        if let Err(error) = self.task.await {
            tracing::error!("Session sweeper task failed: {error}");
        }
    }
}
