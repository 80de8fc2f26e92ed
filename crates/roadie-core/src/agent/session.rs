//! Session lifetime: login, restart-on-failure, and the state that survives
//! restarts.
//!
//! The controller is a flat loop, never recursion: every login failure is
//! classified, waited out, and retried from the top while the shared running
//! flag stays set. Farming state (flee streaks, timers, the initialized
//! marker) lives in [`SessionState`] and persists across restarts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::agent::farming::Farmer;
use crate::agent::game_api::{GameClient, LoginFailure, PlayerProfile};
use crate::agent::softban::FleeTracker;
use crate::config::Settings;
use crate::sweeper::SnapshotStore;

/// Session counters surfaced in the periodic profile log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub experience: u64,
    pub caught: u32,
    pub transferred: u32,
    pub evolved: u32,
    pub recycled: u32,
    pub stops_visited: u32,
    pub gyms_visited: u32,
    pub stardust: u64,
}

/// Mutable farming state. Lives outside the farmer's collaborators so a
/// relogin resumes with streaks and timers intact.
#[derive(Debug)]
pub struct SessionState {
    running: Arc<AtomicBool>,
    pub initialized: bool,
    pub flee: FleeTracker,
    pub recycle_counter: u32,
    /// True while simulating flight; suppresses ground-only behavior.
    pub in_flight: bool,
    /// Gyms already attempted this tour; cleared on long-range travel.
    pub gym_attempts: HashSet<String>,
    pub profile: Option<PlayerProfile>,
    pub last_export: Option<Instant>,
    pub last_profile_refresh: Option<Instant>,
    pub last_lucky_egg: Option<Instant>,
    pub last_incense: Option<Instant>,
    pub destination_index: usize,
    pub destination_deadline: Option<Instant>,
    pub stats: Stats,
}

impl SessionState {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            initialized: false,
            flee: FleeTracker::default(),
            recycle_counter: 0,
            in_flight: false,
            gym_attempts: HashSet::new(),
            profile: None,
            last_export: None,
            last_profile_refresh: None,
            last_lucky_egg: None,
            last_incense: None,
            destination_index: 0,
            destination_deadline: None,
            stats: Stats::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

/// Clonable remote control for shutting the session down from another task.
#[derive(Clone)]
pub struct SessionHandle {
    running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Hook for replacing rejected credentials. `None` shuts the session down.
pub trait CredentialPrompt: Send + Sync {
    fn prompt(&self) -> Option<(String, String)>;
}

/// Waits between restart attempts, by failure class. Zeroed in tests.
#[derive(Debug, Clone, Copy)]
pub struct RetryDelays {
    pub offline: Duration,
    pub interactive: Duration,
    pub unknown: Duration,
}

impl Default for RetryDelays {
    fn default() -> Self {
        Self {
            offline: Duration::from_secs(30),
            interactive: Duration::from_secs(15),
            unknown: Duration::from_secs(5),
        }
    }
}

pub struct SessionController {
    client: Arc<dyn GameClient>,
    settings: Arc<Settings>,
    snapshots: Arc<dyn SnapshotStore>,
    prompt: Option<Arc<dyn CredentialPrompt>>,
    delays: RetryDelays,
    running: Arc<AtomicBool>,
    farmer: Farmer,
}

impl SessionController {
    pub fn new(
        farmer: Farmer,
        client: Arc<dyn GameClient>,
        settings: Arc<Settings>,
        snapshots: Arc<dyn SnapshotStore>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            settings,
            snapshots,
            prompt: None,
            delays: RetryDelays::default(),
            running,
            farmer,
        }
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_delays(mut self, delays: RetryDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle { running: Arc::clone(&self.running) }
    }

    /// Runs until the running flag drops. Login failures restart the session
    /// after a class-specific wait; only a credential rejection without a
    /// prompt (or a declined prompt) ends it early.
    pub async fn run(&mut self) -> Result<()> {
        self.snapshots
            .prepare()
            .context("preparing snapshot staging directories")?;
        let mut username = self.settings.username.clone();
        let mut password = self.settings.password.clone();
        while self.running.load(Ordering::SeqCst) {
            info!(scheme = ?self.settings.auth, user = %username, "logging in");
            let outcome = match self
                .client
                .login(self.settings.auth, &username, &password)
                .await
            {
                Ok(()) => self.farmer.run().await,
                Err(err) => Err(err),
            };
            let Err(err) = outcome else {
                continue;
            };
            match err.downcast_ref::<LoginFailure>() {
                Some(LoginFailure::Offline) => {
                    warn!(
                        wait_s = self.delays.offline.as_secs(),
                        "authentication backend offline, waiting before retry"
                    );
                    tokio::time::sleep(self.delays.offline).await;
                }
                Some(LoginFailure::InteractiveRequired) => {
                    warn!(
                        wait_s = self.delays.interactive.as_secs(),
                        "account requires interactive verification, waiting before retry"
                    );
                    tokio::time::sleep(self.delays.interactive).await;
                }
                Some(LoginFailure::BadCredentials) => {
                    error!("login rejected for current credentials");
                    match self.prompt.as_ref().and_then(|p| p.prompt()) {
                        Some((new_user, new_pass)) => {
                            info!("retrying with replacement credentials");
                            username = new_user;
                            password = new_pass;
                        }
                        None => {
                            info!("no replacement credentials, shutting down");
                            self.running.store(false, Ordering::SeqCst);
                        }
                    }
                }
                None => {
                    error!(error = %err, "session failed, restarting");
                    tokio::time::sleep(self.delays.unknown).await;
                }
            }
        }
        info!("session stopped");
        Ok(())
    }
}
