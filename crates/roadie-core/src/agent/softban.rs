//! Flee-streak bookkeeping and soft-ban detection.
//!
//! Every flee (a target vanishing after a throw, or a fort search paying
//! zero experience) feeds a counter. More than [`FLEE_THRESHOLD`] flees with
//! consecutive gaps under [`FLEE_WINDOW`] raises the soft-ban flag; the first
//! successful catch or experience-paying fort search lifts it. The tracker
//! takes `now` explicitly so tests drive time directly.

use std::time::{Duration, Instant};

pub const FLEE_WINDOW: Duration = Duration::from_secs(180);
pub const FLEE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct FleeTracker {
    count: u32,
    last_flee: Option<Instant>,
    ban_start: Option<Instant>,
    soft_ban: bool,
}

impl FleeTracker {
    pub fn is_soft_banned(&self) -> bool {
        self.soft_ban
    }

    pub fn flee_count(&self) -> u32 {
        self.count
    }

    /// Called at the top of each catch iteration. A streak that has gone
    /// stale without tripping the detector is forgotten; under an active ban
    /// only success events clear state.
    pub fn tick(&mut self, now: Instant) {
        if self.soft_ban || self.count == 0 {
            return;
        }
        if let Some(last) = self.last_flee {
            if now.duration_since(last) > FLEE_WINDOW {
                self.count = 0;
                self.last_flee = None;
            }
        }
    }

    /// Records a flee. Returns `true` when this one tripped the detector.
    pub fn note_flee(&mut self, now: Instant) -> bool {
        self.count += 1;
        let within_window = self
            .last_flee
            .is_some_and(|last| now.duration_since(last) < FLEE_WINDOW);
        let tripped = !self.soft_ban && self.count > FLEE_THRESHOLD && within_window;
        if tripped {
            self.soft_ban = true;
            self.ban_start = Some(now);
        }
        self.last_flee = Some(now);
        tripped
    }

    /// Records a confirmed-working interaction, clearing the streak. Returns
    /// how long a ban was in force if this lifted one.
    pub fn note_success(&mut self, now: Instant) -> Option<Duration> {
        let lifted = if self.soft_ban {
            self.ban_start.map(|start| now.duration_since(start))
        } else {
            None
        };
        self.soft_ban = false;
        self.ban_start = None;
        self.count = 0;
        self.last_flee = None;
        lifted
    }
}
