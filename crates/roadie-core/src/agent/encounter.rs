//! Engaging targets: the scan sweep, the catch state machine, and the
//! box-full trim.
//!
//! One state machine serves wild and lured encounters; only the identifiers
//! sent with each throw differ. The machine loops for as long as the target
//! merely shakes off a ball (missed or escaped) and ends on a catch, a flee,
//! an error, or an empty bag.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::agent::events::BotEvent;
use crate::agent::farming::Farmer;
use crate::agent::game_api::{CatchStatus, EncounterStatus};
use crate::agent::items::{best_ball, best_berry, TargetProfile};
use crate::player::inventory::ItemId;
use crate::player::pokemon::Pokemon;
use crate::world::map::{Catchable, Fort};

/// Berries are only worth spending when the throw is this unlikely to hold.
const BERRY_PROBABILITY_CEILING: f64 = 0.35;

/// A flee streak longer than this forces cheap throws.
const CHEAP_THROW_FLEE_COUNT: u32 = 1;

/// What an active encounter throws at.
#[derive(Debug, Clone)]
pub(crate) enum CatchTarget {
    Wild { encounter_id: u64, spawn_point_id: String },
    Lure { encounter_id: u64, fort_id: String },
}

impl CatchTarget {
    fn encounter_id(&self) -> u64 {
        match self {
            Self::Wild { encounter_id, .. } | Self::Lure { encounter_id, .. } => *encounter_id,
        }
    }

    fn token(&self) -> &str {
        match self {
            Self::Wild { spawn_point_id, .. } => spawn_point_id,
            Self::Lure { fort_id, .. } => fort_id,
        }
    }

    fn lured(&self) -> bool {
        matches!(self, Self::Lure { .. })
    }
}

impl Farmer {
    /// Scans the map and engages every catchable spawn, nearest first, then
    /// runs the post-catch maintenance sweep.
    pub(crate) async fn catch_nearby_pokemons(&mut self) -> Result<()> {
        let map = self
            .client
            .get_map_objects()
            .await
            .context("scanning for spawns")?;
        let here = self.client.position();
        let mut targets: Vec<Catchable> = map
            .catchables
            .iter()
            .filter(|c| !self.settings.species_not_to_catch.contains(&c.species))
            .cloned()
            .collect();
        targets.sort_by(|a, b| {
            a.position
                .distance_m(&here)
                .partial_cmp(&b.position.distance_m(&here))
                .unwrap_or(Ordering::Equal)
        });
        if !targets.is_empty() {
            debug!(count = targets.len(), "engaging nearby spawns");
        }
        for target in targets {
            if !self.state.is_running() {
                break;
            }
            self.pacing.pause(self.pacing.scan_ms).await;
            let response = self
                .client
                .encounter(target.encounter_id, &target.spawn_point_id)
                .await
                .context("starting encounter")?;
            match response.status {
                EncounterStatus::Success => {
                    if let Some(data) = response.data {
                        let catch_target = CatchTarget::Wild {
                            encounter_id: target.encounter_id,
                            spawn_point_id: target.spawn_point_id.clone(),
                        };
                        self.catch_encounter(
                            &data.pokemon,
                            data.capture_probability,
                            catch_target,
                        )
                        .await?;
                    }
                }
                EncounterStatus::PokemonInventoryFull => {
                    warn!("specimen box is full");
                    self.trim_overflow().await?;
                }
                EncounterStatus::PokemonFled => {
                    if self.state.flee.note_flee(Instant::now()) {
                        warn!("soft ban detected");
                        self.events.publish(&BotEvent::SoftBanDetected);
                    }
                }
                EncounterStatus::Other => {
                    warn!(species = target.species, "encounter did not start");
                }
            }
            self.pacing.pause(self.pacing.scan_ms).await;
        }
        self.after_catch_maintenance().await
    }

    /// Engages the target a lure module is advertising, if any.
    pub(crate) async fn lure_encounter(&mut self, fort: &Fort) -> Result<()> {
        let Some(lure) = fort.lure.as_ref() else {
            return Ok(());
        };
        if let Some(species) = lure.active_species {
            if self.settings.species_not_to_catch.contains(&species) {
                debug!(species, "skipping listed species at lure");
                return Ok(());
            }
        }
        let response = self
            .client
            .encounter_lure(lure.encounter_id, &lure.fort_id)
            .await
            .context("starting lure encounter")?;
        match response.status {
            EncounterStatus::Success => {
                if let Some(data) = response.data {
                    let target = CatchTarget::Lure {
                        encounter_id: lure.encounter_id,
                        fort_id: lure.fort_id.clone(),
                    };
                    self.catch_encounter(&data.pokemon, data.capture_probability, target)
                        .await?;
                }
            }
            status => debug!(?status, "lure encounter unavailable"),
        }
        Ok(())
    }

    /// The per-encounter machine: pick a ball, maybe soften with a berry,
    /// throw, book the outcome, and repeat while the target stays engaged.
    pub(crate) async fn catch_encounter(
        &mut self,
        wild: &Pokemon,
        capture_probability: f64,
        target: CatchTarget,
    ) -> Result<()> {
        self.events.publish(&BotEvent::EncounterStarted {
            species: wild.species,
            cp: wild.cp,
            lured: target.lured(),
        });
        let profile = TargetProfile {
            cp: wild.cp,
            iv_percent: wild.perfection(),
            capture_probability,
        };
        let mut attempt = 1u32;
        loop {
            if !self.state.is_running() {
                return Ok(());
            }
            let now = Instant::now();
            self.state.flee.tick(now);
            let inventory = self
                .client
                .get_inventory(false)
                .await
                .context("reading the bag")?;
            let Some(mut ball) = best_ball(
                &inventory,
                &profile,
                self.settings.keep_above_iv,
                self.settings.ball_balancing,
            ) else {
                warn!(
                    species = wild.species,
                    cp = wild.cp,
                    "no capture items left, abandoning encounter"
                );
                return Ok(());
            };
            if self.state.flee.flee_count() > CHEAP_THROW_FLEE_COUNT {
                // Streak in progress: risk nothing better than a plain ball.
                ball = ItemId::PokeBall;
            }
            if self.state.flee.flee_count() == 0
                && capture_probability < BERRY_PROBABILITY_CEILING
            {
                if let Some(berry) =
                    best_berry(&inventory, &profile, self.settings.keep_above_iv)
                {
                    self.client
                        .use_capture_item(target.encounter_id(), berry, target.token())
                        .await
                        .context("feeding capture aid")?;
                    debug!(item = ?berry, "capture aid used");
                    self.pacing.pause(self.pacing.berry_ms).await;
                }
            }
            let response = self
                .client
                .catch(target.encounter_id(), target.token(), ball)
                .await
                .context("throwing ball")?;
            match response.status {
                CatchStatus::Success => {
                    let experience: u32 = response.xp_awarded.iter().sum();
                    if let Some(after) = self.state.flee.note_success(now) {
                        info!(after_s = after.as_secs(), "soft ban lifted");
                        self.events.publish(&BotEvent::SoftBanLifted { after });
                    }
                    self.state.stats.caught += 1;
                    self.state.stats.experience += u64::from(experience);
                    let player = self
                        .client
                        .get_player()
                        .await
                        .context("refreshing profile after catch")?;
                    self.state.stats.stardust = player.stardust;
                    self.state.profile = Some(player);
                    info!(
                        species = wild.species,
                        cp = wild.cp,
                        iv = wild.perfection() as u32,
                        experience,
                        attempt,
                        "catch succeeded"
                    );
                    self.events.publish(&BotEvent::CatchSuccess {
                        species: wild.species,
                        cp: wild.cp,
                        experience,
                        lured: target.lured(),
                    });
                }
                CatchStatus::Flee => {
                    if self.state.flee.note_flee(now) {
                        warn!("soft ban detected");
                        self.events.publish(&BotEvent::SoftBanDetected);
                    }
                    info!(species = wild.species, attempt, "target fled");
                    self.events.publish(&BotEvent::CatchAttempt {
                        species: wild.species,
                        status: response.status,
                        attempt,
                        lured: target.lured(),
                    });
                }
                status => {
                    debug!(?status, attempt, "throw did not hold");
                    self.events.publish(&BotEvent::CatchAttempt {
                        species: wild.species,
                        status,
                        attempt,
                        lured: target.lured(),
                    });
                }
            }
            attempt += 1;
            self.pacing.pause(self.pacing.catch_ms).await;
            if !matches!(response.status, CatchStatus::Missed | CatchStatus::Escape) {
                return Ok(());
            }
        }
    }

    /// Sheds the configured number of lowest-priority spare specimens when
    /// the box fills mid-encounter.
    pub(crate) async fn trim_overflow(&mut self) -> Result<()> {
        if !self.settings.transfer_pokemon || self.settings.transfer_trim_fat_count == 0 {
            return Ok(());
        }
        info!(
            count = self.settings.transfer_trim_fat_count,
            "shedding weakest specimens to make room"
        );
        let inventory = self.client.get_inventory(true).await?;
        let victims: Vec<Pokemon> = inventory
            .ranked_ascending(self.settings.transfer_priority)
            .into_iter()
            .filter(|p| !self.settings.species_not_to_transfer.contains(&p.species))
            .take(self.settings.transfer_trim_fat_count)
            .cloned()
            .collect();
        self.transfer_batch(&victims).await
    }
}
