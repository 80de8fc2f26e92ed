//! Inventory and roster maintenance: revive, heal, evolve, transfer,
//! recycle, consumable boosts, and the rate-limited profile/export refreshes.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::agent::farming::Farmer;
use crate::agent::game_api::BoostStatus;
use crate::agent::items::best_healing_item;
use crate::player::inventory::ItemId;
use crate::player::pokemon::Pokemon;

/// Roster exports happen at most this often.
const EXPORT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Lucky eggs and incense run half an hour; re-activation before that is
/// wasted.
const BOOST_COOLDOWN: Duration = Duration::from_secs(30 * 60);

impl Farmer {
    /// Refreshes the cached player profile and logs a status line. Rate
    /// limited unless forced.
    pub(crate) async fn refresh_profile(&mut self, force: bool) -> Result<()> {
        let interval = Duration::from_secs(self.settings.display_refresh_minutes * 60);
        let now = Instant::now();
        if !force
            && self
                .state
                .last_profile_refresh
                .is_some_and(|t| now.duration_since(t) < interval)
        {
            return Ok(());
        }
        self.state.last_profile_refresh = Some(now);
        let profile = self
            .client
            .get_player()
            .await
            .context("fetching player profile")?;
        let inventory = self.client.get_inventory(false).await?;
        self.state.stats.stardust = profile.stardust;
        info!(
            name = %profile.name,
            level = profile.level,
            stardust = profile.stardust,
            specimens = inventory.pokemon.len(),
            experience = self.state.stats.experience,
            caught = self.state.stats.caught,
            stops = self.state.stats.stops_visited,
            "session status"
        );
        self.state.profile = Some(profile);
        Ok(())
    }

    /// Hands the roster to the export sink. Rate limited unless forced.
    pub(crate) async fn export_roster(&mut self, force: bool) -> Result<()> {
        let now = Instant::now();
        if !force
            && self
                .state
                .last_export
                .is_some_and(|t| now.duration_since(t) < EXPORT_INTERVAL)
        {
            return Ok(());
        }
        self.state.last_export = Some(now);
        let inventory = self.client.get_inventory(false).await?;
        self.export
            .export(self.state.profile.as_ref(), &inventory)
            .await
            .context("exporting roster")?;
        Ok(())
    }

    pub(crate) async fn revive_pokemon(&mut self) -> Result<()> {
        let inventory = self.client.get_inventory(true).await?;
        let fainted: Vec<Pokemon> = inventory.to_revive().into_iter().cloned().collect();
        for specimen in fainted {
            if !self.state.is_running() {
                break;
            }
            let bag = self.client.get_inventory(false).await?;
            let Some(item) = best_healing_item(&bag, 0, specimen.stamina_max) else {
                info!("out of revives");
                break;
            };
            let response = self.client.use_potion(item, specimen.id).await?;
            if response.success {
                info!(species = specimen.species, cp = specimen.cp, "specimen revived");
            } else {
                warn!(species = specimen.species, "revive failed");
                break;
            }
        }
        Ok(())
    }

    /// Heals each injured specimen with repeated potions until it is full,
    /// near-full, or the stock runs out.
    pub(crate) async fn heal_pokemon(&mut self) -> Result<()> {
        let inventory = self.client.get_inventory(true).await?;
        let injured: Vec<Pokemon> = inventory.to_heal().into_iter().cloned().collect();
        'roster: for specimen in injured {
            let mut stamina = specimen.stamina;
            while stamina < specimen.stamina_max {
                if !self.state.is_running() {
                    break 'roster;
                }
                let bag = self.client.get_inventory(false).await?;
                let Some(item) = best_healing_item(&bag, stamina, specimen.stamina_max)
                else {
                    break;
                };
                let response = self.client.use_potion(item, specimen.id).await?;
                if !response.success {
                    warn!(species = specimen.species, "healing failed");
                    break 'roster;
                }
                if response.stamina <= stamina {
                    break;
                }
                stamina = response.stamina;
            }
            if stamina > specimen.stamina {
                info!(species = specimen.species, stamina, "specimen healed");
            }
        }
        Ok(())
    }

    pub(crate) async fn evolve_pokemon(&mut self) -> Result<()> {
        if self.settings.species_to_evolve.is_empty() {
            return Ok(());
        }
        let inventory = self.client.get_inventory(true).await?;
        let candidates: Vec<Pokemon> = inventory
            .to_evolve(&self.settings.species_to_evolve)
            .into_iter()
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        // An egg doubles evolution experience, so light one first if allowed.
        if self.settings.use_lucky_eggs {
            self.apply_lucky_egg().await?;
        }
        for specimen in candidates {
            if !self.state.is_running() {
                break;
            }
            let response = self
                .client
                .evolve(specimen.id)
                .await
                .context("evolving specimen")?;
            if response.success {
                self.state.stats.evolved += 1;
                self.state.stats.experience += u64::from(response.experience);
                info!(
                    species = specimen.species,
                    experience = response.experience,
                    "specimen evolved"
                );
            } else {
                warn!(species = specimen.species, "evolution failed");
            }
            self.pacing.pause(self.pacing.scan_ms).await;
        }
        Ok(())
    }

    pub(crate) async fn transfer_pokemon(&mut self) -> Result<()> {
        let inventory = self.client.get_inventory(true).await?;
        let discards = inventory.to_transfer(
            self.settings.keep_above_cp,
            self.settings.keep_above_iv,
            &self.settings.species_not_to_transfer,
            self.settings.transfer_priority,
        );
        self.transfer_batch(&discards).await
    }

    pub(crate) async fn transfer_batch(&mut self, discards: &[Pokemon]) -> Result<()> {
        for specimen in discards {
            if !self.state.is_running() {
                break;
            }
            self.client
                .transfer(specimen.id)
                .await
                .context("transferring specimen")?;
            self.state.stats.transferred += 1;
            info!(
                species = specimen.species,
                cp = specimen.cp,
                iv = specimen.perfection() as u32,
                "specimen transferred"
            );
        }
        Ok(())
    }

    /// Recycles everything above the configured caps and resets the
    /// searched-stop counter that triggers these sweeps.
    pub(crate) async fn recycle_items(&mut self) -> Result<()> {
        self.state.recycle_counter = 0;
        if self.settings.item_caps.is_empty() {
            return Ok(());
        }
        let inventory = self.client.get_inventory(true).await?;
        for (item, excess) in inventory.overflow(&self.settings.item_caps) {
            if !self.state.is_running() {
                break;
            }
            self.client
                .recycle(item, excess)
                .await
                .context("recycling items")?;
            self.state.stats.recycled += excess;
            info!(?item, count = excess, "recycled overflow");
        }
        Ok(())
    }

    pub(crate) async fn apply_lucky_egg(&mut self) -> Result<()> {
        if !self.settings.use_lucky_eggs {
            return Ok(());
        }
        let now = Instant::now();
        if self
            .state
            .last_lucky_egg
            .is_some_and(|t| now.duration_since(t) < BOOST_COOLDOWN)
        {
            return Ok(());
        }
        let inventory = self.client.get_inventory(false).await?;
        if inventory.count(ItemId::LuckyEgg) == 0 {
            return Ok(());
        }
        match self.client.use_xp_boost().await.context("using lucky egg")? {
            BoostStatus::Success => {
                self.state.last_lucky_egg = Some(now);
                info!("lucky egg activated");
            }
            BoostStatus::AlreadyActive => {
                // A running boost still arms the cooldown.
                self.state.last_lucky_egg = Some(now);
                debug!("xp boost already active");
            }
            BoostStatus::Other => warn!("lucky egg activation failed"),
        }
        Ok(())
    }

    pub(crate) async fn apply_incense(&mut self) -> Result<()> {
        if !self.settings.use_incense {
            return Ok(());
        }
        let now = Instant::now();
        if self
            .state
            .last_incense
            .is_some_and(|t| now.duration_since(t) < BOOST_COOLDOWN)
        {
            return Ok(());
        }
        let inventory = self.client.get_inventory(false).await?;
        if inventory.count(ItemId::Incense) == 0 {
            return Ok(());
        }
        match self.client.use_incense().await.context("using incense")? {
            BoostStatus::Success => {
                self.state.last_incense = Some(now);
                info!("incense lit");
            }
            BoostStatus::AlreadyActive => {
                self.state.last_incense = Some(now);
                debug!("incense already burning");
            }
            BoostStatus::Other => warn!("incense activation failed"),
        }
        Ok(())
    }

    /// The sweep that follows every scan: patch up, evolve, and thin the
    /// roster as configured.
    pub(crate) async fn after_catch_maintenance(&mut self) -> Result<()> {
        if self.settings.use_revives {
            self.revive_pokemon().await?;
        }
        if self.settings.use_potions {
            self.heal_pokemon().await?;
        }
        if self.settings.evolve_pokemon {
            self.evolve_pokemon().await?;
        }
        if self.settings.transfer_pokemon {
            self.transfer_pokemon().await?;
        }
        Ok(())
    }
}
