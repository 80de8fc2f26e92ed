use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::player::pokemon::{compare_ascending, Pokemon, PriorityMode};

/// Bag item identifiers. Only the items the policies reason about are listed;
/// anything else the backend reports is dropped at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemId {
    PokeBall,
    GreatBall,
    UltraBall,
    MasterBall,
    Potion,
    SuperPotion,
    HyperPotion,
    MaxPotion,
    Revive,
    MaxRevive,
    RazzBerry,
    BlukBerry,
    NanabBerry,
    WeparBerry,
    PinapBerry,
    LuckyEgg,
    Incense,
}

/// One immutable read of the bag and the specimen box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub items: BTreeMap<ItemId, u32>,
    #[serde(default)]
    pub pokemon: Vec<Pokemon>,
}

impl InventorySnapshot {
    pub fn count(&self, item: ItemId) -> u32 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    pub fn total(&self, items: &[ItemId]) -> u32 {
        items.iter().map(|i| self.count(*i)).sum()
    }

    /// Fainted specimens, excluding gym defenders.
    pub fn to_revive(&self) -> Vec<&Pokemon> {
        self.pokemon
            .iter()
            .filter(|p| p.stamina == 0 && !p.is_deployed())
            .collect()
    }

    /// Injured but standing specimens, excluding gym defenders.
    pub fn to_heal(&self) -> Vec<&Pokemon> {
        self.pokemon
            .iter()
            .filter(|p| p.stamina > 0 && p.stamina < p.stamina_max && !p.is_deployed())
            .collect()
    }

    /// Specimens on the configured evolve list.
    pub fn to_evolve(&self, species: &[u32]) -> Vec<&Pokemon> {
        self.pokemon
            .iter()
            .filter(|p| !p.is_deployed() && species.contains(&p.species))
            .collect()
    }

    /// Non-deployed specimens, weakest first under `mode`.
    pub fn ranked_ascending(&self, mode: PriorityMode) -> Vec<&Pokemon> {
        let mut list: Vec<&Pokemon> =
            self.pokemon.iter().filter(|p| !p.is_deployed()).collect();
        list.sort_by(|a, b| compare_ascending(a, b, mode));
        list
    }

    /// Strongest non-deployed specimen under `mode`.
    pub fn best_not_deployed(&self, mode: PriorityMode) -> Option<&Pokemon> {
        self.ranked_ascending(mode).pop()
    }

    /// Discard candidates: below both keep thresholds, not on the keep list,
    /// weakest first.
    pub fn to_transfer(
        &self,
        keep_above_cp: u32,
        keep_above_iv: f64,
        keep_species: &[u32],
        mode: PriorityMode,
    ) -> Vec<Pokemon> {
        let mut list: Vec<Pokemon> = self
            .pokemon
            .iter()
            .filter(|p| {
                !p.is_deployed()
                    && p.cp < keep_above_cp
                    && p.perfection() < keep_above_iv
                    && !keep_species.contains(&p.species)
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| compare_ascending(a, b, mode));
        list
    }

    /// Items held beyond their configured caps, with the excess count.
    pub fn overflow(&self, caps: &BTreeMap<ItemId, u32>) -> Vec<(ItemId, u32)> {
        caps.iter()
            .filter_map(|(&item, &max)| {
                let held = self.count(item);
                (held > max).then(|| (item, held - max))
            })
            .collect()
    }
}
