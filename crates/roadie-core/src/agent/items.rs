//! Capture-item and healing-item selection.
//!
//! Selection runs strongest-tier-first over small rule tables: a tier matches
//! on the target's CP, or on a high-IV target paired with a low capture
//! probability. A separate balancing pass may substitute an adjacent tier
//! when stocks are badly skewed. The functions are pure over an
//! [`InventorySnapshot`] so every branch is unit-testable.

use crate::player::inventory::{InventorySnapshot, ItemId};

/// Ball tiers, weakest to strongest.
pub const BALL_TIERS: [ItemId; 4] = [
    ItemId::PokeBall,
    ItemId::GreatBall,
    ItemId::UltraBall,
    ItemId::MasterBall,
];

pub const BERRY_TIERS: [ItemId; 5] = [
    ItemId::RazzBerry,
    ItemId::BlukBerry,
    ItemId::NanabBerry,
    ItemId::WeparBerry,
    ItemId::PinapBerry,
];

const POTION_TIERS: [ItemId; 4] = [
    ItemId::Potion,
    ItemId::SuperPotion,
    ItemId::HyperPotion,
    ItemId::MaxPotion,
];

const REVIVE_TIERS: [ItemId; 2] = [ItemId::Revive, ItemId::MaxRevive];

/// A target no berry is spent on at or below this CP.
const BERRY_CP_FLOOR: u32 = 350;

/// Above this health fraction, healing is not worth an item.
const HEAL_SKIP_FRACTION: f64 = 0.90;

/// The engaged target as the policies see it.
#[derive(Debug, Clone, Copy)]
pub struct TargetProfile {
    pub cp: u32,
    pub iv_percent: f64,
    pub capture_probability: f64,
}

struct TierRule {
    item: ItemId,
    min_cp: u32,
    /// High-IV clause: matches when IV >= the configured floor and the
    /// capture probability is below this ceiling.
    iv_probability_ceiling: Option<f64>,
}

/// Strongest first; the final rule is unconditional.
const BALL_RULES: [TierRule; 4] = [
    TierRule { item: ItemId::MasterBall, min_cp: 1_500, iv_probability_ceiling: None },
    TierRule { item: ItemId::UltraBall, min_cp: 1_000, iv_probability_ceiling: Some(0.40) },
    TierRule { item: ItemId::GreatBall, min_cp: 300, iv_probability_ceiling: Some(0.50) },
    TierRule { item: ItemId::PokeBall, min_cp: 0, iv_probability_ceiling: None },
];

const BERRY_RULES: [TierRule; 5] = [
    TierRule { item: ItemId::PinapBerry, min_cp: 2_000, iv_probability_ceiling: None },
    TierRule { item: ItemId::WeparBerry, min_cp: 1_500, iv_probability_ceiling: None },
    TierRule { item: ItemId::NanabBerry, min_cp: 1_000, iv_probability_ceiling: Some(0.40) },
    TierRule { item: ItemId::BlukBerry, min_cp: 500, iv_probability_ceiling: Some(0.50) },
    TierRule { item: ItemId::RazzBerry, min_cp: 150, iv_probability_ceiling: None },
];

fn rule_matches(rule: &TierRule, target: &TargetProfile, iv_floor: f64) -> bool {
    if target.cp >= rule.min_cp {
        return true;
    }
    match rule.iv_probability_ceiling {
        Some(ceiling) => {
            target.iv_percent >= iv_floor && target.capture_probability < ceiling
        }
        None => false,
    }
}

fn tier_index(item: ItemId) -> usize {
    BALL_TIERS
        .iter()
        .position(|&b| b == item)
        .unwrap_or_default()
}

/// When the adjacent tier holds more than three times the stock of the
/// selected one, spend from the adjacent tier instead. Upgrades are
/// considered before downgrades.
fn rebalance(inventory: &InventorySnapshot, selected: ItemId) -> ItemId {
    let idx = tier_index(selected);
    let own = inventory.count(selected);
    if idx + 1 < BALL_TIERS.len() {
        let above = BALL_TIERS[idx + 1];
        if inventory.count(above) > own * 3 {
            return above;
        }
    }
    if idx > 0 {
        let below = BALL_TIERS[idx - 1];
        if inventory.count(below) > own * 3 {
            return below;
        }
    }
    selected
}

/// Picks the ball for the current throw, or `None` when the bag holds no
/// balls at all. Tier rules run strongest first; if no rule with stock
/// matches, falls back to the weakest ball in stock.
pub fn best_ball(
    inventory: &InventorySnapshot,
    target: &TargetProfile,
    iv_floor: f64,
    balancing: bool,
) -> Option<ItemId> {
    if inventory.total(&BALL_TIERS) == 0 {
        return None;
    }
    for rule in &BALL_RULES {
        if inventory.count(rule.item) > 0 && rule_matches(rule, target, iv_floor) {
            let pick = if balancing {
                rebalance(inventory, rule.item)
            } else {
                rule.item
            };
            return Some(pick);
        }
    }
    BALL_TIERS.iter().copied().find(|&b| inventory.count(b) > 0)
}

/// Picks a berry to soften the target, or `None` when the target is too weak
/// to justify one, no rule matches, or the bag holds no berries.
pub fn best_berry(
    inventory: &InventorySnapshot,
    target: &TargetProfile,
    iv_floor: f64,
) -> Option<ItemId> {
    if target.cp <= BERRY_CP_FLOOR || inventory.total(&BERRY_TIERS) == 0 {
        return None;
    }
    BERRY_RULES
        .iter()
        .find(|rule| inventory.count(rule.item) > 0 && rule_matches(rule, target, iv_floor))
        .map(|rule| rule.item)
}

/// Healing-potion deficit limits, one row per selection pass. A limit of
/// `None` means the item applies at any deficit.
const POTION_PASSES: [[(ItemId, Option<u32>); 4]; 4] = [
    // Exact fit.
    [
        (ItemId::Potion, Some(21)),
        (ItemId::SuperPotion, Some(51)),
        (ItemId::HyperPotion, Some(201)),
        (ItemId::MaxPotion, None),
    ],
    // One tier up.
    [
        (ItemId::SuperPotion, Some(21)),
        (ItemId::HyperPotion, Some(51)),
        (ItemId::MaxPotion, Some(201)),
        (ItemId::MaxPotion, None),
    ],
    // One tier down.
    [
        (ItemId::Potion, Some(51)),
        (ItemId::SuperPotion, Some(201)),
        (ItemId::HyperPotion, None),
        (ItemId::HyperPotion, None),
    ],
    // Anything left, strongest first.
    [
        (ItemId::MaxPotion, None),
        (ItemId::HyperPotion, None),
        (ItemId::SuperPotion, None),
        (ItemId::Potion, None),
    ],
];

/// Picks the healing item for a specimen, or `None` when healing is not
/// warranted (full or near-full health) or the relevant stock is empty.
/// Fainted specimens get a revive, preferring the max variant.
pub fn best_healing_item(
    inventory: &InventorySnapshot,
    stamina: u32,
    stamina_max: u32,
) -> Option<ItemId> {
    if stamina_max == 0 || stamina >= stamina_max {
        return None;
    }
    if stamina == 0 {
        if inventory.total(&REVIVE_TIERS) == 0 {
            return None;
        }
        return if inventory.count(ItemId::MaxRevive) > 0 {
            Some(ItemId::MaxRevive)
        } else {
            Some(ItemId::Revive)
        };
    }
    if inventory.total(&POTION_TIERS) == 0 {
        return None;
    }
    if f64::from(stamina) / f64::from(stamina_max) >= HEAL_SKIP_FRACTION {
        return None;
    }
    let deficit = stamina_max - stamina;
    for pass in &POTION_PASSES {
        for &(item, limit) in pass {
            if inventory.count(item) == 0 {
                continue;
            }
            if limit.map_or(true, |max| deficit < max) {
                return Some(item);
            }
        }
    }
    None
}
