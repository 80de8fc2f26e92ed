use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A caught specimen, or the wild one reported by an encounter (in which case
/// `id` is zero and stamina fields describe the wild state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    #[serde(default)]
    pub id: u64,
    pub species: u32,
    pub cp: u32,
    #[serde(default)]
    pub stamina: u32,
    #[serde(default)]
    pub stamina_max: u32,
    /// Individual values, 0..=15 each.
    #[serde(default)]
    pub attack_iv: u32,
    #[serde(default)]
    pub defense_iv: u32,
    #[serde(default)]
    pub stamina_iv: u32,
    #[serde(default)]
    pub deployed_fort_id: Option<String>,
}

impl Pokemon {
    /// IV completeness as a percentage of the 45-point maximum.
    pub fn perfection(&self) -> f64 {
        f64::from(self.attack_iv + self.defense_iv + self.stamina_iv) / 45.0 * 100.0
    }

    /// Blended worth used for transfer and gym-deploy ordering.
    pub fn value(&self) -> f64 {
        f64::from(self.cp) * self.perfection() / 100.0
    }

    pub fn is_deployed(&self) -> bool {
        self.deployed_fort_id.is_some()
    }
}

/// Which axis ranks specimens when picking keepers and discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    Cp,
    Iv,
    Value,
}

/// Sort key for a specimen under `mode`. Ties break on max stamina so two
/// equal-CP specimens order deterministically.
pub fn priority_key(pokemon: &Pokemon, mode: PriorityMode) -> (f64, u32) {
    let primary = match mode {
        PriorityMode::Cp => f64::from(pokemon.cp),
        PriorityMode::Iv => pokemon.perfection(),
        PriorityMode::Value => pokemon.value(),
    };
    let secondary = match mode {
        PriorityMode::Cp => pokemon.stamina,
        PriorityMode::Iv | PriorityMode::Value => pokemon.stamina_max,
    };
    (primary, secondary)
}

/// Ascending order: worst first, so a prefix of the sorted list is the
/// transfer candidate set.
pub fn compare_ascending(a: &Pokemon, b: &Pokemon, mode: PriorityMode) -> Ordering {
    let ka = priority_key(a, mode);
    let kb = priority_key(b, mode);
    ka.0.partial_cmp(&kb.0)
        .unwrap_or(Ordering::Equal)
        .then(ka.1.cmp(&kb.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specimen(cp: u32, ivs: (u32, u32, u32), stamina_max: u32) -> Pokemon {
        Pokemon {
            id: 1,
            species: 16,
            cp,
            stamina: stamina_max,
            stamina_max,
            attack_iv: ivs.0,
            defense_iv: ivs.1,
            stamina_iv: ivs.2,
            deployed_fort_id: None,
        }
    }

    #[test]
    fn perfection_is_percentage_of_45() {
        let p = specimen(100, (15, 15, 15), 40);
        assert!((p.perfection() - 100.0).abs() < 1e-9);
        let q = specimen(100, (9, 9, 9), 40);
        assert!((q.perfection() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn value_blends_cp_and_perfection() {
        let p = specimen(1000, (9, 9, 9), 40);
        assert!((p.value() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn ascending_order_puts_weakest_first_per_mode() {
        let weak_high_iv = specimen(100, (15, 15, 15), 30);
        let strong_low_iv = specimen(900, (3, 3, 3), 90);

        let mut by_cp = vec![strong_low_iv.clone(), weak_high_iv.clone()];
        by_cp.sort_by(|a, b| compare_ascending(a, b, PriorityMode::Cp));
        assert_eq!(by_cp[0].cp, 100);

        let mut by_iv = vec![strong_low_iv, weak_high_iv];
        by_iv.sort_by(|a, b| compare_ascending(a, b, PriorityMode::Iv));
        assert_eq!(by_iv[0].cp, 900);
    }

    #[test]
    fn equal_primary_breaks_tie_on_stamina() {
        let a = specimen(500, (6, 6, 6), 20);
        let b = specimen(500, (6, 6, 6), 80);
        assert_eq!(compare_ascending(&a, &b, PriorityMode::Value), Ordering::Less);
    }
}
