use serde::{Deserialize, Serialize};

use crate::geo::LatLng;

/// What kind of fort a map cell entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FortKind {
    Pokestop,
    Gym,
}

/// Active lure module on a stop, carrying the encounter it is advertising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LureInfo {
    pub encounter_id: u64,
    pub fort_id: String,
    #[serde(default)]
    pub active_species: Option<u32>,
}

/// A stop or gym as read from one map fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fort {
    pub id: String,
    pub kind: FortKind,
    pub position: LatLng,
    /// Unix millis at which the fort can be searched again.
    #[serde(default)]
    pub cooldown_complete_ms: u64,
    #[serde(default)]
    pub lure: Option<LureInfo>,
    /// Gym prestige points; zero for stops.
    #[serde(default)]
    pub gym_points: u64,
    #[serde(default)]
    pub owned_by_team: Option<u32>,
}

impl Fort {
    pub fn is_gym(&self) -> bool {
        self.kind == FortKind::Gym
    }
}

/// A wild spawn that can currently be engaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catchable {
    pub encounter_id: u64,
    pub spawn_point_id: String,
    pub species: u32,
    pub position: LatLng,
}

/// One immutable read of the surroundings. Policies never mutate it; a stale
/// view is refreshed by fetching a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    #[serde(default)]
    pub forts: Vec<Fort>,
    #[serde(default)]
    pub catchables: Vec<Catchable>,
}

impl MapSnapshot {
    pub fn fort(&self, id: &str) -> Option<&Fort> {
        self.forts.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fort_lookup_by_id() {
        let snapshot = MapSnapshot {
            forts: vec![Fort {
                id: "stop-1".into(),
                kind: FortKind::Pokestop,
                position: LatLng::new(1.0, 2.0),
                cooldown_complete_ms: 0,
                lure: None,
                gym_points: 0,
                owned_by_team: None,
            }],
            catchables: vec![],
        };
        assert!(snapshot.fort("stop-1").is_some());
        assert!(snapshot.fort("stop-2").is_none());
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let fort: Fort = serde_json::from_str(
            r#"{"id":"g1","kind":"gym","position":{"latitude":0.0,"longitude":0.0}}"#,
        )
        .expect("fort json");
        assert!(fort.is_gym());
        assert!(fort.lure.is_none());
        assert_eq!(fort.cooldown_complete_ms, 0);
        assert_eq!(fort.owned_by_team, None);
    }
}
