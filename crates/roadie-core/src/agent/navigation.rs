//! Travel-mode and step-callback decisions.
//!
//! Pure functions over the settings and the soft-ban flag; the actual
//! movement lives behind the [`Navigator`](crate::agent::game_api::Navigator)
//! trait.

use crate::config::Settings;

/// Flight only pays off past this distance.
pub const FLIGHT_DISTANCE_M: f64 = 2_000.0;

/// Scan radius for opportunistic stop visits during a long walk.
pub const STEP_SCAN_RADIUS_M: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    /// Set the position directly, no simulation.
    Warp,
    Fly,
    Walk,
}

/// Picks how to cover `distance_m` for a long-range relocation.
pub fn travel_mode(distance_m: f64, settings: &Settings) -> TravelMode {
    if settings.flying_enabled
        && (distance_m > FLIGHT_DISTANCE_M || settings.teleport_enabled)
    {
        if settings.teleport_enabled {
            TravelMode::Warp
        } else {
            TravelMode::Fly
        }
    } else {
        TravelMode::Walk
    }
}

/// What the mover does between movement legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    None,
    CatchPokemon,
    CatchAndVisitStops,
    VisitStops,
}

/// Between-leg work on a long ground walk. Everything is suppressed under a
/// soft ban since interactions would fail anyway.
pub fn long_walk_action(settings: &Settings, soft_banned: bool) -> StepAction {
    if soft_banned {
        return StepAction::None;
    }
    match (settings.catch_pokemon, settings.visit_pokestops) {
        (true, true) => StepAction::CatchAndVisitStops,
        (true, false) => StepAction::CatchPokemon,
        (false, true) => StepAction::VisitStops,
        (false, false) => StepAction::None,
    }
}

/// Between-leg work while flying: stop pings only, and only when enabled.
pub fn flying_action(settings: &Settings, soft_banned: bool) -> StepAction {
    if !soft_banned && settings.visit_pokestops && settings.ping_stops_while_flying {
        StepAction::VisitStops
    } else {
        StepAction::None
    }
}

/// Between-leg work on the short hop to a fort.
pub fn short_walk_action(settings: &Settings, soft_banned: bool) -> StepAction {
    if !soft_banned && settings.catch_pokemon {
        StepAction::CatchPokemon
    } else {
        StepAction::None
    }
}

/// Cyclic rotation through the destination list.
pub fn next_destination_index(current: usize, len: usize) -> usize {
    if len == 0 || current + 1 >= len {
        0
    } else {
        current + 1
    }
}
