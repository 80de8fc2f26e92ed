use std::time::Duration;

use crate::agent::game_api::CatchStatus;
use crate::geo::LatLng;

/// Milestones the agent announces to whoever is listening (UI, log shipper,
/// tests). Publishing is fire-and-forget; sinks must not block.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    EncounterStarted { species: u32, cp: u32, lured: bool },
    CatchAttempt { species: u32, status: CatchStatus, attempt: u32, lured: bool },
    CatchSuccess { species: u32, cp: u32, experience: u32, lured: bool },
    SoftBanDetected,
    SoftBanLifted { after: Duration },
    DestinationChanged { index: usize, name: String },
    ReturningToWaypoint { position: LatLng, distance_m: f64 },
    VisitingStops { stops: usize, gyms: usize },
    TravelingToStop { name: String, distance_m: f64, lured: bool },
    StopVisited { name: String, experience: u32 },
    TravelingToGym { name: String, distance_m: f64 },
    GymVisited { name: String, deployed: bool },
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &BotEvent);
}

/// Discards everything; the default when no observer is wired in.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &BotEvent) {}
}
