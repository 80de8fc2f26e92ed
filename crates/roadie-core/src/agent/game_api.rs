//! Object-safe async boundaries between the decision core and the backend.
//!
//! Methods return boxed futures rather than using an async-trait macro so the
//! traits stay object-safe and implementations (remote client, test fakes)
//! can be held as `Arc<dyn ...>`.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::config::AuthScheme;
use crate::geo::LatLng;
use crate::player::inventory::{InventorySnapshot, ItemId};
use crate::player::pokemon::Pokemon;
use crate::world::map::MapSnapshot;

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Typed login failures the session controller reacts to individually. Any
/// other error bubbling out of `login` is treated as an unknown fault and
/// retried after a short wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginFailure {
    #[error("authentication backend offline")]
    Offline,
    #[error("interactive verification required")]
    InteractiveRequired,
    #[error("credentials rejected")]
    BadCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    Success,
    PokemonInventoryFull,
    PokemonFled,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterData {
    pub pokemon: Pokemon,
    pub capture_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterResponse {
    pub status: EncounterStatus,
    #[serde(default)]
    pub data: Option<EncounterData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchStatus {
    Success,
    Escape,
    Flee,
    Missed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchResponse {
    pub status: CatchStatus,
    #[serde(default)]
    pub xp_awarded: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FortDetails {
    pub fort_id: String,
    pub name: String,
    pub position: LatLng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GymStatus {
    Success,
    NotInRange,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymDetails {
    pub status: GymStatus,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owned_by_team: Option<u32>,
    #[serde(default)]
    pub membership_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FortSearchStatus {
    Success,
    OutOfRange,
    Cooldown,
    InventoryFull,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAward {
    pub item: ItemId,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FortSearchResponse {
    pub status: FortSearchStatus,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub items: Vec<ItemAward>,
    #[serde(default)]
    pub egg: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Success,
    NotFullHealth,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostStatus {
    Success,
    AlreadyActive,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotionResponse {
    pub success: bool,
    #[serde(default)]
    pub stamina: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolveResponse {
    pub success: bool,
    #[serde(default)]
    pub experience: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
    #[serde(default)]
    pub team: Option<u32>,
    #[serde(default)]
    pub stardust: u64,
    #[serde(default)]
    pub level: u32,
}

/// Everything the decision core asks of the game backend. The protocol client
/// behind it is out of scope here; the runner supplies a remote
/// implementation and tests supply scripted fakes.
pub trait GameClient: Send + Sync {
    fn login<'a>(
        &'a self,
        scheme: AuthScheme,
        username: &'a str,
        password: &'a str,
    ) -> ApiFuture<'a, ()>;

    /// Last position pushed to the backend. Synchronous: implementations
    /// cache it locally.
    fn position(&self) -> LatLng;

    fn set_position<'a>(&'a self, position: LatLng) -> ApiFuture<'a, ()>;

    fn get_map_objects<'a>(&'a self) -> ApiFuture<'a, MapSnapshot>;

    fn get_player<'a>(&'a self) -> ApiFuture<'a, PlayerProfile>;

    fn get_inventory<'a>(&'a self, refresh: bool) -> ApiFuture<'a, InventorySnapshot>;

    fn encounter<'a>(
        &'a self,
        encounter_id: u64,
        spawn_point_id: &'a str,
    ) -> ApiFuture<'a, EncounterResponse>;

    fn encounter_lure<'a>(
        &'a self,
        encounter_id: u64,
        fort_id: &'a str,
    ) -> ApiFuture<'a, EncounterResponse>;

    /// Feeds a capture aid (berry) to the engaged target.
    fn use_capture_item<'a>(
        &'a self,
        encounter_id: u64,
        item: ItemId,
        target_id: &'a str,
    ) -> ApiFuture<'a, ()>;

    fn catch<'a>(
        &'a self,
        encounter_id: u64,
        target_id: &'a str,
        ball: ItemId,
    ) -> ApiFuture<'a, CatchResponse>;

    fn get_fort_details<'a>(
        &'a self,
        fort_id: &'a str,
        position: LatLng,
    ) -> ApiFuture<'a, FortDetails>;

    fn search_fort<'a>(
        &'a self,
        fort_id: &'a str,
        position: LatLng,
    ) -> ApiFuture<'a, FortSearchResponse>;

    fn get_gym_details<'a>(
        &'a self,
        fort_id: &'a str,
        position: LatLng,
    ) -> ApiFuture<'a, GymDetails>;

    fn deploy_to_gym<'a>(
        &'a self,
        fort_id: &'a str,
        pokemon_id: u64,
    ) -> ApiFuture<'a, DeployStatus>;

    fn transfer<'a>(&'a self, pokemon_id: u64) -> ApiFuture<'a, ()>;

    fn evolve<'a>(&'a self, pokemon_id: u64) -> ApiFuture<'a, EvolveResponse>;

    fn recycle<'a>(&'a self, item: ItemId, count: u32) -> ApiFuture<'a, ()>;

    fn use_potion<'a>(&'a self, item: ItemId, pokemon_id: u64) -> ApiFuture<'a, PotionResponse>;

    fn use_xp_boost<'a>(&'a self) -> ApiFuture<'a, BoostStatus>;

    fn use_incense<'a>(&'a self) -> ApiFuture<'a, BoostStatus>;
}

/// Periodic roster/profile export. The farming loop rate-limits calls; the
/// implementation decides the format and destination.
pub trait ExportSink: Send + Sync {
    fn export<'a>(
        &'a self,
        profile: Option<&'a PlayerProfile>,
        inventory: &'a InventorySnapshot,
    ) -> ApiFuture<'a, ()>;
}

/// Discards exports.
pub struct NullExportSink;

impl ExportSink for NullExportSink {
    fn export<'a>(
        &'a self,
        _profile: Option<&'a PlayerProfile>,
        _inventory: &'a InventorySnapshot,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Re-entrant hook invoked between movement legs so travel stays productive.
pub trait StepVisitor: Send {
    fn on_step<'a>(&'a mut self) -> ApiFuture<'a, ()>;
}

/// Human-like movement simulation. Implementations interpolate a path,
/// update the client position leg by leg, and await the visitor between legs.
pub trait Navigator: Send + Sync {
    fn walk<'a>(
        &'a self,
        dest: LatLng,
        speed_kmh: f64,
        visitor: Option<&'a mut dyn StepVisitor>,
    ) -> ApiFuture<'a, ()>;

    /// Walks only `fraction` of the way toward `dest`; used to edge into
    /// interaction range.
    fn walk_fraction<'a>(
        &'a self,
        dest: LatLng,
        speed_kmh: f64,
        fraction: f64,
        visitor: Option<&'a mut dyn StepVisitor>,
    ) -> ApiFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failure_survives_anyhow_downcast() {
        let err = anyhow::Error::new(LoginFailure::Offline).context("login attempt 3");
        assert_eq!(
            err.downcast_ref::<LoginFailure>(),
            Some(&LoginFailure::Offline)
        );
    }

    #[test]
    fn wire_enums_use_snake_case() {
        let status: CatchStatus = serde_json::from_str("\"success\"").expect("status");
        assert_eq!(status, CatchStatus::Success);
        let gym: GymStatus = serde_json::from_str("\"not_in_range\"").expect("gym");
        assert_eq!(gym, GymStatus::NotInRange);
    }
}
