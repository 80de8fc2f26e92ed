use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geo::LatLng;
use crate::player::inventory::ItemId;
use crate::player::pokemon::PriorityMode;

/// Which login scheme the backend should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    Ptc,
    Google,
}

/// A named long-range waypoint the agent rotates through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl Destination {
    pub fn position(&self) -> LatLng {
        LatLng {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
        }
    }
}

/// Agent configuration, read once at startup from a TOML file. Field defaults
/// mirror a cautious walking profile so a minimal file is usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auth: AuthScheme,
    pub username: String,
    pub password: String,

    /// Start position, also the anchor for the max-distance leash.
    pub start: LatLng,
    /// Leash radius in meters; 0 disables the leash.
    pub max_distance_m: f64,

    pub catch_pokemon: bool,
    pub visit_pokestops: bool,
    pub visit_gyms: bool,

    pub min_speed_kmh: f64,
    pub flying_speed_kmh: f64,
    pub flying_enabled: bool,
    /// Relocate instantly instead of simulating flight.
    pub teleport_enabled: bool,
    pub ping_stops_while_flying: bool,

    pub destinations_enabled: bool,
    pub minutes_per_destination: u64,
    pub destinations: Vec<Destination>,

    pub prioritize_lured_stops: bool,
    pub loitering_active: bool,
    pub move_when_no_stops: bool,

    pub keep_above_cp: u32,
    pub keep_above_iv: f64,
    pub ball_balancing: bool,

    pub use_revives: bool,
    pub use_potions: bool,
    pub use_lucky_eggs: bool,
    pub use_incense: bool,

    pub evolve_pokemon: bool,
    pub species_to_evolve: Vec<u32>,
    pub transfer_pokemon: bool,
    pub transfer_priority: PriorityMode,
    /// How many specimens to shed when the box fills mid-encounter.
    pub transfer_trim_fat_count: usize,
    pub species_not_to_transfer: Vec<u32>,
    pub species_not_to_catch: Vec<u32>,

    /// Per-item bag caps; anything above the cap is recycled.
    pub item_caps: BTreeMap<ItemId, u32>,

    pub display_refresh_minutes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth: AuthScheme::Ptc,
            username: String::new(),
            password: String::new(),
            start: LatLng::default(),
            max_distance_m: 5_000.0,
            catch_pokemon: true,
            visit_pokestops: true,
            visit_gyms: true,
            min_speed_kmh: 12.0,
            flying_speed_kmh: 300.0,
            flying_enabled: false,
            teleport_enabled: false,
            ping_stops_while_flying: false,
            destinations_enabled: false,
            minutes_per_destination: 30,
            destinations: Vec::new(),
            prioritize_lured_stops: true,
            loitering_active: false,
            move_when_no_stops: true,
            keep_above_cp: 1_000,
            keep_above_iv: 80.0,
            ball_balancing: false,
            use_revives: true,
            use_potions: true,
            use_lucky_eggs: false,
            use_incense: false,
            evolve_pokemon: false,
            species_to_evolve: Vec::new(),
            transfer_pokemon: false,
            transfer_priority: PriorityMode::Value,
            transfer_trim_fat_count: 0,
            species_not_to_transfer: Vec::new(),
            species_not_to_catch: Vec::new(),
            item_caps: BTreeMap::new(),
            display_refresh_minutes: 5,
        }
    }
}

/// Finds and parses the settings file. Search order: the directory named by
/// `ROADIE_CONFIG_DIR`, then the working directory, then the workspace root
/// relative to the compiled crate.
pub struct ConfigLoader {
    file_name: String,
}

impl ConfigLoader {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self { file_name: file_name.into() }
    }

    pub fn load(&self) -> Result<Settings> {
        let path = self
            .locate()
            .with_context(|| format!("settings file {} not found", self.file_name))?;
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Settings> {
        let settings: Settings = toml::from_str(raw).context("invalid settings toml")?;
        Ok(settings)
    }

    fn locate(&self) -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Ok(dir) = std::env::var("ROADIE_CONFIG_DIR") {
            candidates.push(Path::new(&dir).join(&self.file_name));
        }
        candidates.push(PathBuf::from(&self.file_name));
        candidates.push(
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../..")
                .join(&self.file_name),
        );
        candidates.into_iter().find(|p| p.is_file())
    }
}
