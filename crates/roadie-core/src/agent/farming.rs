//! The farming loop: one cycle fetches the map, builds the target queue, and
//! drains it stop by stop, interleaving opportunistic catches, gym visits,
//! lure loitering, and maintenance.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::agent::events::{BotEvent, EventSink};
use crate::agent::game_api::{
    ApiFuture, DeployStatus, ExportSink, FortDetails, FortSearchResponse, FortSearchStatus,
    GameClient, GymDetails, GymStatus, Navigator, StepVisitor,
};
use crate::agent::navigation::{
    flying_action, long_walk_action, next_destination_index, short_walk_action, travel_mode,
    StepAction, TravelMode, STEP_SCAN_RADIUS_M,
};
use crate::agent::queue::{build_queue, QueueFilters};
use crate::agent::session::SessionState;
use crate::config::Settings;
use crate::geo::LatLng;
use crate::player::pokemon::PriorityMode;
use crate::sweeper::SnapshotStore;
use crate::world::map::Fort;

/// Recycle the bag every this many searched stops.
pub(crate) const RECYCLE_EVERY: u32 = 5;

/// Give up approaching an out-of-range gym after this many hops.
const MAX_GYM_APPROACHES: u32 = 6;

/// How much of the remaining distance one approach hop covers.
const GYM_APPROACH_FRACTION: f64 = 0.20;

/// Randomized delay ranges, in milliseconds. Zeroed in tests so the loops
/// run immediately.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub catch_ms: (u64, u64),
    pub berry_ms: (u64, u64),
    pub scan_ms: (u64, u64),
    pub loiter_ms: (u64, u64),
    pub quiet_ms: (u64, u64),
    pub no_stops_ms: (u64, u64),
    pub gym_only_ms: (u64, u64),
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            catch_ms: (300, 400),
            berry_ms: (50, 200),
            scan_ms: (220, 320),
            loiter_ms: (15_000, 30_000),
            quiet_ms: (2_400, 2_600),
            no_stops_ms: (5_000, 5_000),
            gym_only_ms: (1_000, 2_000),
        }
    }
}

impl Pacing {
    pub fn zero() -> Self {
        Self {
            catch_ms: (0, 0),
            berry_ms: (0, 0),
            scan_ms: (0, 0),
            loiter_ms: (0, 0),
            quiet_ms: (0, 0),
            no_stops_ms: (0, 0),
            gym_only_ms: (0, 0),
        }
    }

    pub(crate) async fn pause(&self, (lo, hi): (u64, u64)) {
        let ms = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

fn unix_now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Point bracket gating how many defenders a friendly gym may already hold
/// before we skip it.
pub(crate) fn gym_admits_defender(points: u64, members: u32) -> bool {
    if points <= 7_000 {
        members < 2
    } else if points <= 10_000 {
        members < 3
    } else {
        members < 4
    }
}

/// Drives one account through farming cycles. Collaborators are trait
/// objects so the runner wires remote implementations and tests wire fakes.
pub struct Farmer {
    pub(crate) client: Arc<dyn GameClient>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) export: Arc<dyn ExportSink>,
    pub(crate) snapshots: Arc<dyn SnapshotStore>,
    pub(crate) settings: Arc<Settings>,
    pub(crate) state: SessionState,
    pub(crate) pacing: Pacing,
}

/// Adapter handing the farmer back to the navigator between movement legs.
struct StepWork<'f> {
    farmer: &'f mut Farmer,
    action: StepAction,
}

impl StepVisitor for StepWork<'_> {
    fn on_step<'a>(&'a mut self) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            match self.action {
                StepAction::None => Ok(()),
                StepAction::CatchPokemon => self.farmer.catch_nearby_pokemons().await,
                StepAction::VisitStops => self.farmer.visit_nearby_stops().await,
                StepAction::CatchAndVisitStops => {
                    self.farmer.catch_nearby_pokemons().await?;
                    self.farmer.visit_nearby_stops().await
                }
            }
        })
    }
}

impl Farmer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn GameClient>,
        navigator: Arc<dyn Navigator>,
        events: Arc<dyn EventSink>,
        export: Arc<dyn ExportSink>,
        snapshots: Arc<dyn SnapshotStore>,
        settings: Arc<Settings>,
        state: SessionState,
        pacing: Pacing,
    ) -> Self {
        Self { client, navigator, events, export, snapshots, settings, state, pacing }
    }

    /// Post-login loop. The first pass runs the full maintenance sweep once;
    /// after that every iteration is one farming cycle. Returns `Ok` only
    /// when the running flag drops; errors bubble to the session controller.
    pub async fn run(&mut self) -> Result<()> {
        while self.state.is_running() {
            if !self.state.initialized {
                self.refresh_profile(true).await?;
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
                self.export_roster(true).await?;
                self.apply_incense().await?;
                self.apply_lucky_egg().await?;
                self.recycle_items().await?;
                self.state.initialized = true;
            }
            self.farm_cycle().await?;
        }
        Ok(())
    }

    pub(crate) async fn farm_cycle(&mut self) -> Result<()> {
        if !self.settings.visit_pokestops && !self.settings.visit_gyms {
            debug!("both visit toggles disabled, idling");
            self.pacing.pause(self.pacing.quiet_ms).await;
            if self.settings.catch_pokemon && !self.state.flee.is_soft_banned() {
                self.catch_nearby_pokemons().await?;
            }
        }
        self.enforce_leash().await?;
        self.rotate_destination().await?;

        let map = self
            .client
            .get_map_objects()
            .await
            .context("fetching map objects")?;
        let queue = build_queue(
            &map,
            self.client.position(),
            unix_now_ms(),
            &self.cycle_filters(),
        );
        let stops = queue.iter().filter(|f| !f.is_gym()).count();
        let gyms = queue.len() - stops;
        if stops == 0 {
            if gyms > 0 {
                self.drain_queue(queue).await?;
            }
            warn!("no usable stops in range");
            self.pacing.pause(self.pacing.no_stops_ms).await;
            if self.settings.move_when_no_stops && self.settings.destinations_enabled {
                if let Some(deadline) = self.state.destination_deadline {
                    if deadline > Instant::now() {
                        info!("nothing to farm here, expiring the destination clock");
                        self.state.destination_deadline = Some(Instant::now());
                    }
                }
            }
        } else {
            self.drain_queue(queue).await?;
        }
        Ok(())
    }

    fn cycle_filters(&self) -> QueueFilters {
        QueueFilters {
            visit_pokestops: self.settings.visit_pokestops,
            visit_gyms: self.settings.visit_gyms,
            max_distance_m: self.settings.max_distance_m,
            prioritize_lured: self.settings.prioritize_lured_stops,
        }
    }

    /// Walks back to the start position when the leash is exceeded.
    async fn enforce_leash(&mut self) -> Result<()> {
        if self.settings.max_distance_m == 0.0 {
            return Ok(());
        }
        let anchor = self.settings.start;
        let distance = self.client.position().distance_m(&anchor);
        if distance <= self.settings.max_distance_m {
            return Ok(());
        }
        warn!(distance_m = distance as u64, "outside allowed radius, returning to start");
        self.events.publish(&BotEvent::ReturningToWaypoint {
            position: anchor,
            distance_m: distance,
        });
        self.travel_to(anchor, distance).await?;
        self.state.gym_attempts.clear();
        Ok(())
    }

    /// Advances the destination clock, relocating when it expires.
    async fn rotate_destination(&mut self) -> Result<()> {
        if !self.settings.destinations_enabled || self.settings.destinations.is_empty() {
            return Ok(());
        }
        let per = Duration::from_secs(self.settings.minutes_per_destination * 60);
        match self.state.destination_deadline {
            None => {
                self.state.destination_deadline = Some(Instant::now() + per);
            }
            Some(deadline) if Instant::now() >= deadline => {
                if self.settings.destinations.len() > 1 {
                    let next = next_destination_index(
                        self.state.destination_index,
                        self.settings.destinations.len(),
                    );
                    let dest = self.settings.destinations[next].clone();
                    self.state.destination_index = next;
                    info!(name = %dest.name, index = next, "rotating to next destination");
                    self.events.publish(&BotEvent::DestinationChanged {
                        index: next,
                        name: dest.name.clone(),
                    });
                    let target = dest.position();
                    let distance = self.client.position().distance_m(&target);
                    self.travel_to(target, distance).await?;
                    self.state.gym_attempts.clear();
                }
                self.state.destination_deadline = Some(Instant::now() + per);
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Long-range relocation: warp, simulated flight, or a ground walk with
    /// the matching between-leg work.
    pub(crate) async fn travel_to(&mut self, dest: LatLng, distance_m: f64) -> Result<()> {
        let soft_banned = self.state.flee.is_soft_banned();
        match travel_mode(distance_m, &self.settings) {
            TravelMode::Warp => {
                info!(distance_m = distance_m as u64, "relocating instantly");
                self.client.set_position(dest).await.context("warping")?;
            }
            TravelMode::Fly => {
                info!(distance_m = distance_m as u64, "flying");
                self.state.in_flight = true;
                let action = flying_action(&self.settings, soft_banned);
                let outcome = self
                    .walk_with_action(dest, self.settings.flying_speed_kmh, action)
                    .await;
                self.state.in_flight = false;
                outcome?;
            }
            TravelMode::Walk => {
                let action = long_walk_action(&self.settings, soft_banned);
                self.walk_with_action(dest, self.settings.min_speed_kmh, action)
                    .await?;
            }
        }
        Ok(())
    }

    async fn walk_with_action(
        &mut self,
        dest: LatLng,
        speed_kmh: f64,
        action: StepAction,
    ) -> Result<()> {
        let navigator = Arc::clone(&self.navigator);
        if action == StepAction::None {
            navigator.walk(dest, speed_kmh, None).await
        } else {
            let mut visitor = StepWork { farmer: self, action };
            navigator.walk(dest, speed_kmh, Some(&mut visitor)).await
        }
    }

    async fn approach_with_action(
        &mut self,
        dest: LatLng,
        speed_kmh: f64,
        action: StepAction,
    ) -> Result<()> {
        let navigator = Arc::clone(&self.navigator);
        if action == StepAction::None {
            navigator
                .walk_fraction(dest, speed_kmh, GYM_APPROACH_FRACTION, None)
                .await
        } else {
            let mut visitor = StepWork { farmer: self, action };
            navigator
                .walk_fraction(dest, speed_kmh, GYM_APPROACH_FRACTION, Some(&mut visitor))
                .await
        }
    }

    /// Visits queued forts in order until the queue, the clock, or the
    /// running flag runs out.
    pub(crate) async fn drain_queue(&mut self, queue: Vec<Fort>) -> Result<()> {
        if queue.is_empty() {
            return Ok(());
        }
        let stops = queue.iter().filter(|f| !f.is_gym()).count();
        let gyms = queue.len() - stops;
        info!(stops, gyms, "visiting targets");
        self.events.publish(&BotEvent::VisitingStops { stops, gyms });
        let mut pending: VecDeque<Fort> = queue.into();
        while let Some(fort) = pending.pop_front() {
            if !self.state.is_running() {
                break;
            }
            if !self.state.in_flight
                && self.settings.destinations_enabled
                && self
                    .state
                    .destination_deadline
                    .is_some_and(|d| Instant::now() >= d)
            {
                debug!("destination clock expired, abandoning remaining targets");
                break;
            }
            self.refresh_profile(false).await?;
            self.export_roster(false).await?;
            if fort.is_gym() {
                self.process_gym(&fort).await?;
            } else {
                self.process_stop(&fort).await?;
            }
            if stops == 0 && gyms > 0 {
                self.pacing.pause(self.pacing.gym_only_ms).await;
            }
        }
        Ok(())
    }

    pub(crate) async fn process_stop(&mut self, fort: &Fort) -> Result<()> {
        if self.settings.catch_pokemon && !self.state.flee.is_soft_banned() {
            self.catch_nearby_pokemons().await?;
        }
        let distance = self.client.position().distance_m(&fort.position);
        let details = self
            .client
            .get_fort_details(&fort.id, fort.position)
            .await
            .context("fetching stop details")?;
        if let Err(err) = self.snapshots.stage_fort(&details) {
            warn!(error = %err, "failed to stage stop snapshot");
        }
        self.events.publish(&BotEvent::TravelingToStop {
            name: details.name.clone(),
            distance_m: distance,
            lured: fort.lure.is_some(),
        });
        info!(
            name = %details.name,
            distance_m = distance as u64,
            lured = fort.lure.is_some(),
            "heading to stop"
        );
        if self.state.in_flight {
            let navigator = Arc::clone(&self.navigator);
            navigator
                .walk(fort.position, self.settings.flying_speed_kmh, None)
                .await?;
        } else {
            let action = short_walk_action(&self.settings, self.state.flee.is_soft_banned());
            self.walk_with_action(fort.position, self.settings.min_speed_kmh, action)
                .await?;
        }
        let search = self
            .client
            .search_fort(&fort.id, fort.position)
            .await
            .context("searching stop")?;
        self.apply_search_result(&details.name, &search);
        if self.settings.loitering_active && fort.lure.is_some() {
            self.loiter(fort).await?;
        }
        if self.state.recycle_counter >= RECYCLE_EVERY {
            self.recycle_items().await?;
        }
        Ok(())
    }

    /// Books the outcome of one fort search. Experience means the backend is
    /// talking to us: it lifts any soft ban. A success that pays nothing is
    /// the fort-side flee signal.
    pub(crate) fn apply_search_result(&mut self, name: &str, search: &FortSearchResponse) {
        let now = Instant::now();
        if search.experience > 0 {
            self.state.stats.experience += u64::from(search.experience);
            self.state.stats.stops_visited += 1;
            self.state.recycle_counter += 1;
            if self.state.flee.is_soft_banned() {
                if let Some(after) = self.state.flee.note_success(now) {
                    info!(after_s = after.as_secs(), "soft ban lifted");
                    self.events.publish(&BotEvent::SoftBanLifted { after });
                }
            }
            info!(
                name,
                experience = search.experience,
                items = search.items.len(),
                egg = search.egg,
                "stop searched"
            );
        } else if search.status == FortSearchStatus::Success {
            if self.state.flee.note_flee(now) {
                warn!("soft ban detected");
                self.events.publish(&BotEvent::SoftBanDetected);
            }
            debug!(name, "stop paid nothing");
        } else {
            debug!(name, status = ?search.status, "stop not searchable");
        }
        self.events.publish(&BotEvent::StopVisited {
            name: name.to_string(),
            experience: search.experience,
        });
    }

    /// Stays on a lured stop, alternating lure encounters, scans, and
    /// re-searches, until a fresh snapshot shows the lure gone.
    async fn loiter(&mut self, fort: &Fort) -> Result<()> {
        info!(id = %fort.id, "lure active, loitering");
        self.lure_encounter(fort).await?;
        loop {
            if !self.state.is_running() {
                break;
            }
            self.pacing.pause(self.pacing.loiter_ms).await;
            let fresh = self
                .client
                .get_map_objects()
                .await
                .context("refreshing map while loitering")?;
            let Some(current) = fresh.fort(&fort.id).filter(|f| f.lure.is_some()).cloned()
            else {
                info!(id = %fort.id, "lure gone, moving on");
                break;
            };
            if self.settings.catch_pokemon && !self.state.flee.is_soft_banned() {
                self.catch_nearby_pokemons().await?;
            }
            self.lure_encounter(&current).await?;
            let search = self.client.search_fort(&fort.id, fort.position).await?;
            self.apply_search_result(&fort.id, &search);
            if self.state.recycle_counter >= RECYCLE_EVERY {
                self.recycle_items().await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn process_gym(&mut self, fort: &Fort) -> Result<()> {
        if self.state.gym_attempts.contains(&fort.id) {
            debug!(id = %fort.id, "gym already attempted this tour");
            return Ok(());
        }
        let details = self
            .client
            .get_fort_details(&fort.id, fort.position)
            .await
            .context("fetching gym details")?;
        let mut approaches = 0u32;
        while self.state.is_running() {
            let gym = self
                .client
                .get_gym_details(&fort.id, fort.position)
                .await
                .context("inspecting gym")?;
            match gym.status {
                GymStatus::Success => {
                    if let Err(err) = self.snapshots.stage_gym(&gym, &details) {
                        warn!(error = %err, "failed to stage gym snapshot");
                    }
                    self.try_deploy(fort, &gym).await?;
                    break;
                }
                GymStatus::NotInRange => {
                    if approaches >= MAX_GYM_APPROACHES {
                        warn!(name = %details.name, "gym stayed out of range, giving up");
                        break;
                    }
                    approaches += 1;
                    let distance = self.client.position().distance_m(&fort.position);
                    info!(
                        name = %details.name,
                        attempt = approaches,
                        distance_m = distance as u64,
                        "gym out of range, moving closer"
                    );
                    let speed = if self.settings.flying_enabled {
                        self.settings.flying_speed_kmh
                    } else {
                        self.settings.min_speed_kmh
                    };
                    let action =
                        short_walk_action(&self.settings, self.state.flee.is_soft_banned());
                    self.approach_with_action(fort.position, speed, action).await?;
                }
                GymStatus::Other => {
                    debug!(name = %details.name, "gym not inspectable");
                    break;
                }
            }
        }
        self.state.gym_attempts.insert(fort.id.clone());
        Ok(())
    }

    /// Walks in and drops the best spare defender, if the gym is ours and
    /// its bracket still admits one.
    async fn try_deploy(&mut self, fort: &Fort, gym: &GymDetails) -> Result<()> {
        let my_team = self.state.profile.as_ref().and_then(|p| p.team);
        let open = gym_admits_defender(fort.gym_points, gym.membership_count);
        if my_team.is_none() || gym.owned_by_team != my_team || !open {
            debug!(name = %gym.name, members = gym.membership_count, "gym not open to a defender");
            self.events.publish(&BotEvent::GymVisited {
                name: gym.name.clone(),
                deployed: false,
            });
            return Ok(());
        }
        let distance = self.client.position().distance_m(&fort.position);
        self.events.publish(&BotEvent::TravelingToGym {
            name: gym.name.clone(),
            distance_m: distance,
        });
        info!(name = %gym.name, distance_m = distance as u64, "heading to friendly gym");
        let action = short_walk_action(&self.settings, self.state.flee.is_soft_banned());
        self.walk_with_action(fort.position, self.settings.min_speed_kmh, action)
            .await?;
        let fresh = self
            .client
            .get_gym_details(&fort.id, fort.position)
            .await
            .context("re-inspecting gym")?;
        if fresh.owned_by_team != my_team {
            info!(name = %gym.name, "gym changed hands before arrival");
            self.events.publish(&BotEvent::GymVisited {
                name: gym.name.clone(),
                deployed: false,
            });
            return Ok(());
        }
        let inventory = self.client.get_inventory(true).await?;
        let Some(best) = inventory.best_not_deployed(PriorityMode::Value).cloned() else {
            debug!("no spare defender available");
            self.events.publish(&BotEvent::GymVisited {
                name: gym.name.clone(),
                deployed: false,
            });
            return Ok(());
        };
        let deployed = match self
            .client
            .deploy_to_gym(&fort.id, best.id)
            .await
            .context("deploying defender")?
        {
            DeployStatus::Success => {
                self.state.stats.gyms_visited += 1;
                info!(name = %gym.name, species = best.species, cp = best.cp, "defender deployed");
                true
            }
            DeployStatus::NotFullHealth => {
                debug!(species = best.species, "best spare is not at full health");
                false
            }
            DeployStatus::Other => false,
        };
        self.events.publish(&BotEvent::GymVisited {
            name: gym.name.clone(),
            deployed,
        });
        Ok(())
    }

    /// Short-radius stop sweep used as between-leg work on long walks.
    pub(crate) async fn visit_nearby_stops(&mut self) -> Result<()> {
        let map = self
            .client
            .get_map_objects()
            .await
            .context("scanning for nearby stops")?;
        let filters = QueueFilters {
            visit_pokestops: true,
            visit_gyms: false,
            max_distance_m: STEP_SCAN_RADIUS_M,
            prioritize_lured: self.settings.prioritize_lured_stops,
        };
        let queue = build_queue(&map, self.client.position(), unix_now_ms(), &filters);
        if queue.is_empty() {
            return Ok(());
        }
        self.drain_queue(queue).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::{Fixture, FakeGameClient};
    use crate::world::map::FortKind;
    use std::sync::atomic::AtomicBool;

    fn stop_fort(id: &str) -> Fort {
        Fort {
            id: id.into(),
            kind: FortKind::Pokestop,
            position: LatLng::new(0.0, 0.001),
            cooldown_complete_ms: 0,
            lure: None,
            gym_points: 0,
            owned_by_team: None,
        }
    }

    fn gym_fort(id: &str, points: u64) -> Fort {
        Fort {
            kind: FortKind::Gym,
            gym_points: points,
            ..stop_fort(id)
        }
    }

    fn search(status: FortSearchStatus, experience: u32) -> FortSearchResponse {
        FortSearchResponse { status, experience, items: vec![], egg: false }
    }

    fn quiet_settings() -> Settings {
        // No opportunistic catching so fort tests stay focused.
        Settings { catch_pokemon: false, ..Settings::default() }
    }

    #[test]
    fn gym_brackets_admit_defenders_by_points() {
        assert!(gym_admits_defender(1_000, 1));
        assert!(!gym_admits_defender(1_000, 2));
        assert!(gym_admits_defender(6_500, 1));
        assert!(!gym_admits_defender(6_500, 2));
        assert!(gym_admits_defender(9_000, 2));
        assert!(!gym_admits_defender(9_000, 3));
        assert!(gym_admits_defender(20_000, 3));
        assert!(!gym_admits_defender(20_000, 4));
    }

    #[tokio::test]
    async fn rewarding_search_lifts_soft_ban_and_counts_stop() {
        let client = Arc::new(FakeGameClient::default());
        client.script_search(Ok(search(FortSearchStatus::Success, 50)));
        let running = Arc::new(AtomicBool::new(true));
        let fixture = Fixture::new(Arc::clone(&client), running)
            .with_settings(quiet_settings());
        let events = Arc::clone(&fixture.events);
        let mut farmer = fixture.farmer();
        let origin = Instant::now();
        for _ in 0..4 {
            farmer.state.flee.note_flee(origin);
        }
        assert!(farmer.state.flee.is_soft_banned());

        farmer.process_stop(&stop_fort("s1")).await.expect("process stop");

        assert!(!farmer.state.flee.is_soft_banned());
        assert_eq!(farmer.state.recycle_counter, 1);
        assert_eq!(farmer.state.stats.experience, 50);
        assert!(events
            .recorded()
            .iter()
            .any(|e| matches!(e, BotEvent::SoftBanLifted { .. })));
    }

    #[tokio::test]
    async fn zero_experience_search_feeds_the_flee_counter() {
        let client = Arc::new(FakeGameClient::default());
        client.script_search(Ok(search(FortSearchStatus::Success, 0)));
        let running = Arc::new(AtomicBool::new(true));
        let mut farmer = Fixture::new(Arc::clone(&client), running)
            .with_settings(quiet_settings())
            .farmer();

        farmer.process_stop(&stop_fort("s1")).await.expect("process stop");

        assert_eq!(farmer.state.flee.flee_count(), 1);
        assert_eq!(farmer.state.recycle_counter, 0);
    }

    #[tokio::test]
    async fn expired_destination_clock_abandons_the_queue() {
        let client = Arc::new(FakeGameClient::default());
        let running = Arc::new(AtomicBool::new(true));
        let settings = Settings {
            destinations_enabled: true,
            ..quiet_settings()
        };
        let mut farmer = Fixture::new(Arc::clone(&client), running)
            .with_settings(settings)
            .farmer();
        farmer.state.destination_deadline = Some(Instant::now() - Duration::from_secs(1));

        farmer
            .drain_queue(vec![stop_fort("a"), stop_fort("b")])
            .await
            .expect("drain");

        assert_eq!(client.fort_detail_requests(), 0);
        assert_eq!(client.search_requests(), 0);
    }

    #[tokio::test]
    async fn friendly_open_gym_gets_a_defender() {
        let client = Arc::new(FakeGameClient::default());
        let gym = GymDetails {
            status: GymStatus::Success,
            name: "old mill".into(),
            owned_by_team: Some(1),
            membership_count: 1,
        };
        client.script_gym(Ok(gym.clone()));
        client.script_gym(Ok(gym));
        client.script_deploy(Ok(DeployStatus::Success));
        client.set_inventory_pokemon(vec![crate::player::pokemon::Pokemon {
            id: 42,
            species: 143,
            cp: 1_800,
            stamina: 160,
            stamina_max: 160,
            attack_iv: 12,
            defense_iv: 12,
            stamina_iv: 12,
            deployed_fort_id: None,
        }]);
        let running = Arc::new(AtomicBool::new(true));
        let fixture = Fixture::new(Arc::clone(&client), running)
            .with_settings(quiet_settings());
        let events = Arc::clone(&fixture.events);
        let mut farmer = fixture.farmer();
        farmer.state.profile = Some(crate::agent::game_api::PlayerProfile {
            name: "trainer".into(),
            team: Some(1),
            stardust: 0,
            level: 20,
        });

        farmer.process_gym(&gym_fort("g1", 1_000)).await.expect("process gym");

        assert_eq!(client.deployments(), vec![("g1".to_string(), 42)]);
        assert!(events
            .recorded()
            .iter()
            .any(|e| matches!(e, BotEvent::GymVisited { deployed: true, .. })));
    }

    #[tokio::test]
    async fn gyms_are_attempted_once_per_tour() {
        let client = Arc::new(FakeGameClient::default());
        client.script_gym(Ok(GymDetails {
            status: GymStatus::Other,
            name: "old mill".into(),
            owned_by_team: None,
            membership_count: 0,
        }));
        let running = Arc::new(AtomicBool::new(true));
        let mut farmer = Fixture::new(Arc::clone(&client), running)
            .with_settings(quiet_settings())
            .farmer();

        let fort = gym_fort("g1", 0);
        farmer.process_gym(&fort).await.expect("first attempt");
        let after_first = client.gym_detail_requests();
        farmer.process_gym(&fort).await.expect("second attempt");

        assert_eq!(client.gym_detail_requests(), after_first);
    }

    #[tokio::test]
    async fn out_of_range_gym_walks_closer_then_gives_up() {
        let client = Arc::new(FakeGameClient::default());
        let out = GymDetails {
            status: GymStatus::NotInRange,
            name: String::new(),
            owned_by_team: None,
            membership_count: 0,
        };
        for _ in 0..8 {
            client.script_gym(Ok(out.clone()));
        }
        let running = Arc::new(AtomicBool::new(true));
        let fixture = Fixture::new(Arc::clone(&client), running)
            .with_settings(quiet_settings());
        let navigator = Arc::clone(&fixture.navigator);
        let mut farmer = fixture.farmer();

        farmer.process_gym(&gym_fort("g1", 0)).await.expect("process gym");

        assert_eq!(navigator.fraction_walks(), 6);
        assert!(navigator.walks().is_empty());
        assert_eq!(client.deployments().len(), 0);
    }

    #[tokio::test]
    async fn empty_map_expires_destination_clock_when_configured() {
        let client = Arc::new(FakeGameClient::default());
        let running = Arc::new(AtomicBool::new(true));
        let settings = Settings {
            destinations_enabled: true,
            move_when_no_stops: true,
            max_distance_m: 0.0,
            ..quiet_settings()
        };
        let mut farmer = Fixture::new(Arc::clone(&client), running)
            .with_settings(settings)
            .farmer();
        let future = Instant::now() + Duration::from_secs(600);
        farmer.state.destination_deadline = Some(future);

        farmer.farm_cycle().await.expect("farm cycle");

        let deadline = farmer.state.destination_deadline.expect("deadline kept");
        assert!(deadline <= Instant::now());
    }
}
