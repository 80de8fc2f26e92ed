//! Scripted fakes shared by the agent tests. Responses are queued per call;
//! when a queue is empty a benign default is returned so tests only script
//! what they assert on.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use crate::agent::events::{BotEvent, EventSink};
use crate::agent::farming::{Farmer, Pacing};
use crate::agent::game_api::{
    ApiFuture, BoostStatus, CatchResponse, CatchStatus, DeployStatus, EncounterResponse,
    EncounterStatus, EvolveResponse, FortDetails, FortSearchResponse, FortSearchStatus,
    GameClient, GymDetails, GymStatus, Navigator, NullExportSink, PlayerProfile,
    PotionResponse, StepVisitor,
};
use crate::agent::session::SessionState;
use crate::config::{AuthScheme, Settings};
use crate::geo::LatLng;
use crate::player::inventory::{InventorySnapshot, ItemId};
use crate::player::pokemon::Pokemon;
use crate::sweeper::NullSnapshotStore;
use crate::world::map::MapSnapshot;

type Queue<T> = Mutex<VecDeque<anyhow::Result<T>>>;

fn pop<T>(queue: &Queue<T>) -> Option<anyhow::Result<T>> {
    queue.lock().unwrap().pop_front()
}

#[derive(Default)]
pub(crate) struct FakeGameClient {
    position: Mutex<LatLng>,
    map: Mutex<MapSnapshot>,
    items: Mutex<BTreeMap<ItemId, u32>>,
    pokemon: Mutex<Vec<Pokemon>>,

    login_results: Queue<()>,
    encounter_results: Queue<EncounterResponse>,
    lure_results: Queue<EncounterResponse>,
    catch_results: Queue<CatchResponse>,
    search_results: Queue<FortSearchResponse>,
    gym_results: Queue<GymDetails>,
    deploy_results: Queue<DeployStatus>,
    potion_results: Queue<PotionResponse>,
    boost_results: Queue<BoostStatus>,

    login_users: Mutex<Vec<String>>,
    encounter_count: Mutex<usize>,
    fort_detail_count: Mutex<usize>,
    search_count: Mutex<usize>,
    gym_detail_count: Mutex<usize>,
    player_count: Mutex<usize>,
    xp_boost_count: Mutex<usize>,
    catches: Mutex<Vec<(u64, String, ItemId)>>,
    capture_items: Mutex<Vec<ItemId>>,
    deploys: Mutex<Vec<(String, u64)>>,
    transfers: Mutex<Vec<u64>>,
    potions: Mutex<Vec<(ItemId, u64)>>,
    recycles: Mutex<Vec<(ItemId, u32)>>,
}

impl FakeGameClient {
    pub fn script_login(&self, result: anyhow::Result<()>) {
        self.login_results.lock().unwrap().push_back(result);
    }

    pub fn script_encounter(&self, result: anyhow::Result<EncounterResponse>) {
        self.encounter_results.lock().unwrap().push_back(result);
    }

    pub fn script_catch(&self, result: anyhow::Result<CatchResponse>) {
        self.catch_results.lock().unwrap().push_back(result);
    }

    pub fn script_search(&self, result: anyhow::Result<FortSearchResponse>) {
        self.search_results.lock().unwrap().push_back(result);
    }

    pub fn script_gym(&self, result: anyhow::Result<GymDetails>) {
        self.gym_results.lock().unwrap().push_back(result);
    }

    pub fn script_deploy(&self, result: anyhow::Result<DeployStatus>) {
        self.deploy_results.lock().unwrap().push_back(result);
    }

    pub fn script_potion(&self, result: anyhow::Result<PotionResponse>) {
        self.potion_results.lock().unwrap().push_back(result);
    }

    pub fn script_xp_boost(&self, result: anyhow::Result<BoostStatus>) {
        self.boost_results.lock().unwrap().push_back(result);
    }

    pub fn set_map(&self, map: MapSnapshot) {
        *self.map.lock().unwrap() = map;
    }

    pub fn set_inventory_items(&self, items: BTreeMap<ItemId, u32>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn set_inventory_pokemon(&self, pokemon: Vec<Pokemon>) {
        *self.pokemon.lock().unwrap() = pokemon;
    }

    pub fn login_attempts(&self) -> usize {
        self.login_users.lock().unwrap().len()
    }

    pub fn last_login_user(&self) -> Option<String> {
        self.login_users.lock().unwrap().last().cloned()
    }

    pub fn encounter_requests(&self) -> usize {
        *self.encounter_count.lock().unwrap()
    }

    pub fn fort_detail_requests(&self) -> usize {
        *self.fort_detail_count.lock().unwrap()
    }

    pub fn search_requests(&self) -> usize {
        *self.search_count.lock().unwrap()
    }

    pub fn gym_detail_requests(&self) -> usize {
        *self.gym_detail_count.lock().unwrap()
    }

    pub fn player_requests(&self) -> usize {
        *self.player_count.lock().unwrap()
    }

    pub fn xp_boost_requests(&self) -> usize {
        *self.xp_boost_count.lock().unwrap()
    }

    pub fn catch_requests(&self) -> Vec<(u64, String, ItemId)> {
        self.catches.lock().unwrap().clone()
    }

    pub fn capture_items_used(&self) -> Vec<ItemId> {
        self.capture_items.lock().unwrap().clone()
    }

    pub fn deployments(&self) -> Vec<(String, u64)> {
        self.deploys.lock().unwrap().clone()
    }

    pub fn transfer_requests(&self) -> Vec<u64> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn potion_requests(&self) -> Vec<(ItemId, u64)> {
        self.potions.lock().unwrap().clone()
    }

    pub fn recycle_requests(&self) -> Vec<(ItemId, u32)> {
        self.recycles.lock().unwrap().clone()
    }

    fn inventory(&self) -> InventorySnapshot {
        InventorySnapshot {
            items: self.items.lock().unwrap().clone(),
            pokemon: self.pokemon.lock().unwrap().clone(),
        }
    }
}

impl GameClient for FakeGameClient {
    fn login<'a>(
        &'a self,
        _scheme: AuthScheme,
        username: &'a str,
        _password: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.login_users.lock().unwrap().push(username.to_string());
            pop(&self.login_results).unwrap_or(Ok(()))
        })
    }

    fn position(&self) -> LatLng {
        *self.position.lock().unwrap()
    }

    fn set_position<'a>(&'a self, position: LatLng) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            *self.position.lock().unwrap() = position;
            Ok(())
        })
    }

    fn get_map_objects<'a>(&'a self) -> ApiFuture<'a, MapSnapshot> {
        Box::pin(async move { Ok(self.map.lock().unwrap().clone()) })
    }

    fn get_player<'a>(&'a self) -> ApiFuture<'a, PlayerProfile> {
        Box::pin(async move {
            *self.player_count.lock().unwrap() += 1;
            Ok(PlayerProfile {
                name: "fake trainer".into(),
                team: Some(1),
                stardust: 600,
                level: 12,
            })
        })
    }

    fn get_inventory<'a>(&'a self, _refresh: bool) -> ApiFuture<'a, InventorySnapshot> {
        Box::pin(async move { Ok(self.inventory()) })
    }

    fn encounter<'a>(
        &'a self,
        _encounter_id: u64,
        _spawn_point_id: &'a str,
    ) -> ApiFuture<'a, EncounterResponse> {
        Box::pin(async move {
            *self.encounter_count.lock().unwrap() += 1;
            pop(&self.encounter_results).unwrap_or(Ok(EncounterResponse {
                status: EncounterStatus::Other,
                data: None,
            }))
        })
    }

    fn encounter_lure<'a>(
        &'a self,
        _encounter_id: u64,
        _fort_id: &'a str,
    ) -> ApiFuture<'a, EncounterResponse> {
        Box::pin(async move {
            pop(&self.lure_results).unwrap_or(Ok(EncounterResponse {
                status: EncounterStatus::Other,
                data: None,
            }))
        })
    }

    fn use_capture_item<'a>(
        &'a self,
        _encounter_id: u64,
        item: ItemId,
        _target_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.capture_items.lock().unwrap().push(item);
            Ok(())
        })
    }

    fn catch<'a>(
        &'a self,
        encounter_id: u64,
        target_id: &'a str,
        ball: ItemId,
    ) -> ApiFuture<'a, CatchResponse> {
        Box::pin(async move {
            self.catches
                .lock()
                .unwrap()
                .push((encounter_id, target_id.to_string(), ball));
            pop(&self.catch_results).unwrap_or(Ok(CatchResponse {
                status: CatchStatus::Error,
                xp_awarded: vec![],
            }))
        })
    }

    fn get_fort_details<'a>(
        &'a self,
        fort_id: &'a str,
        position: LatLng,
    ) -> ApiFuture<'a, FortDetails> {
        Box::pin(async move {
            *self.fort_detail_count.lock().unwrap() += 1;
            Ok(FortDetails {
                fort_id: fort_id.to_string(),
                name: format!("fort {fort_id}"),
                position,
            })
        })
    }

    fn search_fort<'a>(
        &'a self,
        _fort_id: &'a str,
        _position: LatLng,
    ) -> ApiFuture<'a, FortSearchResponse> {
        Box::pin(async move {
            *self.search_count.lock().unwrap() += 1;
            pop(&self.search_results).unwrap_or(Ok(FortSearchResponse {
                status: FortSearchStatus::Other,
                experience: 0,
                items: vec![],
                egg: false,
            }))
        })
    }

    fn get_gym_details<'a>(
        &'a self,
        _fort_id: &'a str,
        _position: LatLng,
    ) -> ApiFuture<'a, GymDetails> {
        Box::pin(async move {
            *self.gym_detail_count.lock().unwrap() += 1;
            pop(&self.gym_results).unwrap_or(Ok(GymDetails {
                status: GymStatus::Other,
                name: String::new(),
                owned_by_team: None,
                membership_count: 0,
            }))
        })
    }

    fn deploy_to_gym<'a>(
        &'a self,
        fort_id: &'a str,
        pokemon_id: u64,
    ) -> ApiFuture<'a, DeployStatus> {
        Box::pin(async move {
            self.deploys
                .lock()
                .unwrap()
                .push((fort_id.to_string(), pokemon_id));
            pop(&self.deploy_results).unwrap_or(Ok(DeployStatus::Other))
        })
    }

    fn transfer<'a>(&'a self, pokemon_id: u64) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.transfers.lock().unwrap().push(pokemon_id);
            Ok(())
        })
    }

    fn evolve<'a>(&'a self, _pokemon_id: u64) -> ApiFuture<'a, EvolveResponse> {
        Box::pin(async move { Ok(EvolveResponse { success: true, experience: 500 }) })
    }

    fn recycle<'a>(&'a self, item: ItemId, count: u32) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.recycles.lock().unwrap().push((item, count));
            Ok(())
        })
    }

    fn use_potion<'a>(
        &'a self,
        item: ItemId,
        pokemon_id: u64,
    ) -> ApiFuture<'a, PotionResponse> {
        Box::pin(async move {
            self.potions.lock().unwrap().push((item, pokemon_id));
            pop(&self.potion_results)
                .unwrap_or(Ok(PotionResponse { success: true, stamina: 10_000 }))
        })
    }

    fn use_xp_boost<'a>(&'a self) -> ApiFuture<'a, BoostStatus> {
        Box::pin(async move {
            *self.xp_boost_count.lock().unwrap() += 1;
            pop(&self.boost_results).unwrap_or(Ok(BoostStatus::Success))
        })
    }

    fn use_incense<'a>(&'a self) -> ApiFuture<'a, BoostStatus> {
        Box::pin(async move { pop(&self.boost_results).unwrap_or(Ok(BoostStatus::Success)) })
    }
}

/// Teleports instantly and never invokes the visitor, so walking tests stay
/// deterministic.
#[derive(Default)]
pub(crate) struct FakeNavigator {
    walks: Mutex<Vec<(LatLng, f64)>>,
    fraction_walks: Mutex<usize>,
}

impl FakeNavigator {
    pub fn walks(&self) -> Vec<(LatLng, f64)> {
        self.walks.lock().unwrap().clone()
    }

    pub fn fraction_walks(&self) -> usize {
        *self.fraction_walks.lock().unwrap()
    }
}

impl Navigator for FakeNavigator {
    fn walk<'a>(
        &'a self,
        dest: LatLng,
        speed_kmh: f64,
        _visitor: Option<&'a mut dyn StepVisitor>,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.walks.lock().unwrap().push((dest, speed_kmh));
            Ok(())
        })
    }

    fn walk_fraction<'a>(
        &'a self,
        _dest: LatLng,
        _speed_kmh: f64,
        _fraction: f64,
        _visitor: Option<&'a mut dyn StepVisitor>,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            *self.fraction_walks.lock().unwrap() += 1;
            Ok(())
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<BotEvent>>,
}

impl RecordingSink {
    pub fn recorded(&self) -> Vec<BotEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &BotEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Bundle of fakes wired the way the runner wires the real collaborators.
pub(crate) struct Fixture {
    pub client: Arc<FakeGameClient>,
    pub navigator: Arc<FakeNavigator>,
    pub events: Arc<RecordingSink>,
    pub snapshots: Arc<NullSnapshotStore>,
    pub settings: Arc<Settings>,
    pub running: Arc<AtomicBool>,
}

impl Fixture {
    pub fn new(client: Arc<FakeGameClient>, running: Arc<AtomicBool>) -> Self {
        Self {
            client,
            navigator: Arc::new(FakeNavigator::default()),
            events: Arc::new(RecordingSink::default()),
            snapshots: Arc::new(NullSnapshotStore),
            settings: Arc::new(Settings::default()),
            running,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn farmer(self) -> Farmer {
        test_farmer_with(self)
    }
}

pub(crate) fn test_farmer_with(fixture: Fixture) -> Farmer {
    let state = SessionState::new(Arc::clone(&fixture.running));
    Farmer::new(
        fixture.client,
        fixture.navigator,
        fixture.events,
        Arc::new(NullExportSink),
        fixture.snapshots,
        fixture.settings,
        state,
        Pacing::zero(),
    )
}
