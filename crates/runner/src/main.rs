//! Runner binary: connects the decision core to a local gateway process over
//! newline-delimited JSON and starts the session.
//!
//! Environment:
//! - `ROADIE_GATEWAY_ADDR` - gateway TCP address (default 127.0.0.1:7878)
//! - `ROADIE_CONFIG` - settings file name (default roadie.toml)
//! - `ROADIE_STAGING_DIR` - snapshot staging root (default staging)
//! - `ROADIE_EXPORT_DIR` - roster export directory (default export)
//! - `RUST_LOG` - tracing filter (default info)

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use roadie_core::agent::events::NullSink;
use roadie_core::agent::game_api::{
    ApiFuture, BoostStatus, CatchResponse, DeployStatus, EncounterResponse, EvolveResponse,
    ExportSink, FortDetails, FortSearchResponse, GameClient, GymDetails, LoginFailure,
    Navigator, PlayerProfile, PotionResponse, StepVisitor,
};
use roadie_core::agent::{Farmer, Pacing, SessionController, SessionState};
use roadie_core::config::{AuthScheme, ConfigLoader};
use roadie_core::geo::LatLng;
use roadie_core::player::inventory::{InventorySnapshot, ItemId};
use roadie_core::sweeper::{FsSnapshotStore, SnapshotSink, SnapshotStore, Sweeper};
use roadie_core::world::map::MapSnapshot;

/// Maps a gateway error code to the typed failure the session controller
/// classifies on.
fn gateway_failure(code: &str) -> anyhow::Error {
    match code {
        "offline" => LoginFailure::Offline.into(),
        "interactive_required" => LoginFailure::InteractiveRequired.into(),
        "bad_credentials" => LoginFailure::BadCredentials.into(),
        other => anyhow::anyhow!("gateway error: {other}"),
    }
}

struct ControlConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// One multiplexed control connection to the gateway. Requests are
/// serialized through a mutex; the gateway answers in order.
struct RemoteGameClient {
    conn: tokio::sync::Mutex<ControlConn>,
    position: std::sync::Mutex<LatLng>,
}

impl RemoteGameClient {
    async fn connect(addr: &str, start: LatLng) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to gateway at {addr}"))?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            conn: tokio::sync::Mutex::new(ControlConn {
                reader: BufReader::new(read),
                writer,
            }),
            position: std::sync::Mutex::new(start),
        })
    }

    async fn request(&self, payload: Value) -> Result<Value> {
        let mut line = serde_json::to_string(&payload)?;
        line.push('\n');
        let mut conn = self.conn.lock().await;
        conn.writer
            .write_all(line.as_bytes())
            .await
            .context("writing to gateway")?;
        conn.writer.flush().await.ok();
        let mut response = String::new();
        let read = conn
            .reader
            .read_line(&mut response)
            .await
            .context("reading from gateway")?;
        drop(conn);
        if read == 0 {
            bail!("gateway closed the connection");
        }
        let value: Value =
            serde_json::from_str(response.trim()).context("parsing gateway response")?;
        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(gateway_failure(code));
        }
        Ok(value.get("data").cloned().unwrap_or(Value::Null))
    }

    async fn request_as<T: DeserializeOwned>(&self, payload: Value) -> Result<T> {
        let data = self.request(payload).await?;
        serde_json::from_value(data).context("decoding gateway payload")
    }

    fn cached_position(&self) -> LatLng {
        *self.position.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl GameClient for RemoteGameClient {
    fn login<'a>(
        &'a self,
        scheme: AuthScheme,
        username: &'a str,
        password: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let scheme = match scheme {
                AuthScheme::Ptc => "ptc",
                AuthScheme::Google => "google",
            };
            self.request(json!({
                "op": "login",
                "scheme": scheme,
                "username": username,
                "password": password,
            }))
            .await?;
            // Push the cached position so the backend agrees where we stand.
            let start = self.cached_position();
            self.set_position(start).await
        })
    }

    fn position(&self) -> LatLng {
        self.cached_position()
    }

    fn set_position<'a>(&'a self, position: LatLng) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.request(json!({ "op": "set_position", "position": position }))
                .await?;
            *self.position.lock().unwrap_or_else(|e| e.into_inner()) = position;
            Ok(())
        })
    }

    fn get_map_objects<'a>(&'a self) -> ApiFuture<'a, MapSnapshot> {
        Box::pin(async move { self.request_as(json!({ "op": "get_map_objects" })).await })
    }

    fn get_player<'a>(&'a self) -> ApiFuture<'a, PlayerProfile> {
        Box::pin(async move { self.request_as(json!({ "op": "get_player" })).await })
    }

    fn get_inventory<'a>(&'a self, refresh: bool) -> ApiFuture<'a, InventorySnapshot> {
        Box::pin(async move {
            self.request_as(json!({ "op": "get_inventory", "refresh": refresh }))
                .await
        })
    }

    fn encounter<'a>(
        &'a self,
        encounter_id: u64,
        spawn_point_id: &'a str,
    ) -> ApiFuture<'a, EncounterResponse> {
        Box::pin(async move {
            self.request_as(json!({
                "op": "encounter",
                "encounter_id": encounter_id,
                "spawn_point_id": spawn_point_id,
            }))
            .await
        })
    }

    fn encounter_lure<'a>(
        &'a self,
        encounter_id: u64,
        fort_id: &'a str,
    ) -> ApiFuture<'a, EncounterResponse> {
        Box::pin(async move {
            self.request_as(json!({
                "op": "encounter_lure",
                "encounter_id": encounter_id,
                "fort_id": fort_id,
            }))
            .await
        })
    }

    fn use_capture_item<'a>(
        &'a self,
        encounter_id: u64,
        item: ItemId,
        target_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.request(json!({
                "op": "use_capture_item",
                "encounter_id": encounter_id,
                "item": item,
                "target_id": target_id,
            }))
            .await?;
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
            self.request_as(json!({
                "op": "catch",
                "encounter_id": encounter_id,
                "target_id": target_id,
                "ball": ball,
            }))
            .await
        })
    }

    fn get_fort_details<'a>(
        &'a self,
        fort_id: &'a str,
        position: LatLng,
    ) -> ApiFuture<'a, FortDetails> {
        Box::pin(async move {
            self.request_as(json!({
                "op": "get_fort_details",
                "fort_id": fort_id,
                "position": position,
            }))
            .await
        })
    }

    fn search_fort<'a>(
        &'a self,
        fort_id: &'a str,
        position: LatLng,
    ) -> ApiFuture<'a, FortSearchResponse> {
        Box::pin(async move {
            self.request_as(json!({
                "op": "search_fort",
                "fort_id": fort_id,
                "position": position,
            }))
            .await
        })
    }

    fn get_gym_details<'a>(
        &'a self,
        fort_id: &'a str,
        position: LatLng,
    ) -> ApiFuture<'a, GymDetails> {
        Box::pin(async move {
            self.request_as(json!({
                "op": "get_gym_details",
                "fort_id": fort_id,
                "position": position,
            }))
            .await
        })
    }

    fn deploy_to_gym<'a>(
        &'a self,
        fort_id: &'a str,
        pokemon_id: u64,
    ) -> ApiFuture<'a, DeployStatus> {
        Box::pin(async move {
            self.request_as(json!({
                "op": "deploy_to_gym",
                "fort_id": fort_id,
                "pokemon_id": pokemon_id,
            }))
            .await
        })
    }

    fn transfer<'a>(&'a self, pokemon_id: u64) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.request(json!({ "op": "transfer", "pokemon_id": pokemon_id }))
                .await?;
            Ok(())
        })
    }

    fn evolve<'a>(&'a self, pokemon_id: u64) -> ApiFuture<'a, EvolveResponse> {
        Box::pin(async move {
            self.request_as(json!({ "op": "evolve", "pokemon_id": pokemon_id }))
                .await
        })
    }

    fn recycle<'a>(&'a self, item: ItemId, count: u32) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.request(json!({ "op": "recycle", "item": item, "count": count }))
                .await?;
            Ok(())
        })
    }

    fn use_potion<'a>(&'a self, item: ItemId, pokemon_id: u64) -> ApiFuture<'a, PotionResponse> {
        Box::pin(async move {
            self.request_as(json!({
                "op": "use_potion",
                "item": item,
                "pokemon_id": pokemon_id,
            }))
            .await
        })
    }

    fn use_xp_boost<'a>(&'a self) -> ApiFuture<'a, BoostStatus> {
        Box::pin(async move { self.request_as(json!({ "op": "use_xp_boost" })).await })
    }

    fn use_incense<'a>(&'a self) -> ApiFuture<'a, BoostStatus> {
        Box::pin(async move { self.request_as(json!({ "op": "use_incense" })).await })
    }
}

#[derive(serde::Deserialize)]
struct RouteLeg {
    position: LatLng,
    #[serde(default)]
    pause_ms: u64,
}

/// Asks the gateway to plan a humanized route, then replays it leg by leg,
/// handing control to the step visitor between legs.
struct RemoteNavigator {
    client: Arc<RemoteGameClient>,
}

impl RemoteNavigator {
    fn new(client: Arc<RemoteGameClient>) -> Self {
        Self { client }
    }
}

impl Navigator for RemoteNavigator {
    fn walk<'a>(
        &'a self,
        dest: LatLng,
        speed_kmh: f64,
        mut visitor: Option<&'a mut dyn StepVisitor>,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let legs: Vec<RouteLeg> = self
                .client
                .request_as(json!({
                    "op": "plan_route",
                    "from": self.client.cached_position(),
                    "to": dest,
                    "speed_kmh": speed_kmh,
                }))
                .await
                .context("planning route")?;
            for leg in legs {
                self.client.set_position(leg.position).await?;
                if leg.pause_ms > 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(leg.pause_ms)).await;
                }
                if let Some(visitor) = visitor.as_mut() {
                    visitor.on_step().await?;
                }
            }
            Ok(())
        })
    }

    fn walk_fraction<'a>(
        &'a self,
        dest: LatLng,
        speed_kmh: f64,
        fraction: f64,
        visitor: Option<&'a mut dyn StepVisitor>,
    ) -> ApiFuture<'a, ()> {
        let target = self.client.cached_position().toward(&dest, fraction);
        self.walk(target, speed_kmh, visitor)
    }
}

/// Writes the roster to a CSV file on each export.
struct CsvExportSink {
    dir: PathBuf,
}

impl CsvExportSink {
    fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating export dir {}", dir.display()))?;
        Ok(Self { dir })
    }
}

impl ExportSink for CsvExportSink {
    fn export<'a>(
        &'a self,
        profile: Option<&'a PlayerProfile>,
        inventory: &'a InventorySnapshot,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let owner = profile.map(|p| p.name.as_str()).unwrap_or("unknown");
            let mut body = String::from("owner,species,cp,iv,stamina,stamina_max,deployed\n");
            for p in &inventory.pokemon {
                body.push_str(&format!(
                    "{},{},{},{:.1},{},{},{}\n",
                    owner,
                    p.species,
                    p.cp,
                    p.perfection(),
                    p.stamina,
                    p.stamina_max,
                    p.is_deployed()
                ));
            }
            let path = self.dir.join("roster.csv");
            std::fs::write(&path, body)
                .with_context(|| format!("writing {}", path.display()))?;
            Ok(())
        })
    }
}

/// Publishes staged snapshot files back through the control connection.
struct GatewaySnapshotSink {
    client: Arc<RemoteGameClient>,
}

impl SnapshotSink for GatewaySnapshotSink {
    fn publish<'a>(&'a self, path: &'a Path) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let snapshot: Value = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("snapshot");
            self.client
                .request(json!({
                    "op": "publish_snapshot",
                    "name": name,
                    "snapshot": snapshot,
                }))
                .await?;
            Ok(())
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let gateway_addr = env_or("ROADIE_GATEWAY_ADDR", "127.0.0.1:7878");
    let config_file = env_or("ROADIE_CONFIG", "roadie.toml");
    let staging_dir = env_or("ROADIE_STAGING_DIR", "staging");
    let export_dir = env_or("ROADIE_EXPORT_DIR", "export");

    let settings = Arc::new(ConfigLoader::new(&config_file).load()?);
    info!(gateway = %gateway_addr, config = %config_file, "starting");

    let client = Arc::new(RemoteGameClient::connect(&gateway_addr, settings.start).await?);
    let navigator = Arc::new(RemoteNavigator::new(Arc::clone(&client)));
    let snapshots = Arc::new(FsSnapshotStore::new(&staging_dir));
    let export = Arc::new(CsvExportSink::new(&export_dir)?);
    let running = Arc::new(AtomicBool::new(true));

    let state = SessionState::new(Arc::clone(&running));
    let farmer = Farmer::new(
        Arc::clone(&client) as Arc<dyn GameClient>,
        navigator,
        Arc::new(NullSink),
        export,
        Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
        Arc::clone(&settings),
        state,
        Pacing::default(),
    );
    let mut controller = SessionController::new(
        farmer,
        Arc::clone(&client) as Arc<dyn GameClient>,
        Arc::clone(&settings),
        Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
        Arc::clone(&running),
    );

    let sweeper = Sweeper::new(
        snapshots.directories().to_vec(),
        Arc::new(GatewaySnapshotSink { client: Arc::clone(&client) }) as Arc<dyn SnapshotSink>,
        Arc::clone(&running),
    );
    tokio::spawn(sweeper.run());

    let handle = controller.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            handle.stop();
        }
    });

    controller.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_codes_map_to_login_failures() {
        assert_eq!(
            gateway_failure("offline").downcast_ref::<LoginFailure>(),
            Some(&LoginFailure::Offline)
        );
        assert_eq!(
            gateway_failure("interactive_required").downcast_ref::<LoginFailure>(),
            Some(&LoginFailure::InteractiveRequired)
        );
        assert_eq!(
            gateway_failure("bad_credentials").downcast_ref::<LoginFailure>(),
            Some(&LoginFailure::BadCredentials)
        );
        assert!(gateway_failure("flaky").downcast_ref::<LoginFailure>().is_none());
    }

    #[test]
    fn route_legs_decode_with_optional_pause() {
        let legs: Vec<RouteLeg> = serde_json::from_str(
            r#"[
                {"position": {"latitude": 1.0, "longitude": 2.0}, "pause_ms": 120},
                {"position": {"latitude": 1.1, "longitude": 2.1}}
            ]"#,
        )
        .expect("legs");
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].pause_ms, 120);
        assert_eq!(legs[1].pause_ms, 0);
    }
}
