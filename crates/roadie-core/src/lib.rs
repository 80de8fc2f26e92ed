//! Decision core for an automated map-farming game agent.
//!
//! The crate models the game world as immutable per-cycle snapshots and keeps
//! every policy (capture-item selection, soft-ban detection, target routing,
//! inventory maintenance) as a pure or `Instant`-parameterized unit so the
//! whole loop is testable without a live backend. All I/O goes through the
//! object-safe async traits in [`agent::game_api`]; the runner binary provides
//! implementations that talk to a local gateway process.

pub mod agent;
pub mod config;
pub mod geo;
pub mod player;
pub mod sweeper;
pub mod world;
