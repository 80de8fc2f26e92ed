pub mod encounter;
pub mod events;
pub mod farming;
pub mod game_api;
pub mod items;
pub mod navigation;
pub mod queue;
pub mod session;
pub mod softban;
pub mod upkeep;

#[cfg(test)]
pub(crate) mod test_support;

pub use events::{BotEvent, EventSink, NullSink};
pub use farming::{Farmer, Pacing};
pub use game_api::{ApiFuture, GameClient, LoginFailure, Navigator, StepVisitor};
pub use session::{RetryDelays, SessionController, SessionHandle, SessionState};
