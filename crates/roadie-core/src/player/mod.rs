pub mod inventory;
pub mod pokemon;

pub use inventory::{InventorySnapshot, ItemId};
pub use pokemon::{Pokemon, PriorityMode};
