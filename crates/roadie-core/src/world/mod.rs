pub mod map;

pub use map::{Catchable, Fort, FortKind, LureInfo, MapSnapshot};
