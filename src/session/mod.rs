//! Short-lived per-sender interaction state
//!
//! When a sender uploads an item, the front-end asks them to pick a level
//! and needs to remember which item the later callback refers to. That
//! correlation lives here, bounded by a TTL and a capacity, and is owned by
//! the front-end.

mod level;
mod selections;

pub use level::{SelectionLevel, MAX_LEVEL, MIN_LEVEL};
pub use selections::{PendingSelections, DEFAULT_SELECTION_CAPACITY, DEFAULT_SELECTION_TTL};
