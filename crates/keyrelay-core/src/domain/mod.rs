//! Keyboard synchronization engines.
//!
//! All of these run on the single input-processing path and are not
//! internally synchronized.

pub mod mark;
pub mod planner;
pub mod resolver;
pub mod tracker;

pub use mark::{EventOrderGuard, Mark, MarkerSink};
pub use planner::{KeyAction, Keystroke, KeystrokePlanner, Plan};
pub use resolver::{KeyResolver, Resolution};
pub use tracker::{KeyState, ModifierTracker};
