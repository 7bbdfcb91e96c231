//! Placement of wall and floor content.
//!
//! ## State machine
//!
//! ```text
//! idle --begin--> searching <--> stable --auto/tap--> placed <--> lost
//!                     \______________tap______________/   |
//!   * --reset--> searching         * --shutdown--> idle    +--respawn/tap--> placed
//! ```
//!
//! Spawns that need an asset hold the current state until the load
//! resolves; a failed load is replaced by a placeholder box.

mod content;
mod engine;
mod state;

pub use content::{ContentNodes, build_content, fit_transform, placement_matrix, surface_correction};
pub use engine::{FrameInput, PlacementEngine, draw_delay};
pub use state::{Anchoring, PendingSpawn, PlacedContent, PlacementState, SpawnRecord, SpawnTrigger};
