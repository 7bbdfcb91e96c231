//! Off-device stand-ins for the AR runtime, asset store and host.
//!
//! Frames are scripted through a shared [`SimulationHandle`]: tests push
//! exactly the frames a scenario needs, while the native demo feeds frames
//! generated by [`SimulatedWorld`] from a camera walkthrough.

mod assets;
mod environment;
mod runtime;
mod world;

pub use assets::ScriptedAssetLoader;
pub use environment::SimulatedEnvironment;
pub use runtime::{
    SimulatedDevice, SimulatedFrame, SimulatedMarkerRuntime, SimulatedRuntime, SimulationHandle,
};
pub use world::SimulatedWorld;
