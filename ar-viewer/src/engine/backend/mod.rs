//! The two AR back-ends behind one trait.
//!
//! The router only ever talks to a `Box<dyn ArBackend>`; which one it gets
//! is decided once by the capability probe.

mod marker;
mod world;

pub use marker::{MarkerBackend, MarkerTracker, TrackingState};
pub use world::WorldBackend;

use serde::Serialize;

use crate::boundary::{AssetKind, Boundary, LocalBoxFuture};
use crate::engine::capability::BackendKind;
use crate::engine::error::ArError;
use crate::engine::session::EndReason;

/// Snapshot reported over RPC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStatus {
    pub backend: &'static str,
    pub running: bool,
    pub phase: &'static str,
    pub asset: Option<&'static str>,
    pub frames: u64,
    pub debug_reticle: bool,
}

pub trait ArBackend {
    fn kind(&self) -> BackendKind;

    /// Start (or re-enter) a session. Everything that can fail before the
    /// first frame fails here.
    fn start<'a>(&'a mut self, boundary: &'a mut Boundary) -> LocalBoxFuture<'a, Result<(), ArError>>;

    /// Process every frame the runtime has delivered; returns how many.
    fn pump(&mut self, boundary: &mut Boundary) -> usize;

    fn reset(&mut self, boundary: &mut Boundary);

    /// End the running session. A second call does nothing.
    fn end(&mut self, boundary: &mut Boundary, reason: EndReason);

    /// End the session and hand the placed content's kind to the quiz.
    fn exit_to_quiz(&mut self, boundary: &mut Boundary);

    fn current_asset_kind(&self) -> Option<AssetKind>;

    fn is_running(&self) -> bool;

    fn toggle_debug(&mut self, boundary: &mut Boundary);

    fn status(&self) -> BackendStatus;
}
