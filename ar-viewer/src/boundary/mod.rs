//! Contracts for everything the viewer does not own.
//!
//! The AR runtime, renderer, asset store, overlay UI and quiz presenter are
//! all reached through the traits in this module. Back-ends only ever see a
//! [`Boundary`] and never the concrete adapters behind it.
//!
//! ## Adapters
//!
//! ```text
//! XrRuntime / MarkerRuntime  <- WebXrRuntime / PageMarkerRuntime (browser)
//!                            <- SimulatedRuntime (tests, native demo)
//! SceneRenderer              <- SharedSceneGraph (mirrored into Bevy)
//! AssetLoader                <- BevyAssetBridge / ScriptedAssetLoader
//! OverlayUi + QuizPresenter  <- RpcOverlay (postMessage) / Recording*
//! ```

use std::future::Future;
use std::pin::Pin;

/// Asset kinds, load tickets and the loader contract.
pub mod assets;

/// Element lookups for the overlay root and canvas.
pub mod dom;

/// Host facts and the versioned runtime registry.
pub mod environment;

/// Overlay affordances, UI commands and the quiz hand-off.
pub mod overlay;

/// In-memory overlay and quiz adapters that record every call.
#[cfg(any(test, not(target_arch = "wasm32")))]
pub mod recording;

/// Scene graph contract consumed by the back-ends.
pub mod renderer;

/// Immersive-AR and marker runtime contracts.
pub mod runtime;

/// Scripted runtime, asset loader and walkthrough used off-device.
#[cfg(any(test, not(target_arch = "wasm32")))]
pub mod simulated;

/// WebXR and page-tracker adapters with their registration hooks.
pub mod web;

pub use assets::{AssetError, AssetKind, AssetLoader, LoadCompletion, LoadTicket, LoadedAsset};
pub use environment::{RuntimeRegistry, XrEnvironment};
pub use overlay::{Affordance, Hint, OverlayUi, QuizPresenter, UiCommand};
pub use renderer::{NodeId, NodeSource, ReticleGlyph, ReticleVisual, SceneRenderer};

/// Non-`Send` boxed future; everything runs on the single UI task.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// The adapters one viewer talks to, passed by reference into back-ends.
pub struct Boundary {
    pub renderer: Box<dyn SceneRenderer>,
    pub assets: Box<dyn AssetLoader>,
    pub overlay: Box<dyn OverlayUi>,
    pub quiz: Box<dyn QuizPresenter>,
}
