use thiserror::Error;

use crate::boundary::assets::AssetError;
use crate::boundary::renderer::RendererError;
use crate::boundary::runtime::RuntimeError;
use crate::engine::capability::BackendKind;

/// Neither immersive AR nor a marker runtime is usable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("this device supports neither immersive AR nor image tracking")]
    NoSupportedBackend,
    #[error("capability query failed: {0}")]
    Query(#[from] RuntimeError),
}

/// Anything that stops a session before the frame pump runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartupError {
    #[error("AR session was refused: {0}")]
    SessionRejected(RuntimeError),
    #[error("no reference space available (tried local-floor, local, viewer)")]
    NoReferenceSpace,
    #[error("canvas cannot be mounted: {0}")]
    CanvasUnavailable(#[from] RendererError),
    #[error("{backend} back-end failed to load from {path}: {reason}")]
    BackendLoad {
        backend: &'static str,
        path: String,
        reason: String,
    },
}

/// Faults inside a single frame; logged and dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("hit-test failed: {0}")]
    HitTest(RuntimeError),
    #[error("image tracking failed: {0}")]
    ImageTracking(RuntimeError),
}

/// Wiring mistakes detected at start-up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    #[error("overlay root `{0}` is missing")]
    MissingOverlayRoot(String),
    #[error("no runtime adapter published for the {0:?} back-end")]
    MissingRuntimeAdapter(BackendKind),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnchorError {
    #[error("anchor is no longer tracked")]
    Stale,
    #[error("anchor could not be created: {0}")]
    Create(RuntimeError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} range is inverted ({min} > {max})")]
    InvertedRange { field: &'static str, min: f64, max: f64 },
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("cooldown and floor lift cannot be negative")]
    Negative,
    #[error("{0} is empty")]
    EmptyPath(&'static str),
}

/// Top-level error surfaced by the router.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    SessionStart(#[from] StartupError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl ArError {
    /// One-line diagnostic for the overlay, naming the missing piece.
    pub fn user_message(&self) -> String {
        match self {
            Self::Capability(CapabilityError::NoSupportedBackend) => {
                "AR is not available on this device or browser".to_string()
            }
            Self::Capability(CapabilityError::Query(err)) => format!("Could not check for AR support: {}", err),
            Self::SessionStart(StartupError::SessionRejected(_)) => {
                "The AR session was refused; check camera permissions".to_string()
            }
            Self::SessionStart(StartupError::NoReferenceSpace) => {
                "AR tracking could not start: no reference space".to_string()
            }
            Self::SessionStart(err @ StartupError::CanvasUnavailable(_)) => format!("Display unavailable: {}", err),
            Self::SessionStart(StartupError::BackendLoad { path, .. }) => format!("Failed to load {}", path),
            Self::Setup(err) => format!("AR viewer is misconfigured: {}", err),
            Self::Asset(err) => format!("Content failed to load: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_load_message_names_the_path() {
        let err = ArError::from(StartupError::BackendLoad {
            backend: "marker",
            path: "markers/target.mind".into(),
            reason: "404".into(),
        });
        assert!(err.user_message().contains("markers/target.mind"));
    }

    #[test]
    fn no_reference_space_is_one_line() {
        let message = ArError::from(StartupError::NoReferenceSpace).user_message();
        assert!(message.contains("reference space"));
        assert!(!message.contains('\n'));
    }
}
