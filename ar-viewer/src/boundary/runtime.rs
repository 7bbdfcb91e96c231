use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::LocalBoxFuture;
use crate::engine::math::Pose;

/// Session mode requested from the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    ImmersiveAr,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmersiveAr => "immersive-ar",
        }
    }
}

/// Coordinate frames the controller negotiates, most stable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceKind {
    LocalFloor,
    Local,
    Viewer,
}

impl ReferenceSpaceKind {
    pub const NEGOTIATION_ORDER: [ReferenceSpaceKind; 3] = [Self::LocalFloor, Self::Local, Self::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalFloor => "local-floor",
            Self::Local => "local",
            Self::Viewer => "viewer",
        }
    }
}

/// Optional session capabilities, in the order they are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionFeature {
    DomOverlay,
    HitTest,
    Anchors,
    LocalFloor,
    Local,
    Viewer,
}

impl SessionFeature {
    pub const REQUEST_ORDER: [SessionFeature; 6] = [
        Self::DomOverlay,
        Self::HitTest,
        Self::Anchors,
        Self::LocalFloor,
        Self::Local,
        Self::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomOverlay => "dom-overlay",
            Self::HitTest => "hit-test",
            Self::Anchors => "anchors",
            Self::LocalFloor => "local-floor",
            Self::Local => "local",
            Self::Viewer => "viewer",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        Self::REQUEST_ORDER.into_iter().find(|f| f.as_str() == s)
    }
}

/// Options passed along with a session request.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub optional_features: Vec<SessionFeature>,
    /// DOM element id registered for overlay, when dom-overlay is requested.
    pub overlay_root: Option<String>,
}

impl SessionRequest {
    pub fn requests(&self, feature: SessionFeature) -> bool {
        self.optional_features.contains(&feature)
    }

    pub fn without(&self, feature: SessionFeature) -> SessionRequest {
        SessionRequest {
            optional_features: self
                .optional_features
                .iter()
                .copied()
                .filter(|f| *f != feature)
                .collect(),
            overlay_root: if feature == SessionFeature::DomOverlay {
                None
            } else {
                self.overlay_root.clone()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{mode} is not supported on this device")]
    Unsupported { mode: &'static str },
    #[error("session request rejected: {reason}")]
    Rejected {
        reason: String,
        /// Capability the runtime blamed, when it named one.
        feature: Option<SessionFeature>,
    },
    #[error("reference space {0} unavailable")]
    ReferenceSpaceUnavailable(&'static str),
    #[error("runtime fault: {0}")]
    Fault(String),
}

impl RuntimeError {
    /// Whether the runtime rejected the request because of `feature`.
    pub fn cites(&self, feature: SessionFeature) -> bool {
        match self {
            Self::Rejected { feature: Some(f), .. } => *f == feature,
            Self::Rejected { reason, feature: None } => reason.contains(feature.as_str()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitTestSourceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Visible,
    VisibleBlurred,
    Hidden,
}

/// Session events delivered alongside frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    End,
    VisibilityChange(VisibilityState),
    /// Primary input (screen tap) not swallowed by the overlay.
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTrackingState {
    Tracked,
    /// Pose is a prediction; the image is not currently visible.
    Emulated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageTrackingResult {
    pub image_index: usize,
    pub pose: Pose,
    pub state: ImageTrackingState,
}

/// Precompiled image target the marker runtime tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDescriptor {
    pub path: String,
    pub width_m: f32,
    pub height_m: f32,
}

/// Immersive-AR runtime entry points.
pub trait XrRuntime {
    fn is_session_supported(&self, mode: SessionMode) -> LocalBoxFuture<'_, Result<bool, RuntimeError>>;

    fn request_session<'a>(
        &'a self,
        mode: SessionMode,
        request: &'a SessionRequest,
    ) -> LocalBoxFuture<'a, Result<Box<dyn XrSession>, RuntimeError>>;
}

/// A running immersive session.
///
/// Frames are pulled with `poll_frame`; events that arrived with a frame are
/// drained with `poll_events` right after it.
pub trait XrSession {
    fn enabled_features(&self) -> Vec<SessionFeature>;

    fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> LocalBoxFuture<'_, Result<SpaceId, RuntimeError>>;

    fn request_hit_test_source(
        &mut self,
        space: SpaceId,
    ) -> LocalBoxFuture<'_, Result<HitTestSourceId, RuntimeError>>;

    fn create_anchor(&mut self, pose: &Pose, space: SpaceId) -> Result<AnchorId, RuntimeError>;

    fn delete_anchor(&mut self, anchor: AnchorId) -> Result<(), RuntimeError>;

    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>>;

    fn poll_events(&mut self) -> Vec<SessionEvent>;

    fn end(&mut self);
}

/// One display frame's view of the tracked world.
pub trait XrFrame {
    fn timestamp_ms(&self) -> f64;

    fn viewer_pose(&self, space: SpaceId) -> Option<Pose>;

    /// Hit poses for `source`, nearest first, expressed in `space`.
    fn hit_test_results(&self, source: HitTestSourceId, space: SpaceId) -> Result<Vec<Pose>, RuntimeError>;

    /// `Ok(None)` means the runtime no longer tracks the anchor.
    fn anchor_pose(&self, anchor: AnchorId, space: SpaceId) -> Result<Option<Pose>, RuntimeError>;

    fn image_tracking_results(&self) -> Result<Vec<ImageTrackingResult>, RuntimeError>;
}

/// Image-target runtime used when immersive AR is unavailable.
pub trait MarkerRuntime {
    fn start<'a>(
        &'a self,
        descriptor: &'a MarkerDescriptor,
    ) -> LocalBoxFuture<'a, Result<Box<dyn MarkerSession>, RuntimeError>>;
}

pub trait MarkerSession {
    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>>;

    fn poll_events(&mut self) -> Vec<SessionEvent>;

    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_names_round_trip() {
        for feature in SessionFeature::REQUEST_ORDER {
            assert_eq!(SessionFeature::from_string(feature.as_str()), Some(feature));
        }
        assert_eq!(SessionFeature::from_string("depth-sensing"), None);
    }

    #[test]
    fn dropping_overlay_clears_root() {
        let request = SessionRequest {
            optional_features: SessionFeature::REQUEST_ORDER.to_vec(),
            overlay_root: Some("ar-overlay".into()),
        };
        let retry = request.without(SessionFeature::DomOverlay);
        assert!(!retry.requests(SessionFeature::DomOverlay));
        assert!(retry.requests(SessionFeature::HitTest));
        assert_eq!(retry.overlay_root, None);
    }

    #[test]
    fn rejection_cites_feature_by_name_or_tag() {
        let tagged = RuntimeError::Rejected {
            reason: "nope".into(),
            feature: Some(SessionFeature::DomOverlay),
        };
        let named = RuntimeError::Rejected {
            reason: "dom-overlay is not available".into(),
            feature: None,
        };
        assert!(tagged.cites(SessionFeature::DomOverlay));
        assert!(named.cites(SessionFeature::DomOverlay));
        assert!(!named.cites(SessionFeature::Anchors));
    }
}
