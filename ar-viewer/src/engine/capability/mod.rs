//! Device capability detection and the tagged capability variants a session
//! ends up with.

mod probe;

pub use probe::{detect, wait_for_world_runtime};

use constants::probe::{ANDROID_MOBILE_MARKERS, APPLE_MOBILE_MARKERS};

use super::error::CapabilityError;
use crate::boundary::runtime::SessionFeature;

/// Platform class read from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformClass {
    /// Historically lacks native immersive AR; may get it from a polyfill.
    AppleMobile,
    AndroidMobile,
    Other,
}

impl PlatformClass {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if APPLE_MOBILE_MARKERS.iter().any(|m| user_agent.contains(m)) {
            Self::AppleMobile
        } else if ANDROID_MOBILE_MARKERS.iter().any(|m| user_agent.contains(m)) {
            Self::AndroidMobile
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppleMobile => "apple-mobile",
            Self::AndroidMobile => "android-mobile",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    World,
    Marker,
    None,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::World => "world",
            Self::Marker => "marker",
            Self::None => "none",
        }
    }
}

/// Result of one capability probe. Never mutated after `detect` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRecord {
    pub platform: PlatformClass,
    pub immersive_supported: bool,
    pub selected_backend: BackendKind,
    /// Why nothing was selected; `Some` only when `selected_backend` is `None`.
    pub reason: Option<CapabilityError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTestSupport {
    Available,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSupport {
    /// Runtime anchors are created in the session's reference space.
    Runtime,
    /// Anchors are stored poses that never drift and never relocalise.
    StoredPose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlaySupport {
    DomOverlay,
    Unavailable,
}

/// What a granted session can actually do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFeatures {
    pub hit_test: HitTestSupport,
    pub anchors: AnchorSupport,
    pub overlay: OverlaySupport,
}

impl SessionFeatures {
    pub fn from_enabled(enabled: &[SessionFeature]) -> Self {
        Self {
            hit_test: if enabled.contains(&SessionFeature::HitTest) {
                HitTestSupport::Available
            } else {
                HitTestSupport::Absent
            },
            anchors: if enabled.contains(&SessionFeature::Anchors) {
                AnchorSupport::Runtime
            } else {
                AnchorSupport::StoredPose
            },
            overlay: if enabled.contains(&SessionFeature::DomOverlay) {
                OverlaySupport::DomOverlay
            } else {
                OverlaySupport::Unavailable
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_from_user_agent() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
        let pixel = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/121.0";
        assert_eq!(PlatformClass::from_user_agent(iphone), PlatformClass::AppleMobile);
        assert_eq!(PlatformClass::from_user_agent(pixel), PlatformClass::AndroidMobile);
        assert_eq!(PlatformClass::from_user_agent(desktop), PlatformClass::Other);
    }

    #[test]
    fn features_follow_granted_set() {
        let features = SessionFeatures::from_enabled(&[SessionFeature::HitTest, SessionFeature::Local]);
        assert_eq!(features.hit_test, HitTestSupport::Available);
        assert_eq!(features.anchors, AnchorSupport::StoredPose);
        assert_eq!(features.overlay, OverlaySupport::Unavailable);
    }
}
