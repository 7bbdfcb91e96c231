use std::collections::HashMap;

use crate::boundary::runtime::{
    AnchorId, HitTestSourceId, ImageTrackingResult, ImageTrackingState, RuntimeError, SessionFeature, SpaceId,
    VisibilityState, XrFrame,
};
use crate::engine::math::Pose;

/// Everything read from one browser frame callback.
///
/// The browser only answers pose queries inside its own frame callback, so
/// the adapter asks every question the viewer may ask up front and hands the
/// answers over as this frame.
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    pub timestamp_ms: f64,
    pub viewer: HashMap<SpaceId, Pose>,
    pub hits: HashMap<(HitTestSourceId, SpaceId), Result<Vec<Pose>, RuntimeError>>,
    pub anchors: HashMap<(AnchorId, SpaceId), Result<Option<Pose>, RuntimeError>>,
    pub images: Option<Result<Vec<ImageTrackingResult>, RuntimeError>>,
}

impl FrameSnapshot {
    pub fn at(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }
}

impl XrFrame for FrameSnapshot {
    fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    fn viewer_pose(&self, space: SpaceId) -> Option<Pose> {
        self.viewer.get(&space).copied()
    }

    /// A source created after this frame was taken has no results yet.
    fn hit_test_results(&self, source: HitTestSourceId, space: SpaceId) -> Result<Vec<Pose>, RuntimeError> {
        self.hits.get(&(source, space)).cloned().unwrap_or(Ok(Vec::new()))
    }

    fn anchor_pose(&self, anchor: AnchorId, space: SpaceId) -> Result<Option<Pose>, RuntimeError> {
        self.anchors.get(&(anchor, space)).cloned().unwrap_or(Ok(None))
    }

    fn image_tracking_results(&self) -> Result<Vec<ImageTrackingResult>, RuntimeError> {
        self.images.clone().unwrap_or(Ok(Vec::new()))
    }
}

/// Pose from a browser matrix: 16 finite floats, column-major.
pub fn pose_from_floats(values: &[f32]) -> Option<Pose> {
    let cols: &[f32; 16] = values.try_into().ok()?;
    cols.iter().all(|v| v.is_finite()).then(|| Pose::from_cols_array(cols))
}

pub fn visibility_from_str(state: &str) -> Option<VisibilityState> {
    match state {
        "visible" => Some(VisibilityState::Visible),
        "visible-blurred" => Some(VisibilityState::VisibleBlurred),
        "hidden" => Some(VisibilityState::Hidden),
        _ => None,
    }
}

/// Features the session reports as granted; unknown names are skipped.
pub fn features_from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<SessionFeature> {
    let mut features = Vec::new();
    for feature in names.into_iter().filter_map(SessionFeature::from_string) {
        if !features.contains(&feature) {
            features.push(feature);
        }
    }
    features
}

/// Image result as reported by a page tracker: `"tracked"` or `"emulated"`.
pub fn image_result(index: usize, matrix: &[f32], state: &str) -> Option<ImageTrackingResult> {
    let state = match state {
        "tracked" => ImageTrackingState::Tracked,
        "emulated" => ImageTrackingState::Emulated,
        _ => return None,
    };
    Some(ImageTrackingResult {
        image_index: index,
        pose: pose_from_floats(matrix)?,
        state,
    })
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use super::*;

    fn translated(x: f32) -> [f32; 16] {
        let mut cols = Pose::IDENTITY.to_cols_array();
        cols[12] = x;
        cols
    }

    #[test]
    fn matrices_must_be_complete_and_finite() {
        let pose = pose_from_floats(&translated(2.0)).expect("valid matrix");
        assert_eq!(pose.position(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(pose_from_floats(&translated(2.0)[..15]), None);
        assert_eq!(pose_from_floats(&translated(f32::NAN)), None);
    }

    #[test]
    fn snapshot_answers_per_space() {
        let world = SpaceId(0);
        let viewer_space = SpaceId(1);
        let source = HitTestSourceId(0);
        let mut frame = FrameSnapshot::at(16.0);
        frame.viewer.insert(world, Pose::from_translation(Vec3::Y));
        frame
            .hits
            .insert((source, world), Ok(vec![Pose::from_translation(Vec3::NEG_Z)]));
        frame.anchors.insert((AnchorId(1), world), Ok(Some(Pose::IDENTITY)));

        assert_eq!(frame.viewer_pose(world), Some(Pose::from_translation(Vec3::Y)));
        assert_eq!(frame.viewer_pose(viewer_space), None);
        assert_eq!(frame.hit_test_results(source, world).map(|h| h.len()), Ok(1));
        // Source requested after the frame was read.
        assert_eq!(frame.hit_test_results(HitTestSourceId(1), world), Ok(Vec::new()));
        assert_eq!(frame.anchor_pose(AnchorId(1), world), Ok(Some(Pose::IDENTITY)));
        assert_eq!(frame.anchor_pose(AnchorId(1), viewer_space), Ok(None));
        assert_eq!(frame.image_tracking_results(), Ok(Vec::new()));
    }

    #[test]
    fn hit_faults_are_kept_for_the_frame() {
        let mut frame = FrameSnapshot::at(0.0);
        frame.hits.insert(
            (HitTestSourceId(0), SpaceId(0)),
            Err(RuntimeError::Fault("InvalidStateError".into())),
        );
        assert!(frame.hit_test_results(HitTestSourceId(0), SpaceId(0)).is_err());
    }

    #[test]
    fn granted_feature_names_are_deduplicated() {
        let features = features_from_names(["hit-test", "local-floor", "depth-sensing", "hit-test", "viewer"]);
        assert_eq!(
            features,
            vec![SessionFeature::HitTest, SessionFeature::LocalFloor, SessionFeature::Viewer]
        );
    }

    #[test]
    fn visibility_names() {
        assert_eq!(visibility_from_str("visible-blurred"), Some(VisibilityState::VisibleBlurred));
        assert_eq!(visibility_from_str("hidden"), Some(VisibilityState::Hidden));
        assert_eq!(visibility_from_str("gone"), None);
    }

    #[test]
    fn page_tracker_results() {
        let tracked = image_result(0, &translated(0.5), "tracked").expect("tracked result");
        assert_eq!(tracked.state, ImageTrackingState::Tracked);
        assert_eq!(tracked.pose.position(), Vec3::new(0.5, 0.0, 0.0));
        assert!(image_result(0, &translated(0.5), "lost").is_none());
        assert!(image_result(0, &[0.0; 4], "emulated").is_none());
    }
}
