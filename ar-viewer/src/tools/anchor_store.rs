use std::collections::BTreeMap;

use bevy::log::{debug, warn};

use crate::boundary::runtime::{AnchorId, RuntimeError, SpaceId, XrFrame};
use crate::engine::capability::AnchorSupport;
use crate::engine::error::AnchorError;
use crate::engine::math::Pose;

/// The slice of a session the anchor store needs.
pub trait AnchorRuntime {
    fn create_anchor(&mut self, pose: &Pose) -> Result<AnchorId, RuntimeError>;

    fn delete_anchor(&mut self, anchor: AnchorId) -> Result<(), RuntimeError>;
}

/// Opaque handle returned by [`AnchorStore::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorRef(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
enum AnchorEntry {
    Runtime(AnchorId),
    /// No anchor API: the pose never drifts and never relocalises.
    Stored(Pose),
}

/// Owns every anchor the placement engine creates during a session.
#[derive(Debug)]
pub struct AnchorStore {
    support: AnchorSupport,
    entries: BTreeMap<AnchorRef, AnchorEntry>,
    next: u64,
}

impl Default for AnchorStore {
    fn default() -> Self {
        Self::new(AnchorSupport::StoredPose)
    }
}

impl AnchorStore {
    pub fn new(support: AnchorSupport) -> Self {
        Self {
            support,
            entries: BTreeMap::new(),
            next: 0,
        }
    }

    pub fn support(&self) -> AnchorSupport {
        self.support
    }

    /// Switch anchor support for a new session. Existing entries are kept
    /// so they can still be released.
    pub fn set_support(&mut self, support: AnchorSupport) {
        self.support = support;
    }

    pub fn attach(&mut self, runtime: &mut dyn AnchorRuntime, pose: &Pose) -> Result<AnchorRef, AnchorError> {
        let entry = match self.support {
            AnchorSupport::Runtime => AnchorEntry::Runtime(runtime.create_anchor(pose).map_err(AnchorError::Create)?),
            AnchorSupport::StoredPose => AnchorEntry::Stored(*pose),
        };
        self.next += 1;
        let anchor = AnchorRef(self.next);
        debug!("Anchor {:?} attached as {:?}", anchor, entry);
        self.entries.insert(anchor, entry);
        Ok(anchor)
    }

    /// Current pose of `anchor`; `Stale` once the runtime stops tracking it.
    pub fn pose_of(&self, frame: &dyn XrFrame, space: SpaceId, anchor: AnchorRef) -> Result<Pose, AnchorError> {
        match self.entries.get(&anchor) {
            Some(AnchorEntry::Stored(pose)) => Ok(*pose),
            Some(AnchorEntry::Runtime(id)) => match frame.anchor_pose(*id, space) {
                Ok(Some(pose)) => Ok(pose),
                Ok(None) => Err(AnchorError::Stale),
                Err(err) => {
                    debug!("Anchor query for {:?} failed: {}", id, err);
                    Err(AnchorError::Stale)
                }
            },
            None => Err(AnchorError::Stale),
        }
    }

    /// Forget `anchor`; runtime deletion failures are logged only.
    pub fn release(&mut self, runtime: &mut dyn AnchorRuntime, anchor: AnchorRef) {
        if let Some(AnchorEntry::Runtime(id)) = self.entries.remove(&anchor) {
            if let Err(err) = runtime.delete_anchor(id) {
                warn!("Releasing anchor {:?} failed: {}", id, err);
            }
        }
    }

    pub fn release_all(&mut self, runtime: &mut dyn AnchorRuntime) {
        let anchors: Vec<AnchorRef> = self.entries.keys().copied().collect();
        for anchor in anchors {
            self.release(runtime, anchor);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::simulated::SimulatedFrame;
    use bevy::math::Vec3;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeRuntime {
        next: u64,
        live: HashSet<AnchorId>,
        refuse: bool,
    }

    impl AnchorRuntime for FakeRuntime {
        fn create_anchor(&mut self, _pose: &Pose) -> Result<AnchorId, RuntimeError> {
            if self.refuse {
                return Err(RuntimeError::Fault("anchor limit reached".into()));
            }
            self.next += 1;
            self.live.insert(AnchorId(self.next));
            Ok(AnchorId(self.next))
        }

        fn delete_anchor(&mut self, anchor: AnchorId) -> Result<(), RuntimeError> {
            self.live.remove(&anchor);
            Ok(())
        }
    }

    #[test]
    fn stored_pose_is_returned_as_is() {
        let mut runtime = FakeRuntime::default();
        let mut store = AnchorStore::new(AnchorSupport::StoredPose);
        let pose = Pose::from_translation(Vec3::new(1.0, 0.0, -2.0));
        let anchor = store.attach(&mut runtime, &pose).expect("attach");
        let frame = SimulatedFrame::at(0.0);
        assert_eq!(store.pose_of(&frame, SpaceId(1), anchor), Ok(pose));
        assert!(runtime.live.is_empty());
    }

    #[test]
    fn untracked_runtime_anchor_is_stale() {
        let mut runtime = FakeRuntime::default();
        let mut store = AnchorStore::new(AnchorSupport::Runtime);
        let anchor = store.attach(&mut runtime, &Pose::IDENTITY).expect("attach");
        // The frame snapshot knows nothing of this anchor.
        let frame = SimulatedFrame::at(0.0);
        assert_eq!(store.pose_of(&frame, SpaceId(1), anchor), Err(AnchorError::Stale));
    }

    #[test]
    fn release_all_deletes_runtime_anchors() {
        let mut runtime = FakeRuntime::default();
        let mut store = AnchorStore::new(AnchorSupport::Runtime);
        store.attach(&mut runtime, &Pose::IDENTITY).expect("attach");
        store.attach(&mut runtime, &Pose::IDENTITY).expect("attach");
        assert_eq!(runtime.live.len(), 2);
        store.release_all(&mut runtime);
        assert!(store.is_empty());
        assert!(runtime.live.is_empty());
    }

    #[test]
    fn refused_anchor_reports_create_error() {
        let mut runtime = FakeRuntime {
            refuse: true,
            ..FakeRuntime::default()
        };
        let mut store = AnchorStore::new(AnchorSupport::Runtime);
        assert!(matches!(
            store.attach(&mut runtime, &Pose::IDENTITY),
            Err(AnchorError::Create(_))
        ));
        assert!(store.is_empty());
    }
}
