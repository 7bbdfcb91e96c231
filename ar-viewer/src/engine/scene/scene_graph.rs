use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use bevy::log::{debug, warn};
use bevy::math::Mat4;

use crate::boundary::renderer::RendererError;
use crate::boundary::{NodeId, NodeSource, ReticleVisual, SceneRenderer, dom};
use crate::engine::math::Pose;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub source: NodeSource,
    pub parent: Option<NodeId>,
    pub local: Mat4,
    pub visible: bool,
}

/// Retained scene the back-ends draw into.
///
/// Bevy mirrors it into entities each frame; tests inspect it directly.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, SceneNode>,
    next_id: u64,
    mounted: Option<String>,
    refuse_mount: bool,
    camera: Option<Pose>,
    reticle: Option<ReticleVisual>,
    animation_loop: bool,
    frames_submitted: u64,
    revision: u64,
}

impl SceneGraph {
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that render something (assets and placeholders).
    pub fn content_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| !matches!(node.source, NodeSource::Group))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn mounted_canvas(&self) -> Option<&str> {
        self.mounted.as_deref()
    }

    pub fn camera(&self) -> Option<Pose> {
        self.camera
    }

    pub fn reticle(&self) -> Option<ReticleVisual> {
        self.reticle
    }

    pub fn animation_loop_active(&self) -> bool {
        self.animation_loop
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Bumped on every structural or transform change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn world_of(&self, id: NodeId, depth: usize) -> Option<Mat4> {
        let node = self.nodes.get(&id)?;
        // Cycles are rejected in set_parent; the depth cap guards corrupt state.
        if depth > self.nodes.len() {
            return None;
        }
        match node.parent {
            Some(parent) => Some(self.world_of(parent, depth + 1)? * node.local),
            None => Some(node.local),
        }
    }

    fn visible_of(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(id) = current {
            let Some(node) = self.nodes.get(&id) else {
                return false;
            };
            if !node.visible || steps > self.nodes.len() {
                return false;
            }
            current = node.parent;
            steps += 1;
        }
        true
    }

    fn is_ancestor(&self, ancestor: NodeId, of: NodeId) -> bool {
        let mut current = Some(of);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
            steps += 1;
            if steps > self.nodes.len() {
                return true;
            }
        }
        false
    }
}

impl SceneRenderer for SceneGraph {
    fn mount(&mut self, canvas: &str) -> Result<(), RendererError> {
        if self.refuse_mount || !dom::selector_matches(canvas) {
            return Err(RendererError::CanvasUnavailable(canvas.to_string()));
        }
        self.mounted = Some(canvas.to_string());
        Ok(())
    }

    fn create_node(&mut self, source: NodeSource) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            SceneNode {
                source,
                parent: None,
                local: Mat4::IDENTITY,
                visible: true,
            },
        );
        self.revision += 1;
        id
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) || self.is_ancestor(node, parent) {
                warn!("Refusing to parent {:?} under {:?}", node, parent);
                return;
            }
        }
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.parent = parent;
            self.revision += 1;
        }
    }

    fn set_local_matrix(&mut self, node: NodeId, matrix: Mat4) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.local = matrix;
            self.revision += 1;
        }
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.visible = visible;
            self.revision += 1;
        }
    }

    fn dispose(&mut self, node: NodeId) {
        let doomed: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| self.is_ancestor(node, *id))
            .collect();
        for id in &doomed {
            self.nodes.remove(id);
        }
        if !doomed.is_empty() {
            debug!("Disposed {} scene nodes", doomed.len());
            self.revision += 1;
        }
    }

    fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
        self.world_of(node, 0)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.visible_of(node)
    }

    fn set_camera(&mut self, viewer: &Pose) {
        self.camera = Some(*viewer);
    }

    fn set_reticle(&mut self, reticle: Option<ReticleVisual>) {
        self.reticle = reticle;
    }

    fn set_animation_loop(&mut self, active: bool) {
        self.animation_loop = active;
    }

    fn submit(&mut self) {
        self.frames_submitted += 1;
    }

    fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

/// Scene graph shared between the router and Bevy; clones share one graph.
#[derive(Clone, Default)]
pub struct SharedSceneGraph(Rc<RefCell<SceneGraph>>);

impl SharedSceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene graph whose canvas can never be mounted.
    pub fn unmountable() -> Self {
        let graph = SceneGraph {
            refuse_mount: true,
            ..SceneGraph::default()
        };
        Self(Rc::new(RefCell::new(graph)))
    }

    pub fn graph(&self) -> Ref<'_, SceneGraph> {
        self.0.borrow()
    }
}

impl SceneRenderer for SharedSceneGraph {
    fn mount(&mut self, canvas: &str) -> Result<(), RendererError> {
        self.0.borrow_mut().mount(canvas)
    }

    fn create_node(&mut self, source: NodeSource) -> NodeId {
        self.0.borrow_mut().create_node(source)
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        self.0.borrow_mut().set_parent(node, parent);
    }

    fn set_local_matrix(&mut self, node: NodeId, matrix: Mat4) {
        self.0.borrow_mut().set_local_matrix(node, matrix);
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        self.0.borrow_mut().set_visible(node, visible);
    }

    fn dispose(&mut self, node: NodeId) {
        self.0.borrow_mut().dispose(node);
    }

    fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
        self.0.borrow().world_matrix(node)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.0.borrow().is_visible(node)
    }

    fn set_camera(&mut self, viewer: &Pose) {
        self.0.borrow_mut().set_camera(viewer);
    }

    fn set_reticle(&mut self, reticle: Option<ReticleVisual>) {
        self.0.borrow_mut().set_reticle(reticle);
    }

    fn set_animation_loop(&mut self, active: bool) {
        self.0.borrow_mut().set_animation_loop(active);
    }

    fn submit(&mut self) {
        self.0.borrow_mut().submit();
    }

    fn frames_submitted(&self) -> u64 {
        self.0.borrow().frames_submitted()
    }
}
