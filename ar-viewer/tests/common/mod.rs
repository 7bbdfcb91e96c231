#![allow(dead_code)]

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
use std::rc::Rc;

use ar_viewer::boundary::recording::{RecordingOverlay, RecordingQuiz};
use ar_viewer::boundary::simulated::{ScriptedAssetLoader, SimulatedDevice, SimulatedFrame, SimulatedRuntime, SimulationHandle};
use ar_viewer::boundary::{Boundary, SceneRenderer};
use ar_viewer::engine::backend::{ArBackend, WorldBackend};
use ar_viewer::engine::config::ArConfig;
use ar_viewer::engine::math::{ContentBounds, Pose};
use ar_viewer::engine::scene::SharedSceneGraph;
use bevy::math::{Mat4, Quat, Vec3};
use bevy::tasks::block_on;

pub const EYE: Vec3 = Vec3::new(0.0, 1.5, 0.0);

/// Viewer at `position` pitched 45 degrees down.
pub fn looking_down(position: Vec3) -> Pose {
    Pose::from_rotation_translation(Quat::from_rotation_x(-FRAC_PI_4), position)
}

/// Viewer at `position` looking along -Z.
pub fn looking_ahead(position: Vec3) -> Pose {
    Pose::from_translation(position)
}

pub fn floor_hit(x: f32, z: f32) -> Pose {
    Pose::from_translation(Vec3::new(x, 0.0, z))
}

/// Hit on a wall facing +Z; the pose's Y axis is the wall normal.
pub fn wall_hit(point: Vec3) -> Pose {
    Pose::from_rotation_translation(Quat::from_rotation_x(FRAC_PI_2), point)
}

pub fn unit_cube() -> ContentBounds {
    ContentBounds::new(Vec3::splat(-0.5), Vec3::splat(0.5))
}

/// Fixed 3 s auto-spawn delay so timings are exact.
pub fn test_config() -> ArConfig {
    ArConfig {
        auto_spawn_delay_ms: [3000.0, 3000.0],
        ..ArConfig::default()
    }
}

pub fn catalogue(config: &ArConfig) -> ScriptedAssetLoader {
    ScriptedAssetLoader::new()
        .with_asset(&config.wall_asset.path, unit_cube())
        .with_asset(&config.floor_asset.path, unit_cube())
}

/// World back-end wired to a simulated device with every adapter observable.
pub struct WorldRig {
    pub config: ArConfig,
    pub handle: SimulationHandle,
    pub scene: SharedSceneGraph,
    pub loader: ScriptedAssetLoader,
    pub overlay: RecordingOverlay,
    pub quiz: RecordingQuiz,
    pub boundary: Boundary,
    pub backend: WorldBackend,
}

impl WorldRig {
    pub fn new(device: SimulatedDevice) -> Self {
        let config = test_config();
        let handle = SimulationHandle::default();
        let scene = SharedSceneGraph::new();
        let loader = catalogue(&config);
        let overlay = RecordingOverlay::new();
        let quiz = RecordingQuiz::new();
        let boundary = Boundary {
            renderer: Box::new(scene.clone()),
            assets: Box::new(loader.clone()),
            overlay: Box::new(overlay.clone()),
            quiz: Box::new(quiz.clone()),
        };
        let runtime = Rc::new(SimulatedRuntime::new(device, handle.clone()));
        let backend = WorldBackend::new(runtime, config.clone(), 11);
        Self {
            config,
            handle,
            scene,
            loader,
            overlay,
            quiz,
            boundary,
            backend,
        }
    }

    pub fn started(device: SimulatedDevice) -> Self {
        let mut rig = Self::new(device);
        block_on(rig.backend.start(&mut rig.boundary)).expect("session starts");
        rig
    }

    /// Deliver one frame and process it.
    pub fn frame(&mut self, frame: SimulatedFrame) -> usize {
        self.handle.push_frame(frame);
        self.backend.pump(&mut self.boundary)
    }

    /// Deliver frames at `from, from + step, ..` up to and including `to`.
    pub fn stream(&mut self, from: f64, to: f64, step: f64, make: impl Fn(f64) -> SimulatedFrame) {
        let mut t = from;
        while t <= to {
            self.frame(make(t));
            t += step;
        }
    }

    pub fn root_world(&self) -> Option<Mat4> {
        let content = self.backend.engine().content()?;
        self.scene.graph().world_matrix(content.root)
    }

    pub fn reset(&mut self) {
        self.backend.reset(&mut self.boundary);
    }
}
