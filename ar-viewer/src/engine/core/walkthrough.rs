use std::rc::Rc;

use bevy::prelude::*;

use crate::boundary::simulated::{SimulatedDevice, SimulatedRuntime, SimulatedWorld, SimulationHandle};
use crate::boundary::{RuntimeRegistry, UiCommand};
use crate::engine::core::viewer::UiCommandQueue;

pub const NATIVE_USER_AGENT: &str = "ar-viewer-native (simulated walkthrough)";

const ROOM_COLOUR: Color = Color::srgb(0.45, 0.45, 0.5);

/// Feeds the simulated runtime one frame per Bevy update while a session
/// is running. Left click taps.
#[derive(Default)]
pub struct NativeWalkthrough {
    handle: SimulationHandle,
    world: SimulatedWorld,
}

impl NativeWalkthrough {
    pub fn publish(&self, registry: &RuntimeRegistry) {
        let runtime = SimulatedRuntime::new(SimulatedDevice::default(), self.handle.clone());
        registry.publish_world(1, Rc::new(runtime));
    }

    fn session_active(&self) -> bool {
        self.handle.sessions_started() > 0 && !self.handle.session_ended()
    }
}

pub fn drive_walkthrough(
    walkthrough: NonSend<NativeWalkthrough>,
    time: Res<Time>,
    mouse: Res<ButtonInput<MouseButton>>,
) {
    if !walkthrough.session_active() || walkthrough.handle.pending_frames() > 0 {
        return;
    }
    let frame = walkthrough.world.frame_at(time.elapsed_secs_f64() * 1000.0);
    let frame = if mouse.just_pressed(MouseButton::Left) {
        frame.tap()
    } else {
        frame
    };
    walkthrough.handle.push_frame(frame);
}

/// Keyboard stand-ins for the overlay buttons.
pub fn walkthrough_shortcuts(keyboard: Res<ButtonInput<KeyCode>>, mut queue: ResMut<UiCommandQueue>) {
    let bindings = [
        (KeyCode::KeyS, UiCommand::Start),
        (KeyCode::KeyR, UiCommand::Reset),
        (KeyCode::Escape, UiCommand::Close),
        (KeyCode::KeyQ, UiCommand::ContinueToQuiz),
        (KeyCode::KeyD, UiCommand::DebugToggle),
    ];
    for (key, command) in bindings {
        if keyboard.just_pressed(key) {
            queue.push(command);
        }
    }
}

/// Outline the simulated floor and wall.
pub fn draw_room(walkthrough: NonSend<NativeWalkthrough>, mut gizmos: Gizmos) {
    let world = walkthrough.world;
    let half_width = 3.0;
    let floor = world.floor_y;
    let wall = world.wall_z;
    let ceiling = floor + 2.5;

    for step in 0..=6 {
        let x = -half_width + step as f32;
        gizmos.line(Vec3::new(x, floor, wall), Vec3::new(x, floor, 2.0), ROOM_COLOUR);
        gizmos.line(Vec3::new(x, floor, wall), Vec3::new(x, ceiling, wall), ROOM_COLOUR);
    }
    gizmos.line(
        Vec3::new(-half_width, ceiling, wall),
        Vec3::new(half_width, ceiling, wall),
        ROOM_COLOUR,
    );
}
