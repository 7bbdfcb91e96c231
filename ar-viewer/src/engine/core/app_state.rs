use bevy::prelude::*;

use crate::engine::core::viewer::ArViewerHandle;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum AppState {
    /// Waiting for `config/viewer.ar.json` and the router.
    #[default]
    Loading,
    /// Router built; the overlay may start a session.
    Running,
}

#[derive(Component)]
pub struct FpsText;

pub fn transition_to_running(viewer: NonSend<ArViewerHandle>, mut next_state: ResMut<NextState<AppState>>) {
    if viewer.is_ready() {
        info!("→ Viewer ready, transitioning to Running state");
        next_state.set(AppState::Running);
    }
}
