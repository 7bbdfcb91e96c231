use std::cell::RefCell;
use std::rc::Rc;

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy_common_assets::json::JsonAssetPlugin;
use constants::session::CONFIG_PATH;

use crate::boundary::{Boundary, RuntimeRegistry, UiCommand, XrEnvironment};
use crate::engine::config::{ArConfig, ConfigLoader};
use crate::engine::core::app_state::{AppState, transition_to_running};
use crate::engine::router::{BackendRouter, RouterStatus};
use crate::engine::scene::asset_bridge::{AssetBridgeState, BevyAssetBridge};
use crate::engine::scene::scene_graph::SharedSceneGraph;
use crate::engine::scene::sync::{
    SceneMirror, draw_reticle, follow_viewer_camera, resolve_asset_loads, sync_scene_graph,
};
use crate::rpc::overlay::{OverlayOutbox, RpcOverlay, RpcQuiz};

#[cfg(not(target_arch = "wasm32"))]
use crate::engine::core::walkthrough::{NativeWalkthrough, draw_room, drive_walkthrough, walkthrough_shortcuts};

/// Overlay commands waiting for the router.
///
/// They stay queued while start-up holds the router.
#[derive(Resource, Default)]
pub struct UiCommandQueue(Vec<UiCommand>);

impl UiCommandQueue {
    pub fn push(&mut self, command: UiCommand) {
        self.0.push(command);
    }

    pub fn drain(&mut self) -> Vec<UiCommand> {
        std::mem::take(&mut self.0)
    }
}

/// Non-send home of the router and the runtime registry adapters publish to.
pub struct ArViewerHandle {
    router: Option<Rc<RefCell<BackendRouter>>>,
    registry: RuntimeRegistry,
}

impl Default for ArViewerHandle {
    fn default() -> Self {
        Self {
            router: None,
            registry: RuntimeRegistry::for_host(),
        }
    }
}

impl ArViewerHandle {
    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    pub fn install(&mut self, router: BackendRouter) {
        self.router = Some(Rc::new(RefCell::new(router)));
    }

    pub fn router(&self) -> Option<Rc<RefCell<BackendRouter>>> {
        self.router.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.router.is_some()
    }

    /// `None` before the router exists or while start-up holds it.
    pub fn status(&self) -> Option<RouterStatus> {
        let router = self.router.as_ref()?;
        router.try_borrow().ok().map(|router| router.status())
    }
}

pub struct ArViewerPlugin;

impl Plugin for ArViewerPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(JsonAssetPlugin::<ArConfig>::new(&["ar.json"]))
            .init_non_send_resource::<ArViewerHandle>()
            .init_non_send_resource::<SharedSceneGraph>()
            .init_non_send_resource::<AssetBridgeState>()
            .init_resource::<ConfigLoader>()
            .init_resource::<SceneMirror>()
            .init_resource::<OverlayOutbox>()
            .init_resource::<UiCommandQueue>()
            .add_systems(Startup, start_config_load)
            .add_systems(
                Update,
                (resolve_viewer_config, build_router, transition_to_running)
                    .chain()
                    .run_if(in_state(AppState::Loading)),
            )
            .add_systems(
                Update,
                (
                    forward_ui_commands,
                    start_requested_sessions,
                    resolve_asset_loads,
                    tick_router,
                    sync_scene_graph,
                    follow_viewer_camera,
                    draw_reticle,
                )
                    .chain()
                    .run_if(in_state(AppState::Running)),
            );

        #[cfg(not(target_arch = "wasm32"))]
        {
            app.init_non_send_resource::<NativeWalkthrough>().add_systems(
                Update,
                (walkthrough_shortcuts, drive_walkthrough, draw_room)
                    .before(forward_ui_commands)
                    .run_if(in_state(AppState::Running)),
            );
        }
    }
}

fn start_config_load(mut loader: ResMut<ConfigLoader>, asset_server: Res<AssetServer>) {
    info!("Loading viewer config from {}", CONFIG_PATH);
    loader.handle = Some(asset_server.load(CONFIG_PATH));
}

/// Insert the loaded `ArConfig`, or the defaults when the file is missing
/// or invalid.
pub fn resolve_viewer_config(
    mut loader: ResMut<ConfigLoader>,
    asset_server: Res<AssetServer>,
    configs: Res<Assets<ArConfig>>,
    mut commands: Commands,
) {
    if loader.resolved {
        return;
    }
    let Some(handle) = loader.handle.clone() else {
        return;
    };

    let config = if let Some(config) = configs.get(&handle) {
        match config.validate() {
            Ok(()) => {
                info!("✓ Viewer config loaded");
                config.clone()
            }
            Err(err) => {
                warn!("Viewer config rejected ({}), using defaults", err);
                ArConfig::default()
            }
        }
    } else if let Some(LoadState::Failed(err)) = asset_server.get_load_state(&handle) {
        warn!("Viewer config unavailable ({}), using defaults", err);
        ArConfig::default()
    } else {
        return;
    };

    loader.resolved = true;
    commands.insert_resource(config);
}

#[allow(clippy::too_many_arguments)]
fn build_router(
    config: Option<Res<ArConfig>>,
    mut viewer: NonSendMut<ArViewerHandle>,
    scene: NonSend<SharedSceneGraph>,
    bridge: NonSend<AssetBridgeState>,
    asset_server: Res<AssetServer>,
    outbox: Res<OverlayOutbox>,
    #[cfg(not(target_arch = "wasm32"))] walkthrough: NonSend<NativeWalkthrough>,
) {
    let Some(config) = config else {
        return;
    };
    if viewer.is_ready() {
        return;
    }

    #[cfg(not(target_arch = "wasm32"))]
    walkthrough.publish(viewer.registry());

    let boundary = Boundary {
        renderer: Box::new(scene.clone()),
        assets: Box::new(BevyAssetBridge::new(asset_server.clone(), bridge.clone())),
        overlay: Box::new(RpcOverlay::new(outbox.clone())),
        quiz: Box::new(RpcQuiz::new(outbox.clone())),
    };
    let env = host_environment(viewer.registry().clone());
    let router = BackendRouter::new(env, boundary, config.clone(), session_seed());
    viewer.install(router);
}

#[cfg(target_arch = "wasm32")]
fn host_environment(registry: RuntimeRegistry) -> Box<dyn XrEnvironment> {
    Box::new(crate::boundary::environment::BrowserEnvironment::new(registry))
}

#[cfg(not(target_arch = "wasm32"))]
fn host_environment(registry: RuntimeRegistry) -> Box<dyn XrEnvironment> {
    use crate::boundary::simulated::SimulatedEnvironment;
    use crate::engine::core::walkthrough::NATIVE_USER_AGENT;

    Box::new(SimulatedEnvironment::new(NATIVE_USER_AGENT, registry))
}

fn session_seed() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

fn forward_ui_commands(viewer: NonSend<ArViewerHandle>, mut queue: ResMut<UiCommandQueue>) {
    let Some(router) = viewer.router() else {
        return;
    };
    let Ok(mut router) = router.try_borrow_mut() else {
        return;
    };
    for command in queue.drain() {
        router.post(command);
    }
}

fn start_requested_sessions(viewer: NonSend<ArViewerHandle>) {
    let Some(router) = viewer.router() else {
        return;
    };
    let requested = router
        .try_borrow_mut()
        .map(|mut router| router.take_start_request())
        .unwrap_or(false);
    if requested {
        spawn_init(router);
    }
}

/// Run start-up on the browser's task queue. The router stays borrowed
/// until it finishes; every system uses `try_borrow` and skips meanwhile.
#[cfg(target_arch = "wasm32")]
#[allow(clippy::await_holding_refcell_ref)]
fn spawn_init(router: Rc<RefCell<BackendRouter>>) {
    wasm_bindgen_futures::spawn_local(async move {
        let Ok(mut router) = router.try_borrow_mut() else {
            warn!("Start ignored: viewer is busy");
            return;
        };
        if let Err(err) = router.init().await {
            debug!("Start-up aborted: {}", err);
        }
    });
}

/// The simulated host sleeps on a virtual clock, so start-up completes
/// within the frame.
#[cfg(not(target_arch = "wasm32"))]
fn spawn_init(router: Rc<RefCell<BackendRouter>>) {
    let Ok(mut router) = router.try_borrow_mut() else {
        warn!("Start ignored: viewer is busy");
        return;
    };
    if let Err(err) = bevy::tasks::block_on(router.init()) {
        debug!("Start-up aborted: {}", err);
    }
}

fn tick_router(viewer: NonSend<ArViewerHandle>) {
    let Some(router) = viewer.router() else {
        return;
    };
    let Ok(mut router) = router.try_borrow_mut() else {
        return;
    };
    let frames = router.tick();
    if frames > 1 {
        debug!("Caught up on {} frames", frames);
    }
}
