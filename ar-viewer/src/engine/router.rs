//! Mediator between the overlay, the capability probe and the chosen back-end.
//!
//! UI commands are queued with [`BackendRouter::post`] and applied on the
//! next [`BackendRouter::tick`], which also pumps the running session. The
//! start command only raises a flag: `init` suspends, so the host drives it
//! on its own task.

use std::collections::VecDeque;

use bevy::log::{error, info, warn};
use serde::Serialize;

use crate::boundary::{AssetKind, Boundary, UiCommand, XrEnvironment};
use crate::engine::backend::{ArBackend, BackendStatus, MarkerBackend, WorldBackend};
use crate::engine::capability::{BackendKind, CapabilityRecord, detect};
use crate::engine::config::ArConfig;
use crate::engine::error::{ArError, CapabilityError, SetupError};
use crate::engine::session::EndReason;

/// Everything `get_session_state` reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterStatus {
    pub platform: Option<&'static str>,
    pub immersive_supported: bool,
    pub selected_backend: &'static str,
    pub session: Option<BackendStatus>,
}

pub struct BackendRouter {
    env: Box<dyn XrEnvironment>,
    boundary: Boundary,
    config: ArConfig,
    seed: u64,
    capabilities: Option<CapabilityRecord>,
    backend: Option<Box<dyn ArBackend>>,
    commands: VecDeque<UiCommand>,
    start_requested: bool,
}

impl BackendRouter {
    pub fn new(env: Box<dyn XrEnvironment>, boundary: Boundary, config: ArConfig, seed: u64) -> Self {
        Self {
            env,
            boundary,
            config,
            seed,
            capabilities: None,
            backend: None,
            commands: VecDeque::new(),
            start_requested: false,
        }
    }

    /// Probe once, build the selected back-end and enter its session.
    ///
    /// Later calls reuse the back-end and re-enter the session. Any failure
    /// is shown on the overlay and the pre-AR UI comes back.
    pub async fn init(&mut self) -> Result<BackendKind, ArError> {
        match self.enter().await {
            Ok(kind) => Ok(kind),
            Err(err) => {
                error!("AR start-up failed: {}", err);
                self.boundary.overlay.show_error(&err.user_message());
                self.boundary.overlay.restore_pre_ar();
                Err(err)
            }
        }
    }

    async fn enter(&mut self) -> Result<BackendKind, ArError> {
        if self.backend.is_none() {
            let record = detect(self.env.as_ref(), &self.config.probe).await;
            let backend = self.build_backend(&record);
            self.capabilities = Some(record);
            self.backend = Some(backend?);
        }
        let Some(backend) = self.backend.as_mut() else {
            return Err(CapabilityError::NoSupportedBackend.into());
        };
        backend.start(&mut self.boundary).await?;
        info!("{} back-end running", backend.kind().as_str());
        Ok(backend.kind())
    }

    fn build_backend(&self, record: &CapabilityRecord) -> Result<Box<dyn ArBackend>, ArError> {
        let registry = self.env.registry();
        match record.selected_backend {
            BackendKind::World => {
                let runtime = registry
                    .world()
                    .ok_or(SetupError::MissingRuntimeAdapter(BackendKind::World))?;
                Ok(Box::new(WorldBackend::new(runtime, self.config.clone(), self.seed)))
            }
            BackendKind::Marker => {
                let runtime = registry
                    .marker()
                    .ok_or(SetupError::MissingRuntimeAdapter(BackendKind::Marker))?;
                Ok(Box::new(MarkerBackend::new(runtime, self.config.clone())))
            }
            BackendKind::None => Err(record
                .reason
                .clone()
                .unwrap_or(CapabilityError::NoSupportedBackend)
                .into()),
        }
    }

    pub fn reset(&mut self) {
        match self.backend.as_mut() {
            Some(backend) => backend.reset(&mut self.boundary),
            None => warn!("Reset requested before AR was started"),
        }
    }

    pub fn end(&mut self, reason: EndReason) {
        if let Some(backend) = self.backend.as_mut() {
            backend.end(&mut self.boundary, reason);
        }
    }

    pub fn exit_to_quiz(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.exit_to_quiz(&mut self.boundary);
        }
    }

    pub fn current_backend(&self) -> BackendKind {
        self.backend.as_ref().map_or(BackendKind::None, |b| b.kind())
    }

    pub fn current_asset_kind(&self) -> Option<AssetKind> {
        self.backend.as_ref().and_then(|b| b.current_asset_kind())
    }

    pub fn is_running(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_running())
    }

    pub fn post(&mut self, command: UiCommand) {
        self.commands.push_back(command);
    }

    /// Apply queued commands, then process delivered frames. Returns the
    /// number of frames processed.
    pub fn tick(&mut self) -> usize {
        while let Some(command) = self.commands.pop_front() {
            match command {
                UiCommand::Start => self.start_requested = true,
                UiCommand::Reset => self.reset(),
                UiCommand::Close => self.end(EndReason::UserClosed),
                UiCommand::ContinueToQuiz => self.exit_to_quiz(),
                UiCommand::DebugToggle => {
                    if let Some(backend) = self.backend.as_mut() {
                        backend.toggle_debug(&mut self.boundary);
                    }
                }
            }
        }
        match self.backend.as_mut() {
            Some(backend) => backend.pump(&mut self.boundary),
            None => 0,
        }
    }

    /// Whether a start command arrived since the last call.
    pub fn take_start_request(&mut self) -> bool {
        std::mem::take(&mut self.start_requested)
    }

    pub fn capabilities(&self) -> Option<&CapabilityRecord> {
        self.capabilities.as_ref()
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn config(&self) -> &ArConfig {
        &self.config
    }

    pub fn status(&self) -> RouterStatus {
        RouterStatus {
            platform: self.capabilities.as_ref().map(|c| c.platform.as_str()),
            immersive_supported: self.capabilities.as_ref().is_some_and(|c| c.immersive_supported),
            selected_backend: self
                .capabilities
                .as_ref()
                .map_or(BackendKind::None, |c| c.selected_backend)
                .as_str(),
            session: self.backend.as_ref().map(|b| b.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use bevy::tasks::block_on;

    use super::*;
    use crate::boundary::RuntimeRegistry;
    use crate::boundary::recording::{OverlayCall, RecordingOverlay, RecordingQuiz};
    use crate::boundary::simulated::{
        ScriptedAssetLoader, SimulatedDevice, SimulatedEnvironment, SimulatedMarkerRuntime, SimulatedRuntime,
        SimulationHandle,
    };
    use crate::engine::scene::SharedSceneGraph;

    const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) Chrome/126.0 Mobile Safari/537.36";

    fn router(registry: RuntimeRegistry, overlay: RecordingOverlay) -> BackendRouter {
        let boundary = Boundary {
            renderer: Box::new(SharedSceneGraph::new()),
            assets: Box::new(ScriptedAssetLoader::new()),
            overlay: Box::new(overlay),
            quiz: Box::new(RecordingQuiz::new()),
        };
        let env = SimulatedEnvironment::new(ANDROID_UA, registry);
        BackendRouter::new(Box::new(env), boundary, ArConfig::default(), 7)
    }

    #[test]
    fn no_backend_reports_and_restores() {
        let overlay = RecordingOverlay::new();
        let mut router = router(RuntimeRegistry::new(), overlay.clone());
        let result = block_on(router.init());
        assert_eq!(
            result,
            Err(ArError::Capability(CapabilityError::NoSupportedBackend))
        );
        assert_eq!(overlay.errors().len(), 1);
        assert_eq!(overlay.count(&OverlayCall::RestorePreAr), 1);
        assert_eq!(router.current_backend(), BackendKind::None);
    }

    #[test]
    fn failed_support_query_is_shown_instead_of_marker() {
        let registry = RuntimeRegistry::new();
        let device = SimulatedDevice::default().with_support_query_fault("xr unavailable in iframe");
        registry.publish_world(1, Rc::new(SimulatedRuntime::new(device, SimulationHandle::default())));
        registry.publish_marker(1, Rc::new(SimulatedMarkerRuntime::new(SimulationHandle::default())));
        let overlay = RecordingOverlay::new();
        let mut router = router(registry, overlay.clone());

        let result = block_on(router.init());
        assert!(matches!(result, Err(ArError::Capability(CapabilityError::Query(_)))));
        let errors = overlay.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("xr unavailable in iframe"));
        assert_eq!(router.current_backend(), BackendKind::None);
    }

    #[test]
    fn marker_load_failure_names_path() {
        let registry = RuntimeRegistry::new();
        let handle = SimulationHandle::default();
        registry.publish_marker(1, Rc::new(SimulatedMarkerRuntime::failing(handle, "404")));
        let overlay = RecordingOverlay::new();
        let mut router = router(registry, overlay.clone());
        assert!(block_on(router.init()).is_err());
        let errors = overlay.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(&ArConfig::default().marker.descriptor.path));
        assert_eq!(overlay.count(&OverlayCall::RestorePreAr), 1);
    }

    #[test]
    fn init_reuses_backend() {
        let registry = RuntimeRegistry::new();
        let handle = SimulationHandle::default();
        registry.publish_world(1, Rc::new(SimulatedRuntime::new(SimulatedDevice::default(), handle.clone())));
        let mut router = router(registry, RecordingOverlay::new());
        assert_eq!(block_on(router.init()), Ok(BackendKind::World));
        router.end(EndReason::UserClosed);
        assert_eq!(block_on(router.init()), Ok(BackendKind::World));
        assert_eq!(handle.sessions_started(), 2);
    }

    #[test]
    fn start_command_raises_flag_once() {
        let mut router = router(RuntimeRegistry::new(), RecordingOverlay::new());
        router.post(UiCommand::Start);
        assert_eq!(router.tick(), 0);
        assert!(router.take_start_request());
        assert!(!router.take_start_request());
    }
}
