use std::rc::Rc;

use bevy::log::{debug, info, warn};

use super::{BackendKind, CapabilityRecord, PlatformClass};
use crate::boundary::XrEnvironment;
use crate::boundary::runtime::{SessionMode, XrRuntime};
use crate::engine::config::ProbeTimings;
use crate::engine::error::CapabilityError;

/// Probe the host once and pick a back-end.
///
/// Apple mobile devices with no published world runtime get a bounded wait
/// for a polyfill to publish one. A failed support query selects no
/// back-end and is kept as `reason`; this never fails outright.
pub async fn detect(env: &dyn XrEnvironment, timings: &ProbeTimings) -> CapabilityRecord {
    let platform = PlatformClass::from_user_agent(&env.user_agent());
    info!("Capability probe: platform {}", platform.as_str());

    let mut runtime = env.registry().world();
    if runtime.is_none() && platform == PlatformClass::AppleMobile {
        runtime = wait_for_world_runtime(env, timings).await;
    }

    let mut query_error = None;
    let immersive_supported = match runtime {
        Some(runtime) => match runtime.is_session_supported(SessionMode::ImmersiveAr).await {
            Ok(supported) => supported,
            Err(err) => {
                warn!("immersive-ar support query failed: {}", err);
                query_error = Some(err);
                false
            }
        },
        None => false,
    };

    let marker_present = env.registry().marker().is_some();
    let (selected_backend, reason) = match query_error {
        Some(err) => (BackendKind::None, Some(CapabilityError::Query(err))),
        None if immersive_supported => (BackendKind::World, None),
        None if marker_present => (BackendKind::Marker, None),
        None => (BackendKind::None, Some(CapabilityError::NoSupportedBackend)),
    };

    info!(
        "Capability probe: immersive={} marker={} -> {}",
        immersive_supported,
        marker_present,
        selected_backend.as_str()
    );
    CapabilityRecord {
        platform,
        immersive_supported,
        selected_backend,
        reason,
    }
}

/// Poll the registry until a world runtime appears or the wait runs out,
/// then let it settle.
pub async fn wait_for_world_runtime(env: &dyn XrEnvironment, timings: &ProbeTimings) -> Option<Rc<dyn XrRuntime>> {
    let poll_ms = timings.poll_ms.max(1);
    let mut waited = 0;
    while waited < timings.wait_ms && env.registry().world().is_none() {
        env.sleep(poll_ms).await;
        waited += poll_ms;
    }
    debug!("Polyfill wait finished after {} ms", waited);
    env.sleep(timings.settle_ms).await;
    env.registry().world()
}
