use std::cell::RefCell;
use std::rc::Rc;

use bevy::log::{info, warn};

use super::LocalBoxFuture;
use super::runtime::{MarkerRuntime, XrRuntime};

/// A runtime handle published by whatever adapter loaded it.
#[derive(Clone)]
pub struct Published<T: Clone> {
    pub version: u32,
    pub handle: T,
}

#[derive(Default)]
struct RegistryInner {
    world: Option<Published<Rc<dyn XrRuntime>>>,
    marker: Option<Published<Rc<dyn MarkerRuntime>>>,
}

/// Single register-on-load point for runtime adapters.
///
/// Adapters publish a versioned handle once they are ready; the capability
/// probe reads whatever is published. A publish with a version lower than
/// the current one is ignored.
#[derive(Clone, Default)]
pub struct RuntimeRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static PAGE_REGISTRY: RuntimeRegistry = RuntimeRegistry::new();
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry page hooks publish into. In the browser every caller
    /// shares one; elsewhere each call starts empty.
    pub fn for_host() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            PAGE_REGISTRY.with(Clone::clone)
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::new()
        }
    }

    pub fn publish_world(&self, version: u32, runtime: Rc<dyn XrRuntime>) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Some(current) = &inner.world {
            if current.version > version {
                warn!("Ignoring world runtime v{} (v{} already published)", version, current.version);
                return false;
            }
        }
        info!("World runtime v{} published", version);
        inner.world = Some(Published { version, handle: runtime });
        true
    }

    pub fn publish_marker(&self, version: u32, runtime: Rc<dyn MarkerRuntime>) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Some(current) = &inner.marker {
            if current.version > version {
                warn!("Ignoring marker runtime v{} (v{} already published)", version, current.version);
                return false;
            }
        }
        info!("Marker runtime v{} published", version);
        inner.marker = Some(Published { version, handle: runtime });
        true
    }

    pub fn world(&self) -> Option<Rc<dyn XrRuntime>> {
        self.inner.borrow().world.as_ref().map(|p| Rc::clone(&p.handle))
    }

    pub fn world_version(&self) -> Option<u32> {
        self.inner.borrow().world.as_ref().map(|p| p.version)
    }

    pub fn marker(&self) -> Option<Rc<dyn MarkerRuntime>> {
        self.inner.borrow().marker.as_ref().map(|p| Rc::clone(&p.handle))
    }
}

/// Host facts the capability probe reads.
pub trait XrEnvironment {
    fn user_agent(&self) -> String;

    fn registry(&self) -> &RuntimeRegistry;

    /// Suspend for `ms` milliseconds of host time.
    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()>;
}

/// Browser host: user agent from the navigator, timers from `setTimeout`.
///
/// `navigator.xr` is published when the environment is built and again
/// after every sleep, so a polyfill that installs it late is still found.
#[cfg(target_arch = "wasm32")]
pub struct BrowserEnvironment {
    registry: RuntimeRegistry,
}

#[cfg(target_arch = "wasm32")]
impl BrowserEnvironment {
    pub fn new(registry: RuntimeRegistry) -> Self {
        super::web::discover_navigator_xr(&registry);
        Self { registry }
    }
}

#[cfg(target_arch = "wasm32")]
impl XrEnvironment for BrowserEnvironment {
    fn user_agent(&self) -> String {
        web_sys::window()
            .and_then(|window| window.navigator().user_agent().ok())
            .unwrap_or_default()
    }

    fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        let registry = self.registry.clone();
        Box::pin(async move {
            let promise = js_sys::Promise::new(&mut |resolve, _reject| {
                let timeout = i32::try_from(ms).unwrap_or(i32::MAX);
                let scheduled = web_sys::window().is_some_and(|window| {
                    window
                        .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, timeout)
                        .is_ok()
                });
                if !scheduled {
                    warn!("setTimeout unavailable, sleep resolves immediately");
                    let _ = resolve.call0(&wasm_bindgen::JsValue::NULL);
                }
            });
            let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
            super::web::discover_navigator_xr(&registry);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::simulated::{SimulatedDevice, SimulatedRuntime, SimulationHandle};

    fn runtime() -> Rc<dyn XrRuntime> {
        Rc::new(SimulatedRuntime::new(SimulatedDevice::default(), SimulationHandle::default()))
    }

    #[test]
    fn newer_versions_replace_older() {
        let registry = RuntimeRegistry::new();
        assert!(registry.publish_world(1, runtime()));
        assert!(registry.publish_world(2, runtime()));
        assert_eq!(registry.world_version(), Some(2));
    }

    #[test]
    fn native_host_registries_are_independent() {
        let first = RuntimeRegistry::for_host();
        first.publish_world(1, runtime());
        assert!(RuntimeRegistry::for_host().world().is_none());
    }

    #[test]
    fn stale_publish_is_ignored() {
        let registry = RuntimeRegistry::new();
        registry.publish_world(3, runtime());
        assert!(!registry.publish_world(2, runtime()));
        assert_eq!(registry.world_version(), Some(3));
    }
}
