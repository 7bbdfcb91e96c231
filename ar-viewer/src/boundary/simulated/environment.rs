use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bevy::log::debug;

use crate::boundary::LocalBoxFuture;
use crate::boundary::environment::{RuntimeRegistry, XrEnvironment};
use crate::boundary::runtime::XrRuntime;

/// Host with a virtual clock: `sleep` advances time instantly.
///
/// A world runtime can be scheduled to appear after some virtual delay,
/// which is how a late polyfill looks to the capability probe.
pub struct SimulatedEnvironment {
    user_agent: String,
    registry: RuntimeRegistry,
    clock_ms: Cell<u64>,
    late_world: RefCell<Option<(u64, Rc<dyn XrRuntime>)>>,
}

impl SimulatedEnvironment {
    pub fn new(user_agent: &str, registry: RuntimeRegistry) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            registry,
            clock_ms: Cell::new(0),
            late_world: RefCell::new(None),
        }
    }

    /// Publish `runtime` once `after_ms` of virtual time have passed.
    pub fn publish_world_after(&self, after_ms: u64, runtime: Rc<dyn XrRuntime>) {
        *self.late_world.borrow_mut() = Some((after_ms, runtime));
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock_ms.get()
    }
}

impl XrEnvironment for SimulatedEnvironment {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        let now = self.clock_ms.get() + ms;
        self.clock_ms.set(now);
        let due = matches!(&*self.late_world.borrow(), Some((at, _)) if *at <= now);
        if due {
            if let Some((_, runtime)) = self.late_world.borrow_mut().take() {
                debug!("Late world runtime published at {} ms", now);
                let version = self.registry.world_version().map_or(1, |v| v + 1);
                self.registry.publish_world(version, runtime);
            }
        }
        Box::pin(std::future::ready(()))
    }
}
