//! Browser runtime adapters and the page hooks that publish them.
//!
//! `navigator.xr` is published at version 0 as soon as it exists. Page
//! scripts (a WebXR polyfill, an image tracker) publish their own objects
//! through `registerXrRuntime` / `registerMarkerRuntime` at any time, before
//! or after the viewer starts.

/// Per-frame answers handed to the viewer, and parsing of browser values.
pub mod snapshot;

#[cfg(target_arch = "wasm32")]
mod js;

#[cfg(target_arch = "wasm32")]
mod marker;

#[cfg(target_arch = "wasm32")]
mod xr;

#[cfg(target_arch = "wasm32")]
pub use marker::PageMarkerRuntime;
#[cfg(target_arch = "wasm32")]
pub use xr::{WebXrRuntime, WebXrSession};

pub use snapshot::FrameSnapshot;

#[cfg(target_arch = "wasm32")]
mod hooks {
    use std::rc::Rc;

    use bevy::log::warn;
    use wasm_bindgen::JsValue;
    use wasm_bindgen::prelude::wasm_bindgen;

    use super::{PageMarkerRuntime, WebXrRuntime, js};
    use crate::boundary::RuntimeRegistry;

    /// Publish an `XRSystem`-shaped object (a polyfill's, or `navigator.xr`
    /// after it appears). Returns whether it replaced the current runtime.
    #[wasm_bindgen(js_name = registerXrRuntime)]
    pub fn register_xr_runtime(version: u32, xr: JsValue) -> bool {
        if js::is_absent(&xr) || !js::has_method(&xr, "requestSession") {
            warn!("registerXrRuntime called without an XR system");
            return false;
        }
        RuntimeRegistry::for_host().publish_world(version, Rc::new(WebXrRuntime::new(xr)))
    }

    /// Publish a page image tracker; see [`PageMarkerRuntime`] for the
    /// object it must expose.
    #[wasm_bindgen(js_name = registerMarkerRuntime)]
    pub fn register_marker_runtime(version: u32, tracker: JsValue) -> bool {
        if js::is_absent(&tracker) || !js::has_method(&tracker, "start") {
            warn!("registerMarkerRuntime called without a tracker");
            return false;
        }
        RuntimeRegistry::for_host().publish_marker(version, Rc::new(PageMarkerRuntime::new(tracker)))
    }

    /// Publish `navigator.xr` when it exists and nothing is published yet.
    pub fn discover_navigator_xr(registry: &RuntimeRegistry) {
        if registry.world().is_some() {
            return;
        }
        if let Some(runtime) = WebXrRuntime::from_navigator() {
            registry.publish_world(0, Rc::new(runtime));
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use hooks::{discover_navigator_xr, register_marker_runtime, register_xr_runtime};
