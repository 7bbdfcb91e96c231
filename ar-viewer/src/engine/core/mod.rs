//! Core application setup and state management.
//!
//! Handles application lifecycle, window configuration, state transitions,
//! and plugin initialisation for both native and WASM targets.

/// Application setup and plugin configuration for the Bevy engine.
///
/// Creates the main app with the viewer plugin, config loading and the RPC
/// bridge.
pub mod app_setup;

/// Application state machine: config loading, then running.
pub mod app_state;

/// Bevy systems that own the router and drive it once per frame.
pub mod viewer;

/// Scripted room walkthrough standing in for a headset on native builds.
#[cfg(not(target_arch = "wasm32"))]
pub mod walkthrough;

/// Platform-specific window configuration for native and WASM builds.
///
/// Binds the canvas on web targets and keeps the clear colour transparent
/// so camera passthrough shows behind the content.
pub mod window_config;
