//! JSON-RPC 2.0 bridge between the viewer and the host page's overlay.
//!
//! The viewer runs in an iframe; the overlay UI and the quiz view live in
//! the parent page. Both directions use `postMessage` with JSON-RPC 2.0.
//!
//! ## Message Flow
//!
//! ```text
//! Overlay (parent window)  <──postMessage──>  Viewer (iframe)
//!        │                                        │
//!        ├─ ui_command {command} ───────────────> │ queued, applied next tick
//!        ├─ get_session_state ──────────────────> │
//!        │ <──────────────────── Response (id) ───┤
//!        │                                        │
//!        │ <── overlay_affordance / overlay_hint ─┤
//!        │ <── overlay_error / overlay_mode ──────┤
//!        │ <── present_quiz ──────────────────────┤
//! ```
//!
//! ## Requests
//!
//! - `ui_command`: `{ "command": "start" | "reset" | "close" | "continue_to_quiz" | "debug_toggle" }`
//! - `get_session_state`: capability record and back-end status
//! - `get_fps`: smoothed frame rate
//!
//! ## Notifications
//!
//! - `overlay_affordance`: `{ "id": "ar-reset", "visible": true }`
//! - `overlay_hint`: `{ "text": "Tap to place" }`
//! - `overlay_error`: `{ "message": "..." }`
//! - `overlay_mode`: `{ "mode": "ar" | "pre_ar" }`
//! - `present_quiz`: `{ "asset_kind": "wall-asset" }`
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error

/// Overlay and quiz adapters that speak through the RPC outbox.
pub mod overlay;

/// Request handling, the wasm message listener and outgoing delivery.
pub mod web_rpc;
