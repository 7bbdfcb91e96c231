/// Overlay root registered with the session for DOM overlay.
pub const OVERLAY_ROOT_ID: &str = "ar-overlay";

/// Canvas the renderer mounts into on the web.
pub const CANVAS_SELECTOR: &str = "#ar-viewer";

/// Config asset path, relative to the asset root.
pub const CONFIG_PATH: &str = "config/viewer.ar.json";
