use bevy::prelude::*;
use bevy::window::PresentMode;

#[cfg(target_arch = "wasm32")]
use bevy::window::CompositeAlphaMode;

#[cfg(target_arch = "wasm32")]
use constants::session::CANVAS_SELECTOR;

pub fn create_window_config() -> Window {
    #[cfg(target_arch = "wasm32")]
    {
        Window {
            canvas: Some(CANVAS_SELECTOR.into()),
            fit_canvas_to_parent: true,
            prevent_default_event_handling: false,
            transparent: true,
            composite_alpha_mode: CompositeAlphaMode::PreMultiplied,
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Window {
            title: "AR viewer (simulated walkthrough)".into(),
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }
}

/// Clear colour behind the content: transparent on the web for passthrough,
/// a neutral grey natively.
pub fn clear_colour() -> ClearColor {
    #[cfg(target_arch = "wasm32")]
    {
        ClearColor(Color::NONE)
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        ClearColor(Color::srgb(0.18, 0.18, 0.2))
    }
}
