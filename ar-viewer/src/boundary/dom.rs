//! Lookups against the hosting document.
//!
//! Off the web there is no document; any non-blank id or selector counts as
//! present so simulated hosts behave like a page that has every element.

#[cfg(target_arch = "wasm32")]
fn document() -> Option<web_sys::Document> {
    web_sys::window()?.document()
}

/// Whether an element with `id` is in the document.
#[cfg(target_arch = "wasm32")]
pub fn element_exists(id: &str) -> bool {
    document().and_then(|doc| doc.get_element_by_id(id)).is_some()
}

/// Whether `selector` matches an element in the document.
#[cfg(target_arch = "wasm32")]
pub fn selector_matches(selector: &str) -> bool {
    document()
        .and_then(|doc| doc.query_selector(selector).ok().flatten())
        .is_some()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn element_exists(id: &str) -> bool {
    !id.trim().is_empty()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn selector_matches(selector: &str) -> bool {
    !selector.trim().is_empty()
}
