use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bevy::log::{info, warn};

use crate::boundary::assets::{AssetError, AssetKind, AssetLoader, LoadCompletion, LoadTicket, LoadedAsset};
use crate::engine::math::ContentBounds;

#[derive(Default)]
struct LoaderState {
    catalogue: HashMap<String, ContentBounds>,
    failures: HashMap<String, AssetError>,
    queued: VecDeque<(LoadTicket, AssetKind, String)>,
    requests: Vec<(AssetKind, String)>,
    held: bool,
    next_ticket: u64,
}

/// Asset loader answering from a fixed catalogue of bounds.
///
/// Completions are delivered on the first poll after the request unless the
/// loader is held, which keeps loads in flight across frames.
#[derive(Clone, Default)]
pub struct ScriptedAssetLoader {
    state: Rc<RefCell<LoaderState>>,
}

impl ScriptedAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(self, path: &str, bounds: ContentBounds) -> Self {
        self.state.borrow_mut().catalogue.insert(path.to_string(), bounds);
        self
    }

    pub fn fail(&self, path: &str, error: AssetError) {
        self.state.borrow_mut().failures.insert(path.to_string(), error);
    }

    pub fn hold(&self, held: bool) {
        self.state.borrow_mut().held = held;
    }

    pub fn requests(&self) -> Vec<(AssetKind, String)> {
        self.state.borrow().requests.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.state.borrow().queued.len()
    }
}

impl AssetLoader for ScriptedAssetLoader {
    fn request(&mut self, kind: AssetKind, path: &str) -> LoadTicket {
        let mut state = self.state.borrow_mut();
        state.next_ticket += 1;
        let ticket = LoadTicket(state.next_ticket);
        state.queued.push_back((ticket, kind, path.to_string()));
        state.requests.push((kind, path.to_string()));
        info!("Requested {} from {}", kind.as_str(), path);
        ticket
    }

    fn poll_completed(&mut self) -> Vec<LoadCompletion> {
        let mut state = self.state.borrow_mut();
        if state.held {
            return Vec::new();
        }
        let queued: Vec<_> = state.queued.drain(..).collect();
        queued
            .into_iter()
            .map(|(ticket, kind, path)| {
                let result = if let Some(error) = state.failures.get(&path) {
                    warn!("Scripted failure for {}: {}", path, error);
                    Err(error.clone())
                } else if let Some(bounds) = state.catalogue.get(&path) {
                    Ok(LoadedAsset {
                        kind,
                        path: path.clone(),
                        bounds: *bounds,
                    })
                } else {
                    Err(AssetError::NotFound(path.clone()))
                };
                LoadCompletion { ticket, result }
            })
            .collect()
    }
}
