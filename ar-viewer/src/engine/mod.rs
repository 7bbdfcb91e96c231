pub mod backend;
pub mod capability;
pub mod config;
pub mod core;
pub mod error;
pub mod math;
pub mod router;
pub mod scene;
pub mod session;
pub mod surface;
