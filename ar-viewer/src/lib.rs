//! Browser AR viewer: places one piece of content on a detected floor or
//! wall, keeps it anchored while tracking holds, and hands off to a quiz
//! view once the user has looked at it long enough.

pub mod boundary;
pub mod engine;
pub mod rpc;
pub mod tools;
