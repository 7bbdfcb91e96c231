/// Longest wait for a polyfill to publish the AR runtime (ms).
pub const POLYFILL_WAIT_MS: u64 = 5000;

/// Poll interval while waiting for the polyfill (ms).
pub const POLYFILL_POLL_MS: u64 = 100;

/// Settle delay after the polyfill wait (ms).
pub const POLYFILL_SETTLE_MS: u64 = 300;

/// User-agent fragments identifying the platform that historically lacks native immersive AR.
pub const APPLE_MOBILE_MARKERS: &[&str] = &["iPhone", "iPad", "iPod"];

/// User-agent fragments identifying the platform with native immersive AR.
pub const ANDROID_MOBILE_MARKERS: &[&str] = &["Android"];
