pub mod error;
pub mod config;
pub mod identity;
pub mod access;
pub mod client;

pub use error::{AppError, AppResult};
pub use config::PortalConfig;

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage: tprintln!("session.begin user={}", name);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
