// ── Domain model ──

pub mod device;
pub mod platform;

pub use device::{Device, Icon, StatusEntry};
pub use platform::Platform;
