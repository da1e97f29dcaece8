// ── Device storage ──

mod collection;

pub(crate) use collection::DeviceCollection;
pub use collection::DeviceMap;
