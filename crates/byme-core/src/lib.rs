//! Device table and update coordinator between `byme-api` and consumers.
//!
//! - **[`Controller`]**: lifecycle facade. [`connect()`](Controller::connect)
//!   logs in, loads and classifies the device table, then polls it on a
//!   fixed or device-count-scaled interval. Cycle outcomes are broadcast as
//!   [`UpdateEvent`]s; [`change_state()`](Controller::change_state) writes a
//!   device attribute with an optimistic local update.
//!
//! - **[`Project`]**: the authoritative `object_id → Device` table. Values
//!   are refreshed every cycle; room membership and classification only when
//!   the device population changes or a refresh is forced.
//!
//! - **Classification** ([`classify`]): ordered first-match rules from the
//!   vendor channel type and name keywords to a [`Platform`], class and icon,
//!   followed by user [`rules`] that may override any derived field.
//!
//! - **[`PlatformRegistry`]**: tag → constructor table resolved once from
//!   the classification tally.

pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod project;
pub mod query;
pub mod registry;
pub mod rules;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, PollInterval, Scheme};
pub use controller::{ConnectionState, Controller, UpdateEvent};
pub use error::CoreError;
pub use model::{Device, Icon, Platform, StatusEntry};
pub use project::{PendingWrite, Project};
pub use registry::PlatformRegistry;
pub use rules::{DeviceField, OverrideRule, RuleAction, RuleSet};
pub use store::DeviceMap;
pub use stream::DeviceStream;
