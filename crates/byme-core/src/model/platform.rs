// ── Platform tags ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The entity platform a device is exposed as.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Platform {
    Light,
    Cover,
    Switch,
    Climate,
    MediaPlayer,
    Scene,
    Sensor,
    Fan,
    /// Channel types no rule recognises.
    #[default]
    Others,
}
