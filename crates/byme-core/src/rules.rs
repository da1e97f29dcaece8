// ── Device override rules ──
//
// User-supplied rules that rewrite classified fields. Every rule whose
// filter matches is applied, in order, so later rules see the output of
// earlier ones. Rules run after built-in classification and win over it.

use std::str::FromStr;

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::classify::title_case;
use crate::error::CoreError;
use crate::model::{Device, Icon, Platform};

/// A device field a rule can filter on or rewrite.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceField {
    ObjectId,
    ObjectName,
    ObjectType,
    RoomName,
    DeviceType,
    DeviceClass,
    #[default]
    DeviceFriendlyName,
    /// `on|off` sets a toggle icon, anything else a single one.
    Icon,
}

impl DeviceField {
    /// Fields reported by the controller rather than derived from them.
    pub fn is_controller_field(self) -> bool {
        matches!(self, Self::ObjectId | Self::ObjectName | Self::ObjectType)
    }

    fn read(self, device: &Device) -> String {
        match self {
            Self::ObjectId => device.object_id.clone(),
            Self::ObjectName => device.object_name.clone(),
            Self::ObjectType => device.object_type.clone(),
            Self::RoomName => device.room_name.clone(),
            Self::DeviceType => device.device_type.to_string(),
            Self::DeviceClass => device.device_class.clone().unwrap_or_default(),
            Self::DeviceFriendlyName => device.device_friendly_name.clone(),
            Self::Icon => match &device.icon {
                Icon::Single(icon) => icon.clone(),
                Icon::Toggle { on, off } => format!("{on}|{off}"),
            },
        }
    }

    fn write(self, device: &mut Device, value: String) {
        match self {
            // Controller fields feed classification on every cycle; compile() rejects them.
            Self::ObjectId | Self::ObjectName | Self::ObjectType => {}
            Self::RoomName => device.room_name = value,
            Self::DeviceType => {
                if let Ok(platform) = Platform::from_str(&value) {
                    device.device_type = platform;
                }
            }
            Self::DeviceClass => {
                device.device_class = Some(value).filter(|v| !v.is_empty());
            }
            Self::DeviceFriendlyName => device.device_friendly_name = value,
            Self::Icon => {
                device.icon = match value.split_once('|') {
                    Some((on, off)) => Icon::toggle(on, off),
                    None => Icon::Single(value),
                };
            }
        }
    }
}

/// One action of a rule, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    Set {
        field: DeviceField,
        value: String,
    },
    Replace {
        field: DeviceField,
        pattern: String,
        #[serde(default)]
        replacement: String,
    },
    Title {
        #[serde(default)]
        field: DeviceField,
    },
    Upper {
        #[serde(default)]
        field: DeviceField,
    },
    Lower {
        #[serde(default)]
        field: DeviceField,
    },
}

/// A rule as written in configuration: every filter regex must match
/// (case-insensitively) for the actions to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    #[serde(default)]
    pub filter: IndexMap<DeviceField, String>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

#[derive(Debug, Clone)]
enum CompiledAction {
    Set(DeviceField, String),
    Replace(DeviceField, Regex, String),
    Title(DeviceField),
    Upper(DeviceField),
    Lower(DeviceField),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    filter: Vec<(DeviceField, Regex)>,
    actions: Vec<CompiledAction>,
}

/// Compiled, ordered override rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile configured rules, rejecting bad regexes and invalid writes.
    pub fn compile(rules: &[OverrideRule]) -> Result<Self, CoreError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| compile_rule(index, rule))
            .collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every matching rule in order. Returns how many matched.
    pub fn apply(&self, device: &mut Device) -> usize {
        let mut matched = 0;
        for rule in &self.rules {
            let hit = rule
                .filter
                .iter()
                .all(|(field, regex)| regex.is_match(&field.read(device)));
            if !hit {
                continue;
            }
            matched += 1;
            for action in &rule.actions {
                run_action(action, device);
            }
        }
        if matched > 0 {
            debug!(object_id = %device.object_id, matched, "override rules applied");
        }
        matched
    }
}

fn run_action(action: &CompiledAction, device: &mut Device) {
    match action {
        CompiledAction::Set(field, value) => field.write(device, value.clone()),
        CompiledAction::Replace(field, regex, replacement) => {
            let current = field.read(device);
            let replaced = regex.replace_all(&current, replacement.as_str()).into_owned();
            field.write(device, replaced);
        }
        CompiledAction::Title(field) => {
            let current = field.read(device);
            field.write(device, title_case(&current));
        }
        CompiledAction::Upper(field) => {
            let current = field.read(device);
            field.write(device, current.to_uppercase());
        }
        CompiledAction::Lower(field) => {
            let current = field.read(device);
            field.write(device, current.to_lowercase());
        }
    }
}

fn compile_rule(index: usize, rule: &OverrideRule) -> Result<CompiledRule, CoreError> {
    let invalid = |message: String| CoreError::Config {
        message: format!("device override #{}: {message}", index + 1),
    };

    let filter = rule
        .filter
        .iter()
        .map(|(field, pattern)| {
            build_regex(pattern)
                .map(|regex| (*field, regex))
                .map_err(|e| invalid(format!("bad filter for {field}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut actions = Vec::with_capacity(rule.actions.len());
    for action in &rule.actions {
        let field = match action {
            RuleAction::Set { field, .. }
            | RuleAction::Replace { field, .. }
            | RuleAction::Title { field }
            | RuleAction::Upper { field }
            | RuleAction::Lower { field } => *field,
        };
        if field.is_controller_field() {
            return Err(invalid(format!("{field} cannot be rewritten")));
        }

        actions.push(match action {
            RuleAction::Set { value, .. } => {
                if field == DeviceField::DeviceType && Platform::from_str(value).is_err() {
                    return Err(invalid(format!("unknown device type {value:?}")));
                }
                CompiledAction::Set(field, value.clone())
            }
            RuleAction::Replace {
                pattern,
                replacement,
                ..
            } => {
                if field == DeviceField::DeviceType {
                    return Err(invalid("device_type only supports set".into()));
                }
                let regex =
                    build_regex(pattern).map_err(|e| invalid(format!("bad pattern: {e}")))?;
                CompiledAction::Replace(field, regex, replacement.clone())
            }
            RuleAction::Title { .. } => CompiledAction::Title(field),
            RuleAction::Upper { .. } => CompiledAction::Upper(field),
            RuleAction::Lower { .. } => CompiledAction::Lower(field),
        });
    }

    Ok(CompiledRule { filter, actions })
}

fn build_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}
