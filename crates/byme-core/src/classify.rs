// ── Device classification ──
//
// Maps the vendor channel type and object name onto a platform tag,
// semantic class and icon. The table is ordered and the first matching
// rule wins; channel types shared by several kinds of load are split by
// keywords found in the object name.

use tracing::warn;

use crate::model::{Device, Icon, Platform};

/// A channel-type pattern: exact tag, or a prefix when it ends in `*`.
type TypePattern = &'static str;

enum IconSpec {
    Single(&'static str),
    Toggle(&'static str, &'static str),
}

impl IconSpec {
    fn to_icon(&self) -> Icon {
        match self {
            Self::Single(icon) => Icon::single(icon),
            Self::Toggle(on, off) => Icon::toggle(on, off),
        }
    }
}

struct Rule {
    types: &'static [TypePattern],
    /// Upper-case substrings of which one must appear in the object name.
    /// Empty means any name.
    keywords: &'static [&'static str],
    platform: Platform,
    class: Option<&'static str>,
    icon: IconSpec,
}

const AUTOMATION: &[TypePattern] = &["CH_Main_Automation", "CH_Dimmer_*"];

const RULES: &[Rule] = &[
    // ── Generic automation channels, split by name ──
    Rule {
        types: AUTOMATION,
        keywords: &["VENTILATORE", "FANCOIL", "VENTILAZIONE"],
        platform: Platform::Fan,
        class: None,
        icon: IconSpec::Toggle("mdi:fan", "mdi:fan-off"),
    },
    Rule {
        types: AUTOMATION,
        keywords: &["LUCE", "LAMPE"],
        platform: Platform::Light,
        class: None,
        icon: IconSpec::Toggle("mdi:lightbulb-on", "mdi:lightbulb-off"),
    },
    Rule {
        types: AUTOMATION,
        keywords: &["STECCA", "PRESA"],
        platform: Platform::Switch,
        class: Some("outlet"),
        icon: IconSpec::Toggle("mdi:power-plug", "mdi:power-plug-off"),
    },
    Rule {
        types: AUTOMATION,
        keywords: &["IRRIGAZIONE"],
        platform: Platform::Switch,
        class: Some("switch"),
        icon: IconSpec::Toggle("mdi:water", "mdi:water-off"),
    },
    Rule {
        types: AUTOMATION,
        keywords: &[],
        platform: Platform::Light,
        class: None,
        icon: IconSpec::Toggle("mdi:lightbulb-on", "mdi:lightbulb-off"),
    },
    // ── Shutters ──
    Rule {
        types: &[
            "CH_ShutterWithoutPosition_Automation",
            "CH_ShutterBlade_Automation",
            "CH_Shutter_Automation",
            "CH_Shutter_Slat_Automation",
        ],
        keywords: &[],
        platform: Platform::Cover,
        class: Some("shutter"),
        icon: IconSpec::Toggle("mdi:window-shutter-open", "mdi:window-shutter"),
    },
    // ── Thermostats ──
    Rule {
        types: &["CH_Clima", "CH_HVAC*"],
        keywords: &[],
        platform: Platform::Climate,
        class: None,
        icon: IconSpec::Single("mdi:thermometer-lines"),
    },
    Rule {
        types: &["CH_Scene"],
        keywords: &[],
        platform: Platform::Scene,
        class: None,
        icon: IconSpec::Single("mdi:google-pages"),
    },
    Rule {
        types: &["CH_Audio"],
        keywords: &[],
        platform: Platform::MediaPlayer,
        class: None,
        icon: IconSpec::Single("mdi:radio"),
    },
    // ── Energy metering ──
    Rule {
        types: &[
            "CH_Carichi",
            "CH_Carichi_Custom",
            "CH_Carichi_3F",
            "CH_Misuratore",
            "CH_Contatore_*",
            "CH_KNX_GENERIC_POWER_KW",
        ],
        keywords: &[],
        platform: Platform::Sensor,
        class: Some("power"),
        icon: IconSpec::Single("mdi:flash"),
    },
    // ── Environment sensors ──
    Rule {
        types: &[
            "CH_KNX_GENERIC_TEMPERATURE_C",
            "CH_Clima_Sensore",
            "CH_Temperature",
            "CH_WEATHERSTATION",
        ],
        keywords: &[],
        platform: Platform::Sensor,
        class: Some("temperature"),
        icon: IconSpec::Single("mdi:thermometer"),
    },
];

/// Vendor words that only restate the channel kind in the first token.
const TYPE_JARGON: &[&str] = &[
    "LUCE",
    "TAPPARELLA",
    "LAMPE",
    "FERNBEDIENUNG",
    "VENTILATORE",
    "STECCA",
    "PRESA",
];

/// Classify a device in place from its `object_type` and `object_name`.
///
/// Deterministic: depends on nothing but those two fields.
pub fn classify(device: &mut Device) {
    let name = device.object_name.to_uppercase();
    let rule = RULES.iter().find(|rule| {
        rule.types
            .iter()
            .any(|pattern| type_matches(pattern, &device.object_type))
            && (rule.keywords.is_empty() || rule.keywords.iter().any(|kw| name.contains(kw)))
    });

    match rule {
        Some(rule) => {
            device.device_type = rule.platform;
            device.device_class = rule.class.map(str::to_owned);
            device.icon = rule.icon.to_icon();
        }
        None => {
            warn!(
                object_id = %device.object_id,
                object_type = %device.object_type,
                object_name = %device.object_name,
                "unknown device type, exposing as others"
            );
            device.device_type = Platform::Others;
            device.device_class = None;
            device.icon = Icon::default();
        }
    }
    device.device_friendly_name = friendly_name(&device.object_name);
}

fn type_matches(pattern: &str, object_type: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => object_type.starts_with(prefix),
        None => pattern == object_type,
    }
}

/// Turn a vendor object name into a display name.
///
/// Names follow `TYPE NUMBER ROOM LEVEL...` when they have four or more
/// words, `TYPE LEVEL...` when they have two or three. The result is
/// ordered `LEVEL ROOM TYPE NUMBER`, with vendor jargon removed from the
/// type word, empty parts dropped and title casing applied.
pub fn friendly_name(object_name: &str) -> String {
    let tokens: Vec<&str> = object_name.split_whitespace().collect();
    let Some((first, rest)) = tokens.split_first() else {
        return String::new();
    };

    let kind = strip_jargon(first);
    let (number, room, level) = match rest {
        [number, room, level @ ..] if !level.is_empty() => (*number, *room, level.join(" ")),
        level => ("", "", level.join(" ")),
    };

    let parts: Vec<&str> = [level.as_str(), room, kind.as_str(), number]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        title_case(&tokens.join(" "))
    } else {
        title_case(&parts.join(" "))
    }
}

fn strip_jargon(token: &str) -> String {
    let mut kind = token.to_owned();
    for jargon in TYPE_JARGON {
        kind = kind.replace(jargon, "");
    }
    kind
}

/// Upper-case every letter that follows a non-letter, lower-case the rest.
pub(crate) fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classified(object_type: &str, object_name: &str) -> Device {
        let mut device = Device::new("1", object_name, object_type);
        classify(&mut device);
        device
    }

    #[test]
    fn automation_channels_split_by_name() {
        assert_eq!(
            classified("CH_Main_Automation", "VENTILATORE 1 BAGNO").device_type,
            Platform::Fan
        );
        assert_eq!(
            classified("CH_Main_Automation", "LUCE 2 CUCINA").device_type,
            Platform::Light
        );

        let outlet = classified("CH_Main_Automation", "PRESA 1 SALA");
        assert_eq!(outlet.device_type, Platform::Switch);
        assert_eq!(outlet.device_class.as_deref(), Some("outlet"));

        let valve = classified("CH_Main_Automation", "IRRIGAZIONE GIARDINO");
        assert_eq!(valve.device_type, Platform::Switch);
        assert_eq!(valve.icon, Icon::toggle("mdi:water", "mdi:water-off"));

        assert_eq!(
            classified("CH_Dimmer_Automation", "FARETTI INGRESSO").device_type,
            Platform::Light
        );
    }

    #[test]
    fn keyword_match_ignores_case() {
        assert_eq!(
            classified("CH_Main_Automation", "Ventilatore bagno").device_type,
            Platform::Fan
        );
    }

    #[test]
    fn type_families() {
        let cover = classified("CH_ShutterWithoutPosition_Automation", "TAPPARELLA 1 SALA");
        assert_eq!(cover.device_type, Platform::Cover);
        assert_eq!(cover.device_class.as_deref(), Some("shutter"));

        assert_eq!(
            classified("CH_HVAC_NoZonaNeutra", "TERMOSTATO").device_type,
            Platform::Climate
        );
        assert_eq!(classified("CH_Clima", "CLIMA").device_type, Platform::Climate);
        assert_eq!(classified("CH_Scene", "NOTTE").device_type, Platform::Scene);
        assert_eq!(classified("CH_Audio", "RADIO").device_type, Platform::MediaPlayer);

        let meter = classified("CH_Carichi_3F", "CONSUMI");
        assert_eq!(meter.device_type, Platform::Sensor);
        assert_eq!(meter.device_class.as_deref(), Some("power"));
    }

    #[test]
    fn unknown_types_fall_back_to_others() {
        let device = classified("CH_Something_New", "BOH");
        assert_eq!(device.device_type, Platform::Others);
        assert_eq!(device.device_class, None);
        assert_eq!(device.icon, Icon::default());
    }

    #[test]
    fn classification_is_independent_of_order() {
        let inputs = [
            ("CH_Main_Automation", "PRESA 1 SALA"),
            ("CH_Clima", "TERMOSTATO"),
            ("CH_Main_Automation", "LUCE 3 CUCINA"),
            ("CH_Unknown", "X"),
        ];
        let forward: Vec<_> = inputs.iter().map(|(t, n)| classified(t, n)).collect();
        let backward: Vec<_> = inputs.iter().rev().map(|(t, n)| classified(t, n)).collect();

        for (a, b) in forward.iter().zip(backward.iter().rev()) {
            assert_eq!(
                (a.device_type, &a.device_class, &a.icon),
                (b.device_type, &b.device_class, &b.icon)
            );
        }
    }

    #[test]
    fn friendly_name_reorders_long_names() {
        assert_eq!(friendly_name("LUCE 3 CUCINA PRINCIPALE"), "Principale Cucina 3");
        assert_eq!(
            friendly_name("FARETTO 2 SALA PIANO TERRA"),
            "Piano Terra Sala Faretto 2"
        );
    }

    #[test]
    fn friendly_name_short_forms() {
        assert_eq!(friendly_name("TAPPARELLA STUDIO"), "Studio");
        assert_eq!(friendly_name("DIMMER CAMERA OSPITI"), "Camera Ospiti Dimmer");
        assert_eq!(friendly_name("TERMOSTATO"), "Termostato");
        assert_eq!(friendly_name("LUCE"), "Luce");
        assert_eq!(friendly_name("  "), "");
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("l'INGRESSO 2a"), "L'Ingresso 2A");
    }
}
