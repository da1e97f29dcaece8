//! Device listing.

use std::sync::Arc;

use tabled::Tabled;

use byme_core::{Controller, CoreError, Device};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "State")]
    state: String,
}

/// Primary value shown in the table: on/off when present, else the first attribute.
pub(super) fn headline_state(device: &Device, color: bool) -> String {
    if let Some(value) = device.get_state("on/off") {
        return output::paint_state(value, color);
    }
    device
        .status
        .iter()
        .next()
        .map(|(name, entry)| format!("{name}={}", entry.status_value))
        .unwrap_or_default()
}

pub async fn handle(
    config: byme_core::ControllerConfig,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let DevicesArgs { platform, refresh } = args;

    let devices = Controller::oneshot(config, move |ctrl| async move {
        let listed: Vec<Arc<Device>> = match platform {
            Some(platform) => ctrl.get_by_type(platform).into_values().collect(),
            None => ctrl
                .devices_snapshot()
                .values()
                .filter(|d| !ctrl.project().is_ignored(d.device_type))
                .cloned()
                .collect(),
        };
        if !refresh {
            return Ok::<_, CoreError>(listed);
        }

        let mut fresh = Vec::with_capacity(listed.len());
        for device in &listed {
            fresh.push(ctrl.refresh_device(&device.object_id).await?);
        }
        Ok(fresh)
    })
    .await?;

    let color = output::should_color(&global.color);
    let rendered = output::render_list(
        &global.output,
        &devices,
        |d| DeviceRow {
            id: d.object_id.clone(),
            name: d.device_friendly_name.clone(),
            room: d.room_name.clone(),
            platform: d.device_type.to_string(),
            class: d.device_class.clone().unwrap_or_default(),
            state: headline_state(d, color),
        },
        |d| d.object_id.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
