//! Single device detail.

use std::sync::Arc;

use tabled::Tabled;

use byme_core::{Controller, ControllerConfig, Device};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Attribute")]
    name: String,
    #[tabled(rename = "Status ID")]
    status_id: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Range")]
    range: String,
}

fn detail(d: &Arc<Device>, color: bool) -> String {
    let header = [
        format!("ID:       {}", d.object_id),
        format!("Name:     {}", d.device_friendly_name),
        format!("Object:   {} ({})", d.object_name, d.object_type),
        format!(
            "Room:     {}",
            if d.room_name.is_empty() { "-" } else { d.room_name.as_str() }
        ),
        format!("Platform: {}", d.device_type),
        format!("Class:    {}", d.device_class.as_deref().unwrap_or("-")),
        format!(
            "Icon:     {}",
            d.icon.for_state(d.get_state("on/off") != Some("0"))
        ),
    ]
    .join("\n");

    let rows: Vec<StatusRow> = d
        .status
        .iter()
        .map(|(name, entry)| StatusRow {
            name: name.clone(),
            status_id: entry.status_id.clone(),
            value: output::paint_state(&entry.status_value, color),
            range: entry.status_range.clone().unwrap_or_default(),
        })
        .collect();

    format!("{header}\n\n{}", output::render_table(&rows))
}

pub async fn handle(
    config: ControllerConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let object_id = args.object_id;
    let device = Controller::oneshot(config, move |ctrl| async move {
        ctrl.refresh_device(&object_id).await
    })
    .await?;

    let color = output::should_color(&global.color);
    let rendered = output::render_single(
        &global.output,
        &device,
        |d| detail(d, color),
        |d| {
            d.status
                .iter()
                .map(|(name, entry)| format!("{name}={}", entry.status_value))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
