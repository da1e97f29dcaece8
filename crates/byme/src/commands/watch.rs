//! Follow the poll cycle.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use byme_core::{Controller, ControllerConfig, DeviceMap, UpdateEvent};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// One line per attribute whose value differs between two snapshots.
fn state_changes(before: &DeviceMap, after: &DeviceMap) -> Vec<String> {
    let mut lines = Vec::new();
    for (id, device) in after {
        let old = before.get(id);
        for (name, entry) in &device.status {
            let previous = old.and_then(|d| d.get_state(name)).unwrap_or("-");
            if previous != entry.status_value {
                lines.push(format!(
                    "{} ({id}) {name}: {previous} -> {}",
                    device.device_friendly_name, entry.status_value
                ));
            }
        }
    }
    lines
}

pub async fn handle(
    config: ControllerConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let controller = Controller::new(config)?;
    let mut events = controller.subscribe();
    controller.connect().await?;
    let mut devices = controller.devices();

    output::print_output(
        &format!(
            "{} connected, {} devices",
            timestamp(),
            controller.project().device_count()
        ),
        global.quiet,
    );

    let mut seen = 0_u32;
    loop {
        if args.cycles.is_some_and(|limit| seen >= limit) {
            break;
        }
        let previous = Arc::clone(devices.current());
        tokio::select! {
            event = events.recv() => match event {
                Ok(UpdateEvent::Updated { version, device_count }) => {
                    seen += 1;
                    output::print_output(
                        &format!("{} updated v{version}, {device_count} devices", timestamp()),
                        global.quiet,
                    );
                }
                Ok(UpdateEvent::Failed { message }) => {
                    seen += 1;
                    output::print_output(
                        &format!("{} update failed: {message}", timestamp()),
                        global.quiet,
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            snapshot = devices.changed() => match snapshot {
                Some(snapshot) => {
                    for line in state_changes(&previous, &snapshot) {
                        output::print_output(&format!("{} {line}", timestamp()), global.quiet);
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.disconnect().await;
    Ok(())
}
