//! Attribute writes.

use byme_core::{Controller, ControllerConfig};

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: ControllerConfig,
    args: SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let SetArgs {
        object_id,
        status_name,
        value,
    } = args;

    let message = format!("{object_id}: {status_name} = {value}");
    Controller::oneshot(config, move |ctrl| async move {
        ctrl.change_state(&object_id, &status_name, &value).await
    })
    .await?;

    output::print_output(&message, global.quiet);
    Ok(())
}
