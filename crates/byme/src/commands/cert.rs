//! Root CA download.

use byme_core::{Controller, ControllerConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(config: ControllerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let Some(path) = config.certificate.clone() else {
        return Err(CliError::Validation {
            field: "certificate".into(),
            reason: "the profile has no certificate path to write to".into(),
        });
    };

    let controller = Controller::new(config)?;
    let changed = controller.install_certificate().await?;

    let message = if changed {
        format!("Certificate written to {}", path.display())
    } else {
        format!("Certificate at {} is already current", path.display())
    };
    output::print_output(&message, global.quiet);
    Ok(())
}
