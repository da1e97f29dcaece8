//! Command handlers.

mod cert;
mod devices;
mod set;
mod status;
mod watch;

use byme_core::ControllerConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(
    cmd: Command,
    config: ControllerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(config, args, global).await,
        Command::Status(args) => status::handle(config, args, global).await,
        Command::Set(args) => set::handle(config, args, global).await,
        Command::InstallCert => cert::handle(config, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
    }
}
