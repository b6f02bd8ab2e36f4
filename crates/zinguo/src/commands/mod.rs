//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod control;
pub mod device;

use zinguo_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices => device::list(coordinator, global).await,
        Command::Status => device::status(coordinator, global).await,
        Command::Watch(_) => device::watch(coordinator, global).await,
        Command::Switch(_)
        | Command::Fan(_)
        | Command::Set(_)
        | Command::LightAutoClose(_)
        | Command::TurnOffAll => control::handle(cmd, coordinator, global).await,
        // Handled before a coordinator exists.
        Command::Completions(_) => Ok(()),
    }
}

/// Fail early when no device MAC is configured.
pub fn require_mac(coordinator: &Coordinator) -> Result<(), CliError> {
    if coordinator.config().mac.is_empty() {
        return Err(CliError::NoDevice);
    }
    Ok(())
}
