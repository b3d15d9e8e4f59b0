//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod config_cmd;
pub mod entities;
pub mod gates;
pub mod set;
pub mod watch;

use compit_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Gates => gates::handle(coordinator, global),
        Command::Entities(args) => entities::handle(coordinator, &args, global),
        Command::Set(args) => set::handle(coordinator, args, global).await,
        Command::Watch(args) => watch::handle(coordinator, &args, global).await,
        Command::Config(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "config commands do not need an account".into(),
        }),
    }
}
