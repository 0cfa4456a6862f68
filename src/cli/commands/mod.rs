//! Command execution.
//!
//! Dispatches parsed arguments to the command handlers and turns their errors
//! into an exit code plus recovery suggestions.

mod create;
mod helpers;
mod repository;

use crate::cli::{Args, Command, OutputManager};
use crate::error::{ReleaseError, Result};

use create::execute_create;
use repository::execute_repository;

/// Execute the command selected by `args` and return the process exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    let output = OutputManager::new();

    if let Err(validation_error) = args.validate() {
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let result = match &args.command {
        Command::Create { .. } => execute_create(&args, &output).await,
        Command::Repository { .. } => execute_repository(&args, &output).await.map(|()| 0),
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            report_failure(&output, args.command.name(), &e);
            Ok(1)
        }
    }
}

fn report_failure(output: &OutputManager, command: &str, error: &ReleaseError) {
    match error {
        ReleaseError::Build(build) => output.error(&format!(
            "Command '{}' failed at {}: {}",
            command,
            build.step(),
            build
        )),
        other => output.error(&format!("Command '{}' failed: {}", command, other)),
    }

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        output.println("\n💡 Recovery suggestions:");
        for suggestion in suggestions {
            output.println(&format!("  • {}", suggestion));
        }
    }
}
