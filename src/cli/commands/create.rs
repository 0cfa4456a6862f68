//! Release creation command.

use super::helpers::{available_repositories, load_config, open_store};
use crate::cli::{Args, Command, OutputManager};
use crate::error::{CliError, Result};
use crate::process::SystemRunner;
use crate::prompt::{AcceptAll, TerminalPrompt, select_repository};
use crate::release::{ReleaseBuilder, ReleaseRequest};
use std::io::IsTerminal;

/// Execute the create command
pub(super) async fn execute_create(args: &Args, output: &OutputManager) -> Result<i32> {
    let Command::Create {
        repository,
        branch,
        create_tag,
        no_interaction,
    } = &args.command
    else {
        return Err(CliError::InvalidArguments {
            reason: "create handler invoked for another command".to_string(),
        }
        .into());
    };

    let config = load_config(args)?;
    let store = open_store(&config)?;
    let interactive = !no_interaction && std::io::stdin().is_terminal();
    let prompt = TerminalPrompt;
    let validator = AcceptAll;

    let repository = if interactive {
        output.banner("Deploy");
        output.info("Available:");
        for name in available_repositories(&config.known_repositories, &store.names()) {
            output.println(&name);
        }
        output.println("");

        select_repository(&prompt, &validator, repository.as_deref(), |reason| {
            output.error(reason)
        })
        .map_err(|e| CliError::PromptFailed {
            reason: e.to_string(),
        })?
    } else {
        repository.clone().unwrap_or_default()
    };

    let request = ReleaseRequest {
        repository,
        branch: branch.clone(),
        create_tag: *create_tag,
        interactive,
    };

    let builder = ReleaseBuilder::new(config, SystemRunner::new()).with_store(&store);
    let outcome = builder.run(&request, &prompt, &validator, output).await?;

    output.println("");
    if outcome.fresh_vendor {
        output.indent(&format!("Dependencies installed and cached as {}", outcome.lock_hash));
    } else {
        output.indent(&format!("Dependencies reused from cache {}", outcome.lock_hash));
    }
    if let Some(tag) = &outcome.tag {
        output.indent(&format!("Tagged {} as {}", outcome.commit, tag));
    }
    output.success(&format!("Release created: {}", outcome.archive.display()));

    Ok(0)
}
