//! Repository store management commands.

use super::helpers::{load_config, open_store};
use crate::cli::{Args, Command, OutputManager, RepositoryAction};
use crate::error::{CliError, Result, StoreError};
use crate::release::validate_identifier;
use crate::store::{RepositoryRecord, RepositoryStore};

/// Execute a repository subcommand
pub(super) async fn execute_repository(args: &Args, output: &OutputManager) -> Result<()> {
    let Command::Repository { action } = &args.command else {
        return Err(CliError::InvalidArguments {
            reason: "repository handler invoked for another command".to_string(),
        }
        .into());
    };

    let config = load_config(args)?;
    let mut store = open_store(&config)?;

    match action {
        RepositoryAction::Add { name, url } => {
            validate_identifier(name)?;
            let record = store.create(name, url)?;
            output.success(&format!(
                "Registered repository '{}' (id {})",
                record.name(),
                display_id(&record)
            ));
        }
        RepositoryAction::List => {
            if store.list().is_empty() {
                output.info("No repositories registered");
            }
            for record in store.list() {
                output.println(&format!(
                    "{:>4}  {:<20} {}",
                    display_id(record),
                    record.name(),
                    record.url()
                ));
            }
        }
        RepositoryAction::Show { name } => {
            let record = find(&store, name)?;
            print_record(output, record);
        }
        RepositoryAction::Update { name, url, rename } => {
            let mut record = find(&store, name)?.clone();
            if let Some(url) = url {
                record.set_url(url.as_str());
            }
            if let Some(new_name) = rename {
                validate_identifier(new_name)?;
                record.set_name(new_name.as_str());
            }
            let updated = store.update(&record)?;
            output.success(&format!("Updated repository '{}'", updated.name()));
        }
        RepositoryAction::Remove { name } => {
            let id = find(&store, name)?
                .id()
                .ok_or_else(|| StoreError::NotFound(name.clone()))?;
            store.remove(id)?;
            output.success(&format!("Removed repository '{}'", name));
        }
    }

    Ok(())
}

fn find<'a>(store: &'a RepositoryStore, name: &str) -> Result<&'a RepositoryRecord> {
    store
        .find_by_name(name)
        .ok_or_else(|| StoreError::NotFound(name.to_string()).into())
}

fn display_id(record: &RepositoryRecord) -> String {
    record.id().map(|id| id.to_string()).unwrap_or_default()
}

fn print_record(output: &OutputManager, record: &RepositoryRecord) {
    output.println(&format!("id:         {}", display_id(record)));
    output.println(&format!("name:       {}", record.name()));
    output.println(&format!("url:        {}", record.url()));
    output.println(&format!("created at: {}", record.created_at().to_rfc3339()));
    output.println(&format!("updated at: {}", record.updated_at().to_rfc3339()));
}
