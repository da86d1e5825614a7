use anyhow::Context;
use colored::Colorize;
use siteflow_cloud::StateStore;

pub async fn handle(store: &StateStore) -> anyhow::Result<()> {
    let entries = store
        .list()
        .await
        .with_context(|| format!("Failed to read {}", store.state_dir().display()))?;

    if entries.is_empty() {
        println!("{}", "No deployment state found".dimmed());
        return Ok(());
    }

    println!("{}", format!("{:<20} {}", "ENVIRONMENT", "STATE FILE").bold());
    for entry in entries {
        println!(
            "{:<20} {}",
            entry.environment.cyan(),
            entry.path.display().to_string().dimmed()
        );
    }
    Ok(())
}
