use anyhow::Context;
use colored::Colorize;
use siteflow_cloud::StateStore;

pub async fn handle(store: &StateStore, environment: &str, force: bool) -> anyhow::Result<()> {
    let Some(state) = store
        .load(environment)
        .await
        .with_context(|| format!("Failed to load state for '{}'", environment))?
    else {
        println!(
            "{}",
            format!("No deployment state for environment '{}'", environment).dimmed()
        );
        return Ok(());
    };

    if !state.is_disposable() && !force {
        anyhow::bail!(
            "State for '{}' still tracks {} resource(s) and {} file(s); tear down first or pass --force",
            environment,
            state.resource_kinds().len(),
            state.files.len()
        );
    }

    store
        .delete(environment)
        .await
        .with_context(|| format!("Failed to delete state for '{}'", environment))?;
    println!("{} {}", "✓ Forgot".green(), environment.cyan());
    Ok(())
}
