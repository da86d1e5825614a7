use anyhow::Context;
use colored::Colorize;
use siteflow_cloud::hash::DEFAULT_EXCLUDES;
use siteflow_cloud::{FileChange, FileHashMap, StateStore, detect_changes, scan_build_output};
use std::path::Path;

pub async fn handle(
    store: &StateStore,
    dir: &Path,
    environment: &str,
    list_files: bool,
) -> anyhow::Result<()> {
    let excludes = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    let manifest = scan_build_output(dir.to_path_buf(), excludes)
        .await
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    let previous = store
        .load(environment)
        .await
        .with_context(|| format!("Failed to load state for '{}'", environment))?
        .map(|state| state.files)
        .unwrap_or_else(FileHashMap::new);

    let changes = detect_changes(&manifest, &previous);
    let stats = changes.stats();

    println!(
        "{} {} ({} files)",
        "Plan for".bold(),
        environment.cyan(),
        manifest.len()
    );
    println!("  upload: {}", stats.needs_upload.to_string().green());
    println!("  skip:   {}", stats.can_skip.to_string().dimmed());
    println!("  delete: {}", stats.needs_delete.to_string().red());

    if changes.is_empty() {
        println!();
        println!("{}", "No changes".green());
        return Ok(());
    }

    if list_files {
        println!();
        let changed = changes
            .added
            .iter()
            .chain(&changes.modified)
            .chain(&changes.deleted);
        for change in changed {
            let marker = match change {
                FileChange::Added { .. } => "+".green(),
                FileChange::Modified { .. } => "~".yellow(),
                FileChange::Deleted { .. } => "-".red(),
                FileChange::Unchanged { .. } => " ".normal(),
            };
            println!("  {} {}", marker, change.path());
        }
    }
    Ok(())
}
