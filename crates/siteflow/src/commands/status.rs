use anyhow::Context;
use colored::Colorize;
use siteflow_cloud::{DeploymentState, ResourceKind, StateStore};

pub async fn handle(store: &StateStore, environment: &str, json: bool) -> anyhow::Result<()> {
    let state = store
        .load(environment)
        .await
        .with_context(|| format!("Failed to load state for '{}'", environment))?
        .ok_or_else(|| anyhow::anyhow!("No deployment state for environment '{}'", environment))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    print_state(&state);
    Ok(())
}

fn print_state(state: &DeploymentState) {
    println!("{} {}", "App:".bold(), state.app.cyan());
    println!("{} {}", "Environment:".bold(), state.environment.cyan());
    println!(
        "{} {}",
        "Last deployed:".bold(),
        state
            .last_deployed
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
    );
    if let Some(version) = &state.version {
        println!("{} {}", "State version:".bold(), version);
    }
    println!("{} {}", "Tracked files:".bold(), state.files.len());
    println!();

    if !state.has_any_resource() {
        println!("{}", "No resources recorded".dimmed());
        return;
    }

    println!("{}", "Resources:".bold());
    for kind in ResourceKind::ALL {
        let line = match kind {
            ResourceKind::ObjectStore => state.bucket().map(|b| {
                let url = b.website_url.as_deref().unwrap_or("-");
                format!("{} ({}) {}", b.bucket_name, b.region, url)
            }),
            ResourceKind::Cdn => state
                .distribution()
                .map(|d| format!("{} {}", d.distribution_id, d.distribution_url)),
            ResourceKind::Certificate => state
                .certificate()
                .map(|c| format!("{} {}", c.domain_name, c.certificate_arn)),
            ResourceKind::DnsZone => state
                .dns_zone()
                .map(|z| format!("{} {} ({} records)", z.domain, z.hosted_zone_id, z.records.len())),
        };
        if let Some(line) = line {
            println!("  {} {:<18} {}", "✓".green(), kind.to_string(), line);
        }
    }

    for issue in state.validate_resources() {
        println!("  {} {}", "⚠".yellow(), issue);
    }
}
