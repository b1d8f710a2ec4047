//! `spotctl tools`: List the action catalog.

use spotctl_config::AppConfig;
use spotctl_core::action::{ActionCategory, ActionDefinition};
use spotctl_core::registry::ActionRegistry;
use spotctl_tools::build_registry;

pub fn run(
    category: Option<ActionCategory>,
    permissions: Vec<String>,
    stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = build_registry(&config)?;

    if stats {
        let stats = registry.get_stats();
        println!("Actions:              {}", stats.total_actions);
        for (category, count) in &stats.actions_by_category {
            println!("  {category:<20}{count}");
        }
        println!("With permissions:     {}", stats.actions_with_permissions);
        println!("With rate limits:     {}", stats.actions_with_rate_limit);
        return Ok(());
    }

    let selected = select(&registry, category, &permissions);
    for category in ActionCategory::ALL {
        let in_category: Vec<&&ActionDefinition> = selected.iter().filter(|d| d.category == category).collect();
        if in_category.is_empty() {
            continue;
        }
        println!("{category}");
        for def in in_category {
            let perms = if def.permissions.is_empty() {
                String::new()
            } else {
                format!("  [{}]", def.permissions.join(", "))
            };
            println!("  {:<34}{}{perms}", def.name, def.description);
        }
        println!();
    }
    println!("{} action(s)", selected.len());
    Ok(())
}

/// Category narrows first; permissions then drop what the caller cannot invoke.
fn select<'a>(
    registry: &'a ActionRegistry,
    category: Option<ActionCategory>,
    permissions: &[String],
) -> Vec<&'a ActionDefinition> {
    let base = match category {
        Some(category) => registry.get_by_category(category),
        None => registry.get_all(),
    };
    if permissions.is_empty() {
        return base;
    }
    base.into_iter().filter(|d| d.permitted_by(permissions)).collect()
}
