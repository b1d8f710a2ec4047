//! Which actions a prompt may call.

use spotctl_core::action::{ActionCategory, ActionDefinition};
use spotctl_core::provider::ToolDefinition;
use spotctl_core::registry::ActionRegistry;
use tracing::warn;

/// Tool filter for one prompt. The first populated field wins:
/// explicit names, then category, then permissions, else the full catalog.
#[derive(Debug, Clone, Default)]
pub struct ToolSelection {
    pub tools: Option<Vec<String>>,
    pub category: Option<ActionCategory>,
    pub permissions: Option<Vec<String>>,
}

impl ToolSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn category(category: ActionCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn permissions(granted: Vec<String>) -> Self {
        Self {
            permissions: Some(granted),
            ..Self::default()
        }
    }

    pub fn resolve<'a>(&self, registry: &'a ActionRegistry) -> Vec<&'a ActionDefinition> {
        if let Some(names) = &self.tools {
            return names
                .iter()
                .filter_map(|name| {
                    let found = registry.get(name);
                    if found.is_none() {
                        warn!(tool = %name, "Requested tool is not registered");
                    }
                    found
                })
                .collect();
        }
        if let Some(category) = self.category {
            return registry.get_by_category(category);
        }
        if let Some(granted) = &self.permissions {
            return registry.get_by_permissions(granted);
        }
        registry.get_all()
    }

    pub fn tool_definitions(&self, registry: &ActionRegistry) -> Vec<ToolDefinition> {
        self.resolve(registry)
            .into_iter()
            .map(ActionDefinition::to_tool_definition)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        let schema = json!({"type": "object", "properties": {}});
        registry
            .register(
                ActionDefinition::new("get_saved_tracks", "Saved", ActionCategory::Track, schema.clone())
                    .with_permissions(["track:read"]),
            )
            .unwrap();
        registry
            .register(ActionDefinition::new("search_tracks", "Search", ActionCategory::Search, schema.clone()))
            .unwrap();
        registry
            .register(
                ActionDefinition::new("like_songs", "Like", ActionCategory::Track, schema)
                    .with_permissions(["track:modify"]),
            )
            .unwrap();
        registry
    }

    fn names(defs: Vec<&ActionDefinition>) -> Vec<&str> {
        defs.into_iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn explicit_names_win_and_skip_unknown() {
        let registry = registry();
        let selection = ToolSelection {
            tools: Some(vec!["like_songs".into(), "nope".into()]),
            category: Some(ActionCategory::Search),
            permissions: None,
        };
        assert_eq!(names(selection.resolve(&registry)), ["like_songs"]);
    }

    #[test]
    fn category_beats_permissions() {
        let registry = registry();
        let selection = ToolSelection {
            tools: None,
            category: Some(ActionCategory::Track),
            permissions: Some(vec![]),
        };
        assert_eq!(names(selection.resolve(&registry)), ["get_saved_tracks", "like_songs"]);
    }

    #[test]
    fn permissions_keep_unrestricted_actions() {
        let registry = registry();
        let selection = ToolSelection::permissions(vec!["track:read".into()]);
        assert_eq!(names(selection.resolve(&registry)), ["get_saved_tracks", "search_tracks"]);
    }

    #[test]
    fn default_is_full_catalog() {
        let registry = registry();
        assert_eq!(ToolSelection::all().tool_definitions(&registry).len(), 3);
    }
}
