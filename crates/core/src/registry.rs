//! The action registry.
//!
//! A name-keyed map of [`ActionDefinition`]s with a category index and a
//! route table. Populated once at startup; `register`, `unregister` and
//! `clear` exist for bulk registration and test isolation.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::action::{ActionCategory, ActionDefinition};
use crate::error::ActionError;
use crate::provider::ToolDefinition;
use crate::routing::{Route, infer_route};

struct Entry {
    definition: ActionDefinition,
    route: Route,
}

#[derive(Default)]
pub struct ActionRegistry {
    entries: HashMap<String, Entry>,
    /// Registration order, used for every listing.
    order: Vec<String>,
    by_category: BTreeMap<ActionCategory, Vec<String>>,
}

/// Counts over the current registry contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_actions: usize,
    pub actions_by_category: BTreeMap<ActionCategory, usize>,
    pub actions_with_permissions: usize,
    pub actions_with_rate_limit: usize,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. The route is fixed here: the declared handler
    /// group if any, otherwise the one inferred from the name.
    pub fn register(&mut self, definition: ActionDefinition) -> Result<(), ActionError> {
        if self.entries.contains_key(&definition.name) {
            return Err(ActionError::DuplicateName(definition.name));
        }

        let route = definition
            .handler_group
            .map(Route::Handler)
            .unwrap_or_else(|| infer_route(&definition.name));

        debug!(action = %definition.name, category = %definition.category, ?route, "Registered action");

        let name = definition.name.clone();
        self.by_category
            .entry(definition.category)
            .or_default()
            .push(name.clone());
        self.order.push(name.clone());
        self.entries.insert(name, Entry { definition, route });
        Ok(())
    }

    /// Remove an action. Absent names are ignored.
    pub fn unregister(&mut self, name: &str) {
        let Some(entry) = self.entries.remove(name) else {
            return;
        };
        self.order.retain(|n| n != name);
        if let Some(names) = self.by_category.get_mut(&entry.definition.category) {
            names.retain(|n| n != name);
            if names.is_empty() {
                self.by_category.remove(&entry.definition.category);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionDefinition> {
        self.entries.get(name).map(|e| &e.definition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Route for a registered action, `None` if the name is unknown.
    pub fn route(&self, name: &str) -> Option<Route> {
        self.entries.get(name).map(|e| e.route)
    }

    pub fn get_by_category(&self, category: ActionCategory) -> Vec<&ActionDefinition> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn get_all(&self) -> Vec<&ActionDefinition> {
        self.order.iter().filter_map(|name| self.get(name)).collect()
    }

    /// Actions callable by someone holding `granted`: unrestricted ones plus
    /// those whose requirements are a subset of it.
    pub fn get_by_permissions(&self, granted: &[String]) -> Vec<&ActionDefinition> {
        self.get_all()
            .into_iter()
            .filter(|def| def.permitted_by(granted))
            .collect()
    }

    pub fn get_stats(&self) -> RegistryStats {
        let all = self.get_all();
        RegistryStats {
            total_actions: all.len(),
            actions_by_category: self
                .by_category
                .iter()
                .map(|(category, names)| (*category, names.len()))
                .collect(),
            actions_with_permissions: all.iter().filter(|d| d.requires_permissions()).count(),
            actions_with_rate_limit: all.iter().filter(|d| d.rate_limit.is_some()).count(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.by_category.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions for every registered action, in registration order.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.get_all().into_iter().map(|d| d.to_tool_definition()).collect()
    }
}
