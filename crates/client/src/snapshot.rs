//! Navigation snapshot builder.
//!
//! Walks a navigation-library state tree (`{routes: [{name, state?}, ...]}`)
//! and collects screen names in depth-first pre-order.

use std::collections::HashSet;

use serde_json::Value;
use vac_protocol::NavigatorSnapshot;

/// Builds a snapshot from a navigation state tree.
///
/// Only non-empty string `name`s count. Routes without a usable name still
/// have their nested `state` visited. Anything malformed is an empty subtree.
pub fn build_snapshot_from_navigation_state(state: &Value) -> NavigatorSnapshot {
    let mut seen = HashSet::new();
    let mut screens = Vec::new();
    let mut stack = vec![routes_of(state)];

    while let Some(routes) = stack.last_mut() {
        let Some(route) = routes.next() else {
            stack.pop();
            continue;
        };
        if let Some(name) = route.get("name").and_then(Value::as_str)
            && !name.is_empty()
            && seen.insert(name)
        {
            screens.push(name.to_string());
        }
        if let Some(nested) = route.get("state") {
            stack.push(routes_of(nested));
        }
    }

    NavigatorSnapshot::new(screens)
}

fn routes_of(state: &Value) -> std::slice::Iter<'_, Value> {
    state
        .get("routes")
        .and_then(Value::as_array)
        .map_or_else(Default::default, |routes| routes.iter())
}
