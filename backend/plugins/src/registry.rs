//! Plugin registry: orders loaded plugins by their declared dependencies.
//!
//! The order is a stable topological sort. A plugin is placed as soon as all
//! of its dependencies are placed, and ties go to the plugin that appeared
//! first in the input. Override resolution ("last registered wins") reads
//! this order, so it must not depend on hashing or names.
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;
use trellis_core::{PluginDeclaration, Result, RouterError};

#[derive(Debug, Default)]
pub struct PluginRegistry {
    ordered: Vec<Arc<PluginDeclaration>>,
    index: HashMap<String, usize>,
    /// Dependencies that are actually loaded, per plugin.
    dependencies: HashMap<String, Vec<String>>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<PluginDeclaration>) -> Result<Self> {
        let mut seen = HashSet::new();
        for plugin in &plugins {
            if !seen.insert(plugin.name.as_str()) {
                return Err(RouterError::config(format!(
                    "Plugin '{}' is declared more than once",
                    plugin.name
                )));
            }
        }

        let dependencies = resolve_dependencies(&plugins, &seen)?;
        let order = stable_order(&plugins, &dependencies)?;

        let mut slots: Vec<Option<PluginDeclaration>> = plugins.into_iter().map(Some).collect();
        let ordered: Vec<Arc<PluginDeclaration>> = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .map(Arc::new)
            .collect();
        let index = ordered
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();

        let registry = Self { ordered, index, dependencies };
        debug!(order = ?registry.names(), "Resolved plugin order");
        Ok(registry)
    }

    /// Plugins in dependency order.
    pub fn ordered(&self) -> &[Arc<PluginDeclaration>] {
        &self.ordered
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PluginDeclaration>> {
        self.index.get(name).map(|&i| &self.ordered[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.ordered.iter().map(|p| p.name.as_str()).collect()
    }

    /// Direct dependencies of `name` that are loaded.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.dependencies.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every plugin `name` depends on, directly or indirectly.
    pub fn transitive_dependencies(&self, name: &str) -> HashSet<String> {
        let mut found = HashSet::new();
        let mut queue: VecDeque<&str> = self.dependencies_of(name).iter().map(String::as_str).collect();
        while let Some(dep) = queue.pop_front() {
            if found.insert(dep.to_string()) {
                queue.extend(self.dependencies_of(dep).iter().map(String::as_str));
            }
        }
        found
    }

    pub fn depends_on(&self, plugin: &str, other: &str) -> bool {
        self.transitive_dependencies(plugin).contains(other)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

fn resolve_dependencies(
    plugins: &[PluginDeclaration],
    loaded: &HashSet<&str>,
) -> Result<HashMap<String, Vec<String>>> {
    let mut resolved = HashMap::new();
    for plugin in plugins {
        let mut deps: Vec<String> = Vec::new();
        for dep in &plugin.dependencies {
            if loaded.contains(dep.name.as_str()) {
                if !deps.contains(&dep.name) {
                    deps.push(dep.name.clone());
                }
            } else if dep.optional {
                debug!(plugin = %plugin.name, dependency = %dep.name, "Skipping missing optional dependency");
            } else {
                return Err(RouterError::config(format!(
                    "Plugin '{}' depends on plugin '{}', which is not loaded",
                    plugin.name, dep.name
                )));
            }
        }
        resolved.insert(plugin.name.clone(), deps);
    }
    Ok(resolved)
}

fn stable_order(
    plugins: &[PluginDeclaration],
    dependencies: &HashMap<String, Vec<String>>,
) -> Result<Vec<usize>> {
    let deps_of = |name: &str| dependencies.get(name).map(Vec::as_slice).unwrap_or(&[]);
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(plugins.len());

    while order.len() < plugins.len() {
        let next = plugins.iter().enumerate().find(|(_, p)| {
            !placed.contains(p.name.as_str())
                && deps_of(&p.name).iter().all(|d| placed.contains(d.as_str()))
        });
        match next {
            Some((i, plugin)) => {
                placed.insert(plugin.name.as_str());
                order.push(i);
            }
            None => {
                let remaining: Vec<&str> = plugins
                    .iter()
                    .map(|p| p.name.as_str())
                    .filter(|name| !placed.contains(name))
                    .collect();
                let cycle = find_cycle(&remaining, &deps_of);
                return Err(RouterError::config(format!(
                    "Circular plugin dependencies detected: {}",
                    cycle.join(" -> ")
                )));
            }
        }
    }
    Ok(order)
}

/// Every unplaced plugin has at least one unplaced dependency, so following
/// those edges from any of them must revisit a plugin.
fn find_cycle<'a>(remaining: &[&'a str], deps_of: &impl Fn(&str) -> &'a [String]) -> Vec<&'a str> {
    let Some(&start) = remaining.first() else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(next) = deps_of(current)
            .iter()
            .map(String::as_str)
            .find(|d| remaining.contains(d))
        else {
            return path;
        };
        if let Some(pos) = path.iter().position(|p| *p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            return cycle;
        }
        path.push(next);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(name: &str, deps: &[&str]) -> PluginDeclaration {
        deps.iter()
            .fold(PluginDeclaration::new(name), |p, dep| p.depends_on(*dep))
    }

    #[test]
    fn orders_dependencies_first() {
        let registry = PluginRegistry::new(vec![
            plugin("c", &["b"]),
            plugin("b", &["a"]),
            plugin("a", &[]),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn unrelated_plugins_keep_input_order() {
        let registry = PluginRegistry::new(vec![
            plugin("b1", &["a"]),
            plugin("b2", &["a"]),
            plugin("a", &[]),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["a", "b1", "b2"]);

        let registry = PluginRegistry::new(vec![
            plugin("b2", &["a"]),
            plugin("b1", &["a"]),
            plugin("a", &[]),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["a", "b2", "b1"]);
    }

    #[test]
    fn independent_plugin_is_not_moved_behind_dependents() {
        let registry = PluginRegistry::new(vec![
            plugin("c", &["a"]),
            plugin("b", &[]),
            plugin("a", &[]),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let err = PluginRegistry::new(vec![plugin("b", &["a"])]).unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn missing_optional_dependency_is_ignored() {
        let registry = PluginRegistry::new(vec![
            PluginDeclaration::new("b").optionally_depends_on("absent"),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["b"]);
        assert!(registry.dependencies_of("b").is_empty());
    }

    #[test]
    fn present_optional_dependency_orders_like_required() {
        let registry = PluginRegistry::new(vec![
            PluginDeclaration::new("b").optionally_depends_on("a"),
            plugin("a", &[]),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn cycles_are_reported() {
        let err = PluginRegistry::new(vec![
            plugin("x", &[]),
            plugin("a", &["b"]),
            plugin("b", &["a"]),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Circular plugin dependencies"), "{msg}");
        assert!(msg.contains("a -> b -> a"), "{msg}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = PluginRegistry::new(vec![plugin("a", &[]), plugin("a", &[])]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn transitive_dependencies() {
        let registry = PluginRegistry::new(vec![
            plugin("a", &[]),
            plugin("b", &["a"]),
            plugin("c", &["b"]),
            plugin("d", &[]),
        ])
        .unwrap();
        assert!(registry.depends_on("c", "a"));
        assert!(!registry.depends_on("a", "c"));
        assert!(!registry.depends_on("c", "d"));
        assert_eq!(registry.transitive_dependencies("c").len(), 2);
        assert_eq!(registry.get("b").unwrap().name, "b");
    }
}
