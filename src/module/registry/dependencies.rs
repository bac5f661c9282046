//! Module dependency checks
//!
//! Registration only checks that every required module is present at that
//! moment; versions are not compared. Batch loading additionally needs an
//! order in which each module's requirements are registered before it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use crate::module::traits::{ModuleError, ModuleMetadata};

/// Dependency checks and ordering
pub struct ModuleDependencies;

impl ModuleDependencies {
    /// Fail with `Dependency` naming the first required module (by name) that
    /// `is_present` rejects
    pub fn validate<F>(metadata: &ModuleMetadata, is_present: F) -> Result<(), ModuleError>
    where
        F: Fn(&str) -> bool,
    {
        for required in metadata.required_modules() {
            if !is_present(required) {
                return Err(ModuleError::Dependency {
                    module: metadata.name.clone(),
                    missing: required.to_string(),
                });
            }
            // TODO: compare the declared requirement against the registered version
        }
        Ok(())
    }

    /// Order a batch so every module comes after the batch members it requires
    ///
    /// Requirements satisfied by `already_registered` impose no ordering. A
    /// requirement found in neither place is a `Dependency` error; a cycle is
    /// an `InvalidDefinition` error. Ties are broken by name, so the order is
    /// deterministic.
    pub fn load_order<F>(
        batch: &[&ModuleMetadata],
        already_registered: F,
    ) -> Result<Vec<String>, ModuleError>
    where
        F: Fn(&str) -> bool,
    {
        let in_batch: BTreeSet<&str> = batch.iter().map(|m| m.name.as_str()).collect();

        // name -> batch members it waits on
        let mut dependencies: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for module in batch {
            let mut waits_on = Vec::new();
            for required in module.required_modules() {
                if in_batch.contains(required) {
                    waits_on.push(required);
                } else if !already_registered(required) {
                    return Err(ModuleError::Dependency {
                        module: module.name.clone(),
                        missing: required.to_string(),
                    });
                }
            }
            dependencies.insert(module.name.as_str(), waits_on);
        }

        let order = Self::topological_sort(&dependencies).map_err(|stuck| {
            ModuleError::InvalidDefinition(format!(
                "Circular dependency detected among: {}",
                stuck.join(", ")
            ))
        })?;

        debug!("Dependency resolution complete: {:?}", order);
        Ok(order)
    }

    /// Kahn's algorithm; on a cycle returns the modules that could not be placed
    fn topological_sort(dependencies: &BTreeMap<&str, Vec<&str>>) -> Result<Vec<String>, Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (&module, deps) in dependencies {
            in_degree.insert(module, deps.len());
            for &dep in deps {
                dependents.entry(dep).or_default().push(module);
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(module, _)| *module)
            .collect();

        let mut result = Vec::with_capacity(dependencies.len());
        while let Some(module) = queue.pop_front() {
            result.push(module.to_string());

            if let Some(children) = dependents.get(module) {
                let mut ready = Vec::new();
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(*child);
                        }
                    }
                }
                ready.sort_unstable();
                queue.extend(ready);
            }
        }

        if result.len() != dependencies.len() {
            let stuck = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(module, _)| module.to_string())
                .collect();
            return Err(stuck);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meta(name: &str, deps: &[&str]) -> ModuleMetadata {
        deps.iter().fold(ModuleMetadata::new(name, "1.0.0"), |m, d| {
            m.with_dependency(*d, "1.0.0")
        })
    }

    #[test]
    fn test_validate_names_missing_module() {
        let shop = meta("shop", &["users", "payments"]);
        let err = ModuleDependencies::validate(&shop, |name| name == "users").unwrap_err();
        match err {
            ModuleError::Dependency { module, missing } => {
                assert_eq!(module, "shop");
                assert_eq!(missing, "payments");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ModuleDependencies::validate(&shop, |_| true).is_ok());
    }

    #[test]
    fn test_load_order_puts_dependencies_first() {
        let shop = meta("shop", &["users", "payments"]);
        let payments = meta("payments", &["users"]);
        let users = meta("users", &[]);
        let blog = meta("blog", &["core-auth"]);

        let order = ModuleDependencies::load_order(
            &[&shop, &payments, &users, &blog],
            |name| name == "core-auth",
        )
        .unwrap();
        assert_eq!(order, vec!["blog", "users", "payments", "shop"]);
    }

    #[test]
    fn test_load_order_missing_dependency() {
        let shop = meta("shop", &["users"]);
        let err = ModuleDependencies::load_order(&[&shop], |_| false).unwrap_err();
        assert!(matches!(err, ModuleError::Dependency { ref missing, .. } if missing == "users"));
    }

    #[test]
    fn test_load_order_cycle() {
        let a = meta("a", &["b"]);
        let b = meta("b", &["a"]);
        let c = meta("c", &[]);
        let err = ModuleDependencies::load_order(&[&a, &b, &c], |_| false).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidDefinition(ref msg) if msg.contains("a, b")));
    }

    proptest! {
        // Each module i may only depend on modules with a smaller index, so the
        // graph is acyclic; the computed order must respect every edge.
        #[test]
        fn prop_order_respects_edges(edges in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 0..8), 1..8)) {
            let names: Vec<String> = (0..edges.len()).map(|i| format!("m{i}")).collect();
            let metas: Vec<ModuleMetadata> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let deps: Vec<&str> = edges[i]
                        .iter()
                        .enumerate()
                        .filter(|(j, &on)| on && *j < i)
                        .map(|(j, _)| names[j].as_str())
                        .collect();
                    meta(name, &deps)
                })
                .collect();
            let refs: Vec<&ModuleMetadata> = metas.iter().collect();

            let order = ModuleDependencies::load_order(&refs, |_| false).unwrap();
            prop_assert_eq!(order.len(), metas.len());
            let position = |n: &str| order.iter().position(|o| o == n).unwrap();
            for m in &metas {
                for dep in m.required_modules() {
                    prop_assert!(position(dep) < position(&m.name));
                }
            }
        }
    }
}
