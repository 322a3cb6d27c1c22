//! A set of loaded profiles with dependency resolution.

use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::{ProfileError, Result};
use crate::profile::{FeatureId, FeatureProfile};

/// File name of a profile inside its feature directory.
pub const PROFILE_FILE_NAME: &str = "feature.textproto";

/// Profiles keyed by their id.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<FeatureId, FeatureProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `<dir>/**/feature.textproto` below `root`.
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_recursive(root)?;
        info!(
            "ProfileRegistry: loaded {} profiles from {}",
            registry.len(),
            root.display()
        );
        Ok(registry)
    }

    fn load_recursive(&mut self, dir: &Path) -> Result<()> {
        let io_err = |source| ProfileError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries: Vec<_> = fs::read_dir(dir)
            .map_err(io_err)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(io_err)?;
        entries.sort_by_key(|e| e.path());

        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                self.load_recursive(&path)?;
            } else if path.file_name().is_some_and(|n| n == PROFILE_FILE_NAME) {
                let text = fs::read_to_string(&path).map_err(|source| ProfileError::Io {
                    path: path.clone(),
                    source,
                })?;
                debug!("ProfileRegistry: parsing {}", path.display());
                self.insert(FeatureProfile::from_textproto(&text)?)?;
            }
        }
        Ok(())
    }

    /// Adds a profile; a second profile with the same id is an error.
    pub fn insert(&mut self, profile: FeatureProfile) -> Result<()> {
        if self.profiles.contains_key(&profile.id) {
            return Err(ProfileError::Duplicate(profile.id));
        }
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn get(&self, id: &FeatureId) -> Option<&FeatureProfile> {
        self.profiles.get(id)
    }

    /// Latest version of the named profile.
    pub fn latest(&self, name: &str) -> Option<&FeatureProfile> {
        self.profiles
            .values()
            .filter(|p| p.id.name == name)
            .max_by_key(|p| p.id.version)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.profiles.keys()
    }

    /// Returns `id` and everything it depends on, dependencies first.
    pub fn resolve(&self, id: &FeatureId) -> Result<Vec<FeatureId>> {
        if !self.profiles.contains_key(id) {
            return Err(ProfileError::NotFound(id.clone()));
        }
        let mut order = Vec::new();
        let mut done = BTreeSet::new();
        let mut stack = Vec::new();
        self.visit(id, &mut stack, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        id: &FeatureId,
        stack: &mut Vec<FeatureId>,
        done: &mut BTreeSet<FeatureId>,
        order: &mut Vec<FeatureId>,
    ) -> Result<()> {
        if done.contains(id) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|s| s == id) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(id.clone());
            return Err(ProfileError::DependencyCycle(cycle));
        }

        let profile = self
            .profiles
            .get(id)
            .ok_or_else(|| ProfileError::NotFound(id.clone()))?;
        stack.push(id.clone());
        for dep in &profile.dependencies {
            if !self.profiles.contains_key(dep) {
                return Err(ProfileError::MissingDependency {
                    profile: id.clone(),
                    missing: dep.clone(),
                });
            }
            self.visit(dep, stack, done, order)?;
        }
        stack.pop();

        done.insert(id.clone());
        order.push(id.clone());
        Ok(())
    }

    /// Resolves every profile, collecting all problems.
    pub fn check(&self) -> Vec<ProfileError> {
        self.profiles
            .keys()
            .filter_map(|id| self.resolve(id).err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(name: &str, deps: &[(&str, u32)]) -> FeatureProfile {
        FeatureProfile {
            id: FeatureId::new(name, 1),
            config_paths: Vec::new(),
            telemetry_paths: Vec::new(),
            dependencies: deps.iter().map(|(n, v)| FeatureId::new(*n, *v)).collect(),
        }
    }

    #[test]
    fn test_resolve_dependencies_first() {
        let mut registry = ProfileRegistry::new();
        registry.insert(profile("bgp", &[("interfaces", 1)])).unwrap();
        registry.insert(profile("interfaces", &[])).unwrap();

        let order = registry.resolve(&FeatureId::new("bgp", 1)).unwrap();
        assert_eq!(
            order,
            vec![FeatureId::new("interfaces", 1), FeatureId::new("bgp", 1)]
        );
        assert!(registry.check().is_empty());
    }

    #[test]
    fn test_missing_dependency() {
        let mut registry = ProfileRegistry::new();
        registry.insert(profile("bgp", &[("interfaces", 1)])).unwrap();
        let err = registry.resolve(&FeatureId::new("bgp", 1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Profile bgp/v1 depends on interfaces/v1 which is not loaded"
        );
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = ProfileRegistry::new();
        registry.insert(profile("a", &[("b", 1)])).unwrap();
        registry.insert(profile("b", &[("a", 1)])).unwrap();
        let err = registry.resolve(&FeatureId::new("a", 1)).unwrap_err();
        assert_eq!(err.to_string(), "Dependency cycle: a/v1 -> b/v1 -> a/v1");
        assert_eq!(registry.check().len(), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ProfileRegistry::new();
        registry.insert(profile("a", &[])).unwrap();
        assert!(matches!(
            registry.insert(profile("a", &[])),
            Err(ProfileError::Duplicate(_))
        ));
    }
}
