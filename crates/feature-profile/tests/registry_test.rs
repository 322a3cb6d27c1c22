//! Loading profile directories from disk.

use feature_profile::{bundled, FeatureId, ProfileError, ProfileRegistry, PROFILE_FILE_NAME};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_profile(root: &Path, dir: &str, text: &str) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(PROFILE_FILE_NAME), text).unwrap();
}

#[test]
fn test_load_shipped_profiles_directory() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles");
    let registry = ProfileRegistry::load_dir(&root).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(registry.check().is_empty());
    let order = registry.resolve(&FeatureId::new("bgp", 1)).unwrap();
    assert_eq!(
        order,
        vec![FeatureId::new("interfaces", 1), FeatureId::new("bgp", 1)]
    );
}

#[test]
fn test_load_nested_directories_and_ignore_other_files() {
    let tmp = TempDir::new().unwrap();
    write_profile(tmp.path(), "interfaces", bundled::INTERFACES);
    write_profile(tmp.path(), "routing/bgp", bundled::BGP);
    fs::write(tmp.path().join("README.md"), "not a profile").unwrap();

    let registry = ProfileRegistry::load_dir(tmp.path()).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.latest("bgp").is_some());
}

#[test]
fn test_missing_dependency_reported() {
    let tmp = TempDir::new().unwrap();
    write_profile(tmp.path(), "bgp", bundled::BGP);

    let registry = ProfileRegistry::load_dir(tmp.path()).unwrap();
    let problems = registry.check();
    assert_eq!(problems.len(), 1);
    assert!(matches!(
        problems[0],
        ProfileError::MissingDependency { ref missing, .. } if missing.name == "interfaces"
    ));
}

#[test]
fn test_malformed_profile_fails_load() {
    let tmp = TempDir::new().unwrap();
    write_profile(tmp.path(), "broken", "id { name: \"broken\" version: 1 \n");
    assert!(matches!(
        ProfileRegistry::load_dir(tmp.path()),
        Err(ProfileError::Parse { .. })
    ));

    assert!(matches!(
        ProfileRegistry::load_dir(&tmp.path().join("absent")),
        Err(ProfileError::Io { .. })
    ));
}

#[test]
fn test_support_check_against_device_paths() {
    let registry = bundled::registry().unwrap();
    let bgp = registry.latest("bgp").unwrap();

    let everything: BTreeSet<String> = ["/network-instances".to_string()].into_iter().collect();
    assert!(bgp.check_support(&everything).is_fully_supported());

    let config_only: BTreeSet<String> = [
        "/network-instances/network-instance/protocols/protocol/bgp/global/config".to_string(),
        "/network-instances/network-instance/protocols/protocol/bgp/peer-groups".to_string(),
        "/network-instances/network-instance/protocols/protocol/bgp/neighbors/neighbor/config"
            .to_string(),
    ]
    .into_iter()
    .collect();
    let report = bgp.check_support(&config_only);
    assert!(!report.is_fully_supported());
    assert_eq!(report.unsupported_telemetry.len(), bgp.telemetry_paths.len());
    assert!(report
        .unsupported_config
        .iter()
        .all(|p| p.contains("/global/graceful-restart/")
            || p.contains("/global/afi-safis/")
            || p.contains("/global/use-multiple-paths/")
            || p.contains("/neighbors/neighbor/transport/")
            || p.contains("/neighbors/neighbor/ebgp-multihop/")
            || p.contains("/neighbors/neighbor/afi-safis/")));
}
