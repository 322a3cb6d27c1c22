//! Schema path syntax.
//!
//! A path names one node of the management tree:
//! `/network-instances/network-instance[name=DEFAULT]/protocols/...`.
//! Segments may carry a module prefix (`oc-if:interfaces`) and key
//! predicates (`[name=Ethernet0]`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ProfileError, Result};

/// One path segment: optional module prefix, element name, key predicates.
static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[A-Za-z_][A-Za-z0-9_.-]*:)?[A-Za-z_][A-Za-z0-9_.-]*(?:\[[A-Za-z_][A-Za-z0-9_.-]*=[^\]]*\])*$",
    )
    .expect("Invalid regex pattern")
});

/// Splits a path into segments, keeping `/` inside key predicates.
fn segments(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                out.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&path[start..]);
    out
}

/// Checks that `path` is a syntactically valid absolute schema path.
pub fn validate_path(path: &str) -> Result<()> {
    let invalid = |reason: &str| ProfileError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| invalid("must start with '/'"))?;
    if rest.is_empty() {
        return Err(invalid("must name at least one element"));
    }
    for segment in segments(rest) {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !SEGMENT_RE.is_match(segment) {
            return Err(invalid(&format!("malformed segment {:?}", segment)));
        }
    }
    Ok(())
}

/// Removes key predicates, leaving the schema path.
pub fn schema_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// True when `supported` names `path` or one of its ancestors.
pub fn covers(supported: &str, path: &str) -> bool {
    let supported = schema_path(supported);
    let path = schema_path(path);
    let supported = supported.trim_end_matches('/');
    path == supported
        || path
            .strip_prefix(supported)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        for p in [
            "/network-instances/network-instance/protocols/protocol/bgp/global/config/as",
            "/interfaces/interface[name=Ethernet0]/state/counters/in-pkts",
            "/oc-if:interfaces/oc-if:interface",
            "/routing-policy/defined-sets/prefix-sets/prefix-set[name=a/b]/config/mode",
        ] {
            assert!(validate_path(p).is_ok(), "{}", p);
        }
    }

    #[test]
    fn test_invalid_paths() {
        for p in [
            "",
            "/",
            "interfaces/interface",
            "/interfaces//interface",
            "/interfaces/interface/",
            "/interfaces/9interface",
            "/interfaces/interface[name]",
            "/interfaces/inter face",
        ] {
            assert!(validate_path(p).is_err(), "{}", p);
        }
    }

    #[test]
    fn test_covers() {
        assert!(covers("/interfaces", "/interfaces/interface/config/mtu"));
        assert!(covers(
            "/interfaces/interface/config/mtu",
            "/interfaces/interface[name=Ethernet0]/config/mtu"
        ));
        assert!(!covers("/interfaces/interface/config", "/interfaces/interface/configured"));
        assert!(!covers("/interfaces/interface/config/mtu", "/interfaces"));
    }
}
