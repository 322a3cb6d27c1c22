//! The `FeatureProfile` message.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ProfileError, Result};
use crate::path::{covers, validate_path};
use crate::textproto::{Message, Value};

/// Name and version identifying a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId {
    pub name: String,
    pub version: u32,
}

impl FeatureId {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/v{}", self.name, self.version)
    }
}

/// The configuration and telemetry paths a feature needs, and the features
/// it builds on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureProfile {
    pub id: FeatureId,
    pub config_paths: Vec<String>,
    pub telemetry_paths: Vec<String>,
    pub dependencies: Vec<FeatureId>,
}

impl FeatureProfile {
    /// Parses a `feature.textproto` document and validates its paths.
    pub fn from_textproto(input: &str) -> Result<Self> {
        let message = Message::parse(input)?;
        let profile = Self::from_message(&message)?;
        profile.validate()?;
        debug!(
            "FeatureProfile: loaded {} ({} config, {} telemetry paths)",
            profile.id,
            profile.config_paths.len(),
            profile.telemetry_paths.len()
        );
        Ok(profile)
    }

    fn from_message(message: &Message) -> Result<Self> {
        let mut id = None;
        let mut config_paths = Vec::new();
        let mut telemetry_paths = Vec::new();
        let mut dependencies = Vec::new();

        for field in &message.fields {
            match field.name.as_str() {
                "id" => id = Some(feature_id(&field.value, "id")?),
                "config_path" => config_paths.push(path_field(&field.value, "config_path")?),
                "telemetry_path" => {
                    telemetry_paths.push(path_field(&field.value, "telemetry_path")?)
                }
                "feature_profile_dependency" => dependencies.push(feature_id(
                    &field.value,
                    "feature_profile_dependency",
                )?),
                other => {
                    return Err(ProfileError::UnknownField {
                        field: other.to_string(),
                        context: "FeatureProfile".to_string(),
                    })
                }
            }
        }

        Ok(Self {
            id: id.ok_or_else(|| ProfileError::MissingField("id".to_string()))?,
            config_paths,
            telemetry_paths,
            dependencies,
        })
    }

    /// Checks every path is a valid schema path.
    pub fn validate(&self) -> Result<()> {
        if self.id.name.is_empty() {
            return Err(ProfileError::MissingField("id.name".to_string()));
        }
        for path in self.config_paths.iter().chain(&self.telemetry_paths) {
            validate_path(path)?;
        }
        Ok(())
    }

    /// Reports which of this profile's paths a device does not support.
    ///
    /// A supported path covers itself and everything below it.
    pub fn check_support(&self, supported: &BTreeSet<String>) -> SupportReport {
        let missing = |paths: &[String]| -> Vec<String> {
            paths
                .iter()
                .filter(|p| !supported.iter().any(|s| covers(s, p)))
                .cloned()
                .collect()
        };
        SupportReport {
            profile: self.id.clone(),
            unsupported_config: missing(&self.config_paths),
            unsupported_telemetry: missing(&self.telemetry_paths),
        }
    }
}

/// Result of [`FeatureProfile::check_support`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportReport {
    pub profile: FeatureId,
    pub unsupported_config: Vec<String>,
    pub unsupported_telemetry: Vec<String>,
}

impl SupportReport {
    pub fn is_fully_supported(&self) -> bool {
        self.unsupported_config.is_empty() && self.unsupported_telemetry.is_empty()
    }
}

fn message<'a>(value: &'a Value, context: &str) -> Result<&'a Message> {
    match value {
        Value::Message(m) => Ok(m),
        Value::Scalar { .. } => Err(ProfileError::Parse {
            line: 0,
            message: format!("{} must be a message", context),
        }),
    }
}

fn string_scalar(value: &Value, context: &str) -> Result<String> {
    match value {
        Value::Scalar { text, quoted: true } => Ok(text.clone()),
        _ => Err(ProfileError::Parse {
            line: 0,
            message: format!("{} must be a string", context),
        }),
    }
}

fn feature_id(value: &Value, context: &str) -> Result<FeatureId> {
    let msg = message(value, context)?;
    let mut name = None;
    let mut version = None;
    for field in &msg.fields {
        match (field.name.as_str(), &field.value) {
            ("name", v) => name = Some(string_scalar(v, &format!("{}.name", context))?),
            ("version", Value::Scalar { text, quoted: false }) => {
                version = Some(text.parse::<u32>().map_err(|e| ProfileError::Parse {
                    line: field.line,
                    message: format!("{}.version: {}", context, e),
                })?)
            }
            ("version", _) => {
                return Err(ProfileError::Parse {
                    line: field.line,
                    message: format!("{}.version must be an integer", context),
                })
            }
            (other, _) => {
                return Err(ProfileError::UnknownField {
                    field: other.to_string(),
                    context: context.to_string(),
                })
            }
        }
    }
    Ok(FeatureId {
        name: name.ok_or_else(|| ProfileError::MissingField(format!("{}.name", context)))?,
        version: version
            .ok_or_else(|| ProfileError::MissingField(format!("{}.version", context)))?,
    })
}

fn path_field(value: &Value, context: &str) -> Result<String> {
    let msg = message(value, context)?;
    let mut path = None;
    for field in &msg.fields {
        match field.name.as_str() {
            "path" => path = Some(string_scalar(&field.value, &format!("{}.path", context))?),
            other => {
                return Err(ProfileError::UnknownField {
                    field: other.to_string(),
                    context: context.to_string(),
                })
            }
        }
    }
    path.ok_or_else(|| ProfileError::MissingField(format!("{}.path", context)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        id { name: "sample" version: 2 }
        config_path { path: "/interfaces/interface/config/mtu" }
        telemetry_path { path: "/interfaces/interface/state/oper-status" }
        feature_profile_dependency { name: "base" version: 1 }
    "#;

    #[test]
    fn test_parse_profile() {
        let profile = FeatureProfile::from_textproto(SAMPLE).unwrap();
        assert_eq!(profile.id, FeatureId::new("sample", 2));
        assert_eq!(profile.config_paths, vec!["/interfaces/interface/config/mtu"]);
        assert_eq!(profile.dependencies, vec![FeatureId::new("base", 1)]);
        assert_eq!(profile.id.to_string(), "sample/v2");
    }

    #[test]
    fn test_missing_id_rejected() {
        let err = FeatureProfile::from_textproto(r#"config_path { path: "/a" }"#).unwrap_err();
        assert!(matches!(err, ProfileError::MissingField(ref f) if f == "id"));
    }

    #[test]
    fn test_invalid_path_rejected() {
        let err = FeatureProfile::from_textproto(
            r#"id { name: "x" version: 1 } telemetry_path { path: "state/counters" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidPath { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = FeatureProfile::from_textproto(
            r#"id { name: "x" version: 1 owner: "me" }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("owner"));
        assert!(FeatureProfile::from_textproto(r#"id { name: "x" version: "1" }"#).is_err());
    }

    #[test]
    fn test_check_support() {
        let profile = FeatureProfile::from_textproto(SAMPLE).unwrap();
        let supported: BTreeSet<String> = ["/interfaces/interface/config".to_string()]
            .into_iter()
            .collect();
        let report = profile.check_support(&supported);
        assert!(!report.is_fully_supported());
        assert!(report.unsupported_config.is_empty());
        assert_eq!(
            report.unsupported_telemetry,
            vec!["/interfaces/interface/state/oper-status"]
        );
    }
}
