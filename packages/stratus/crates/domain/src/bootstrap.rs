use crate::error::Result;
use crate::naming::{hash_number_to_pretty_string, PRETTY_CHARS};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Well-known parameter the record is discovered through.
pub const PARAMETER_KEY: &str = "/stratus/bootstrap/asset";

pub const VERSION: u32 = 1;

/// Name of the shared container repository.
pub const REPOSITORY_NAME: &str = "stratus-asset";

const BUCKET_SUFFIX_LENGTH: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    pub registry_id: String,
    pub url: String,
}

/// Shared backing infrastructure provisioned once per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapRecord {
    pub version: u32,
    pub bucket: String,
    #[serde(rename = "ecr")]
    pub registry: Option<RegistryRecord>,
}

impl BootstrapRecord {
    /// A complete record, or `None` for anything malformed or partial.
    pub fn parse(raw: &str) -> Option<Self> {
        BootstrapDraft::parse(raw).complete()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Whatever a previous, possibly interrupted, bootstrap left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BootstrapDraft {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default, rename = "ecr")]
    pub registry: Option<RegistryRecord>,
}

impl BootstrapDraft {
    /// Lenient parse: unreadable data is an empty draft.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    pub fn complete(self) -> Option<BootstrapRecord> {
        match self {
            BootstrapDraft {
                version: Some(version),
                bucket: Some(bucket),
                registry: Some(registry),
            } if version > 0 && !bucket.is_empty() => Some(BootstrapRecord {
                version,
                bucket,
                registry: Some(registry),
            }),
            _ => None,
        }
    }
}

/// `stratus-asset-{12 pretty chars}`; bucket names share one global namespace.
pub fn generate_bucket_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let floor = (PRETTY_CHARS.len() as u64).pow(BUCKET_SUFFIX_LENGTH);
    let number = rng.gen_range(floor..floor.saturating_mul(2));
    format!(
        "stratus-asset-{}",
        hash_number_to_pretty_string(number, BUCKET_SUFFIX_LENGTH as usize)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_complete_record() {
        let raw = r#"{"version":1,"bucket":"stratus-asset-abc","ecr":{"registryId":"123","url":"123.dkr/stratus-asset"}}"#;
        let record = BootstrapRecord::parse(raw).unwrap();
        assert_eq!(record.bucket, "stratus-asset-abc");
        assert_eq!(record.registry.unwrap().registry_id, "123");
    }

    #[test]
    fn test_malformed_or_partial_is_not_found() {
        assert!(BootstrapRecord::parse("not json").is_none());
        assert!(BootstrapRecord::parse("{}").is_none());
        assert!(BootstrapRecord::parse(r#"{"version":1,"bucket":"b"}"#).is_none());
        assert!(BootstrapRecord::parse(r#"["bucket"]"#).is_none());
    }

    #[test]
    fn test_partial_draft_keeps_bucket() {
        let draft = BootstrapDraft::parse(r#"{"bucket":"stratus-asset-abc"}"#);
        assert_eq!(draft.bucket.as_deref(), Some("stratus-asset-abc"));
        assert!(draft.registry.is_none());
    }

    #[test]
    fn test_round_trip_through_json() {
        let record = BootstrapRecord {
            version: VERSION,
            bucket: "stratus-asset-x".into(),
            registry: Some(RegistryRecord {
                registry_id: "1".into(),
                url: "u".into(),
            }),
        };
        assert_eq!(BootstrapRecord::parse(&record.to_json().unwrap()), Some(record));
    }

    #[test]
    fn test_bucket_name_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let name = generate_bucket_name(&mut rng);
        let suffix = name.strip_prefix("stratus-asset-").unwrap();
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| PRETTY_CHARS.contains(c)));
        assert_ne!(name, generate_bucket_name(&mut rng));
    }
}
