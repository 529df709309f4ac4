use super::required_str;
use crate::client::retry::RetryPolicy;
use async_trait::async_trait;
use domain::dynamic::{CreateResult, DynamicProvider, ResolvedInputs, UpdateResult};
use domain::error::{Result, SynthError};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// e.g. `/hostedzone/Z2FDTNDATAQYW2`
    pub id: String,
    /// Fully qualified, e.g. `example.com.`
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ZonePage {
    pub zones: Vec<HostedZone>,
    pub next_marker: Option<String>,
}

/// Paginated listing of DNS zones.
#[async_trait]
pub trait DnsZoneApi: Send + Sync {
    async fn list_zones(&self, marker: Option<&str>) -> Result<ZonePage>;
}

/// Finds the zone id for a domain: the zone with the longest name the
/// domain falls under.
pub struct HostedZoneLookup {
    api: Arc<dyn DnsZoneApi>,
    retry: RetryPolicy,
}

impl HostedZoneLookup {
    pub const NAME: &'static str = "HostedZoneLookup";

    pub fn new(api: Arc<dyn DnsZoneApi>) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn lookup(&self, domain: &str) -> Result<HostedZone> {
        let domain = normalize(domain);
        let mut best: Option<HostedZone> = None;
        let mut marker: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let page = self
                .retry
                .execute("ListHostedZones", || self.api.list_zones(marker.as_deref()))
                .await?;

            for zone in page.zones {
                let name = normalize(&zone.name);
                let matches = domain == name || domain.ends_with(&format!(".{}", name));
                let longer = best
                    .as_ref()
                    .map_or(true, |b| normalize(&b.name).len() < name.len());
                if matches && longer {
                    best = Some(zone);
                }
            }

            match page.next_marker {
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(SynthError::backend(
                        "PaginationLoop",
                        format!("ListHostedZones returned marker '{}' twice", next),
                    ));
                }
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        debug!("Resolved hosted zone for {}: {:?}", domain, best);
        best.ok_or_else(|| SynthError::not_found("hosted zone", domain))
    }

    async fn outputs(&self, inputs: &ResolvedInputs) -> Result<(String, Map<String, Value>)> {
        let zone = self.lookup(required_str(inputs, "domain")?).await?;
        let zone_id = zone.id.trim_start_matches("/hostedzone/").to_string();

        let mut outputs = Map::new();
        outputs.insert("zoneId".into(), Value::String(zone_id.clone()));
        outputs.insert("zoneName".into(), Value::String(normalize(&zone.name)));
        Ok((zone_id, outputs))
    }
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_lowercase()
}

#[async_trait]
impl DynamicProvider for HostedZoneLookup {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn create(&self, inputs: &ResolvedInputs) -> Result<CreateResult> {
        let (id, outputs) = self.outputs(inputs).await?;
        Ok(CreateResult { id, outputs })
    }

    async fn update(&self, _id: &str, _old: &ResolvedInputs, new: &ResolvedInputs) -> Result<UpdateResult> {
        let (_, outputs) = self.outputs(new).await?;
        Ok(UpdateResult { outputs })
    }
}
