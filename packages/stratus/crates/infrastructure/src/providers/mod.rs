pub mod distribution;
pub mod function_code;
pub mod hosted_zone;

pub use distribution::{CdnApi, DistributionDeployWaiter};
pub use function_code::{FunctionApi, FunctionCodeUpdater};
pub use hosted_zone::{DnsZoneApi, HostedZone, HostedZoneLookup, ZonePage};

use domain::dynamic::ResolvedInputs;
use domain::error::{Result, SynthError};

pub(crate) fn required_str<'a>(inputs: &'a ResolvedInputs, key: &str) -> Result<&'a str> {
    match inputs.get(key).and_then(|v| v.as_str()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SynthError::invalid_input(
            key,
            inputs.get(key).map(|v| v.to_string()).unwrap_or_default(),
            "a non-empty string is required",
        )),
    }
}
