/// Bluetooth Low Energy discovery of the target heart-rate sensor
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use bluer::{Adapter, AdapterEvent, Address};

use crate::error::RelayError;
use crate::models::DiscoveredDevice;

// Polar straps advertise as "Polar H10 XXXXXXXX"
pub const DEVICE_NAME_PREFIX: &str = "Polar H10 ";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Criteria selecting the target peripheral out of a scan.
///
/// Rules apply in priority order: a configured non-zero hardware address
/// matches on equality; otherwise a configured non-empty name must match
/// exactly; otherwise the advertised name must start with
/// [`DEVICE_NAME_PREFIX`]. Criteria are fixed for the lifetime of one scan.
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    pub address: Option<Address>,
    pub name: Option<String>,
}

impl MatchCriteria {
    pub fn matches(&self, candidate: &DiscoveredDevice) -> bool {
        // An all-zero configured address counts as unset
        if let Some(address) = self.address {
            if address != Address::any() && candidate.address == address {
                return true;
            }
        }

        if let Some(name) = self.name.as_deref() {
            if !name.is_empty() {
                return candidate.name == name;
            }
        }

        candidate.name.starts_with(DEVICE_NAME_PREFIX)
    }
}

/// Scan until a device matching `criteria` appears, the timeout elapses,
/// or the relay is cancelled.
///
/// This is a single scan attempt; retry policy belongs to the caller.
/// `Ok(None)` means nothing matched before the timeout, which is an
/// outcome, not an error.
///
/// # Arguments
/// * `adapter` - Powered Bluetooth adapter to scan with
/// * `criteria` - Device selection rules for this scan
/// * `timeout` - Upper bound on scan duration
/// * `cancel` - Process-wide shutdown signal
pub async fn discover(
    adapter: &Adapter,
    criteria: &MatchCriteria,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Option<DiscoveredDevice>, RelayError> {
    // Configure discovery filter for Low Energy devices only
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le, // Bluetooth Low Energy only
        duplicate_data: false,                    // Filter out duplicate advertisements
        ..Default::default()
    };

    // Apply the discovery filter (warn if it fails, but continue)
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    info!(
        "Scanning on {} for up to {} seconds",
        adapter.name(),
        timeout.as_secs()
    );

    let mut events = adapter.discover_devices().await?;
    let deadline = sleep(timeout);
    tokio::pin!(deadline);

    // Dropping the discovery stream stops the underlying scan, so every
    // return path below leaves no discovery activity running.
    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Scan timed out with no matching device");
                return Ok(None);
            }
            _ = cancel.cancelled() => {
                info!("Scan cancelled");
                return Ok(None);
            }
            event = events.next() => match event {
                Some(AdapterEvent::DeviceAdded(address)) => {
                    let device = adapter.device(address)?;
                    let name = device.name().await.ok().flatten().unwrap_or_default();
                    let candidate = DiscoveredDevice { address, name };

                    debug!("Discovered {} ({:?})", candidate.address, candidate.name);

                    if criteria.matches(&candidate) {
                        return Ok(Some(candidate));
                    }
                }
                Some(_) => {}
                None => {
                    warn!("Discovery stream ended unexpectedly");
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(address: &str, name: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            address: address.parse().unwrap(),
            name: name.to_string(),
        }
    }

    #[test]
    fn default_criteria_match_on_family_prefix() {
        let criteria = MatchCriteria::default();

        assert!(criteria.matches(&candidate("A0:9E:1A:00:00:01", "Polar H10 12345678")));
        assert!(!criteria.matches(&candidate("A0:9E:1A:00:00:01", "Polar H9 12345678")));
        // Containment is not a prefix
        assert!(!criteria.matches(&candidate("A0:9E:1A:00:00:01", "My Polar H10 12345678")));
    }

    #[test]
    fn empty_advertised_name_never_matches_default_criteria() {
        let criteria = MatchCriteria::default();
        assert!(!criteria.matches(&candidate("A0:9E:1A:00:00:01", "")));
    }

    #[test]
    fn address_criteria_match_regardless_of_name() {
        let criteria = MatchCriteria {
            address: Some("A0:9E:1A:00:00:01".parse().unwrap()),
            name: None,
        };

        assert!(criteria.matches(&candidate("A0:9E:1A:00:00:01", "")));
        assert!(criteria.matches(&candidate("A0:9E:1A:00:00:01", "Something Else")));
    }

    #[test]
    fn mismatched_address_falls_through_to_later_rules() {
        let criteria = MatchCriteria {
            address: Some("A0:9E:1A:00:00:01".parse().unwrap()),
            name: None,
        };

        // Wrong address, but the prefix rule still applies
        assert!(criteria.matches(&candidate("A0:9E:1A:00:00:02", "Polar H10 12345678")));
        assert!(!criteria.matches(&candidate("A0:9E:1A:00:00:02", "Something Else")));
    }

    #[test]
    fn zero_address_is_treated_as_unset() {
        let criteria = MatchCriteria {
            address: Some(Address::any()),
            name: None,
        };

        // A candidate with an all-zero address must not match on it
        assert!(!criteria.matches(&candidate("00:00:00:00:00:00", "")));
        assert!(criteria.matches(&candidate("00:00:00:00:00:00", "Polar H10 12345678")));
    }

    #[test]
    fn name_criteria_require_exact_equality() {
        let criteria = MatchCriteria {
            address: None,
            name: Some("Polar H10 ABC".to_string()),
        };

        let results: Vec<bool> = ["Polar H10 ABC", "Polar H10 XYZ", ""]
            .iter()
            .map(|name| criteria.matches(&candidate("A0:9E:1A:00:00:01", name)))
            .collect();

        assert_eq!(results, vec![true, false, false]);
    }
}
