use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use bluer::Address;
use log::warn;

use crate::bluetooth::scanner::DEFAULT_SCAN_TIMEOUT;
use crate::error::RelayError;
use crate::osc::relay::{DEFAULT_MAX_HR, DEFAULT_MIN_HR};

const DEFAULT_OSC_PORT: u16 = 9000;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub osc_target: SocketAddr,
    pub min_hr: u16,
    pub max_hr: u16,
    pub device_address: Option<Address>,
    pub device_name: Option<String>,
    pub scan_timeout: Duration,
}

impl RelayConfig {
    pub fn new() -> Result<Self, RelayError> {
        // Load environment variables
        dotenv::dotenv().ok();

        let host = parse_var::<IpAddr>("OSC_HOST")?.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let port = parse_var::<u16>("OSC_PORT")?.unwrap_or(DEFAULT_OSC_PORT);
        let min_hr = parse_var::<u16>("HR_MIN")?.unwrap_or(DEFAULT_MIN_HR);
        let max_hr = parse_var::<u16>("HR_MAX")?.unwrap_or(DEFAULT_MAX_HR);
        let device_address = parse_var::<Address>("DEVICE_ADDRESS")?;
        let device_name = parse_var::<String>("DEVICE_NAME")?;
        let scan_timeout = parse_var::<u64>("SCAN_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SCAN_TIMEOUT);

        if min_hr >= max_hr {
            warn!(
                "HR_MIN {} is not below HR_MAX {}; percent output will pin to 0",
                min_hr, max_hr
            );
        }

        Ok(RelayConfig {
            osc_target: SocketAddr::new(host, port),
            min_hr,
            max_hr,
            device_address,
            device_name,
            scan_timeout,
        })
    }
}

/// Read and parse an optional environment variable. Unset or blank
/// variables yield None; anything else must parse or configuration fails.
fn parse_var<T>(name: &str) -> Result<Option<T>, RelayError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => {
            let value = value.trim();
            if value.is_empty() {
                return Ok(None);
            }
            value
                .parse()
                .map(Some)
                .map_err(|e| RelayError::Config(format!("invalid {}: {}", name, e)))
        }
        Err(_) => Ok(None),
    }
}
