use bluer::Address;

/// A peripheral observed during discovery: hardware address plus the
/// advertised local name, which may be empty.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub address: Address,
    pub name: String,
}

/// A single heart-rate reading in beats per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateSample {
    pub bpm: u16,
}
