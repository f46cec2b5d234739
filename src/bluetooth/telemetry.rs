/// Heart-rate telemetry from a connected GATT session
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, Address, Device, Uuid};

use crate::error::RelayError;
use crate::models::HeartRateSample;

// GATT Heart Rate service and its measurement characteristic
const HEART_RATE_SERVICE: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
const HEART_RATE_MEASUREMENT: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// Samples buffered between the notification task and the relay; the
/// producer awaits once the relay falls this far behind.
pub const SAMPLE_CHANNEL_CAPACITY: usize = 10;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connect to the matched peripheral, retrying transient BlueZ failures.
pub async fn connect(adapter: &Adapter, address: Address) -> Result<Device, RelayError> {
    let device = adapter.device(address)?;

    let mut attempt = 0;
    loop {
        if device.is_connected().await? {
            return Ok(device);
        }

        match device.connect().await {
            Ok(()) => return Ok(device),
            Err(e) => {
                attempt += 1;
                if attempt >= CONNECT_ATTEMPTS {
                    return Err(e.into());
                }
                warn!("Connection attempt {} failed: {}", attempt, e);
                sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
}

/// Locate the Heart Rate Measurement characteristic on a connected device.
pub async fn heart_rate_characteristic(device: &Device) -> Result<Characteristic, RelayError> {
    for service in device.services().await? {
        if service.uuid().await? != HEART_RATE_SERVICE {
            continue;
        }
        for characteristic in service.characteristics().await? {
            if characteristic.uuid().await? == HEART_RATE_MEASUREMENT {
                return Ok(characteristic);
            }
        }
    }

    Err(RelayError::MissingHeartRateCharacteristic)
}

/// Decode a GATT Heart Rate Measurement payload into a sample
///
/// The measurement characteristic (0x2A37) carries:
/// - Byte 0: flags; bit 0 selects the heart-rate value width
/// - Bytes 1..: heart rate as u8, or as u16 little-endian when bit 0 is set
///
/// # Returns
/// Some(HeartRateSample) if decoding succeeds, None if the payload is
/// shorter than its flags require
pub fn decode_heart_rate(payload: &[u8]) -> Option<HeartRateSample> {
    let flags = *payload.first()?;

    let bpm = if flags & 0x01 == 0 {
        u16::from(*payload.get(1)?)
    } else {
        u16::from_le_bytes([*payload.get(1)?, *payload.get(2)?])
    };

    Some(HeartRateSample { bpm })
}

/// Subscribe to measurement notifications and forward decoded samples into
/// the relay channel.
///
/// Runs until the peripheral disconnects (the notification stream ends),
/// the receiving side is dropped, or `cancel` fires.
pub async fn stream_heart_rate(
    characteristic: Characteristic,
    samples: mpsc::Sender<HeartRateSample>,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    let notifications = characteristic.notify().await?;
    tokio::pin!(notifications);

    info!("Listening for heart-rate notifications");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            payload = notifications.next() => match payload {
                Some(payload) => match decode_heart_rate(&payload) {
                    Some(sample) => {
                        debug!("Received sample: {} bpm", sample.bpm);
                        if samples.send(sample).await.is_err() {
                            // Relay is gone, nothing left to feed
                            break;
                        }
                    }
                    None => warn!("Ignoring malformed heart-rate payload: {:?}", payload),
                },
                None => {
                    info!("Notification stream ended");
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_eight_bit_heart_rate() {
        assert_eq!(
            decode_heart_rate(&[0x00, 72]),
            Some(HeartRateSample { bpm: 72 })
        );
    }

    #[test]
    fn decodes_sixteen_bit_heart_rate() {
        assert_eq!(
            decode_heart_rate(&[0x01, 0x2c, 0x01]),
            Some(HeartRateSample { bpm: 300 })
        );
    }

    #[test]
    fn sixteen_bit_value_is_little_endian() {
        // Flags with unrelated bits set; bit 0 still selects the width
        assert_eq!(
            decode_heart_rate(&[0x11, 0x48, 0x00]),
            Some(HeartRateSample { bpm: 72 })
        );
    }

    #[test]
    fn rejects_truncated_payloads() {
        assert_eq!(decode_heart_rate(&[]), None);
        assert_eq!(decode_heart_rate(&[0x00]), None);
        assert_eq!(decode_heart_rate(&[0x01, 0x48]), None);
    }
}
