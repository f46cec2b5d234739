/// Stateful relay from heart-rate samples to avatar parameters
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::models::HeartRateSample;
use crate::osc::client::OscClient;
use crate::utils::{bipolar_percent, heart_rate_percent};

pub const DEFAULT_MIN_HR: u16 = 32;
pub const DEFAULT_MAX_HR: u16 = 192;

/// BlueZ supervises the link with a 30 second timeout; the status
/// re-assertion interval must stay inside that window.
pub const SUPERVISION_TIMEOUT: Duration = Duration::from_secs(30);
pub const STATUS_INTERVAL: Duration = Duration::from_secs(29);
pub const BEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Relays heart-rate samples to the avatar as OSC parameters.
///
/// One instance owns the outbound client and all mutable relay state.
/// [`OscRelay::run`] processes exactly one event at a time, so the state
/// needs no synchronization.
pub struct OscRelay {
    client: OscClient,
    min_hr: u16,
    max_hr: u16,
    is_connected: bool,
    is_beating: bool,
}

impl OscRelay {
    pub fn new(client: OscClient, min_hr: u16, max_hr: u16) -> Self {
        Self {
            client,
            min_hr,
            max_hr,
            // The relay only runs on an established connection
            is_connected: true,
            is_beating: true,
        }
    }

    /// Process events until the sample channel closes or `cancel` fires,
    /// then send the zeroing burst exactly once.
    pub async fn run(
        mut self,
        mut samples: mpsc::Receiver<HeartRateSample>,
        cancel: CancellationToken,
    ) {
        let start = Instant::now();
        // First tick one full period after start, like a ticker
        let mut status_timer = interval_at(start + STATUS_INTERVAL, STATUS_INTERVAL);
        let mut beat_timer = interval_at(start + BEAT_INTERVAL, BEAT_INTERVAL);

        self.send_status().await;

        loop {
            tokio::select! {
                _ = status_timer.tick() => self.send_status().await,
                _ = beat_timer.tick() => self.handle_beat_tick().await,
                sample = samples.recv() => match sample {
                    Some(sample) => self.handle_sample(sample).await,
                    None => {
                        info!("Sample stream closed");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    info!("Relay cancelled");
                    break;
                }
            }
        }

        self.send_zero().await;
    }

    /// Re-assert connected/active so downstream staleness checks never
    /// trip on a quiet link.
    async fn send_status(&self) {
        if let Err(e) = self.client.send_bool("isHRConnected", self.is_connected).await {
            error!("Failed to send connected status: {}", e);
        }
        if let Err(e) = self.client.send_bool("isHRActive", true).await {
            error!("Failed to send active status: {}", e);
        }
    }

    /// Emit the current beat flag, then let it decay until the next sample.
    async fn handle_beat_tick(&mut self) {
        if let Err(e) = self.client.send_bool("isHRBeat", self.is_beating).await {
            error!("Failed to send beat flag: {}", e);
        }
        self.is_beating = false;
    }

    async fn handle_sample(&mut self, sample: HeartRateSample) {
        debug!("HR: {} bpm", sample.bpm);
        self.is_beating = true;

        if let Err(e) = self.send_heart_rate(sample.bpm).await {
            error!("Failed to send heart rate: {}", e);
        }
    }

    /// Send the raw value and both normalized forms. Failures are
    /// collected per batch; the relay loop carries on regardless.
    async fn send_heart_rate(&self, bpm: u16) -> Result<(), RelayError> {
        let percent = heart_rate_percent(self.min_hr, self.max_hr, bpm);

        let results = vec![
            self.client.send_int("HR", i32::from(bpm)).await,
            self.client.send_float("HRPercent", percent as f32).await,
            self.client
                .send_float("FullHRPercent", bipolar_percent(percent) as f32)
                .await,
        ];

        collect_send_errors(results)
    }

    /// Zero every parameter so the avatar never freezes on stale values.
    async fn send_zero(&mut self) {
        self.is_beating = false;

        let results = vec![
            self.client.send_bool("isHRConnected", false).await,
            self.client.send_bool("isHRActive", false).await,
            self.client.send_bool("isHRBeat", false).await,
            self.client.send_int("HR", 0).await,
            self.client.send_float("HRPercent", 0.0).await,
            self.client.send_float("FullHRPercent", 0.0).await,
        ];

        if let Err(e) = collect_send_errors(results) {
            error!("Failed to send zeroing burst: {}", e);
        }
    }
}

/// Combine the failures of one outbound batch into a single diagnostic.
fn collect_send_errors(results: Vec<Result<(), RelayError>>) -> Result<(), RelayError> {
    let failures: Vec<String> = results
        .into_iter()
        .filter_map(|result| result.err().map(|e| e.to_string()))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(RelayError::Send(failures.join("; ")))
    }
}
