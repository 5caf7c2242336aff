// stream/probe.rs
//
// One probe owns one stream URL. Each attempt opens a streaming HTTP GET,
// demuxes a bounded packet window, derives a full Metrics snapshot, and
// installs it atomically.

use std::time::{Duration, Instant, SystemTime};

use tokio::sync::RwLock;
use tracing::debug;

use crate::demux::{Demuxer, FlvTagDemuxer, PacketKind};
use crate::error::ProbeError;
use crate::stream::id::{derive_name, StreamId};
use crate::stream::metrics::{BitrateStability, Metrics, Quality};

/// Sliding bitrate history caps at this many most-recent samples.
const BITRATE_HISTORY_CAP: usize = 10;

struct ProbeState {
    metrics: Metrics,
    bitrate_history: Vec<f64>,
}

pub struct StreamProbe {
    pub stream_id: StreamId,
    name: String,
    client: reqwest::Client,
    sample_duration: Duration,
    min_keyframes: usize,
    state: RwLock<ProbeState>,
}

impl StreamProbe {
    pub fn new(
        stream_id: StreamId,
        client: reqwest::Client,
        sample_duration: Duration,
        min_keyframes: usize,
    ) -> Self {
        let name = derive_name(&stream_id.project, &stream_id.id, &stream_id.url);
        let metrics = Metrics::fresh(
            stream_id.id.clone(),
            stream_id.url.clone(),
            stream_id.project.clone(),
            name.clone(),
        );
        Self {
            stream_id,
            name,
            client,
            sample_duration,
            min_keyframes,
            state: RwLock::new(ProbeState {
                metrics,
                bitrate_history: Vec::with_capacity(BITRATE_HISTORY_CAP),
            }),
        }
    }

    /// One probing attempt. `_deadline` is accepted for parity with the
    /// retry loop that calls this, but the real time bound is the sampling
    /// loop's own `2 * sample_duration` cap below — there is no separate
    /// forced abort.
    pub async fn check(&self, _deadline: Duration) -> Result<(), ProbeError> {
        let req_start = Instant::now();
        let resp = self
            .client
            .get(&self.stream_id.url)
            .send()
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(ProbeError::HttpStatus(resp.status().as_u16()));
        }

        let response_ms = req_start.elapsed().as_millis() as u64;
        let byte_stream = resp.bytes_stream();
        let mut demuxer = FlvTagDemuxer::new(byte_stream);
        self.sample_and_install(&mut demuxer, response_ms).await
    }

    /// Drains the packet source for one sampling window and derives a full
    /// Metrics snapshot. Generic over the packet source so tests can drive
    /// it with a `ScriptedDemuxer` instead of a live HTTP-FLV stream.
    async fn sample_and_install<D: Demuxer>(
        &self,
        demuxer: &mut D,
        response_ms: u64,
    ) -> Result<(), ProbeError> {
        let sample_start = Instant::now();

        let mut total_packets: u64 = 0;
        let mut video_packets: u64 = 0;
        let mut audio_packets: u64 = 0;
        let mut keyframes_seen: u64 = 0;
        let mut total_bytes: u64 = 0;
        let mut has_metadata = false;
        let mut codec = String::new();
        let mut first_dts: Option<i64> = None;
        let mut last_dts: i64 = 0;

        loop {
            let elapsed = sample_start.elapsed();
            if elapsed >= self.sample_duration && keyframes_seen >= self.min_keyframes as u64 {
                break;
            }
            if elapsed >= self.sample_duration * 2 {
                break;
            }

            match demuxer.next_packet().await.map_err(|e| ProbeError::Demux(e.to_string()))? {
                None => break,
                Some(pkt) => {
                    total_packets += 1;
                    total_bytes += pkt.data.len() as u64;

                    match pkt.kind {
                        PacketKind::Video => {
                            video_packets += 1;
                            if first_dts.is_none() {
                                first_dts = Some(pkt.dts_ms);
                            }
                            last_dts = pkt.dts_ms;
                            if pkt.is_keyframe {
                                keyframes_seen += 1;
                            }
                            if codec.is_empty() {
                                codec = "H264".to_string();
                            }
                        }
                        PacketKind::Audio => audio_packets += 1,
                        PacketKind::Metadata => has_metadata = true,
                    }
                }
            }
        }

        if video_packets == 0 {
            return Err(ProbeError::NoVideo);
        }

        let gop_size = if keyframes_seen >= 2 {
            video_packets / keyframes_seen
        } else if keyframes_seen == 1 {
            video_packets
        } else {
            0
        };

        let elapsed_sec = match first_dts {
            Some(fd) if last_dts > fd => (last_dts - fd) as f64 / 1000.0,
            _ => sample_start.elapsed().as_secs_f64(),
        };

        let (framerate, current_bitrate) = if elapsed_sec > 0.0 {
            (
                video_packets as f64 / elapsed_sec,
                8.0 * total_bytes as f64 / elapsed_sec,
            )
        } else {
            (0.0, 0.0)
        };

        let mut state = self.state.write().await;

        let (avg_bitrate, bitrate_stability) = update_bitrate_history(&mut state.bitrate_history, current_bitrate);

        let playable = keyframes_seen >= 2 && video_packets > 10;
        let quality = classify_quality(playable, framerate, current_bitrate);

        debug!(
            stream_id = %self.stream_id.id,
            video_packets,
            keyframes_seen,
            has_metadata,
            framerate,
            current_bitrate,
            "sampling window complete"
        );

        state.metrics = Metrics {
            id: self.stream_id.id.clone(),
            url: self.stream_id.url.clone(),
            project: self.stream_id.project.clone(),
            name: self.name.clone(),
            total_packets,
            video_packets,
            audio_packets,
            keyframes: keyframes_seen,
            current_bitrate,
            avg_bitrate,
            framerate,
            codec,
            response_ms,
            gop_size,
            width: 0,
            height: 0,
            quality,
            bitrate_stability,
            playable,
            healthy: true,
            last_check_time: SystemTime::now(),
            consecutive_fails: 0,
        };

        Ok(())
    }

    /// Installs the failure snapshot. Idempotent: `consecutive_fails`
    /// increments by exactly one per call. `bitrate_history` is deliberately
    /// left untouched, so `avg_bitrate` on the next successful check still
    /// reflects pre-failure samples.
    pub async fn mark_failed(&self) {
        let mut state = self.state.write().await;
        let consecutive_fails = state.metrics.consecutive_fails + 1;
        state.metrics = Metrics::failed(
            self.stream_id.id.clone(),
            self.stream_id.url.clone(),
            self.stream_id.project.clone(),
            self.name.clone(),
            consecutive_fails,
        );
    }

    /// An independent copy, safe to read concurrently with an in-flight
    /// `check`/`mark_failed`.
    pub async fn snapshot(&self) -> Metrics {
        self.state.read().await.metrics.clone()
    }
}

/// Appends `current_bitrate` to the sliding history (if positive), evicts
/// down to `BITRATE_HISTORY_CAP`, and returns the recomputed average and
/// stability classification.
fn update_bitrate_history(history: &mut Vec<f64>, current_bitrate: f64) -> (f64, BitrateStability) {
    if current_bitrate > 0.0 {
        history.push(current_bitrate);
        while history.len() > BITRATE_HISTORY_CAP {
            history.remove(0);
        }
    }

    if history.is_empty() {
        return (0.0, BitrateStability::Unknown);
    }

    let avg = history.iter().sum::<f64>() / history.len() as f64;

    let stability = if history.len() >= 3 && avg > 0.0 {
        let variance = history.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / history.len() as f64;
        let cv = variance.sqrt() / avg;
        if cv < 0.15 {
            BitrateStability::Stable
        } else if cv < 0.30 {
            BitrateStability::Moderate
        } else {
            BitrateStability::Unstable
        }
    } else {
        BitrateStability::Unknown
    };

    (avg, stability)
}

/// Playability/quality classification.
fn classify_quality(playable: bool, framerate: f64, current_bitrate: f64) -> Quality {
    if !playable {
        return Quality::Poor;
    }
    if framerate >= 25.0 && current_bitrate >= 600_000.0 {
        Quality::Good
    } else if framerate >= 20.0 && current_bitrate >= 400_000.0 {
        Quality::Fair
    } else {
        Quality::Poor
    }
}
