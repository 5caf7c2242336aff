// stream/metrics.rs

use std::time::SystemTime;

/// Stream quality classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Good,
    Fair,
    Poor,
    Unknown,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::Fair => "fair",
            Quality::Poor => "poor",
            Quality::Unknown => "unknown",
        }
    }

    /// Prometheus `video_stream_quality_score` mapping.
    pub fn score(&self) -> f64 {
        match self {
            Quality::Good => 2.0,
            Quality::Fair => 1.0,
            Quality::Poor => 0.0,
            Quality::Unknown => 0.0,
        }
    }
}

/// Bitrate stability classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateStability {
    Stable,
    Moderate,
    Unstable,
    Unknown,
}

impl BitrateStability {
    pub fn as_str(&self) -> &'static str {
        match self {
            BitrateStability::Stable => "stable",
            BitrateStability::Moderate => "moderate",
            BitrateStability::Unstable => "unstable",
            BitrateStability::Unknown => "unknown",
        }
    }

    /// Prometheus `video_stream_stability_score` mapping.
    pub fn score(&self) -> f64 {
        match self {
            BitrateStability::Stable => 2.0,
            BitrateStability::Moderate => 1.0,
            BitrateStability::Unstable => 0.0,
            BitrateStability::Unknown => 0.0,
        }
    }
}

/// A fully detached, immutable snapshot of one probe's most recent check.
/// Holding a `Metrics` value never aliases a probe's internal mutable
/// state.
#[derive(Debug, Clone)]
pub struct Metrics {
    pub id: String,
    pub url: String,
    pub project: String,
    pub name: String,

    pub total_packets: u64,
    pub video_packets: u64,
    pub audio_packets: u64,
    pub keyframes: u64,

    pub current_bitrate: f64,
    pub avg_bitrate: f64,
    pub framerate: f64,
    pub codec: String,

    /// Time-to-response-headers, in milliseconds.
    pub response_ms: u64,
    pub gop_size: u64,

    /// Always zero: resolution extraction from the video track is not
    /// implemented.
    pub width: u32,
    pub height: u32,

    pub quality: Quality,
    pub bitrate_stability: BitrateStability,
    pub playable: bool,
    pub healthy: bool,
    pub last_check_time: SystemTime,
    pub consecutive_fails: u32,
}

impl Metrics {
    /// The well-defined "failed" shape: counters zeroed, `healthy=false`,
    /// `consecutive_fails` incremented by the caller, quality "poor",
    /// stability "unstable".
    pub fn failed(id: String, url: String, project: String, name: String, consecutive_fails: u32) -> Self {
        Self {
            id,
            url,
            project,
            name,
            total_packets: 0,
            video_packets: 0,
            audio_packets: 0,
            keyframes: 0,
            current_bitrate: 0.0,
            avg_bitrate: 0.0,
            framerate: 0.0,
            codec: String::new(),
            response_ms: 0,
            gop_size: 0,
            width: 0,
            height: 0,
            quality: Quality::Poor,
            bitrate_stability: BitrateStability::Unstable,
            playable: false,
            healthy: false,
            last_check_time: SystemTime::now(),
            consecutive_fails,
        }
    }

    /// Fresh, never-yet-checked shape used when a probe is registered.
    pub fn fresh(id: String, url: String, project: String, name: String) -> Self {
        Self {
            id,
            url,
            project,
            name,
            total_packets: 0,
            video_packets: 0,
            audio_packets: 0,
            keyframes: 0,
            current_bitrate: 0.0,
            avg_bitrate: 0.0,
            framerate: 0.0,
            codec: String::new(),
            response_ms: 0,
            gop_size: 0,
            width: 0,
            height: 0,
            quality: Quality::Unknown,
            bitrate_stability: BitrateStability::Unknown,
            playable: false,
            healthy: false,
            last_check_time: SystemTime::now(),
            consecutive_fails: 0,
        }
    }
}
