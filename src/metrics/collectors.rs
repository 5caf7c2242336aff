// metrics/collectors.rs
//
// Registers the per-stream quality gauges against a shared registry and
// converts a Metrics snapshot into label/value updates.

use anyhow::Result;
use prometheus::{GaugeVec, Opts, Registry};

use crate::stream::Metrics;

const LABELS: &[&str] = &["project", "id", "name", "url"];

#[derive(Clone)]
pub struct StreamGauges {
    up: GaugeVec,
    healthy: GaugeVec,
    playable: GaugeVec,
    total_packets: GaugeVec,
    video_packets: GaugeVec,
    audio_packets: GaugeVec,
    keyframes: GaugeVec,
    bitrate_bps: GaugeVec,
    avg_bitrate_bps: GaugeVec,
    framerate: GaugeVec,
    response_ms: GaugeVec,
    gop_size: GaugeVec,
    quality_score: GaugeVec,
    stability_score: GaugeVec,
}

impl StreamGauges {
    pub fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            up: gauge(registry, "video_stream_up", "Stream is up (1) or down (0)")?,
            healthy: gauge(
                registry,
                "video_stream_healthy",
                "Stream health status (1=healthy, 0=unhealthy)",
            )?,
            playable: gauge(
                registry,
                "video_stream_playable",
                "Stream is playable (1=yes, 0=no)",
            )?,
            total_packets: gauge(
                registry,
                "video_stream_total_packets",
                "Total packets received in the last sample window",
            )?,
            video_packets: gauge(
                registry,
                "video_stream_video_packets",
                "Video packets received in the last sample window",
            )?,
            audio_packets: gauge(
                registry,
                "video_stream_audio_packets",
                "Audio packets received in the last sample window",
            )?,
            keyframes: gauge(
                registry,
                "video_stream_keyframes",
                "Keyframes received in the last sample window",
            )?,
            bitrate_bps: gauge(
                registry,
                "video_stream_bitrate_bps",
                "Current stream bitrate in bits per second",
            )?,
            avg_bitrate_bps: gauge(
                registry,
                "video_stream_avg_bitrate_bps",
                "Average stream bitrate in bits per second",
            )?,
            framerate: gauge(registry, "video_stream_framerate", "Stream framerate in fps")?,
            response_ms: gauge(
                registry,
                "video_stream_response_ms",
                "FLV HTTP request response time in milliseconds",
            )?,
            gop_size: gauge(registry, "video_stream_gop_size", "GOP size in frames")?,
            quality_score: gauge(
                registry,
                "video_stream_quality_score",
                "Stream quality score (0=poor, 1=fair, 2=good)",
            )?,
            stability_score: gauge(
                registry,
                "video_stream_stability_score",
                "Bitrate stability score (0=unstable, 1=moderate, 2=stable)",
            )?,
        })
    }

    /// Updates every gauge for one stream's snapshot.
    pub fn observe(&self, m: &Metrics) {
        let labels: [&str; 4] = [&m.project, &m.id, &m.name, &m.url];

        self.up.with_label_values(&labels).set(bool_to_f64(m.healthy));
        self.healthy
            .with_label_values(&labels)
            .set(bool_to_f64(m.healthy && m.consecutive_fails == 0));
        self.playable.with_label_values(&labels).set(bool_to_f64(m.playable));

        self.total_packets.with_label_values(&labels).set(m.total_packets as f64);
        self.video_packets.with_label_values(&labels).set(m.video_packets as f64);
        self.audio_packets.with_label_values(&labels).set(m.audio_packets as f64);
        self.keyframes.with_label_values(&labels).set(m.keyframes as f64);

        self.bitrate_bps.with_label_values(&labels).set(m.current_bitrate);
        self.avg_bitrate_bps.with_label_values(&labels).set(m.avg_bitrate);
        self.framerate.with_label_values(&labels).set(m.framerate);
        self.response_ms.with_label_values(&labels).set(m.response_ms as f64);
        self.gop_size.with_label_values(&labels).set(m.gop_size as f64);

        self.quality_score.with_label_values(&labels).set(m.quality.score());
        self.stability_score
            .with_label_values(&labels)
            .set(m.bitrate_stability.score());
    }
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec> {
    let g = GaugeVec::new(Opts::new(name, help), LABELS)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::metrics::{BitrateStability, Quality};
    use prometheus::proto::MetricFamily;
    use std::time::SystemTime;

    fn sample_metrics() -> Metrics {
        Metrics {
            id: "s1".into(),
            url: "https://example.com/a.flv".into(),
            project: "proj".into(),
            name: "proj_example_s1_a".into(),
            total_packets: 120,
            video_packets: 100,
            audio_packets: 20,
            keyframes: 10,
            current_bitrate: 800_000.0,
            avg_bitrate: 750_000.0,
            framerate: 25.0,
            codec: "H264".into(),
            response_ms: 42,
            gop_size: 10,
            width: 0,
            height: 0,
            quality: Quality::Good,
            bitrate_stability: BitrateStability::Stable,
            playable: true,
            healthy: true,
            last_check_time: SystemTime::now(),
            consecutive_fails: 0,
        }
    }

    fn family_value(families: &[MetricFamily], name: &str) -> f64 {
        let family = families.iter().find(|f| f.get_name() == name).unwrap();
        family.get_metric()[0].get_gauge().get_value()
    }

    #[test]
    fn observe_populates_quality_and_stability_scores() {
        let registry = Registry::new();
        let gauges = StreamGauges::new(&registry).unwrap();
        gauges.observe(&sample_metrics());

        let families = registry.gather();
        assert_eq!(family_value(&families, "video_stream_quality_score"), 2.0);
        assert_eq!(family_value(&families, "video_stream_stability_score"), 2.0);
        assert_eq!(family_value(&families, "video_stream_up"), 1.0);
        assert_eq!(family_value(&families, "video_stream_bitrate_bps"), 800_000.0);
    }

    #[test]
    fn observe_reports_unhealthy_stream_as_down() {
        let registry = Registry::new();
        let gauges = StreamGauges::new(&registry).unwrap();
        let mut m = sample_metrics();
        m.healthy = false;
        m.consecutive_fails = 2;
        gauges.observe(&m);

        let families = registry.gather();
        assert_eq!(family_value(&families, "video_stream_up"), 0.0);
        assert_eq!(family_value(&families, "video_stream_healthy"), 0.0);
    }
}
