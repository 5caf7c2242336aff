// config.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the exporter's YAML configuration file.
    #[arg(short, long, default_value = "config.yml")]
    pub config: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub id: String,
    pub url: String,
}

fn default_sample_duration() -> u64 {
    10
}

fn default_min_keyframes() -> u32 {
    2
}

fn default_listen_addr() -> String {
    ":8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    pub check_interval: u64,
    #[serde(default = "default_sample_duration")]
    pub sample_duration: u64,
    #[serde(default = "default_min_keyframes")]
    pub min_keyframes: u32,
    pub max_concurrent: usize,
    pub max_retries: u32,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub exporter: ExporterConfig,
    #[serde(default)]
    pub streams: HashMap<String, Vec<StreamConfig>>,
}

impl Config {
    /// Loads and validates the YAML document at `path`. Normalizes
    /// `listen_addr` to always carry a leading `:` and fails fast (fatal,
    /// non-zero exit) on any structural or semantic problem.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut cfg: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        if !cfg.exporter.listen_addr.starts_with(':') {
            cfg.exporter.listen_addr = format!(":{}", cfg.exporter.listen_addr);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.exporter.check_interval == 0 {
            bail!("exporter.check_interval must be greater than 0");
        }
        if self.exporter.max_concurrent == 0 {
            bail!("exporter.max_concurrent must be greater than 0");
        }

        for (project, streams) in &self.streams {
            if project.is_empty() {
                bail!("stream project names must be non-empty");
            }
            for stream in streams {
                if stream.id.is_empty() {
                    bail!("stream id must be non-empty (project {project})");
                }
                let url = Url::parse(&stream.url)
                    .with_context(|| format!("invalid stream url '{}' (project {project})", stream.url))?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    bail!(
                        "stream url '{}' must be http or https (project {project})",
                        stream.url
                    );
                }
            }
        }

        Ok(())
    }

    pub fn sample_duration(&self) -> Duration {
        Duration::from_secs(self.exporter.sample_duration)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.exporter.check_interval)
    }

    /// Per-attempt deadline: 15s by default, or `check_interval - 5s` when
    /// the interval exceeds 20s.
    pub fn per_attempt_deadline(&self) -> Duration {
        if self.exporter.check_interval > 20 {
            Duration::from_secs(self.exporter.check_interval - 5)
        } else {
            Duration::from_secs(15)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    const BASIC_YAML: &str = r#"
exporter:
  check_interval: 30
  max_concurrent: 5
  max_retries: 2
streams:
  proj1:
    - { id: "s1", url: "https://example.com/a.flv" }
    - { id: "s2", url: "https://example.com/b.flv" }
  proj2:
    - { id: "s3", url: "http://other.example.org/c.flv" }
"#;

    #[test]
    fn loads_defaults_and_normalizes_listen_addr() {
        let f = write_temp(BASIC_YAML);
        let cfg = Config::load(f.path()).unwrap();

        assert_eq!(cfg.exporter.sample_duration, 10);
        assert_eq!(cfg.exporter.min_keyframes, 2);
        assert_eq!(cfg.exporter.listen_addr, ":8080");
        assert_eq!(cfg.exporter.log_level, "info");
    }

    #[test]
    fn prepends_colon_to_bare_port() {
        let yaml = BASIC_YAML.replacen(
            "max_retries: 2",
            "max_retries: 2\n  listen_addr: \"9100\"",
            1,
        );
        let f = write_temp(&yaml);
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.exporter.listen_addr, ":9100");
    }

    #[test]
    fn registers_every_configured_stream() {
        let f = write_temp(BASIC_YAML);
        let cfg = Config::load(f.path()).unwrap();

        let mut triples: Vec<(String, String, String)> = cfg
            .streams
            .iter()
            .flat_map(|(project, streams)| {
                streams
                    .iter()
                    .map(move |s| (project.clone(), s.id.clone(), s.url.clone()))
            })
            .collect();
        triples.sort();

        assert_eq!(
            triples,
            vec![
                ("proj1".to_string(), "s1".to_string(), "https://example.com/a.flv".to_string()),
                ("proj1".to_string(), "s2".to_string(), "https://example.com/b.flv".to_string()),
                ("proj2".to_string(), "s3".to_string(), "http://other.example.org/c.flv".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_zero_check_interval() {
        let yaml = BASIC_YAML.replace("check_interval: 30", "check_interval: 0");
        let f = write_temp(&yaml);
        assert!(Config::load(f.path()).is_err());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let yaml = BASIC_YAML.replace("https://example.com/a.flv", "rtmp://example.com/a");
        let f = write_temp(&yaml);
        assert!(Config::load(f.path()).is_err());
    }

    #[test]
    fn per_attempt_deadline_uses_interval_minus_five_above_twenty_seconds() {
        let yaml = BASIC_YAML.replace("check_interval: 30", "check_interval: 60");
        let f = write_temp(&yaml);
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.per_attempt_deadline(), Duration::from_secs(55));
    }

    #[test]
    fn per_attempt_deadline_defaults_to_fifteen_seconds() {
        let f = write_temp(BASIC_YAML);
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.per_attempt_deadline(), Duration::from_secs(15));
    }
}
