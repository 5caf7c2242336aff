// stream/id.rs

use url::Url;

/// Composite identity of a probe: `(project, id, url)`. `(project, url)` is
/// the uniqueness key used by the Scheduler; `name` is derived once at
/// construction and carried alongside for the Prometheus label set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId {
    pub project: String,
    pub id: String,
    pub url: String,
}

impl StreamId {
    pub fn new(project: impl Into<String>, id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            id: id.into(),
            url: url.into(),
        }
    }

    /// The key `(project, url)` uniquely identifying this probe within a
    /// Scheduler.
    pub fn key(&self) -> (String, String) {
        (self.project.clone(), self.url.clone())
    }
}

/// Derives the `name` label: `project_hostFirstLabel_id_pathWithoutExtension`.
///
/// The path's leading slash is stripped, its extension removed, and
/// remaining `/` replaced by `_`. An unparsable URL, an empty host, or an
/// empty path segment each fall back to the literal `unknown`.
pub fn derive_name(project: &str, id: &str, url: &str) -> String {
    let (host_segment, path_segment) = match Url::parse(url) {
        Ok(parsed) => {
            let host_segment = parsed
                .host_str()
                .and_then(|h| h.split('.').next())
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown")
                .to_string();

            let path_segment = {
                let trimmed = parsed.path().trim_start_matches('/');
                if trimmed.is_empty() {
                    "unknown".to_string()
                } else {
                    let without_ext = strip_extension(trimmed);
                    let replaced = without_ext.replace('/', "_");
                    if replaced.is_empty() {
                        "unknown".to_string()
                    } else {
                        replaced
                    }
                }
            };

            (host_segment, path_segment)
        }
        Err(_) => ("unknown".to_string(), "unknown".to_string()),
    };

    format!("{project}_{host_segment}_{id}_{path_segment}")
}

fn strip_extension(path: &str) -> String {
    match path.rfind('.') {
        // A dot with no following path separator is treated as an
        // extension; a dot that's only in an earlier segment is not.
        Some(idx) if !path[idx + 1..].contains('/') => path[..idx].to_string(),
        _ => path.to_string(),
    }
}
