// http_client.rs
//
// A single process-wide HTTP client with a bounded connection pool, shared
// by every StreamProbe. Built once at the composition root in `main` and
// handed to the Scheduler rather than reached for through a global.

use std::time::Duration;

pub fn build() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(90))
        // No request-level timeout: the per-attempt deadline is enforced by
        // the probe's sampling loop, not the client.
        .build()
}
