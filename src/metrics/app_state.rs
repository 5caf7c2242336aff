// metrics/app_state.rs
//
// Shared state handed to every axum handler: the view used to pull a fresh
// snapshot per scrape, and the gauges those snapshots are written into.

use std::sync::Arc;

use anyhow::Result;
use prometheus::Registry;
use tracing::debug;

use crate::metrics::StreamGauges;
use crate::view::MetricView;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub view: Arc<MetricView>,
    pub gauges: Arc<StreamGauges>,
}

impl AppState {
    pub fn new(view: Arc<MetricView>) -> Result<Self> {
        debug!("creating prometheus registry and gauges");
        let registry = Registry::new();
        let gauges = StreamGauges::new(&registry)?;
        Ok(Self {
            registry: Arc::new(registry),
            view,
            gauges: Arc::new(gauges),
        })
    }
}
