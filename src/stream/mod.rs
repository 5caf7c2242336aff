// stream/mod.rs

pub mod id;
pub mod metrics;
pub mod probe;

pub use id::StreamId;
pub use metrics::Metrics;
pub use probe::StreamProbe;
