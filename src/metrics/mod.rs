// metrics/mod.rs

pub mod app_state;
pub mod collectors;

pub use app_state::AppState;
pub use collectors::StreamGauges;
