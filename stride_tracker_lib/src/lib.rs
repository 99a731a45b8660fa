pub mod geo_point;
pub mod intervals;
pub mod log_entry;
pub mod pace;
pub mod run_session;
mod serde_util;
pub mod training_plan;
