pub mod config;
pub mod errors;
pub mod retry;
pub mod service;
pub mod telemetry;
pub mod util;
