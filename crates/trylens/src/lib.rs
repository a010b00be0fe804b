pub mod http;
pub mod service;
pub mod telemetry;
