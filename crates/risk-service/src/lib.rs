//! Risk Service
//!
//! Startup wiring and the operation surface over the metrics store and the
//! risk pipeline. The `risk-service` binary is a thin CLI on top.

pub mod config;
pub mod service;
pub mod telemetry;

pub use config::ServiceConfig;
pub use service::{CheckinRequest, PredictionRequest, RiskService};
