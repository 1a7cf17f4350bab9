//! # voicecraft-observability
//!
//! Observability-Crate fuer VoiceCraft:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging (Text oder JSON) via tracing-subscriber

pub mod http;
pub mod logging;
pub mod metrics;

pub use http::{observability_router, observability_server_starten, HealthResponse, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::VoiceCraftMetrics;
