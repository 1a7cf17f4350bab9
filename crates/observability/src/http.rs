//! HTTP-Endpunkte fuer Betrieb und Monitoring
//!
//! - `GET /metrics` – Prometheus scrape format
//! - `GET /health`  – Health-Check JSON

use std::net::SocketAddr;
use std::time::Instant;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::metrics::VoiceCraftMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub connected_peers: i64,
    pub entities: i64,
}

#[derive(Clone)]
struct HttpZustand {
    metriken: VoiceCraftMetrics,
    start: Instant,
}

/// Router mit `/metrics` und `/health` fuer die gegebenen Metriken
pub fn observability_router(metriken: VoiceCraftMetrics) -> Router {
    let zustand = HttpZustand {
        metriken,
        start: Instant::now(),
    };
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(zustand)
}

/// Startet den Observability-HTTP-Server und laeuft bis zum Abbruch
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    metriken: VoiceCraftMetrics,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");
    axum::serve(listener, observability_router(metriken)).await?;
    Ok(())
}

async fn metrics_handler(State(zustand): State<HttpZustand>) -> impl IntoResponse {
    match zustand.metriken.als_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler(State(zustand): State<HttpZustand>) -> impl IntoResponse {
    let antwort = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: zustand.start.elapsed().as_secs(),
        connected_peers: zustand.metriken.connected_peers.get(),
        entities: zustand.metriken.entities.get(),
    };
    (StatusCode::OK, Json(antwort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn abrufen(router: Router, pfad: &str) -> (StatusCode, String) {
        let antwort = router
            .oneshot(Request::get(pfad).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = antwort.status();
        let body = to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn metrics_liefert_textformat() {
        let metriken = VoiceCraftMetrics::neu().unwrap();
        metriken.audio_relayed.inc_by(3);

        let (status, text) = abrufen(observability_router(metriken), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("voicecraft_audio_relayed_total 3"));
    }

    #[tokio::test]
    async fn health_meldet_peers() {
        let metriken = VoiceCraftMetrics::neu().unwrap();
        metriken.connected_peers.set(2);

        let (status, json) = abrufen(observability_router(metriken), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let antwort: HealthResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(antwort.status, HealthStatus::Healthy);
        assert_eq!(antwort.connected_peers, 2);
        assert_eq!(antwort.entities, 0);
    }

    #[tokio::test]
    async fn unbekannter_pfad() {
        let metriken = VoiceCraftMetrics::neu().unwrap();
        let (status, _) = abrufen(observability_router(metriken), "/gibtsnicht").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
