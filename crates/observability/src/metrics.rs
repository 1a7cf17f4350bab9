//! Prometheus-kompatible Metriken fuer VoiceCraft
//!
//! Registrierte Metriken:
//! - `voicecraft_connected_peers` – Gauge: Verbundene Peers
//! - `voicecraft_entities` – Gauge: Lebende Entities
//! - `voicecraft_packets_received_total` – Counter: Empfangene Datagramme
//! - `voicecraft_packets_malformed_total` – Counter: Verworfene, nicht dekodierbare Datagramme
//! - `voicecraft_audio_relayed_total` – Counter: Weitergeleitete Audio-Pakete
//! - `voicecraft_reliable_resent_total` – Counter: Erneut gesendete zuverlaessige Pakete
//! - `voicecraft_tick_duration_seconds` – Histogram: Dauer eines Server-Ticks
//!
//! Jede Instanz besitzt eine eigene Registry (kein globaler Zustand).

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle VoiceCraft-Prometheus-Metriken
#[derive(Clone)]
pub struct VoiceCraftMetrics {
    pub registry: Arc<Registry>,

    pub connected_peers: IntGauge,
    pub entities: IntGauge,
    pub packets_received: IntCounter,
    pub packets_malformed: IntCounter,
    pub audio_relayed: IntCounter,
    pub reliable_resent: IntCounter,
    pub tick_duration_seconds: Histogram,
}

impl std::fmt::Debug for VoiceCraftMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceCraftMetrics")
            .field("connected_peers", &self.connected_peers.get())
            .field("entities", &self.entities.get())
            .finish()
    }
}

impl VoiceCraftMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_peers = IntGauge::with_opts(Opts::new(
            "voicecraft_connected_peers",
            "Anzahl verbundener Peers",
        ))?;
        registry.register(Box::new(connected_peers.clone()))?;

        let entities = IntGauge::with_opts(Opts::new(
            "voicecraft_entities",
            "Anzahl lebender Entities in der Welt",
        ))?;
        registry.register(Box::new(entities.clone()))?;

        let packets_received = IntCounter::with_opts(Opts::new(
            "voicecraft_packets_received_total",
            "Gesamtanzahl empfangener Datagramme",
        ))?;
        registry.register(Box::new(packets_received.clone()))?;

        let packets_malformed = IntCounter::with_opts(Opts::new(
            "voicecraft_packets_malformed_total",
            "Verworfene Datagramme, die nicht dekodiert werden konnten",
        ))?;
        registry.register(Box::new(packets_malformed.clone()))?;

        let audio_relayed = IntCounter::with_opts(Opts::new(
            "voicecraft_audio_relayed_total",
            "Gesamtanzahl weitergeleiteter Audio-Pakete",
        ))?;
        registry.register(Box::new(audio_relayed.clone()))?;

        let reliable_resent = IntCounter::with_opts(Opts::new(
            "voicecraft_reliable_resent_total",
            "Erneut gesendete zuverlaessige Pakete",
        ))?;
        registry.register(Box::new(reliable_resent.clone()))?;

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "voicecraft_tick_duration_seconds",
                "Dauer eines Server-Ticks in Sekunden",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.02, 0.05]),
        )?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_peers,
            entities,
            packets_received,
            packets_malformed,
            audio_relayed,
            reliable_resent,
            tick_duration_seconds,
        })
    }

    /// Rendert alle Metriken im Prometheus-Textformat
    pub fn als_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let familien = self.registry.gather();
        let mut puffer = Vec::new();
        encoder.encode(&familien, &mut puffer)?;
        Ok(String::from_utf8(puffer)?)
    }
}
