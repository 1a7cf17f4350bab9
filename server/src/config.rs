//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use voicecraft_core::{PositioningType, Version};
use voicecraft_network::{EndpunktConfig, ServerOptionen};
use voicecraft_observability::logging::{log_format_gueltig, log_level_gueltig};
use voicecraft_world::standard_effekte;

/// Umgebungsvariable mit dem Pfad zur Konfigurationsdatei
pub const ENV_CONFIG: &str = "VOICECRAFT_CONFIG";
pub const STANDARD_PFAD: &str = "config.toml";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Nachricht des Tages (Discovery)
    pub motd: String,
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: u32,
    /// "server" oder "client"
    pub positioning_type: PositioningType,
    /// Takt des Server-Ticks
    pub tick_ms: u64,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            motd: "VoiceCraft Server".into(),
            max_clients: 100,
            positioning_type: PositioningType::Server,
            tick_ms: 20,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// UDP-Port fuer Login, Zustand und Audio
    pub port: u16,
    /// Ohne eingehenden Verkehr wird ein Peer danach getrennt
    pub verbindungs_timeout_ms: u64,
    /// Abstand zwischen Wiederholungen unbestaetigter Pakete
    pub wiederholung_ms: u64,
    pub max_wiederholungen: u32,
    pub keepalive_ms: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 9050,
            verbindungs_timeout_ms: 10_000,
            wiederholung_ms: 250,
            max_wiederholungen: 20,
            keepalive_ms: 1_000,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den HTTP-Endpunkt fuer `/metrics` und `/health`
    pub metriken_aktiviert: bool,
    /// Port fuer Metriken und Health
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            metriken_aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Konfigurationsdatei '{pfad}' nicht lesbar"))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.server.max_clients == 0 {
            bail!("server.max_clients muss groesser als 0 sein");
        }
        if self.server.tick_ms == 0 {
            bail!("server.tick_ms muss groesser als 0 sein");
        }
        if self.netzwerk.wiederholung_ms == 0 {
            bail!("netzwerk.wiederholung_ms muss groesser als 0 sein");
        }
        if !log_level_gueltig(&self.logging.level) {
            bail!("Unbekanntes Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!("Unbekanntes Log-Format '{}'", self.logging.format);
        }
        self.bind_adresse()?;
        Ok(())
    }

    /// Adresse des UDP-Endpunkts
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Adresse des Observability-Servers
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.observability.port)
    }

    pub fn endpunkt_config(&self) -> EndpunktConfig {
        EndpunktConfig {
            verbindungs_timeout: Duration::from_millis(self.netzwerk.verbindungs_timeout_ms),
            wiederholung: Duration::from_millis(self.netzwerk.wiederholung_ms),
            max_wiederholungen: self.netzwerk.max_wiederholungen,
            keepalive: Duration::from_millis(self.netzwerk.keepalive_ms),
        }
    }

    pub fn server_optionen(&self) -> ServerOptionen {
        ServerOptionen {
            motd: self.server.motd.clone(),
            max_clients: self.server.max_clients,
            positioning_type: self.server.positioning_type,
            tick: Duration::from_millis(self.server.tick_ms),
            version: Version::AKTUELL,
            standard_effekte: standard_effekte(),
        }
    }
}

fn adresse(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Ungueltige Bind-Adresse '{host}'"))
}
