//! voicecraft-server – Bibliotheks-Root
//!
//! Verbindet Konfiguration, Observability und den Server-Tick zu einem
//! lauffaehigen Prozess und stellt den Einstiegspunkt fuer
//! Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use tokio::sync::oneshot;
use voicecraft_network::VoiceCraftServer;
use voicecraft_observability::{observability_server_starten, VoiceCraftMetrics};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken anlegen, optional `/metrics` und `/health` bereitstellen
    /// 2. UDP-Endpunkt binden, Standard-Effekte installieren
    /// 3. Tick-Schleife bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let ctrl_c = tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar");
                return;
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            let _ = stop_tx.send(());
        });

        let ergebnis = self.ausfuehren(stop_rx).await;
        ctrl_c.abort();
        ergebnis
    }

    /// Wie [`Server::starten`], aber mit eigenem Shutdown-Ausloeser
    pub async fn ausfuehren(self, shutdown: oneshot::Receiver<()>) -> Result<()> {
        let metriken = VoiceCraftMetrics::neu()?;

        let observability = if self.config.observability.metriken_aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let metriken = metriken.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(adresse, metriken).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        let adresse = self.config.bind_adresse()?;
        let server = VoiceCraftServer::starten(
            adresse,
            self.config.endpunkt_config(),
            self.config.server_optionen(),
            metriken,
        )
        .await
        .with_context(|| format!("UDP-Endpunkt {adresse} nicht verfuegbar"))?;

        tracing::info!(
            motd = %self.config.server.motd,
            udp = %server.lokale_adresse(),
            tick_ms = self.config.server.tick_ms,
            "Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)..."
        );
        server.ausfuehren(shutdown).await;

        if let Some(task) = observability {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use voicecraft_network::server_abfragen;

    #[tokio::test]
    async fn server_laeuft_und_beendet_sich() {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.port = 0;
        config.observability.metriken_aktiviert = false;

        let (stop_tx, stop_rx) = oneshot::channel();
        let lauf = tokio::spawn(Server::neu(config).ausfuehren(stop_rx));
        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), lauf)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn discovery_gegen_laufenden_server() {
        // Freien Port ermitteln
        let port = {
            let s = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
            s.local_addr().unwrap().port()
        };
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.port = port;
        config.server.motd = "Integration".into();
        config.observability.metriken_aktiviert = false;

        let (stop_tx, stop_rx) = oneshot::channel();
        let lauf = tokio::spawn(Server::neu(config).ausfuehren(stop_rx));

        let adresse = format!("127.0.0.1:{port}").parse().unwrap();
        let mut info = None;
        for _ in 0..20 {
            match server_abfragen(adresse, Duration::from_millis(100)).await {
                Ok(i) => {
                    info = Some(i);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        assert_eq!(info.unwrap().motd, "Integration");

        stop_tx.send(()).unwrap();
        lauf.await.unwrap().unwrap();
    }
}
