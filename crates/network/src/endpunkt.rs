//! UDP-Endpunkt – Socket, Peers und Zustellung
//!
//! ## Architektur
//!
//! ```text
//! UDP Socket (recv_from) -- Empfangs-Task --> mpsc --> abfragen()
//!                                                        |
//!                              PaketPool::dekodieren  <--+
//!                                                        |
//!      Ack / Duplikat / Reihenfolge / KeepAlive  <--+  (Transport)
//!                                                        |
//!                                   EndpunktEreignis  <--+  (Anwendung)
//!
//! senden() --> Peer::paket_kodieren --> mpsc --> Sende-Task --> send_to
//! ```
//!
//! Der Endpunkt selbst ist synchron: der Besitzer (Server-Tick oder
//! Client-Schleife) ruft `abfragen` und `wartung` im eigenen Takt auf.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voicecraft_core::VerbindungsId;
use voicecraft_protocol::header::MAX_DATAGRAMM_LAENGE;
use voicecraft_protocol::packet::{AckPacket, DisconnectPacket, KeepAlivePacket};
use voicecraft_protocol::{kodieren, GepooltesPaket, Packet, PacketType, PaketHeader, PaketPool};

use crate::error::{NetzwerkFehler, NetzwerkResult};
use crate::peer::{Einordnung, Peer, PeerZustand};
use crate::registry::PeerRegistry;

/// Trennungsgrund bei Zeitueberschreitung
pub const GRUND_TIMEOUT: &str = "timeout";

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpunktConfig {
    /// Ohne eingehenden Verkehr gilt ein Peer danach als getrennt
    pub verbindungs_timeout: Duration,
    /// Abstand zwischen Wiederholungen unbestaetigter Pakete
    pub wiederholung: Duration,
    pub max_wiederholungen: u32,
    /// Ruhezeit, nach der ein KeepAlive gesendet wird
    pub keepalive: Duration,
}

impl Default for EndpunktConfig {
    fn default() -> Self {
        Self {
            verbindungs_timeout: Duration::from_secs(10),
            wiederholung: Duration::from_millis(250),
            max_wiederholungen: 20,
            keepalive: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Ereignisse & Statistik
// ---------------------------------------------------------------------------

/// Ereignis fuer die Anwendungsschicht
#[derive(Debug)]
pub enum EndpunktEreignis {
    /// Verbindungsloses Paket (Discovery), Antwort geht an `adresse`
    Unverbunden {
        adresse: SocketAddr,
        paket: GepooltesPaket,
    },
    /// Anwendungspaket eines bekannten Peers
    Paket {
        peer: VerbindungsId,
        paket: GepooltesPaket,
    },
    /// Peer wurde von der Gegenseite oder durch Zeitlimit getrennt
    Getrennt { peer: VerbindungsId, grund: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpunktStatistik {
    pub empfangen: u64,
    pub ungueltig: u64,
    pub gesendet: u64,
    pub erneut_gesendet: u64,
}

type Datagramm = (Bytes, SocketAddr);

fn datagramm_senden(tx: &mpsc::UnboundedSender<Datagramm>, daten: Bytes, ziel: SocketAddr) {
    if tx.send((daten, ziel)).is_err() {
        tracing::debug!(%ziel, "Sende-Task beendet, Datagramm verworfen");
    }
}

// ---------------------------------------------------------------------------
// Endpunkt
// ---------------------------------------------------------------------------

pub struct Endpunkt {
    config: EndpunktConfig,
    lokale_adresse: SocketAddr,
    peers: PeerRegistry,
    pool: PaketPool,
    senden_tx: mpsc::UnboundedSender<Datagramm>,
    empfang_rx: mpsc::UnboundedReceiver<Datagramm>,
    statistik: EndpunktStatistik,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Endpunkt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpunkt")
            .field("lokale_adresse", &self.lokale_adresse)
            .field("peers", &self.peers.anzahl())
            .field("statistik", &self.statistik)
            .finish()
    }
}

impl Endpunkt {
    /// Bindet den UDP-Socket und startet Empfangs- und Sende-Task
    pub async fn binden(adresse: SocketAddr, config: EndpunktConfig) -> NetzwerkResult<Self> {
        let socket = std::sync::Arc::new(UdpSocket::bind(adresse).await?);
        let lokale_adresse = socket.local_addr()?;
        tracing::info!(addr = %lokale_adresse, "UDP-Endpunkt gebunden");

        let (empfang_tx, empfang_rx) = mpsc::unbounded_channel::<Datagramm>();
        let (senden_tx, mut senden_rx) = mpsc::unbounded_channel::<Datagramm>();

        let empfangs_socket = socket.clone();
        let empfang = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAMM_LAENGE];
            loop {
                match empfangs_socket.recv_from(&mut buf).await {
                    Ok((len, absender)) => {
                        let daten = Bytes::copy_from_slice(&buf[..len]);
                        if empfang_tx.send((daten, absender)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(fehler = %e, "UDP-Empfangsfehler");
                        // Busy-Loop bei persistentem Fehler vermeiden
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                }
            }
            tracing::debug!("Empfangs-Task beendet");
        });

        let sende = tokio::spawn(async move {
            while let Some((daten, ziel)) = senden_rx.recv().await {
                match socket.send_to(&daten, ziel).await {
                    Ok(_) => tracing::trace!(bytes = daten.len(), %ziel, "Datagramm gesendet"),
                    Err(e) => tracing::warn!(fehler = %e, %ziel, "UDP-Sendefehler"),
                }
            }
            tracing::debug!("Sende-Task beendet");
        });

        Ok(Self {
            config,
            lokale_adresse,
            peers: PeerRegistry::neu(),
            pool: PaketPool::neu(),
            senden_tx,
            empfang_rx,
            statistik: EndpunktStatistik::default(),
            tasks: vec![empfang, sende],
        })
    }

    pub fn lokale_adresse(&self) -> SocketAddr {
        self.lokale_adresse
    }

    pub fn config(&self) -> &EndpunktConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn peer(&self, id: VerbindungsId) -> Option<&Peer> {
        self.peers.get(id)
    }

    pub fn statistik(&self) -> EndpunktStatistik {
        self.statistik
    }

    pub fn pool(&self) -> &PaketPool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Empfang
    // -----------------------------------------------------------------------

    /// Verarbeitet alle bis jetzt empfangenen Datagramme
    ///
    /// Nicht dekodierbare Datagramme werden gezaehlt und verworfen.
    pub fn abfragen(&mut self, jetzt: Instant) -> Vec<EndpunktEreignis> {
        let mut ereignisse = Vec::new();
        while let Ok((daten, absender)) = self.empfang_rx.try_recv() {
            self.statistik.empfangen += 1;
            match self.pool.dekodieren(&daten) {
                Ok((header, paket)) => {
                    self.datagramm_verarbeiten(header, paket, absender, jetzt, &mut ereignisse)
                }
                Err(e) => {
                    self.statistik.ungueltig += 1;
                    tracing::debug!(fehler = %e, %absender, bytes = daten.len(), "Ungueltiges Paket verworfen");
                }
            }
        }
        ereignisse
    }

    fn datagramm_verarbeiten(
        &mut self,
        header: PaketHeader,
        paket: GepooltesPaket,
        absender: SocketAddr,
        jetzt: Instant,
        ereignisse: &mut Vec<EndpunktEreignis>,
    ) {
        match header.typ {
            PacketType::InfoRequest | PacketType::InfoResponse => {
                ereignisse.push(EndpunktEreignis::Unverbunden {
                    adresse: absender,
                    paket,
                });
                return;
            }
            PacketType::LoginRequest => {
                if header.verbindung == VerbindungsId::UNVERBUNDEN {
                    tracing::debug!(%absender, "Login ohne Verbindungs-ID verworfen");
                    return;
                }
                self.peers
                    .anlegen(header.verbindung, absender, PeerZustand::Verbindend, jetzt);
            }
            _ => {}
        }

        let senden_tx = &self.senden_tx;
        let Some(peer) = self.peers.get_mut(header.verbindung) else {
            tracing::debug!(peer = %header.verbindung, %absender, typ = ?header.typ, "Paket von unbekanntem Peer");
            return;
        };
        if peer.adresse() != absender {
            tracing::debug!(peer = %header.verbindung, %absender, "Absenderadresse passt nicht zum Peer");
            return;
        }
        peer.verkehr_vermerken(jetzt);
        let id = peer.id();

        let Some(sequenz) = header.sequenz else {
            self.zustellen(id, paket, ereignisse);
            return;
        };

        match peer.einordnen(sequenz, paket) {
            Einordnung::Angenommen => {}
            Einordnung::Duplikat => {
                tracing::trace!(peer = %id, sequenz, "Duplikat verworfen");
            }
            Einordnung::AusserhalbFenster => {
                tracing::debug!(peer = %id, sequenz, typ = ?header.typ, "Sequenz zu weit voraus, verworfen");
                return;
            }
        }
        let ack = kodieren(id, None, &Packet::Ack(AckPacket { sequenz }));
        datagramm_senden(senden_tx, ack, absender);
        self.statistik.gesendet += 1;

        let mut bereit = Vec::new();
        while let Some(p) = peer.naechstes_paket() {
            bereit.push(p);
        }
        for paket in bereit {
            if !self.zustellen(id, paket, ereignisse) {
                break;
            }
        }
    }

    /// Reicht ein Paket in Empfangsreihenfolge weiter; `false`, wenn der
    /// Peer danach nicht mehr existiert
    fn zustellen(
        &mut self,
        id: VerbindungsId,
        paket: GepooltesPaket,
        ereignisse: &mut Vec<EndpunktEreignis>,
    ) -> bool {
        let trennungsgrund = match &*paket {
            Packet::Ack(a) => {
                if let Some(peer) = self.peers.get_mut(id) {
                    peer.ack_empfangen(a.sequenz);
                }
                return true;
            }
            Packet::KeepAlive(_) => return true,
            Packet::Disconnect(d) => Some(d.grund.clone()),
            _ => None,
        };

        match trennungsgrund {
            Some(grund) => {
                self.peers.entfernen(id);
                tracing::info!(peer = %id, %grund, "Peer hat getrennt");
                ereignisse.push(EndpunktEreignis::Getrennt { peer: id, grund });
                false
            }
            None => {
                tracing::trace!(peer = %id, typ = ?paket.typ(), "Paket empfangen");
                ereignisse.push(EndpunktEreignis::Paket { peer: id, paket });
                true
            }
        }
    }

    // -----------------------------------------------------------------------
    // Versand
    // -----------------------------------------------------------------------

    /// Sendet ein Paket an einen bekannten Peer
    pub fn senden(&mut self, peer: VerbindungsId, paket: &Packet) -> NetzwerkResult<()> {
        let p = self
            .peers
            .get_mut(peer)
            .ok_or(NetzwerkFehler::UnbekannterPeer(peer))?;
        let daten = p.paket_kodieren(paket, Instant::now());
        datagramm_senden(&self.senden_tx, daten, p.adresse());
        self.statistik.gesendet += 1;
        Ok(())
    }

    /// Sendet ein Paket an alle verbundenen Peers (ausser `ausser`)
    pub fn an_alle_senden(&mut self, paket: &Packet, ausser: Option<VerbindungsId>) -> usize {
        let jetzt = Instant::now();
        let mut anzahl = 0;
        for p in self.peers.alle_mut() {
            if !p.ist_verbunden() || Some(p.id()) == ausser {
                continue;
            }
            let daten = p.paket_kodieren(paket, jetzt);
            datagramm_senden(&self.senden_tx, daten, p.adresse());
            anzahl += 1;
        }
        self.statistik.gesendet += anzahl as u64;
        anzahl
    }

    /// Verbindungsloser Versand (Discovery)
    pub fn unverbunden_senden(&mut self, adresse: SocketAddr, paket: &Packet) {
        let daten = kodieren(VerbindungsId::UNVERBUNDEN, None, paket);
        datagramm_senden(&self.senden_tx, daten, adresse);
        self.statistik.gesendet += 1;
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Legt einen ausgehenden Peer an (Client-Seite)
    pub fn verbindung_oeffnen(&mut self, adresse: SocketAddr) -> VerbindungsId {
        let id = self.peers.neue_id();
        self.peers
            .anlegen(id, adresse, PeerZustand::Verbindend, Instant::now());
        id
    }

    pub fn zustand_setzen(&mut self, peer: VerbindungsId, zustand: PeerZustand) -> bool {
        match self.peers.get_mut(peer) {
            Some(p) => {
                p.zustand_setzen(zustand);
                true
            }
            None => false,
        }
    }

    /// Trennt sofort: Disconnect senden, Peer entfernen
    pub fn trennen(&mut self, peer: VerbindungsId, grund: &str) {
        let Some(p) = self.peers.get_mut(peer) else {
            return;
        };
        p.zustand_setzen(PeerZustand::Trennend);
        let paket = Packet::Disconnect(DisconnectPacket {
            grund: grund.to_string(),
        });
        let daten = p.paket_kodieren(&paket, Instant::now());
        datagramm_senden(&self.senden_tx, daten, p.adresse());
        self.statistik.gesendet += 1;
        self.peers.entfernen(peer);
        tracing::info!(%peer, %grund, "Peer getrennt");
    }

    /// Trennt, sobald alle ausstehenden Pakete bestaetigt sind
    pub fn nach_zustellung_trennen(&mut self, peer: VerbindungsId) {
        self.zustand_setzen(peer, PeerZustand::Trennend);
    }

    /// Entfernt einen Peer ohne Benachrichtigung der Gegenseite
    pub fn entfernen(&mut self, peer: VerbindungsId) -> Option<Peer> {
        self.peers.entfernen(peer)
    }

    /// Wiederholungen, KeepAlives und Zeitlimits
    pub fn wartung(&mut self, jetzt: Instant) -> Vec<EndpunktEreignis> {
        let mut ereignisse = Vec::new();
        let mut abgelaufen = Vec::new();
        let mut fertig_getrennt = Vec::new();

        for p in self.peers.alle_mut() {
            let w = p.wartung(jetzt, &self.config);
            if w.zeitlimit {
                abgelaufen.push((p.id(), p.zustand()));
                continue;
            }
            for daten in w.erneut {
                datagramm_senden(&self.senden_tx, daten, p.adresse());
                self.statistik.erneut_gesendet += 1;
                self.statistik.gesendet += 1;
            }
            if w.keepalive {
                let daten = p.paket_kodieren(&Packet::KeepAlive(KeepAlivePacket), jetzt);
                datagramm_senden(&self.senden_tx, daten, p.adresse());
                self.statistik.gesendet += 1;
            }
            if p.zustand() == PeerZustand::Trennend && p.ausstehend_anzahl() == 0 {
                fertig_getrennt.push(p.id());
            }
        }

        for id in fertig_getrennt {
            self.peers.entfernen(id);
        }
        for (id, zustand) in abgelaufen {
            if zustand == PeerZustand::Trennend {
                self.peers.entfernen(id);
                continue;
            }
            tracing::warn!(peer = %id, "Zeitlimit, Peer wird getrennt");
            self.trennen(id, GRUND_TIMEOUT);
            ereignisse.push(EndpunktEreignis::Getrennt {
                peer: id,
                grund: GRUND_TIMEOUT.to_string(),
            });
        }
        ereignisse
    }
}

impl Drop for Endpunkt {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
