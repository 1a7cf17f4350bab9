//! VoiceCraft-Server
//!
//! Ein einziger Tick-Takt treibt alles: eingehende Pakete abfragen,
//! Sichtbarkeit neu berechnen, Anfragen verarbeiten, Effekt-Aenderungen
//! verteilen und die Zustellung warten. Welt und Endpunkt gehoeren dem
//! Server exklusiv; Einbettungen (z.B. eine Spiel-Bridge) aendern Entities
//! ueber die `entity_*`-Methoden zwischen zwei Ticks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use voicecraft_core::{Bitmask, EntityId, PositioningType, VerbindungsId, Version};
use voicecraft_observability::VoiceCraftMetrics;
use voicecraft_protocol::packet::{
    AcceptResponse, AudioEvent, AudioRequest, DenyResponse, EntityDestroyedPacket,
    EntityFlagPacket, InfoResponse, LoginRequest, PingPacket, SetEffectPacket,
};
use voicecraft_protocol::{EffektParameter, Packet};
use voicecraft_world::{
    standard_effekte, AudioEffektSystem, EffektEreignis, Entity, NetzwerkBindung,
    SichtbarkeitsSystem, Welt,
};

use crate::aenderung::EntityAenderung;
use crate::endpunkt::{Endpunkt, EndpunktConfig, EndpunktEreignis, EndpunktStatistik};
use crate::error::NetzwerkResult;
use crate::peer::PeerZustand;

/// Grund beim Herunterfahren
pub const GRUND_BEENDET: &str = "Server beendet";

// ---------------------------------------------------------------------------
// Optionen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ServerOptionen {
    /// Nachricht des Tages fuer die Discovery
    pub motd: String,
    pub max_clients: u32,
    pub positioning_type: PositioningType,
    pub tick: Duration,
    pub version: Version,
    /// Effekte, die beim Start installiert werden
    pub standard_effekte: Vec<(Bitmask, EffektParameter)>,
}

impl Default for ServerOptionen {
    fn default() -> Self {
        Self {
            motd: "VoiceCraft".into(),
            max_clients: 100,
            positioning_type: PositioningType::Server,
            tick: Duration::from_millis(20),
            version: Version::AKTUELL,
            standard_effekte: standard_effekte(),
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceCraftServer
// ---------------------------------------------------------------------------

pub struct VoiceCraftServer {
    endpunkt: Endpunkt,
    welt: Welt,
    effekte: Arc<AudioEffektSystem>,
    sichtbarkeit: SichtbarkeitsSystem,
    optionen: ServerOptionen,
    tick_nummer: i32,
    metriken: VoiceCraftMetrics,
    letzte_statistik: EndpunktStatistik,
}

impl VoiceCraftServer {
    /// Bindet den Endpunkt und installiert die Standard-Effekte
    pub async fn starten(
        adresse: SocketAddr,
        endpunkt_config: EndpunktConfig,
        optionen: ServerOptionen,
        metriken: VoiceCraftMetrics,
    ) -> NetzwerkResult<Self> {
        let endpunkt = Endpunkt::binden(adresse, endpunkt_config).await?;

        let effekte = Arc::new(AudioEffektSystem::neu(optionen.standard_effekte.clone()));
        effekte.zuruecksetzen();
        // Noch keine Clients, denen die Start-Effekte gemeldet werden muessten
        effekte.ereignisse_entnehmen();

        let mut welt = Welt::neu();
        welt.beobachter_registrieren(effekte.clone());
        let sichtbarkeit = SichtbarkeitsSystem::neu(effekte.clone());

        tracing::info!(
            adresse = %endpunkt.lokale_adresse(),
            positioning = ?optionen.positioning_type,
            max_clients = optionen.max_clients,
            version = %optionen.version,
            "VoiceCraft-Server gestartet"
        );

        Ok(Self {
            endpunkt,
            welt,
            effekte,
            sichtbarkeit,
            optionen,
            tick_nummer: 0,
            metriken,
            letzte_statistik: EndpunktStatistik::default(),
        })
    }

    pub fn lokale_adresse(&self) -> SocketAddr {
        self.endpunkt.lokale_adresse()
    }

    pub fn optionen(&self) -> &ServerOptionen {
        &self.optionen
    }

    pub fn welt(&self) -> &Welt {
        &self.welt
    }

    pub fn effekte(&self) -> &Arc<AudioEffektSystem> {
        &self.effekte
    }

    pub fn metriken(&self) -> &VoiceCraftMetrics {
        &self.metriken
    }

    pub fn tick_nummer(&self) -> i32 {
        self.tick_nummer
    }

    pub fn verbundene_clients(&self) -> usize {
        self.endpunkt.peers().anzahl_verbunden()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Ein vollstaendiger Server-Takt
    pub fn tick(&mut self, jetzt: Instant) {
        let start = Instant::now();
        self.tick_nummer = self.tick_nummer.wrapping_add(1);

        let ereignisse = self.endpunkt.abfragen(jetzt);
        self.sichtbarkeit_verteilen();
        for ereignis in ereignisse {
            self.ereignis_verarbeiten(ereignis);
        }
        self.effekte_verteilen();
        for ereignis in self.endpunkt.wartung(jetzt) {
            self.ereignis_verarbeiten(ereignis);
        }

        self.metriken_aktualisieren(start.elapsed());
    }

    /// Tickt im konfigurierten Takt, bis `shutdown` ausloest
    pub async fn ausfuehren(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut takt = tokio::time::interval(self.optionen.tick);
        takt.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = takt.tick() => self.tick(Instant::now()),
                _ = &mut shutdown => break,
            }
        }

        self.herunterfahren();
    }

    /// Trennt alle Peers und leert die Welt
    pub fn herunterfahren(&mut self) {
        let peers: Vec<VerbindungsId> = self.endpunkt.peers().alle().map(|p| p.id()).collect();
        for peer in peers {
            self.endpunkt.trennen(peer, GRUND_BEENDET);
        }
        self.welt.leeren();
        tracing::info!("VoiceCraft-Server beendet");
    }

    fn ereignis_verarbeiten(&mut self, ereignis: EndpunktEreignis) {
        match ereignis {
            EndpunktEreignis::Unverbunden { adresse, paket } => {
                if let Packet::InfoRequest(anfrage) = &*paket {
                    let antwort = Packet::InfoResponse(InfoResponse {
                        motd: self.optionen.motd.clone(),
                        clients: self.verbundene_clients() as u32,
                        positioning_type: self.optionen.positioning_type,
                        tick: anfrage.tick,
                        version: self.optionen.version,
                    });
                    self.endpunkt.unverbunden_senden(adresse, &antwort);
                }
            }
            EndpunktEreignis::Paket { peer, paket } => self.paket_verarbeiten(peer, &paket),
            EndpunktEreignis::Getrennt { peer, grund } => {
                tracing::info!(%peer, %grund, "Client getrennt");
                self.peer_entity_entfernen(peer);
            }
        }
    }

    fn paket_verarbeiten(&mut self, peer: VerbindungsId, paket: &Packet) {
        if let Packet::LoginRequest(login) = paket {
            self.login_verarbeiten(peer, login);
            return;
        }

        let verbunden = self.endpunkt.peer(peer).is_some_and(|p| p.ist_verbunden());
        let entity_id = self.welt.nach_peer(peer).map(Entity::id);
        let (true, Some(entity_id)) = (verbunden, entity_id) else {
            tracing::debug!(%peer, typ = ?paket.typ(), "Anfrage ohne Anmeldung verworfen");
            return;
        };

        match paket {
            Packet::PingRequest(ping) => {
                let antwort = Packet::PingResponse(PingPacket {
                    request_id: ping.request_id,
                });
                self.senden(peer, &antwort);
            }
            Packet::LogoutRequest(logout) => {
                tracing::info!(%peer, grund = %logout.grund, "Client abgemeldet");
                self.endpunkt.trennen(peer, &logout.grund);
                self.peer_entity_entfernen(peer);
            }
            Packet::AudioRequest(audio) => self.audio_weiterleiten(entity_id, audio),
            andere => match EntityAenderung::aus_anfrage(andere) {
                Some(aenderung) => {
                    if aenderung.ist_positionierung()
                        && self.optionen.positioning_type == PositioningType::Server
                    {
                        tracing::trace!(%peer, ?aenderung, "Positionierung liegt beim Server");
                        return;
                    }
                    if let Err(e) = self.entity_aendern(entity_id, aenderung) {
                        tracing::debug!(%peer, fehler = %e, "Aenderung nicht anwendbar");
                    }
                }
                None => tracing::debug!(%peer, typ = ?andere.typ(), "Unerwartetes Paket"),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    fn login_pruefen(&self, peer: VerbindungsId, login: &LoginRequest) -> Result<(), String> {
        if self.welt.nach_peer(peer).is_some() {
            return Err("Bereits verbunden".into());
        }
        if !login.version.kompatibel(&self.optionen.version) {
            return Err(format!(
                "Inkompatible Version {} (Server {})",
                login.version, self.optionen.version
            ));
        }
        if self.verbundene_clients() >= self.optionen.max_clients as usize {
            return Err("Server voll".into());
        }
        if login.positioning_type != self.optionen.positioning_type {
            return Err(format!(
                "Positionierung {:?} erwartet",
                self.optionen.positioning_type
            ));
        }
        Ok(())
    }

    fn login_verarbeiten(&mut self, peer: VerbindungsId, login: &LoginRequest) {
        if let Err(grund) = self.login_pruefen(peer, login) {
            tracing::info!(%peer, %grund, "Login abgelehnt");
            let antwort = Packet::DenyResponse(DenyResponse {
                request_id: login.request_id,
                grund,
            });
            self.senden(peer, &antwort);
            if self.welt.nach_peer(peer).is_none() {
                self.endpunkt.nach_zustellung_trennen(peer);
            }
            return;
        }

        let bindung = NetzwerkBindung {
            user_guid: login.user_guid,
            server_user_guid: login.server_user_guid,
            locale: login.locale.clone(),
            positioning_type: login.positioning_type,
            ..NetzwerkBindung::neu(peer)
        };
        let entity_id = self.welt.erstellen_netzwerk(bindung).id();
        self.endpunkt.zustand_setzen(peer, PeerZustand::Verbunden);
        tracing::info!(%peer, entity = %entity_id, user = %login.user_guid, "Client verbunden");

        self.senden(
            peer,
            &Packet::AcceptResponse(AcceptResponse {
                request_id: login.request_id,
                entity_id,
            }),
        );

        // Bestandsaufnahme fuer den neuen Client: Effekte und alle Entities
        for (bitmask, parameter) in self.effekte.effekte() {
            let paket = Packet::SetEffect(SetEffectPacket {
                bitmask,
                effekt: Some(parameter),
            });
            self.senden(peer, &paket);
        }
        let schnappschuesse: Vec<_> = self.welt.alle().map(Entity::schnappschuss).collect();
        let mut eigener = None;
        for schnappschuss in schnappschuesse {
            if schnappschuss.entity_id == entity_id {
                eigener = Some(schnappschuss.clone());
            }
            self.senden(peer, &Packet::EntityCreated(schnappschuss));
        }

        if let Some(schnappschuss) = eigener {
            self.endpunkt
                .an_alle_senden(&Packet::EntityCreated(schnappschuss), Some(peer));
        }
    }

    // -----------------------------------------------------------------------
    // Audio
    // -----------------------------------------------------------------------

    fn audio_weiterleiten(&mut self, sprecher_id: EntityId, audio: &AudioRequest) {
        let Ok(sprecher) = self.welt.entity(sprecher_id) else {
            return;
        };
        if sprecher.effektiv_stumm() {
            tracing::trace!(entity = %sprecher_id, "Audio eines stummen Sprechers verworfen");
            return;
        }

        let ziele: Vec<VerbindungsId> = sprecher
            .sichtbare()
            .iter()
            .filter_map(|id| self.welt.entity(*id).ok())
            .filter(|hoerer| !hoerer.effektiv_taub())
            .filter_map(|hoerer| hoerer.netzwerk().map(|n| n.peer))
            .collect();
        if ziele.is_empty() {
            return;
        }

        let ereignis = Packet::AudioEvent(AudioEvent {
            entity_id: sprecher_id,
            timestamp: audio.timestamp,
            frame_loudness: audio.frame_loudness,
            daten: audio.daten.clone(),
        });
        let mut weitergeleitet = 0;
        for peer in ziele {
            if self.endpunkt.senden(peer, &ereignis).is_ok() {
                weitergeleitet += 1;
            }
        }
        self.metriken.audio_relayed.inc_by(weitergeleitet);
    }

    // -----------------------------------------------------------------------
    // Verteilung
    // -----------------------------------------------------------------------

    fn sichtbarkeit_verteilen(&mut self) {
        for aenderung in self.sichtbarkeit.aktualisieren(&mut self.welt) {
            let Some(peer) = self.peer_von(aenderung.hoerer) else {
                continue;
            };
            let paket = Packet::SetVisibility(EntityFlagPacket {
                entity_id: aenderung.sprecher,
                wert: aenderung.sichtbar,
            });
            self.senden(peer, &paket);
        }
    }

    fn effekte_verteilen(&mut self) {
        for ereignis in self.effekte.ereignisse_entnehmen() {
            let paket = match ereignis {
                EffektEreignis::Gesetzt { bitmask, parameter } => SetEffectPacket {
                    bitmask,
                    effekt: Some(parameter),
                },
                EffektEreignis::Entfernt { bitmask } => SetEffectPacket {
                    bitmask,
                    effekt: None,
                },
            };
            self.endpunkt.an_alle_senden(&Packet::SetEffect(paket), None);
        }
    }

    fn peer_von(&self, entity: EntityId) -> Option<VerbindungsId> {
        self.welt
            .entity(entity)
            .ok()
            .and_then(|e| e.netzwerk())
            .map(|n| n.peer)
    }

    fn peer_entity_entfernen(&mut self, peer: VerbindungsId) {
        if let Some(id) = self.welt.nach_peer(peer).map(Entity::id) {
            self.entity_entfernen(id);
        }
    }

    fn entity_entfernen(&mut self, id: EntityId) -> bool {
        if self.welt.zerstoeren(id).is_err() {
            return false;
        }
        let paket = Packet::EntityDestroyed(EntityDestroyedPacket { entity_id: id });
        self.endpunkt.an_alle_senden(&paket, None);
        true
    }

    fn senden(&mut self, peer: VerbindungsId, paket: &Packet) {
        if let Err(e) = self.endpunkt.senden(peer, paket) {
            tracing::debug!(%peer, typ = ?paket.typ(), fehler = %e, "Senden fehlgeschlagen");
        }
    }

    fn metriken_aktualisieren(&mut self, dauer: Duration) {
        let aktuell = self.endpunkt.statistik();
        let alt = std::mem::replace(&mut self.letzte_statistik, aktuell);

        self.metriken
            .packets_received
            .inc_by(aktuell.empfangen.saturating_sub(alt.empfangen));
        self.metriken
            .packets_malformed
            .inc_by(aktuell.ungueltig.saturating_sub(alt.ungueltig));
        self.metriken
            .reliable_resent
            .inc_by(aktuell.erneut_gesendet.saturating_sub(alt.erneut_gesendet));
        self.metriken
            .connected_peers
            .set(self.verbundene_clients() as i64);
        self.metriken.entities.set(self.welt.anzahl() as i64);
        self.metriken
            .tick_duration_seconds
            .observe(dauer.as_secs_f64());
    }

    // -----------------------------------------------------------------------
    // Bridge-API
    // -----------------------------------------------------------------------

    /// Legt eine serverseitige Entity ohne Netzwerk-Bindung an
    pub fn entity_erstellen(&mut self) -> EntityId {
        let schnappschuss = self.welt.erstellen_frei().schnappschuss();
        let id = schnappschuss.entity_id;
        self.endpunkt
            .an_alle_senden(&Packet::EntityCreated(schnappschuss), None);
        id
    }

    /// Zerstoert eine Entity; bei Netzwerk-Entities wird der Client getrennt
    pub fn entity_zerstoeren(&mut self, id: EntityId, grund: &str) -> NetzwerkResult<()> {
        let peer = self.welt.entity(id)?.netzwerk().map(|n| n.peer);
        if let Some(peer) = peer {
            self.endpunkt.trennen(peer, grund);
        }
        self.entity_entfernen(id);
        Ok(())
    }

    /// Wendet eine Aenderung an und verteilt sie, falls sich etwas geaendert hat
    pub fn entity_aendern(&mut self, id: EntityId, aenderung: EntityAenderung) -> NetzwerkResult<bool> {
        let entity = self.welt.entity_mut(id)?;
        if !aenderung.anwenden(entity) {
            return Ok(false);
        }
        self.endpunkt
            .an_alle_senden(&aenderung.als_ereignis(id), None);
        Ok(true)
    }

    /// Setzt oder entfernt einen Effekt; Clients erfahren es im naechsten Tick
    pub fn effekt_setzen(&mut self, bitmask: Bitmask, parameter: Option<EffektParameter>) -> bool {
        self.effekte.effekt_setzen(bitmask, parameter)
    }

    pub fn effekte_zuruecksetzen(&mut self) {
        self.effekte.zuruecksetzen();
    }
}

impl std::fmt::Debug for VoiceCraftServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceCraftServer")
            .field("adresse", &self.endpunkt.lokale_adresse())
            .field("tick", &self.tick_nummer)
            .field("entities", &self.welt.anzahl())
            .field("clients", &self.verbundene_clients())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    async fn server() -> VoiceCraftServer {
        VoiceCraftServer::starten(
            "127.0.0.1:0".parse().unwrap(),
            EndpunktConfig::default(),
            ServerOptionen::default(),
            VoiceCraftMetrics::neu().unwrap(),
        )
        .await
        .unwrap()
    }

    /// Sammelt formatierte Log-Zeilen fuer Assertions
    #[derive(Clone, Default)]
    struct LogPuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for LogPuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn effekt_aenderung_wird_einmal_protokolliert() {
        let mut s = server().await;
        let puffer = LogPuffer::default();
        let ziel = puffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || ziel.clone())
            .finish();

        let geaendert = tracing::subscriber::with_default(subscriber, || {
            s.effekt_setzen(
                0x0100,
                Some(EffektParameter::Echo {
                    delay_s: 0.1,
                    feedback: 0.5,
                    wet: 0.5,
                }),
            )
        });
        assert!(geaendert);

        let text = String::from_utf8(puffer.0.lock().clone()).unwrap();
        assert_eq!(text.matches("Effekt geaendert").count(), 1, "{text}");
    }

    #[tokio::test]
    async fn start_installiert_standard_effekte() {
        let s = server().await;
        assert_eq!(s.effekte().effekte(), standard_effekte());
        // Start-Ereignisse sind bereits verbraucht
        assert!(s.effekte().ereignisse_entnehmen().is_empty());
    }

    #[tokio::test]
    async fn bridge_erstellt_und_aendert_entities() {
        let mut s = server().await;
        let id = s.entity_erstellen();
        assert!(s.welt().existiert(id));

        let pos = EntityAenderung::Position(Vec3::new(1.0, 0.0, 2.0));
        assert!(s.entity_aendern(id, pos.clone()).unwrap());
        assert!(!s.entity_aendern(id, pos).unwrap());
        assert_eq!(s.welt().entity(id).unwrap().position(), Vec3::new(1.0, 0.0, 2.0));

        s.entity_zerstoeren(id, "entfernt").unwrap();
        assert!(!s.welt().existiert(id));
        assert!(s.entity_zerstoeren(id, "entfernt").is_err());
    }

    #[tokio::test]
    async fn tick_aktualisiert_metriken() {
        let mut s = server().await;
        s.entity_erstellen();
        s.tick(Instant::now());
        assert_eq!(s.tick_nummer(), 1);
        assert_eq!(s.metriken().entities.get(), 1);
        assert_eq!(s.metriken().connected_peers.get(), 0);
        assert_eq!(s.metriken().tick_duration_seconds.get_sample_count(), 1);
    }

    #[tokio::test]
    async fn effekt_aenderung_wird_gemeldet() {
        let mut s = server().await;
        assert!(s.effekt_setzen(0x0100, Some(EffektParameter::Sichtbarkeit)));
        assert!(!s.effekt_setzen(0, Some(EffektParameter::Sichtbarkeit)));
        s.tick(Instant::now());
        // Verteilt und damit verbraucht
        assert!(s.effekte().ereignisse_entnehmen().is_empty());
    }
}
