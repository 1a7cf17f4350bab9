//! VoiceCraft-Client
//!
//! Haelt eine Verbindung zu genau einem Server. Eine Hintergrund-Schleife
//! fragt den Endpunkt im festen Takt ab und spiegelt die Server-Welt lokal:
//! Entities, Effekte, Sichtbarkeit und eingehende Audio-Frames. Anfragen
//! mit Antwort (Login, Ping) laufen ueber die [`AnfrageTabelle`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;
use voicecraft_core::{EntityId, PositioningType, VerbindungsId, Version};
use voicecraft_protocol::header::MAX_DATAGRAMM_LAENGE;
use voicecraft_protocol::packet::{
    AudioRequest, FaktorRequest, FlagRequest, InfoRequest, InfoResponse, LoginRequest,
    PingPacket, PositionRequest, RotationRequest, WeltRequest, MAX_AUDIO_LAENGE,
};
use voicecraft_protocol::{dekodieren, kodieren, nutzdaten_pruefen, Packet};
use voicecraft_voice::{
    AudioCodec, ClientEntity, ClientEntityConfig, ClientEntityRegistry, CodecFabrik, Mischer,
    OpusCodec,
};
use voicecraft_world::{AudioEffektSystem, Welt};

use crate::aenderung::EntityAenderung;
use crate::anfragen::{AnfrageEmpfaenger, AnfrageTabelle};
use crate::endpunkt::{Endpunkt, EndpunktConfig, EndpunktEreignis};
use crate::error::{NetzwerkFehler, NetzwerkResult};
use crate::peer::PeerZustand;

/// Grund bei eigener Trennung
pub const GRUND_ABGEMELDET: &str = "Client abgemeldet";

// ---------------------------------------------------------------------------
// Optionen
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ClientOptionen {
    pub user_guid: Uuid,
    pub server_user_guid: Uuid,
    pub locale: String,
    pub positioning_type: PositioningType,
    pub version: Version,
    pub endpunkt: EndpunktConfig,
    /// Zeitlimit fuer Login und Ping
    pub anfrage_timeout: Duration,
    /// Takt der Hintergrund-Schleife
    pub takt: Duration,
    pub client_entity: ClientEntityConfig,
    pub codec: CodecFabrik,
}

impl Default for ClientOptionen {
    fn default() -> Self {
        Self {
            user_guid: Uuid::new_v4(),
            server_user_guid: Uuid::new_v4(),
            locale: "en-US".into(),
            positioning_type: PositioningType::Server,
            version: Version::AKTUELL,
            endpunkt: EndpunktConfig::default(),
            anfrage_timeout: Duration::from_secs(5),
            takt: Duration::from_millis(5),
            client_entity: ClientEntityConfig::default(),
            codec: OpusCodec::fabrik(),
        }
    }
}

impl std::fmt::Debug for ClientOptionen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptionen")
            .field("user_guid", &self.user_guid)
            .field("locale", &self.locale)
            .field("positioning_type", &self.positioning_type)
            .field("version", &self.version)
            .field("anfrage_timeout", &self.anfrage_timeout)
            .field("takt", &self.takt)
            .finish_non_exhaustive()
    }
}

/// Ergebnis einer Discovery-Abfrage
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub motd: String,
    pub clients: u32,
    pub positioning_type: PositioningType,
    pub version: Version,
    pub latenz: Duration,
}

fn ungebunden_fuer(ziel: SocketAddr) -> SocketAddr {
    let ip = match ziel.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Fragt Server-Informationen ab, ohne eine Verbindung aufzubauen
pub async fn server_abfragen(adresse: SocketAddr, timeout: Duration) -> NetzwerkResult<ServerInfo> {
    let socket = UdpSocket::bind(ungebunden_fuer(adresse)).await?;
    let start = Instant::now();
    let tick = (rand::random::<u32>() >> 1) as i32;
    let anfrage = kodieren(
        VerbindungsId::UNVERBUNDEN,
        None,
        &Packet::InfoRequest(InfoRequest { tick }),
    );
    socket.send_to(&anfrage, adresse).await?;

    let info = tokio::time::timeout(timeout, info_empfangen(&socket, adresse, tick))
        .await
        .map_err(|_| NetzwerkFehler::Zeitlimit("Server-Abfrage".into()))??;

    Ok(ServerInfo {
        motd: info.motd,
        clients: info.clients,
        positioning_type: info.positioning_type,
        version: info.version,
        latenz: start.elapsed(),
    })
}

async fn info_empfangen(
    socket: &UdpSocket,
    adresse: SocketAddr,
    tick: i32,
) -> NetzwerkResult<InfoResponse> {
    let mut puffer = vec![0u8; MAX_DATAGRAMM_LAENGE];
    loop {
        let (laenge, absender) = socket.recv_from(&mut puffer).await?;
        if absender != adresse {
            continue;
        }
        match dekodieren(&puffer[..laenge]) {
            Ok((_, Packet::InfoResponse(info))) if info.tick == tick => return Ok(info),
            Ok((header, _)) => tracing::debug!(typ = ?header.typ, "Unerwartete Discovery-Antwort"),
            Err(e) => tracing::debug!(fehler = %e, "Ungueltige Discovery-Antwort"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client-Zustand
// ---------------------------------------------------------------------------

struct ClientZustand {
    endpunkt: Endpunkt,
    anfragen: AnfrageTabelle,
    server: VerbindungsId,
    verbunden: bool,
    eigene_entity: Option<EntityId>,
    welt: Welt,
    server_stumm: bool,
    server_taub: bool,
    getrennt_grund: Option<String>,
}

impl ClientZustand {
    fn schritt(&mut self, jetzt: Instant, registry: &ClientEntityRegistry, effekte: &AudioEffektSystem) {
        let mut ereignisse = self.endpunkt.abfragen(jetzt);
        ereignisse.extend(self.endpunkt.wartung(jetzt));
        for ereignis in ereignisse {
            match ereignis {
                EndpunktEreignis::Paket { peer, paket } if peer == self.server => {
                    self.paket_verarbeiten(&paket, registry, effekte);
                }
                EndpunktEreignis::Getrennt { peer, grund } if peer == self.server => {
                    self.getrennt(&grund);
                }
                _ => {}
            }
        }
        self.anfragen.abgelaufene_entfernen(jetzt);

        // Der Client spiegelt nur; Aenderungen muessen nicht weitergegeben werden
        effekte.ereignisse_entnehmen();
    }

    fn paket_verarbeiten(
        &mut self,
        paket: &Packet,
        registry: &ClientEntityRegistry,
        effekte: &AudioEffektSystem,
    ) {
        match paket {
            Packet::AcceptResponse(accept) => {
                if self.anfragen.aufloesen(accept.request_id, paket.clone()) {
                    self.endpunkt.zustand_setzen(self.server, PeerZustand::Verbunden);
                    self.verbunden = true;
                    self.eigene_entity = Some(accept.entity_id);
                    // Der eigene Schnappschuss kann vor der Antwort eingetroffen sein
                    registry.entfernen(accept.entity_id);
                }
            }
            Packet::DenyResponse(deny) => {
                if self.anfragen.aufloesen(deny.request_id, paket.clone()) && !self.verbunden {
                    self.endpunkt.entfernen(self.server);
                    self.getrennt_grund = Some(deny.grund.clone());
                }
            }
            Packet::PingResponse(ping) => {
                self.anfragen.aufloesen(ping.request_id, paket.clone());
            }
            Packet::EntityCreated(schnappschuss) => {
                let id = schnappschuss.entity_id;
                if !self.welt.existiert(id) {
                    if let Err(e) = self.welt.erstellen(id) {
                        tracing::debug!(entity = %id, fehler = %e, "Entity nicht angelegt");
                        return;
                    }
                }
                if let Ok(entity) = self.welt.entity_mut(id) {
                    entity.schnappschuss_anwenden(schnappschuss);
                }
                if Some(id) != self.eigene_entity && registry.get(id).is_none() {
                    match registry.erstellen(id) {
                        // Unhoerbar, bis der Server Sichtbarkeit meldet
                        Ok(client_entity) => client_entity.sichtbar_setzen(false),
                        Err(e) => tracing::warn!(entity = %id, fehler = %e, "Client-Entity fehlgeschlagen"),
                    }
                }
            }
            Packet::EntityDestroyed(destroyed) => {
                // Der Beobachter raeumt auch die Client-Entity ab
                let _ = self.welt.zerstoeren(destroyed.entity_id);
            }
            Packet::SetVisibility(flag) => {
                if let Some(client_entity) = registry.get(flag.entity_id) {
                    client_entity.sichtbar_setzen(flag.wert);
                }
            }
            Packet::SetEffect(effekt) => {
                effekte.effekt_setzen(effekt.bitmask, effekt.effekt.clone());
            }
            Packet::AudioEvent(audio) => {
                let Some(client_entity) = registry.get(audio.entity_id) else {
                    return;
                };
                if let Err(e) = client_entity.frame_empfangen(audio.timestamp, &audio.daten) {
                    tracing::debug!(entity = %audio.entity_id, fehler = %e, "Audio-Frame verworfen");
                }
            }
            andere => match EntityAenderung::aus_ereignis(andere) {
                Some((id, EntityAenderung::ServerMuted(wert))) if Some(id) == self.eigene_entity => {
                    self.server_stumm = wert;
                }
                Some((id, EntityAenderung::ServerDeafened(wert))) if Some(id) == self.eigene_entity => {
                    self.server_taub = wert;
                }
                Some((id, aenderung)) => {
                    if let Ok(entity) = self.welt.entity_mut(id) {
                        aenderung.anwenden(entity);
                    }
                }
                None => tracing::debug!(typ = ?andere.typ(), "Unerwartetes Paket vom Server"),
            },
        }
    }

    fn getrennt(&mut self, grund: &str) {
        tracing::info!(%grund, "Vom Server getrennt");
        self.verbunden = false;
        self.eigene_entity = None;
        self.anfragen.peer_getrennt(self.server, grund);
        self.welt.leeren();
        self.getrennt_grund = Some(grund.to_string());
    }

    fn verbunden_pruefen(&self) -> NetzwerkResult<()> {
        if self.verbunden {
            Ok(())
        } else {
            Err(NetzwerkFehler::NichtVerbunden)
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceCraftClient
// ---------------------------------------------------------------------------

pub struct VoiceCraftClient {
    zustand: Arc<Mutex<ClientZustand>>,
    registry: Arc<ClientEntityRegistry>,
    effekte: Arc<AudioEffektSystem>,
    encoder: Mutex<Box<dyn AudioCodec>>,
    audio_sequenz: AtomicU32,
    anfrage_timeout: Duration,
    schleife: JoinHandle<()>,
}

impl VoiceCraftClient {
    /// Verbindet sich mit einem Server und wartet auf Accept oder Deny
    pub async fn verbinden(adresse: SocketAddr, optionen: ClientOptionen) -> NetzwerkResult<Self> {
        let mut endpunkt = Endpunkt::binden(ungebunden_fuer(adresse), optionen.endpunkt.clone()).await?;
        let server = endpunkt.verbindung_oeffnen(adresse);

        let login_id = Uuid::new_v4();
        endpunkt.senden(
            server,
            &Packet::LoginRequest(LoginRequest {
                request_id: login_id,
                user_guid: optionen.user_guid,
                server_user_guid: optionen.server_user_guid,
                locale: optionen.locale.clone(),
                positioning_type: optionen.positioning_type,
                version: optionen.version,
            }),
        )?;
        let mut anfragen = AnfrageTabelle::neu();
        let antwort = anfragen.registrieren(
            login_id,
            server,
            "Login",
            optionen.anfrage_timeout,
            Instant::now(),
        );

        let effekte = Arc::new(AudioEffektSystem::default());
        let registry = Arc::new(ClientEntityRegistry::neu(
            optionen.codec.clone(),
            optionen.client_entity.clone(),
        ));
        let mut welt = Welt::neu();
        welt.beobachter_registrieren(registry.clone());
        welt.beobachter_registrieren(effekte.clone());

        let zustand = Arc::new(Mutex::new(ClientZustand {
            endpunkt,
            anfragen,
            server,
            verbunden: false,
            eigene_entity: None,
            welt,
            server_stumm: false,
            server_taub: false,
            getrennt_grund: None,
        }));
        let schleife = schleife_starten(
            zustand.clone(),
            registry.clone(),
            effekte.clone(),
            optionen.takt,
        );

        let client = Self {
            zustand,
            registry,
            effekte,
            encoder: Mutex::new((optionen.codec)()?),
            audio_sequenz: AtomicU32::new(0),
            anfrage_timeout: optionen.anfrage_timeout,
            schleife,
        };

        match antwort_abwarten(antwort).await? {
            Packet::AcceptResponse(accept) => {
                tracing::info!(%adresse, entity = %accept.entity_id, "Mit Server verbunden");
                Ok(client)
            }
            Packet::DenyResponse(deny) => {
                tracing::info!(%adresse, grund = %deny.grund, "Login abgelehnt");
                Err(NetzwerkFehler::Abgelehnt(deny.grund))
            }
            andere => Err(NetzwerkFehler::UnerwarteteAntwort(andere.typ())),
        }
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand.lock().verbunden
    }

    pub fn eigene_entity(&self) -> Option<EntityId> {
        self.zustand.lock().eigene_entity
    }

    pub fn server_stumm(&self) -> bool {
        self.zustand.lock().server_stumm
    }

    pub fn server_taub(&self) -> bool {
        self.zustand.lock().server_taub
    }

    pub fn getrennt_grund(&self) -> Option<String> {
        self.zustand.lock().getrennt_grund.clone()
    }

    pub fn lokale_adresse(&self) -> SocketAddr {
        self.zustand.lock().endpunkt.lokale_adresse()
    }

    pub fn effekte(&self) -> &Arc<AudioEffektSystem> {
        &self.effekte
    }

    pub fn registry(&self) -> &Arc<ClientEntityRegistry> {
        &self.registry
    }

    pub fn client_entity(&self, id: EntityId) -> Option<Arc<ClientEntity>> {
        self.registry.get(id)
    }

    /// Lesender Zugriff auf die gespiegelte Welt
    pub fn welt_lesen<R>(&self, f: impl FnOnce(&Welt) -> R) -> R {
        f(&self.zustand.lock().welt)
    }

    /// Umlaufzeit zum Server
    pub async fn ping(&self) -> NetzwerkResult<Duration> {
        let id = Uuid::new_v4();
        let start = Instant::now();
        let antwort = {
            let mut guard = self.zustand.lock();
            let z = &mut *guard;
            z.verbunden_pruefen()?;
            z.endpunkt
                .senden(z.server, &Packet::PingRequest(PingPacket { request_id: id }))?;
            z.anfragen
                .registrieren(id, z.server, "Ping", self.anfrage_timeout, start)
        };
        match antwort_abwarten(antwort).await? {
            Packet::PingResponse(_) => Ok(start.elapsed()),
            andere => Err(NetzwerkFehler::UnerwarteteAntwort(andere.typ())),
        }
    }

    /// Kodiert einen Mono-Frame und sendet ihn an den Server
    pub fn audio_senden(&self, samples: &[f32], frame_loudness: f32) -> NetzwerkResult<()> {
        let daten = self.encoder.lock().encode(samples)?;
        nutzdaten_pruefen(&daten, MAX_AUDIO_LAENGE)?;
        let timestamp = self.audio_sequenz.fetch_add(1, Ordering::Relaxed);
        self.anfrage_senden(&Packet::AudioRequest(AudioRequest {
            timestamp,
            frame_loudness,
            daten,
        }))
    }

    pub fn position_setzen(&self, position: Vec3) -> NetzwerkResult<()> {
        self.anfrage_senden(&Packet::SetPositionRequest(PositionRequest { position }))
    }

    pub fn rotation_setzen(&self, rotation: Vec2) -> NetzwerkResult<()> {
        self.anfrage_senden(&Packet::SetRotationRequest(RotationRequest { rotation }))
    }

    pub fn world_id_setzen(&self, world_id: &str) -> NetzwerkResult<()> {
        self.anfrage_senden(&Packet::SetWorldIdRequest(WeltRequest {
            world_id: world_id.to_string(),
        }))
    }

    pub fn cave_factor_setzen(&self, wert: f32) -> NetzwerkResult<()> {
        self.anfrage_senden(&Packet::SetCaveFactorRequest(FaktorRequest { wert }))
    }

    pub fn muffle_factor_setzen(&self, wert: f32) -> NetzwerkResult<()> {
        self.anfrage_senden(&Packet::SetMuffleFactorRequest(FaktorRequest { wert }))
    }

    pub fn muted_setzen(&self, wert: bool) -> NetzwerkResult<()> {
        self.anfrage_senden(&Packet::SetMuteRequest(FlagRequest { wert }))
    }

    pub fn deafened_setzen(&self, wert: bool) -> NetzwerkResult<()> {
        self.anfrage_senden(&Packet::SetDeafenRequest(FlagRequest { wert }))
    }

    fn anfrage_senden(&self, paket: &Packet) -> NetzwerkResult<()> {
        let mut guard = self.zustand.lock();
        let z = &mut *guard;
        z.verbunden_pruefen()?;
        z.endpunkt.senden(z.server, paket)
    }

    /// Mischt alle hoerbaren Sprecher fuer die eigene Entity
    ///
    /// Ist der Zustand gerade gesperrt, bleibt die Ausgabe still, damit der
    /// Audio-Callback nie blockiert.
    pub fn mischen(&self, mischer: &mut Mischer, ausgabe: &mut [f32]) -> usize {
        let Some(zustand) = self.zustand.try_lock() else {
            ausgabe.fill(0.0);
            return 0;
        };
        let Some(hoerer) = zustand.eigene_entity else {
            ausgabe.fill(0.0);
            return 0;
        };
        if zustand.server_taub {
            ausgabe.fill(0.0);
            return 0;
        }
        mischer.mischen(&zustand.welt, hoerer, &self.registry, ausgabe)
    }

    /// Trennt die Verbindung; offene Anfragen schlagen mit `Getrennt` fehl
    pub fn trennen(&self, grund: &str) {
        let mut guard = self.zustand.lock();
        let z = &mut *guard;
        if z.endpunkt.peers().enthaelt(z.server) {
            z.endpunkt.trennen(z.server, grund);
        }
        z.anfragen.alle_abbrechen(grund);
        z.verbunden = false;
        z.eigene_entity = None;
        z.welt.leeren();
        z.getrennt_grund = Some(grund.to_string());
        tracing::info!(%grund, "Verbindung getrennt");
    }
}

impl Drop for VoiceCraftClient {
    fn drop(&mut self) {
        self.schleife.abort();
    }
}

impl std::fmt::Debug for VoiceCraftClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceCraftClient")
            .field("client_entities", &self.registry.anzahl())
            .field("effekte", &self.effekte.anzahl())
            .finish_non_exhaustive()
    }
}

fn schleife_starten(
    zustand: Arc<Mutex<ClientZustand>>,
    registry: Arc<ClientEntityRegistry>,
    effekte: Arc<AudioEffektSystem>,
    takt: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut intervall = tokio::time::interval(takt);
        intervall.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            intervall.tick().await;
            zustand.lock().schritt(Instant::now(), &registry, &effekte);
        }
    })
}

async fn antwort_abwarten(antwort: AnfrageEmpfaenger) -> NetzwerkResult<Packet> {
    antwort
        .await
        .unwrap_or_else(|_: oneshot::error::RecvError| Err(NetzwerkFehler::Getrennt("Client beendet".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungebundene_adresse_passt_zur_familie() {
        let v4: SocketAddr = "10.0.0.1:9050".parse().unwrap();
        let v6: SocketAddr = "[::1]:9050".parse().unwrap();
        assert!(ungebunden_fuer(v4).is_ipv4());
        assert!(ungebunden_fuer(v6).is_ipv6());
        assert_eq!(ungebunden_fuer(v4).port(), 0);
    }

    #[test]
    fn standard_optionen_kodieren_opus() {
        use voicecraft_protocol::audio::SAMPLES_PRO_FRAME;

        let optionen = ClientOptionen::default();
        let mut codec = (optionen.codec)().unwrap();
        let frame: Vec<f32> = (0..SAMPLES_PRO_FRAME)
            .map(|i| (i as f32 / 40.0).sin() * 0.5)
            .collect();
        let daten = codec.encode(&frame).unwrap();
        // Komprimierte Opus-Frames, keine Rohsamples
        assert!(!daten.is_empty());
        assert!(daten.len() < SAMPLES_PRO_FRAME / 2, "{} Bytes", daten.len());
        assert_eq!(codec.decode(Some(&daten)).unwrap().len(), SAMPLES_PRO_FRAME);
    }

    #[tokio::test]
    async fn abfrage_ohne_server_laeuft_ab() {
        // Gebundener, aber stummer Socket
        let stumm = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let ergebnis = server_abfragen(stumm.local_addr().unwrap(), Duration::from_millis(50)).await;
        assert!(matches!(ergebnis, Err(NetzwerkFehler::Zeitlimit(_))));
    }
}
