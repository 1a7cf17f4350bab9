//! Paket-Taxonomie (geschlossen und aufzaehlbar)
//!
//! Drei Gruppen:
//! - **Requests**: Absichten des Clients an den Server
//! - **Responses**: Bestaetigung, Ablehnung, Server-Info
//! - **Events**: Einweg-Zustandsmeldungen vom Server an die Clients
//!
//! Dazu kommen die Transport-Steuerpakete `Ack`, `Disconnect` und `KeepAlive`.
//! Jeder Pakettyp belegt ein festes Typ-Byte als Wire-Praefix und legt fest,
//! ob er zuverlaessig zugestellt wird.

use glam::{Vec2, Vec3};
use uuid::Uuid;
use voicecraft_core::{Bitmask, EntityId, PositioningType, Version};

use crate::effekt::{EffektParameter, EffektTyp};
use crate::error::ProtokollFehler;
use crate::puffer::{PaketLeser, PaketSchreiber};

/// Maximale Laenge fuer Freitext (MOTD, Gruende, Namen)
pub const MAX_STRING_LAENGE: usize = 512;

/// Maximale Laenge fuer kurze Bezeichner (Locale, Welt-ID)
pub const MAX_KURZSTRING_LAENGE: usize = 128;

/// Maximale Audio-Nutzdaten pro Paket (typisches Opus-MTU-Limit)
pub const MAX_AUDIO_LAENGE: usize = 1280;

// ---------------------------------------------------------------------------
// PacketType
// ---------------------------------------------------------------------------

/// Typ-Byte jedes Pakets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    // --- Transport ---
    Ack = 0,
    Disconnect = 1,
    KeepAlive = 2,

    // --- Requests ---
    LoginRequest = 10,
    InfoRequest = 11,
    PingRequest = 12,
    LogoutRequest = 13,
    AudioRequest = 14,
    SetPositionRequest = 15,
    SetRotationRequest = 16,
    SetWorldIdRequest = 17,
    SetCaveFactorRequest = 18,
    SetMuffleFactorRequest = 19,
    SetMuteRequest = 20,
    SetDeafenRequest = 21,

    // --- Responses ---
    AcceptResponse = 40,
    DenyResponse = 41,
    InfoResponse = 42,
    PingResponse = 43,

    // --- Events ---
    EntityCreated = 60,
    EntityDestroyed = 61,
    SetPosition = 62,
    SetRotation = 63,
    SetWorldId = 64,
    SetCaveFactor = 65,
    SetMuffleFactor = 66,
    SetTalkBitmask = 67,
    SetListenBitmask = 68,
    SetEffectBitmask = 69,
    SetMute = 70,
    SetDeafen = 71,
    SetServerMute = 72,
    SetServerDeafen = 73,
    SetVisibility = 74,
    SetEffect = 75,
    AudioEvent = 76,
}

impl PacketType {
    pub const ALLE: [PacketType; 36] = [
        PacketType::Ack,
        PacketType::Disconnect,
        PacketType::KeepAlive,
        PacketType::LoginRequest,
        PacketType::InfoRequest,
        PacketType::PingRequest,
        PacketType::LogoutRequest,
        PacketType::AudioRequest,
        PacketType::SetPositionRequest,
        PacketType::SetRotationRequest,
        PacketType::SetWorldIdRequest,
        PacketType::SetCaveFactorRequest,
        PacketType::SetMuffleFactorRequest,
        PacketType::SetMuteRequest,
        PacketType::SetDeafenRequest,
        PacketType::AcceptResponse,
        PacketType::DenyResponse,
        PacketType::InfoResponse,
        PacketType::PingResponse,
        PacketType::EntityCreated,
        PacketType::EntityDestroyed,
        PacketType::SetPosition,
        PacketType::SetRotation,
        PacketType::SetWorldId,
        PacketType::SetCaveFactor,
        PacketType::SetMuffleFactor,
        PacketType::SetTalkBitmask,
        PacketType::SetListenBitmask,
        PacketType::SetEffectBitmask,
        PacketType::SetMute,
        PacketType::SetDeafen,
        PacketType::SetServerMute,
        PacketType::SetServerDeafen,
        PacketType::SetVisibility,
        PacketType::SetEffect,
        PacketType::AudioEvent,
    ];
}

impl PacketType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALLE.iter().copied().find(|t| *t as u8 == byte)
    }

    /// Zuverlaessige Pakete tragen eine Sequenznummer und werden bestaetigt.
    ///
    /// Unzuverlaessig sind Transport-Steuerpakete, Discovery, Audio und die
    /// hochfrequenten Positions-/Rotationsupdates (ein verlorenes Update wird
    /// vom naechsten ersetzt).
    pub fn ist_zuverlaessig(self) -> bool {
        !matches!(
            self,
            PacketType::Ack
                | PacketType::Disconnect
                | PacketType::KeepAlive
                | PacketType::InfoRequest
                | PacketType::InfoResponse
                | PacketType::AudioRequest
                | PacketType::AudioEvent
                | PacketType::SetPositionRequest
                | PacketType::SetRotationRequest
                | PacketType::SetPosition
                | PacketType::SetRotation
        )
    }

    /// Darf ohne bestehende Verbindung gesendet werden
    pub fn ist_unverbunden(self) -> bool {
        matches!(
            self,
            PacketType::InfoRequest | PacketType::InfoResponse | PacketType::LoginRequest
        )
    }
}

// ---------------------------------------------------------------------------
// PaketInhalt
// ---------------------------------------------------------------------------

/// Serialisierung der typspezifischen Felder (ohne Header)
///
/// `lesen` ueberschreibt den bestehenden Inhalt, damit gepoolte Instanzen
/// ihre String- und Vec-Kapazitaet behalten.
pub trait PaketInhalt: Default {
    fn schreiben(&self, w: &mut PaketSchreiber);
    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler>;
}

fn positioning_lesen(r: &mut PaketLeser<'_>) -> Result<PositioningType, ProtokollFehler> {
    let roh = r.u8()?;
    PositioningType::from_u8(roh).ok_or(ProtokollFehler::UngueltigerWert {
        feld: "positioning_type",
        wert: roh as i64,
    })
}

fn version_schreiben(w: &mut PaketSchreiber, v: &Version) {
    w.u16(v.major);
    w.u16(v.minor);
    w.u16(v.build);
}

fn version_lesen(r: &mut PaketLeser<'_>) -> Result<Version, ProtokollFehler> {
    Ok(Version::neu(r.u16()?, r.u16()?, r.u16()?))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Bestaetigt ein zuverlaessiges Paket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckPacket {
    pub sequenz: u32,
}

impl PaketInhalt for AckPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.u32(self.sequenz);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.sequenz = r.u32()?;
        Ok(())
    }
}

/// Verbindungsabbau (von beiden Seiten)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectPacket {
    pub grund: String,
}

impl PaketInhalt for DisconnectPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.string(&self.grund, MAX_STRING_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        r.string_in(&mut self.grund, MAX_STRING_LAENGE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepAlivePacket;

impl PaketInhalt for KeepAlivePacket {
    fn schreiben(&self, _w: &mut PaketSchreiber) {}

    fn lesen(&mut self, _r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Anmeldung mit frischer Korrelations-ID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    pub request_id: Uuid,
    pub user_guid: Uuid,
    pub server_user_guid: Uuid,
    pub locale: String,
    pub positioning_type: PositioningType,
    pub version: Version,
}

impl PaketInhalt for LoginRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.uuid(&self.request_id);
        w.uuid(&self.user_guid);
        w.uuid(&self.server_user_guid);
        w.string(&self.locale, MAX_KURZSTRING_LAENGE);
        w.u8(self.positioning_type as u8);
        version_schreiben(w, &self.version);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.request_id = r.uuid()?;
        self.user_guid = r.uuid()?;
        self.server_user_guid = r.uuid()?;
        r.string_in(&mut self.locale, MAX_KURZSTRING_LAENGE)?;
        self.positioning_type = positioning_lesen(r)?;
        self.version = version_lesen(r)?;
        Ok(())
    }
}

/// Unverbundene Discovery-Anfrage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoRequest {
    pub tick: i32,
}

impl PaketInhalt for InfoRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.tick);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.tick = r.i32()?;
        Ok(())
    }
}

/// Ping im verbundenen Zustand (auch fuer `PingResponse` verwendet)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingPacket {
    pub request_id: Uuid,
}

impl PaketInhalt for PingPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.uuid(&self.request_id);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.request_id = r.uuid()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutRequest {
    pub grund: String,
}

impl PaketInhalt for LogoutRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.string(&self.grund, MAX_STRING_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        r.string_in(&mut self.grund, MAX_STRING_LAENGE)
    }
}

/// Kodierter Audio-Frame vom Client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioRequest {
    /// Sequenz des Frames im Sprecher-Stream
    pub timestamp: u32,
    pub frame_loudness: f32,
    pub daten: Vec<u8>,
}

impl PaketInhalt for AudioRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.u32(self.timestamp);
        w.f32(self.frame_loudness);
        w.bytes(&self.daten, MAX_AUDIO_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.timestamp = r.u32()?;
        self.frame_loudness = r.f32()?;
        r.bytes_in(&mut self.daten, MAX_AUDIO_LAENGE)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionRequest {
    pub position: Vec3,
}

impl PaketInhalt for PositionRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.vec3(self.position);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.position = r.vec3()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationRequest {
    pub rotation: Vec2,
}

impl PaketInhalt for RotationRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.vec2(self.rotation);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.rotation = r.vec2()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeltRequest {
    pub world_id: String,
}

impl PaketInhalt for WeltRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.string(&self.world_id, MAX_KURZSTRING_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        r.string_in(&mut self.world_id, MAX_KURZSTRING_LAENGE)
    }
}

/// Cave- oder Muffle-Faktor (0..1)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaktorRequest {
    pub wert: f32,
}

impl PaketInhalt for FaktorRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.f32(self.wert);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.wert = r.f32()?;
        Ok(())
    }
}

/// Mute- oder Deafen-Flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagRequest {
    pub wert: bool,
}

impl PaketInhalt for FlagRequest {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.bool(self.wert);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.wert = r.bool()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptResponse {
    pub request_id: Uuid,
    /// Entity, die dem Client auf dem Server zugeordnet wurde
    pub entity_id: EntityId,
}

impl PaketInhalt for AcceptResponse {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.uuid(&self.request_id);
        w.i32(self.entity_id.0);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.request_id = r.uuid()?;
        self.entity_id = EntityId(r.i32()?);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyResponse {
    pub request_id: Uuid,
    pub grund: String,
}

impl PaketInhalt for DenyResponse {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.uuid(&self.request_id);
        w.string(&self.grund, MAX_STRING_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.request_id = r.uuid()?;
        r.string_in(&mut self.grund, MAX_STRING_LAENGE)
    }
}

/// Antwort auf eine unverbundene Discovery-Anfrage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoResponse {
    pub motd: String,
    pub clients: u32,
    pub positioning_type: PositioningType,
    /// Echo des Ticks aus dem `InfoRequest` (Laufzeitmessung)
    pub tick: i32,
    pub version: Version,
}

impl PaketInhalt for InfoResponse {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.string(&self.motd, MAX_STRING_LAENGE);
        w.u32(self.clients);
        w.u8(self.positioning_type as u8);
        w.i32(self.tick);
        version_schreiben(w, &self.version);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        r.string_in(&mut self.motd, MAX_STRING_LAENGE)?;
        self.clients = r.u32()?;
        self.positioning_type = positioning_lesen(r)?;
        self.tick = r.i32()?;
        self.version = version_lesen(r)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Vollstaendiger Entity-Schnappschuss
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCreatedPacket {
    pub entity_id: EntityId,
    pub name: String,
    pub muted: bool,
    pub deafened: bool,
    pub talk_bitmask: Bitmask,
    pub listen_bitmask: Bitmask,
    pub effect_bitmask: Bitmask,
    pub position: Vec3,
    pub rotation: Vec2,
    pub cave_factor: f32,
    pub muffle_factor: f32,
    pub world_id: String,
}

impl PaketInhalt for EntityCreatedPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.string(&self.name, MAX_KURZSTRING_LAENGE);
        w.bool(self.muted);
        w.bool(self.deafened);
        w.u16(self.talk_bitmask);
        w.u16(self.listen_bitmask);
        w.u16(self.effect_bitmask);
        w.vec3(self.position);
        w.vec2(self.rotation);
        w.f32(self.cave_factor);
        w.f32(self.muffle_factor);
        w.string(&self.world_id, MAX_KURZSTRING_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        r.string_in(&mut self.name, MAX_KURZSTRING_LAENGE)?;
        self.muted = r.bool()?;
        self.deafened = r.bool()?;
        self.talk_bitmask = r.u16()?;
        self.listen_bitmask = r.u16()?;
        self.effect_bitmask = r.u16()?;
        self.position = r.vec3()?;
        self.rotation = r.vec2()?;
        self.cave_factor = r.f32()?;
        self.muffle_factor = r.f32()?;
        r.string_in(&mut self.world_id, MAX_KURZSTRING_LAENGE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDestroyedPacket {
    pub entity_id: EntityId,
}

impl PaketInhalt for EntityDestroyedPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPositionPacket {
    pub entity_id: EntityId,
    pub position: Vec3,
}

impl PaketInhalt for EntityPositionPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.vec3(self.position);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        self.position = r.vec3()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRotationPacket {
    pub entity_id: EntityId,
    pub rotation: Vec2,
}

impl PaketInhalt for EntityRotationPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.vec2(self.rotation);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        self.rotation = r.vec2()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityWeltPacket {
    pub entity_id: EntityId,
    pub world_id: String,
}

impl PaketInhalt for EntityWeltPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.string(&self.world_id, MAX_KURZSTRING_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        r.string_in(&mut self.world_id, MAX_KURZSTRING_LAENGE)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityFaktorPacket {
    pub entity_id: EntityId,
    pub wert: f32,
}

impl PaketInhalt for EntityFaktorPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.f32(self.wert);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        self.wert = r.f32()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityBitmaskPacket {
    pub entity_id: EntityId,
    pub bitmask: Bitmask,
}

impl PaketInhalt for EntityBitmaskPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.u16(self.bitmask);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        self.bitmask = r.u16()?;
        Ok(())
    }
}

/// Mute/Deafen/ServerMute/ServerDeafen/Visibility einer Entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFlagPacket {
    pub entity_id: EntityId,
    pub wert: bool,
}

impl PaketInhalt for EntityFlagPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.bool(self.wert);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        self.wert = r.bool()?;
        Ok(())
    }
}

/// Effekt fuer eine Bitmaske setzen; `None` entfernt ihn (Typ-Byte 0)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetEffectPacket {
    pub bitmask: Bitmask,
    pub effekt: Option<EffektParameter>,
}

impl PaketInhalt for SetEffectPacket {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.u16(self.bitmask);
        match &self.effekt {
            Some(p) => p.schreiben(w),
            None => w.u8(0),
        }
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.bitmask = r.u16()?;
        let roh = r.u8()?;
        self.effekt = match roh {
            0 => None,
            _ => {
                let typ = EffektTyp::from_u8(roh).ok_or(ProtokollFehler::UngueltigerWert {
                    feld: "effekt_typ",
                    wert: roh as i64,
                })?;
                Some(EffektParameter::lesen_nach_typ(typ, r)?)
            }
        };
        Ok(())
    }
}

/// Weitergeleiteter Audio-Frame eines Sprechers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioEvent {
    pub entity_id: EntityId,
    pub timestamp: u32,
    pub frame_loudness: f32,
    pub daten: Vec<u8>,
}

impl PaketInhalt for AudioEvent {
    fn schreiben(&self, w: &mut PaketSchreiber) {
        w.i32(self.entity_id.0);
        w.u32(self.timestamp);
        w.f32(self.frame_loudness);
        w.bytes(&self.daten, MAX_AUDIO_LAENGE);
    }

    fn lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
        self.entity_id = EntityId(r.i32()?);
        self.timestamp = r.u32()?;
        self.frame_loudness = r.f32()?;
        r.bytes_in(&mut self.daten, MAX_AUDIO_LAENGE)
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

macro_rules! pakete {
    ($($name:ident($inhalt:ty)),* $(,)?) => {
        /// Ein Paket mit typspezifischem Inhalt
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $($name($inhalt)),*
        }

        impl Packet {
            pub fn typ(&self) -> PacketType {
                match self {
                    $(Packet::$name(_) => PacketType::$name),*
                }
            }

            /// Leere Instanz eines Typs (Ziel fuer `inhalt_lesen`)
            pub fn leer(typ: PacketType) -> Self {
                match typ {
                    $(PacketType::$name => Packet::$name(<$inhalt>::default())),*
                }
            }

            pub fn inhalt_schreiben(&self, w: &mut PaketSchreiber) {
                match self {
                    $(Packet::$name(p) => p.schreiben(w)),*
                }
            }

            /// Liest den Inhalt in die bestehende Instanz und prueft das Paketende
            pub fn inhalt_lesen(&mut self, r: &mut PaketLeser<'_>) -> Result<(), ProtokollFehler> {
                match self {
                    $(Packet::$name(p) => p.lesen(r)?),*
                }
                r.ende_pruefen()
            }
        }
    };
}

pakete! {
    Ack(AckPacket),
    Disconnect(DisconnectPacket),
    KeepAlive(KeepAlivePacket),
    LoginRequest(LoginRequest),
    InfoRequest(InfoRequest),
    PingRequest(PingPacket),
    LogoutRequest(LogoutRequest),
    AudioRequest(AudioRequest),
    SetPositionRequest(PositionRequest),
    SetRotationRequest(RotationRequest),
    SetWorldIdRequest(WeltRequest),
    SetCaveFactorRequest(FaktorRequest),
    SetMuffleFactorRequest(FaktorRequest),
    SetMuteRequest(FlagRequest),
    SetDeafenRequest(FlagRequest),
    AcceptResponse(AcceptResponse),
    DenyResponse(DenyResponse),
    InfoResponse(InfoResponse),
    PingResponse(PingPacket),
    EntityCreated(EntityCreatedPacket),
    EntityDestroyed(EntityDestroyedPacket),
    SetPosition(EntityPositionPacket),
    SetRotation(EntityRotationPacket),
    SetWorldId(EntityWeltPacket),
    SetCaveFactor(EntityFaktorPacket),
    SetMuffleFactor(EntityFaktorPacket),
    SetTalkBitmask(EntityBitmaskPacket),
    SetListenBitmask(EntityBitmaskPacket),
    SetEffectBitmask(EntityBitmaskPacket),
    SetMute(EntityFlagPacket),
    SetDeafen(EntityFlagPacket),
    SetServerMute(EntityFlagPacket),
    SetServerDeafen(EntityFlagPacket),
    SetVisibility(EntityFlagPacket),
    SetEffect(SetEffectPacket),
    AudioEvent(AudioEvent),
}

impl Packet {
    /// Korrelations-ID, falls der Pakettyp eine traegt
    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            Packet::LoginRequest(p) => Some(p.request_id),
            Packet::PingRequest(p) | Packet::PingResponse(p) => Some(p.request_id),
            Packet::AcceptResponse(p) => Some(p.request_id),
            Packet::DenyResponse(p) => Some(p.request_id),
            _ => None,
        }
    }
}
