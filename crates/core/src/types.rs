//! Gemeinsame Identifikations- und Wertetypen fuer VoiceCraft
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Entity-IDs und Verbindungs-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};

/// 16-Bit Kanal-Bitmaske (Talk/Listen/Effect)
pub type Bitmask = u16;

/// Bitmaske mit allen Kanaelen gesetzt
pub const BITMASK_ALLE: Bitmask = u16::MAX;

/// Eindeutige Entity-ID innerhalb einer Welt
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub i32);

impl EntityId {
    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Verbindungs-ID eines Transport-Peers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerbindungsId(pub i64);

impl VerbindungsId {
    /// Reservierte ID fuer unverbundene Pakete (Discovery)
    pub const UNVERBUNDEN: VerbindungsId = VerbindungsId(0);

    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer:{:016x}", self.0)
    }
}

/// Ob Positionen vom Server (Bridge) oder vom Client geliefert werden
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PositioningType {
    /// Server ist autoritativ (Positionen kommen aus Bridge-Quellen)
    #[default]
    Server = 0,
    /// Client liefert seine eigene Position
    Client = 1,
}

impl PositioningType {
    /// Konvertiert ein Byte in einen `PositioningType`
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Server),
            1 => Some(Self::Client),
            _ => None,
        }
    }
}

/// Protokoll-/Anwendungsversion
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
}

impl Version {
    /// Aktuelle Version des Kerns
    pub const AKTUELL: Version = Version::neu(1, 1, 0);

    pub const fn neu(major: u16, minor: u16, build: u16) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }

    /// Versionen sind kompatibel wenn Major und Minor uebereinstimmen
    pub fn kompatibel(&self, andere: &Version) -> bool {
        self.major == andere.major && self.minor == andere.minor
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}
