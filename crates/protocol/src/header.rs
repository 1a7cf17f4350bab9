//! Paket-Header und Datagramm-Framing
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   PacketType
//!  1       8   Verbindungs-ID (i64, little-endian)
//!  9       4   Sequenz (u32, little-endian) – nur bei zuverlaessigen Typen
//!  9/13    N   Typspezifische Felder
//! ```

use bytes::Bytes;
use voicecraft_core::VerbindungsId;

use crate::error::ProtokollFehler;
use crate::packet::{Packet, PacketType};
use crate::puffer::{PaketLeser, PaketSchreiber};

/// Header-Laenge ohne Sequenz
pub const HEADER_BASIS_LAENGE: usize = 9;

/// Header-Laenge zuverlaessiger Pakete
pub const HEADER_ZUVERLAESSIG_LAENGE: usize = 13;

/// Maximale Datagrammgroesse, die gelesen wird
pub const MAX_DATAGRAMM_LAENGE: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaketHeader {
    pub typ: PacketType,
    pub verbindung: VerbindungsId,
    /// Nur bei zuverlaessigen Pakettypen vorhanden
    pub sequenz: Option<u32>,
}

impl PaketHeader {
    pub fn neu(typ: PacketType, verbindung: VerbindungsId, sequenz: Option<u32>) -> Self {
        Self {
            typ,
            verbindung,
            sequenz,
        }
    }

    pub fn schreiben(&self, w: &mut PaketSchreiber) {
        w.u8(self.typ as u8);
        w.i64(self.verbindung.0);
        if self.typ.ist_zuverlaessig() {
            w.u32(self.sequenz.unwrap_or(0));
        }
    }

    pub fn lesen(r: &mut PaketLeser<'_>) -> Result<Self, ProtokollFehler> {
        let roh = r.u8()?;
        let typ = PacketType::from_u8(roh).ok_or(ProtokollFehler::UnbekannterTyp(roh))?;
        let verbindung = VerbindungsId(r.i64()?);
        let sequenz = if typ.ist_zuverlaessig() {
            Some(r.u32()?)
        } else {
            None
        };
        Ok(Self {
            typ,
            verbindung,
            sequenz,
        })
    }

    pub fn laenge(&self) -> usize {
        if self.typ.ist_zuverlaessig() {
            HEADER_ZUVERLAESSIG_LAENGE
        } else {
            HEADER_BASIS_LAENGE
        }
    }
}

/// Serialisiert Header und Inhalt zu einem Datagramm
pub fn kodieren(verbindung: VerbindungsId, sequenz: Option<u32>, paket: &Packet) -> Bytes {
    let header = PaketHeader::neu(paket.typ(), verbindung, sequenz);
    let mut w = PaketSchreiber::mit_kapazitaet(header.laenge() + 32);
    header.schreiben(&mut w);
    paket.inhalt_schreiben(&mut w);
    w.fertig()
}

/// Dekodiert ein Datagramm in eine frische Paket-Instanz
///
/// Der Empfangspfad verwendet stattdessen `PaketPool::dekodieren`.
pub fn dekodieren(daten: &[u8]) -> Result<(PaketHeader, Packet), ProtokollFehler> {
    let mut r = PaketLeser::neu(daten);
    let header = PaketHeader::lesen(&mut r)?;
    let mut paket = Packet::leer(header.typ);
    paket.inhalt_lesen(&mut r)?;
    Ok((header, paket))
}
