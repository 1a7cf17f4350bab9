//! Fehlertypen fuer das Paketprotokoll

use thiserror::Error;
use voicecraft_core::VoiceCraftError;

/// Fehler beim Dekodieren eines Pakets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtokollFehler {
    #[error("Paket zu kurz: {benoetigt} Bytes benoetigt, {vorhanden} vorhanden")]
    ZuKurz { benoetigt: usize, vorhanden: usize },

    #[error("Unbekannter Pakettyp: {0}")]
    UnbekannterTyp(u8),

    #[error("String zu lang: {laenge} Bytes (Maximum {maximum})")]
    StringZuLang { laenge: usize, maximum: usize },

    #[error("Nutzdaten zu lang: {laenge} Bytes (Maximum {maximum})")]
    NutzdatenZuLang { laenge: usize, maximum: usize },

    #[error("Ungueltiges UTF-8 in String-Feld")]
    Utf8,

    #[error("Ungueltiger Wert fuer {feld}: {wert}")]
    UngueltigerWert { feld: &'static str, wert: i64 },

    #[error("{0} ueberschuessige Bytes nach Paketende")]
    Ueberschuss(usize),
}

impl From<ProtokollFehler> for VoiceCraftError {
    fn from(e: ProtokollFehler) -> Self {
        VoiceCraftError::UngueltigesPaket(e.to_string())
    }
}
