//! Fehlertypen fuer VoiceCraft
//!
//! Zentraler Fehler-Enum der die Fehler-Taxonomie des Kerns abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `From` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer VoiceCraft
pub type Result<T> = std::result::Result<T, VoiceCraftError>;

/// Alle moeglichen Fehler im VoiceCraft-Kern
#[derive(Debug, Error)]
pub enum VoiceCraftError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung abgelehnt: {0}")]
    VerbindungAbgelehnt(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    #[error("Nicht verbunden")]
    NichtVerbunden,

    #[error("Server voll: maximale Clientanzahl erreicht")]
    ServerVoll,

    // --- Protokoll ---
    #[error("Ungueltiges Paket: {0}")]
    UngueltigesPaket(String),

    // --- Audio ---
    #[error("Sequenz-Luecke zu gross: erwartet={erwartet}, erhalten={erhalten}")]
    SequenzLueckeZuGross { erwartet: u32, erhalten: u32 },

    #[error("Codec-Fehler: {0}")]
    Codec(String),

    // --- Lebenszyklus ---
    #[error("Zugriff nach Zerstoerung: {0}")]
    NachZerstoerung(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VoiceCraftError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Getrennt(_) | Self::NichtVerbunden
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = VoiceCraftError::VerbindungAbgelehnt("Server voll".into());
        assert_eq!(e.to_string(), "Verbindung abgelehnt: Server voll");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(VoiceCraftError::Zeitlimit("login".into()).ist_wiederholbar());
        assert!(VoiceCraftError::Getrennt("timeout".into()).ist_wiederholbar());
        assert!(!VoiceCraftError::VerbindungAbgelehnt("x".into()).ist_wiederholbar());
        assert!(!VoiceCraftError::UngueltigesPaket("x".into()).ist_wiederholbar());
    }

    #[test]
    fn sequenz_luecke_fehler() {
        let e = VoiceCraftError::SequenzLueckeZuGross {
            erwartet: 4,
            erhalten: 9,
        };
        assert!(e.to_string().contains("erwartet=4"));
        assert!(e.to_string().contains("erhalten=9"));
    }
}
