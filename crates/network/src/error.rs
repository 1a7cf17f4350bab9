//! Fehlertypen fuer Verbindungen und Zustellung

use thiserror::Error;
use voicecraft_core::{VerbindungsId, VoiceCraftError};
use voicecraft_protocol::{PacketType, ProtokollFehler};
use voicecraft_voice::VoiceFehler;
use voicecraft_world::WeltFehler;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetzwerkFehler {
    #[error("E/A-Fehler: {0}")]
    Io(String),

    #[error(transparent)]
    Protokoll(#[from] ProtokollFehler),

    #[error("Verbindung abgelehnt: {0}")]
    Abgelehnt(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    #[error("Unbekannter Peer: {0}")]
    UnbekannterPeer(VerbindungsId),

    #[error("Nicht verbunden")]
    NichtVerbunden,

    #[error("Unerwartete Antwort: {0:?}")]
    UnerwarteteAntwort(PacketType),

    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Voice(#[from] VoiceFehler),

    #[error(transparent)]
    Welt(#[from] WeltFehler),
}

pub type NetzwerkResult<T> = std::result::Result<T, NetzwerkFehler>;

impl From<std::io::Error> for NetzwerkFehler {
    fn from(e: std::io::Error) -> Self {
        NetzwerkFehler::Io(e.to_string())
    }
}

impl From<NetzwerkFehler> for VoiceCraftError {
    fn from(e: NetzwerkFehler) -> Self {
        match e {
            NetzwerkFehler::Protokoll(p) => p.into(),
            NetzwerkFehler::Abgelehnt(g) => VoiceCraftError::VerbindungAbgelehnt(g),
            NetzwerkFehler::Getrennt(g) => VoiceCraftError::Getrennt(g),
            NetzwerkFehler::Zeitlimit(w) => VoiceCraftError::Zeitlimit(w),
            NetzwerkFehler::NichtVerbunden | NetzwerkFehler::UnbekannterPeer(_) => {
                VoiceCraftError::NichtVerbunden
            }
            NetzwerkFehler::Voice(v) => v.into(),
            NetzwerkFehler::Welt(w) => w.into(),
            andere => VoiceCraftError::Intern(andere.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbildung_auf_kernfehler() {
        let e: VoiceCraftError = NetzwerkFehler::Zeitlimit("Login".into()).into();
        assert!(matches!(e, VoiceCraftError::Zeitlimit(_)));
        assert!(e.ist_wiederholbar());

        let e: VoiceCraftError = NetzwerkFehler::Abgelehnt("Server voll".into()).into();
        assert_eq!(e.to_string(), "Verbindung abgelehnt: Server voll");

        let e: VoiceCraftError = NetzwerkFehler::Protokoll(ProtokollFehler::Utf8).into();
        assert!(matches!(e, VoiceCraftError::UngueltigesPaket(_)));
    }
}
