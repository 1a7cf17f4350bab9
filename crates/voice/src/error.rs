//! Fehlertypen des Empfangspfads

use thiserror::Error;
use voicecraft_core::{EntityId, VoiceCraftError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceFehler {
    #[error("Codec-Fehler: {0}")]
    Codec(String),

    #[error("Client-Entity {0} wurde bereits zerstoert")]
    Zerstoert(EntityId),

    #[error("Ungueltige Frame-Laenge: {laenge} Samples (erwartet {erwartet})")]
    FrameLaenge { laenge: usize, erwartet: usize },
}

pub type VoiceResult<T> = std::result::Result<T, VoiceFehler>;

impl From<VoiceFehler> for VoiceCraftError {
    fn from(e: VoiceFehler) -> Self {
        match e {
            VoiceFehler::Codec(s) => VoiceCraftError::Codec(s),
            VoiceFehler::Zerstoert(id) => VoiceCraftError::NachZerstoerung(id.to_string()),
            andere => VoiceCraftError::Intern(andere.to_string()),
        }
    }
}
