//! Fehlertypen der Entity-Welt und des Effekt-Systems

use thiserror::Error;
use voicecraft_core::{EntityId, VoiceCraftError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeltFehler {
    #[error("Entity {0} existiert bereits")]
    EntityExistiert(EntityId),

    #[error("Entity {0} ist zerstoert oder existiert nicht")]
    EntityZerstoert(EntityId),

    #[error("Ungueltiger Audio-Puffer: {laenge} Samples (Stereo erwartet)")]
    UngueltigerPuffer { laenge: usize },

    #[error("Filter konnte nicht erstellt werden: {0}")]
    Filter(String),
}

pub type WeltResult<T> = std::result::Result<T, WeltFehler>;

impl From<WeltFehler> for VoiceCraftError {
    fn from(e: WeltFehler) -> Self {
        match e {
            WeltFehler::EntityZerstoert(id) => VoiceCraftError::NachZerstoerung(id.to_string()),
            andere => VoiceCraftError::Intern(andere.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zerstoert_wird_nach_zerstoerung() {
        let e: VoiceCraftError = WeltFehler::EntityZerstoert(EntityId(4)).into();
        assert!(matches!(e, VoiceCraftError::NachZerstoerung(s) if s == "entity:4"));
    }
}
