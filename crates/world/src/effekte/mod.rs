//! Audio-Effekte
//!
//! Jeder Effekt verarbeitet einen interleavten Stereo-Puffer fuer ein
//! Sprecher→Hoerer-Paar in-place. Effekte mit Zustand (Verzoegerungslinie,
//! Filter, Lautstaerke-Rampe) halten ihn pro Sprecher in einer `DashMap`,
//! angelegt beim ersten Zugriff und entfernt, wenn die Entity zerstoert wird.

pub mod daempfung;
pub mod echo;
pub mod naehe;
pub mod naehe_echo;
pub mod richtung;
pub mod sichtbarkeit;
pub mod system;

use voicecraft_core::{Bitmask, EntityId};
use voicecraft_protocol::{EffektParameter, EffektTyp};

use crate::entity::Entity;
use crate::error::{WeltFehler, WeltResult};

pub use daempfung::DaempfungsEffekt;
pub use echo::EchoEffekt;
pub use naehe::NaeheEffekt;
pub use naehe_echo::NaeheEchoEffekt;
pub use richtung::RichtungsEffekt;
pub use sichtbarkeit::SichtbarkeitsEffekt;
pub use system::{standard_effekte, AudioEffektSystem, EffektEreignis};

/// Prueft, ob ein Effekt-Kanal zwischen Sprecher und Hoerer aktiv ist
pub fn kanal_aktiv(sprecher: &Entity, hoerer: &Entity, effekt_bitmask: Bitmask) -> bool {
    let gemeinsam = sprecher.talk_bitmask()
        & hoerer.listen_bitmask()
        & sprecher.effect_bitmask()
        & hoerer.effect_bitmask();
    gemeinsam & effekt_bitmask != 0
}

/// `out = bearbeitet * wet + original * (1 - wet)`, wet auf [0, 1] begrenzt
#[inline]
pub fn wet_dry(bearbeitet: f32, original: f32, wet: f32) -> f32 {
    let wet = wet.clamp(0.0, 1.0);
    bearbeitet * wet + original * (1.0 - wet)
}

pub(crate) fn stereo_pruefen(puffer: &[f32]) -> WeltResult<()> {
    if puffer.len() % 2 != 0 {
        return Err(WeltFehler::UngueltigerPuffer {
            laenge: puffer.len(),
        });
    }
    Ok(())
}

/// Summentyp aller Effekte
#[derive(Debug)]
pub enum AudioEffekt {
    Sichtbarkeit(SichtbarkeitsEffekt),
    Naehe(NaeheEffekt),
    Richtung(RichtungsEffekt),
    Echo(EchoEffekt),
    NaeheEcho(NaeheEchoEffekt),
    Daempfung(DaempfungsEffekt),
}

impl AudioEffekt {
    pub fn aus_parametern(parameter: &EffektParameter) -> Self {
        match *parameter {
            EffektParameter::Sichtbarkeit => Self::Sichtbarkeit(SichtbarkeitsEffekt),
            EffektParameter::Naehe {
                min_range,
                max_range,
                wet,
            } => Self::Naehe(NaeheEffekt::neu(min_range, max_range, wet)),
            EffektParameter::Richtung { wet } => Self::Richtung(RichtungsEffekt::neu(wet)),
            EffektParameter::Echo {
                delay_s,
                feedback,
                wet,
            } => Self::Echo(EchoEffekt::neu(delay_s, feedback, wet)),
            EffektParameter::NaeheEcho {
                range,
                delay_s,
                feedback,
                wet,
            } => Self::NaeheEcho(NaeheEchoEffekt::neu(range, delay_s, feedback, wet)),
            EffektParameter::Daempfung { cutoff_hz, wet } => {
                Self::Daempfung(DaempfungsEffekt::neu(cutoff_hz, wet))
            }
        }
    }

    pub fn parameter(&self) -> EffektParameter {
        match self {
            Self::Sichtbarkeit(_) => EffektParameter::Sichtbarkeit,
            Self::Naehe(e) => e.parameter(),
            Self::Richtung(e) => e.parameter(),
            Self::Echo(e) => e.parameter(),
            Self::NaeheEcho(e) => e.parameter(),
            Self::Daempfung(e) => e.parameter(),
        }
    }

    pub fn typ(&self) -> EffektTyp {
        self.parameter().typ()
    }

    /// Verarbeitet einen interleavten Stereo-Puffer in-place
    pub fn verarbeiten(&self, sprecher: &Entity, hoerer: &Entity, puffer: &mut [f32]) -> WeltResult<()> {
        stereo_pruefen(puffer)?;
        match self {
            Self::Sichtbarkeit(_) => Ok(()),
            Self::Naehe(e) => e.verarbeiten(sprecher, hoerer, puffer),
            Self::Richtung(e) => e.verarbeiten(sprecher, hoerer, puffer),
            Self::Echo(e) => e.verarbeiten(sprecher, hoerer, puffer),
            Self::NaeheEcho(e) => e.verarbeiten(sprecher, hoerer, puffer),
            Self::Daempfung(e) => e.verarbeiten(sprecher, hoerer, puffer),
        }
    }

    /// Sichtbarkeits-Urteil; `None` fuer Effekte ohne diese Faehigkeit
    pub fn sichtbar(&self, sprecher: &Entity, hoerer: &Entity) -> Option<bool> {
        match self {
            Self::Sichtbarkeit(e) => Some(e.sichtbar(sprecher, hoerer)),
            Self::Naehe(e) => Some(e.sichtbar(sprecher, hoerer)),
            Self::Richtung(_) | Self::Echo(_) | Self::NaeheEcho(_) | Self::Daempfung(_) => None,
        }
    }

    /// Entfernt allen Zustand, der zu einer Entity gehoert
    pub fn entity_entfernen(&self, id: EntityId) {
        match self {
            Self::Sichtbarkeit(_) | Self::Richtung(_) => {}
            Self::Naehe(e) => e.entity_entfernen(id),
            Self::Echo(e) => e.entity_entfernen(id),
            Self::NaeheEcho(e) => e.entity_entfernen(id),
            Self::Daempfung(e) => e.entity_entfernen(id),
        }
    }

    /// Anzahl der Entities mit eigenem DSP-Zustand
    pub fn zustand_anzahl(&self) -> usize {
        match self {
            Self::Sichtbarkeit(_) | Self::Richtung(_) => 0,
            Self::Naehe(e) => e.zustand_anzahl(),
            Self::Echo(e) => e.zustand_anzahl(),
            Self::NaeheEcho(e) => e.zustand_anzahl(),
            Self::Daempfung(e) => e.zustand_anzahl(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testhilfe {
    use glam::Vec3;
    use voicecraft_core::EntityId;

    use crate::entity::Entity;

    pub fn entity(id: i32, position: Vec3) -> Entity {
        let mut e = Entity::neu(EntityId(id));
        e.position_setzen(position);
        e
    }

    pub fn stereo_eins(frames: usize) -> Vec<f32> {
        vec![1.0; frames * 2]
    }
}

#[cfg(test)]
mod tests {
    use super::testhilfe::*;
    use super::*;
    use glam::Vec3;

    #[test]
    fn kanal_nur_bei_gemeinsamem_bit() {
        let mut a = entity(1, Vec3::ZERO);
        let mut b = entity(2, Vec3::ZERO);
        assert!(kanal_aktiv(&a, &b, 0x2));

        a.talk_bitmask_setzen(0x1);
        b.listen_bitmask_setzen(0x2);
        assert!(!kanal_aktiv(&a, &b, 0xffff));

        b.listen_bitmask_setzen(0x1);
        assert!(kanal_aktiv(&a, &b, 0x1));
        assert!(!kanal_aktiv(&a, &b, 0x2));
    }

    #[test]
    fn wet_wird_begrenzt() {
        assert_eq!(wet_dry(0.0, 1.0, 2.0), 0.0);
        assert_eq!(wet_dry(0.0, 1.0, -1.0), 1.0);
        assert_eq!(wet_dry(1.0, 0.0, 0.25), 0.25);
    }

    #[test]
    fn parameter_durchlauf() {
        for typ in EffektTyp::ALLE {
            let p = EffektParameter::standard(typ);
            assert_eq!(AudioEffekt::aus_parametern(&p).parameter(), p);
        }
    }

    #[test]
    fn ungerader_puffer_wird_abgelehnt() {
        let a = entity(1, Vec3::ZERO);
        let b = entity(2, Vec3::ZERO);
        let effekt = AudioEffekt::aus_parametern(&EffektParameter::standard(EffektTyp::Naehe));
        let mut puffer = vec![0.0; 3];
        assert_eq!(
            effekt.verarbeiten(&a, &b, &mut puffer),
            Err(WeltFehler::UngueltigerPuffer { laenge: 3 })
        );
    }
}
