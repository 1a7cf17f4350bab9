//! Audio-Effekt-System
//!
//! Geordnete Registry `Bitmaske → Effekt`. Die Einfuegereihenfolge ist die
//! Anwendungsreihenfolge. Mutationen (`effekt_setzen`, `zuruecksetzen`,
//! `leeren`) laufen unter einem Schreib-Lock, Verarbeitung und
//! Sichtbarkeitsabfragen unter dem Lese-Lock. Aenderungen landen als
//! [`EffektEreignis`] in einer Queue, die der Server einmal pro Tick leert.

use std::collections::VecDeque;

use parking_lot::{Mutex, RwLock};
use voicecraft_core::{Bitmask, EntityId};
use voicecraft_protocol::{EffektParameter, EffektTyp};

use super::{kanal_aktiv, AudioEffekt};
use crate::entity::Entity;
use crate::welt::WeltBeobachter;

/// Standard-Effekte nach `zuruecksetzen`
pub fn standard_effekte() -> Vec<(Bitmask, EffektParameter)> {
    vec![
        (0x0001, EffektParameter::standard(EffektTyp::Sichtbarkeit)),
        (0x0002, EffektParameter::standard(EffektTyp::Naehe)),
        (0x0004, EffektParameter::standard(EffektTyp::NaeheEcho)),
        (0x0008, EffektParameter::standard(EffektTyp::Daempfung)),
        (0x0010, EffektParameter::standard(EffektTyp::Richtung)),
    ]
}

/// Aenderung an der Registry
#[derive(Debug, Clone, PartialEq)]
pub enum EffektEreignis {
    Gesetzt {
        bitmask: Bitmask,
        parameter: EffektParameter,
    },
    Entfernt {
        bitmask: Bitmask,
    },
}

#[derive(Debug)]
pub struct AudioEffektSystem {
    effekte: RwLock<Vec<(Bitmask, AudioEffekt)>>,
    standard: Vec<(Bitmask, EffektParameter)>,
    ereignisse: Mutex<VecDeque<EffektEreignis>>,
}

impl Default for AudioEffektSystem {
    fn default() -> Self {
        Self::neu(standard_effekte())
    }
}

impl AudioEffektSystem {
    /// Leere Registry mit gegebenem Standard-Satz
    pub fn neu(standard: Vec<(Bitmask, EffektParameter)>) -> Self {
        Self {
            effekte: RwLock::new(Vec::new()),
            standard,
            ereignisse: Mutex::new(VecDeque::new()),
        }
    }

    /// Setzt oder entfernt (`None`) den Effekt einer Bitmaske
    ///
    /// Bitmaske 0 ist reserviert und aendert nichts. Liefert `true`, wenn
    /// die Registry veraendert wurde.
    pub fn effekt_setzen(&self, bitmask: Bitmask, parameter: Option<EffektParameter>) -> bool {
        if bitmask == 0 {
            return false;
        }
        let mut effekte = self.effekte.write();
        let vorhanden = effekte.iter().position(|(b, _)| *b == bitmask);

        let ereignis = match (parameter, vorhanden) {
            (None, None) => return false,
            (None, Some(index)) => {
                effekte.remove(index);
                EffektEreignis::Entfernt { bitmask }
            }
            (Some(p), Some(index)) => {
                effekte[index].1 = AudioEffekt::aus_parametern(&p);
                EffektEreignis::Gesetzt {
                    bitmask,
                    parameter: p,
                }
            }
            (Some(p), None) => {
                effekte.push((bitmask, AudioEffekt::aus_parametern(&p)));
                EffektEreignis::Gesetzt {
                    bitmask,
                    parameter: p,
                }
            }
        };
        drop(effekte);

        tracing::info!(bitmask = format_args!("{bitmask:#06x}"), ?ereignis, "Effekt geaendert");
        self.ereignisse.lock().push_back(ereignis);
        true
    }

    /// Entfernt alle Effekte
    pub fn leeren(&self) {
        let entfernt: Vec<Bitmask> = self.effekte.write().drain(..).map(|(b, _)| b).collect();
        let mut ereignisse = self.ereignisse.lock();
        for bitmask in entfernt {
            ereignisse.push_back(EffektEreignis::Entfernt { bitmask });
        }
    }

    /// Entfernt alle Effekte und installiert den Standard-Satz
    pub fn zuruecksetzen(&self) {
        self.leeren();
        for (bitmask, parameter) in self.standard.clone() {
            self.effekt_setzen(bitmask, Some(parameter));
        }
    }

    /// Momentaufnahme der Registry in Anwendungsreihenfolge
    pub fn effekte(&self) -> Vec<(Bitmask, EffektParameter)> {
        self.effekte
            .read()
            .iter()
            .map(|(b, e)| (*b, e.parameter()))
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.effekte.read().len()
    }

    /// Entnimmt alle seit dem letzten Aufruf aufgelaufenen Ereignisse
    pub fn ereignisse_entnehmen(&self) -> Vec<EffektEreignis> {
        self.ereignisse.lock().drain(..).collect()
    }

    /// Wendet alle passenden Effekte der Reihe nach an
    ///
    /// Ein fehlschlagender Effekt wird protokolliert und uebersprungen, die
    /// restliche Kette laeuft weiter.
    pub fn verarbeiten(&self, sprecher: &Entity, hoerer: &Entity, puffer: &mut [f32]) {
        for (bitmask, effekt) in self.effekte.read().iter() {
            if !kanal_aktiv(sprecher, hoerer, *bitmask) {
                continue;
            }
            if let Err(e) = effekt.verarbeiten(sprecher, hoerer, puffer) {
                tracing::warn!(
                    sprecher = %sprecher.id(),
                    hoerer = %hoerer.id(),
                    effekt = ?effekt.typ(),
                    fehler = %e,
                    "Effekt uebersprungen"
                );
            }
        }
    }

    /// `true`, wenn alle Effekte mit Sichtbarkeits-Faehigkeit zustimmen
    ///
    /// Effekte, deren Kanal fuer das Paar nicht aktiv ist, stimmen zu.
    pub fn sichtbar(&self, sprecher: &Entity, hoerer: &Entity) -> bool {
        self.effekte.read().iter().all(|(bitmask, effekt)| {
            !kanal_aktiv(sprecher, hoerer, *bitmask)
                || effekt.sichtbar(sprecher, hoerer).unwrap_or(true)
        })
    }

    /// Summe des DSP-Zustands ueber alle Effekte
    pub fn zustand_anzahl(&self) -> usize {
        self.effekte
            .read()
            .iter()
            .map(|(_, e)| e.zustand_anzahl())
            .sum()
    }
}

impl WeltBeobachter for AudioEffektSystem {
    fn entity_zerstoert(&self, id: EntityId) {
        for (_, effekt) in self.effekte.read().iter() {
            effekt.entity_entfernen(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::effekte::testhilfe::*;
    use crate::welt::Welt;
    use glam::Vec3;

    fn naehe(max: f32) -> EffektParameter {
        EffektParameter::Naehe {
            min_range: 0.0,
            max_range: max,
            wet: 1.0,
        }
    }

    #[test]
    fn bitmaske_null_ist_wirkungslos() {
        let system = AudioEffektSystem::default();
        assert!(!system.effekt_setzen(0, Some(naehe(10.0))));
        assert_eq!(system.anzahl(), 0);
        assert!(system.ereignisse_entnehmen().is_empty());
    }

    #[test]
    fn setzen_ersetzen_entfernen() {
        let system = AudioEffektSystem::default();
        assert!(system.effekt_setzen(0x2, Some(naehe(10.0))));
        assert!(system.effekt_setzen(0x1, Some(EffektParameter::Sichtbarkeit)));
        assert!(system.effekt_setzen(0x2, Some(naehe(20.0))));

        // Ersetzen behaelt die Position in der Reihenfolge
        assert_eq!(
            system.effekte(),
            vec![(0x2, naehe(20.0)), (0x1, EffektParameter::Sichtbarkeit)]
        );

        assert!(system.effekt_setzen(0x2, None));
        assert!(!system.effekt_setzen(0x2, None));
        assert_eq!(
            system.ereignisse_entnehmen(),
            vec![
                EffektEreignis::Gesetzt {
                    bitmask: 0x2,
                    parameter: naehe(10.0)
                },
                EffektEreignis::Gesetzt {
                    bitmask: 0x1,
                    parameter: EffektParameter::Sichtbarkeit
                },
                EffektEreignis::Gesetzt {
                    bitmask: 0x2,
                    parameter: naehe(20.0)
                },
                EffektEreignis::Entfernt { bitmask: 0x2 },
            ]
        );
    }

    #[test]
    fn zuruecksetzen_installiert_standard() {
        let system = AudioEffektSystem::default();
        system.effekt_setzen(0x100, Some(naehe(5.0)));
        system.zuruecksetzen();
        let effekte = system.effekte();
        assert_eq!(effekte, standard_effekte());
        assert_eq!(effekte[1].1.typ(), EffektTyp::Naehe);
    }

    #[test]
    fn nur_aktive_kanaele_werden_angewendet() {
        let system = AudioEffektSystem::default();
        system.effekt_setzen(0x2, Some(naehe(10.0)));

        let mut a = entity(1, Vec3::ZERO);
        let b = entity(2, Vec3::new(20.0, 0.0, 0.0));
        let mut puffer = stereo_eins(2);
        system.verarbeiten(&a, &b, &mut puffer);
        assert!(puffer.iter().all(|s| *s == 0.0));

        // Ohne gemeinsames Bit 0x2 bleibt das Signal unberuehrt
        a.effect_bitmask_setzen(0x1);
        let mut puffer = stereo_eins(2);
        system.verarbeiten(&a, &b, &mut puffer);
        assert!(puffer.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn fehlerhafter_effekt_unterbricht_kette_nicht() {
        let system = AudioEffektSystem::default();
        system.effekt_setzen(
            0x1,
            Some(EffektParameter::Daempfung {
                cutoff_hz: 30_000.0,
                wet: 1.0,
            }),
        );
        system.effekt_setzen(0x2, Some(naehe(10.0)));
        let a = entity(1, Vec3::ZERO);
        let b = entity(2, Vec3::new(10.0, 0.0, 0.0));
        let mut puffer = stereo_eins(2);
        system.verarbeiten(&a, &b, &mut puffer);
        assert!(puffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn sichtbarkeit_alle_muessen_zustimmen() {
        let system = AudioEffektSystem::default();
        system.zuruecksetzen();
        let a = entity(1, Vec3::ZERO);
        let mut b = entity(2, Vec3::new(10.0, 0.0, 0.0));
        assert!(system.sichtbar(&a, &b));

        b.position_setzen(Vec3::new(31.0, 0.0, 0.0));
        assert!(!system.sichtbar(&a, &b));

        // Kanal 0x2 inaktiv: Naehe-Effekt stimmt zu
        b.effect_bitmask_setzen(0x1);
        assert!(system.sichtbar(&a, &b));
    }

    #[test]
    fn zerstoeren_raeumt_dsp_zustand_ab() {
        let system = Arc::new(AudioEffektSystem::default());
        system.zuruecksetzen();
        system.effekt_setzen(
            0x20,
            Some(EffektParameter::Echo {
                delay_s: 0.01,
                feedback: 0.3,
                wet: 0.5,
            }),
        );

        let mut welt = Welt::neu();
        welt.beobachter_registrieren(system.clone());
        welt.erstellen(EntityId(1)).unwrap().muffle_factor_setzen(0.5);
        welt.erstellen(EntityId(2)).unwrap();

        let a = welt.entity(EntityId(1)).unwrap().clone();
        let b = welt.entity(EntityId(2)).unwrap().clone();
        let mut puffer = stereo_eins(8);
        system.verarbeiten(&a, &b, &mut puffer);
        let mut puffer = stereo_eins(8);
        system.verarbeiten(&b, &a, &mut puffer);
        assert!(system.zustand_anzahl() > 0);

        welt.zerstoeren(EntityId(1)).unwrap();
        welt.zerstoeren(EntityId(2)).unwrap();
        assert_eq!(system.zustand_anzahl(), 0);
    }
}
