//! Distanzabhaengige Abschwaechung
//!
//! Faktor `1 - clamp((d - min) / (max - min), 0, 1)`. Damit Positionssprunge
//! nicht knacken, wird die Lautstaerke pro Sprecher ueber einen Puffer vom
//! letzten auf den neuen Faktor gerampt.

use dashmap::DashMap;
use voicecraft_core::EntityId;
use voicecraft_protocol::EffektParameter;

use super::wet_dry;
use crate::entity::Entity;
use crate::error::WeltResult;

#[derive(Debug)]
pub struct NaeheEffekt {
    min_range: f32,
    max_range: f32,
    wet: f32,
    /// Zuletzt angewendeter Faktor pro Sprecher
    rampen: DashMap<EntityId, f32>,
}

impl NaeheEffekt {
    pub fn neu(min_range: f32, max_range: f32, wet: f32) -> Self {
        Self {
            min_range,
            max_range,
            wet,
            rampen: DashMap::new(),
        }
    }

    pub fn parameter(&self) -> EffektParameter {
        EffektParameter::Naehe {
            min_range: self.min_range,
            max_range: self.max_range,
            wet: self.wet,
        }
    }

    /// Abschwaechungsfaktor fuer eine Distanz (1 = unveraendert, 0 = stumm)
    pub fn faktor(&self, distanz: f32) -> f32 {
        let spanne = self.max_range - self.min_range;
        if spanne <= 0.0 {
            return if distanz <= self.min_range { 1.0 } else { 0.0 };
        }
        1.0 - ((distanz - self.min_range) / spanne).clamp(0.0, 1.0)
    }

    pub fn sichtbar(&self, sprecher: &Entity, hoerer: &Entity) -> bool {
        sprecher.position().distance(hoerer.position()) <= self.max_range
    }

    pub fn verarbeiten(&self, sprecher: &Entity, hoerer: &Entity, puffer: &mut [f32]) -> WeltResult<()> {
        let ziel = self.faktor(sprecher.position().distance(hoerer.position()));
        let mut letzter = self.rampen.entry(sprecher.id()).or_insert(ziel);
        let start = *letzter;
        *letzter = ziel;
        drop(letzter);

        let frames = puffer.len() / 2;
        for (i, frame) in puffer.chunks_exact_mut(2).enumerate() {
            let gain = start + (ziel - start) * (i + 1) as f32 / frames as f32;
            for s in frame {
                *s = wet_dry(*s * gain, *s, self.wet);
            }
        }
        Ok(())
    }

    pub fn entity_entfernen(&self, id: EntityId) {
        self.rampen.remove(&id);
    }

    pub fn zustand_anzahl(&self) -> usize {
        self.rampen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effekte::testhilfe::*;
    use glam::Vec3;

    #[test]
    fn faktor_an_den_grenzen() {
        let e = NaeheEffekt::neu(0.0, 10.0, 1.0);
        assert_eq!(e.faktor(0.0), 1.0);
        assert_eq!(e.faktor(5.0), 0.5);
        assert_eq!(e.faktor(10.0), 0.0);
        // Jenseits der Reichweite: begrenzt auf 0, nie negativ
        assert_eq!(e.faktor(20.0), 0.0);
    }

    #[test]
    fn entartete_reichweite() {
        let e = NaeheEffekt::neu(5.0, 5.0, 1.0);
        assert_eq!(e.faktor(4.0), 1.0);
        assert_eq!(e.faktor(6.0), 0.0);
    }

    #[test]
    fn abstand_null_bleibt_unveraendert() {
        let e = NaeheEffekt::neu(0.0, 10.0, 1.0);
        let a = entity(1, Vec3::ZERO);
        let b = entity(2, Vec3::ZERO);
        let mut puffer = stereo_eins(4);
        e.verarbeiten(&a, &b, &mut puffer).unwrap();
        assert!(puffer.iter().all(|s| (*s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn jenseits_der_reichweite_stumm() {
        let e = NaeheEffekt::neu(0.0, 10.0, 1.0);
        let a = entity(1, Vec3::ZERO);
        let b = entity(2, Vec3::new(20.0, 0.0, 0.0));
        let mut puffer = stereo_eins(4);
        e.verarbeiten(&a, &b, &mut puffer).unwrap();
        assert!(puffer.iter().all(|s| *s == 0.0));
        assert!(!e.sichtbar(&a, &b));
    }

    #[test]
    fn lautstaerke_wird_gerampt() {
        let e = NaeheEffekt::neu(0.0, 10.0, 1.0);
        let mut a = entity(1, Vec3::ZERO);
        let b = entity(2, Vec3::ZERO);
        let mut puffer = stereo_eins(4);
        e.verarbeiten(&a, &b, &mut puffer).unwrap();

        // Sprung auf Distanz 10: Rampe von 1 auf 0 ueber den Puffer
        a.position_setzen(Vec3::new(10.0, 0.0, 0.0));
        let mut puffer = stereo_eins(4);
        e.verarbeiten(&a, &b, &mut puffer).unwrap();
        assert!((puffer[0] - 0.75).abs() < 1e-6);
        assert!((puffer[2] - 0.5).abs() < 1e-6);
        assert_eq!(puffer[6], 0.0);
        assert_eq!(e.zustand_anzahl(), 1);
    }
}
