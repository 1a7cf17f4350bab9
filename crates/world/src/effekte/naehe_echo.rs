//! Echo abhaengig von Distanz und Hoehlenfaktor
//!
//! Der effektive Wet-Anteil waechst mit `d / range` und wird mit dem
//! groesseren Hoehlenfaktor der beiden Entities skaliert. Ohne Hoehle
//! (Faktor 0) bleibt das Signal trocken.

use dashmap::DashMap;
use voicecraft_core::EntityId;
use voicecraft_protocol::EffektParameter;

use super::echo::{delay_begrenzen, Verzoegerungslinie};
use super::wet_dry;
use crate::entity::Entity;
use crate::error::WeltResult;

#[derive(Debug)]
pub struct NaeheEchoEffekt {
    range: f32,
    delay_s: f32,
    feedback: f32,
    wet: f32,
    linien: DashMap<EntityId, Verzoegerungslinie>,
}

impl NaeheEchoEffekt {
    pub fn neu(range: f32, delay_s: f32, feedback: f32, wet: f32) -> Self {
        Self {
            range,
            delay_s: delay_begrenzen(delay_s),
            feedback: feedback.clamp(0.0, 0.99),
            wet,
            linien: DashMap::new(),
        }
    }

    pub fn parameter(&self) -> EffektParameter {
        EffektParameter::NaeheEcho {
            range: self.range,
            delay_s: self.delay_s,
            feedback: self.feedback,
            wet: self.wet,
        }
    }

    /// Effektiver Wet-Anteil fuer ein Paar
    pub fn effektiver_wet(&self, sprecher: &Entity, hoerer: &Entity) -> f32 {
        let distanz = sprecher.position().distance(hoerer.position());
        let anteil = if self.range > 0.0 {
            (distanz / self.range).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let hoehle = sprecher.cave_factor().max(hoerer.cave_factor());
        (self.wet * anteil * hoehle).clamp(0.0, 1.0)
    }

    pub fn verarbeiten(&self, sprecher: &Entity, hoerer: &Entity, puffer: &mut [f32]) -> WeltResult<()> {
        let wet = self.effektiver_wet(sprecher, hoerer);
        let mut linie = self
            .linien
            .entry(sprecher.id())
            .or_insert_with(|| Verzoegerungslinie::neu(self.delay_s));
        // Die Linie laeuft auch trocken weiter, damit ein einsetzendes Echo keinen Sprung macht
        for s in puffer.iter_mut() {
            let mit_echo = linie.verarbeiten(*s, self.feedback);
            *s = wet_dry(mit_echo, *s, wet);
        }
        Ok(())
    }

    pub fn entity_entfernen(&self, id: EntityId) {
        self.linien.remove(&id);
    }

    pub fn zustand_anzahl(&self) -> usize {
        self.linien.len()
    }
}
