//! Echo mit Rueckkopplung
//!
//! Pro Sprecher eine Stereo-Verzoegerungslinie der Laenge `delay_s`.
//! `y = x + d`, zurueckgeschrieben wird `x + d * feedback`.

use dashmap::DashMap;
use voicecraft_core::EntityId;
use voicecraft_protocol::audio::{ABTASTRATE, KANAELE_MIX};
use voicecraft_protocol::EffektParameter;

use super::wet_dry;
use crate::entity::Entity;
use crate::error::WeltResult;

/// Obergrenze fuer `delay_s`; der Wert kommt ueber das Netz
pub const MAX_DELAY_S: f32 = 5.0;

/// Begrenzt eine Verzoegerung auf `0..=MAX_DELAY_S` (NaN wird 0)
pub fn delay_begrenzen(delay_s: f32) -> f32 {
    if delay_s.is_nan() {
        return 0.0;
    }
    delay_s.clamp(0.0, MAX_DELAY_S)
}

/// Ringpuffer fuer interleavte Stereo-Samples
#[derive(Debug)]
pub struct Verzoegerungslinie {
    puffer: Vec<f32>,
    position: usize,
}

impl Verzoegerungslinie {
    pub fn neu(delay_s: f32) -> Self {
        let frames = ((delay_begrenzen(delay_s) * ABTASTRATE as f32) as usize).max(1);
        Self {
            puffer: vec![0.0; frames * KANAELE_MIX],
            position: 0,
        }
    }

    /// Verarbeitet ein Sample und liefert das Signal mit Echo
    #[inline]
    pub fn verarbeiten(&mut self, eingang: f32, feedback: f32) -> f32 {
        let verzoegert = self.puffer[self.position];
        self.puffer[self.position] = eingang + verzoegert * feedback;
        self.position = (self.position + 1) % self.puffer.len();
        eingang + verzoegert
    }

    pub fn laenge(&self) -> usize {
        self.puffer.len()
    }
}

#[derive(Debug)]
pub struct EchoEffekt {
    delay_s: f32,
    feedback: f32,
    wet: f32,
    linien: DashMap<EntityId, Verzoegerungslinie>,
}

impl EchoEffekt {
    pub fn neu(delay_s: f32, feedback: f32, wet: f32) -> Self {
        Self {
            delay_s: delay_begrenzen(delay_s),
            feedback: feedback.clamp(0.0, 0.99),
            wet,
            linien: DashMap::new(),
        }
    }

    pub fn parameter(&self) -> EffektParameter {
        EffektParameter::Echo {
            delay_s: self.delay_s,
            feedback: self.feedback,
            wet: self.wet,
        }
    }

    pub fn verarbeiten(&self, sprecher: &Entity, _hoerer: &Entity, puffer: &mut [f32]) -> WeltResult<()> {
        let mut linie = self
            .linien
            .entry(sprecher.id())
            .or_insert_with(|| Verzoegerungslinie::neu(self.delay_s));
        for s in puffer.iter_mut() {
            let mit_echo = linie.verarbeiten(*s, self.feedback);
            *s = wet_dry(mit_echo, *s, self.wet);
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
