//! Tiefpass-Daempfung (z.B. durch Waende)
//!
//! Pro Sprecher ein Butterworth-Tiefpass je Kanal. Der Wet-Anteil wird mit
//! dem groesseren Daempfungsfaktor der beiden Entities skaliert.

use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type, Q_BUTTERWORTH_F32};
use dashmap::DashMap;
use voicecraft_core::EntityId;
use voicecraft_protocol::audio::ABTASTRATE;
use voicecraft_protocol::EffektParameter;

use super::wet_dry;
use crate::entity::Entity;
use crate::error::{WeltFehler, WeltResult};

/// Linker und rechter Filter eines Sprechers
type StereoFilter = [DirectForm1<f32>; 2];

pub struct DaempfungsEffekt {
    cutoff_hz: f32,
    wet: f32,
    filter: DashMap<EntityId, StereoFilter>,
}

impl std::fmt::Debug for DaempfungsEffekt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaempfungsEffekt")
            .field("cutoff_hz", &self.cutoff_hz)
            .field("wet", &self.wet)
            .field("filter", &self.filter.len())
            .finish()
    }
}

impl DaempfungsEffekt {
    pub fn neu(cutoff_hz: f32, wet: f32) -> Self {
        Self {
            cutoff_hz,
            wet,
            filter: DashMap::new(),
        }
    }

    pub fn parameter(&self) -> EffektParameter {
        EffektParameter::Daempfung {
            cutoff_hz: self.cutoff_hz,
            wet: self.wet,
        }
    }

    fn filter_erstellen(&self) -> WeltResult<StereoFilter> {
        let koeffizienten = Coefficients::<f32>::from_params(
            Type::LowPass,
            (ABTASTRATE as f32).hz(),
            self.cutoff_hz.hz(),
            Q_BUTTERWORTH_F32,
        )
        .map_err(|e| WeltFehler::Filter(format!("{e:?}")))?;
        Ok([
            DirectForm1::<f32>::new(koeffizienten),
            DirectForm1::<f32>::new(koeffizienten),
        ])
    }

    pub fn verarbeiten(&self, sprecher: &Entity, hoerer: &Entity, puffer: &mut [f32]) -> WeltResult<()> {
        let wet = self.wet * sprecher.muffle_factor().max(hoerer.muffle_factor());
        let mut filter = match self.filter.get_mut(&sprecher.id()) {
            Some(f) => f,
            None => {
                let neu = self.filter_erstellen()?;
                self.filter.entry(sprecher.id()).or_insert(neu)
            }
        };
        for frame in puffer.chunks_exact_mut(2) {
            for (kanal, s) in frame.iter_mut().enumerate() {
                let gefiltert = filter[kanal].run(*s);
                *s = wet_dry(gefiltert, *s, wet);
            }
        }
        Ok(())
    }

    pub fn entity_entfernen(&self, id: EntityId) {
        self.filter.remove(&id);
    }

    pub fn zustand_anzahl(&self) -> usize {
        self.filter.len()
    }
}
