//! Stereo-Panning nach Blickrichtung des Hoerers
//!
//! Yaw in Grad wie in Minecraft: 0 blickt nach +Z, 90 nach -X. Der Sprecher
//! wird nach dem Skalarprodukt seiner Richtung mit der rechten Achse des
//! Hoerers verteilt. Mitte bleibt unveraendert, ganz rechts ist links stumm.

use glam::Vec2;
use voicecraft_protocol::EffektParameter;

use super::wet_dry;
use crate::entity::Entity;
use crate::error::WeltResult;

#[derive(Debug, Clone, Copy)]
pub struct RichtungsEffekt {
    wet: f32,
}

impl RichtungsEffekt {
    pub fn neu(wet: f32) -> Self {
        Self { wet }
    }

    pub fn parameter(&self) -> EffektParameter {
        EffektParameter::Richtung { wet: self.wet }
    }

    /// Panorama in [-1 (links), 1 (rechts)]
    pub fn panorama(&self, sprecher: &Entity, hoerer: &Entity) -> f32 {
        let delta = sprecher.position() - hoerer.position();
        let richtung = Vec2::new(delta.x, delta.z);
        if richtung.length_squared() < 1e-6 {
            return 0.0;
        }
        let yaw = hoerer.rotation().x.to_radians();
        let rechts = Vec2::new(-yaw.cos(), -yaw.sin());
        richtung.normalize().dot(rechts).clamp(-1.0, 1.0)
    }

    pub fn verarbeiten(&self, sprecher: &Entity, hoerer: &Entity, puffer: &mut [f32]) -> WeltResult<()> {
        let pan = self.panorama(sprecher, hoerer);
        let links = (1.0 - pan).min(1.0);
        let rechts = (1.0 + pan).min(1.0);
        for frame in puffer.chunks_exact_mut(2) {
            frame[0] = wet_dry(frame[0] * links, frame[0], self.wet);
            frame[1] = wet_dry(frame[1] * rechts, frame[1], self.wet);
        }
        Ok(())
    }
}
