//! Client-Mischer
//!
//! Zieht pro sichtbarer Client-Entity einen Block PCM (nie blockierend),
//! mischt Mono auf Stereo hoch, wendet die Effektkette fuer
//! `(Sprecher, lokaler Hoerer)` an, skaliert mit Lautstaerke und summiert.
//! Das Ergebnis wird auf [-1, 1] begrenzt.

use std::sync::Arc;

use voicecraft_core::EntityId;
use voicecraft_world::{AudioEffektSystem, Welt};

use crate::registry::ClientEntityRegistry;

#[derive(Debug)]
pub struct Mischer {
    effekte: Arc<AudioEffektSystem>,
    mono: Vec<f32>,
    stereo: Vec<f32>,
}

impl Mischer {
    pub fn neu(effekte: Arc<AudioEffektSystem>) -> Self {
        Self {
            effekte,
            mono: Vec::new(),
            stereo: Vec::new(),
        }
    }

    /// Fuellt `ausgabe` (interleaved Stereo) fuer den lokalen Hoerer
    ///
    /// Liefert die Anzahl beigetragener Sprecher.
    pub fn mischen(
        &mut self,
        welt: &Welt,
        hoerer: EntityId,
        registry: &ClientEntityRegistry,
        ausgabe: &mut [f32],
    ) -> usize {
        ausgabe.fill(0.0);
        let Ok(hoerer) = welt.entity(hoerer) else {
            return 0;
        };
        if hoerer.deafened() {
            return 0;
        }

        let frames = ausgabe.len() / 2;
        self.mono.resize(frames, 0.0);
        self.stereo.resize(frames * 2, 0.0);

        let mut beitraege = 0;
        for client in registry.alle() {
            if !client.ist_sichtbar() || client.user_muted() {
                continue;
            }
            let Ok(sprecher) = welt.entity(client.id()) else {
                continue;
            };
            if client.lesen(&mut self.mono) == 0 {
                continue;
            }

            for (frame, s) in self.stereo.chunks_exact_mut(2).zip(&self.mono) {
                frame[0] = *s;
                frame[1] = *s;
            }
            self.effekte.verarbeiten(sprecher, hoerer, &mut self.stereo);

            let volume = client.volume();
            for (a, s) in ausgabe.iter_mut().zip(&self.stereo) {
                *a += s * volume;
            }
            beitraege += 1;
        }

        for a in ausgabe.iter_mut() {
            *a = a.clamp(-1.0, 1.0);
        }
        beitraege
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_entity::testcodec::ZaehlCodec;
    use crate::client_entity::ClientEntityConfig;
    use crate::codec::{AudioCodec, CodecFabrik};
    use glam::Vec3;
    use voicecraft_protocol::audio::SAMPLES_PRO_FRAME;
    use voicecraft_protocol::EffektParameter;

    struct Aufbau {
        welt: Welt,
        registry: Arc<ClientEntityRegistry>,
        mischer: Mischer,
        hoerer: EntityId,
        sprecher: EntityId,
    }

    fn aufbau(effekte: Arc<AudioEffektSystem>) -> Aufbau {
        let fabrik: CodecFabrik = Arc::new(|| Ok(Box::new(ZaehlCodec) as Box<dyn AudioCodec>));
        let registry = Arc::new(ClientEntityRegistry::neu(fabrik, ClientEntityConfig::default()));
        let mut welt = Welt::neu();
        welt.beobachter_registrieren(registry.clone());
        welt.beobachter_registrieren(effekte.clone());
        let hoerer = welt.erstellen_frei().id();
        let sprecher = welt.erstellen_frei().id();
        Aufbau {
            welt,
            registry,
            mischer: Mischer::neu(effekte),
            hoerer,
            sprecher,
        }
    }

    fn sprechen(a: &Aufbau, wert: u8) {
        let e = a.registry.erstellen(a.sprecher).unwrap();
        for s in 0..2 {
            e.frame_empfangen(s, &[wert]).unwrap();
            e.dekodieren().unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mono_wird_auf_stereo_hochgemischt() {
        let mut a = aufbau(Arc::new(AudioEffektSystem::neu(Vec::new())));
        sprechen(&a, 50);

        let mut ausgabe = vec![0.0; SAMPLES_PRO_FRAME * 2];
        let beitraege = a
            .mischer
            .mischen(&a.welt, a.hoerer, &a.registry, &mut ausgabe);
        assert_eq!(beitraege, 1);
        assert!(ausgabe.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[tokio::test(start_paused = true)]
    async fn effekte_und_lautstaerke_werden_angewendet() {
        let effekte = Arc::new(AudioEffektSystem::neu(Vec::new()));
        effekte.effekt_setzen(
            0x2,
            Some(EffektParameter::Naehe {
                min_range: 0.0,
                max_range: 10.0,
                wet: 1.0,
            }),
        );
        let mut a = aufbau(effekte);
        a.welt
            .entity_mut(a.sprecher)
            .unwrap()
            .position_setzen(Vec3::new(5.0, 0.0, 0.0));
        sprechen(&a, 80);
        a.registry.get(a.sprecher).unwrap().volume_setzen(0.5);

        let mut ausgabe = vec![0.0; SAMPLES_PRO_FRAME * 2];
        a.mischer
            .mischen(&a.welt, a.hoerer, &a.registry, &mut ausgabe);
        // 0.8 * Naehe 0.5 * Lautstaerke 0.5
        assert!((ausgabe[0] - 0.2).abs() < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn stumm_und_taub() {
        let mut a = aufbau(Arc::new(AudioEffektSystem::neu(Vec::new())));
        sprechen(&a, 50);
        a.registry.get(a.sprecher).unwrap().user_muted_setzen(true);
        let mut ausgabe = vec![1.0; 8];
        assert_eq!(a.mischer.mischen(&a.welt, a.hoerer, &a.registry, &mut ausgabe), 0);
        assert!(ausgabe.iter().all(|s| *s == 0.0));

        a.registry.get(a.sprecher).unwrap().user_muted_setzen(false);
        a.welt.entity_mut(a.hoerer).unwrap().deafened_setzen(true);
        assert_eq!(a.mischer.mischen(&a.welt, a.hoerer, &a.registry, &mut ausgabe), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn summe_wird_begrenzt() {
        let mut a = aufbau(Arc::new(AudioEffektSystem::neu(Vec::new())));
        sprechen(&a, 90);
        a.registry.get(a.sprecher).unwrap().volume_setzen(2.0);
        let mut ausgabe = vec![0.0; 8];
        a.mischer.mischen(&a.welt, a.hoerer, &a.registry, &mut ausgabe);
        assert!(ausgabe.iter().all(|s| *s == 1.0));
    }
}
