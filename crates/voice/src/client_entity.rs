//! Empfangsseitige Entity eines entfernten Sprechers
//!
//! Besitzt Jitter Buffer, Decoder und den Ausgabe-Ringpuffer. Der
//! Netzwerk-Thread legt Frames ab (`frame_empfangen`), die Decode-Task
//! zieht im Frame-Takt (`dekodieren`) und der Echtzeit-Callback liest
//! PCM (`lesen`), ohne je zu blockieren.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use voicecraft_core::EntityId;
use voicecraft_protocol::audio::SAMPLES_PRO_FRAME;

use crate::codec::AudioCodec;
use crate::error::{VoiceFehler, VoiceResult};
use crate::jitter_buffer::{Frame, JitterBuffer, JitterBufferConfig, JitterStatus};

/// Zeitfenster, in dem eine Entity nach dem letzten echten Frame als sprechend gilt
pub const SPRECH_FENSTER: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntityConfig {
    pub jitter: JitterBufferConfig,
    /// Frames im Ringpuffer, bevor die Wiedergabe startet
    pub prefill_frames: usize,
    /// Kapazitaet des Ringpuffers in Frames
    pub ring_frames: usize,
}

impl Default for ClientEntityConfig {
    fn default() -> Self {
        Self {
            jitter: JitterBufferConfig::default(),
            prefill_frames: 2,
            ring_frames: 10,
        }
    }
}

/// Ergebnis eines Decode-Schritts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSchritt {
    /// Noch nicht vorgeladen, nichts geschrieben
    Wartend,
    /// Echter Frame dekodiert
    Dekodiert,
    /// Ersatz-Frame per Verschleierung erzeugt
    Verschleiert,
}

pub struct ClientEntity {
    id: EntityId,
    jitter: Mutex<JitterBuffer>,
    decoder: Mutex<Box<dyn AudioCodec>>,
    ausgabe_schreiben: Mutex<HeapProd<f32>>,
    ausgabe_lesen: Mutex<HeapCons<f32>>,
    prefill_samples: usize,
    wiedergabe_aktiv: AtomicBool,
    volume: Mutex<f32>,
    user_muted: AtomicBool,
    sichtbar: AtomicBool,
    letzter_frame: Mutex<Option<Instant>>,
    zerstoert: AtomicBool,
}

impl std::fmt::Debug for ClientEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEntity")
            .field("id", &self.id)
            .field("sichtbar", &self.ist_sichtbar())
            .field("zerstoert", &self.ist_zerstoert())
            .finish()
    }
}

impl ClientEntity {
    pub fn neu(id: EntityId, decoder: Box<dyn AudioCodec>, config: &ClientEntityConfig) -> Self {
        let ring = HeapRb::<f32>::new(config.ring_frames.max(1) * SAMPLES_PRO_FRAME);
        let (schreiben, lesen) = ring.split();
        Self {
            id,
            jitter: Mutex::new(JitterBuffer::neu(&config.jitter)),
            decoder: Mutex::new(decoder),
            ausgabe_schreiben: Mutex::new(schreiben),
            ausgabe_lesen: Mutex::new(lesen),
            prefill_samples: config.prefill_frames * SAMPLES_PRO_FRAME,
            wiedergabe_aktiv: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            user_muted: AtomicBool::new(false),
            sichtbar: AtomicBool::new(true),
            letzter_frame: Mutex::new(None),
            zerstoert: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    fn lebendig(&self) -> VoiceResult<()> {
        if self.ist_zerstoert() {
            return Err(VoiceFehler::Zerstoert(self.id));
        }
        Ok(())
    }

    /// Legt einen empfangenen Frame im Jitter Buffer ab
    pub fn frame_empfangen(&self, sequenz: u32, daten: &[u8]) -> VoiceResult<()> {
        self.lebendig()?;
        if !self.ist_sichtbar() {
            return Ok(());
        }
        self.jitter.lock().einfuegen(Frame::neu(sequenz, daten));
        Ok(())
    }

    /// Ein Decode-Schritt: Frame abrufen, dekodieren, in den Ringpuffer schreiben
    pub fn dekodieren(&self) -> VoiceResult<DecodeSchritt> {
        self.lebendig()?;
        let status = self.jitter.lock().abrufen();

        let (pcm, schritt) = {
            let mut decoder = self.decoder.lock();
            match status {
                JitterStatus::NichtBereit => return Ok(DecodeSchritt::Wartend),
                JitterStatus::Erfolg(frame) => match decoder.decode(Some(&frame.daten)) {
                    Ok(pcm) => {
                        *self.letzter_frame.lock() = Some(Instant::now());
                        (pcm, DecodeSchritt::Dekodiert)
                    }
                    Err(e) => {
                        tracing::debug!(entity = %self.id, fehler = %e, "Frame nicht dekodierbar, verschleiere");
                        (decoder.decode(None)?, DecodeSchritt::Verschleiert)
                    }
                },
                JitterStatus::Verpasst(_) | JitterStatus::Fehlgeschlagen => {
                    (decoder.decode(None)?, DecodeSchritt::Verschleiert)
                }
            }
        };

        let geschrieben = self.ausgabe_schreiben.lock().push_slice(&pcm);
        if geschrieben < pcm.len() {
            tracing::trace!(entity = %self.id, verworfen = pcm.len() - geschrieben, "Ausgabepuffer voll");
        }
        Ok(schritt)
    }

    /// Liest PCM fuer die Wiedergabe; blockiert nie
    ///
    /// Bei Lock-Konkurrenz, vor dem Prefill und bei Unterlauf wird mit
    /// Stille aufgefuellt. Liefert die Anzahl echter Samples.
    pub fn lesen(&self, ziel: &mut [f32]) -> usize {
        let Some(mut lesen) = self.ausgabe_lesen.try_lock() else {
            ziel.fill(0.0);
            return 0;
        };

        if !self.wiedergabe_aktiv.load(Ordering::Acquire) {
            if lesen.occupied_len() < self.prefill_samples.max(1) {
                ziel.fill(0.0);
                return 0;
            }
            self.wiedergabe_aktiv.store(true, Ordering::Release);
        }

        let gelesen = lesen.pop_slice(ziel);
        if gelesen < ziel.len() {
            ziel[gelesen..].fill(0.0);
            self.wiedergabe_aktiv.store(false, Ordering::Release);
        }
        gelesen
    }

    pub fn gepufferte_samples(&self) -> usize {
        self.ausgabe_lesen.lock().occupied_len()
    }

    /// Sichtbarkeit setzen; `false` verwirft alles gepufferte Audio
    pub fn sichtbar_setzen(&self, sichtbar: bool) {
        let vorher = self.sichtbar.swap(sichtbar, Ordering::AcqRel);
        if vorher && !sichtbar {
            self.audio_verwerfen();
        }
    }

    fn audio_verwerfen(&self) {
        self.jitter.lock().leeren();
        self.ausgabe_lesen.lock().clear();
        self.wiedergabe_aktiv.store(false, Ordering::Release);
        *self.letzter_frame.lock() = None;
    }

    pub fn ist_sichtbar(&self) -> bool {
        self.sichtbar.load(Ordering::Acquire)
    }

    /// Abgeleitet: echter Frame innerhalb von `SPRECH_FENSTER`
    pub fn spricht(&self) -> bool {
        self.letzter_frame
            .lock()
            .is_some_and(|t| t.elapsed() <= SPRECH_FENSTER)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn volume_setzen(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 2.0);
    }

    pub fn user_muted(&self) -> bool {
        self.user_muted.load(Ordering::Acquire)
    }

    pub fn user_muted_setzen(&self, muted: bool) {
        self.user_muted.store(muted, Ordering::Release);
    }

    /// Markiert die Entity als zerstoert; weitere Aufrufe liefern `Zerstoert`
    pub fn zerstoeren(&self) {
        if !self.zerstoert.swap(true, Ordering::AcqRel) {
            self.audio_verwerfen();
        }
    }

    pub fn ist_zerstoert(&self) -> bool {
        self.zerstoert.load(Ordering::Acquire)
    }
}


#[cfg(test)]
mod tests {
    use super::testcodec::ZaehlCodec;
    use super::*;

    fn entity() -> ClientEntity {
        ClientEntity::neu(EntityId(1), Box::new(ZaehlCodec), &ClientEntityConfig::default())
    }

    #[test]
    fn erfolg_dekodiert_nutzdaten() {
        let e = entity();
        assert_eq!(e.dekodieren().unwrap(), DecodeSchritt::Wartend);
        e.frame_empfangen(0, &[50]).unwrap();
        assert_eq!(e.dekodieren().unwrap(), DecodeSchritt::Dekodiert);
        assert_eq!(e.gepufferte_samples(), SAMPLES_PRO_FRAME);
        assert!(e.spricht());
    }

    #[test]
    fn luecke_wird_verschleiert() {
        let e = entity();
        e.frame_empfangen(0, &[10]).unwrap();
        e.frame_empfangen(2, &[30]).unwrap();
        assert_eq!(e.dekodieren().unwrap(), DecodeSchritt::Dekodiert);
        assert_eq!(e.dekodieren().unwrap(), DecodeSchritt::Verschleiert);
        assert_eq!(e.dekodieren().unwrap(), DecodeSchritt::Dekodiert);

        let mut puffer = vec![0.0; 3 * SAMPLES_PRO_FRAME];
        assert_eq!(e.lesen(&mut puffer), 3 * SAMPLES_PRO_FRAME);
        assert!((puffer[0] - 0.1).abs() < 1e-6);
        assert_eq!(puffer[SAMPLES_PRO_FRAME], -1.0);
        assert!((puffer[2 * SAMPLES_PRO_FRAME] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn wiedergabe_wartet_auf_prefill() {
        let e = entity();
        e.frame_empfangen(0, &[10]).unwrap();
        e.dekodieren().unwrap();

        let mut puffer = vec![1.0; SAMPLES_PRO_FRAME];
        assert_eq!(e.lesen(&mut puffer), 0);
        assert!(puffer.iter().all(|s| *s == 0.0));

        e.frame_empfangen(1, &[20]).unwrap();
        e.dekodieren().unwrap();
        assert_eq!(e.lesen(&mut puffer), SAMPLES_PRO_FRAME);
    }

    #[test]
    fn unterlauf_liefert_stille() {
        let e = entity();
        for s in 0..2 {
            e.frame_empfangen(s, &[10]).unwrap();
            e.dekodieren().unwrap();
        }
        let mut puffer = vec![1.0; 3 * SAMPLES_PRO_FRAME];
        assert_eq!(e.lesen(&mut puffer), 2 * SAMPLES_PRO_FRAME);
        assert!(puffer[2 * SAMPLES_PRO_FRAME..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn unsichtbar_verwirft_audio() {
        let e = entity();
        e.frame_empfangen(0, &[10]).unwrap();
        e.dekodieren().unwrap();
        e.frame_empfangen(1, &[10]).unwrap();

        e.sichtbar_setzen(false);
        assert_eq!(e.gepufferte_samples(), 0);
        assert!(!e.spricht());
        assert_eq!(e.dekodieren().unwrap(), DecodeSchritt::Wartend);

        // Waehrend unsichtbar wird nichts gepuffert
        e.frame_empfangen(2, &[10]).unwrap();
        e.sichtbar_setzen(true);
        assert_eq!(e.dekodieren().unwrap(), DecodeSchritt::Wartend);
    }

    #[test]
    fn nach_zerstoerung_expliziter_fehler() {
        let e = entity();
        e.zerstoeren();
        assert_eq!(
            e.frame_empfangen(0, &[1]),
            Err(VoiceFehler::Zerstoert(EntityId(1)))
        );
        assert_eq!(e.dekodieren(), Err(VoiceFehler::Zerstoert(EntityId(1))));
        let mut puffer = vec![1.0; 4];
        assert_eq!(e.lesen(&mut puffer), 0);
    }
}
