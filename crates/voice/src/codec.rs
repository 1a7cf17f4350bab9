//! Codec-Grenze
//!
//! Der Empfangspfad kennt nur [`AudioCodec`]: `encode` fuer einen
//! Mono-Frame, `decode(None)` fordert Verlustverschleierung an.
//! Ausgeliefert wird [`OpusCodec`] ueber audiopus.

use std::sync::Arc;

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Bitrate, Channels, SampleRate,
};
use tracing::debug;
use voicecraft_protocol::audio::SAMPLES_PRO_FRAME;
use voicecraft_protocol::packet::MAX_AUDIO_LAENGE;

use crate::error::{VoiceFehler, VoiceResult};

/// Encoder/Decoder fuer Mono-Frames mit `SAMPLES_PRO_FRAME` Samples
pub trait AudioCodec: Send {
    fn encode(&mut self, samples: &[f32]) -> VoiceResult<Vec<u8>>;

    /// `None` verlangt einen verschleierten Ersatz-Frame
    fn decode(&mut self, daten: Option<&[u8]>) -> VoiceResult<Vec<f32>>;
}

/// Fabrik fuer einen Codec pro Sprecher
pub type CodecFabrik = Arc<dyn Fn() -> VoiceResult<Box<dyn AudioCodec>> + Send + Sync>;

/// Sprach-Bitrate des Encoders
pub const OPUS_BITRATE_BPS: i32 = 32_000;

/// Opus-Codec (48 kHz, Mono, VoIP-Profil, In-Band-FEC)
pub struct OpusCodec {
    encoder: Encoder,
    decoder: Decoder,
}

impl OpusCodec {
    pub fn neu() -> VoiceResult<Self> {
        let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)
            .map_err(|e| VoiceFehler::Codec(e.to_string()))?;
        encoder
            .set_bitrate(Bitrate::BitsPerSecond(OPUS_BITRATE_BPS))
            .map_err(|e| VoiceFehler::Codec(e.to_string()))?;
        encoder
            .set_inband_fec(true)
            .map_err(|e| VoiceFehler::Codec(e.to_string()))?;
        let decoder = Decoder::new(SampleRate::Hz48000, Channels::Mono)
            .map_err(|e| VoiceFehler::Codec(e.to_string()))?;

        debug!(bitrate = OPUS_BITRATE_BPS, "OpusCodec erstellt");
        Ok(Self { encoder, decoder })
    }

    /// Fabrik, die pro Sprecher einen eigenen Opus-Zustand anlegt
    pub fn fabrik() -> CodecFabrik {
        Arc::new(|| Ok(Box::new(OpusCodec::neu()?) as Box<dyn AudioCodec>))
    }
}

impl std::fmt::Debug for OpusCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpusCodec").finish_non_exhaustive()
    }
}

impl AudioCodec for OpusCodec {
    fn encode(&mut self, samples: &[f32]) -> VoiceResult<Vec<u8>> {
        if samples.len() != SAMPLES_PRO_FRAME {
            return Err(VoiceFehler::FrameLaenge {
                laenge: samples.len(),
                erwartet: SAMPLES_PRO_FRAME,
            });
        }
        let mut ausgabe = vec![0u8; MAX_AUDIO_LAENGE];
        let geschrieben = self
            .encoder
            .encode_float(samples, &mut ausgabe)
            .map_err(|e| VoiceFehler::Codec(e.to_string()))?;
        ausgabe.truncate(geschrieben);
        Ok(ausgabe)
    }

    fn decode(&mut self, daten: Option<&[u8]>) -> VoiceResult<Vec<f32>> {
        let mut ausgabe = vec![0.0f32; SAMPLES_PRO_FRAME];
        let dekodiert = self
            .decoder
            .decode_float(daten, &mut ausgabe, false)
            .map_err(|e| VoiceFehler::Codec(e.to_string()))?;
        ausgabe.truncate(dekodiert);
        Ok(ausgabe)
    }
}
