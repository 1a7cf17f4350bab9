//! Audio-Format auf dem Draht und im Mixer

/// Abtastrate in Hz
pub const ABTASTRATE: u32 = 48_000;

/// Frame-Dauer in Millisekunden
pub const FRAME_MS: u32 = 20;

/// Samples pro Frame und Kanal (48 kHz * 20 ms)
pub const SAMPLES_PRO_FRAME: usize = (ABTASTRATE as usize / 1000) * FRAME_MS as usize;

/// Kanaele auf dem Draht (Mono)
pub const KANAELE_UEBERTRAGUNG: usize = 1;

/// Kanaele im Mixer (interleaved Stereo)
pub const KANAELE_MIX: usize = 2;

/// Interleavte Samples eines Stereo-Frames
pub const SAMPLES_PRO_MIX_FRAME: usize = SAMPLES_PRO_FRAME * KANAELE_MIX;
