//! voicecraft-voice – Empfangspfad fuer Sprachaudio
//!
//! Vom Netzwerk bis zum Lautsprecher: Frames landen im Jitter Buffer einer
//! Client-Entity, werden im Frame-Takt dekodiert und vom Mischer mit der
//! Effektkette fuer den lokalen Hoerer zusammengefuehrt.
//!
//! ## Module
//! - [`jitter_buffer`] – Sequenzgeordneter Frame-Puffer mit Verlusterkennung
//! - [`codec`] – Codec-Abstraktion und Opus-Codec
//! - [`client_entity`] – Entfernter Sprecher mit Decode-Pipeline
//! - [`registry`] – Client-Entities und ihre Decode-Tasks
//! - [`mixer`] – Stereo-Mischung mit Effekten

pub mod client_entity;
pub mod codec;
pub mod error;
pub mod jitter_buffer;
pub mod mixer;
pub mod registry;

pub use client_entity::{ClientEntity, ClientEntityConfig, DecodeSchritt};
pub use codec::{AudioCodec, CodecFabrik, OpusCodec};
pub use error::{VoiceFehler, VoiceResult};
pub use jitter_buffer::{Frame, JitterBuffer, JitterBufferConfig, JitterStatus};
pub use mixer::Mischer;
pub use registry::ClientEntityRegistry;
