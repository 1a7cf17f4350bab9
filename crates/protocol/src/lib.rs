//! voicecraft-protocol – Binaeres Paketprotokoll
//!
//! Dieses Crate definiert die geschlossene Paket-Taxonomie, das
//! Header-Framing, den Paket-Pool und die Wire-Form der Effekt-Parameter.

pub mod audio;
pub mod effekt;
pub mod error;
pub mod header;
pub mod packet;
pub mod pool;
pub mod puffer;

pub use effekt::{EffektParameter, EffektTyp};
pub use error::ProtokollFehler;
pub use header::{dekodieren, kodieren, PaketHeader};
pub use packet::{Packet, PacketType};
pub use pool::{GepooltesPaket, PaketPool, PoolStatistik};
pub use puffer::nutzdaten_pruefen;
