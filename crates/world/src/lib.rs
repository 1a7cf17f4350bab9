//! voicecraft-world – Entities, Audio-Effekte und Sichtbarkeit
//!
//! Die [`Welt`] besitzt alle Entities als Arena nach ID. Das
//! [`AudioEffektSystem`] und andere Subsysteme registrieren sich als
//! [`WeltBeobachter`] und raeumen ihren Zustand beim Zerstoeren ab.

pub mod effekte;
pub mod entity;
pub mod error;
pub mod sichtbarkeit;
pub mod welt;

pub use effekte::{standard_effekte, AudioEffekt, AudioEffektSystem, EffektEreignis};
pub use entity::{Entity, NetzwerkBindung};
pub use error::{WeltFehler, WeltResult};
pub use sichtbarkeit::{SichtbarkeitsAenderung, SichtbarkeitsSystem};
pub use welt::{Welt, WeltBeobachter};
