//! voicecraft-core – Gemeinsame Typen, Bitmasken und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen VoiceCraft-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, VoiceCraftError};
pub use types::{Bitmask, EntityId, PositioningType, VerbindungsId, Version, BITMASK_ALLE};
