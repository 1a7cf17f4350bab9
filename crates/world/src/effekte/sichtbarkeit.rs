//! Sichtbarkeit nach Welt-ID
//!
//! Zwei Entities hoeren sich nur, wenn sie in derselben logischen Welt
//! (Dimension) sind. Das Audio selbst bleibt unveraendert.

use crate::entity::Entity;

#[derive(Debug, Default, Clone, Copy)]
pub struct SichtbarkeitsEffekt;

impl SichtbarkeitsEffekt {
    pub fn sichtbar(&self, sprecher: &Entity, hoerer: &Entity) -> bool {
        sprecher.world_id() == hoerer.world_id()
    }
}
