//! Sichtbarkeits-System
//!
//! Berechnet einmal pro Tick, welche Netzwerk-Entities jede Entity hoeren
//! duerfen. Phase 1 laeuft parallel (rayon) ueber eine unveraenderliche
//! Welt und erzeugt pro Entity die neue Menge; Phase 2 uebernimmt die
//! Mengen und meldet die Unterschiede. Jede Entity schreibt nur ihre
//! eigene Menge.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use voicecraft_core::EntityId;

use crate::effekte::AudioEffektSystem;
use crate::entity::Entity;
use crate::welt::Welt;

/// Eine geaenderte Sichtbarkeit `sprecher → hoerer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SichtbarkeitsAenderung {
    pub sprecher: EntityId,
    pub hoerer: EntityId,
    pub sichtbar: bool,
}

#[derive(Debug, Clone)]
pub struct SichtbarkeitsSystem {
    effekte: Arc<AudioEffektSystem>,
}

impl SichtbarkeitsSystem {
    pub fn neu(effekte: Arc<AudioEffektSystem>) -> Self {
        Self { effekte }
    }

    /// Darf `hoerer` den `sprecher` hoeren?
    pub fn sichtbar(&self, sprecher: &Entity, hoerer: &Entity) -> bool {
        if sprecher.id() == hoerer.id() {
            return false;
        }
        if sprecher.talk_bitmask() & hoerer.listen_bitmask() == 0 {
            return false;
        }
        self.effekte.sichtbar(sprecher, hoerer)
    }

    fn berechnen(&self, welt: &Welt, sprecher: &Entity) -> HashSet<EntityId> {
        welt.netzwerk_entitaeten()
            .filter(|hoerer| self.sichtbar(sprecher, hoerer))
            .map(Entity::id)
            .collect()
    }

    /// Fuehrt einen Durchlauf aus und liefert alle Aenderungen
    ///
    /// Verweise auf nicht mehr existierende Entities werden still entfernt.
    pub fn aktualisieren(&self, welt: &mut Welt) -> Vec<SichtbarkeitsAenderung> {
        let lesend: &Welt = welt;
        let neu: Vec<(EntityId, HashSet<EntityId>)> = lesend
            .entitaeten
            .par_iter()
            .map(|(id, entity)| (*id, self.berechnen(lesend, entity)))
            .collect();

        let mut aenderungen = Vec::new();
        for (id, menge) in neu {
            let Some(entity) = welt.entitaeten.get(&id) else {
                continue;
            };
            for hoerer in menge.difference(&entity.sichtbar) {
                aenderungen.push(SichtbarkeitsAenderung {
                    sprecher: id,
                    hoerer: *hoerer,
                    sichtbar: true,
                });
            }
            for hoerer in entity.sichtbar.difference(&menge) {
                if welt.entitaeten.contains_key(hoerer) {
                    aenderungen.push(SichtbarkeitsAenderung {
                        sprecher: id,
                        hoerer: *hoerer,
                        sichtbar: false,
                    });
                }
            }
            if let Some(entity) = welt.entitaeten.get_mut(&id) {
                entity.sichtbar = menge;
            }
        }

        if !aenderungen.is_empty() {
            tracing::trace!(anzahl = aenderungen.len(), "Sichtbarkeit geaendert");
        }
        aenderungen
    }
}
