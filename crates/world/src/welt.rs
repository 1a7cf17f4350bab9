//! Entity-Welt (Arena nach `EntityId`)
//!
//! Die Welt besitzt alle Entities. Andere Subsysteme halten nur IDs und
//! registrieren sich als [`WeltBeobachter`], um beim Zerstoeren ihren
//! Zustand abzuraeumen. `zerstoeren` benachrichtigt alle Beobachter genau
//! einmal und synchron, bevor die Entity aus der Arena entfernt wird.

use std::collections::HashMap;
use std::sync::Arc;

use voicecraft_core::{EntityId, VerbindungsId};

use crate::entity::{Entity, NetzwerkBindung};
use crate::error::{WeltFehler, WeltResult};

/// Empfaenger von Lebenszyklus-Ereignissen der Welt
pub trait WeltBeobachter: Send + Sync {
    /// Wird vor dem Entfernen der Entity aufgerufen
    fn entity_zerstoert(&self, id: EntityId);
}

#[derive(Default)]
pub struct Welt {
    pub(crate) entitaeten: HashMap<EntityId, Entity>,
    beobachter: Vec<Arc<dyn WeltBeobachter>>,
    naechste_id: i32,
}

impl std::fmt::Debug for Welt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Welt")
            .field("entitaeten", &self.entitaeten.len())
            .field("beobachter", &self.beobachter.len())
            .finish()
    }
}

impl Welt {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn beobachter_registrieren(&mut self, beobachter: Arc<dyn WeltBeobachter>) {
        self.beobachter.push(beobachter);
    }

    /// Legt eine Entity mit vorgegebener ID an
    pub fn erstellen(&mut self, id: EntityId) -> WeltResult<&mut Entity> {
        if self.entitaeten.contains_key(&id) {
            return Err(WeltFehler::EntityExistiert(id));
        }
        tracing::debug!(entity = %id, "Entity erstellt");
        Ok(self.entitaeten.entry(id).or_insert_with(|| Entity::neu(id)))
    }

    /// Legt eine Entity mit der naechsten freien ID an
    pub fn erstellen_frei(&mut self) -> &mut Entity {
        let id = self.freie_id();
        self.entitaeten.entry(id).or_insert_with(|| Entity::neu(id))
    }

    /// Legt eine an einen Peer gebundene Entity an (akzeptierter Login)
    pub fn erstellen_netzwerk(&mut self, bindung: NetzwerkBindung) -> &mut Entity {
        let peer = bindung.peer;
        let entity = self.erstellen_frei();
        entity.netzwerk_binden(bindung);
        tracing::debug!(entity = %entity.id(), %peer, "Netzwerk-Entity erstellt");
        entity
    }

    fn freie_id(&mut self) -> EntityId {
        loop {
            let id = EntityId(self.naechste_id);
            self.naechste_id = self.naechste_id.wrapping_add(1);
            if !self.entitaeten.contains_key(&id) {
                return id;
            }
        }
    }

    /// Zerstoert eine Entity
    ///
    /// Reihenfolge: Beobachter benachrichtigen, Verweise aus allen
    /// Sichtbarkeitsmengen entfernen, Entity aus der Arena nehmen.
    pub fn zerstoeren(&mut self, id: EntityId) -> WeltResult<Entity> {
        if !self.entitaeten.contains_key(&id) {
            return Err(WeltFehler::EntityZerstoert(id));
        }
        for b in &self.beobachter {
            b.entity_zerstoert(id);
        }
        for andere in self.entitaeten.values_mut() {
            andere.sichtbar.remove(&id);
        }
        let entity = self
            .entitaeten
            .remove(&id)
            .ok_or(WeltFehler::EntityZerstoert(id))?;
        tracing::debug!(entity = %id, "Entity zerstoert");
        Ok(entity)
    }

    /// Zerstoert alle Entities (Beobachter werden je Entity benachrichtigt)
    pub fn leeren(&mut self) {
        let ids: Vec<EntityId> = self.entitaeten.keys().copied().collect();
        for id in ids {
            let _ = self.zerstoeren(id);
        }
    }

    pub fn entity(&self, id: EntityId) -> WeltResult<&Entity> {
        self.entitaeten.get(&id).ok_or(WeltFehler::EntityZerstoert(id))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> WeltResult<&mut Entity> {
        self.entitaeten
            .get_mut(&id)
            .ok_or(WeltFehler::EntityZerstoert(id))
    }

    pub fn existiert(&self, id: EntityId) -> bool {
        self.entitaeten.contains_key(&id)
    }

    pub fn alle(&self) -> impl Iterator<Item = &Entity> {
        self.entitaeten.values()
    }

    pub fn netzwerk_entitaeten(&self) -> impl Iterator<Item = &Entity> {
        self.entitaeten.values().filter(|e| e.ist_netzwerk_entity())
    }

    /// Sucht die Entity eines Peers
    pub fn nach_peer(&self, peer: VerbindungsId) -> Option<&Entity> {
        self.netzwerk_entitaeten()
            .find(|e| e.netzwerk().is_some_and(|n| n.peer == peer))
    }

    pub fn anzahl(&self) -> usize {
        self.entitaeten.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Protokoll {
        zerstoert: Mutex<Vec<EntityId>>,
    }

    impl WeltBeobachter for Protokoll {
        fn entity_zerstoert(&self, id: EntityId) {
            self.zerstoert.lock().push(id);
        }
    }

    #[test]
    fn erstellen_und_aufzaehlen() {
        let mut welt = Welt::neu();
        welt.erstellen(EntityId(5)).unwrap();
        welt.erstellen(EntityId(6)).unwrap();
        assert_eq!(welt.anzahl(), 2);
        assert_eq!(
            welt.erstellen(EntityId(5)).unwrap_err(),
            WeltFehler::EntityExistiert(EntityId(5))
        );
    }

    #[test]
    fn zerstoeren_benachrichtigt_genau_einmal() {
        let mut welt = Welt::neu();
        let protokoll = Arc::new(Protokoll::default());
        welt.beobachter_registrieren(protokoll.clone());

        welt.erstellen(EntityId(1)).unwrap();
        welt.zerstoeren(EntityId(1)).unwrap();
        assert_eq!(*protokoll.zerstoert.lock(), vec![EntityId(1)]);

        // Zweites Zerstoeren ist ein expliziter Fehler ohne Benachrichtigung
        assert_eq!(
            welt.zerstoeren(EntityId(1)).unwrap_err(),
            WeltFehler::EntityZerstoert(EntityId(1))
        );
        assert_eq!(protokoll.zerstoert.lock().len(), 1);
    }

    #[test]
    fn zugriff_nach_zerstoerung() {
        let mut welt = Welt::neu();
        welt.erstellen(EntityId(1)).unwrap();
        welt.zerstoeren(EntityId(1)).unwrap();
        assert!(welt.entity(EntityId(1)).is_err());
        assert!(welt.entity_mut(EntityId(1)).is_err());
    }

    #[test]
    fn zerstoeren_entfernt_sichtbarkeitsverweise() {
        let mut welt = Welt::neu();
        welt.erstellen(EntityId(1)).unwrap().sichtbar.insert(EntityId(2));
        welt.erstellen(EntityId(2)).unwrap();
        welt.zerstoeren(EntityId(2)).unwrap();
        assert!(welt.entity(EntityId(1)).unwrap().sichtbare().is_empty());
    }

    #[test]
    fn netzwerk_entity_nach_peer() {
        let mut welt = Welt::neu();
        welt.erstellen_frei();
        let id = welt
            .erstellen_netzwerk(NetzwerkBindung::neu(VerbindungsId(77)))
            .id();
        assert_eq!(welt.nach_peer(VerbindungsId(77)).map(|e| e.id()), Some(id));
        assert_eq!(welt.netzwerk_entitaeten().count(), 1);
        assert!(welt.nach_peer(VerbindungsId(78)).is_none());
    }
}
