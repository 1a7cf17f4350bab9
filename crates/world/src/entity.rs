//! Entity-Modell
//!
//! Eine `Entity` ist ein Teilnehmer der Welt (Spieler oder Bridge-Objekt).
//! Felder werden nur ueber die Setter veraendert; jeder Setter meldet, ob
//! sich der Wert tatsaechlich geaendert hat, damit der Server nur echte
//! Aenderungen verteilt.

use std::collections::HashSet;

use glam::{Vec2, Vec3};
use uuid::Uuid;
use voicecraft_core::{Bitmask, EntityId, PositioningType, VerbindungsId, BITMASK_ALLE};
use voicecraft_protocol::packet::EntityCreatedPacket;

/// Bindung einer Entity an eine Peer-Verbindung (nur serverseitig)
#[derive(Debug, Clone, PartialEq)]
pub struct NetzwerkBindung {
    pub peer: VerbindungsId,
    pub user_guid: Uuid,
    pub server_user_guid: Uuid,
    pub locale: String,
    pub positioning_type: PositioningType,
    pub server_muted: bool,
    pub server_deafened: bool,
}

impl NetzwerkBindung {
    pub fn neu(peer: VerbindungsId) -> Self {
        Self {
            peer,
            user_guid: Uuid::nil(),
            server_user_guid: Uuid::nil(),
            locale: String::new(),
            positioning_type: PositioningType::default(),
            server_muted: false,
            server_deafened: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    name: String,
    position: Vec3,
    rotation: Vec2,
    talk_bitmask: Bitmask,
    listen_bitmask: Bitmask,
    effect_bitmask: Bitmask,
    cave_factor: f32,
    muffle_factor: f32,
    world_id: String,
    muted: bool,
    deafened: bool,
    /// Entities, die diese Entity hoeren duerfen (vom Sichtbarkeits-System gepflegt)
    pub(crate) sichtbar: HashSet<EntityId>,
    netzwerk: Option<NetzwerkBindung>,
}

macro_rules! setter {
    ($name:ident, $feld:ident, $typ:ty) => {
        pub fn $name(&mut self, wert: $typ) -> bool {
            if self.$feld == wert {
                return false;
            }
            self.$feld = wert;
            true
        }
    };
}

impl Entity {
    pub(crate) fn neu(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
            position: Vec3::ZERO,
            rotation: Vec2::ZERO,
            talk_bitmask: BITMASK_ALLE,
            listen_bitmask: BITMASK_ALLE,
            effect_bitmask: BITMASK_ALLE,
            cave_factor: 0.0,
            muffle_factor: 0.0,
            world_id: String::new(),
            muted: false,
            deafened: false,
            sichtbar: HashSet::new(),
            netzwerk: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec2 {
        self.rotation
    }

    pub fn talk_bitmask(&self) -> Bitmask {
        self.talk_bitmask
    }

    pub fn listen_bitmask(&self) -> Bitmask {
        self.listen_bitmask
    }

    pub fn effect_bitmask(&self) -> Bitmask {
        self.effect_bitmask
    }

    pub fn cave_factor(&self) -> f32 {
        self.cave_factor
    }

    pub fn muffle_factor(&self) -> f32 {
        self.muffle_factor
    }

    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn deafened(&self) -> bool {
        self.deafened
    }

    pub fn netzwerk(&self) -> Option<&NetzwerkBindung> {
        self.netzwerk.as_ref()
    }

    pub fn ist_netzwerk_entity(&self) -> bool {
        self.netzwerk.is_some()
    }

    /// Entities, die diese Entity gerade hoeren duerfen
    pub fn sichtbare(&self) -> &HashSet<EntityId> {
        &self.sichtbar
    }

    pub fn ist_sichtbar_fuer(&self, hoerer: EntityId) -> bool {
        self.sichtbar.contains(&hoerer)
    }

    /// Stumm durch eigenen Wunsch oder durch den Server
    pub fn effektiv_stumm(&self) -> bool {
        self.muted || self.netzwerk.as_ref().is_some_and(|n| n.server_muted)
    }

    /// Taub durch eigenen Wunsch oder durch den Server
    pub fn effektiv_taub(&self) -> bool {
        self.deafened || self.netzwerk.as_ref().is_some_and(|n| n.server_deafened)
    }

    // --- Setter ---

    setter!(position_setzen, position, Vec3);
    setter!(rotation_setzen, rotation, Vec2);
    setter!(talk_bitmask_setzen, talk_bitmask, Bitmask);
    setter!(listen_bitmask_setzen, listen_bitmask, Bitmask);
    setter!(effect_bitmask_setzen, effect_bitmask, Bitmask);
    setter!(muted_setzen, muted, bool);
    setter!(deafened_setzen, deafened, bool);

    /// Faktoren werden auf 0..1 begrenzt
    pub fn cave_factor_setzen(&mut self, wert: f32) -> bool {
        let wert = wert.clamp(0.0, 1.0);
        if self.cave_factor == wert {
            return false;
        }
        self.cave_factor = wert;
        true
    }

    pub fn muffle_factor_setzen(&mut self, wert: f32) -> bool {
        let wert = wert.clamp(0.0, 1.0);
        if self.muffle_factor == wert {
            return false;
        }
        self.muffle_factor = wert;
        true
    }

    pub fn name_setzen(&mut self, wert: &str) -> bool {
        if self.name == wert {
            return false;
        }
        self.name = wert.to_string();
        true
    }

    pub fn world_id_setzen(&mut self, wert: &str) -> bool {
        if self.world_id == wert {
            return false;
        }
        self.world_id = wert.to_string();
        true
    }

    pub fn server_muted_setzen(&mut self, wert: bool) -> bool {
        match self.netzwerk.as_mut() {
            Some(n) if n.server_muted != wert => {
                n.server_muted = wert;
                true
            }
            _ => false,
        }
    }

    pub fn server_deafened_setzen(&mut self, wert: bool) -> bool {
        match self.netzwerk.as_mut() {
            Some(n) if n.server_deafened != wert => {
                n.server_deafened = wert;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn netzwerk_binden(&mut self, bindung: NetzwerkBindung) {
        self.netzwerk = Some(bindung);
    }

    /// Vollstaendiger Schnappschuss fuer `EntityCreated`
    pub fn schnappschuss(&self) -> EntityCreatedPacket {
        EntityCreatedPacket {
            entity_id: self.id,
            name: self.name.clone(),
            muted: self.muted,
            deafened: self.deafened,
            talk_bitmask: self.talk_bitmask,
            listen_bitmask: self.listen_bitmask,
            effect_bitmask: self.effect_bitmask,
            position: self.position,
            rotation: self.rotation,
            cave_factor: self.cave_factor,
            muffle_factor: self.muffle_factor,
            world_id: self.world_id.clone(),
        }
    }

    /// Uebernimmt einen Schnappschuss (clientseitige Spiegelung)
    pub fn schnappschuss_anwenden(&mut self, s: &EntityCreatedPacket) {
        self.name_setzen(&s.name);
        self.muted = s.muted;
        self.deafened = s.deafened;
        self.talk_bitmask = s.talk_bitmask;
        self.listen_bitmask = s.listen_bitmask;
        self.effect_bitmask = s.effect_bitmask;
        self.position = s.position;
        self.rotation = s.rotation;
        self.cave_factor_setzen(s.cave_factor);
        self.muffle_factor_setzen(s.muffle_factor);
        self.world_id_setzen(&s.world_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_meldet_aenderung() {
        let mut e = Entity::neu(EntityId(1));
        assert!(e.position_setzen(Vec3::X));
        assert!(!e.position_setzen(Vec3::X));
        assert!(e.world_id_setzen("nether"));
        assert!(!e.world_id_setzen("nether"));
    }

    #[test]
    fn faktoren_werden_begrenzt() {
        let mut e = Entity::neu(EntityId(1));
        e.cave_factor_setzen(3.0);
        assert_eq!(e.cave_factor(), 1.0);
        e.muffle_factor_setzen(-1.0);
        assert_eq!(e.muffle_factor(), 0.0);
    }

    #[test]
    fn server_mute_nur_mit_bindung() {
        let mut e = Entity::neu(EntityId(1));
        assert!(!e.server_muted_setzen(true));
        assert!(!e.effektiv_stumm());

        e.netzwerk_binden(NetzwerkBindung::neu(VerbindungsId(9)));
        assert!(e.server_muted_setzen(true));
        assert!(e.effektiv_stumm());
        assert!(!e.effektiv_taub());
    }

    #[test]
    fn schnappschuss_durchlauf() {
        let mut a = Entity::neu(EntityId(2));
        a.name_setzen("Alex");
        a.position_setzen(Vec3::new(1.0, 2.0, 3.0));
        a.talk_bitmask_setzen(0x3);
        a.world_id_setzen("overworld");

        let mut b = Entity::neu(EntityId(2));
        b.schnappschuss_anwenden(&a.schnappschuss());
        assert_eq!(b.schnappschuss(), a.schnappschuss());
    }
}
