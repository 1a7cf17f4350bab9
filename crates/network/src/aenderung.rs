//! Einzelne Zustandsaenderungen einer Entity
//!
//! Gemeinsame Form fuer Bridge-Aufrufe, Client-Anfragen und
//! Server-Ereignisse: eine Aenderung wird auf eine [`Entity`] angewendet
//! und als Ereignis-Paket verteilt bzw. aus einem solchen gelesen.

use glam::{Vec2, Vec3};
use voicecraft_core::{Bitmask, EntityId};
use voicecraft_protocol::packet::{
    EntityBitmaskPacket, EntityFaktorPacket, EntityFlagPacket, EntityPositionPacket,
    EntityRotationPacket, EntityWeltPacket,
};
use voicecraft_protocol::Packet;
use voicecraft_world::Entity;

#[derive(Debug, Clone, PartialEq)]
pub enum EntityAenderung {
    Position(Vec3),
    Rotation(Vec2),
    WorldId(String),
    CaveFactor(f32),
    MuffleFactor(f32),
    TalkBitmask(Bitmask),
    ListenBitmask(Bitmask),
    EffectBitmask(Bitmask),
    Muted(bool),
    Deafened(bool),
    ServerMuted(bool),
    ServerDeafened(bool),
}

impl EntityAenderung {
    /// Wendet die Aenderung an; `true`, wenn sich etwas geaendert hat
    pub fn anwenden(&self, entity: &mut Entity) -> bool {
        match self {
            Self::Position(p) => entity.position_setzen(*p),
            Self::Rotation(r) => entity.rotation_setzen(*r),
            Self::WorldId(w) => entity.world_id_setzen(w),
            Self::CaveFactor(f) => entity.cave_factor_setzen(*f),
            Self::MuffleFactor(f) => entity.muffle_factor_setzen(*f),
            Self::TalkBitmask(b) => entity.talk_bitmask_setzen(*b),
            Self::ListenBitmask(b) => entity.listen_bitmask_setzen(*b),
            Self::EffectBitmask(b) => entity.effect_bitmask_setzen(*b),
            Self::Muted(m) => entity.muted_setzen(*m),
            Self::Deafened(d) => entity.deafened_setzen(*d),
            Self::ServerMuted(m) => entity.server_muted_setzen(*m),
            Self::ServerDeafened(d) => entity.server_deafened_setzen(*d),
        }
    }

    /// Ereignis-Paket, das die Aenderung an Clients verteilt
    pub fn als_ereignis(&self, entity_id: EntityId) -> Packet {
        match self {
            Self::Position(p) => Packet::SetPosition(EntityPositionPacket {
                entity_id,
                position: *p,
            }),
            Self::Rotation(r) => Packet::SetRotation(EntityRotationPacket {
                entity_id,
                rotation: *r,
            }),
            Self::WorldId(w) => Packet::SetWorldId(EntityWeltPacket {
                entity_id,
                world_id: w.clone(),
            }),
            Self::CaveFactor(f) => Packet::SetCaveFactor(EntityFaktorPacket { entity_id, wert: *f }),
            Self::MuffleFactor(f) => {
                Packet::SetMuffleFactor(EntityFaktorPacket { entity_id, wert: *f })
            }
            Self::TalkBitmask(b) => Packet::SetTalkBitmask(EntityBitmaskPacket {
                entity_id,
                bitmask: *b,
            }),
            Self::ListenBitmask(b) => Packet::SetListenBitmask(EntityBitmaskPacket {
                entity_id,
                bitmask: *b,
            }),
            Self::EffectBitmask(b) => Packet::SetEffectBitmask(EntityBitmaskPacket {
                entity_id,
                bitmask: *b,
            }),
            Self::Muted(m) => Packet::SetMute(EntityFlagPacket { entity_id, wert: *m }),
            Self::Deafened(d) => Packet::SetDeafen(EntityFlagPacket { entity_id, wert: *d }),
            Self::ServerMuted(m) => Packet::SetServerMute(EntityFlagPacket { entity_id, wert: *m }),
            Self::ServerDeafened(d) => {
                Packet::SetServerDeafen(EntityFlagPacket { entity_id, wert: *d })
            }
        }
    }

    /// Liest eine Aenderung aus einem Ereignis-Paket
    pub fn aus_ereignis(paket: &Packet) -> Option<(EntityId, Self)> {
        let ergebnis = match paket {
            Packet::SetPosition(p) => (p.entity_id, Self::Position(p.position)),
            Packet::SetRotation(p) => (p.entity_id, Self::Rotation(p.rotation)),
            Packet::SetWorldId(p) => (p.entity_id, Self::WorldId(p.world_id.clone())),
            Packet::SetCaveFactor(p) => (p.entity_id, Self::CaveFactor(p.wert)),
            Packet::SetMuffleFactor(p) => (p.entity_id, Self::MuffleFactor(p.wert)),
            Packet::SetTalkBitmask(p) => (p.entity_id, Self::TalkBitmask(p.bitmask)),
            Packet::SetListenBitmask(p) => (p.entity_id, Self::ListenBitmask(p.bitmask)),
            Packet::SetEffectBitmask(p) => (p.entity_id, Self::EffectBitmask(p.bitmask)),
            Packet::SetMute(p) => (p.entity_id, Self::Muted(p.wert)),
            Packet::SetDeafen(p) => (p.entity_id, Self::Deafened(p.wert)),
            Packet::SetServerMute(p) => (p.entity_id, Self::ServerMuted(p.wert)),
            Packet::SetServerDeafen(p) => (p.entity_id, Self::ServerDeafened(p.wert)),
            _ => return None,
        };
        Some(ergebnis)
    }

    /// Liest eine Aenderung aus einer Client-Anfrage
    pub fn aus_anfrage(paket: &Packet) -> Option<Self> {
        let aenderung = match paket {
            Packet::SetPositionRequest(p) => Self::Position(p.position),
            Packet::SetRotationRequest(p) => Self::Rotation(p.rotation),
            Packet::SetWorldIdRequest(p) => Self::WorldId(p.world_id.clone()),
            Packet::SetCaveFactorRequest(p) => Self::CaveFactor(p.wert),
            Packet::SetMuffleFactorRequest(p) => Self::MuffleFactor(p.wert),
            Packet::SetMuteRequest(p) => Self::Muted(p.wert),
            Packet::SetDeafenRequest(p) => Self::Deafened(p.wert),
            _ => return None,
        };
        Some(aenderung)
    }

    /// Positionsdaten, die bei serverseitiger Positionierung nur der Server setzt
    pub fn ist_positionierung(&self) -> bool {
        matches!(
            self,
            Self::Position(_)
                | Self::Rotation(_)
                | Self::WorldId(_)
                | Self::CaveFactor(_)
                | Self::MuffleFactor(_)
        )
    }
}
