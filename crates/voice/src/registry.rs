//! Registry der Client-Entities und ihrer Decode-Tasks
//!
//! Pro entferntem Sprecher laeuft eine Tokio-Task im Frame-Takt, die den
//! Jitter Buffer in den Ausgabepuffer dekodiert. Die Registry ist als
//! [`WeltBeobachter`] registriert: wird die Entity in der Welt zerstoert,
//! endet die Task und die Client-Entity wird entfernt.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use voicecraft_core::EntityId;
use voicecraft_world::WeltBeobachter;

use crate::client_entity::{ClientEntity, ClientEntityConfig};
use crate::codec::CodecFabrik;
use crate::error::VoiceResult;

pub struct ClientEntityRegistry {
    entitaeten: DashMap<EntityId, Arc<ClientEntity>>,
    tasks: DashMap<EntityId, JoinHandle<()>>,
    codec_fabrik: CodecFabrik,
    config: ClientEntityConfig,
}

impl std::fmt::Debug for ClientEntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEntityRegistry")
            .field("entitaeten", &self.entitaeten.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ClientEntityRegistry {
    pub fn neu(codec_fabrik: CodecFabrik, config: ClientEntityConfig) -> Self {
        Self {
            entitaeten: DashMap::new(),
            tasks: DashMap::new(),
            codec_fabrik,
            config,
        }
    }

    /// Legt eine Client-Entity an und startet ihre Decode-Task
    ///
    /// Muss innerhalb einer Tokio-Runtime aufgerufen werden.
    pub fn erstellen(&self, id: EntityId) -> VoiceResult<Arc<ClientEntity>> {
        if let Some(vorhanden) = self.entitaeten.get(&id) {
            return Ok(vorhanden.clone());
        }
        let decoder = (self.codec_fabrik)()?;
        let entity = Arc::new(ClientEntity::neu(id, decoder, &self.config));
        let frame_dauer = Duration::from_millis(self.config.jitter.frame_ms.max(1) as u64);
        let task = decode_task_starten(entity.clone(), frame_dauer);

        self.entitaeten.insert(id, entity.clone());
        self.tasks.insert(id, task);
        tracing::debug!(entity = %id, "Client-Entity erstellt");
        Ok(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<ClientEntity>> {
        self.entitaeten.get(&id).map(|e| e.clone())
    }

    pub fn alle(&self) -> Vec<Arc<ClientEntity>> {
        self.entitaeten.iter().map(|e| e.value().clone()).collect()
    }

    pub fn anzahl(&self) -> usize {
        self.entitaeten.len()
    }

    /// Entfernt eine Client-Entity und beendet ihre Task
    pub fn entfernen(&self, id: EntityId) {
        if let Some((_, entity)) = self.entitaeten.remove(&id) {
            entity.zerstoeren();
        }
        if let Some((_, task)) = self.tasks.remove(&id) {
            task.abort();
        }
    }

    pub fn leeren(&self) {
        let ids: Vec<EntityId> = self.entitaeten.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.entfernen(id);
        }
    }
}

impl WeltBeobachter for ClientEntityRegistry {
    fn entity_zerstoert(&self, id: EntityId) {
        self.entfernen(id);
    }
}

impl Drop for ClientEntityRegistry {
    fn drop(&mut self) {
        for task in self.tasks.iter() {
            task.abort();
        }
    }
}

/// Startet die Decode-Schleife einer Client-Entity
pub fn decode_task_starten(entity: Arc<ClientEntity>, frame_dauer: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(frame_dauer);
        takt.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            takt.tick().await;
            match entity.dekodieren() {
                Ok(_) => {}
                Err(crate::error::VoiceFehler::Zerstoert(_)) => break,
                Err(e) => {
                    tracing::debug!(entity = %entity.id(), fehler = %e, "Decode-Schritt fehlgeschlagen");
                }
            }
        }
        tracing::trace!(entity = %entity.id(), "Decode-Task beendet");
    })
}
