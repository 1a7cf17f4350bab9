//! Peer-Registry eines Endpunkts
//!
//! Einzige Stelle, an der Peers angelegt und entfernt werden. Gehoert dem
//! Endpunkt und wird explizit weitergereicht.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use voicecraft_core::VerbindungsId;

use crate::peer::{Peer, PeerZustand};

#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<VerbindungsId, Peer>,
}

impl PeerRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Erzeugt eine zufaellige, unbenutzte Verbindungs-ID (nie `UNVERBUNDEN`)
    pub fn neue_id(&self) -> VerbindungsId {
        loop {
            let id = VerbindungsId(rand::random::<i64>());
            if id != VerbindungsId::UNVERBUNDEN && !self.peers.contains_key(&id) {
                return id;
            }
        }
    }

    /// Legt einen Peer an; ein bestehender Eintrag bleibt unveraendert
    pub fn anlegen(
        &mut self,
        id: VerbindungsId,
        adresse: SocketAddr,
        zustand: PeerZustand,
        jetzt: Instant,
    ) -> &mut Peer {
        self.peers.entry(id).or_insert_with(|| {
            tracing::debug!(peer = %id, %adresse, ?zustand, "Peer angelegt");
            Peer::neu(id, adresse, zustand, jetzt)
        })
    }

    pub fn entfernen(&mut self, id: VerbindungsId) -> Option<Peer> {
        let peer = self.peers.remove(&id);
        if peer.is_some() {
            tracing::debug!(peer = %id, "Peer entfernt");
        }
        peer
    }

    pub fn get(&self, id: VerbindungsId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn get_mut(&mut self, id: VerbindungsId) -> Option<&mut Peer> {
        self.peers.get_mut(&id)
    }

    pub fn enthaelt(&self, id: VerbindungsId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn alle(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub(crate) fn alle_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.values_mut()
    }

    pub fn verbundene(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values().filter(|p| p.ist_verbunden())
    }

    pub fn anzahl(&self) -> usize {
        self.peers.len()
    }

    pub fn anzahl_verbunden(&self) -> usize {
        self.verbundene().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adresse() -> SocketAddr {
        "127.0.0.1:9050".parse().unwrap()
    }

    #[test]
    fn anlegen_und_entfernen() {
        let mut reg = PeerRegistry::neu();
        let jetzt = Instant::now();
        let id = reg.neue_id();
        assert_ne!(id, VerbindungsId::UNVERBUNDEN);

        reg.anlegen(id, adresse(), PeerZustand::Verbindend, jetzt);
        assert!(reg.enthaelt(id));
        assert_eq!(reg.anzahl_verbunden(), 0);

        reg.get_mut(id).unwrap().zustand_setzen(PeerZustand::Verbunden);
        assert_eq!(reg.anzahl_verbunden(), 1);

        assert!(reg.entfernen(id).is_some());
        assert!(reg.entfernen(id).is_none());
        assert_eq!(reg.anzahl(), 0);
    }

    #[test]
    fn doppeltes_anlegen_behaelt_zustand() {
        let mut reg = PeerRegistry::neu();
        let jetzt = Instant::now();
        let id = VerbindungsId(5);
        reg.anlegen(id, adresse(), PeerZustand::Verbunden, jetzt);
        reg.anlegen(id, adresse(), PeerZustand::Verbindend, jetzt);
        assert_eq!(reg.get(id).unwrap().zustand(), PeerZustand::Verbunden);
    }
}
