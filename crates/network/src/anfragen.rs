//! Tabelle offener Anfragen (Login, Ping)
//!
//! Jede Anfrage ist ueber ihre Korrelations-ID eingetragen und traegt einen
//! Ablaufzeitpunkt. Sie endet genau einmal: durch eine passende Antwort,
//! durch Trennung ihres Peers, durch Abbruch oder durch den periodischen
//! Sweep mit `Zeitlimit`. Antworten mit fremder ID lassen sie unberuehrt.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use uuid::Uuid;
use voicecraft_core::VerbindungsId;
use voicecraft_protocol::Packet;

use crate::error::{NetzwerkFehler, NetzwerkResult};

pub type AnfrageEmpfaenger = oneshot::Receiver<NetzwerkResult<Packet>>;

#[derive(Debug)]
struct OffeneAnfrage {
    peer: VerbindungsId,
    beschreibung: &'static str,
    ablauf: Instant,
    sender: oneshot::Sender<NetzwerkResult<Packet>>,
}

impl OffeneAnfrage {
    fn beenden(self, ergebnis: NetzwerkResult<Packet>) {
        // Der Wartende kann bereits aufgegeben haben
        let _ = self.sender.send(ergebnis);
    }
}

#[derive(Debug, Default)]
pub struct AnfrageTabelle {
    offen: HashMap<Uuid, OffeneAnfrage>,
}

impl AnfrageTabelle {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Anfrage ein und liefert den Empfaenger fuer das Ergebnis
    pub fn registrieren(
        &mut self,
        id: Uuid,
        peer: VerbindungsId,
        beschreibung: &'static str,
        timeout: Duration,
        jetzt: Instant,
    ) -> AnfrageEmpfaenger {
        let (sender, empfaenger) = oneshot::channel();
        let alt = self.offen.insert(
            id,
            OffeneAnfrage {
                peer,
                beschreibung,
                ablauf: jetzt + timeout,
                sender,
            },
        );
        if let Some(alt) = alt {
            alt.beenden(Err(NetzwerkFehler::Getrennt("Anfrage ersetzt".into())));
        }
        empfaenger
    }

    /// Loest die Anfrage mit dieser ID auf; `false`, wenn keine offen ist
    pub fn aufloesen(&mut self, id: Uuid, antwort: Packet) -> bool {
        match self.offen.remove(&id) {
            Some(anfrage) => {
                anfrage.beenden(Ok(antwort));
                true
            }
            None => {
                tracing::debug!(request_id = %id, "Antwort ohne offene Anfrage");
                false
            }
        }
    }

    /// Laesst alle Anfragen eines Peers mit `Getrennt` fehlschlagen
    pub fn peer_getrennt(&mut self, peer: VerbindungsId, grund: &str) -> usize {
        let ids: Vec<Uuid> = self
            .offen
            .iter()
            .filter(|(_, a)| a.peer == peer)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(anfrage) = self.offen.remove(id) {
                anfrage.beenden(Err(NetzwerkFehler::Getrennt(grund.to_string())));
            }
        }
        ids.len()
    }

    /// Beendet abgelaufene Anfragen mit `Zeitlimit`
    pub fn abgelaufene_entfernen(&mut self, jetzt: Instant) -> usize {
        let ids: Vec<Uuid> = self
            .offen
            .iter()
            .filter(|(_, a)| a.ablauf <= jetzt)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(anfrage) = self.offen.remove(id) {
                tracing::warn!(request_id = %id, anfrage = anfrage.beschreibung, "Anfrage abgelaufen");
                let was = anfrage.beschreibung;
                anfrage.beenden(Err(NetzwerkFehler::Zeitlimit(was.to_string())));
            }
        }
        ids.len()
    }

    /// Laesst alle offenen Anfragen fehlschlagen (eigene Trennung)
    pub fn alle_abbrechen(&mut self, grund: &str) {
        for (_, anfrage) in self.offen.drain() {
            anfrage.beenden(Err(NetzwerkFehler::Getrennt(grund.to_string())));
        }
    }

    pub fn ist_offen(&self, id: &Uuid) -> bool {
        self.offen.contains_key(id)
    }

    pub fn anzahl(&self) -> usize {
        self.offen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicecraft_protocol::packet::PingPacket;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn ping(id: Uuid) -> Packet {
        Packet::PingResponse(PingPacket { request_id: id })
    }

    #[test]
    fn passende_antwort_loest_auf() {
        let mut t = AnfrageTabelle::neu();
        let id = Uuid::new_v4();
        let mut rx = t.registrieren(id, VerbindungsId(1), "Ping", TIMEOUT, Instant::now());

        assert!(t.aufloesen(id, ping(id)));
        assert_eq!(rx.try_recv().unwrap(), Ok(ping(id)));
        assert_eq!(t.anzahl(), 0);
    }

    #[test]
    fn fremde_id_bleibt_offen() {
        let mut t = AnfrageTabelle::neu();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let mut rx = t.registrieren(x, VerbindungsId(1), "Login", TIMEOUT, Instant::now());

        assert!(!t.aufloesen(y, ping(y)));
        assert!(t.ist_offen(&x));
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
    }

    #[test]
    fn trennung_beendet_nur_anfragen_des_peers() {
        let mut t = AnfrageTabelle::neu();
        let jetzt = Instant::now();
        let mut a = t.registrieren(Uuid::new_v4(), VerbindungsId(1), "Login", TIMEOUT, jetzt);
        let mut b = t.registrieren(Uuid::new_v4(), VerbindungsId(2), "Login", TIMEOUT, jetzt);

        assert_eq!(t.peer_getrennt(VerbindungsId(1), "timeout"), 1);
        assert_eq!(
            a.try_recv().unwrap(),
            Err(NetzwerkFehler::Getrennt("timeout".into()))
        );
        assert!(b.try_recv().is_err());
        assert_eq!(t.anzahl(), 1);
    }

    #[test]
    fn sweep_meldet_zeitlimit() {
        let mut t = AnfrageTabelle::neu();
        let start = Instant::now();
        let mut rx = t.registrieren(Uuid::new_v4(), VerbindungsId(1), "Ping", TIMEOUT, start);

        assert_eq!(t.abgelaufene_entfernen(start + Duration::from_millis(500)), 0);
        assert_eq!(t.abgelaufene_entfernen(start + TIMEOUT), 1);
        assert!(matches!(rx.try_recv(), Ok(Err(NetzwerkFehler::Zeitlimit(_)))));
    }

    #[test]
    fn abbruch_beendet_alle() {
        let mut t = AnfrageTabelle::neu();
        let jetzt = Instant::now();
        let mut a = t.registrieren(Uuid::new_v4(), VerbindungsId(1), "Ping", TIMEOUT, jetzt);
        let mut b = t.registrieren(Uuid::new_v4(), VerbindungsId(1), "Ping", TIMEOUT, jetzt);
        t.alle_abbrechen("getrennt");
        assert!(matches!(a.try_recv(), Ok(Err(NetzwerkFehler::Getrennt(_)))));
        assert!(matches!(b.try_recv(), Ok(Err(NetzwerkFehler::Getrennt(_)))));
        assert_eq!(t.anzahl(), 0);
    }
}
