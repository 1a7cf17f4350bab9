//! Peer-Zustand: Lebenszyklus, Sequenzen, Zustellung
//!
//! ```text
//! Getrennt -> Verbindend -> Verbunden -> Trennend -> Getrennt
//! ```
//!
//! Zuverlaessige Pakete erhalten pro Peer eine fortlaufende Sequenz und
//! bleiben bis zur Bestaetigung (`Ack`) gespeichert. Die Gegenseite
//! verwirft Duplikate und stellt in Sequenzreihenfolge zu: ein Paket
//! wartet im [`ReihenfolgePuffer`], bis alle Vorgaenger angekommen sind.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use voicecraft_core::VerbindungsId;
use voicecraft_protocol::{kodieren, GepooltesPaket, Packet};

use crate::endpunkt::EndpunktConfig;

/// Maximaler Vorlauf ungeordneter Sequenzen
pub const FENSTER_BREITE: u32 = 64;

// ---------------------------------------------------------------------------
// PeerZustand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerZustand {
    Getrennt,
    /// Login gesendet bzw. empfangen, noch nicht akzeptiert
    Verbindend,
    /// Darf authentifizierte Anfragen senden
    Verbunden,
    /// Wartet nur noch auf die Bestaetigung ausstehender Pakete
    Trennend,
}

// ---------------------------------------------------------------------------
// ReihenfolgePuffer
// ---------------------------------------------------------------------------

/// Ergebnis von [`ReihenfolgePuffer::einordnen`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Einordnung {
    /// Neu, wird in Sequenzreihenfolge zugestellt
    Angenommen,
    /// Bereits zugestellt oder bereits gepuffert
    Duplikat,
    /// Zu weit voraus, wird ohne Ack verworfen
    AusserhalbFenster,
}

/// Stellt zuverlaessige Pakete lueckenlos in Sequenzreihenfolge zu
///
/// Slot `i` haelt die Sequenz `erwartet + i`. Alles vor `erwartet` wurde
/// bereits zugestellt.
#[derive(Debug)]
pub struct ReihenfolgePuffer<T> {
    erwartet: u32,
    slots: VecDeque<Option<T>>,
}

impl<T> Default for ReihenfolgePuffer<T> {
    fn default() -> Self {
        Self {
            erwartet: 0,
            slots: VecDeque::new(),
        }
    }
}

impl<T> ReihenfolgePuffer<T> {
    /// Naechste zuzustellende Sequenz
    pub fn erwartet(&self) -> u32 {
        self.erwartet
    }

    pub fn gepuffert(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn einordnen(&mut self, sequenz: u32, wert: T) -> Einordnung {
        let abstand = sequenz.wrapping_sub(self.erwartet) as i32;
        if abstand < 0 {
            return Einordnung::Duplikat;
        }
        let abstand = abstand as usize;
        if abstand >= FENSTER_BREITE as usize {
            return Einordnung::AusserhalbFenster;
        }
        if self.slots.len() <= abstand {
            self.slots.resize_with(abstand + 1, || None);
        }
        if self.slots[abstand].is_some() {
            return Einordnung::Duplikat;
        }
        self.slots[abstand] = Some(wert);
        Einordnung::Angenommen
    }

    /// Naechster Wert, sofern die Sequenz lueckenlos vorliegt
    pub fn entnehmen(&mut self) -> Option<T> {
        if !matches!(self.slots.front(), Some(Some(_))) {
            return None;
        }
        self.erwartet = self.erwartet.wrapping_add(1);
        self.slots.pop_front().flatten()
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Ausstehend {
    daten: Bytes,
    letzter_versuch: Instant,
    versuche: u32,
}

/// Ergebnis eines Wartungsdurchlaufs
#[derive(Debug, Default)]
pub struct Wartung {
    /// Erneut zu sendende Datagramme
    pub erneut: Vec<Bytes>,
    /// Ein KeepAlive ist faellig
    pub keepalive: bool,
    /// Zeitlimit oder Wiederholungen erschoepft
    pub zeitlimit: bool,
}

#[derive(Debug)]
pub struct Peer {
    id: VerbindungsId,
    adresse: SocketAddr,
    zustand: PeerZustand,
    naechste_sequenz: u32,
    ausstehend: HashMap<u32, Ausstehend>,
    eingang: ReihenfolgePuffer<GepooltesPaket>,
    letzter_empfang: Instant,
    letzter_versand: Instant,
}

impl Peer {
    pub fn neu(id: VerbindungsId, adresse: SocketAddr, zustand: PeerZustand, jetzt: Instant) -> Self {
        Self {
            id,
            adresse,
            zustand,
            naechste_sequenz: 0,
            ausstehend: HashMap::new(),
            eingang: ReihenfolgePuffer::default(),
            letzter_empfang: jetzt,
            letzter_versand: jetzt,
        }
    }

    pub fn id(&self) -> VerbindungsId {
        self.id
    }

    pub fn adresse(&self) -> SocketAddr {
        self.adresse
    }

    pub fn zustand(&self) -> PeerZustand {
        self.zustand
    }

    pub fn zustand_setzen(&mut self, zustand: PeerZustand) {
        if self.zustand != zustand {
            tracing::debug!(peer = %self.id, von = ?self.zustand, nach = ?zustand, "Peer-Zustand");
            self.zustand = zustand;
        }
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand == PeerZustand::Verbunden
    }

    pub fn ausstehend_anzahl(&self) -> usize {
        self.ausstehend.len()
    }

    /// Kodiert ein Paket fuer diesen Peer
    ///
    /// Zuverlaessige Typen erhalten die naechste Sequenz und werden bis
    /// zur Bestaetigung vorgehalten.
    pub fn paket_kodieren(&mut self, paket: &Packet, jetzt: Instant) -> Bytes {
        self.letzter_versand = jetzt;
        if !paket.typ().ist_zuverlaessig() {
            return kodieren(self.id, None, paket);
        }

        let sequenz = self.naechste_sequenz;
        self.naechste_sequenz = self.naechste_sequenz.wrapping_add(1);
        let daten = kodieren(self.id, Some(sequenz), paket);
        self.ausstehend.insert(
            sequenz,
            Ausstehend {
                daten: daten.clone(),
                letzter_versuch: jetzt,
                versuche: 0,
            },
        );
        daten
    }

    pub fn ack_empfangen(&mut self, sequenz: u32) -> bool {
        self.ausstehend.remove(&sequenz).is_some()
    }

    /// Vermerkt eingehenden Verkehr (setzt das Zeitlimit zurueck)
    pub fn verkehr_vermerken(&mut self, jetzt: Instant) {
        self.letzter_empfang = jetzt;
    }

    /// Ordnet ein zuverlaessiges Paket in den Eingangspuffer ein
    pub fn einordnen(&mut self, sequenz: u32, paket: GepooltesPaket) -> Einordnung {
        self.eingang.einordnen(sequenz, paket)
    }

    /// Naechstes zuverlaessiges Paket in Sequenzreihenfolge
    pub fn naechstes_paket(&mut self) -> Option<GepooltesPaket> {
        self.eingang.entnehmen()
    }

    pub fn wartung(&mut self, jetzt: Instant, config: &EndpunktConfig) -> Wartung {
        let mut ergebnis = Wartung::default();

        if jetzt.saturating_duration_since(self.letzter_empfang) >= config.verbindungs_timeout {
            ergebnis.zeitlimit = true;
            return ergebnis;
        }

        for eintrag in self.ausstehend.values_mut() {
            if jetzt.saturating_duration_since(eintrag.letzter_versuch) < config.wiederholung {
                continue;
            }
            if eintrag.versuche >= config.max_wiederholungen {
                ergebnis.zeitlimit = true;
                return ergebnis;
            }
            eintrag.versuche += 1;
            eintrag.letzter_versuch = jetzt;
            ergebnis.erneut.push(eintrag.daten.clone());
        }

        if !ergebnis.erneut.is_empty() {
            self.letzter_versand = jetzt;
        } else if self.zustand == PeerZustand::Verbunden
            && jetzt.saturating_duration_since(self.letzter_versand) >= config.keepalive
        {
            ergebnis.keepalive = true;
        }
        ergebnis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use voicecraft_protocol::dekodieren;
    use voicecraft_protocol::packet::{FlagRequest, KeepAlivePacket};

    fn peer(jetzt: Instant) -> Peer {
        Peer::neu(
            VerbindungsId(42),
            "127.0.0.1:9050".parse().unwrap(),
            PeerZustand::Verbunden,
            jetzt,
        )
    }

    fn config() -> EndpunktConfig {
        EndpunktConfig {
            verbindungs_timeout: Duration::from_secs(5),
            wiederholung: Duration::from_millis(100),
            max_wiederholungen: 2,
            keepalive: Duration::from_secs(1),
        }
    }

    #[test]
    fn puffer_stellt_in_sequenzreihenfolge_zu() {
        let mut r = ReihenfolgePuffer::default();
        assert_eq!(r.einordnen(0, "a"), Einordnung::Angenommen);
        assert_eq!(r.entnehmen(), Some("a"));

        // 2 vor 1: haelt 2 zurueck, bis 1 da ist
        assert_eq!(r.einordnen(2, "c"), Einordnung::Angenommen);
        assert_eq!(r.entnehmen(), None);
        assert_eq!(r.gepuffert(), 1);
        assert_eq!(r.einordnen(1, "b"), Einordnung::Angenommen);
        assert_eq!(r.entnehmen(), Some("b"));
        assert_eq!(r.entnehmen(), Some("c"));
        assert_eq!(r.entnehmen(), None);
        assert_eq!(r.erwartet(), 3);
    }

    #[test]
    fn puffer_erkennt_duplikate() {
        let mut r = ReihenfolgePuffer::default();
        assert_eq!(r.einordnen(0, 0), Einordnung::Angenommen);
        r.entnehmen();
        // Bereits zugestellt
        assert_eq!(r.einordnen(0, 0), Einordnung::Duplikat);
        // Bereits gepuffert
        assert_eq!(r.einordnen(3, 3), Einordnung::Angenommen);
        assert_eq!(r.einordnen(3, 3), Einordnung::Duplikat);
        // Zu weit voraus
        assert_eq!(
            r.einordnen(1 + FENSTER_BREITE, 0),
            Einordnung::AusserhalbFenster
        );
    }

    #[test]
    fn puffer_ueber_wraparound() {
        let mut r = ReihenfolgePuffer {
            erwartet: u32::MAX,
            slots: VecDeque::new(),
        };
        assert_eq!(r.einordnen(0, "nach"), Einordnung::Angenommen);
        assert_eq!(r.entnehmen(), None);
        assert_eq!(r.einordnen(u32::MAX, "vor"), Einordnung::Angenommen);
        assert_eq!(r.entnehmen(), Some("vor"));
        assert_eq!(r.entnehmen(), Some("nach"));
        assert_eq!(r.erwartet(), 1);
        assert_eq!(r.einordnen(u32::MAX, "alt"), Einordnung::Duplikat);
    }

    #[test]
    fn zuverlaessige_pakete_erhalten_sequenzen() {
        let jetzt = Instant::now();
        let mut p = peer(jetzt);
        let a = p.paket_kodieren(&Packet::SetMuteRequest(FlagRequest { wert: true }), jetzt);
        let b = p.paket_kodieren(&Packet::SetMuteRequest(FlagRequest { wert: false }), jetzt);
        assert_eq!(dekodieren(&a).unwrap().0.sequenz, Some(0));
        assert_eq!(dekodieren(&b).unwrap().0.sequenz, Some(1));
        assert_eq!(p.ausstehend_anzahl(), 2);

        // Unzuverlaessig: keine Sequenz, nichts vorgehalten
        p.paket_kodieren(&Packet::KeepAlive(KeepAlivePacket), jetzt);
        assert_eq!(p.ausstehend_anzahl(), 2);

        assert!(p.ack_empfangen(0));
        assert!(!p.ack_empfangen(0));
        assert_eq!(p.ausstehend_anzahl(), 1);
    }

    #[test]
    fn unbestaetigte_pakete_werden_wiederholt() {
        let start = Instant::now();
        let mut p = peer(start);
        p.paket_kodieren(&Packet::SetMuteRequest(FlagRequest { wert: true }), start);

        let w = p.wartung(start + Duration::from_millis(50), &config());
        assert!(w.erneut.is_empty());

        let w = p.wartung(start + Duration::from_millis(100), &config());
        assert_eq!(w.erneut.len(), 1);
        assert!(!w.zeitlimit);

        let w = p.wartung(start + Duration::from_millis(200), &config());
        assert_eq!(w.erneut.len(), 1);

        // Wiederholungen erschoepft
        let w = p.wartung(start + Duration::from_millis(300), &config());
        assert!(w.zeitlimit);
    }

    #[test]
    fn stille_fuehrt_zum_zeitlimit() {
        let start = Instant::now();
        let mut p = peer(start);
        let w = p.wartung(start + Duration::from_secs(2), &config());
        assert!(w.keepalive);
        assert!(!w.zeitlimit);

        p.verkehr_vermerken(start + Duration::from_secs(4));
        assert!(!p.wartung(start + Duration::from_secs(6), &config()).zeitlimit);
        assert!(p.wartung(start + Duration::from_secs(9), &config()).zeitlimit);
    }
}
