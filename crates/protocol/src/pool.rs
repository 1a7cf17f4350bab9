//! Paket-Pool fuer den Empfangspfad
//!
//! Pro `PacketType` existiert ein Eimer freier Instanzen. Ein ausgeliehenes
//! Paket steckt in einem [`GepooltesPaket`]-Guard, der es beim Drop genau
//! einmal zurueckgibt. Das Paket kann den Guard nicht ueberleben, die
//! Felder muessen vorher konsumiert (oder geklont) werden.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ProtokollFehler;
use crate::header::PaketHeader;
use crate::packet::{KeepAlivePacket, Packet, PacketType};
use crate::puffer::PaketLeser;

/// Obergrenze freier Instanzen pro Typ
const MAX_FREI_PRO_TYP: usize = 64;

#[derive(Debug, Default)]
struct PoolInnen {
    eimer: Mutex<HashMap<PacketType, Vec<Packet>>>,
    ausgeliehen: AtomicU64,
    zurueckgegeben: AtomicU64,
    neu_erzeugt: AtomicU64,
}

/// Thread-sicherer Pool (Clone teilt den Zustand)
#[derive(Debug, Clone, Default)]
pub struct PaketPool {
    innen: Arc<PoolInnen>,
}

/// Zaehlerstaende des Pools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatistik {
    pub ausgeliehen: u64,
    pub zurueckgegeben: u64,
    pub neu_erzeugt: u64,
    pub frei: usize,
}

impl PaketPool {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Leiht eine Instanz des Typs aus (wiederverwendet oder neu)
    pub fn ausleihen(&self, typ: PacketType) -> GepooltesPaket {
        let wiederverwendet = self.innen.eimer.lock().get_mut(&typ).and_then(Vec::pop);
        let paket = match wiederverwendet {
            Some(p) => p,
            None => {
                self.innen.neu_erzeugt.fetch_add(1, Ordering::Relaxed);
                Packet::leer(typ)
            }
        };
        self.innen.ausgeliehen.fetch_add(1, Ordering::Relaxed);
        GepooltesPaket {
            paket,
            pool: self.clone(),
        }
    }

    /// Dekodiert ein Datagramm in eine gepoolte Instanz
    ///
    /// Bei einem Fehler kehrt die Instanz sofort in den Pool zurueck.
    pub fn dekodieren(&self, daten: &[u8]) -> Result<(PaketHeader, GepooltesPaket), ProtokollFehler> {
        let mut r = PaketLeser::neu(daten);
        let header = PaketHeader::lesen(&mut r)?;
        let mut paket = self.ausleihen(header.typ);
        paket.inhalt_lesen(&mut r)?;
        Ok((header, paket))
    }

    fn zurueckgeben(&self, paket: Packet) {
        self.innen.zurueckgegeben.fetch_add(1, Ordering::Relaxed);
        let mut eimer = self.innen.eimer.lock();
        let frei = eimer.entry(paket.typ()).or_default();
        if frei.len() < MAX_FREI_PRO_TYP {
            frei.push(paket);
        }
    }

    pub fn statistik(&self) -> PoolStatistik {
        let frei = self.innen.eimer.lock().values().map(Vec::len).sum();
        PoolStatistik {
            ausgeliehen: self.innen.ausgeliehen.load(Ordering::Relaxed),
            zurueckgegeben: self.innen.zurueckgegeben.load(Ordering::Relaxed),
            neu_erzeugt: self.innen.neu_erzeugt.load(Ordering::Relaxed),
            frei,
        }
    }
}

/// Ausgeliehenes Paket; Drop gibt es an den Pool zurueck
#[derive(Debug)]
pub struct GepooltesPaket {
    paket: Packet,
    pool: PaketPool,
}

impl Deref for GepooltesPaket {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.paket
    }
}

impl DerefMut for GepooltesPaket {
    fn deref_mut(&mut self) -> &mut Packet {
        &mut self.paket
    }
}

impl Drop for GepooltesPaket {
    fn drop(&mut self) {
        // KeepAlive ist feldlos, der Platzhalter allokiert nichts
        let paket = std::mem::replace(&mut self.paket, Packet::KeepAlive(KeepAlivePacket));
        self.pool.zurueckgeben(paket);
    }
}
