//! Jitter Buffer fuer den Audio-Stream eines Sprechers
//!
//! Feste Anzahl Slots (`puffer_ms / frame_ms`), eine laufende erwartete
//! Sequenz, ein "vorgeladen"-Flag und ein Zaehler aufeinanderfolgender
//! leerer Abrufe. Sequenzvergleiche rechnen mit 32-Bit-Umlauf.
//!
//! ## Abruf-Ergebnisse
//! - `NichtBereit`: noch nicht vorgeladen
//! - `Erfolg`: fruehester Frame ist der erwartete
//! - `Verpasst`: fruehester Frame liegt genau eins voraus; geliefert wird
//!   eine Kopie mit der erwarteten Sequenz, der Frame selbst bleibt liegen
//! - `Fehlgeschlagen`: kein Frame (Stille) oder Luecke groesser eins
//!
//! Nicht thread-safe; der Besitzer schuetzt den Buffer mit einem Lock.

/// Leere Abrufe in Folge, nach denen neu vorgeladen werden muss
pub const MAX_STILLE: u32 = 5;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitterBufferConfig {
    /// Gesamtdauer des Puffers in Millisekunden
    pub puffer_ms: u32,
    /// Dauer eines Frames in Millisekunden
    pub frame_ms: u32,
    /// Belegte Slots, ab denen Frames geliefert werden
    pub vorlade_tiefe: usize,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            puffer_ms: 100,
            frame_ms: 20,
            vorlade_tiefe: 1,
        }
    }
}

impl JitterBufferConfig {
    pub fn kapazitaet(&self) -> usize {
        (self.puffer_ms / self.frame_ms.max(1)).max(1) as usize
    }
}

// ---------------------------------------------------------------------------
// Frame und Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequenz: u32,
    pub daten: Vec<u8>,
}

impl Frame {
    pub fn neu(sequenz: u32, daten: impl Into<Vec<u8>>) -> Self {
        Self {
            sequenz,
            daten: daten.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitterStatus {
    NichtBereit,
    Erfolg(Frame),
    Verpasst(Frame),
    Fehlgeschlagen,
}

impl JitterStatus {
    pub fn ist_erfolg(&self) -> bool {
        matches!(self, Self::Erfolg(_))
    }
}

/// Statistiken (Snapshot)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitterBufferStatistik {
    pub empfangen: u64,
    pub abgespielt: u64,
    pub verpasst: u64,
    pub fehlgeschlagen: u64,
    /// Veraltete oder ueberzaehlige Frames
    pub verworfen: u64,
    pub duplikate: u64,
}

/// `a` liegt vor `b` (mit Umlauf)
#[inline]
fn frueher(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

#[inline]
fn abstand(von: u32, bis: u32) -> i32 {
    bis.wrapping_sub(von) as i32
}

// ---------------------------------------------------------------------------
// JitterBuffer
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct JitterBuffer {
    slots: Vec<Option<Frame>>,
    vorlade_tiefe: usize,
    erwartet: u32,
    vorgeladen: bool,
    stille: u32,
    statistik: JitterBufferStatistik,
}

impl JitterBuffer {
    pub fn neu(config: &JitterBufferConfig) -> Self {
        let kapazitaet = config.kapazitaet();
        Self {
            slots: vec![None; kapazitaet],
            vorlade_tiefe: config.vorlade_tiefe.clamp(1, kapazitaet),
            erwartet: 0,
            vorgeladen: false,
            stille: 0,
            statistik: JitterBufferStatistik::default(),
        }
    }

    pub fn kapazitaet(&self) -> usize {
        self.slots.len()
    }

    pub fn belegt(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn ist_vorgeladen(&self) -> bool {
        self.vorgeladen
    }

    pub fn erwartete_sequenz(&self) -> u32 {
        self.erwartet
    }

    pub fn statistik(&self) -> JitterBufferStatistik {
        self.statistik.clone()
    }

    /// Slot mit der fruehesten Sequenz
    fn fruehester(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|f| (i, f.sequenz)))
            .reduce(|a, b| if frueher(b.1, a.1) { b } else { a })
            .map(|(i, _)| i)
    }

    /// Entfernt Frames hinter der erwarteten Sequenz (nur wenn vorgeladen)
    fn veraltete_entfernen(&mut self) {
        if !self.vorgeladen {
            return;
        }
        let erwartet = self.erwartet;
        for slot in self.slots.iter_mut() {
            if slot.as_ref().is_some_and(|f| frueher(f.sequenz, erwartet)) {
                *slot = None;
                self.statistik.verworfen += 1;
            }
        }
    }

    pub fn einfuegen(&mut self, frame: Frame) {
        self.statistik.empfangen += 1;
        self.veraltete_entfernen();

        if self.vorgeladen && frueher(frame.sequenz, self.erwartet) {
            tracing::trace!(sequenz = frame.sequenz, erwartet = self.erwartet, "Veralteter Frame verworfen");
            self.statistik.verworfen += 1;
            return;
        }

        let gleich = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|f| f.sequenz == frame.sequenz));
        if let Some(i) = gleich {
            self.statistik.duplikate += 1;
            self.slots[i] = Some(frame);
            return;
        }

        if let Some(i) = self.slots.iter().position(Option::is_none) {
            self.slots[i] = Some(frame);
        } else if let Some(i) = self.fruehester() {
            // Voll: der frueheste Frame weicht, sofern der neue nicht noch frueher ist
            let aeltester = self.slots[i].as_ref().map_or(frame.sequenz, |f| f.sequenz);
            self.statistik.verworfen += 1;
            if frueher(frame.sequenz, aeltester) {
                return;
            }
            self.slots[i] = Some(frame);
        }

        if !self.vorgeladen && self.belegt() >= self.vorlade_tiefe {
            if let Some(i) = self.fruehester() {
                self.erwartet = self.slots[i].as_ref().map_or(0, |f| f.sequenz);
                self.vorgeladen = true;
                self.stille = 0;
                tracing::trace!(erwartet = self.erwartet, "Jitter Buffer vorgeladen");
            }
        }
    }

    pub fn abrufen(&mut self) -> JitterStatus {
        if !self.vorgeladen {
            return JitterStatus::NichtBereit;
        }
        self.veraltete_entfernen();

        let Some(index) = self.fruehester() else {
            self.stille += 1;
            self.statistik.fehlgeschlagen += 1;
            if self.stille >= MAX_STILLE {
                tracing::trace!("Stille-Grenze erreicht, Jitter Buffer muss neu vorladen");
                self.vorgeladen = false;
                self.stille = 0;
            }
            return JitterStatus::Fehlgeschlagen;
        };

        let sequenz = self.slots[index].as_ref().map_or(self.erwartet, |f| f.sequenz);
        match abstand(self.erwartet, sequenz) {
            0 => {
                let Some(frame) = self.slots[index].take() else {
                    return JitterStatus::Fehlgeschlagen;
                };
                self.erwartet = self.erwartet.wrapping_add(1);
                self.stille = 0;
                self.statistik.abgespielt += 1;
                JitterStatus::Erfolg(frame)
            }
            1 => {
                let mut kopie = self.slots[index].clone().unwrap_or_else(|| Frame::neu(0, Vec::new()));
                kopie.sequenz = self.erwartet;
                self.erwartet = self.erwartet.wrapping_add(1);
                self.stille = 0;
                self.statistik.verpasst += 1;
                JitterStatus::Verpasst(kopie)
            }
            _ => {
                // Luecke zu gross: pro Abruf nur eine Sequenz weiter
                self.erwartet = self.erwartet.wrapping_add(1);
                self.statistik.fehlgeschlagen += 1;
                JitterStatus::Fehlgeschlagen
            }
        }
    }

    /// Verwirft alle Frames; danach muss neu vorgeladen werden
    pub fn leeren(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.vorgeladen = false;
        self.stille = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(vorlade_tiefe: usize) -> JitterBuffer {
        JitterBuffer::neu(&JitterBufferConfig {
            vorlade_tiefe,
            ..Default::default()
        })
    }

    fn frame(sequenz: u32) -> Frame {
        Frame::neu(sequenz, vec![sequenz as u8; 4])
    }

    #[test]
    fn kapazitaet_aus_dauer() {
        assert_eq!(JitterBufferConfig::default().kapazitaet(), 5);
        let klein = JitterBufferConfig {
            puffer_ms: 10,
            frame_ms: 20,
            vorlade_tiefe: 3,
        };
        assert_eq!(klein.kapazitaet(), 1);
        assert_eq!(JitterBuffer::neu(&klein).vorlade_tiefe, 1);
    }

    #[test]
    fn erster_frame_wird_sofort_geliefert() {
        let mut jb = buffer(1);
        assert_eq!(jb.abrufen(), JitterStatus::NichtBereit);
        jb.einfuegen(frame(4711));
        assert_eq!(jb.abrufen(), JitterStatus::Erfolg(frame(4711)));
    }

    #[test]
    fn umsortierung() {
        let mut jb = buffer(3);
        jb.einfuegen(frame(3));
        jb.einfuegen(frame(1));
        assert_eq!(jb.abrufen(), JitterStatus::NichtBereit);
        jb.einfuegen(frame(2));

        let reihenfolge: Vec<u32> = (0..3)
            .map(|_| match jb.abrufen() {
                JitterStatus::Erfolg(f) => f.sequenz,
                anderes => panic!("Erfolg erwartet, war {anderes:?}"),
            })
            .collect();
        assert_eq!(reihenfolge, vec![1, 2, 3]);
    }

    #[test]
    fn einzelne_luecke_wird_verpasst() {
        let mut jb = buffer(1);
        jb.einfuegen(frame(0));
        jb.einfuegen(frame(2));
        assert!(jb.abrufen().ist_erfolg());
        assert_eq!(jb.erwartete_sequenz(), 1);

        match jb.abrufen() {
            JitterStatus::Verpasst(f) => {
                assert_eq!(f.sequenz, 1);
                assert_eq!(f.daten, frame(2).daten);
            }
            anderes => panic!("Verpasst erwartet, war {anderes:?}"),
        }
        // Genau eins weiter, nicht mehr
        assert_eq!(jb.erwartete_sequenz(), 2);
        assert_eq!(jb.abrufen(), JitterStatus::Erfolg(frame(2)));
    }

    #[test]
    fn grosse_luecke_erholt_sich_schrittweise() {
        let mut jb = buffer(1);
        jb.einfuegen(frame(0));
        jb.einfuegen(frame(3));
        assert!(jb.abrufen().ist_erfolg());
        assert_eq!(jb.abrufen(), JitterStatus::Fehlgeschlagen);
        assert_eq!(jb.erwartete_sequenz(), 2);
        assert!(matches!(jb.abrufen(), JitterStatus::Verpasst(_)));
        assert_eq!(jb.abrufen(), JitterStatus::Erfolg(frame(3)));
    }

    #[test]
    fn stille_fuehrt_zu_neuem_vorladen() {
        let mut jb = buffer(1);
        jb.einfuegen(frame(0));
        assert!(jb.abrufen().ist_erfolg());
        for _ in 0..MAX_STILLE {
            assert_eq!(jb.abrufen(), JitterStatus::Fehlgeschlagen);
        }
        assert!(!jb.ist_vorgeladen());
        assert_eq!(jb.abrufen(), JitterStatus::NichtBereit);

        // Neuer Stream mit beliebiger Sequenz startet sofort
        jb.einfuegen(frame(900));
        assert_eq!(jb.abrufen(), JitterStatus::Erfolg(frame(900)));
    }

    #[test]
    fn veraltete_frames_werden_verworfen() {
        let mut jb = buffer(1);
        jb.einfuegen(frame(10));
        assert!(jb.abrufen().ist_erfolg());
        jb.einfuegen(frame(9));
        assert_eq!(jb.belegt(), 0);
        assert_eq!(jb.statistik().verworfen, 1);
    }

    #[test]
    fn duplikat_ersetzt_gleiche_sequenz() {
        let mut jb = buffer(3);
        jb.einfuegen(frame(1));
        jb.einfuegen(Frame::neu(1, vec![9]));
        assert_eq!(jb.belegt(), 1);
        assert_eq!(jb.statistik().duplikate, 1);
    }

    #[test]
    fn voller_buffer_ueberschreibt_fruehesten() {
        let mut jb = buffer(5);
        for s in [10, 11, 12, 13, 14] {
            jb.einfuegen(frame(s));
        }
        jb.einfuegen(frame(15));
        assert_eq!(jb.belegt(), 5);
        assert!(jb.slots.iter().flatten().all(|f| f.sequenz != 10));
    }

    #[test]
    fn sequenz_umlauf() {
        let mut jb = buffer(2);
        jb.einfuegen(frame(0));
        jb.einfuegen(frame(u32::MAX));
        assert_eq!(jb.erwartete_sequenz(), u32::MAX);
        assert!(matches!(jb.abrufen(), JitterStatus::Erfolg(f) if f.sequenz == u32::MAX));
        assert!(matches!(jb.abrufen(), JitterStatus::Erfolg(f) if f.sequenz == 0));
    }

    #[test]
    fn leeren_verlangt_neues_vorladen() {
        let mut jb = buffer(1);
        jb.einfuegen(frame(1));
        jb.leeren();
        assert_eq!(jb.belegt(), 0);
        assert_eq!(jb.abrufen(), JitterStatus::NichtBereit);
    }
}
