//! Binaere Lese-/Schreibpuffer fuer Pakete
//!
//! Alle Mehrbyte-Werte sind little-endian. Strings und Byte-Felder tragen
//! ein u16-Laengenpraefix und sind durch ein festes Maximum begrenzt,
//! damit ein manipuliertes Paket keine grosse Allokation ausloesen kann.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use glam::{Vec2, Vec3};
use uuid::Uuid;

use crate::error::ProtokollFehler;

/// Schreibt Paketfelder in einen wachsenden Puffer
#[derive(Debug, Default)]
pub struct PaketSchreiber {
    buf: BytesMut,
}

impl PaketSchreiber {
    pub fn neu() -> Self {
        Self::mit_kapazitaet(64)
    }

    pub fn mit_kapazitaet(kapazitaet: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(kapazitaet),
        }
    }

    pub fn u8(&mut self, wert: u8) {
        self.buf.put_u8(wert);
    }

    pub fn bool(&mut self, wert: bool) {
        self.buf.put_u8(wert as u8);
    }

    pub fn u16(&mut self, wert: u16) {
        self.buf.put_u16_le(wert);
    }

    pub fn u32(&mut self, wert: u32) {
        self.buf.put_u32_le(wert);
    }

    pub fn i32(&mut self, wert: i32) {
        self.buf.put_i32_le(wert);
    }

    pub fn i64(&mut self, wert: i64) {
        self.buf.put_i64_le(wert);
    }

    pub fn f32(&mut self, wert: f32) {
        self.buf.put_f32_le(wert);
    }

    pub fn uuid(&mut self, wert: &Uuid) {
        self.buf.put_slice(wert.as_bytes());
    }

    pub fn vec3(&mut self, wert: Vec3) {
        self.f32(wert.x);
        self.f32(wert.y);
        self.f32(wert.z);
    }

    pub fn vec2(&mut self, wert: Vec2) {
        self.f32(wert.x);
        self.f32(wert.y);
    }

    /// Schreibt einen String; zu lange Strings werden an einer
    /// Zeichengrenze auf `maximum` Bytes gekuerzt.
    pub fn string(&mut self, wert: &str, maximum: usize) {
        let mut ende = wert.len().min(maximum);
        while !wert.is_char_boundary(ende) {
            ende -= 1;
        }
        if ende < wert.len() {
            tracing::debug!(laenge = wert.len(), maximum, "String beim Schreiben gekuerzt");
        }
        self.u16(ende as u16);
        self.buf.put_slice(&wert.as_bytes()[..ende]);
    }

    /// Schreibt ein Byte-Feld
    ///
    /// Aufrufer pruefen die Laenge vorher mit [`nutzdaten_pruefen`]; ein
    /// gekuerztes Feld waere fuer die Gegenseite unbrauchbar.
    pub fn bytes(&mut self, wert: &[u8], maximum: usize) {
        debug_assert!(
            wert.len() <= maximum,
            "Byte-Feld mit {} Bytes ueber Maximum {maximum}",
            wert.len()
        );
        let laenge = wert.len().min(maximum);
        if laenge < wert.len() {
            tracing::warn!(laenge = wert.len(), maximum, "Byte-Feld beim Schreiben gekuerzt");
        }
        self.u16(laenge as u16);
        self.buf.put_slice(&wert[..laenge]);
    }

    pub fn laenge(&self) -> usize {
        self.buf.len()
    }

    pub fn fertig(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Prueft die Laenge eines Byte-Felds vor dem Schreiben
pub fn nutzdaten_pruefen(daten: &[u8], maximum: usize) -> Result<(), ProtokollFehler> {
    if daten.len() > maximum {
        return Err(ProtokollFehler::NutzdatenZuLang {
            laenge: daten.len(),
            maximum,
        });
    }
    Ok(())
}

/// Liest Paketfelder aus einem Byte-Slice
#[derive(Debug)]
pub struct PaketLeser<'a> {
    buf: &'a [u8],
}

impl<'a> PaketLeser<'a> {
    pub fn neu(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn verbleibend(&self) -> usize {
        self.buf.remaining()
    }

    fn benoetigt(&self, anzahl: usize) -> Result<(), ProtokollFehler> {
        if self.buf.remaining() < anzahl {
            return Err(ProtokollFehler::ZuKurz {
                benoetigt: anzahl,
                vorhanden: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, ProtokollFehler> {
        self.benoetigt(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn bool(&mut self) -> Result<bool, ProtokollFehler> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            andere => Err(ProtokollFehler::UngueltigerWert {
                feld: "bool",
                wert: andere as i64,
            }),
        }
    }

    pub fn u16(&mut self) -> Result<u16, ProtokollFehler> {
        self.benoetigt(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32(&mut self) -> Result<u32, ProtokollFehler> {
        self.benoetigt(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn i32(&mut self) -> Result<i32, ProtokollFehler> {
        self.benoetigt(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn i64(&mut self) -> Result<i64, ProtokollFehler> {
        self.benoetigt(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn f32(&mut self) -> Result<f32, ProtokollFehler> {
        self.benoetigt(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn uuid(&mut self) -> Result<Uuid, ProtokollFehler> {
        self.benoetigt(16)?;
        let mut roh = [0u8; 16];
        self.buf.copy_to_slice(&mut roh);
        Ok(Uuid::from_bytes(roh))
    }

    pub fn vec3(&mut self) -> Result<Vec3, ProtokollFehler> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn vec2(&mut self) -> Result<Vec2, ProtokollFehler> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    /// Liest einen String in einen bestehenden Puffer (Kapazitaet bleibt erhalten)
    pub fn string_in(&mut self, ziel: &mut String, maximum: usize) -> Result<(), ProtokollFehler> {
        let laenge = self.u16()? as usize;
        if laenge > maximum {
            return Err(ProtokollFehler::StringZuLang { laenge, maximum });
        }
        self.benoetigt(laenge)?;
        let text = std::str::from_utf8(&self.buf[..laenge]).map_err(|_| ProtokollFehler::Utf8)?;
        ziel.clear();
        ziel.push_str(text);
        self.buf.advance(laenge);
        Ok(())
    }

    pub fn string(&mut self, maximum: usize) -> Result<String, ProtokollFehler> {
        let mut s = String::new();
        self.string_in(&mut s, maximum)?;
        Ok(s)
    }

    /// Liest ein Byte-Feld in einen bestehenden Vec (Kapazitaet bleibt erhalten)
    pub fn bytes_in(&mut self, ziel: &mut Vec<u8>, maximum: usize) -> Result<(), ProtokollFehler> {
        let laenge = self.u16()? as usize;
        if laenge > maximum {
            return Err(ProtokollFehler::NutzdatenZuLang { laenge, maximum });
        }
        self.benoetigt(laenge)?;
        ziel.clear();
        ziel.extend_from_slice(&self.buf[..laenge]);
        self.buf.advance(laenge);
        Ok(())
    }

    /// Prueft dass das Paket vollstaendig gelesen wurde
    pub fn ende_pruefen(&self) -> Result<(), ProtokollFehler> {
        match self.buf.remaining() {
            0 => Ok(()),
            rest => Err(ProtokollFehler::Ueberschuss(rest)),
        }
    }
}
