//! Wire-Form der Audio-Effekt-Konfiguration
//!
//! Der Server verteilt die Effekt-Registry per `SetEffect`-Paket an die
//! Clients. Hier liegt nur die Parametrisierung; die DSP-Implementierung
//! befindet sich in `voicecraft-world`.

use crate::error::ProtokollFehler;
use crate::puffer::{PaketLeser, PaketSchreiber};

/// Tag der verfuegbaren Effekt-Arten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EffektTyp {
    /// Gleiche Welt-ID erforderlich
    Sichtbarkeit = 1,
    /// Distanzabhaengige Abschwaechung
    Naehe = 2,
    /// Stereo-Panning nach Blickrichtung
    Richtung = 3,
    /// Echo mit Rueckkopplung
    Echo = 4,
    /// Echo abhaengig von Distanz und Hoehlenfaktor
    NaeheEcho = 5,
    /// Tiefpass abhaengig vom Daempfungsfaktor
    Daempfung = 6,
}

impl EffektTyp {
    pub const ALLE: [EffektTyp; 6] = [
        EffektTyp::Sichtbarkeit,
        EffektTyp::Naehe,
        EffektTyp::Richtung,
        EffektTyp::Echo,
        EffektTyp::NaeheEcho,
        EffektTyp::Daempfung,
    ];

    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALLE.iter().copied().find(|t| *t as u8 == byte)
    }
}

/// Parameter eines Effekts (ein Zweig pro `EffektTyp`)
#[derive(Debug, Clone, PartialEq)]
pub enum EffektParameter {
    Sichtbarkeit,
    Naehe {
        min_range: f32,
        max_range: f32,
        wet: f32,
    },
    Richtung {
        wet: f32,
    },
    Echo {
        delay_s: f32,
        feedback: f32,
        wet: f32,
    },
    NaeheEcho {
        range: f32,
        delay_s: f32,
        feedback: f32,
        wet: f32,
    },
    Daempfung {
        cutoff_hz: f32,
        wet: f32,
    },
}

impl EffektParameter {
    /// Standard-Parameter fuer einen Effekt-Typ
    pub fn standard(typ: EffektTyp) -> Self {
        match typ {
            EffektTyp::Sichtbarkeit => Self::Sichtbarkeit,
            EffektTyp::Naehe => Self::Naehe {
                min_range: 0.0,
                max_range: 30.0,
                wet: 1.0,
            },
            EffektTyp::Richtung => Self::Richtung { wet: 1.0 },
            EffektTyp::Echo => Self::Echo {
                delay_s: 0.5,
                feedback: 0.5,
                wet: 0.5,
            },
            EffektTyp::NaeheEcho => Self::NaeheEcho {
                range: 30.0,
                delay_s: 0.5,
                feedback: 0.5,
                wet: 1.0,
            },
            EffektTyp::Daempfung => Self::Daempfung {
                cutoff_hz: 200.0,
                wet: 1.0,
            },
        }
    }

    pub fn typ(&self) -> EffektTyp {
        match self {
            Self::Sichtbarkeit => EffektTyp::Sichtbarkeit,
            Self::Naehe { .. } => EffektTyp::Naehe,
            Self::Richtung { .. } => EffektTyp::Richtung,
            Self::Echo { .. } => EffektTyp::Echo,
            Self::NaeheEcho { .. } => EffektTyp::NaeheEcho,
            Self::Daempfung { .. } => EffektTyp::Daempfung,
        }
    }

    pub fn schreiben(&self, w: &mut PaketSchreiber) {
        w.u8(self.typ() as u8);
        match *self {
            Self::Sichtbarkeit => {}
            Self::Naehe {
                min_range,
                max_range,
                wet,
            } => {
                w.f32(min_range);
                w.f32(max_range);
                w.f32(wet);
            }
            Self::Richtung { wet } => w.f32(wet),
            Self::Echo {
                delay_s,
                feedback,
                wet,
            } => {
                w.f32(delay_s);
                w.f32(feedback);
                w.f32(wet);
            }
            Self::NaeheEcho {
                range,
                delay_s,
                feedback,
                wet,
            } => {
                w.f32(range);
                w.f32(delay_s);
                w.f32(feedback);
                w.f32(wet);
            }
            Self::Daempfung { cutoff_hz, wet } => {
                w.f32(cutoff_hz);
                w.f32(wet);
            }
        }
    }

    pub fn lesen(r: &mut PaketLeser<'_>) -> Result<Self, ProtokollFehler> {
        let roh = r.u8()?;
        let typ = EffektTyp::from_u8(roh).ok_or(ProtokollFehler::UngueltigerWert {
            feld: "effekt_typ",
            wert: roh as i64,
        })?;
        Self::lesen_nach_typ(typ, r)
    }

    /// Liest die Parameter, nachdem das Typ-Byte bereits konsumiert wurde
    pub fn lesen_nach_typ(typ: EffektTyp, r: &mut PaketLeser<'_>) -> Result<Self, ProtokollFehler> {
        Ok(match typ {
            EffektTyp::Sichtbarkeit => Self::Sichtbarkeit,
            EffektTyp::Naehe => Self::Naehe {
                min_range: r.f32()?,
                max_range: r.f32()?,
                wet: r.f32()?,
            },
            EffektTyp::Richtung => Self::Richtung { wet: r.f32()? },
            EffektTyp::Echo => Self::Echo {
                delay_s: r.f32()?,
                feedback: r.f32()?,
                wet: r.f32()?,
            },
            EffektTyp::NaeheEcho => Self::NaeheEcho {
                range: r.f32()?,
                delay_s: r.f32()?,
                feedback: r.f32()?,
                wet: r.f32()?,
            },
            EffektTyp::Daempfung => Self::Daempfung {
                cutoff_hz: r.f32()?,
                wet: r.f32()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_parameter_passen_zum_typ() {
        for typ in EffektTyp::ALLE {
            assert_eq!(EffektParameter::standard(typ).typ(), typ);
        }
    }

    #[test]
    fn unbekannter_effekt_typ() {
        let bytes = [99u8];
        let mut r = PaketLeser::neu(&bytes);
        assert!(EffektParameter::lesen(&mut r).is_err());
    }
}
