//! voicecraft-network – Verbindungen, Zustellung, Server und Client
//!
//! ## Module
//! - [`peer`] – Peer-Lebenszyklus, Sequenzen und Duplikat-Fenster
//! - [`registry`] – Peer-Registry eines Endpunkts
//! - [`endpunkt`] – UDP-Endpunkt mit zuverlaessiger Zustellung
//! - [`anfragen`] – Offene Anfragen mit Zeitlimit
//! - [`aenderung`] – Entity-Aenderungen als Anfrage und Ereignis
//! - [`server`] – Server-Tick, Login, Audio-Weiterleitung
//! - [`client`] – Client mit gespiegelter Welt und Discovery

pub mod aenderung;
pub mod anfragen;
pub mod client;
pub mod endpunkt;
pub mod error;
pub mod peer;
pub mod registry;
pub mod server;

pub use aenderung::EntityAenderung;
pub use anfragen::AnfrageTabelle;
pub use client::{server_abfragen, ClientOptionen, ServerInfo, VoiceCraftClient};
pub use endpunkt::{Endpunkt, EndpunktConfig, EndpunktEreignis, EndpunktStatistik};
pub use error::{NetzwerkFehler, NetzwerkResult};
pub use peer::{Peer, PeerZustand};
pub use registry::PeerRegistry;
pub use server::{ServerOptionen, VoiceCraftServer};
