//! Ende-zu-Ende-Tests ueber Loopback: Login, Discovery, Weiterleitung

use std::net::SocketAddr;
use std::time::Duration;

use glam::Vec3;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use uuid::Uuid;
use voicecraft_core::{EntityId, PositioningType, VerbindungsId, Version};
use voicecraft_network::{
    server_abfragen, ClientOptionen, EndpunktConfig, NetzwerkFehler, ServerOptionen,
    VoiceCraftClient, VoiceCraftServer,
};
use voicecraft_observability::VoiceCraftMetrics;
use voicecraft_protocol::audio::SAMPLES_PRO_FRAME;
use voicecraft_protocol::packet::{AcceptResponse, MAX_AUDIO_LAENGE};
use voicecraft_protocol::{dekodieren, kodieren, Packet, ProtokollFehler};
use voicecraft_voice::{AudioCodec, VoiceResult};

const WARTEZEIT: Duration = Duration::from_secs(3);

async fn server_starten(optionen: ServerOptionen) -> (SocketAddr, oneshot::Sender<()>) {
    let server = VoiceCraftServer::starten(
        "127.0.0.1:0".parse().unwrap(),
        EndpunktConfig::default(),
        optionen,
        VoiceCraftMetrics::neu().unwrap(),
    )
    .await
    .unwrap();
    let adresse = server.lokale_adresse();
    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(server.ausfuehren(stop_rx));
    (adresse, stop_tx)
}

fn client_optionen(positioning_type: PositioningType) -> ClientOptionen {
    ClientOptionen {
        positioning_type,
        anfrage_timeout: Duration::from_secs(2),
        ..ClientOptionen::default()
    }
}

async fn warten_bis(beschreibung: &str, mut bedingung: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    while !bedingung() {
        assert!(start.elapsed() < WARTEZEIT, "Zeitlimit: {beschreibung}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn login_wird_akzeptiert() {
    let (adresse, _stop) = server_starten(ServerOptionen::default()).await;
    let client = VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Server))
        .await
        .unwrap();

    assert!(client.ist_verbunden());
    let eigene = client.eigene_entity().unwrap();
    warten_bis("eigener Schnappschuss", || {
        client.welt_lesen(|w| w.existiert(eigene))
    })
    .await;
    // Standard-Effekte wurden beim Login uebertragen
    warten_bis("Effekte", || client.effekte().anzahl() > 0).await;

    let rtt = client.ping().await.unwrap();
    assert!(rtt < WARTEZEIT);
}

#[tokio::test]
async fn inkompatible_version_wird_abgelehnt() {
    let (adresse, _stop) = server_starten(ServerOptionen::default()).await;
    let optionen = ClientOptionen {
        version: Version::neu(2, 0, 0),
        ..client_optionen(PositioningType::Server)
    };
    match VoiceCraftClient::verbinden(adresse, optionen).await {
        Err(NetzwerkFehler::Abgelehnt(grund)) => assert!(grund.contains("Version")),
        anderes => panic!("Ablehnung erwartet: {anderes:?}"),
    }
}

#[tokio::test]
async fn voller_server_lehnt_ab() {
    let optionen = ServerOptionen {
        max_clients: 1,
        ..ServerOptionen::default()
    };
    let (adresse, _stop) = server_starten(optionen).await;
    let _erster = VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Server))
        .await
        .unwrap();
    let zweiter =
        VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Server)).await;
    assert!(matches!(zweiter, Err(NetzwerkFehler::Abgelehnt(g)) if g == "Server voll"));
}

#[tokio::test]
async fn falscher_positionierungsmodus_wird_abgelehnt() {
    let (adresse, _stop) = server_starten(ServerOptionen::default()).await;
    let ergebnis =
        VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Client)).await;
    assert!(matches!(ergebnis, Err(NetzwerkFehler::Abgelehnt(_))));
}

#[tokio::test]
async fn discovery_meldet_server_info() {
    let optionen = ServerOptionen {
        motd: "Testserver".into(),
        ..ServerOptionen::default()
    };
    let (adresse, _stop) = server_starten(optionen).await;

    let info = server_abfragen(adresse, WARTEZEIT).await.unwrap();
    assert_eq!(info.motd, "Testserver");
    assert_eq!(info.clients, 0);
    assert_eq!(info.positioning_type, PositioningType::Server);
    assert_eq!(info.version, Version::AKTUELL);

    let _client = VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Server))
        .await
        .unwrap();
    let info = server_abfragen(adresse, WARTEZEIT).await.unwrap();
    assert_eq!(info.clients, 1);
}

#[tokio::test]
async fn login_ohne_antwort_laeuft_ab() {
    let stumm = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let optionen = ClientOptionen {
        anfrage_timeout: Duration::from_millis(200),
        ..ClientOptionen::default()
    };
    let ergebnis = VoiceCraftClient::verbinden(stumm.local_addr().unwrap(), optionen).await;
    assert!(matches!(ergebnis, Err(NetzwerkFehler::Zeitlimit(_))));
}

#[tokio::test]
async fn antwort_mit_fremder_id_laesst_login_offen() {
    let fake = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let adresse = fake.local_addr().unwrap();
    let verbinden = tokio::spawn(VoiceCraftClient::verbinden(
        adresse,
        client_optionen(PositioningType::Server),
    ));

    // Login des Clients abwarten
    let mut puffer = vec![0u8; 1500];
    let (verbindung, login_id, client_adresse) = loop {
        let (n, absender) = fake.recv_from(&mut puffer).await.unwrap();
        if let Ok((header, Packet::LoginRequest(login))) = dekodieren(&puffer[..n]) {
            break (header.verbindung, login.request_id, absender);
        }
    };

    let antwort = |sequenz: u32, request_id: Uuid, entity: i32| {
        kodieren(
            verbindung,
            Some(sequenz),
            &Packet::AcceptResponse(AcceptResponse {
                request_id,
                entity_id: EntityId(entity),
            }),
        )
    };

    fake.send_to(&antwort(0, Uuid::new_v4(), 99), client_adresse)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!verbinden.is_finished());

    fake.send_to(&antwort(1, login_id, 7), client_adresse)
        .await
        .unwrap();
    let client = tokio::time::timeout(WARTEZEIT, verbinden)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(client.eigene_entity(), Some(EntityId(7)));
    assert_ne!(verbindung, VerbindungsId::UNVERBUNDEN);
}

#[tokio::test]
async fn position_und_audio_erreichen_andere_clients() {
    let optionen = ServerOptionen {
        positioning_type: PositioningType::Client,
        ..ServerOptionen::default()
    };
    let (adresse, _stop) = server_starten(optionen).await;
    let sprecher = VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Client))
        .await
        .unwrap();
    let hoerer = VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Client))
        .await
        .unwrap();
    let sprecher_id = sprecher.eigene_entity().unwrap();

    // Positionsaenderung wird an alle verteilt
    sprecher.position_setzen(Vec3::new(1.0, 0.0, 0.0)).unwrap();
    warten_bis("Position beim Hoerer", || {
        hoerer.welt_lesen(|w| {
            w.entity(sprecher_id)
                .is_ok_and(|e| e.position() == Vec3::new(1.0, 0.0, 0.0))
        })
    })
    .await;

    // Gleiche Welt, kurze Distanz: der Server meldet Sichtbarkeit
    warten_bis("Sichtbarkeit", || {
        hoerer
            .client_entity(sprecher_id)
            .is_some_and(|e| e.ist_sichtbar())
    })
    .await;

    let frame = vec![0.25f32; SAMPLES_PRO_FRAME];
    for _ in 0..10 {
        sprecher.audio_senden(&frame, 0.25).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    warten_bis("Audio beim Hoerer", || {
        hoerer
            .client_entity(sprecher_id)
            .is_some_and(|e| e.gepufferte_samples() > 0)
    })
    .await;
}

#[tokio::test]
async fn trennung_entfernt_entity_bei_anderen() {
    let (adresse, _stop) = server_starten(ServerOptionen::default()).await;
    let a = VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Server))
        .await
        .unwrap();
    let b = VoiceCraftClient::verbinden(adresse, client_optionen(PositioningType::Server))
        .await
        .unwrap();
    let a_id = a.eigene_entity().unwrap();
    warten_bis("Entity von A bei B", || b.welt_lesen(|w| w.existiert(a_id))).await;

    a.trennen("tschuess");
    assert!(!a.ist_verbunden());
    assert!(matches!(a.ping().await, Err(NetzwerkFehler::NichtVerbunden)));

    warten_bis("Entity von A entfernt", || !b.welt_lesen(|w| w.existiert(a_id))).await;
    assert!(b.client_entity(a_id).is_none());
}

/// Liefert absichtlich mehr Bytes, als ein Audio-Paket tragen darf
struct UebergrosserCodec;

impl AudioCodec for UebergrosserCodec {
    fn encode(&mut self, _samples: &[f32]) -> VoiceResult<Vec<u8>> {
        Ok(vec![0; MAX_AUDIO_LAENGE + 1])
    }

    fn decode(&mut self, _daten: Option<&[u8]>) -> VoiceResult<Vec<f32>> {
        Ok(vec![0.0; SAMPLES_PRO_FRAME])
    }
}

#[tokio::test]
async fn zu_grosser_audio_frame_wird_nicht_gekuerzt_gesendet() {
    let (adresse, _stop) = server_starten(ServerOptionen::default()).await;
    let optionen = ClientOptionen {
        codec: std::sync::Arc::new(|| Ok(Box::new(UebergrosserCodec) as Box<dyn AudioCodec>)),
        ..client_optionen(PositioningType::Server)
    };
    let client = VoiceCraftClient::verbinden(adresse, optionen).await.unwrap();

    let ergebnis = client.audio_senden(&vec![0.0; SAMPLES_PRO_FRAME], 0.0);
    assert!(matches!(
        ergebnis,
        Err(NetzwerkFehler::Protokoll(ProtokollFehler::NutzdatenZuLang { .. }))
    ));
}
