//! Boundary and robustness scenarios: version rejection, cookie
//! behavior, suite negotiation failures, reordering and fragmentation.

use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::ecdh::EphemeralSecret;
use p256::{EncodedPoint, PublicKey};
use rand::rngs::OsRng;
use smallvec::smallvec;

use cambium::crypto;
use cambium::message::{
    AlertDescription, Certificate, CipherSuite, ContentType, ProtocolVersion,
    ServerKeyExchange, SignatureAndHashAlgorithm,
};
use cambium::{Config, Record};

use crate::common::*;

fn psk_config() -> Config {
    Config::builder()
        .add_preshared_key("id1", vec![0x11; 8])
        .build()
        .unwrap()
}

#[test]
fn dtls10_client_is_rejected() {
    let mut server = new_server(psk_config());
    let mut client = TestClient::new(vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8]);
    client.version = ProtocolVersion::DTLS1_0;

    let body = client.client_hello_body();
    let error = client
        .send(&mut server, CLIENT_HELLO, &body, 0, false)
        .unwrap_err();

    let alert = error.alert().expect("fatal alert");
    assert_eq!(alert.description, AlertDescription::ProtocolVersion);
}

#[test]
fn null_only_suite_offer_is_rejected() {
    let mut server = new_server(psk_config());
    let mut client = TestClient::new(vec![CipherSuite::SSL_NULL_WITH_NULL_NULL]);

    client.hello_exchange(&mut server);

    let body = client.client_hello_body();
    let error = client
        .send(&mut server, CLIENT_HELLO, &body, 0, false)
        .unwrap_err();

    let alert = error.alert().expect("fatal alert");
    assert_eq!(alert.description, AlertDescription::HandshakeFailure);
}

#[test]
fn missing_curve_extension_is_rejected() {
    let (cert, key) = generate_certificate("edge server");
    let config = Config::builder()
        .certificate_chain(vec![cert], key)
        .build()
        .unwrap();
    let mut server = new_server(config);

    // EC suite offered, but no supported_elliptic_curves extension.
    let mut client = TestClient::new(vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8]);

    client.hello_exchange(&mut server);

    let body = client.client_hello_body();
    let error = client
        .send(&mut server, CLIENT_HELLO, &body, 0, false)
        .unwrap_err();

    let alert = error.alert().expect("fatal alert");
    assert_eq!(alert.description, AlertDescription::HandshakeFailure);
}

#[test]
fn stale_cookie_triggers_another_hello_verify_request() {
    let mut server = new_server(psk_config());
    let mut client = TestClient::new(vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8]);

    client.hello_exchange(&mut server);

    // Change the hello parameters after obtaining the cookie; the
    // recomputed HMAC no longer matches, so the server must answer with
    // a fresh HelloVerifyRequest instead of advancing.
    client.random = cambium::message::Random::new();

    let body = client.client_hello_body();
    let flight = client
        .send(&mut server, CLIENT_HELLO, &body, 0, false)
        .unwrap()
        .expect("another HelloVerifyRequest");

    assert_eq!(flight_message_types(&flight), vec![HELLO_VERIFY_REQUEST]);
    assert!(!server.session().is_active());
}

#[test]
fn hello_verify_request_echoes_deterministic_cookie() {
    // Two servers sharing one cookie generator answer the same hello
    // from the same address with the same cookie.
    let cookies = std::sync::Arc::new(cambium::CookieGenerator::new());
    let config = std::sync::Arc::new(psk_config());

    let mut server_a = cambium::ServerHandshake::new(
        peer(),
        config.clone(),
        cookies.clone(),
        Box::new(()),
    );
    let mut server_b =
        cambium::ServerHandshake::new(peer(), config, cookies, Box::new(()));

    let client = TestClient::new(vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8]);
    let body = client.client_hello_body();

    let flight_a = server_a
        .process_record(hs_record(0, 0, hs_message(CLIENT_HELLO, 0, &body)))
        .unwrap()
        .unwrap();
    let flight_b = server_b
        .process_record(hs_record(0, 0, hs_message(CLIENT_HELLO, 0, &body)))
        .unwrap()
        .unwrap();

    assert_eq!(flight_a.records(), flight_b.records());
}

#[test]
fn unexpected_message_is_fatal() {
    let mut server = new_server(psk_config());
    let mut client = TestClient::new(vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8]);

    client.hello_exchange(&mut server);
    client.cookie_hello(&mut server);

    // A Finished out of nowhere (seq matches the next expected one).
    let error = client
        .send(&mut server, FINISHED, &[0u8; 12], 0, false)
        .unwrap_err();

    let alert = error.alert().expect("fatal alert");
    assert_eq!(alert.description, AlertDescription::UnexpectedMessage);
}

#[test]
fn early_change_cipher_spec_is_fatal() {
    let mut server = new_server(psk_config());
    let mut client = TestClient::new(vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8]);

    client.hello_exchange(&mut server);
    client.cookie_hello(&mut server);

    // CCS before ClientKeyExchange.
    let error = server.process_record(ccs_record(50)).unwrap_err();
    let alert = error.alert().expect("fatal alert");
    assert_eq!(alert.description, AlertDescription::UnexpectedMessage);
}

#[test]
fn close_notify_is_answered_and_terminal() {
    let mut server = new_server(psk_config());
    let mut client = TestClient::new(vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8]);

    client.hello_exchange(&mut server);

    let flight = server
        .process_record(Record {
            content_type: ContentType::Alert,
            epoch: 0,
            sequence: 9,
            fragment: vec![1, 0], // warning, close_notify
        })
        .unwrap()
        .expect("close_notify response");

    assert_eq!(flight.records().len(), 1);
    assert_eq!(flight.records()[0].content_type, ContentType::Alert);
    assert_eq!(flight.records()[0].fragment, vec![1, 0]);

    // Anything after teardown is refused.
    let error = server
        .process_record(hs_record(0, 10, hs_message(CLIENT_HELLO, 5, &[])))
        .unwrap_err();
    assert!(error.alert().is_some());
}

#[test]
fn reordered_client_flight_is_buffered() {
    let (client_cert, client_key) = generate_certificate("reorder client");
    let (server_cert, server_key) = generate_certificate("reorder server");
    let config = Config::builder()
        .certificate_chain(vec![server_cert], server_key)
        .client_authentication_required(true)
        .add_trust_anchor(client_cert.clone())
        .build()
        .unwrap();
    let mut server = new_server(config);
    let mut client =
        TestClient::new(vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8]).with_secp256r1();

    client.hello_exchange(&mut server);
    let server_flight = client.cookie_hello(&mut server);
    let messages = flight_messages(&server_flight);
    let server_random =
        server_hello_random(TestClient::server_message(&messages, SERVER_HELLO).unwrap());
    let (_, ske) =
        ServerKeyExchange::parse(TestClient::server_message(&messages, SERVER_KEY_EXCHANGE).unwrap())
            .unwrap();

    // Build the client flight: Certificate (seq 2) and
    // ClientKeyExchange (seq 3).
    let certificate = Certificate::X509Chain(smallvec![client_cert]);
    let mut cert_body = Vec::new();
    certificate.serialize(&mut cert_body);
    let cert_fragment = hs_message(CERTIFICATE, 2, &cert_body);

    let secret = EphemeralSecret::random(&mut OsRng);
    let point = PublicKey::from(&secret).to_encoded_point(false);
    let server_pub =
        PublicKey::from_encoded_point(&EncodedPoint::from_bytes(ske.params.public_key).unwrap())
            .unwrap();
    let premaster = secret
        .diffie_hellman(&server_pub)
        .raw_secret_bytes()
        .to_vec();
    let mut cke_body = vec![point.as_bytes().len() as u8];
    cke_body.extend_from_slice(point.as_bytes());
    let cke_fragment = hs_message(CLIENT_KEY_EXCHANGE, 3, &cke_body);

    // The transcript order is the message_seq order, regardless of
    // arrival order.
    client.transcript.extend_from_slice(&cert_fragment);
    client.transcript.extend_from_slice(&cke_fragment);
    client.next_seq = 4;

    // Deliver ClientKeyExchange first: it must be queued, not rejected.
    assert!(server
        .process_record(hs_record(0, 10, cke_fragment))
        .unwrap()
        .is_none());

    // The Certificate unblocks both.
    assert!(server
        .process_record(hs_record(0, 11, cert_fragment))
        .unwrap()
        .is_none());

    client.derive_master_secret(&premaster, &server_random);

    // CertificateVerify, then CCS + Finished complete as usual.
    let signing_key = crypto::load_signing_key(&client_key).unwrap();
    let signature = crypto::sign_ecdsa_sha256(&signing_key, &client.transcript).unwrap();
    let mut cv_body = Vec::new();
    cv_body.extend_from_slice(&SignatureAndHashAlgorithm::ecdsa_sha256().to_u16().to_be_bytes());
    cv_body.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    cv_body.extend_from_slice(&signature);
    client
        .send(&mut server, CERTIFICATE_VERIFY, &cv_body, 0, true)
        .unwrap();

    let terminal = client.finish(&mut server);
    assert!(server.session().is_active());
    client.check_server_finished(&terminal);
}

#[test]
fn fragmented_client_key_exchange_is_reassembled() {
    let mut server = new_server(psk_config());
    let mut client = TestClient::new(vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8]);

    client.hello_exchange(&mut server);
    let server_flight = client.cookie_hello(&mut server);
    let messages = flight_messages(&server_flight);
    let server_random =
        server_hello_random(TestClient::server_message(&messages, SERVER_HELLO).unwrap());

    let mut cke_body = Vec::new();
    cke_body.extend_from_slice(&3u16.to_be_bytes());
    cke_body.extend_from_slice(b"id1");

    // Split the ClientKeyExchange into two fragments.
    let split = 2;
    let total = cke_body.len();
    let frag = |offset: usize, chunk: &[u8]| -> Vec<u8> {
        let mut out = Vec::new();
        out.push(CLIENT_KEY_EXCHANGE);
        out.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
        out.extend_from_slice(&2u16.to_be_bytes()); // message_seq
        out.extend_from_slice(&(offset as u32).to_be_bytes()[1..]);
        out.extend_from_slice(&(chunk.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(chunk);
        out
    };

    // Second half first; the gap defers delivery.
    assert!(server
        .process_record(hs_record(0, 20, frag(split, &cke_body[split..])))
        .unwrap()
        .is_none());
    assert!(server
        .process_record(hs_record(0, 21, frag(0, &cke_body[..split])))
        .unwrap()
        .is_none());

    // The canonical unfragmented encoding is what enters the transcript.
    client.transcript.extend_from_slice(&hs_message(CLIENT_KEY_EXCHANGE, 2, &cke_body));
    client.next_seq = 3;

    let premaster = crypto::psk_premaster_secret(&[0x11; 8]);
    client.derive_master_secret(&premaster, &server_random);

    let terminal = client.finish(&mut server);
    assert!(server.session().is_active());
    client.check_server_finished(&terminal);
}
