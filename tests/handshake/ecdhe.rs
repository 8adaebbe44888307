//! ECDHE-ECDSA handshake scenarios.

use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::ecdh::EphemeralSecret;
use p256::{EncodedPoint, PublicKey};
use rand::rngs::OsRng;
use smallvec::smallvec;

use cambium::crypto;
use cambium::message::{
    Certificate, CipherSuite, ExtensionType, ServerKeyExchange, SignatureAndHashAlgorithm,
};
use cambium::Config;

use crate::common::*;

fn ecdhe_config(client_auth: bool, trust_anchor: Option<Vec<u8>>) -> (Config, Vec<u8>) {
    let (cert, key) = generate_certificate("ecdhe server");

    let mut builder = Config::builder()
        .certificate_chain(vec![cert.clone()], key)
        .client_authentication_required(client_auth);
    if let Some(anchor) = trust_anchor {
        builder = builder.add_trust_anchor(anchor);
    }

    (builder.build().unwrap(), cert)
}

/// Client-side ECDHE: generate an ephemeral key, agree with the
/// server's point from ServerKeyExchange and return
/// `(cke_body, premaster)`.
fn client_ecdh(server_point: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let secret = EphemeralSecret::random(&mut OsRng);
    let point = PublicKey::from(&secret).to_encoded_point(false);

    let server_pub =
        PublicKey::from_encoded_point(&EncodedPoint::from_bytes(server_point).unwrap()).unwrap();
    let premaster = secret
        .diffie_hellman(&server_pub)
        .raw_secret_bytes()
        .to_vec();

    let mut cke_body = vec![point.as_bytes().len() as u8];
    cke_body.extend_from_slice(point.as_bytes());

    (cke_body, premaster)
}

#[test]
fn ecdhe_without_client_auth() {
    let (config, server_cert) = ecdhe_config(false, None);
    let mut server = new_server(config);
    let mut client =
        TestClient::new(vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8]).with_secp256r1();

    client.hello_exchange(&mut server);
    let server_flight = client.cookie_hello(&mut server);

    assert_eq!(
        flight_message_types(&server_flight),
        vec![SERVER_HELLO, CERTIFICATE, SERVER_KEY_EXCHANGE, SERVER_HELLO_DONE],
        "no CertificateRequest without client authentication"
    );

    let messages = flight_messages(&server_flight);
    let server_random =
        server_hello_random(TestClient::server_message(&messages, SERVER_HELLO).unwrap());

    // The server's Certificate carries the configured chain.
    let cert_body = TestClient::server_message(&messages, CERTIFICATE).unwrap();
    let (_, certificate) = Certificate::parse(cert_body, false).unwrap();
    let Certificate::X509Chain(chain) = &certificate else {
        panic!("expected X.509 chain");
    };
    assert_eq!(chain[0], server_cert);

    // ServerKeyExchange: named curve secp256r1, signature over
    // client_random || server_random || params.
    let ske_body = TestClient::server_message(&messages, SERVER_KEY_EXCHANGE).unwrap();
    let (_, ske) = ServerKeyExchange::parse(ske_body).unwrap();
    assert_eq!(ske.params.named_curve.as_u16(), 23);

    let signed = ske.params.signed.as_ref().expect("signature present");
    assert_eq!(signed.algorithm, SignatureAndHashAlgorithm::ecdsa_sha256());

    let mut signed_data = Vec::new();
    signed_data.extend_from_slice(&client.random.to_bytes());
    signed_data.extend_from_slice(&server_random);
    ske.params.serialize(&mut signed_data, false);

    let server_public_key = crypto::public_key_from_certificate(&server_cert).unwrap();
    crypto::verify_ecdsa_sha256(&server_public_key, &signed_data, signed.signature)
        .expect("ServerKeyExchange signature verifies");

    // ClientKeyExchange and key derivation.
    let (cke_body, premaster) = client_ecdh(ske.params.public_key);
    assert_eq!(premaster.len(), 32);
    client
        .send(&mut server, CLIENT_KEY_EXCHANGE, &cke_body, 0, true)
        .unwrap();
    client.derive_master_secret(&premaster, &server_random);

    let terminal = client.finish(&mut server);

    assert!(server.session().is_active());
    assert_eq!(
        server.session().cipher_suite(),
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8
    );
    client.check_server_finished(&terminal);
}

#[test]
fn ecdhe_with_client_auth() {
    let (client_cert, client_key) = generate_certificate("ecdhe client");
    let (config, _server_cert) = ecdhe_config(true, Some(client_cert.clone()));
    let mut server = new_server(config);
    let mut client =
        TestClient::new(vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8]).with_secp256r1();

    client.hello_exchange(&mut server);
    let server_flight = client.cookie_hello(&mut server);

    assert_eq!(
        flight_message_types(&server_flight),
        vec![
            SERVER_HELLO,
            CERTIFICATE,
            SERVER_KEY_EXCHANGE,
            CERTIFICATE_REQUEST,
            SERVER_HELLO_DONE
        ],
    );

    let messages = flight_messages(&server_flight);
    let server_random =
        server_hello_random(TestClient::server_message(&messages, SERVER_HELLO).unwrap());
    let ske_body = TestClient::server_message(&messages, SERVER_KEY_EXCHANGE).unwrap();
    let (_, ske) = ServerKeyExchange::parse(ske_body).unwrap();

    // CertificateRequest asks for ECDSA with SHA256.
    let cr_body = TestClient::server_message(&messages, CERTIFICATE_REQUEST).unwrap();
    assert_eq!(cr_body[0], 1); // one certificate type
    assert_eq!(cr_body[1], 64); // ecdsa_sign

    // Client Certificate.
    let certificate = Certificate::X509Chain(smallvec![client_cert.clone()]);
    let mut cert_body = Vec::new();
    certificate.serialize(&mut cert_body);
    client
        .send(&mut server, CERTIFICATE, &cert_body, 0, true)
        .unwrap();

    // ClientKeyExchange.
    let (cke_body, premaster) = client_ecdh(ske.params.public_key);
    client
        .send(&mut server, CLIENT_KEY_EXCHANGE, &cke_body, 0, true)
        .unwrap();
    client.derive_master_secret(&premaster, &server_random);

    // CertificateVerify over the transcript up to ClientKeyExchange.
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
fn missing_client_auth_messages_fail_at_finished() {
    let (client_cert, _) = generate_certificate("ecdhe client");
    let (config, _) = ecdhe_config(true, Some(client_cert));
    let mut server = new_server(config);
    let mut client =
        TestClient::new(vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8]).with_secp256r1();

    client.hello_exchange(&mut server);
    let server_flight = client.cookie_hello(&mut server);
    let messages = flight_messages(&server_flight);
    let server_random =
        server_hello_random(TestClient::server_message(&messages, SERVER_HELLO).unwrap());
    let ske_body = TestClient::server_message(&messages, SERVER_KEY_EXCHANGE).unwrap();
    let (_, ske) = ServerKeyExchange::parse(ske_body).unwrap();

    // Skip Certificate and CertificateVerify entirely.
    let (cke_body, premaster) = client_ecdh(ske.params.public_key);
    client
        .send(&mut server, CLIENT_KEY_EXCHANGE, &cke_body, 0, true)
        .unwrap();
    client.derive_master_secret(&premaster, &server_random);

    server
        .process_record(ccs_record(client.record_seq))
        .unwrap();
    client.record_seq += 1;

    let verify_data = client.client_verify_data();
    let error = client
        .send(&mut server, FINISHED, &verify_data, 1, true)
        .unwrap_err();

    let alert = error.alert().expect("fatal alert");
    assert_eq!(
        alert.description,
        cambium::message::AlertDescription::HandshakeFailure
    );
    assert!(!server.session().is_active());
}

#[test]
fn raw_public_key_server_certificate() {
    let (config, server_cert) = ecdhe_config(false, None);
    let mut server = new_server(config);
    let mut client = TestClient::new(vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8])
        .with_secp256r1()
        .with_certificate_types(ExtensionType::ServerCertificateType, &[2, 0]);

    client.hello_exchange(&mut server);
    let server_flight = client.cookie_hello(&mut server);
    assert!(server.session().send_raw_public_key());

    let messages = flight_messages(&server_flight);
    let server_random =
        server_hello_random(TestClient::server_message(&messages, SERVER_HELLO).unwrap());

    // The Certificate body is a bare SubjectPublicKeyInfo.
    let cert_body = TestClient::server_message(&messages, CERTIFICATE).unwrap();
    let (_, certificate) = Certificate::parse(cert_body, true).unwrap();
    let Certificate::RawPublicKey(spki) = &certificate else {
        panic!("expected raw public key payload");
    };
    assert_eq!(spki, &crypto::subject_public_key_info(&server_cert).unwrap());

    // The SPKI verifies the ServerKeyExchange signature.
    let ske_body = TestClient::server_message(&messages, SERVER_KEY_EXCHANGE).unwrap();
    let (_, ske) = ServerKeyExchange::parse(ske_body).unwrap();

    let mut signed_data = Vec::new();
    signed_data.extend_from_slice(&client.random.to_bytes());
    signed_data.extend_from_slice(&server_random);
    ske.params.serialize(&mut signed_data, false);

    let public_key = crypto::public_key_from_spki(spki).unwrap();
    crypto::verify_ecdsa_sha256(
        &public_key,
        &signed_data,
        ske.params.signed.as_ref().unwrap().signature,
    )
    .unwrap();

    // And the handshake still completes.
    let (cke_body, premaster) = client_ecdh(ske.params.public_key);
    client
        .send(&mut server, CLIENT_KEY_EXCHANGE, &cke_body, 0, true)
        .unwrap();
    client.derive_master_secret(&premaster, &server_random);

    let terminal = client.finish(&mut server);
    assert!(server.session().is_active());
    client.check_server_finished(&terminal);
}
