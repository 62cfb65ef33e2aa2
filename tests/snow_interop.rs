//! Interoperability tests against the `snow` crate.
//!
//! `snow` is verified against the published Noise test vectors, so agreement
//! here — across patterns, ciphers, hashes, and psk placements, in both
//! directions — pins this implementation to the same wire behavior.

use enoki::{Builder, HandshakeAction, HandshakeState};
use rand::RngCore;

/// A protocol to interop-test, plus which side needs the peer's static
/// public key before the handshake and where a psk slots in.
struct Suite {
    name: &'static str,
    initiator_needs_rs: bool,
    responder_needs_rs: bool,
    psk: Option<usize>,
}

const fn suite(
    name: &'static str,
    initiator_needs_rs: bool,
    responder_needs_rs: bool,
    psk: Option<usize>,
) -> Suite {
    Suite {
        name,
        initiator_needs_rs,
        responder_needs_rs,
        psk,
    }
}

const SUITES: &[Suite] = &[
    suite("Noise_NN_25519_ChaChaPoly_SHA256", false, false, None),
    suite("Noise_NX_25519_ChaChaPoly_SHA256", false, false, None),
    suite("Noise_XN_25519_ChaChaPoly_SHA256", false, false, None),
    suite("Noise_IN_25519_AESGCM_SHA256", false, false, None),
    suite("Noise_XX_25519_AESGCM_SHA256", false, false, None),
    suite("Noise_XX_25519_ChaChaPoly_BLAKE2b", false, false, None),
    suite("Noise_IX_25519_ChaChaPoly_SHA512", false, false, None),
    suite("Noise_NK_25519_ChaChaPoly_SHA256", true, false, None),
    suite("Noise_XK_25519_ChaChaPoly_SHA512", true, false, None),
    suite("Noise_IK_25519_ChaChaPoly_BLAKE2s", true, false, None),
    suite("Noise_KN_25519_ChaChaPoly_SHA256", false, true, None),
    suite("Noise_KK_25519_ChaChaPoly_SHA256", true, true, None),
    suite("Noise_KX_25519_ChaChaPoly_BLAKE2s", false, true, None),
    suite("Noise_NNpsk0_25519_ChaChaPoly_SHA256", false, false, Some(0)),
    suite("Noise_NNpsk2_25519_ChaChaPoly_SHA256", false, false, Some(2)),
    suite("Noise_XXpsk3_25519_ChaChaPoly_SHA256", false, false, Some(3)),
];

const PSK: [u8; 32] = [0x5au8; 32];

fn random_key() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn public_for(private: &[u8; 32]) -> [u8; 32] {
    use x25519_dalek::{PublicKey, StaticSecret};
    PublicKey::from(&StaticSecret::from(*private)).to_bytes()
}

fn build_enoki(suite: &Suite, local: &[u8; 32], remote_pub: &[u8; 32], initiator: bool) -> HandshakeState {
    let needs_rs = if initiator {
        suite.initiator_needs_rs
    } else {
        suite.responder_needs_rs
    };
    let mut builder = Builder::new(suite.name).local_private_key(local);
    if needs_rs {
        builder = builder.remote_public_key(remote_pub);
    }
    if suite.psk.is_some() {
        builder = builder.psk(&PSK);
    }
    let result = if initiator {
        builder.build_initiator()
    } else {
        builder.build_responder()
    };
    result.unwrap()
}

fn build_snow(suite: &Suite, local: &[u8; 32], remote_pub: &[u8; 32], initiator: bool) -> snow::HandshakeState {
    let needs_rs = if initiator {
        suite.initiator_needs_rs
    } else {
        suite.responder_needs_rs
    };
    let mut builder = snow::Builder::new(suite.name.parse().unwrap())
        .local_private_key(local)
        .unwrap();
    if needs_rs {
        builder = builder.remote_public_key(remote_pub).unwrap();
    }
    if let Some(index) = suite.psk {
        builder = builder.psk(index as u8, &PSK).unwrap();
    }
    let result = if initiator {
        builder.build_initiator()
    } else {
        builder.build_responder()
    };
    result.unwrap()
}

/// Run a full handshake where this crate initiates toward a snow responder,
/// then exchange transport traffic both ways.
fn enoki_initiates(suite: &Suite) {
    let i_priv = random_key();
    let r_priv = random_key();

    let mut initiator = build_enoki(suite, &i_priv, &public_for(&r_priv), true);
    let mut responder = build_snow(suite, &r_priv, &public_for(&i_priv), false);

    let mut message = vec![0u8; 65535];
    let mut payload = vec![0u8; 65535];
    let mut turn = 0;

    while !(initiator.is_complete() && responder.is_handshake_finished()) {
        let sent = format!("payload {turn}");
        if initiator.next_action() == HandshakeAction::WriteMessage {
            let len = initiator.write_message(sent.as_bytes(), &mut message).unwrap();
            let plen = responder.read_message(&message[..len], &mut payload).unwrap();
            assert_eq!(&payload[..plen], sent.as_bytes(), "{}", suite.name);
        } else {
            let len = responder.write_message(sent.as_bytes(), &mut message).unwrap();
            let plen = initiator.read_message(&message[..len], &mut payload).unwrap();
            assert_eq!(&payload[..plen], sent.as_bytes(), "{}", suite.name);
        }
        turn += 1;
    }

    assert_eq!(
        initiator.handshake_hash().unwrap(),
        responder.get_handshake_hash(),
        "handshake hash mismatch for {}",
        suite.name
    );

    let mut enoki_transport = initiator.into_transport().unwrap();
    let mut snow_transport = responder.into_transport_mode().unwrap();

    for round in 0..4 {
        let sent = format!("{} -> {round}", suite.name);
        let len = enoki_transport.write_message(sent.as_bytes(), &mut message).unwrap();
        let plen = snow_transport.read_message(&message[..len], &mut payload).unwrap();
        assert_eq!(&payload[..plen], sent.as_bytes());

        let sent = format!("{} <- {round}", suite.name);
        let len = snow_transport.write_message(sent.as_bytes(), &mut message).unwrap();
        let plen = enoki_transport.read_message(&message[..len], &mut payload).unwrap();
        assert_eq!(&payload[..plen], sent.as_bytes());
    }
}

/// The mirror image: snow initiates toward this crate's responder.
fn snow_initiates(suite: &Suite) {
    let i_priv = random_key();
    let r_priv = random_key();

    let mut initiator = build_snow(suite, &i_priv, &public_for(&r_priv), true);
    let mut responder = build_enoki(suite, &r_priv, &public_for(&i_priv), false);

    let mut message = vec![0u8; 65535];
    let mut payload = vec![0u8; 65535];
    let mut turn = 0;

    while !(responder.is_complete() && initiator.is_handshake_finished()) {
        let sent = format!("payload {turn}");
        if responder.next_action() == HandshakeAction::ReadMessage {
            let len = initiator.write_message(sent.as_bytes(), &mut message).unwrap();
            let plen = responder.read_message(&message[..len], &mut payload).unwrap();
            assert_eq!(&payload[..plen], sent.as_bytes(), "{}", suite.name);
        } else {
            let len = responder.write_message(sent.as_bytes(), &mut message).unwrap();
            let plen = initiator.read_message(&message[..len], &mut payload).unwrap();
            assert_eq!(&payload[..plen], sent.as_bytes(), "{}", suite.name);
        }
        turn += 1;
    }

    assert_eq!(
        responder.handshake_hash().unwrap(),
        initiator.get_handshake_hash(),
        "handshake hash mismatch for {}",
        suite.name
    );

    let mut snow_transport = initiator.into_transport_mode().unwrap();
    let mut enoki_transport = responder.into_transport().unwrap();

    let len = snow_transport.write_message(b"from snow", &mut message).unwrap();
    let plen = enoki_transport.read_message(&message[..len], &mut payload).unwrap();
    assert_eq!(&payload[..plen], b"from snow");

    let len = enoki_transport.write_message(b"from enoki", &mut message).unwrap();
    let plen = snow_transport.read_message(&message[..len], &mut payload).unwrap();
    assert_eq!(&payload[..plen], b"from enoki");
}

#[test]
fn interop_as_initiator() {
    for suite in SUITES {
        enoki_initiates(suite);
    }
}

#[test]
fn interop_as_responder() {
    for suite in SUITES {
        snow_initiates(suite);
    }
}

#[test]
fn interop_with_prologue() {
    let suite = suite("Noise_XX_25519_ChaChaPoly_SHA256", false, false, None);
    let i_priv = random_key();
    let r_priv = random_key();

    let mut initiator = Builder::new(suite.name)
        .local_private_key(&i_priv)
        .prologue(b"interop prologue")
        .build_initiator()
        .unwrap();
    let mut responder = snow::Builder::new(suite.name.parse().unwrap())
        .local_private_key(&r_priv)
        .unwrap()
        .prologue(b"interop prologue")
        .unwrap()
        .build_responder()
        .unwrap();

    let mut message = vec![0u8; 65535];
    let mut payload = vec![0u8; 65535];

    let len = initiator.write_message(b"", &mut message).unwrap();
    responder.read_message(&message[..len], &mut payload).unwrap();
    let len = responder.write_message(b"", &mut message).unwrap();
    initiator.read_message(&message[..len], &mut payload).unwrap();
    let len = initiator.write_message(b"", &mut message).unwrap();
    responder.read_message(&message[..len], &mut payload).unwrap();

    assert!(initiator.is_complete());
    assert!(responder.is_handshake_finished());
    assert_eq!(
        initiator.handshake_hash().unwrap(),
        responder.get_handshake_hash()
    );
}

#[test]
fn interop_rekey_both_sides() {
    let suite = suite("Noise_NN_25519_ChaChaPoly_SHA256", false, false, None);
    let i_priv = random_key();
    let r_priv = random_key();

    let mut initiator = build_enoki(&suite, &i_priv, &public_for(&r_priv), true);
    let mut responder = build_snow(&suite, &r_priv, &public_for(&i_priv), false);

    let mut message = vec![0u8; 65535];
    let mut payload = vec![0u8; 65535];
    let len = initiator.write_message(b"", &mut message).unwrap();
    responder.read_message(&message[..len], &mut payload).unwrap();
    let len = responder.write_message(b"", &mut message).unwrap();
    initiator.read_message(&message[..len], &mut payload).unwrap();

    let mut enoki_transport = initiator.into_transport().unwrap();
    let mut snow_transport = responder.into_transport_mode().unwrap();

    // Manual rekey agreed out of band: both directions keep working.
    enoki_transport.rekey_send().unwrap();
    snow_transport.rekey_incoming();

    let len = enoki_transport.write_message(b"rekeyed", &mut message).unwrap();
    let plen = snow_transport.read_message(&message[..len], &mut payload).unwrap();
    assert_eq!(&payload[..plen], b"rekeyed");

    snow_transport.rekey_outgoing();
    enoki_transport.rekey_recv().unwrap();

    let len = snow_transport.write_message(b"rekeyed back", &mut message).unwrap();
    let plen = enoki_transport.read_message(&message[..len], &mut payload).unwrap();
    assert_eq!(&payload[..plen], b"rekeyed back");
}
