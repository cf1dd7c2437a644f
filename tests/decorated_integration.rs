// Integration tests for decorated binaries and their delta envelope.

use bindelta::binary::format::FMT_BINDIFF;
use bindelta::decorated::{
    self, DECO_DELETE, DECO_DELETE_ALL, DECO_INSERT, DECO_NO_CHANGES, DECO_TERM, DECO_UPDATE,
    DecorationOp, Envelope, VALUE_CHANGES, VALUE_NO_CHANGES,
};
use bindelta::decoration::{
    self, DECO_APP_1, DECO_BACKUP, DECO_EXPIRY, DECO_ID_MAX, DECO_STORE, DECO_TX, FMT_BIN_DECO,
    FMT_BIN_EXT_DECO,
};
use bindelta::{
    BinaryDeltaCompressor, DecoratedBinaryDeltaCompressor, DeltaCompressor, DeltaError,
    DeltaOptions,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a decorated binary from `(id, bytes)` pairs.
fn deco(entries: &[(usize, &[u8])]) -> Vec<u8> {
    let len = entries.iter().map(|(id, _)| id + 1).max().unwrap_or(0);
    let mut decos = vec![None; len];
    for &(id, value) in entries {
        decos[id] = Some(value);
    }
    decoration::decorate(&decos).unwrap().unwrap()
}

fn roundtrip(old: Option<&[u8]>, new: &[u8]) -> Option<Vec<u8>> {
    let delta = decorated::DEFAULT.extract_delta(old, new).unwrap();
    let restored = decorated::DEFAULT
        .apply_delta(old, delta.as_deref())
        .unwrap();
    assert_eq!(restored, new, "delta={delta:?}");
    delta
}

// ---------------------------------------------------------------------------
// Envelope encoding
// ---------------------------------------------------------------------------

#[test]
fn decoration_replaced_by_another() {
    let old = deco(&[(DECO_EXPIRY, b"a"), (DECO_STORE, b"b")]);
    let new = deco(&[(DECO_EXPIRY, b"a"), (DECO_TX, b"c")]);

    let delta = roundtrip(Some(&old), &new).unwrap();
    assert_eq!(
        delta,
        [
            DECO_DELETE,
            DECO_STORE as u8,
            DECO_INSERT,
            DECO_TX as u8,
            0x01,
            b'c',
            DECO_TERM,
            VALUE_NO_CHANGES,
        ]
    );
}

#[test]
fn decorations_and_value_change_together() {
    let value_old: Vec<u8> = (0..200u8).collect();
    let mut value_new = value_old.clone();
    value_new[150] = 0;

    let old = deco(&[(0, &value_old[..]), (DECO_EXPIRY, b"1000")]);
    let new = deco(&[(0, &value_new[..]), (DECO_EXPIRY, b"2000"), (DECO_BACKUP, b"bk")]);

    let delta = roundtrip(Some(&old), &new).unwrap();
    let env = Envelope::parse(&delta).unwrap();
    assert!(!env.delete_all);
    assert_eq!(
        env.ops,
        vec![
            DecorationOp::Update {
                id: DECO_EXPIRY,
                delta: b"2000"
            },
            DecorationOp::Insert {
                id: DECO_BACKUP,
                value: b"bk"
            },
        ]
    );
    let value_delta = env.value_delta.unwrap();
    assert_eq!(value_delta[0], FMT_BINDIFF);
    assert!(value_delta.len() < value_new.len());
}

#[test]
fn extended_decoration_ids() {
    let old = deco(&[(0, b"value"), (DECO_APP_1, b"app")]);
    let new = deco(&[(0, b"value"), (DECO_APP_1, b"app2"), (DECO_ID_MAX, b"last")]);
    assert_eq!(old[0], FMT_BIN_EXT_DECO);
    roundtrip(Some(&old), &new);
    roundtrip(Some(&new), &old);
}

#[test]
fn switching_between_compact_and_extended_format() {
    let compact = deco(&[(0, b"value"), (DECO_EXPIRY, b"ttl")]);
    let extended = deco(&[(0, b"value"), (DECO_EXPIRY, b"ttl"), (DECO_APP_1, b"x")]);
    assert_eq!(compact[0], FMT_BIN_DECO);
    assert_eq!(extended[0], FMT_BIN_EXT_DECO);
    roundtrip(Some(&compact), &extended);
    roundtrip(Some(&extended), &compact);
}

#[test]
fn plain_to_decorated_and_back() {
    let plain = b"plain value".to_vec();
    let decorated = deco(&[(0, &plain[..]), (DECO_EXPIRY, b"ttl")]);

    let delta = roundtrip(Some(&plain), &decorated).unwrap();
    assert_eq!(
        Envelope::parse(&delta).unwrap().ops,
        vec![DecorationOp::Insert {
            id: DECO_EXPIRY,
            value: b"ttl"
        }]
    );

    let delta = roundtrip(Some(&decorated), &plain).unwrap();
    assert_eq!(delta, [DECO_DELETE_ALL, VALUE_NO_CHANGES]);
}

#[test]
fn missing_old_value() {
    let new = deco(&[(0, b"value"), (DECO_STORE, b"s")]);
    roundtrip(None, &new);
    roundtrip(None, b"plain");
    assert_eq!(roundtrip(None, b""), None);
}

#[test]
fn decorated_value_without_undecorated_part() {
    let old = deco(&[(0, b"value"), (DECO_EXPIRY, b"ttl")]);
    let new = deco(&[(DECO_EXPIRY, b"ttl")]);
    roundtrip(Some(&old), &new);
    roundtrip(Some(&new), &old);
    // undecorated target from a decorated source with no value
    roundtrip(Some(&new), b"fresh value");
}

// ---------------------------------------------------------------------------
// Ambiguity guards
// ---------------------------------------------------------------------------

#[test]
fn value_delta_starting_with_deco_indicator() {
    for first in [
        DECO_NO_CHANGES,
        DECO_DELETE_ALL,
        DECO_INSERT,
        DECO_UPDATE,
        DECO_DELETE,
        DECO_TERM,
    ] {
        let new = [first, b'v', b'a', b'l'];
        let delta = roundtrip(Some(b"old"), &new).unwrap();
        assert_eq!(delta[0], DECO_NO_CHANGES, "first={first:#04X}");
        assert_eq!(&delta[1..], &new);
    }

    // other bytes are left alone
    let delta = roundtrip(Some(b"old"), &[VALUE_CHANGES, b'x']).unwrap();
    assert_eq!(delta, [VALUE_CHANGES, b'x']);
}

#[test]
fn value_delta_starting_with_value_indicator() {
    for first in [VALUE_CHANGES, VALUE_NO_CHANGES] {
        let old = deco(&[(0, b"v"), (DECO_EXPIRY, b"a")]);
        let value = [first, b'z'];
        let new = deco(&[(0, &value[..]), (DECO_EXPIRY, b"b")]);

        let delta = roundtrip(Some(&old), &new).unwrap();
        let env = Envelope::parse(&delta).unwrap();
        assert_eq!(env.value_delta, Some(&value[..]));
        let term = delta.iter().position(|&b| b == DECO_TERM).unwrap();
        assert_eq!(delta[term + 1], VALUE_CHANGES);
    }
}

// ---------------------------------------------------------------------------
// Malformed envelopes
// ---------------------------------------------------------------------------

#[test]
fn malformed_envelopes_are_rejected() {
    let old = deco(&[(0, b"v"), (DECO_EXPIRY, b"a")]);
    let apply = |delta: &[u8]| decorated::DEFAULT.apply_delta(Some(&old), Some(delta));

    assert!(matches!(
        apply(&[DECO_UPDATE, DECO_STORE as u8, 0x01, b'x', DECO_TERM]),
        Err(DeltaError::DecorationIndex { id: 2 })
    ));
    assert!(matches!(
        apply(&[DECO_DELETE, 0x09, DECO_TERM]),
        Err(DeltaError::DecorationIndex { id: 9 })
    ));
    assert!(matches!(
        apply(&[DECO_INSERT, 0x01, 0x05, b'x', DECO_TERM]),
        Err(DeltaError::LiteralOverrun { len: 5, .. })
    ));
    assert!(matches!(
        apply(&[DECO_DELETE, 0x01, 0x00, DECO_TERM]),
        Err(DeltaError::UnknownDecorationOp { op: 0x00, offset: 2 })
    ));
    assert!(matches!(
        apply(&[DECO_DELETE, 0x01]),
        Err(DeltaError::MissingTerminator { .. })
    ));
    // a corrupt decoration update surfaces the binary error
    assert!(matches!(
        apply(&[DECO_UPDATE, 0x01, 0x03, FMT_BINDIFF, 0x07, 0x03, DECO_TERM]),
        Err(DeltaError::UnknownOp { op: 0x07, .. })
    ));
}

#[test]
fn corrupt_old_value_is_reported() {
    // mask claims a decoration the buffer does not contain
    let old = [FMT_BIN_DECO, 0b11, 0x01, b'v'];
    let err = decorated::DEFAULT
        .apply_delta(Some(&old), Some(&[DECO_TERM]))
        .unwrap_err();
    assert!(matches!(err, DeltaError::Decoration(_)));
}

// ---------------------------------------------------------------------------
// Custom inner compressor
// ---------------------------------------------------------------------------

#[test]
fn tuned_inner_compressor() {
    let inner = BinaryDeltaCompressor::with_options(DeltaOptions {
        min_block: 2,
        replace_threshold: 8,
    });
    let compressor = DecoratedBinaryDeltaCompressor::with_inner(inner);
    assert_eq!(compressor.inner().options().replace_threshold, 8);

    let old = deco(&[(0, b"0123456789abcdefghij"), (DECO_EXPIRY, b"ttl")]);
    let new = deco(&[(0, b"0123456789ABCDEFghij"), (DECO_EXPIRY, b"ttl")]);
    let delta = compressor.extract_delta(Some(&old), &new).unwrap().unwrap();
    // no decoration changes: the value delta goes out bare
    assert_eq!(delta[0], FMT_BINDIFF);
    assert_eq!(compressor.apply_delta(Some(&old), Some(&delta)).unwrap(), new);
}

// ---------------------------------------------------------------------------
// Randomized decoration soak
// ---------------------------------------------------------------------------

fn random_decorated(rng: &mut StdRng) -> Vec<u8> {
    let max_id = if rng.random_bool(0.5) { 7 } else { DECO_ID_MAX };
    let mut decos: Vec<Option<Vec<u8>>> = vec![None; max_id + 1];
    for slot in decos.iter_mut() {
        if rng.random_bool(0.3) {
            let len = rng.random_range(0..100);
            *slot = Some((0..len).map(|_| rng.random()).collect());
        }
    }
    let refs: Vec<Option<&[u8]>> = decos.iter().map(Option::as_deref).collect();
    decoration::decorate(&refs).unwrap().unwrap_or_default()
}

#[test]
fn seeded_decoration_soak() {
    let mut rng = StdRng::seed_from_u64(0xDEC0);
    for _ in 0..300 {
        let old = random_decorated(&mut rng);
        let new = if rng.random_bool(0.2) {
            let mut plain: Vec<u8> = (0..rng.random_range(0..50)).map(|_| rng.random()).collect();
            if decoration::is_decorated(&plain) {
                plain[0] = 0;
            }
            plain
        } else {
            random_decorated(&mut rng)
        };
        roundtrip(Some(&old), &new);
    }
}
