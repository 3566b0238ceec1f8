// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Streamed Micheline decoding against the shared vectors.

use ledger_tez_tests::harness::{decode_micheline, Options};
use ledger_tez_tests::micheline::{bytes, VECTORS};

#[test]
fn vectors_render() {
    for v in VECTORS {
        let decoded = decode_micheline(&bytes(v), Options::default())
            .unwrap_or_else(|e| panic!("{}: {e}", v.name));
        assert_eq!(decoded.text, v.text, "vector {}", v.name);
    }
}

/// Splitting the input at every byte boundary must not change the output.
#[test]
fn refill_resumability() {
    for v in VECTORS {
        let payload = bytes(v);
        for chunk in 1..=payload.len() {
            let decoded = decode_micheline(
                &payload,
                Options {
                    chunk,
                    ..Options::default()
                },
            )
            .unwrap_or_else(|e| panic!("{} (chunk {chunk}): {e}", v.name));
            assert_eq!(decoded.text, v.text, "vector {} chunked by {chunk}", v.name);
        }
    }
}

/// A one-byte output window only changes where the suspensions fall.
#[test]
fn output_window_independence() {
    for v in VECTORS {
        let payload = bytes(v);
        for window in [1, 2, 7, 256] {
            let decoded = decode_micheline(
                &payload,
                Options {
                    window,
                    ..Options::default()
                },
            )
            .unwrap_or_else(|e| panic!("{} (window {window}): {e}", v.name));
            assert_eq!(decoded.text, v.text, "vector {} window {window}", v.name);
        }
    }
}

/// Worst-case streaming: one input byte per refill, one output byte per
/// flush.
#[test]
fn byte_at_a_time() {
    for v in VECTORS {
        let decoded = decode_micheline(
            &bytes(v),
            Options {
                chunk: 1,
                window: 1,
                ..Options::default()
            },
        )
        .unwrap_or_else(|e| panic!("{}: {e}", v.name));
        assert_eq!(decoded.text, v.text, "vector {}", v.name);
    }
}

#[test]
fn deep_nesting_rejected_when_streamed() {
    let mut deep = vec![];
    for _ in 0..45 {
        deep.extend_from_slice(&[0x05, 0x09]);
    }
    deep.extend_from_slice(&[0x00, 0x00]);

    let err = decode_micheline(
        &deep,
        Options {
            chunk: 1,
            ..Options::default()
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("ERR_TOO_DEEP"), "{err}");
}
