// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Hand-assembled Micheline vectors with their expected rendering.

/// One encoded value and the text it must render to.
pub struct Vector {
    pub name: &'static str,
    /// Hex of the encoded value
    pub bytes: &'static str,
    pub text: &'static str,
}

pub const VECTORS: &[Vector] = &[
    Vector {
        name: "int-zero",
        bytes: "0000",
        text: "0",
    },
    Vector {
        name: "int-ten",
        bytes: "000a",
        text: "10",
    },
    Vector {
        name: "int-negative",
        bytes: "00ec04",
        text: "-300",
    },
    Vector {
        name: "int-large",
        bytes: "0088e8c8e99707",
        text: "123456789000",
    },
    Vector {
        name: "string-plain",
        bytes: "0100000003666f6f",
        text: "\"foo\"",
    },
    Vector {
        name: "string-escaped-quote",
        bytes: "0100000003612262",
        text: "\"a\\\"b\"",
    },
    Vector {
        name: "string-control-bytes",
        bytes: "01000000030a0901",
        text: "\"\\n\\t001\"",
    },
    Vector {
        name: "bytes-empty",
        bytes: "0a00000000",
        text: "0x",
    },
    Vector {
        name: "bytes-cafe",
        bytes: "0a00000002cafe",
        text: "0xCAFE",
    },
    Vector {
        name: "seq-empty",
        bytes: "0200000000",
        text: "{}",
    },
    Vector {
        name: "seq-ints",
        bytes: "020000000400010002",
        text: "{1;2}",
    },
    Vector {
        name: "prim-unit",
        bytes: "030b",
        text: "Unit",
    },
    Vector {
        name: "prim-some-int",
        bytes: "05090000",
        text: "Some 0",
    },
    Vector {
        name: "prim-nested-wrapped",
        bytes: "050905090000",
        text: "Some (Some 0)",
    },
    Vector {
        name: "prim-pair",
        bytes: "070700010002",
        text: "Pair 1 2",
    },
    Vector {
        name: "prim-pair-some-string",
        bytes: "07070001050901000000027463",
        text: "Pair 1 (Some \"tc\")",
    },
    Vector {
        name: "prim-annotated",
        bytes: "040b0000000425666f6f",
        text: "Unit %foo",
    },
    // variadic Pair: sized argument list, empty annotation list
    Vector {
        name: "prim-variadic",
        bytes: "0907 00000004 00010002 00000000",
        text: "Pair 1 2",
    },
    Vector {
        name: "seq-push-nat",
        bytes: "020000000607430362 0001",
        text: "{PUSH nat 1}",
    },
];

/// Hex decode, tolerating embedded spaces.
pub fn bytes(v: &Vector) -> Vec<u8> {
    let clean: String = v.bytes.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(clean).expect("invalid vector hex")
}
