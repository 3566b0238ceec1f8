// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Binary builders for the operation wire format, mirroring what the
//! node's forge endpoint produces.

/// Continuation-coded natural.
pub fn nat(mut v: u64) -> Vec<u8> {
    let mut out = vec![];
    loop {
        let b = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            out.push(b | 0x80);
        } else {
            out.push(b);
            return out;
        }
    }
}

/// Continuation-coded signed integer (sign in bit 6 of the first byte).
pub fn int(v: i64) -> Vec<u8> {
    let mut m = v.unsigned_abs();
    let mut b0 = (m & 0x3f) as u8;
    m >>= 6;
    if v < 0 {
        b0 |= 0x40;
    }
    let mut out = vec![];
    if m == 0 {
        out.push(b0);
        return out;
    }
    out.push(b0 | 0x80);
    loop {
        let b = (m & 0x7f) as u8;
        m >>= 7;
        if m != 0 {
            out.push(b | 0x80);
        } else {
            out.push(b);
            return out;
        }
    }
}

/// 4-byte big-endian length prefix.
pub fn sized(bytes: &[u8]) -> Vec<u8> {
    let mut out = (bytes.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(bytes);
    out
}

/// Tagged public key hash (tag + 20-byte hash).
pub fn pkh(tag: u8, hash: [u8; 20]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&hash);
    out
}

/// Implicit-account destination (nested public key hash).
pub fn implicit(tag: u8, hash: [u8; 20]) -> Vec<u8> {
    let mut out = vec![0];
    out.extend_from_slice(&pkh(tag, hash));
    out
}

/// Originated-contract destination (hash + padding byte).
pub fn originated(hash: [u8; 20]) -> Vec<u8> {
    let mut out = vec![1];
    out.extend_from_slice(&hash);
    out.push(0);
    out
}

/// Tagged ed25519 public key.
pub fn pk_ed25519(key: [u8; 32]) -> Vec<u8> {
    let mut out = vec![0];
    out.extend_from_slice(&key);
    out
}

/// A signing payload: magic byte, branch hash, operations.
pub fn group(branch: [u8; 32], ops: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![3];
    out.extend_from_slice(&branch);
    for op in ops {
        out.extend_from_slice(op);
    }
    out
}

/// A magic-prefixed bare Micheline expression payload.
pub fn expression(bytes: &[u8]) -> Vec<u8> {
    let mut out = vec![5];
    out.extend_from_slice(bytes);
    out
}

/// Manager-operation preamble (tag, source, fee, counter, gas limit,
/// storage limit).
pub fn manager(tag: u8, source: &[u8], fee: u64, counter: u64, gas: u64, storage: u64) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(source);
    out.extend_from_slice(&nat(fee));
    out.extend_from_slice(&nat(counter));
    out.extend_from_slice(&nat(gas));
    out.extend_from_slice(&nat(storage));
    out
}

/// Transaction operation contents.
pub struct Transaction {
    pub source: Vec<u8>,
    pub fee: u64,
    pub counter: u64,
    pub gas_limit: u64,
    pub storage_limit: u64,
    pub amount: u64,
    pub destination: Vec<u8>,
    /// entrypoint encoding + raw Micheline value
    pub parameters: Option<(Vec<u8>, Vec<u8>)>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            source: pkh(0, [0x11; 20]),
            fee: 0,
            counter: 0,
            gas_limit: 0,
            storage_limit: 0,
            amount: 0,
            destination: implicit(0, [0x22; 20]),
            parameters: None,
        }
    }
}

impl Transaction {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = manager(
            108,
            &self.source,
            self.fee,
            self.counter,
            self.gas_limit,
            self.storage_limit,
        );
        out.extend_from_slice(&nat(self.amount));
        out.extend_from_slice(&self.destination);
        match &self.parameters {
            None => out.push(0),
            Some((entrypoint, value)) => {
                out.push(1);
                out.extend_from_slice(entrypoint);
                out.extend_from_slice(&sized(value));
            }
        }
        out
    }
}

/// Reveal operation contents.
pub fn reveal(source: &[u8], fee: u64, public_key: &[u8]) -> Vec<u8> {
    let mut out = manager(107, source, fee, 0, 0, 0);
    out.extend_from_slice(public_key);
    out
}

/// Delegation operation contents.
pub fn delegation(source: &[u8], fee: u64, delegate: Option<&[u8]>) -> Vec<u8> {
    let mut out = manager(110, source, fee, 0, 0, 0);
    match delegate {
        None => out.push(0),
        Some(d) => {
            out.push(1);
            out.extend_from_slice(d);
        }
    }
    out
}

/// Ballot operation contents.
pub fn ballot(source: &[u8], period: i32, proposal: [u8; 32], vote: u8) -> Vec<u8> {
    let mut out = vec![6];
    out.extend_from_slice(source);
    out.extend_from_slice(&period.to_be_bytes());
    out.extend_from_slice(&proposal);
    out.push(vote);
    out
}

/// Proposals operation contents.
pub fn proposals(source: &[u8], period: i32, protos: &[[u8; 32]]) -> Vec<u8> {
    let mut out = vec![5];
    out.extend_from_slice(source);
    out.extend_from_slice(&period.to_be_bytes());
    let mut list = vec![];
    for p in protos {
        list.extend_from_slice(p);
    }
    out.extend_from_slice(&sized(&list));
    out
}

/// Failing-noop operation contents.
pub fn failing_noop(message: &[u8]) -> Vec<u8> {
    let mut out = vec![17];
    out.extend_from_slice(&sized(message));
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn continuation_coding() {
        assert_eq!(nat(0), vec![0x00]);
        assert_eq!(nat(10), vec![0x0a]);
        assert_eq!(nat(1000), vec![0xe8, 0x07]);
        assert_eq!(int(0), vec![0x00]);
        assert_eq!(int(-300), vec![0xec, 0x04]);
        assert_eq!(int(300), vec![0xac, 0x04]);
    }

    #[test]
    fn transaction_layout() {
        let tx = Transaction::default().encode();
        // tag + source(21) + 5 single-byte naturals + destination(22) + no-params byte
        assert_eq!(tx.len(), 1 + 21 + 5 + 22 + 1);
        assert_eq!(tx[0], 108);
    }
}
