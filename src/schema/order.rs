use std::cmp::Ordering;
use std::fmt;

/// Signature stored in exported blobs when no ordering applies
pub const UNORDERED_SIGNATURE: [u8; 2] = *b"__";

/// Comparator over primary-key bytes.
///
/// `compare` is the only required method. Orderings that can translate a key
/// into a cheaper form override `compile_key`; the sort engine and the row set
/// compile a pivot or search key once and then call `compare_compiled` for
/// every probe. Both paths must agree on every result.
pub trait ByteOrder: Send + Sync + fmt::Debug {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Two-byte tag written into exported blobs
    fn signature(&self) -> [u8; 2];

    fn compile_key(&self, _key: &[u8]) -> Option<CompiledKey> {
        None
    }

    fn compare_compiled(&self, compiled: &CompiledKey, other: &[u8]) -> Ordering {
        self.compare(&compiled.source, other)
    }

    fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// A key translated once into rank space, with its first eight ranks packed
/// into a big-endian word so most comparisons finish in one integer compare.
#[derive(Debug, Clone)]
pub struct CompiledKey {
    prefix: u64,
    ranks: Vec<u8>,
    source: Vec<u8>,
}

impl CompiledKey {
    fn build(key: &[u8], rank: impl Fn(u8) -> u8) -> Self {
        let ranks: Vec<u8> = key.iter().map(|&b| rank(b)).collect();
        CompiledKey {
            prefix: pack_prefix(ranks.iter().copied()),
            ranks,
            source: key.to_vec(),
        }
    }

    /// Compares this key against raw bytes translated with the same `rank`
    fn compare_with(&self, other: &[u8], rank: impl Fn(u8) -> u8) -> Ordering {
        let other_prefix = pack_prefix(other.iter().map(|&b| rank(b)));
        match self.prefix.cmp(&other_prefix) {
            Ordering::Equal => {
                let tail = self.ranks.iter().copied();
                tail.cmp(other.iter().map(|&b| rank(b)))
            }
            decided => decided,
        }
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }
}

fn pack_prefix(ranks: impl Iterator<Item = u8>) -> u64 {
    let mut packed = [0u8; 8];
    for (slot, rank) in packed.iter_mut().zip(ranks) {
        *slot = rank;
    }
    u64::from_be_bytes(packed)
}

/// Unsigned byte-lexicographic order
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalOrder;

impl ByteOrder for NaturalOrder {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn signature(&self) -> [u8; 2] {
        *b"nd"
    }

    fn compile_key(&self, key: &[u8]) -> Option<CompiledKey> {
        Some(CompiledKey::build(key, |b| b))
    }

    fn compare_compiled(&self, compiled: &CompiledKey, other: &[u8]) -> Ordering {
        compiled.compare_with(other, |b| b)
    }
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Alphabet bytes rank 0..64 in alphabet order; every other byte ranks after
/// them, keeping their relative byte order.
const BASE64_RANKS: [u8; 256] = build_base64_ranks();

const fn build_base64_ranks() -> [u8; 256] {
    let mut ranks = [0u8; 256];
    let mut in_alphabet = [false; 256];
    let mut i = 0;
    while i < 64 {
        let b = BASE64_ALPHABET[i] as usize;
        ranks[b] = i as u8;
        in_alphabet[b] = true;
        i += 1;
    }
    let mut next = 64usize;
    let mut b = 0;
    while b < 256 {
        if !in_alphabet[b] {
            ranks[b] = next as u8;
            next += 1;
        }
        b += 1;
    }
    ranks
}

#[inline]
fn base64_rank(b: u8) -> u8 {
    BASE64_RANKS[b as usize]
}

/// Order of the URL-safe base64 alphabet, used for hash-style keys
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Order;

impl ByteOrder for Base64Order {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.iter()
            .map(|&x| base64_rank(x))
            .cmp(b.iter().map(|&y| base64_rank(y)))
    }

    fn signature(&self) -> [u8; 2] {
        *b"b6"
    }

    fn compile_key(&self, key: &[u8]) -> Option<CompiledKey> {
        Some(CompiledKey::build(key, base64_rank))
    }

    fn compare_compiled(&self, compiled: &CompiledKey, other: &[u8]) -> Ordering {
        compiled.compare_with(other, base64_rank)
    }
}

/// A pivot or search key prepared once for many comparisons.
/// Uses the compiled form when the ordering offers one.
#[derive(Debug, Clone)]
pub(crate) enum Probe {
    Compiled(CompiledKey),
    Raw(Vec<u8>),
}

impl Probe {
    pub(crate) fn new(order: &dyn ByteOrder, key: &[u8]) -> Self {
        match order.compile_key(key) {
            Some(compiled) => Probe::Compiled(compiled),
            None => Probe::Raw(key.to_vec()),
        }
    }

    /// Orders the probe key against `other`
    #[inline]
    pub(crate) fn cmp(&self, order: &dyn ByteOrder, other: &[u8]) -> Ordering {
        match self {
            Probe::Compiled(compiled) => order.compare_compiled(compiled, other),
            Probe::Raw(key) => order.compare(key, other),
        }
    }
}

/// Looks up a built-in ordering by its blob signature
pub fn order_for_signature(signature: [u8; 2]) -> Option<std::sync::Arc<dyn ByteOrder>> {
    match &signature {
        b"nd" => Some(std::sync::Arc::new(NaturalOrder)),
        b"b6" => Some(std::sync::Arc::new(Base64Order)),
        _ => None,
    }
}
