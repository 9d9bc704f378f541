//! Hashable key encoding and the hash-accelerated sort primitives (§4.2).
//!
//! Strings longer than ten characters cannot be packed into a single
//! 2^53-safe integer, so the chunked multi-hash splits a string into three
//! consecutive ten-character windows and compares them lexicographically,
//! falling back to locale-aware comparison on any pair that ties across all
//! three (a collision).

use std::cmp::Ordering;

use crate::types::{compare_cell_values, CellValue, SortDirection};

/// Characters per hash chunk. Ten base-36 digits fit below 2^53.
pub const CHUNK_LEN: usize = 10;
/// Number of chunks the single-key string sort compares lexicographically.
pub const CHUNK_COUNT: usize = 3;

/// Sentinel used so nulls sort after every real hash key, regardless of
/// direction. The base-36 ten-char hash tops out at 36^10 - 1 ≈ 3.656e15,
/// well below this value, so no real key can collide with it.
pub const NULL_SENTINEL: f64 = f64::MAX;

fn char_value(c: Option<char>) -> u32 {
    match c {
        None => 0,
        Some(c) => {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() {
                c as u32 - 'a' as u32
            } else if c.is_ascii_digit() {
                c as u32 - '0' as u32 + 26
            } else {
                0
            }
        }
    }
}

/// Pack one `CHUNK_LEN`-character window starting at `start` into a monotonic
/// base-36 integer. Strings shorter than the window are right-padded with
/// zero-mapped characters, so `"a" < "ab"`.
fn pack_chunk(chars: &[char], start: usize) -> f64 {
    let mut key = 0.0_f64;
    for i in 0..CHUNK_LEN {
        let c = chars.get(start + i).copied();
        key = key * 36.0 + f64::from(char_value(c));
    }
    key
}

/// The three chunk keys for a string, used by the single-key string sort path.
pub fn chunked_keys(s: &str) -> [f64; CHUNK_COUNT] {
    let chars: Vec<char> = s.chars().collect();
    let mut keys = [0.0; CHUNK_COUNT];
    for (i, key) in keys.iter_mut().enumerate() {
        *key = pack_chunk(&chars, i * CHUNK_LEN);
    }
    keys
}

/// Encode a single cell value as one f64 sort key, for multi-key sorts (no
/// collision fallback is applied in multi-key mode) and for numeric/timestamp
/// single-key sorts. Strings are packed using only the first chunk, so ties
/// beyond ten characters are possible and intentionally unresolved here.
pub fn encode_sort_key(value: &CellValue) -> f64 {
    match value {
        CellValue::Null => NULL_SENTINEL,
        CellValue::Int(i) => *i as f64,
        CellValue::Float(f) => *f,
        CellValue::Timestamp(t) => *t as f64,
        CellValue::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            pack_chunk(&chars, 0)
        }
        other => other.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
    }
}

pub(crate) const fn apply_direction(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    }
}

/// Compares two already hash-encoded keys for one sort column. The null
/// sentinel always sorts after every real value, in either direction —
/// `apply_direction` only governs ordering among non-null keys.
pub(crate) fn compare_encoded_key(a: f64, b: f64, direction: SortDirection) -> Ordering {
    match (a == NULL_SENTINEL, b == NULL_SENTINEL) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => apply_direction(a.partial_cmp(&b).unwrap_or(Ordering::Equal), direction),
    }
}

/// Sort a dense numeric key array, returning only the resulting permutation.
/// Ties are left in insertion order (a stable sort).
pub fn sort_numeric_single_key(values: &[f64], direction: SortDirection) -> Vec<u32> {
    let mut perm: Vec<u32> = (0..values.len() as u32).collect();
    perm.sort_by(|&a, &b| {
        let ord = values[a as usize]
            .partial_cmp(&values[b as usize])
            .unwrap_or(Ordering::Equal);
        apply_direction(ord, direction)
    });
    perm
}

/// Sort a single permutation by several dense numeric key arrays in priority
/// order, one sign per key. No string fallback is applied: ties across every
/// key preserve input order.
pub fn sort_multi_key(keys: &[Vec<f64>], directions: &[SortDirection]) -> Vec<u32> {
    let n = keys.first().map_or(0, Vec::len);
    let mut perm: Vec<u32> = (0..n as u32).collect();
    perm.sort_by(|&a, &b| {
        for (key, &direction) in keys.iter().zip(directions) {
            let ord = compare_encoded_key(key[a as usize], key[b as usize], direction);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    perm
}

/// Result of the single-key string sort: the resolved permutation plus every
/// pair of original indices whose three chunk keys tied (collision candidates
/// that were resolved by the locale-aware fallback).
#[derive(Debug, Clone)]
pub struct StringSortResult {
    pub permutation: Vec<u32>,
    pub collisions: Vec<(u32, u32)>,
}

/// Sort strings by their chunked hash keys, falling back to locale-aware
/// (here: `Ord` on `String`, the ASCII-clean common case) comparison on any
/// maximal run of indices whose three chunk keys are all equal.
pub fn sort_strings_single_key(values: &[String], direction: SortDirection) -> StringSortResult {
    let n = values.len();
    let keys: Vec<[f64; CHUNK_COUNT]> = values.iter().map(|s| chunked_keys(s)).collect();

    let mut perm: Vec<u32> = (0..n as u32).collect();
    perm.sort_by(|&a, &b| {
        let ord = keys[a as usize]
            .partial_cmp(&keys[b as usize])
            .unwrap_or(Ordering::Equal);
        apply_direction(ord, direction)
    });

    let mut collisions = Vec::new();
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && keys[perm[j] as usize] == keys[perm[i] as usize] {
            j += 1;
        }
        if j - i > 1 {
            for a in i..j {
                for b in (a + 1)..j {
                    collisions.push((perm[a], perm[b]));
                }
            }
            perm[i..j].sort_by(|&a, &b| {
                apply_direction(values[a as usize].cmp(&values[b as usize]), direction)
            });
        }
        i = j;
    }

    StringSortResult {
        permutation: perm,
        collisions,
    }
}

/// Fallback direct comparison used when a hash cache entry is missing for a
/// sort key (e.g. after eviction).
pub fn compare_values_fallback(a: &CellValue, b: &CellValue) -> Ordering {
    compare_cell_values(a, b)
}
