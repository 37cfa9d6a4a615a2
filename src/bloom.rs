use bitvec::prelude::*;
use rand::Rng;

use crate::errs::PanResult;
use crate::sequence::{char_to_code, Sequence};
use crate::util::{Ori, Pos};
use crate::validate;

/// Smallest and largest supported word sizes. The upper bound keeps every
/// `k`-mer hash below `4^k <= 2^62`, so the rolling update is exact.
pub const MIN_WORD: usize = 2;
pub const MAX_WORD: usize = 31;

pub fn check_word_size(word: usize) -> PanResult<()> {
    validate!(
        (MIN_WORD..=MAX_WORD).contains(&word),
        "word size must be in [{MIN_WORD}, {MAX_WORD}], got {word}"
    );
    Ok(())
}

/// Hash of `length` nucleotides of `seq` read from `start` in direction
/// `ori` (complemented on the reverse strand): sum of `code * 4^i` over
/// word positions `i`.
pub fn make_hash(seq: &Sequence, start: Pos, length: usize, ori: Ori) -> u64 {
    let mut hash = 0u64;
    let mut mul = 1u64;
    for i in 0..length {
        let pos = (start as i64 + ori.value() * i as i64) as Pos;
        let code = match ori {
            Ori::Forward => char_to_code(seq.char_at(pos)),
            Ori::Reverse => 3 - char_to_code(seq.char_at(pos)),
        };
        hash += code * mul;
        mul *= 4;
    }
    hash
}

/// O(1) update of a forward hash when the window slides one position: drop
/// `removed` (weight 1), append `added` (weight `4^(length-1)`).
pub fn reuse_hash(
    old: u64,
    length: usize,
    removed: u8,
    added: u8,
    forward: bool,
) -> u64 {
    let top = 1u64 << (2 * (length - 1));
    if forward {
        (old - char_to_code(removed)) / 4 + char_to_code(added) * top
    } else {
        (old - char_to_code(removed) * top) * 4 + char_to_code(added)
    }
}

/// Hash of the reverse-complement word: digits reversed, each mapped to
/// `3 - digit`.
pub fn complement_hash(hash: u64, length: usize) -> u64 {
    let mut rest = hash;
    let mut result = 0u64;
    for _ in 0..length {
        result = result * 4 + (3 - (rest & 0b11));
        rest >>= 2;
    }
    result
}

/// Forward and reverse-complement hashes of a sliding window, rotated in
/// lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RollingHash {
    fwd: u64,
    rev: u64,
    length: usize,
}

impl RollingHash {
    pub fn start(seq: &Sequence, pos: Pos, length: usize) -> RollingHash {
        let fwd = make_hash(seq, pos, length, Ori::Forward);
        RollingHash { fwd, rev: complement_hash(fwd, length), length }
    }

    /// Slide forward by one position: `removed` leaves the left edge,
    /// `added` enters at the right edge.
    pub fn roll(&mut self, removed: u8, added: u8) {
        self.fwd = reuse_hash(self.fwd, self.length, removed, added, true);
        // the reverse-complement window slides in the other direction
        // with complemented letters
        self.rev = reuse_hash(
            self.rev,
            self.length,
            crate::util::complement(removed),
            crate::util::complement(added),
            false,
        );
    }

    pub fn forward(&self) -> u64 {
        self.fwd
    }

    /// Strand-independent value, the smaller of the two hashes.
    pub fn canonical(&self) -> u64 {
        self.fwd.min(self.rev)
    }

    /// Ori whose reading produced the canonical hash.
    pub fn canonical_ori(&self) -> Ori {
        if self.fwd <= self.rev {
            Ori::Forward
        } else {
            Ori::Reverse
        }
    }
}

/// Multi-hash bit array. `add` sets one bit per multiplier, `test` is the
/// conjunction; false positives possible, deletions not supported.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: BitVec<u64, Lsb0>,
    hash_mul: Vec<u64>,
}

impl BloomFilter {
    pub fn new(bits: usize, hashes: usize) -> BloomFilter {
        BloomFilter::with_rng(bits, hashes, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng>(
        bits: usize,
        hashes: usize,
        rng: &mut R,
    ) -> BloomFilter {
        let mut hash_mul = Vec::with_capacity(hashes);
        while hash_mul.len() < hashes {
            let mul: u64 = rng.gen::<u64>() | 1;
            if !hash_mul.contains(&mul) {
                hash_mul.push(mul);
            }
        }
        BloomFilter { bits: bitvec![u64, Lsb0; 0; bits.max(1)], hash_mul }
    }

    /// Bit array size for an expected number of members and a target false
    /// positive rate.
    pub fn optimal_bits(members: usize, error_prob: f64) -> usize {
        let ln2 = std::f64::consts::LN_2;
        ((members as f64) * (1.0 / error_prob).ln() / (ln2 * ln2)).ceil()
            as usize
    }

    /// Number of hash functions for the given bits-per-member ratio.
    pub fn optimal_hashes(members: usize, bits: usize) -> usize {
        let k = (bits as f64 / members as f64 * std::f64::consts::LN_2)
            .round() as usize;
        k.max(1)
    }

    pub fn bits(&self) -> usize {
        self.bits.len()
    }

    pub fn hashes(&self) -> usize {
        self.hash_mul.len()
    }

    fn index(&self, hash: u64, mul: u64) -> usize {
        (hash.wrapping_mul(mul) % self.bits.len() as u64) as usize
    }

    pub fn add(&mut self, hash: u64) {
        for i in 0..self.hash_mul.len() {
            let index = self.index(hash, self.hash_mul[i]);
            self.bits.set(index, true);
        }
    }

    pub fn test(&self, hash: u64) -> bool {
        self.hash_mul.iter().all(|mul| self.bits[self.index(hash, *mul)])
    }

    /// Test, then add. Returns whether the member looked present before.
    pub fn test_and_add(&mut self, hash: u64) -> bool {
        let mut present = true;
        for i in 0..self.hash_mul.len() {
            let index = self.index(hash, self.hash_mul[i]);
            present &= self.bits[index];
            self.bits.set(index, true);
        }
        present
    }
}
