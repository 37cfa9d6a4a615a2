use crate::block_set::{BlockSet, BlockView};
use crate::fragment::Fragment;

const P1: u32 = 0x8541_67e5;
const P2: u32 = 0x9e37_79b9;
const P3: u32 = 0xc2b2_ae35;
const P4: u32 = 0x27d4_eb2f;

fn seq_name_hash(name: &str) -> u32 {
    // FNV-1a, stable across runs
    let mut h: u32 = 0x811c_9dc5;
    for b in name.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

pub fn fragment_hash(f: &Fragment) -> u32 {
    seq_name_hash(f.seq().name()).wrapping_mul(P1)
        ^ (f.min_pos() as u32).wrapping_mul(P2)
        ^ (f.max_pos() as u32).wrapping_mul(P3)
        ^ (f.ori().value() as u32).wrapping_mul(P4)
}

/// Order-independent fingerprint of a block: XOR of its fragment hashes.
/// Equal under any permutation of fragments.
pub fn block_hash(view: &BlockView<'_>) -> u32 {
    view.fragments().fold(0, |acc, (_, f)| acc ^ fragment_hash(f))
}

/// Fingerprint of a whole blockset, insensitive to block and fragment
/// order.
pub fn blockset_hash(bs: &BlockSet) -> u32 {
    bs.block_ids()
        .into_iter()
        .fold(0, |acc, id| acc ^ block_hash(&bs.view(id)))
}

#[cfg(test)]
mod block_hash_tests {
    use super::*;
    use crate::block::Block;
    use crate::block_set::BlockSet;
    use crate::sequence::Sequence;
    use crate::util::Ori;

    #[test]
    fn test_permutation_invariance() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b1 = bs.insert_block(Block::named("b1"));
        bs.insert_fragment(b1, Fragment::forward(seq.clone(), 0, 5));
        bs.insert_fragment(
            b1,
            Fragment::new(seq.clone(), 7, 10, Ori::Reverse),
        );
        let b2 = bs.insert_block(Block::named("b2"));
        bs.insert_fragment(
            b2,
            Fragment::new(seq.clone(), 7, 10, Ori::Reverse),
        );
        bs.insert_fragment(b2, Fragment::forward(seq.clone(), 0, 5));
        assert_eq!(block_hash(&bs.view(b1)), block_hash(&bs.view(b2)));
    }

    #[test]
    fn test_sensitive_to_coords_and_ori() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b1 = bs.insert_block(Block::named("b1"));
        bs.insert_fragment(b1, Fragment::forward(seq.clone(), 0, 5));
        let b2 = bs.insert_block(Block::named("b2"));
        bs.insert_fragment(b2, Fragment::forward(seq.clone(), 0, 6));
        let b3 = bs.insert_block(Block::named("b3"));
        bs.insert_fragment(
            b3,
            Fragment::new(seq.clone(), 0, 5, Ori::Reverse),
        );
        let h1 = block_hash(&bs.view(b1));
        let h2 = block_hash(&bs.view(b2));
        let h3 = block_hash(&bs.view(b3));
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
    }
}
