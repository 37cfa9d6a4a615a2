//! Detection and repair of blocks whose fragments overlap each other on
//! the same sequence.

use crate::block::BlockId;
use crate::block_set::BlockSet;
use crate::fragment::FragmentId;
use crate::util::Ori;

/// Whether any two fragments of the block share positions.
pub fn has_self_overlaps(bs: &BlockSet, block_id: BlockId) -> bool {
    first_overlapping_pair(bs, block_id).is_some()
}

/// Shorten or remove fragments until the block has no self overlaps.
///
/// Exact duplicates are removed entirely. A same-strand overlap is dropped
/// from both fragments. An opposite-strand overlap is split at its
/// midpoint: the fragment reaching in from the left keeps the left share,
/// the other one the right share (ties on `min_pos` give the left share to
/// the forward fragment, whose reading begins there).
pub fn fix_self_overlaps(bs: &mut BlockSet, block_id: BlockId) {
    while let Some((a, b)) = first_overlapping_pair(bs, block_id) {
        resolve_pair(bs, block_id, a, b);
    }
}

fn first_overlapping_pair(
    bs: &BlockSet,
    block_id: BlockId,
) -> Option<(FragmentId, FragmentId)> {
    let view = bs.view(block_id);
    let fragments: Vec<_> = view.fragments().collect();
    for (i, (a_id, a)) in fragments.iter().enumerate() {
        for (b_id, b) in fragments.iter().skip(i + 1) {
            if a.common_positions(b) > 0 {
                return Some((*a_id, *b_id));
            }
        }
    }
    None
}

fn resolve_pair(
    bs: &mut BlockSet,
    block_id: BlockId,
    a_id: FragmentId,
    b_id: FragmentId,
) {
    let a = bs.fragment(a_id).clone();
    let b = bs.fragment(b_id).clone();
    if a.same_coords(&b) {
        bs.erase_fragment(block_id, a_id);
        bs.erase_fragment(block_id, b_id);
        return;
    }
    if a.ori() == b.ori() {
        let common = a.common_fragment(&b).expect("overlap");
        for fid in [a_id, b_id] {
            let f = bs.fragment_mut(fid);
            f.exclude(&common);
            f.take_row();
        }
    } else {
        let c_min = a.min_pos().max(b.min_pos());
        let c_max = a.max_pos().min(b.max_pos());
        let left_share = (c_max - c_min + 2) / 2;
        let split = c_min + left_share;
        let a_takes_left = a.min_pos() < b.min_pos()
            || (a.min_pos() == b.min_pos() && a.ori() == Ori::Forward);
        let (left_id, right_id) =
            if a_takes_left { (a_id, b_id) } else { (b_id, a_id) };
        bs.fragment_mut(left_id).set_max_pos(split - 1);
        bs.fragment_mut(left_id).take_row();
        bs.fragment_mut(right_id).set_min_pos(split);
        bs.fragment_mut(right_id).take_row();
    }
    for fid in [a_id, b_id] {
        if !bs.fragment(fid).valid() {
            bs.erase_fragment(block_id, fid);
        }
    }
}
