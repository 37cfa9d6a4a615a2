use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::arena::Arena;
use crate::block::{Block, BlockId};
use crate::block_stat::{block_identity, make_stat};
use crate::fragment::{Fragment, FragmentId};
use crate::sequence::{SeqRef, Sequence};
use crate::util::Ori;

/// A named alignment of blocks themselves along sequences. Every row has
/// the same length; gap columns are explicit `None` entries.
#[derive(Debug, Clone, Default)]
pub struct BlockSetAlignment {
    pub rows: IndexMap<String, BsaRow>,
}

#[derive(Debug, Clone)]
pub struct BsaRow {
    pub ori: Ori,
    pub fragments: Vec<Option<FragmentId>>,
}

/// Owning collection of blocks, their fragments and a shared sequence
/// list.
///
/// Blocks and fragments live in arenas and reference each other by stable
/// ids, so back-references (fragment to owner, neighbour to neighbour) stay
/// weak. An id is invalidated by removal; holding ids across destructive
/// calls is the caller's responsibility.
#[derive(Debug, Default)]
pub struct BlockSet {
    sequences: Vec<Arc<Sequence>>,
    fragments: Arena<FragmentId, Fragment>,
    blocks: Arena<BlockId, Block>,
    bsas: IndexMap<String, BlockSetAlignment>,
}

impl BlockSet {
    pub fn new() -> BlockSet {
        BlockSet::default()
    }

    // ----- sequences -----

    pub fn add_sequence(&mut self, seq: Arc<Sequence>) {
        if !self.sequences.iter().any(|s| Arc::ptr_eq(s, &seq)) {
            self.sequences.push(seq);
        }
    }

    pub fn sequences(&self) -> &[Arc<Sequence>] {
        &self.sequences
    }

    pub fn sequence_by_name(&self, name: &str) -> Option<&Arc<Sequence>> {
        self.sequences.iter().find(|s| s.name() == name)
    }

    // ----- blocks -----

    pub fn insert_block(&mut self, block: Block) -> BlockId {
        debug_assert!(block.is_empty(), "use insert_with_fragments");
        self.blocks.insert(block)
    }

    /// Insert a block together with its fragment values.
    pub fn insert_with_fragments(
        &mut self,
        block: Block,
        fragments: Vec<Fragment>,
    ) -> BlockId {
        let id = self.blocks.insert(block);
        for fragment in fragments {
            self.insert_fragment(id, fragment);
        }
        id
    }

    /// Remove the block, destroying the fragments it owns.
    pub fn remove_block(&mut self, id: BlockId) {
        if let Some(block) = self.blocks.remove(id) {
            for fid in block.fragment_ids() {
                let owned = self
                    .fragments
                    .get(*fid)
                    .map(|f| f.block == Some(id))
                    .unwrap_or(false);
                if owned {
                    self.disconnect(*fid);
                    self.fragments.remove(*fid);
                }
            }
        }
    }

    /// Remove all fragments of the block, destroying the owned ones.
    pub fn clear_block(&mut self, id: BlockId) {
        let fids = match self.blocks.get_mut(id) {
            Some(block) => block.drain(),
            None => return,
        };
        for fid in fids {
            let owned = self
                .fragments
                .get(fid)
                .map(|f| f.block == Some(id))
                .unwrap_or(false);
            if owned {
                self.disconnect(fid);
                self.fragments.remove(fid);
            }
        }
    }

    /// Extract the block with its fragment values, for moving between
    /// blocksets (detach, then insert into the destination).
    pub fn detach_block(&mut self, id: BlockId) -> Option<(Block, Vec<Fragment>)> {
        let mut block = self.blocks.remove(id)?;
        let mut values = Vec::with_capacity(block.size());
        for fid in block.drain() {
            self.disconnect(fid);
            if let Some(mut fragment) = self.fragments.remove(fid) {
                fragment.block = None;
                fragment.prev = None;
                fragment.next = None;
                values.push(fragment);
            }
        }
        Some((block, values))
    }

    pub fn clear_blocks(&mut self) {
        self.blocks.clear();
        self.fragments.clear();
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn size(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Snapshot of block ids, safe to hold while mutating.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.ids().collect()
    }

    pub fn blocks_sorted_by_name(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .sorted_by(|a, b| a.1.name().cmp(b.1.name()))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn view(&self, id: BlockId) -> BlockView<'_> {
        BlockView { bs: self, id, block: self.blocks.get(id).expect("block") }
    }

    // ----- fragments -----

    pub fn fragment(&self, id: FragmentId) -> &Fragment {
        self.fragments.get(id).expect("fragment")
    }

    pub fn try_fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id)
    }

    pub fn fragment_mut(&mut self, id: FragmentId) -> &mut Fragment {
        self.fragments.get_mut(id).expect("fragment")
    }

    pub fn fragment_ids(&self) -> Vec<FragmentId> {
        self.fragments.ids().collect()
    }

    /// Add a fresh fragment value to the block. The fragment is parented to
    /// the block (orphans are parented even by weak blocks) and its
    /// sequence is registered.
    pub fn insert_fragment(
        &mut self,
        block_id: BlockId,
        mut fragment: Fragment,
    ) -> FragmentId {
        self.add_sequence(fragment.seq().clone());
        fragment.block = Some(block_id);
        let fid = self.fragments.insert(fragment);
        self.blocks.get_mut(block_id).expect("block").push(fid);
        fid
    }

    /// Put an existing fragment into another block. Inserting into a
    /// non-weak block reparents the fragment and leaves its previous owner
    /// weak.
    pub fn attach_fragment(&mut self, block_id: BlockId, fid: FragmentId) {
        let target_weak =
            self.blocks.get(block_id).map(|b| b.weak()).unwrap_or(false);
        let old_owner = self.fragments.get(fid).and_then(|f| f.block);
        if !target_weak || old_owner.is_none() {
            if let Some(old) = old_owner.filter(|old| *old != block_id) {
                if let Some(old_block) = self.blocks.get_mut(old) {
                    old_block.set_weak(true);
                }
            }
            self.fragments.get_mut(fid).expect("fragment").block =
                Some(block_id);
        }
        self.blocks.get_mut(block_id).expect("block").push(fid);
    }

    /// Remove the fragment from the block; a fragment owned by the block is
    /// destroyed.
    pub fn erase_fragment(&mut self, block_id: BlockId, fid: FragmentId) {
        if let Some(block) = self.blocks.get_mut(block_id) {
            block.pull(fid);
        }
        let owned = self
            .fragments
            .get(fid)
            .map(|f| f.block == Some(block_id))
            .unwrap_or(false);
        if owned {
            self.disconnect(fid);
            self.fragments.remove(fid);
        }
    }

    /// Remove the fragment from the block without destroying it.
    pub fn detach_fragment(&mut self, block_id: BlockId, fid: FragmentId) {
        if let Some(block) = self.blocks.get_mut(block_id) {
            block.pull(fid);
        }
        if let Some(fragment) = self.fragments.get_mut(fid) {
            if fragment.block == Some(block_id) {
                fragment.block = None;
            }
        }
    }

    // ----- neighbours -----

    pub fn next_of(&self, fid: FragmentId) -> Option<FragmentId> {
        self.fragments.get(fid).and_then(|f| f.next)
    }

    pub fn prev_of(&self, fid: FragmentId) -> Option<FragmentId> {
        self.fragments.get(fid).and_then(|f| f.prev)
    }

    pub fn neighbour(&self, fid: FragmentId, ori: Ori) -> Option<FragmentId> {
        match ori {
            Ori::Forward => self.next_of(fid),
            Ori::Reverse => self.prev_of(fid),
        }
    }

    /// Neighbour in the fragment's own reading direction.
    pub fn logical_neighbour(
        &self,
        fid: FragmentId,
        ori: Ori,
    ) -> Option<FragmentId> {
        self.neighbour(fid, self.fragment(fid).ori().times(ori))
    }

    pub fn is_neighbour(&self, fid: FragmentId, other: FragmentId) -> bool {
        self.prev_of(fid) == Some(other) || self.next_of(fid) == Some(other)
    }

    /// Link `first -> second`, detaching any previous links that would
    /// break symmetry.
    pub fn connect(&mut self, first: FragmentId, second: FragmentId) {
        if self.next_of(first) != Some(second) {
            if let Some(old_next) = self.next_of(first) {
                self.fragments.get_mut(old_next).expect("fragment").prev =
                    None;
            }
            if let Some(old_prev) = self.prev_of(second) {
                self.fragments.get_mut(old_prev).expect("fragment").next =
                    None;
            }
        }
        self.fragments.get_mut(first).expect("fragment").next = Some(second);
        self.fragments.get_mut(second).expect("fragment").prev = Some(first);
    }

    pub fn disconnect(&mut self, fid: FragmentId) {
        if let Some(next) = self.next_of(fid) {
            self.fragments.get_mut(next).expect("fragment").prev = None;
        }
        if let Some(prev) = self.prev_of(fid) {
            self.fragments.get_mut(prev).expect("fragment").next = None;
        }
        let f = self.fragments.get_mut(fid).expect("fragment");
        f.prev = None;
        f.next = None;
    }

    /// Swap the chain positions of two fragments.
    pub fn rearrange_with(&mut self, fid: FragmentId, other: FragmentId) {
        let this_prev = self.prev_of(fid);
        let this_next = self.next_of(fid);
        let other_prev = self.prev_of(other);
        let other_next = self.next_of(other);
        if let Some(p) = this_prev.filter(|p| *p != other) {
            self.connect(p, other);
        }
        if let Some(n) = this_next.filter(|n| *n != other) {
            self.connect(other, n);
        }
        if let Some(p) = other_prev.filter(|p| *p != fid) {
            self.connect(p, fid);
        }
        if let Some(n) = other_next.filter(|n| *n != fid) {
            self.connect(fid, n);
        }
        if this_next == Some(other) {
            self.connect(other, fid);
        }
        if other_next == Some(fid) {
            self.connect(fid, other);
        }
    }

    /// Bubble the fragment along its chain until the neighbour order agrees
    /// with the coordinate order.
    pub fn find_place(&mut self, fid: FragmentId) {
        for ori in [Ori::Reverse, Ori::Forward] {
            while let Some(n) = self.neighbour(fid, ori) {
                let f_key = self.fragment(fid).key();
                let n_key = self.fragment(n).key();
                let misplaced = match ori {
                    Ori::Forward => n_key < f_key,
                    Ori::Reverse => f_key < n_key,
                };
                if misplaced {
                    self.rearrange_with(fid, n);
                } else {
                    break;
                }
            }
        }
    }

    /// Drop all links and rebuild chains per sequence in coordinate order.
    pub fn connect_all(&mut self) {
        let mut per_seq: FxHashMap<SeqRef, Vec<FragmentId>> =
            FxHashMap::default();
        let ids: Vec<FragmentId> = self.fragments.ids().collect();
        for fid in &ids {
            let f = self.fragments.get_mut(*fid).expect("fragment");
            f.prev = None;
            f.next = None;
            per_seq
                .entry(SeqRef(f.seq().clone()))
                .or_default()
                .push(*fid);
        }
        for (_, mut fids) in per_seq {
            fids.sort_by_key(|fid| self.fragment(*fid).key());
            for (a, b) in fids.iter().tuple_windows() {
                self.connect(*a, *b);
            }
        }
    }

    /// Fragments are mergeable when they sit back to back on one strand
    /// of one sequence.
    pub fn can_merge(&self, one: FragmentId, another: FragmentId) -> bool {
        let a = self.fragment(one);
        let b = self.fragment(another);
        a.same_seq(b)
            && a.ori() == b.ori()
            && (a.min_pos() == b.max_pos() + 1
                || b.min_pos() == a.max_pos() + 1)
    }

    /// Largest shift of the fragment's logical end: up to the sequence
    /// boundary, or up to `allowed_overlap` positions into the next
    /// neighbour.
    pub fn max_shift_end(&self, fid: FragmentId, allowed_overlap: i64) -> i64 {
        let f = self.fragment(fid);
        let to_boundary = match f.ori() {
            Ori::Forward => (f.seq().size() - 1 - f.max_pos()) as i64,
            Ori::Reverse => f.min_pos() as i64,
        };
        match self.logical_neighbour(fid, Ori::Forward) {
            None => to_boundary,
            Some(nid) => {
                let n = self.fragment(nid);
                let to_neighbour = match f.ori() {
                    Ori::Forward => {
                        n.min_pos() as i64 - f.max_pos() as i64 - 1
                    }
                    Ori::Reverse => {
                        f.min_pos() as i64 - n.max_pos() as i64 - 1
                    }
                };
                (to_neighbour + allowed_overlap).min(to_boundary)
            }
        }
    }

    // ----- block set alignments -----

    pub fn add_bsa(&mut self, name: &str, bsa: BlockSetAlignment) {
        self.bsas.insert(name.to_owned(), bsa);
    }

    pub fn bsa(&self, name: &str) -> Option<&BlockSetAlignment> {
        self.bsas.get(name)
    }

    pub fn bsas(&self) -> &IndexMap<String, BlockSetAlignment> {
        &self.bsas
    }
}

/// Read access to a block and the fragments behind its ids.
#[derive(Clone, Copy)]
pub struct BlockView<'a> {
    pub bs: &'a BlockSet,
    pub id: BlockId,
    pub block: &'a Block,
}

impl<'a> BlockView<'a> {
    pub fn name(&self) -> &str {
        self.block.name()
    }

    pub fn size(&self) -> usize {
        self.block.size()
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    pub fn fragments(
        &self,
    ) -> impl Iterator<Item = (FragmentId, &'a Fragment)> + '_ {
        self.block
            .fragment_ids()
            .iter()
            .map(|fid| (*fid, self.bs.fragment(*fid)))
    }

    pub fn front(&self) -> Option<&'a Fragment> {
        self.block.front().map(|fid| self.bs.fragment(fid))
    }

    /// Length of the alignment. Fragments without a row contribute their
    /// own length.
    pub fn alignment_length(&self) -> usize {
        self.fragments()
            .map(|(_, f)| match f.row() {
                Some(row) => row.length(),
                None => f.length(),
            })
            .max()
            .unwrap_or(0)
    }

    /// Most frequent letter of the column, `gap` for pure-gap columns.
    pub fn consensus_char(&self, col: usize, gap: u8) -> u8 {
        let mut counts = [0usize; 4];
        for (_, f) in self.fragments() {
            if let Some(c) = f.alignment_at(col) {
                counts[crate::sequence::char_to_code(c) as usize] += 1;
            }
        }
        match counts.iter().enumerate().max_by_key(|(_, n)| **n) {
            Some((code, n)) if *n > 0 => {
                crate::sequence::code_to_char(code as u64)
            }
            _ => gap,
        }
    }

    pub fn consensus_string(&self) -> String {
        let length = self.alignment_length();
        (0..length)
            .map(|col| self.consensus_char(col, b'n') as char)
            .collect()
    }

    /// The fragment's text padded with `-` to the alignment length.
    pub fn aligned_string(&self, fid: FragmentId) -> String {
        let f = self.bs.fragment(fid);
        let length = self.alignment_length();
        (0..length)
            .map(|col| f.alignment_at(col).map(|c| c as char).unwrap_or('-'))
            .collect()
    }

    pub fn alignment_rows(&self) -> usize {
        self.fragments().filter(|(_, f)| f.row().is_some()).count()
    }

    /// Proportion of identical columns, gapped identical columns count
    /// half.
    pub fn identity(&self) -> f64 {
        let stat = make_stat(self, 0, None);
        block_identity(&stat)
    }
}

#[cfg(test)]
mod block_set_tests {
    use super::*;
    use crate::sequence::Sequence;

    fn bs_with_chain() -> (BlockSet, Vec<FragmentId>) {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let block = bs.insert_block(Block::named("b1"));
        let fids: Vec<FragmentId> = [(0, 2), (4, 6), (8, 10)]
            .iter()
            .map(|(lo, hi)| {
                bs.insert_fragment(
                    block,
                    Fragment::forward(seq.clone(), *lo, *hi),
                )
            })
            .collect();
        (bs, fids)
    }

    #[test]
    fn test_connect_symmetry() {
        let (mut bs, fids) = bs_with_chain();
        bs.connect(fids[0], fids[1]);
        bs.connect(fids[1], fids[2]);
        assert_eq!(bs.next_of(fids[0]), Some(fids[1]));
        assert_eq!(bs.prev_of(fids[1]), Some(fids[0]));
        assert_eq!(bs.neighbour(fids[1], Ori::Forward), Some(fids[2]));
        assert_eq!(bs.neighbour(fids[1], Ori::Reverse), Some(fids[0]));
        assert!(bs.is_neighbour(fids[1], fids[0]));
        assert!(!bs.is_neighbour(fids[0], fids[2]));
        bs.disconnect(fids[1]);
        assert_eq!(bs.next_of(fids[0]), None);
        assert_eq!(bs.prev_of(fids[2]), None);
    }

    #[test]
    fn test_connect_all_orders_by_coordinates() {
        let (mut bs, fids) = bs_with_chain();
        bs.connect_all();
        assert_eq!(bs.prev_of(fids[0]), None);
        assert_eq!(bs.next_of(fids[0]), Some(fids[1]));
        assert_eq!(bs.next_of(fids[1]), Some(fids[2]));
        assert_eq!(bs.next_of(fids[2]), None);
    }

    #[test]
    fn test_rearrange_with_adjacent_pairs() {
        // swapping already-adjacent fragments, in both orders
        for flip in [false, true] {
            let (mut bs, fids) = bs_with_chain();
            bs.connect_all();
            let (a, b) =
                if flip { (fids[1], fids[0]) } else { (fids[0], fids[1]) };
            bs.rearrange_with(a, b);
            // chain order of the pair is swapped, symmetry preserved
            assert_eq!(bs.prev_of(fids[1]), None);
            assert_eq!(bs.next_of(fids[1]), Some(fids[0]));
            assert_eq!(bs.prev_of(fids[0]), Some(fids[1]));
            assert_eq!(bs.next_of(fids[0]), Some(fids[2]));
            assert_eq!(bs.prev_of(fids[2]), Some(fids[0]));
        }
    }

    #[test]
    fn test_find_place_restores_order() {
        let (mut bs, fids) = bs_with_chain();
        // build a wrong chain and let find_place fix the middle element
        bs.connect(fids[1], fids[0]);
        bs.connect(fids[0], fids[2]);
        bs.find_place(fids[0]);
        assert_eq!(bs.next_of(fids[0]), Some(fids[1]));
        assert_eq!(bs.next_of(fids[1]), Some(fids[2]));
    }

    #[test]
    fn test_reparenting_marks_old_block_weak() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b1 = bs.insert_block(Block::named("b1"));
        let fid = bs.insert_fragment(b1, Fragment::forward(seq, 0, 5));
        let b2 = bs.insert_block(Block::named("b2"));
        bs.attach_fragment(b2, fid);
        assert!(bs.block(b1).unwrap().weak());
        assert!(!bs.block(b2).unwrap().weak());
        assert_eq!(bs.fragment(fid).block, Some(b2));
        // erasing from the weak view does not destroy the fragment
        bs.erase_fragment(b1, fid);
        assert!(bs.try_fragment(fid).is_some());
        // detaching orphans the fragment without destroying it
        bs.detach_fragment(b2, fid);
        assert!(bs.try_fragment(fid).is_some());
        assert_eq!(bs.fragment(fid).block, None);
        bs.attach_fragment(b2, fid);
        // erasing from the owner does destroy
        bs.erase_fragment(b2, fid);
        assert!(bs.try_fragment(fid).is_none());
    }

    #[test]
    fn test_detach_block_moves_values() {
        let (mut bs, _) = bs_with_chain();
        let id = bs.block_ids()[0];
        let (block, fragments) = bs.detach_block(id).unwrap();
        assert_eq!(block.name(), "b1");
        assert_eq!(fragments.len(), 3);
        assert!(bs.is_empty());
        let mut dest = BlockSet::new();
        dest.insert_with_fragments(block, fragments);
        assert_eq!(dest.size(), 1);
        assert_eq!(dest.view(dest.block_ids()[0]).size(), 3);
    }

    #[test]
    fn test_can_merge_requires_adjacency_and_strand() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b = bs.insert_block(Block::named("b"));
        let left = bs.insert_fragment(b, Fragment::forward(seq.clone(), 0, 2));
        let flush = bs.insert_fragment(b, Fragment::forward(seq.clone(), 3, 6));
        let gap = bs.insert_fragment(b, Fragment::forward(seq.clone(), 8, 9));
        let reverse = bs.insert_fragment(
            b,
            Fragment::new(seq.clone(), 10, 12, Ori::Reverse),
        );
        assert!(bs.can_merge(left, flush));
        assert!(bs.can_merge(flush, left));
        assert!(!bs.can_merge(flush, gap));
        assert!(!bs.can_merge(gap, reverse));
    }

    #[test]
    fn test_max_shift_end() {
        let (mut bs, fids) = bs_with_chain();
        bs.connect_all();
        // forward fragment (0,2): next neighbour starts at 4
        assert_eq!(bs.max_shift_end(fids[0], 0), 1);
        assert_eq!(bs.max_shift_end(fids[0], 2), 3);
        // last fragment is limited by the sequence end (size 18)
        assert_eq!(bs.max_shift_end(fids[2], 0), 7);
    }

    #[test]
    fn test_consensus_and_alignment_length() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b = bs.insert_block(Block::named("b"));
        bs.insert_fragment(b, Fragment::forward(seq.clone(), 0, 2));
        bs.insert_fragment(b, Fragment::forward(seq.clone(), 3, 5));
        let view = bs.view(b);
        assert_eq!(view.alignment_length(), 3);
        // columns: t/t g/c g/c; ties go to the highest letter code
        assert_eq!(view.consensus_string(), "tcc");
    }
}
