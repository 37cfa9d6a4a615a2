use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::block::BlockId;
use crate::block_set::BlockSet;
use crate::fragment::{Fragment, FragmentId};
use crate::sequence::{SeqRef, Sequence};
use crate::util::{Ori, Pos};

/// Entry of a collection: fragment coordinates plus a caller payload.
/// Ordering is `(min_pos, max_pos, ori, payload)`; `P::default()` must be
/// the smallest payload so that probes land before equal coordinates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Item<P> {
    pub min_pos: Pos,
    pub max_pos: Pos,
    pub ori: Ori,
    pub payload: P,
}

impl<P> Item<P> {
    pub fn common_positions(&self, min_pos: Pos, max_pos: Pos) -> usize {
        let max_min = self.min_pos.max(min_pos);
        let min_max = self.max_pos.min(max_pos);
        if max_min <= min_max {
            min_max - max_min + 1
        } else {
            0
        }
    }

    pub fn contains(&self, min_pos: Pos, max_pos: Pos) -> bool {
        self.min_pos <= min_pos && max_pos <= self.max_pos
    }

    fn key(&self) -> (Pos, Pos, Ori) {
        (self.min_pos, self.max_pos, self.ori)
    }
}

/// Per-sequence storage of items. The sorted-vector flavour needs an
/// explicit `prepare()` after the last insertion; the set flavour is always
/// sorted.
pub trait FragmentStorage<P>: Default {
    fn insert(&mut self, item: Item<P>);
    fn prepare(&mut self) {}
    fn is_empty(&self) -> bool;
    /// Items `>= probe`, ascending.
    fn at_or_after<'a>(
        &'a self,
        probe: &Item<P>,
    ) -> Box<dyn Iterator<Item = &'a Item<P>> + 'a>;
    /// Items `< probe`, descending.
    fn before<'a>(
        &'a self,
        probe: &Item<P>,
    ) -> Box<dyn Iterator<Item = &'a Item<P>> + 'a>;
}

#[derive(Debug, Clone)]
pub struct SortedVecStorage<P> {
    items: Vec<Item<P>>,
    prepared: bool,
}

impl<P> Default for SortedVecStorage<P> {
    fn default() -> Self {
        SortedVecStorage { items: Vec::new(), prepared: true }
    }
}

impl<P: Ord + Clone + 'static> FragmentStorage<P> for SortedVecStorage<P> {
    fn insert(&mut self, item: Item<P>) {
        self.items.push(item);
        self.prepared = false;
    }

    fn prepare(&mut self) {
        self.items.sort();
        self.prepared = true;
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn at_or_after<'a>(
        &'a self,
        probe: &Item<P>,
    ) -> Box<dyn Iterator<Item = &'a Item<P>> + 'a> {
        debug_assert!(self.prepared, "prepare() missing");
        let start = self.items.partition_point(|i| i < probe);
        Box::new(self.items[start..].iter())
    }

    fn before<'a>(
        &'a self,
        probe: &Item<P>,
    ) -> Box<dyn Iterator<Item = &'a Item<P>> + 'a> {
        debug_assert!(self.prepared, "prepare() missing");
        let start = self.items.partition_point(|i| i < probe);
        Box::new(self.items[..start].iter().rev())
    }
}

#[derive(Debug, Clone)]
pub struct SetStorage<P: Ord> {
    items: BTreeSet<Item<P>>,
}

impl<P: Ord> Default for SetStorage<P> {
    fn default() -> Self {
        SetStorage { items: BTreeSet::new() }
    }
}

impl<P: Ord + Clone + 'static> FragmentStorage<P> for SetStorage<P> {
    fn insert(&mut self, item: Item<P>) {
        self.items.insert(item);
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn at_or_after<'a>(
        &'a self,
        probe: &Item<P>,
    ) -> Box<dyn Iterator<Item = &'a Item<P>> + 'a> {
        Box::new(self.items.range(probe.clone()..))
    }

    fn before<'a>(
        &'a self,
        probe: &Item<P>,
    ) -> Box<dyn Iterator<Item = &'a Item<P>> + 'a> {
        Box::new(self.items.range(..probe.clone()).rev())
    }
}

/// Per-sequence sorted index of fragments supporting overlap and neighbour
/// queries.
#[derive(Debug, Clone)]
pub struct FragmentCollection<P, S> {
    data: FxHashMap<SeqRef, S>,
    _payload: PhantomData<P>,
}

pub type VecCollection<P = ()> = FragmentCollection<P, SortedVecStorage<P>>;
pub type SetCollection<P = ()> = FragmentCollection<P, SetStorage<P>>;

impl<P, S: Default> Default for FragmentCollection<P, S> {
    fn default() -> Self {
        FragmentCollection { data: FxHashMap::default(), _payload: PhantomData }
    }
}

impl<P, S> FragmentCollection<P, S>
where
    P: Ord + Clone + Default + 'static,
    S: FragmentStorage<P>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        seq: &Arc<Sequence>,
        min_pos: Pos,
        max_pos: Pos,
        ori: Ori,
        payload: P,
    ) {
        self.data
            .entry(SeqRef(seq.clone()))
            .or_default()
            .insert(Item { min_pos, max_pos, ori, payload });
    }

    pub fn add_fragment(&mut self, fragment: &Fragment, payload: P) {
        self.add(
            fragment.seq(),
            fragment.min_pos(),
            fragment.max_pos(),
            fragment.ori(),
            payload,
        );
    }

    /// Sort the vector-backed containers. A no-op for set storage.
    pub fn prepare(&mut self) {
        for storage in self.data.values_mut() {
            storage.prepare();
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn probe(min_pos: Pos, max_pos: Pos, ori: Ori) -> Item<P> {
        Item { min_pos, max_pos, ori, payload: P::default() }
    }

    pub fn has_overlap_at(
        &self,
        seq: &Arc<Sequence>,
        min_pos: Pos,
        max_pos: Pos,
    ) -> bool {
        let storage = match self.data.get(&SeqRef(seq.clone())) {
            Some(storage) => storage,
            None => return false,
        };
        let probe = Self::probe(min_pos, max_pos, Ori::Reverse);
        if let Some(item) = storage.at_or_after(&probe).next() {
            if item.common_positions(min_pos, max_pos) > 0 {
                return true;
            }
        }
        if let Some(item) = storage.before(&probe).next() {
            if item.common_positions(min_pos, max_pos) > 0 {
                return true;
            }
        }
        false
    }

    pub fn has_overlap(&self, fragment: &Fragment) -> bool {
        self.has_overlap_at(
            fragment.seq(),
            fragment.min_pos(),
            fragment.max_pos(),
        )
    }

    /// Items overlapping `[min_pos, max_pos]`, walking out from the
    /// insertion point while positions are shared.
    pub fn find_overlaps_at(
        &self,
        seq: &Arc<Sequence>,
        min_pos: Pos,
        max_pos: Pos,
    ) -> Vec<&Item<P>> {
        let mut result = Vec::new();
        let storage = match self.data.get(&SeqRef(seq.clone())) {
            Some(storage) => storage,
            None => return result,
        };
        let probe = Self::probe(min_pos, max_pos, Ori::Reverse);
        for item in storage.at_or_after(&probe) {
            if item.common_positions(min_pos, max_pos) > 0 {
                result.push(item);
            } else {
                break;
            }
        }
        for item in storage.before(&probe) {
            if item.common_positions(min_pos, max_pos) > 0 {
                result.push(item);
            } else {
                break;
            }
        }
        result
    }

    pub fn find_overlaps(&self, fragment: &Fragment) -> Vec<&Item<P>> {
        self.find_overlaps_at(
            fragment.seq(),
            fragment.min_pos(),
            fragment.max_pos(),
        )
    }

    /// The adjacent item in sorted order on the same sequence, skipping
    /// items with the same coordinates.
    pub fn neighbor(
        &self,
        seq: &Arc<Sequence>,
        min_pos: Pos,
        max_pos: Pos,
        ori: Ori,
        direction: Ori,
    ) -> Option<&Item<P>> {
        let storage = self.data.get(&SeqRef(seq.clone()))?;
        let probe = Self::probe(min_pos, max_pos, ori);
        let key = probe.key();
        match direction {
            Ori::Forward => {
                storage.at_or_after(&probe).find(|i| i.key() != key)
            }
            Ori::Reverse => storage.before(&probe).find(|i| i.key() != key),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.values().all(|s| s.is_empty())
    }
}

impl<S> FragmentCollection<FragmentId, S>
where
    S: FragmentStorage<FragmentId>,
{
    pub fn add_block(&mut self, bs: &BlockSet, block_id: BlockId) {
        let block = bs.block(block_id).expect("block");
        for fid in block.fragment_ids() {
            self.add_fragment(bs.fragment(*fid), *fid);
        }
    }

    pub fn add_bs(&mut self, bs: &BlockSet) {
        for block_id in bs.block_ids() {
            self.add_block(bs, block_id);
        }
    }
}

#[cfg(test)]
mod fragment_collection_tests {
    use super::*;
    use crate::sequence::Sequence;

    fn seq() -> Arc<Sequence> {
        Sequence::in_memory("s1", "tggtccgagcggacggcctggtccgagcggacggcc")
    }

    fn filled<S: FragmentStorage<()>>() -> (Arc<Sequence>, FragmentCollection<(), S>)
    {
        let s = seq();
        let mut fc: FragmentCollection<(), S> = FragmentCollection::new();
        for (lo, hi) in [(0, 4), (5, 9), (12, 20)] {
            fc.add(&s, lo, hi, Ori::Forward, ());
        }
        fc.prepare();
        (s, fc)
    }

    fn check_queries<S: FragmentStorage<()>>() {
        let (s, fc) = filled::<S>();
        assert!(fc.has_overlap_at(&s, 3, 6));
        assert!(fc.has_overlap_at(&s, 9, 9));
        assert!(!fc.has_overlap_at(&s, 10, 11));
        assert!(!fc.has_overlap_at(&s, 21, 30));
        let hits = fc.find_overlaps_at(&s, 4, 13);
        assert_eq!(hits.len(), 3);
        let other = Sequence::in_memory("s2", "atgc");
        assert!(!fc.has_overlap_at(&other, 0, 3));
    }

    fn check_neighbors<S: FragmentStorage<()>>() {
        let (s, fc) = filled::<S>();
        let next =
            fc.neighbor(&s, 5, 9, Ori::Forward, Ori::Forward).unwrap();
        assert_eq!((next.min_pos, next.max_pos), (12, 20));
        let prev =
            fc.neighbor(&s, 5, 9, Ori::Forward, Ori::Reverse).unwrap();
        assert_eq!((prev.min_pos, prev.max_pos), (0, 4));
        assert!(fc.neighbor(&s, 0, 4, Ori::Forward, Ori::Reverse).is_none());
    }

    #[test]
    fn test_sorted_vec_storage() {
        check_queries::<SortedVecStorage<()>>();
        check_neighbors::<SortedVecStorage<()>>();
    }

    #[test]
    fn test_set_storage() {
        check_queries::<SetStorage<()>>();
        check_neighbors::<SetStorage<()>>();
    }
}
