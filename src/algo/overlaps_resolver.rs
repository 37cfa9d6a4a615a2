//! Graph-based splitting of overlapping fragments.
//!
//! Fragment boundaries are projected through the input blocks' alignments
//! until a fixpoint is reached, candidate fragments are formed between
//! consecutive boundaries, linked where the boundary projections agree,
//! and connected components of the confirmed links become output blocks.
//! The output never places two fragments on shared positions of one
//! sequence, and every surviving column traces back to an input block.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::alignment_row::AlignmentRow;
use crate::block::Block;
use crate::block_set::BlockSet;
use crate::boundaries::{
    has_nearby, nearest_element, sort_unique, stick_boundaries, Boundaries,
};
use crate::errs::PanResult;
use crate::graph::Graph;
use crate::proc::{ProcState, Processor, Workspace};
use crate::sequence::SeqRef;
use crate::util::{Ori, Pos};

type Point = (SeqRef, Pos);
type Span = (SeqRef, Pos, Pos);
type PointsGraph = Graph<Point, ()>;
type FragmentGraph = Graph<Span, Ori>;
type SeqBoundaries = BTreeMap<SeqRef, Boundaries>;

#[derive(Debug, Clone)]
struct InFragment {
    seq: SeqRef,
    min_pos: Pos,
    max_pos: Pos,
    ori: Ori,
    row: Option<AlignmentRow>,
}

impl InFragment {
    fn length(&self) -> usize {
        self.max_pos - self.min_pos + 1
    }

    fn usable_row(&self) -> Option<&AlignmentRow> {
        self.row
            .as_ref()
            .filter(|row| row.fragment_length() == self.length())
    }

    /// Sequence boundary (cut before `pos`) to fragment boundary.
    fn seq_to_frag(&self, pos: Pos) -> Option<usize> {
        if pos < self.min_pos || pos > self.max_pos + 1 {
            return None;
        }
        Some(match self.ori {
            Ori::Forward => pos - self.min_pos,
            Ori::Reverse => self.max_pos + 1 - pos,
        })
    }

    fn frag_to_seq(&self, boundary: usize) -> Pos {
        match self.ori {
            Ori::Forward => self.min_pos + boundary,
            Ori::Reverse => self.max_pos + 1 - boundary,
        }
    }

    fn frag_to_col(&self, boundary: usize, block_length: usize) -> usize {
        match self.usable_row() {
            Some(row) => row.map_to_alignment(boundary),
            None => boundary * block_length / self.length(),
        }
    }

    fn col_to_frag(&self, col: usize, block_length: usize) -> usize {
        match self.usable_row() {
            Some(row) => row.fragment_boundary(col.min(row.length())),
            None => {
                (col.min(block_length) * self.length()) / block_length.max(1)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct InBlock {
    fragments: Vec<InFragment>,
    length: usize,
}

fn snapshot(bs: &BlockSet, min_distance: Pos) -> Vec<InBlock> {
    let mut blocks: Vec<InBlock> = bs
        .block_ids()
        .into_iter()
        .map(|id| {
            let view = bs.view(id);
            InBlock {
                length: view.alignment_length(),
                fragments: view
                    .fragments()
                    .map(|(_, f)| InFragment {
                        seq: SeqRef(f.seq().clone()),
                        min_pos: f.min_pos(),
                        max_pos: f.max_pos(),
                        ori: f.ori(),
                        row: f.row().cloned(),
                    })
                    .collect(),
            }
        })
        .collect();
    if min_distance > 1 {
        let sticked = boundaries_of(&blocks, min_distance);
        for block in &mut blocks {
            block.fragments.retain_mut(|f| {
                let b = &sticked[&f.seq];
                let new_min = nearest_element(b, f.min_pos);
                let new_max_bound = nearest_element(b, f.max_pos + 1);
                if new_min != f.min_pos || new_max_bound != f.max_pos + 1 {
                    f.row = None;
                }
                if new_max_bound <= new_min {
                    return false;
                }
                f.min_pos = new_min;
                f.max_pos = new_max_bound - 1;
                true
            });
            block.length =
                block.fragments.iter().map(|f| f.length()).max().unwrap_or(0);
        }
        blocks.retain(|b| !b.fragments.is_empty());
    }
    blocks
}

fn boundaries_of(blocks: &[InBlock], min_distance: Pos) -> SeqBoundaries {
    let mut sb = SeqBoundaries::new();
    for block in blocks {
        for f in &block.fragments {
            let b = sb.entry(f.seq.clone()).or_default();
            b.push(f.min_pos);
            b.push(f.max_pos + 1);
        }
    }
    for b in sb.values_mut() {
        stick_boundaries(b, min_distance);
    }
    sb
}

/// Map every boundary of `expand_sb` that falls inside a fragment of the
/// block to the matching boundary on every other fragment.
fn add_edges(graph: &mut PointsGraph, block: &InBlock, expand_sb: &SeqBoundaries) {
    for (from_index, from) in block.fragments.iter().enumerate() {
        let boundaries = match expand_sb.get(&from.seq) {
            Some(b) => b,
            None => continue,
        };
        let lo = boundaries.partition_point(|p| *p < from.min_pos);
        let hi = boundaries.partition_point(|p| *p <= from.max_pos + 1);
        for p in &boundaries[lo..hi] {
            let boundary = match from.seq_to_frag(*p) {
                Some(boundary) => boundary,
                None => continue,
            };
            let col = from.frag_to_col(boundary, block.length);
            for (to_index, to) in block.fragments.iter().enumerate() {
                if to_index == from_index && block.fragments.len() > 1 {
                    continue;
                }
                let to_boundary = to.col_to_frag(col, block.length);
                let q = to.frag_to_seq(to_boundary);
                graph.push(
                    (from.seq.clone(), *p),
                    (to.seq.clone(), q),
                    (),
                );
            }
        }
    }
}

fn build_point_graph(
    input: &[InBlock],
    min_distance: Pos,
) -> (PointsGraph, SeqBoundaries) {
    let mut all_sb = boundaries_of(input, min_distance);
    let mut graph = PointsGraph::new();
    let mut expand_sb = all_sb.clone();
    while !expand_sb.is_empty() {
        let mut new_g = PointsGraph::new();
        for block in input {
            add_edges(&mut new_g, block, &expand_sb);
        }
        // destinations not close to a known boundary are the next wave
        let mut next_sb = SeqBoundaries::new();
        for (_, to, _) in new_g.edges() {
            let known = all_sb
                .get(&to.0)
                .map(|b| has_nearby(b, to.1, min_distance))
                .unwrap_or(false);
            let pending = next_sb
                .get(&to.0)
                .map(|b: &Boundaries| b.contains(&to.1))
                .unwrap_or(false);
            if !known && !pending {
                next_sb.entry(to.0.clone()).or_default().push(to.1);
            }
        }
        for (seq, b) in &mut next_sb {
            sort_unique(b);
            all_sb.entry(seq.clone()).or_default().extend(b.iter());
        }
        for b in all_sb.values_mut() {
            stick_boundaries(b, min_distance);
        }
        graph.extend_from(new_g);
        if next_sb.values().all(|b| b.is_empty()) {
            break;
        }
        expand_sb = next_sb;
    }
    // snap all endpoints onto the final boundary set
    for edge in graph.edges_mut() {
        edge.0 .1 = nearest_element(&all_sb[&edge.0 .0], edge.0 .1);
        edge.1 .1 = nearest_element(&all_sb[&edge.1 .0], edge.1 .1);
    }
    graph.symmetrize();
    (graph, all_sb)
}

fn neighbour_point(
    all_sb: &SeqBoundaries,
    point: &Point,
    dir: Ori,
) -> Option<Point> {
    let b = all_sb.get(&point.0)?;
    let index = b.binary_search(&point.1).ok()?;
    match dir {
        Ori::Forward => {
            b.get(index + 1).map(|p| (point.0.clone(), *p))
        }
        Ori::Reverse => {
            index.checked_sub(1).map(|i| (point.0.clone(), b[i]))
        }
    }
}

fn build_fragment_graph(
    all_sb: &SeqBoundaries,
    pg: &PointsGraph,
) -> FragmentGraph {
    let mut fg = FragmentGraph::new();
    for (seq, boundaries) in all_sb {
        for pair in boundaries.windows(2) {
            let (min_point, max_point) = (pair[0], pair[1]);
            let candidate: Span = (seq.clone(), min_point, max_point - 1);
            let max_friends: FxHashSet<Point> = pg
                .connected_with(&(seq.clone(), max_point))
                .iter()
                .map(|(_, to, _)| to.clone())
                .collect();
            for (_, q, _) in pg.connected_with(&(seq.clone(), min_point)) {
                for dir in [Ori::Forward, Ori::Reverse] {
                    let n = match neighbour_point(all_sb, q, dir) {
                        Some(n) => n,
                        None => continue,
                    };
                    if !max_friends.contains(&n) {
                        continue;
                    }
                    let (g_min, g_max) =
                        (q.1.min(n.1), q.1.max(n.1));
                    let other: Span = (q.0.clone(), g_min, g_max - 1);
                    fg.push(candidate.clone(), other, dir);
                }
            }
        }
    }
    fg.sort_unique();
    fg
}

/// Index of the sticked input fragments for containment lookups.
struct ContainmentIndex {
    // per sequence: fragments sorted by min_pos, and the longest length
    per_seq: FxHashMap<SeqRef, (Vec<(Pos, Pos, u32, u32)>, usize)>,
}

impl ContainmentIndex {
    fn build(input: &[InBlock]) -> ContainmentIndex {
        let mut per_seq: FxHashMap<SeqRef, (Vec<(Pos, Pos, u32, u32)>, usize)> =
            FxHashMap::default();
        for (bi, block) in input.iter().enumerate() {
            for (fi, f) in block.fragments.iter().enumerate() {
                let entry = per_seq.entry(f.seq.clone()).or_default();
                entry.0.push((f.min_pos, f.max_pos, bi as u32, fi as u32));
                entry.1 = entry.1.max(f.length());
            }
        }
        for (fragments, _) in per_seq.values_mut() {
            fragments.sort_unstable();
        }
        ContainmentIndex { per_seq }
    }

    /// Input fragments containing `[min_pos, max_pos]` of `seq`.
    fn containing(
        &self,
        seq: &SeqRef,
        min_pos: Pos,
        max_pos: Pos,
    ) -> Vec<(u32, u32)> {
        let mut result = Vec::new();
        let (fragments, max_len) = match self.per_seq.get(seq) {
            Some(entry) => entry,
            None => return result,
        };
        let window_min = min_pos.saturating_sub(*max_len);
        let lo = fragments.partition_point(|f| f.0 < window_min);
        let hi = fragments.partition_point(|f| f.0 <= min_pos);
        for (f_min, f_max, bi, fi) in &fragments[lo..hi] {
            if *f_min <= min_pos && max_pos <= *f_max {
                result.push((*bi, *fi));
            }
        }
        result
    }
}

/// Keep the edges witnessed by an input block: some block holds a
/// fragment containing one endpoint and another fragment containing the
/// other. Self-loops survive unconditionally.
fn filter_fragment_graph(fg: &mut FragmentGraph, input: &[InBlock]) {
    let index = ContainmentIndex::build(input);
    fg.edges_mut().retain(|(f, g, _)| {
        if f == g {
            return true;
        }
        for (bi, fi) in index.containing(&f.0, f.1, f.2) {
            let block = &input[bi as usize];
            for (gi, cand) in block.fragments.iter().enumerate() {
                if gi as u32 == fi {
                    continue;
                }
                if cand.seq == g.0
                    && cand.min_pos <= g.1
                    && g.2 <= cand.max_pos
                {
                    return true;
                }
            }
        }
        false
    });
    fg.sort_unique();
}

/// Connected components with orientations multiplied along the traversal
/// tree; the first vertex of each component reads forward.
fn emit_blocks(fg: &FragmentGraph) -> Vec<Vec<(SeqRef, Pos, Pos, Ori)>> {
    let mut visited: BTreeSet<Span> = BTreeSet::new();
    let mut result = Vec::new();
    for (root, _, _) in fg.edges() {
        if visited.contains(root) {
            continue;
        }
        let mut members: Vec<(SeqRef, Pos, Pos, Ori)> = Vec::new();
        let mut queue: VecDeque<(Span, Ori)> = VecDeque::new();
        visited.insert(root.clone());
        queue.push_back((root.clone(), Ori::Forward));
        while let Some((span, ori)) = queue.pop_front() {
            for (_, to, edge_ori) in fg.connected_with(&span) {
                if !visited.contains(to) {
                    visited.insert(to.clone());
                    queue.push_back((to.clone(), ori.times(*edge_ori)));
                }
            }
            members.push((span.0.clone(), span.1, span.2, ori));
        }
        result.push(members);
    }
    result
}

fn resolve(
    input: &[InBlock],
    min_distance: Pos,
) -> Vec<Vec<(SeqRef, Pos, Pos, Ori)>> {
    let (pg, all_sb) = build_point_graph(input, min_distance);
    debug_assert!(pg.is_symmetric());
    let mut fg = build_fragment_graph(&all_sb, &pg);
    filter_fragment_graph(&mut fg, input);
    debug_assert!(fg.is_symmetric());
    emit_blocks(&fg)
}

/// Replace the blocks of `bs` with non-overlapping blocks preserving the
/// homology asserted by the input blocks.
pub fn resolve_overlaps(bs: &mut BlockSet, min_distance: Pos) -> PanResult<()> {
    let min_distance = min_distance.max(1);
    let input = snapshot(bs, min_distance);
    let components = resolve(&input, min_distance);
    bs.clear_blocks();
    insert_components(bs, components);
    Ok(())
}

fn insert_components(
    bs: &mut BlockSet,
    components: Vec<Vec<(SeqRef, Pos, Pos, Ori)>>,
) {
    let n = components.len();
    for members in components {
        let fragments = members
            .into_iter()
            .map(|(seq, min_pos, max_pos, ori)| {
                crate::fragment::Fragment::new(seq.0, min_pos, max_pos, ori)
            })
            .collect();
        bs.insert_with_fragments(Block::new(), fragments);
    }
    debug!("{n} blocks after overlap resolution");
}

/// Resolve overlapping fragments: the blocks of `other` are split at
/// their shared boundaries, `target` receives the non-overlapping result.
pub struct OverlapsResolver2 {
    state: ProcState,
}

impl Default for OverlapsResolver2 {
    fn default() -> Self {
        OverlapsResolver2::new()
    }
}

impl OverlapsResolver2 {
    pub fn new() -> OverlapsResolver2 {
        let mut state = ProcState::new();
        state.opts.add_gopt(
            "min-distance",
            "Min distance between fragment boundaries",
            "MIN_DISTANCE",
        );
        state.declare_bs("other", "Blockset with overlaps");
        state.declare_bs("target", "Blockset with the resolved blocks");
        OverlapsResolver2 { state }
    }
}

impl Processor for OverlapsResolver2 {
    fn name(&self) -> &'static str {
        "Resolve overlapping fragments"
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let min_distance = self.state.opts.int("min-distance")?.max(0) as Pos;
        let other_key = self.state.slot_key("other")?;
        let target_key = self.state.slot_key("target")?;
        if other_key == target_key {
            let mut bs = ws.take(&target_key);
            let result = resolve_overlaps(&mut bs, min_distance);
            ws.put(&target_key, bs);
            return result;
        }
        let other = ws.take(&other_key);
        let input = snapshot(&other, min_distance.max(1));
        let components = resolve(&input, min_distance.max(1));
        let mut target = BlockSet::new();
        for seq in other.sequences() {
            target.add_sequence(seq.clone());
        }
        insert_components(&mut target, components);
        ws.put(&other_key, other);
        ws.put(&target_key, target);
        Ok(())
    }
}
