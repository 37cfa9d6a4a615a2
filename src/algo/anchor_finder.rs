use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::block::Block;
use crate::block_set::BlockSet;
use crate::bloom::{check_word_size, BloomFilter, RollingHash};
use crate::errs::PanResult;
use crate::fragment::{Fragment, FragmentId};
use crate::fragment_collection::VecCollection;
use crate::hit::{fix_self_overlaps, has_self_overlaps};
use crate::proc::{ProcState, Processor, Workspace};
use crate::sequence::Sequence;
use crate::util::{get_master_progress_bar, get_ticker, Ori, Pos};

/// Find exact short repeats shared between (or within) sequences.
///
/// Pass one slides a canonical k-mer hash over every sequence through a
/// bloom filter; hashes seen at least twice land in an exact candidate
/// set. Pass two collects the positions of candidate hashes, buckets them
/// and emits one block per bucket of two or more exactly equal words not
/// covered by existing fragments. A saturated filter only degrades pass
/// two's workload, never correctness.
pub struct AnchorFinder {
    state: ProcState,
}

impl Default for AnchorFinder {
    fn default() -> Self {
        AnchorFinder::new()
    }
}

impl AnchorFinder {
    pub fn new() -> AnchorFinder {
        let mut state = ProcState::new();
        state.opts.add_gopt(
            "anchor-size",
            "Length of anchor words",
            "ANCHOR_SIZE",
        );
        state.opts.add_gopt(
            "fp-rate",
            "Target false positive rate of the prefilter",
            "ANCHOR_FP_RATE",
        );
        state.declare_bs("target", "Blockset where anchors are added");
        AnchorFinder { state }
    }

    pub fn find_anchors(&self, bs: &mut BlockSet) -> PanResult<()> {
        let word = self.state.opts.int("anchor-size")? as usize;
        check_word_size(word)?;
        let fp_rate = self.state.opts.dec("fp-rate")?;
        let seqs: Vec<Arc<Sequence>> = bs.sequences().to_vec();
        let windows: usize = seqs
            .iter()
            .map(|s| s.size().saturating_sub(word - 1))
            .sum();
        if windows == 0 {
            return Ok(());
        }
        let candidates = first_pass(&seqs, word, windows, fp_rate);
        debug!("{} candidate hashes after prefilter", candidates.len());
        let buckets = second_pass(&seqs, word, &candidates);
        emit_blocks(bs, word, buckets);
        Ok(())
    }
}

/// Canonical hashes seen at least twice (with bloom false positives).
fn first_pass(
    seqs: &[Arc<Sequence>],
    word: usize,
    windows: usize,
    fp_rate: f64,
) -> FxHashSet<u64> {
    let bits = BloomFilter::optimal_bits(windows, fp_rate);
    let hashes = BloomFilter::optimal_hashes(windows, bits);
    let mut filter = BloomFilter::new(bits, hashes);
    let mut candidates = FxHashSet::default();
    let ticker = get_ticker();
    ticker.set_message("positions scanned");
    for seq in seqs {
        for_each_window(seq, word, |_, rolling| {
            if filter.test_and_add(rolling.canonical()) {
                candidates.insert(rolling.canonical());
            }
            ticker.inc(1);
        });
    }
    ticker.finish_and_clear();
    candidates
}

/// Positions of the candidate hashes: `hash -> (seq index, pos, ori)`.
fn second_pass(
    seqs: &[Arc<Sequence>],
    word: usize,
    candidates: &FxHashSet<u64>,
) -> FxHashMap<u64, Vec<(usize, Pos, Ori)>> {
    let per_seq: Vec<Vec<(u64, Pos, Ori)>> = seqs
        .par_iter()
        .map(|seq| {
            let mut found = Vec::new();
            for_each_window(seq, word, |pos, rolling| {
                if candidates.contains(&rolling.canonical()) {
                    found.push((
                        rolling.canonical(),
                        pos,
                        rolling.canonical_ori(),
                    ));
                }
            });
            found
        })
        .collect();
    let mut buckets: FxHashMap<u64, Vec<(usize, Pos, Ori)>> =
        FxHashMap::default();
    for (seq_index, found) in per_seq.into_iter().enumerate() {
        for (hash, pos, ori) in found {
            buckets.entry(hash).or_default().push((seq_index, pos, ori));
        }
    }
    buckets
}

fn for_each_window(
    seq: &Arc<Sequence>,
    word: usize,
    mut visit: impl FnMut(Pos, &RollingHash),
) {
    if seq.size() < word {
        return;
    }
    let mut rolling = RollingHash::start(seq, 0, word);
    visit(0, &rolling);
    for pos in 1..=(seq.size() - word) {
        rolling.roll(seq.char_at(pos - 1), seq.char_at(pos + word - 1));
        visit(pos, &rolling);
    }
}

fn emit_blocks(
    bs: &mut BlockSet,
    word: usize,
    buckets: FxHashMap<u64, Vec<(usize, Pos, Ori)>>,
) {
    let mut existing: VecCollection<FragmentId> = VecCollection::new();
    existing.add_bs(bs);
    existing.prepare();
    let seqs: Vec<Arc<Sequence>> = bs.sequences().to_vec();
    let mut emitted = 0usize;
    let progress = get_master_progress_bar(buckets.len());
    progress.set_message("anchor buckets");
    for (_, bucket) in buckets
        .into_iter()
        .filter(|(_, bucket)| bucket.len() >= 2)
        .sorted_by_key(|(hash, _)| *hash)
        .inspect(|_| progress.inc(1))
    {
        // hash collisions are ruled out by grouping on the exact word
        let grouped = bucket
            .into_iter()
            .map(|(seq_index, pos, ori)| {
                let fragment = Fragment::new(
                    seqs[seq_index].clone(),
                    pos,
                    pos + word - 1,
                    ori,
                );
                (fragment.str(), fragment)
            })
            .into_group_map();
        for (_, fragments) in
            grouped.into_iter().sorted_by(|a, b| a.0.cmp(&b.0))
        {
            let fragments: Vec<Fragment> = fragments
                .into_iter()
                .filter(|f| !existing.has_overlap(f))
                .collect();
            if fragments.len() < 2 {
                continue;
            }
            let id = bs.insert_with_fragments(Block::new(), fragments);
            if has_self_overlaps(bs, id) {
                fix_self_overlaps(bs, id);
            }
            if bs.view(id).size() < 2 {
                bs.remove_block(id);
                continue;
            }
            emitted += 1;
        }
    }
    progress.finish_and_clear();
    info!("{emitted} anchor blocks");
}

impl Processor for AnchorFinder {
    fn name(&self) -> &'static str {
        "Find anchors (exact short repeats)"
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let key = self.state.slot_key("target")?;
        let mut bs = ws.take(&key);
        let result = self.find_anchors(&mut bs);
        ws.put(&key, bs);
        result
    }
}

#[cfg(test)]
mod anchor_finder_tests {
    use super::*;

    fn names_of_spans(bs: &BlockSet) -> Vec<Vec<(String, Pos, Pos)>> {
        bs.block_ids()
            .into_iter()
            .map(|id| {
                let mut spans: Vec<(String, Pos, Pos)> = bs
                    .view(id)
                    .fragments()
                    .map(|(_, f)| {
                        (f.seq().name().to_owned(), f.min_pos(), f.max_pos())
                    })
                    .collect();
                spans.sort();
                spans
            })
            .collect()
    }

    #[test]
    fn test_identical_pair_one_block_per_word() {
        let text = "tggtccgagcggacggccatgcaagtccta";
        assert_eq!(text.len(), 30);
        let s1 = Sequence::in_memory("s1", text);
        let s2 = Sequence::in_memory("s2", text);
        let mut bs = BlockSet::new();
        bs.add_sequence(s1);
        bs.add_sequence(s2);
        let mut finder = AnchorFinder::new();
        finder.set_options("--anchor-size=10").unwrap();
        finder.find_anchors(&mut bs).unwrap();
        // every 10-mer occurs once per sequence: one block per window
        assert_eq!(bs.size(), 30 - 10 + 1);
        for spans in names_of_spans(&bs) {
            assert_eq!(spans.len(), 2);
            assert_eq!(spans[0].1, spans[1].1);
            assert_eq!(spans[0].0, "s1");
            assert_eq!(spans[1].0, "s2");
        }
    }

    #[test]
    fn test_reverse_complement_repeat_found() {
        let fwd = "atgcaagtccgg";
        let rc: String = fwd
            .bytes()
            .rev()
            .map(|c| crate::util::complement(c) as char)
            .collect();
        let text = format!("{fwd}tttttt{rc}");
        let s1 = Sequence::in_memory("s1", &text);
        let mut bs = BlockSet::new();
        bs.add_sequence(s1);
        let mut finder = AnchorFinder::new();
        finder.set_options("--anchor-size=12").unwrap();
        finder.find_anchors(&mut bs).unwrap();
        assert_eq!(bs.size(), 1);
        let view = bs.view(bs.block_ids()[0]);
        assert_eq!(view.size(), 2);
        let words: FxHashSet<String> =
            view.fragments().map(|(_, f)| f.str()).collect();
        assert_eq!(words.len(), 1, "both fragments read the same word");
    }

    #[test]
    fn test_existing_fragments_not_recovered() {
        let text = "tggtccgagcggacggccatgcaagtccta";
        let s1 = Sequence::in_memory("s1", text);
        let s2 = Sequence::in_memory("s2", text);
        let mut bs = BlockSet::new();
        let b = bs.insert_block(Block::named("done"));
        bs.insert_fragment(b, Fragment::forward(s1.clone(), 0, 29));
        bs.add_sequence(s2);
        let mut finder = AnchorFinder::new();
        finder.set_options("--anchor-size=10").unwrap();
        finder.find_anchors(&mut bs).unwrap();
        // s1 is fully covered, anchors would need both copies
        assert_eq!(bs.size(), 1);
    }
}
