use rustc_hash::FxHashMap;

use crate::block::BlockId;
use crate::block_set::{BlockSet, BlockView};
use crate::errs::PanResult;
use crate::proc::{
    run_jobs_on_slot, BlocksJobs, ProcState, Processor, Workspace,
};

fn genome_of(seq: &crate::sequence::Sequence) -> String {
    let genome = seq.genome();
    if genome.is_empty() {
        // sequences with non-canonical names count as their own genome
        seq.name().to_owned()
    } else {
        genome
    }
}

/// Whether the block's fragments cover every genome of the blockset
/// exactly once.
pub fn is_exact_stem(view: &BlockView<'_>, genomes: usize) -> bool {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for (_, f) in view.fragments() {
        *counts.entry(genome_of(f.seq())).or_default() += 1;
    }
    counts.len() == genomes && counts.values().all(|n| *n == 1)
}

/// Keep only single-copy blocks present in all genomes.
pub struct Stem {
    state: ProcState,
}

impl Default for Stem {
    fn default() -> Self {
        Stem::new()
    }
}

impl Stem {
    pub fn new() -> Stem {
        let mut state = ProcState::new();
        state.declare_bs("target", "Blockset reduced to stem blocks");
        Stem { state }
    }
}

impl Processor for Stem {
    fn name(&self) -> &'static str {
        "Filter out blocks not covering all genomes exactly once"
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        run_jobs_on_slot(self, ws)
    }
}

impl BlocksJobs for Stem {
    type Data = Vec<BlockId>;

    fn process_block(
        &self,
        bs: &BlockSet,
        id: BlockId,
        data: &mut Self::Data,
    ) -> PanResult<()> {
        let genomes = bs
            .sequences()
            .iter()
            .map(|s| genome_of(s))
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        if !is_exact_stem(&bs.view(id), genomes) {
            data.push(id);
        }
        Ok(())
    }

    fn finish_work(
        &self,
        bs: &mut BlockSet,
        gathered: Vec<Self::Data>,
    ) -> PanResult<()> {
        for id in gathered.into_iter().flatten() {
            bs.remove_block(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod stem_tests {
    use super::*;
    use crate::block::Block;
    use crate::fragment::Fragment;
    use crate::sequence::Sequence;

    #[test]
    fn test_exact_stem_filtering() {
        let g1 = Sequence::in_memory("A&chr1&c", "tggtccgagcggacggcc");
        let g2 = Sequence::in_memory("B&chr1&c", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let stem_block = bs.insert_block(Block::named("stem"));
        bs.insert_fragment(stem_block, Fragment::forward(g1.clone(), 0, 5));
        bs.insert_fragment(stem_block, Fragment::forward(g2.clone(), 0, 5));
        let repeat = bs.insert_block(Block::named("repeat"));
        bs.insert_fragment(repeat, Fragment::forward(g1.clone(), 6, 9));
        bs.insert_fragment(repeat, Fragment::forward(g1.clone(), 10, 13));
        bs.insert_fragment(repeat, Fragment::forward(g2.clone(), 6, 9));
        let partial = bs.insert_block(Block::named("partial"));
        bs.insert_fragment(partial, Fragment::forward(g2.clone(), 10, 13));

        let mut ws = Workspace::with("target", bs);
        let mut stem = Stem::new();
        stem.run(&mut ws).unwrap();
        let bs = ws.get("target").unwrap();
        assert_eq!(bs.size(), 1);
        assert_eq!(bs.view(bs.block_ids()[0]).name(), "stem");
    }
}
