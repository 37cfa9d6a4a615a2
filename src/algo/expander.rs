use crate::block::BlockId;
use crate::block_set::BlockSet;
use crate::errs::PanResult;
use crate::fragment::FragmentId;
use crate::proc::{
    run_jobs_on_slot, BlocksJobs, OptValue, ProcState, Processor, Workspace,
};
use crate::util::{complement, Ori, Pos};

#[derive(Debug)]
pub struct Expansion {
    fid: FragmentId,
    min_pos: Pos,
    max_pos: Pos,
}

/// Extend all fragments of a block simultaneously, one nucleotide at a
/// time on both sides, while the newly exposed bases agree.
///
/// Extension works on raw sequence content only and stops at sequence
/// boundaries, at occupied neighbours (`max-overlap` positions may be
/// claimed from a neighbour) and as soon as more than `max-mismatches`
/// fragments disagree with the majority base. Alignment rows of changed
/// fragments are dropped.
pub struct FragmentsExpander {
    state: ProcState,
}

impl Default for FragmentsExpander {
    fn default() -> Self {
        FragmentsExpander::new()
    }
}

impl FragmentsExpander {
    pub fn new() -> FragmentsExpander {
        let mut state = ProcState::new();
        state.opts.add_gopt(
            "max-overlap",
            "Max number of positions claimed from a neighbour fragment",
            "EXPANDER_MAX_OVERLAP",
        );
        state.opts.add_opt_check(
            "max-mismatches",
            "Fragments allowed to disagree with the majority base",
            OptValue::Int(0),
            |v| v.as_int().map(|x| x >= 0).unwrap_or(false),
        );
        state.declare_bs("target", "Blockset with blocks to expand");
        FragmentsExpander { state }
    }

    /// Expanded coordinates of the block's fragments; empty when the block
    /// cannot grow.
    pub fn expansions(
        &self,
        bs: &BlockSet,
        id: BlockId,
    ) -> PanResult<Vec<Expansion>> {
        let view = bs.view(id);
        if view.size() < 2 {
            return Ok(Vec::new());
        }
        let max_overlap = self.state.opts.int("max-overlap")?;
        let max_mismatches = self.state.opts.int("max-mismatches")? as usize;
        let fids: Vec<FragmentId> =
            view.fragments().map(|(fid, _)| fid).collect();
        // (begin shift, end shift) per direction, shared by all fragments
        let mut grow_end = 0i64;
        let mut grow_begin = 0i64;
        let end_limit = fids
            .iter()
            .map(|fid| bs.max_shift_end(*fid, max_overlap))
            .min()
            .unwrap_or(0);
        let begin_limit = fids
            .iter()
            .map(|fid| max_shift_begin(bs, *fid, max_overlap))
            .min()
            .unwrap_or(0);
        while grow_end < end_limit
            && bases_agree(
                bs,
                &fids,
                |f_len, shift| f_len as i64 + shift,
                grow_end,
                max_mismatches,
            )
        {
            grow_end += 1;
        }
        while grow_begin < begin_limit
            && bases_agree(
                bs,
                &fids,
                |_, shift| -1 - shift,
                grow_begin,
                max_mismatches,
            )
        {
            grow_begin += 1;
        }
        if grow_end == 0 && grow_begin == 0 {
            return Ok(Vec::new());
        }
        let mut result = Vec::with_capacity(fids.len());
        for fid in fids {
            let f = bs.fragment(fid);
            let (min_pos, max_pos) = match f.ori() {
                Ori::Forward => (
                    (f.min_pos() as i64 - grow_begin) as Pos,
                    (f.max_pos() as i64 + grow_end) as Pos,
                ),
                Ori::Reverse => (
                    (f.min_pos() as i64 - grow_end) as Pos,
                    (f.max_pos() as i64 + grow_begin) as Pos,
                ),
            };
            result.push(Expansion { fid, min_pos, max_pos });
        }
        Ok(result)
    }
}

/// Largest begin-side growth, symmetric to
/// [`BlockSet::max_shift_end`].
fn max_shift_begin(bs: &BlockSet, fid: FragmentId, allowed_overlap: i64) -> i64 {
    let f = bs.fragment(fid);
    let to_boundary = match f.ori() {
        Ori::Forward => f.min_pos() as i64,
        Ori::Reverse => (f.seq().size() - 1 - f.max_pos()) as i64,
    };
    match bs.logical_neighbour(fid, Ori::Reverse) {
        None => to_boundary,
        Some(nid) => {
            let n = bs.fragment(nid);
            let to_neighbour = match f.ori() {
                Ori::Forward => {
                    f.min_pos() as i64 - n.max_pos() as i64 - 1
                }
                Ori::Reverse => {
                    n.min_pos() as i64 - f.max_pos() as i64 - 1
                }
            };
            (to_neighbour + allowed_overlap).min(to_boundary)
        }
    }
}

/// Whether the bases exposed at fragment position `pos_of(length, shift)`
/// agree across fragments, up to `max_mismatches` dissenters.
fn bases_agree(
    bs: &BlockSet,
    fids: &[FragmentId],
    pos_of: impl Fn(usize, i64) -> i64,
    shift: i64,
    max_mismatches: usize,
) -> bool {
    let mut counts = [0usize; 4];
    for fid in fids {
        let f = bs.fragment(*fid);
        let pos = pos_of(f.length(), shift);
        let seq_pos = f.begin_pos() as i64 + f.ori().value() * pos;
        if seq_pos < 0 || seq_pos >= f.seq().size() as i64 {
            return false;
        }
        let c = f.seq().char_at(seq_pos as Pos);
        let c = match f.ori() {
            Ori::Forward => c,
            Ori::Reverse => complement(c),
        };
        counts[crate::sequence::char_to_code(c) as usize] += 1;
    }
    let majority = counts.iter().max().copied().unwrap_or(0);
    fids.len() - majority <= max_mismatches
}

impl Processor for FragmentsExpander {
    fn name(&self) -> &'static str {
        "Expand blocks (expand fragments of blocks)"
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

impl BlocksJobs for FragmentsExpander {
    type Data = Vec<Expansion>;

    fn process_block(
        &self,
        bs: &BlockSet,
        id: BlockId,
        data: &mut Self::Data,
    ) -> PanResult<()> {
        data.extend(self.expansions(bs, id)?);
        Ok(())
    }

    fn finish_work(
        &self,
        bs: &mut BlockSet,
        gathered: Vec<Self::Data>,
    ) -> PanResult<()> {
        for expansion in gathered.into_iter().flatten() {
            let f = bs.fragment_mut(expansion.fid);
            f.set_min_pos(expansion.min_pos);
            f.set_max_pos(expansion.max_pos);
            f.take_row();
        }
        Ok(())
    }
}
