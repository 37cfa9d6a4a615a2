use crate::block::BlockId;
use crate::block_set::{BlockSet, BlockView};
use crate::block_stat::{block_identity, gap_portion, make_stat};
use crate::errs::PanResult;
use crate::proc::{
    run_jobs_on_slot, BlocksJobs, OptValue, ProcState, Processor, Workspace,
};

fn non_negative(v: &OptValue) -> bool {
    v.as_int().map(|x| x >= 0).unwrap_or(false)
}

fn at_least_minus_one(v: &OptValue) -> bool {
    v.as_int().map(|x| x >= -1).unwrap_or(false)
}

fn portion(v: &OptValue) -> bool {
    v.as_dec().map(|x| (0.0..=1.0).contains(&x)).unwrap_or(false)
}

fn non_negative_dec(v: &OptValue) -> bool {
    v.as_dec().map(|x| x >= 0.0).unwrap_or(false)
}

/// Register the shared size/identity/gap thresholds.
pub fn add_size_limits_options(state: &mut ProcState) {
    let opts = &mut state.opts;
    opts.add_gopt("min-fragment", "Minimum fragment length", "MIN_LENGTH");
    opts.add_opt_check(
        "max-fragment",
        "Maximum fragment length (-1 = all)",
        OptValue::Int(-1),
        at_least_minus_one,
    );
    opts.add_opt_check(
        "min-block",
        "Minimum block size",
        OptValue::Int(2),
        non_negative,
    );
    opts.add_opt_check(
        "max-block",
        "Maximum block size (-1 = all)",
        OptValue::Int(-1),
        at_least_minus_one,
    );
    opts.add_opt_check(
        "min-spreading",
        "Minimum fragment length spreading ((max - min) / avg)",
        OptValue::Dec(0.0),
        non_negative_dec,
    );
    opts.add_gopt(
        "max-spreading",
        "Maximum fragment length spreading",
        "MAX_SPREADING",
    );
    opts.add_gopt(
        "min-identity",
        "Minimum block identity (columns without gaps as 1, \
         columns with gaps as 0.5)",
        "MIN_IDENTITY",
    );
    opts.add_opt_check(
        "max-identity",
        "Maximum block identity",
        OptValue::Dec(1.0),
        portion,
    );
    opts.add_opt_check(
        "min-gaps",
        "Min gap columns percentage",
        OptValue::Dec(0.0),
        portion,
    );
    opts.add_gopt("max-gaps", "Max gap columns percentage", "MAX_GAPS");
}

/// Relax every size limit so that nothing is filtered.
pub fn allow_everything(state: &mut ProcState) {
    let opts = &mut state.opts;
    opts.set_value("min-fragment", OptValue::Int(0)).unwrap();
    opts.set_value("max-fragment", OptValue::Int(-1)).unwrap();
    opts.set_value("min-block", OptValue::Int(0)).unwrap();
    opts.set_value("max-block", OptValue::Int(-1)).unwrap();
    opts.set_value("min-spreading", OptValue::Dec(0.0)).unwrap();
    opts.set_value("max-spreading", OptValue::Dec(f64::MAX)).unwrap();
    opts.set_value("min-identity", OptValue::Dec(0.0)).unwrap();
    opts.set_value("max-identity", OptValue::Dec(1.0)).unwrap();
    opts.set_value("min-gaps", OptValue::Dec(0.0)).unwrap();
    opts.set_value("max-gaps", OptValue::Dec(1.0)).unwrap();
}

/// Remove blocks failing the size, spreading, identity or gap thresholds.
pub struct Filter {
    state: ProcState,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::new()
    }
}

impl Filter {
    pub fn new() -> Filter {
        let mut state = ProcState::new();
        add_size_limits_options(&mut state);
        state.declare_bs("target", "Filtered blockset");
        Filter { state }
    }

    /// Whether the block passes all thresholds.
    pub fn is_good_block(&self, view: &BlockView<'_>) -> PanResult<bool> {
        let opts = &self.state.opts;
        let min_block = opts.int("min-block")?;
        let max_block = opts.int("max-block")?;
        let size = view.size() as i64;
        if size < min_block || (max_block != -1 && size > max_block) {
            return Ok(false);
        }
        let min_fragment = opts.int("min-fragment")?;
        let max_fragment = opts.int("max-fragment")?;
        for (_, f) in view.fragments() {
            let length = f.length() as i64;
            if length < min_fragment
                || (max_fragment != -1 && length > max_fragment)
            {
                return Ok(false);
            }
        }
        let stat = make_stat(view, 0, None);
        if stat.spreading < opts.dec("min-spreading")?
            || stat.spreading > opts.dec("max-spreading")?
        {
            return Ok(false);
        }
        // identity and gaps are judged only when an alignment is known
        if view.size() > 1 && stat.alignment_rows == view.size() {
            let identity = block_identity(&stat);
            if identity < opts.dec("min-identity")?
                || identity > opts.dec("max-identity")?
            {
                return Ok(false);
            }
            let gaps = gap_portion(&stat);
            if gaps < opts.dec("min-gaps")? || gaps > opts.dec("max-gaps")? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Processor for Filter {
    fn name(&self) -> &'static str {
        "Filter blocks by fragment length, block size, identity and gaps"
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

impl BlocksJobs for Filter {
    type Data = Vec<BlockId>;

    fn process_block(
        &self,
        bs: &BlockSet,
        id: BlockId,
        data: &mut Self::Data,
    ) -> PanResult<()> {
        if !self.is_good_block(&bs.view(id))? {
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
mod filter_tests {
    use super::*;
    use crate::block::Block;
    use crate::fragment::Fragment;
    use crate::sequence::Sequence;

    #[test]
    fn test_thresholds() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let big = bs.insert_block(Block::named("big"));
        bs.insert_fragment(big, Fragment::forward(seq.clone(), 0, 8));
        bs.insert_fragment(big, Fragment::forward(seq.clone(), 9, 17));
        let small = bs.insert_block(Block::named("small"));
        bs.insert_fragment(small, Fragment::forward(seq.clone(), 0, 1));
        bs.insert_fragment(small, Fragment::forward(seq.clone(), 4, 5));
        let lonely = bs.insert_block(Block::named("lonely"));
        bs.insert_fragment(lonely, Fragment::forward(seq.clone(), 2, 3));

        let mut filter = Filter::new();
        filter.set_options("--min-fragment=3 --min-block=2").unwrap();
        let mut ws = Workspace::with("target", bs);
        filter.run(&mut ws).unwrap();
        let bs = ws.get("target").unwrap();
        assert_eq!(bs.size(), 1);
        assert_eq!(bs.view(bs.block_ids()[0]).name(), "big");
    }

    #[test]
    fn test_allow_everything_disables_gates() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let one = bs.insert_block(Block::named("one"));
        bs.insert_fragment(one, Fragment::forward(seq.clone(), 0, 0));
        let mut filter = Filter::new();
        allow_everything(filter.state_mut());
        let view = bs.view(one);
        assert!(filter.is_good_block(&view).unwrap());
        let mut ws = Workspace::with("target", bs);
        filter.run(&mut ws).unwrap();
        assert_eq!(ws.get("target").unwrap().size(), 1);
    }
}
