use crate::alignment_row::{AlignmentRow, RowKind};
use crate::block::BlockId;
use crate::block_set::BlockSet;
use crate::errs::{PanError, PanResult};
use crate::fragment::FragmentId;
use crate::proc::{
    run_jobs_on_slot, BlocksJobs, OptValue, ProcState, Processor, Workspace,
};

/// Multiple aligner consumed by the core: equal-length rows out, `-` for
/// gaps. External tools are wrapped behind this trait by their own
/// binaries.
pub trait Aligner: Send + Sync {
    fn align(&self, seqs: Vec<String>) -> PanResult<Vec<String>>;
}

/// Pads all rows with trailing gaps to the longest one. A placeholder
/// where no real aligner is wired in; exact blocks (anchors) are already
/// flush and stay unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyAligner;

impl Aligner for DummyAligner {
    fn align(&self, seqs: Vec<String>) -> PanResult<Vec<String>> {
        let length = seqs.iter().map(|s| s.len()).max().unwrap_or(0);
        Ok(seqs
            .into_iter()
            .map(|mut s| {
                while s.len() < length {
                    s.push('-');
                }
                s
            })
            .collect())
    }
}

/// Attach alignment rows to blocks that have none.
pub struct Align {
    state: ProcState,
    aligner: Box<dyn Aligner>,
}

impl Default for Align {
    fn default() -> Self {
        Align::new(Box::new(DummyAligner))
    }
}

impl Align {
    pub fn new(aligner: Box<dyn Aligner>) -> Align {
        let mut state = ProcState::new();
        state.opts.add_opt(
            "row-type",
            "type of new alignment rows ('compact', 'map')",
            OptValue::Str("compact".to_owned()),
        );
        state.declare_bs("target", "Blockset to align");
        Align { state, aligner }
    }

    fn row_kind(&self) -> PanResult<RowKind> {
        RowKind::parse(&self.state.opts.string("row-type")?)
    }
}

impl Processor for Align {
    fn name(&self) -> &'static str {
        "Align blocks without alignment"
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

impl BlocksJobs for Align {
    type Data = Vec<(FragmentId, String)>;

    fn process_block(
        &self,
        bs: &BlockSet,
        id: BlockId,
        data: &mut Self::Data,
    ) -> PanResult<()> {
        let view = bs.view(id);
        if view.is_empty()
            || view.fragments().all(|(_, f)| f.row().is_some())
        {
            return Ok(());
        }
        let fids: Vec<FragmentId> =
            view.fragments().map(|(fid, _)| fid).collect();
        let seqs: Vec<String> =
            view.fragments().map(|(_, f)| f.str()).collect();
        let rows = self.aligner.align(seqs)?;
        if rows.len() != fids.len()
            || rows.windows(2).any(|w| w[0].len() != w[1].len())
        {
            return Err(PanError::Aligner(format!(
                "malformed alignment of block {}",
                view.name()
            )));
        }
        for (fid, row) in fids.into_iter().zip(rows) {
            data.push((fid, row));
        }
        Ok(())
    }

    fn finish_work(
        &self,
        bs: &mut BlockSet,
        gathered: Vec<Self::Data>,
    ) -> PanResult<()> {
        let kind = self.row_kind()?;
        for (fid, text) in gathered.into_iter().flatten() {
            bs.fragment_mut(fid)
                .set_row(AlignmentRow::from_text(kind, &text));
        }
        Ok(())
    }
}
