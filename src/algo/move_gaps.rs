use crate::alignment_row::AlignmentRow;
use crate::block::BlockId;
use crate::block_set::{BlockSet, BlockView};
use crate::errs::PanResult;
use crate::fragment::FragmentId;
use crate::proc::{
    run_jobs_on_slot, BlocksJobs, OptValue, ProcState, Processor, Workspace,
};
use crate::util::{Ori, Pos};

#[derive(Debug)]
pub struct TailClip {
    fid: FragmentId,
    min_pos: Pos,
    max_pos: Pos,
    row_text: String,
}

/// Clip short dangling tails of alignment rows: a run of at most
/// `max-tail` residues sitting at a row edge in front of a gap run is
/// turned into gaps and removed from the fragment.
pub struct MoveGaps {
    state: ProcState,
}

impl Default for MoveGaps {
    fn default() -> Self {
        MoveGaps::new()
    }
}

impl MoveGaps {
    pub fn new() -> MoveGaps {
        let mut state = ProcState::new();
        state.opts.add_opt_check(
            "max-tail",
            "Maximum length of clipped terminal residue runs",
            OptValue::Int(3),
            |v| v.as_int().map(|x| x >= 0).unwrap_or(false),
        );
        state.declare_bs("target", "Target blockset");
        MoveGaps { state }
    }

    /// Clips for one block; empty when nothing changes.
    pub fn tail_clips(&self, view: &BlockView<'_>) -> PanResult<Vec<TailClip>> {
        let max_tail = self.state.opts.int("max-tail")? as usize;
        let mut clips = Vec::new();
        if max_tail == 0 {
            return Ok(clips);
        }
        for (fid, f) in view.fragments() {
            if f.row().is_none() {
                continue;
            }
            let text: Vec<u8> = view.aligned_string(fid).into_bytes();
            let letters = text.iter().filter(|c| **c != b'-').count();
            let left = edge_tail(text.iter().copied(), letters, max_tail);
            let right =
                edge_tail(text.iter().rev().copied(), letters, max_tail);
            if left + right == 0 || left + right >= letters {
                continue;
            }
            let mut new_text = text.clone();
            let mut seen = 0;
            for c in new_text.iter_mut() {
                if *c != b'-' {
                    seen += 1;
                    if seen <= left || seen > letters - right {
                        *c = b'-';
                    }
                }
            }
            let (min_pos, max_pos) = match f.ori() {
                Ori::Forward => {
                    (f.min_pos() + left, f.max_pos() - right)
                }
                Ori::Reverse => {
                    (f.min_pos() + right, f.max_pos() - left)
                }
            };
            clips.push(TailClip {
                fid,
                min_pos,
                max_pos,
                row_text: String::from_utf8(new_text).expect("ascii"),
            });
        }
        Ok(clips)
    }

    pub fn apply_clips(
        &self,
        bs: &mut BlockSet,
        clips: Vec<TailClip>,
    ) -> PanResult<()> {
        for clip in clips {
            let kind =
                bs.fragment(clip.fid).row().map(|r| r.kind()).unwrap_or_default();
            let f = bs.fragment_mut(clip.fid);
            f.set_min_pos(clip.min_pos);
            f.set_max_pos(clip.max_pos);
            f.set_row(AlignmentRow::from_text(kind, &clip.row_text));
        }
        Ok(())
    }

    /// Clip the block's rows in place; reports whether anything changed.
    pub fn move_gaps(&self, bs: &mut BlockSet, id: BlockId) -> PanResult<bool> {
        let clips = self.tail_clips(&bs.view(id))?;
        let changed = !clips.is_empty();
        self.apply_clips(bs, clips)?;
        Ok(changed)
    }
}

/// Number of residues of the edge run when it dangles in front of a gap
/// run and is short enough to clip.
fn edge_tail(
    text: impl Iterator<Item = u8>,
    letters: usize,
    max_tail: usize,
) -> usize {
    let mut run = 0;
    let mut gap_follows = false;
    for c in text {
        if c == b'-' {
            gap_follows = run > 0;
            break;
        }
        run += 1;
        if run > max_tail {
            return 0;
        }
    }
    if gap_follows && run <= max_tail && run < letters {
        run
    } else {
        0
    }
}

impl Processor for MoveGaps {
    fn name(&self) -> &'static str {
        "Move terminal alignment tails into gaps"
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

impl BlocksJobs for MoveGaps {
    type Data = Vec<TailClip>;

    fn process_block(
        &self,
        bs: &BlockSet,
        id: BlockId,
        data: &mut Self::Data,
    ) -> PanResult<()> {
        data.extend(self.tail_clips(&bs.view(id))?);
        Ok(())
    }

    fn finish_work(
        &self,
        bs: &mut BlockSet,
        gathered: Vec<Self::Data>,
    ) -> PanResult<()> {
        for clips in gathered {
            self.apply_clips(bs, clips)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod move_gaps_tests {
    use super::*;
    use crate::alignment_row::RowKind;
    use crate::block::Block;
    use crate::fragment::Fragment;
    use crate::sequence::Sequence;

    fn block_with_rows(
        rows: &[(&str, Pos, Pos)],
    ) -> (BlockSet, BlockId) {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcctggtcc");
        let mut bs = BlockSet::new();
        let id = bs.insert_block(Block::named("b"));
        for (text, min_pos, max_pos) in rows {
            let fid = bs.insert_fragment(
                id,
                Fragment::forward(seq.clone(), *min_pos, *max_pos),
            );
            bs.fragment_mut(fid)
                .set_row(AlignmentRow::from_text(RowKind::Compact, text));
        }
        (bs, id)
    }

    #[test]
    fn test_short_tail_clipped() {
        // first row has a 2-residue tail dangling before its gap run
        let (mut bs, id) =
            block_with_rows(&[("tg--gtccga", 0, 7), ("tggtccgagc", 0, 9)]);
        let gaps = MoveGaps::new();
        assert!(gaps.move_gaps(&mut bs, id).unwrap());
        let view = bs.view(id);
        let clipped = view
            .fragments()
            .find(|(_, f)| f.min_pos() == 2)
            .expect("clipped fragment");
        assert_eq!(clipped.1.max_pos(), 7);
        assert_eq!(view.aligned_string(clipped.0), "----gtccga");
        // second run is a no-op
        assert!(!gaps.move_gaps(&mut bs, id).unwrap());
    }

    #[test]
    fn test_long_tails_untouched() {
        // both edge runs are longer than max-tail
        let (mut bs, id) =
            block_with_rows(&[("tggg-tccg", 0, 7), ("tggtcgacg", 0, 8)]);
        let gaps = MoveGaps::new();
        assert!(!gaps.move_gaps(&mut bs, id).unwrap());
    }
}
