use log::debug;

use crate::alignment_row::{AlignmentRow, RowKind};
use crate::block::BlockId;
use crate::block_set::{BlockSet, BlockView};
use crate::errs::{PanError, PanResult};
use crate::fragment::FragmentId;
use crate::proc::{
    run_jobs_on_slot, BlocksJobs, OptValue, ProcState, Processor, Workspace,
};
use crate::util::{Ori, Pos};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutMode {
    /// Keep the largest column range whose boundary columns are gapless in
    /// every row.
    #[default]
    Strict,
    /// Keep the intersection of the rows' non-gap spans.
    Permissive,
}

impl CutMode {
    fn parse(raw: &str) -> PanResult<CutMode> {
        match raw {
            "strict" => Ok(CutMode::Strict),
            "permissive" => Ok(CutMode::Permissive),
            _ => {
                Err(PanError::Validation(format!("wrong cut-gaps-mode: {raw}")))
            }
        }
    }
}

#[derive(Debug)]
pub enum CutAction {
    ClearBlock(BlockId),
    DeleteFragment(BlockId, FragmentId),
    Rewrite {
        fid: FragmentId,
        min_pos: Pos,
        max_pos: Pos,
        row_text: String,
    },
}

/// Trim terminal gap columns of block alignments.
pub struct CutGaps {
    state: ProcState,
}

impl Default for CutGaps {
    fn default() -> Self {
        CutGaps::new()
    }
}

impl CutGaps {
    pub fn new() -> CutGaps {
        let mut state = ProcState::new();
        state.opts.add_opt(
            "cut-gaps-mode",
            "mode of cutting gaps ('strict', 'permissive')",
            OptValue::Str("strict".to_owned()),
        );
        state.opts.add_opt(
            "row-type",
            "type of rebuilt alignment rows ('compact', 'map')",
            OptValue::Str("compact".to_owned()),
        );
        state.declare_bs("target", "Target blockset");
        CutGaps { state }
    }

    pub fn mode(&self) -> PanResult<CutMode> {
        CutMode::parse(&self.state.opts.string("cut-gaps-mode")?)
    }

    fn row_kind(&self) -> PanResult<RowKind> {
        RowKind::parse(&self.state.opts.string("row-type")?)
    }

    /// Compute the actions that trim one block, empty if nothing changes.
    pub fn cut_actions(
        &self,
        view: &BlockView<'_>,
    ) -> PanResult<Vec<CutAction>> {
        let length = view.alignment_length();
        if view.is_empty() || length == 0 {
            return Ok(Vec::new());
        }
        for (_, f) in view.fragments() {
            match f.row() {
                None => {
                    debug!(
                        "block {} has a fragment without alignment, \
                         gaps not cut",
                        view.name()
                    );
                    return Ok(Vec::new());
                }
                Some(row) if row.length() != length => {
                    return Err(PanError::Invariant(format!(
                        "row of fragment {} has length {}, \
                         block alignment length is {length}",
                        f.id(),
                        row.length()
                    )));
                }
                Some(_) => {}
            }
        }
        let (from, to) = match self.mode()? {
            CutMode::Strict => find_boundaries_strict(view, length),
            CutMode::Permissive => find_boundaries_permissive(view, length),
        };
        if from == 0 && to == Some(length - 1) {
            return Ok(Vec::new());
        }
        let to = match to {
            Some(to) if to >= from => to,
            _ => return Ok(vec![CutAction::ClearBlock(view.id)]),
        };
        let mut actions = Vec::new();
        for (fid, f) in view.fragments() {
            let row = f.row().expect("checked above");
            let fr_from =
                (from..=to).find_map(|col| row.map_to_fragment(col));
            let fr_from = match fr_from {
                Some(x) => x,
                None => {
                    actions.push(CutAction::DeleteFragment(view.id, fid));
                    continue;
                }
            };
            let fr_to = (from..=to)
                .rev()
                .find_map(|col| row.map_to_fragment(col))
                .expect("non-empty window");
            let row_text: String = view
                .aligned_string(fid)
                .chars()
                .skip(from)
                .take(to - from + 1)
                .collect();
            let (min_pos, max_pos) = match f.ori() {
                Ori::Forward => {
                    (f.min_pos() + fr_from, f.min_pos() + fr_to)
                }
                Ori::Reverse => {
                    (f.max_pos() - fr_to, f.max_pos() - fr_from)
                }
            };
            actions.push(CutAction::Rewrite {
                fid,
                min_pos,
                max_pos,
                row_text,
            });
        }
        Ok(actions)
    }

    pub fn apply_actions(
        &self,
        bs: &mut BlockSet,
        actions: Vec<CutAction>,
    ) -> PanResult<()> {
        let kind = self.row_kind()?;
        for action in actions {
            match action {
                CutAction::ClearBlock(id) => bs.clear_block(id),
                CutAction::DeleteFragment(block, fid) => {
                    bs.erase_fragment(block, fid);
                }
                CutAction::Rewrite { fid, min_pos, max_pos, row_text } => {
                    let f = bs.fragment_mut(fid);
                    f.set_min_pos(min_pos);
                    f.set_max_pos(max_pos);
                    f.set_row(AlignmentRow::from_text(kind, &row_text));
                }
            }
        }
        Ok(())
    }
}

fn gapless_column(view: &BlockView<'_>, col: usize) -> bool {
    view.fragments()
        .all(|(_, f)| f.row().unwrap().map_to_fragment(col).is_some())
}

fn find_boundaries_strict(
    view: &BlockView<'_>,
    length: usize,
) -> (usize, Option<usize>) {
    let from = (0..length).find(|col| gapless_column(view, *col));
    let from = match from {
        Some(from) => from,
        None => return (1, Some(0)),
    };
    let to = (from..length).rev().find(|col| gapless_column(view, *col));
    (from, to)
}

fn find_boundaries_permissive(
    view: &BlockView<'_>,
    length: usize,
) -> (usize, Option<usize>) {
    let mut from = 0;
    let mut to = length - 1;
    for (_, f) in view.fragments() {
        let row = f.row().expect("checked");
        let first = (0..length)
            .find(|col| row.map_to_fragment(*col).is_some());
        let last = (0..length)
            .rev()
            .find(|col| row.map_to_fragment(*col).is_some());
        match (first, last) {
            (Some(first), Some(last)) => {
                from = from.max(first);
                to = to.min(last);
            }
            _ => return (1, Some(0)),
        }
    }
    if to < from {
        (1, Some(0))
    } else {
        (from, Some(to))
    }
}

impl Processor for CutGaps {
    fn name(&self) -> &'static str {
        "Cut terminal gaps in block alignments"
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

impl BlocksJobs for CutGaps {
    type Data = Vec<CutAction>;

    fn process_block(
        &self,
        bs: &BlockSet,
        id: BlockId,
        data: &mut Self::Data,
    ) -> PanResult<()> {
        data.extend(self.cut_actions(&bs.view(id))?);
        Ok(())
    }

    fn finish_work(
        &self,
        bs: &mut BlockSet,
        gathered: Vec<Self::Data>,
    ) -> PanResult<()> {
        for actions in gathered {
            self.apply_actions(bs, actions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod cut_gaps_tests {
    use super::*;
    use crate::block::Block;
    use crate::fragment::Fragment;
    use crate::sequence::Sequence;

    fn make_block(rows: &[(&str, Pos, Pos, i64)]) -> (BlockSet, BlockId) {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcctggtcc");
        let mut bs = BlockSet::new();
        let id = bs.insert_block(Block::named("b"));
        for (text, min_pos, max_pos, ori) in rows {
            let fid = bs.insert_fragment(
                id,
                Fragment::new(
                    seq.clone(),
                    *min_pos,
                    *max_pos,
                    Ori::from_value(*ori).unwrap(),
                ),
            );
            bs.fragment_mut(fid)
                .set_row(AlignmentRow::from_text(RowKind::Compact, text));
        }
        (bs, id)
    }

    #[test]
    fn test_strict_cut() {
        // columns:   -tccga
        //            gtccg-
        let (mut bs, id) =
            make_block(&[("-tccga", 3, 7, 1), ("gtccg-", 2, 6, 1)]);
        let cut = CutGaps::new();
        let actions = cut.cut_actions(&bs.view(id)).unwrap();
        assert_eq!(actions.len(), 2);
        cut.apply_actions(&mut bs, actions).unwrap();
        let view = bs.view(id);
        assert_eq!(view.alignment_length(), 4);
        let mut spans: Vec<_> = view
            .fragments()
            .map(|(_, f)| (f.min_pos(), f.max_pos()))
            .collect();
        spans.sort();
        assert_eq!(spans, vec![(3, 6), (3, 6)]);
    }

    #[test]
    fn test_permissive_keeps_inner_gaps() {
        // columns:   tc-cga
        //            -tccg-
        let (mut bs, id) =
            make_block(&[("tc-cga", 3, 7, 1), ("-tccg-", 3, 6, 1)]);
        let mut cut = CutGaps::new();
        cut.set_options("--cut-gaps-mode=permissive").unwrap();
        let actions = cut.cut_actions(&bs.view(id)).unwrap();
        cut.apply_actions(&mut bs, actions).unwrap();
        let view = bs.view(id);
        // window [1, 4]: rows "c-cg" and "tccg"
        assert_eq!(view.alignment_length(), 4);
        let mut spans: Vec<_> = view
            .fragments()
            .map(|(_, f)| (f.min_pos(), f.max_pos()))
            .collect();
        spans.sort();
        assert_eq!(spans, vec![(3, 6), (4, 6)]);
    }

    #[test]
    fn test_all_gap_window_clears_block() {
        let (mut bs, id) = make_block(&[("t---", 0, 0, 1), ("---c", 5, 5, 1)]);
        let cut = CutGaps::new();
        let actions = cut.cut_actions(&bs.view(id)).unwrap();
        assert!(matches!(actions[0], CutAction::ClearBlock(_)));
        cut.apply_actions(&mut bs, actions).unwrap();
        assert!(bs.view(id).is_empty());
    }
}
