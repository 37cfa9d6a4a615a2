use crate::block::Block;
use crate::block_set::BlockSet;
use crate::errs::PanResult;
use crate::fragment::Fragment;
use crate::proc::{OptValue, ProcState, Processor, Workspace};

/// Copy all blocks of `other` into `target`, preserving fragment order.
pub struct Union {
    state: ProcState,
}

impl Default for Union {
    fn default() -> Self {
        Union::new()
    }
}

impl Union {
    pub fn new() -> Union {
        let mut state = ProcState::new();
        state.opts.add_opt(
            "copy-rows",
            "Copy alignment rows along with fragments",
            OptValue::Bool(true),
        );
        state.declare_bs("other", "Blockset being copied");
        state.declare_bs("target", "Blockset where copies are stored");
        Union { state }
    }

    fn copy_blocks(
        &self,
        source: &BlockSet,
        target: &mut BlockSet,
    ) -> PanResult<()> {
        let copy_rows = self.state.opts.boolean("copy-rows")?;
        for seq in source.sequences() {
            target.add_sequence(seq.clone());
        }
        for id in source.blocks_sorted_by_name() {
            let view = source.view(id);
            let mut fragments = Vec::with_capacity(view.size());
            for (_, f) in view.fragments() {
                let mut copy = Fragment::new(
                    f.seq().clone(),
                    f.min_pos(),
                    f.max_pos(),
                    f.ori(),
                );
                if copy_rows {
                    if let Some(row) = f.row() {
                        copy.set_row(row.clone());
                    }
                }
                fragments.push(copy);
            }
            target.insert_with_fragments(
                Block::named(view.name().to_owned()),
                fragments,
            );
        }
        Ok(())
    }
}

impl Processor for Union {
    fn name(&self) -> &'static str {
        "Copy blocks from other to target"
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let other_key = self.state.slot_key("other")?;
        let target_key = self.state.slot_key("target")?;
        if other_key == target_key {
            return Ok(());
        }
        let other = ws.take(&other_key);
        let result = self.copy_blocks(&other, ws.get_mut(&target_key));
        ws.put(&other_key, other);
        result
    }
}

#[cfg(test)]
mod union_tests {
    use super::*;
    use crate::alignment_row::{AlignmentRow, RowKind};
    use crate::block_hash::blockset_hash;
    use crate::sequence::Sequence;

    #[test]
    fn test_copy_preserves_fragments_and_rows() {
        let seq = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b = bs.insert_block(Block::named("b1"));
        let fid =
            bs.insert_fragment(b, Fragment::forward(seq.clone(), 0, 5));
        bs.fragment_mut(fid)
            .set_row(AlignmentRow::from_text(RowKind::Compact, "tg-gtcc"));
        bs.insert_fragment(b, Fragment::forward(seq.clone(), 6, 11));
        let source_hash = blockset_hash(&bs);
        let mut ws = Workspace::with("other", bs);
        let mut union = Union::new();
        union.run(&mut ws).unwrap();
        let target = ws.get("target").unwrap();
        assert_eq!(target.size(), 1);
        assert_eq!(blockset_hash(target), source_hash);
        let copied = target.view(target.block_ids()[0]);
        assert_eq!(copied.name(), "b1");
        let first = copied.front().unwrap();
        assert!(first.row().is_some() || first.min_pos() == 6);
    }
}
