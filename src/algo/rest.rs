use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::block::Block;
use crate::block_set::BlockSet;
use crate::errs::PanResult;
use crate::fragment::Fragment;
use crate::proc::{ProcState, Processor, Workspace};
use crate::sequence::SeqRef;
use crate::util::Pos;

/// Compute the complement of `other`'s blocks: every maximal uncovered
/// interval of every sequence becomes a one-fragment block in `target`.
/// Running with `target == other` fills the gaps in place.
pub struct Rest {
    state: ProcState,
}

impl Default for Rest {
    fn default() -> Self {
        Rest::new()
    }
}

impl Rest {
    pub fn new() -> Rest {
        let mut state = ProcState::new();
        state.declare_bs("other", "Blockset which is complemented");
        state.declare_bs("target", "Blockset where results are stored");
        Rest { state }
    }
}

/// Uncovered intervals of all sequences of `bs`.
fn uncovered(bs: &BlockSet) -> Vec<Fragment> {
    let mut covered: FxHashMap<SeqRef, Vec<(Pos, Pos)>> = FxHashMap::default();
    for id in bs.block_ids() {
        for (_, f) in bs.view(id).fragments() {
            covered
                .entry(SeqRef(f.seq().clone()))
                .or_default()
                .push((f.min_pos(), f.max_pos()));
        }
    }
    let mut result = Vec::new();
    for seq in bs.sequences() {
        let mut spans = covered
            .remove(&SeqRef(Arc::clone(seq)))
            .unwrap_or_default();
        spans.sort_unstable();
        let mut cursor: Pos = 0;
        for (min_pos, max_pos) in spans {
            if min_pos > cursor {
                result.push(Fragment::forward(
                    Arc::clone(seq),
                    cursor,
                    min_pos - 1,
                ));
            }
            cursor = cursor.max(max_pos + 1);
        }
        if cursor < seq.size() {
            result.push(Fragment::forward(
                Arc::clone(seq),
                cursor,
                seq.size() - 1,
            ));
        }
    }
    result
}

impl Processor for Rest {
    fn name(&self) -> &'static str {
        "Add to target blocks of sequence parts not covered by other"
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
            let bs = ws.get_mut(&target_key);
            for fragment in uncovered(bs) {
                bs.insert_with_fragments(Block::new(), vec![fragment]);
            }
            return Ok(());
        }
        let other = ws.take(&other_key);
        let fragments = uncovered(&other);
        let target = ws.get_mut(&target_key);
        for seq in other.sequences() {
            target.add_sequence(Arc::clone(seq));
        }
        for fragment in fragments {
            target.insert_with_fragments(Block::new(), vec![fragment]);
        }
        ws.put(&other_key, other);
        Ok(())
    }
}
