use log::debug;

use crate::block::{Block, BlockId};
use crate::block_set::BlockSet;
use crate::errs::PanResult;
use crate::fragment::Fragment;
use crate::proc::{OptValue, ProcState, Processor, Workspace};
use crate::util::Ori;

/// Merge neighbour blocks whose fragments pair one-to-one along the
/// sequences.
///
/// Two blocks can be joined in direction `dir` when every fragment of the
/// first finds its logical neighbour in the second with the same ori and a
/// gap of at most `max-dist` (`-1` = unlimited), and the pairing uses up
/// both blocks. Joined fragments are merged coordinate-wise; alignment
/// rows are dropped. Neighbour chains are rewired, so the pass is
/// single-threaded.
pub struct Joiner {
    state: ProcState,
}

impl Default for Joiner {
    fn default() -> Self {
        Joiner::new()
    }
}

impl Joiner {
    pub fn new() -> Joiner {
        let mut state = ProcState::new();
        state.opts.add_opt_check(
            "max-dist",
            "Maximum gap between joined fragments (-1 = unlimited)",
            OptValue::Int(-1),
            |v| v.as_int().map(|x| x >= -1).unwrap_or(false),
        );
        state.declare_bs("target", "Blockset with blocks to join");
        Joiner { state }
    }

    /// The direction in which every fragment of `b1` pairs with a
    /// fragment of `b2`.
    fn can_join(
        &self,
        bs: &BlockSet,
        b1: BlockId,
        b2: BlockId,
    ) -> PanResult<Option<Ori>> {
        let max_dist = self.state.opts.int("max-dist")?;
        let view1 = bs.view(b1);
        let view2 = bs.view(b2);
        if b1 == b2 || view1.size() != view2.size() || view1.is_empty() {
            return Ok(None);
        }
        'dirs: for dir in [Ori::Forward, Ori::Reverse] {
            for (fid, f1) in view1.fragments() {
                let nid = match bs.logical_neighbour(fid, dir) {
                    Some(nid) => nid,
                    None => continue 'dirs,
                };
                let n = bs.fragment(nid);
                if n.block != Some(b2) || n.ori() != f1.ori() {
                    continue 'dirs;
                }
                let gap = n.min_pos().max(f1.min_pos()) as i64
                    - n.max_pos().min(f1.max_pos()) as i64
                    - 1;
                if max_dist != -1 && gap > max_dist {
                    continue 'dirs;
                }
            }
            return Ok(Some(dir));
        }
        Ok(None)
    }

    fn join(
        &self,
        bs: &mut BlockSet,
        b1: BlockId,
        b2: BlockId,
        dir: Ori,
    ) -> PanResult<BlockId> {
        let view1 = bs.view(b1);
        let mut merged = Vec::with_capacity(view1.size());
        for (fid, f1) in view1.fragments() {
            let nid = bs.logical_neighbour(fid, dir).expect("pair checked");
            let n = bs.fragment(nid);
            merged.push(Fragment::new(
                f1.seq().clone(),
                f1.min_pos().min(n.min_pos()),
                f1.max_pos().max(n.max_pos()),
                f1.ori(),
            ));
        }
        bs.remove_block(b1);
        bs.remove_block(b2);
        let joined = bs.insert_with_fragments(Block::new(), merged);
        bs.connect_all();
        Ok(joined)
    }
}

impl Processor for Joiner {
    fn name(&self) -> &'static str {
        "Join neighbour blocks"
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
        bs.connect_all();
        let mut joined = 0usize;
        loop {
            let mut found = None;
            'scan: for b1 in bs.block_ids() {
                let front = match bs.block(b1).and_then(|b| b.front()) {
                    Some(front) => front,
                    None => continue,
                };
                for side in [Ori::Forward, Ori::Reverse] {
                    if let Some(nid) = bs.logical_neighbour(front, side) {
                        if let Some(b2) = bs.fragment(nid).block {
                            if let Some(dir) = self.can_join(&bs, b1, b2)? {
                                found = Some((b1, b2, dir));
                                break 'scan;
                            }
                        }
                    }
                }
            }
            match found {
                Some((b1, b2, dir)) => {
                    self.join(&mut bs, b1, b2, dir)?;
                    joined += 1;
                }
                None => break,
            }
        }
        if joined > 0 {
            debug!("joined {joined} block pairs");
        }
        ws.put(&key, bs);
        Ok(())
    }
}
