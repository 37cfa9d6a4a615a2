use std::io::Write;

use derive_new::new;

use crate::block_set::{BlockSet, BlockView};
use crate::errs::PanResult;
use crate::proc::{OptValue, ProcState, Processor, Workspace};

/// One difference of a fragment against the block consensus: a
/// substitution (`change` is the letter) or a run of deleted consensus
/// positions (`change` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Mutation {
    pub block: String,
    pub fragment: String,
    pub start: usize,
    pub stop: usize,
    pub consensus: String,
    pub change: Option<char>,
}

/// Walk the block and report every deviation from the consensus.
pub fn find_mutations(
    view: &BlockView<'_>,
    mut handler: impl FnMut(Mutation),
) {
    let consensus = view.consensus_string().into_bytes();
    for (fid, f) in view.fragments() {
        let fragment_id = view.bs.fragment(fid).id();
        let mut gaps = 0usize;
        let mut gap_consensus = String::new();
        for (pos, cons) in consensus.iter().enumerate() {
            let x = f.alignment_at(pos);
            if x.is_none() {
                gaps += 1;
                gap_consensus.push(*cons as char);
            }
            if let Some(x) = x {
                if gaps > 0 {
                    handler(Mutation::new(
                        view.name().to_owned(),
                        fragment_id.clone(),
                        pos - gaps,
                        pos - 1,
                        std::mem::take(&mut gap_consensus),
                        None,
                    ));
                    gaps = 0;
                }
                if x != *cons {
                    handler(Mutation::new(
                        view.name().to_owned(),
                        fragment_id.clone(),
                        pos,
                        pos,
                        (*cons as char).to_string(),
                        Some(x as char),
                    ));
                }
            }
        }
    }
}

/// Print mutations of all blocks as tab-separated text.
pub struct PrintMutations {
    state: ProcState,
}

impl Default for PrintMutations {
    fn default() -> Self {
        PrintMutations::new()
    }
}

impl PrintMutations {
    pub fn new() -> PrintMutations {
        let mut state = ProcState::new();
        state.opts.add_opt(
            "out",
            "Output file ('' = standard output)",
            OptValue::Str(String::new()),
        );
        state.declare_bs("target", "Blockset to search in");
        PrintMutations { state }
    }

    pub fn write_mutations<W: Write>(
        bs: &BlockSet,
        writer: W,
    ) -> PanResult<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        out.write_record([
            "block", "fragment", "start", "stop", "consensus", "change",
        ])
        .map_err(std::io::Error::other)?;
        let mut error = None;
        for id in bs.blocks_sorted_by_name() {
            find_mutations(&bs.view(id), |m| {
                let change = m
                    .change
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_owned());
                let record = [
                    m.block,
                    m.fragment,
                    m.start.to_string(),
                    m.stop.to_string(),
                    m.consensus,
                    change,
                ];
                if let Err(e) = out.write_record(&record) {
                    error.get_or_insert(e);
                }
            });
        }
        out.flush().map_err(std::io::Error::other)?;
        match error {
            Some(e) => Err(std::io::Error::other(e).into()),
            None => Ok(()),
        }
    }
}

impl Processor for PrintMutations {
    fn name(&self) -> &'static str {
        "Find all mutations in blocks"
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let key = self.state.slot_key("target")?;
        let bs = ws.get_mut(&key);
        let out = self.state.opts.string("out")?;
        if out.is_empty() {
            Self::write_mutations(bs, std::io::stdout().lock())
        } else {
            let file = std::fs::File::create(&out)
                .map_err(|e| crate::errs::PanError::io(out.as_str(), e))?;
            Self::write_mutations(bs, file)
        }
    }
}

#[cfg(test)]
mod mutations_tests {
    use super::*;
    use crate::alignment_row::{AlignmentRow, RowKind};
    use crate::block::Block;
    use crate::fragment::Fragment;
    use crate::sequence::Sequence;

    #[test]
    fn test_substitutions_and_deletions() {
        let s1 = Sequence::in_memory("s1", "atgc");
        let s2 = Sequence::in_memory("s2", "atcatc");
        let mut bs = BlockSet::new();
        let b = bs.insert_block(Block::named("b"));
        let f1 = bs.insert_fragment(b, Fragment::forward(s1, 0, 3));
        let f2 = bs.insert_fragment(b, Fragment::forward(s2, 0, 2));
        bs.fragment_mut(f1)
            .set_row(AlignmentRow::from_text(RowKind::Compact, "atgc"));
        bs.fragment_mut(f2)
            .set_row(AlignmentRow::from_text(RowKind::Compact, "at-c"));
        let mut found = Vec::new();
        find_mutations(&bs.view(b), |m| found.push(m));
        // consensus "atgc": one deletion at column 2 in the short row
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 2);
        assert_eq!(found[0].stop, 2);
        assert_eq!(found[0].consensus, "g");
        assert_eq!(found[0].change, None);

        let mut raw = Vec::new();
        PrintMutations::write_mutations(&bs, &mut raw).unwrap();
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("block\tfragment\tstart"));
        assert!(text.contains("b\ts2_0_2_1\t2\t2\tg\t-"));
    }
}
