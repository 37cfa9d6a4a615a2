use std::io::Write;

use prettytable::{format, row, Table};

use crate::block_hash::blockset_hash;
use crate::block_set::BlockSet;
use crate::block_stat::{block_identity, make_stat};
use crate::errs::PanResult;
use crate::proc::{OptValue, ProcState, Processor, Workspace};

#[derive(Debug, Clone, Default)]
pub struct BlockSetSummary {
    pub sequences: usize,
    pub sequence_nucleotides: usize,
    pub blocks: usize,
    pub unique_blocks: usize,
    pub fragments: usize,
    pub fragment_nucleotides: usize,
    pub covered_portion: f64,
    pub min_fragment_length: usize,
    pub max_fragment_length: usize,
    pub mean_identity: f64,
    pub gc: f64,
    pub hash: u32,
}

pub fn summarize(bs: &BlockSet) -> BlockSetSummary {
    let mut summary = BlockSetSummary {
        sequences: bs.sequences().len(),
        sequence_nucleotides: bs.sequences().iter().map(|s| s.size()).sum(),
        blocks: bs.size(),
        hash: blockset_hash(bs),
        min_fragment_length: usize::MAX,
        ..Default::default()
    };
    let mut identity_weight = 0usize;
    let mut identity_sum = 0.0f64;
    let mut gc_sum = 0.0f64;
    let mut gc_weight = 0usize;
    for id in bs.block_ids() {
        let view = bs.view(id);
        if view.size() <= 1 {
            summary.unique_blocks += 1;
        }
        for (_, f) in view.fragments() {
            summary.fragments += 1;
            summary.fragment_nucleotides += f.length();
            summary.min_fragment_length =
                summary.min_fragment_length.min(f.length());
            summary.max_fragment_length =
                summary.max_fragment_length.max(f.length());
        }
        let stat = make_stat(&view, 0, None);
        if view.size() > 1 && stat.alignment_rows == view.size() {
            let length = view.alignment_length();
            identity_sum += block_identity(&stat) * length as f64;
            identity_weight += length;
        }
        let letters: usize = stat.letter_counts.iter().sum();
        if letters > 0 && stat.gc() >= 0.0 {
            gc_sum += stat.gc() * letters as f64;
            gc_weight += letters;
        }
    }
    if summary.fragments == 0 {
        summary.min_fragment_length = 0;
    }
    if summary.sequence_nucleotides > 0 {
        // covered positions, ignoring double coverage by overlaps
        summary.covered_portion = summary.fragment_nucleotides as f64
            / summary.sequence_nucleotides as f64;
    }
    if identity_weight > 0 {
        summary.mean_identity = identity_sum / identity_weight as f64;
    }
    if gc_weight > 0 {
        summary.gc = gc_sum / gc_weight as f64;
    }
    summary
}

pub fn write_summary<W: Write>(
    summary: &BlockSetSummary,
    writer: &mut W,
) -> PanResult<()> {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.add_row(row!["sequences", summary.sequences]);
    table.add_row(row!["sequence length", summary.sequence_nucleotides]);
    table.add_row(row!["blocks", summary.blocks]);
    table.add_row(row!["unique blocks", summary.unique_blocks]);
    table.add_row(row!["fragments", summary.fragments]);
    table.add_row(row!["fragment length", summary.fragment_nucleotides]);
    table.add_row(row![
        "covered",
        format!("{:.4}", summary.covered_portion)
    ]);
    table.add_row(row![
        "fragment length range",
        format!(
            "{}..{}",
            summary.min_fragment_length, summary.max_fragment_length
        )
    ]);
    table.add_row(row![
        "mean identity",
        format!("{:.4}", summary.mean_identity)
    ]);
    table.add_row(row!["gc", format!("{:.4}", summary.gc)]);
    table.add_row(row!["hash", format!("{:08x}", summary.hash)]);
    table.print(writer).map_err(std::io::Error::other)?;
    Ok(())
}

/// Print aggregate statistics of the target blockset.
pub struct Stats {
    state: ProcState,
}

impl Default for Stats {
    fn default() -> Self {
        Stats::new()
    }
}

impl Stats {
    pub fn new() -> Stats {
        let mut state = ProcState::new();
        state.opts.add_opt(
            "out",
            "Output file ('' = standard output)",
            OptValue::Str(String::new()),
        );
        state.declare_bs("target", "Blockset to describe");
        Stats { state }
    }
}

impl Processor for Stats {
    fn name(&self) -> &'static str {
        "Print blockset statistics"
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let key = self.state.slot_key("target")?;
        let summary = summarize(ws.get_mut(&key));
        let out = self.state.opts.string("out")?;
        if out.is_empty() {
            write_summary(&summary, &mut std::io::stdout().lock())
        } else {
            let mut file = std::fs::File::create(&out)
                .map_err(|e| crate::errs::PanError::io(out.as_str(), e))?;
            write_summary(&summary, &mut file)
        }
    }
}

#[cfg(test)]
mod stats_tests {
    use super::*;
    use crate::block::Block;
    use crate::fragment::Fragment;
    use crate::sequence::Sequence;

    #[test]
    fn test_summarize_counts() {
        let s1 = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b = bs.insert_block(Block::named("b"));
        bs.insert_fragment(b, Fragment::forward(s1.clone(), 0, 5));
        bs.insert_fragment(b, Fragment::forward(s1.clone(), 6, 11));
        let lone = bs.insert_block(Block::named("u"));
        bs.insert_fragment(lone, Fragment::forward(s1.clone(), 12, 17));
        let summary = summarize(&bs);
        assert_eq!(summary.sequences, 1);
        assert_eq!(summary.sequence_nucleotides, 18);
        assert_eq!(summary.blocks, 2);
        assert_eq!(summary.unique_blocks, 1);
        assert_eq!(summary.fragments, 3);
        assert_eq!(summary.fragment_nucleotides, 18);
        assert!((summary.covered_portion - 1.0).abs() < 1e-9);
        assert_eq!(summary.min_fragment_length, 6);
        assert_eq!(summary.max_fragment_length, 6);
        let mut raw = Vec::new();
        write_summary(&summary, &mut raw).unwrap();
        let text = String::from_utf8(raw).unwrap();
        assert!(text.contains("blocks"));
        assert!(text.contains("18"));
    }
}
