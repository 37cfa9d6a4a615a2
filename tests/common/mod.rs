use std::io::Write;
use std::path::Path;
use std::process::Output;
use std::sync::Arc;

use anyhow::{anyhow, Result as AnyhowResult};
use rand::rngs::StdRng;
use rand::Rng;

use pan_kit::block_set::BlockSet;
use pan_kit::io::blocks::read_blocks;
use pan_kit::io::fasta::read_fasta;
use pan_kit::sequence::{Sequence, StorageMode};

pub fn run_pankit(args: &[&str]) -> AnyhowResult<Output> {
    let exe = Path::new(env!("CARGO_BIN_EXE_pankit"));
    assert!(exe.exists());

    let output = std::process::Command::new(exe)
        .args(args)
        .arg("--quiet")
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()?
        .wait_with_output()?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(anyhow!("failed to run {:?}", args.join(" ")))
    }
}

pub fn random_dna(rng: &mut StdRng, length: usize) -> String {
    (0..length)
        .map(|_| ['a', 't', 'g', 'c'][rng.gen_range(0..4)])
        .collect()
}

pub fn write_fasta_file(
    records: &[(&str, &str)],
) -> AnyhowResult<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    for (name, text) in records {
        writeln!(file, ">{name}")?;
        writeln!(file, "{text}")?;
    }
    file.flush()?;
    Ok(file)
}

/// Load a block file together with its FASTA sequences.
pub fn load_result(
    fasta_path: &Path,
    blocks_path: &Path,
) -> AnyhowResult<BlockSet> {
    let fasta = std::fs::File::open(fasta_path)?;
    let seqs =
        read_fasta(std::io::BufReader::new(fasta), StorageMode::Dense)?;
    let mut bs = BlockSet::new();
    for seq in seqs {
        bs.add_sequence(seq);
    }
    let blocks = std::fs::File::open(blocks_path)?;
    read_blocks(
        &mut bs,
        std::io::BufReader::new(blocks),
        Default::default(),
    )?;
    Ok(bs)
}

/// Positions covered by fragments, and whether any position is covered
/// twice.
pub fn coverage(bs: &BlockSet) -> (usize, bool) {
    let mut covered = 0usize;
    let mut overlaps = false;
    let seqs: Vec<Arc<Sequence>> = bs.sequences().to_vec();
    for seq in seqs {
        let mut mask = vec![false; seq.size()];
        for id in bs.block_ids() {
            for (_, f) in bs.view(id).fragments() {
                if !Arc::ptr_eq(f.seq(), &seq) {
                    continue;
                }
                for pos in f.min_pos()..=f.max_pos() {
                    if mask[pos] {
                        overlaps = true;
                    }
                    mask[pos] = true;
                }
            }
        }
        covered += mask.iter().filter(|x| **x).count();
    }
    (covered, overlaps)
}
