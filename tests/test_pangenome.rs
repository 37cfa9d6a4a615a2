use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{coverage, load_result, random_dna, run_pankit, write_fasta_file};

mod common;

#[test]
fn test_pangenome_covers_input_exactly_once() {
    let mut rng = StdRng::seed_from_u64(21);
    // a 180 nt core shared by both genomes, distinct flanks
    let core = random_dna(&mut rng, 180);
    let flank1 = random_dna(&mut rng, 150);
    let flank2 = random_dna(&mut rng, 150);
    let g1 = format!("{flank1}{core}");
    let g2 = format!("{core}{flank2}");
    let fasta =
        write_fasta_file(&[("g1&chr1&c", &g1), ("g2&chr1&c", &g2)]).unwrap();
    let out = tempfile::NamedTempFile::new().unwrap();
    run_pankit(&[
        "pangenome",
        "-i",
        fasta.path().to_str().unwrap(),
        "-o",
        out.path().to_str().unwrap(),
    ])
    .unwrap();
    let bs = load_result(fasta.path(), out.path()).unwrap();
    let (covered, overlaps) = coverage(&bs);
    assert!(!overlaps, "pangenome blocks must not overlap");
    assert_eq!(covered, g1.len() + g2.len(), "full coverage required");
    // the shared core must show up as a 2-fragment block of substantial
    // length
    let has_core_block = bs.block_ids().into_iter().any(|id| {
        let view = bs.view(id);
        view.size() == 2
            && view.fragments().all(|(_, f)| f.length() >= 100)
    });
    assert!(has_core_block, "shared core not recovered");
}

#[test]
fn test_stat_and_mutations_read_pangenome_output() {
    let mut rng = StdRng::seed_from_u64(22);
    let core = random_dna(&mut rng, 180);
    let fasta =
        write_fasta_file(&[("g1&chr1&l", &core), ("g2&chr1&l", &core)])
            .unwrap();
    let blocks = tempfile::NamedTempFile::new().unwrap();
    run_pankit(&[
        "pangenome",
        "-i",
        fasta.path().to_str().unwrap(),
        "-o",
        blocks.path().to_str().unwrap(),
    ])
    .unwrap();
    let stat_out = run_pankit(&[
        "stat",
        "-i",
        fasta.path().to_str().unwrap(),
        "-b",
        blocks.path().to_str().unwrap(),
    ])
    .unwrap();
    let text = String::from_utf8(stat_out.stdout).unwrap();
    assert!(text.contains("blocks"));
    assert!(text.contains("covered"));

    let muts = tempfile::NamedTempFile::new().unwrap();
    run_pankit(&[
        "mutations",
        "-i",
        fasta.path().to_str().unwrap(),
        "-b",
        blocks.path().to_str().unwrap(),
        "-o",
        muts.path().to_str().unwrap(),
    ])
    .unwrap();
    let header = std::fs::read_to_string(muts.path()).unwrap();
    assert!(header.starts_with("block\tfragment\tstart"));
    // identical sequences carry no mutations
    assert_eq!(header.lines().count(), 1);
}
