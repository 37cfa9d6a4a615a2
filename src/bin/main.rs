use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use pan_kit::algo::{
    make_pre_pangenome, AnchorFinder, PrintMutations, Stats,
};
use pan_kit::block_set::BlockSet;
use pan_kit::errs::PanError;
use pan_kit::io::blocks::{read_blocks, write_blocks};
use pan_kit::io::fasta::read_fasta;
use pan_kit::proc::{Processor, Workspace};
use pan_kit::sequence::StorageMode;

#[derive(Parser)]
#[command(
    name = "pankit",
    about = "Build and inspect nucleotide pangenomes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Decrease logging to warnings and errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find anchors (exact short repeats) in the input sequences
    Anchors {
        /// Input FASTA file
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output block file
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Options passed to the anchor finder,
        /// e.g. "--anchor-size=17 --fp-rate=0.001"
        #[arg(long, default_value = "")]
        options: String,
        /// Store sequences 2 bits per nucleotide
        #[arg(long)]
        compact: bool,
    },
    /// Build a draft pangenome: anchors, expansion, overlap resolution,
    /// alignment, rest
    Pangenome {
        #[arg(short = 'i', long)]
        input: PathBuf,
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Options applied to the pipeline, e.g. "--workers=4"
        #[arg(long, default_value = "")]
        options: String,
        #[arg(long)]
        compact: bool,
    },
    /// Print statistics of a block file
    Stat {
        /// FASTA file with the sequences of the block file
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Block file
        #[arg(short = 'b', long)]
        blocks: PathBuf,
    },
    /// Print mutations of every block relative to its consensus
    Mutations {
        #[arg(short = 'i', long)]
        input: PathBuf,
        #[arg(short = 'b', long)]
        blocks: PathBuf,
        /// Output TSV ('' = standard output)
        #[arg(short = 'o', long, default_value = "")]
        output: String,
    },
}

fn init_logging(quiet: bool) -> anyhow::Result<()> {
    let stderr = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
        .build();
    let level = if quiet { LevelFilter::Warn } else { LevelFilter::Info };
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn load_sequences(
    path: &PathBuf,
    compact: bool,
) -> anyhow::Result<BlockSet> {
    let mode =
        if compact { StorageMode::Compact } else { StorageMode::Dense };
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let seqs = read_fasta(BufReader::new(file), mode)?;
    let mut bs = BlockSet::new();
    for seq in seqs {
        bs.add_sequence(seq);
    }
    Ok(bs)
}

fn load_blocks(
    input: &PathBuf,
    blocks: &PathBuf,
) -> anyhow::Result<BlockSet> {
    let mut bs = load_sequences(input, false)?;
    let file = File::open(blocks)
        .with_context(|| format!("failed to open {}", blocks.display()))?;
    read_blocks(&mut bs, BufReader::new(file), Default::default())?;
    Ok(bs)
}

fn save_blocks(bs: &BlockSet, path: &PathBuf) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_blocks(bs, &mut out)?;
    out.flush()?;
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Anchors { input, output, options, compact } => {
            let bs = load_sequences(&input, compact)?;
            let mut finder = AnchorFinder::new();
            finder.set_options(&options)?;
            let mut ws = Workspace::with("target", bs);
            finder.run(&mut ws)?;
            save_blocks(ws.get("target").expect("target"), &output)
        }
        Commands::Pangenome { input, output, options, compact } => {
            let bs = load_sequences(&input, compact)?;
            let mut pipe = make_pre_pangenome();
            pipe.set_options(&options)?;
            let mut ws = Workspace::with("target", bs);
            pipe.run(&mut ws)?;
            save_blocks(ws.get("target").expect("target"), &output)
        }
        Commands::Stat { input, blocks } => {
            let bs = load_blocks(&input, &blocks)?;
            let mut stats = Stats::new();
            let mut ws = Workspace::with("target", bs);
            stats.run(&mut ws)?;
            Ok(())
        }
        Commands::Mutations { input, blocks, output } => {
            let bs = load_blocks(&input, &blocks)?;
            let mut print = PrintMutations::new();
            if !output.is_empty() {
                print.set_options(&format!("--out={output}"))?;
            }
            let mut ws = Workspace::with("target", bs);
            print.run(&mut ws)?;
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.quiet) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(1);
    }
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            let code = e
                .downcast_ref::<PanError>()
                .map(|pe| pe.exit_code())
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}
