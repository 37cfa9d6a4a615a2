pub mod align;
pub mod anchor_finder;
pub mod connector;
pub mod cut_gaps;
pub mod expander;
pub mod filter;
pub mod joiner;
pub mod move_gaps;
pub mod mutations;
pub mod overlaps_resolver;
pub mod pipelines;
pub mod rest;
pub mod stats;
pub mod stem;
pub mod unique_names;
pub mod union;

pub use align::{Align, Aligner, DummyAligner};
pub use anchor_finder::AnchorFinder;
pub use connector::Connector;
pub use cut_gaps::{CutGaps, CutMode};
pub use expander::FragmentsExpander;
pub use filter::Filter;
pub use joiner::Joiner;
pub use move_gaps::MoveGaps;
pub use mutations::{find_mutations, Mutation, PrintMutations};
pub use overlaps_resolver::{resolve_overlaps, OverlapsResolver2};
pub use pipelines::make_pre_pangenome;
pub use rest::Rest;
pub use stats::{summarize, Stats};
pub use stem::Stem;
pub use unique_names::UniqueNames;
pub use union::Union;
