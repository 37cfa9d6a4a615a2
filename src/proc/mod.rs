pub mod blocks_jobs;
pub mod meta;
pub mod options;
pub mod pipe;
pub mod processor;

pub use blocks_jobs::{run_jobs, run_jobs_on_slot, BlockOrder, BlocksJobs};
pub use meta::{meta, set_meta, Meta};
pub use options::{OptValue, Options};
pub use pipe::Pipe;
pub use processor::{ProcState, Processor, Workspace};
