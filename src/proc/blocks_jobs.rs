//! Per-block worker pool.
//!
//! Blocks are claimed from a shared queue by `workers` scoped threads.
//! `process_block` sees the block set read-only and accumulates into
//! per-thread data; the gathered data is merged under one mutex and
//! applied to the block set in `finish_work`. This realizes the contract
//! that no shared mutable state exists between `process_block` calls on
//! different blocks.

use std::sync::Mutex;

use crate::block::BlockId;
use crate::block_set::BlockSet;
use crate::errs::PanResult;
use crate::proc::processor::{Processor, Workspace};

/// Ordering applied to the block list before the queue is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockOrder {
    #[default]
    Unspecified,
    /// Large blocks first: size, then alignment length, then name.
    BySizeLengthName,
}

pub trait BlocksJobs: Processor + Sync {
    /// Per-thread accumulator.
    type Data: Send + Default;

    /// Slot iterated over, `"target"` unless overridden.
    fn block_set_name(&self) -> &'static str {
        "target"
    }

    fn block_order(&self) -> BlockOrder {
        BlockOrder::Unspecified
    }

    /// Adjust the list of blocks before any work is done.
    fn change_blocks(&self, _bs: &BlockSet, _ids: &mut Vec<BlockId>) {}

    fn before_work(&self, _bs: &BlockSet) -> PanResult<()> {
        Ok(())
    }

    fn before_thread(&self) -> Self::Data {
        Self::Data::default()
    }

    fn process_block(
        &self,
        bs: &BlockSet,
        id: BlockId,
        data: &mut Self::Data,
    ) -> PanResult<()>;

    /// Apply the gathered per-thread data.
    fn finish_work(
        &self,
        _bs: &mut BlockSet,
        _gathered: Vec<Self::Data>,
    ) -> PanResult<()> {
        Ok(())
    }
}

/// Drive a [`BlocksJobs`] over one block set.
pub fn run_jobs<J: BlocksJobs>(job: &J, bs: &mut BlockSet) -> PanResult<()> {
    let workers = job.state().workers().max(1);
    let mut ids = bs.block_ids();
    if job.block_order() == BlockOrder::BySizeLengthName {
        ids.sort_by(|a, b| {
            let va = bs.view(*a);
            let vb = bs.view(*b);
            vb.size()
                .cmp(&va.size())
                .then_with(|| {
                    vb.alignment_length().cmp(&va.alignment_length())
                })
                .then_with(|| va.name().cmp(vb.name()))
        });
    }
    job.change_blocks(bs, &mut ids);
    job.before_work(bs)?;
    let (tx, rx) = crossbeam_channel::unbounded::<BlockId>();
    for id in ids {
        tx.send(id).expect("queue open");
    }
    drop(tx);
    let gathered: Mutex<Vec<J::Data>> = Mutex::new(Vec::new());
    let failure: Mutex<Option<crate::errs::PanError>> = Mutex::new(None);
    let shared_meta = crate::proc::meta::meta();
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let gathered = &gathered;
            let failure = &failure;
            let shared: &BlockSet = bs;
            let shared_meta = shared_meta.clone();
            scope.spawn(move || {
                crate::proc::meta::set_meta(shared_meta);
                let mut data = job.before_thread();
                for id in rx.iter() {
                    if failure.lock().unwrap().is_some() {
                        break;
                    }
                    if let Err(e) = job.process_block(shared, id, &mut data)
                    {
                        *failure.lock().unwrap() = Some(e);
                        break;
                    }
                }
                gathered.lock().unwrap().push(data);
            });
        }
    });
    if let Some(e) = failure.into_inner().unwrap() {
        return Err(e);
    }
    let gathered = gathered.into_inner().unwrap();
    job.finish_work(bs, gathered)
}

/// Standard `run_impl` body for jobs iterating their `block_set_name`
/// slot.
pub fn run_jobs_on_slot<J: BlocksJobs>(
    job: &mut J,
    ws: &mut Workspace,
) -> PanResult<()> {
    let key = job.state().slot_key(job.block_set_name())?;
    let mut bs = ws.take(&key);
    let result = run_jobs(&*job, &mut bs);
    ws.put(&key, bs);
    result
}
