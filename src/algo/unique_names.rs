use rustc_hash::FxHashSet;

use crate::block::random_block_name;
use crate::errs::PanResult;
use crate::proc::{ProcState, Processor, Workspace};

/// Make block names unique within the target blockset.
///
/// Duplicates of a non-default name get a `_N` suffix with the smallest
/// `N` that frees the name; empty names are replaced by random ones until
/// unique.
pub struct UniqueNames {
    state: ProcState,
}

impl Default for UniqueNames {
    fn default() -> Self {
        UniqueNames::new()
    }
}

impl UniqueNames {
    pub fn new() -> UniqueNames {
        let mut state = ProcState::new();
        state.declare_bs("target", "Blockset with blocks to rename");
        UniqueNames { state }
    }
}

impl Processor for UniqueNames {
    fn name(&self) -> &'static str {
        "Set unique names to all blocks"
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
        let mut taken: FxHashSet<String> = FxHashSet::default();
        for id in bs.blocks_sorted_by_name() {
            let name = bs.block(id).expect("block").name().to_owned();
            let unique = if name.is_empty() {
                let mut fresh = random_block_name();
                while taken.contains(&fresh) {
                    fresh = random_block_name();
                }
                fresh
            } else if taken.contains(&name) {
                let mut n = 1usize;
                while taken.contains(&format!("{name}_{n}")) {
                    n += 1;
                }
                format!("{name}_{n}")
            } else {
                name
            };
            taken.insert(unique.clone());
            bs.block_mut(id).expect("block").set_name(unique);
        }
        Ok(())
    }
}

#[cfg(test)]
mod unique_names_tests {
    use super::*;
    use crate::block::Block;
    use crate::block_set::BlockSet;

    #[test]
    fn test_duplicates_get_suffixes() {
        let mut bs = BlockSet::new();
        bs.insert_block(Block::named("x"));
        bs.insert_block(Block::named("x"));
        bs.insert_block(Block::named("x"));
        bs.insert_block(Block::named(""));
        let mut ws = Workspace::with("target", bs);
        let mut names = UniqueNames::new();
        names.run(&mut ws).unwrap();
        let bs = ws.get("target").unwrap();
        let mut seen: Vec<String> = bs
            .block_ids()
            .into_iter()
            .map(|id| bs.view(id).name().to_owned())
            .collect();
        seen.sort();
        assert_eq!(seen.len(), 4);
        seen.dedup();
        assert_eq!(seen.len(), 4, "names must be unique");
        assert!(seen.contains(&"x".to_owned()));
        assert!(seen.contains(&"x_1".to_owned()));
        assert!(seen.contains(&"x_2".to_owned()));
    }
}
