use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::arena::arena_id;
use crate::fragment::FragmentId;

arena_id!(
    /// Stable index of a block inside its blockset.
    BlockId
);

pub(crate) fn random_block_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// A set of fragments asserted homologous.
///
/// A non-weak block owns its fragments: each fragment's back-reference
/// points at it, and removing a fragment from the block destroys the
/// fragment. A weak block is a view over fragments owned elsewhere.
/// Read access that needs fragment data goes through
/// [`BlockView`](crate::block_set::BlockView); all mutation goes through
/// the owning [`BlockSet`](crate::block_set::BlockSet).
#[derive(Debug, Clone)]
pub struct Block {
    name: String,
    fragments: Vec<FragmentId>,
    weak: bool,
}

impl Default for Block {
    fn default() -> Self {
        Block::new()
    }
}

impl Block {
    /// New non-weak block with a random 8-character name.
    pub fn new() -> Block {
        Block::named(random_block_name())
    }

    pub fn named<N: Into<String>>(name: N) -> Block {
        Block { name: name.into(), fragments: Vec::new(), weak: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<N: Into<String>>(&mut self, name: N) {
        self.name = name.into();
    }

    pub fn set_random_name(&mut self) {
        self.name = random_block_name();
    }

    pub fn weak(&self) -> bool {
        self.weak
    }

    pub(crate) fn set_weak(&mut self, weak: bool) {
        self.weak = weak;
    }

    pub fn size(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragment_ids(&self) -> &[FragmentId] {
        &self.fragments
    }

    pub fn front(&self) -> Option<FragmentId> {
        self.fragments.first().copied()
    }

    pub fn has(&self, id: FragmentId) -> bool {
        self.fragments.contains(&id)
    }

    pub(crate) fn push(&mut self, id: FragmentId) {
        self.fragments.push(id);
    }

    pub(crate) fn pull(&mut self, id: FragmentId) -> bool {
        match self.fragments.iter().position(|x| *x == id) {
            Some(index) => {
                self.fragments.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<FragmentId> {
        std::mem::take(&mut self.fragments)
    }
}
