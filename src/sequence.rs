use std::borrow::Cow;
use std::sync::Arc;

use crate::errs::{PanError, PanResult};
use crate::parsing_utils::consume_canonical_name;
use crate::util::Pos;

/// 2-bit nucleotide code. Complement pairs sum to 3, so the complement of a
/// code is `3 - code`.
#[inline]
pub fn char_to_code(c: u8) -> u64 {
    match c {
        b'a' => 0,
        b'g' => 1,
        b'c' => 2,
        _ => 3,
    }
}

#[inline]
pub fn code_to_char(code: u64) -> u8 {
    match code & 0b11 {
        0 => b'a',
        1 => b'g',
        2 => b'c',
        _ => b't',
    }
}

/// Lowercase the text and drop everything outside `atgc`.
pub fn to_atgc(text: &str) -> Vec<u8> {
    text.bytes()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| matches!(c, b'a' | b't' | b'g' | b'c'))
        .collect()
}

/// How nucleotides of a sequence are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// One byte per nucleotide.
    #[default]
    Dense,
    /// Four nucleotides per byte, 2 bits each, little-endian within a byte.
    Compact,
}

#[derive(Debug, Clone)]
enum Storage {
    Dense(Vec<u8>),
    Compact { data: Vec<u8>, size: usize },
}

/// Stranded nucleotide storage, immutable after construction and shared as
/// `Arc<Sequence>`.
///
/// The name may encode `{genome}&{chromosome}&{c|l}` where `c` marks a
/// circular and `l` a linear chromosome.
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    description: String,
    access_number: String,
    storage: Storage,
}

impl Sequence {
    pub fn new<N, D>(name: N, description: D, mode: StorageMode, text: &str) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        let atgc = to_atgc(text);
        let storage = match mode {
            StorageMode::Dense => Storage::Dense(atgc),
            StorageMode::Compact => {
                let size = atgc.len();
                let mut data = vec![0u8; (size + 3) / 4];
                for (i, c) in atgc.iter().enumerate() {
                    data[i / 4] |= (char_to_code(*c) as u8) << (2 * (i % 4));
                }
                Storage::Compact { data, size }
            }
        };
        Sequence {
            name: name.into(),
            description: description.into(),
            access_number: String::new(),
            storage,
        }
    }

    pub fn in_memory<N: Into<String>>(name: N, text: &str) -> Arc<Sequence> {
        Arc::new(Sequence::new(name, "", StorageMode::Dense, text))
    }

    pub fn compact<N: Into<String>>(name: N, text: &str) -> Arc<Sequence> {
        Arc::new(Sequence::new(name, "", StorageMode::Compact, text))
    }

    pub fn with_access_number(mut self, access_number: &str) -> Self {
        self.access_number = access_number.to_owned();
        self
    }

    pub fn size(&self) -> usize {
        match &self.storage {
            Storage::Dense(data) => data.len(),
            Storage::Compact { size, .. } => *size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn access_number(&self) -> &str {
        &self.access_number
    }

    #[inline]
    pub fn char_at(&self, index: Pos) -> u8 {
        debug_assert!(index < self.size());
        match &self.storage {
            Storage::Dense(data) => data[index],
            Storage::Compact { data, .. } => {
                let code = (data[index / 4] >> (2 * (index % 4))) & 0b11;
                code_to_char(code as u64)
            }
        }
    }

    /// Contiguous view of `length` nucleotides starting at `pos`. Borrowed
    /// for dense storage, decoded for compact storage.
    pub fn slice(&self, pos: Pos, length: usize) -> Cow<'_, [u8]> {
        debug_assert!(pos + length <= self.size());
        match &self.storage {
            Storage::Dense(data) => Cow::Borrowed(&data[pos..pos + length]),
            Storage::Compact { .. } => Cow::Owned(
                (pos..pos + length).map(|i| self.char_at(i)).collect(),
            ),
        }
    }

    fn canonical_parts(&self) -> Option<(String, String, char)> {
        match consume_canonical_name(&self.name) {
            Ok(("", (genome, chromosome, flag))) => {
                Some((genome.to_owned(), chromosome.to_owned(), flag))
            }
            _ => None,
        }
    }

    /// Genome part of a canonical name, empty otherwise.
    pub fn genome(&self) -> String {
        self.canonical_parts().map(|x| x.0).unwrap_or_default()
    }

    /// Chromosome part of a canonical name, empty otherwise.
    pub fn chromosome(&self) -> String {
        self.canonical_parts().map(|x| x.1).unwrap_or_default()
    }

    /// Whether the chromosome is circular. Errors on non-canonical names.
    pub fn circular(&self) -> PanResult<bool> {
        self.canonical_parts().map(|x| x.2 == 'c').ok_or_else(|| {
            PanError::Validation(format!(
                "bad name to deduce linear/circular: {}",
                self.name
            ))
        })
    }
}

/// Key for maps and ordered containers holding per-sequence data. Equality
/// and hashing follow the `Arc` identity, ordering is by name first so that
/// iteration over keyed structures is deterministic.
#[derive(Debug, Clone)]
pub struct SeqRef(pub Arc<Sequence>);

impl SeqRef {
    fn ptr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for SeqRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SeqRef {}

impl std::hash::Hash for SeqRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ptr().hash(state);
    }
}

impl PartialOrd for SeqRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeqRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .name()
            .cmp(other.0.name())
            .then_with(|| self.ptr().cmp(&other.ptr()))
    }
}
