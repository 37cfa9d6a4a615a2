use bitvec::prelude::*;
use rustc_hash::FxHashMap;

use crate::errs::{PanError, PanResult};
use crate::util::GAP;

/// Row representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowKind {
    /// One bit per column plus a rank index, cheap for long rows.
    #[default]
    Compact,
    /// Explicit maps in both directions.
    Map,
}

impl RowKind {
    pub fn parse(raw: &str) -> PanResult<RowKind> {
        match raw {
            "compact" => Ok(RowKind::Compact),
            "map" => Ok(RowKind::Map),
            _ => Err(PanError::Validation(format!("bad row type: {raw}"))),
        }
    }
}

/// Mapping between alignment columns and fragment positions.
///
/// Non-gap columns enumerate the fragment's residues in order. All rows of
/// one block have the same length.
#[derive(Debug, Clone)]
pub enum AlignmentRow {
    Compact(CompactRow),
    Map(MapRow),
}

impl AlignmentRow {
    pub fn new(kind: RowKind) -> AlignmentRow {
        match kind {
            RowKind::Compact => AlignmentRow::Compact(CompactRow::default()),
            RowKind::Map => AlignmentRow::Map(MapRow::default()),
        }
    }

    pub fn from_text(kind: RowKind, text: &str) -> AlignmentRow {
        let mut row = AlignmentRow::new(kind);
        row.grow(text);
        row
    }

    pub fn kind(&self) -> RowKind {
        match self {
            AlignmentRow::Compact(_) => RowKind::Compact,
            AlignmentRow::Map(_) => RowKind::Map,
        }
    }

    /// Number of alignment columns.
    pub fn length(&self) -> usize {
        match self {
            AlignmentRow::Compact(row) => row.bits.len(),
            AlignmentRow::Map(row) => row.length,
        }
    }

    /// Number of non-gap columns.
    pub fn fragment_length(&self) -> usize {
        match self {
            AlignmentRow::Compact(row) => row.ones,
            AlignmentRow::Map(row) => row.frag_to_col.len(),
        }
    }

    /// Fragment position shown at `col`, `None` for a gap.
    pub fn map_to_fragment(&self, col: usize) -> Option<usize> {
        if col >= self.length() {
            return None;
        }
        match self {
            AlignmentRow::Compact(row) => {
                row.bits[col].then(|| row.rank(col))
            }
            AlignmentRow::Map(row) => {
                row.col_to_frag.get(&(col as u32)).map(|x| *x as usize)
            }
        }
    }

    /// Column of fragment position `pos`. `pos == fragment_length()` maps to
    /// `length()`, which lets boundaries travel through rows.
    pub fn map_to_alignment(&self, pos: usize) -> usize {
        debug_assert!(pos <= self.fragment_length());
        if pos == self.fragment_length() {
            return self.length();
        }
        match self {
            AlignmentRow::Compact(row) => row.select(pos),
            AlignmentRow::Map(row) => row.frag_to_col[pos] as usize,
        }
    }

    /// Number of residues before column `col` (a boundary mapping, defined
    /// on gap columns too, `col` may equal `length()`).
    pub fn fragment_boundary(&self, col: usize) -> usize {
        debug_assert!(col <= self.length());
        match self {
            AlignmentRow::Compact(row) => row.rank(col),
            AlignmentRow::Map(row) => {
                row.frag_to_col.partition_point(|c| (*c as usize) < col)
            }
        }
    }

    /// Append columns; `-` denotes a gap.
    pub fn grow(&mut self, text: &str) {
        for c in text.bytes() {
            let residue = c != GAP;
            match self {
                AlignmentRow::Compact(row) => row.push(residue),
                AlignmentRow::Map(row) => row.push(residue),
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompactRow {
    bits: BitVec<u64, Lsb0>,
    // ones before each 64-column word
    word_ranks: Vec<u32>,
    ones: usize,
}

impl CompactRow {
    fn push(&mut self, residue: bool) {
        if self.bits.len() % 64 == 0 {
            self.word_ranks.push(self.ones as u32);
        }
        self.bits.push(residue);
        if residue {
            self.ones += 1;
        }
    }

    fn rank(&self, col: usize) -> usize {
        if col >= self.bits.len() {
            return self.ones;
        }
        let word = col / 64;
        let word_start = word * 64;
        self.word_ranks[word] as usize
            + self.bits[word_start..col].count_ones()
    }

    fn select(&self, pos: usize) -> usize {
        debug_assert!(pos < self.ones);
        let word = self
            .word_ranks
            .partition_point(|r| (*r as usize) <= pos)
            - 1;
        let mut seen = self.word_ranks[word] as usize;
        let word_start = word * 64;
        for col in word_start..self.bits.len() {
            if self.bits[col] {
                if seen == pos {
                    return col;
                }
                seen += 1;
            }
        }
        unreachable!("fragment position {pos} beyond row contents")
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapRow {
    frag_to_col: Vec<u32>,
    col_to_frag: FxHashMap<u32, u32>,
    length: usize,
}

impl MapRow {
    fn push(&mut self, residue: bool) {
        if residue {
            let pos = self.frag_to_col.len() as u32;
            self.frag_to_col.push(self.length as u32);
            self.col_to_frag.insert(self.length as u32, pos);
        }
        self.length += 1;
    }
}

#[cfg(test)]
mod alignment_row_tests {
    use super::*;

    fn both(text: &str) -> [AlignmentRow; 2] {
        [
            AlignmentRow::from_text(RowKind::Compact, text),
            AlignmentRow::from_text(RowKind::Map, text),
        ]
    }

    #[test]
    fn test_mapping_both_kinds() {
        for row in both("a--tg-c") {
            assert_eq!(row.length(), 7);
            assert_eq!(row.fragment_length(), 4);
            assert_eq!(row.map_to_fragment(0), Some(0));
            assert_eq!(row.map_to_fragment(1), None);
            assert_eq!(row.map_to_fragment(3), Some(1));
            assert_eq!(row.map_to_fragment(6), Some(3));
            assert_eq!(row.map_to_alignment(0), 0);
            assert_eq!(row.map_to_alignment(1), 3);
            assert_eq!(row.map_to_alignment(3), 6);
            assert_eq!(row.map_to_alignment(4), 7);
        }
    }

    #[test]
    fn test_boundaries() {
        for row in both("-at--g") {
            assert_eq!(row.fragment_boundary(0), 0);
            assert_eq!(row.fragment_boundary(1), 0);
            assert_eq!(row.fragment_boundary(2), 1);
            assert_eq!(row.fragment_boundary(3), 2);
            assert_eq!(row.fragment_boundary(5), 2);
            assert_eq!(row.fragment_boundary(6), 3);
        }
    }

    #[test]
    fn test_long_compact_row_ranks() {
        let text: String =
            (0..500).map(|i| if i % 3 == 0 { '-' } else { 'a' }).collect();
        let row = AlignmentRow::from_text(RowKind::Compact, &text);
        let map = AlignmentRow::from_text(RowKind::Map, &text);
        assert_eq!(row.fragment_length(), map.fragment_length());
        for col in 0..=500 {
            assert_eq!(row.fragment_boundary(col), map.fragment_boundary(col));
        }
        for pos in 0..row.fragment_length() {
            assert_eq!(row.map_to_alignment(pos), map.map_to_alignment(pos));
        }
    }
}
