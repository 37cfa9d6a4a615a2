use crate::block_set::BlockView;
use crate::sequence::char_to_code;

pub const LETTERS_NUMBER: usize = 4;

/// Column-wise statistics of a block alignment.
#[derive(Debug, Clone, Default)]
pub struct AlignmentStat {
    pub ident_nogap: usize,
    pub ident_gap: usize,
    pub noident_nogap: usize,
    pub noident_gap: usize,
    pub pure_gap: usize,
    pub total: usize,
    pub spreading: f64,
    pub alignment_rows: usize,
    pub min_fragment_length: usize,
    pub letter_counts: [usize; LETTERS_NUMBER],
}

impl AlignmentStat {
    pub fn letter_count(&self, letter: u8) -> usize {
        self.letter_counts[char_to_code(letter) as usize]
    }

    /// GC content of the letters seen, -1.0 if none.
    pub fn gc(&self) -> f64 {
        let gc = (self.letter_count(b'g') + self.letter_count(b'c')) as f64;
        let at = (self.letter_count(b'a') + self.letter_count(b't')) as f64;
        if gc + at > 0.0 {
            gc / (gc + at)
        } else {
            -1.0
        }
    }
}

/// Classify one column: identical letters, any gap, only gaps. Letter
/// counts are accumulated into `letter_counts`.
pub fn test_column(
    view: &BlockView<'_>,
    col: usize,
    letter_counts: &mut [usize; LETTERS_NUMBER],
) -> (bool, bool, bool) {
    let mut seen_letter = None;
    let mut ident = true;
    let mut gap = false;
    for (_, f) in view.fragments() {
        match f.alignment_at(col) {
            None => gap = true,
            Some(c) => {
                match seen_letter {
                    None => seen_letter = Some(c),
                    Some(seen) if seen != c => ident = false,
                    _ => {}
                }
                letter_counts[char_to_code(c) as usize] += 1;
            }
        }
    }
    (ident, gap, seen_letter.is_none())
}

/// Walk columns `[start, stop]` (`stop = None` is the last column) and
/// gather the alignment statistics of the block.
pub fn make_stat(
    view: &BlockView<'_>,
    start: usize,
    stop: Option<usize>,
) -> AlignmentStat {
    let alignment_length = view.alignment_length();
    let stop = stop.unwrap_or(alignment_length.saturating_sub(1));
    let mut stat = AlignmentStat::default();
    if alignment_length > 0 && start <= stop {
        stat.total = stop - start + 1;
        for col in start..=stop {
            let (ident, gap, pure_gap) =
                test_column(view, col, &mut stat.letter_counts);
            if pure_gap {
                stat.pure_gap += 1;
            } else {
                match (ident, gap) {
                    (true, false) => stat.ident_nogap += 1,
                    (true, true) => stat.ident_gap += 1,
                    (false, false) => stat.noident_nogap += 1,
                    (false, true) => stat.noident_gap += 1,
                }
            }
        }
    }
    let lengths: Vec<usize> =
        view.fragments().map(|(_, f)| f.length()).collect();
    stat.alignment_rows = view.alignment_rows();
    if !lengths.is_empty() {
        let max_length = *lengths.iter().max().unwrap();
        let min_length = *lengths.iter().min().unwrap();
        let avg_length =
            lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
        stat.spreading = if avg_length == 0.0 {
            0.0
        } else {
            (max_length - min_length) as f64 / avg_length
        };
        stat.min_fragment_length = min_length;
    }
    stat
}

/// Identity with gapped identical columns counted half; pure-gap columns
/// are not part of the total.
pub fn block_identity(stat: &AlignmentStat) -> f64 {
    let accepted = stat.ident_nogap as f64 + stat.ident_gap as f64 / 2.0;
    let total = stat.ident_nogap
        + stat.ident_gap
        + stat.noident_nogap
        + stat.noident_gap;
    if total > 0 {
        accepted / total as f64
    } else {
        0.0
    }
}

/// Proportion of gap columns among counted columns.
pub fn gap_portion(stat: &AlignmentStat) -> f64 {
    if stat.total == 0 {
        return 0.0;
    }
    (stat.ident_gap + stat.noident_gap + stat.pure_gap) as f64
        / stat.total as f64
}
