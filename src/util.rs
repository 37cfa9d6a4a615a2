use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};

pub(crate) const TAB: char = '\t';
pub(crate) const GAP: u8 = b'-';

/// Nucleotide positions inside a sequence.
pub type Pos = usize;

/// Strand of a fragment relative to its sequence.
///
/// `Reverse` sorts before `Forward`, matching the numeric order of the
/// `-1`/`+1` values used in text formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum Ori {
    Reverse = -1,
    Forward = 1,
}

impl Ori {
    pub fn value(&self) -> i64 {
        *self as i8 as i64
    }

    pub fn from_value(v: i64) -> Option<Ori> {
        match v {
            1 => Some(Ori::Forward),
            -1 => Some(Ori::Reverse),
            _ => None,
        }
    }

    pub fn inverse(&self) -> Ori {
        match self {
            Ori::Forward => Ori::Reverse,
            Ori::Reverse => Ori::Forward,
        }
    }

    /// Combine two relative orientations.
    pub fn times(&self, other: Ori) -> Ori {
        if *self == other {
            Ori::Forward
        } else {
            Ori::Reverse
        }
    }
}

impl std::fmt::Display for Ori {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[inline]
pub fn complement(c: u8) -> u8 {
    bio::alphabets::dna::complement(c)
}

pub(crate) fn get_ticker() -> ProgressBar {
    let ticker = ProgressBar::new_spinner();
    ticker.set_style(ProgressStyle::with_template("> {pos} {msg}").unwrap());
    ticker
}

pub(crate) fn get_master_progress_bar<
    T: num_traits::Num + num_traits::cast::AsPrimitive<u64>,
>(
    n: T,
) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.green/yellow} {pos:>7}/{len:7} {msg}",
    )
    .unwrap()
    .progress_chars("##-");
    ProgressBar::new(n.as_()).with_style(style)
}

/// Directory for scratch files, `NPGE_TMP` overrides the system default.
pub fn tmp_dir() -> PathBuf {
    std::env::var("NPGE_TMP")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

/// Named scratch file in `tmp_dir()`, removed on drop.
pub fn temp_file() -> std::io::Result<tempfile::NamedTempFile> {
    tempfile::NamedTempFile::new_in(tmp_dir())
}

pub(crate) fn median<T: Copy + Ord>(values: &[T]) -> Option<T> {
    let mut sorted = values.to_vec();
    sorted.sort();
    if sorted.is_empty() {
        None
    } else {
        Some(sorted[sorted.len() / 2])
    }
}

#[cfg(test)]
mod util_tests {
    use super::*;

    #[test]
    fn test_ori_order_and_arithmetic() {
        assert!(Ori::Reverse < Ori::Forward);
        assert_eq!(Ori::Forward.value(), 1);
        assert_eq!(Ori::Reverse.value(), -1);
        assert_eq!(Ori::Reverse.times(Ori::Reverse), Ori::Forward);
        assert_eq!(Ori::Reverse.times(Ori::Forward), Ori::Reverse);
        assert_eq!(Ori::from_value(-1), Some(Ori::Reverse));
        assert_eq!(Ori::from_value(0), None);
    }

    #[test]
    fn test_complement_lowercase() {
        assert_eq!(complement(b'a'), b't');
        assert_eq!(complement(b't'), b'a');
        assert_eq!(complement(b'g'), b'c');
        assert_eq!(complement(b'c'), b'g');
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3usize, 1, 2]), Some(2));
        assert_eq!(median(&[4usize, 1, 3, 2]), Some(3));
        assert_eq!(median::<usize>(&[]), None);
    }

    #[test]
    fn test_tmp_dir_env_override() {
        std::env::set_var("NPGE_TMP", std::env::temp_dir());
        assert_eq!(tmp_dir(), std::env::temp_dir());
        let scratch = temp_file().unwrap();
        assert!(scratch.path().starts_with(std::env::temp_dir()));
        std::env::remove_var("NPGE_TMP");
    }
}
