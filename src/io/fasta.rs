use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::errs::PanResult;
use crate::sequence::{Sequence, StorageMode};

const LINE_WIDTH: usize = 60;

/// Read all FASTA records from the stream. Bases are lowercased and
/// non-`atgc` characters dropped; records that end up empty terminate the
/// stream.
pub fn read_fasta<R: BufRead>(
    input: R,
    mode: StorageMode,
) -> PanResult<Vec<Arc<Sequence>>> {
    let mut result = Vec::new();
    let mut header: Option<(String, String)> = None;
    let mut text = String::new();
    let mut finish = |header: Option<(String, String)>,
                      text: &mut String,
                      result: &mut Vec<Arc<Sequence>>|
     -> bool {
        match header {
            Some((name, description)) => {
                let seq =
                    Sequence::new(name, description, mode, text.as_str());
                text.clear();
                if seq.size() > 0 {
                    result.push(Arc::new(seq));
                    true
                } else {
                    false
                }
            }
            None => true,
        }
    };
    for line in input.lines() {
        let line = line?;
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix('>') {
            if !finish(header.take(), &mut text, &mut result) {
                return Ok(result);
            }
            let mut parts = rest.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or("").to_owned();
            let description =
                parts.next().map(|d| d.trim().to_owned()).unwrap_or_default();
            header = Some((name, description));
        } else {
            text.push_str(line);
        }
    }
    finish(header.take(), &mut text, &mut result);
    Ok(result)
}

/// Write one sequence as FASTA, wrapped to 60 columns.
pub fn write_fasta<W: Write>(
    out: &mut W,
    name: &str,
    description: &str,
    text: &str,
) -> PanResult<()> {
    if description.is_empty() {
        writeln!(out, ">{name}")?;
    } else {
        writeln!(out, ">{name} {description}")?;
    }
    let bytes = text.as_bytes();
    for chunk in bytes.chunks(LINE_WIDTH) {
        out.write_all(chunk)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

pub fn write_sequence<W: Write>(
    out: &mut W,
    seq: &Sequence,
) -> PanResult<()> {
    let text: String =
        (0..seq.size()).map(|i| seq.char_at(i) as char).collect();
    write_fasta(out, seq.name(), seq.description(), &text)
}

#[cfg(test)]
mod fasta_tests {
    use super::*;

    #[test]
    fn test_read_normalizes_and_splits() {
        let data = ">s1 first record\nTGGTCC\nGAGNNC\n>s2\natgc\n";
        let seqs = read_fasta(data.as_bytes(), StorageMode::Dense).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].name(), "s1");
        assert_eq!(seqs[0].description(), "first record");
        assert_eq!(seqs[0].size(), 11);
        assert_eq!(seqs[0].char_at(0), b't');
        assert_eq!(seqs[1].name(), "s2");
        assert_eq!(seqs[1].size(), 4);
    }

    #[test]
    fn test_empty_record_terminates() {
        let data = ">s1\natgc\n>empty\n\n>s2\natgc\n";
        let seqs = read_fasta(data.as_bytes(), StorageMode::Dense).unwrap();
        assert_eq!(seqs.len(), 1);
        assert_eq!(seqs[0].name(), "s1");
    }

    #[test]
    fn test_round_trip() {
        let text = "tggtccgagcggacggcc".repeat(5);
        let mut raw = Vec::new();
        write_fasta(&mut raw, "s1", "desc", &text).unwrap();
        let seqs = read_fasta(raw.as_slice(), StorageMode::Compact).unwrap();
        assert_eq!(seqs.len(), 1);
        let read_back: String =
            (0..seqs[0].size()).map(|i| seqs[0].char_at(i) as char).collect();
        assert_eq!(read_back, text);
        // wrapped lines
        let printed = String::from_utf8(raw).unwrap();
        assert!(printed.lines().skip(1).all(|l| l.len() <= 60));
    }
}
