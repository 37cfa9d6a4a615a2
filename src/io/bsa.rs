use std::io::{BufRead, Write};

use indexmap::IndexMap;

use crate::block_set::{BlockSet, BlockSetAlignment, BsaRow};
use crate::errs::{PanError, PanResult};
use crate::fragment::FragmentId;
use crate::parsing_utils::parse_fragment_id;
use crate::util::{Ori, TAB};
use crate::validate;

/// Read block-set alignments. Line format:
/// `{bsa_name}\t{seq_name}\t{ori}\t{fragment ids, '-' for gap columns}`.
/// Fragment ids must name fragments already present in `bs`.
pub fn read_bsa<R: BufRead>(bs: &mut BlockSet, input: R) -> PanResult<()> {
    let mut alignments: IndexMap<String, BlockSetAlignment> =
        IndexMap::new();
    for line in input.lines() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(TAB).collect();
        validate!(fields.len() == 4, "bad blockset alignment line: {line}");
        let (bsa_name, seq_name, ori_raw, ids) =
            (fields[0], fields[1], fields[2], fields[3]);
        let ori = ori_raw
            .parse::<i64>()
            .ok()
            .and_then(Ori::from_value)
            .ok_or_else(|| {
                PanError::Validation(format!("bad ori: {ori_raw}"))
            })?;
        let mut fragments: Vec<Option<FragmentId>> = Vec::new();
        for id in ids.split_whitespace() {
            if id == "-" {
                fragments.push(None);
                continue;
            }
            let (id_seq, min_pos, max_pos, id_ori) = parse_fragment_id(id)?;
            validate!(
                id_seq == seq_name,
                "fragment {id} on a foreign row of {seq_name}"
            );
            let found = bs.fragment_ids().into_iter().find(|fid| {
                let f = bs.fragment(*fid);
                f.seq().name() == id_seq
                    && f.min_pos() == min_pos
                    && f.max_pos() == max_pos
                    && f.ori() == id_ori
            });
            let fid = found.ok_or_else(|| {
                PanError::Validation(format!("unknown fragment: {id}"))
            })?;
            fragments.push(Some(fid));
        }
        alignments
            .entry(bsa_name.to_owned())
            .or_default()
            .rows
            .insert(seq_name.to_owned(), BsaRow { ori, fragments });
    }
    for (name, bsa) in alignments {
        let mut lengths =
            bsa.rows.values().map(|row| row.fragments.len());
        if let Some(first) = lengths.next() {
            validate!(
                lengths.all(|l| l == first),
                "rows of blockset alignment {name} differ in length"
            );
        }
        bs.add_bsa(&name, bsa);
    }
    Ok(())
}

pub fn write_bsa<W: Write>(bs: &BlockSet, out: &mut W) -> PanResult<()> {
    for (name, bsa) in bs.bsas() {
        for (seq_name, row) in &bsa.rows {
            let ids = row
                .fragments
                .iter()
                .map(|slot| match slot {
                    Some(fid) => bs.fragment(*fid).id(),
                    None => "-".to_owned(),
                })
                .collect::<Vec<String>>()
                .join(" ");
            writeln!(
                out,
                "{name}{TAB}{seq_name}{TAB}{}{TAB}{ids}",
                row.ori
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod bsa_tests {
    use super::*;
    use crate::block::Block;
    use crate::fragment::Fragment;
    use crate::sequence::Sequence;

    #[test]
    fn test_round_trip() {
        let s1 = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        let b = bs.insert_block(Block::named("b"));
        bs.insert_fragment(b, Fragment::forward(s1.clone(), 0, 5));
        bs.insert_fragment(b, Fragment::forward(s1.clone(), 6, 11));
        let text = "chr\ts1\t1\ts1_0_5_1 - s1_6_11_1\n";
        read_bsa(&mut bs, text.as_bytes()).unwrap();
        let bsa = bs.bsa("chr").unwrap();
        assert_eq!(bsa.rows.len(), 1);
        assert_eq!(bsa.rows["s1"].fragments.len(), 3);
        assert!(bsa.rows["s1"].fragments[1].is_none());
        let mut raw = Vec::new();
        write_bsa(&bs, &mut raw).unwrap();
        assert_eq!(String::from_utf8(raw).unwrap(), text);
    }

    #[test]
    fn test_unknown_fragment_rejected() {
        let s1 = Sequence::in_memory("s1", "tggtccgagcggacggcc");
        let mut bs = BlockSet::new();
        bs.add_sequence(s1);
        let text = "chr\ts1\t1\ts1_0_5_1\n";
        assert!(read_bsa(&mut bs, text.as_bytes()).is_err());
    }
}
