use nom::bytes::complete::{is_not, tag};
use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{map_res, opt, recognize};
use nom::sequence::{pair, tuple};
use nom::IResult;

use crate::errs::{PanError, PanResult};
use crate::util::{Ori, Pos};

pub(crate) fn consume_word(raw: &str) -> IResult<&str, &str> {
    is_not("&\t ")(raw)
}

pub(crate) fn consume_pos(raw: &str) -> IResult<&str, Pos> {
    map_res(digit1, |x: &str| x.parse::<Pos>())(raw)
}

pub(crate) fn consume_ori(raw: &str) -> IResult<&str, Ori> {
    map_res(recognize(pair(opt(char('-')), digit1)), |x: &str| {
        x.parse::<i64>()
            .map_err(|e| e.to_string())
            .and_then(|v| Ori::from_value(v).ok_or(format!("bad ori {v}")))
    })(raw)
}

/// Canonical sequence name, `{genome}&{chromosome}&{c|l}`.
pub(crate) fn consume_canonical_name(
    raw: &str,
) -> IResult<&str, (&str, &str, char)> {
    map_res(
        tuple((
            consume_word,
            tag("&"),
            consume_word,
            tag("&"),
            one_of("cl"),
        )),
        |(genome, _, chromosome, _, flag)| {
            Ok::<_, String>((genome, chromosome, flag))
        },
    )(raw)
}

/// Fragment coordinates of a block file record,
/// `{seq_name}&{min_pos}&{max_pos}&{ori}`. The sequence name may itself
/// contain `&`, so the last three fields are taken from the right.
pub fn parse_fragment_coords(raw: &str) -> PanResult<(&str, Pos, Pos, Ori)> {
    let mut parts = raw.rsplitn(4, '&');
    let bad = || PanError::Validation(format!("bad fragment record: {raw}"));
    let ori_raw = parts.next().ok_or_else(bad)?;
    let max_raw = parts.next().ok_or_else(bad)?;
    let min_raw = parts.next().ok_or_else(bad)?;
    let name = parts.next().ok_or_else(bad)?;
    let (rest, ori) = consume_ori(ori_raw).map_err(|_| bad())?;
    let (rest_max, max_pos) = consume_pos(max_raw).map_err(|_| bad())?;
    let (rest_min, min_pos) = consume_pos(min_raw).map_err(|_| bad())?;
    if !rest.is_empty() || !rest_max.is_empty() || !rest_min.is_empty() {
        return Err(bad());
    }
    Ok((name, min_pos, max_pos, ori))
}

/// Fragment id, `{seq_name}_{min_pos}_{max_pos}_{ori}`. Underscores may
/// occur in the sequence name, fields are taken from the right.
pub fn parse_fragment_id(raw: &str) -> PanResult<(&str, Pos, Pos, Ori)> {
    let mut parts = raw.rsplitn(4, '_');
    let bad = || PanError::Validation(format!("bad fragment id: {raw}"));
    let ori_raw = parts.next().ok_or_else(bad)?;
    let max_raw = parts.next().ok_or_else(bad)?;
    let min_raw = parts.next().ok_or_else(bad)?;
    let name = parts.next().ok_or_else(bad)?;
    let (_, ori) = consume_ori(ori_raw).map_err(|_| bad())?;
    let (_, max_pos) = consume_pos(max_raw).map_err(|_| bad())?;
    let (_, min_pos) = consume_pos(min_raw).map_err(|_| bad())?;
    Ok((name, min_pos, max_pos, ori))
}
