use crate::error::Error;

/// What the reviewer asked for after looking at the first pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Ids(Vec<u32>),
    Cancel,
}

/// Parses reviewer input against the sorted list of discovered ids.
///
/// Accepts comma separated 1-based positions into `ids`, `all`, or
/// `q`/`quit`. The picked ids come back sorted without duplicates.
pub fn parse_selection(input: &str, ids: &[u32]) -> Result<Selection, Error> {
    let input = input.trim();

    match input.to_ascii_lowercase().as_str() {
        "q" | "quit" => return Ok(Selection::Cancel),
        "all" => {
            if ids.is_empty() {
                return Err(Error::Selection("no players were detected".into()));
            }
            let mut all = ids.to_vec();
            all.sort_unstable();
            all.dedup();
            return Ok(Selection::Ids(all));
        }
        _ => (),
    }

    let mut picked = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let pos: usize = part
            .parse()
            .map_err(|_| Error::Selection(format!("`{}` is not a number", part)))?;

        if pos == 0 || pos > ids.len() {
            return Err(Error::Selection(format!(
                "{} is out of range, expected 1..={}",
                pos,
                ids.len()
            )));
        }

        picked.push(ids[pos - 1]);
    }

    if picked.is_empty() {
        return Err(Error::Selection("nothing selected".into()));
    }

    picked.sort_unstable();
    picked.dedup();

    Ok(Selection::Ids(picked))
}
