// First data line is p; then one `u v` edge per line, 1-based; a lone `0`
// ends the list.
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

use crate::io::{data_lines, read_to_string};
use crate::poset::Poset;

pub fn parse_poset(content: &str) -> Result<Poset> {
    let mut lines = data_lines(content);
    let (first, header) = lines.next().context("poset file is empty")?;
    let p: usize = header
        .parse()
        .with_context(|| format!("line {first}: expected the number of events, got {header:?}"))?;

    let mut edges = Vec::new();
    for (line_no, line) in lines {
        if line == "0" {
            break;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            bail!("line {line_no}: expected an edge `u v`, got {line:?}");
        }
        let mut ends = [0usize; 2];
        for (slot, field) in ends.iter_mut().zip(&fields) {
            let v: usize = field
                .parse()
                .with_context(|| format!("line {line_no}: invalid event index {field:?}"))?;
            if v == 0 || v > p {
                bail!("line {line_no}: event index {v} is outside 1..={p}");
            }
            *slot = v - 1;
        }
        edges.push((ends[0], ends[1]));
    }
    Ok(Poset::from_edges(p, &edges)?)
}

pub fn read_poset(path: &Path) -> Result<Poset> {
    let content = read_to_string(path)?;
    parse_poset(&content).with_context(|| format!("failed to parse poset {:?}", path))
}

pub fn format_poset(poset: &Poset) -> String {
    let mut out = format!("{}\n", poset.n_events());
    for (u, v) in poset.edges() {
        out.push_str(&format!("{} {}\n", u + 1, v + 1));
    }
    out.push_str("0\n");
    out
}

pub fn write_poset(path: &Path, poset: &Poset) -> Result<()> {
    fs::write(path, format_poset(poset)).with_context(|| format!("failed to write {:?}", path))
}
