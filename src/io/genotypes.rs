// One observation per line: `0 1 1` tokens or a compact `011` string.
use anyhow::{Context, Result, bail};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::io::{data_lines, read_to_string};

fn parse_bit(token: &str, line_no: usize) -> Result<bool> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => bail!("line {line_no}: expected 0 or 1, got {token:?}"),
    }
}

pub fn parse_genotypes(content: &str) -> Result<Array2<bool>> {
    let mut data = Vec::new();
    let mut width: Option<usize> = None;
    let mut rows = 0usize;

    for (line_no, line) in data_lines(content) {
        let row: Vec<bool> = if line.contains(char::is_whitespace) {
            line.split_whitespace()
                .map(|t| parse_bit(t, line_no))
                .collect::<Result<_>>()?
        } else {
            line.chars()
                .map(|c| parse_bit(c.encode_utf8(&mut [0u8; 4]), line_no))
                .collect::<Result<_>>()?
        };
        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                bail!("line {line_no}: row has {} events, expected {w}", row.len())
            }
            Some(_) => {}
        }
        data.extend(row);
        rows += 1;
    }

    let Some(width) = width else {
        bail!("no genotypes found");
    };
    Array2::from_shape_vec((rows, width), data).context("failed to reshape genotype matrix")
}

pub fn read_genotypes(path: &Path) -> Result<Array2<bool>> {
    let content = read_to_string(path)?;
    parse_genotypes(&content).with_context(|| format!("failed to parse genotypes {:?}", path))
}

pub fn write_genotypes(path: &Path, genotypes: &Array2<bool>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut w = BufWriter::new(file);
    for row in genotypes.outer_iter() {
        let line: Vec<&str> = row.iter().map(|&b| if b { "1" } else { "0" }).collect();
        writeln!(w, "{}", line.join(" "))?;
    }
    w.flush()?;
    Ok(())
}

pub fn parse_values(content: &str) -> Result<Vec<f64>> {
    data_lines(content)
        .map(|(line_no, line)| {
            line.parse::<f64>()
                .with_context(|| format!("line {line_no}: invalid number {line:?}"))
        })
        .collect()
}

pub fn read_values(path: &Path) -> Result<Vec<f64>> {
    let content = read_to_string(path)?;
    parse_values(&content).with_context(|| format!("failed to parse {:?}", path))
}

pub fn write_values(path: &Path, values: &[f64]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut w = BufWriter::new(file);
    for v in values {
        writeln!(w, "{v:.10e}")?;
    }
    w.flush()?;
    Ok(())
}
