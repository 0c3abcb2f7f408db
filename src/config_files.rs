use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::importer::require_file;

#[derive(Debug, Clone, Deserialize, Serialize)]
struct InitialPrice {
    date: String,
    symbol: String,
    price: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SpinOff {
    dst: String,
    src: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMergeSummary {
    pub read: usize,
    pub written: usize,
    pub replaced: usize,
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    require_file(path)?;
    let mut rdr = csv::Reader::from_path(path)?;
    rdr.deserialize()
        .map(|row| {
            row.map_err(|e| ToolError::InvalidConfig {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Merge `date,symbol,price` files. The last price for a (date, symbol) wins.
pub fn merge_initial_prices(files: &[PathBuf], output: &Path) -> Result<ConfigMergeSummary> {
    let mut prices: BTreeMap<(String, String), String> = BTreeMap::new();
    let mut read = 0;
    let mut replaced = 0;
    for path in files {
        for row in read_rows::<InitialPrice>(path)? {
            read += 1;
            if let Some(old) = prices.insert((row.date.clone(), row.symbol.clone()), row.price.clone()) {
                debug!("duplicate price {} {}: {old} replaced by {}", row.date, row.symbol, row.price);
                replaced += 1;
            }
        }
    }
    let written = prices.len();
    write_rows(
        output,
        &["date", "symbol", "price"],
        prices
            .into_iter()
            .map(|((date, symbol), price)| InitialPrice { date, symbol, price }),
    )?;
    Ok(ConfigMergeSummary { read, written, replaced })
}

/// Merge `dst,src` files. The last source for a destination wins.
pub fn merge_spin_offs(files: &[PathBuf], output: &Path) -> Result<ConfigMergeSummary> {
    let mut spin_offs: BTreeMap<String, String> = BTreeMap::new();
    let mut read = 0;
    let mut replaced = 0;
    for path in files {
        for row in read_rows::<SpinOff>(path)? {
            read += 1;
            if let Some(old) = spin_offs.insert(row.dst.clone(), row.src.clone()) {
                debug!("duplicate spin-off {}: {old} replaced by {}", row.dst, row.src);
                replaced += 1;
            }
        }
    }
    let written = spin_offs.len();
    write_rows(
        output,
        &["dst", "src"],
        spin_offs.into_iter().map(|(dst, src)| SpinOff { dst, src }),
    )?;
    Ok(ConfigMergeSummary { read, written, replaced })
}
