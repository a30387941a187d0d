//! CSV export of learning curves.
//!
//! The record has a header `id,Reward` followed by one row per recorded
//! sample: a 1-based index and the cumulative reward at that point. Rewards
//! always carry a decimal part (`5.0`, `12.5`) so the files plot the same in
//! any tool.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use csv::Writer;
use tracing::info;

use crate::error::{Error, Result};

fn format_reward(reward: f64) -> String {
    format!("{:?}", reward)
}

pub fn write_cumulative_rewards<W: Write>(writer: W, samples: &[f64]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(&["id", "Reward"])?;
    for (i, reward) in samples.iter().enumerate() {
        wtr.write_record(&[(i + 1).to_string(), format_reward(*reward)])?;
    }
    wtr.flush().map_err(|source| Error::Io {
        operation: "flush cumulative rewards".to_string(),
        source,
    })
}

pub fn render_cumulative_rewards(samples: &[f64]) -> Result<String> {
    let mut buffer = Vec::new();
    write_cumulative_rewards(&mut buffer, samples)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Writes the record to `path`, replacing any existing file.
pub fn dump_cumulative_rewards(path: impl AsRef<Path>, samples: &[f64]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| Error::Io {
        operation: format!("create {}", path.display()),
        source,
    })?;
    write_cumulative_rewards(BufWriter::new(file), samples)?;
    info!(path = %path.display(), samples = samples.len(), "wrote cumulative rewards");
    Ok(())
}
