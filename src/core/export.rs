use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use csv::{Terminator, WriterBuilder};
use tracing::{debug, info};

use super::types::AmortizationRow;
use crate::error::Error;

pub const EXPORT_FILE_NAME: &str = "amortization_schedule.csv";
pub const DEFAULT_DELIMITER: u8 = b',';

/// Header of field names, then one line per period. `None` for an empty
/// schedule.
pub fn to_delimited_text(
    schedule: &[AmortizationRow],
    delimiter: u8,
) -> Result<Option<String>, Error> {
    if schedule.is_empty() {
        return Ok(None);
    }

    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(vec![]);
    wtr.write_record(AmortizationRow::FIELDS)?;
    for row in schedule {
        wtr.write_record(row.values())?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| Error::Export(format!("CSV writer error: {}", e)))?;

    Ok(Some(String::from_utf8(data)?))
}

/// Writes the schedule to `EXPORT_FILE_NAME` inside `dir`. Nothing is written
/// for an empty schedule.
pub fn save_schedule(
    schedule: &[AmortizationRow],
    dir: &Path,
    delimiter: u8,
) -> Result<Option<PathBuf>, Error> {
    let Some(text) = to_delimited_text(schedule, delimiter)? else {
        debug!("empty schedule, nothing to export");
        return Ok(None);
    };

    let target = dir.join(EXPORT_FILE_NAME);
    let mut staged = StagedFile::create(&target)?;
    staged.write_all(text.as_bytes())?;
    staged.commit()?;

    info!("exported {} rows to {}", schedule.len(), target.display());
    Ok(Some(target))
}

/// A file written under a temporary name and moved into place on commit.
/// Dropping it uncommitted closes the handle and removes the partial file.
struct StagedFile {
    staging: PathBuf,
    target: PathBuf,
    writer: Option<BufWriter<File>>,
    committed: bool,
}

impl StagedFile {
    fn create(target: &Path) -> io::Result<Self> {
        let staging = target.with_extension("csv.part");
        let file = File::create(&staging)?;
        Ok(Self {
            staging,
            target: target.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            committed: false,
        })
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_all(bytes),
            None => Err(io::Error::other("staged file already closed")),
        }
    }

    fn commit(mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        fs::rename(&self.staging, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.writer.take();
        if !self.committed {
            let _ = fs::remove_file(&self.staging);
        }
    }
}
