//! Reconstruction results and archive output.

use std::collections::BTreeMap;
use std::io::{Seek, Write};

use bytes::Bytes;
use zip::write::SimpleFileOptions;

use crate::error::Result;

/// An entry that could not be included in an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryFailure {
    pub key: String,
    pub reason: String,
}

/// What an export produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Entries written (or assembled), including injected ones.
    pub written: usize,
    /// Class keys that were re-encoded rather than copied verbatim.
    pub reencoded: Vec<String>,
    pub failures: Vec<EntryFailure>,
    /// Errors returned by export collaborators.
    pub injection_failures: Vec<String>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.injection_failures.is_empty()
    }
}

/// Assembled export contents, keyed by output entry name.
#[derive(Clone, Debug, Default)]
pub struct Export {
    pub entries: BTreeMap<String, Bytes>,
    pub report: ExportReport,
}

/// Write `entries` as a ZIP archive, one file per entry, in key order.
pub(crate) fn write_archive<W: Write + Seek>(
    writer: W,
    entries: &BTreeMap<String, Bytes>,
) -> Result<W> {
    let mut zip = zip::ZipWriter::new(writer);
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data).map_err(zip::result::ZipError::Io)?;
    }
    Ok(zip.finish()?)
}
