//! Populating a workspace from its source.
//!
//! Ingestion runs once, before the workspace is handed out. It writes every
//! entry's original bytes to the backing unchanged and registers the entry as
//! a class or a resource.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use classfs_vfs::Backing;

use crate::codec::UnitCodec;
use crate::error::{Error, Result};
use crate::key::{key_path, EntryKind};
use crate::registry::Registry;
use crate::runtime::HostRuntime;

/// Where a workspace's entries come from.
#[derive(Clone)]
pub enum Source {
    /// A single compiled unit, or a ZIP archive.
    File(PathBuf),
    /// A running process.
    Live(Arc<dyn HostRuntime>),
}

impl Source {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Source::Live(_))
    }

    /// The runtime of a live source.
    pub fn runtime(&self) -> Option<&Arc<dyn HostRuntime>> {
        match self {
            Source::Live(runtime) => Some(runtime),
            Source::File(_) => None,
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => f.debug_tuple("File").field(path).finish(),
            Source::Live(_) => f.write_str("Live"),
        }
    }
}

/// A unit candidate stored as a resource because its name could not be
/// extracted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Demotion {
    pub key: String,
    pub reason: String,
}

/// An input entry or live unit that was not stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: String,
}

/// What ingestion did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub classes: usize,
    pub resources: usize,
    pub demotions: Vec<Demotion>,
    pub skipped: Vec<Skipped>,
}

pub(crate) struct Ingestor<'a, C: UnitCodec> {
    pub(crate) backing: &'a dyn Backing,
    pub(crate) registry: &'a Registry,
    pub(crate) codec: &'a C,
    pub(crate) unit_suffix: &'a str,
}

impl<C: UnitCodec> Ingestor<'_, C> {
    pub(crate) fn ingest(&self, source: &Source) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        match source {
            Source::File(path) => {
                let is_unit = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(self.unit_suffix));
                if is_unit {
                    self.ingest_unit_file(path, &mut report)?;
                } else {
                    self.ingest_archive(path, &mut report)?;
                }
            }
            Source::Live(runtime) => self.ingest_live(runtime.as_ref(), &mut report)?,
        }
        tracing::info!(
            classes = report.classes,
            resources = report.resources,
            demoted = report.demotions.len(),
            skipped = report.skipped.len(),
            "input ingested"
        );
        Ok(report)
    }

    fn ingest_unit_file(&self, path: &Path, report: &mut IngestReport) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.classify(&file_name, Bytes::from(bytes), report);
        Ok(())
    }

    fn ingest_archive(&self, path: &Path, report: &mut IngestReport) -> Result<()> {
        let file = File::open(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = zip::ZipArchive::new(file)?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            // The declared size is untrusted; let the buffer grow with the data.
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(|source| Error::File {
                path: path.to_path_buf(),
                source,
            })?;

            if name.ends_with(self.unit_suffix) {
                self.classify(&name, Bytes::from(data), report);
            } else {
                self.store(EntryKind::Resource, &name, Bytes::from(data), report);
            }
        }
        Ok(())
    }

    fn ingest_live(&self, runtime: &dyn HostRuntime, report: &mut IngestReport) -> Result<()> {
        let units = runtime.loaded_units().map_err(Error::Host)?;
        for unit in units {
            match runtime.unit_bytes(&unit) {
                Ok(Some(bytes)) => {
                    let key = self.codec.normalize_key(&unit.name);
                    self.store(EntryKind::Class, &key, bytes, report);
                }
                Ok(None) => {
                    tracing::warn!(unit = %unit.name, "no bytes available for loaded unit");
                    report.skipped.push(Skipped {
                        name: unit.name,
                        reason: "bytes unavailable".to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(unit = %unit.name, error = %e, "failed to fetch unit bytes");
                    report.skipped.push(Skipped {
                        name: unit.name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Store a unit candidate under its declared name, or demote it to a
    /// resource under `name`.
    fn classify(&self, name: &str, bytes: Bytes, report: &mut IngestReport) {
        match self.codec.declared_name(&bytes) {
            Ok(declared) => self.store(EntryKind::Class, &declared, bytes, report),
            Err(e) => {
                tracing::warn!(entry = name, error = %e, "unit could not be read, storing as resource");
                report.demotions.push(Demotion {
                    key: name.to_string(),
                    reason: e.to_string(),
                });
                self.store(EntryKind::Resource, name, bytes, report);
            }
        }
    }

    fn store(&self, kind: EntryKind, key: &str, bytes: Bytes, report: &mut IngestReport) {
        match self.admit(kind, key, bytes) {
            Ok(true) => match kind {
                EntryKind::Class => report.classes += 1,
                EntryKind::Resource => report.resources += 1,
            },
            Ok(false) => tracing::warn!(key, %kind, "duplicate entry replaced earlier one"),
            Err(e) => {
                tracing::warn!(key, error = %e, "entry skipped");
                report.skipped.push(Skipped {
                    name: key.to_string(),
                    reason: describe(&e),
                });
            }
        }
    }

    fn admit(&self, kind: EntryKind, key: &str, bytes: Bytes) -> Result<bool> {
        let path = key_path(key)?;
        let is_new = self.registry.register(kind, key)?;
        if let Err(e) = self.backing.write(&path, bytes) {
            if is_new {
                self.registry.forget(key);
            }
            return Err(Error::io(format!("writing {}", path), e));
        }
        Ok(is_new)
    }
}

fn describe(error: &Error) -> String {
    match std::error::Error::source(error) {
        Some(source) => format!("{}: {}", error, source),
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ClassFileCodec;
    use classfs_classfile::ClassFile;
    use classfs_vfs::MemoryBacking;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn ingest(source: &Source) -> (MemoryBacking, Registry, Result<IngestReport>) {
        let backing = MemoryBacking::new();
        let registry = Registry::new();
        let result = Ingestor {
            backing: &backing,
            registry: &registry,
            codec: &ClassFileCodec,
            unit_suffix: ".class",
        }
        .ingest(source);
        (backing, registry, result)
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        zip.add_directory("pkg/", SimpleFileOptions::default()).unwrap();
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn single_unit_file_registers_declared_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Whatever.class");
        let bytes = ClassFile::synthetic("pkg/Real", "java/lang/Object")
            .unwrap()
            .to_bytes();
        std::fs::write(&path, &bytes).unwrap();

        let (backing, registry, report) = ingest(&Source::file(&path));
        let report = report.unwrap();
        assert_eq!(report.classes, 1);
        assert_eq!(registry.class_keys(), vec!["pkg/Real".to_string()]);
        assert_eq!(backing.read(&key_path("pkg/Real").unwrap()).unwrap(), bytes);
    }

    #[test]
    fn corrupt_unit_file_is_demoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.class");
        std::fs::write(&path, b"not a class").unwrap();

        let (_, registry, report) = ingest(&Source::file(&path));
        let report = report.unwrap();
        assert_eq!(registry.resource_keys(), vec!["Broken.class".to_string()]);
        assert_eq!(report.demotions.len(), 1);
        assert_eq!(report.demotions[0].key, "Broken.class");
    }

    #[test]
    fn archive_entries_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.jar");
        let a = ClassFile::synthetic("pkg/A", "java/lang/Object").unwrap().to_bytes();
        write_zip(
            &path,
            &[
                ("pkg/A.class", &a[..]),
                ("B.class", &b"\xCA\xFE\xBA\xBE garbage"[..]),
                ("res.txt", &b"hello"[..]),
            ],
        );

        let (backing, registry, report) = ingest(&Source::file(&path));
        let report = report.unwrap();
        assert_eq!(registry.class_keys(), vec!["pkg/A".to_string()]);
        assert_eq!(
            registry.resource_keys(),
            vec!["B.class".to_string(), "res.txt".to_string()]
        );
        assert_eq!(report.classes, 1);
        assert_eq!(report.resources, 2);
        assert_eq!(
            report.demotions.iter().map(|d| d.key.as_str()).collect::<Vec<_>>(),
            vec!["B.class"]
        );
        assert_eq!(backing.read(&key_path("res.txt").unwrap()).unwrap(), "hello");
        assert_eq!(backing.read(&key_path("pkg/A").unwrap()).unwrap(), a);
    }

    #[test]
    fn class_key_comes_from_declared_name_not_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.zip");
        let bytes = ClassFile::synthetic("real/Name", "java/lang/Object")
            .unwrap()
            .to_bytes();
        write_zip(&path, &[("misplaced/Other.class", &bytes[..])]);

        let (_, registry, _) = ingest(&Source::file(&path));
        assert_eq!(registry.class_keys(), vec!["real/Name".to_string()]);
    }

    #[test]
    fn conflicting_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clash.zip");
        let a = ClassFile::synthetic("pkg/A", "java/lang/Object").unwrap().to_bytes();
        write_zip(
            &path,
            &[("pkg/A.class", &a[..]), ("pkg/A", &b"y"[..]), ("ok.txt", &b"z"[..])],
        );

        let (_, registry, report) = ingest(&Source::file(&path));
        let report = report.unwrap();
        assert_eq!(registry.class_keys(), vec!["pkg/A".to_string()]);
        assert_eq!(registry.resource_keys(), vec!["ok.txt".to_string()]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "pkg/A");
        assert!(report.skipped[0].reason.contains("already registered"));
    }

    /// One stored `res.txt` holding `hello`, whose central directory entry
    /// claims an uncompressed size of nearly `i64::MAX` through a zip64 extra.
    fn forged_size_archive() -> Vec<u8> {
        fn u16le(out: &mut Vec<u8>, v: u16) {
            out.extend_from_slice(&v.to_le_bytes());
        }
        fn u32le(out: &mut Vec<u8>, v: u32) {
            out.extend_from_slice(&v.to_le_bytes());
        }

        let name = b"res.txt";
        let data = b"hello";
        let crc = 0x3610_A686;
        let date = (40 << 9) | (1 << 5) | 1;

        let mut out = Vec::new();
        u32le(&mut out, 0x0403_4B50);
        u16le(&mut out, 20);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u16le(&mut out, date);
        u32le(&mut out, crc);
        u32le(&mut out, data.len() as u32);
        u32le(&mut out, data.len() as u32);
        u16le(&mut out, name.len() as u16);
        u16le(&mut out, 0);
        out.extend_from_slice(name);
        out.extend_from_slice(data);

        let central_start = out.len() as u32;
        u32le(&mut out, 0x0201_4B50);
        u16le(&mut out, 45);
        u16le(&mut out, 45);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u16le(&mut out, date);
        u32le(&mut out, crc);
        u32le(&mut out, data.len() as u32);
        u32le(&mut out, u32::MAX);
        u16le(&mut out, name.len() as u16);
        u16le(&mut out, 12);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u32le(&mut out, 0);
        u32le(&mut out, 0);
        out.extend_from_slice(name);
        u16le(&mut out, 0x0001);
        u16le(&mut out, 8);
        out.extend_from_slice(&0x7FFF_FFFF_FFFF_FF00u64.to_le_bytes());
        let central_len = out.len() as u32 - central_start;

        u32le(&mut out, 0x0605_4B50);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u16le(&mut out, 1);
        u16le(&mut out, 1);
        u32le(&mut out, central_len);
        u32le(&mut out, central_start);
        u16le(&mut out, 0);
        out
    }

    #[test]
    fn declared_entry_size_is_not_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.zip");
        std::fs::write(&path, forged_size_archive()).unwrap();

        let (backing, registry, report) = ingest(&Source::file(&path));
        assert_eq!(report.unwrap().resources, 1);
        assert_eq!(registry.resource_keys(), vec!["res.txt".to_string()]);
        assert_eq!(backing.read(&key_path("res.txt").unwrap()).unwrap(), "hello");
    }

    #[test]
    fn missing_file_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _, result) = ingest(&Source::file(dir.path().join("nope.jar")));
        assert!(matches!(result, Err(Error::File { .. })));
    }

    #[test]
    fn non_archive_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"just text").unwrap();
        let (_, _, result) = ingest(&Source::file(&path));
        assert!(matches!(result, Err(Error::Archive(_))));
    }

    #[test]
    fn source_debug_hides_runtime() {
        assert_eq!(format!("{:?}", Source::file("a.jar")), "File(\"a.jar\")");
    }
}
