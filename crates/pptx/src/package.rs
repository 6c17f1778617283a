//! In-memory ZIP package.
//!
//! Entries are read fully into memory and written back in their original
//! order with their original timestamps and permissions, so re-saving an
//! untouched package reproduces the same entries.

use std::io::{Cursor, Read, Write};
use unmark_core::{Error, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// One file (or directory) entry of the package.
#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    modified: DateTime,
    unix_mode: Option<u32>,
    is_dir: bool,
}

/// A presentation package (OPC container) held in memory.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<PackageEntry>,
}

impl Package {
    /// Read every entry of a ZIP archive.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::CorruptDocument(format!("Failed to open ZIP: {}", e)))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(|e| {
                Error::CorruptDocument(format!("Failed to read ZIP entry {}: {}", index, e))
            })?;

            // The declared size comes from the upload and is not trusted
            let mut data = Vec::new();
            file.read_to_end(&mut data).map_err(|e| {
                Error::CorruptDocument(format!("Failed to read '{}': {}", file.name(), e))
            })?;

            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                modified: file.last_modified(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }

        log::debug!("Read package with {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name && !e.is_dir)
            .map(|e| e.data.as_slice())
    }

    /// Replace an entry's data, or append a new deflated entry.
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(PackageEntry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                modified: DateTime::default(),
                unix_mode: None,
                is_dir: false,
            }),
        }
    }

    /// Remove an entry; returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    /// Names of all file entries, in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    /// Write the package back into a ZIP archive.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            // Only stored and deflated are guaranteed to be writable
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = FileOptions::default()
                .compression_method(method)
                .last_modified_time(entry.modified);
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }

            if entry.is_dir {
                writer
                    .add_directory(entry.name.as_str(), options)
                    .map_err(|e| zip_write_error(&entry.name, e))?;
                continue;
            }

            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| zip_write_error(&entry.name, e))?;
            writer
                .write_all(&entry.data)
                .map_err(|e| Error::WriteError(format!("Failed to write '{}': {}", entry.name, e)))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| Error::WriteError(format!("Failed to finish ZIP: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

fn zip_write_error(name: &str, e: zip::result::ZipError) -> Error {
    Error::WriteError(format!("Failed to add '{}' to ZIP: {}", name, e))
}
