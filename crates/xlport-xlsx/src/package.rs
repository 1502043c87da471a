//! In-memory package: archive paths mapped to part contents.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, XlsxError};

/// Media type of a spreadsheet package.
pub const XLSX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Upper bound on the bytes unpacked from one archive.
pub const MAX_UNPACKED_BYTES: u64 = 512 * 1024 * 1024;
/// Largest buffer reserved up front from a size an entry declares.
const MAX_PREALLOC: u64 = 1024 * 1024;

/// Finished package bytes plus their media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(with = "crate::protocol::base64_bytes")]
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Blob {
            bytes,
            media_type: XLSX_MEDIA_TYPE.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// How binary data handed to [`Package::set_binary`] is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryEncoding {
    Base64,
}

/// Virtual file system of a package, keyed by archive path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn new() -> Self {
        Package::default()
    }

    /// Read every file of a zip archive.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_limited(bytes, MAX_UNPACKED_BYTES)
    }

    /// Read every file of a zip archive, failing once more than `limit`
    /// bytes have been unpacked. Declared entry sizes are not trusted.
    pub fn from_bytes_limited(bytes: &[u8], limit: u64) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = BTreeMap::new();
        let mut remaining = limit;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::with_capacity(file.size().min(MAX_PREALLOC).min(remaining) as usize);
            let read = file.by_ref().take(remaining + 1).read_to_end(&mut data)? as u64;
            if read > remaining {
                return Err(XlsxError::malformed(
                    &name,
                    format!("archive unpacks to more than {limit} bytes"),
                ));
            }
            remaining -= read;
            parts.insert(name, data);
        }
        Ok(Package { parts })
    }

    pub fn set(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.parts.insert(path.into(), text.into().into_bytes());
    }

    pub fn set_bytes(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.parts.insert(path.into(), data);
    }

    /// Store binary data that arrives in a text encoding.
    pub fn set_binary(
        &mut self,
        path: impl Into<String>,
        data: &str,
        encoding: BinaryEncoding,
    ) -> Result<()> {
        let bytes = match encoding {
            BinaryEncoding::Base64 => STANDARD.decode(data.trim())?,
        };
        self.parts.insert(path.into(), bytes);
        Ok(())
    }

    /// Text of a part; `None` when absent or not UTF-8.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.parts
            .get(path)
            .and_then(|data| std::str::from_utf8(data).ok())
    }

    pub fn get_bytes(&self, path: &str) -> Option<&[u8]> {
        self.parts.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.parts.remove(path)
    }

    /// Drop every part whose path starts with `prefix`.
    pub fn remove_prefixed(&mut self, prefix: &str) {
        self.parts.retain(|path, _| !path.starts_with(prefix));
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Flatten into a deflated zip archive. The content-type manifest goes
    /// first, as consumers sniff it.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

        let ordered = self
            .parts
            .iter()
            .filter(|(path, _)| path.as_str() == CONTENT_TYPES_PART)
            .chain(
                self.parts
                    .iter()
                    .filter(|(path, _)| path.as_str() != CONTENT_TYPES_PART),
            );
        for (path, data) in ordered {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    pub fn into_blob(self) -> Result<Blob> {
        Ok(Blob::new(self.to_bytes()?))
    }
}
