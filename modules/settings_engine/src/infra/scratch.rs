//! Scratch files for raw registry imports

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A temporary import file; removed on [`ScratchFile::remove`] or drop
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Write `content` as UTF-16LE with a byte order mark, the encoding the
    /// system import mechanism expects
    pub fn write_import(dir: Option<&Path>, content: &str) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("settings-import-").suffix(".reg");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        file.write_all(&encode_utf16le(content))?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file, reporting failures instead of ignoring them like drop does
    pub fn remove(self) -> std::io::Result<PathBuf> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        Ok(path)
    }
}

fn encode_utf16le(content: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + content.len() * 2);
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    for unit in content.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}
