//! Purpose: Report a file's size in a chosen binary unit.
//! Exports: `SizeUnit`, `file_size_in`.
//! Invariants: Units are powers of 1024; the stat error is kept as the source.
use std::fs;
use std::path::Path;

use super::error::{Error, io_error};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SizeUnit {
    Bytes,
    KiB,
    MiB,
    GiB,
    TiB,
}

impl SizeUnit {
    pub fn bytes(self) -> u64 {
        match self {
            SizeUnit::Bytes => 1,
            SizeUnit::KiB => 1 << 10,
            SizeUnit::MiB => 1 << 20,
            SizeUnit::GiB => 1 << 30,
            SizeUnit::TiB => 1 << 40,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SizeUnit::Bytes => "B",
            SizeUnit::KiB => "KiB",
            SizeUnit::MiB => "MiB",
            SizeUnit::GiB => "GiB",
            SizeUnit::TiB => "TiB",
        }
    }
}

pub fn file_size_in(path: impl AsRef<Path>, unit: SizeUnit) -> Result<f64, Error> {
    let path = path.as_ref();
    let metadata = fs::metadata(path).map_err(|err| io_error(err, "cannot stat file", path))?;
    Ok(metadata.len() as f64 / unit.bytes() as f64)
}

#[cfg(test)]
mod tests {
    use super::{SizeUnit, file_size_in};
    use crate::core::error::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn sparse_gib_file_is_one_gib() {
        let file = NamedTempFile::new().expect("tempfile");
        file.as_file().set_len(1_073_741_824).expect("set_len");
        assert_eq!(file_size_in(file.path(), SizeUnit::GiB).expect("size"), 1.0);
        assert_eq!(file_size_in(file.path(), SizeUnit::MiB).expect("size"), 1024.0);
    }

    #[test]
    fn fractional_sizes() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(&[0u8; 1536]).expect("write");
        assert_eq!(file_size_in(file.path(), SizeUnit::KiB).expect("size"), 1.5);
        assert_eq!(file_size_in(file.path(), SizeUnit::Bytes).expect("size"), 1536.0);
    }

    #[test]
    fn missing_file_keeps_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = file_size_in(dir.path().join("ghost"), SizeUnit::MiB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(std::error::Error::source(&err).is_some());
    }
}
