use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::LdmError;

/// Logical sector size assumed when the caller doesn't know better
pub const DEFAULT_SECTOR_SZ: u64 = 512;

/// An opened block device (or disk image) with the geometry the LDM passes
/// need: a device path for DM table rows, a logical sector size, and the
/// device length in bytes. All reads are positional and length-exact.
#[derive(Debug)]
pub struct BlockDevice<R> {
  reader: R,
  /// Path the device will be referred to by in DM tables
  path: String,
  /// Logical sector size in bytes
  sector_size: u64,
  /// Device length in bytes
  size_bytes: u64,
}

impl<R> BlockDevice<R>
  where R: Read + Seek {
  /// Wrap an opened reader. The device length is taken from the reader
  /// itself; the sector size from the caller, defaulting to 512 when
  /// unknown.
  pub fn new(mut reader: R, path: &str, sector_size: Option<u64>) -> Result<Self, LdmError> {
    let size_bytes = reader.seek(SeekFrom::End(0))?;
    Ok(Self {
      reader,
      path: path.to_string(),
      sector_size: sector_size.unwrap_or(DEFAULT_SECTOR_SZ),
      size_bytes,
    })
  }

  /// Device path as given at construction
  pub fn path(&self) -> &str {
    &self.path
  }

  /// Logical sector size in bytes
  pub fn sector_size(&self) -> u64 {
    self.sector_size
  }

  /// Device length in bytes
  pub fn size_bytes(&self) -> u64 {
    self.size_bytes
  }

  pub(crate) fn reader(&mut self) -> &mut R {
    &mut self.reader
  }

  /// Positional length-exact read. Short reads accumulate until the buffer
  /// is full; end-of-device inside the requested range is a structural
  /// error, an operating-system failure an I/O error.
  pub(crate) fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), LdmError> {
    self.reader.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < buf.len() {
      match self.reader.read(&mut buf[filled..]) {
        Ok(0) => return Err(LdmError::Invalid(format!("Unexpected end of device at byte {}", offset + filled as u64))),
        Ok(n) => filled += n,
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
        Err(e) => return Err(LdmError::Io(e)),
      }
    }
    Ok(())
  }
}

impl BlockDevice<File> {
  /// Open a device node or disk image from the filesystem. The path given
  /// here is the one DM tables will name, so it should be the stable device
  /// path, not a symlink that won't survive a reboot.
  pub fn open<P: AsRef<Path>>(path: P, sector_size: Option<u64>) -> Result<Self, LdmError> {
    let file = File::open(&path)?;
    let name = path.as_ref().to_string_lossy().into_owned();
    Self::new(file, &name, sector_size)
  }
}
