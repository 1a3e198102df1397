use std::io::{Read, Seek};

use chrono::{DateTime, TimeZone, Utc};
use deku::prelude::*;
use uuid::Uuid;

use crate::device::BlockDevice;
use crate::{guid, LdmError};

pub(crate) mod raw;

/// Seconds between the Windows FILETIME epoch (1601-01-01) and the Unix
/// epoch
const FILETIME_UNIX_DIFF_SECS: i64 = 11_644_473_600;

/// Validated private header of one dynamic disk. Sizes and offsets are in
/// sectors of the device the header was read from.
#[derive(Debug)]
pub struct PrivateHeader {
  /// GUID of this physical disk
  pub disk_guid: Uuid,
  /// GUID of the host that last wrote the metadata
  pub host_guid: Uuid,
  /// GUID of the disk group this disk belongs to
  pub disk_group_guid: Uuid,
  /// Name of the disk group
  pub disk_group_name: String,
  /// When the metadata on this disk was last touched
  pub disk_timestamp: DateTime<Utc>,
  /// First sector of the public data area
  pub logical_disk_start: u64,
  /// Size of the public data area in sectors
  pub logical_disk_size: u64,
  /// First sector of the LDM config area
  pub ldm_config_start: u64,
  /// Size of the LDM config area in sectors
  pub ldm_config_size: u64,
}

impl PrivateHeader {
  /// Synchronously read / validate a PrivateHeader at the given sector
  pub fn read<R>(device: &mut BlockDevice<R>, sector: u64) -> Result<Self, LdmError>
    where R: Read + Seek {
    let mut buf = vec![0; raw::PrivHead::READ_SZ];
    device.read_at(sector * device.sector_size(), &mut buf)?;
    let (_, ph, ) = raw::PrivHead::from_bytes((&buf, 0, ))?;
    Self::try_from(&ph)
  }
}

impl TryFrom<&raw::PrivHead> for PrivateHeader {
  type Error = LdmError;

  /// Convert from raw PrivHead to PrivateHeader struct
  fn try_from(ph: &raw::PrivHead) -> Result<Self, Self::Error> {
    if ph.magic != raw::PrivHead::MAGIC {
      return Err(LdmError::Invalid(format!("Bad private header magic: {:?}", ph.magic)));
    }
    if ph.version_major != raw::PrivHead::VERSION_MAJOR {
      return Err(LdmError::NotSupported(format!("Private header version {}.{}", ph.version_major, ph.version_minor)));
    }

    let disk_timestamp = filetime_to_utc(ph.disk_timestamp)?;

    Ok(Self {
      disk_guid: guid::parse_ascii(&ph.disk_guid)?,
      host_guid: guid::parse_ascii(&ph.host_guid)?,
      disk_group_guid: guid::parse_ascii(&ph.disk_group_guid)?,
      disk_group_name: fixed_string(&ph.disk_group_name)?,
      disk_timestamp,
      logical_disk_start: ph.logical_disk_start,
      logical_disk_size: ph.logical_disk_size,
      ldm_config_start: ph.ldm_config_start,
      ldm_config_size: ph.ldm_config_size,
    })
  }
}

/// Extract a string from a NUL-padded fixed-width field
pub(crate) fn fixed_string(field: &[u8]) -> Result<String, LdmError> {
  let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
  match String::from_utf8(field[..end].to_vec()) {
    Ok(s) => Ok(s),
    _ => Err(LdmError::Invalid(format!("String field failed UTF8 conversion: {:?}", &field[..end]))),
  }
}

/// Convert a Windows FILETIME (100ns ticks since 1601) to UTC
fn filetime_to_utc(filetime: u64) -> Result<DateTime<Utc>, LdmError> {
  let secs = (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF_SECS;
  let nanos = (filetime % 10_000_000) as u32 * 100;
  match Utc.timestamp_opt(secs, nanos) {
    chrono::LocalResult::Single(t) => Ok(t),
    _ => Err(LdmError::Invalid(format!("Invalid disk timestamp: {}", filetime))),
  }
}
