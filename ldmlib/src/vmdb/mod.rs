use std::io::{Read, Seek};

use deku::prelude::*;

use crate::device::BlockDevice;
use crate::privhead::PrivateHeader;
use crate::LdmError;

pub(crate) mod raw;

/// Sector offset of the TOCBLOCK within the config area
const TOCBLOCK_SECTOR: u64 = 2;

/// Validated table-of-contents block, reduced to the one region the read
/// path needs: the location of the "config" region holding the VMDB.
#[derive(Debug)]
pub struct TocBlock {
  /// First sector of the config region, relative to the config area
  pub config_start: u64,
  /// Size of the config region in sectors
  pub config_size: u64,
}

/// Validated VMDB header
#[derive(Debug)]
pub struct Vmdb {
  /// Size of one VBLK cell in bytes
  pub vblk_size: u32,
  /// Byte offset of the first VBLK cell, relative to the VMDB
  pub vblk_first_offset: u32,
  /// Sequence number of the last committed transaction
  pub committed_seq: u32,
  /// Committed volume records
  pub n_committed_vols: u32,
  /// Committed component records
  pub n_committed_comps: u32,
  /// Committed partition records
  pub n_committed_parts: u32,
  /// Committed disk records
  pub n_committed_disks: u32,
  /// Byte offset of the VMDB within the loaded config area
  pub(crate) offset: u64,
}

/// Read the entire LDM config area into memory. The remaining passes (TOC,
/// VMDB, VBLK stream) all walk this buffer; it is dropped before `add`
/// returns.
pub(crate) fn load_config<R>(device: &mut BlockDevice<R>, privhead: &PrivateHeader) -> Result<Vec<u8>, LdmError>
  where R: Read + Seek {
  let sector_size = device.sector_size();
  let start = privhead.ldm_config_start.checked_mul(sector_size)
    .ok_or_else(|| LdmError::Invalid(format!("Config start overflows: sector {}", privhead.ldm_config_start)))?;
  let size = privhead.ldm_config_size.checked_mul(sector_size)
    .ok_or_else(|| LdmError::Invalid(format!("Config size overflows: {} sectors", privhead.ldm_config_size)))?;
  match start.checked_add(size) {
    Some(end) if end <= device.size_bytes() => {}
    _ => return Err(LdmError::Invalid(format!("Config area {}+{} extends past end of device ({} bytes)", start, size, device.size_bytes()))),
  }

  let mut config = vec![0; size as usize];
  device.read_at(start, &mut config)?;
  Ok(config)
}

impl TocBlock {
  /// Locate and validate the TOCBLOCK within a loaded config area
  pub(crate) fn locate(config: &[u8], sector_size: u64) -> Result<Self, LdmError> {
    let offset = (TOCBLOCK_SECTOR * sector_size) as usize;
    if offset + raw::TocBlock::SIZE > config.len() {
      return Err(LdmError::Invalid(format!("Config area too small for TOCBLOCK: {} bytes", config.len())));
    }
    let (_, toc, ) = raw::TocBlock::from_bytes((&config[offset..], 0, ))?;
    Self::try_from(&toc)
  }
}

impl TryFrom<&raw::TocBlock> for TocBlock {
  type Error = LdmError;

  /// Convert from raw TocBlock, selecting the region named "config"
  fn try_from(toc: &raw::TocBlock) -> Result<Self, Self::Error> {
    if toc.magic != raw::TocBlock::MAGIC {
      return Err(LdmError::Invalid(format!("Bad TOCBLOCK magic: {:?}", toc.magic)));
    }

    let config = toc.bitmaps.iter()
      .find(|bitmap| bitmap_named(bitmap, raw::TocBitmap::CONFIG_NAME))
      .ok_or_else(|| LdmError::Invalid("TOCBLOCK has no config region".to_string()))?;

    Ok(Self {
      config_start: config.start,
      config_size: config.size,
    })
  }
}

/// Compare a NUL-padded region name against an expected value
fn bitmap_named(bitmap: &raw::TocBitmap, name: &[u8]) -> bool {
  bitmap.name.len() >= name.len()
    && bitmap.name[..name.len()] == *name
    && bitmap.name[name.len()..].iter().all(|b| *b == 0)
}

impl Vmdb {
  /// Locate and validate the VMDB at the start of the TOC's config region
  pub(crate) fn read(config: &[u8], toc: &TocBlock, sector_size: u64) -> Result<Self, LdmError> {
    let offset = toc.config_start.checked_mul(sector_size)
      .ok_or_else(|| LdmError::Invalid(format!("VMDB offset overflows: sector {}", toc.config_start)))?;
    let end = offset as usize + raw::Vmdb::SIZE;
    if end > config.len() {
      return Err(LdmError::Invalid(format!("VMDB at byte {} extends past config area ({} bytes)", offset, config.len())));
    }

    let (_, vmdb, ) = raw::Vmdb::from_bytes((&config[offset as usize..], 0, ))?;
    let mut vmdb = Self::try_from(&vmdb)?;
    vmdb.offset = offset;
    Ok(vmdb)
  }
}

impl TryFrom<&raw::Vmdb> for Vmdb {
  type Error = LdmError;

  /// Convert from raw Vmdb to Vmdb struct
  fn try_from(vmdb: &raw::Vmdb) -> Result<Self, Self::Error> {
    if vmdb.magic != raw::Vmdb::MAGIC {
      return Err(LdmError::Invalid(format!("Bad VMDB magic: {:?}", vmdb.magic)));
    }
    if vmdb.version_major != raw::Vmdb::VERSION_MAJOR {
      return Err(LdmError::NotSupported(format!("VMDB version {}.{}", vmdb.version_major, vmdb.version_minor)));
    }

    Ok(Self {
      vblk_size: vmdb.vblk_size,
      vblk_first_offset: vmdb.vblk_first_offset,
      committed_seq: vmdb.committed_seq,
      n_committed_vols: vmdb.n_committed_vols,
      n_committed_comps: vmdb.n_committed_comps,
      n_committed_parts: vmdb.n_committed_parts,
      n_committed_disks: vmdb.n_committed_disks,
      offset: 0,
    })
  }
}
