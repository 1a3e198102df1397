use std::io::{Read, Seek, SeekFrom};

use deku::prelude::*;

use crate::PtabReadError;

mod raw;

/// MBR partition type of an EFI protective partition covering a GPT disk
pub const PART_TYPE_EFI_PROTECTIVE: u8 = 0xEE;
/// MBR partition type of a Windows LDM (dynamic disk) partition
pub const PART_TYPE_WINDOWS_LDM: u8 = 0x42;

/// Master Boot Record partition table
#[derive(Debug)]
pub struct Mbr {
  /// The four primary partition entries, in table order
  pub partitions: Vec<MbrPartition>,
}

/// Primary partition table entry
#[derive(Debug)]
pub struct MbrPartition {
  /// Whether the entry carries the active (bootable) mark
  pub bootable: bool,
  /// Partition type code byte
  pub partition_type: u8,
  /// LBA of the first sector
  pub first_lba: u64,
  /// Partition length in sectors
  pub num_sectors: u64,
}

impl Mbr {
  /// Synchronously read / deserialize an Mbr from LBA 0 of a device
  pub fn read<R: ?Sized>(reader: &mut R) -> Result<Self, PtabReadError>
    where R: Read + Seek {
    reader.seek(SeekFrom::Start(0))?;
    let mut buf = vec![0; raw::BootSector::SIZE];
    reader.read_exact(&mut buf)?;
    let (_, bs, ) = raw::BootSector::from_bytes((&buf, 0, ))?;
    Self::try_from(&bs)
  }
}

impl MbrPartition {
  /// Check whether a partition entry is in use, i.e. if it has a size
  /// greater than zero
  pub fn in_use(&self) -> bool {
    self.num_sectors > 0
  }
}

impl TryFrom<&raw::BootSector> for Mbr {
  type Error = PtabReadError;

  /// Convert from raw BootSector to Mbr struct
  fn try_from(bs: &raw::BootSector) -> Result<Self, Self::Error> {
    if bs.signature != raw::BootSector::SIGNATURE {
      return Err(PtabReadError::Invalid(format!("Bad boot signature: {:#06x}", bs.signature)));
    }

    let partitions = bs.entries.iter()
      .map(MbrPartition::from)
      .collect();

    Ok(Self { partitions })
  }
}

impl From<&raw::PartitionEntry> for MbrPartition {
  /// Convert from raw PartitionEntry to MbrPartition struct
  fn from(entry: &raw::PartitionEntry) -> Self {
    Self {
      bootable: entry.status & 0x80 != 0,
      partition_type: entry.part_type,
      first_lba: entry.first_lba as u64,
      num_sectors: entry.num_sectors as u64,
    }
  }
}
