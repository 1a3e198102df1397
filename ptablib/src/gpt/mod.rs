use std::io::{Read, Seek, SeekFrom};

use deku::prelude::*;
use uuid::Uuid;

use crate::PtabReadError;

mod raw;

/// Handle onto a GPT partition table, opened at a known sector size.
///
/// Opening validates the header at LBA 1; partition entries are then read
/// on demand through [`Gpt::entry`], since the entry array may be far
/// larger than the handful of entries a caller cares about.
#[derive(Debug)]
pub struct Gpt {
  /// Logical sector size the table was opened at, in bytes
  sector_size: u64,
  /// LBA of the start of the partition entry array
  entries_lba: u64,
  /// Size of one partition entry in bytes
  entry_size: u64,
  /// Number of entries in the partition entry array
  n_entries: u32,
}

/// One in-use partition from the GPT entry array
#[derive(Debug)]
pub struct GptPartition {
  /// Partition type GUID, normalized from the on-disk mixed-endian layout
  pub type_guid: Uuid,
  /// Unique partition GUID, normalized likewise
  pub part_guid: Uuid,
  /// First LBA of the partition
  pub first_lba: u64,
  /// Last LBA of the partition, inclusive
  pub last_lba: u64,
}

impl Gpt {
  /// Synchronously open a GPT partition table by reading and validating
  /// the header at LBA 1
  pub fn open<R: ?Sized>(reader: &mut R, sector_size: u64) -> Result<Self, PtabReadError>
    where R: Read + Seek {
    reader.seek(SeekFrom::Start(sector_size))?;
    let mut buf = vec![0; raw::GptHeader::SIZE];
    reader.read_exact(&mut buf)?;
    let (_, header, ) = raw::GptHeader::from_bytes((&buf, 0, ))?;

    if header.signature != raw::GptHeader::SIGNATURE {
      return Err(PtabReadError::Invalid(format!("Bad GPT signature: {:?}", header.signature)));
    }
    if (header.entry_size as usize) < raw::GptEntry::SIZE {
      return Err(PtabReadError::Invalid(format!("Partition entry size too small: {}", header.entry_size)));
    }
    if header.entries_lba <= header.current_lba {
      return Err(PtabReadError::Invalid(format!("Partition entry array overlaps header at LBA {}", header.entries_lba)));
    }

    Ok(Self {
      sector_size,
      entries_lba: header.entries_lba,
      entry_size: header.entry_size as u64,
      n_entries: header.n_entries,
    })
  }

  /// Length of the partition entry array
  pub fn entries(&self) -> u32 {
    self.n_entries
  }

  /// Synchronously read one partition entry. Unused slots and
  /// out-of-range indices yield `InvalidPart`.
  pub fn entry<R: ?Sized>(&self, reader: &mut R, index: u32) -> Result<GptPartition, PtabReadError>
    where R: Read + Seek {
    if index >= self.n_entries {
      return Err(PtabReadError::InvalidPart(format!("Entry {} out of range ({} entries)", index, self.n_entries)));
    }

    let offset = self.entries_lba * self.sector_size + index as u64 * self.entry_size;
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0; raw::GptEntry::SIZE];
    reader.read_exact(&mut buf)?;
    let (_, entry, ) = raw::GptEntry::from_bytes((&buf, 0, ))?;

    GptPartition::try_from((&entry, index, ))
  }
}

impl TryFrom<(&raw::GptEntry, u32, )> for GptPartition {
  type Error = PtabReadError;

  /// Convert from raw GptEntry to GptPartition struct, rejecting unused
  /// slots (type GUID of all zeroes)
  fn try_from(value: (&raw::GptEntry, u32, )) -> Result<Self, Self::Error> {
    let (entry, index, ) = value;

    let type_guid = Uuid::from_bytes_le(entry.type_guid);
    if type_guid.is_nil() {
      return Err(PtabReadError::InvalidPart(format!("Entry {} is an unused slot", index)));
    }
    if entry.last_lba < entry.first_lba {
      return Err(PtabReadError::InvalidPart(format!("Entry {} has negative extent ({}..{})", index, entry.first_lba, entry.last_lba)));
    }

    Ok(Self {
      type_guid,
      part_guid: Uuid::from_bytes_le(entry.part_guid),
      first_lba: entry.first_lba,
      last_lba: entry.last_lba,
    })
  }
}
