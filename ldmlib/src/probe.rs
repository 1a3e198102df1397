use std::io::{Read, Seek};

use ptablib::gpt::Gpt;
use ptablib::mbr::{self, Mbr};
use ptablib::PtabReadError;
use uuid::{uuid, Uuid};

use crate::device::BlockDevice;
use crate::LdmError;

/// GPT partition type of the partition holding the LDM metadata
const LDM_METADATA_TYPE: Uuid = uuid!("5808c8aa-7e8f-42e0-85d2-e1e90434cfb3");
/// Sector of the first private-header copy on an MBR-style dynamic disk
const PRIVHEAD_SECTOR_MBR: u64 = 6;

/// Locate the private header: at the fixed sector behind an LDM-type MBR
/// entry, or at the last LBA of the LDM metadata partition behind a
/// protective MBR. Anything else carries no LDM.
pub(crate) fn find_privhead<R>(device: &mut BlockDevice<R>) -> Result<u64, LdmError>
  where R: Read + Seek {
  let sector_size = device.sector_size();
  let mbr = Mbr::read(device.reader()).map_err(not_ldm)?;

  match mbr.partitions.first().map(|part| part.partition_type) {
    Some(mbr::PART_TYPE_WINDOWS_LDM) => Ok(PRIVHEAD_SECTOR_MBR),
    Some(mbr::PART_TYPE_EFI_PROTECTIVE) => find_privhead_gpt(device, sector_size),
    _ => Err(LdmError::NotLdm),
  }
}

/// Walk the GPT entry array for the LDM metadata partition
fn find_privhead_gpt<R>(device: &mut BlockDevice<R>, sector_size: u64) -> Result<u64, LdmError>
  where R: Read + Seek {
  let gpt = Gpt::open(device.reader(), sector_size).map_err(invalid_gpt)?;

  for index in 0..gpt.entries() {
    let part = match gpt.entry(device.reader(), index) {
      Ok(part) => part,
      // Unused slots are expected in a sparse entry array
      Err(PtabReadError::InvalidPart(_)) => continue,
      Err(e) => return Err(invalid_gpt(e)),
    };
    if part.type_guid == LDM_METADATA_TYPE {
      // The private header sits at the end of the metadata partition
      return Ok(part.last_lba);
    }
  }

  Err(LdmError::NotLdm)
}

/// An absent or unreadable partition table means the device carries no LDM
fn not_ldm(e: PtabReadError) -> LdmError {
  match e {
    PtabReadError::Read(e) => LdmError::Io(e),
    _ => LdmError::NotLdm,
  }
}

/// A broken GPT behind a protective MBR entry is corruption, not absence
fn invalid_gpt(e: PtabReadError) -> LdmError {
  match e {
    PtabReadError::Read(e) => LdmError::Io(e),
    PtabReadError::Unpack(e) => LdmError::Unpack(e),
    PtabReadError::Invalid(msg) | PtabReadError::InvalidPart(msg) => LdmError::Invalid(msg),
  }
}
