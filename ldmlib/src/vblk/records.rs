use deku::prelude::*;
use uuid::Uuid;

use crate::group::{ComponentKind, VolumeKind};
use crate::LdmError;

use super::raw;
use super::tlv::Cursor;

/// Record type codes, from the low nibble of the record header type byte
mod type_code {
  pub(super) const BLANK: u8 = 0x00;
  pub(super) const VOLUME: u8 = 0x01;
  pub(super) const COMPONENT: u8 = 0x02;
  pub(super) const PARTITION: u8 = 0x03;
  pub(super) const DISK: u8 = 0x04;
  pub(super) const DISK_GROUP: u8 = 0x05;
}

/// Volume body flags gating the optional tail fields
const VOL_FLAG_ID1: u8 = 0x08;
const VOL_FLAG_ID2: u8 = 0x20;
const VOL_FLAG_SIZE2: u8 = 0x80;
const VOL_FLAG_HINT: u8 = 0x02;
/// Record header flag gating component stripe geometry
const COMP_FLAG_STRIPE: u8 = 0x10;
/// Record header flag gating the partition column index
const PART_FLAG_INDEX: u8 = 0x08;

/// One decoded VBLK record
#[derive(Debug)]
pub(crate) enum Record {
  Volume(VolumeRec),
  Component(ComponentRec),
  Partition(PartitionRec),
  Disk(DiskRec),
  DiskGroup(DiskGroupRec),
}

#[derive(Debug)]
pub(crate) struct VolumeRec {
  pub(crate) id: u32,
  pub(crate) name: String,
  pub(crate) kind: VolumeKind,
  pub(crate) n_comps: u32,
  pub(crate) size: u64,
  pub(crate) part_type: u8,
  pub(crate) hint: Option<String>,
}

#[derive(Debug)]
pub(crate) struct ComponentRec {
  pub(crate) id: u32,
  pub(crate) name: String,
  pub(crate) kind: ComponentKind,
  pub(crate) n_parts: u32,
  pub(crate) parent_id: u32,
  pub(crate) stripe_size: Option<u64>,
  pub(crate) n_columns: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct PartitionRec {
  pub(crate) id: u32,
  pub(crate) name: String,
  pub(crate) start: u64,
  pub(crate) vol_offset: u64,
  pub(crate) size: u64,
  pub(crate) parent_id: u32,
  pub(crate) disk_id: u32,
  pub(crate) index: u32,
}

#[derive(Debug)]
pub(crate) struct DiskRec {
  pub(crate) id: u32,
  pub(crate) name: String,
  pub(crate) guid: Uuid,
}

#[derive(Debug)]
pub(crate) struct DiskGroupRec {
  pub(crate) id: u32,
  pub(crate) name: String,
}

/// Decode one reassembled record payload. Blank cells and records still in
/// transactional (pending) state yield `None`.
pub(crate) fn decode(payload: &[u8]) -> Result<Option<Record>, LdmError> {
  if payload.len() < raw::RecordHeader::SIZE {
    return Err(LdmError::Invalid(format!("Record payload of {} bytes is shorter than the record header", payload.len())));
  }
  let (_, head, ) = raw::RecordHeader::from_bytes((payload, 0, ))?;
  if head.status != 0 {
    // Only committed records are consumed
    return Ok(None);
  }

  let mut body = Cursor::new(&payload[raw::RecordHeader::SIZE..]);
  match head.type_code() {
    type_code::BLANK => Ok(None),
    type_code::VOLUME => volume(&mut body, &head).map(|r| Some(Record::Volume(r))),
    type_code::COMPONENT => component(&mut body, &head).map(|r| Some(Record::Component(r))),
    type_code::PARTITION => partition(&mut body, &head).map(|r| Some(Record::Partition(r))),
    type_code::DISK => disk(&mut body, &head).map(|r| Some(Record::Disk(r))),
    type_code::DISK_GROUP => disk_group(&mut body, &head).map(|r| Some(Record::DiskGroup(r))),
    code => Err(LdmError::NotSupported(format!("VBLK record type {:#04x}", code))),
  }
}

/// Volume record, revision 5
fn volume(body: &mut Cursor, head: &raw::RecordHeader) -> Result<VolumeRec, LdmError> {
  if head.revision() != 5 {
    return Err(LdmError::NotSupported(format!("Volume record revision {}", head.revision())));
  }

  let id = body.var_u32()?;
  let name = body.var_string()?;
  // Volume type tag ("gen"/"raid5"), redundant with the type byte below
  body.var_skip()?;
  // Documented as a single zero byte, observed as a non-empty string;
  // opaque either way
  body.var_skip()?;
  // Volume state
  body.skip(14)?;
  let kind = VolumeKind::try_from(body.u8()?)?;
  body.skip(1 + 1 + 3)?;
  let flags = body.u8()?;
  let n_comps = body.var_u32()?;
  // Commit id, id
  body.skip(8 + 8)?;
  let size = body.var_u64()?;
  body.skip(4)?;
  let part_type = body.u8()?;
  // Volume GUID, raw
  body.skip(16)?;

  if flags & VOL_FLAG_ID1 != 0 {
    body.var_skip()?;
  }
  if flags & VOL_FLAG_ID2 != 0 {
    body.var_skip()?;
  }
  if flags & VOL_FLAG_SIZE2 != 0 {
    body.var_u64()?;
  }
  let hint = if flags & VOL_FLAG_HINT != 0 {
    Some(body.var_string()?)
  } else {
    None
  };

  Ok(VolumeRec { id, name, kind, n_comps, size, part_type, hint })
}

/// Component record, revision 3
fn component(body: &mut Cursor, head: &raw::RecordHeader) -> Result<ComponentRec, LdmError> {
  if head.revision() != 3 {
    return Err(LdmError::NotSupported(format!("Component record revision {}", head.revision())));
  }

  let id = body.var_u32()?;
  let name = body.var_string()?;
  // Volume state; the published layout disagrees with observation here,
  // so it stays opaque
  body.var_skip()?;
  let kind = ComponentKind::try_from(body.u8()?)?;
  body.skip(4)?;
  let n_parts = body.var_u32()?;
  // Commit id, reconfig id
  body.skip(8 + 8)?;
  let parent_id = body.var_u32()?;
  body.skip(1)?;

  let (stripe_size, n_columns, ) = if head.flags & COMP_FLAG_STRIPE != 0 {
    (Some(body.var_u64()?), Some(body.var_u32()?), )
  } else {
    (None, None, )
  };

  Ok(ComponentRec { id, name, kind, n_parts, parent_id, stripe_size, n_columns })
}

/// Partition record, revision 3
fn partition(body: &mut Cursor, head: &raw::RecordHeader) -> Result<PartitionRec, LdmError> {
  if head.revision() != 3 {
    return Err(LdmError::NotSupported(format!("Partition record revision {}", head.revision())));
  }

  let id = body.var_u32()?;
  let name = body.var_string()?;
  body.skip(4 + 8)?;
  let start = body.be64()?;
  let vol_offset = body.be64()?;
  let size = body.var_u64()?;
  let parent_id = body.var_u32()?;
  let disk_id = body.var_u32()?;
  let index = if head.flags & PART_FLAG_INDEX != 0 {
    body.var_u32()?
  } else {
    0
  };

  Ok(PartitionRec { id, name, start, vol_offset, size, parent_id, disk_id, index })
}

/// Disk record, revision 3 (ASCII GUID) or 4 (raw GUID)
fn disk(body: &mut Cursor, head: &raw::RecordHeader) -> Result<DiskRec, LdmError> {
  let id = body.var_u32()?;
  let name = body.var_string()?;

  let guid = match head.revision() {
    3 => {
      let text = body.var_string()?;
      Uuid::parse_str(text.trim())
        .map_err(|_| LdmError::Invalid(format!("Unparseable disk GUID: {:?}", text)))?
    }
    4 => {
      let bytes: [u8; 16] = body.take(16)?.try_into()
        .map_err(|_| LdmError::Internal("Disk GUID slice width".to_string()))?;
      Uuid::from_bytes(bytes)
    }
    revision => return Err(LdmError::NotSupported(format!("Disk record revision {}", revision))),
  };

  Ok(DiskRec { id, name, guid })
}

/// Disk group record, revisions 3 and 4
fn disk_group(body: &mut Cursor, head: &raw::RecordHeader) -> Result<DiskGroupRec, LdmError> {
  if head.revision() != 3 && head.revision() != 4 {
    return Err(LdmError::NotSupported(format!("Disk group record revision {}", head.revision())));
  }

  let id = body.var_u32()?;
  let name = body.var_string()?;

  Ok(DiskGroupRec { id, name })
}
