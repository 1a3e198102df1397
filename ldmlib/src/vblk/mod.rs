use std::collections::BTreeMap;

use deku::prelude::*;

use crate::vmdb::Vmdb;
use crate::LdmError;

mod raw;
mod tlv;
pub(crate) mod records;

pub(crate) use records::Record;

/// Walk the VBLK cell array and decode every committed record.
///
/// Cells are fixed-size; a record spanning several cells is reassembled
/// into a contiguous buffer before decoding, keyed by record id, so the
/// result does not depend on the order the cells appear in the stream.
/// Iteration ends at the first cell without the VBLK magic or at the end
/// of the config area.
pub(crate) fn parse_stream(config: &[u8], vmdb: &Vmdb) -> Result<Vec<Record>, LdmError> {
  let cell_size = vmdb.vblk_size as usize;
  if cell_size <= raw::CellHeader::SIZE {
    return Err(LdmError::Invalid(format!("VBLK cell size {} leaves no payload", cell_size)));
  }
  let payload_size = cell_size - raw::CellHeader::SIZE;

  let mut offset = (vmdb.offset + vmdb.vblk_first_offset as u64) as usize;
  let mut records = Vec::new();
  let mut spans: BTreeMap<u32, SpanBuffer> = BTreeMap::new();

  while offset + cell_size <= config.len() && config[offset..].starts_with(raw::CellHeader::MAGIC) {
    let (_, head, ) = raw::CellHeader::from_bytes((&config[offset..], 0, ))?;
    let payload = &config[offset + raw::CellHeader::SIZE..offset + cell_size];
    offset += cell_size;

    // A cell with no entries is blank padding
    if head.entries_total == 0 {
      continue;
    }
    if head.entry >= head.entries_total {
      return Err(LdmError::Invalid(format!("VBLK cell {} claims entry {} of {}", head.seq, head.entry, head.entries_total)));
    }

    if head.entries_total == 1 {
      if let Some(rec) = records::decode(payload)? {
        records.push(rec);
      }
    } else {
      let span = spans.entry(head.record_id)
        .or_insert_with(|| SpanBuffer::new(head.entries_total, payload_size));
      span.insert(&head, payload)?;
    }
  }

  // Reassembly buffers are complete or the database is corrupt
  for (record_id, span, ) in spans {
    let buf = span.complete(record_id)?;
    if let Some(rec) = records::decode(&buf)? {
      records.push(rec);
    }
  }

  Ok(records)
}

/// Reassembly buffer for one record spanning several VBLK cells
struct SpanBuffer {
  buf: Vec<u8>,
  entries_total: u16,
  entries_found: u16,
  seen: Vec<bool>,
}

impl SpanBuffer {
  fn new(entries_total: u16, payload_size: usize) -> Self {
    Self {
      buf: vec![0; entries_total as usize * payload_size],
      entries_total,
      entries_found: 0,
      seen: vec![false; entries_total as usize],
    }
  }

  /// Copy one cell's payload into its slot
  fn insert(&mut self, head: &raw::CellHeader, payload: &[u8]) -> Result<(), LdmError> {
    if head.entries_total != self.entries_total {
      return Err(LdmError::Invalid(format!("Record {:#x} cells disagree on entry count: {} vs {}", head.record_id, head.entries_total, self.entries_total)));
    }
    if self.seen[head.entry as usize] {
      return Err(LdmError::Invalid(format!("Record {:#x} entry {} appears twice", head.record_id, head.entry)));
    }

    let slot = head.entry as usize * payload.len();
    self.buf[slot..slot + payload.len()].copy_from_slice(payload);
    self.seen[head.entry as usize] = true;
    self.entries_found += 1;
    Ok(())
  }

  /// Hand over the reassembled record, or fail if entries are missing
  fn complete(self, record_id: u32) -> Result<Vec<u8>, LdmError> {
    if self.entries_found != self.entries_total {
      return Err(LdmError::Invalid(format!("Record {:#x} incomplete: {} of {} entries", record_id, self.entries_found, self.entries_total)));
    }
    Ok(self.buf)
  }
}
