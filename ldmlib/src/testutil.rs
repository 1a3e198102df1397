//! Builders for synthetic LDM metadata, shared by the unit and end-to-end
//! tests. Raw on-disk structures are serialized through the same deku
//! definitions the read path parses with; record bodies and VBLK cells are
//! built by hand since their layout is length-prefix-driven.

/// TLV record payload builders
pub(crate) mod rec {
  use crate::group::{ComponentKind, VolumeKind};

  use uuid::Uuid;

  /// Byte builder for one record payload: the 8-byte record header
  /// followed by the TLV body
  struct Body {
    buf: Vec<u8>,
  }

  impl Body {
    fn new(flags: u8, revision: u8, code: u8) -> Self {
      let mut buf = vec![0, 0, flags, revision << 4 | code];
      buf.extend_from_slice(&[0; 4]);
      Self { buf }
    }

    fn u8(mut self, value: u8) -> Self {
      self.buf.push(value);
      self
    }

    fn zeros(mut self, n: usize) -> Self {
      self.buf.extend(std::iter::repeat(0).take(n));
      self
    }

    fn be64(mut self, value: u64) -> Self {
      self.buf.extend_from_slice(&value.to_be_bytes());
      self
    }

    /// Minimal-width length-prefixed integer
    fn var_int(mut self, value: u64) -> Self {
      let width = std::cmp::max(1, (8 - value.leading_zeros() as usize / 8) as usize);
      self.buf.push(width as u8);
      self.buf.extend_from_slice(&value.to_be_bytes()[8 - width..]);
      self
    }

    fn var_string(mut self, text: &str) -> Self {
      self.buf.push(text.len() as u8);
      self.buf.extend_from_slice(text.as_bytes());
      self
    }

    fn bytes(mut self, bytes: &[u8]) -> Self {
      self.buf.extend_from_slice(bytes);
      self
    }

    fn done(self) -> Vec<u8> {
      self.buf
    }
  }

  pub(crate) fn volume(id: u32, name: &str, kind: VolumeKind, n_comps: u32, size: u64, part_type: u8, hint: Option<&str>) -> Vec<u8> {
    let (type_tag, type_byte, ) = match kind {
      VolumeKind::Gen => ("gen", 3, ),
      VolumeKind::Raid5 => ("raid5", 4, ),
    };
    let flags = if hint.is_some() { 0x02 } else { 0x00 };

    let body = Body::new(0, 5, 0x01)
      .var_int(id as u64)
      .var_string(name)
      .var_string(type_tag)
      // The opaque non-empty string observed after the type tag
      .var_string("8000000000000000")
      .zeros(14)
      .u8(type_byte)
      .zeros(1 + 1 + 3)
      .u8(flags)
      .var_int(n_comps as u64)
      .zeros(8 + 8)
      .var_int(size)
      .zeros(4)
      .u8(part_type)
      .zeros(16);
    match hint {
      Some(hint) => body.var_string(hint).done(),
      None => body.done(),
    }
  }

  pub(crate) fn component(id: u32, name: &str, kind: ComponentKind, n_parts: u32, parent_id: u32, stripe: Option<(u64, u32, )>) -> Vec<u8> {
    let type_byte = match kind {
      ComponentKind::Striped => 1,
      ComponentKind::Spanned => 2,
      ComponentKind::Raid => 3,
    };
    let flags = if stripe.is_some() { 0x10 } else { 0x00 };

    let body = Body::new(flags, 3, 0x02)
      .var_int(id as u64)
      .var_string(name)
      .var_string("")
      .u8(type_byte)
      .zeros(4)
      .var_int(n_parts as u64)
      .zeros(8 + 8)
      .var_int(parent_id as u64)
      .zeros(1);
    match stripe {
      Some((stripe_size, n_columns, )) => body.var_int(stripe_size).var_int(n_columns as u64).done(),
      None => body.done(),
    }
  }

  pub(crate) fn partition(id: u32, name: &str, start: u64, vol_offset: u64, size: u64, parent_id: u32, disk_id: u32, index: Option<u32>) -> Vec<u8> {
    let flags = if index.is_some() { 0x08 } else { 0x00 };

    let body = Body::new(flags, 3, 0x03)
      .var_int(id as u64)
      .var_string(name)
      .zeros(4 + 8)
      .be64(start)
      .be64(vol_offset)
      .var_int(size)
      .var_int(parent_id as u64)
      .var_int(disk_id as u64);
    match index {
      Some(index) => body.var_int(index as u64).done(),
      None => body.done(),
    }
  }

  pub(crate) fn disk_v3(id: u32, name: &str, guid: &str) -> Vec<u8> {
    Body::new(0, 3, 0x04)
      .var_int(id as u64)
      .var_string(name)
      .var_string(guid)
      .done()
  }

  pub(crate) fn disk_v4(id: u32, name: &str, guid: Uuid) -> Vec<u8> {
    Body::new(0, 4, 0x04)
      .var_int(id as u64)
      .var_string(name)
      .bytes(guid.as_bytes())
      .done()
  }

  pub(crate) fn disk_group(id: u32, name: &str) -> Vec<u8> {
    Body::new(0, 3, 0x05)
      .var_int(id as u64)
      .var_string(name)
      .done()
  }
}

/// VBLK cell builders
pub(crate) mod cells {
  /// One VBLK cell before serialization
  pub(crate) struct Cell {
    pub(crate) seq: u32,
    pub(crate) record_id: u32,
    pub(crate) entry: u16,
    pub(crate) entries_total: u16,
    pub(crate) payload: Vec<u8>,
  }

  /// A record fitting one cell
  pub(crate) fn single(seq: u32, record_id: u32, payload: &[u8]) -> Cell {
    Cell {
      seq,
      record_id,
      entry: 0,
      entries_total: 1,
      payload: payload.to_vec(),
    }
  }

  /// A record split over as many cells as its payload needs
  pub(crate) fn spanned(first_seq: u32, record_id: u32, payload: &[u8], cell_size: u32) -> Vec<Cell> {
    let payload_size = cell_size as usize - 16;
    let chunks: Vec<&[u8]> = payload.chunks(payload_size).collect();
    let entries_total = chunks.len() as u16;

    chunks.into_iter()
      .enumerate()
      .map(|(i, chunk, )| Cell {
        seq: first_seq + i as u32,
        record_id,
        entry: i as u16,
        entries_total,
        payload: chunk.to_vec(),
      })
      .collect()
  }

  /// Serialize cells back to back, each padded to the cell size
  pub(crate) fn stream(cell_size: u32, cells: Vec<Cell>) -> Vec<u8> {
    let mut out = Vec::new();
    for cell in cells {
      assert!(cell.payload.len() + 16 <= cell_size as usize, "payload does not fit the cell");
      let start = out.len();
      out.extend_from_slice(b"VBLK");
      out.extend_from_slice(&cell.seq.to_be_bytes());
      out.extend_from_slice(&cell.record_id.to_be_bytes());
      out.extend_from_slice(&cell.entry.to_be_bytes());
      out.extend_from_slice(&cell.entries_total.to_be_bytes());
      out.extend_from_slice(&cell.payload);
      out.resize(start + cell_size as usize, 0);
    }
    out
  }
}

/// Decoded-record and assembled-group fixtures
pub(crate) mod model {
  use std::collections::BTreeMap;

  use chrono::TimeZone;
  use uuid::{uuid, Uuid};

  use crate::group::{Component, ComponentKind, Disk, DiskDevice, DiskGroup, Partition, Volume, VolumeKind};
  use crate::privhead::PrivateHeader;
  use crate::vblk::records::{ComponentRec, DiskGroupRec, DiskRec, PartitionRec, Record, VolumeRec};
  use crate::vmdb::Vmdb;

  pub(crate) const DISK_A_GUID: Uuid = uuid!("8b111636-e0e8-11e1-b0d7-0800273c8e1f");
  pub(crate) const DISK_B_GUID: Uuid = uuid!("9c222747-e0e8-11e1-b0d7-0800273c8e1f");
  pub(crate) const DG_GUID: Uuid = uuid!("ad333858-e0e8-11e1-b0d7-0800273c8e1f");

  pub(crate) struct RecordFixture {
    pub(crate) records: Vec<Record>,
    pub(crate) vmdb: Vmdb,
    pub(crate) privhead: PrivateHeader,
  }

  pub(crate) fn privhead(disk_guid: Uuid) -> PrivateHeader {
    PrivateHeader {
      disk_guid,
      host_guid: uuid!("be444969-e0e8-11e1-b0d7-0800273c8e1f"),
      disk_group_guid: DG_GUID,
      disk_group_name: "WinDg0".to_string(),
      disk_timestamp: chrono::Utc.timestamp_opt(1_325_376_000, 0).unwrap(),
      logical_disk_start: 34,
      logical_disk_size: 1 << 20,
      ldm_config_start: 16,
      ldm_config_size: 64,
    }
  }

  /// One Gen volume spanning two partitions on two disks, only the first
  /// of which has been observed
  pub(crate) fn two_disk_spanned() -> RecordFixture {
    let records = vec![
      Record::DiskGroup(DiskGroupRec { id: 3, name: "WinDg0".to_string() }),
      Record::Disk(DiskRec { id: 1, name: "Disk1".to_string(), guid: DISK_A_GUID }),
      Record::Disk(DiskRec { id: 2, name: "Disk2".to_string(), guid: DISK_B_GUID }),
      // Record order deliberately puts column 1 before column 0
      Record::Partition(PartitionRec {
        id: 10, name: "Disk2-01".to_string(), start: 200, vol_offset: 500, size: 700,
        parent_id: 5, disk_id: 2, index: 1,
      }),
      Record::Partition(PartitionRec {
        id: 9, name: "Disk1-01".to_string(), start: 100, vol_offset: 0, size: 500,
        parent_id: 5, disk_id: 1, index: 0,
      }),
      Record::Component(ComponentRec {
        id: 5, name: "Volume1-01".to_string(), kind: ComponentKind::Spanned,
        n_parts: 2, parent_id: 7, stripe_size: None, n_columns: None,
      }),
      Record::Volume(VolumeRec {
        id: 7, name: "Volume1".to_string(), kind: VolumeKind::Gen,
        n_comps: 1, size: 1200, part_type: 0x07, hint: Some("E".to_string()),
      }),
    ];

    RecordFixture {
      records,
      vmdb: Vmdb {
        vblk_size: 128,
        vblk_first_offset: 512,
        committed_seq: 42,
        n_committed_vols: 1,
        n_committed_comps: 1,
        n_committed_parts: 2,
        n_committed_disks: 2,
        offset: 0,
      },
      privhead: privhead(DISK_A_GUID),
    }
  }

  /// Assembled-group builder for emitter tests
  pub(crate) struct GroupBuilder {
    name: String,
    disks: BTreeMap<u32, Disk>,
    partitions: BTreeMap<u32, Partition>,
    components: BTreeMap<u32, Component>,
    volumes: BTreeMap<u32, Volume>,
  }

  impl GroupBuilder {
    pub(crate) fn new(name: &str) -> Self {
      Self {
        name: name.to_string(),
        disks: BTreeMap::new(),
        partitions: BTreeMap::new(),
        components: BTreeMap::new(),
        volumes: BTreeMap::new(),
      }
    }

    pub(crate) fn disk(mut self, id: u32, name: &str, device: Option<(&str, u64, )>) -> Self {
      self.disks.insert(id, Disk {
        id,
        name: name.to_string(),
        guid: Uuid::from_u128(id as u128),
        disk_group_name: self.name.clone(),
        device: device.map(|(path, data_start, )| DiskDevice {
          path: path.to_string(),
          data_start,
          data_size: 1 << 20,
          metadata_start: 16,
          metadata_size: 64,
        }),
      });
      self
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn partition(mut self, id: u32, name: &str, parent_id: u32, disk_id: u32, start: u64, size: u64, vol_offset: u64, index: u32) -> Self {
      self.partitions.insert(id, Partition {
        id,
        name: name.to_string(),
        parent_id,
        disk_id,
        start,
        size,
        vol_offset,
        index,
      });
      self
    }

    pub(crate) fn component(mut self, id: u32, name: &str, parent_id: u32, kind: ComponentKind, stripe: Option<(u64, u32, )>, partitions: Vec<u32>) -> Self {
      self.components.insert(id, Component {
        id,
        name: name.to_string(),
        parent_id,
        kind,
        n_parts: partitions.len() as u32,
        stripe_size: stripe.map(|s| s.0),
        n_columns: stripe.map(|s| s.1),
        partitions,
      });
      self
    }

    pub(crate) fn volume(mut self, id: u32, name: &str, kind: VolumeKind, size: u64, components: Vec<u32>) -> Self {
      self.volumes.insert(id, Volume {
        id,
        name: name.to_string(),
        kind,
        size,
        part_type: 0x07,
        hint: None,
        n_comps: components.len() as u32,
        components,
        disk_group_name: self.name.clone(),
      });
      self
    }

    pub(crate) fn build(self) -> DiskGroup {
      DiskGroup {
        guid: DG_GUID,
        id: 3,
        name: self.name,
        committed_seq: 1,
        disks: self.disks,
        partitions: self.partitions,
        components: self.components,
        volumes: self.volumes,
      }
    }
  }
}

/// Whole-disk image builders for the end-to-end tests
pub(crate) mod image {
  use deku::prelude::*;
  use uuid::Uuid;

  use crate::privhead::raw::PrivHead;
  use crate::vmdb::raw::{TocBlock, TocBitmap, Vmdb};

  use super::cells;

  pub(crate) const SECTOR: u64 = 512;
  /// Start of the public data area, in sectors
  pub(crate) const DATA_START: u64 = 34;
  /// Start of the LDM config area, in sectors
  const CONFIG_START: u64 = 16;
  /// Size of the LDM config area, in sectors
  const CONFIG_SIZE: u64 = 64;
  /// VBLK cell size written into the VMDB
  const CELL_SIZE: u32 = 256;
  /// Sector of the first private header copy on an MBR-style disk
  const PRIVHEAD_SECTOR_MBR: u64 = 6;
  /// Sector the GPT-style image places the private header at
  const PRIVHEAD_SECTOR_GPT: u64 = 8;
  /// GPT partition type of the LDM metadata partition
  const LDM_METADATA_TYPE: Uuid = uuid::uuid!("5808c8aa-7e8f-42e0-85d2-e1e90434cfb3");

  /// Everything that varies between synthetic disks
  pub(crate) struct DiskSpec {
    pub(crate) disk_guid: Uuid,
    pub(crate) dg_guid: Uuid,
    pub(crate) dg_name: String,
    pub(crate) committed_seq: u32,
    /// Committed (volume, component, partition, disk) counts
    pub(crate) counts: (u32, u32, u32, u32, ),
    /// Record payloads, one VBLK cell each
    pub(crate) records: Vec<Vec<u8>>,
  }

  fn ascii_guid(guid: Uuid) -> [u8; PrivHead::GUID_FIELD_SZ] {
    let mut field = [0u8; PrivHead::GUID_FIELD_SZ];
    let text = guid.to_string();
    field[..text.len()].copy_from_slice(text.as_bytes());
    field
  }

  fn privhead_bytes(spec: &DiskSpec) -> Vec<u8> {
    let mut dg_name = [0u8; PrivHead::NAME_FIELD_SZ];
    dg_name[..spec.dg_name.len()].copy_from_slice(spec.dg_name.as_bytes());

    PrivHead {
      magic: PrivHead::MAGIC,
      version_major: 2,
      version_minor: 11,
      disk_timestamp: 129_698_496_000_000_000,
      disk_guid: ascii_guid(spec.disk_guid),
      host_guid: ascii_guid(Uuid::from_u128(0x4242)),
      disk_group_guid: ascii_guid(spec.dg_guid),
      disk_group_name: dg_name,
      logical_disk_start: DATA_START,
      logical_disk_size: 1 << 20,
      ldm_config_start: CONFIG_START,
      ldm_config_size: CONFIG_SIZE,
      n_tocs: 1,
      toc_size: 1,
      n_configs: 1,
      n_logs: 1,
      config_size: CONFIG_SIZE - 8,
      log_size: 4,
    }.to_bytes().unwrap()
  }

  fn toc_bitmap(name: &[u8], start: u64, size: u64) -> TocBitmap {
    let mut field = [0u8; TocBitmap::NAME_SZ];
    field[..name.len()].copy_from_slice(name);
    TocBitmap { name: field, start, size, flags: 0 }
  }

  /// Lay the config area out: TOCBLOCK at +2 sectors, VMDB at +4, VBLK
  /// cells one VMDB-relative sector later
  fn config_bytes(spec: &DiskSpec) -> Vec<u8> {
    let mut config = vec![0u8; (CONFIG_SIZE * SECTOR) as usize];

    let toc = TocBlock {
      magic: TocBlock::MAGIC,
      seq1: 1,
      seq2: 1,
      bitmaps: [
        toc_bitmap(b"config", 4, CONFIG_SIZE - 12, ),
        toc_bitmap(b"log", CONFIG_SIZE - 8, 4, ),
      ],
    };
    let toc_bytes = toc.to_bytes().unwrap();
    config[(2 * SECTOR) as usize..(2 * SECTOR) as usize + toc_bytes.len()].copy_from_slice(&toc_bytes);

    let (n_vols, n_comps, n_parts, n_disks, ) = spec.counts;
    let mut dg_name = [0u8; Vmdb::NAME_FIELD_SZ];
    dg_name[..spec.dg_name.len()].copy_from_slice(spec.dg_name.as_bytes());
    let mut dg_guid = [0u8; Vmdb::GUID_FIELD_SZ];
    let guid_text = spec.dg_guid.to_string();
    dg_guid[..guid_text.len()].copy_from_slice(guid_text.as_bytes());

    let vmdb = Vmdb {
      magic: Vmdb::MAGIC,
      vblk_last: spec.records.len() as u32,
      vblk_size: CELL_SIZE,
      vblk_first_offset: 512,
      update_status: 1,
      version_major: 4,
      version_minor: 10,
      disk_group_name: dg_name,
      disk_group_guid: dg_guid,
      committed_seq: spec.committed_seq,
      pending_seq: spec.committed_seq,
      n_committed_vols: n_vols,
      n_committed_comps: n_comps,
      n_committed_parts: n_parts,
      n_committed_disks: n_disks,
      n_pending_vols: 0,
      n_pending_comps: 0,
      n_pending_parts: 0,
      n_pending_disks: 0,
      timestamp: 0,
    };
    let vmdb_bytes = vmdb.to_bytes().unwrap();
    let vmdb_off = (4 * SECTOR) as usize;
    config[vmdb_off..vmdb_off + vmdb_bytes.len()].copy_from_slice(&vmdb_bytes);

    let stream = cells::stream(CELL_SIZE, spec.records.iter()
      .enumerate()
      .map(|(i, payload, )| cells::single(i as u32 + 4, i as u32 + 4, payload))
      .collect());
    let vblk_off = vmdb_off + 512;
    config[vblk_off..vblk_off + stream.len()].copy_from_slice(&stream);

    config
  }

  fn blank_image() -> Vec<u8> {
    vec![0u8; ((CONFIG_START + CONFIG_SIZE) * SECTOR) as usize]
  }

  fn put_config(img: &mut [u8], spec: &DiskSpec) {
    let config = config_bytes(spec);
    let off = (CONFIG_START * SECTOR) as usize;
    img[off..off + config.len()].copy_from_slice(&config);
  }

  /// MBR-style dynamic disk: partition 0 of type 0x42, private header at
  /// sector 6
  pub(crate) fn mbr_disk(spec: &DiskSpec) -> Vec<u8> {
    let mut img = blank_image();

    // Boot sector: one LDM partition and the signature
    img[446] = 0x00;
    img[446 + 4] = 0x42;
    img[446 + 8..446 + 12].copy_from_slice(&63u32.to_le_bytes());
    img[446 + 12..446 + 16].copy_from_slice(&1_000_000u32.to_le_bytes());
    img[510] = 0x55;
    img[511] = 0xAA;

    let ph = privhead_bytes(spec);
    let ph_off = (PRIVHEAD_SECTOR_MBR * SECTOR) as usize;
    img[ph_off..ph_off + ph.len()].copy_from_slice(&ph);

    put_config(&mut img, spec);
    img
  }

  /// GPT-style dynamic disk: protective MBR, GPT at LBA 1/2 with one LDM
  /// metadata partition whose last LBA holds the private header
  pub(crate) fn gpt_disk(spec: &DiskSpec) -> Vec<u8> {
    let mut img = blank_image();

    // Protective MBR
    img[446 + 4] = 0xEE;
    img[446 + 8..446 + 12].copy_from_slice(&1u32.to_le_bytes());
    img[510] = 0x55;
    img[511] = 0xAA;

    // GPT header at LBA 1
    let header_off = SECTOR as usize;
    img[header_off..header_off + 8].copy_from_slice(b"EFI PART");
    img[header_off + 8..header_off + 12].copy_from_slice(&0x00010000u32.to_le_bytes());
    img[header_off + 12..header_off + 16].copy_from_slice(&92u32.to_le_bytes());
    img[header_off + 24..header_off + 32].copy_from_slice(&1u64.to_le_bytes());
    img[header_off + 32..header_off + 40].copy_from_slice(&99u64.to_le_bytes());
    img[header_off + 40..header_off + 48].copy_from_slice(&34u64.to_le_bytes());
    img[header_off + 48..header_off + 56].copy_from_slice(&999u64.to_le_bytes());
    // Entry array: 2 entries of 128 bytes at LBA 2
    img[header_off + 72..header_off + 80].copy_from_slice(&2u64.to_le_bytes());
    img[header_off + 80..header_off + 84].copy_from_slice(&2u32.to_le_bytes());
    img[header_off + 84..header_off + 88].copy_from_slice(&128u32.to_le_bytes());

    // Entry 0 is an unused slot (nil type GUID); the walk must index past
    // it to entry 1
    let entry_off = (2 * SECTOR) as usize + 128;
    img[entry_off..entry_off + 16].copy_from_slice(&LDM_METADATA_TYPE.to_bytes_le());
    img[entry_off + 16..entry_off + 32].copy_from_slice(&Uuid::from_u128(0x77).to_bytes_le());
    img[entry_off + 32..entry_off + 40].copy_from_slice(&3u64.to_le_bytes());
    img[entry_off + 40..entry_off + 48].copy_from_slice(&PRIVHEAD_SECTOR_GPT.to_le_bytes());

    let ph = privhead_bytes(spec);
    let ph_off = (PRIVHEAD_SECTOR_GPT * SECTOR) as usize;
    img[ph_off..ph_off + ph.len()].copy_from_slice(&ph);

    put_config(&mut img, spec);
    img
  }
}
