use deku::prelude::*;

/// Table-of-contents block, two sectors into the LDM config area.
///
/// The TOC names the regions carved out of the config area. Only two named
/// regions are ever observed: "config" (the VMDB and its VBLK array) and
/// "log". Starts and sizes are sectors relative to the beginning of the
/// config area.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct TocBlock {
  /// Block magic, "TOCBLOCK"
  pub(crate) magic: [u8; 8],
  /// First update sequence number
  #[deku(endian = "big")]
  pub(crate) seq1: u32,
  /// Second update sequence number
  #[deku(pad_bytes_before = "4", endian = "big")]
  pub(crate) seq2: u32,
  /// Region descriptors
  #[deku(pad_bytes_before = "16")]
  pub(crate) bitmaps: [TocBitmap; Self::N_BITMAPS],
}

impl TocBlock {
  /// Expected block magic
  pub(crate) const MAGIC: [u8; 8] = *b"TOCBLOCK";
  /// Number of region descriptors in the block
  pub(crate) const N_BITMAPS: usize = 2;
  /// On-disk size in bytes
  pub(crate) const SIZE: usize = 104;
}

/// One named region descriptor within the TOCBLOCK
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct TocBitmap {
  /// Region name, NUL-padded ("config" or "log")
  pub(crate) name: [u8; Self::NAME_SZ],
  /// First sector of the region, relative to the config area
  #[deku(endian = "big")]
  pub(crate) start: u64,
  /// Size of the region in sectors
  #[deku(endian = "big")]
  pub(crate) size: u64,
  /// Region flags
  #[deku(endian = "big")]
  pub(crate) flags: u64,
}

impl TocBitmap {
  /// On-disk size of the name field
  pub(crate) const NAME_SZ: usize = 10;
  /// Name of the region holding the VMDB
  pub(crate) const CONFIG_NAME: &'static [u8] = b"config";
}

/// VMDB header, at the start of the TOC's "config" region. Describes the
/// array of VBLK cells that immediately follows it.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct Vmdb {
  /// Header magic, "VMDB"
  pub(crate) magic: [u8; 4],
  /// Sequence number of the last VBLK cell
  #[deku(endian = "big")]
  pub(crate) vblk_last: u32,
  /// Size of one VBLK cell in bytes
  #[deku(endian = "big")]
  pub(crate) vblk_size: u32,
  /// Byte offset of the first VBLK cell, relative to the VMDB
  #[deku(endian = "big")]
  pub(crate) vblk_first_offset: u32,
  /// Transactional update state of the database
  #[deku(endian = "big")]
  pub(crate) update_status: u16,
  /// Format major version; 4 is the only published major
  #[deku(endian = "big")]
  pub(crate) version_major: u16,
  /// Format minor version
  #[deku(endian = "big")]
  pub(crate) version_minor: u16,
  /// Disk group name, NUL-padded
  pub(crate) disk_group_name: [u8; Self::NAME_FIELD_SZ],
  /// Disk group GUID, ASCII
  pub(crate) disk_group_guid: [u8; Self::GUID_FIELD_SZ],
  /// Sequence number of the last committed transaction
  #[deku(endian = "big")]
  pub(crate) committed_seq: u32,
  /// Sequence number of the pending transaction, if any
  #[deku(endian = "big")]
  pub(crate) pending_seq: u32,
  /// Committed volume records
  #[deku(endian = "big")]
  pub(crate) n_committed_vols: u32,
  /// Committed component records
  #[deku(endian = "big")]
  pub(crate) n_committed_comps: u32,
  /// Committed partition records
  #[deku(endian = "big")]
  pub(crate) n_committed_parts: u32,
  /// Committed disk records
  #[deku(endian = "big")]
  pub(crate) n_committed_disks: u32,
  /// Pending volume records
  #[deku(pad_bytes_before = "12", endian = "big")]
  pub(crate) n_pending_vols: u32,
  /// Pending component records
  #[deku(endian = "big")]
  pub(crate) n_pending_comps: u32,
  /// Pending partition records
  #[deku(endian = "big")]
  pub(crate) n_pending_parts: u32,
  /// Pending disk records
  #[deku(endian = "big")]
  pub(crate) n_pending_disks: u32,
  /// Last update timestamp, Windows FILETIME
  #[deku(pad_bytes_before = "12", endian = "big")]
  pub(crate) timestamp: u64,
}

impl Vmdb {
  /// Expected header magic
  pub(crate) const MAGIC: [u8; 4] = *b"VMDB";
  /// On-disk size in bytes
  pub(crate) const SIZE: usize = 189;
  /// On-disk size of the disk group name field
  pub(crate) const NAME_FIELD_SZ: usize = 31;
  /// On-disk size of the ASCII GUID field
  pub(crate) const GUID_FIELD_SZ: usize = 64;
  /// Expected major version
  pub(crate) const VERSION_MAJOR: u16 = 4;
}
