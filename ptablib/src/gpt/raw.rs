use deku::prelude::*;

/// GPT header, located at LBA 1.
///
/// All integers are little-endian. The partition entry array usually starts
/// at LBA 2, but its location, length and per-entry stride are all declared
/// here and must be honored rather than assumed.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct GptHeader {
  /// Header signature, "EFI PART"
  pub(crate) signature: [u8; 8],
  /// Specification revision, 0x00010000 for revision 1
  #[deku(endian = "little")]
  pub(crate) revision: u32,
  /// Size of this header in bytes
  #[deku(endian = "little")]
  pub(crate) header_size: u32,
  /// CRC32 of the header, zeroed during calculation
  #[deku(endian = "little")]
  pub(crate) header_crc32: u32,
  /// Must be zero
  #[deku(endian = "little")]
  pub(crate) reserved: u32,
  /// LBA of this header copy
  #[deku(endian = "little")]
  pub(crate) current_lba: u64,
  /// LBA of the backup header
  #[deku(endian = "little")]
  pub(crate) backup_lba: u64,
  /// First LBA usable for partition contents
  #[deku(endian = "little")]
  pub(crate) first_usable_lba: u64,
  /// Last LBA usable for partition contents
  #[deku(endian = "little")]
  pub(crate) last_usable_lba: u64,
  /// Disk GUID in GPT mixed-endian layout
  pub(crate) disk_guid: [u8; 16],
  /// LBA of the start of the partition entry array
  #[deku(endian = "little")]
  pub(crate) entries_lba: u64,
  /// Number of entries in the partition entry array
  #[deku(endian = "little")]
  pub(crate) n_entries: u32,
  /// Size of one partition entry in bytes, at least 128
  #[deku(endian = "little")]
  pub(crate) entry_size: u32,
  /// CRC32 of the partition entry array
  #[deku(endian = "little")]
  pub(crate) entries_crc32: u32,
}

impl GptHeader {
  /// Expected header signature
  pub(crate) const SIGNATURE: [u8; 8] = *b"EFI PART";
  /// On-disk size of the GPT header in bytes, including the signature
  pub(crate) const SIZE: usize = 92;
}

/// One partition entry from the GPT partition entry array. An entry whose
/// type GUID is all zeroes is an unused slot.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct GptEntry {
  /// Partition type GUID in GPT mixed-endian layout
  pub(crate) type_guid: [u8; 16],
  /// Unique partition GUID in GPT mixed-endian layout
  pub(crate) part_guid: [u8; 16],
  /// First LBA of the partition
  #[deku(endian = "little")]
  pub(crate) first_lba: u64,
  /// Last LBA of the partition, inclusive
  #[deku(endian = "little")]
  pub(crate) last_lba: u64,
  /// Attribute flags
  #[deku(endian = "little")]
  pub(crate) attributes: u64,
  /// Partition name, UTF-16LE
  pub(crate) name: [u8; Self::NAME_SZ],
}

impl GptEntry {
  /// Minimum on-disk size of one partition entry in bytes
  pub(crate) const SIZE: usize = 128;
  /// Size of the UTF-16LE name field in bytes
  pub(crate) const NAME_SZ: usize = 72;
}
