use deku::prelude::*;

/// Classic PC boot sector, located at LBA 0.
///
/// The first 446 bytes hold x86 bootstrap code and are of no interest here;
/// the partition table proper is the four 16-byte primary entries that
/// follow, terminated by the 0x55 0xAA boot signature.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct BootSector {
  /// Primary partition table
  #[deku(pad_bytes_before = "446")]
  pub(crate) entries: [PartitionEntry; Self::N_ENTRIES],
  /// Boot signature, 0xAA55
  #[deku(endian = "little")]
  pub(crate) signature: u16,
}

impl BootSector {
  /// On-disk size of the boot sector in bytes
  pub(crate) const SIZE: usize = 512;
  /// Number of primary partition entries
  pub(crate) const N_ENTRIES: usize = 4;
  /// Expected boot signature
  pub(crate) const SIGNATURE: u16 = 0xAA55;
}

/// One primary partition entry. CHS fields are legacy ballast; only the
/// status, type code and LBA extent are meaningful on modern disks.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct PartitionEntry {
  /// Bit 7 set marks the entry bootable
  pub(crate) status: u8,
  /// CHS address of first sector, unused
  pub(crate) chs_first: [u8; 3],
  /// Partition type code
  pub(crate) part_type: u8,
  /// CHS address of last sector, unused
  pub(crate) chs_last: [u8; 3],
  /// LBA of first sector
  #[deku(endian = "little")]
  pub(crate) first_lba: u32,
  /// Number of sectors in partition
  #[deku(endian = "little")]
  pub(crate) num_sectors: u32,
}
