use deku::prelude::*;

/// LDM private header.
///
/// One copy lives at a fixed sector near the start of the disk (MBR-style
/// dynamic disks) or at the last LBA of the LDM metadata partition
/// (GPT-style); further copies inside the config area exist for repair
/// tools and are not consulted here.
///
/// All integers are big-endian. The three GUIDs and the disk-group name
/// are NUL-padded ASCII. Field offsets below follow the published LDM
/// reference: version at 0x0C, disk GUID at 0x30, host GUID at 0x70,
/// disk-group GUID at 0xB0, disk-group name at 0xF0, and the extent
/// quadruple starting at 0x11B.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct PrivHead {
  /// Structure magic, "PRIVHEAD"
  pub(crate) magic: [u8; 8],
  /// Format major version; 2 is the only published major
  #[deku(pad_bytes_before = "4", endian = "big")]
  pub(crate) version_major: u16,
  /// Format minor version
  #[deku(endian = "big")]
  pub(crate) version_minor: u16,
  /// Disk last-update timestamp, Windows FILETIME
  #[deku(endian = "big")]
  pub(crate) disk_timestamp: u64,
  /// GUID of this physical disk, ASCII
  #[deku(pad_bytes_before = "24")]
  pub(crate) disk_guid: [u8; Self::GUID_FIELD_SZ],
  /// GUID of the host that last wrote the metadata, ASCII
  pub(crate) host_guid: [u8; Self::GUID_FIELD_SZ],
  /// GUID of the disk group this disk belongs to, ASCII
  pub(crate) disk_group_guid: [u8; Self::GUID_FIELD_SZ],
  /// Disk group name, NUL-padded
  pub(crate) disk_group_name: [u8; Self::NAME_FIELD_SZ],
  /// First sector of the public data area
  #[deku(pad_bytes_before = "11", endian = "big")]
  pub(crate) logical_disk_start: u64,
  /// Size of the public data area in sectors
  #[deku(endian = "big")]
  pub(crate) logical_disk_size: u64,
  /// First sector of the LDM config area
  #[deku(endian = "big")]
  pub(crate) ldm_config_start: u64,
  /// Size of the LDM config area in sectors
  #[deku(endian = "big")]
  pub(crate) ldm_config_size: u64,
  /// Number of table-of-contents copies
  #[deku(endian = "big")]
  pub(crate) n_tocs: u64,
  /// Size of one table-of-contents copy in sectors
  #[deku(endian = "big")]
  pub(crate) toc_size: u64,
  /// Number of config regions, always 1
  #[deku(endian = "big")]
  pub(crate) n_configs: u32,
  /// Number of log regions, always 1
  #[deku(endian = "big")]
  pub(crate) n_logs: u32,
  /// Size of the VMDB config region in sectors
  #[deku(endian = "big")]
  pub(crate) config_size: u64,
  /// Size of the log region in sectors
  #[deku(endian = "big")]
  pub(crate) log_size: u64,
}

impl PrivHead {
  /// Expected structure magic
  pub(crate) const MAGIC: [u8; 8] = *b"PRIVHEAD";
  /// The structure fits well within one 512-byte sector
  pub(crate) const READ_SZ: usize = 512;
  /// On-disk size of the ASCII GUID fields
  pub(crate) const GUID_FIELD_SZ: usize = 64;
  /// On-disk size of the disk group name field
  pub(crate) const NAME_FIELD_SZ: usize = 32;
  /// Expected major version
  pub(crate) const VERSION_MAJOR: u16 = 2;
}
