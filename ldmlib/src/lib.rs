//! Reader for Microsoft Windows Logical Disk Manager ("dynamic disk")
//! metadata.
//!
//! Each physical disk of an LDM disk group carries a private header
//! locating a config area, whose VBLK database describes the whole group:
//! disks, partitions, components and volumes. [`Ldm::add`] parses one
//! device's metadata and folds it into the in-memory disk group set;
//! [`dm::volume_tables`] then renders Linux device-mapper tables exposing
//! each volume as a block device, degrading mirrors and RAID5 arrays when
//! member disks are absent.
//!
//! The reader is strictly read-only and consumes committed metadata only;
//! repairing corruption and resolving pending transactions are jobs for
//! Windows.

use std::io::{Read, Seek};

use thiserror::Error;
use uuid::Uuid;

pub mod device;
pub mod dm;
pub mod group;
mod guid;
mod probe;
pub mod privhead;
pub mod vmdb;
mod vblk;

#[cfg(test)]
mod testutil;

pub use device::BlockDevice;
pub use dm::DmTable;
pub use group::DiskGroup;

/// LDM reader errors
#[derive(Debug, Error)]
pub enum LdmError {
  #[error("I/O error")]
  Io(#[from] std::io::Error),
  #[error("Couldn't unpack binary data")]
  Unpack(#[from] deku::DekuError),
  #[error("Device carries no LDM metadata")]
  NotLdm,
  #[error("Invalid LDM metadata")]
  Invalid(String),
  #[error("Disks disagree on committed metadata")]
  Inconsistent(String),
  #[error("Unsupported LDM feature")]
  NotSupported(String),
  #[error("Required disk is missing")]
  MissingDisk(String),
  #[error("Internal error")]
  Internal(String),
}

/// Handle owning every disk group assembled so far.
///
/// Devices are fed in one at a time through [`Ldm::add`]; disks of the
/// same group merge into one [`DiskGroup`]. All accessors are pure reads.
#[derive(Debug, Default)]
pub struct Ldm {
  disk_groups: Vec<DiskGroup>,
}

impl Ldm {
  pub fn new() -> Self {
    Self { disk_groups: Vec::new() }
  }

  /// Read one device's LDM metadata and fold it into the handle.
  ///
  /// The first disk of a group is parsed fully and its topology
  /// installed. Further disks of the same group are not reparsed: they
  /// must agree on the committed sequence (else `Inconsistent`), and then
  /// only contribute their device geometry to the matching disk record.
  /// On failure the handle is left exactly as it was.
  pub fn add<R>(&mut self, device: &mut BlockDevice<R>) -> Result<(), LdmError>
    where R: Read + Seek {
    let privhead_sector = probe::find_privhead(device)?;
    let privhead = privhead::PrivateHeader::read(device, privhead_sector)?;

    // The whole config area lives in memory for the remaining passes and
    // is dropped again before add returns
    let config = vmdb::load_config(device, &privhead)?;
    let toc = vmdb::TocBlock::locate(&config, device.sector_size())?;
    let vmdb = vmdb::Vmdb::read(&config, &toc, device.sector_size())?;

    match self.disk_groups.iter_mut().find(|group| group.guid == privhead.disk_group_guid) {
      Some(group) => group.merge_disk(&privhead, &vmdb, device.path()),
      None => {
        let records = vblk::parse_stream(&config, &vmdb)?;
        let group = DiskGroup::assemble(records, &vmdb, &privhead, device.path())?;
        self.disk_groups.push(group);
        Ok(())
      }
    }
  }

  /// Disk groups assembled so far
  pub fn disk_groups(&self) -> &[DiskGroup] {
    &self.disk_groups
  }

  /// Look up a disk group by GUID
  pub fn disk_group(&self, guid: &Uuid) -> Option<&DiskGroup> {
    self.disk_groups.iter().find(|group| group.guid == *guid)
  }
}
