use std::collections::BTreeMap;

use uuid::Uuid;

use crate::privhead::PrivateHeader;
use crate::vblk::records;
use crate::vblk::Record;
use crate::vmdb::Vmdb;
use crate::LdmError;

/// Volume type, from the volume record type byte
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VolumeKind {
  /// "Generic": simple, spanned, striped or mirrored, depending on the
  /// component shape underneath
  Gen,
  /// RAID5 with left-symmetric parity
  Raid5,
}

/// Component layout, from the component record type byte
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ComponentKind {
  /// Partitions interleaved in stripe-size runs
  Striped,
  /// Partitions concatenated back to back
  Spanned,
  /// Partitions forming a parity array
  Raid,
}

impl TryFrom<u8> for VolumeKind {
  type Error = LdmError;

  fn try_from(byte: u8) -> Result<Self, Self::Error> {
    match byte {
      3 => Ok(Self::Gen),
      4 => Ok(Self::Raid5),
      _ => Err(LdmError::NotSupported(format!("Volume type {}", byte))),
    }
  }
}

impl TryFrom<u8> for ComponentKind {
  type Error = LdmError;

  fn try_from(byte: u8) -> Result<Self, Self::Error> {
    match byte {
      1 => Ok(Self::Striped),
      2 => Ok(Self::Spanned),
      3 => Ok(Self::Raid),
      _ => Err(LdmError::NotSupported(format!("Component type {}", byte))),
    }
  }
}

/// One assembled LDM disk group: the unit of administration, spanning the
/// physical disks that share its metadata.
///
/// The group owns every child by id; parents refer to children through
/// ordered id lists built during assembly, children back-reference parents
/// by id only. After assembly the topology is read-only.
#[derive(Debug)]
pub struct DiskGroup {
  /// Disk group GUID
  pub guid: Uuid,
  /// Record id of the disk group
  pub id: u32,
  /// Disk group name
  pub name: String,
  /// Sequence number of the last committed transaction, shared by every
  /// disk of the group
  pub committed_seq: u32,
  /// Member disks by record id
  pub disks: BTreeMap<u32, Disk>,
  /// Partitions by record id
  pub partitions: BTreeMap<u32, Partition>,
  /// Components by record id
  pub components: BTreeMap<u32, Component>,
  /// Volumes by record id
  pub volumes: BTreeMap<u32, Volume>,
}

/// One member disk of a disk group
#[derive(Debug)]
pub struct Disk {
  /// Record id
  pub id: u32,
  /// Disk name within the group
  pub name: String,
  /// GUID of the physical disk
  pub guid: Uuid,
  /// Name of the owning disk group
  pub disk_group_name: String,
  /// Device geometry, present only when the physical disk has been
  /// observed through `add`
  pub device: Option<DiskDevice>,
}

/// Geometry of an observed physical disk
#[derive(Debug)]
pub struct DiskDevice {
  /// Device path as given to `add`
  pub path: String,
  /// First sector of the public data area
  pub data_start: u64,
  /// Size of the public data area in sectors
  pub data_size: u64,
  /// First sector of the LDM config area
  pub metadata_start: u64,
  /// Size of the LDM config area in sectors
  pub metadata_size: u64,
}

/// A contiguous run of sectors on one disk
#[derive(Debug)]
pub struct Partition {
  /// Record id
  pub id: u32,
  /// Partition name within the group
  pub name: String,
  /// Record id of the owning component
  pub parent_id: u32,
  /// Record id of the disk the partition lives on
  pub disk_id: u32,
  /// First sector, relative to the disk's data area
  pub start: u64,
  /// Size in sectors
  pub size: u64,
  /// Offset of this partition within the volume, in sectors
  pub vol_offset: u64,
  /// Position within the owning component
  pub index: u32,
}

/// How a run of partitions composes into (part of) a volume
#[derive(Debug)]
pub struct Component {
  /// Record id
  pub id: u32,
  /// Component name within the group
  pub name: String,
  /// Record id of the owning volume
  pub parent_id: u32,
  /// Layout of the member partitions
  pub kind: ComponentKind,
  /// Declared number of partitions
  pub n_parts: u32,
  /// Stripe size in sectors, for striped and raid layouts
  pub stripe_size: Option<u64>,
  /// Number of columns, for striped and raid layouts
  pub n_columns: Option<u32>,
  /// Member partition ids, in column order
  pub partitions: Vec<u32>,
}

/// One exposed volume
#[derive(Debug)]
pub struct Volume {
  /// Record id
  pub id: u32,
  /// Volume name within the group
  pub name: String,
  /// Volume type
  pub kind: VolumeKind,
  /// Size in sectors
  pub size: u64,
  /// MBR-style partition type byte describing the contents
  pub part_type: u8,
  /// Drive letter hint, if the metadata carries one
  pub hint: Option<String>,
  /// Declared number of components
  pub n_comps: u32,
  /// Member component ids, in record order
  pub components: Vec<u32>,
  /// Name of the owning disk group
  pub disk_group_name: String,
}

impl DiskGroup {
  /// Assemble a disk group out of one device's decoded records,
  /// cross-linking and validating the topology
  pub(crate) fn assemble(decoded: Vec<Record>, vmdb: &Vmdb, privhead: &PrivateHeader, device_path: &str) -> Result<Self, LdmError> {
    let mut group_rec: Option<records::DiskGroupRec> = None;
    let mut disks: BTreeMap<u32, Disk> = BTreeMap::new();
    let mut partitions: BTreeMap<u32, Partition> = BTreeMap::new();
    let mut components: BTreeMap<u32, Component> = BTreeMap::new();
    let mut volumes: BTreeMap<u32, Volume> = BTreeMap::new();

    for record in decoded {
      match record {
        Record::Disk(rec) => {
          let id = rec.id;
          if disks.insert(id, Disk::from(rec)).is_some() {
            return Err(LdmError::Invalid(format!("Duplicate disk record {}", id)));
          }
        }
        Record::Partition(rec) => {
          let id = rec.id;
          if partitions.insert(id, Partition::from(rec)).is_some() {
            return Err(LdmError::Invalid(format!("Duplicate partition record {}", id)));
          }
        }
        Record::Component(rec) => {
          let id = rec.id;
          if components.insert(id, Component::from(rec)).is_some() {
            return Err(LdmError::Invalid(format!("Duplicate component record {}", id)));
          }
        }
        Record::Volume(rec) => {
          let id = rec.id;
          if volumes.insert(id, Volume::from(rec)).is_some() {
            return Err(LdmError::Invalid(format!("Duplicate volume record {}", id)));
          }
        }
        Record::DiskGroup(rec) => {
          if group_rec.replace(rec).is_some() {
            return Err(LdmError::Invalid("More than one disk group record".to_string()));
          }
        }
      }
    }

    let group_rec = group_rec
      .ok_or_else(|| LdmError::Invalid("No disk group record".to_string()))?;

    verify_count("disk", disks.len(), vmdb.n_committed_disks)?;
    verify_count("partition", partitions.len(), vmdb.n_committed_parts)?;
    verify_count("component", components.len(), vmdb.n_committed_comps)?;
    verify_count("volume", volumes.len(), vmdb.n_committed_vols)?;

    // Wire partitions onto their disks and components
    for (id, part, ) in &partitions {
      if !disks.contains_key(&part.disk_id) {
        return Err(LdmError::Invalid(format!("Partition {} refers to unknown disk {}", id, part.disk_id)));
      }
      let component = components.get_mut(&part.parent_id)
        .ok_or_else(|| LdmError::Invalid(format!("Partition {} refers to unknown component {}", id, part.parent_id)))?;
      component.partitions.push(*id);
    }

    // Order each component's partitions by column and wire onto volumes
    for component in components.values_mut() {
      if component.partitions.is_empty() {
        return Err(LdmError::Invalid(format!("Component {} has no partitions", component.id)));
      }
      if component.partitions.len() != component.n_parts as usize {
        return Err(LdmError::Invalid(format!("Component {} has {} partitions, declared {}", component.id, component.partitions.len(), component.n_parts)));
      }

      component.partitions.sort_by_key(|pid| partitions[pid].index);
      let duplicate = component.partitions.windows(2)
        .find(|pair| partitions[&pair[0]].index == partitions[&pair[1]].index);
      if let Some(pair) = duplicate {
        return Err(LdmError::Invalid(format!("Component {} has two partitions in column {}", component.id, partitions[&pair[0]].index)));
      }

      let volume = volumes.get_mut(&component.parent_id)
        .ok_or_else(|| LdmError::Invalid(format!("Component {} refers to unknown volume {}", component.id, component.parent_id)))?;
      volume.components.push(component.id);
    }

    for (id, volume, ) in &mut volumes {
      if volume.components.is_empty() {
        return Err(LdmError::Invalid(format!("Volume {} has no components", id)));
      }
      if volume.components.len() != volume.n_comps as usize {
        return Err(LdmError::Invalid(format!("Volume {} has {} components, declared {}", id, volume.components.len(), volume.n_comps)));
      }
      volume.disk_group_name = group_rec.name.clone();
    }
    for disk in disks.values_mut() {
      disk.disk_group_name = group_rec.name.clone();
    }

    let mut group = Self {
      guid: privhead.disk_group_guid,
      id: group_rec.id,
      name: group_rec.name,
      committed_seq: vmdb.committed_seq,
      disks,
      partitions,
      components,
      volumes,
    };
    group.observe_disk(privhead, device_path);
    Ok(group)
  }

  /// Fold another observed physical disk of this group into the topology.
  /// The new disk's metadata is not reparsed; it must agree on the
  /// committed sequence, and then only the matching disk record's device
  /// fields are refreshed.
  pub(crate) fn merge_disk(&mut self, privhead: &PrivateHeader, vmdb: &Vmdb, device_path: &str) -> Result<(), LdmError> {
    if vmdb.committed_seq != self.committed_seq {
      return Err(LdmError::Inconsistent(format!("Disk group {}: {} has committed sequence {}, group has {}", self.guid, device_path, vmdb.committed_seq, self.committed_seq)));
    }
    self.observe_disk(privhead, device_path);
    Ok(())
  }

  /// Record the device geometry on the disk whose GUID the private header
  /// carries. A device matching no disk record is not part of this group
  /// and is ignored.
  fn observe_disk(&mut self, privhead: &PrivateHeader, device_path: &str) {
    if let Some(disk) = self.disks.values_mut().find(|d| d.guid == privhead.disk_guid) {
      disk.device = Some(DiskDevice {
        path: device_path.to_string(),
        data_start: privhead.logical_disk_start,
        data_size: privhead.logical_disk_size,
        metadata_start: privhead.ldm_config_start,
        metadata_size: privhead.ldm_config_size,
      });
    }
  }

  /// Look up a volume by name
  pub fn volume_by_name(&self, name: &str) -> Option<&Volume> {
    self.volumes.values().find(|vol| vol.name == name)
  }
}

fn verify_count(kind: &str, actual: usize, declared: u32) -> Result<(), LdmError> {
  if actual != declared as usize {
    return Err(LdmError::Invalid(format!("VMDB declares {} committed {} records, found {}", declared, kind, actual)));
  }
  Ok(())
}

impl From<records::DiskRec> for Disk {
  fn from(rec: records::DiskRec) -> Self {
    Self {
      id: rec.id,
      name: rec.name,
      guid: rec.guid,
      disk_group_name: String::new(),
      device: None,
    }
  }
}

impl From<records::PartitionRec> for Partition {
  fn from(rec: records::PartitionRec) -> Self {
    Self {
      id: rec.id,
      name: rec.name,
      parent_id: rec.parent_id,
      disk_id: rec.disk_id,
      start: rec.start,
      size: rec.size,
      vol_offset: rec.vol_offset,
      index: rec.index,
    }
  }
}

impl From<records::ComponentRec> for Component {
  fn from(rec: records::ComponentRec) -> Self {
    Self {
      id: rec.id,
      name: rec.name,
      parent_id: rec.parent_id,
      kind: rec.kind,
      n_parts: rec.n_parts,
      stripe_size: rec.stripe_size,
      n_columns: rec.n_columns,
      partitions: Vec::new(),
    }
  }
}

impl From<records::VolumeRec> for Volume {
  fn from(rec: records::VolumeRec) -> Self {
    Self {
      id: rec.id,
      name: rec.name,
      kind: rec.kind,
      size: rec.size,
      part_type: rec.part_type,
      hint: rec.hint,
      n_comps: rec.n_comps,
      components: Vec::new(),
      disk_group_name: String::new(),
    }
  }
}
