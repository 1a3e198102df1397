use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::group::{Component, ComponentKind, DiskDevice, DiskGroup, Partition, Volume, VolumeKind};
use crate::LdmError;

/// Characters that survive unescaped in a DM name: the URI unreserved set.
/// Everything else is percent-escaped so the name is safe as a
/// filesystem-visible target under /dev/mapper.
const DM_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'.')
  .remove(b'_')
  .remove(b'~');

/// Mirror region size passed to the raid1 target, in sectors
const MIRROR_REGION_SZ: u32 = 128;

/// One device-mapper table: a name for the DM device and the table body to
/// load into it
#[derive(Debug)]
pub struct DmTable {
  /// DM device name
  pub name: String,
  /// Table body; one target per line, trailing newline included
  pub table: String,
}

/// Generate the DM tables exposing one volume.
///
/// Tables are ordered dependencies-first: a mirror or raid5 table appears
/// after the per-partition tables it names, so a caller can instantiate
/// the list front to back.
pub fn volume_tables(group: &DiskGroup, volume: &Volume) -> Result<Vec<DmTable>, LdmError> {
  match volume.kind {
    VolumeKind::Gen => {
      if volume.components.len() == 1 {
        let comp = component(group, volume.components[0])?;
        match comp.kind {
          ComponentKind::Spanned => spanned(group, volume, comp).map(|t| vec![t]),
          ComponentKind::Striped => striped(group, volume, comp).map(|t| vec![t]),
          ComponentKind::Raid => Err(LdmError::NotSupported(format!("Raid component {} in Gen volume {}", comp.name, volume.name))),
        }
      } else {
        mirrored(group, volume)
      }
    }
    VolumeKind::Raid5 => raid5(group, volume),
  }
}

/// Generate the linear DM table exposing one partition
pub fn partition_table(group: &DiskGroup, part: &Partition) -> Result<DmTable, LdmError> {
  let disk = group.disks.get(&part.disk_id)
    .ok_or_else(|| LdmError::Invalid(format!("Partition {} refers to unknown disk {}", part.name, part.disk_id)))?;
  let device = disk.device.as_ref()
    .ok_or_else(|| LdmError::MissingDisk(format!("Disk {} ({}) has not been observed", disk.name, disk.guid)))?;

  Ok(DmTable {
    name: dm_name(&disk.disk_group_name, &part.name),
    table: format!("0 {} linear {} {}\n", part.size, device.path, device.data_start + part.start),
  })
}

/// Concatenation: one linear target per partition, in column order. Every
/// partition's recorded volume offset must equal the running position.
fn spanned(group: &DiskGroup, volume: &Volume, comp: &Component) -> Result<DmTable, LdmError> {
  let mut table = String::new();
  let mut pos = 0u64;
  for pid in &comp.partitions {
    let part = partition(group, *pid)?;
    let device = present_device(group, part)?;
    if part.vol_offset != pos {
      return Err(LdmError::Invalid(format!("Partition {} at volume offset {}, expected {}", part.name, part.vol_offset, pos)));
    }
    table.push_str(&format!("{} {} linear {} {}\n", pos, pos + part.size, device.path, device.data_start + part.start));
    pos += part.size;
  }

  Ok(DmTable {
    name: dm_name(&volume.disk_group_name, &volume.name),
    table,
  })
}

/// Striped: a single target naming every column. A missing disk is fatal
/// here; striping has no degraded mode.
fn striped(group: &DiskGroup, volume: &Volume, comp: &Component) -> Result<DmTable, LdmError> {
  let (stripe_size, n_columns, ) = stripe_geometry(comp)?;

  let mut table = format!("0 {} striped {} {}", volume.size, n_columns, stripe_size);
  for pid in &comp.partitions {
    let part = partition(group, *pid)?;
    let device = present_device(group, part)?;
    table.push_str(&format!(" {} {}", device.path, device.data_start + part.start));
  }
  table.push('\n');

  Ok(DmTable {
    name: dm_name(&volume.disk_group_name, &volume.name),
    table,
  })
}

/// Mirror: a raid1 target over one child table per component. A leg whose
/// disk is absent degrades to a `- -` slot; the mirror fails only when no
/// leg is left at all.
fn mirrored(group: &DiskGroup, volume: &Volume) -> Result<Vec<DmTable>, LdmError> {
  let mut tables = Vec::new();
  let mut body = format!("0 {} raid raid1 1 {} {}", volume.size, MIRROR_REGION_SZ, volume.components.len());
  let mut missing = 0;

  for cid in &volume.components {
    let comp = component(group, *cid)?;
    if comp.kind != ComponentKind::Spanned || comp.partitions.len() != 1 {
      return Err(LdmError::NotSupported(format!("Mirror leg {} of volume {} is not a single spanned partition", comp.name, volume.name)));
    }
    let part = partition(group, comp.partitions[0])?;

    match partition_table(group, part) {
      Ok(child) => {
        body.push_str(&format!(" - /dev/mapper/{}", child.name));
        tables.push(child);
      }
      Err(LdmError::MissingDisk(_)) => {
        body.push_str(" - -");
        missing += 1;
      }
      Err(e) => return Err(e),
    }
  }

  if missing == volume.components.len() {
    return Err(LdmError::MissingDisk(format!("Every leg of mirrored volume {} is missing", volume.name)));
  }

  body.push('\n');
  tables.push(DmTable {
    name: dm_name(&volume.disk_group_name, &volume.name),
    table: body,
  });
  Ok(tables)
}

/// RAID5 over the columns of a single raid component, left-symmetric
/// layout. One absent disk degrades its slot; more than one is fatal.
fn raid5(group: &DiskGroup, volume: &Volume) -> Result<Vec<DmTable>, LdmError> {
  if volume.components.len() != 1 {
    return Err(LdmError::NotSupported(format!("RAID5 volume {} with {} components", volume.name, volume.components.len())));
  }
  let comp = component(group, volume.components[0])?;
  if comp.kind != ComponentKind::Raid {
    return Err(LdmError::NotSupported(format!("RAID5 volume {} over a {:?} component", volume.name, comp.kind)));
  }
  let (stripe_size, n_columns, ) = stripe_geometry(comp)?;

  let mut tables = Vec::new();
  let mut body = format!("0 {} raid raid5_ls 1 {} {}", volume.size, stripe_size, n_columns);
  let mut missing = 0;

  for pid in &comp.partitions {
    let part = partition(group, *pid)?;
    match partition_table(group, part) {
      Ok(child) => {
        body.push_str(&format!(" - /dev/mapper/{}", child.name));
        tables.push(child);
      }
      Err(LdmError::MissingDisk(_)) => {
        body.push_str(" - -");
        missing += 1;
      }
      Err(e) => return Err(e),
    }
  }

  if missing > 1 {
    return Err(LdmError::MissingDisk(format!("{} disks of RAID5 volume {} are missing; can only degrade one", missing, volume.name)));
  }

  body.push('\n');
  tables.push(DmTable {
    name: dm_name(&volume.disk_group_name, &volume.name),
    table: body,
  });
  Ok(tables)
}

fn dm_name(dg_name: &str, child: &str) -> String {
  format!("ldm_{}_{}", utf8_percent_encode(dg_name, DM_NAME_SET), utf8_percent_encode(child, DM_NAME_SET))
}

fn component<'a>(group: &'a DiskGroup, id: u32) -> Result<&'a Component, LdmError> {
  group.components.get(&id)
    .ok_or_else(|| LdmError::Invalid(format!("Unknown component {}", id)))
}

fn partition<'a>(group: &'a DiskGroup, id: u32) -> Result<&'a Partition, LdmError> {
  group.partitions.get(&id)
    .ok_or_else(|| LdmError::Invalid(format!("Unknown partition {}", id)))
}

/// Device geometry of the disk under a partition, or `MissingDisk`
fn present_device<'a>(group: &'a DiskGroup, part: &Partition) -> Result<&'a DiskDevice, LdmError> {
  let disk = group.disks.get(&part.disk_id)
    .ok_or_else(|| LdmError::Invalid(format!("Partition {} refers to unknown disk {}", part.name, part.disk_id)))?;
  disk.device.as_ref()
    .ok_or_else(|| LdmError::MissingDisk(format!("Disk {} ({}) has not been observed", disk.name, disk.guid)))
}

/// Stripe size and column count, mandatory for striped and raid layouts
fn stripe_geometry(comp: &Component) -> Result<(u64, u32, ), LdmError> {
  match (comp.stripe_size, comp.n_columns, ) {
    (Some(stripe_size), Some(n_columns), ) => Ok((stripe_size, n_columns, )),
    _ => Err(LdmError::Invalid(format!("Component {} lacks stripe geometry", comp.name))),
  }
}
