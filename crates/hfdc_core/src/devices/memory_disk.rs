/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    devices::memory_disk.rs

    A sector-dump disk image held in memory. Implements DiskBackend for both
    floppy and hard disk media with a standard (uniform) format.
*/

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::{
    device_types::{chs::DiskChs, geometry::DriveGeometry, hdc9234::SectorId},
    devices::hdc9234::{
        host::{DiskBackend, MediaError, StepDirection},
        registers::{DS_READY, DS_SEEK_COMPLETE, DS_SELECT_ACK, DS_TRACK00, DS_WRITE_PROTECT},
    },
};

pub struct MemoryDisk {
    geometry: DriveGeometry,
    size_code: u8,
    data: Vec<u8>,
    path: Option<PathBuf>,
    /// Order in which sector ids pass under the head on every track.
    interleave: Vec<u8>,
    id_cursor: usize,
    cylinder: u16,
    write_protected: bool,
    present: bool,
    dirty: bool,
}

impl MemoryDisk {
    /// Create a blank image. Every sector reads back as zeros.
    pub fn new(geometry: DriveGeometry) -> Result<Self> {
        let data = vec![0; geometry.image_size()];
        Self::from_bytes(data, geometry)
    }

    pub fn from_bytes(data: Vec<u8>, geometry: DriveGeometry) -> Result<Self> {
        let Some(size_code) = geometry.size_code()
        else {
            bail!("Unsupported sector size: {}", geometry.size());
        };
        if geometry.total_sectors() == 0 {
            bail!("Geometry {} has no sectors", geometry);
        }
        if data.len() != geometry.image_size() {
            bail!(
                "Image size {} does not match geometry {} ({} bytes)",
                data.len(),
                geometry,
                geometry.image_size()
            );
        }

        let interleave = (0..geometry.s()).map(|s| s + geometry.s_off()).collect();
        Ok(Self {
            geometry,
            size_code,
            data,
            path: None,
            interleave,
            id_cursor: 0,
            cylinder: 0,
            write_protected: false,
            present: true,
            dirty: false,
        })
    }

    /// Load a sector dump, guessing a standard floppy geometry from its size.
    pub fn from_file(path: impl AsRef<Path>, write_protected: bool) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("Failed to read image file {}", path.display()))?;
        let Some(geometry) = DriveGeometry::from_image_size(data.len())
        else {
            bail!("Could not determine geometry of {} ({} bytes)", path.display(), data.len());
        };
        let mut disk = Self::from_bytes(data, geometry)?;
        disk.path = Some(path.to_path_buf());
        disk.write_protected = write_protected;
        log::debug!("Loaded image {} with geometry {}", path.display(), geometry);
        Ok(disk)
    }

    /// Load a sector dump with an explicit geometry, as needed for hard disks.
    pub fn from_file_with_geometry(path: impl AsRef<Path>, geometry: DriveGeometry) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("Failed to read image file {}", path.display()))?;
        let mut disk = Self::from_bytes(data, geometry)?;
        disk.path = Some(path.to_path_buf());
        Ok(disk)
    }

    /// Write the image back to the file it was loaded from.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path
        else {
            bail!("Image has no backing file");
        };
        fs::write(path, &self.data).with_context(|| format!("Failed to write image file {}", path.display()))?;
        self.dirty = false;
        Ok(())
    }

    /// Set the on-disk order of sector ids. Ids must cover every sector of a track.
    pub fn set_interleave(&mut self, order: &[u8]) -> Result<()> {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        let expected: Vec<u8> = (0..self.geometry.s()).map(|s| s + self.geometry.s_off()).collect();
        if sorted != expected {
            bail!("Interleave {:?} does not cover sectors {:?}", order, expected);
        }
        self.interleave = order.to_vec();
        self.id_cursor = 0;
        Ok(())
    }

    pub fn geometry(&self) -> DriveGeometry {
        self.geometry
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn cylinder(&self) -> u16 {
        self.cylinder
    }

    /// Place the head on `cylinder` without stepping.
    pub fn set_cylinder(&mut self, cylinder: u16) {
        self.cylinder = cylinder.min(self.geometry.c().saturating_sub(1));
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Eject (false) or insert (true) the medium.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn write_protected(&self) -> bool {
        self.write_protected
    }

    pub fn set_write_protected(&mut self, write_protected: bool) {
        self.write_protected = write_protected;
    }

    /// Drive status lines (DS_* bits) as a drive holding this medium would
    /// report them. Floppy drives have no select acknowledge line.
    pub fn drive_status(&self, floppy: bool) -> u8 {
        let mut status = DS_SEEK_COMPLETE;
        if !floppy {
            status |= DS_SELECT_ACK;
        }
        if self.cylinder == 0 {
            status |= DS_TRACK00;
        }
        if self.present {
            status |= DS_READY;
            if self.write_protected {
                status |= DS_WRITE_PROTECT;
            }
        }
        status
    }

    fn sector_range(&self, cylinder: u16, head: u8, sector: u8) -> Result<std::ops::Range<usize>, MediaError> {
        if !self.present {
            return Err(MediaError::NoMedia);
        }
        let offset = DiskChs::new(cylinder, head, sector)
            .to_image_offset(&self.geometry)
            .ok_or(MediaError::SectorNotFound(cylinder, head, sector))?;
        Ok(offset..offset + self.geometry.size())
    }
}

impl DiskBackend for MemoryDisk {
    fn next_id(&mut self, head: u8) -> Result<SectorId, MediaError> {
        if !self.present {
            return Err(MediaError::NoMedia);
        }
        if head >= self.geometry.h() || self.cylinder >= self.geometry.c() {
            return Err(MediaError::SectorNotFound(self.cylinder, head, 0));
        }
        let sector = self.interleave[self.id_cursor];
        self.id_cursor = (self.id_cursor + 1) % self.interleave.len();
        Ok(SectorId::new(self.cylinder, head, sector, self.size_code))
    }

    fn step(&mut self, direction: StepDirection) {
        match direction {
            StepDirection::In => {
                if self.cylinder + 1 < self.geometry.c() {
                    self.cylinder += 1;
                }
            }
            StepDirection::Out => {
                self.cylinder = self.cylinder.saturating_sub(1);
            }
        }
    }

    fn read_sector(&mut self, cylinder: u16, head: u8, sector: u8) -> Result<Vec<u8>, MediaError> {
        let range = self.sector_range(cylinder, head, sector)?;
        Ok(self.data[range].to_vec())
    }

    fn write_sector(&mut self, cylinder: u16, head: u8, sector: u8, data: &[u8]) -> Result<(), MediaError> {
        let range = self.sector_range(cylinder, head, sector)?;
        if self.write_protected {
            return Err(MediaError::WriteProtected);
        }
        if data.len() != range.len() {
            log::warn!(
                "write_sector(): {} bytes written to {} byte sector {}",
                data.len(),
                range.len(),
                DiskChs::new(cylinder, head, sector)
            );
        }
        let len = data.len().min(range.len());
        self.data[range.start..range.start + len].copy_from_slice(&data[..len]);
        self.dirty = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk() -> MemoryDisk {
        MemoryDisk::new(DriveGeometry::new(40, 2, 9, 0, 256)).unwrap()
    }

    #[test]
    fn ids_follow_interleave() {
        let mut disk = disk();
        disk.set_interleave(&[0, 7, 5, 3, 1, 8, 6, 4, 2]).unwrap();
        let ids: Vec<u8> = (0..10).map(|_| disk.next_id(1).unwrap().sector).collect();
        assert_eq!(ids, vec![0, 7, 5, 3, 1, 8, 6, 4, 2, 0]);

        assert!(disk.set_interleave(&[0, 1, 2]).is_err());
        assert!(matches!(disk.next_id(2), Err(MediaError::SectorNotFound(..))));
    }

    #[test]
    fn sectors_read_back() {
        let mut disk = disk();
        let payload = vec![0x5A; 256];
        disk.write_sector(3, 1, 4, &payload).unwrap();
        assert_eq!(disk.read_sector(3, 1, 4).unwrap(), payload);
        assert_eq!(disk.read_sector(3, 1, 5).unwrap(), vec![0; 256]);
        assert!(disk.is_dirty());
        assert!(matches!(disk.read_sector(3, 1, 9), Err(MediaError::SectorNotFound(3, 1, 9))));
    }

    #[test]
    fn write_protect_and_eject() {
        let mut disk = disk();
        disk.set_write_protected(true);
        assert!(matches!(disk.write_sector(0, 0, 0, &[0; 256]), Err(MediaError::WriteProtected)));
        assert_ne!(disk.drive_status(true) & DS_WRITE_PROTECT, 0);

        disk.set_present(false);
        assert!(matches!(disk.next_id(0), Err(MediaError::NoMedia)));
        assert_eq!(disk.drive_status(true) & DS_READY, 0);
    }

    #[test]
    fn stepping_is_clamped() {
        let mut disk = disk();
        disk.step(StepDirection::Out);
        assert_eq!(disk.cylinder(), 0);
        assert_ne!(disk.drive_status(true) & DS_TRACK00, 0);
        for _ in 0..50 {
            disk.step(StepDirection::In);
        }
        assert_eq!(disk.cylinder(), 39);
        assert_eq!(disk.next_id(0).unwrap().cylinder, 39);
    }

    #[test]
    fn bad_image_size_is_rejected() {
        assert!(MemoryDisk::from_bytes(vec![0; 1000], DriveGeometry::new(40, 2, 9, 0, 256)).is_err());
    }
}
