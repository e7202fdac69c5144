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

    device_types::geometry.rs

    Drive geometry for sector-dump media, and the table of standard floppy
    layouts used to guess the geometry of a raw image from its size.
*/

//! Define a [DriveGeometry] describing how sectors are laid out on a disk
//! with a standard format: cylinder, head and sector counts, the first sector
//! id on each track, and the sector size in bytes.

use crate::device_types::chs::DiskChs;
use lazy_static::lazy_static;
use std::fmt::Display;

#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct DriveGeometry {
    pub(crate) c: u16,
    pub(crate) h: u8,
    pub(crate) s: u8,
    pub(crate) s_off: u8,
    pub(crate) size: usize,
}

lazy_static! {
    /// Standard sector-dump floppy layouts, 256 bytes per sector, sectors numbered from 0.
    /// Where two layouts share a size the double-sided one comes first.
    pub static ref STANDARD_FLOPPY_GEOMETRIES: Vec<(&'static str, DriveGeometry)> = vec![
        ("SSSD 40 track", DriveGeometry::new(40, 1, 9, 0, 256)),
        ("DSSD 40 track", DriveGeometry::new(40, 2, 9, 0, 256)),
        ("SSDD 40 track", DriveGeometry::new(40, 1, 18, 0, 256)),
        ("DSDD 40 track", DriveGeometry::new(40, 2, 18, 0, 256)),
        ("DSSD 80 track", DriveGeometry::new(80, 2, 9, 0, 256)),
        ("DSDD 80 track", DriveGeometry::new(80, 2, 18, 0, 256)),
        ("DSHD 80 track", DriveGeometry::new(80, 2, 36, 0, 256)),
    ];
}

impl Display for DriveGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[c:{:4} h:{:2} s:{:3} s_off:{} size:{}]",
            self.c, self.h, self.s, self.s_off, self.size
        )
    }
}

impl DriveGeometry {
    pub fn new(c: u16, h: u8, s: u8, s_off: u8, size: usize) -> Self {
        Self { c, h, s, s_off, size }
    }
    #[inline]
    pub fn c(&self) -> u16 {
        self.c
    }
    #[inline]
    pub fn h(&self) -> u8 {
        self.h
    }
    #[inline]
    pub fn s(&self) -> u8 {
        self.s
    }
    #[inline]
    pub fn s_off(&self) -> u8 {
        self.s_off
    }
    /// Return the size of a sector in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
    /// Size code of a sector as stored in an ID field (128 << code bytes).
    /// Returns None for sizes that are not a power of two multiple of 128.
    pub fn size_code(&self) -> Option<u8> {
        (0..8u8).find(|code| 128usize << code == self.size)
    }
    pub fn total_sectors(&self) -> usize {
        (self.c as usize) * (self.h as usize) * (self.s as usize)
    }
    /// Size in bytes of a sector dump with this geometry.
    pub fn image_size(&self) -> usize {
        self.total_sectors() * self.size
    }
    /// Return true if `chs` addresses a sector inside this geometry.
    pub fn contains(&self, chs: impl Into<DiskChs>) -> bool {
        let chs = chs.into();
        self.c > chs.c
            && self.h > chs.h
            && chs.s >= self.s_off
            && (chs.s as u16) < (self.s_off as u16 + self.s as u16)
    }

    /// Look up a standard floppy layout matching a raw image size.
    pub fn from_image_size(size: usize) -> Option<DriveGeometry> {
        STANDARD_FLOPPY_GEOMETRIES
            .iter()
            .find(|(_, geom)| geom.image_size() == size)
            .map(|(name, geom)| {
                log::debug!("Matched image size {} to {} geometry {}", size, name, geom);
                *geom
            })
    }
}
