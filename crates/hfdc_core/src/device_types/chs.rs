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

    device_types::chs.rs

    Cylinder, head, sector addressing for sector-dump media.
*/

//! Define a [DiskChs] that addresses one sector of a sector-dump image.
//! Sector ids are numbered from the geometry's sector id offset, so
//! conversion to and from linear addresses always needs a [DriveGeometry].

use crate::device_types::geometry::DriveGeometry;
use std::fmt::Display;

/// A cylinder, head, sector id address.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct DiskChs {
    pub(crate) c: u16,
    pub(crate) h: u8,
    pub(crate) s: u8,
}

impl From<(u16, u8, u8)> for DiskChs {
    fn from((c, h, s): (u16, u8, u8)) -> Self {
        Self { c, h, s }
    }
}

impl From<DiskChs> for (u16, u8, u8) {
    fn from(chs: DiskChs) -> Self {
        (chs.c, chs.h, chs.s)
    }
}

impl Display for DiskChs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:4} h:{:2} s:{:3}]", self.c, self.h, self.s)
    }
}

impl DiskChs {
    pub fn new(c: u16, h: u8, s: u8) -> Self {
        Self { c, h, s }
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

    /// Convert to a linear sector address. Returns None if the address lies
    /// outside of `geom`.
    pub fn to_lba(&self, geom: &DriveGeometry) -> Option<usize> {
        if !geom.contains(*self) {
            return None;
        }
        let hpc = geom.h() as usize;
        let spt = geom.s() as usize;
        Some((self.c as usize * hpc + self.h as usize) * spt + (self.s - geom.s_off()) as usize)
    }

    /// Byte offset of this sector within a sector-dump image.
    pub fn to_image_offset(&self, geom: &DriveGeometry) -> Option<usize> {
        self.to_lba(geom).map(|lba| lba * geom.size())
    }
}
