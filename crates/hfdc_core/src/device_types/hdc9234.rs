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

    device_types::hdc9234.rs

    Drive types, sector address fields and termination codes of the
    HDC9234 controller family.
*/

use std::fmt::Display;

use strum_macros::{Display as StrumDisplay, EnumIter};

/// First ident byte of a floppy or SMC-format ID field.
pub const IDENT_DEFAULT: u8 = 0xFE;

/// AT-format ident bytes, one per 256-cylinder band.
pub const AT_IDENT_BANDS: [u8; 4] = [0xFE, 0xFF, 0xFC, 0xFD];

// Step rates in microseconds, indexed by MODE register bits 2-0.
pub const STEP_RATES_HD_US: [f64; 8] = [35.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0];
pub const STEP_RATES_FD8_US: [f64; 8] = [218.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0, 32000.0];
pub const STEP_RATES_FD5_US: [f64; 8] = [436.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0, 32000.0, 64000.0];

pub const HEAD_SETTLE_FLOPPY_US: f64 = 15_000.0;
pub const HEAD_SETTLE_HD_US: f64 = 0.0;

pub const REVOLUTION_FD5_US: f64 = 200_000.0;
pub const REVOLUTION_FD8_US: f64 = 166_667.0;
pub const REVOLUTION_HD_US: f64 = 16_667.0;

/// Bytes of sync, marks, ID field, CRCs and minimal gaps around each sector.
pub const SECTOR_OVERHEAD_BYTES: usize = 62;

/// Drive type selected by bits 3-2 of the DRIVE SELECT operand.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, StrumDisplay, EnumIter)]
pub enum DriveType {
    #[default]
    #[strum(to_string = "AT hard disk")]
    AtHardDisk,
    #[strum(to_string = "SMC hard disk")]
    SmcHardDisk,
    #[strum(to_string = "8\" floppy")]
    Floppy8,
    #[strum(to_string = "5.25\" floppy")]
    Floppy5,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, StrumDisplay)]
pub enum TrackEncoding {
    #[default]
    #[strum(to_string = "MFM")]
    Mfm,
    #[strum(to_string = "FM")]
    Fm,
}

impl DriveType {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => DriveType::AtHardDisk,
            1 => DriveType::SmcHardDisk,
            2 => DriveType::Floppy8,
            _ => DriveType::Floppy5,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            DriveType::AtHardDisk => 0,
            DriveType::SmcHardDisk => 1,
            DriveType::Floppy8 => 2,
            DriveType::Floppy5 => 3,
        }
    }

    #[inline]
    pub fn is_floppy(&self) -> bool {
        matches!(self, DriveType::Floppy8 | DriveType::Floppy5)
    }

    /// Hard disks are always MFM. Floppies follow the MODE register density bit.
    pub fn encoding(&self, fm_mode: bool) -> TrackEncoding {
        if self.is_floppy() && fm_mode {
            TrackEncoding::Fm
        }
        else {
            TrackEncoding::Mfm
        }
    }

    pub fn step_time_us(&self, rate: u8, encoding: TrackEncoding) -> f64 {
        let table = match self {
            DriveType::AtHardDisk | DriveType::SmcHardDisk => &STEP_RATES_HD_US,
            DriveType::Floppy8 => &STEP_RATES_FD8_US,
            DriveType::Floppy5 => &STEP_RATES_FD5_US,
        };
        let base = table[(rate & 0x07) as usize];
        match encoding {
            TrackEncoding::Fm => base * 2.0,
            TrackEncoding::Mfm => base,
        }
    }

    pub fn settle_time_us(&self) -> f64 {
        if self.is_floppy() {
            HEAD_SETTLE_FLOPPY_US
        }
        else {
            HEAD_SETTLE_HD_US
        }
    }

    pub fn revolution_us(&self) -> f64 {
        match self {
            DriveType::Floppy5 => REVOLUTION_FD5_US,
            DriveType::Floppy8 => REVOLUTION_FD8_US,
            _ => REVOLUTION_HD_US,
        }
    }

    /// Raw track length in bytes.
    pub fn track_size(&self, encoding: TrackEncoding) -> usize {
        match (self, encoding) {
            (DriveType::Floppy5, TrackEncoding::Mfm) => 6250,
            (DriveType::Floppy5, TrackEncoding::Fm) => 3125,
            (DriveType::Floppy8, TrackEncoding::Mfm) => 10416,
            (DriveType::Floppy8, TrackEncoding::Fm) => 5208,
            _ => 10416,
        }
    }

    /// Time for one sector of `len` bytes to pass under the head.
    pub fn sector_time_us(&self, len: usize, encoding: TrackEncoding) -> f64 {
        let byte_time = self.revolution_us() / self.track_size(encoding) as f64;
        (len + SECTOR_OVERHEAD_BYTES) as f64 * byte_time
    }
}

/// A decoded sector address field.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SectorId {
    pub cylinder: u16,
    pub head: u8,
    pub sector: u8,
    /// Size code; the sector holds 128 << size bytes.
    pub size: u8,
    /// The data field carries a deleted data mark.
    pub deleted: bool,
}

impl Display for SectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[c:{:4} h:{:2} s:{:3} n:{}{}]",
            self.cylinder,
            self.head,
            self.sector,
            self.size,
            if self.deleted { " deleted" } else { "" }
        )
    }
}

impl SectorId {
    pub fn new(cylinder: u16, head: u8, sector: u8, size: u8) -> Self {
        Self {
            cylinder,
            head,
            sector,
            size,
            deleted: false,
        }
    }

    #[inline]
    pub fn sector_len(&self) -> usize {
        128usize << (self.size & 0x07)
    }

    /// Ident byte as recorded for this drive type. AT drives encode the
    /// cylinder band; everything else uses 0xFE.
    pub fn ident(&self, drive_type: DriveType) -> u8 {
        match drive_type {
            DriveType::AtHardDisk => AT_IDENT_BANDS[((self.cylinder >> 8) & 0x03) as usize],
            _ => IDENT_DEFAULT,
        }
    }
}

/// Cylinder offset of an AT ident band byte. Unknown idents map to band 0.
pub fn at_ident_to_cylinder_base(ident: u8) -> u16 {
    match AT_IDENT_BANDS.iter().position(|&band| band == ident) {
        Some(band) => (band as u16) << 8,
        None => {
            log::warn!("Unknown AT ident byte {:02X}", ident);
            0
        }
    }
}

/// The 2-bit outcome latched in the interrupt status register at the end of
/// every command.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, StrumDisplay)]
pub enum TerminationCode {
    #[default]
    #[strum(to_string = "Success")]
    Success = 0x00,
    #[strum(to_string = "ID field error")]
    IdFieldError = 0x08,
    #[strum(to_string = "Seek error")]
    SeekError = 0x10,
    #[strum(to_string = "Data error")]
    DataError = 0x18,
}

impl TerminationCode {
    pub fn from_status(status: u8) -> Self {
        match status & 0x18 {
            0x00 => TerminationCode::Success,
            0x08 => TerminationCode::IdFieldError,
            0x10 => TerminationCode::SeekError,
            _ => TerminationCode::DataError,
        }
    }

    #[inline]
    pub fn bits(&self) -> u8 {
        *self as u8
    }
}
