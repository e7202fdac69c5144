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

    devices::hdc9234::host.rs

    Interfaces between the controller and the card it sits on: the DMA
    channel, the interrupt and DMA-in-progress lines, the auxiliary bus, and
    the media backends of the attached drives.
*/

use crate::device_types::hdc9234::SectorId;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("No medium is present in the drive")]
    NoMedia,
    #[error("The drive is not ready")]
    NotReady,
    #[error("Sector c:{0} h:{1} s:{2} was not found")]
    SectorNotFound(u16, u8, u8),
    #[error("The medium is write protected")]
    WriteProtected,
    #[error("The backend does not support raw track access")]
    RawTrackUnsupported,
    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepDirection {
    /// Toward higher cylinder numbers.
    In,
    /// Toward cylinder 0.
    Out,
}

/// The three latches the controller drives on its auxiliary bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuxLatch {
    /// One byte of the DMA address, sent high byte first before each burst.
    DmaAddress,
    /// Drive select lines (high nibble) and user outputs (low nibble).
    Output1,
    /// Head select, step and write control lines.
    Output2,
}

/// A storage medium in one drive.
///
/// Sector IDs are reported in on-disk order under the current head position;
/// the controller compares them against the desired cylinder, so a backend
/// whose head is on the wrong cylinder simply reports that cylinder.
pub trait DiskBackend {
    /// Return the next ID field passing under `head`.
    fn next_id(&mut self, head: u8) -> Result<SectorId, MediaError>;

    /// Move the head one cylinder.
    fn step(&mut self, direction: StepDirection);

    fn read_sector(&mut self, cylinder: u16, head: u8, sector: u8) -> Result<Vec<u8>, MediaError>;

    fn write_sector(&mut self, cylinder: u16, head: u8, sector: u8, data: &[u8]) -> Result<(), MediaError>;

    /// Return the raw track under `head`.
    fn read_track(&mut self, _head: u8) -> Result<Vec<u8>, MediaError> {
        Err(MediaError::RawTrackUnsupported)
    }

    /// Replace the raw track under `head`.
    fn write_track(&mut self, _head: u8, _data: &[u8]) -> Result<(), MediaError> {
        Err(MediaError::RawTrackUnsupported)
    }
}

/// The card hosting the controller.
pub trait Hdc9234Host {
    /// Read one byte from the DMA channel. The host advances its own address.
    fn dma_read(&mut self) -> u8;

    /// Write one byte to the DMA channel. The host advances its own address.
    fn dma_write(&mut self, data: u8);

    fn set_interrupt(&mut self, level: bool);

    /// Asserted for the duration of each DMA burst.
    fn set_dma_in_progress(&mut self, level: bool);

    fn aux_bus_out(&mut self, latch: AuxLatch, data: u8);

    /// Live drive status lines of the selected drive (DS_* bits).
    fn aux_bus_in(&mut self) -> u8;

    /// The floppy drive the card selected from the last OUTPUT1 value, if any.
    fn floppy(&mut self) -> Option<&mut dyn DiskBackend>;

    /// The hard disk the card selected from the last OUTPUT1 value, if any.
    fn hard_disk(&mut self) -> Option<&mut dyn DiskBackend>;
}
