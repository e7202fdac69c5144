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

    devices::hdc9234::transfer.rs

    READ SECTORS and WRITE SECTORS. Each sector is located, then transferred
    over DMA once the sector time has elapsed. Multi-sector commands count down
    the sector count register and advance the desired sector when logical.
*/

use crate::{
    device_types::hdc9234::{SectorId, TerminationCode},
    devices::hdc9234::{
        command::{Command, ReadMode},
        host::{Hdc9234Host, MediaError},
        registers::*,
        Continuation,
        Hdc9234,
        OpResult,
        Phase,
    },
};

impl Hdc9234 {
    fn is_write(&self) -> bool {
        matches!(self.operation.command, Command::WriteSectors { .. })
    }

    /// Logical transfers match the desired sector number; physical ones take
    /// whichever sector comes next on the desired track.
    fn is_logical(&self) -> bool {
        match self.operation.command {
            Command::ReadSectors { mode, .. } => mode != ReadMode::Physical,
            Command::WriteSectors { logical, .. } => logical,
            _ => false,
        }
    }

    fn implied_seek(&self) -> bool {
        match self.operation.command {
            Command::ReadSectors { mode, .. } => mode != ReadMode::LogicalNoSeek,
            Command::WriteSectors { implied_seek, .. } => implied_seek,
            _ => false,
        }
    }

    pub(super) fn command_transfer(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        self.check_ready(host)?;

        if self.is_write() {
            if self.write_protect_terminates(host) {
                log::debug!("{}: drive is write protected", self.operation.command);
                return Err(TerminationCode::IdFieldError);
            }
            if let Command::WriteSectors { deleted: true, .. } = self.operation.command {
                log::debug!("Deleted data mark requested; media backend records normal data");
            }
        }

        self.saved_retry_count = self.regs.w(REG_RETRY_COUNT);
        if self.regs.w(REG_SECTOR_COUNT) == 0 {
            log::debug!("{}: sector count is 0", self.operation.command);
            return Ok(Continuation::Complete(TerminationCode::Success));
        }

        if self.implied_seek() {
            self.locate_id(host)?;
            if self.operation.steps_remaining > 0 {
                log::trace!(
                    "Implied seek: {} steps {:?}",
                    self.operation.steps_remaining,
                    self.operation.step_direction
                );
                return Ok(Continuation::Wait(Phase::Seek, self.step_time()));
            }
        }
        self.begin_sector(host)
    }

    /// Find the next sector to transfer and wait for it to pass under the head.
    pub(super) fn begin_sector(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        let id = self.verify(host, self.is_logical())?;
        self.operation.id = id;
        let sector_time = self
            .selected_drive_type()
            .sector_time_us(id.sector_len(), self.encoding());
        Ok(Continuation::Wait(Phase::Sector, sector_time))
    }

    pub(super) fn transfer_sector(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        let id = self.operation.id;
        let dma_start = self.regs.dma_address();

        let result = match self.operation.command {
            Command::ReadSectors { transfer, .. } => self.read_sector_data(host, &id, transfer),
            Command::WriteSectors { .. } => self.write_sector_data(host, &id),
            _ => Ok(()),
        };

        match result {
            Ok(()) => {
                self.log_cmd(self.operation.command, "transfer_sector", &format!("{}", id));
                self.sector_done(host)
            }
            Err(e) => {
                self.regs.set_dma_address(dma_start);
                self.sector_failed(host, &id, e)
            }
        }
    }

    fn read_sector_data(&mut self, host: &mut dyn Hdc9234Host, id: &SectorId, transfer: bool) -> Result<(), MediaError> {
        let len = id.sector_len();
        let mut data = self
            .backend(host)
            .ok_or(MediaError::NotReady)?
            .read_sector(id.cylinder, id.head, id.sector)?;

        if data.len() != len {
            log::warn!(
                "Sector {} returned {} bytes, expected {}",
                id,
                data.len(),
                len
            );
            data.resize(len, 0);
        }
        if transfer {
            self.dma_to_host(host, &data);
        }
        Ok(())
    }

    fn write_sector_data(&mut self, host: &mut dyn Hdc9234Host, id: &SectorId) -> Result<(), MediaError> {
        let data = self.dma_from_host(host, id.sector_len());
        self.backend(host)
            .ok_or(MediaError::NotReady)?
            .write_sector(id.cylinder, id.head, id.sector, &data)
    }

    /// Retry a failed sector while the retry count nibble allows it.
    fn sector_failed(&mut self, host: &mut dyn Hdc9234Host, id: &SectorId, err: MediaError) -> OpResult {
        let retry = self.regs.w(REG_RETRY_COUNT);
        if retry & RETRY_MASK != 0 {
            log::debug!("Sector {} failed ({}), retries left: {}", id, err, retry >> 4);
            self.regs.set_w(REG_RETRY_COUNT, retry - RETRY_UNIT);
            self.set_chip_status(CS_RETRY_REQUIRED);
            return self.begin_sector(host);
        }
        log::warn!("Sector {} failed: {}", id, err);
        Err(TerminationCode::DataError)
    }

    fn sector_done(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        self.operation.sectors_done += 1;
        let count = self.regs.w(REG_SECTOR_COUNT).wrapping_sub(1);
        self.regs.set_w(REG_SECTOR_COUNT, count);
        if count == 0 {
            return Ok(Continuation::Complete(TerminationCode::Success));
        }

        if self.is_logical() {
            let sector = self.desired_sector().wrapping_add(1);
            self.regs.set_w(REG_DESIRED_SECTOR, sector);
        }
        self.regs.set_w(REG_RETRY_COUNT, self.saved_retry_count);
        self.begin_sector(host)
    }
}
