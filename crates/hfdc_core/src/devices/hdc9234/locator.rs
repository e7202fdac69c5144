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

    devices::hdc9234::locator.rs

    ID field search and verification. Reads the next sector ID from the
    selected drive, mirrors it into the current address registers and works
    out how far the head is from the desired cylinder.
*/

use crate::{
    device_types::hdc9234::{DriveType, SectorId, TerminationCode},
    devices::hdc9234::{
        host::{Hdc9234Host, MediaError, StepDirection},
        registers::*,
        track::IdField,
        Hdc9234,
        VERIFY_RETRIES,
    },
};

impl Hdc9234 {
    /// The cylinder addressed by the desired head and cylinder registers.
    pub(super) fn desired_cylinder(&self) -> u16 {
        let head_reg = self.regs.w(REG_DESIRED_HEAD);
        let low = self.regs.w(REG_DESIRED_CYLINDER) as u16;
        match self.selected_drive_type() {
            DriveType::AtHardDisk => ((((head_reg >> 4) & 0x03) as u16) << 8) | low,
            _ => (((head_reg & 0x70) as u16) << 4) | low,
        }
    }

    #[inline]
    pub(super) fn desired_head(&self) -> u8 {
        self.regs.w(REG_DESIRED_HEAD) & 0x0F
    }

    #[inline]
    pub(super) fn desired_sector(&self) -> u8 {
        self.regs.w(REG_DESIRED_SECTOR)
    }

    /// Read the next ID field under the desired head. On success the current
    /// address registers hold the ID and the operation records the seek needed
    /// to reach the desired cylinder.
    pub(super) fn locate_id(&mut self, host: &mut dyn Hdc9234Host) -> Result<SectorId, TerminationCode> {
        let head = self.desired_head();
        let result = match self.backend(host) {
            Some(backend) => backend.next_id(head),
            None => Err(MediaError::NotReady),
        };

        let id = match result {
            Ok(id) => id,
            Err(e) => {
                log::debug!("locate_id(): no ID field found: {}", e);
                self.set_chip_status(CS_SYNC_ERROR);
                return Err(TerminationCode::IdFieldError);
            }
        };
        log::trace!("locate_id(): found {}", id);

        self.set_current_address(&id);
        self.operation.found_id = true;
        self.operation.id = id;

        let desired = self.desired_cylinder();
        if id.cylinder < desired {
            self.operation.step_direction = Some(StepDirection::In);
            self.operation.steps_remaining = desired - id.cylinder;
        }
        else {
            self.operation.step_direction = Some(StepDirection::Out);
            self.operation.steps_remaining = id.cylinder - desired;
        }
        Ok(id)
    }

    fn set_current_address(&mut self, id: &SectorId) {
        let field = IdField::encode(id, self.selected_drive_type());
        self.regs.set_r(REG_CURRENT_CYLINDER, field.cylinder);
        self.regs.set_r(REG_CURRENT_HEAD, field.head);
        self.regs.set_r(REG_CURRENT_IDENT, field.ident);
        if id.deleted {
            self.set_chip_status(CS_DELETED_DATA);
        }
        else {
            self.clear_chip_status(CS_DELETED_DATA);
        }
    }

    /// Read ID fields until one matches the desired cylinder and head, and the
    /// desired sector if `check_sector` is set. Gives up after one revolution's
    /// worth of IDs.
    pub(super) fn verify(
        &mut self,
        host: &mut dyn Hdc9234Host,
        check_sector: bool,
    ) -> Result<SectorId, TerminationCode> {
        let cylinder = self.desired_cylinder();
        let head = self.desired_head();
        let sector = self.desired_sector();

        for _ in 0..VERIFY_RETRIES {
            let id = self.locate_id(host)?;
            if id.cylinder == cylinder && id.head == head && (!check_sector || id.sector == sector) {
                return Ok(id);
            }
        }

        log::debug!(
            "verify(): no ID matched c:{} h:{}{}",
            cylinder,
            head,
            if check_sector { format!(" s:{}", sector) } else { String::new() }
        );
        self.set_chip_status(CS_COMPARE_ERROR);
        Err(TerminationCode::SeekError)
    }
}
