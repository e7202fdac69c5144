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

    devices::hdc9234::drive.rs

    Drive selection, polling and head positioning: DRIVE SELECT, DESELECT,
    POLL DRIVES, RESTORE, STEP and SEEK/READ ID, plus the implied seek shared
    with the sector transfer commands.
*/

use crate::{
    device_types::hdc9234::{DriveType, TerminationCode},
    devices::hdc9234::{
        command::Command,
        host::{AuxLatch, Hdc9234Host, StepDirection},
        registers::*,
        Continuation,
        Hdc9234,
        OpResult,
        Phase,
        SelectedDrive,
        MAX_RESTORE_STEPS,
        MAX_SEEK_COMPLETE_POLLS,
        MAX_UNITS,
    },
};

impl Hdc9234 {
    pub(super) fn set_chip_status(&mut self, bits: u8) {
        let status = self.regs.r(REG_CHIP_STATUS);
        self.regs.set_r(REG_CHIP_STATUS, status | bits);
    }

    pub(super) fn clear_chip_status(&mut self, bits: u8) {
        let status = self.regs.r(REG_CHIP_STATUS);
        self.regs.set_r(REG_CHIP_STATUS, status & !bits);
    }

    /// Fail with an ID field error unless a drive is selected and ready.
    pub(super) fn check_ready(&mut self, host: &mut dyn Hdc9234Host) -> Result<(), TerminationCode> {
        if self.selected.is_none() {
            log::debug!("{}: no drive selected", self.operation.command);
            self.set_chip_status(CS_SYNC_ERROR);
            return Err(TerminationCode::IdFieldError);
        }
        if host.aux_bus_in() & DS_READY == 0 {
            log::debug!("{}: drive not ready", self.operation.command);
            self.set_chip_status(CS_SYNC_ERROR);
            return Err(TerminationCode::IdFieldError);
        }
        Ok(())
    }

    /// True if the termination conditions ask to stop on a write protected drive
    /// and the drive reports one.
    pub(super) fn write_protect_terminates(&mut self, host: &mut dyn Hdc9234Host) -> bool {
        self.regs.w(REG_TERM_CONDITIONS) & TC_TERM_WRPROT != 0 && host.aux_bus_in() & DS_WRITE_PROTECT != 0
    }

    fn user_outputs(&self) -> u8 {
        self.regs.w(REG_RETRY_COUNT) & USER_OUTPUT_MASK
    }

    pub(super) fn command_deselect(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        self.selected = None;
        self.set_output1(host, 0);
        Ok(Continuation::Complete(TerminationCode::Success))
    }

    pub(super) fn command_drive_select(
        &mut self,
        host: &mut dyn Hdc9234Host,
        unit: u8,
        drive_type: DriveType,
        head_load_delay: bool,
    ) -> OpResult {
        self.selected = Some(SelectedDrive {
            unit,
            drive_type,
            head_load_delay,
        });
        let output1 = (0x10 << unit) | self.user_outputs();
        self.set_output1(host, output1);

        // The DMA registers double as format setup registers.
        self.regs.set_r(REG_CURRENT_HEAD, self.regs.w(REG_DMA7_0));
        self.regs.set_r(REG_CURRENT_CYLINDER, self.regs.w(REG_DMA15_8));
        self.regs.set_r(REG_CURRENT_IDENT, self.regs.w(REG_DMA23_16));
        self.regs.set_r(REG_CHIP_STATUS, unit & CS_PRESENT_DRIVE);

        log::debug!(
            "Selected unit {} ({}), OUTPUT1: {:02X}{}",
            unit,
            drive_type,
            output1,
            if head_load_delay { ", head load delay" } else { "" }
        );
        Ok(Continuation::Complete(TerminationCode::Success))
    }

    /// Select each unit in `mask` from 3 down to 0 and stop at the first one
    /// reporting seek complete.
    pub(super) fn command_poll_drives(&mut self, host: &mut dyn Hdc9234Host, mask: u8) -> OpResult {
        let user_outputs = self.user_outputs();
        let drive_type = self.selected_drive_type();
        let head_load_delay = self.selected.map(|s| s.head_load_delay).unwrap_or(false);

        for unit in (0..MAX_UNITS).rev() {
            if mask & (1 << unit) == 0 {
                continue;
            }
            self.set_output1(host, (0x10 << unit) | user_outputs);
            self.selected = Some(SelectedDrive {
                unit,
                drive_type,
                head_load_delay,
            });
            self.regs.set_r(REG_CHIP_STATUS, unit & CS_PRESENT_DRIVE);

            if host.aux_bus_in() & DS_SEEK_COMPLETE != 0 {
                log::debug!("Poll drives: unit {} reports seek complete", unit);
                return Ok(Continuation::Complete(TerminationCode::Success));
            }
        }
        log::debug!("Poll drives: no unit in mask {:04b} reports seek complete", mask);
        Err(TerminationCode::SeekError)
    }

    /// Pulse the step line once.
    pub(super) fn issue_step(&mut self, host: &mut dyn Hdc9234Host, direction: StepDirection) {
        let head = self.desired_head();
        self.output2.set_head(head);
        self.output2.set_direction_in(direction == StepDirection::In);
        self.output2.set_step_pulse(true);
        host.aux_bus_out(AuxLatch::Output2, self.output2.into_bytes()[0]);
        self.output2.set_step_pulse(false);

        if let Some(backend) = self.backend(host) {
            backend.step(direction);
        }
        self.operation.steps_taken += 1;
    }

    pub(super) fn command_restore(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        if self.selected.is_none() {
            // Seek complete will read back clear in the drive status.
            log::debug!("Restore with no drive selected");
            return Ok(Continuation::Complete(TerminationCode::Success));
        }
        self.restore_step(host)
    }

    pub(super) fn restore_step(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        if host.aux_bus_in() & DS_TRACK00 != 0 {
            log::trace!("Restore reached track 0 after {} steps", self.operation.steps_taken);
            return self.steps_finished(host);
        }
        if self.operation.steps_taken >= MAX_RESTORE_STEPS {
            log::warn!("Restore gave up after {} steps", self.operation.steps_taken);
            return Err(TerminationCode::SeekError);
        }
        self.issue_step(host, StepDirection::Out);
        Ok(Continuation::Wait(Phase::Restore, self.step_time()))
    }

    pub(super) fn command_step(
        &mut self,
        host: &mut dyn Hdc9234Host,
        direction: StepDirection,
        buffered: bool,
    ) -> OpResult {
        if self.selected.is_none() {
            self.set_chip_status(CS_SYNC_ERROR);
            return Err(TerminationCode::IdFieldError);
        }
        self.issue_step(host, direction);
        if buffered {
            Ok(Continuation::Wait(Phase::WaitSeekComplete, self.step_time()))
        }
        else {
            Ok(Continuation::Complete(TerminationCode::Success))
        }
    }

    /// End of a RESTORE or STEP: buffered variants wait for seek complete.
    fn steps_finished(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        match self.operation.command {
            Command::Restore { buffered: true } | Command::Step { buffered: true, .. } => {
                self.wait_seek_complete(host)
            }
            _ => Ok(Continuation::Complete(TerminationCode::Success)),
        }
    }

    fn wait_seek_complete(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        if host.aux_bus_in() & DS_SEEK_COMPLETE != 0 {
            return self.seek_complete(host);
        }
        Ok(Continuation::Wait(Phase::WaitSeekComplete, self.step_time()))
    }

    pub(super) fn poll_seek_complete(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        self.operation.polls += 1;
        if host.aux_bus_in() & DS_SEEK_COMPLETE != 0 {
            return self.seek_complete(host);
        }
        if self.operation.polls >= MAX_SEEK_COMPLETE_POLLS {
            log::warn!("Drive never reported seek complete");
            return Err(TerminationCode::SeekError);
        }
        Ok(Continuation::Wait(Phase::WaitSeekComplete, self.step_time()))
    }

    fn seek_complete(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        match self.operation.command {
            Command::SeekReadId { verify, .. } => self.read_id(host, verify),
            _ => Ok(Continuation::Complete(TerminationCode::Success)),
        }
    }

    pub(super) fn command_seek_read_id(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        let step = matches!(self.operation.command, Command::SeekReadId { step: true, .. });
        self.check_ready(host)?;
        self.locate_id(host)?;
        if step && self.operation.steps_remaining > 0 {
            return Ok(Continuation::Wait(Phase::Seek, self.step_time()));
        }
        self.finish_seek_read_id(host)
    }

    fn finish_seek_read_id(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        let (wait, verify) = match self.operation.command {
            Command::SeekReadId {
                wait_seek_complete,
                verify,
                ..
            } => (wait_seek_complete, verify),
            _ => (false, false),
        };
        if wait {
            return self.wait_seek_complete(host);
        }
        self.read_id(host, verify)
    }

    fn read_id(&mut self, host: &mut dyn Hdc9234Host, verify: bool) -> OpResult {
        if verify {
            self.verify(host, false)?;
        }
        else {
            self.locate_id(host)?;
        }
        Ok(Continuation::Complete(TerminationCode::Success))
    }

    /// One step of an implied seek.
    pub(super) fn seek_step(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        let direction = self.operation.step_direction.unwrap_or(StepDirection::In);
        self.issue_step(host, direction);
        self.operation.steps_remaining = self.operation.steps_remaining.saturating_sub(1);
        if self.operation.steps_remaining > 0 {
            return Ok(Continuation::Wait(Phase::Seek, self.step_time()));
        }
        Ok(Continuation::Wait(
            Phase::Settle,
            self.selected_drive_type().settle_time_us(),
        ))
    }

    /// The head has settled after an implied seek.
    pub(super) fn after_seek(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        match self.operation.command {
            Command::SeekReadId { .. } => self.finish_seek_read_id(host),
            Command::ReadSectors { .. } | Command::WriteSectors { .. } => self.begin_sector(host),
            _ => Ok(Continuation::Complete(TerminationCode::Success)),
        }
    }
}
