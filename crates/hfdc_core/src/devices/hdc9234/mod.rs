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

    devices::hdc9234::mod.rs

    Implements the SMC HDC9234 hard and floppy disk controller.

    The controller is driven through two host ports: data/command on write and
    data/interrupt status on read. Commands that involve mechanical delays are
    run as an explicit Operation record advanced by a one-shot timer; the host
    advances time by calling run().
*/

#![allow(dead_code)]

pub mod command;
pub mod crc;
mod drive;
pub mod host;
mod locator;
pub mod registers;
pub mod track;
mod track_ops;
mod transfer;


use std::fmt::Display;

use crate::{
    config::Hdc9234Config,
    device_types::hdc9234::{DriveType, SectorId, TerminationCode, TrackEncoding},
    devices::hdc9234::{
        command::Command,
        host::{AuxLatch, DiskBackend, Hdc9234Host, StepDirection},
        registers::*,
    },
    types::history_buffer::HistoryBuffer,
};

/// Delay used for every timed phase when fast timing is enabled.
pub const FAST_TIMING_US: f64 = 1.0;
/// Number of ID fields examined before a verify gives up; about one
/// revolution of a densely formatted track.
pub const VERIFY_RETRIES: usize = 132;
pub const MAX_RESTORE_STEPS: u16 = 4096;
pub const MAX_SEEK_COMPLETE_POLLS: u16 = 4096;
pub const MAX_UNITS: u8 = 4;

/// The phase of a running operation. Each timer expiry advances the
/// operation out of its current phase.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// One restore step has been issued.
    Restore,
    /// Waiting for the drive to raise seek complete.
    WaitSeekComplete,
    /// Implied seek in progress.
    Seek,
    /// Head settling after an implied seek.
    Settle,
    /// A sector is passing under the head.
    Sector,
    /// Waiting for a full revolution.
    Track,
}

/// Result of one step of an operation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Continuation {
    Complete(TerminationCode),
    /// Set DONE without latching a termination code.
    Ignore,
    Wait(Phase, f64),
}

type OpResult = Result<Continuation, TerminationCode>;

/// State of the most recent command. Created when an opcode is accepted. Once
/// the termination code is latched the phase returns to idle, and the counters
/// stay readable through `operation()` and the debug state until the next
/// command is accepted.
#[derive(Copy, Clone, Debug, Default)]
pub struct Operation {
    pub command: Command,
    pub phase: Phase,
    pub found_id: bool,
    pub id: SectorId,
    pub step_direction: Option<StepDirection>,
    pub steps_remaining: u16,
    pub steps_taken: u16,
    pub polls: u16,
    pub sectors_done: u16,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{:?}]", self.command, self.phase)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SelectedDrive {
    pub unit: u8,
    pub drive_type: DriveType,
    pub head_load_delay: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Hdc9234DebugState {
    pub intrq: bool,
    pub int_status: u8,
    pub register_pointer: usize,
    pub write_registers: Vec<u8>,
    pub read_registers: Vec<u8>,
    pub output1: u8,
    pub output2: u8,
    pub selected: Option<SelectedDrive>,
    pub operation: Operation,
    pub last_command: Command,
    pub timer: Option<f64>,
    pub write_fault: bool,
    pub cmd_log: Vec<String>,
}

pub struct Hdc9234 {
    config: Hdc9234Config,
    regs: RegisterFile,
    int_status: u8,
    intrq: bool,
    ready_line: bool,
    write_fault: bool,

    output1: u8,
    output2: Output2Latch,
    selected: Option<SelectedDrive>,

    operation: Operation,
    last_command: Command,
    saved_retry_count: u8,
    timer: Option<f64>,

    cmd_log: HistoryBuffer<String>,
}

impl Default for Hdc9234 {
    fn default() -> Self {
        Self::new(Hdc9234Config::default())
    }
}

impl Hdc9234 {
    pub fn new(config: Hdc9234Config) -> Self {
        let cmd_log = HistoryBuffer::new(config.command_log_len);
        Self {
            config,
            regs: RegisterFile::new(),
            int_status: 0,
            intrq: false,
            ready_line: false,
            write_fault: false,
            output1: 0,
            output2: Output2Latch::new(),
            selected: None,
            operation: Operation::default(),
            last_command: Command::NoCommand,
            saved_retry_count: 0,
            timer: None,
            cmd_log,
        }
    }

    pub fn config(&self) -> &Hdc9234Config {
        &self.config
    }

    /// Hardware reset (RST* pin). Equivalent to the RESET command without
    /// setting DONE.
    pub fn reset(&mut self, host: &mut dyn Hdc9234Host) {
        self.regs.reset();
        self.int_status = 0;
        self.write_fault = false;
        self.selected = None;
        self.output2 = Output2Latch::new();
        self.operation = Operation::default();
        self.saved_retry_count = 0;
        self.timer = None;
        self.set_output1(host, 0);
        self.set_intrq(host, false);
        self.log_str("HDC9234 Reset!");
    }

    /// Read from the host port. Even offsets read the register addressed by
    /// the register pointer; odd offsets read the interrupt status register.
    pub fn read(&mut self, host: &mut dyn Hdc9234Host, offset: u8) -> u8 {
        if offset & 0x01 == 0 {
            let reg = self.regs.pointer();
            let value = self.regs.read_next();
            log::trace!("Read register {} ({}): {:02X}", reg, REG_NAMES_READ[reg], value);
            value
        }
        else {
            let value = self.int_status;
            self.int_status &= !(INT_PENDING | INT_READY_CHANGE);
            self.set_intrq(host, false);
            log::trace!("Read interrupt status: {:02X}", value);
            value
        }
    }

    /// Write to the host port. Even offsets write the register addressed by
    /// the register pointer; odd offsets issue a command.
    pub fn write(&mut self, host: &mut dyn Hdc9234Host, offset: u8, data: u8) {
        if offset & 0x01 == 0 {
            let reg = self.regs.pointer();
            log::trace!("Write register {} ({}): {:02X}", reg, REG_NAMES_WRITE[reg], data);
            self.regs.write_next(data);
        }
        else {
            self.dispatch(host, data);
        }
    }

    /// Advance controller time by `us` microseconds, running any timer
    /// continuations that fall due.
    pub fn run(&mut self, host: &mut dyn Hdc9234Host, us: f64) {
        let mut budget = us;
        while let Some(remaining) = self.timer {
            if remaining > budget {
                self.timer = Some(remaining - budget);
                break;
            }
            budget -= remaining;
            self.timer = None;
            self.on_timer(host);
        }
    }

    /// Report a change of the selected drive's ready line.
    pub fn set_ready_line(&mut self, host: &mut dyn Hdc9234Host, ready: bool) {
        if ready == self.ready_line {
            return;
        }
        self.ready_line = ready;
        self.int_status |= INT_READY_CHANGE;
        log::debug!("Ready line changed: {}", ready);
        if self.regs.w(REG_TERM_CONDITIONS) & TC_INT_READY_CHANGE != 0 {
            self.int_status |= INT_PENDING;
            self.set_intrq(host, true);
        }
    }

    /// Peek at the interrupt status register without side effects.
    pub fn int_status(&self) -> u8 {
        self.int_status
    }

    pub fn interrupt(&self) -> bool {
        self.intrq
    }

    pub fn termination_code(&self) -> TerminationCode {
        TerminationCode::from_status(self.int_status)
    }

    pub fn is_done(&self) -> bool {
        self.int_status & INT_DONE != 0
    }

    pub fn is_busy(&self) -> bool {
        self.operation.phase != Phase::Idle
    }

    /// Peek at a write-side register.
    pub fn register_w(&self, reg: usize) -> u8 {
        self.regs.w(reg)
    }

    /// Peek at a read-side register.
    pub fn register_r(&self, reg: usize) -> u8 {
        self.regs.r(reg)
    }

    pub fn register_pointer(&self) -> usize {
        self.regs.pointer()
    }

    pub fn output1(&self) -> u8 {
        self.output1
    }

    pub fn selected(&self) -> Option<SelectedDrive> {
        self.selected
    }

    pub fn timer_pending(&self) -> bool {
        self.timer.is_some()
    }

    pub fn timer_remaining(&self) -> Option<f64> {
        self.timer
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    fn dispatch(&mut self, host: &mut dyn Hdc9234Host, opcode: u8) {
        let command = Command::decode(opcode);

        if let Command::SetRegisterPointer(reg) = command {
            if reg as usize > REG_DATA {
                // Reserved opcodes 0x4B-0x4F.
                log::warn!("Invalid opcode {:02X}: register {} does not exist", opcode, reg);
                self.log_str(&format!("Invalid opcode: {:02X}", opcode));
                self.set_done(host);
                return;
            }
        }

        if self.is_busy() {
            log::warn!(
                "Command {} issued while {} is still running. Abandoning it.",
                command,
                self.operation
            );
        }

        // Accept the command.
        self.timer = None;
        self.int_status &= !(INT_DONE | INT_BAD_SECTOR | INT_PENDING);
        self.set_intrq(host, false);
        self.write_fault = false;
        self.operation = Operation {
            command,
            ..Default::default()
        };
        self.last_command = command;
        self.log_cmd(command, "dispatch", &format!("{:02X}: {}", opcode, command));

        if command.uses_drive() {
            let unit = self.selected.map(|s| s.unit).unwrap_or(0);
            self.regs.set_r(REG_CHIP_STATUS, unit & CS_PRESENT_DRIVE);
        }

        let result = match command {
            Command::NoCommand => Ok(Continuation::Ignore),
            Command::Reset => {
                self.reset(host);
                self.operation.command = command;
                Ok(Continuation::Complete(TerminationCode::Success))
            }
            Command::DeselectDrive => self.command_deselect(host),
            Command::Restore { .. } => self.command_restore(host),
            Command::Step { direction, buffered } => self.command_step(host, direction, buffered),
            Command::TapeBackup(op) => {
                log::warn!("Tape backup command {:02X} is not supported", op);
                Ok(Continuation::Ignore)
            }
            Command::PollDrives { mask } => self.command_poll_drives(host, mask),
            Command::DriveSelect {
                unit,
                drive_type,
                head_load_delay,
            } => self.command_drive_select(host, unit, drive_type, head_load_delay),
            Command::SetRegisterPointer(reg) => {
                self.regs.set_pointer(reg as usize);
                Ok(Continuation::Complete(TerminationCode::Success))
            }
            Command::SeekReadId { .. } => self.command_seek_read_id(host),
            Command::ReadSectors { .. } | Command::WriteSectors { .. } => self.command_transfer(host),
            Command::ReadTrack { .. } => self.command_read_track(host),
            Command::FormatTrack { .. } => self.command_format_track(host),
        };
        self.apply(host, result);
    }

    /// Resume the running operation after its timer expired.
    fn on_timer(&mut self, host: &mut dyn Hdc9234Host) {
        let phase = self.operation.phase;
        let result = match phase {
            Phase::Idle => {
                log::error!("Timer fired with no operation in progress");
                return;
            }
            Phase::Restore => self.restore_step(host),
            Phase::WaitSeekComplete => self.poll_seek_complete(host),
            Phase::Seek => self.seek_step(host),
            Phase::Settle => self.after_seek(host),
            Phase::Sector => self.transfer_sector(host),
            Phase::Track => self.track_ready(host),
        };
        self.apply(host, result);
    }

    fn apply(&mut self, host: &mut dyn Hdc9234Host, result: OpResult) {
        match result {
            Ok(Continuation::Wait(phase, us)) => self.schedule(phase, us),
            Ok(Continuation::Complete(code)) | Err(code) => self.complete(host, code),
            Ok(Continuation::Ignore) => {
                self.operation.phase = Phase::Idle;
                self.set_done(host);
            }
        }
    }

    fn schedule(&mut self, phase: Phase, us: f64) {
        let us = if self.config.fast_timing { FAST_TIMING_US } else { us };
        log::trace!("Scheduling {:?} in {} us", phase, us);
        self.operation.phase = phase;
        self.timer = Some(us);
    }

    /// Latch a termination code and end the running operation.
    fn complete(&mut self, host: &mut dyn Hdc9234Host, code: TerminationCode) {
        self.timer = None;
        self.operation.phase = Phase::Idle;

        let mut drive_status = host.aux_bus_in();
        if self.write_fault {
            drive_status |= DS_WRITE_FAULT;
        }
        self.regs.set_r(REG_DRIVE_STATUS, drive_status);

        self.int_status = (self.int_status & !INT_TERM_CODE_MASK) | code.bits();
        self.set_done(host);
        self.log_cmd(
            self.operation.command,
            "complete",
            &format!("{} (status: {:02X})", code, self.int_status),
        );
        if code != TerminationCode::Success {
            log::debug!("{} terminated: {}", self.operation.command, code);
        }
    }

    /// Set DONE and raise the interrupt if interrupt-on-done is enabled. The termination code is
    /// left as it is.
    fn set_done(&mut self, host: &mut dyn Hdc9234Host) {
        self.int_status |= INT_DONE;
        if self.regs.w(REG_TERM_CONDITIONS) & TC_INT_DONE != 0 {
            self.int_status |= INT_PENDING;
            self.set_intrq(host, true);
        }
    }

    fn set_intrq(&mut self, host: &mut dyn Hdc9234Host, level: bool) {
        if self.intrq != level {
            self.intrq = level;
            host.set_interrupt(level);
        }
    }

    fn set_output1(&mut self, host: &mut dyn Hdc9234Host, value: u8) {
        self.output1 = value;
        host.aux_bus_out(AuxLatch::Output1, value);
    }

    fn selected_drive_type(&self) -> DriveType {
        self.selected.map(|s| s.drive_type).unwrap_or_default()
    }

    fn encoding(&self) -> TrackEncoding {
        self.selected_drive_type()
            .encoding(self.regs.w(REG_MODE) & MODE_FM != 0)
    }

    fn step_time(&self) -> f64 {
        self.selected_drive_type()
            .step_time_us(self.regs.w(REG_MODE) & MODE_STEP_RATE_MASK, self.encoding())
    }

    /// The media backend of the selected drive, as resolved by the host.
    fn backend<'h>(&self, host: &'h mut dyn Hdc9234Host) -> Option<&'h mut dyn DiskBackend> {
        match self.selected {
            Some(sel) if sel.drive_type.is_floppy() => host.floppy(),
            Some(_) => host.hard_disk(),
            None => None,
        }
    }

    /// Push the DMA address onto the auxiliary bus and open a DMA burst.
    fn dma_begin(&mut self, host: &mut dyn Hdc9234Host) {
        let address = self.regs.dma_address();
        host.set_dma_in_progress(true);
        self.int_status |= INT_DMA_REQUEST;
        host.aux_bus_out(AuxLatch::DmaAddress, ((address >> 16) & 0xFF) as u8);
        host.aux_bus_out(AuxLatch::DmaAddress, ((address >> 8) & 0xFF) as u8);
        host.aux_bus_out(AuxLatch::DmaAddress, (address & 0xFF) as u8);
    }

    fn dma_end(&mut self, host: &mut dyn Hdc9234Host, count: usize) {
        self.int_status &= !INT_DMA_REQUEST;
        host.set_dma_in_progress(false);
        self.regs.advance_dma_address(count);
    }

    /// Send `data` to the host in one DMA burst.
    fn dma_to_host(&mut self, host: &mut dyn Hdc9234Host, data: &[u8]) {
        self.dma_begin(host);
        for byte in data {
            host.dma_write(*byte);
        }
        self.dma_end(host, data.len());
    }

    /// Fetch `len` bytes from the host in one DMA burst.
    fn dma_from_host(&mut self, host: &mut dyn Hdc9234Host, len: usize) -> Vec<u8> {
        self.dma_begin(host);
        let data = (0..len).map(|_| host.dma_read()).collect();
        self.dma_end(host, len);
        data
    }

    pub fn log_cmd(&mut self, cmd: Command, func: &str, s: &str) {
        self.cmd_log.push(format!("{}: {}", cmd, s));
        log::trace!("{}(): {}", func, s);
    }

    pub fn log_str(&mut self, s: &str) {
        self.cmd_log.push(s.to_string());
        log::trace!("{}", s);
    }

    pub fn get_debug_state(&self) -> Hdc9234DebugState {
        Hdc9234DebugState {
            intrq: self.intrq,
            int_status: self.int_status,
            register_pointer: self.regs.pointer(),
            write_registers: (0..REG_COUNT).map(|r| self.regs.w(r)).collect(),
            read_registers: (0..REG_COUNT).map(|r| self.regs.r(r)).collect(),
            output1: self.output1,
            output2: self.output2.into_bytes()[0],
            selected: self.selected,
            operation: self.operation,
            last_command: self.last_command,
            timer: self.timer,
            write_fault: self.write_fault,
            cmd_log: self.cmd_log.as_vec(),
        }
    }
}
