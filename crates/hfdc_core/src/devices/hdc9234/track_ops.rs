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

    devices::hdc9234::track_ops.rs

    READ TRACK and FORMAT TRACK. Both wait one revolution for the index
    pulse and then move a whole track image. Backends without raw track
    support get a track synthesized from, or decomposed into, sector data.
*/

use crate::{
    device_types::hdc9234::{SectorId, TerminationCode},
    devices::hdc9234::{
        command::Command,
        host::{Hdc9234Host, MediaError},
        registers::*,
        track::{build_track, parse_track, IdField, TrackFormat, TrackGaps, TrackLayout, TrackSector, ID_FIELD_LEN},
        Continuation,
        Hdc9234,
        OpResult,
        Phase,
    },
};

/// Upper bound on ID fields collected while synthesizing a track.
const MAX_TRACK_IDS: usize = 256;

impl Hdc9234 {
    fn track_layout(&self) -> TrackLayout {
        if self.config.full_track_layout {
            TrackLayout::Full
        }
        else {
            TrackLayout::Abbreviated
        }
    }

    fn revolution_time(&self) -> f64 {
        self.selected_drive_type().revolution_us()
    }

    pub(super) fn command_read_track(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        self.check_ready(host)?;
        Ok(Continuation::Wait(Phase::Track, self.revolution_time()))
    }

    pub(super) fn command_format_track(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        self.check_ready(host)?;
        if self.write_protect_terminates(host) {
            log::debug!("Format track: drive is write protected");
            return Err(TerminationCode::IdFieldError);
        }
        Ok(Continuation::Wait(Phase::Track, self.revolution_time()))
    }

    /// The index pulse has arrived.
    pub(super) fn track_ready(&mut self, host: &mut dyn Hdc9234Host) -> OpResult {
        match self.operation.command {
            Command::ReadTrack { transfer } => self.read_track_data(host, transfer),
            Command::FormatTrack {
                deleted,
                reduced_current,
                precompensation,
            } => {
                log::trace!(
                    "Format track: reduced current: {} precompensation: {}",
                    reduced_current,
                    precompensation
                );
                self.format_track_data(host, deleted)
            }
            _ => Ok(Continuation::Complete(TerminationCode::Success)),
        }
    }

    fn read_track_data(&mut self, host: &mut dyn Hdc9234Host, transfer: bool) -> OpResult {
        let head = self.desired_head();
        let raw = match self.backend(host) {
            Some(backend) => backend.read_track(head),
            None => Err(MediaError::NotReady),
        };

        let track = match raw {
            Ok(track) => track,
            Err(MediaError::RawTrackUnsupported) => self.synthesize_track(host, head)?,
            Err(e) => {
                log::debug!("Read track: {}", e);
                self.set_chip_status(CS_SYNC_ERROR);
                return Err(TerminationCode::IdFieldError);
            }
        };

        if transfer {
            self.dma_to_host(host, &track);
            return Ok(Continuation::Complete(TerminationCode::Success));
        }

        // Without transfer only the ID fields are sent.
        let sectors = match parse_track(&track, self.encoding()) {
            Ok(sectors) => sectors,
            Err(e) => {
                log::debug!("Read track: {}", e);
                self.set_chip_status(CS_SYNC_ERROR);
                return Err(TerminationCode::IdFieldError);
            }
        };
        let ids: Vec<u8> = sectors.iter().flat_map(|s| s.id.to_bytes()).collect();
        self.dma_to_host(host, &ids);
        Ok(Continuation::Complete(TerminationCode::Success))
    }

    /// Build a track image from the sectors a backend reports, starting at
    /// the current rotational position.
    fn synthesize_track(&mut self, host: &mut dyn Hdc9234Host, head: u8) -> Result<Vec<u8>, TerminationCode> {
        let drive_type = self.selected_drive_type();
        let mut ids: Vec<SectorId> = Vec::new();

        for _ in 0..MAX_TRACK_IDS {
            let next = match self.backend(host) {
                Some(backend) => backend.next_id(head),
                None => Err(MediaError::NotReady),
            };
            match next {
                Ok(id) if ids.contains(&id) => break,
                Ok(id) => ids.push(id),
                Err(e) => {
                    if ids.is_empty() {
                        log::debug!("Read track: no ID fields: {}", e);
                        self.set_chip_status(CS_SYNC_ERROR);
                        return Err(TerminationCode::IdFieldError);
                    }
                    break;
                }
            }
        }

        let mut sectors = Vec::with_capacity(ids.len());
        for id in ids {
            let len = id.sector_len();
            let read = match self.backend(host) {
                Some(backend) => backend.read_sector(id.cylinder, id.head, id.sector),
                None => Err(MediaError::NotReady),
            };
            let mut data = read.unwrap_or_else(|e| {
                log::warn!("Read track: sector {} unreadable: {}", id, e);
                Vec::new()
            });
            data.resize(len, 0);
            sectors.push(TrackSector::new(IdField::encode(&id, drive_type), id.deleted, data));
        }

        let format = TrackFormat::standard(drive_type, self.encoding(), self.track_layout());
        Ok(build_track(&format, &sectors))
    }

    /// Gap lengths are programmed as two's complement values in the format
    /// setup registers.
    fn format_gaps(&self) -> TrackGaps {
        TrackGaps {
            gap0: self.regs.r(REG_CURRENT_HEAD).wrapping_neg() as usize,
            gap1: self.regs.r(REG_CURRENT_CYLINDER).wrapping_neg() as usize,
            gap2: self.regs.r(REG_CURRENT_IDENT).wrapping_neg() as usize,
            gap3: self.regs.w(REG_DESIRED_SECTOR).wrapping_neg() as usize,
        }
    }

    fn format_track_data(&mut self, host: &mut dyn Hdc9234Host, deleted: bool) -> OpResult {
        let drive_type = self.selected_drive_type();
        let encoding = self.encoding();
        let sector_count = self.regs.w(REG_SECTOR_COUNT) as usize;

        let id_table = self.dma_from_host(host, sector_count * ID_FIELD_LEN);
        let sectors: Vec<TrackSector> = id_table
            .chunks_exact(ID_FIELD_LEN)
            .map(|c| TrackSector::formatted(IdField::from([c[0], c[1], c[2], c[3], c[4]]), deleted))
            .collect();

        let format = TrackFormat {
            layout: self.track_layout(),
            encoding,
            gaps: self.format_gaps(),
            track_size: drive_type.track_size(encoding),
        };
        let track = build_track(&format, &sectors);
        log::debug!(
            "Format track: {} sectors, {} bytes, gaps {:?}",
            sectors.len(),
            track.len(),
            format.gaps
        );

        let head = self.desired_head();
        let result = match self.backend(host) {
            Some(backend) => backend.write_track(head, &track),
            None => Err(MediaError::NotReady),
        };
        match result {
            Ok(()) => self.write_fault_result(),
            Err(MediaError::RawTrackUnsupported) => self.write_track_sectors(host, &track),
            Err(e) => {
                log::warn!("Format track failed: {}", e);
                Err(TerminationCode::DataError)
            }
        }
    }

    /// Store a formatted track sector by sector on a backend without raw track
    /// support.
    fn write_track_sectors(&mut self, host: &mut dyn Hdc9234Host, track: &[u8]) -> OpResult {
        let drive_type = self.selected_drive_type();
        let sectors = match parse_track(track, self.encoding()) {
            Ok(sectors) if !sectors.is_empty() => sectors,
            Ok(_) => {
                log::warn!("Format track: no sectors in track image");
                self.write_fault = true;
                return self.write_fault_result();
            }
            Err(e) => {
                log::warn!("Format track: bad track image: {}", e);
                self.write_fault = true;
                return self.write_fault_result();
            }
        };

        let cylinder = self.desired_cylinder();
        let head = self.desired_head();

        // The whole track is checked before any sector reaches the backend.
        let mut writes = Vec::with_capacity(sectors.len());
        for sector in sectors {
            if !sector.crc_ok() {
                log::warn!("Format track: CRC error in sector {:?}, skipped", sector.id);
                self.write_fault = true;
                continue;
            }
            let id = sector.id.decode(drive_type);
            if id.cylinder != cylinder || id.head != head {
                log::warn!(
                    "Format track: ID {} does not match track c:{} h:{}",
                    id,
                    cylinder,
                    head
                );
                self.write_fault = true;
                return self.write_fault_result();
            }
            writes.push((id, sector.data));
        }

        for (id, data) in writes {
            let result = match self.backend(host) {
                Some(backend) => backend.write_sector(id.cylinder, id.head, id.sector, &data),
                None => Err(MediaError::NotReady),
            };
            if let Err(e) = result {
                log::warn!("Format track: writing sector {} failed: {}", id, e);
                return Err(TerminationCode::DataError);
            }
        }
        self.write_fault_result()
    }

    /// A write fault only terminates with an error when the termination
    /// conditions ask for it.
    fn write_fault_result(&self) -> OpResult {
        if self.write_fault && self.regs.w(REG_TERM_CONDITIONS) & TC_TERM_WRFAULT != 0 {
            Err(TerminationCode::DataError)
        }
        else {
            Ok(Continuation::Complete(TerminationCode::Success))
        }
    }
}
