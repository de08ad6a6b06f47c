// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Submix buses: one block-sized accumulator per declared bus.

/// Index of a submix bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BusId(pub u16);

impl BusId {
    /// The index as a usize.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-bus block accumulators, stored as one flat buffer.
///
/// Voices add into the buses while rendering; the mixer reads and clears them.
#[derive(Debug)]
pub struct SubmixBuses {
    data: Vec<f32>,
    bus_count: usize,
    block_size: usize,
}

impl SubmixBuses {
    /// Allocates `bus_count` buses of `block_size` samples each, all zero.
    pub fn new(bus_count: usize, block_size: usize) -> Self {
        Self {
            data: vec![0.0; bus_count * block_size],
            bus_count,
            block_size,
        }
    }

    /// Number of buses.
    pub fn bus_count(&self) -> usize {
        self.bus_count
    }

    /// Samples per bus.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Zeroes every bus.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
    }

    /// Adds a value to one bus at an offset. Out-of-range writes are ignored.
    #[inline]
    pub fn accumulate(&mut self, bus: BusId, offset: usize, value: f32) {
        if bus.index() >= self.bus_count || offset >= self.block_size {
            return;
        }
        self.data[bus.index() * self.block_size + offset] += value;
    }

    /// Reads one bus at an offset. Out-of-range reads are 0.0.
    pub fn peek(&self, bus: BusId, offset: usize) -> f32 {
        if bus.index() >= self.bus_count || offset >= self.block_size {
            return 0.0;
        }
        self.data[bus.index() * self.block_size + offset]
    }

    /// The whole block of one bus.
    pub fn bus(&self, index: usize) -> &[f32] {
        self.data
            .chunks_exact(self.block_size.max(1))
            .nth(index)
            .unwrap_or(&[])
    }

    /// Mutable access to the whole block of one bus.
    pub fn bus_mut(&mut self, index: usize) -> &mut [f32] {
        if index >= self.bus_count {
            return &mut [];
        }
        let start = index * self.block_size;
        &mut self.data[start..start + self.block_size]
    }
}
