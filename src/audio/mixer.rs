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
// Sums the submix buses into the stereo output using the strip parameters.
use crate::audio::params::MixParameters;
use crate::config::BusRouting;
use crate::samples::{KitLayout, SubmixBuses};

/// Where a bus goes: its strip and its stereo placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusRoute {
    pub strip: usize,
    pub routing: BusRouting,
}

/// Stereo bus mixer. Allocates only at construction.
#[derive(Debug)]
pub struct BusMixer {
    routes: Vec<BusRoute>,
    /// Per-strip peak proxy, reused every block.
    strip_peaks: Vec<f32>,
}

impl BusMixer {
    /// Creates a mixer for the given bus routes.
    pub fn new(routes: Vec<BusRoute>, strip_count: usize) -> Self {
        Self {
            routes,
            strip_peaks: vec![0.0; strip_count],
        }
    }

    /// Creates a mixer for every bus of a kit.
    pub fn from_layout(layout: &KitLayout) -> Self {
        Self::new(
            layout
                .buses()
                .iter()
                .map(|bus| BusRoute {
                    strip: bus.strip(),
                    routing: bus.routing(),
                })
                .collect(),
            layout.strips().len(),
        )
    }

    /// Adds every bus into `left` and `right`, then zeroes the buses.
    ///
    /// Panned buses use a linear law: `gain * (1 - pan)` left and `gain * pan`
    /// right. Fixed buses go half to each side at the strip gain. The output is
    /// added to, never cleared. Each strip's meter is set to the largest
    /// `|bus[0]|` among its buses.
    pub fn process(
        &mut self,
        buses: &mut SubmixBuses,
        left: &mut [f32],
        right: &mut [f32],
        params: &MixParameters,
    ) {
        let len = left.len().min(right.len()).min(buses.block_size());
        self.strip_peaks.fill(0.0);

        for (index, route) in self.routes.iter().enumerate() {
            let gain = params.gain(route.strip);
            let (left_gain, right_gain) = match route.routing {
                BusRouting::Panned => {
                    let pan = params.pan(route.strip);
                    (gain * (1.0 - pan), gain * pan)
                }
                BusRouting::Fixed => (gain * 0.5, gain * 0.5),
            };

            let bus = buses.bus_mut(index);
            if let (Some(first), Some(peak)) = (bus.first(), self.strip_peaks.get_mut(route.strip)) {
                *peak = peak.max(first.abs());
            }

            for ((l, r), &value) in left[..len]
                .iter_mut()
                .zip(right[..len].iter_mut())
                .zip(bus[..len].iter())
            {
                *l += value * left_gain;
                *r += value * right_gain;
            }
            bus.fill(0.0);
        }

        for (strip, &peak) in self.strip_peaks.iter().enumerate() {
            params.set_meter(strip, peak);
        }
    }
}
