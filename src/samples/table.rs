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

//! Velocity quantization and the component × bracket layer table.

use super::layer::VelocityLayerBank;

/// Number of velocity brackets per component.
pub const VELOCITY_BRACKETS: usize = 6;

/// Lower bounds (inclusive) of each bracket on the 0-127 scale.
const BRACKET_FLOORS: [u8; VELOCITY_BRACKETS] = [0, 21, 41, 61, 81, 91];

/// Index of a recorded component (one microphone of one articulation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentId(pub u16);

impl ComponentId {
    /// The index as a usize.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Converts a normalized velocity to the MIDI scale, truncating toward zero.
/// Out-of-range and NaN inputs are clamped.
pub fn normalized_to_midi(velocity: f32) -> u8 {
    if velocity.is_nan() {
        return 0;
    }
    (velocity.clamp(0.0, 1.0) * 127.0) as u8
}

/// Returns the bracket (0-5) a 0-127 velocity falls into.
pub fn velocity_bracket(velocity: u8) -> usize {
    BRACKET_FLOORS
        .iter()
        .rposition(|&floor| velocity >= floor)
        .unwrap_or(0)
}

/// Maps (component, velocity) to the bank of alternate recordings for that bracket.
#[derive(Clone, Debug, Default)]
pub struct InstrumentVoiceTable {
    banks: Vec<[VelocityLayerBank; VELOCITY_BRACKETS]>,
}

impl InstrumentVoiceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component and returns its id.
    pub fn push(&mut self, banks: [VelocityLayerBank; VELOCITY_BRACKETS]) -> ComponentId {
        self.banks.push(banks);
        ComponentId((self.banks.len() - 1) as u16)
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    /// Returns true if no components have been added.
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Looks up the bank for a component at a normalized velocity.
    ///
    /// Returns `None` only for a component id the table never issued; components
    /// are checked when the kit is validated, so the engine treats that as silence.
    pub fn lookup(&mut self, component: ComponentId, velocity: f32) -> Option<&mut VelocityLayerBank> {
        let bracket = velocity_bracket(normalized_to_midi(velocity));
        self.banks
            .get_mut(component.index())
            .map(|banks| &mut banks[bracket])
    }

    /// All banks of a component, softest first.
    pub fn banks(&self, component: ComponentId) -> Option<&[VelocityLayerBank; VELOCITY_BRACKETS]> {
        self.banks.get(component.index())
    }
}
