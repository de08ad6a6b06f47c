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

//! Alternate recordings ("round robins") for one velocity bracket of one component.

use rand::Rng;

use super::stream::{PlaybackMode, SampleCursor, SampleHandle};

/// A non-empty set of alternate sample templates.
#[derive(Clone, Debug)]
pub struct VelocityLayerBank {
    templates: Vec<SampleHandle>,
    /// The index picked last, so an exact repeat can be avoided.
    last: Option<usize>,
}

impl VelocityLayerBank {
    /// Creates a bank. An empty template list becomes a single silent layer so
    /// selection always has something to return.
    pub fn new(templates: Vec<SampleHandle>) -> Self {
        let templates = if templates.is_empty() {
            vec![SampleHandle::SILENCE]
        } else {
            templates
        };
        Self {
            templates,
            last: None,
        }
    }

    /// Picks a layer uniformly at random, skipping the previous pick when there is
    /// an alternative, and returns a fresh cursor over it.
    pub fn select<R: Rng + ?Sized>(&mut self, rng: &mut R, mode: PlaybackMode) -> SampleCursor {
        let len = self.templates.len();
        let mut index = rng.gen_range(0..len);
        if len > 1 && self.last == Some(index) {
            // Uniform over the remaining layers.
            index = (index + 1 + rng.gen_range(0..len - 1)) % len;
        }
        let index = index.min(len - 1);
        self.last = Some(index);

        SampleCursor::new(self.templates[index], mode)
    }

    /// The templates in this bank.
    pub fn templates(&self) -> &[SampleHandle] {
        &self.templates
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if the bank holds no layers. Never the case after `new`.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Returns true if every layer is the silent placeholder.
    pub fn is_silent(&self) -> bool {
        self.templates.iter().all(|h| h.is_silence())
    }
}
