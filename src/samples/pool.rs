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

//! Fixed-size voice pool.
//!
//! Voices are allocated up front. A note-on takes the first idle voice; when none
//! is free the note is dropped. Playing voices are never stolen.

use std::ops::Range;

use rand::Rng;

use super::bus::SubmixBuses;
use super::kit::InstrumentLayout;
use super::stream::SampleLibrary;
use super::table::InstrumentVoiceTable;
use super::voice::Voice;

/// Identifies a note started by [`VoicePool::note_on`]. Becomes stale once its
/// voice is reused for another note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceHandle {
    index: usize,
    generation: u32,
}

impl VoiceHandle {
    /// Slot of the voice in the pool.
    pub fn index(&self) -> usize {
        self.index
    }
}

pub struct VoicePool {
    voices: Box<[Voice]>,
}

impl VoicePool {
    /// Allocates `size` idle voices.
    pub fn new(size: usize) -> Self {
        Self {
            voices: (0..size).map(|_| Voice::new()).collect(),
        }
    }

    /// Number of voices in the pool.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Number of voices currently playing.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_playing()).count()
    }

    /// Starts an instrument on the first idle voice. Returns `None` if every
    /// voice is busy.
    pub fn note_on<R: Rng + ?Sized>(
        &mut self,
        instrument_index: u16,
        instrument: &InstrumentLayout,
        velocity: f32,
        table: &mut InstrumentVoiceTable,
        rng: &mut R,
    ) -> Option<VoiceHandle> {
        let (index, voice) = self
            .voices
            .iter_mut()
            .enumerate()
            .find(|(_, v)| !v.is_playing())?;

        voice.trigger(instrument_index, instrument, velocity, table, rng);
        Some(VoiceHandle {
            index,
            generation: voice.generation(),
        })
    }

    /// Releases the voice behind a handle. Stale handles are ignored.
    pub fn note_off(&mut self, handle: VoiceHandle, allow_tail: bool) {
        if let Some(voice) = self.voice_mut(handle) {
            voice.release(allow_tail);
        }
    }

    /// Releases every voice playing the given note. Returns how many were released.
    pub fn release_note(&mut self, note: u8, allow_tail: bool) -> usize {
        let mut released = 0;
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.is_playing() && v.note() == note)
        {
            voice.release(allow_tail);
            released += 1;
        }
        released
    }

    /// Releases every playing voice.
    pub fn release_all(&mut self, allow_tail: bool) {
        for voice in self.voices.iter_mut() {
            voice.release(allow_tail);
        }
    }

    /// Forces every voice idle.
    pub fn stop_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.stop();
        }
    }

    /// Renders every playing voice into the buses for `range`.
    pub fn render(&mut self, library: &SampleLibrary, buses: &mut SubmixBuses, range: Range<usize>) {
        for voice in self.voices.iter_mut().filter(|v| v.is_playing()) {
            voice.render_into(library, buses, range.clone());
        }
    }

    /// Returns the voice behind a handle if the handle is still current.
    pub fn voice(&self, handle: VoiceHandle) -> Option<&Voice> {
        self.voices
            .get(handle.index())
            .filter(|v| v.is_playing() && v.generation() == handle.generation)
    }

    /// Returns true if the note behind the handle is still sounding.
    pub fn is_playing(&self, handle: VoiceHandle) -> bool {
        self.voice(handle).is_some()
    }

    fn voice_mut(&mut self, handle: VoiceHandle) -> Option<&mut Voice> {
        self.voices
            .get_mut(handle.index())
            .filter(|v| v.is_playing() && v.generation() == handle.generation)
    }
}
