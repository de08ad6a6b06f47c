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

//! Shared sample data and per-voice playback cursors.
//!
//! Audio data lives once in a [`SampleLibrary`] and is addressed by a
//! [`SampleHandle`]. Voices never copy audio; each playing channel owns a small
//! [`SampleCursor`] that points into the library.

use std::sync::Arc;

/// Immutable mono sample data, shared between the loader cache and the library.
#[derive(Clone, Debug, Default)]
pub struct SampleData {
    samples: Arc<[f32]>,
}

impl SampleData {
    /// Wraps already decoded mono samples.
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    /// A zero-length sample. Cursors over it are exhausted immediately.
    pub fn silence() -> Self {
        Self::default()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if there is no audio at all.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The raw samples.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

/// Index of a sample in a [`SampleLibrary`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SampleHandle(u32);

impl SampleHandle {
    /// The silent placeholder every library starts with.
    pub const SILENCE: SampleHandle = SampleHandle(0);

    /// Returns true if this handle points at the silent placeholder.
    pub fn is_silence(self) -> bool {
        self == Self::SILENCE
    }
}

/// Arena holding every sample of a kit. Built at load time, read-only while rendering.
#[derive(Debug)]
pub struct SampleLibrary {
    samples: Vec<SampleData>,
}

impl Default for SampleLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleLibrary {
    /// Creates a library containing only the silent placeholder.
    pub fn new() -> Self {
        Self {
            samples: vec![SampleData::silence()],
        }
    }

    /// Adds sample data and returns its handle. Empty data maps to [`SampleHandle::SILENCE`].
    pub fn insert(&mut self, data: SampleData) -> SampleHandle {
        if data.is_empty() {
            return SampleHandle::SILENCE;
        }
        self.samples.push(data);
        SampleHandle((self.samples.len() - 1) as u32)
    }

    /// Looks up the data for a handle. Unknown handles resolve to silence.
    pub fn get(&self, handle: SampleHandle) -> &[f32] {
        self.samples
            .get(handle.0 as usize)
            .map(SampleData::as_slice)
            .unwrap_or(&[])
    }

    /// Number of stored samples, including the silent placeholder.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if only the placeholder is present.
    pub fn is_empty(&self) -> bool {
        self.samples.len() <= 1
    }

    /// Total bytes of audio held by the library.
    pub fn memory_usage(&self) -> usize {
        self.samples.iter().map(SampleData::memory_size).sum()
    }
}

/// How a cursor behaves when it reaches the end of its data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Play once, then report exhaustion.
    #[default]
    OneShot,
    /// Wrap around to the start. Only empty data is ever exhausted.
    Loop,
}

/// Playback position over one library sample, owned by a single voice channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct SampleCursor {
    handle: SampleHandle,
    position: usize,
    mode: PlaybackMode,
    exhausted: bool,
}

impl SampleCursor {
    /// Creates a cursor positioned at the start of the given sample.
    pub fn new(handle: SampleHandle, mode: PlaybackMode) -> Self {
        Self {
            handle,
            position: 0,
            mode,
            exhausted: false,
        }
    }

    /// Rewinds to the first sample.
    pub fn reset(&mut self) {
        self.position = 0;
        self.exhausted = false;
    }

    /// Produces the next sample. Past the end this yields silence.
    #[inline]
    pub fn tick(&mut self, library: &SampleLibrary) -> f32 {
        if self.exhausted {
            return 0.0;
        }

        let data = library.get(self.handle);
        if data.is_empty() {
            self.exhausted = true;
            return 0.0;
        }

        match self.mode {
            PlaybackMode::OneShot => {
                let Some(&value) = data.get(self.position) else {
                    self.position = data.len();
                    self.exhausted = true;
                    return 0.0;
                };
                self.position += 1;
                if self.position >= data.len() {
                    self.exhausted = true;
                }
                value
            }
            PlaybackMode::Loop => {
                if self.position >= data.len() {
                    self.position = 0;
                }
                let value = data[self.position];
                self.position += 1;
                value
            }
        }
    }

    /// Returns true once no more audio will be produced.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The current position in samples.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The sample this cursor reads.
    pub fn handle(&self) -> SampleHandle {
        self.handle
    }
}
