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


//! Velocity-layered, multi-microphone drum sample playback.
//!
//! This module provides:
//! - Sample decoding and caching (everything in memory before playback)
//! - Velocity layer selection per microphone component
//! - Voices with a fixed polyphony limit and release tails
//! - Submix buses feeding the stereo bus mixer

pub mod bus;
pub mod engine;
pub mod kit;
pub mod layer;
pub mod loader;
pub mod pool;
pub mod stream;
pub mod table;
pub mod voice;

pub use bus::{BusId, SubmixBuses};
pub use engine::{DrumEngine, EngineCommand, EngineHandle, EngineStats, TimedEvent, COMMAND_QUEUE_SIZE};
pub use kit::{BusLayout, ChannelLayout, InstrumentLayout, Kit, KitLayout, StripLayout, MAX_KIT_ENTRIES};
pub use layer::VelocityLayerBank;
pub use loader::{FileLoader, MemoryLoader, ResourceLoader};
pub use pool::{VoiceHandle, VoicePool};
pub use stream::{PlaybackMode, SampleCursor, SampleData, SampleHandle, SampleLibrary};
pub use table::{ComponentId, InstrumentVoiceTable};
pub use voice::{Voice, VoiceState};
