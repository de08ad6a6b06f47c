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

//! A single playing note.
//!
//! A voice plays every component of one instrument in lockstep, one channel per
//! component, each channel writing into its own submix bus.

use std::ops::Range;

use rand::Rng;

use crate::config::VoiceKind;

use super::bus::{BusId, SubmixBuses};
use super::kit::InstrumentLayout;
use super::stream::{PlaybackMode, SampleCursor, SampleHandle, SampleLibrary};
use super::table::InstrumentVoiceTable;

/// Maximum number of channels (components) a voice can play.
pub const MAX_VOICE_CHANNELS: usize = 8;

/// Per-sample multiplier applied while a voice tails off.
pub const TAIL_DECAY: f32 = 0.99;

/// Tail level below which a releasing voice stops.
pub const TAIL_FLOOR: f32 = 0.005;

/// Lifecycle of a voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    #[default]
    Idle,
    Active,
    Releasing,
}

#[derive(Clone, Copy, Debug)]
struct VoiceChannel {
    cursor: SampleCursor,
    bus: BusId,
}

impl Default for VoiceChannel {
    fn default() -> Self {
        Self {
            cursor: SampleCursor::new(SampleHandle::SILENCE, PlaybackMode::OneShot),
            bus: BusId(0),
        }
    }
}

/// One note's worth of playback state. Lives in a fixed pool and is reused.
#[derive(Clone, Debug, Default)]
pub struct Voice {
    state: VoiceState,
    kind: VoiceKind,
    instrument: u16,
    note: u8,
    level: f32,
    tail: f32,
    generation: u32,
    channels: [VoiceChannel; MAX_VOICE_CHANNELS],
    channel_count: usize,
}

impl Voice {
    /// Creates an idle voice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts playing an instrument. Each channel gets a fresh cursor picked from
    /// the bank matching the velocity.
    pub fn trigger<R: Rng + ?Sized>(
        &mut self,
        instrument_index: u16,
        instrument: &InstrumentLayout,
        velocity: f32,
        table: &mut InstrumentVoiceTable,
        rng: &mut R,
    ) {
        let mode = match instrument.kind() {
            VoiceKind::OneShot => PlaybackMode::OneShot,
            VoiceKind::Sustained => PlaybackMode::Loop,
        };

        self.channel_count = 0;
        for channel in instrument.channels().iter().take(MAX_VOICE_CHANNELS) {
            let cursor = match table.lookup(channel.component(), velocity) {
                Some(bank) => bank.select(rng, mode),
                None => SampleCursor::new(SampleHandle::SILENCE, mode),
            };
            self.channels[self.channel_count] = VoiceChannel {
                cursor,
                bus: channel.bus(),
            };
            self.channel_count += 1;
        }

        self.state = VoiceState::Active;
        self.kind = instrument.kind();
        self.instrument = instrument_index;
        self.note = instrument.note();
        self.level = if velocity.is_nan() {
            0.0
        } else {
            velocity.clamp(0.0, 1.0)
        };
        self.tail = 1.0;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Releases the voice. Without a tail it stops at once. With a tail, one-shot
    /// voices keep playing to the end and sustained voices start fading.
    pub fn release(&mut self, allow_tail: bool) {
        match (self.state, allow_tail, self.kind) {
            (VoiceState::Idle, _, _) => {}
            (_, false, _) => self.stop(),
            (_, true, VoiceKind::OneShot) => {}
            (VoiceState::Active, true, VoiceKind::Sustained) => {
                self.state = VoiceState::Releasing;
                self.tail = 1.0;
            }
            (VoiceState::Releasing, true, VoiceKind::Sustained) => {}
        }
    }

    /// Forces the voice idle.
    pub fn stop(&mut self) {
        self.state = VoiceState::Idle;
        self.channel_count = 0;
        self.tail = 0.0;
    }

    /// Adds this voice's output for `range` (offsets into the current block) to
    /// the buses. The voice goes idle once every channel is exhausted or the
    /// tail has faded out.
    pub fn render_into(&mut self, library: &SampleLibrary, buses: &mut SubmixBuses, range: Range<usize>) {
        if self.state == VoiceState::Idle {
            return;
        }

        for offset in range {
            let gain = match self.state {
                VoiceState::Releasing => self.level * self.tail,
                _ => self.level,
            };

            for channel in self.channels[..self.channel_count].iter_mut() {
                let value = channel.cursor.tick(library);
                buses.accumulate(channel.bus, offset, value * gain);
            }

            if self.state == VoiceState::Releasing {
                self.tail *= TAIL_DECAY;
                if self.tail < TAIL_FLOOR {
                    self.stop();
                    return;
                }
            }
        }

        if self.channels[..self.channel_count]
            .iter()
            .all(|channel| channel.cursor.is_exhausted())
        {
            self.stop();
        }
    }

    /// Current state.
    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Returns true unless the voice is idle.
    pub fn is_playing(&self) -> bool {
        self.state != VoiceState::Idle
    }

    /// The kind of the instrument being played.
    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    /// Index of the instrument being played.
    pub fn instrument(&self) -> u16 {
        self.instrument
    }

    /// MIDI note of the instrument being played.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Playback level (the normalized velocity).
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Tail-off multiplier.
    pub fn tail(&self) -> f32 {
        self.tail
    }

    /// Incremented on every trigger.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of channels bound by the last trigger.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::samples::kit::ChannelLayout;
    use crate::samples::layer::VelocityLayerBank;
    use crate::samples::stream::SampleData;
    use crate::samples::table::ComponentId;

    struct Fixture {
        library: SampleLibrary,
        table: InstrumentVoiceTable,
        rng: StdRng,
        buses: SubmixBuses,
    }

    fn fixture(data: &[&[f32]]) -> (Fixture, Vec<ChannelLayout>) {
        let mut library = SampleLibrary::new();
        let mut table = InstrumentVoiceTable::new();
        let mut channels = Vec::new();
        for (bus, samples) in data.iter().enumerate() {
            let handle = library.insert(SampleData::new(samples.to_vec()));
            let component = table.push(std::array::from_fn(|_| VelocityLayerBank::new(vec![handle])));
            channels.push(ChannelLayout::new(component, BusId(bus as u16)));
        }
        let buses = SubmixBuses::new(data.len(), 16);
        (
            Fixture {
                library,
                table,
                rng: StdRng::seed_from_u64(5),
                buses,
            },
            channels,
        )
    }

    #[test]
    fn test_trigger_writes_level_scaled_samples_to_each_bus() {
        let (mut f, channels) = fixture(&[&[1.0, 0.5], &[-1.0]]);
        let kick = InstrumentLayout::new("kick", 36, VoiceKind::OneShot, channels);

        let mut voice = Voice::new();
        voice.trigger(0, &kick, 0.5, &mut f.table, &mut f.rng);
        assert_eq!(voice.state(), VoiceState::Active);
        assert_eq!(voice.channel_count(), 2);

        voice.render_into(&f.library, &mut f.buses, 0..4);
        assert_eq!(f.buses.bus(0)[..3], [0.5, 0.25, 0.0]);
        assert_eq!(f.buses.bus(1)[..2], [-0.5, 0.0]);

        // Both channels ran out inside the block.
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_voice_stays_active_until_every_channel_is_exhausted() {
        let (mut f, channels) = fixture(&[&[1.0; 4], &[1.0; 10]]);
        let snare = InstrumentLayout::new("snare", 38, VoiceKind::OneShot, channels);

        let mut voice = Voice::new();
        voice.trigger(0, &snare, 1.0, &mut f.table, &mut f.rng);
        voice.render_into(&f.library, &mut f.buses, 0..8);
        assert_eq!(voice.state(), VoiceState::Active);
        voice.render_into(&f.library, &mut f.buses, 8..16);
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_one_shot_ignores_tail_release() {
        let (mut f, channels) = fixture(&[&[1.0; 8]]);
        let kick = InstrumentLayout::new("kick", 36, VoiceKind::OneShot, channels);

        let mut voice = Voice::new();
        voice.trigger(0, &kick, 1.0, &mut f.table, &mut f.rng);
        voice.release(true);
        assert_eq!(voice.state(), VoiceState::Active);

        voice.release(false);
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_sustained_voice_tails_off_and_terminates() {
        let (mut f, channels) = fixture(&[&[1.0, 1.0]]);
        let swell = InstrumentLayout::new("swell", 49, VoiceKind::Sustained, channels);

        let mut voice = Voice::new();
        voice.trigger(0, &swell, 1.0, &mut f.table, &mut f.rng);

        // Looping samples never run out on their own.
        for _ in 0..10 {
            f.buses.reset();
            voice.render_into(&f.library, &mut f.buses, 0..16);
        }
        assert_eq!(voice.state(), VoiceState::Active);

        voice.release(true);
        assert_eq!(voice.state(), VoiceState::Releasing);

        f.buses.reset();
        voice.render_into(&f.library, &mut f.buses, 0..3);
        let bus = f.buses.bus(0);
        assert!((bus[0] - 1.0).abs() < 1e-6);
        assert!((bus[1] - TAIL_DECAY).abs() < 1e-6);
        assert!((bus[2] - TAIL_DECAY * TAIL_DECAY).abs() < 1e-6);

        // 0.99^n < 0.005 after a little over 527 samples.
        let mut blocks = 0;
        while voice.is_playing() {
            f.buses.reset();
            voice.render_into(&f.library, &mut f.buses, 0..16);
            blocks += 1;
            assert!(blocks < 100);
        }
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_release_idle_voice_is_noop() {
        let mut voice = Voice::new();
        voice.release(true);
        voice.release(false);
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_generation_changes_on_trigger() {
        let (mut f, channels) = fixture(&[&[1.0]]);
        let kick = InstrumentLayout::new("kick", 36, VoiceKind::OneShot, channels);

        let mut voice = Voice::new();
        voice.trigger(0, &kick, 1.0, &mut f.table, &mut f.rng);
        let first = voice.generation();
        voice.trigger(0, &kick, 1.0, &mut f.table, &mut f.rng);
        assert_ne!(first, voice.generation());
    }

    #[test]
    fn test_unknown_component_plays_silence() {
        let (mut f, _) = fixture(&[&[1.0]]);
        let ghost = InstrumentLayout::new(
            "ghost",
            40,
            VoiceKind::OneShot,
            vec![ChannelLayout::new(ComponentId(9), BusId(0))],
        );

        let mut voice = Voice::new();
        voice.trigger(0, &ghost, 1.0, &mut f.table, &mut f.rng);
        voice.render_into(&f.library, &mut f.buses, 0..4);
        assert!(f.buses.bus(0).iter().all(|&s| s == 0.0));
        assert_eq!(voice.state(), VoiceState::Idle);
    }
}
