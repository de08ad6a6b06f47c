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

//! The drum engine: note handling, voice rendering and bus mixing for one kit.
//!
//! Everything used by [`DrumEngine::render`] is allocated when the engine is
//! built. Control threads talk to a running engine through an [`EngineHandle`];
//! the engine drains their commands at the start of every render call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use midly::live::LiveEvent;
use midly::MidiMessage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::bus::SubmixBuses;
use super::kit::{Kit, KitLayout};
use super::pool::{VoiceHandle, VoicePool};
use super::stream::SampleLibrary;
use super::table::InstrumentVoiceTable;
use crate::audio::mixer::BusMixer;
use crate::audio::params::{MixParameters, ParameterInfo};
use crate::audio::AudioContext;

/// Capacity of the control command queue.
pub const COMMAND_QUEUE_SIZE: usize = 1024;

/// MIDI "All Sound Off".
const CC_ALL_SOUND_OFF: u8 = 120;

/// MIDI "All Notes Off".
const CC_ALL_NOTES_OFF: u8 = 123;

/// A request from a control thread, or a timed event within a block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineCommand {
    /// Start the instrument mapped to a note. Velocity is normalized (0.0-1.0).
    NoteOn { note: u8, velocity: f32 },
    /// Release every voice playing a note.
    NoteOff { note: u8, allow_tail: bool },
    /// Release every playing voice.
    ReleaseAll { allow_tail: bool },
    /// Silence everything immediately.
    StopAll,
}

/// A command applied at a sample offset within the block being rendered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedEvent {
    pub offset: usize,
    pub command: EngineCommand,
}

impl TimedEvent {
    pub fn new(offset: usize, command: EngineCommand) -> Self {
        Self { offset, command }
    }
}

/// Counters written by the audio thread, read from anywhere.
#[derive(Debug, Default)]
pub struct EngineStats {
    dropped_notes: AtomicU64,
    unknown_notes: AtomicU64,
    invalid_events: AtomicU64,
    rejected_commands: AtomicU64,
}

impl EngineStats {
    /// Notes dropped because every voice was busy.
    pub fn dropped_notes(&self) -> u64 {
        self.dropped_notes.load(Ordering::Relaxed)
    }

    /// Note-ons for notes no instrument is mapped to.
    pub fn unknown_notes(&self) -> u64 {
        self.unknown_notes.load(Ordering::Relaxed)
    }

    /// Raw MIDI that failed to parse.
    pub fn invalid_events(&self) -> u64 {
        self.invalid_events.load(Ordering::Relaxed)
    }

    /// Commands that did not fit into the queue.
    pub fn rejected_commands(&self) -> u64 {
        self.rejected_commands.load(Ordering::Relaxed)
    }

    fn count(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable control-side handle to a [`DrumEngine`].
#[derive(Clone, Debug)]
pub struct EngineHandle {
    sender: Sender<EngineCommand>,
    params: Arc<MixParameters>,
    stats: Arc<EngineStats>,
}

impl EngineHandle {
    /// Queues a command. Returns false if the queue is full or the engine is gone.
    pub fn send(&self, command: EngineCommand) -> bool {
        match self.sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                EngineStats::count(&self.stats.rejected_commands);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn note_on(&self, note: u8, velocity: f32) -> bool {
        self.send(EngineCommand::NoteOn { note, velocity })
    }

    pub fn note_off(&self, note: u8, allow_tail: bool) -> bool {
        self.send(EngineCommand::NoteOff { note, allow_tail })
    }

    pub fn stop_all(&self) -> bool {
        self.send(EngineCommand::StopAll)
    }

    /// Shared mixer parameters.
    pub fn params(&self) -> &Arc<MixParameters> {
        &self.params
    }

    /// Shared engine counters.
    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }
}

/// Renders one kit.
pub struct DrumEngine {
    context: AudioContext,
    layout: KitLayout,
    library: SampleLibrary,
    table: InstrumentVoiceTable,
    pool: VoicePool,
    buses: SubmixBuses,
    mixer: BusMixer,
    params: Arc<MixParameters>,
    stats: Arc<EngineStats>,
    /// Instrument index per MIDI note.
    note_map: [Option<u16>; 128],
    rng: StdRng,
    command_tx: Sender<EngineCommand>,
    commands: Receiver<EngineCommand>,
    /// Stereo scratch for mono and zero-channel outputs.
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl DrumEngine {
    /// Creates an engine with a randomly seeded layer selector.
    pub fn new(kit: Kit, context: AudioContext) -> Self {
        Self::with_rng(kit, context, StdRng::from_entropy())
    }

    /// Creates an engine whose layer selection is reproducible.
    pub fn with_seed(kit: Kit, context: AudioContext, seed: u64) -> Self {
        Self::with_rng(kit, context, StdRng::seed_from_u64(seed))
    }

    fn with_rng(kit: Kit, context: AudioContext, rng: StdRng) -> Self {
        let (layout, library, table) = kit.into_parts();
        let block = context.max_block_size();

        let mut note_map = [None; 128];
        for (index, instrument) in layout.instruments().iter().enumerate() {
            if let Some(slot) = note_map.get_mut(instrument.note() as usize) {
                *slot = Some(index as u16);
            }
        }

        let (command_tx, commands) = crossbeam_channel::bounded(COMMAND_QUEUE_SIZE);

        info!(
            sample_rate = context.sample_rate(),
            max_block_size = block,
            voices = layout.max_voices(),
            buses = layout.buses().len(),
            strips = layout.strips().len(),
            "Drum engine ready"
        );

        Self {
            pool: VoicePool::new(layout.max_voices()),
            buses: SubmixBuses::new(layout.buses().len(), block),
            mixer: BusMixer::from_layout(&layout),
            params: Arc::new(MixParameters::from_layout(&layout)),
            stats: Arc::new(EngineStats::default()),
            note_map,
            rng,
            command_tx,
            commands,
            scratch_left: vec![0.0; block],
            scratch_right: vec![0.0; block],
            context,
            layout,
            library,
            table,
        }
    }

    /// A new control handle.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            sender: self.command_tx.clone(),
            params: self.params.clone(),
            stats: self.stats.clone(),
        }
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn layout(&self) -> &KitLayout {
        &self.layout
    }

    pub fn params(&self) -> &Arc<MixParameters> {
        &self.params
    }

    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    /// Number of voices currently sounding.
    pub fn active_voice_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Starts the instrument mapped to `note`. Returns `None` if the note is not
    /// mapped or no voice is free.
    pub fn note_on(&mut self, note: u8, velocity: f32) -> Option<VoiceHandle> {
        let Some(index) = self.note_map.get(note as usize).copied().flatten() else {
            EngineStats::count(&self.stats.unknown_notes);
            return None;
        };
        let instrument = &self.layout.instruments()[index as usize];
        let handle = self
            .pool
            .note_on(index, instrument, velocity, &mut self.table, &mut self.rng);
        if handle.is_none() {
            EngineStats::count(&self.stats.dropped_notes);
        }
        handle
    }

    /// Releases one note. Stale handles are ignored.
    pub fn note_off(&mut self, handle: VoiceHandle, allow_tail: bool) {
        self.pool.note_off(handle, allow_tail);
    }

    /// Releases every voice playing `note`.
    pub fn release_note(&mut self, note: u8, allow_tail: bool) -> usize {
        self.pool.release_note(note, allow_tail)
    }

    /// Releases every voice.
    pub fn release_all(&mut self, allow_tail: bool) {
        self.pool.release_all(allow_tail);
    }

    /// Forces every voice idle and zeroes the buses.
    pub fn stop_all(&mut self) {
        self.pool.stop_all();
        self.buses.reset();
    }

    /// Applies a command immediately.
    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::NoteOn { note, velocity } => {
                self.note_on(note, velocity);
            }
            EngineCommand::NoteOff { note, allow_tail } => {
                self.release_note(note, allow_tail);
            }
            EngineCommand::ReleaseAll { allow_tail } => self.release_all(allow_tail),
            EngineCommand::StopAll => self.stop_all(),
        }
    }

    /// Applies a command partway through a block. Stopping keeps what has
    /// already been rendered into the buses.
    fn apply_in_block(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::StopAll => self.pool.stop_all(),
            command => self.apply(command),
        }
    }

    /// Converts a channel message to a command. Unhandled messages yield `None`.
    pub fn command_for_message(message: MidiMessage) -> Option<EngineCommand> {
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Some(EngineCommand::NoteOn {
                note: key.as_int(),
                velocity: vel.as_int() as f32 / 127.0,
            }),
            // Note On with velocity 0 is a Note Off.
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                Some(EngineCommand::NoteOff {
                    note: key.as_int(),
                    allow_tail: true,
                })
            }
            MidiMessage::Controller { controller, .. } => match controller.as_int() {
                CC_ALL_SOUND_OFF => Some(EngineCommand::StopAll),
                CC_ALL_NOTES_OFF => Some(EngineCommand::ReleaseAll { allow_tail: true }),
                _ => None,
            },
            _ => None,
        }
    }

    /// Converts raw MIDI bytes to a command.
    pub fn command_for_midi(raw_event: &[u8]) -> Result<Option<EngineCommand>, midly::Error> {
        Ok(match LiveEvent::parse(raw_event)? {
            LiveEvent::Midi { message, .. } => Self::command_for_message(message),
            _ => None,
        })
    }

    /// Handles a raw MIDI message.
    pub fn process_midi_event(&mut self, raw_event: &[u8]) {
        match Self::command_for_midi(raw_event) {
            Ok(Some(command)) => self.apply(command),
            Ok(None) => {}
            Err(_) => EngineStats::count(&self.stats.invalid_events),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.params.parameter_count()
    }

    pub fn get_parameter(&self, index: usize) -> f32 {
        self.params.get_parameter(index)
    }

    pub fn set_parameter(&self, index: usize, value: f32) {
        self.params.set_parameter(index, value);
    }

    pub fn parameter_info(&self, index: usize) -> Option<ParameterInfo> {
        self.params.parameter_info(index)
    }

    pub fn parameter_text(&self, index: usize) -> String {
        self.params.parameter_text(index)
    }

    /// Renders `num_samples` frames, adding into the output channels.
    pub fn render(&mut self, outputs: &mut [&mut [f32]], num_samples: usize) {
        self.render_with_events(outputs, num_samples, &[]);
    }

    /// Renders `num_samples` frames, applying each event before the samples at
    /// or after its offset. Events are expected in offset order; offsets past
    /// the block are applied before its last sample.
    ///
    /// With two or more outputs, channels 0 and 1 receive left and right. A
    /// single output receives `(left + right) / 2`. With no outputs the voices
    /// still advance.
    pub fn render_with_events(
        &mut self,
        outputs: &mut [&mut [f32]],
        num_samples: usize,
        events: &[TimedEvent],
    ) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }

        let num_samples = outputs
            .iter()
            .take(2)
            .map(|output| output.len())
            .fold(num_samples, usize::min);
        if num_samples == 0 {
            for event in events {
                self.apply(event.command);
            }
            return;
        }

        let block = self.context.max_block_size();
        let mut next_event = 0;
        let mut chunk_start = 0;

        while chunk_start < num_samples {
            let chunk_len = block.min(num_samples - chunk_start);
            let chunk_end = chunk_start + chunk_len;

            let mut rendered = 0;
            while let Some(event) = events.get(next_event) {
                let offset = event.offset.min(num_samples - 1);
                if offset >= chunk_end {
                    break;
                }
                let at = offset.saturating_sub(chunk_start).max(rendered);
                self.pool.render(&self.library, &mut self.buses, rendered..at);
                self.apply_in_block(event.command);
                rendered = at;
                next_event += 1;
            }
            self.pool.render(&self.library, &mut self.buses, rendered..chunk_len);

            self.mix(outputs, chunk_start..chunk_end);
            chunk_start = chunk_end;
        }
    }

    fn mix(&mut self, outputs: &mut [&mut [f32]], range: std::ops::Range<usize>) {
        let len = range.len();
        match outputs {
            [left, right, ..] => {
                self.mixer.process(
                    &mut self.buses,
                    &mut left[range.clone()],
                    &mut right[range],
                    &self.params,
                );
            }
            [mono] => {
                let left = &mut self.scratch_left[..len];
                let right = &mut self.scratch_right[..len];
                left.fill(0.0);
                right.fill(0.0);
                self.mixer.process(&mut self.buses, left, right, &self.params);
                for ((out, l), r) in mono[range].iter_mut().zip(left.iter()).zip(right.iter()) {
                    *out += (l + r) * 0.5;
                }
            }
            [] => {
                let left = &mut self.scratch_left[..len];
                let right = &mut self.scratch_right[..len];
                left.fill(0.0);
                right.fill(0.0);
                self.mixer.process(&mut self.buses, left, right, &self.params);
            }
        }
    }
}

impl std::fmt::Debug for DrumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrumEngine")
            .field("context", &self.context)
            .field("instruments", &self.layout.instruments().len())
            .field("active_voices", &self.pool.active_count())
            .field("memory_kb", &(self.library.memory_usage() / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioContext;
    use crate::samples::stream::SampleData;
    use crate::samples::MemoryLoader;
    use crate::testutil::{small_engine, small_kit};

    const KICK: u8 = 36;
    const SWELL: u8 = 49;

    fn stereo(len: usize) -> (Vec<f32>, Vec<f32>) {
        (vec![0.0; len], vec![0.0; len])
    }

    #[test]
    fn test_kick_end_to_end() {
        let kick: Vec<f32> = (0..64).map(|i| (i as f32 / 64.0) - 0.5).collect();
        let mut loader = MemoryLoader::new();
        for bracket in 1..=6 {
            loader.insert(&format!("kick {}_1.wav", bracket), SampleData::new(kick.clone()));
        }
        let kit = Kit::load(&small_kit(), &mut loader).unwrap();
        let mut engine = DrumEngine::with_seed(kit, AudioContext::new(48000, 32).unwrap(), 1);

        assert!(engine.note_on(KICK, 1.0).is_some());
        let (mut left, mut right) = stereo(32);
        engine.render(&mut [&mut left[..], &mut right[..]], 32);

        for i in 0..32 {
            assert!((left[i] - 0.5 * kick[i]).abs() < 1e-6);
            assert!((right[i] - 0.5 * kick[i]).abs() < 1e-6);
        }
        assert!(engine.buses.bus(0).iter().all(|&s| s == 0.0));
        assert!((engine.params().meter(0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_scales_level() {
        let mut engine = small_engine(64, 64);
        engine.note_on(KICK, 0.5);
        let (mut left, mut right) = stereo(8);
        engine.render(&mut [&mut left[..], &mut right[..]], 8);
        assert!((left[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_note_is_counted() {
        let mut engine = small_engine(64, 64);
        assert!(engine.note_on(60, 1.0).is_none());
        assert_eq!(engine.stats().unknown_notes(), 1);
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_dropped_notes_are_counted() {
        let mut engine = small_engine(10_000, 64);
        for _ in 0..32 {
            assert!(engine.note_on(KICK, 1.0).is_some());
        }
        assert!(engine.note_on(KICK, 1.0).is_none());
        assert_eq!(engine.stats().dropped_notes(), 1);
        assert_eq!(engine.active_voice_count(), 32);
    }

    #[test]
    fn test_large_blocks_are_split() {
        let mut engine = small_engine(100, 16);
        engine.note_on(KICK, 1.0);
        let (mut left, mut right) = stereo(128);
        engine.render(&mut [&mut left[..], &mut right[..]], 128);

        assert!(left[..100].iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert!(left[100..].iter().all(|&s| s == 0.0));
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_output_is_added() {
        let mut engine = small_engine(64, 64);
        engine.note_on(KICK, 1.0);
        let mut left = vec![1.0; 4];
        let mut right = vec![1.0; 4];
        engine.render(&mut [&mut left[..], &mut right[..]], 4);
        assert!((left[0] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_mono_output() {
        let mut engine = small_engine(64, 64);
        engine.set_parameter(4, 0.0);
        engine.note_on(KICK, 1.0);
        let mut mono = vec![0.0; 8];
        engine.render(&mut [&mut mono[..]], 8);
        // Left 1.0, right 0.0.
        assert!((mono[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_outputs_still_advance() {
        let mut engine = small_engine(16, 64);
        engine.note_on(KICK, 1.0);
        engine.render(&mut [], 16);
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_timed_events_apply_at_offset() {
        let mut engine = small_engine(64, 16);
        let (mut left, mut right) = stereo(48);
        let events = [
            TimedEvent::new(20, EngineCommand::NoteOn { note: KICK, velocity: 1.0 }),
            TimedEvent::new(30, EngineCommand::StopAll),
        ];
        engine.render_with_events(&mut [&mut left[..], &mut right[..]], 48, &events);

        assert!(left[..20].iter().all(|&s| s == 0.0));
        assert!(left[20..30].iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert!(left[30..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_late_events_are_clamped() {
        let mut engine = small_engine(64, 16);
        let (mut left, mut right) = stereo(8);
        let events = [TimedEvent::new(100, EngineCommand::NoteOn { note: KICK, velocity: 1.0 })];
        engine.render_with_events(&mut [&mut left[..], &mut right[..]], 8, &events);
        assert!(left[..7].iter().all(|&s| s == 0.0));
        assert!((left[7] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_handle_commands_are_drained() {
        let mut engine = small_engine(64, 64);
        let handle = engine.handle();
        assert!(handle.note_on(KICK, 1.0));

        let (mut left, mut right) = stereo(4);
        engine.render(&mut [&mut left[..], &mut right[..]], 4);
        assert!((left[0] - 0.5).abs() < 1e-6);

        assert!(handle.stop_all());
        let (mut left, mut right) = stereo(4);
        engine.render(&mut [&mut left[..], &mut right[..]], 4);
        assert!(left.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stop_all_is_idempotent() {
        let mut engine = small_engine(1000, 64);
        engine.note_on(KICK, 1.0);
        engine.note_on(SWELL, 1.0);
        let (mut left, mut right) = stereo(8);
        engine.render(&mut [&mut left[..], &mut right[..]], 8);

        engine.stop_all();
        engine.stop_all();
        assert_eq!(engine.active_voice_count(), 0);
        assert!(engine.buses.bus(0).iter().all(|&s| s == 0.0));

        let (mut left, mut right) = stereo(8);
        engine.render(&mut [&mut left[..], &mut right[..]], 8);
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn test_sustained_release_tails_off() {
        let mut engine = small_engine(64, 64);
        engine.note_on(SWELL, 1.0);
        let (mut left, mut right) = stereo(64);
        engine.render(&mut [&mut left[..], &mut right[..]], 64);
        // Fixed bus: 0.5 sample × 0.5 to each side.
        assert!((left[0] - 0.25).abs() < 1e-6);
        assert!((right[0] - 0.25).abs() < 1e-6);

        assert_eq!(engine.release_note(SWELL, true), 1);
        let mut blocks = 0;
        while engine.active_voice_count() > 0 {
            let (mut left, mut right) = stereo(64);
            engine.render(&mut [&mut left[..], &mut right[..]], 64);
            blocks += 1;
            assert!(blocks < 20);
        }
    }

    #[test]
    fn test_midi_events() {
        let mut engine = small_engine(1000, 64);

        engine.process_midi_event(&[0x90, KICK, 127]);
        engine.process_midi_event(&[0x90, SWELL, 64]);
        assert_eq!(engine.active_voice_count(), 2);

        // Velocity 0 releases with tail: the swell starts fading, the kick plays on.
        engine.process_midi_event(&[0x90, SWELL, 0]);
        assert_eq!(engine.active_voice_count(), 2);

        engine.process_midi_event(&[0xB0, CC_ALL_SOUND_OFF, 0]);
        assert_eq!(engine.active_voice_count(), 0);

        engine.process_midi_event(&[]);
        assert_eq!(engine.stats().invalid_events(), 1);
    }

    #[test]
    fn test_command_for_midi() {
        assert_eq!(
            DrumEngine::command_for_midi(&[0x99, 36, 127]).unwrap(),
            Some(EngineCommand::NoteOn {
                note: 36,
                velocity: 1.0
            })
        );
        assert_eq!(
            DrumEngine::command_for_midi(&[0x80, 36, 64]).unwrap(),
            Some(EngineCommand::NoteOff {
                note: 36,
                allow_tail: true
            })
        );
        assert_eq!(
            DrumEngine::command_for_midi(&[0xB0, CC_ALL_NOTES_OFF, 0]).unwrap(),
            Some(EngineCommand::ReleaseAll { allow_tail: true })
        );
        assert_eq!(DrumEngine::command_for_midi(&[0xB0, 7, 100]).unwrap(), None);
    }

    #[test]
    fn test_parameter_passthrough() {
        let engine = small_engine(64, 64);
        assert_eq!(engine.parameter_count(), 6);
        engine.set_parameter(0, 0.8);
        assert_eq!(engine.parameter_text(0), "0.80");
        assert_eq!(engine.parameter_info(5).unwrap().name, "Room Pan");
        assert_eq!(engine.get_parameter(99), 0.0);
    }
}
