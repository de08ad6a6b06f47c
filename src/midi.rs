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

//! Standard MIDI files flattened into frame-stamped engine commands.

use std::error::Error;
use std::fs;
use std::path::Path;

use midly::{Format, MetaMessage, Smf, Timing, TrackEventKind};
use tracing::{debug, info};

use crate::samples::{DrumEngine, EngineCommand, TimedEvent};

/// Default tempo (120 BPM) until the file sets one.
const DEFAULT_MICROS_PER_BEAT: f64 = 500_000.0;

/// An engine command at an absolute output frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub frame: u64,
    pub command: EngineCommand,
}

/// Every playable event of a MIDI file, in frame order.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    events: Vec<NoteEvent>,
}

impl Timeline {
    /// Reads and flattens a MIDI file.
    pub fn from_file(path: &Path, sample_rate: u32) -> Result<Self, Box<dyn Error>> {
        let buf = fs::read(path)?;
        let smf = Smf::parse(&buf)?;
        let timeline = Self::from_smf(&smf, sample_rate)?;
        info!(
            path = ?path,
            events = timeline.events.len(),
            seconds = timeline.end_frame() as f64 / sample_rate as f64,
            "MIDI file loaded"
        );
        Ok(timeline)
    }

    /// Flattens a parsed MIDI file. Parallel tracks are merged; sequential
    /// tracks play one after another.
    pub fn from_smf(smf: &Smf, sample_rate: u32) -> Result<Self, Box<dyn Error>> {
        if sample_rate == 0 {
            return Err("Sample rate must be greater than 0".into());
        }

        // (absolute tick, event kind), merged across tracks.
        let mut merged: Vec<(u64, TrackEventKind)> = Vec::new();
        let mut track_start = 0u64;
        for track in &smf.tracks {
            let mut tick = track_start;
            for event in track {
                tick += event.delta.as_int() as u64;
                merged.push((tick, event.kind));
            }
            if smf.header.format == Format::Sequential {
                track_start = tick;
            }
        }
        merged.sort_by_key(|(tick, _)| *tick);

        let mut seconds_per_tick = match smf.header.timing {
            Timing::Metrical(ticks_per_beat) => {
                let tpb = ticks_per_beat.as_int().max(1) as f64;
                DEFAULT_MICROS_PER_BEAT / 1_000_000.0 / tpb
            }
            Timing::Timecode(fps, subframes) => 1.0 / (fps.as_f32() as f64 * subframes.max(1) as f64),
        };

        let mut events = Vec::new();
        let mut last_tick = 0u64;
        let mut seconds = 0.0f64;
        for (tick, kind) in merged {
            seconds += (tick - last_tick) as f64 * seconds_per_tick;
            last_tick = tick;

            match kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros_per_beat)) => {
                    if let Timing::Metrical(ticks_per_beat) = smf.header.timing {
                        let tpb = ticks_per_beat.as_int().max(1) as f64;
                        seconds_per_tick = micros_per_beat.as_int() as f64 / 1_000_000.0 / tpb;
                        debug!(tick, micros_per_beat = micros_per_beat.as_int(), "Tempo change");
                    }
                }
                TrackEventKind::Midi { message, .. } => {
                    if let Some(command) = DrumEngine::command_for_message(message) {
                        events.push(NoteEvent {
                            frame: (seconds * sample_rate as f64).round() as u64,
                            command,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(Self { events })
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Frame of the last event.
    pub fn end_frame(&self) -> u64 {
        self.events.last().map(|e| e.frame).unwrap_or(0)
    }

    /// Index of the first event at or after `frame`.
    pub fn position(&self, frame: u64) -> usize {
        self.events.partition_point(|e| e.frame < frame)
    }

    /// Appends the events of `[start, start + len)` to `out` as block offsets,
    /// starting the search at `*cursor` and advancing it. `out` is not cleared.
    pub fn collect_block(&self, cursor: &mut usize, start: u64, len: usize, out: &mut Vec<TimedEvent>) {
        let end = start + len as u64;
        while let Some(event) = self.events.get(*cursor) {
            if event.frame >= end {
                break;
            }
            if out.len() == out.capacity() {
                // Full. The rest lands at the start of the next block.
                break;
            }
            out.push(TimedEvent::new(
                event.frame.saturating_sub(start) as usize,
                event.command,
            ));
            *cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Header, MidiMessage, TrackEvent};

    use super::*;

    fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind,
        }
    }

    fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        event(
            delta,
            TrackEventKind::Midi {
                channel: u4::new(9),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        )
    }

    fn tempo(delta: u32, micros: u32) -> TrackEvent<'static> {
        event(delta, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros))))
    }

    fn smf(format: Format, tracks: Vec<Vec<TrackEvent<'static>>>) -> Smf<'static> {
        Smf {
            header: Header::new(format, Timing::Metrical(u15::new(480))),
            tracks,
        }
    }

    #[test]
    fn test_ticks_to_frames_with_tempo_change() {
        let smf = smf(
            Format::SingleTrack,
            vec![vec![
                note_on(0, 36, 127),
                // One beat at 120 BPM = 0.5 s.
                tempo(480, 250_000),
                note_on(0, 38, 64),
                // One beat at 240 BPM = 0.25 s.
                note_on(480, 36, 0),
            ]],
        );

        let timeline = Timeline::from_smf(&smf, 48000).unwrap();
        let frames: Vec<u64> = timeline.events().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![0, 24000, 36000]);

        assert_eq!(
            timeline.events()[0].command,
            EngineCommand::NoteOn {
                note: 36,
                velocity: 1.0
            }
        );
        assert_eq!(
            timeline.events()[2].command,
            EngineCommand::NoteOff {
                note: 36,
                allow_tail: true
            }
        );
        assert_eq!(timeline.end_frame(), 36000);
    }

    #[test]
    fn test_parallel_tracks_merge() {
        let smf = smf(
            Format::Parallel,
            vec![
                vec![tempo(0, 500_000), note_on(960, 36, 100)],
                vec![note_on(480, 38, 100)],
            ],
        );
        let timeline = Timeline::from_smf(&smf, 1000).unwrap();
        let frames: Vec<u64> = timeline.events().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![500, 1000]);
    }

    #[test]
    fn test_sequential_tracks_follow_each_other() {
        let smf = smf(
            Format::Sequential,
            vec![vec![note_on(480, 36, 100)], vec![note_on(480, 38, 100)]],
        );
        let timeline = Timeline::from_smf(&smf, 1000).unwrap();
        let frames: Vec<u64> = timeline.events().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![500, 1000]);
    }

    #[test]
    fn test_timecode_timing() {
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Timecode(midly::Fps::Fps25, 40)),
            tracks: vec![vec![note_on(1000, 36, 100)]],
        };
        // 25 fps × 40 subframes = 1000 ticks per second.
        let timeline = Timeline::from_smf(&smf, 44100).unwrap();
        assert_eq!(timeline.events()[0].frame, 44100);
    }

    #[test]
    fn test_collect_block() {
        let smf = smf(
            Format::SingleTrack,
            vec![vec![note_on(0, 36, 100), note_on(48, 38, 100), note_on(48, 36, 100)]],
        );
        // 480 ticks per 0.5 s at 960 Hz = 1 frame per tick.
        let timeline = Timeline::from_smf(&smf, 960).unwrap();

        let mut out = Vec::with_capacity(8);
        let mut cursor = 0;
        timeline.collect_block(&mut cursor, 0, 64, &mut out);
        assert_eq!(out.iter().map(|e| e.offset).collect::<Vec<_>>(), vec![0, 48]);

        out.clear();
        timeline.collect_block(&mut cursor, 64, 64, &mut out);
        assert_eq!(out.iter().map(|e| e.offset).collect::<Vec<_>>(), vec![32]);
        assert_eq!(cursor, 3);
        assert_eq!(timeline.position(49), 2);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.mid");
        smf(Format::SingleTrack, vec![vec![note_on(480, 36, 100)]])
            .save(&path)
            .unwrap();

        let timeline = Timeline::from_file(&path, 48000).unwrap();
        assert_eq!(timeline.events().len(), 1);
        assert_eq!(timeline.events()[0].frame, 24000);
    }
}
