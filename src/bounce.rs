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

//! Offline rendering of a timeline to a stereo WAV file.

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{info, warn};

use crate::midi::Timeline;
use crate::samples::DrumEngine;

/// Longest ring-out rendered after the last event.
pub const MAX_TAIL_SECONDS: u64 = 30;

/// Events collected per block before the rest is deferred.
pub const EVENTS_PER_BLOCK: usize = 256;

/// What a bounce produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BounceSummary {
    pub frames: u64,
    pub peak: f32,
    pub dropped_notes: u64,
}

/// Renders every event of the timeline, then lets the voices ring out.
pub fn bounce<W>(engine: &mut DrumEngine, timeline: &Timeline, writer: &mut WavWriter<W>) -> Result<BounceSummary, Box<dyn Error>>
where
    W: std::io::Write + std::io::Seek,
{
    let block = engine.context().max_block_size();
    let tail_limit = timeline.end_frame() + MAX_TAIL_SECONDS * engine.context().sample_rate() as u64;

    let mut left = vec![0.0f32; block];
    let mut right = vec![0.0f32; block];
    let mut events = Vec::with_capacity(EVENTS_PER_BLOCK);
    let mut cursor = 0;
    let mut frame = 0u64;
    let mut peak = 0.0f32;

    loop {
        let events_done = cursor >= timeline.events().len();
        if events_done && (engine.active_voice_count() == 0 || frame >= tail_limit) {
            break;
        }

        left.fill(0.0);
        right.fill(0.0);
        events.clear();
        timeline.collect_block(&mut cursor, frame, block, &mut events);
        engine.render_with_events(&mut [&mut left[..], &mut right[..]], block, &events);

        for (l, r) in left.iter().zip(right.iter()) {
            writer.write_sample(*l)?;
            writer.write_sample(*r)?;
            peak = peak.max(l.abs()).max(r.abs());
        }
        frame += block as u64;
    }

    if engine.active_voice_count() > 0 {
        warn!(voices = engine.active_voice_count(), "Voices still sounding at the end of the bounce");
    }

    Ok(BounceSummary {
        frames: frame,
        peak,
        dropped_notes: engine.stats().dropped_notes(),
    })
}

/// Bounces a timeline to a 32-bit float stereo WAV file.
pub fn bounce_to_file(engine: &mut DrumEngine, timeline: &Timeline, path: &Path) -> Result<BounceSummary, Box<dyn Error>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: engine.context().sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::new(BufWriter::new(File::create(path)?), spec)?;
    let summary = bounce(engine, timeline, &mut writer)?;
    writer.finalize()?;

    info!(
        path = ?path,
        seconds = summary.frames as f64 / spec.sample_rate as f64,
        peak = summary.peak,
        dropped_notes = summary.dropped_notes,
        "Bounce finished"
    );
    if summary.peak > 1.0 {
        warn!(peak = summary.peak, "Output clips, lower the strip gains");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

    use super::*;
    use crate::testutil::small_engine;

    fn one_kick() -> Timeline {
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![vec![TrackEvent {
                delta: u28::new(480),
                kind: TrackEventKind::Midi {
                    channel: u4::new(9),
                    message: MidiMessage::NoteOn {
                        key: u7::new(36),
                        vel: u7::new(127),
                    },
                },
            }]],
        };
        Timeline::from_smf(&smf, 48000).unwrap()
    }

    #[test]
    fn test_bounce_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut engine = small_engine(100, 64);

        let summary = bounce_to_file(&mut engine, &one_kick(), &path).unwrap();
        // The kick starts at frame 24000 and lasts 100 frames.
        assert!(summary.frames >= 24100);
        assert!(summary.frames < 24100 + 128);
        assert!((summary.peak - 0.5).abs() < 1e-6);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48000);
        let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples.len() as u64, summary.frames * 2);
        assert_eq!(samples[2 * 23999], 0.0);
        assert!((samples[2 * 24000] - 0.5).abs() < 1e-6);
        assert!((samples[2 * 24000 + 1] - 0.5).abs() < 1e-6);
        assert_eq!(samples[2 * 24100], 0.0);
    }

    #[test]
    fn test_empty_timeline_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut engine = small_engine(100, 64);

        let summary = bounce_to_file(&mut engine, &Timeline::default(), &path).unwrap();
        assert_eq!(summary.frames, 0);
    }
}
