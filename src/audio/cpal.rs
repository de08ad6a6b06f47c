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

use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thread_priority::ThreadPriority;
use tracing::{debug, error, info, span, warn, Level};

use crate::audio::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use crate::bounce::{EVENTS_PER_BLOCK, MAX_TAIL_SECONDS};
use crate::midi::Timeline;
use crate::samples::{DrumEngine, TimedEvent};

/// How often the control thread reports meters while playing.
const METER_INTERVAL: Duration = Duration::from_millis(250);

/// A small wrapper around a cpal::Device with the details we report.
pub struct OutputDevice {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl OutputDevice {
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<OutputDevice> {
        let max_channels = device
            .supported_output_configs()
            .ok()?
            .map(|config| config.channels())
            .max()
            .unwrap_or(0);
        if max_channels == 0 {
            return None;
        }

        Some(OutputDevice {
            name: device.name().ok()?,
            max_channels,
            host_id,
            device,
        })
    }

    /// Lists every output device of every available host.
    pub fn list() -> Result<Vec<OutputDevice>, Box<dyn Error>> {
        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };
            devices.extend(host_devices.filter_map(|device| Self::from_cpal(host_id, device)));
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the named device, or the default output device of the default host.
    pub fn get(name: Option<&str>) -> Result<OutputDevice, Box<dyn Error>> {
        match name {
            Some(name) => Self::list()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name).into()),
            None => {
                let host = cpal::default_host();
                let device = host
                    .default_output_device()
                    .ok_or("no default output device")?;
                Self::from_cpal(host.id(), device).ok_or_else(|| "default output device has no outputs".into())
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rate the device prefers. The engine should be built for it.
    pub fn default_sample_rate(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.device.default_output_config()?.sample_rate().0)
    }

    /// Plays the timeline through the device and returns once every voice has
    /// rung out.
    pub fn play(&self, engine: DrumEngine, timeline: Timeline) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "play (cpal)");
        let _enter = span.enter();

        let supported = self.device.default_output_config()?;
        let sample_rate = engine.context().sample_rate();
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let handle = engine.handle();
        let finished = Arc::new(AtomicBool::new(false));
        let events = timeline.events().len();
        let play_time = Duration::from_secs_f64(timeline.end_frame() as f64 / sample_rate as f64);
        let renderer = StreamRenderer::new(engine, timeline, config.channels, finished.clone());

        let priority = callback_thread_priority();
        let rt_audio = rt_audio_enabled();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&config, renderer, priority, rt_audio),
            cpal::SampleFormat::I32 => self.build_stream::<i32>(&config, renderer, priority, rt_audio),
            _ => self.build_stream::<f32>(&config, renderer, priority, rt_audio),
        }?;
        stream.play()?;
        info!(
            device = self.name,
            channels = config.channels,
            sample_rate,
            events,
            "Playing MIDI file."
        );

        let deadline = play_time + Duration::from_secs(MAX_TAIL_SECONDS);
        let started = Instant::now();
        while !finished.load(Ordering::Acquire) {
            if started.elapsed() > deadline {
                warn!("Voices still sounding after the tail limit, stopping");
                handle.stop_all();
                thread::sleep(METER_INTERVAL);
                break;
            }
            thread::sleep(METER_INTERVAL);

            let params = handle.params();
            for strip in 0..params.strip_count() {
                let level = params.meter(strip);
                if level > 0.0 {
                    debug!(strip = params.strip_name(strip), level, "Meter");
                }
            }
        }
        drop(stream);

        let stats = handle.stats();
        info!(
            dropped_notes = stats.dropped_notes(),
            unknown_notes = stats.unknown_notes(),
            rejected_commands = stats.rejected_commands(),
            "Playback finished."
        );
        Ok(())
    }

    fn build_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        mut renderer: StreamRenderer,
        priority: ThreadPriority,
        rt_audio: bool,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let mut priority_set = false;
        self.device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
                renderer.fill(data);
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
    }
}

/// Everything the output callback owns. Allocates only at construction.
struct StreamRenderer {
    engine: DrumEngine,
    timeline: Timeline,
    channels: usize,
    /// One buffer for mono devices, two for everything else.
    planar: Vec<Vec<f32>>,
    events: Vec<TimedEvent>,
    cursor: usize,
    frame: u64,
    finished: Arc<AtomicBool>,
}

impl StreamRenderer {
    fn new(engine: DrumEngine, timeline: Timeline, channels: u16, finished: Arc<AtomicBool>) -> Self {
        let channels = usize::from(channels.max(1));
        let block = engine.context().max_block_size();
        Self {
            engine,
            timeline,
            channels,
            planar: vec![vec![0.0; block]; channels.min(2)],
            events: Vec::with_capacity(EVENTS_PER_BLOCK),
            cursor: 0,
            frame: 0,
            finished,
        }
    }

    /// Renders interleaved frames into a device buffer. Channels past the
    /// second are silent.
    fn fill<T>(&mut self, data: &mut [T])
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let block = self.engine.context().max_block_size();
        for chunk in data.chunks_mut(block * self.channels) {
            let frames = chunk.len() / self.channels;

            self.events.clear();
            self.timeline
                .collect_block(&mut self.cursor, self.frame, frames, &mut self.events);
            match self.planar.as_mut_slice() {
                [mono] => {
                    mono[..frames].fill(0.0);
                    self.engine
                        .render_with_events(&mut [&mut mono[..frames]], frames, &self.events);
                }
                [left, right] => {
                    left[..frames].fill(0.0);
                    right[..frames].fill(0.0);
                    self.engine.render_with_events(
                        &mut [&mut left[..frames], &mut right[..frames]],
                        frames,
                        &self.events,
                    );
                }
                _ => {}
            }

            for (i, out) in chunk.chunks_mut(self.channels).enumerate() {
                for (channel, sample) in out.iter_mut().enumerate() {
                    let value = self.planar.get(channel).map_or(0.0, |buffer| buffer[i]);
                    *sample = T::from_sample(value);
                }
            }
            self.frame += frames as u64;
        }

        if self.is_done() {
            self.finished.store(true, Ordering::Release);
        }
    }

    fn is_done(&self) -> bool {
        self.cursor >= self.timeline.events().len() && self.engine.active_voice_count() == 0
    }
}

#[cfg(test)]
mod test {
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

    use super::*;
    use crate::testutil::small_engine;

    fn kick_at_start() -> Timeline {
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![vec![TrackEvent {
                delta: u28::new(0),
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
    fn test_fill_interleaves_stereo_into_first_channels() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut renderer = StreamRenderer::new(small_engine(100, 64), kick_at_start(), 4, finished.clone());

        let mut data = vec![1.0f32; 4 * 128];
        renderer.fill(&mut data);
        assert!((data[0] - 0.5).abs() < 1e-6);
        assert!((data[1] - 0.5).abs() < 1e-6);
        assert_eq!(data[2], 0.0);
        assert_eq!(data[3], 0.0);
        // Frame 99 is the last sample of the kick.
        assert!((data[4 * 99] - 0.5).abs() < 1e-6);
        assert_eq!(data[4 * 100], 0.0);
        assert!(finished.load(Ordering::Acquire));
    }

    #[test]
    fn test_fill_mono_device() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut renderer = StreamRenderer::new(small_engine(100, 64), kick_at_start(), 1, finished.clone());

        let mut data = vec![0.0f32; 32];
        renderer.fill(&mut data);
        assert!((data[0] - 0.5).abs() < 1e-6);
        assert!(!finished.load(Ordering::Acquire));
    }

    #[test]
    fn test_fill_integer_samples() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut renderer = StreamRenderer::new(small_engine(100, 64), kick_at_start(), 2, finished);

        let mut data = vec![0i16; 2 * 16];
        renderer.fill(&mut data);
        assert!(data[0] > 16000 && data[0] < 16500);
        assert_eq!(data[0], data[1]);
    }

    #[test]
    fn test_empty_timeline_finishes_immediately() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut renderer = StreamRenderer::new(small_engine(100, 64), Timeline::default(), 2, finished.clone());

        let mut data = vec![0.0f32; 2 * 64];
        renderer.fill(&mut data);
        assert!(data.iter().all(|&s| s == 0.0));
        assert!(finished.load(Ordering::Acquire));
    }
}
