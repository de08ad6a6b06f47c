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

use std::error::Error;
use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::AudioContext;
use crate::config::{
    BusDefinition, BusRouting, ComponentDefinition, InstrumentDefinition, KitConfig,
    StripDefinition, VoiceKind,
};
use crate::samples::{DrumEngine, Kit, MemoryLoader, SampleData};

/// Writes planar channel data as an interleaved 32-bit float WAV.
pub fn write_wav(path: &Path, channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut writer = WavWriter::new(
        file,
        WavSpec {
            channels: channels.len() as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in &channels {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// A two-strip kit: a one-shot kick (note 36) on a panned bus and a sustained
/// swell (note 49) on a fixed bus. One layer per bracket.
pub fn small_kit() -> KitConfig {
    KitConfig::new(
        None,
        1,
        32,
        vec![
            StripDefinition::new("Kick", 1.0, 0.5),
            StripDefinition::new("Room", 1.0, 0.5),
        ],
        vec![
            BusDefinition::new("kick", "Kick", BusRouting::Panned),
            BusDefinition::new("room", "Room", BusRouting::Fixed),
        ],
        vec![
            ComponentDefinition::new("kick", "kick", "kick {velocity}_{layer}.wav"),
            ComponentDefinition::new("swell", "room", "swell {velocity}_{layer}.wav"),
        ],
        vec![
            InstrumentDefinition::new("kick", 36, VoiceKind::OneShot, &["kick"]),
            InstrumentDefinition::new("swell", 49, VoiceKind::Sustained, &["swell"]),
        ],
    )
}

/// Serves constant-valued samples for every file of [`small_kit`].
pub fn small_kit_loader(len: usize) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for bracket in 1..=6 {
        loader.insert(
            &format!("kick {}_1.wav", bracket),
            SampleData::new(vec![1.0; len]),
        );
        loader.insert(
            &format!("swell {}_1.wav", bracket),
            SampleData::new(vec![0.5; len]),
        );
    }
    loader
}

/// An engine over [`small_kit`] with `sample_len` long samples.
pub fn small_engine(sample_len: usize, max_block_size: usize) -> DrumEngine {
    let context = match AudioContext::new(48000, max_block_size) {
        Ok(context) => context,
        Err(e) => panic!("invalid test context: {}", e),
    };
    let mut loader = small_kit_loader(sample_len);
    let kit = match Kit::load(&small_kit(), &mut loader) {
        Ok(kit) => kit,
        Err(e) => panic!("invalid test kit: {}", e),
    };
    DrumEngine::with_seed(kit, context, 7)
}
