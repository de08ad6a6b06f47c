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

//! Sample loading and caching.
//!
//! Samples are decoded entirely into memory when a kit is loaded so that
//! playback never touches the disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::audio::decode::{decode_mono, normalize_peak, resample};
use crate::audio::AudioContext;

use super::stream::SampleData;

/// Source of named sample resources.
pub trait ResourceLoader {
    /// Opens a resource by name. Failures are reported as silence (empty data).
    fn open_resource(&mut self, name: &str) -> SampleData;
}

/// Loads samples from disk, resampled to the engine's rate.
pub struct FileLoader {
    /// Directory relative resource names are resolved against.
    root: PathBuf,
    /// Target sample rate (matches the engine).
    target_sample_rate: u32,
    /// Whether to peak-normalize decoded samples.
    normalize: bool,
    /// Cache of loaded samples by file path.
    cache: HashMap<PathBuf, SampleData>,
}

impl FileLoader {
    /// Creates a new file loader.
    pub fn new(root: &Path, context: &AudioContext, normalize: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            target_sample_rate: context.sample_rate(),
            normalize,
            cache: HashMap::new(),
        }
    }

    /// Resolves a resource name to a path.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(SampleData::memory_size).sum()
    }

    fn load(&mut self, path: &Path) -> SampleData {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return sample.clone();
        }

        let decoded = match decode_mono(path) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(path = ?path, err = %e, "Failed to load sample, using silence");
                return SampleData::silence();
            }
        };

        let mut samples = if decoded.sample_rate != self.target_sample_rate {
            debug!(
                source_rate = decoded.sample_rate,
                target_rate = self.target_sample_rate,
                "Resampling sample"
            );
            match resample(&decoded.samples, decoded.sample_rate, self.target_sample_rate) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(path = ?path, err = %e, "Failed to resample sample, using silence");
                    return SampleData::silence();
                }
            }
        } else {
            decoded.samples
        };

        if self.normalize {
            normalize_peak(&mut samples);
        }

        let sample = SampleData::new(samples);
        info!(
            path = ?path,
            length = sample.len(),
            memory_kb = sample.memory_size() / 1024,
            "Sample loaded"
        );
        self.cache.insert(path.to_path_buf(), sample.clone());
        sample
    }
}

impl ResourceLoader for FileLoader {
    fn open_resource(&mut self, name: &str) -> SampleData {
        let path = self.path_for(name);
        self.load(&path)
    }
}

impl std::fmt::Debug for FileLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLoader")
            .field("root", &self.root)
            .field("cached_samples", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Serves samples that are already in memory.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    samples: HashMap<String, SampleData>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers data under a resource name.
    pub fn insert(&mut self, name: &str, data: SampleData) {
        self.samples.insert(name.to_string(), data);
    }
}

impl ResourceLoader for MemoryLoader {
    fn open_resource(&mut self, name: &str) -> SampleData {
        match self.samples.get(name) {
            Some(data) => data.clone(),
            None => {
                warn!(name, "Unknown sample resource, using silence");
                SampleData::silence()
            }
        }
    }
}
