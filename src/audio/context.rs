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
// Rendering context passed to the loader, engine, MIDI timeline and bounce so
// nothing depends on a process-wide sample rate.
//

use std::error::Error;

/// Default sample rate when nothing else is specified.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default maximum block size.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 512;

/// Sample rate and the largest block the engine renders in one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioContext {
    sample_rate: u32,
    max_block_size: usize,
}

impl AudioContext {
    /// Creates a new context.
    pub fn new(sample_rate: u32, max_block_size: usize) -> Result<Self, Box<dyn Error>> {
        if sample_rate == 0 {
            return Err("Sample rate must be greater than 0".into());
        }
        if max_block_size == 0 {
            return Err("Block size must be greater than 0".into());
        }

        Ok(Self {
            sample_rate,
            max_block_size,
        })
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Largest block rendered in one pass. Larger host blocks are split.
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }
}

impl Default for AudioContext {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero() {
        assert!(AudioContext::new(0, 512).is_err());
        assert!(AudioContext::new(48000, 0).is_err());
    }

    #[test]
    fn test_new() {
        let context = AudioContext::new(48000, 256).unwrap();
        assert_eq!(context.sample_rate(), 48000);
        assert_eq!(context.max_block_size(), 256);
    }
}
