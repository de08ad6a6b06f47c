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

//! Mixer parameters shared between the audio thread and control threads.
//!
//! Every strip has a gain, a pan and a meter. They are exposed as one flat,
//! indexed parameter list: gains first, then meters, then pans.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::samples::KitLayout;

/// Upper bound of strip gain.
pub const MAX_GAIN: f32 = 1.3;

/// An `f32` stored in an `AtomicU32`.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// What a parameter controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    Gain,
    Meter,
    Pan,
}

impl ParameterKind {
    /// Valid range of values.
    pub fn range(self) -> (f32, f32) {
        match self {
            ParameterKind::Gain => (0.0, MAX_GAIN),
            ParameterKind::Meter | ParameterKind::Pan => (0.0, 1.0),
        }
    }

    /// Whether the control side may write it.
    pub fn is_writable(self) -> bool {
        self != ParameterKind::Meter
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::Gain => write!(f, "Gain"),
            ParameterKind::Meter => write!(f, "Meter"),
            ParameterKind::Pan => write!(f, "Pan"),
        }
    }
}

/// Description of one indexed parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub kind: ParameterKind,
    pub strip: usize,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

/// Per-strip gain, pan and meter cells.
#[derive(Debug)]
pub struct MixParameters {
    strip_names: Vec<String>,
    defaults: Vec<(f32, f32)>,
    gains: Box<[AtomicF32]>,
    pans: Box<[AtomicF32]>,
    meters: Box<[AtomicF32]>,
}

impl MixParameters {
    /// Creates parameters for the given strips, each with its initial gain and pan.
    pub fn new(strips: Vec<(String, f32, f32)>) -> Self {
        let defaults: Vec<(f32, f32)> = strips
            .iter()
            .map(|(_, gain, pan)| (clamp(ParameterKind::Gain, *gain), clamp(ParameterKind::Pan, *pan)))
            .collect();
        Self {
            gains: defaults.iter().map(|(gain, _)| AtomicF32::new(*gain)).collect(),
            pans: defaults.iter().map(|(_, pan)| AtomicF32::new(*pan)).collect(),
            meters: defaults.iter().map(|_| AtomicF32::new(0.0)).collect(),
            strip_names: strips.into_iter().map(|(name, _, _)| name).collect(),
            defaults,
        }
    }

    /// Creates parameters for every strip of a kit.
    pub fn from_layout(layout: &KitLayout) -> Self {
        Self::new(
            layout
                .strips()
                .iter()
                .map(|s| (s.name().to_string(), s.gain(), s.pan()))
                .collect(),
        )
    }

    /// Number of strips.
    pub fn strip_count(&self) -> usize {
        self.strip_names.len()
    }

    /// Name of a strip.
    pub fn strip_name(&self, strip: usize) -> Option<&str> {
        self.strip_names.get(strip).map(String::as_str)
    }

    /// Number of indexed parameters.
    pub fn parameter_count(&self) -> usize {
        self.strip_count() * 3
    }

    fn locate(&self, index: usize) -> Option<(ParameterKind, usize)> {
        let strips = self.strip_count();
        match index / strips.max(1) {
            _ if index >= self.parameter_count() => None,
            0 => Some((ParameterKind::Gain, index)),
            1 => Some((ParameterKind::Meter, index - strips)),
            _ => Some((ParameterKind::Pan, index - 2 * strips)),
        }
    }

    fn cell(&self, kind: ParameterKind, strip: usize) -> Option<&AtomicF32> {
        match kind {
            ParameterKind::Gain => self.gains.get(strip),
            ParameterKind::Meter => self.meters.get(strip),
            ParameterKind::Pan => self.pans.get(strip),
        }
    }

    /// Reads an indexed parameter. Unknown indices read 0.0.
    pub fn get_parameter(&self, index: usize) -> f32 {
        self.locate(index)
            .and_then(|(kind, strip)| self.cell(kind, strip))
            .map(AtomicF32::load)
            .unwrap_or(0.0)
    }

    /// Writes an indexed parameter from the control side. Values are clamped
    /// into range; unknown indices, meters and NaN are ignored.
    pub fn set_parameter(&self, index: usize, value: f32) {
        if value.is_nan() {
            return;
        }
        if let Some((kind, strip)) = self.locate(index).filter(|(kind, _)| kind.is_writable()) {
            if let Some(cell) = self.cell(kind, strip) {
                cell.store(clamp(kind, value));
            }
        }
    }

    /// Describes an indexed parameter.
    pub fn parameter_info(&self, index: usize) -> Option<ParameterInfo> {
        let (kind, strip) = self.locate(index)?;
        let (min, max) = kind.range();
        let default = match kind {
            ParameterKind::Gain => self.defaults[strip].0,
            ParameterKind::Pan => self.defaults[strip].1,
            ParameterKind::Meter => 0.0,
        };
        Some(ParameterInfo {
            name: format!("{} {}", self.strip_names[strip], kind),
            kind,
            strip,
            min,
            max,
            default,
        })
    }

    /// The parameter's value as display text, clamped into the parameter's range.
    pub fn parameter_text(&self, index: usize) -> String {
        let value = match self.locate(index) {
            Some((kind, _)) => clamp(kind, self.get_parameter(index)),
            None => 0.0,
        };
        format!("{:.2}", value)
    }

    #[inline]
    pub fn gain(&self, strip: usize) -> f32 {
        self.gains.get(strip).map(AtomicF32::load).unwrap_or(0.0)
    }

    #[inline]
    pub fn pan(&self, strip: usize) -> f32 {
        self.pans.get(strip).map(AtomicF32::load).unwrap_or(0.0)
    }

    #[inline]
    pub fn meter(&self, strip: usize) -> f32 {
        self.meters.get(strip).map(AtomicF32::load).unwrap_or(0.0)
    }

    pub fn set_gain(&self, strip: usize, gain: f32) {
        self.set_parameter(strip, gain);
    }

    pub fn set_pan(&self, strip: usize, pan: f32) {
        if strip < self.strip_count() {
            self.set_parameter(2 * self.strip_count() + strip, pan);
        }
    }

    /// Written by the mixer once per block. Levels above 1.0 are kept so an
    /// overloaded strip stays visible through `meter`.
    #[inline]
    pub(crate) fn set_meter(&self, strip: usize, level: f32) {
        if let Some(cell) = self.meters.get(strip) {
            cell.store(if level.is_nan() { 0.0 } else { level.max(0.0) });
        }
    }
}

fn clamp(kind: ParameterKind, value: f32) -> f32 {
    let (min, max) = kind.range();
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
