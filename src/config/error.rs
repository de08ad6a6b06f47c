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

/// Typed error for kit load, parse and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("kit declares no {0}")]
    Empty(&'static str),

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("bus {bus} references unknown strip {strip}")]
    UnknownStrip { bus: String, strip: String },

    #[error("component {component} references unknown bus {bus}")]
    UnknownBus { component: String, bus: String },

    #[error("instrument {instrument} references unknown component {component}")]
    UnknownComponent {
        instrument: String,
        component: String,
    },

    #[error("instrument {instrument} has {count} components, at most {max} are supported")]
    TooManyChannels {
        instrument: String,
        count: usize,
        max: usize,
    },

    #[error("instrument {0} has no components")]
    NoComponents(String),

    #[error("note {note} is mapped by both {first} and {second}")]
    DuplicateNote {
        note: u8,
        first: String,
        second: String,
    },

    #[error("instrument {instrument} uses note {note}, notes must be 0-127")]
    InvalidNote { instrument: String, note: u8 },

    #[error("layers_per_bracket must be at least 1")]
    NoLayers,

    #[error("max_voices must be at least 1")]
    NoVoices,

    #[error("kit declares {count} {kind}, at most {max} are supported")]
    TooMany {
        kind: &'static str,
        count: usize,
        max: usize,
    },
}
