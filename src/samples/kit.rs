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

//! Validated kit layout and the loaded kit.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::config::{BusRouting, ConfigError, KitConfig, VoiceKind};

use super::bus::BusId;
use super::layer::VelocityLayerBank;
use super::loader::ResourceLoader;
use super::stream::SampleLibrary;
use super::table::{ComponentId, InstrumentVoiceTable, VELOCITY_BRACKETS};
use super::voice::MAX_VOICE_CHANNELS;

/// Upper bound for voices, buses, components and instruments. Their indices are
/// stored as `u16`.
pub const MAX_KIT_ENTRIES: usize = u16::MAX as usize;

/// A mixer strip and the buses that feed it.
#[derive(Clone, Debug)]
pub struct StripLayout {
    name: String,
    gain: f32,
    pan: f32,
    buses: Vec<BusId>,
}

impl StripLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Initial pan.
    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Buses mixed through this strip.
    pub fn buses(&self) -> &[BusId] {
        &self.buses
    }
}

/// A submix bus and where it goes.
#[derive(Clone, Debug)]
pub struct BusLayout {
    name: String,
    strip: usize,
    routing: BusRouting,
}

impl BusLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the owning strip.
    pub fn strip(&self) -> usize {
        self.strip
    }

    pub fn routing(&self) -> BusRouting {
        self.routing
    }
}

/// One channel of an instrument: a component and the bus it plays into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelLayout {
    component: ComponentId,
    bus: BusId,
}

impl ChannelLayout {
    pub fn new(component: ComponentId, bus: BusId) -> Self {
        Self { component, bus }
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn bus(&self) -> BusId {
        self.bus
    }
}

/// A playable instrument.
#[derive(Clone, Debug)]
pub struct InstrumentLayout {
    name: String,
    note: u8,
    kind: VoiceKind,
    channels: Vec<ChannelLayout>,
}

impl InstrumentLayout {
    pub fn new(name: &str, note: u8, kind: VoiceKind, channels: Vec<ChannelLayout>) -> Self {
        Self {
            name: name.to_string(),
            note,
            kind,
            channels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    pub fn channels(&self) -> &[ChannelLayout] {
        &self.channels
    }
}

/// The kit with every name resolved to an index.
#[derive(Clone, Debug)]
pub struct KitLayout {
    strips: Vec<StripLayout>,
    buses: Vec<BusLayout>,
    components: Vec<String>,
    instruments: Vec<InstrumentLayout>,
    layers_per_bracket: usize,
    max_voices: usize,
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashMap<&'a str, usize>, ConfigError> {
    let mut indices = HashMap::new();
    for (index, name) in names.enumerate() {
        if indices.insert(name, index).is_some() {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(indices)
}

impl KitLayout {
    /// Validates a kit configuration.
    pub fn from_config(config: &KitConfig) -> Result<Self, ConfigError> {
        if config.layers_per_bracket() == 0 {
            return Err(ConfigError::NoLayers);
        }
        if config.max_voices() == 0 {
            return Err(ConfigError::NoVoices);
        }
        if config.strips().is_empty() {
            return Err(ConfigError::Empty("strips"));
        }
        if config.buses().is_empty() {
            return Err(ConfigError::Empty("buses"));
        }
        if config.components().is_empty() {
            return Err(ConfigError::Empty("components"));
        }
        if config.instruments().is_empty() {
            return Err(ConfigError::Empty("instruments"));
        }
        for (kind, count) in [
            ("voices", config.max_voices() as usize),
            ("buses", config.buses().len()),
            ("components", config.components().len()),
            ("instruments", config.instruments().len()),
        ] {
            if count > MAX_KIT_ENTRIES {
                return Err(ConfigError::TooMany {
                    kind,
                    count,
                    max: MAX_KIT_ENTRIES,
                });
            }
        }

        let strip_indices = check_unique("strip", config.strips().iter().map(|s| s.name()))?;
        let bus_indices = check_unique("bus", config.buses().iter().map(|b| b.name()))?;
        let component_indices =
            check_unique("component", config.components().iter().map(|c| c.name()))?;
        check_unique("instrument", config.instruments().iter().map(|i| i.name()))?;

        let mut strips: Vec<StripLayout> = config
            .strips()
            .iter()
            .map(|strip| StripLayout {
                name: strip.name().to_string(),
                gain: strip.gain(),
                pan: strip.pan(),
                buses: Vec::new(),
            })
            .collect();

        let mut buses = Vec::with_capacity(config.buses().len());
        for (index, bus) in config.buses().iter().enumerate() {
            let strip = *strip_indices
                .get(bus.strip())
                .ok_or_else(|| ConfigError::UnknownStrip {
                    bus: bus.name().to_string(),
                    strip: bus.strip().to_string(),
                })?;
            strips[strip].buses.push(BusId(index as u16));
            buses.push(BusLayout {
                name: bus.name().to_string(),
                strip,
                routing: bus.routing(),
            });
        }

        let mut component_buses = Vec::with_capacity(config.components().len());
        for component in config.components() {
            let bus = *bus_indices
                .get(component.bus())
                .ok_or_else(|| ConfigError::UnknownBus {
                    component: component.name().to_string(),
                    bus: component.bus().to_string(),
                })?;
            component_buses.push(BusId(bus as u16));
        }

        let mut notes: HashMap<u8, &str> = HashMap::new();
        let mut instruments = Vec::with_capacity(config.instruments().len());
        for instrument in config.instruments() {
            if instrument.note() > 127 {
                return Err(ConfigError::InvalidNote {
                    instrument: instrument.name().to_string(),
                    note: instrument.note(),
                });
            }
            if instrument.components().is_empty() {
                return Err(ConfigError::NoComponents(instrument.name().to_string()));
            }
            if instrument.components().len() > MAX_VOICE_CHANNELS {
                return Err(ConfigError::TooManyChannels {
                    instrument: instrument.name().to_string(),
                    count: instrument.components().len(),
                    max: MAX_VOICE_CHANNELS,
                });
            }
            if let Some(first) = notes.insert(instrument.note(), instrument.name()) {
                return Err(ConfigError::DuplicateNote {
                    note: instrument.note(),
                    first: first.to_string(),
                    second: instrument.name().to_string(),
                });
            }

            let channels = instrument
                .components()
                .iter()
                .map(|name| {
                    component_indices
                        .get(name.as_str())
                        .map(|&index| ChannelLayout::new(ComponentId(index as u16), component_buses[index]))
                        .ok_or_else(|| ConfigError::UnknownComponent {
                            instrument: instrument.name().to_string(),
                            component: name.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            instruments.push(InstrumentLayout::new(
                instrument.name(),
                instrument.note(),
                instrument.kind(),
                channels,
            ));
        }

        for strip in strips.iter().filter(|s| s.buses.is_empty()) {
            warn!(strip = strip.name.as_str(), "Strip has no buses");
        }
        let used: HashSet<u16> = instruments
            .iter()
            .flat_map(|i| i.channels.iter().map(|c| c.component.0))
            .collect();
        for (index, component) in config.components().iter().enumerate() {
            if !used.contains(&(index as u16)) {
                warn!(component = component.name(), "Component is not played by any instrument");
            }
        }

        Ok(Self {
            strips,
            buses,
            components: config.components().iter().map(|c| c.name().to_string()).collect(),
            instruments,
            layers_per_bracket: config.layers_per_bracket() as usize,
            max_voices: config.max_voices() as usize,
        })
    }

    pub fn strips(&self) -> &[StripLayout] {
        &self.strips
    }

    pub fn buses(&self) -> &[BusLayout] {
        &self.buses
    }

    /// Component names, indexed by [`ComponentId`].
    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn instruments(&self) -> &[InstrumentLayout] {
        &self.instruments
    }

    pub fn layers_per_bracket(&self) -> usize {
        self.layers_per_bracket
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Finds the instrument mapped to a MIDI note.
    pub fn instrument_for_note(&self, note: u8) -> Option<usize> {
        self.instruments.iter().position(|i| i.note == note)
    }
}

/// A validated kit with all of its samples in memory.
#[derive(Debug)]
pub struct Kit {
    layout: KitLayout,
    library: SampleLibrary,
    table: InstrumentVoiceTable,
    missing: Vec<String>,
}

impl Kit {
    /// Validates the configuration and loads every layer of every component.
    /// Resources the loader cannot provide become silence and are listed in
    /// [`Kit::missing`].
    pub fn load(config: &KitConfig, loader: &mut dyn ResourceLoader) -> Result<Self, ConfigError> {
        let layout = KitLayout::from_config(config)?;
        let mut library = SampleLibrary::new();
        let mut table = InstrumentVoiceTable::new();
        let mut missing = Vec::new();

        for component in config.components() {
            let banks: [VelocityLayerBank; VELOCITY_BRACKETS] = std::array::from_fn(|bracket| {
                let handles = (0..layout.layers_per_bracket)
                    .map(|layer| {
                        let name = component.file_for(bracket + 1, layer + 1);
                        let data = loader.open_resource(&name);
                        if data.is_empty() {
                            missing.push(name);
                        }
                        library.insert(data)
                    })
                    .collect();
                VelocityLayerBank::new(handles)
            });
            table.push(banks);
        }

        info!(
            components = table.len(),
            instruments = layout.instruments.len(),
            samples = library.len() - 1,
            missing = missing.len(),
            memory_kb = library.memory_usage() / 1024,
            "Kit loaded"
        );
        if !missing.is_empty() {
            warn!(count = missing.len(), "Some samples could not be loaded and will be silent");
        }

        Ok(Self {
            layout,
            library,
            table,
            missing,
        })
    }

    pub fn layout(&self) -> &KitLayout {
        &self.layout
    }

    pub fn library(&self) -> &SampleLibrary {
        &self.library
    }

    pub fn table(&self) -> &InstrumentVoiceTable {
        &self.table
    }

    /// Resource names that loaded as silence.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub(crate) fn into_parts(self) -> (KitLayout, SampleLibrary, InstrumentVoiceTable) {
        (self.layout, self.library, self.table)
    }
}
