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
use serde::{Deserialize, Serialize};

/// Default maximum number of concurrent voices.
pub const DEFAULT_MAX_VOICES: u32 = 32;

/// Default number of alternate recordings per velocity bracket.
pub const DEFAULT_LAYERS_PER_BRACKET: u8 = 6;

/// Default strip gain.
pub const DEFAULT_GAIN: f32 = 1.0;

/// Default strip pan (center).
pub const DEFAULT_PAN: f32 = 0.5;

/// A YAML representation of a drum kit.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct KitConfig {
    /// Directory the sample files live in, relative to the kit file.
    #[serde(default)]
    sample_directory: Option<String>,

    /// Alternate recordings per velocity bracket.
    #[serde(default = "default_layers_per_bracket")]
    layers_per_bracket: u8,

    /// Whether to peak-normalize every sample after loading.
    #[serde(default = "default_normalize")]
    normalize: bool,

    /// Size of the voice pool.
    #[serde(default = "default_max_voices")]
    max_voices: u32,

    /// Mixer strips. Each owns a gain, a pan and a meter parameter.
    strips: Vec<StripDefinition>,

    /// Submix buses.
    buses: Vec<BusDefinition>,

    /// Recorded components (one per microphone of each articulation).
    components: Vec<ComponentDefinition>,

    /// Playable instruments mapped to MIDI notes.
    instruments: Vec<InstrumentDefinition>,
}

fn default_layers_per_bracket() -> u8 {
    DEFAULT_LAYERS_PER_BRACKET
}

fn default_normalize() -> bool {
    true
}

fn default_max_voices() -> u32 {
    DEFAULT_MAX_VOICES
}

impl KitConfig {
    /// Creates a new kit configuration.
    pub fn new(
        sample_directory: Option<String>,
        layers_per_bracket: u8,
        max_voices: u32,
        strips: Vec<StripDefinition>,
        buses: Vec<BusDefinition>,
        components: Vec<ComponentDefinition>,
        instruments: Vec<InstrumentDefinition>,
    ) -> Self {
        Self {
            sample_directory,
            layers_per_bracket,
            normalize: true,
            max_voices,
            strips,
            buses,
            components,
            instruments,
        }
    }

    /// Gets the sample directory.
    pub fn sample_directory(&self) -> Option<&str> {
        self.sample_directory.as_deref()
    }

    /// Gets the number of layers per velocity bracket.
    pub fn layers_per_bracket(&self) -> u8 {
        self.layers_per_bracket
    }

    /// Gets whether samples are normalized on load.
    pub fn normalize(&self) -> bool {
        self.normalize
    }

    /// Sets whether samples are normalized on load.
    pub fn set_normalize(&mut self, normalize: bool) {
        self.normalize = normalize;
    }

    /// Gets the voice pool size.
    pub fn max_voices(&self) -> u32 {
        self.max_voices
    }

    /// Gets the strips.
    pub fn strips(&self) -> &[StripDefinition] {
        &self.strips
    }

    /// Gets the buses.
    pub fn buses(&self) -> &[BusDefinition] {
        &self.buses
    }

    /// Gets the components.
    pub fn components(&self) -> &[ComponentDefinition] {
        &self.components
    }

    /// Gets the instruments.
    pub fn instruments(&self) -> &[InstrumentDefinition] {
        &self.instruments
    }

    /// The built-in kit: seven close-miked shell channels and two hi-hat
    /// articulations recorded through five cymbal microphones.
    pub fn builtin() -> Self {
        const SHELLS: [(&str, &str, &str); 7] = [
            ("kick_in", "Kick In", "Bass Drum In"),
            ("kick_out", "Kick Out", "Bass Drum Out"),
            ("snare_up", "Snare Up", "Snare Up"),
            ("snare_down", "Snare Down", "Snare Down"),
            ("high_tom", "High Tom", "High Tom"),
            ("mid_tom", "Mid Tom", "Mid Tom"),
            ("floor_tom", "Floor Tom", "Floor Tom"),
        ];
        const CYMBAL_MICS: [(&str, &str); 5] = [
            ("close", "Close Mic"),
            ("oh_l", "OH L"),
            ("oh_r", "OH R"),
            ("room_l", "Room L"),
            ("room_r", "Room R"),
        ];
        const CYMBALS: [(&str, &str, u8); 2] = [
            ("hats_closed", "Hats Closed Tip", 54),
            ("hats_rock_sizzle", "Hats Rock Sizzle", 56),
        ];
        const OVERHEADS: &str = "Overheads";

        let mut strips = Vec::new();
        let mut buses = Vec::new();
        let mut components = Vec::new();

        for (name, strip, prefix) in SHELLS {
            strips.push(StripDefinition::new(strip, DEFAULT_GAIN, DEFAULT_PAN));
            buses.push(BusDefinition::new(name, strip, BusRouting::Panned));
            components.push(ComponentDefinition::new(
                name,
                name,
                &format!("{} {{velocity}}_{{layer}}.wav", prefix),
            ));
        }

        strips.push(StripDefinition::new(OVERHEADS, DEFAULT_GAIN, DEFAULT_PAN));
        for (mic, _) in CYMBAL_MICS {
            buses.push(BusDefinition::new(
                &format!("cymbal_{}", mic),
                OVERHEADS,
                BusRouting::Fixed,
            ));
        }

        let mut instruments = vec![
            InstrumentDefinition::new("kick", 48, VoiceKind::OneShot, &["kick_in", "kick_out"]),
            InstrumentDefinition::new("snare", 50, VoiceKind::OneShot, &["snare_up", "snare_down"]),
            InstrumentDefinition::new("floor_tom", 53, VoiceKind::OneShot, &["floor_tom"]),
            InstrumentDefinition::new("mid_tom", 55, VoiceKind::OneShot, &["mid_tom"]),
            InstrumentDefinition::new("high_tom", 57, VoiceKind::OneShot, &["high_tom"]),
        ];

        for (name, prefix, note) in CYMBALS {
            let mut channels = Vec::new();
            for (mic, mic_label) in CYMBAL_MICS {
                let component = format!("{}_{}", name, mic);
                components.push(ComponentDefinition::new(
                    &component,
                    &format!("cymbal_{}", mic),
                    &format!("{} {} {{velocity}}_{{layer}}.wav", prefix, mic_label),
                ));
                channels.push(component);
            }
            instruments.push(InstrumentDefinition {
                name: name.to_string(),
                note,
                kind: VoiceKind::OneShot,
                components: channels,
            });
        }

        Self {
            sample_directory: Some("samples".to_string()),
            layers_per_bracket: DEFAULT_LAYERS_PER_BRACKET,
            normalize: true,
            max_voices: DEFAULT_MAX_VOICES,
            strips,
            buses,
            components,
            instruments,
        }
    }
}

/// A mixer strip: one gain, one pan and one meter.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct StripDefinition {
    /// Display name, also used by buses to reference the strip.
    name: String,

    /// Initial gain (0.0 to 1.3).
    #[serde(default = "default_gain")]
    gain: f32,

    /// Initial pan (0.0 = left, 1.0 = right).
    #[serde(default = "default_pan")]
    pan: f32,
}

fn default_gain() -> f32 {
    DEFAULT_GAIN
}

fn default_pan() -> f32 {
    DEFAULT_PAN
}

impl StripDefinition {
    /// Creates a new strip definition.
    pub fn new(name: &str, gain: f32, pan: f32) -> Self {
        Self {
            name: name.to_string(),
            gain,
            pan,
        }
    }

    /// Gets the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the initial gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Gets the initial pan.
    pub fn pan(&self) -> f32 {
        self.pan
    }
}

/// How a bus is placed in the stereo field.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusRouting {
    /// Positioned by its strip's pan control.
    #[default]
    Panned,
    /// Split evenly between left and right; the recording already implies its position.
    Fixed,
}

/// A submix bus.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct BusDefinition {
    /// Bus name, referenced by components.
    name: String,

    /// The strip this bus is mixed and metered through.
    strip: String,

    /// Stereo placement.
    #[serde(default)]
    routing: BusRouting,
}

impl BusDefinition {
    /// Creates a new bus definition.
    pub fn new(name: &str, strip: &str, routing: BusRouting) -> Self {
        Self {
            name: name.to_string(),
            strip: strip.to_string(),
            routing,
        }
    }

    /// Gets the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the strip name.
    pub fn strip(&self) -> &str {
        &self.strip
    }

    /// Gets the routing.
    pub fn routing(&self) -> BusRouting {
        self.routing
    }
}

/// One recorded signal of the kit, e.g. the inside kick mic.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct ComponentDefinition {
    /// Component name, referenced by instruments.
    name: String,

    /// The bus this component is written into.
    bus: String,

    /// File name pattern. `{velocity}` expands to the bracket (1-6) and
    /// `{layer}` to the alternate recording (1-N).
    files: String,
}

impl ComponentDefinition {
    /// Creates a new component definition.
    pub fn new(name: &str, bus: &str, files: &str) -> Self {
        Self {
            name: name.to_string(),
            bus: bus.to_string(),
            files: files.to_string(),
        }
    }

    /// Gets the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the bus name.
    pub fn bus(&self) -> &str {
        &self.bus
    }

    /// Gets the file pattern.
    pub fn files(&self) -> &str {
        &self.files
    }

    /// Expands the file pattern for a 1-based bracket and layer.
    pub fn file_for(&self, bracket: usize, layer: usize) -> String {
        self.files
            .replace("{velocity}", &bracket.to_string())
            .replace("{layer}", &layer.to_string())
    }
}

/// How a voice reacts to being released.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoiceKind {
    /// Plays its samples to the end. A release with tail is ignored.
    #[default]
    OneShot,
    /// Loops its samples until released, then tails off.
    Sustained,
}

/// A playable instrument: a MIDI note and the components it sounds.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct InstrumentDefinition {
    /// Instrument name.
    name: String,

    /// The MIDI note that triggers it.
    note: u8,

    /// Release behavior.
    #[serde(default)]
    kind: VoiceKind,

    /// The components played together, one voice channel each.
    components: Vec<String>,
}

impl InstrumentDefinition {
    /// Creates a new instrument definition.
    pub fn new(name: &str, note: u8, kind: VoiceKind, components: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            note,
            kind,
            components: components.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Gets the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the note.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Gets the kind.
    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    /// Gets the component names.
    pub fn components(&self) -> &[String] {
        &self.components
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_kit_deserialize() {
        let yaml = r#"
            sample_directory: drums
            layers_per_bracket: 2
            strips:
              - name: Kick
                gain: 1.2
              - name: Room
            buses:
              - name: kick
                strip: Kick
              - name: room
                strip: Room
                routing: fixed
            components:
              - name: kick
                bus: kick
                files: "kick {velocity}_{layer}.wav"
            instruments:
              - name: kick
                note: 36
                components: [kick]
              - name: swell
                note: 49
                kind: sustained
                components: [kick]
        "#;

        let kit: KitConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(kit.sample_directory(), Some("drums"));
        assert_eq!(kit.layers_per_bracket(), 2);
        assert!(kit.normalize());
        assert_eq!(kit.max_voices(), DEFAULT_MAX_VOICES);
        assert!((kit.strips()[0].gain() - 1.2).abs() < 1e-6);
        assert!((kit.strips()[1].gain() - DEFAULT_GAIN).abs() < 1e-6);
        assert!((kit.strips()[1].pan() - DEFAULT_PAN).abs() < 1e-6);
        assert_eq!(kit.buses()[0].routing(), BusRouting::Panned);
        assert_eq!(kit.buses()[1].routing(), BusRouting::Fixed);
        assert_eq!(kit.instruments()[0].kind(), VoiceKind::OneShot);
        assert_eq!(kit.instruments()[1].kind(), VoiceKind::Sustained);
    }

    #[test]
    fn test_file_pattern_expansion() {
        let component = ComponentDefinition::new("kick_in", "kick_in", "Bass Drum In {velocity}_{layer}.wav");
        assert_eq!(component.file_for(6, 1), "Bass Drum In 6_1.wav");
        assert_eq!(component.file_for(1, 6), "Bass Drum In 1_6.wav");
    }

    #[test]
    fn test_builtin_kit_layout() {
        let kit = KitConfig::builtin();

        assert_eq!(kit.strips().len(), 8);
        assert_eq!(kit.buses().len(), 12);
        assert_eq!(kit.components().len(), 17);
        assert_eq!(kit.instruments().len(), 7);

        let hats = kit
            .instruments()
            .iter()
            .find(|i| i.note() == 54)
            .unwrap();
        assert_eq!(hats.components().len(), 5);
        assert_eq!(
            kit.components()
                .iter()
                .find(|c| c.name() == "hats_closed_oh_l")
                .unwrap()
                .file_for(6, 3),
            "Hats Closed Tip OH L 6_3.wav"
        );

        let fixed = kit
            .buses()
            .iter()
            .filter(|b| b.routing() == BusRouting::Fixed)
            .count();
        assert_eq!(fixed, 5);
    }

    #[test]
    fn test_builtin_kit_round_trips_through_yaml() {
        let yaml = serde_yml::to_string(&KitConfig::builtin()).unwrap();
        let kit: KitConfig = Config::builder()
            .add_source(File::from_str(&yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(kit.instruments().len(), 7);
        assert_eq!(kit.components().len(), 17);
    }
}
