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
use std::path::{Path, PathBuf};

use config::{Config, File};
use tracing::debug;

mod error;
mod kit;

pub use self::error::ConfigError;
pub use self::kit::{
    BusDefinition, BusRouting, ComponentDefinition, InstrumentDefinition, KitConfig,
    StripDefinition, VoiceKind, DEFAULT_GAIN, DEFAULT_LAYERS_PER_BRACKET, DEFAULT_MAX_VOICES,
    DEFAULT_PAN,
};

/// Loads a kit from a YAML file.
pub fn load_kit(path: &Path) -> Result<KitConfig, ConfigError> {
    debug!(path = %path.display(), "Loading kit");
    Ok(Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize::<KitConfig>()?)
}

/// Serializes a kit to YAML.
pub fn dump_kit(kit: &KitConfig) -> Result<String, serde_yml::Error> {
    serde_yml::to_string(kit)
}

/// Resolves the directory sample files are read from. A relative
/// `sample_directory` is taken relative to the kit file's directory.
pub fn sample_root(kit_path: Option<&Path>, kit: &KitConfig) -> PathBuf {
    let base = kit_path
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    match kit.sample_directory() {
        Some(dir) => base.join(dir),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_load_kit_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kit.yaml");
        fs::write(&path, dump_kit(&KitConfig::builtin()).unwrap()).unwrap();

        let kit = load_kit(&path).unwrap();
        assert_eq!(kit.strips().len(), 8);
        assert_eq!(sample_root(Some(&path), &kit), dir.path().join("samples"));
    }

    #[test]
    fn test_load_missing_kit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_kit(&dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_sample_root_without_kit_path() {
        let kit = KitConfig::builtin();
        assert_eq!(sample_root(None, &kit), PathBuf::from("samples"));
    }
}
