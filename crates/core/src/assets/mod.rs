use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{character::CharacterState, ArDancerError, AssetConfig, Result};

/// Descriptor for an animated character visual that can be attached at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterAsset {
    pub path: String,
    #[serde(default = "default_looping")]
    pub looping: bool,
}

fn default_looping() -> bool {
    true
}

impl CharacterAsset {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            looping: true,
        }
    }
}

/// Registry of the visuals the scene is able to produce.
#[derive(Debug, Default, Clone)]
pub struct AssetStore {
    assets: HashMap<String, CharacterAsset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    /// Store pre-populated with every asset named in the configuration.
    pub fn from_config(config: &AssetConfig) -> Self {
        let mut store = Self::new();
        for path in [&config.stopped, &config.dancing, &config.walking] {
            store.register(CharacterAsset::new(path.as_str()));
        }
        store
    }

    pub fn register(&mut self, asset: CharacterAsset) {
        self.assets.insert(asset.path.clone(), asset);
    }

    /// Looks up an asset that must exist.
    pub fn require(&self, path: &str) -> Result<&CharacterAsset> {
        self.assets
            .get(path)
            .ok_or_else(|| ArDancerError::MissingAsset(path.to_string()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Which visual belongs to which character state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterAssets {
    stopped: String,
    dancing: String,
    walking: String,
}

impl CharacterAssets {
    pub fn new(config: &AssetConfig) -> Self {
        Self {
            stopped: config.stopped.clone(),
            dancing: config.dancing.clone(),
            walking: config.walking.clone(),
        }
    }

    pub fn for_state(&self, state: CharacterState) -> &str {
        match state {
            CharacterState::Stopped => &self.stopped,
            CharacterState::Dancing => &self.dancing,
            CharacterState::Walking => &self.walking,
        }
    }
}

impl Default for CharacterAssets {
    fn default() -> Self {
        Self::new(&AssetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_configured_assets() {
        let config = AssetConfig::default();
        let store = AssetStore::from_config(&config);

        assert_eq!(store.len(), 3);
        assert!(store.require(&config.stopped).is_ok());
        assert!(store.require(&config.dancing).unwrap().looping);
    }

    #[test]
    fn errors_on_missing_assets() {
        let store = AssetStore::new();

        let err = store.require("art.scnassets/Missing.dae").unwrap_err();
        assert!(matches!(err, ArDancerError::MissingAsset(_)));
        assert!(format!("{err}").contains("Missing.dae"));
    }

    #[test]
    fn maps_states_to_asset_names() {
        let assets = CharacterAssets::default();

        assert_eq!(
            assets.for_state(CharacterState::Stopped),
            "art.scnassets/Talking.dae"
        );
        assert_eq!(
            assets.for_state(CharacterState::Dancing),
            "art.scnassets/Dancing.dae"
        );
    }
}
