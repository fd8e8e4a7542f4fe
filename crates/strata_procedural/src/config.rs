//! # World Configuration
//!
//! Loaded once per world from TOML. Missing sections fall back to the
//! built-in biomes and layer chain.
//!
//! ```toml
//! seed = 12345
//! population_bounds_check = true
//! populate_using_saved_biomes = false
//! pool_size = 4
//!
//! [[biomes]]
//! name = "Ocean"
//! generation_id = 0
//!
//! [[biomes]]
//! name = "Desert"
//! generation_id = 2
//! replace = [{ from = 1, to = { id = 24 }, min_height = 40 }]
//!
//! [[layers]]
//! seed = 1
//! stage = { kind = "base", biomes = [0, 2] }
//!
//! [[layers]]
//! seed = 10
//! stage = { kind = "voronoi_zoom" }
//! ```

use serde::{Deserialize, Serialize};
use strata_core::DEFAULT_POOL_SIZE;

use crate::biome::{BiomeConfig, BiomeId, BiomeIds, BiomeRegistry, ReplaceRule, ReplaceTable};
use crate::error::{GenError, GenResult};
use crate::layer::{LayerSpec, LayerStack};
use crate::population::BoundsMode;

const fn default_true() -> bool {
    true
}

const fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

const fn default_min_height() -> f32 {
    0.1
}

const fn default_max_height() -> f32 {
    0.3
}

/// One `[[biomes]]` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeDef {
    /// Unique name.
    pub name: String,
    /// Id used by the layer chain.
    pub generation_id: u16,
    /// Id stored in chunks; defaults to `generation_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_id: Option<u8>,
    /// Lower terrain height hint.
    #[serde(default = "default_min_height")]
    pub min_height: f32,
    /// Upper terrain height hint.
    #[serde(default = "default_max_height")]
    pub max_height: f32,
    /// Block replacement rules, applied in order.
    #[serde(default)]
    pub replace: Vec<ReplaceRule>,
}

impl BiomeDef {
    /// A definition with default heights and no replacements.
    #[must_use]
    pub fn new(name: impl Into<String>, generation_id: u16) -> Self {
        Self {
            name: name.into(),
            generation_id,
            saved_id: None,
            min_height: default_min_height(),
            max_height: default_max_height(),
            replace: Vec::new(),
        }
    }

    /// Compiles the definition into a registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for an out-of-range id without an
    /// explicit saved id, or invalid replace rules.
    pub fn to_config(&self) -> GenResult<BiomeConfig> {
        let ids = match self.saved_id {
            Some(saved) => BiomeIds {
                generation: self.generation_id,
                saved: BiomeId(saved),
            },
            None => BiomeIds::same(self.generation_id)?,
        };
        Ok(BiomeConfig::new(self.name.clone(), ids)
            .with_heights(self.min_height, self.max_height)
            .with_replace(ReplaceTable::compile(&self.replace)?))
    }
}

/// World settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// World seed.
    #[serde(default)]
    pub seed: i64,
    /// Strict population bounds (see [`BoundsMode`]).
    #[serde(default = "default_true")]
    pub population_bounds_check: bool,
    /// Replacement sweep reads saved chunk biomes instead of recomputing.
    #[serde(default)]
    pub populate_using_saved_biomes: bool,
    /// Number of array pool slots.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Registered biomes; empty means the built-in set.
    #[serde(default)]
    pub biomes: Vec<BiomeDef>,
    /// Layer chain, bottom first; empty means the built-in chain.
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            population_bounds_check: true,
            populate_using_saved_biomes: false,
            pool_size: DEFAULT_POOL_SIZE,
            biomes: Vec::new(),
            layers: Vec::new(),
        }
    }
}

impl WorldConfig {
    /// Default settings for `seed`.
    #[must_use]
    pub fn with_seed(seed: i64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for malformed TOML or invalid
    /// values.
    pub fn from_toml_str(source: &str) -> GenResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if the value cannot be expressed
    /// in TOML.
    pub fn to_toml_string(&self) -> GenResult<String> {
        toml::to_string(self).map_err(|err| GenError::InvalidConfig(err.to_string()))
    }

    /// Checks values that have no meaningful fallback.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for a zero pool size.
    pub fn validate(&self) -> GenResult<()> {
        if self.pool_size == 0 {
            return Err(GenError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Bounds mode for the population window.
    #[must_use]
    pub const fn bounds_mode(&self) -> BoundsMode {
        BoundsMode::from_bounds_check(self.population_bounds_check)
    }

    /// Builds the biome registry.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for invalid or conflicting biomes.
    pub fn build_registry(&self) -> GenResult<BiomeRegistry> {
        if self.biomes.is_empty() {
            return Ok(BiomeRegistry::with_defaults());
        }
        let mut registry = BiomeRegistry::new();
        for def in &self.biomes {
            registry.register(def.to_config()?)?;
        }
        Ok(registry)
    }

    /// Builds the layer chain.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for an invalid chain.
    pub fn build_stack(&self) -> GenResult<LayerStack> {
        if self.layers.is_empty() {
            LayerStack::overworld(self.seed)
        } else {
            LayerStack::from_specs(self.seed, &self.layers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Block;
    use crate::layer::Stage;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorldConfig::default());
        assert_eq!(config.bounds_mode(), BoundsMode::Strict);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(!config.build_registry().unwrap().is_empty());
        assert_eq!(config.build_stack().unwrap().world_seed(), 0);
    }

    #[test]
    fn test_parse_full_document() {
        let config = WorldConfig::from_toml_str(
            r#"
            seed = -77
            population_bounds_check = false
            populate_using_saved_biomes = true
            pool_size = 2

            [[biomes]]
            name = "Ocean"
            generation_id = 0

            [[biomes]]
            name = "Canyon"
            generation_id = 300
            saved_id = 2
            replace = [
                { from = 1, to = { id = 172, meta = 3 }, min_height = 40, max_height = 90 },
            ]

            [[layers]]
            seed = 1
            stage = { kind = "base", biomes = [0, 300] }

            [[layers]]
            seed = 2000
            stage = { kind = "zoom" }
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, -77);
        assert_eq!(config.bounds_mode(), BoundsMode::Lenient);
        assert!(config.populate_using_saved_biomes);
        assert_eq!(config.layers[1], LayerSpec::new(2000, Stage::Zoom));

        let registry = config.build_registry().unwrap();
        let canyon = registry.by_generation(300).unwrap();
        assert_eq!(canyon.ids.saved, BiomeId(2));
        assert_eq!(canyon.replace.lookup(1, 50), Some(Block::with_meta(172, 3)));
        assert_eq!(canyon.replace.lookup(1, 30), None);
        assert!(registry.has_replace_settings());

        assert_eq!(config.build_stack().unwrap().depth(), 2);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            WorldConfig::from_toml_str("seed = \"abc\""),
            Err(GenError::InvalidConfig(_))
        ));
        assert!(WorldConfig::from_toml_str("pool_size = 0").is_err());
        assert!(WorldConfig::from_toml_str("[[layers]]\nseed = 1\nstage = { kind = \"spiral\" }").is_err());

        let config = WorldConfig::from_toml_str(
            "[[biomes]]\nname = \"Far\"\ngeneration_id = 700\n",
        )
        .unwrap();
        assert!(config.build_registry().is_err());

        let config = WorldConfig::from_toml_str(
            "[[layers]]\nseed = 1\nstage = { kind = \"zoom\" }\n",
        )
        .unwrap();
        assert!(config.build_stack().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = WorldConfig::with_seed(42);
        let mut desert = BiomeDef::new("Desert", 2);
        desert.replace.push(ReplaceRule::new(1, Block::SANDSTONE).between(0, 70));
        config.biomes = vec![BiomeDef::new("Ocean", 0), desert];
        config.layers = vec![
            LayerSpec::new(1, Stage::Island { land: 2, ocean: 0 }),
            LayerSpec::new(2000, Stage::Zoom),
            LayerSpec::new(10, Stage::VoronoiZoom),
        ];

        let text = config.to_toml_string().unwrap();
        assert_eq!(WorldConfig::from_toml_str(&text).unwrap(), config);
    }
}
