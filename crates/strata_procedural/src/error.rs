//! # Generation Error Types
//!
//! All errors that can occur while generating biome grids or running a
//! population pass.

use strata_core::PoolError;
use thiserror::Error;

/// Errors that can occur in world generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    /// A generation id produced by the layer chain has no registered biome.
    #[error("biome not found: no biome registered for generation id {generation_id}")]
    BiomeNotFound {
        /// The unregistered generation id.
        generation_id: i32,
    },

    /// The scratch buffer pool had no free slot.
    #[error("array pool exhausted: all {capacity} slots are in use")]
    ResourceExhausted {
        /// Total number of pool slots.
        capacity: usize,
    },

    /// Population start/end called in the wrong state.
    #[error("invalid population state: {0}")]
    InvalidState(String),

    /// Write to a block that is not loaded for the caller.
    #[error("block ({x}, {y}, {z}) is not loaded")]
    OutOfBounds {
        /// Block x.
        x: i32,
        /// Block y.
        y: i32,
        /// Block z.
        z: i32,
    },

    /// The chunk store could not provide a chunk for the population window.
    #[error("chunk ({x}, {z}) is unavailable")]
    ChunkUnavailable {
        /// Chunk x.
        x: i32,
        /// Chunk z.
        z: i32,
    },

    /// Invalid configuration (biomes, layer chain, or TOML).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<PoolError> for GenError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ResourceExhausted { capacity } => Self::ResourceExhausted { capacity },
        }
    }
}

impl From<toml::de::Error> for GenError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Result type for generation operations.
pub type GenResult<T> = Result<T, GenError>;
