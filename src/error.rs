//! Error types for territory generation and simulation

use thiserror::Error;

use crate::faction::FactionId;
use crate::region::RegionId;

/// Errors that can occur while generating or driving a territory
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TerritoryError {
    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generation failed in a way relaxation cannot recover from
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// A Voronoi cell collapsed to (near) zero area
    ///
    /// Raised by the tessellation for duplicate seeds or seeds lying outside
    /// the bounds. The relaxation driver perturbs `seed` and retries.
    #[error("degenerate cell for seed {seed}")]
    DegenerateCell { seed: usize },

    /// A caller command was rejected before anything was mutated
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Requested region ID does not exist
    #[error("region not found: {0}")]
    RegionNotFound(RegionId),

    /// Requested faction ID does not exist (or was dissolved)
    #[error("faction not found: {0}")]
    FactionNotFound(FactionId),

    /// Membership bookkeeping would violate exclusive ownership
    #[error("membership conflict: {0}")]
    MembershipConflict(String),
}

/// Result type alias for territory operations
pub type Result<T> = std::result::Result<T, TerritoryError>;
