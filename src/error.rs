//! Error types for weapon setup and wire decoding.
//!
//! Per-tick simulation never fails: invalid actions are ignored or turned
//! into a dry fire. Only setup paths return these errors.

use thiserror::Error;

use crate::resources::WeaponId;

/// Errors raised while building catalogs or decoding network traffic.
#[derive(Error, Debug)]
pub enum GunplayError {
    /// Catalog text could not be parsed.
    #[error("failed to parse weapon catalog: {0}")]
    CatalogParse(#[from] ron::error::SpannedError),

    /// A definition has values the simulation cannot run with.
    #[error("invalid weapon definition `{name}`: {reason}")]
    InvalidDefinition {
        /// Definition name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Lookup of an id that is not in the catalog.
    #[error("unknown weapon id {0:?}")]
    UnknownWeapon(WeaponId),

    /// Two definitions share a name.
    #[error("duplicate weapon definition `{0}`")]
    DuplicateWeapon(String),

    /// The catalog cannot hold more definitions.
    #[error("weapon catalog is full")]
    CatalogFull,

    /// A network payload could not be decoded.
    #[cfg(feature = "netcode")]
    #[error("failed to decode network message: {0}")]
    Decode(#[from] bincode::Error),
}

/// Result type for fallible setup operations.
pub type GunplayResult<T> = Result<T, GunplayError>;
