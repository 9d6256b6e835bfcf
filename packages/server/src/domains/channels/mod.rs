//! Channel directory: registration, normalization, resolution.

pub mod directory;
pub mod model;
pub mod reference;

pub use directory::{
    resolve_if_needed, ChannelDirectory, PgChannelDirectory, RegisterError, Resolution,
};
pub use model::{Channel, ChannelStatus};
pub use reference::{normalize_reference, InvalidReference};
