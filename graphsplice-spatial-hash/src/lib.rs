//! A fixed-capacity, byte-packed spatial index over (latitude, longitude) points.
//!
//! Keys are produced by [`SpatialKeyAlgo`]'s bit-interleaved encoding, bucketed by a
//! compressed XOR of two sub-ranges of that key, and chained into neighboring
//! buckets' tail space on overflow rather than resized. See [`SpatialHashTableConfig`]
//! for the tunables and [`SpatialHashTable`] for the table itself.

mod config;
mod error;
mod spatial_key;
mod table;

pub use config::SpatialHashTableConfig;
pub use error::SpatialHashError;
pub use spatial_key::SpatialKeyAlgo;
pub use table::SpatialHashTable;
