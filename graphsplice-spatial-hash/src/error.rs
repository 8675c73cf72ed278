use thiserror::Error;

/// Failures raised by [`crate::SpatialHashTableConfig::build`] and
/// [`crate::SpatialHashTable`].
#[derive(Debug, Error)]
pub enum SpatialHashError {
    /// The configured `skipKeyBeginningBits` leaves no room for the bucket index
    /// fields within the key width, or `bytesPerValue` is outside `1..=8`.
    #[error("spatial hash table misconfigured: {0}")]
    ConfigError(String),

    /// An insert could not find a free overflow slot within the scan bound.
    ///
    /// The table remains consistent for reads; this entry was not stored.
    #[error("spatial hash table is full (overflow scan exhausted)")]
    TableFull,
}
