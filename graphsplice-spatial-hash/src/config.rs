//! Construction-time configuration and the bucket layout math derived from it.
//!
//! Mirrors the builder-validates-then-freezes shape the base graph tile format uses
//! for its own header (`GraphTileHeaderBuilder::build`): a config struct collects
//! tunables, `build` derives and range-checks the rest, and only a valid, immutable
//! layout is ever handed to the table itself.

use crate::error::SpatialHashError;
use crate::spatial_key::SpatialKeyAlgo;
use crate::table::SpatialHashTable;

/// Tunables for a [`SpatialHashTable`]; everything else (bucket count, entry width,
/// bucket width, ...) is derived from these plus the requested capacity in
/// [`SpatialHashTableConfig::build`].
#[derive(Debug, Clone, Copy)]
pub struct SpatialHashTableConfig {
    pub skip_key_beginning_bits: u32,
    pub max_entries_per_bucket: u32,
    pub bytes_per_value: u8,
    pub spatial_key_bits: u32,
    pub compressed: bool,
}

impl Default for SpatialHashTableConfig {
    fn default() -> Self {
        Self {
            skip_key_beginning_bits: 0,
            max_entries_per_bucket: 3,
            bytes_per_value: 4,
            spatial_key_bits: 56,
            compressed: true,
        }
    }
}

/// The bucket-layout quantities derived from a [`SpatialHashTableConfig`] and a
/// requested capacity. Frozen once built; every byte offset the table computes comes
/// from these fields.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpatialHashLayout {
    pub max_buckets: usize,
    pub bucket_index_bits: u32,
    pub bytes_per_key_rest: usize,
    pub skip_key_end_bits: u32,
    pub bytes_per_entry: usize,
    pub bytes_per_overflow_entry: usize,
    pub bytes_per_bucket: usize,
    pub max_entries_per_bucket: u32,
    pub compressed: bool,
}

/// Overflow-scan bound: a literal cutoff, not scaled with `maxBuckets`. Preserved as a
/// fixed constant rather than derived, matching the source's own unconditional 200.
pub(crate) const OVERFLOW_SCAN_LIMIT: u32 = 200;

fn adjust_max_entries_per_bucket(initial: u32) -> u32 {
    if initial < 5 {
        initial + 1
    } else if initial < 8 {
        initial + 2
    } else {
        // initial * 1.25, computed in integer arithmetic to keep clippy's cast lints
        // (denied at the workspace level) out of a function with no float involved.
        initial.saturating_mul(5).div_ceil(4)
    }
}

impl SpatialHashTableConfig {
    /// Validates this configuration against a target capacity and freezes the derived
    /// bucket layout into a ready-to-use [`SpatialHashTable`].
    ///
    /// # Errors
    ///
    /// Returns [`SpatialHashError::ConfigError`] if `bytes_per_value` is outside
    /// `1..=8`, if `spatial_key_bits` is not even and in `1..=64`, or if
    /// `skip_key_beginning_bits` leaves no room for `skip_key_end_bits` to be
    /// non-negative at the derived bucket-index width.
    pub fn build(self, max_entries: usize) -> Result<SpatialHashTable, SpatialHashError> {
        if !(1..=8).contains(&self.bytes_per_value) {
            return Err(SpatialHashError::ConfigError(format!(
                "bytes_per_value must be in 1..=8, got {}",
                self.bytes_per_value
            )));
        }
        if self.spatial_key_bits == 0 || self.spatial_key_bits > 64 || self.spatial_key_bits % 2 != 0 {
            return Err(SpatialHashError::ConfigError(format!(
                "spatial_key_bits must be even and in 1..=64, got {}",
                self.spatial_key_bits
            )));
        }

        let max_entries_per_bucket = adjust_max_entries_per_bucket(self.max_entries_per_bucket);
        let max_entries_per_bucket_usize = usize::try_from(max_entries_per_bucket).expect("fits usize");
        let wanted_buckets = max_entries.max(1).div_ceil(max_entries_per_bucket_usize.max(1));
        let max_buckets = wanted_buckets.max(1).next_power_of_two();
        let bucket_index_bits = max_buckets.ilog2();

        let min_key_bits = if self.compressed { 2 * bucket_index_bits } else { bucket_index_bits };
        if self.spatial_key_bits < min_key_bits {
            return Err(SpatialHashError::ConfigError(format!(
                "spatial_key_bits ({}) is too narrow for a bucket index of {} bits",
                self.spatial_key_bits, bucket_index_bits
            )));
        }

        let skip_and_index_bits = self.skip_key_beginning_bits + 2 * bucket_index_bits;
        if skip_and_index_bits > 64 {
            return Err(SpatialHashError::ConfigError(format!(
                "skip_key_beginning_bits ({}) leaves no room for a {}-bit bucket index within a 64-bit key",
                self.skip_key_beginning_bits, bucket_index_bits
            )));
        }
        let skip_key_end_bits = 64 - skip_and_index_bits;

        // With compression, storedKey drops the beginning skip, the bucket-index bits
        // themselves, and the Y field (recoverable as bucketIndex ^ X) — leaving
        // `spatialKeyBits - bucketIndexBits` bits of real information. Without it, the
        // whole key is stored.
        let key_storage_bits = if self.compressed { self.spatial_key_bits - bucket_index_bits } else { self.spatial_key_bits };
        let bytes_per_key_rest = usize::try_from(key_storage_bits.div_ceil(8)).expect("fits usize");

        let bytes_per_value = usize::from(self.bytes_per_value);
        let bytes_per_entry = bytes_per_key_rest + bytes_per_value;
        let bytes_per_overflow_entry = bytes_per_entry + 1;
        let bytes_per_bucket = 1 + max_entries_per_bucket_usize * bytes_per_entry;

        let layout = SpatialHashLayout {
            max_buckets,
            bucket_index_bits,
            bytes_per_key_rest,
            skip_key_end_bits,
            bytes_per_entry,
            bytes_per_overflow_entry,
            bytes_per_bucket,
            max_entries_per_bucket,
            compressed: self.compressed,
        };

        Ok(SpatialHashTable::from_layout(self, layout, SpatialKeyAlgo::new(self.spatial_key_bits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_max_entries_matches_each_named_band() {
        assert_eq!(adjust_max_entries_per_bucket(3), 4);
        assert_eq!(adjust_max_entries_per_bucket(6), 8);
        assert_eq!(adjust_max_entries_per_bucket(8), 10);
        assert_eq!(adjust_max_entries_per_bucket(100), 125);
    }

    #[test]
    fn build_rejects_out_of_range_bytes_per_value() {
        let config = SpatialHashTableConfig { bytes_per_value: 9, ..SpatialHashTableConfig::default() };
        assert!(matches!(config.build(1000), Err(SpatialHashError::ConfigError(_))));
    }

    #[test]
    fn build_rejects_skip_bits_that_overflow_the_key_width() {
        let config = SpatialHashTableConfig { skip_key_beginning_bits: 60, ..SpatialHashTableConfig::default() };
        assert!(matches!(config.build(1_000_000), Err(SpatialHashError::ConfigError(_))));
    }

    #[test]
    fn build_derives_a_power_of_two_bucket_count() {
        let table = SpatialHashTableConfig::default().build(1000).unwrap();
        assert!(table.bucket_count().is_power_of_two());
    }
}
