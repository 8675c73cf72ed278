//! The byte-packed bucket table itself: insertion with overflow chaining, key lookup,
//! and region (quadtree-descent) lookup over a single flat `Vec<u8>` buffer.

use crate::config::{SpatialHashLayout, SpatialHashTableConfig, OVERFLOW_SCAN_LIMIT};
use crate::error::SpatialHashError;
use crate::spatial_key::SpatialKeyAlgo;
use graphsplice_core::{BBox, Shape};
use tracing::{debug, trace, warn};

/// The largest offset representable in a single overflow offset+stopbit byte
/// (`offset << 1 | stopbit` must fit in `u8`, leaving 7 bits for `offset`).
const MAX_OVERFLOW_OFFSET: u32 = 127;

/// A fixed-capacity, byte-packed spatial index: `(lat, lon) -> value` entries bucketed
/// by a compressed spatial key, with in-bucket overflow chaining rather than resizing.
///
/// Built via [`SpatialHashTableConfig::build`]; there is no public constructor here,
/// mirroring the base graph tile format's own builder-then-freeze shape.
pub struct SpatialHashTable {
    config: SpatialHashTableConfig,
    layout: SpatialHashLayout,
    key_algo: SpatialKeyAlgo,
    buffer: Vec<u8>,
    size: usize,
}

impl SpatialHashTable {
    pub(crate) fn from_layout(config: SpatialHashTableConfig, layout: SpatialHashLayout, key_algo: SpatialKeyAlgo) -> Self {
        let buffer = vec![0u8; layout.max_buckets * layout.bytes_per_bucket];
        debug!(
            max_buckets = layout.max_buckets,
            bytes_per_bucket = layout.bytes_per_bucket,
            bytes_per_entry = layout.bytes_per_entry,
            "spatial hash table allocated"
        );
        Self { config, layout, key_algo, buffer, size: 0 }
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.layout.max_buckets
    }

    /// Number of entries inserted so far (duplicates included).
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn memory_usage_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drops all entries and resets the buffer to its freshly-built state.
    pub fn clear(&mut self) {
        self.buffer.fill(0);
        self.size = 0;
    }

    /// Inserts `value` at `(lat, lon)`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialHashError::ConfigError`] if `value.len()` does not match the
    /// configured `bytes_per_value`, or [`SpatialHashError::TableFull`] if no overflow
    /// slot could be found within the scan bound.
    pub fn insert(&mut self, lat: f64, lon: f64, value: &[u8]) -> Result<(), SpatialHashError> {
        let key = self.key_algo.encode(lat, lon);
        self.insert_key(key, value)
    }

    /// Inserts `value` under a precomputed spatial key. See [`Self::insert`].
    ///
    /// # Errors
    ///
    /// See [`Self::insert`].
    pub fn insert_key(&mut self, key: u64, value: &[u8]) -> Result<(), SpatialHashError> {
        if value.len() != usize::from(self.config.bytes_per_value) {
            return Err(SpatialHashError::ConfigError(format!(
                "value is {} bytes, expected {}",
                value.len(),
                self.config.bytes_per_value
            )));
        }

        let (bi, stored_key) = self.bucket_index_and_stored_key(key);
        let (n, full) = self.read_header(bi);

        if full {
            self.append_overflow(bi, stored_key, value)?;
        } else {
            let o = self.count_overflow_entries(bi);
            let n_usize = usize::try_from(n).expect("fits usize");
            let needed = 1 + (n_usize + 1) * self.layout.bytes_per_entry + o * self.layout.bytes_per_overflow_entry;
            if needed <= self.layout.bytes_per_bucket {
                let offset = self.forward_entry_offset(bi, n_usize);
                self.write_entry(offset, stored_key, value);
                self.write_header(bi, n + 1, false);
            } else {
                self.write_header(bi, n, true);
                self.append_overflow(bi, stored_key, value)?;
            }
        }

        self.size += 1;
        Ok(())
    }

    /// All entries whose spatial key equals `key` exactly.
    #[must_use]
    pub fn get_by_key(&self, key: u64) -> Vec<(f64, f64, Vec<u8>)> {
        let (bi, stored_key) = self.bucket_index_and_stored_key(key);
        let mut out = Vec::new();
        self.for_each_entry_in_bucket(bi, |sk, value| {
            if sk == stored_key {
                out.push(self.decode_entry(bi, sk, value));
            }
        });
        out
    }

    /// All entries whose decoded coordinate falls within `shape`, found by recursive
    /// quadtree descent over the key space rather than a full bucket scan.
    #[must_use]
    pub fn get_nodes(&self, shape: &Shape) -> Vec<(f64, f64, Vec<u8>)> {
        let world = BBox::new(90.0, 180.0, -90.0, -180.0);
        let mut out = Vec::new();
        let mut visited = vec![false; self.layout.max_buckets];
        self.descend(world, 0, 0, shape, &mut visited, &mut out);
        out
    }

    /// Convenience wrapper over [`Self::get_nodes`] for a circular region.
    #[must_use]
    pub fn get_nodes_in_circle(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<(f64, f64, Vec<u8>)> {
        let shape = Shape::Circle(graphsplice_core::Circle::new(lat, lon, radius_km * 1000.0));
        self.get_nodes(&shape)
    }

    fn unused_prefix_bits(&self) -> u32 {
        2 * self.layout.bucket_index_bits + self.config.skip_key_beginning_bits
    }

    fn descend(&self, bbox: BBox, depth: u32, prefix: u64, shape: &Shape, visited: &mut [bool], out: &mut Vec<(f64, f64, Vec<u8>)>) {
        if !shape.intersects_bbox(&bbox) {
            return;
        }

        if depth >= self.unused_prefix_bits() {
            let bi = self.bucket_index_from_prefix(prefix, depth);
            if visited[bi] {
                return;
            }
            visited[bi] = true;

            self.for_each_entry_in_bucket(bi, |sk, value| {
                let (lat, lon, value) = self.decode_entry(bi, sk, value);
                if shape.contains(lat, lon) {
                    out.push((lat, lon, value));
                }
            });
            return;
        }

        for (tag, child_bbox) in bbox.quadrants() {
            let child_prefix = (prefix << 2) | u64::from(tag);
            self.descend(child_bbox, depth + 2, child_prefix, shape, visited, out);
        }
    }

    /// Recovers a bucket index from a quadtree prefix once descent has gone deep
    /// enough to pin down one bucket; only the top bits of `prefix` (as many as
    /// `depth`) are meaningful.
    fn bucket_index_from_prefix(&self, prefix: u64, depth: u32) -> usize {
        // The prefix bits, read MSB-first, are exactly the high bits of a spatial key
        // as `SpatialKeyAlgo::encode` would produce them (each quadrant split emits the
        // same `(lat-half, lon-half)` bit pair). Left-align them into a full-width key
        // so `bucket_index_and_stored_key` sees the same bit positions it would for a
        // directly encoded point.
        let key = prefix << (self.key_algo.bits().saturating_sub(depth));
        let (bi, _) = self.bucket_index_and_stored_key(key);
        // `bi` is an XOR of two bucket-index-bits-wide fields, so it is always
        // < max_buckets; anything else is a configuration-math bug, not bad input.
        debug_assert!(bi < self.layout.max_buckets, "bucket index out of range: a configuration bug");
        bi
    }

    fn bucket_index_and_stored_key(&self, spatial_key: u64) -> (usize, u64) {
        if self.layout.compressed {
            let key64 = spatial_key << (64 - self.key_algo.bits());
            let bib = self.layout.bucket_index_bits;
            let skip = self.config.skip_key_beginning_bits;

            let head = extract_bits(key64, 0, skip);
            let x = extract_bits(key64, skip, bib);
            let y = extract_bits(key64, skip + bib, bib);
            let tail_width = self.config.spatial_key_bits.saturating_sub(skip + 2 * bib);
            let tail = extract_bits(key64, skip + 2 * bib, tail_width);

            let bucket_index = usize::try_from(x ^ y).expect("bucket index fits usize");
            // storedKey drops only the Y field (recoverable as bucketIndex ^ X); the
            // skipped leading bits are real key data and must still round-trip, so they
            // ride along packed above X.
            let stored_key = safe_shl(head, bib + tail_width) | safe_shl(x, tail_width) | tail;
            (bucket_index, stored_key)
        } else {
            let divisor = u64::try_from(self.layout.max_buckets - 1).unwrap_or(1).max(1);
            let bucket_index = usize::try_from(spatial_key % divisor).expect("bucket index fits usize");
            (bucket_index, spatial_key)
        }
    }

    fn decode_entry(&self, bucket: usize, stored_key: u64, value: Vec<u8>) -> (f64, f64, Vec<u8>) {
        let spatial_key = self.reconstruct_spatial_key(bucket, stored_key);
        let (lat, lon) = self.key_algo.decode(spatial_key);
        (lat, lon, value)
    }

    fn reconstruct_spatial_key(&self, bucket: usize, stored_key: u64) -> u64 {
        if !self.layout.compressed {
            return stored_key;
        }

        let bib = self.layout.bucket_index_bits;
        let skip = self.config.skip_key_beginning_bits;
        let tail_width = self.config.spatial_key_bits.saturating_sub(skip + 2 * bib);

        let tail = stored_key & low_bits_mask(tail_width);
        let x = safe_shr(stored_key, tail_width) & low_bits_mask(bib);
        let head = safe_shr(stored_key, tail_width + bib);
        let bucket_index = u64::try_from(bucket).expect("bucket index fits u64");
        let y = bucket_index ^ x;

        let key64 = safe_shl(head, 64 - skip)
            | safe_shl(x, 64 - skip - bib)
            | safe_shl(y, 64 - skip - 2 * bib)
            | safe_shl(tail, (64 - skip - 2 * bib).saturating_sub(tail_width));
        safe_shr(key64, 64 - self.key_algo.bits())
    }

    // --- header / entry bit layout -----------------------------------------------

    fn bucket_offset(&self, bi: usize) -> usize {
        bi * self.layout.bytes_per_bucket
    }

    fn read_header(&self, bi: usize) -> (u32, bool) {
        let header = self.buffer[self.bucket_offset(bi)];
        (u32::from(header >> 1), header & 1 == 1)
    }

    fn write_header(&mut self, bi: usize, n: u32, full: bool) {
        let capped = n.min(self.layout.max_entries_per_bucket);
        let n_byte = u8::try_from(capped).expect("entry count fits u8 (capped at max_entries_per_bucket)");
        let header = (n_byte << 1) | u8::from(full);
        self.buffer[self.bucket_offset(bi)] = header;
    }

    fn forward_entry_offset(&self, bi: usize, slot: usize) -> usize {
        self.bucket_offset(bi) + 1 + slot * self.layout.bytes_per_entry
    }

    fn overflow_slot_offset(&self, bi: usize, slot_from_tail: usize) -> usize {
        self.bucket_offset(bi) + self.layout.bytes_per_bucket - (slot_from_tail + 1) * self.layout.bytes_per_overflow_entry
    }

    fn max_overflow_slots(&self) -> usize {
        (self.layout.bytes_per_bucket - 1) / self.layout.bytes_per_overflow_entry
    }

    /// Counts the overflow slots currently occupied in `bi`'s tail, regardless of
    /// which bucket owns each one. Slots are always filled contiguously from the
    /// tail inward, so the scan stops at the first all-zero offset byte.
    fn count_overflow_entries(&self, bi: usize) -> usize {
        let mut count = 0;
        for slot in 0..self.max_overflow_slots() {
            if self.buffer[self.overflow_slot_offset(bi, slot)] == 0 {
                break;
            }
            count += 1;
        }
        count
    }

    fn write_entry(&mut self, offset: usize, stored_key: u64, value: &[u8]) {
        write_be(&mut self.buffer, offset, self.layout.bytes_per_key_rest, stored_key);
        self.buffer[offset + self.layout.bytes_per_key_rest..offset + self.layout.bytes_per_entry].copy_from_slice(value);
    }

    fn read_entry(&self, offset: usize) -> (u64, Vec<u8>) {
        let stored_key = read_be(&self.buffer, offset, self.layout.bytes_per_key_rest);
        let value = self.buffer[offset + self.layout.bytes_per_key_rest..offset + self.layout.bytes_per_entry].to_vec();
        (stored_key, value)
    }

    fn for_each_entry_in_bucket<F: FnMut(u64, Vec<u8>)>(&self, bi: usize, mut f: F) {
        let (n, full) = self.read_header(bi);
        for slot in 0..usize::try_from(n).expect("fits usize") {
            let (sk, value) = self.read_entry(self.forward_entry_offset(bi, slot));
            f(sk, value);
        }
        if full {
            self.for_each_overflow_entry_of(bi, &mut f);
        }
    }

    fn effective_scan_limit(&self) -> u32 {
        OVERFLOW_SCAN_LIMIT.min(MAX_OVERFLOW_OFFSET).min(u32::try_from(self.layout.max_buckets.saturating_sub(1)).unwrap_or(u32::MAX))
    }

    /// Walks every overflow entry owned by `owner`, across subsequent buckets.
    ///
    /// An owner's overflow entries are appended with non-decreasing distance from the
    /// owner bucket (tail capacity only ever shrinks, so a later insert can never land
    /// closer than an earlier one did); the entry with `stopbit = 1` is therefore
    /// always the furthest, and scanning can stop as soon as it is found.
    fn for_each_overflow_entry_of<F: FnMut(u64, Vec<u8>)>(&self, owner: usize, f: &mut F) {
        let max_buckets = self.layout.max_buckets;
        let scan_limit = self.effective_scan_limit();

        for step in 1..=scan_limit {
            let bj = (owner + usize::try_from(step).expect("fits usize")) % max_buckets;
            let occupied = self.count_overflow_entries(bj);
            let mut found_tail = false;

            for slot in 0..occupied {
                let offset_byte = self.buffer[self.overflow_slot_offset(bj, slot)];
                let offset = u32::from(offset_byte >> 1);
                let stop = offset_byte & 1 == 1;
                if offset == step {
                    let (sk, value) = self.read_entry(self.overflow_slot_offset(bj, slot) + 1);
                    f(sk, value);
                    if stop {
                        found_tail = true;
                    }
                }
            }

            if found_tail {
                break;
            }
        }
    }

    /// Appends a new overflow entry owned by `owner`, clearing the previous tail's
    /// stopbit if one exists.
    fn append_overflow(&mut self, owner: usize, stored_key: u64, value: &[u8]) -> Result<(), SpatialHashError> {
        let max_buckets = self.layout.max_buckets;
        let scan_limit = self.effective_scan_limit();

        let mut tail: Option<(usize, usize)> = None;
        let mut free: Option<(usize, u32)> = None;

        for step in 1..=scan_limit {
            let bj = (owner + usize::try_from(step).expect("fits usize")) % max_buckets;
            let occupied = self.count_overflow_entries(bj);

            for slot in 0..occupied {
                let offset_byte = self.buffer[self.overflow_slot_offset(bj, slot)];
                let offset = u32::from(offset_byte >> 1);
                let stop = offset_byte & 1 == 1;
                if offset == step && stop {
                    tail = Some((bj, slot));
                }
            }

            if free.is_none() {
                let (n, _) = self.read_header(bj);
                let needed = 1
                    + usize::try_from(n).expect("fits usize") * self.layout.bytes_per_entry
                    + (occupied + 1) * self.layout.bytes_per_overflow_entry;
                if needed <= self.layout.bytes_per_bucket {
                    free = Some((bj, step));
                }
            }
        }

        let Some((free_bucket, free_step)) = free else {
            warn!(owner, "spatial hash table overflow scan exhausted");
            return Err(SpatialHashError::TableFull);
        };

        if let Some((tb, tslot)) = tail {
            let off = self.overflow_slot_offset(tb, tslot);
            self.buffer[off] &= 0xFE;
        }

        let occupied_at_free = self.count_overflow_entries(free_bucket);
        let slot_offset = self.overflow_slot_offset(free_bucket, occupied_at_free);
        let offset_byte = u8::try_from(free_step).expect("step is bounded by MAX_OVERFLOW_OFFSET") << 1 | 1;
        self.buffer[slot_offset] = offset_byte;
        self.write_entry(slot_offset + 1, stored_key, value);

        trace!(owner, bucket = free_bucket, step = free_step, "overflow entry placed");
        Ok(())
    }
}

/// `value << shift`, treating a shift of 64 or more as shifting everything out (`0`)
/// rather than panicking — `skip_key_beginning_bits == 0` (the default) routinely drives
/// one of these shifts to exactly 64.
fn safe_shl(value: u64, shift: u32) -> u64 {
    if shift >= 64 {
        0
    } else {
        value << shift
    }
}

/// `value >> shift`, treating a shift of 64 or more as `0` rather than panicking. See
/// [`safe_shl`].
fn safe_shr(value: u64, shift: u32) -> u64 {
    if shift >= 64 {
        0
    } else {
        value >> shift
    }
}

/// A mask selecting the low `width` bits of a right-aligned value (`0` for `width == 0`).
fn low_bits_mask(width: u32) -> u64 {
    if width == 0 {
        0
    } else if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn extract_bits(value: u64, start_from_msb: u32, width: u32) -> u64 {
    if width == 0 {
        return 0;
    }
    if width >= 64 {
        return value;
    }
    let shift = 64 - start_from_msb - width;
    (value >> shift) & ((1u64 << width) - 1)
}

fn read_be(buf: &[u8], offset: usize, width: usize) -> u64 {
    let mut value = 0u64;
    for &byte in &buf[offset..offset + width] {
        value = (value << 8) | u64::from(byte);
    }
    value
}

#[allow(clippy::cast_possible_truncation)] // each extracted byte is masked to 0xFF
fn write_be(buf: &mut [u8], offset: usize, width: usize, value: u64) {
    for i in 0..width {
        let shift = 8 * (width - 1 - i);
        buf[offset + i] = ((value >> shift) & 0xFF) as u8;
    }
}
