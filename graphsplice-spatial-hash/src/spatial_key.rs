//! Bit-interleaved geo-spatial key encoding.
//!
//! Recursively bisects the lat/lon range, emitting one `(lon-half, lat-half)` bit pair
//! per level, most significant level first. This is the same quadrant-descent scheme
//! `BBox::quadrants` tags with its `0b10`/`0b11`/`0b00`/`0b01` bit pattern, applied at
//! `bits / 2` levels instead of one.

const MIN_LAT: f64 = -90.0;
const MAX_LAT: f64 = 90.0;
const MIN_LON: f64 = -180.0;
const MAX_LON: f64 = 180.0;

/// Encodes and decodes lat/lon pairs into fixed-width spatial keys.
///
/// `bits` must be even (one bit each for the lon and lat half at every level) and no
/// more than 64, since keys are carried in a `u64`.
#[derive(Debug, Clone, Copy)]
pub struct SpatialKeyAlgo {
    bits: u32,
}

impl SpatialKeyAlgo {
    /// # Panics
    ///
    /// Panics if `bits` is zero, odd, or greater than 64.
    #[must_use]
    pub fn new(bits: u32) -> Self {
        assert!(bits > 0 && bits <= 64 && bits % 2 == 0, "spatial key bits must be even and in 1..=64");
        Self { bits }
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    fn levels(&self) -> u32 {
        self.bits / 2
    }

    /// Encodes a coordinate into a `bits`-wide key (stored in the low `bits` bits of
    /// the returned `u64`).
    #[must_use]
    pub fn encode(&self, lat: f64, lon: f64) -> u64 {
        let mut min_lat = MIN_LAT;
        let mut max_lat = MAX_LAT;
        let mut min_lon = MIN_LON;
        let mut max_lon = MAX_LON;
        let mut key: u64 = 0;

        // `by` (lat half) lands in the higher bit of each level's pair, `bx` (lon
        // half) in the lower bit — the same order `BBox::quadrants` tags its four
        // children with (`0b10`/`0b11`/`0b00`/`0b01`, high bit = north/south).
        for _ in 0..self.levels() {
            let mid_lat = (min_lat + max_lat) / 2.0;
            let by = if lat > mid_lat {
                min_lat = mid_lat;
                1
            } else {
                max_lat = mid_lat;
                0
            };
            key = (key << 1) | by;

            let mid_lon = (min_lon + max_lon) / 2.0;
            let bx = if lon > mid_lon {
                min_lon = mid_lon;
                1
            } else {
                max_lon = mid_lon;
                0
            };
            key = (key << 1) | bx;
        }

        key
    }

    /// Decodes a key back to the center of the quadrant it names.
    ///
    /// This is necessarily lossy: see [`Self::decoding_error_radius_meters`] for the
    /// maximum distance between the original point and this center.
    #[must_use]
    pub fn decode(&self, key: u64) -> (f64, f64) {
        let mut min_lat = MIN_LAT;
        let mut max_lat = MAX_LAT;
        let mut min_lon = MIN_LON;
        let mut max_lon = MAX_LON;

        for level in 0..self.levels() {
            let shift = self.bits - 2 * (level + 1);
            let by = (key >> (shift + 1)) & 1;
            let bx = (key >> shift) & 1;

            let mid_lon = (min_lon + max_lon) / 2.0;
            if bx == 1 {
                min_lon = mid_lon;
            } else {
                max_lon = mid_lon;
            }

            let mid_lat = (min_lat + max_lat) / 2.0;
            if by == 1 {
                min_lat = mid_lat;
            } else {
                max_lat = mid_lat;
            }
        }

        ((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0)
    }

    fn max_lat_error_degrees(&self) -> f64 {
        90.0 / 2f64.powi(i32::try_from(self.levels()).expect("level count fits i32"))
    }

    fn max_lon_error_degrees(&self) -> f64 {
        180.0 / 2f64.powi(i32::try_from(self.levels()).expect("level count fits i32"))
    }

    /// An upper bound on the distance between a point and the center `decode` returns
    /// for its key, at the given latitude (longitude degrees shrink toward the poles).
    ///
    /// Uses the same meters-per-degree approximation the base graph's own distance
    /// helpers use, rather than a full great-circle computation, since this bound only
    /// needs to be conservative, not exact.
    #[must_use]
    pub fn decoding_error_radius_meters(&self, at_lat_degrees: f64) -> f64 {
        const METERS_PER_LAT_DEGREE: f64 = 111_132.954;
        let meters_per_lon_degree = METERS_PER_LAT_DEGREE * at_lat_degrees.to_radians().cos().abs();

        let lat_error_m = self.max_lat_error_degrees() * METERS_PER_LAT_DEGREE;
        let lon_error_m = self.max_lon_error_degrees() * meters_per_lon_degree;
        lat_error_m.hypot(lon_error_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_of_encode_is_within_the_error_radius() {
        let algo = SpatialKeyAlgo::new(56);
        let (lat, lon) = (47.6062, -122.3321);
        let key = algo.encode(lat, lon);
        let (dlat, dlon) = algo.decode(key);

        assert!((lat - dlat).abs() < algo.max_lat_error_degrees());
        assert!((lon - dlon).abs() < algo.max_lon_error_degrees());
    }

    #[test]
    fn encode_is_deterministic_and_order_preserving_per_axis() {
        let algo = SpatialKeyAlgo::new(56);
        let a = algo.encode(10.0, 10.0);
        let b = algo.encode(10.0, 10.0);
        assert_eq!(a, b);

        let north = algo.encode(20.0, 10.0);
        let south = algo.encode(-20.0, 10.0);
        assert_ne!(north, south);
    }

    #[test]
    fn smaller_bit_widths_decode_to_coarser_quadrants() {
        let coarse = SpatialKeyAlgo::new(8);
        let fine = SpatialKeyAlgo::new(56);
        assert!(coarse.decoding_error_radius_meters(45.0) > fine.decoding_error_radius_meters(45.0));
    }

    #[test]
    #[should_panic(expected = "even")]
    fn odd_bit_width_panics() {
        SpatialKeyAlgo::new(7);
    }

    proptest::proptest! {
        /// Oracle: decode(encode(lat, lon)) must land within the claimed error radius
        /// of the original point, for any coordinate in the valid WGS-84 range.
        #[test]
        fn decode_of_encode_is_always_within_the_claimed_error_bound(
            lat in -90.0f64..90.0,
            lon in -180.0f64..180.0,
        ) {
            let algo = SpatialKeyAlgo::new(56);
            let (dlat, dlon) = algo.decode(algo.encode(lat, lon));
            prop_assert!((lat - dlat).abs() <= algo.max_lat_error_degrees());
            prop_assert!((lon - dlon).abs() <= algo.max_lon_error_degrees());
        }
    }
}
