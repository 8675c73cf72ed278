//! Bounding boxes and simple shapes used by region queries against the base graph
//! and the spatial hash table's quadtree descent.

use geo::{Destination, Distance, Haversine, Point};

/// An axis-aligned bounding box in (north, east, south, west) order, matching the
/// convention used throughout the base graph and spatial index for lat/lon extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
}

impl BBox {
    #[must_use]
    pub fn new(north: f64, east: f64, south: f64, west: f64) -> Self {
        Self { north, east, south, west }
    }

    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat <= self.north && lat >= self.south && lon >= self.west && lon <= self.east
    }

    /// Whether `self` and `other` share any area, including touching edges.
    #[must_use]
    pub fn intersects(&self, other: &BBox) -> bool {
        self.west <= other.east && self.east >= other.west && self.south <= other.north && self.north >= other.south
    }

    /// The four child quadrants produced by bisecting both axes, in the bit order
    /// the spatial hash table's quadtree descent expects: `10` (NW), `11` (NE),
    /// `00` (SW), `01` (SE), each tagged with the two bits appended to the prefix.
    #[must_use]
    pub fn quadrants(&self) -> [(u8, BBox); 4] {
        let mid_lat = (self.north + self.south) / 2.0;
        let mid_lon = (self.east + self.west) / 2.0;

        [
            (0b10, BBox::new(self.north, mid_lon, mid_lat, self.west)),
            (0b11, BBox::new(self.north, self.east, mid_lat, mid_lon)),
            (0b00, BBox::new(mid_lat, mid_lon, self.south, self.west)),
            (0b01, BBox::new(mid_lat, self.east, self.south, mid_lon)),
        ]
    }
}

/// A circular search region, as used by `SpatialHashTable::get_nodes(lat, lon, radius)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_meters: f64,
}

impl Circle {
    #[must_use]
    pub fn new(center_lat: f64, center_lon: f64, radius_meters: f64) -> Self {
        Self { center_lat, center_lon, radius_meters }
    }

    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let center = Point::new(self.center_lon, self.center_lat);
        let candidate = Point::new(lon, lat);
        Haversine.distance(center, candidate) <= self.radius_meters
    }

    /// A conservative bounding box fully containing the circle.
    #[must_use]
    pub fn bounding_box(&self) -> BBox {
        let center = Point::new(self.center_lon, self.center_lat);
        let north = Haversine.destination(center, 0.0, self.radius_meters).y();
        let east = Haversine.destination(center, 90.0, self.radius_meters).x();
        let south = Haversine.destination(center, 180.0, self.radius_meters).y();
        let west = Haversine.destination(center, 270.0, self.radius_meters).x();
        BBox::new(north, east, south, west)
    }
}

/// A region that can be queried against the spatial hash table: either a bounding
/// box or a circle. Both know how to test a decoded `(lat, lon)` point and produce
/// a conservative bounding box for quadtree pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    BBox(BBox),
    Circle(Circle),
}

impl Shape {
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        match self {
            Shape::BBox(bbox) => bbox.contains(lat, lon),
            Shape::Circle(circle) => circle.contains(lat, lon),
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> BBox {
        match self {
            Shape::BBox(bbox) => *bbox,
            Shape::Circle(circle) => circle.bounding_box(),
        }
    }

    /// Whether `bbox` might overlap this shape — conservative (uses the shape's own
    /// bounding box for a circle), meant for quadtree-descent pruning ahead of an
    /// exact [`Self::contains`] check on the leaves that survive.
    #[must_use]
    pub fn intersects_bbox(&self, bbox: &BBox) -> bool {
        self.bounding_box().intersects(bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_contains_respects_all_four_edges() {
        let bbox = BBox::new(10.0, 10.0, 0.0, 0.0);
        assert!(bbox.contains(5.0, 5.0));
        assert!(bbox.contains(10.0, 10.0));
        assert!(bbox.contains(0.0, 0.0));
        assert!(!bbox.contains(11.0, 5.0));
        assert!(!bbox.contains(5.0, -1.0));
    }

    #[test]
    fn bbox_intersects_is_symmetric() {
        let a = BBox::new(10.0, 10.0, 0.0, 0.0);
        let b = BBox::new(5.0, 15.0, -5.0, 5.0);
        let c = BBox::new(-10.0, -1.0, -20.0, -10.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn quadrants_cover_the_full_box_without_gaps() {
        let bbox = BBox::new(10.0, 10.0, -10.0, -10.0);
        let quads = bbox.quadrants();
        assert!(quads.iter().any(|(_, q)| q.contains(5.0, -5.0)));
        assert!(quads.iter().any(|(_, q)| q.contains(5.0, 5.0)));
        assert!(quads.iter().any(|(_, q)| q.contains(-5.0, -5.0)));
        assert!(quads.iter().any(|(_, q)| q.contains(-5.0, 5.0)));
    }

    #[test]
    fn circle_bounding_box_contains_center() {
        let circle = Circle::new(45.0, 9.0, 1000.0);
        let bbox = circle.bounding_box();
        assert!(bbox.contains(45.0, 9.0));
    }
}
