use serde::{Deserialize, Serialize};

/// What a mask polygon does to the pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    /// Exclude the region of this image.
    #[default]
    Negative,
    /// Include only the region of this image.
    Positive,
    /// Exclude the region in all images of the stack.
    NegativeStack,
    /// Include only the region in all images of the stack.
    PositiveStack,
    /// Exclude the region in all images of the lens.
    NegativeLens,
}

impl MaskKind {
    /// Whether the mask removes the pixels it covers.
    pub fn is_exclusion(&self) -> bool {
        matches!(
            self,
            MaskKind::Negative | MaskKind::NegativeStack | MaskKind::NegativeLens
        )
    }
}

/// A closed polygon in image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskPolygon {
    /// Effect of the mask.
    pub kind: MaskKind,
    /// Vertices in order; the last vertex connects back to the first.
    pub points: Vec<[f64; 2]>,
}

impl MaskPolygon {
    /// Create a polygon from its vertices.
    pub fn new(kind: MaskKind, points: Vec<[f64; 2]>) -> Self {
        Self { kind, points }
    }

    /// Whether `point` is inside the polygon, by the nonzero winding rule.
    ///
    /// Polygons with fewer than three vertices contain nothing.
    pub fn is_inside(&self, point: [f64; 2]) -> bool {
        self.winding_number(point) != 0
    }

    /// Number of times the boundary winds counter-clockwise around `point`.
    pub fn winding_number(&self, point: [f64; 2]) -> i32 {
        if self.points.len() < 3 {
            return 0;
        }

        let [px, py] = point;
        // sign of the cross product tells on which side of edge a -> b the point lies
        let side = |a: [f64; 2], b: [f64; 2]| (b[0] - a[0]) * (py - a[1]) - (px - a[0]) * (b[1] - a[1]);

        let mut winding = 0;
        for (i, &a) in self.points.iter().enumerate() {
            let b = self.points[(i + 1) % self.points.len()];
            if a[1] <= py {
                if b[1] > py && side(a, b) > 0.0 {
                    winding += 1;
                }
            } else if b[1] <= py && side(a, b) < 0.0 {
                winding -= 1;
            }
        }
        winding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> MaskPolygon {
        MaskPolygon::new(
            MaskKind::Negative,
            vec![[10.0, 10.0], [20.0, 10.0], [20.0, 20.0], [10.0, 20.0]],
        )
    }

    #[test]
    fn inside_square() {
        let mask = square();
        assert!(mask.is_inside([15.0, 15.0]));
        assert!(mask.is_inside([10.5, 19.5]));
        assert!(!mask.is_inside([5.0, 15.0]));
        assert!(!mask.is_inside([15.0, 25.0]));
    }

    #[test]
    fn orientation_does_not_matter() {
        let mut mask = square();
        let ccw = mask.winding_number([15.0, 15.0]);
        mask.points.reverse();
        assert_eq!(mask.winding_number([15.0, 15.0]), -ccw);
        assert!(mask.is_inside([15.0, 15.0]));
    }

    #[test]
    fn self_overlapping_polygon() {
        // a pentagram: the centre is wound twice and stays inside under the nonzero rule
        let star = (0..5)
            .map(|i| {
                let angle = (90.0 + 144.0 * i as f64).to_radians();
                [50.0 + 40.0 * angle.cos(), 50.0 + 40.0 * angle.sin()]
            })
            .collect();
        let mask = MaskPolygon::new(MaskKind::Negative, star);
        assert_eq!(mask.winding_number([50.0, 50.0]).abs(), 2);
        assert!(mask.is_inside([50.0, 50.0]));
        assert!(!mask.is_inside([95.0, 95.0]));
    }

    #[test]
    fn degenerate_polygon() {
        let mask = MaskPolygon::new(MaskKind::Negative, vec![[0.0, 0.0], [10.0, 10.0]]);
        assert!(!mask.is_inside([5.0, 5.0]));
    }

    #[test]
    fn exclusion_kinds() {
        assert!(MaskKind::Negative.is_exclusion());
        assert!(MaskKind::NegativeLens.is_exclusion());
        assert!(!MaskKind::Positive.is_exclusion());
        assert!(!MaskKind::PositiveStack.is_exclusion());
    }
}
