//! Flow direction source.
//!
//! The analysis needs to know, for each point, where precipitation comes from. That is
//! supplied by an external motion field; the default implementation is a lookup table built
//! from configuration and an optional direction CSV.

use std::collections::HashMap;

use crate::config::PointConfig;
use crate::core::types::PointOfInterest;

/// Supplies a flow direction `(dx, dy)` per point, x along columns and y along rows.
pub trait MotionField: Sync {
    fn direction_at(&self, point: &PointOfInterest) -> Option<[f64; 2]>;
}

/// Directions keyed by point name.
#[derive(Debug, Clone, Default)]
pub struct TableMotionField {
    directions: HashMap<String, [f64; 2]>,
}

impl TableMotionField {
    /// Table seeded from the `direction` field of each configured point.
    pub fn from_points(points: &[PointConfig]) -> Self {
        let directions = points
            .iter()
            .filter_map(|p| p.direction.map(|d| (p.name.clone(), d)))
            .collect();
        Self { directions }
    }

    /// Replace or add entries; later sources win.
    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, [f64; 2])>,
    {
        self.directions.extend(overrides);
        self
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }
}

impl MotionField for TableMotionField {
    fn direction_at(&self, point: &PointOfInterest) -> Option<[f64; 2]> {
        self.directions
            .get(&point.name)
            .copied()
            .filter(|[dx, dy]| dx.is_finite() && dy.is_finite() && dx.hypot(*dy) > 0.0)
    }
}

/// The same direction everywhere.
#[derive(Debug, Clone, Copy)]
pub struct UniformMotionField(pub [f64; 2]);

impl MotionField for UniformMotionField {
    fn direction_at(&self, _point: &PointOfInterest) -> Option<[f64; 2]> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_config(name: &str, direction: Option<[f64; 2]>) -> PointConfig {
        PointConfig {
            name: name.to_string(),
            row: 10,
            col: 10,
            direction,
        }
    }

    #[test]
    fn test_config_directions() {
        let points = vec![point_config("a", Some([1.0, 0.0])), point_config("b", None)];
        let field = TableMotionField::from_points(&points);
        assert_eq!(field.len(), 1);
        assert_eq!(field.direction_at(&points[0].to_point()), Some([1.0, 0.0]));
        assert_eq!(field.direction_at(&points[1].to_point()), None);
    }

    #[test]
    fn test_overrides_win() {
        let points = vec![point_config("a", Some([1.0, 0.0]))];
        let field = TableMotionField::from_points(&points)
            .with_overrides(vec![("a".to_string(), [0.0, -2.0])]);
        assert_eq!(field.direction_at(&points[0].to_point()), Some([0.0, -2.0]));
    }

    #[test]
    fn test_zero_direction_is_missing() {
        let points = vec![point_config("a", Some([0.0, 0.0]))];
        let field = TableMotionField::from_points(&points);
        assert_eq!(field.direction_at(&points[0].to_point()), None);
    }
}
