use crate::frame::{MotionDecision, Region};

/// Default minimum contour area (pixels²) for a region to count as movement.
pub const DEFAULT_NOISE_AREA: f64 = 900.0;

/// Area-based noise suppression.
///
/// A region is kept iff its polygon area is at least `min_area`. The filter
/// only ever removes regions; kept regions retain their input order.
#[derive(Clone, Copy, Debug)]
pub struct RegionFilter {
    min_area: f64,
}

impl RegionFilter {
    pub fn new(min_area: f64) -> Self {
        Self { min_area }
    }

    pub fn min_area(&self) -> f64 {
        self.min_area
    }

    pub fn filter(&self, regions: Vec<Region>) -> MotionDecision {
        let kept: Vec<Region> = regions
            .into_iter()
            .filter(|region| region.area >= self.min_area)
            .collect();
        MotionDecision {
            movement_detected: !kept.is_empty(),
            regions: kept,
        }
    }
}

impl Default for RegionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_AREA)
    }
}
