//! Running compliance statistics for a monitoring session.
//!
//! Counters are cumulative: every tick adds that frame's detections, and the displayed
//! ratio is recomputed from the totals. Mask-worn detections are weighted by
//! [`COMPLIANCE_BIAS`] so a few missed masks do not sink the score.

use crate::constants::{COMPLIANCE_BIAS, HEALTHY_COMPLIANCE_RATIO};

/// Session-scoped compliance aggregator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceAggregator {
    mask_worn: u64,
    no_mask: u64,
    max_people: usize,
}

impl ComplianceAggregator {
    /// Create an aggregator with no detections recorded
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame's results into the running totals
    pub fn update(&mut self, detected_count: usize, compliance: &[bool]) {
        let worn = compliance.iter().filter(|&&c| c).count() as u64;
        self.mask_worn += worn;
        self.no_mask += compliance.len() as u64 - worn;
        self.max_people = self.max_people.max(detected_count);
    }

    /// Biased compliance ratio in `[0, 1]`; 1.0 before anything is seen
    #[allow(clippy::cast_precision_loss)] // Counts stay far below 2^52
    pub fn ratio(&self) -> f64 {
        let weighted = (self.mask_worn * COMPLIANCE_BIAS) as f64;
        let total = self.no_mask as f64 + weighted;
        if total == 0.0 {
            return 1.0;
        }
        weighted / total
    }

    /// Ratio as a percentage rounded up to two decimals
    pub fn percent(&self) -> f64 {
        ratio_to_percent(self.ratio())
    }

    /// Whether the ratio is high enough to show as healthy
    pub fn is_healthy(&self) -> bool {
        self.ratio() > HEALTHY_COMPLIANCE_RATIO
    }

    pub fn mask_worn(&self) -> u64 {
        self.mask_worn
    }

    pub fn no_mask(&self) -> u64 {
        self.no_mask
    }

    /// Most faces seen in a single frame
    pub fn max_people(&self) -> usize {
        self.max_people
    }

    /// Clear all counters
    pub fn reset(&mut self) {
        log::info!(
            "Resetting compliance statistics ({} masked, {} unmasked, max {} people)",
            self.mask_worn,
            self.no_mask,
            self.max_people
        );
        *self = Self::default();
    }

    /// Point-in-time copy of the statistics
    pub fn snapshot(&self) -> ComplianceSnapshot {
        ComplianceSnapshot {
            mask_worn: self.mask_worn,
            no_mask: self.no_mask,
            max_people: self.max_people,
            ratio: self.ratio(),
        }
    }
}

/// Statistics at one instant, for display and reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplianceSnapshot {
    /// Cumulative mask-worn detections
    pub mask_worn: u64,
    /// Cumulative detections without a mask
    pub no_mask: u64,
    /// Most faces in one frame
    pub max_people: usize,
    /// Biased compliance ratio
    pub ratio: f64,
}

impl ComplianceSnapshot {
    pub fn percent(&self) -> f64 {
        ratio_to_percent(self.ratio)
    }

    pub fn is_healthy(&self) -> bool {
        self.ratio > HEALTHY_COMPLIANCE_RATIO
    }
}

/// Ratio in `[0, 1]` to a percentage rounded up to two decimals
fn ratio_to_percent(ratio: f64) -> f64 {
    (ratio * 10_000.0).ceil() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_ratio_is_one() {
        let aggregator = ComplianceAggregator::new();
        assert_eq!(aggregator.ratio(), 1.0);
        assert_eq!(aggregator.percent(), 100.0);
        assert!(aggregator.is_healthy());
    }

    #[test]
    fn test_biased_ratio() {
        let mut aggregator = ComplianceAggregator::new();
        aggregator.update(4, &[true, true, true, false]);

        assert_eq!(aggregator.mask_worn(), 3);
        assert_eq!(aggregator.no_mask(), 1);
        assert_relative_eq!(aggregator.ratio(), 0.9);
        assert_relative_eq!(aggregator.percent(), 90.0);
    }

    #[test]
    fn test_only_unmasked() {
        let mut aggregator = ComplianceAggregator::new();
        aggregator.update(2, &[false, false]);
        assert_eq!(aggregator.ratio(), 0.0);
        assert!(!aggregator.is_healthy());
    }

    #[test]
    fn test_totals_accumulate_across_frames() {
        let mut aggregator = ComplianceAggregator::new();
        aggregator.update(1, &[false]);
        aggregator.update(1, &[true]);
        // m=1, n=1 -> 3/4
        assert_relative_eq!(aggregator.ratio(), 0.75);
        assert!(!aggregator.is_healthy());

        aggregator.update(1, &[true]);
        // m=2, n=1 -> 6/7
        assert_relative_eq!(aggregator.ratio(), 6.0 / 7.0);
        assert_relative_eq!(aggregator.percent(), 85.72);
    }

    #[test]
    fn test_max_people_high_water_mark() {
        let mut aggregator = ComplianceAggregator::new();
        aggregator.update(3, &[true, true, false]);
        aggregator.update(1, &[true]);
        aggregator.update(0, &[]);
        assert_eq!(aggregator.max_people(), 3);

        aggregator.update(5, &[true; 5]);
        assert_eq!(aggregator.max_people(), 5);
    }

    #[test]
    fn test_reset_and_snapshot() {
        let mut aggregator = ComplianceAggregator::new();
        aggregator.update(2, &[true, false]);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.mask_worn, 1);
        assert_eq!(snapshot.no_mask, 1);
        assert_eq!(snapshot.max_people, 2);
        assert_relative_eq!(snapshot.ratio, 0.75);

        assert_relative_eq!(snapshot.percent(), 75.0);
        assert!(!snapshot.is_healthy());

        aggregator.reset();
        assert_eq!(aggregator, ComplianceAggregator::new());
    }
}
