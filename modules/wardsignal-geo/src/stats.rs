use serde::Serialize;

/// Per-unit report aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnitStats {
    pub count: u32,
    pub total_upvotes: u64,
    /// Arithmetic mean of contained severity scores, 0 when empty.
    pub avg_severity: f64,
}

/// Running sums, turned into `UnitStats` once all reports are assigned.
#[derive(Debug, Default)]
pub(crate) struct StatsAccumulator {
    count: u32,
    total_upvotes: u64,
    severity_sum: f64,
}

impl StatsAccumulator {
    pub(crate) fn add(&mut self, upvotes: u32, severity: f64) {
        self.count += 1;
        self.total_upvotes += u64::from(upvotes);
        self.severity_sum += severity;
    }

    pub(crate) fn finish(&self) -> UnitStats {
        let avg_severity = if self.count == 0 {
            0.0
        } else {
            self.severity_sum / f64::from(self.count)
        };
        UnitStats {
            count: self.count,
            total_upvotes: self.total_upvotes,
            avg_severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator_has_zero_average() {
        assert_eq!(StatsAccumulator::default().finish(), UnitStats::default());
    }

    #[test]
    fn averages_severity() {
        let mut acc = StatsAccumulator::default();
        acc.add(3, 40.0);
        acc.add(5, 60.0);
        let stats = acc.finish();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_upvotes, 8);
        assert_eq!(stats.avg_severity, 50.0);
    }
}
