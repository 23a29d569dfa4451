//! Win-rate histogram.

use tracing::{info, warn};

use super::{round2, DeriveError, Derived};
use crate::models::{DistributionBucket, EntityStats};

/// Bucket layout built from ascending edges.
///
/// `n` edges give `n - 1` buckets. The first bucket includes both ends,
/// every later bucket only its upper end: `[0,25]`, `(25,50]`, ...
#[derive(Debug, Clone, PartialEq)]
pub struct WinRateBuckets {
    edges: Vec<f64>,
}

impl WinRateBuckets {
    pub fn new(edges: Vec<f64>) -> Result<Self, DeriveError> {
        if edges.len() < 2 {
            return Err(DeriveError::InvalidParameters(format!(
                "need at least two bucket edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(DeriveError::InvalidParameters(
                "bucket edges must be finite".to_string(),
            ));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DeriveError::InvalidParameters(format!(
                "bucket edges must be strictly ascending: {:?}",
                edges
            )));
        }
        Ok(Self { edges })
    }

    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels in bucket order, e.g. `0-25%`.
    pub fn labels(&self) -> Vec<String> {
        self.edges
            .windows(2)
            .map(|w| format!("{}-{}%", format_edge(w[0]), format_edge(w[1])))
            .collect()
    }

    /// Index of the bucket holding `rate`, `None` outside the edges.
    pub fn bucket_of(&self, rate: f64) -> Option<usize> {
        if rate == self.edges[0] {
            return Some(0);
        }
        self.edges
            .windows(2)
            .position(|w| rate > w[0] && rate <= w[1])
    }
}

impl Default for WinRateBuckets {
    fn default() -> Self {
        Self {
            edges: vec![0.0, 25.0, 50.0, 75.0, 100.0],
        }
    }
}

fn format_edge(edge: f64) -> String {
    if edge.fract() == 0.0 {
        format!("{}", edge as i64)
    } else {
        format!("{}", edge)
    }
}

/// Share of entities per win-rate bucket.
///
/// Every bucket is emitted, in order, even with no members. Shares are taken
/// over the entities that fall inside the edges; a NaN win rate counts as 0.
pub fn win_rate_distribution(
    stats: Option<&[EntityStats]>,
    buckets: &WinRateBuckets,
) -> Derived<Vec<DistributionBucket>> {
    let Some(stats) = stats else {
        warn!("Cannot bin win rates: statistics unavailable");
        return Derived::Failed(DeriveError::UpstreamUnavailable("entity_stats"));
    };

    let mut counts = vec![0usize; buckets.len()];
    let mut outside = 0usize;
    for row in stats {
        let rate = if row.win_rate.is_nan() { 0.0 } else { row.win_rate };
        match buckets.bucket_of(rate) {
            Some(index) => counts[index] += 1,
            None => outside += 1,
        }
    }
    if outside > 0 {
        warn!("{} win rates fall outside the bucket edges", outside);
    }

    let binned: usize = counts.iter().sum();
    let rows: Vec<DistributionBucket> = buckets
        .labels()
        .into_iter()
        .zip(counts)
        .map(|(label, count)| {
            let proportion = if binned == 0 {
                0.0
            } else {
                count as f64 / binned as f64
            };
            DistributionBucket {
                label,
                proportion,
                percentage: round2(proportion * 100.0),
            }
        })
        .collect();

    info!("Binned {} win rates into {} buckets", binned, rows.len());
    Derived::Ready(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn percentages(rows: &[DistributionBucket]) -> Vec<f64> {
        rows.iter().map(|r| r.percentage).collect()
    }

    #[test]
    fn test_default_labels() {
        assert_eq!(
            WinRateBuckets::default().labels(),
            vec!["0-25%", "25-50%", "50-75%", "75-100%"]
        );
    }

    #[test]
    fn test_boundaries() {
        let buckets = WinRateBuckets::default();
        assert_eq!(buckets.bucket_of(0.0), Some(0));
        assert_eq!(buckets.bucket_of(25.0), Some(0));
        assert_eq!(buckets.bucket_of(25.01), Some(1));
        assert_eq!(buckets.bucket_of(50.0), Some(1));
        assert_eq!(buckets.bucket_of(100.0), Some(3));
        assert_eq!(buckets.bucket_of(-1.0), None);
        assert_eq!(buckets.bucket_of(100.5), None);
    }

    #[test]
    fn test_scenario_distribution_sums_to_100() {
        let stats = vec![
            EntityStats::new("A", 3, 2),
            EntityStats::new("B", 2, 1),
            EntityStats::new("C", 1, 0),
        ];

        let Derived::Ready(rows) = win_rate_distribution(Some(&stats), &WinRateBuckets::default())
        else {
            panic!("expected buckets");
        };

        assert_eq!(rows.len(), 4);
        assert_eq!(percentages(&rows), vec![33.33, 33.33, 33.33, 0.0]);
        let total: f64 = rows.iter().map(|r| r.percentage).sum();
        assert!((total - 100.0).abs() <= 0.01 + 1e-9, "total was {}", total);
    }

    #[test]
    fn test_empty_statistics_give_four_zero_rows() {
        let Derived::Ready(rows) = win_rate_distribution(Some(&[]), &WinRateBuckets::default())
        else {
            panic!("expected buckets");
        };
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.proportion == 0.0 && r.percentage == 0.0));
    }

    #[test]
    fn test_nan_rate_counts_as_zero() {
        let mut stats = vec![EntityStats::new("A", 4, 4)];
        stats.push(EntityStats {
            win_rate: f64::NAN,
            ..EntityStats::new("B", 0, 0)
        });
        let Derived::Ready(rows) = win_rate_distribution(Some(&stats), &WinRateBuckets::default())
        else {
            panic!("expected buckets");
        };
        assert_eq!(percentages(&rows), vec![50.0, 0.0, 0.0, 50.0]);
    }

    #[test]
    fn test_custom_edges() {
        let buckets = WinRateBuckets::new(vec![0.0, 50.0, 100.0]).unwrap();
        assert_eq!(buckets.labels(), vec!["0-50%", "50-100%"]);
        let stats = vec![EntityStats::new("A", 4, 3), EntityStats::new("B", 4, 1)];
        let Derived::Ready(rows) = win_rate_distribution(Some(&stats), &buckets) else {
            panic!("expected buckets");
        };
        assert_eq!(percentages(&rows), vec![50.0, 50.0]);
    }

    #[test]
    fn test_invalid_edges() {
        assert!(WinRateBuckets::new(vec![0.0]).is_err());
        assert!(WinRateBuckets::new(vec![0.0, 50.0, 50.0]).is_err());
        assert!(WinRateBuckets::new(vec![0.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_absent_statistics_fail() {
        assert!(win_rate_distribution(None, &WinRateBuckets::default()).is_failed());
    }
}
