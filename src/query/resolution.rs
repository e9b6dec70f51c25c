//! Rollup resolutions
//!
//! The store keeps data at a handful of rollup granularities. A fetch picks
//! the finest one whose estimated point count for the requested window stays
//! under a threshold, escalating one tier at a time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::query::error::{QueryError, QueryResult};

/// Resolution tags understood by the store, finest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    Full,
    Min5,
    Min20,
    Min60,
    Min240,
    Min1440,
}

impl Resolution {
    /// All tags, finest first
    pub const ALL: [Resolution; 6] = [
        Resolution::Full,
        Resolution::Min5,
        Resolution::Min20,
        Resolution::Min60,
        Resolution::Min240,
        Resolution::Min1440,
    ];

    /// Wire name of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Full => "FULL",
            Resolution::Min5 => "MIN5",
            Resolution::Min20 => "MIN20",
            Resolution::Min60 => "MIN60",
            Resolution::Min240 => "MIN240",
            Resolution::Min1440 => "MIN1440",
        }
    }

    /// Next coarser tag, `None` for the coarsest
    pub fn coarser(&self) -> Option<Resolution> {
        match self {
            Resolution::Full => Some(Resolution::Min5),
            Resolution::Min5 => Some(Resolution::Min20),
            Resolution::Min20 => Some(Resolution::Min60),
            Resolution::Min60 => Some(Resolution::Min240),
            Resolution::Min240 => Some(Resolution::Min1440),
            Resolution::Min1440 => None,
        }
    }

    /// Fixed rollup width; `None` for FULL, whose width is configured
    fn rollup_seconds(&self) -> Option<i64> {
        match self {
            Resolution::Full => None,
            Resolution::Min5 => Some(300),
            Resolution::Min20 => Some(1_200),
            Resolution::Min60 => Some(3_600),
            Resolution::Min240 => Some(14_400),
            Resolution::Min1440 => Some(86_400),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueryError::Configuration(format!("unknown resolution tag: {}", s)))
    }
}

/// Step table plus the point-count thresholds used to pick a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTable {
    full_step_secs: i64,
    first_tier_threshold: i64,
    threshold: i64,
}

impl Default for ResolutionTable {
    fn default() -> Self {
        Self {
            full_step_secs: 60,
            first_tier_threshold: 400,
            threshold: 800,
        }
    }
}

impl ResolutionTable {
    /// Create a table with a custom FULL step and thresholds
    ///
    /// The FULL step must be positive and finer than MIN5, otherwise coarser
    /// windows could end up with a finer grid.
    pub fn new(full_step_secs: i64, first_tier_threshold: i64, threshold: i64) -> QueryResult<Self> {
        if full_step_secs <= 0 || full_step_secs >= 300 {
            return Err(QueryError::Configuration(format!(
                "FULL step must be between 1 and 299 seconds, got {}",
                full_step_secs
            )));
        }
        if first_tier_threshold <= 0 || threshold <= 0 {
            return Err(QueryError::Configuration(
                "resolution thresholds must be positive".to_string(),
            ));
        }
        Ok(Self {
            full_step_secs,
            first_tier_threshold,
            threshold,
        })
    }

    /// Step of a resolution, in seconds
    pub fn step_seconds(&self, resolution: Resolution) -> i64 {
        resolution.rollup_seconds().unwrap_or(self.full_step_secs)
    }

    /// Step of a resolution given by its wire tag
    pub fn step_seconds_for_tag(&self, tag: &str) -> QueryResult<i64> {
        Ok(self.step_seconds(tag.parse()?))
    }

    /// Pick the finest resolution whose estimated point count for
    /// `[start, end)` does not exceed its threshold
    ///
    /// The estimate uses integer division. An empty or inverted window
    /// counts as zero points.
    pub fn choose(&self, start: i64, end: i64) -> Resolution {
        let window = end.saturating_sub(start).max(0);
        let mut resolution = Resolution::Full;

        loop {
            let estimated_points = window / self.step_seconds(resolution);
            let limit = if resolution == Resolution::Full {
                self.first_tier_threshold
            } else {
                self.threshold
            };
            if estimated_points <= limit {
                return resolution;
            }
            match resolution.coarser() {
                Some(next) => resolution = next,
                None => return resolution,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_lookup() {
        let table = ResolutionTable::default();
        assert_eq!(table.step_seconds(Resolution::Full), 60);
        assert_eq!(table.step_seconds(Resolution::Min5), 300);
        assert_eq!(table.step_seconds(Resolution::Min1440), 86_400);
        assert_eq!(table.step_seconds_for_tag("MIN240").unwrap(), 14_400);
        assert!(matches!(
            table.step_seconds_for_tag("MIN7"),
            Err(QueryError::Configuration(_))
        ));
    }

    #[test]
    fn test_tier_boundary_uses_integer_estimate() {
        let table = ResolutionTable::default();
        let stop = 14_400 * 801;
        assert_eq!(table.choose(0, stop), Resolution::Min1440);
        assert_eq!(table.choose(0, stop - 1), Resolution::Min240);
    }

    #[test]
    fn test_first_tier_threshold_is_lower() {
        let table = ResolutionTable::default();
        // 400 minutes of FULL data is fine, 401 is not
        assert_eq!(table.choose(0, 60 * 400), Resolution::Full);
        assert_eq!(table.choose(0, 60 * 401), Resolution::Min5);
        // 27000s is 450 FULL points: past the first tier, well inside MIN5
        assert_eq!(table.choose(1_426_120_000, 1_426_147_000), Resolution::Min5);
        assert_eq!(table.choose(0, 300 * 800), Resolution::Min5);
        assert_eq!(table.choose(0, 300 * 801), Resolution::Min20);
    }

    #[test]
    fn test_empty_and_inverted_windows() {
        let table = ResolutionTable::default();
        assert_eq!(table.choose(100, 100), Resolution::Full);
        assert_eq!(table.choose(100, 0), Resolution::Full);
        assert_eq!(table.choose(i64::MAX, i64::MIN), Resolution::Full);
    }

    #[test]
    fn test_coarsest_is_floor() {
        let table = ResolutionTable::default();
        assert_eq!(table.choose(0, i64::MAX), Resolution::Min1440);
    }

    #[test]
    fn test_monotonic_step() {
        let table = ResolutionTable::default();
        let mut previous = 0;
        let mut window = 0;
        while window < 200_000_000 {
            let step = table.step_seconds(table.choose(0, window));
            assert!(step >= previous, "step shrank at window {}", window);
            previous = step;
            window += 997;
        }
    }

    #[test]
    fn test_custom_full_step() {
        let table = ResolutionTable::new(1, 400, 800).unwrap();
        assert_eq!(table.step_seconds(Resolution::Full), 1);
        assert_eq!(table.choose(0, 400), Resolution::Full);
        assert_eq!(table.choose(0, 401), Resolution::Min5);
        assert!(ResolutionTable::new(0, 400, 800).is_err());
        assert!(ResolutionTable::new(300, 400, 800).is_err());
        assert!(ResolutionTable::new(60, 0, 800).is_err());
    }

    #[test]
    fn test_tag_parsing() {
        assert_eq!("full".parse::<Resolution>().unwrap(), Resolution::Full);
        assert_eq!("MIN1440".parse::<Resolution>().unwrap(), Resolution::Min1440);
        assert_eq!(Resolution::Min20.to_string(), "MIN20");
    }
}
