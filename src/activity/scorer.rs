use chrono::{DateTime, Duration, Utc};

/// Weight ratio between a bucket and the next more recent one
const DECAY: f64 = 0.9;

/// Result of scoring one repository
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    /// Activity index in `0.0..=100.0`
    pub score: f64,

    /// Commits per bucket, oldest first
    pub series: Vec<u32>,
}

/// Buckets commits over a trailing window and weighs recent buckets higher
///
/// The window is split into `ceil(window / bucket)` buckets. Each bucket
/// contributes `1 - e^-commits`, so a handful of commits already counts as an
/// active bucket, weighted by `0.9^age` where `age` is the bucket's distance
/// from the most recent one. The weighted sum is normalized to `0..=100`; an
/// empty history scores zero.
#[derive(Debug, Clone, Copy)]
pub struct ActivityScorer {
    window_days: u32,
    bucket_days: u32,
}

impl ActivityScorer {
    pub fn new(window_days: u32, bucket_days: u32) -> Self {
        let window_days = window_days.max(1);
        Self {
            window_days,
            bucket_days: bucket_days.clamp(1, window_days),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.window_days.div_ceil(self.bucket_days) as usize
    }

    /// Start of the window ending at `now`
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.window_days))
    }

    pub fn score(&self, now: DateTime<Utc>, commits: &[DateTime<Utc>]) -> Activity {
        let buckets = self.bucket_count();
        let mut series = vec![0u32; buckets];
        let window = Duration::days(i64::from(self.window_days));
        let bucket_secs = i64::from(self.bucket_days) * 86_400;

        for commit in commits {
            // Clock skew: commits from the future land in the newest bucket
            let age = (now - *commit).max(Duration::zero());
            if age >= window {
                continue;
            }
            let from_newest = (age.num_seconds() / bucket_secs) as usize;
            let index = buckets - 1 - from_newest.min(buckets - 1);
            series[index] = series[index].saturating_add(1);
        }

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (age, count) in series.iter().rev().enumerate() {
            let weight = DECAY.powi(age as i32);
            weighted += weight * (1.0 - (-f64::from(*count)).exp());
            total_weight += weight;
        }

        let score = if total_weight > 0.0 {
            (100.0 * weighted / total_weight).clamp(0.0, 100.0)
        } else {
            0.0
        };

        Activity { score, series }
    }
}

impl Default for ActivityScorer {
    fn default() -> Self {
        Self::new(60, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days) + Duration::hours(1)
    }

    #[test]
    fn test_empty_history_scores_zero() {
        let activity = ActivityScorer::default().score(now(), &[]);
        assert_eq!(activity.score, 0.0);
        assert_eq!(activity.series.len(), 60);
        assert!(activity.series.iter().all(|c| *c == 0));
    }

    #[test]
    fn test_commits_are_bucketed_oldest_first() {
        let scorer = ActivityScorer::new(10, 5);
        let activity = scorer.score(now(), &[days_ago(1), days_ago(2), days_ago(7), days_ago(30)]);
        assert_eq!(activity.series, vec![1, 2]);
    }

    #[test]
    fn test_uneven_window_rounds_up() {
        let scorer = ActivityScorer::new(10, 3);
        assert_eq!(scorer.bucket_count(), 4);
        let activity = scorer.score(now(), &[days_ago(10)]);
        assert_eq!(activity.series, vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_recent_activity_scores_higher() {
        let scorer = ActivityScorer::default();
        let recent = scorer.score(now(), &[days_ago(1), days_ago(1)]);
        let old = scorer.score(now(), &[days_ago(50), days_ago(50)]);
        assert!(recent.score > old.score);
        assert!(old.score > 0.0);
    }

    #[test]
    fn test_constant_activity_approaches_maximum() {
        let scorer = ActivityScorer::new(10, 1);
        let commits: Vec<_> = (0..10)
            .flat_map(|d| std::iter::repeat(now() - Duration::hours(24 * d + 1)).take(20))
            .collect();
        let activity = scorer.score(now(), &commits);
        assert!(activity.score > 99.0 && activity.score <= 100.0);
    }

    #[test]
    fn test_future_commits_land_in_newest_bucket() {
        let scorer = ActivityScorer::new(10, 5);
        let activity = scorer.score(now(), &[now() + Duration::hours(3)]);
        assert_eq!(activity.series, vec![0, 1]);
    }

    #[test]
    fn test_since() {
        let scorer = ActivityScorer::default();
        assert_eq!(now() - scorer.since(now()), Duration::days(60));
    }
}
