use std::collections::BTreeMap;

use crate::types::{GameRecord, Platform};

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub total: usize,
    pub per_platform: BTreeMap<Platform, usize>,
    pub with_critic_score: usize,
    pub with_user_score: usize,
    pub mean_critic_score: Option<f64>,
    pub mean_user_score: Option<f64>,
    /// Mean of `critic_score - 10 * user_score` over records that have both.
    pub mean_divergence: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl DatasetStats {
    pub fn from_records(records: &[GameRecord]) -> DatasetStats {
        let mut per_platform = BTreeMap::new();
        for r in records {
            *per_platform.entry(r.platform).or_insert(0) += 1;
        }

        let critic = || records.iter().filter_map(|r| r.critic_score).map(f64::from);
        let user = || records.iter().filter_map(|r| r.user_score).map(f64::from);

        DatasetStats {
            total: records.len(),
            per_platform,
            with_critic_score: critic().count(),
            with_user_score: user().count(),
            mean_critic_score: mean(critic()),
            mean_user_score: mean(user()),
            mean_divergence: mean(records.iter().filter_map(|r| {
                Some(f64::from(r.critic_score?) - f64::from(r.user_score?) * 10.0)
            })),
        }
    }
}

impl std::fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}", v));

        writeln!(f, "\nStatistics:")?;
        for (platform, count) in &self.per_platform {
            writeln!(f, "  {:<22} {}", format!("{}:", platform), count)?;
        }
        writeln!(f, "  Total:                 {}", self.total)?;
        writeln!(
            f,
            "  Metascore:             {} scored, mean {}",
            self.with_critic_score,
            opt(self.mean_critic_score)
        )?;
        writeln!(
            f,
            "  User score:            {} scored, mean {}",
            self.with_user_score,
            opt(self.mean_user_score)
        )?;
        writeln!(
            f,
            "  Critic - user (x10):   {}",
            opt(self.mean_divergence)
        )
    }
}
