//! Rate aggregation across repeats
//!
//! Each `run_once` produces one [`Score`]; a [`ScoreBoard`] accumulates
//! them and reports min / max / arithmetic mean, plus the geometric mean
//! for cross-scenario comparison. Displayed numbers truncate to four
//! significant figures.

/// Result of one benchmark repeat
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Worker count that produced this score
    pub workers: usize,
    /// Wall-clock seconds of the repeat
    pub seconds: f64,
    /// Loops completed across all workers
    pub loops: u64,
    /// Loops (or scenario-defined units) per second
    pub rate: f64,
    /// Unit label, e.g. `rows/sec` or `loops/sec`
    pub metric: String,
}

impl Score {
    /// Score with the default `loops / seconds` formula
    pub fn new(workers: usize, seconds: f64, loops: u64, metric: impl Into<String>) -> Self {
        let rate = if seconds > 0.0 {
            loops as f64 / seconds
        } else {
            0.0
        };
        Score {
            workers,
            seconds,
            loops,
            rate,
            metric: metric.into(),
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "workers: {}  time: {} s  loops: {}  rate: {} {}",
            self.workers,
            format_sig4(self.seconds),
            self.loops,
            format_sig4(self.rate),
            self.metric
        )
    }
}

/// Accumulator over repeats
#[derive(Debug, Default)]
pub struct ScoreBoard {
    scores: Vec<Score>,
}

impl ScoreBoard {
    /// Empty board
    pub fn new() -> Self {
        ScoreBoard::default()
    }

    /// Record one repeat
    pub fn push(&mut self, score: Score) {
        self.scores.push(score);
    }

    /// Recorded scores, in repeat order
    pub fn scores(&self) -> &[Score] {
        &self.scores
    }

    /// Lowest rate across repeats
    pub fn min_rate(&self) -> f64 {
        self.scores.iter().map(|s| s.rate).fold(f64::INFINITY, f64::min)
    }

    /// Highest rate across repeats
    pub fn max_rate(&self) -> f64 {
        self.scores.iter().map(|s| s.rate).fold(0.0, f64::max)
    }

    /// Arithmetic mean of rates
    pub fn mean_rate(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|s| s.rate).sum::<f64>() / self.scores.len() as f64
    }

    /// Geometric mean `exp(mean(ln rate))`; zero rates contribute nothing
    pub fn geomean_rate(&self) -> f64 {
        let positive: Vec<f64> = self
            .scores
            .iter()
            .map(|s| s.rate)
            .filter(|r| *r > 0.0)
            .collect();
        if positive.is_empty() {
            return 0.0;
        }
        let mean_ln = positive.iter().map(|r| r.ln()).sum::<f64>() / positive.len() as f64;
        mean_ln.exp()
    }

    /// Multi-repeat summary line; `None` with fewer than two repeats
    pub fn summary(&self) -> Option<String> {
        if self.scores.len() < 2 {
            return None;
        }
        Some(format!(
            "repeats: {}  min: {}  max: {}  avg: {}  geomean: {} {}",
            self.scores.len(),
            format_sig4(self.min_rate()),
            format_sig4(self.max_rate()),
            format_sig4(self.mean_rate()),
            format_sig4(self.geomean_rate()),
            self.scores[0].metric
        ))
    }
}

/// Truncate to four significant figures
pub fn format_sig4(v: f64) -> String {
    if v == 0.0 || !v.is_finite() {
        return "0.000".to_string();
    }
    let exponent = v.abs().log10().floor() as i32;
    let decimals = (3 - exponent).max(0) as usize;
    let scale = 10f64.powi(3 - exponent);
    let truncated = (v * scale).trunc() / scale;
    format!("{truncated:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rates: &[f64]) -> ScoreBoard {
        let mut b = ScoreBoard::new();
        for &r in rates {
            b.push(Score {
                workers: 2,
                seconds: 1.0,
                loops: r as u64,
                rate: r,
                metric: "loops/sec".into(),
            });
        }
        b
    }

    #[test]
    fn default_formula_is_loops_per_second() {
        let s = Score::new(4, 2.0, 100, "rows/sec");
        assert!((s.rate - 50.0).abs() < f64::EPSILON);
        // Zero elapsed never divides.
        assert_eq!(Score::new(4, 0.0, 100, "rows/sec").rate, 0.0);
    }

    #[test]
    fn min_max_mean() {
        let b = board(&[10.0, 20.0, 40.0]);
        assert_eq!(b.min_rate(), 10.0);
        assert_eq!(b.max_rate(), 40.0);
        assert!((b.mean_rate() - 70.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn geomean_matches_hand_computation() {
        let b = board(&[10.0, 1000.0]);
        // sqrt(10 * 1000) = 100
        assert!((b.geomean_rate() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn geomean_skips_zero_rates() {
        let b = board(&[0.0, 100.0]);
        assert!((b.geomean_rate() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn four_significant_figures_truncate() {
        assert_eq!(format_sig4(12345.678), "12340");
        assert_eq!(format_sig4(1234.5678), "1234");
        assert_eq!(format_sig4(123.45678), "123.4");
        assert_eq!(format_sig4(1.2345678), "1.234");
        assert_eq!(format_sig4(0.12345678), "0.1234");
        assert_eq!(format_sig4(0.0), "0.000");
    }

    #[test]
    fn summary_requires_two_repeats() {
        assert!(board(&[10.0]).summary().is_none());
        let text = board(&[10.0, 20.0]).summary().unwrap();
        assert!(text.contains("min: 10.00"), "{text}");
        assert!(text.contains("max: 20.00"), "{text}");
    }
}
