//! Workaround for forecasts whose model series repeat the actual series.
//!
//! The backend has been seen returning a model series identical to the
//! observed history, which draws as a single line. When enabled, the
//! duplicated series is scaled point-by-point by a factor in
//! `[1 - max_fraction, 1 + max_fraction]`. Factors come from a seeded RNG so
//! the same payload always renders the same way.

use common::config::ForecastConfig;
use common::ForecastResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateSeriesPerturbation {
    seed: u64,
    max_fraction: f64,
}

impl DuplicateSeriesPerturbation {
    pub fn new(seed: u64, max_fraction: f64) -> Self {
        Self {
            seed,
            max_fraction: max_fraction.abs(),
        }
    }

    /// `None` when the workaround is switched off.
    pub fn from_config(cfg: &ForecastConfig) -> Option<Self> {
        cfg.perturb_duplicate_series
            .then(|| Self::new(cfg.perturbation_seed, cfg.max_perturbation))
    }

    /// Perturb every model series equal to its result's actual series.
    /// Returns how many series were changed.
    pub fn apply(&self, results: &mut [ForecastResult]) -> usize {
        let mut changed = 0;

        for result in results.iter_mut() {
            let actual: Vec<f64> = result
                .chart_data
                .iter()
                .filter(|p| p.is_actual())
                .map(|p| p.orders)
                .collect();
            if actual.is_empty() {
                continue;
            }

            let mut models: Vec<String> = Vec::new();
            for p in result.chart_data.iter().filter(|p| !p.is_actual()) {
                if !models.contains(&p.series) {
                    models.push(p.series.clone());
                }
            }

            let category = result.category.clone().unwrap_or_default();
            for model in models {
                let series: Vec<f64> = result
                    .chart_data
                    .iter()
                    .filter(|p| p.series == model)
                    .map(|p| p.orders)
                    .collect();
                if series != actual {
                    continue;
                }

                warn!(
                    "Forecast series {} for {:?} duplicates the actual series; perturbing by up to ±{:.0}%",
                    model,
                    category,
                    self.max_fraction * 100.0
                );

                let mut rng = StdRng::seed_from_u64(self.seed ^ fnv1a(&category) ^ fnv1a(&model).rotate_left(17));
                let mut factors: Vec<(String, f64)> = Vec::new();
                for p in result.chart_data.iter_mut().filter(|p| p.series == model) {
                    let factor = 1.0 + rng.gen_range(-self.max_fraction..=self.max_fraction);
                    p.orders = round2(p.orders * factor);
                    factors.push((p.month.clone(), factor));
                }
                // Table rows for perturbed months follow the chart.
                for row in result.forecast_table.iter_mut() {
                    if let Some((_, factor)) = factors.iter().find(|(m, _)| *m == row.month) {
                        row.predicted_orders = round2(row.predicted_orders * factor);
                    }
                }
                changed += 1;
            }
        }

        changed
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Stable 64-bit FNV-1a, used to derive per-series seeds.
fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}
