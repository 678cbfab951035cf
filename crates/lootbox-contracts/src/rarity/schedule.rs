use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use super::label::{labels, RarityLabel, LABEL_COUNT};
use super::RarityError;

pub type Pmf = [f64; LABEL_COUNT];

/// Poisson rate per event week.
pub const POISSON_SCHEDULE: [f64; 5] = [1.0, 2.0, 6.0, 12.0, 16.0];

/// Simulation-mode weights, out of 48. Skewed toward the upper tiers.
pub const SIMULATION_WEIGHTS: [u32; LABEL_COUNT] = [1, 2, 2, 6, 12, 12, 13];

/// Weeks past the end of the schedule keep the last rate.
pub fn schedule_rate(week_offset: usize) -> f64 {
    let idx = week_offset.min(POISSON_SCHEDULE.len() - 1);
    POISSON_SCHEDULE[idx]
}

/// Poisson pmf over support 1..=7, renormalized over that support.
pub fn poisson_pmf(mu: f64) -> Pmf {
    let mut pmf = [0.0; LABEL_COUNT];
    let mut ln_factorial = 0.0;
    for (idx, slot) in pmf.iter_mut().enumerate() {
        let k = (idx + 1) as f64;
        ln_factorial += k.ln();
        *slot = (k * mu.ln() - mu - ln_factorial).exp();
    }
    let total: f64 = pmf.iter().sum();
    for slot in pmf.iter_mut() {
        *slot /= total;
    }
    pmf
}

pub fn weekly_pmf(week_offset: usize) -> Pmf {
    poisson_pmf(schedule_rate(week_offset))
}

pub fn simulation_pmf() -> Pmf {
    let total: u32 = SIMULATION_WEIGHTS.iter().sum();
    let mut pmf = [0.0; LABEL_COUNT];
    for (slot, weight) in pmf.iter_mut().zip(SIMULATION_WEIGHTS) {
        *slot = f64::from(weight) / f64::from(total);
    }
    pmf
}

/// Which distribution a claim draws its rarity from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTable {
    Weekly(usize),
    Simulation,
}

impl DropTable {
    pub fn pmf(self) -> Pmf {
        match self {
            Self::Weekly(week_offset) => weekly_pmf(week_offset),
            Self::Simulation => simulation_pmf(),
        }
    }

    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> Result<RarityLabel, RarityError> {
        sample_from_pmf(&self.pmf(), rng)
    }
}

pub fn sample_label<R: Rng + ?Sized>(
    week_offset: usize,
    rng: &mut R,
) -> Result<RarityLabel, RarityError> {
    DropTable::Weekly(week_offset).sample(rng)
}

pub fn sample_label_uniform<R: Rng + ?Sized>(rng: &mut R) -> Result<RarityLabel, RarityError> {
    DropTable::Simulation.sample(rng)
}

fn sample_from_pmf<R: Rng + ?Sized>(pmf: &Pmf, rng: &mut R) -> Result<RarityLabel, RarityError> {
    let dist = WeightedIndex::new(pmf.iter().copied())
        .map_err(|err| RarityError::InvalidDistribution(err.to_string()))?;
    RarityLabel::from_level(dist.sample(rng))
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekOdds {
    pub week_offset: usize,
    pub mu: f64,
    pub pmf: Pmf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropReport {
    pub weeks: Vec<WeekOdds>,
    pub claims_per_week: u32,
    /// Probability of drawing each tier at least once across all weeks.
    pub at_least_once: Pmf,
}

pub fn drop_report(claims_per_week: u32) -> DropReport {
    let weeks = (0..POISSON_SCHEDULE.len())
        .map(|week_offset| WeekOdds {
            week_offset,
            mu: schedule_rate(week_offset),
            pmf: weekly_pmf(week_offset),
        })
        .collect::<Vec<WeekOdds>>();

    let mut never = [1.0; LABEL_COUNT];
    for week in &weeks {
        for (miss, p) in never.iter_mut().zip(week.pmf) {
            *miss *= (1.0 - p).powi(claims_per_week as i32);
        }
    }
    let mut at_least_once = [0.0; LABEL_COUNT];
    for (slot, miss) in at_least_once.iter_mut().zip(never) {
        *slot = 1.0 - miss;
    }

    DropReport {
        weeks,
        claims_per_week,
        at_least_once,
    }
}

pub fn format_pmf_table(pmf: &Pmf) -> String {
    let mut out = String::from("| Level | Rarity (%) |\n| ----- | ---------- |\n");
    for (label, p) in labels().into_iter().zip(pmf) {
        out.push_str(&format!("| {} | {:.3} % |\n", label, 100.0 * p));
    }
    out
}
