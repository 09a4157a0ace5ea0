//! Probability tables derived once from the parameters.
//!
//! Seasonal tables are indexed by day of the year and follow
//! `1 + seasonality * cos(2 pi day / 365)`, which peaks on January 1.

use std::f64::consts::{E, PI};

use super::strain::NUM_SITES;
use crate::config::Parameters;

pub const DAYS_PER_YEAR: usize = 365;

/// Mean number of contacts in a neighborhood of radius 4.
pub const AVERAGE_NEIGHBORS: f64 = 12.554;

/// Days a host stays infectious.
pub const INFECTIOUS_DAYS: f64 = 4.0;

/// Outcomes tabulated in each Poisson CDF.
pub const POISSON_OUTCOMES: usize = 20;

pub type PoissonCdf = [f64; POISSON_OUTCOMES];

pub fn seasonality(parameters: &Parameters, day_of_year: usize) -> f64 {
    1.0 + parameters.seasonality_multiplier * (day_of_year as f64 / 365.0 * PI * 2.0).cos()
}

/// Index of the first entry of `cdf` that is at least `draw`.
///
/// A draw beyond the last entry yields `cdf.len()`.
pub fn draw_from_distribution(cdf: &[f64], draw: f64) -> usize {
    match cdf.iter().position(|&p| p >= draw) {
        Some(index) => index,
        None => {
            log::warn!(
                "Cutoff of distribution reached: draw={draw}, cdf[{}]={}",
                cdf.len() - 1,
                cdf[cdf.len() - 1]
            );
            cdf.len()
        }
    }
}

fn poisson_cdf(lambda: f64) -> PoissonCdf {
    let mut cdf = [0.0; POISSON_OUTCOMES];
    cdf[0] = E.powf(-lambda);
    let mut factorial = 1.0;
    for k in 1..POISSON_OUTCOMES {
        factorial *= k as f64;
        cdf[k] = cdf[k - 1] + lambda.powf(k as f64) * E.powf(-lambda) / factorial;
    }
    cdf
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |product, k| product * k as f64)
}

fn binomial_cdf(n: usize, p: f64) -> Vec<f64> {
    let mut cdf: Vec<f64> = Vec::with_capacity(n + 1);
    for k in 0..=n {
        let previous = cdf.last().copied().unwrap_or(0.0);
        let choose = factorial(n) / (factorial(k) * factorial(n - k));
        let density = choose * p.powf(k as f64) * (1.0 - p).powf((n - k) as f64);
        cdf.push(1.0f64.min(previous + density));
    }
    cdf
}

#[derive(Clone, Debug)]
pub struct ProbabilityTables {
    pub local_infection_probability: f64,
    pub poisson_local: Vec<PoissonCdf>,
    pub poisson_patch: Vec<PoissonCdf>,
    pub poisson_global: Vec<PoissonCdf>,
    pub binomial_mutations: Vec<f64>,
    pub infection_local: Vec<f64>,
}

impl ProbabilityTables {
    pub fn new(parameters: &Parameters) -> Self {
        let local_infection_probability =
            parameters.r0_local / AVERAGE_NEIGHBORS / INFECTIOUS_DAYS;

        // r0_global is given between any two patches
        let r0_global = parameters.r0_global * (parameters.num_patches as f64 - 1.0);
        let lambda_local = parameters.r0_local / INFECTIOUS_DAYS;
        let lambda_patch = parameters.r0_patch / INFECTIOUS_DAYS;
        let lambda_global = r0_global / INFECTIOUS_DAYS;

        let seasons: Vec<f64> = (0..DAYS_PER_YEAR)
            .map(|day| seasonality(parameters, day))
            .collect();

        let beta = -(1.0 - local_infection_probability).ln();

        Self {
            local_infection_probability,
            poisson_local: seasons.iter().map(|s| poisson_cdf(lambda_local * s)).collect(),
            poisson_patch: seasons.iter().map(|s| poisson_cdf(lambda_patch * s)).collect(),
            poisson_global: seasons.iter().map(|s| poisson_cdf(lambda_global * s)).collect(),
            binomial_mutations: binomial_cdf(NUM_SITES, parameters.mutation_probability),
            infection_local: seasons.iter().map(|s| 1.0 - (-s * beta).exp()).collect(),
        }
    }

    pub fn draw_mutation_count(&self, draw: f64) -> usize {
        draw_from_distribution(&self.binomial_mutations, draw)
    }
}
