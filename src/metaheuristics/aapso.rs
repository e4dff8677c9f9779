//! Adaptive Accelerated Particle Swarm Optimization for feature selection.
//!
//! Each agent keeps a continuous position in `[0, 1]^D`; a feature is
//! selected when its coordinate exceeds the binarization threshold. Every
//! iteration pulls agents toward the global best with an acceleration that
//! grows over the run, toward their personal best, and along a random
//! direction whose amplitude anneals geometrically.

use super::traits::{FitnessFunction, WORST_FITNESS};
use crate::error::{AapsoError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A candidate solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// Continuous position, one weight per feature in `[0, 1]`
    pub position: Vec<f64>,
    /// Last displacement applied to `position`
    pub velocity: Vec<f64>,
    /// Fitness of the current position
    pub fitness: f64,
    /// Best position this agent has visited
    pub personal_best: Vec<f64>,
    /// Fitness of `personal_best`
    pub personal_best_fitness: f64,
}

impl Agent {
    fn random(dim: usize, rng: &mut StdRng) -> Self {
        let position: Vec<f64> = (0..dim).map(|_| rng.gen::<f64>()).collect();
        Self {
            personal_best: position.clone(),
            position,
            velocity: vec![0.0; dim],
            fitness: WORST_FITNESS,
            personal_best_fitness: WORST_FITNESS,
        }
    }

    /// Binary feature mask of the current position.
    #[must_use]
    pub fn mask(&self, threshold: f64) -> Vec<bool> {
        self.position.iter().map(|&p| p > threshold).collect()
    }

    /// Number of features the current position selects.
    #[must_use]
    pub fn n_selected(&self, threshold: f64) -> usize {
        self.position.iter().filter(|&&p| p > threshold).count()
    }

    /// Number of features (dimensionality of the agent).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.position.len()
    }
}

/// The population plus the best agent seen so far.
#[derive(Debug, Clone)]
pub struct Swarm {
    /// Current agents
    pub agents: Vec<Agent>,
    /// Best agent observed; replaced only on strict improvement
    pub global_best: Agent,
}

impl Swarm {
    /// Offers agent `idx` as a new global best. Returns whether it replaced it.
    fn offer(&mut self, idx: usize) -> bool {
        let candidate = &self.agents[idx];
        if candidate.fitness > self.global_best.fitness {
            self.global_best = candidate.clone();
            true
        } else {
            false
        }
    }
}

/// Outcome of an AAPSO run.
#[derive(Debug, Clone)]
pub struct AapsoResult {
    /// Global best agent at termination
    pub best_agent: Agent,
    /// Binary mask of `best_agent`
    pub best_mask: Vec<bool>,
    /// Fitness of `best_agent`
    pub best_fitness: f64,
    /// Global-best fitness after initialization and after every iteration
    pub convergence_curve: Vec<f64>,
    /// Agents at termination
    pub final_population: Vec<Agent>,
    /// Fitness function calls, counting degenerate masks
    pub evaluations: usize,
    /// Wall-clock duration of the search
    pub execution_time: Duration,
}

impl AapsoResult {
    /// Indices of the selected features.
    #[must_use]
    pub fn selected_indices(&self) -> Vec<usize> {
        self.best_mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of selected features.
    #[must_use]
    pub fn n_selected(&self) -> usize {
        self.best_mask.iter().filter(|&&m| m).count()
    }
}

/// Adaptive Accelerated Particle Swarm Optimizer.
///
/// Position update for agent `x` at iteration `t` of `T`, per dimension:
///
/// ```text
/// alpha_t = alpha0 * gamma^t
/// beta_t  = beta_min + (beta_max - beta_min) * t / T
/// v       = beta_t * (g - x) + c_p * r * (p - x) + alpha_t * (eps - 0.5)
/// x       = clip(x + v, 0, 1)
/// ```
///
/// with `g` the global best, `p` the personal best and `r, eps ~ U[0, 1)`.
/// There is no inertia term and no early stopping: the search always runs
/// exactly `max_iter` iterations.
#[derive(Debug, Clone)]
pub struct Aapso {
    /// Number of agents
    pub population_size: usize,
    /// Number of iterations after initialization
    pub max_iter: usize,
    /// Initial exploration amplitude
    pub alpha0: f64,
    /// Geometric decay of the exploration amplitude per iteration
    pub alpha_decay: f64,
    /// Attraction toward the global best at the first iteration
    pub beta_min: f64,
    /// Attraction toward the global best approached at the last iteration
    pub beta_max: f64,
    /// Attraction toward the personal best
    pub personal_weight: f64,
    /// Binarization threshold; coordinates above it select the feature
    pub threshold: f64,
    seed: Option<u64>,
}

impl Default for Aapso {
    fn default() -> Self {
        Self {
            population_size: 30,
            max_iter: 20,
            alpha0: 0.5,
            alpha_decay: 0.9,
            beta_min: 0.2,
            beta_max: 0.7,
            personal_weight: 0.5,
            threshold: 0.5,
            seed: None,
        }
    }
}

impl Aapso {
    /// Optimizer with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of agents.
    #[must_use]
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Set the iteration budget.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the exploration amplitude schedule.
    #[must_use]
    pub fn with_exploration(mut self, alpha0: f64, decay: f64) -> Self {
        self.alpha0 = alpha0;
        self.alpha_decay = decay;
        self
    }

    /// Set the range of the global-best acceleration.
    #[must_use]
    pub fn with_acceleration(mut self, beta_min: f64, beta_max: f64) -> Self {
        self.beta_min = beta_min;
        self.beta_max = beta_max;
        self
    }

    /// Set the personal-best attraction.
    #[must_use]
    pub fn with_personal_weight(mut self, weight: f64) -> Self {
        self.personal_weight = weight;
        self
    }

    /// Set the binarization threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self, dim: usize) -> Result<()> {
        if self.population_size == 0 {
            return Err(AapsoError::invalid_hyperparameter(
                "population_size",
                self.population_size,
                ">= 1",
            ));
        }
        if dim == 0 {
            return Err(AapsoError::invalid_hyperparameter(
                "dimension",
                dim,
                ">= 1 feature",
            ));
        }
        if !(self.alpha0 >= 0.0 && self.alpha0.is_finite()) {
            return Err(AapsoError::invalid_hyperparameter("alpha0", self.alpha0, ">= 0"));
        }
        if !(self.alpha_decay > 0.0 && self.alpha_decay <= 1.0) {
            return Err(AapsoError::invalid_hyperparameter(
                "alpha_decay",
                self.alpha_decay,
                "in (0, 1]",
            ));
        }
        if !(0.0 <= self.beta_min && self.beta_min <= self.beta_max && self.beta_max <= 1.0) {
            return Err(AapsoError::invalid_hyperparameter(
                "beta",
                format!("[{}, {}]", self.beta_min, self.beta_max),
                "0 <= beta_min <= beta_max <= 1",
            ));
        }
        if !(self.personal_weight >= 0.0 && self.personal_weight.is_finite()) {
            return Err(AapsoError::invalid_hyperparameter(
                "personal_weight",
                self.personal_weight,
                ">= 0",
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(AapsoError::invalid_hyperparameter(
                "threshold",
                self.threshold,
                "in (0, 1)",
            ));
        }
        Ok(())
    }

    /// Scores an agent's mask; masks selecting nothing never reach `fitness`.
    fn score<F: FitnessFunction + ?Sized>(fitness: &F, mask: &[bool]) -> f64 {
        if !mask.iter().any(|&m| m) {
            return WORST_FITNESS;
        }
        let value = fitness.evaluate(mask);
        if value.is_nan() {
            WORST_FITNESS
        } else {
            value
        }
    }

    fn initialize<F: FitnessFunction + ?Sized>(
        &self,
        fitness: &F,
        dim: usize,
        rng: &mut StdRng,
    ) -> Swarm {
        let mut agents: Vec<Agent> = (0..self.population_size)
            .map(|_| Agent::random(dim, rng))
            .collect();

        for agent in &mut agents {
            agent.fitness = Self::score(fitness, &agent.mask(self.threshold));
            agent.personal_best_fitness = agent.fitness;
        }

        let global_best = agents[0].clone();
        let mut swarm = Swarm {
            agents,
            global_best,
        };
        for idx in 1..swarm.agents.len() {
            swarm.offer(idx);
        }
        swarm
    }

    /// Moves one agent, clipping to `[0, 1]`.
    fn step(&self, agent: &mut Agent, global: &[f64], alpha: f64, beta: f64, rng: &mut StdRng) {
        for i in 0..agent.position.len() {
            let r: f64 = rng.gen();
            let eps: f64 = rng.gen();
            let x = agent.position[i];
            let v = beta * (global[i] - x)
                + self.personal_weight * r * (agent.personal_best[i] - x)
                + alpha * (eps - 0.5);
            agent.velocity[i] = v;
            agent.position[i] = (x + v).clamp(0.0, 1.0);
        }
    }

    /// Runs the search.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the fitness
    /// function has zero dimension. Degenerate agents never cause errors.
    pub fn optimize<F: FitnessFunction + ?Sized>(&self, fitness: &F) -> Result<AapsoResult> {
        let dim = fitness.dimension();
        self.validate(dim)?;

        let start = Instant::now();
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let mut swarm = self.initialize(fitness, dim, &mut rng);
        let mut evaluations = self.population_size;
        let mut convergence_curve = Vec::with_capacity(self.max_iter + 1);
        convergence_curve.push(swarm.global_best.fitness);

        info!(
            agents = self.population_size,
            features = dim,
            iterations = self.max_iter,
            initial_best = swarm.global_best.fitness,
            "AAPSO search started"
        );

        for t in 0..self.max_iter {
            let alpha = self.alpha0 * self.alpha_decay.powi(t as i32);
            let beta = self.beta_min
                + (self.beta_max - self.beta_min) * t as f64 / self.max_iter as f64;

            for idx in 0..swarm.agents.len() {
                let global = swarm.global_best.position.clone();
                let agent = &mut swarm.agents[idx];
                self.step(agent, &global, alpha, beta, &mut rng);

                agent.fitness = Self::score(fitness, &agent.mask(self.threshold));
                evaluations += 1;
                if agent.fitness > agent.personal_best_fitness {
                    agent.personal_best_fitness = agent.fitness;
                    agent.personal_best = agent.position.clone();
                }
                swarm.offer(idx);
            }

            convergence_curve.push(swarm.global_best.fitness);
            debug!(
                iteration = t + 1,
                alpha,
                beta,
                best_fitness = swarm.global_best.fitness,
                selected = swarm.global_best.n_selected(self.threshold),
                "AAPSO iteration"
            );
        }

        let best_mask = swarm.global_best.mask(self.threshold);
        let result = AapsoResult {
            best_fitness: swarm.global_best.fitness,
            best_mask,
            best_agent: swarm.global_best,
            convergence_curve,
            final_population: swarm.agents,
            evaluations,
            execution_time: start.elapsed(),
        };

        info!(
            best_fitness = result.best_fitness,
            selected = result.n_selected(),
            evaluations = result.evaluations,
            "AAPSO search finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
#[path = "aapso_tests.rs"]
mod tests;
