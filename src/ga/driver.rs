//! The genetic [`Driver`]: population-based search over A–D (§4.5).
//!
//! Owns the PRNG and the population for one job's lifetime. Runs
//! single-threaded; a host wanting concurrent jobs runs one `Driver` per
//! job, each against its own `ProblemInstance` borrow.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::evaluator::Evaluator;
use crate::genotype::{GenotypeSchema, Individual};
use crate::model::ProblemInstance;

/// Population size held by every inner-pass sub-phase (§4.5).
pub const POP: usize = 128;
/// Per-slot cap on random-genotype sampling attempts during [`Driver::init`].
pub const MAX_INIT_ATTEMPTS: usize = 1000;
/// Inner passes per [`Driver::run_iteration`] call.
pub const INNER_LOOP: usize = 10;
/// Random (parent, parent, target) triples drawn per crossover phase.
pub const CROSS_SIZE: usize = 64;
/// Per-individual mutation probability.
pub const MUTATION_PROBABILITY: f64 = 0.03;
/// Minimum/maximum number of loci touched by one mutation event.
pub const MUTATION_MIN_LOCI: u32 = 1;
pub const MUTATION_MAX_LOCI: u32 = 5;

/// `Driver`'s lifecycle (§4.5): a job moves through these states exactly
/// once, in order, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initialized,
    Iterating,
    Stopped,
}

/// Population-based search over [`GenotypeSchema`]-bounded genotypes.
///
/// Every candidate is kept repaired and evaluated; the best individual ever
/// seen (the "elite") is tracked separately from the working population and
/// only ever replaced by a strictly better candidate.
pub struct Driver<'a, R: Rng> {
    problem: &'a ProblemInstance,
    schema: GenotypeSchema,
    rng: R,
    population: Vec<Individual>,
    elite: Option<Individual>,
    state: DriverState,
}

impl<'a, R: Rng> Driver<'a, R> {
    /// Builds a driver in [`DriverState::Uninitialized`]. Call
    /// [`Self::init`] before [`Self::run_iteration`].
    pub fn new(problem: &'a ProblemInstance, rng: R) -> Self {
        Self {
            problem,
            schema: GenotypeSchema::build(problem),
            rng,
            population: Vec::new(),
            elite: None,
            state: DriverState::Uninitialized,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn elite(&self) -> Option<&Individual> {
        self.elite.as_ref()
    }

    pub fn schema(&self) -> &GenotypeSchema {
        &self.schema
    }

    /// Seeds the population from `problem`. Refuses (returns `false`,
    /// leaving the state `Uninitialized`) when `problem` is infeasible —
    /// callers should surface this as `RunnerError::InfeasibleProblem`
    /// rather than constructing a `Driver` at all, but this guard keeps
    /// `init` itself total.
    pub fn init(&mut self, evaluator: &mut Evaluator) -> bool {
        if !self.problem.is_feasible() {
            return false;
        }

        self.population = Vec::with_capacity(POP);
        for _ in 0..POP {
            let mut best_attempt: Option<Individual> = None;
            for _ in 0..MAX_INIT_ATTEMPTS {
                let mut candidate = Individual::random(&self.schema, &mut self.rng);
                let fitness = evaluator.evaluate(&mut candidate);
                if fitness >= 0.0 {
                    best_attempt = Some(candidate);
                    break;
                }
                if best_attempt.is_none() {
                    best_attempt = Some(candidate);
                }
            }
            let individual = best_attempt.expect("POP > 0 implies at least one attempt runs");
            self.consider_elite(&individual);
            self.population.push(individual);
        }

        self.state = DriverState::Initialized;
        true
    }

    fn consider_elite(&mut self, candidate: &Individual) {
        let is_better = match &self.elite {
            None => candidate.fitness >= 0.0,
            Some(current) => candidate.fitness > current.fitness,
        };
        if is_better {
            debug!(fitness = candidate.fitness, "new elite individual");
            self.elite = Some(candidate.clone());
        }
    }

    /// Runs one outer iteration: [`INNER_LOOP`] inner passes of crossover,
    /// mutation, then FIHC (§4.5). Must be called after [`Self::init`].
    pub fn run_iteration(&mut self, iteration: usize, evaluator: &mut Evaluator) {
        self.state = DriverState::Iterating;
        for _ in 0..INNER_LOOP {
            self.crossover_pass(evaluator);
            self.mutation_pass(evaluator);
            self.fihc_pass(evaluator);
        }
        debug!(iteration, fitness = self.elite.as_ref().map(|e| e.fitness), "iteration complete");
    }

    pub fn stop(&mut self) {
        self.state = DriverState::Stopped;
    }

    fn crossover_pass(&mut self, evaluator: &mut Evaluator) {
        if self.population.is_empty() {
            return;
        }
        for _ in 0..CROSS_SIZE {
            let p1 = self.rng.random_range(0..self.population.len());
            let p2 = self.rng.random_range(0..self.population.len());
            let target = self.rng.random_range(0..self.population.len());

            let len = self.schema.len();
            let mut child_genotype = Vec::with_capacity(len);
            for locus in 0..len {
                let source = if self.rng.random_bool(0.5) { p1 } else { p2 };
                child_genotype.push(self.population[source].genotype[locus]);
            }

            let mut child = Individual::new(child_genotype);
            evaluator.evaluate(&mut child);
            self.consider_elite(&child);
            self.population[target] = child;
        }
        debug!("crossover pass complete");
    }

    fn mutation_pass(&mut self, evaluator: &mut Evaluator) {
        let mutation_size = POP.min(self.population.len());
        for idx in 0..mutation_size {
            if !self.rng.random_bool(MUTATION_PROBABILITY) {
                continue;
            }
            let touches = self.rng.random_range(MUTATION_MIN_LOCI..=MUTATION_MAX_LOCI);
            let len = self.schema.len();
            if len == 0 {
                continue;
            }
            for _ in 0..touches {
                let locus = self.rng.random_range(0..len);
                let max = self.schema.max_value(locus);
                self.population[idx].genotype[locus] = self.rng.random_range(0..=max);
            }
            evaluator.evaluate(&mut self.population[idx]);
            let mutated = self.population[idx].clone();
            self.consider_elite(&mutated);
        }
        debug!("mutation pass complete");
    }

    /// Auto-sized FIHC sample count (§4.5):
    /// `min(POP * 1000 / (1 + max_locus * N), POP)`.
    fn fihc_size(&self) -> usize {
        let n = self.schema.len() as u64;
        if n == 0 {
            return 0;
        }
        let max_locus = (0..n as usize).map(|i| self.schema.max_value(i) as u64).max().unwrap_or(0);
        let denom = 1 + max_locus * n;
        let sized = (POP as u64 * 1000) / denom.max(1);
        (sized as usize).min(POP).min(self.population.len())
    }

    fn fihc_pass(&mut self, evaluator: &mut Evaluator) {
        let sample_size = self.fihc_size();
        if sample_size == 0 || self.population.is_empty() {
            return;
        }

        let mut indices: Vec<usize> = (0..self.population.len()).collect();
        indices.shuffle(&mut self.rng);
        indices.truncate(sample_size);

        let len = self.schema.len();
        for idx in indices {
            let mut loci: Vec<usize> = (0..len).collect();
            loci.shuffle(&mut self.rng);

            for locus in loci {
                let original_value = self.population[idx].genotype[locus];
                let max = self.schema.max_value(locus);
                let current_fitness = self.population[idx].fitness;

                let mut found_improvement = false;
                for candidate_value in 0..=max {
                    if candidate_value == original_value {
                        continue;
                    }
                    let mut trial = self.population[idx].clone();
                    trial.genotype[locus] = candidate_value;
                    evaluator.evaluate(&mut trial);
                    if trial.fitness > current_fitness {
                        self.population[idx] = trial;
                        found_improvement = true;
                        break;
                    }
                }
                if found_improvement {
                    let improved = self.population[idx].clone();
                    self.consider_elite(&improved);
                }
            }
        }
        debug!("FIHC pass complete");
    }
}
