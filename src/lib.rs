//! Batch-mode genetic optimizer for university-style recruitment-cycle
//! timetabling.
//!
//! # Modules
//!
//! - **`model`**: The raw job payload (`RawProblemData`) and the derived,
//!   feasibility-checked [`model::ProblemInstance`] every other module reads
//!   from.
//! - **`genotype`**: Per-locus bounds (`GenotypeSchema`) and the candidate
//!   solution type (`Individual`).
//! - **`repair`**: The four-phase deterministic repair operator that
//!   projects a genotype back onto the feasible set.
//! - **`evaluator`**: Weighted multi-category fitness scoring.
//! - **`ga`**: The population-based search `Driver` built on the above.
//! - **`runner`**: Job intake, progress emission, configuration, and the
//!   outer per-job loop — the host-process plumbing around the core.
//!
//! # Architecture
//!
//! `ProblemInstance` is immutable and `Send + Sync`; a host MAY wrap it in
//! `Arc` to run multiple jobs concurrently, each with its own `Driver`,
//! PRNG and population.

pub mod evaluator;
pub mod ga;
pub mod genotype;
pub mod model;
pub mod repair;
pub mod runner;
