//! Population-based search over the genotype/repair/evaluator core (§4.5).
//!
//! # Quick Start
//!
//! ```no_run
//! use rand::rngs::SmallRng;
//! use rand::SeedableRng;
//! use u_timetable::evaluator::Evaluator;
//! use u_timetable::ga::Driver;
//! use u_timetable::model::{ProblemInstance, RawProblemData};
//!
//! let problem = ProblemInstance::new(RawProblemData::default());
//! let mut evaluator = Evaluator::new(&problem);
//! let mut driver = Driver::new(&problem, SmallRng::seed_from_u64(42));
//! if driver.init(&mut evaluator) {
//!     driver.run_iteration(0, &mut evaluator);
//!     let elite = driver.elite();
//!     println!("{:?}", elite.map(|e| e.fitness));
//! }
//! ```

pub mod driver;

pub use driver::{Driver, DriverState};
