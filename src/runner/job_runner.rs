//! The outer per-job loop: receive → init Driver → iterate under
//! deadline/cancellation polling → emit snapshots (§5, §6, §7a).

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{error, info};

use crate::evaluator::{decode_individual, Evaluator};
use crate::ga::driver::Driver;
use crate::model::ProblemInstance;
use crate::runner::error::RunnerError;
use crate::runner::job_source::{JobRequest, JobSource};
use crate::runner::progress_sink::{ProgressSink, ProgressSnapshot};

/// Drives one [`JobSource`] to completion, emitting every iteration's elite
/// through a [`ProgressSink`].
///
/// Holds no state across jobs: each call to [`Self::run_job`] seeds its own
/// PRNG and owns its own `Driver` and population, matching §4.5's
/// no-cross-job-shared-mutable-state scheduling model.
pub struct JobRunner {
    seed: Option<u64>,
}

impl JobRunner {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    /// Drains `source` until it has no more work, running each job to
    /// completion. A per-job `RunnerError` is logged and does not abort the
    /// remaining jobs (§7).
    pub fn run_all(&self, source: &mut dyn JobSource, sink: &dyn ProgressSink) {
        while source.has_more() {
            let job = match source.receive() {
                Ok(job) => job,
                Err(err) => {
                    error!(error = %err, "job intake failed");
                    continue;
                }
            };
            let job_id = job.job_id.clone();
            if let Err(err) = self.run_job(job, source, sink) {
                error!(job_id, error = %err, "job failed");
            }
        }
    }

    /// Runs a single job: builds the `ProblemInstance`, initializes the
    /// `Driver`, then iterates until the job's deadline or `source`'s
    /// cancellation predicate fires, emitting one snapshot per iteration
    /// plus a final `iteration = -1` record.
    pub fn run_job(&self, job: JobRequest, source: &dyn JobSource, sink: &dyn ProgressSink) -> Result<(), RunnerError> {
        let job_id = job.job_id.clone();
        info!(job_id, "job accepted");

        let problem = ProblemInstance::new(job.problem);
        if !problem.is_feasible() {
            return Err(RunnerError::InfeasibleProblem {
                job_id,
                reasons: vec!["problem instance failed feasibility checks; see logs".to_string()],
            });
        }

        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        let mut evaluator = Evaluator::new(&problem);
        let mut driver = Driver::new(&problem, rng);
        if !driver.init(&mut evaluator) {
            return Err(RunnerError::InfeasibleProblem {
                job_id,
                reasons: vec!["driver refused to initialize".to_string()],
            });
        }

        let deadline = Duration::from_secs(job.max_execution_time_secs.max(1));
        let started_at = Instant::now();

        let mut iteration: usize = 0;
        let mut terminated_early = false;
        loop {
            if source.check_cancellation() || started_at.elapsed() >= deadline {
                terminated_early = true;
                break;
            }
            driver.run_iteration(iteration, &mut evaluator);
            let snapshot = self.build_snapshot(&job_id, iteration as i64, &problem, &mut evaluator, &mut driver);
            sink.send_progress(snapshot)?;
            iteration += 1;
        }

        if terminated_early {
            let snapshot = self.build_snapshot(&job_id, -1, &problem, &mut evaluator, &mut driver);
            sink.send_progress(snapshot)?;
        }

        info!(job_id, iterations = iteration, "job finished");
        Ok(())
    }

    fn build_snapshot(
        &self,
        job_id: &str,
        iteration: i64,
        problem: &ProblemInstance,
        evaluator: &mut Evaluator,
        driver: &mut Driver<'_, SmallRng>,
    ) -> ProgressSnapshot {
        let elite = driver.elite().cloned().unwrap_or_else(|| crate::genotype::Individual::new(vec![0; problem.genotype_len()]));
        evaluator.evaluate(&mut elite.clone());

        let (student_groups, group_assignments) = decode_individual(problem, &elite.genotype);

        let student_scores: Vec<f64> = evaluator.last_student_scores().iter().map(|e| e.score).collect();
        let teacher_scores: Vec<f64> = evaluator.last_teacher_scores().iter().map(|e| e.score).collect();
        let student_details: Vec<Vec<(f64, f64)>> = evaluator.last_student_scores().iter().map(|e| e.details.clone()).collect();
        let teacher_details: Vec<Vec<(f64, f64)>> = evaluator.last_teacher_scores().iter().map(|e| e.details.clone()).collect();

        let group_assignments_with_end: Vec<(u32, u32, usize)> = group_assignments
            .iter()
            .enumerate()
            .map(|(g, &(ts, room))| {
                let subject = problem.subject_of(g);
                let duration = problem.subject_duration()[subject];
                (ts, ts + duration, room)
            })
            .collect();

        ProgressSnapshot {
            job_id: job_id.to_string(),
            iteration,
            genotype: elite.genotype.clone(),
            fitness: elite.fitness,
            student_groups,
            group_assignments: group_assignments_with_end,
            student_scores,
            teacher_scores,
            student_details,
            teacher_details,
            student_weighted_scores: evaluator.last_student_weighted().to_vec(),
            teacher_weighted_scores: evaluator.last_teacher_weighted().to_vec(),
            total_student_weight: evaluator.last_total_student_weight(),
            total_teacher_weight: evaluator.last_total_teacher_weight(),
            days_in_cycle: problem.days_in_cycle(),
            timeslots_daily: problem.timeslots_daily(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawProblemData;
    use crate::runner::job_source::InMemoryJobSource;
    use crate::runner::progress_sink::InMemoryProgressSink;

    fn trivial_job(job_id: &str) -> JobRequest {
        JobRequest {
            job_id: job_id.to_string(),
            problem: RawProblemData {
                timeslots_daily: 4,
                days_in_cycle: 1,
                min_students_per_group: 0,
                groups_per_subject: vec![1],
                subject_duration: vec![1],
                groups_capacity: vec![1],
                rooms_capacity: vec![1],
                groups_tags: vec![],
                rooms_tags: vec![],
                students_subjects: vec![vec![0]],
                teachers_groups: vec![],
                rooms_unavailability_timeslots: vec![vec![]],
                students_unavailability_timeslots: vec![],
                teachers_unavailability_timeslots: vec![],
                students_preferences: vec![],
                teachers_preferences: vec![],
                student_weights: vec![],
                teacher_weights: vec![],
            },
            max_execution_time_secs: 1,
        }
    }

    #[test]
    fn run_job_emits_a_final_snapshot_on_deadline() {
        let runner = JobRunner::new(Some(1));
        let job = trivial_job("job-1");
        let source = InMemoryJobSource::default();
        let sink = InMemoryProgressSink::new();

        runner.run_job(job, &source, &sink).unwrap();

        let snapshots = sink.snapshots();
        assert!(!snapshots.is_empty());
        assert_eq!(snapshots.last().unwrap().iteration, -1);
    }

    #[test]
    fn run_job_rejects_infeasible_problem() {
        let runner = JobRunner::new(Some(1));
        let mut job = trivial_job("job-2");
        job.problem.groups_per_subject = vec![10];
        job.problem.groups_capacity = vec![1; 10];
        let source = InMemoryJobSource::default();
        let sink = InMemoryProgressSink::new();

        let result = runner.run_job(job, &source, &sink);
        assert!(matches!(result, Err(RunnerError::InfeasibleProblem { .. })));
    }

    #[test]
    fn run_all_drains_the_source_and_logs_past_failures() {
        let runner = JobRunner::new(Some(1));
        let mut source = InMemoryJobSource::new([trivial_job("a"), trivial_job("b")]);
        let sink = InMemoryProgressSink::new();

        runner.run_all(&mut source, &sink);

        assert!(!source.has_more());
        let snapshots = sink.snapshots();
        let job_ids: std::collections::HashSet<String> = snapshots.iter().map(|s| s.job_id.clone()).collect();
        assert!(job_ids.contains("a"));
        assert!(job_ids.contains("b"));
    }
}
