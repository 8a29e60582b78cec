//! Genotype layout, per-locus bounds, and the candidate solution type that
//! flows through [`crate::repair`], [`crate::evaluator`] and
//! [`crate::ga::driver`].

use rand::Rng;

use crate::model::ProblemInstance;

/// Per-locus upper-bound table derived from a [`ProblemInstance`] (§4.2).
///
/// The single source of truth for genotype length and domain: every
/// locus `i` has an inclusive range `[0, max[i]]`. Enrollment loci (one
/// per student-subject slot) bound the *relative* group index within the
/// owning subject; scheduling loci (two per group: timeslot, then room)
/// bound the absolute timeslot and room id.
#[derive(Debug, Clone)]
pub struct GenotypeSchema {
    max: Vec<u32>,
    total_student_subjects: usize,
    groups_num: usize,
}

impl GenotypeSchema {
    /// Builds the bound table for `problem`. Does not check feasibility —
    /// callers are expected to have already checked
    /// [`ProblemInstance::is_feasible`].
    pub fn build(problem: &ProblemInstance) -> Self {
        let mut max = Vec::with_capacity(problem.genotype_len());

        for s in 0..problem.students_num() {
            for &p in problem.students_subjects(s) {
                let groups_in_subject = problem.groups_per_subject()[p as usize];
                max.push(groups_in_subject.saturating_sub(1));
            }
        }

        let total_timeslots = problem.total_timeslots();
        let rooms_num = problem.rooms_num() as u32;
        for _ in 0..problem.groups_num() {
            max.push(total_timeslots.saturating_sub(1));
            max.push(rooms_num.saturating_sub(1));
        }

        Self {
            max,
            total_student_subjects: problem.total_student_subjects(),
            groups_num: problem.groups_num(),
        }
    }

    /// Total number of loci, `N = total_student_subjects + 2 * G`.
    pub fn len(&self) -> usize {
        self.max.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max.is_empty()
    }

    /// Inclusive upper bound for locus `i`.
    pub fn max_value(&self, locus: usize) -> u32 {
        self.max[locus]
    }

    pub fn total_student_subjects(&self) -> usize {
        self.total_student_subjects
    }

    pub fn groups_num(&self) -> usize {
        self.groups_num
    }

    /// First locus of the scheduling segment (§3).
    pub fn scheduling_offset(&self) -> usize {
        self.total_student_subjects
    }

    /// Loci `(timeslot, room)` for group `g`.
    pub fn group_loci(&self, g: usize) -> (usize, usize) {
        let base = self.scheduling_offset() + g * 2;
        (base, base + 1)
    }

    /// Samples a uniform-random genotype bounded by this schema (§4.2).
    pub fn random_genotype<R: Rng>(&self, rng: &mut R) -> Vec<u32> {
        self.max.iter().map(|&m| rng.random_range(0..=m)).collect()
    }
}

/// A candidate solution: a genotype paired with its last-computed fitness
/// (§3). Fitness is `-1.0` for genotypes that failed repair, and in
/// `[0, 1]` otherwise; `f64::NEG_INFINITY` denotes "never evaluated".
#[derive(Debug, Clone)]
pub struct Individual {
    pub genotype: Vec<u32>,
    pub fitness: f64,
}

impl Individual {
    pub fn new(genotype: Vec<u32>) -> Self {
        Self {
            genotype,
            fitness: f64::NEG_INFINITY,
        }
    }

    pub fn random<R: Rng>(schema: &GenotypeSchema, rng: &mut R) -> Self {
        Self::new(schema.random_genotype(rng))
    }

    pub fn is_feasible(&self) -> bool {
        self.fitness >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawProblemData;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn two_group_raw() -> RawProblemData {
        RawProblemData {
            timeslots_daily: 4,
            days_in_cycle: 2,
            min_students_per_group: 0,
            groups_per_subject: vec![2],
            subject_duration: vec![1],
            groups_capacity: vec![2, 2],
            rooms_capacity: vec![2],
            groups_tags: vec![],
            rooms_tags: vec![],
            students_subjects: vec![vec![0], vec![0]],
            teachers_groups: vec![],
            rooms_unavailability_timeslots: vec![vec![]],
            students_unavailability_timeslots: vec![],
            teachers_unavailability_timeslots: vec![],
            students_preferences: vec![],
            teachers_preferences: vec![],
            student_weights: vec![],
            teacher_weights: vec![],
        }
    }

    #[test]
    fn schema_length_matches_problem() {
        let problem = ProblemInstance::new(two_group_raw());
        let schema = GenotypeSchema::build(&problem);
        assert_eq!(schema.len(), problem.genotype_len());
        assert_eq!(schema.len(), 2 + 2 * 2);
    }

    #[test]
    fn enrollment_loci_bounded_by_groups_per_subject() {
        let problem = ProblemInstance::new(two_group_raw());
        let schema = GenotypeSchema::build(&problem);
        assert_eq!(schema.max_value(0), 1);
        assert_eq!(schema.max_value(1), 1);
    }

    #[test]
    fn random_genotype_respects_bounds() {
        let problem = ProblemInstance::new(two_group_raw());
        let schema = GenotypeSchema::build(&problem);
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            let g = schema.random_genotype(&mut rng);
            for (i, &v) in g.iter().enumerate() {
                assert!(v <= schema.max_value(i));
            }
        }
    }
}
