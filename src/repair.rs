//! The four-phase deterministic repair operator (§4.3).
//!
//! Repair projects a (possibly infeasible) genotype produced by random
//! init, crossover or mutation back onto the feasible set. It never
//! allocates randomness; every decision is made by scanning ids in
//! ascending order, so two implementations fed the same genotype produce
//! byte-identical output.

use std::collections::HashSet;

use crate::genotype::Individual;
use crate::model::ProblemInstance;

#[derive(Clone, Copy)]
struct StudentRef {
    gene_idx: usize,
}

/// Runs all four repair phases over `individual.genotype` in place.
///
/// Returns `true` if every phase found a feasible placement; `false` means
/// the caller must treat the individual as infeasible (fitness `-1.0`) and
/// is free to discard it. Refuses to run (returns `false`) when `problem`
/// itself is infeasible, since no repaired genotype can satisfy an
/// unsatisfiable problem.
pub fn repair(individual: &mut Individual, problem: &ProblemInstance) -> bool {
    if !problem.is_feasible() {
        return false;
    }

    let groups_num = problem.groups_num();
    let mut group_counts = vec![0u32; groups_num];
    let mut group_students: Vec<Vec<StudentRef>> = vec![Vec::new(); groups_num];

    let mut gene_idx = 0usize;
    for s in 0..problem.students_num() {
        for _ in problem.students_subjects(s) {
            let relative = individual.genotype[gene_idx];
            let abs_group = problem.absolute_group(gene_idx, relative);
            group_counts[abs_group] += 1;
            group_students[abs_group].push(StudentRef { gene_idx });
            gene_idx += 1;
        }
    }

    if !fix_capacity_overflow(individual, problem, &mut group_counts, &mut group_students) {
        return false;
    }
    if !fix_min_enrollment(individual, problem, &mut group_counts, &mut group_students) {
        return false;
    }
    if !fix_schedule(individual, problem, &group_counts) {
        return false;
    }
    check_student_conflicts(individual, problem)
}

/// Phase 1: pop the last-inserted student out of any over-capacity group
/// and reassign to the first non-full sibling in ascending id order.
fn fix_capacity_overflow(
    individual: &mut Individual,
    problem: &ProblemInstance,
    group_counts: &mut [u32],
    group_students: &mut [Vec<StudentRef>],
) -> bool {
    for g in 0..problem.groups_num() {
        while group_counts[g] > problem.group_capacity(g) {
            let subject = problem.subject_of(g);
            let start_g = problem.cumulative_groups()[subject] as usize;
            let end_g = problem.cumulative_groups()[subject + 1] as usize;

            let student = group_students[g].pop().expect("overflowing group must have members");
            group_counts[g] -= 1;

            let target = (start_g..end_g)
                .find(|&t| t != g && group_counts[t] < problem.group_capacity(t));
            match target {
                Some(target) => {
                    let new_relative = (target - start_g) as u32;
                    individual.genotype[student.gene_idx] = new_relative;
                    group_counts[target] += 1;
                    group_students[target].push(student);
                }
                None => return false,
            }
        }
    }
    true
}

/// Phase 2: evacuate groups below their minimum enrollment, preferring
/// sibling targets that are themselves already at or above minimum, then
/// breaking ties by higher current count.
fn fix_min_enrollment(
    individual: &mut Individual,
    problem: &ProblemInstance,
    group_counts: &mut [u32],
    group_students: &mut [Vec<StudentRef>],
) -> bool {
    let min_students = problem.min_students_per_group();
    for subject in 0..problem.subjects_num() {
        let start_g = problem.cumulative_groups()[subject] as usize;
        let end_g = problem.cumulative_groups()[subject + 1] as usize;

        for g in start_g..end_g {
            while group_counts[g] > 0 && group_counts[g] < min_students {
                let student = group_students[g].pop().expect("underflowing group must have members");
                group_counts[g] -= 1;

                let mut best_target: Option<usize> = None;
                for target in start_g..end_g {
                    if target == g || group_counts[target] >= problem.group_capacity(target) {
                        continue;
                    }
                    best_target = Some(match best_target {
                        None => target,
                        Some(current) => {
                            let current_safe = group_counts[current] >= min_students;
                            let candidate_safe = group_counts[target] >= min_students;
                            if !current_safe && candidate_safe {
                                target
                            } else if !current_safe
                                && !candidate_safe
                                && group_counts[target] > group_counts[current]
                            {
                                target
                            } else {
                                current
                            }
                        }
                    });
                }

                match best_target {
                    Some(target) => {
                        let new_relative = (target - start_g) as u32;
                        individual.genotype[student.gene_idx] = new_relative;
                        group_counts[target] += 1;
                        group_students[target].push(student);
                    }
                    None => return false,
                }
            }
        }
    }
    true
}

struct Occupancy {
    room_slots: HashSet<(usize, u32)>,
    teacher_slots: HashSet<(usize, u32)>,
}

impl Occupancy {
    fn conflicts(&self, room: usize, teacher: Option<usize>, start: u32, duration: u32) -> bool {
        for t in 0..duration {
            let ts = start + t;
            if self.room_slots.contains(&(room, ts)) {
                return true;
            }
            if let Some(teacher) = teacher {
                if self.teacher_slots.contains(&(teacher, ts)) {
                    return true;
                }
            }
        }
        false
    }

    fn occupy(&mut self, room: usize, teacher: Option<usize>, start: u32, duration: u32) {
        for t in 0..duration {
            let ts = start + t;
            self.room_slots.insert((room, ts));
            if let Some(teacher) = teacher {
                self.teacher_slots.insert((teacher, ts));
            }
        }
    }
}

fn tags_subset(group_tags: &[u32], room_tags: &[u32]) -> bool {
    group_tags.iter().all(|tag| room_tags.contains(tag))
}

/// Phase 3: walk groups in ascending id order, validate their (start,
/// room) pair, and replace it with the first (day asc, offset asc, room
/// asc) slot that clears every hard constraint if invalid.
fn fix_schedule(individual: &mut Individual, problem: &ProblemInstance, group_counts: &[u32]) -> bool {
    let timeslots_daily = problem.timeslots_daily();
    let days_num = problem.days_in_cycle();
    let rooms_num = problem.rooms_num();

    let mut occupancy = Occupancy {
        room_slots: HashSet::new(),
        teacher_slots: HashSet::new(),
    };
    for r in 0..rooms_num {
        for &ts in problem.room_unavailable(r) {
            occupancy.room_slots.insert((r, ts));
        }
    }
    for t in 0..problem.teachers_num() {
        for &ts in problem.teacher_unavailable(t) {
            occupancy.teacher_slots.insert((t, ts));
        }
    }

    let gene_offset = problem.total_student_subjects();

    for g in 0..problem.groups_num() {
        if group_counts[g] == 0 {
            continue;
        }
        let subject = problem.subject_of(g);
        let duration = problem.subject_duration()[subject];
        let teacher = problem.group_teacher(g);

        let ts_idx = gene_offset + g * 2;
        let room_idx = gene_offset + g * 2 + 1;

        let current_ts = individual.genotype[ts_idx];
        let current_room = individual.genotype[room_idx] as usize;

        let day = problem.day_of(current_ts);
        let mut valid = current_ts + duration <= (day + 1) * timeslots_daily;
        valid &= problem.room_capacity(current_room) >= group_counts[g];
        valid &= tags_subset(problem.groups_tags(g), problem.rooms_tags(current_room));
        if valid {
            valid &= !occupancy.conflicts(current_room, teacher, current_ts, duration);
        }

        let (final_ts, final_room) = if valid {
            (current_ts, current_room)
        } else {
            let replacement = find_replacement_slot(
                problem,
                &occupancy,
                days_num,
                timeslots_daily,
                duration,
                group_counts[g],
                problem.groups_tags(g),
                teacher,
            );
            match replacement {
                Some((ts, room)) => {
                    individual.genotype[ts_idx] = ts;
                    individual.genotype[room_idx] = room as u32;
                    (ts, room)
                }
                None => return false,
            }
        };

        occupancy.occupy(final_room, teacher, final_ts, duration);
    }
    true
}

#[allow(clippy::too_many_arguments)]
fn find_replacement_slot(
    problem: &ProblemInstance,
    occupancy: &Occupancy,
    days_num: u32,
    timeslots_daily: u32,
    duration: u32,
    needed_capacity: u32,
    group_tags: &[u32],
    teacher: Option<usize>,
) -> Option<(u32, usize)> {
    if duration > timeslots_daily {
        return None;
    }
    for day in 0..days_num {
        for offset in 0..=(timeslots_daily - duration) {
            let start_ts = day * timeslots_daily + offset;
            if let Some(teacher) = teacher {
                let teacher_busy = (0..duration)
                    .any(|t| occupancy.teacher_slots.contains(&(teacher, start_ts + t)));
                if teacher_busy {
                    continue;
                }
            }
            for room in 0..problem.rooms_num() {
                if problem.room_capacity(room) < needed_capacity {
                    continue;
                }
                if !tags_subset(group_tags, problem.rooms_tags(room)) {
                    continue;
                }
                if occupancy.conflicts(room, None, start_ts, duration) {
                    continue;
                }
                return Some((start_ts, room));
            }
        }
    }
    None
}

/// Phase 4: reject genotypes where a student's assigned groups (or their
/// personal unavailability) overlap on a timeslot. Not repaired in place —
/// doing so would require undoing Phase 3's already-committed placements.
fn check_student_conflicts(individual: &Individual, problem: &ProblemInstance) -> bool {
    let gene_offset = problem.total_student_subjects();
    let mut gene_idx = 0usize;

    for s in 0..problem.students_num() {
        let mut occupied: HashSet<u32> = problem.student_unavailable(s).iter().copied().collect();
        for _ in problem.students_subjects(s) {
            let relative = individual.genotype[gene_idx];
            let abs_group = problem.absolute_group(gene_idx, relative);
            let subject = problem.subject_of(abs_group);
            let duration = problem.subject_duration()[subject];
            let start_ts = individual.genotype[gene_offset + abs_group * 2];

            for t in 0..duration {
                if !occupied.insert(start_ts + t) {
                    return false;
                }
            }
            gene_idx += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::{GenotypeSchema, Individual};
    use crate::model::RawProblemData;

    fn capacity_overflow_raw() -> RawProblemData {
        RawProblemData {
            timeslots_daily: 4,
            days_in_cycle: 1,
            min_students_per_group: 0,
            groups_per_subject: vec![2],
            subject_duration: vec![1],
            groups_capacity: vec![2, 2],
            rooms_capacity: vec![4],
            groups_tags: vec![],
            rooms_tags: vec![],
            students_subjects: vec![vec![0], vec![0], vec![0], vec![0]],
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
    fn phase1_splits_overflowing_group() {
        let problem = ProblemInstance::new(capacity_overflow_raw());
        assert!(problem.is_feasible());
        let schema = GenotypeSchema::build(&problem);
        let mut genotype = vec![0u32; schema.len()];
        genotype[4] = 0; // timeslot for group 0
        genotype[5] = 0; // room for group 0
        genotype[6] = 1; // timeslot for group 1 (distinct day offset to avoid room conflict)
        genotype[7] = 0;
        let mut individual = Individual::new(genotype);

        assert!(repair(&mut individual, &problem));

        let mut counts = [0u32; 2];
        for &v in &individual.genotype[0..4] {
            counts[v as usize] += 1;
        }
        assert_eq!(counts, [2, 2]);
    }

    fn trivial_raw() -> RawProblemData {
        RawProblemData {
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
        }
    }

    #[test]
    fn trivial_instance_always_repairs() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let problem = ProblemInstance::new(trivial_raw());
        let schema = GenotypeSchema::build(&problem);
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..20 {
            let mut individual = Individual::random(&schema, &mut rng);
            assert!(repair(&mut individual, &problem));
        }
    }

    #[test]
    fn duration_overflow_is_moved_within_day() {
        let mut raw = trivial_raw();
        raw.subject_duration = vec![3];
        let problem = ProblemInstance::new(raw);
        let schema = GenotypeSchema::build(&problem);
        let mut genotype = vec![0u32; schema.len()];
        genotype[0] = 0;
        genotype[1] = 2; // start=2, duration=3 overflows a 4-slot day
        genotype[2] = 0;
        let mut individual = Individual::new(genotype);

        assert!(repair(&mut individual, &problem));
        assert!(individual.genotype[1] <= 1);
    }

    #[test]
    fn room_conflict_is_reassigned_to_first_free_slot() {
        let raw = RawProblemData {
            timeslots_daily: 4,
            days_in_cycle: 1,
            min_students_per_group: 0,
            groups_per_subject: vec![2],
            subject_duration: vec![2],
            groups_capacity: vec![4, 4],
            rooms_capacity: vec![4],
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
        };
        let problem = ProblemInstance::new(raw);
        assert!(problem.is_feasible());
        let schema = GenotypeSchema::build(&problem);
        let mut genotype = vec![0u32; schema.len()];
        genotype[0] = 0;
        genotype[1] = 1;
        genotype[2] = 0; // group 0 at ts=0, room=0
        genotype[3] = 0;
        genotype[4] = 0;
        genotype[5] = 0; // group 1 also at ts=0, room=0 -> conflict
        let mut individual = Individual::new(genotype);

        assert!(repair(&mut individual, &problem));
        let g0 = (individual.genotype[2], individual.genotype[3]);
        let g1 = (individual.genotype[4], individual.genotype[5]);
        assert!(g0 != g1 || g0.1 != g1.1);
    }

    #[test]
    fn repair_is_idempotent() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let problem = ProblemInstance::new(capacity_overflow_raw());
        let schema = GenotypeSchema::build(&problem);
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut individual = Individual::random(&schema, &mut rng);
            repair(&mut individual, &problem);
            let once = individual.genotype.clone();
            repair(&mut individual, &problem);
            assert_eq!(once, individual.genotype);
        }
    }
}
