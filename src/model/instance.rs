//! [`ProblemInstance`]: the immutable, derived view over a raw job payload
//! that [`crate::repair`], [`crate::evaluator`] and [`crate::ga::driver`]
//! all read from for the lifetime of a job.

use tracing::{error, warn};

use super::raw::{RawProblemData, StudentPreference, TeacherPreference};

/// Derived, validated view over a [`RawProblemData`] payload.
///
/// Constructed once per job and shared read-only by every downstream
/// component (§3, §5). Construction never panics; a structurally broken
/// job is represented by `is_feasible() == false` rather than an `Err`,
/// since "this job cannot be scheduled" is an expected outcome, not a bug.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    raw: RawProblemData,
    total_timeslots: u32,
    cumulative_groups: Vec<u32>,
    subject_total_capacity: Vec<u32>,
    subject_student_count: Vec<u32>,
    total_student_subjects: usize,
    enrollment_locus_subject: Vec<u32>,
    groups_tags_indexed: Vec<Vec<u32>>,
    rooms_tags_indexed: Vec<Vec<u32>>,
    group_teacher: Vec<Option<u32>>,
    feasible: bool,
}

impl ProblemInstance {
    /// Builds the derived view and runs the feasibility check.
    ///
    /// Always succeeds structurally; check [`Self::is_feasible`] before
    /// handing the instance to [`crate::ga::driver::Driver`].
    pub fn new(raw: RawProblemData) -> Self {
        let total_timeslots = raw.timeslots_daily * raw.days_in_cycle;

        let subjects_num = raw.groups_per_subject.len();
        let mut cumulative_groups = Vec::with_capacity(subjects_num + 1);
        cumulative_groups.push(0u32);
        for &count in &raw.groups_per_subject {
            let last = *cumulative_groups.last().unwrap();
            cumulative_groups.push(last + count);
        }
        let groups_num = *cumulative_groups.last().unwrap_or(&0) as usize;

        let mut subject_total_capacity = vec![0u32; subjects_num];
        for p in 0..subjects_num {
            let start = cumulative_groups[p] as usize;
            let end = cumulative_groups[p + 1] as usize;
            subject_total_capacity[p] = raw
                .groups_capacity
                .get(start..end)
                .map(|slice| slice.iter().sum())
                .unwrap_or(0);
        }

        let mut subject_student_count = vec![0u32; subjects_num];
        let mut enrollment_locus_subject = Vec::new();
        for subjects in &raw.students_subjects {
            for &p in subjects {
                enrollment_locus_subject.push(p);
                if let Some(slot) = subject_student_count.get_mut(p as usize) {
                    *slot += 1;
                }
            }
        }
        let total_student_subjects = enrollment_locus_subject.len();

        let mut groups_tags_indexed = vec![Vec::new(); groups_num];
        for pair in &raw.groups_tags {
            if let [g, tag] = pair.as_slice() {
                if let Some(slot) = groups_tags_indexed.get_mut(*g as usize) {
                    slot.push(*tag);
                }
            }
        }
        let rooms_num = raw.rooms_unavailability_timeslots.len();
        let mut rooms_tags_indexed = vec![Vec::new(); rooms_num];
        for pair in &raw.rooms_tags {
            if let [r, tag] = pair.as_slice() {
                if let Some(slot) = rooms_tags_indexed.get_mut(*r as usize) {
                    slot.push(*tag);
                }
            }
        }

        let mut group_teacher = vec![None; groups_num];
        for (t, groups) in raw.teachers_groups.iter().enumerate() {
            for &g in groups {
                if let Some(slot) = group_teacher.get_mut(g as usize) {
                    *slot = Some(t as u32);
                }
            }
        }

        let mut instance = Self {
            raw,
            total_timeslots,
            cumulative_groups,
            subject_total_capacity,
            subject_student_count,
            total_student_subjects,
            enrollment_locus_subject,
            groups_tags_indexed,
            rooms_tags_indexed,
            group_teacher,
            feasible: false,
        };
        instance.feasible = instance.check_feasibility();
        instance
    }

    /// Runs the §3 invariants, logging diagnostics through `tracing`.
    ///
    /// Fatal invariants (dangling references, size misalignment, capacity
    /// shortfall, pigeonhole overflow, over-long subject durations) set the
    /// return value to `false`. Preference-vector size mismatches are
    /// logged as warnings and otherwise ignored — missing entries are
    /// treated as zero-weight by the evaluator.
    fn check_feasibility(&self) -> bool {
        let mut ok = true;
        let subjects_num = self.subjects_num();
        let groups_num = self.groups_num();
        let rooms_num = self.rooms_num();

        if self.raw.subject_duration.len() != subjects_num {
            error!(
                expected = subjects_num,
                actual = self.raw.subject_duration.len(),
                "subject_duration size mismatch"
            );
            ok = false;
        }
        if self.raw.groups_capacity.len() != groups_num {
            error!(
                expected = groups_num,
                actual = self.raw.groups_capacity.len(),
                "groups_capacity size mismatch"
            );
            ok = false;
        }

        for (s, subjects) in self.raw.students_subjects.iter().enumerate() {
            for &p in subjects {
                if p as usize >= subjects_num {
                    error!(student = s, subject = p, "student references unknown subject");
                    ok = false;
                }
            }
        }
        for (t, groups) in self.raw.teachers_groups.iter().enumerate() {
            for &g in groups {
                if g as usize >= groups_num {
                    error!(teacher = t, group = g, "teacher references unknown group");
                    ok = false;
                }
            }
        }
        for pair in &self.raw.groups_tags {
            if let [g, _] = pair.as_slice() {
                if *g as usize >= groups_num {
                    error!(group = g, "groups_tags references unknown group");
                    ok = false;
                }
            }
        }
        for pair in &self.raw.rooms_tags {
            if let [r, _] = pair.as_slice() {
                if *r as usize >= rooms_num {
                    error!(room = r, "rooms_tags references unknown room");
                    ok = false;
                }
            }
        }

        for p in 0..subjects_num {
            if self.subject_total_capacity[p] < self.subject_student_count[p] {
                error!(
                    subject = p,
                    capacity = self.subject_total_capacity[p],
                    demand = self.subject_student_count[p],
                    "subject capacity shortfall"
                );
                ok = false;
            }
        }

        if groups_num as u64 > self.total_timeslots as u64 * rooms_num as u64 {
            error!(
                groups = groups_num,
                total_timeslots = self.total_timeslots,
                rooms = rooms_num,
                "not enough room-slots for all groups (pigeonhole)"
            );
            ok = false;
        }

        for (p, &duration) in self.raw.subject_duration.iter().enumerate() {
            if duration == 0 || duration > self.raw.timeslots_daily {
                error!(subject = p, duration, "subject duration out of [1, timeslots_daily]");
                ok = false;
            }
        }

        if !self.raw.student_weights.is_empty()
            && self.raw.student_weights.len() != self.students_num()
        {
            warn!(
                expected = self.students_num(),
                actual = self.raw.student_weights.len(),
                "student_weights size mismatch, missing entries default to 1.0"
            );
        }
        if !self.raw.teacher_weights.is_empty()
            && self.raw.teacher_weights.len() != self.teachers_num()
        {
            warn!(
                expected = self.teachers_num(),
                actual = self.raw.teacher_weights.len(),
                "teacher_weights size mismatch, missing entries default to 1.0"
            );
        }

        ok
    }

    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    pub fn timeslots_daily(&self) -> u32 {
        self.raw.timeslots_daily
    }

    pub fn days_in_cycle(&self) -> u32 {
        self.raw.days_in_cycle
    }

    pub fn total_timeslots(&self) -> u32 {
        self.total_timeslots
    }

    pub fn min_students_per_group(&self) -> u32 {
        self.raw.min_students_per_group
    }

    pub fn subjects_num(&self) -> usize {
        self.raw.groups_per_subject.len()
    }

    pub fn groups_num(&self) -> usize {
        self.cumulative_groups.last().copied().unwrap_or(0) as usize
    }

    pub fn rooms_num(&self) -> usize {
        self.raw.rooms_unavailability_timeslots.len()
    }

    pub fn students_num(&self) -> usize {
        self.raw.students_subjects.len()
    }

    pub fn teachers_num(&self) -> usize {
        self.raw.teachers_groups.len()
    }

    pub fn groups_per_subject(&self) -> &[u32] {
        &self.raw.groups_per_subject
    }

    pub fn subject_duration(&self) -> &[u32] {
        &self.raw.subject_duration
    }

    pub fn group_capacity(&self, g: usize) -> u32 {
        self.raw.groups_capacity[g]
    }

    pub fn room_capacity(&self, r: usize) -> u32 {
        self.raw.rooms_capacity[r]
    }

    pub fn cumulative_groups(&self) -> &[u32] {
        &self.cumulative_groups
    }

    pub fn subject_total_capacity(&self) -> &[u32] {
        &self.subject_total_capacity
    }

    pub fn subject_student_count(&self) -> &[u32] {
        &self.subject_student_count
    }

    pub fn total_student_subjects(&self) -> usize {
        self.total_student_subjects
    }

    pub fn students_subjects(&self, s: usize) -> &[u32] {
        &self.raw.students_subjects[s]
    }

    pub fn teachers_groups(&self, t: usize) -> &[u32] {
        &self.raw.teachers_groups[t]
    }

    pub fn group_teacher(&self, g: usize) -> Option<usize> {
        self.group_teacher[g].map(|t| t as usize)
    }

    pub fn groups_tags(&self, g: usize) -> &[u32] {
        &self.groups_tags_indexed[g]
    }

    pub fn rooms_tags(&self, r: usize) -> &[u32] {
        &self.rooms_tags_indexed[r]
    }

    pub fn room_unavailable(&self, r: usize) -> &[u32] {
        &self.raw.rooms_unavailability_timeslots[r]
    }

    pub fn student_unavailable(&self, s: usize) -> &[u32] {
        self.raw
            .students_unavailability_timeslots
            .get(s)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn teacher_unavailable(&self, t: usize) -> &[u32] {
        self.raw
            .teachers_unavailability_timeslots
            .get(t)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn student_preference(&self, s: usize) -> Option<&StudentPreference> {
        self.raw.students_preferences.get(s)
    }

    pub fn teacher_preference(&self, t: usize) -> Option<&TeacherPreference> {
        self.raw.teachers_preferences.get(t)
    }

    pub fn student_weight(&self, s: usize) -> f64 {
        self.raw.student_weights.get(s).copied().unwrap_or(1.0)
    }

    pub fn teacher_weight(&self, t: usize) -> f64 {
        self.raw.teacher_weights.get(t).copied().unwrap_or(1.0)
    }

    /// Genotype length `N = total_student_subjects + 2 * G` (§3).
    pub fn genotype_len(&self) -> usize {
        self.total_student_subjects + 2 * self.groups_num()
    }

    pub fn day_of(&self, timeslot: u32) -> u32 {
        timeslot / self.raw.timeslots_daily
    }

    /// Owning subject of group `g`, via binary search over the cumulative
    /// offsets (§4.1).
    pub fn subject_of(&self, g: usize) -> usize {
        match self.cumulative_groups.binary_search(&(g as u32)) {
            Ok(idx) if idx < self.cumulative_groups.len() - 1 => idx,
            Ok(idx) => idx - 1,
            Err(idx) => idx - 1,
        }
    }

    /// Subject owning enrollment locus `locus` (i.e. the locus'
    /// student-subject slot).
    pub fn subject_of_enrollment_locus(&self, locus: usize) -> usize {
        self.enrollment_locus_subject[locus] as usize
    }

    /// Maps an enrollment locus' relative group index to an absolute group
    /// id, by looking up the owning subject's cumulative offset (§4.1).
    pub fn absolute_group(&self, enrollment_locus: usize, relative_value: u32) -> usize {
        let subject = self.subject_of_enrollment_locus(enrollment_locus);
        (self.cumulative_groups[subject] + relative_value) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            students_unavailability_timeslots: vec![vec![]],
            teachers_unavailability_timeslots: vec![],
            students_preferences: vec![],
            teachers_preferences: vec![],
            student_weights: vec![],
            teacher_weights: vec![],
        }
    }

    #[test]
    fn trivial_instance_is_feasible() {
        let inst = ProblemInstance::new(trivial_raw());
        assert!(inst.is_feasible());
        assert_eq!(inst.groups_num(), 1);
        assert_eq!(inst.genotype_len(), 1 + 2);
    }

    #[test]
    fn pigeonhole_violation_is_infeasible() {
        let mut raw = trivial_raw();
        raw.groups_per_subject = vec![10];
        raw.groups_capacity = vec![1; 10];
        raw.subject_duration = vec![1];
        let inst = ProblemInstance::new(raw);
        assert!(!inst.is_feasible());
    }

    #[test]
    fn capacity_shortfall_is_infeasible() {
        let mut raw = trivial_raw();
        raw.students_subjects = vec![vec![0], vec![0]];
        raw.groups_capacity = vec![1];
        let inst = ProblemInstance::new(raw);
        assert!(!inst.is_feasible());
    }

    #[test]
    fn absolute_group_resolves_relative_index() {
        let mut raw = trivial_raw();
        raw.groups_per_subject = vec![2];
        raw.groups_capacity = vec![1, 1];
        raw.students_subjects = vec![vec![0]];
        let inst = ProblemInstance::new(raw);
        assert_eq!(inst.absolute_group(0, 0), 0);
        assert_eq!(inst.absolute_group(0, 1), 1);
    }
}
