//! Wire shape of a timetabling job, as received from job intake (§6).

use serde::{Deserialize, Serialize};

/// Per-student soft-preference record.
///
/// Targets the richest of the schemas this system has carried over time:
/// thirteen named categories (A–M), each paired with a signed weight. A
/// negative weight flips the category's raw score (see
/// [`crate::evaluator`]). Fields default to empty/zero when a producer
/// omits them, so older, sparser payloads still deserialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentPreference {
    #[serde(default)]
    pub free_days: i32,
    #[serde(default)]
    pub short_days: i32,
    #[serde(default)]
    pub uniform_days: i32,
    #[serde(default)]
    pub concentrated_days: i32,
    /// `[min_gap, weight]`.
    #[serde(default)]
    pub min_gaps_length: Vec<i32>,
    /// `[max_gap, weight]`.
    #[serde(default)]
    pub max_gaps_length: Vec<i32>,
    /// `[min_length, weight]`.
    #[serde(default)]
    pub min_day_length: Vec<i32>,
    /// `[max_length, weight]`.
    #[serde(default)]
    pub max_day_length: Vec<i32>,
    /// `[target_timeslot, weight]`.
    #[serde(default)]
    pub preferred_day_start_timeslot: Vec<i32>,
    /// `[target_timeslot, weight]`.
    #[serde(default)]
    pub preferred_day_end_timeslot: Vec<i32>,
    /// Rows of `[tag_a, tag_b, weight]`.
    #[serde(default)]
    pub tag_order: Vec<Vec<i32>>,
    /// Signed weight per timeslot index (negative = avoid, positive = prefer).
    #[serde(default)]
    pub preferred_timeslots: Vec<i32>,
    /// Signed weight per group id (student-only category M).
    #[serde(default)]
    pub preferred_groups: Vec<i32>,
}

/// Per-teacher soft-preference record; same surface as
/// [`StudentPreference`] minus category M (`preferred_groups`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeacherPreference {
    #[serde(default)]
    pub free_days: i32,
    #[serde(default)]
    pub short_days: i32,
    #[serde(default)]
    pub uniform_days: i32,
    #[serde(default)]
    pub concentrated_days: i32,
    #[serde(default)]
    pub min_gaps_length: Vec<i32>,
    #[serde(default)]
    pub max_gaps_length: Vec<i32>,
    #[serde(default)]
    pub min_day_length: Vec<i32>,
    #[serde(default)]
    pub max_day_length: Vec<i32>,
    #[serde(default)]
    pub preferred_day_start_timeslot: Vec<i32>,
    #[serde(default)]
    pub preferred_day_end_timeslot: Vec<i32>,
    #[serde(default)]
    pub tag_order: Vec<Vec<i32>>,
    #[serde(default)]
    pub preferred_timeslots: Vec<i32>,
}

/// Raw, unvalidated problem payload for one recruitment-cycle job.
///
/// This is the deserialization target for job intake (§6); `serde_json`
/// maps it directly from the producer's JSON. [`super::ProblemInstance`]
/// is built from this and performs the actual feasibility checking — this
/// type carries no invariants of its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProblemData {
    pub timeslots_daily: u32,
    pub days_in_cycle: u32,
    pub min_students_per_group: u32,
    pub groups_per_subject: Vec<u32>,
    pub subject_duration: Vec<u32>,
    pub groups_capacity: Vec<u32>,
    pub rooms_capacity: Vec<u32>,
    /// Rows of `[group_id, tag_id]`.
    #[serde(default)]
    pub groups_tags: Vec<Vec<u32>>,
    /// Rows of `[room_id, tag_id]`.
    #[serde(default)]
    pub rooms_tags: Vec<Vec<u32>>,
    /// `students_subjects[s]` = ordered subject ids student `s` is enrolled in.
    pub students_subjects: Vec<Vec<u32>>,
    /// `teachers_groups[t]` = group ids taught by teacher `t`.
    #[serde(default)]
    pub teachers_groups: Vec<Vec<u32>>,
    #[serde(default)]
    pub rooms_unavailability_timeslots: Vec<Vec<u32>>,
    #[serde(default)]
    pub students_unavailability_timeslots: Vec<Vec<u32>>,
    #[serde(default)]
    pub teachers_unavailability_timeslots: Vec<Vec<u32>>,
    #[serde(default)]
    pub students_preferences: Vec<StudentPreference>,
    #[serde(default)]
    pub teachers_preferences: Vec<TeacherPreference>,
    /// Aggregate per-student weight `w_s`; missing entries default to 1.0.
    #[serde(default)]
    pub student_weights: Vec<f64>,
    /// Aggregate per-teacher weight `w_t`; missing entries default to 1.0.
    #[serde(default)]
    pub teacher_weights: Vec<f64>,
}
