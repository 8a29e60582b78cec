//! Fitness evaluation: thirteen weighted preference categories (A–M, §4.4)
//! aggregated per student/teacher, then combined into one aggregate score.

use tracing::error;

use crate::genotype::Individual;
use crate::model::{ProblemInstance, StudentPreference, TeacherPreference};
use crate::repair::repair;
use crate::runner::error::RunnerError;

/// Shared surface of [`StudentPreference`] and [`TeacherPreference`] —
/// every category except M (`preferred_groups`, student-only).
trait PreferenceLike {
    fn free_days(&self) -> i32;
    fn short_days(&self) -> i32;
    fn uniform_days(&self) -> i32;
    fn concentrated_days(&self) -> i32;
    fn min_gaps_length(&self) -> &[i32];
    fn max_gaps_length(&self) -> &[i32];
    fn min_day_length(&self) -> &[i32];
    fn max_day_length(&self) -> &[i32];
    fn preferred_day_start_timeslot(&self) -> &[i32];
    fn preferred_day_end_timeslot(&self) -> &[i32];
    fn tag_order(&self) -> &[Vec<i32>];
    fn preferred_timeslots(&self) -> &[i32];
}

macro_rules! impl_preference_like {
    ($t:ty) => {
        impl PreferenceLike for $t {
            fn free_days(&self) -> i32 {
                self.free_days
            }
            fn short_days(&self) -> i32 {
                self.short_days
            }
            fn uniform_days(&self) -> i32 {
                self.uniform_days
            }
            fn concentrated_days(&self) -> i32 {
                self.concentrated_days
            }
            fn min_gaps_length(&self) -> &[i32] {
                &self.min_gaps_length
            }
            fn max_gaps_length(&self) -> &[i32] {
                &self.max_gaps_length
            }
            fn min_day_length(&self) -> &[i32] {
                &self.min_day_length
            }
            fn max_day_length(&self) -> &[i32] {
                &self.max_day_length
            }
            fn preferred_day_start_timeslot(&self) -> &[i32] {
                &self.preferred_day_start_timeslot
            }
            fn preferred_day_end_timeslot(&self) -> &[i32] {
                &self.preferred_day_end_timeslot
            }
            fn tag_order(&self) -> &[Vec<i32>] {
                &self.tag_order
            }
            fn preferred_timeslots(&self) -> &[i32] {
                &self.preferred_timeslots
            }
        }
    };
}

impl_preference_like!(StudentPreference);
impl_preference_like!(TeacherPreference);

/// A single scheduled class within a day, used to compute day-length and
/// gap-based categories.
#[derive(Clone, Copy)]
struct DayClass {
    timeslot: u32,
    duration: u32,
}

fn add_detail(details: &mut Vec<(f64, f64)>, score_sum: &mut f64, weight_sum: &mut f64, raw: f64, weight: f64) {
    let mut final_score = raw.clamp(0.0, 1.0);
    if weight < 0.0 {
        final_score = 1.0 - final_score;
    }
    let abs_weight = weight.abs();
    details.push((final_score, abs_weight));
    *score_sum += final_score * abs_weight;
    *weight_sum += abs_weight;
}

fn limit_weight(v: &[i32]) -> Option<(f64, f64)> {
    if v.len() >= 2 && v[1] != 0 {
        Some((v[0] as f64, v[1] as f64))
    } else {
        None
    }
}

/// Computes the shared A–L categories for one student or teacher.
///
/// `my_groups` are the entity's assigned absolute group ids;
/// `group_assignments[g] = (start_timeslot, room)`. `group_counts[g]` lets
/// this function ignore groups that Phase 3 never placed (count 0, e.g. a
/// teacher's group evacuated empty by Phase 2) — their scheduling loci are
/// unvalidated genotype noise, not a real class.
fn score_shared_categories<P: PreferenceLike>(
    pref: &P,
    my_groups: &[usize],
    problem: &ProblemInstance,
    group_assignments: &[(u32, usize)],
    group_counts: &[u32],
) -> (f64, Vec<(f64, f64)>) {
    let days_num = problem.days_in_cycle();
    let timeslots_daily = problem.timeslots_daily();

    let active_groups: Vec<usize> = my_groups.iter().copied().filter(|&g| group_counts[g] > 0).collect();
    let my_groups = active_groups.as_slice();

    let mut day_classes: Vec<Vec<DayClass>> = vec![Vec::new(); days_num as usize];
    for &g in my_groups {
        let subject = problem.subject_of(g);
        let duration = problem.subject_duration()[subject];
        let (ts, _room) = group_assignments[g];
        let day = problem.day_of(ts);
        if (day as usize) < day_classes.len() {
            day_classes[day as usize].push(DayClass { timeslot: ts, duration });
        }
    }
    let mut days_with_classes = 0u32;
    for day in day_classes.iter_mut() {
        if !day.is_empty() {
            day.sort_by_key(|c| c.timeslot);
            days_with_classes += 1;
        }
    }

    let mut score_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut details: Vec<(f64, f64)> = Vec::with_capacity(13);

    // a) FreeDays
    if pref.free_days() != 0 {
        let ratio = (days_num as f64 - days_with_classes as f64) / days_num as f64;
        add_detail(&mut details, &mut score_sum, &mut weight_sum, ratio, pref.free_days() as f64);
    } else {
        add_detail(&mut details, &mut score_sum, &mut weight_sum, 1.0, 0.0);
    }

    // b) ShortDays
    if pref.short_days() != 0 && days_with_classes > 0 {
        let mut total_shortness = 0.0;
        for day in &day_classes {
            if let Some((start, end)) = day_span(day, timeslots_daily) {
                let length = end - start + 1;
                total_shortness += (timeslots_daily as f64 - length as f64) / timeslots_daily as f64;
            }
        }
        add_detail(
            &mut details,
            &mut score_sum,
            &mut weight_sum,
            total_shortness / days_with_classes as f64,
            pref.short_days() as f64,
        );
    } else {
        add_detail(&mut details, &mut score_sum, &mut weight_sum, 1.0, 0.0);
    }

    // c) UniformDays
    if pref.uniform_days() != 0 && days_with_classes > 1 {
        let lengths: Vec<f64> = day_classes
            .iter()
            .filter_map(|day| day_span(day, timeslots_daily))
            .map(|(start, end)| (end - start + 1) as f64)
            .collect();
        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
        let std_dev = variance.sqrt();
        let max_std_dev = timeslots_daily as f64 / 2.0;
        let uniformity = 1.0 - std_dev / max_std_dev;
        add_detail(&mut details, &mut score_sum, &mut weight_sum, uniformity, pref.uniform_days() as f64);
    } else {
        add_detail(&mut details, &mut score_sum, &mut weight_sum, 1.0, 0.0);
    }

    // d) ConcentratedDays
    if pref.concentrated_days() != 0 {
        let mut transitions = 0u32;
        for d in 0..days_num as usize {
            let current_busy = !day_classes[d].is_empty();
            let next_busy = !day_classes[(d + 1) % days_num as usize].is_empty();
            if current_busy != next_busy {
                transitions += 1;
            }
        }
        let concentration = 1.0 - transitions as f64 / days_num as f64;
        add_detail(&mut details, &mut score_sum, &mut weight_sum, concentration, pref.concentrated_days() as f64);
    } else {
        add_detail(&mut details, &mut score_sum, &mut weight_sum, 1.0, 0.0);
    }

    // e/f) MinGaps / MaxGaps
    score_gap_category(pref.min_gaps_length(), &day_classes, true, &mut details, &mut score_sum, &mut weight_sum);
    score_gap_category(pref.max_gaps_length(), &day_classes, false, &mut details, &mut score_sum, &mut weight_sum);

    // g/h) MinDayLength / MaxDayLength
    score_day_length_category(
        pref.min_day_length(),
        &day_classes,
        timeslots_daily,
        days_with_classes,
        true,
        &mut details,
        &mut score_sum,
        &mut weight_sum,
    );
    score_day_length_category(
        pref.max_day_length(),
        &day_classes,
        timeslots_daily,
        days_with_classes,
        false,
        &mut details,
        &mut score_sum,
        &mut weight_sum,
    );

    // i) PreferredStart
    if let Some((target, weight)) = limit_weight(pref.preferred_day_start_timeslot()) {
        score_target_category(&day_classes, timeslots_daily, days_with_classes, target, weight, true, &mut details, &mut score_sum, &mut weight_sum);
    } else {
        add_detail(&mut details, &mut score_sum, &mut weight_sum, 1.0, 0.0);
    }

    // j) PreferredEnd
    if let Some((target, weight)) = limit_weight(pref.preferred_day_end_timeslot()) {
        score_target_category(&day_classes, timeslots_daily, days_with_classes, target, weight, false, &mut details, &mut score_sum, &mut weight_sum);
    } else {
        add_detail(&mut details, &mut score_sum, &mut weight_sum, 1.0, 0.0);
    }

    // k) TagOrder
    score_tag_order(pref.tag_order(), my_groups, problem, group_assignments, days_num, &mut details, &mut score_sum, &mut weight_sum);

    // l) PreferredTimeslots
    score_preferred_timeslots(pref.preferred_timeslots(), my_groups, problem, group_assignments, &mut details, &mut score_sum, &mut weight_sum);

    normalize(score_sum, weight_sum, details)
}

/// Turns accumulated `(score_sum, weight_sum)` into a final `[0, 1]` score,
/// defaulting to `1.0` when nothing contributed any weight.
fn normalize(score_sum: f64, weight_sum: f64, details: Vec<(f64, f64)>) -> (f64, Vec<(f64, f64)>) {
    if weight_sum < 1e-9 {
        (1.0, details)
    } else {
        ((score_sum / weight_sum).clamp(0.0, 1.0), details)
    }
}

/// `(start, end)` within-day offsets spanning the day's classes, or `None`
/// if the day has no classes (or, defensively, if a class's placement
/// doesn't fit within one day — Phase 3 guarantees this never happens for
/// a group Repair actually placed, but callers filter on `DayClass` built
/// from possibly-unplaced groups, so this stays a guard, not a panic).
fn day_span(day: &[DayClass], timeslots_daily: u32) -> Option<(u32, u32)> {
    let first = day.first()?;
    let last = day.last()?;
    let start = first.timeslot % timeslots_daily;
    let last_offset = last.timeslot % timeslots_daily;
    let end = last_offset.checked_add(last.duration)?.checked_sub(1)?.min(timeslots_daily.saturating_sub(1));
    if end < start {
        return None;
    }
    Some((start, end))
}

#[allow(clippy::too_many_arguments)]
fn score_gap_category(
    limit_weight_raw: &[i32],
    day_classes: &[Vec<DayClass>],
    is_min: bool,
    details: &mut Vec<(f64, f64)>,
    score_sum: &mut f64,
    weight_sum: &mut f64,
) {
    let Some((limit, weight)) = limit_weight(limit_weight_raw) else {
        add_detail(details, score_sum, weight_sum, 1.0, 0.0);
        return;
    };
    let mut valid_days = 0u32;
    let mut days_with_gaps = 0u32;
    for day in day_classes {
        if day.len() < 2 {
            continue;
        }
        let mut day_ok = true;
        let mut has_gap = false;
        for w in day.windows(2) {
            let end1 = w[0].timeslot + w[0].duration;
            let start2 = w[1].timeslot;
            let gap = start2 as i64 - end1 as i64;
            if gap > 0 {
                has_gap = true;
                let gap = gap as f64;
                if (is_min && gap < limit) || (!is_min && gap > limit) {
                    day_ok = false;
                }
            }
        }
        if has_gap {
            days_with_gaps += 1;
            if day_ok {
                valid_days += 1;
            }
        }
    }
    if days_with_gaps > 0 {
        add_detail(details, score_sum, weight_sum, valid_days as f64 / days_with_gaps as f64, weight);
    } else {
        add_detail(details, score_sum, weight_sum, 1.0, weight);
    }
}

#[allow(clippy::too_many_arguments)]
fn score_day_length_category(
    limit_weight_raw: &[i32],
    day_classes: &[Vec<DayClass>],
    timeslots_daily: u32,
    days_with_classes: u32,
    is_min: bool,
    details: &mut Vec<(f64, f64)>,
    score_sum: &mut f64,
    weight_sum: &mut f64,
) {
    let Some((limit, weight)) = limit_weight(limit_weight_raw) else {
        add_detail(details, score_sum, weight_sum, 1.0, 0.0);
        return;
    };
    let mut valid_days = 0u32;
    for day in day_classes {
        if let Some((start, end)) = day_span(day, timeslots_daily) {
            let len = (end - start + 1) as f64;
            if (is_min && len >= limit) || (!is_min && len <= limit) {
                valid_days += 1;
            }
        }
    }
    if days_with_classes > 0 {
        add_detail(details, score_sum, weight_sum, valid_days as f64 / days_with_classes as f64, weight);
    } else {
        add_detail(details, score_sum, weight_sum, 1.0, weight);
    }
}

#[allow(clippy::too_many_arguments)]
fn score_target_category(
    day_classes: &[Vec<DayClass>],
    timeslots_daily: u32,
    days_with_classes: u32,
    target: f64,
    weight: f64,
    is_start: bool,
    details: &mut Vec<(f64, f64)>,
    score_sum: &mut f64,
    weight_sum: &mut f64,
) {
    let mut total_error = 0.0;
    for day in day_classes {
        let Some((start, end)) = day_span(day, timeslots_daily) else {
            continue;
        };
        let actual = if is_start { start } else { end } as f64;
        let diff = (actual - target).abs().min(timeslots_daily as f64);
        total_error += diff / timeslots_daily as f64;
    }
    if days_with_classes > 0 {
        let avg_error = total_error / days_with_classes as f64;
        add_detail(details, score_sum, weight_sum, 1.0 - avg_error, weight);
    } else {
        add_detail(details, score_sum, weight_sum, 1.0, weight);
    }
}

#[allow(clippy::too_many_arguments)]
fn score_tag_order(
    rules: &[Vec<i32>],
    my_groups: &[usize],
    problem: &ProblemInstance,
    group_assignments: &[(u32, usize)],
    days_num: u32,
    details: &mut Vec<(f64, f64)>,
    score_sum: &mut f64,
    weight_sum: &mut f64,
) {
    if rules.is_empty() {
        add_detail(details, score_sum, weight_sum, 1.0, 0.0);
        return;
    }

    let mut tag_score_sum = 0.0;
    let mut tag_weight_sum = 0.0;

    for rule in rules {
        let [tag_a, tag_b, w] = match rule.as_slice() {
            [a, b, w] => [*a, *b, *w],
            _ => continue,
        };
        if w == 0 {
            continue;
        }

        let mut opportunities = 0u32;
        let mut matches = 0u32;
        for d in 0..days_num {
            let mut day_groups: Vec<usize> = my_groups
                .iter()
                .copied()
                .filter(|&g| problem.day_of(group_assignments[g].0) == d)
                .collect();
            day_groups.sort_by_key(|&g| group_assignments[g].0);
            if day_groups.len() < 2 {
                continue;
            }
            for pair in day_groups.windows(2) {
                let (g1, g2) = (pair[0], pair[1]);
                let subject1 = problem.subject_of(g1);
                let duration1 = problem.subject_duration()[subject1];
                let end1 = group_assignments[g1].0 + duration1;
                let start2 = group_assignments[g2].0;
                if end1 != start2 {
                    continue;
                }
                let has_a = problem.groups_tags(g1).contains(&(tag_a as u32));
                if has_a {
                    opportunities += 1;
                    if problem.groups_tags(g2).contains(&(tag_b as u32)) {
                        matches += 1;
                    }
                }
            }
        }

        if opportunities > 0 {
            let ratio = matches as f64 / opportunities as f64;
            let rule_score = if w < 0 { 1.0 - ratio } else { ratio };
            tag_score_sum += rule_score * w.unsigned_abs() as f64;
            tag_weight_sum += w.unsigned_abs() as f64;
        }
    }

    if tag_weight_sum > 0.0 {
        details.push(((tag_score_sum / tag_weight_sum).clamp(0.0, 1.0), tag_weight_sum));
        *score_sum += tag_score_sum;
        *weight_sum += tag_weight_sum;
    } else {
        add_detail(details, score_sum, weight_sum, 1.0, 0.0);
    }
}

fn score_preferred_timeslots(
    weights: &[i32],
    my_groups: &[usize],
    problem: &ProblemInstance,
    group_assignments: &[(u32, usize)],
    details: &mut Vec<(f64, f64)>,
    score_sum: &mut f64,
    weight_sum: &mut f64,
) {
    if weights.is_empty() {
        add_detail(details, score_sum, weight_sum, 1.0, 0.0);
        return;
    }

    let total_abs_weight: f64 = weights.iter().map(|w| w.unsigned_abs() as f64).sum();
    let mut obtained = 0.0;
    let mut max_possible = 0.0;
    let mut min_possible = 0.0;

    for &g in my_groups {
        let subject = problem.subject_of(g);
        let duration = problem.subject_duration()[subject] as usize;
        let ts = group_assignments[g].0 as usize;

        let mut current = 0.0;
        for t in 0..duration {
            if let Some(w) = weights.get(ts + t) {
                current += *w as f64;
            }
        }
        obtained += current;

        let mut max_g = f64::MIN;
        let mut min_g = f64::MAX;
        if weights.len() >= duration {
            for start in 0..=(weights.len() - duration) {
                let sum: f64 = weights[start..start + duration].iter().map(|w| *w as f64).sum();
                max_g = max_g.max(sum);
                min_g = min_g.min(sum);
            }
        }
        if max_g == f64::MIN {
            max_g = 0.0;
            min_g = 0.0;
        }
        max_possible += max_g;
        min_possible += min_g;
    }

    if (max_possible - min_possible).abs() > 1e-9 {
        let normalized = (obtained - min_possible) / (max_possible - min_possible);
        details.push((normalized.clamp(0.0, 1.0), total_abs_weight));
        *score_sum += normalized * total_abs_weight;
        *weight_sum += total_abs_weight;
    } else {
        add_detail(details, score_sum, weight_sum, 1.0, 0.0);
    }
}

fn score_preferred_groups(weights: &[i32], my_groups: &[usize]) -> (f64, f64) {
    if weights.is_empty() {
        return (1.0, 0.0);
    }
    let mut group_score = 0.0;
    let mut group_weight = 0.0;
    for (g, &w) in weights.iter().enumerate() {
        if w == 0 {
            continue;
        }
        let assigned = my_groups.contains(&g);
        let term = if w > 0 {
            if assigned {
                1.0
            } else {
                0.0
            }
        } else if assigned {
            0.0
        } else {
            1.0
        };
        group_score += term * w.unsigned_abs() as f64;
        group_weight += w.unsigned_abs() as f64;
    }
    if group_weight > 0.0 {
        ((group_score / group_weight).clamp(0.0, 1.0), group_weight)
    } else {
        (1.0, 0.0)
    }
}

/// Full per-entity result: normalized score plus one `(score, weight)`
/// detail pair per declared category, in declaration order.
pub struct EntityScore {
    pub score: f64,
    pub details: Vec<(f64, f64)>,
}

/// Decodes a repaired genotype into per-student assigned (absolute) group
/// ids and per-group `(start_timeslot, room)` assignments.
///
/// Shared between [`Evaluator::evaluate`] and snapshot construction in
/// [`crate::runner::job_runner`] so both read the genotype layout exactly
/// the same way.
pub fn decode_individual(problem: &ProblemInstance, genotype: &[u32]) -> (Vec<Vec<usize>>, Vec<(u32, usize)>) {
    let gene_offset = problem.total_student_subjects();

    let mut student_groups: Vec<Vec<usize>> = Vec::with_capacity(problem.students_num());
    let mut gene_idx = 0usize;
    for s in 0..problem.students_num() {
        let mut groups = Vec::new();
        for _ in problem.students_subjects(s) {
            let relative = genotype[gene_idx];
            groups.push(problem.absolute_group(gene_idx, relative));
            gene_idx += 1;
        }
        student_groups.push(groups);
    }

    let mut group_assignments: Vec<(u32, usize)> = Vec::with_capacity(problem.groups_num());
    for g in 0..problem.groups_num() {
        let ts = genotype[gene_offset + g * 2];
        let room = genotype[gene_offset + g * 2 + 1] as usize;
        group_assignments.push((ts, room));
    }

    (student_groups, group_assignments)
}

/// Per-group enrollment count, derived from the decoded per-student
/// assignments. A count of 0 means Phase 3 never validated or placed that
/// group's scheduling loci (§4.3) — its `group_assignments` entry is
/// whatever the genotype happened to carry, not a real class.
fn group_counts_from(problem: &ProblemInstance, student_groups: &[Vec<usize>]) -> Vec<u32> {
    let mut counts = vec![0u32; problem.groups_num()];
    for groups in student_groups {
        for &g in groups {
            counts[g] += 1;
        }
    }
    counts
}

fn score_student(
    pref: &StudentPreference,
    my_groups: &[usize],
    problem: &ProblemInstance,
    group_assignments: &[(u32, usize)],
    group_counts: &[u32],
) -> EntityScore {
    let (shared_score, mut details) = score_shared_categories(pref, my_groups, problem, group_assignments, group_counts);
    let (m_score, m_weight) = score_preferred_groups(&pref.preferred_groups, my_groups);

    // Re-derive the combined score using the raw sums so that category M
    // participates in the same normalization as A–L, matching the source
    // formula exactly (shared categories' weight_sum is recovered from the
    // already-normalized shared_score only when weight_sum was zero).
    let shared_weight_sum: f64 = details.iter().map(|(_, w)| w).sum();
    let shared_raw_sum = if shared_weight_sum < 1e-9 {
        0.0
    } else {
        shared_score * shared_weight_sum
    };

    details.push((m_score.clamp(0.0, 1.0), m_weight));
    let score_sum = shared_raw_sum + m_score * m_weight;
    let weight_sum = shared_weight_sum + m_weight;

    let (score, details) = normalize(score_sum, weight_sum, details);
    EntityScore { score, details }
}

fn score_teacher(
    pref: &TeacherPreference,
    my_groups: &[usize],
    problem: &ProblemInstance,
    group_assignments: &[(u32, usize)],
    group_counts: &[u32],
) -> EntityScore {
    let (score, details) = score_shared_categories(pref, my_groups, problem, group_assignments, group_counts);
    EntityScore { score, details }
}

/// Evaluates individuals against one [`ProblemInstance`], caching
/// per-student/per-teacher detail vectors from the most recent call for
/// snapshot emission (§6).
pub struct Evaluator<'a> {
    problem: &'a ProblemInstance,
    last_student_scores: Vec<EntityScore>,
    last_teacher_scores: Vec<EntityScore>,
    last_student_weighted: Vec<f64>,
    last_teacher_weighted: Vec<f64>,
    last_total_student_weight: f64,
    last_total_teacher_weight: f64,
    last_student_groups: Vec<Vec<usize>>,
    last_group_assignments: Vec<(u32, usize)>,
}

impl<'a> Evaluator<'a> {
    pub fn new(problem: &'a ProblemInstance) -> Self {
        Self {
            problem,
            last_student_scores: Vec::new(),
            last_teacher_scores: Vec::new(),
            last_student_weighted: Vec::new(),
            last_teacher_weighted: Vec::new(),
            last_total_student_weight: 0.0,
            last_total_teacher_weight: 0.0,
            last_student_groups: Vec::new(),
            last_group_assignments: Vec::new(),
        }
    }

    fn reset_details(&mut self) {
        self.last_student_scores.clear();
        self.last_teacher_scores.clear();
        self.last_student_weighted.clear();
        self.last_teacher_weighted.clear();
        self.last_total_student_weight = 0.0;
        self.last_total_teacher_weight = 0.0;
        self.last_student_groups.clear();
        self.last_group_assignments.clear();
    }

    /// Repairs `individual`, then scores it against `self.problem`.
    /// Returns `-1.0` (and resets the detail vectors) if repair fails;
    /// returns `0.0` without touching Repair/decoding at all if the
    /// genotype's length doesn't match the schema (§7: a programming-error
    /// path, not expected in normal operation).
    pub fn evaluate(&mut self, individual: &mut Individual) -> f64 {
        let expected_len = self.problem.genotype_len();
        if individual.genotype.len() != expected_len {
            let err = RunnerError::GenotypeShapeMismatch {
                expected: expected_len,
                actual: individual.genotype.len(),
            };
            error!(error = %err, "genotype shape mismatch");
            self.reset_details();
            individual.fitness = 0.0;
            return 0.0;
        }

        if !repair(individual, self.problem) {
            self.reset_details();
            individual.fitness = -1.0;
            return -1.0;
        }

        let problem = self.problem;
        let (student_groups, group_assignments) = decode_individual(problem, &individual.genotype);
        let group_counts = group_counts_from(problem, &student_groups);

        self.reset_details();
        self.last_student_groups = student_groups.clone();
        self.last_group_assignments = group_assignments.clone();

        let mut total_student_fitness = 0.0;
        for s in 0..problem.students_num() {
            let default_pref = StudentPreference::default();
            let pref = problem.student_preference(s).unwrap_or(&default_pref);
            let result = score_student(pref, &student_groups[s], problem, &group_assignments, &group_counts);
            let weight = problem.student_weight(s);
            self.last_student_weighted.push(result.score * weight);
            total_student_fitness += result.score * weight;
            self.last_total_student_weight += weight;
            self.last_student_scores.push(result);
        }

        let mut total_teacher_fitness = 0.0;
        for t in 0..problem.teachers_num() {
            let default_pref = TeacherPreference::default();
            let pref = problem.teacher_preference(t).unwrap_or(&default_pref);
            let teacher_groups: Vec<usize> = problem.teachers_groups(t).iter().map(|&g| g as usize).collect();
            let result = score_teacher(pref, &teacher_groups, problem, &group_assignments, &group_counts);
            let weight = problem.teacher_weight(t);
            self.last_teacher_weighted.push(result.score * weight);
            total_teacher_fitness += result.score * weight;
            self.last_total_teacher_weight += weight;
            self.last_teacher_scores.push(result);
        }

        let total_weight = self.last_total_student_weight + self.last_total_teacher_weight;
        let fitness = if total_weight > 0.0 {
            (total_student_fitness + total_teacher_fitness) / total_weight
        } else {
            0.0
        };
        individual.fitness = fitness;
        fitness
    }

    pub fn last_student_scores(&self) -> &[EntityScore] {
        &self.last_student_scores
    }

    pub fn last_teacher_scores(&self) -> &[EntityScore] {
        &self.last_teacher_scores
    }

    pub fn last_student_weighted(&self) -> &[f64] {
        &self.last_student_weighted
    }

    pub fn last_teacher_weighted(&self) -> &[f64] {
        &self.last_teacher_weighted
    }

    pub fn last_total_student_weight(&self) -> f64 {
        self.last_total_student_weight
    }

    pub fn last_total_teacher_weight(&self) -> f64 {
        self.last_total_teacher_weight
    }

    pub fn last_student_groups(&self) -> &[Vec<usize>] {
        &self.last_student_groups
    }

    pub fn last_group_assignments(&self) -> &[(u32, usize)] {
        &self.last_group_assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::GenotypeSchema;
    use crate::model::RawProblemData;

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
    fn trivial_feasible_scenario_scores_one() {
        let problem = ProblemInstance::new(trivial_raw());
        assert!(problem.is_feasible());
        let schema = GenotypeSchema::build(&problem);
        let mut individual = Individual::new(vec![0u32; schema.len()]);
        let mut evaluator = Evaluator::new(&problem);
        let fitness = evaluator.evaluate(&mut individual);
        assert!((fitness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn evaluator_is_deterministic() {
        let problem = ProblemInstance::new(trivial_raw());
        let schema = GenotypeSchema::build(&problem);
        let genotype = vec![0u32; schema.len()];
        let mut evaluator = Evaluator::new(&problem);

        let mut a = Individual::new(genotype.clone());
        let fa = evaluator.evaluate(&mut a);
        let mut b = Individual::new(genotype);
        let fb = evaluator.evaluate(&mut b);
        assert_eq!(fa, fb);
    }

    #[test]
    fn free_days_preference_rewards_idle_days() {
        let mut raw = trivial_raw();
        raw.days_in_cycle = 2;
        raw.students_preferences = vec![StudentPreference {
            free_days: 1,
            ..Default::default()
        }];
        let problem = ProblemInstance::new(raw);
        let schema = GenotypeSchema::build(&problem);
        let mut individual = Individual::new(vec![0u32; schema.len()]);
        let mut evaluator = Evaluator::new(&problem);
        let fitness = evaluator.evaluate(&mut individual);
        assert!(fitness > 0.0);
        assert!((fitness - 1.0).abs() < 1e-9, "single class on day 0 of 2 leaves one free day");
    }

    #[test]
    fn genotype_shape_mismatch_returns_zero_without_panicking() {
        let problem = ProblemInstance::new(trivial_raw());
        let schema = GenotypeSchema::build(&problem);
        let mut individual = Individual::new(vec![0u32; schema.len() + 1]);
        let mut evaluator = Evaluator::new(&problem);

        let fitness = evaluator.evaluate(&mut individual);

        assert_eq!(fitness, 0.0);
        assert_eq!(individual.fitness, 0.0);
    }

    /// A teacher's group that ends up empty (never placed by Phase 3, §4.3)
    /// still carries unvalidated scheduling loci. A teacher preference that
    /// exercises `day_span` (ShortDays) must not trip over that group's
    /// garbage `(start, duration)` pair.
    #[test]
    fn teacher_preference_ignores_empty_group_garbage_schedule() {
        let raw = RawProblemData {
            timeslots_daily: 4,
            days_in_cycle: 1,
            min_students_per_group: 0,
            groups_per_subject: vec![2],
            subject_duration: vec![2],
            groups_capacity: vec![3, 3],
            rooms_capacity: vec![3],
            groups_tags: vec![],
            rooms_tags: vec![],
            students_subjects: vec![vec![0]],
            teachers_groups: vec![vec![0, 1]],
            rooms_unavailability_timeslots: vec![vec![]],
            students_unavailability_timeslots: vec![],
            teachers_unavailability_timeslots: vec![vec![]],
            students_preferences: vec![],
            teachers_preferences: vec![TeacherPreference {
                short_days: 1,
                ..Default::default()
            }],
            student_weights: vec![],
            teacher_weights: vec![],
        };
        let problem = ProblemInstance::new(raw);
        assert!(problem.is_feasible());
        let schema = GenotypeSchema::build(&problem);
        assert_eq!(schema.len(), 5);

        // student -> group 0 (relative 0); group 0 at ts=0 (duration 2, fits);
        // group 1 (never assigned, count 0) left at ts=3 with duration 2 —
        // that genotype value would overflow the day if it were ever read as
        // a real placement.
        let mut individual = Individual::new(vec![0, 0, 0, 3, 0]);
        let mut evaluator = Evaluator::new(&problem);

        let fitness = evaluator.evaluate(&mut individual);

        assert!(fitness.is_finite());
        let teacher_score = evaluator.last_teacher_scores()[0].score;
        assert!((teacher_score - 0.5).abs() < 1e-9, "got {teacher_score}");
        assert!((fitness - 0.75).abs() < 1e-9, "got {fitness}");
    }

    #[test]
    fn infeasible_problem_yields_negative_fitness() {
        let mut raw = trivial_raw();
        raw.groups_per_subject = vec![10];
        raw.groups_capacity = vec![1; 10];
        let problem = ProblemInstance::new(raw);
        assert!(!problem.is_feasible());
        let schema = GenotypeSchema::build(&problem);
        let mut individual = Individual::new(vec![0u32; schema.len()]);
        let mut evaluator = Evaluator::new(&problem);
        assert_eq!(evaluator.evaluate(&mut individual), -1.0);
    }
}
