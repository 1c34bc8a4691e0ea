use crate::model::{Activity, Bimester, SchoolClass, Student};
use serde::Serialize;
use std::collections::HashMap;

pub const PASSING_AVERAGE: f64 = 6.0;

/// Half-up 1-decimal rounding used for displayed averages:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BimesterAverage {
    Incomplete,
    Complete { average: f64, passing: bool },
}

/// What one activity adds to the bimester sum. Nulls count as 0 only inside
/// the recovery comparison.
pub fn contribution(activity: &Activity) -> f64 {
    let score = activity.score.unwrap_or(0.0);
    if activity.has_recovery {
        let recovery = activity.recovery_score.unwrap_or(0.0);
        if recovery > score {
            return recovery;
        }
    }
    score
}

fn is_complete(activities: &[Activity]) -> bool {
    activities.iter().filter(|a| a.score.is_some()).count() >= 3
}

fn raw_average(activities: &[Activity]) -> f64 {
    activities.iter().map(contribution).sum::<f64>() / 3.0
}

pub fn bimester_average(activities: &[Activity]) -> BimesterAverage {
    if !is_complete(activities) {
        return BimesterAverage::Incomplete;
    }
    let average = round_off_1_decimal(raw_average(activities));
    BimesterAverage::Complete {
        average,
        passing: average >= PASSING_AVERAGE,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BimesterRow {
    pub bimester: Bimester,
    pub class_average: f64,
    pub complete_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub school_class: Option<SchoolClass>,
    pub student_count: usize,
    pub bimesters: Vec<BimesterRow>,
    pub distribution_bimester: Bimester,
    pub passing: usize,
    pub failing: usize,
}

/// Class averages per bimester plus the pass/fail split for `bimester`.
/// Only students with a complete bimester are counted.
pub fn class_stats(
    students: &[Student],
    school_class: Option<SchoolClass>,
    bimester: Bimester,
) -> ClassStats {
    let members: Vec<&Student> = students
        .iter()
        .filter(|s| school_class.map(|c| s.school_class == c).unwrap_or(true))
        .collect();

    let bimesters = Bimester::ALL
        .into_iter()
        .map(|bim| {
            let mut total = 0.0;
            let mut count = 0usize;
            for s in &members {
                let acts = s.activities(bim);
                if is_complete(acts) {
                    total += raw_average(acts);
                    count += 1;
                }
            }
            BimesterRow {
                bimester: bim,
                class_average: if count > 0 {
                    round_off_1_decimal(total / count as f64)
                } else {
                    0.0
                },
                complete_count: count,
            }
        })
        .collect();

    let mut passing = 0;
    let mut failing = 0;
    for s in &members {
        let acts = s.activities(bimester);
        if is_complete(acts) {
            if raw_average(acts) >= PASSING_AVERAGE {
                passing += 1;
            } else {
                failing += 1;
            }
        }
    }

    ClassStats {
        school_class,
        student_count: members.len(),
        bimesters,
        distribution_bimester: bimester,
        passing,
        failing,
    }
}

/// Rank index per student id (0 = highest total contribution). Stable on ties.
pub fn class_ranks(
    students: &[Student],
    school_class: SchoolClass,
    bimester: Bimester,
) -> HashMap<String, usize> {
    let mut scored: Vec<(&Student, f64)> = students
        .iter()
        .filter(|s| s.school_class == school_class)
        .map(|s| (s, s.activities(bimester).iter().map(contribution).sum()))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .enumerate()
        .map(|(i, (s, _))| (s.id.clone(), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        default_activity_configs, scaffold_grades, BiologicalLevel, BiologicalSex, ResidenceType,
    };

    fn act(id: u8, score: Option<f64>) -> Activity {
        Activity {
            id,
            title: format!("Atividade {}", id),
            description: String::new(),
            score,
            max_score: 10.0,
            has_recovery: false,
            recovery_score: None,
        }
    }

    fn student(id: &str, class: SchoolClass, scores: [Option<f64>; 3]) -> Student {
        let mut grades = scaffold_grades(|_| default_activity_configs());
        for (a, s) in grades
            .get_mut(&Bimester::First)
            .unwrap()
            .iter_mut()
            .zip(scores)
        {
            a.score = s;
        }
        Student {
            id: id.into(),
            name: id.into(),
            email: format!("{}@escola.br", id),
            credential: None,
            school_class: class,
            birth_date: "2009-01-01".into(),
            biological_sex: BiologicalSex::F,
            residence_type: ResidenceType::Urban,
            is_monitor: false,
            biological_level: BiologicalLevel::Organelle,
            avatar_url: None,
            personal_reminders: Vec::new(),
            personal_materials: Vec::new(),
            bimester_grades: grades,
        }
    }

    #[test]
    fn round_off_is_half_up() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(20.0 / 3.0), 6.7);
    }

    #[test]
    fn plain_scores_average_to_rounded_mean() {
        let acts = [act(1, Some(7.0)), act(2, Some(8.0)), act(3, Some(6.5))];
        assert_eq!(
            bimester_average(&acts),
            BimesterAverage::Complete {
                average: 7.2,
                passing: true
            }
        );
    }

    #[test]
    fn missing_score_is_incomplete_even_with_recovery() {
        let mut third = act(3, None);
        third.has_recovery = true;
        third.recovery_score = Some(9.0);
        let acts = [act(1, Some(7.0)), act(2, Some(5.0)), third];
        assert_eq!(bimester_average(&acts), BimesterAverage::Incomplete);
    }

    #[test]
    fn filling_the_last_score_completes_the_bimester() {
        let mut acts = vec![act(1, Some(7.0)), act(2, Some(5.0)), act(3, None)];
        assert_eq!(bimester_average(&acts), BimesterAverage::Incomplete);
        acts[2].score = Some(8.0);
        assert_eq!(
            bimester_average(&acts),
            BimesterAverage::Complete {
                average: 6.7,
                passing: true
            }
        );
    }

    #[test]
    fn recovery_replaces_lower_score_only_when_enabled() {
        let mut a = act(1, Some(4.0));
        a.recovery_score = Some(7.0);
        assert_eq!(contribution(&a), 4.0);
        a.has_recovery = true;
        assert_eq!(contribution(&a), 7.0);
        a.recovery_score = Some(3.0);
        assert_eq!(contribution(&a), 4.0);
        a.recovery_score = None;
        assert_eq!(contribution(&a), 4.0);
    }

    #[test]
    fn six_is_the_passing_boundary() {
        let acts = [act(1, Some(6.0)), act(2, Some(6.0)), act(3, Some(6.0))];
        assert_eq!(
            bimester_average(&acts),
            BimesterAverage::Complete {
                average: 6.0,
                passing: true
            }
        );
        let acts = [act(1, Some(6.0)), act(2, Some(6.0)), act(3, Some(5.6))];
        assert_eq!(
            bimester_average(&acts),
            BimesterAverage::Complete {
                average: 5.9,
                passing: false
            }
        );
    }

    #[test]
    fn stats_count_only_complete_students() {
        let students = vec![
            student("a", SchoolClass::First1A, [Some(8.0), Some(8.0), Some(8.0)]),
            student("b", SchoolClass::First1A, [Some(4.0), Some(4.0), Some(4.0)]),
            student("c", SchoolClass::First1A, [Some(10.0), None, None]),
            student("d", SchoolClass::Second2A, [Some(1.0), Some(1.0), Some(1.0)]),
        ];
        let stats = class_stats(&students, Some(SchoolClass::First1A), Bimester::First);
        assert_eq!(stats.student_count, 3);
        assert_eq!(stats.bimesters[0].class_average, 6.0);
        assert_eq!(stats.bimesters[0].complete_count, 2);
        assert_eq!(stats.bimesters[1].class_average, 0.0);
        assert_eq!((stats.passing, stats.failing), (1, 1));
    }

    #[test]
    fn ranks_order_by_total_contribution() {
        let students = vec![
            student("low", SchoolClass::First1B, [Some(2.0), None, None]),
            student("high", SchoolClass::First1B, [Some(9.0), Some(9.0), None]),
            student("other", SchoolClass::Third3A, [Some(10.0), Some(10.0), Some(10.0)]),
        ];
        let ranks = class_ranks(&students, SchoolClass::First1B, Bimester::First);
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks["high"], 0);
        assert_eq!(ranks["low"], 1);
    }
}
