use crate::calc::{self, BimesterAverage, ClassStats};
use crate::error::{GradebookError, Result};
use crate::gradebook::{Capability, Gradebook, PushOutcome, Synced};
use crate::model::{
    Activity, Bimester, ClassSettings, NotificationType, SchoolClass, Student, TargetSection,
};
use crate::notify::NewNotification;
use crate::store::ClassBucket;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpdate {
    pub student_id: String,
    pub bimester: Bimester,
    pub activity_id: u8,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedUpdate {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub updated: usize,
    pub rejected: Vec<RejectedUpdate>,
    pub push: PushOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinRow {
    pub bimester: Bimester,
    pub activities: Vec<Activity>,
    pub average: BimesterAverage,
    /// Whether the class has released averages for this bimester.
    pub average_released: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bulletin {
    pub student_id: String,
    pub school_class: SchoolClass,
    pub rows: Vec<BulletinRow>,
}

fn grade_message(title: &str) -> String {
    format!("Sua nota em {} foi atualizada.", title)
}

fn recovery_message(title: &str) -> String {
    format!("Sua nota de recuperação em {} foi atualizada.", title)
}

impl Gradebook {
    /// Replaces the activity with the same slot id in the student's bimester.
    pub fn update_activity_grade(
        &self,
        student_id: &str,
        bimester: Bimester,
        activity: Activity,
    ) -> Result<Synced<Student>> {
        self.require(Capability::EditGrades)?;
        let mut s = self.student_or_not_found(student_id)?;
        if !activity.max_score.is_finite() || activity.max_score <= 0.0 {
            return Err(GradebookError::validation("maxScore must be positive"));
        }
        if !activity.in_range(activity.score) {
            return Err(GradebookError::validation(format!(
                "score must be between 0 and {}",
                activity.max_score
            )));
        }
        if !activity.in_range(activity.recovery_score) {
            return Err(GradebookError::validation(format!(
                "recoveryScore must be between 0 and {}",
                activity.max_score
            )));
        }
        let Some(slot) = s.activity_mut(bimester, activity.id) else {
            return Err(GradebookError::NotFound(format!(
                "activity {} in {}",
                activity.id,
                bimester.label()
            )));
        };

        let note = if slot.score != activity.score && activity.score.is_some() {
            Some(grade_message(&activity.title))
        } else if slot.recovery_score != activity.recovery_score && activity.recovery_score.is_some() {
            Some(recovery_message(&activity.title))
        } else {
            None
        };
        *slot = activity;

        self.store().put_student(&s)?;
        self.refresh_session_for(&s)?;
        if let Some(message) = note {
            self.add_notification(NewNotification::to_student(
                NotificationType::Grade,
                &s.id,
                message,
                TargetSection::Grades,
            ))?;
        }
        let push = self.push_student(&s);
        Ok(Synced::new(s, push))
    }

    /// Applies score-only updates in one pass. Invalid entries are skipped and
    /// listed; `updated` counts the applied ones.
    pub fn bulk_update_grades(&self, updates: &[GradeUpdate]) -> Result<BulkOutcome> {
        self.require(Capability::EditGrades)?;
        let mut touched: HashMap<String, Student> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut notes: Vec<NewNotification> = Vec::new();
        let mut rejected = Vec::new();
        let mut updated = 0usize;

        for (index, u) in updates.iter().enumerate() {
            if !touched.contains_key(&u.student_id) {
                match self.store().student(&u.student_id)? {
                    Some(s) => {
                        order.push(s.id.clone());
                        touched.insert(s.id.clone(), s);
                    }
                    None => {
                        rejected.push(RejectedUpdate {
                            index,
                            reason: format!("student {} not found", u.student_id),
                        });
                        continue;
                    }
                }
            }
            let Some(s) = touched.get_mut(&u.student_id) else {
                continue;
            };
            let Some(activity) = s.activity_mut(u.bimester, u.activity_id) else {
                rejected.push(RejectedUpdate {
                    index,
                    reason: format!("activity {} not found", u.activity_id),
                });
                continue;
            };
            if !activity.in_range(u.score) {
                rejected.push(RejectedUpdate {
                    index,
                    reason: format!("score must be between 0 and {}", activity.max_score),
                });
                continue;
            }
            if activity.score != u.score && u.score.is_some() {
                notes.push(NewNotification::to_student(
                    NotificationType::Grade,
                    &u.student_id,
                    grade_message(&activity.title),
                    TargetSection::Grades,
                ));
            }
            activity.score = u.score;
            updated += 1;
        }

        if updated == 0 {
            return Ok(BulkOutcome {
                updated,
                rejected,
                push: PushOutcome::Skipped,
            });
        }

        let students: Vec<Student> = order
            .iter()
            .filter_map(|id| touched.remove(id))
            .collect();
        self.store().put_students(&students)?;
        for s in &students {
            self.refresh_session_for(s)?;
        }
        for n in notes {
            self.add_notification(n)?;
        }
        debug!(updated, rejected = rejected.len(), "bulk grade update applied");
        let push = self.push_students(&students);
        Ok(BulkOutcome {
            updated,
            rejected,
            push,
        })
    }

    pub fn bimester_average(&self, student_id: &str, bimester: Bimester) -> Result<BimesterAverage> {
        let s = self.student_or_not_found(student_id)?;
        Ok(calc::bimester_average(s.activities(bimester)))
    }

    pub fn bulletin(&self, student_id: &str) -> Result<Bulletin> {
        let s = self.student_or_not_found(student_id)?;
        let mut rows = Vec::with_capacity(Bimester::ALL.len());
        for bim in Bimester::ALL {
            let settings: ClassSettings = self
                .store()
                .class_doc(ClassBucket::ClassSettings, s.school_class, bim)?
                .unwrap_or_default();
            let activities = s.activities(bim).to_vec();
            rows.push(BulletinRow {
                bimester: bim,
                average: calc::bimester_average(&activities),
                activities,
                average_released: settings.show_average,
            });
        }
        Ok(Bulletin {
            student_id: s.id,
            school_class: s.school_class,
            rows,
        })
    }

    pub fn class_stats(&self, school_class: Option<SchoolClass>, bimester: Bimester) -> Result<ClassStats> {
        let students = match school_class {
            Some(c) => self.store().students_in_class(c)?,
            None => self.store().students()?,
        };
        Ok(calc::class_stats(&students, school_class, bimester))
    }

    pub fn class_ranks(&self, school_class: SchoolClass, bimester: Bimester) -> Result<HashMap<String, usize>> {
        let students = self.store().students_in_class(school_class)?;
        Ok(calc::class_ranks(&students, school_class, bimester))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::NewStudent;

    fn book_with_student() -> (Gradebook, Student) {
        let book = Gradebook::for_tests(None);
        let s = book
            .create_student(NewStudent::sample("Ana", "ana@escola.br", SchoolClass::First1A))
            .unwrap()
            .value;
        (book, s)
    }

    fn with_score(s: &Student, slot: usize, score: Option<f64>) -> Activity {
        let mut a = s.activities(Bimester::First)[slot].clone();
        a.score = score;
        a
    }

    #[test]
    fn three_scores_complete_the_average() {
        let (book, s) = book_with_student();
        book.update_activity_grade(&s.id, Bimester::First, with_score(&s, 0, Some(7.0)))
            .unwrap();
        book.update_activity_grade(&s.id, Bimester::First, with_score(&s, 1, Some(5.0)))
            .unwrap();
        assert_eq!(
            book.bimester_average(&s.id, Bimester::First).unwrap(),
            BimesterAverage::Incomplete
        );
        book.update_activity_grade(&s.id, Bimester::First, with_score(&s, 2, Some(8.0)))
            .unwrap();
        assert_eq!(
            book.bimester_average(&s.id, Bimester::First).unwrap(),
            BimesterAverage::Complete {
                average: 6.7,
                passing: true
            }
        );
    }

    #[test]
    fn grade_edit_notifies_on_new_score_then_on_recovery() {
        let (book, s) = book_with_student();
        let mut a = with_score(&s, 0, Some(4.0));
        book.update_activity_grade(&s.id, Bimester::First, a.clone()).unwrap();
        a.has_recovery = true;
        a.recovery_score = Some(7.0);
        book.update_activity_grade(&s.id, Bimester::First, a.clone()).unwrap();
        book.update_activity_grade(&s.id, Bimester::First, a).unwrap();

        let notes = book.store().notifications().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].message, "Sua nota de recuperação em Atividade 1 foi atualizada.");
        assert_eq!(notes[1].message, "Sua nota em Atividade 1 foi atualizada.");
        assert_eq!(notes[1].target_id, s.id);

        let stored = book.store().student(&s.id).unwrap().unwrap();
        assert_eq!(calc::contribution(&stored.activities(Bimester::First)[0]), 7.0);
    }

    #[test]
    fn grade_edit_rejects_bad_input() {
        let (book, s) = book_with_student();
        assert!(matches!(
            book.update_activity_grade(&s.id, Bimester::First, with_score(&s, 0, Some(10.5))),
            Err(GradebookError::Validation(_))
        ));
        let mut ghost = with_score(&s, 0, Some(5.0));
        ghost.id = 4;
        assert!(matches!(
            book.update_activity_grade(&s.id, Bimester::First, ghost),
            Err(GradebookError::NotFound(_))
        ));
        assert!(matches!(
            book.update_activity_grade("nobody", Bimester::First, with_score(&s, 0, Some(5.0))),
            Err(GradebookError::NotFound(_))
        ));
    }

    #[test]
    fn bulk_update_counts_only_valid_entries() {
        let (book, s) = book_with_student();
        let updates = vec![
            GradeUpdate {
                student_id: s.id.clone(),
                bimester: Bimester::Second,
                activity_id: 1,
                score: Some(9.0),
            },
            GradeUpdate {
                student_id: "ghost".into(),
                bimester: Bimester::Second,
                activity_id: 1,
                score: Some(9.0),
            },
            GradeUpdate {
                student_id: s.id.clone(),
                bimester: Bimester::Second,
                activity_id: 7,
                score: Some(9.0),
            },
            GradeUpdate {
                student_id: s.id.clone(),
                bimester: Bimester::Second,
                activity_id: 2,
                score: Some(-1.0),
            },
            GradeUpdate {
                student_id: s.id.clone(),
                bimester: Bimester::Second,
                activity_id: 3,
                score: None,
            },
        ];
        let out = book.bulk_update_grades(&updates).unwrap();
        assert_eq!(out.updated, 2);
        assert_eq!(
            out.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
            [1, 2, 3]
        );
        let stored = book.store().student(&s.id).unwrap().unwrap();
        assert_eq!(stored.activities(Bimester::Second)[0].score, Some(9.0));
        assert_eq!(book.store().notifications().unwrap().len(), 1);
    }

    #[test]
    fn bulletin_reports_release_flag() {
        let (book, s) = book_with_student();
        book.save_class_settings(
            SchoolClass::First1A,
            Bimester::Third,
            ClassSettings { show_average: true },
        )
        .unwrap();
        let b = book.bulletin(&s.id).unwrap();
        assert_eq!(b.rows.len(), 4);
        assert!(!b.rows[0].average_released);
        assert!(b.rows[2].average_released);
        assert_eq!(b.rows[2].average, BimesterAverage::Incomplete);
    }
}
