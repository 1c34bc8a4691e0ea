use crate::error::{GradebookError, Result};
use crate::gradebook::{Gradebook, PushOutcome};
use crate::model::{
    default_activity_configs, now_iso, scaffold_grades, Bimester, BiologicalLevel, BiologicalSex,
    ClassActivityConfig, ClassContent, ClassSettings, ForumPost, ForumSettings, Notification,
    ResidenceType, SchoolClass, Student, UserRole, ACTIVITY_SLOTS, DEFAULT_MAX_SCORE,
};
use crate::store::{ClassBucket, StoreSnapshot, KV_LAST_PULL};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

pub const T_STUDENTS: &str = "students";
pub const T_GRADES: &str = "bimester_grades";
pub const T_CONTENT: &str = "planning_content";
pub const T_CONFIGS: &str = "activity_configs";
pub const T_CLASS_SETTINGS: &str = "class_settings";
pub const T_FORUM: &str = "forum_messages";
pub const T_FORUM_SETTINGS: &str = "forum_settings";
pub const T_NOTIFICATIONS: &str = "notifications";

const STUDENT_COLUMNS: &str = "*,profiles(name,email)";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub students: usize,
    pub grade_rows: usize,
    pub skipped_rows: usize,
    pub class_docs: usize,
    pub forum_posts: usize,
    pub notifications: usize,
    pub pulled_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub remote_configured: bool,
    pub last_pull: Option<String>,
}

// --- row shapes -----------------------------------------------------------

fn scoped_id(school_class: SchoolClass, bimester: Bimester) -> String {
    format!("{}_{}", school_class.code(), bimester.label())
}

pub fn student_row(s: &Student) -> Value {
    json!({
        "id": s.id,
        "school_class": s.school_class,
        "birth_date": s.birth_date,
        "biological_sex": s.biological_sex,
        "residence_type": s.residence_type,
        "is_monitor": s.is_monitor,
        "biological_level": s.biological_level,
        "avatar_url": s.avatar_url,
        "personal_reminders": s.personal_reminders,
        "personal_materials": s.personal_materials,
    })
}

pub fn grade_rows(s: &Student) -> Vec<Value> {
    s.bimester_grades
        .iter()
        .flat_map(|(bim, acts)| {
            acts.iter().map(move |a| {
                json!({
                    "id": format!("{}-{}-{}", s.id, bim.label(), a.id),
                    "student_id": s.id,
                    "bimester": bim,
                    "activity_id": a.id,
                    "title": a.title,
                    "description": a.description,
                    "score": a.score,
                    "recovery_score": a.recovery_score,
                    "max_score": a.max_score,
                    "has_recovery": a.has_recovery,
                })
            })
        })
        .collect()
}

pub fn content_row(c: &ClassContent) -> Value {
    json!({
        "id": c.ref_id(),
        "class_level": c.school_class,
        "bimester": c.bimester,
        "title": "Planejamento",
        "description": c.text_content,
        "files": c.files,
        "reminders": c.reminders,
        "updated_by_name": c.last_edited_by.as_deref().unwrap_or("Professor"),
    })
}

pub fn config_rows(
    school_class: SchoolClass,
    bimester: Bimester,
    configs: &[ClassActivityConfig],
) -> Vec<Value> {
    configs
        .iter()
        .map(|c| {
            json!({
                "id": format!("{}_{}", scoped_id(school_class, bimester), c.id),
                "school_class": school_class,
                "bimester": bimester,
                "activity_id": c.id,
                "title": c.title,
                "description": c.description,
                "max_score": c.max_score,
                "has_recovery": c.has_recovery,
            })
        })
        .collect()
}

fn author_type(role: UserRole) -> &'static str {
    match role {
        UserRole::Teacher => "teacher",
        UserRole::Monitor => "monitor",
        UserRole::Student => "student",
    }
}

pub fn forum_row(p: &ForumPost) -> Value {
    json!({
        "id": p.id,
        "text": p.content,
        "author_id": p.author_id,
        "author_name": p.author_name,
        "author_type": author_type(p.author_role),
        "author_level": p.author_level,
        "school_class": p.school_class,
        "bimester": p.bimester,
        "date": p.timestamp,
    })
}

pub fn notification_row(n: &Notification) -> Value {
    json!({
        "id": n.id,
        "type": n.kind,
        "target_type": n.target_type,
        "target_id": n.target_id,
        "message": n.message,
        "target_section": n.target_section,
        "ref_id": n.ref_id,
        "created_at": n.created_at,
        "read_by": n.read_by,
    })
}

// --- row readers ----------------------------------------------------------

fn text<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

fn number(row: &Value, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

fn flag(row: &Value, key: &str) -> Option<bool> {
    row.get(key).and_then(Value::as_bool)
}

fn class_of(row: &Value, key: &str) -> Option<SchoolClass> {
    text(row, key).and_then(SchoolClass::parse)
}

fn bimester_of(row: &Value, key: &str) -> Option<Bimester> {
    text(row, key).and_then(Bimester::parse)
}

fn list_of<T: serde::de::DeserializeOwned>(row: &Value, key: &str) -> Vec<T> {
    row.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Slot from `activity_id`, else from the trailing `-N` of the row id.
fn grade_slot(row: &Value) -> Option<u8> {
    let slot = row
        .get("activity_id")
        .and_then(Value::as_u64)
        .or_else(|| {
            text(row, "id")
                .and_then(|id| id.rsplit('-').next())
                .and_then(|tail| tail.trim().parse::<u64>().ok())
        })?;
    u8::try_from(slot).ok().filter(|s| ACTIVITY_SLOTS.contains(s))
}

/// `profiles` may come back as an object or a one-element array.
fn profile_field<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    match row.get("profiles") {
        Some(Value::Array(items)) => items.first().and_then(|p| text(p, key)),
        Some(p) => text(p, key),
        None => None,
    }
}

type Templates = BTreeMap<(SchoolClass, Bimester), Vec<ClassActivityConfig>>;

fn reshape_configs(rows: &[Value], skipped: &mut usize) -> Templates {
    let mut by_scope: Templates = BTreeMap::new();
    for row in rows {
        let (Some(class), Some(bim), Some(slot)) =
            (class_of(row, "school_class"), bimester_of(row, "bimester"), grade_slot(row))
        else {
            warn!(row = %row, "skipping activity config row");
            *skipped += 1;
            continue;
        };
        by_scope.entry((class, bim)).or_default().push(ClassActivityConfig {
            id: slot,
            title: text(row, "title")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Atividade {}", slot)),
            description: text(row, "description").unwrap_or_default().to_string(),
            max_score: number(row, "max_score")
                .filter(|m| *m > 0.0)
                .unwrap_or(DEFAULT_MAX_SCORE),
            has_recovery: flag(row, "has_recovery").unwrap_or(false),
        });
    }
    // Fill missing slots so every stored template has exactly three entries.
    for template in by_scope.values_mut() {
        for d in default_activity_configs() {
            if !template.iter().any(|c| c.id == d.id) {
                template.push(d);
            }
        }
        template.sort_by_key(|c| c.id);
        template.dedup_by_key(|c| c.id);
    }
    by_scope
}

fn reshape_student(
    row: &Value,
    templates: &Templates,
    credentials: &HashMap<String, Option<String>>,
) -> Option<Student> {
    let id = text(row, "id")?.to_string();
    let Some(school_class) = class_of(row, "school_class") else {
        warn!(student = %id, "skipping student with unknown class");
        return None;
    };
    let bimester_grades = scaffold_grades(|bim| {
        templates
            .get(&(school_class, bim))
            .cloned()
            .unwrap_or_else(default_activity_configs)
    });
    Some(Student {
        credential: credentials.get(&id).cloned().flatten(),
        name: profile_field(row, "name").unwrap_or_default().to_string(),
        email: profile_field(row, "email").unwrap_or_default().to_string(),
        school_class,
        birth_date: text(row, "birth_date").unwrap_or_default().to_string(),
        biological_sex: match text(row, "biological_sex") {
            Some("F") => BiologicalSex::F,
            _ => BiologicalSex::M,
        },
        residence_type: match text(row, "residence_type") {
            Some("RURAL") => ResidenceType::Rural,
            _ => ResidenceType::Urban,
        },
        is_monitor: flag(row, "is_monitor").unwrap_or(false),
        biological_level: text(row, "biological_level")
            .and_then(BiologicalLevel::parse)
            .unwrap_or(BiologicalLevel::Atom),
        avatar_url: text(row, "avatar_url").map(str::to_string),
        personal_reminders: list_of(row, "personal_reminders"),
        personal_materials: list_of(row, "personal_materials"),
        bimester_grades,
        id,
    })
}

/// Splices one grade row into its student's scaffold. Returns false when the row has nowhere to go.
fn splice_grade(students: &mut [Student], index: &HashMap<String, usize>, row: &Value) -> bool {
    let (Some(student_id), Some(bim), Some(slot)) =
        (text(row, "student_id"), bimester_of(row, "bimester"), grade_slot(row))
    else {
        return false;
    };
    let Some(&i) = index.get(student_id) else {
        return false;
    };
    let Some(activity) = students[i].activity_mut(bim, slot) else {
        return false;
    };
    if let Some(title) = text(row, "title") {
        activity.title = title.to_string();
    }
    if let Some(description) = text(row, "description") {
        activity.description = description.to_string();
    }
    if let Some(max) = number(row, "max_score").filter(|m| *m > 0.0) {
        activity.max_score = max;
    }
    if let Some(has_recovery) = flag(row, "has_recovery") {
        activity.has_recovery = has_recovery;
    }
    activity.score = number(row, "score");
    activity.recovery_score = number(row, "recovery_score");
    true
}

fn reshape_forum_post(row: &Value) -> Option<ForumPost> {
    Some(ForumPost {
        id: text(row, "id")?.trim().to_string(),
        author_id: text(row, "author_id").unwrap_or_default().to_string(),
        author_name: text(row, "author_name").unwrap_or_default().to_string(),
        author_role: match text(row, "author_type") {
            Some("teacher") => UserRole::Teacher,
            Some("monitor") => UserRole::Monitor,
            _ => UserRole::Student,
        },
        author_level: text(row, "author_level").and_then(BiologicalLevel::parse),
        content: text(row, "text").unwrap_or_default().to_string(),
        timestamp: text(row, "date").unwrap_or_default().to_string(),
        bimester: bimester_of(row, "bimester")?,
        school_class: class_of(row, "school_class")?,
    })
}

fn reshape_notification(row: &Value) -> Option<Notification> {
    let mut shaped = json!({
        "id": row.get("id")?,
        "type": row.get("type")?,
        "targetType": row.get("target_type")?,
        "targetId": row.get("target_id")?,
        "message": row.get("message")?,
        "createdAt": row.get("created_at")?,
        "readBy": row.get("read_by").filter(|v| v.is_array()).cloned().unwrap_or(json!([])),
    });
    if let Some(section) = row.get("target_section").filter(|v| !v.is_null()) {
        shaped["targetSection"] = section.clone();
    }
    if let Some(r) = row.get("ref_id").filter(|v| !v.is_null()) {
        shaped["refId"] = r.clone();
    }
    serde_json::from_value(shaped).ok()
}

fn scoped_doc<T: Serialize>(
    bucket: ClassBucket,
    row: &Value,
    class_key: &str,
    doc: impl FnOnce(SchoolClass, Bimester) -> T,
) -> Option<(ClassBucket, SchoolClass, Bimester, Value)> {
    let class = class_of(row, class_key)?;
    let bim = bimester_of(row, "bimester")?;
    let value = serde_json::to_value(doc(class, bim)).ok()?;
    Some((bucket, class, bim, value))
}

impl Gradebook {
    /// Replaces the local mirror with the remote state. Nothing is written
    /// unless every collection was fetched.
    pub fn pull(&self) -> Result<PullReport> {
        let Some(remote) = self.remote() else {
            return Err(GradebookError::RemoteSync(
                "no remote store configured".to_string(),
            ));
        };
        let fetch = |table: &str, columns: &str| {
            remote
                .select(table, columns)
                .map_err(|e| GradebookError::RemoteSync(format!("{}: {}", table, e)))
        };

        let student_rows = fetch(T_STUDENTS, STUDENT_COLUMNS)?;
        let grade_rows = fetch(T_GRADES, "*")?;
        let content_rows = fetch(T_CONTENT, "*")?;
        let config_rows = fetch(T_CONFIGS, "*")?;
        let settings_rows = fetch(T_CLASS_SETTINGS, "*")?;
        let forum_rows = fetch(T_FORUM, "*")?;
        let forum_settings_rows = fetch(T_FORUM_SETTINGS, "*")?;
        let notification_rows = fetch(T_NOTIFICATIONS, "*")?;

        let mut skipped = 0usize;
        let templates = reshape_configs(&config_rows, &mut skipped);

        let credentials: HashMap<String, Option<String>> = self
            .store()
            .students()?
            .into_iter()
            .map(|s| (s.id, s.credential))
            .collect();

        let mut students: Vec<Student> = Vec::with_capacity(student_rows.len());
        for row in &student_rows {
            match reshape_student(row, &templates, &credentials) {
                Some(s) => students.push(s),
                None => skipped += 1,
            }
        }
        let index: HashMap<String, usize> = students
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        let mut spliced = 0usize;
        for row in &grade_rows {
            if splice_grade(&mut students, &index, row) {
                spliced += 1;
            } else {
                skipped += 1;
            }
        }

        let mut class_docs: Vec<(ClassBucket, SchoolClass, Bimester, Value)> = templates
            .iter()
            .filter_map(|((class, bim), template)| {
                serde_json::to_value(template)
                    .ok()
                    .map(|v| (ClassBucket::ActivityConfigs, *class, *bim, v))
            })
            .collect();
        let before = class_docs.len();
        class_docs.extend(content_rows.iter().filter_map(|row| {
            scoped_doc(ClassBucket::Content, row, "class_level", |class, bim| ClassContent {
                text_content: text(row, "description").unwrap_or_default().to_string(),
                files: list_of(row, "files"),
                reminders: list_of(row, "reminders"),
                last_edited_by: text(row, "updated_by_name").map(str::to_string),
                ..ClassContent::empty(class, bim)
            })
        }));
        class_docs.extend(settings_rows.iter().filter_map(|row| {
            scoped_doc(ClassBucket::ClassSettings, row, "school_class", |_, _| ClassSettings {
                show_average: flag(row, "show_average").unwrap_or(false),
            })
        }));
        class_docs.extend(forum_settings_rows.iter().filter_map(|row| {
            scoped_doc(ClassBucket::ForumSettings, row, "school_class", |_, _| ForumSettings {
                is_enabled: flag(row, "is_enabled").unwrap_or(false),
            })
        }));
        skipped += content_rows.len() + settings_rows.len() + forum_settings_rows.len()
            - (class_docs.len() - before);

        let forum_posts: Vec<ForumPost> = forum_rows.iter().filter_map(reshape_forum_post).collect();
        skipped += forum_rows.len() - forum_posts.len();

        let mut notifications: Vec<Notification> = notification_rows
            .iter()
            .filter_map(reshape_notification)
            .collect();
        skipped += notification_rows.len() - notifications.len();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications.truncate(crate::notify::NOTIFICATION_CAP);

        let snapshot = StoreSnapshot {
            students,
            class_docs,
            forum_posts,
            notifications,
        };
        self.store().replace_snapshot(&snapshot)?;

        let pulled_at = now_iso();
        self.store().kv_set(KV_LAST_PULL, &pulled_at)?;

        let report = PullReport {
            students: snapshot.students.len(),
            grade_rows: spliced,
            skipped_rows: skipped,
            class_docs: snapshot.class_docs.len(),
            forum_posts: snapshot.forum_posts.len(),
            notifications: snapshot.notifications.len(),
            pulled_at,
        };
        info!(
            students = report.students,
            grade_rows = report.grade_rows,
            skipped = report.skipped_rows,
            "pull complete"
        );
        Ok(report)
    }

    pub fn sync_status(&self) -> Result<SyncStatus> {
        Ok(SyncStatus {
            remote_configured: self.has_remote(),
            last_pull: self.store().kv_get(KV_LAST_PULL)?,
        })
    }

    // --- push -----------------------------------------------------------

    pub(crate) fn push_student(&self, s: &Student) -> PushOutcome {
        self.push("student", |r| {
            r.upsert(T_STUDENTS, vec![student_row(s)])?;
            r.upsert(T_GRADES, grade_rows(s))
        })
    }

    pub(crate) fn push_students(&self, students: &[Student]) -> PushOutcome {
        if students.is_empty() {
            return if self.has_remote() {
                PushOutcome::Synced
            } else {
                PushOutcome::Skipped
            };
        }
        self.push("students", |r| {
            r.upsert(T_STUDENTS, students.iter().map(student_row).collect())?;
            r.upsert(T_GRADES, students.iter().flat_map(grade_rows).collect())
        })
    }

    pub(crate) fn push_student_delete(&self, id: &str) -> PushOutcome {
        self.push("student delete", |r| {
            r.delete(T_GRADES, "student_id", id)?;
            r.delete(T_STUDENTS, "id", id)
        })
    }

    pub(crate) fn push_configs(
        &self,
        school_class: SchoolClass,
        bimester: Bimester,
        configs: &[ClassActivityConfig],
    ) -> PushOutcome {
        self.push("activity configs", |r| {
            r.upsert(T_CONFIGS, config_rows(school_class, bimester, configs))
        })
    }

    pub(crate) fn push_content(&self, c: &ClassContent) -> PushOutcome {
        self.push("class content", |r| r.upsert(T_CONTENT, vec![content_row(c)]))
    }

    pub(crate) fn push_class_settings(
        &self,
        school_class: SchoolClass,
        bimester: Bimester,
        settings: &ClassSettings,
    ) -> PushOutcome {
        self.push("class settings", |r| {
            r.upsert(
                T_CLASS_SETTINGS,
                vec![json!({
                    "id": scoped_id(school_class, bimester),
                    "school_class": school_class,
                    "bimester": bimester,
                    "show_average": settings.show_average,
                })],
            )
        })
    }

    pub(crate) fn push_forum_settings(
        &self,
        school_class: SchoolClass,
        bimester: Bimester,
        settings: &ForumSettings,
    ) -> PushOutcome {
        self.push("forum settings", |r| {
            r.upsert(
                T_FORUM_SETTINGS,
                vec![json!({
                    "id": scoped_id(school_class, bimester),
                    "school_class": school_class,
                    "bimester": bimester,
                    "is_enabled": settings.is_enabled,
                })],
            )
        })
    }

    pub(crate) fn push_forum_post(&self, p: &ForumPost) -> PushOutcome {
        self.push("forum post", |r| r.upsert(T_FORUM, vec![forum_row(p)]))
    }

    pub(crate) fn push_forum_delete(&self, id: &str) -> PushOutcome {
        self.push("forum delete", |r| r.delete(T_FORUM, "id", id))
    }

    pub(crate) fn push_notifications(&self, list: &[Notification]) -> PushOutcome {
        self.push("notifications", |r| {
            r.upsert(T_NOTIFICATIONS, list.iter().map(notification_row).collect())
        })
    }

    pub(crate) fn push_notification_ref_delete(&self, ref_id: &str) -> PushOutcome {
        self.push("notification delete", |r| r.delete(T_NOTIFICATIONS, "ref_id", ref_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, NotificationType, TargetType};
    use crate::remote::memory::MemoryRemote;
    use std::rc::Rc;

    fn remote_with_one_student() -> Rc<MemoryRemote> {
        let remote = Rc::new(MemoryRemote::default());
        remote.seed(
            T_STUDENTS,
            vec![json!({
                "id": "s1",
                "school_class": "1A",
                "birth_date": "2009-03-01",
                "biological_sex": "F",
                "residence_type": "RURAL",
                "is_monitor": true,
                "biological_level": "CELL",
                "profiles": { "name": "Ana", "email": "ana@escola.br" },
            })],
        );
        remote.seed(
            T_CONFIGS,
            vec![json!({
                "id": "1A_1º Bimestre_2",
                "school_class": "1A",
                "bimester": "1º Bimestre",
                "activity_id": 2,
                "title": "Prova",
                "max_score": 8.0,
                "has_recovery": true,
            })],
        );
        remote.seed(
            T_GRADES,
            vec![
                json!({
                    "id": "s1-1º Bimestre-2",
                    "student_id": "s1",
                    "bimester": "1º Bimestre",
                    "activity_id": 2,
                    "score": 7.0,
                    "recovery_score": null,
                }),
                json!({
                    "id": "s1-2º Bimestre-3",
                    "student_id": "s1",
                    "bimester": "2º Bimestre",
                    "title": "Seminário",
                    "score": 5.0,
                }),
                json!({
                    "id": "ghost-1º Bimestre-1",
                    "student_id": "ghost",
                    "bimester": "1º Bimestre",
                    "score": 9.0,
                }),
            ],
        );
        remote.seed(
            T_NOTIFICATIONS,
            vec![json!({
                "id": "n1",
                "type": "GRADE",
                "target_type": "STUDENT",
                "target_id": "s1",
                "message": "Sua nota em Prova foi atualizada.",
                "target_section": "GRADES",
                "ref_id": null,
                "created_at": "2026-03-01T10:00:00.000Z",
                "read_by": [],
            })],
        );
        remote
    }

    #[test]
    fn pull_splices_grade_rows_into_template_scaffold() {
        let remote = remote_with_one_student();
        let book = Gradebook::for_tests(Some(Box::new(remote.clone())));

        let report = book.pull().expect("pull");
        assert_eq!(report.students, 1);
        assert_eq!(report.grade_rows, 2);
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(report.notifications, 1);

        let s = book.store().student("s1").unwrap().expect("student");
        assert_eq!(s.name, "Ana");
        assert_eq!(s.biological_sex, BiologicalSex::F);
        assert_eq!(s.biological_level, BiologicalLevel::Cell);
        let first: &[Activity] = s.activities(Bimester::First);
        assert_eq!(first.len(), 3);
        assert_eq!(first[1].title, "Prova");
        assert_eq!(first[1].max_score, 8.0);
        assert!(first[1].has_recovery);
        assert_eq!(first[1].score, Some(7.0));
        assert_eq!(first[0].score, None);
        let second = s.activities(Bimester::Second);
        assert_eq!(second[2].score, Some(5.0));
        assert_eq!(second[2].title, "Seminário");

        let template: Option<Vec<ClassActivityConfig>> = book
            .store()
            .class_doc(ClassBucket::ActivityConfigs, SchoolClass::First1A, Bimester::First)
            .unwrap();
        let template = template.expect("template");
        assert_eq!(template.len(), 3);
        assert_eq!(template[1].title, "Prova");

        let notes = book.store().notifications().unwrap();
        assert_eq!(notes[0].kind, NotificationType::Grade);
        assert_eq!(notes[0].target_type, TargetType::Student);
        assert!(book.sync_status().unwrap().last_pull.is_some());
    }

    #[test]
    fn pull_keeps_local_credentials_for_known_ids() {
        let remote = remote_with_one_student();
        let book = Gradebook::for_tests(Some(Box::new(remote.clone())));
        book.pull().expect("first pull");
        let mut s = book.store().student("s1").unwrap().expect("student");
        s.credential = Some("fingerprint".into());
        book.store().put_student(&s).unwrap();

        book.pull().expect("second pull");
        let s = book.store().student("s1").unwrap().expect("student");
        assert_eq!(s.credential.as_deref(), Some("fingerprint"));
    }

    #[test]
    fn failed_pull_leaves_store_untouched() {
        let remote = remote_with_one_student();
        let book = Gradebook::for_tests(Some(Box::new(remote.clone())));
        book.pull().expect("pull");
        remote.seed(T_STUDENTS, Vec::new());
        remote.fail.set(true);

        let err = book.pull().unwrap_err();
        assert!(matches!(err, GradebookError::RemoteSync(_)));
        assert_eq!(book.store().students().unwrap().len(), 1);
    }

    #[test]
    fn pull_without_remote_is_an_error() {
        let book = Gradebook::for_tests(None);
        assert!(matches!(book.pull(), Err(GradebookError::RemoteSync(_))));
        assert!(!book.sync_status().unwrap().remote_configured);
    }

    #[test]
    fn grade_slot_falls_back_to_id_suffix() {
        assert_eq!(grade_slot(&json!({ "id": "abc-def-1º Bimestre-3" })), Some(3));
        assert_eq!(grade_slot(&json!({ "id": "x", "activity_id": 2 })), Some(2));
        assert_eq!(grade_slot(&json!({ "id": "x-9" })), None);
    }
}
