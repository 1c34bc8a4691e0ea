use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const ACTIVITY_SLOTS: [u8; 3] = [1, 2, 3];
pub const DEFAULT_MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchoolClass {
    #[serde(rename = "1A")]
    First1A,
    #[serde(rename = "1B")]
    First1B,
    #[serde(rename = "2A")]
    Second2A,
    #[serde(rename = "2B")]
    Second2B,
    #[serde(rename = "3A")]
    Third3A,
    #[serde(rename = "3B")]
    Third3B,
}

impl SchoolClass {
    pub const ALL: [SchoolClass; 6] = [
        Self::First1A,
        Self::First1B,
        Self::Second2A,
        Self::Second2B,
        Self::Third3A,
        Self::Third3B,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::First1A => "1A",
            Self::First1B => "1B",
            Self::Second2A => "2A",
            Self::Second2B => "2B",
            Self::Third3A => "3A",
            Self::Third3B => "3B",
        }
    }

    /// Exact match on the class code ("1A".."3B").
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bimester {
    #[serde(rename = "1º Bimestre")]
    First,
    #[serde(rename = "2º Bimestre")]
    Second,
    #[serde(rename = "3º Bimestre")]
    Third,
    #[serde(rename = "4º Bimestre")]
    Fourth,
}

impl Bimester {
    pub const ALL: [Bimester; 4] = [Self::First, Self::Second, Self::Third, Self::Fourth];

    pub fn label(self) -> &'static str {
        match self {
            Self::First => "1º Bimestre",
            Self::Second => "2º Bimestre",
            Self::Third => "3º Bimestre",
            Self::Fourth => "4º Bimestre",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == s)
    }

    /// Inclusive date range of the bimester in the 2026 school calendar.
    pub fn date_range(self) -> (NaiveDate, NaiveDate) {
        let (start, end) = match self {
            Self::First => ((2026, 2, 10), (2026, 4, 23)),
            Self::Second => ((2026, 4, 24), (2026, 7, 23)),
            Self::Third => ((2026, 7, 24), (2026, 10, 7)),
            Self::Fourth => ((2026, 10, 8), (2026, 12, 22)),
        };
        (
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap_or_default(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap_or_default(),
        )
    }

    /// Bimester whose range contains `day`; days outside every range map to the first one.
    pub fn containing(day: NaiveDate) -> Self {
        Self::ALL
            .into_iter()
            .find(|b| {
                let (start, end) = b.date_range();
                day >= start && day <= end
            })
            .unwrap_or(Self::First)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiologicalSex {
    M,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResidenceType {
    Urban,
    Rural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BiologicalLevel {
    Atom,
    Molecule,
    Organelle,
    Cell,
    Tissue,
    Organ,
    System,
    Organism,
}

impl BiologicalLevel {
    pub const ORDER: [BiologicalLevel; 8] = [
        Self::Atom,
        Self::Molecule,
        Self::Organelle,
        Self::Cell,
        Self::Tissue,
        Self::Organ,
        Self::System,
        Self::Organism,
    ];

    pub fn rank(self) -> usize {
        Self::ORDER.iter().position(|l| *l == self).unwrap_or(0)
    }

    /// Moves `delta` ranks along the ladder, clamped at both ends.
    pub fn shifted(self, delta: i64) -> Self {
        let max = (Self::ORDER.len() - 1) as i64;
        let idx = (self.rank() as i64 + delta).clamp(0, max);
        Self::ORDER[idx as usize]
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_ascii_uppercase())).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Teacher,
    Student,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: u8,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub score: Option<f64>,
    pub max_score: f64,
    #[serde(default)]
    pub has_recovery: bool,
    #[serde(default)]
    pub recovery_score: Option<f64>,
}

impl Activity {
    pub fn from_config(config: &ClassActivityConfig) -> Self {
        Self {
            id: config.id,
            title: config.title.clone(),
            description: config.description.clone(),
            score: None,
            max_score: config.max_score,
            has_recovery: config.has_recovery,
            recovery_score: None,
        }
    }

    /// Copies template metadata; recorded scores stay as they are.
    pub fn apply_config(&mut self, config: &ClassActivityConfig) {
        self.title = config.title.clone();
        self.description = config.description.clone();
        self.max_score = config.max_score;
        self.has_recovery = config.has_recovery;
    }

    pub fn in_range(&self, value: Option<f64>) -> bool {
        match value {
            Some(v) => v.is_finite() && v >= 0.0 && v <= self.max_score,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassActivityConfig {
    pub id: u8,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub max_score: f64,
    #[serde(default)]
    pub has_recovery: bool,
}

pub fn default_activity_configs() -> Vec<ClassActivityConfig> {
    ACTIVITY_SLOTS
        .iter()
        .map(|&id| ClassActivityConfig {
            id,
            title: format!("Atividade {}", id),
            description: String::new(),
            max_score: DEFAULT_MAX_SCORE,
            has_recovery: false,
        })
        .collect()
}

pub type BimesterGrades = BTreeMap<Bimester, Vec<Activity>>;

/// Four bimesters of three blank activities, shaped by each bimester's template.
pub fn scaffold_grades<F>(mut template_for: F) -> BimesterGrades
where
    F: FnMut(Bimester) -> Vec<ClassActivityConfig>,
{
    let defaults = default_activity_configs();
    Bimester::ALL
        .into_iter()
        .map(|bim| {
            let template = template_for(bim);
            let activities = defaults
                .iter()
                .map(|d| {
                    let conf = template.iter().find(|c| c.id == d.id).unwrap_or(d);
                    Activity::from_config(conf)
                })
                .collect();
            (bim, activities)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttachmentKind {
    Pdf,
    Image,
    Audio,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    pub sent_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    /// SHA-256 fingerprint of the password; kept in its own column, never serialized.
    #[serde(skip)]
    pub credential: Option<String>,
    pub school_class: SchoolClass,
    #[serde(default)]
    pub birth_date: String,
    pub biological_sex: BiologicalSex,
    pub residence_type: ResidenceType,
    #[serde(default)]
    pub is_monitor: bool,
    pub biological_level: BiologicalLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub personal_reminders: Vec<Reminder>,
    #[serde(default)]
    pub personal_materials: Vec<FileAttachment>,
    pub bimester_grades: BimesterGrades,
}

impl Student {
    pub fn activities(&self, bimester: Bimester) -> &[Activity] {
        self.bimester_grades
            .get(&bimester)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn activity_mut(&mut self, bimester: Bimester, slot: u8) -> Option<&mut Activity> {
        self.bimester_grades
            .get_mut(&bimester)
            .and_then(|acts| acts.iter_mut().find(|a| a.id == slot))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassContent {
    pub school_class: SchoolClass,
    pub bimester: Bimester,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
}

impl ClassContent {
    pub fn empty(school_class: SchoolClass, bimester: Bimester) -> Self {
        Self {
            school_class,
            bimester,
            text_content: String::new(),
            files: Vec::new(),
            reminders: Vec::new(),
            last_edited_by: None,
        }
    }

    pub fn ref_id(&self) -> String {
        content_ref_id(self.school_class, self.bimester)
    }
}

pub fn content_ref_id(school_class: SchoolClass, bimester: Bimester) -> String {
    format!("CONTENT_{}_{}", school_class.code(), bimester.label())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSettings {
    pub show_average: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumSettings {
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_level: Option<BiologicalLevel>,
    pub content: String,
    pub timestamp: String,
    pub bimester: Bimester,
    pub school_class: SchoolClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Grade,
    Reminder,
    Material,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetType {
    Class,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetSection {
    Grades,
    Calendar,
    Materials,
    Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub target_type: TargetType,
    pub target_id: String,
    pub created_at: String,
    #[serde(default)]
    pub read_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_section: Option<TargetSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorPermissions {
    pub can_edit_grades: bool,
    pub can_manage_content: bool,
    pub can_manage_materials: bool,
    pub can_manage_mural: bool,
    pub can_login: bool,
}

impl MonitorPermissions {
    pub fn all() -> Self {
        Self {
            can_edit_grades: true,
            can_manage_content: true,
            can_manage_materials: true,
            can_manage_mural: true,
            can_login: true,
        }
    }

    pub fn login_only() -> Self {
        Self {
            can_login: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub permissions: MonitorPermissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_data: Option<Student>,
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// UTC timestamp in the `2026-03-01T12:00:00.000Z` shape.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
