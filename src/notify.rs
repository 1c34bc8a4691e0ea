use crate::error::Result;
use crate::gradebook::{Capability, Gradebook};
use crate::model::{
    new_id, now_iso, Notification, NotificationType, SchoolClass, TargetSection, TargetType,
};
use serde::Deserialize;
use tracing::debug;

pub const NOTIFICATION_CAP: usize = 50;
/// How many of the newest entries are checked for a duplicate.
const SPAM_WINDOW: usize = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub target_type: TargetType,
    pub target_id: String,
    pub message: String,
    #[serde(default)]
    pub target_section: Option<TargetSection>,
    #[serde(default)]
    pub ref_id: Option<String>,
}

impl NewNotification {
    pub fn to_student(
        kind: NotificationType,
        student_id: &str,
        message: impl Into<String>,
        section: TargetSection,
    ) -> Self {
        Self {
            kind,
            target_type: TargetType::Student,
            target_id: student_id.to_string(),
            message: message.into(),
            target_section: Some(section),
            ref_id: None,
        }
    }

    pub fn to_class(
        kind: NotificationType,
        school_class: SchoolClass,
        message: impl Into<String>,
        section: TargetSection,
    ) -> Self {
        Self {
            kind,
            target_type: TargetType::Class,
            target_id: school_class.code().to_string(),
            message: message.into(),
            target_section: Some(section),
            ref_id: None,
        }
    }

    pub fn with_ref(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }
}

/// Inserts `n` at the front unless the same (message, target) is among the
/// newest entries; trims to the cap. Returns whether it was inserted.
fn insert_front(list: &mut Vec<Notification>, n: Notification) -> bool {
    let is_spam = list
        .iter()
        .take(SPAM_WINDOW)
        .any(|e| e.message == n.message && e.target_id == n.target_id);
    if is_spam {
        return false;
    }
    list.insert(0, n);
    list.truncate(NOTIFICATION_CAP);
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    pub student_id: Option<String>,
    pub school_class: Option<SchoolClass>,
    #[serde(default)]
    pub unread_only: bool,
}

impl Gradebook {
    /// Teacher-posted notification.
    pub fn post_notification(&self, new: NewNotification) -> Result<Option<Notification>> {
        self.require(Capability::Admin)?;
        self.add_notification(new)
    }

    /// Teacher-initiated retraction.
    pub fn retract_notifications(&self, ref_id: &str) -> Result<usize> {
        self.require(Capability::Admin)?;
        self.remove_notifications_by_ref(ref_id)
    }

    /// Appends to the log. `None` when suppressed as a repeat. Callers hold
    /// the capability of the action that caused it.
    pub(crate) fn add_notification(&self, new: NewNotification) -> Result<Option<Notification>> {
        let mut list = self.store().notifications()?;
        let n = Notification {
            id: new_id(),
            kind: new.kind,
            message: new.message,
            target_type: new.target_type,
            target_id: new.target_id,
            created_at: now_iso(),
            read_by: Vec::new(),
            target_section: new.target_section,
            ref_id: new.ref_id,
        };
        if !insert_front(&mut list, n.clone()) {
            debug!(target_id = %n.target_id, "duplicate notification suppressed");
            return Ok(None);
        }
        self.store().replace_notifications(&list)?;
        self.push_notifications(std::slice::from_ref(&n));
        Ok(Some(n))
    }

    /// Returns false when the notification does not exist or was already read.
    pub fn mark_notification_read(&self, student_id: &str, notification_id: &str) -> Result<bool> {
        self.require_admin_or_self(student_id)?;
        let mut list = self.store().notifications()?;
        let Some(n) = list.iter_mut().find(|n| n.id == notification_id) else {
            return Ok(false);
        };
        if n.read_by.iter().any(|r| r == student_id) {
            return Ok(false);
        }
        n.read_by.push(student_id.to_string());
        let changed = n.clone();
        self.store().replace_notifications(&list)?;
        self.push_notifications(&[changed]);
        Ok(true)
    }

    /// Marks every entry as read by `student_id`; returns how many changed.
    pub fn mark_all_notifications_read(&self, student_id: &str) -> Result<usize> {
        self.require_admin_or_self(student_id)?;
        let mut list = self.store().notifications()?;
        let mut changed = Vec::new();
        for n in list.iter_mut() {
            if !n.read_by.iter().any(|r| r == student_id) {
                n.read_by.push(student_id.to_string());
                changed.push(n.clone());
            }
        }
        if !changed.is_empty() {
            self.store().replace_notifications(&list)?;
            self.push_notifications(&changed);
        }
        Ok(changed.len())
    }

    pub(crate) fn remove_notifications_by_ref(&self, ref_id: &str) -> Result<usize> {
        let mut list = self.store().notifications()?;
        let before = list.len();
        list.retain(|n| n.ref_id.as_deref() != Some(ref_id));
        let removed = before - list.len();
        if removed > 0 {
            self.store().replace_notifications(&list)?;
            self.push_notification_ref_delete(ref_id);
        }
        Ok(removed)
    }

    /// Newest first. With a student id, only entries aimed at that student or
    /// their class are returned.
    pub fn notifications(&self, filter: &NotificationFilter) -> Result<Vec<Notification>> {
        let list = self.store().notifications()?;
        let class = match (&filter.school_class, &filter.student_id) {
            (Some(c), _) => Some(*c),
            (None, Some(id)) => self.store().student(id)?.map(|s| s.school_class),
            (None, None) => None,
        };
        Ok(list
            .into_iter()
            .filter(|n| {
                if filter.student_id.is_none() && class.is_none() {
                    return true;
                }
                let for_student = n.target_type == TargetType::Student
                    && filter.student_id.as_deref() == Some(n.target_id.as_str());
                let for_class = n.target_type == TargetType::Class
                    && class.map(|c| c.code() == n.target_id).unwrap_or(false);
                for_student || for_class
            })
            .filter(|n| {
                !filter.unread_only
                    || filter
                        .student_id
                        .as_ref()
                        .map(|id| !n.read_by.contains(id))
                        .unwrap_or(true)
            })
            .collect())
    }
}
