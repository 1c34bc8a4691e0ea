use crate::error::{GradebookError, Result};
use crate::gradebook::{Capability, Gradebook, PushOutcome, Synced};
use crate::model::{
    new_id, now_iso, Bimester, ClassContent, ClassSettings, ForumPost, ForumSettings,
    NotificationType, SchoolClass, TargetSection, UserRole,
};
use crate::notify::NewNotification;
use crate::store::ClassBucket;
use serde::Deserialize;
use tracing::debug;

const REMINDER_PREVIEW_CHARS: usize = 20;

pub fn file_ref_id(file_id: &str) -> String {
    format!("FILE_{}", file_id)
}

pub fn reminder_ref_id(reminder_id: &str) -> String {
    format!("REMINDER_{}", reminder_id)
}

fn reminder_preview(text: &str) -> String {
    let mut preview: String = text.chars().take(REMINDER_PREVIEW_CHARS).collect();
    if text.chars().count() > REMINDER_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewForumPost {
    pub school_class: SchoolClass,
    pub bimester: Bimester,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub author_role: UserRole,
    #[serde(default)]
    pub author_level: Option<crate::model::BiologicalLevel>,
}

impl Gradebook {
    pub fn class_content(&self, school_class: SchoolClass, bimester: Bimester) -> Result<ClassContent> {
        Ok(self
            .store()
            .class_doc(ClassBucket::Content, school_class, bimester)?
            .unwrap_or_else(|| ClassContent::empty(school_class, bimester)))
    }

    /// Upserts the class content and emits/retracts notifications for what changed.
    pub fn save_class_content(&self, content: ClassContent) -> Result<Synced<ClassContent>> {
        let old: Option<ClassContent> =
            self.store()
                .class_doc(ClassBucket::Content, content.school_class, content.bimester)?;
        self.require_content_edit(old.as_ref(), &content)?;

        let class = content.school_class;
        let content_ref = content.ref_id();
        let new_text = content.text_content.trim();
        let old_text = old.as_ref().map(|o| o.text_content.trim());

        if !new_text.is_empty() && old_text != Some(new_text) {
            self.add_notification(
                NewNotification::to_class(
                    NotificationType::Content,
                    class,
                    format!("Novo planejamento disponível para {}.", content.bimester.label()),
                    TargetSection::Content,
                )
                .with_ref(content_ref),
            )?;
        } else if new_text.is_empty() && old_text.map(|t| !t.is_empty()).unwrap_or(false) {
            self.remove_notifications_by_ref(&content_ref)?;
        }

        if let Some(old) = &old {
            for f in &old.files {
                if !content.files.iter().any(|cf| cf.id == f.id) {
                    self.remove_notifications_by_ref(&file_ref_id(&f.id))?;
                }
            }
            for r in &old.reminders {
                if !content.reminders.iter().any(|cr| cr.id == r.id) {
                    self.remove_notifications_by_ref(&reminder_ref_id(&r.id))?;
                }
            }
        }

        let old_files = old.as_ref().map(|o| o.files.len()).unwrap_or(0);
        if content.files.len() > old_files {
            if let Some(f) = content.files.last() {
                self.add_notification(
                    NewNotification::to_class(
                        NotificationType::Material,
                        class,
                        format!("Novo material: {}", f.name),
                        TargetSection::Materials,
                    )
                    .with_ref(file_ref_id(&f.id)),
                )?;
            }
        }
        let old_reminders = old.as_ref().map(|o| o.reminders.len()).unwrap_or(0);
        if content.reminders.len() > old_reminders {
            if let Some(r) = content.reminders.last() {
                self.add_notification(
                    NewNotification::to_class(
                        NotificationType::Reminder,
                        class,
                        format!("Novo aviso no mural: {}", reminder_preview(&r.text)),
                        TargetSection::Calendar,
                    )
                    .with_ref(reminder_ref_id(&r.id)),
                )?;
            }
        }

        self.store()
            .put_class_doc(ClassBucket::Content, class, content.bimester, &content)?;
        debug!(class = class.code(), bimester = content.bimester.label(), "class content saved");
        let push = self.push_content(&content);
        Ok(Synced::new(content, push))
    }

    /// Monitors need the capability matching each part they changed.
    fn require_content_edit(&self, old: Option<&ClassContent>, new: &ClassContent) -> Result<()> {
        let empty = ClassContent::empty(new.school_class, new.bimester);
        let old = old.unwrap_or(&empty);
        if old.text_content != new.text_content {
            self.require(Capability::ManageContent)?;
        }
        if old.files != new.files {
            self.require(Capability::ManageMaterials)?;
        }
        if old.reminders != new.reminders {
            self.require(Capability::ManageMural)?;
        }
        if old.text_content == new.text_content
            && old.files == new.files
            && old.reminders == new.reminders
        {
            self.require(Capability::ManageContent)?;
        }
        Ok(())
    }

    pub fn class_settings(&self, school_class: SchoolClass, bimester: Bimester) -> Result<ClassSettings> {
        Ok(self
            .store()
            .class_doc(ClassBucket::ClassSettings, school_class, bimester)?
            .unwrap_or_default())
    }

    pub fn save_class_settings(
        &self,
        school_class: SchoolClass,
        bimester: Bimester,
        settings: ClassSettings,
    ) -> Result<Synced<ClassSettings>> {
        self.require(Capability::Admin)?;
        let old = self.class_settings(school_class, bimester)?;
        if settings.show_average && !old.show_average {
            self.add_notification(NewNotification::to_class(
                NotificationType::Grade,
                school_class,
                format!("As médias do {} já estão disponíveis.", bimester.label()),
                TargetSection::Grades,
            ))?;
        }
        self.store()
            .put_class_doc(ClassBucket::ClassSettings, school_class, bimester, &settings)?;
        let push = self.push_class_settings(school_class, bimester, &settings);
        Ok(Synced::new(settings, push))
    }

    // --- forum ----------------------------------------------------------

    pub fn forum_posts(&self, school_class: SchoolClass, bimester: Bimester) -> Result<Vec<ForumPost>> {
        self.store().forum_posts(school_class, bimester)
    }

    pub fn forum_settings(&self, school_class: SchoolClass, bimester: Bimester) -> Result<ForumSettings> {
        Ok(self
            .store()
            .class_doc(ClassBucket::ForumSettings, school_class, bimester)?
            .unwrap_or_default())
    }

    pub fn save_forum_settings(
        &self,
        school_class: SchoolClass,
        bimester: Bimester,
        settings: ForumSettings,
    ) -> Result<Synced<ForumSettings>> {
        self.require(Capability::Admin)?;
        self.store()
            .put_class_doc(ClassBucket::ForumSettings, school_class, bimester, &settings)?;
        let push = self.push_forum_settings(school_class, bimester, &settings);
        Ok(Synced::new(settings, push))
    }

    /// Students cannot post while the forum of their class/bimester is closed.
    pub fn post_to_forum(&self, new: NewForumPost) -> Result<Synced<ForumPost>> {
        if new.content.trim().is_empty() {
            return Err(GradebookError::validation("post content is required"));
        }
        if let Some(session) = self.session()? {
            if session.id != new.author_id || session.role != new.author_role {
                return Err(GradebookError::PermissionDenied(
                    "posts must be authored by the signed-in user".to_string(),
                ));
            }
        }
        if new.author_role == UserRole::Student
            && !self.forum_settings(new.school_class, new.bimester)?.is_enabled
        {
            return Err(GradebookError::PermissionDenied(
                "forum is closed for students".to_string(),
            ));
        }
        let post = ForumPost {
            id: new_id(),
            author_id: new.author_id,
            author_name: new.author_name,
            author_role: new.author_role,
            author_level: new.author_level,
            content: new.content,
            timestamp: now_iso(),
            bimester: new.bimester,
            school_class: new.school_class,
        };
        self.store().put_forum_post(&post)?;
        let push = self.push_forum_post(&post);
        Ok(Synced::new(post, push))
    }

    /// Removes a post by trimmed id. Only a successful removal is pushed.
    pub fn delete_forum_post(&self, post_id: &str) -> Result<Synced<bool>> {
        self.require(Capability::ManageMural)?;
        let id = post_id.trim();
        if !self.store().delete_forum_post(id)? {
            return Ok(Synced::new(false, PushOutcome::Skipped));
        }
        let push = self.push_forum_delete(id);
        Ok(Synced::new(true, push))
    }
}
