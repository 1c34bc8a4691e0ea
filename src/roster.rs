use crate::error::{GradebookError, Result};
use crate::gradebook::{Capability, Gradebook, PushOutcome, Synced};
use crate::model::{
    new_id, now_iso, scaffold_grades, AttachmentKind, BiologicalLevel, BiologicalSex,
    FileAttachment, NotificationType, Reminder, ResidenceType, SchoolClass, Student,
    TargetSection,
};
use crate::notify::NewNotification;
use crate::remote::{IdentityChanges, NewIdentity};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub password: String,
    pub school_class: SchoolClass,
    #[serde(default)]
    pub birth_date: String,
    pub biological_sex: BiologicalSex,
    pub residence_type: ResidenceType,
    #[serde(default)]
    pub is_monitor: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
impl NewStudent {
    pub fn sample(name: &str, email: &str, school_class: SchoolClass) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: "senha123".into(),
            school_class,
            birth_date: "2009-06-15".into(),
            biological_sex: BiologicalSex::F,
            residence_type: ResidenceType::Urban,
            is_monitor: false,
            avatar_url: None,
        }
    }
}

/// Fields to change; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub school_class: Option<SchoolClass>,
    pub birth_date: Option<String>,
    pub biological_sex: Option<BiologicalSex>,
    pub residence_type: Option<ResidenceType>,
    pub is_monitor: Option<bool>,
    pub biological_level: Option<BiologicalLevel>,
    pub avatar_url: Option<String>,
}

impl StudentPatch {
    /// True when only fields a student may change on their own profile are set.
    fn is_self_service(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.school_class.is_none()
            && self.birth_date.is_none()
            && self.biological_sex.is_none()
            && self.residence_type.is_none()
            && self.is_monitor.is_none()
            && self.biological_level.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMaterial {
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
}

impl Gradebook {
    pub(crate) fn require_admin_or_self(&self, student_id: &str) -> Result<()> {
        match self.session()? {
            Some(s) if s.id == student_id => Ok(()),
            _ => self.require(Capability::Admin),
        }
    }

    fn author_name(&self) -> Result<Option<String>> {
        Ok(self.session()?.map(|s| s.name))
    }

    pub fn create_student(&self, new: NewStudent) -> Result<Synced<Student>> {
        self.require(Capability::Admin)?;
        let email = new.email.trim().to_string();
        let name = new.name.trim().to_string();
        if name.is_empty() || email.is_empty() {
            return Err(GradebookError::validation("name and email are required"));
        }
        if new.password.is_empty() {
            return Err(GradebookError::validation("password is required"));
        }
        if self.store().student_by_email(&email)?.is_some() {
            return Err(GradebookError::DuplicateEmail(email));
        }

        let mut templates = Vec::new();
        for bim in crate::model::Bimester::ALL {
            templates.push((bim, self.activity_configs(new.school_class, bim)?));
        }
        let bimester_grades = scaffold_grades(|bim| {
            templates
                .iter()
                .find(|(b, _)| *b == bim)
                .map(|(_, t)| t.clone())
                .unwrap_or_default()
        });

        let student = Student {
            credential: Some(self.hash_password(&new.password)?),
            id: new_id(),
            name,
            email,
            school_class: new.school_class,
            birth_date: new.birth_date,
            biological_sex: new.biological_sex,
            residence_type: new.residence_type,
            is_monitor: new.is_monitor,
            biological_level: BiologicalLevel::Organelle,
            avatar_url: new.avatar_url,
            personal_reminders: Vec::new(),
            personal_materials: Vec::new(),
            bimester_grades,
        };
        self.store().put_student(&student)?;
        info!(student = %student.id, class = student.school_class.code(), "student created");

        let identity = NewIdentity {
            id: student.id.clone(),
            email: student.email.clone(),
            password: new.password,
            name: student.name.clone(),
            role: "student",
        };
        let push = self
            .push("student identity", |r| r.create_identity(&identity))
            .and(self.push_student(&student));
        Ok(Synced::new(student, push))
    }

    pub fn update_student(&self, id: &str, patch: StudentPatch) -> Result<Synced<Student>> {
        if self.require(Capability::Admin).is_err() {
            self.require_admin_or_self(id)?;
            if !patch.is_self_service() {
                return Err(GradebookError::PermissionDenied(
                    "only avatarUrl and password can be changed on your own profile".to_string(),
                ));
            }
        }
        let mut s = self.student_or_not_found(id)?;

        let mut identity = IdentityChanges::default();
        if let Some(email) = patch.email.map(|e| e.trim().to_string()) {
            if email.is_empty() {
                return Err(GradebookError::validation("email cannot be empty"));
            }
            if email != s.email {
                if let Some(other) = self.store().student_by_email(&email)? {
                    if other.id != s.id {
                        return Err(GradebookError::DuplicateEmail(email));
                    }
                }
                identity.email = Some(email.clone());
                s.email = email;
            }
        }
        if let Some(name) = patch.name {
            if name != s.name {
                identity.name = Some(name.clone());
                s.name = name;
            }
        }
        if let Some(password) = patch.password.filter(|p| !p.is_empty()) {
            s.credential = Some(self.hash_password(&password)?);
            identity.password = Some(password);
        }
        if let Some(v) = patch.school_class {
            s.school_class = v;
        }
        if let Some(v) = patch.birth_date {
            s.birth_date = v;
        }
        if let Some(v) = patch.biological_sex {
            s.biological_sex = v;
        }
        if let Some(v) = patch.residence_type {
            s.residence_type = v;
        }
        if let Some(v) = patch.is_monitor {
            s.is_monitor = v;
        }
        if let Some(v) = patch.biological_level {
            s.biological_level = v;
        }
        if let Some(v) = patch.avatar_url {
            s.avatar_url = Some(v).filter(|u| !u.is_empty());
        }

        self.store().put_student(&s)?;
        self.refresh_session_for(&s)?;

        let mut push = PushOutcome::Skipped;
        if !identity.is_empty() {
            push = self.push("student identity", |r| r.update_identity(&s.id, &identity));
        }
        let push = push.and(self.push_student(&s));
        Ok(Synced::new(s, push))
    }

    pub fn delete_student(&self, id: &str) -> Result<Synced<()>> {
        self.require_admin_or_self(id)?;
        if !self.store().delete_student(id)? {
            return Err(GradebookError::NotFound(format!("student {}", id)));
        }
        if self.session()?.map(|s| s.id == id).unwrap_or(false) {
            self.clear_session()?;
        }
        info!(student = %id, "student deleted");
        Ok(Synced::new((), self.push_student_delete(id)))
    }

    /// Moves the biological level `delta` ranks, clamped to the ladder.
    pub fn shift_level(&self, id: &str, delta: i64) -> Result<Synced<Student>> {
        self.require(Capability::Admin)?;
        let mut s = self.student_or_not_found(id)?;
        s.biological_level = s.biological_level.shifted(delta);
        self.store().put_student(&s)?;
        self.refresh_session_for(&s)?;
        let push = self.push_student(&s);
        Ok(Synced::new(s, push))
    }

    pub fn add_personal_reminder(
        &self,
        student_id: &str,
        text: &str,
        date: Option<String>,
    ) -> Result<Synced<Reminder>> {
        self.require(Capability::ManageMural)?;
        if text.trim().is_empty() {
            return Err(GradebookError::validation("reminder text is required"));
        }
        let mut s = self.student_or_not_found(student_id)?;
        let reminder = Reminder {
            id: new_id(),
            text: text.to_string(),
            date,
            created_at: now_iso(),
            created_by: self.author_name()?,
        };
        s.personal_reminders.push(reminder.clone());
        self.store().put_student(&s)?;
        self.refresh_session_for(&s)?;
        self.add_notification(NewNotification::to_student(
            NotificationType::Reminder,
            &s.id,
            "Aviso exclusivo enviado para você.",
            TargetSection::Calendar,
        ))?;
        let push = self.push_student(&s);
        Ok(Synced::new(reminder, push))
    }

    /// Returns whether a reminder was removed.
    pub fn remove_personal_reminder(&self, student_id: &str, reminder_id: &str) -> Result<Synced<bool>> {
        self.require(Capability::ManageMural)?;
        let mut s = self.student_or_not_found(student_id)?;
        let before = s.personal_reminders.len();
        s.personal_reminders.retain(|r| r.id != reminder_id);
        if s.personal_reminders.len() == before {
            return Ok(Synced::new(false, PushOutcome::Skipped));
        }
        self.store().put_student(&s)?;
        self.refresh_session_for(&s)?;
        let push = self.push_student(&s);
        Ok(Synced::new(true, push))
    }

    pub fn add_personal_material(
        &self,
        student_id: &str,
        material: NewMaterial,
    ) -> Result<Synced<FileAttachment>> {
        self.require(Capability::ManageMaterials)?;
        let mut s = self.student_or_not_found(student_id)?;
        let file = FileAttachment {
            id: new_id(),
            name: material.name,
            size: material.size,
            kind: material.kind,
            url: material.url,
            sent_at: now_iso(),
            created_by: self.author_name()?,
        };
        s.personal_materials.push(file.clone());
        self.store().put_student(&s)?;
        self.refresh_session_for(&s)?;
        self.add_notification(NewNotification::to_student(
            NotificationType::Material,
            &s.id,
            "Arquivo individual enviado para você.",
            TargetSection::Materials,
        ))?;
        let push = self.push_student(&s);
        Ok(Synced::new(file, push))
    }

    pub fn remove_personal_material(&self, student_id: &str, material_id: &str) -> Result<Synced<bool>> {
        self.require(Capability::ManageMaterials)?;
        let mut s = self.student_or_not_found(student_id)?;
        let before = s.personal_materials.len();
        s.personal_materials.retain(|m| m.id != material_id);
        if s.personal_materials.len() == before {
            return Ok(Synced::new(false, PushOutcome::Skipped));
        }
        self.store().put_student(&s)?;
        self.refresh_session_for(&s)?;
        let push = self.push_student(&s);
        Ok(Synced::new(true, push))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bimester, MonitorPermissions, Session, UserRole};
    use crate::remote::memory::MemoryRemote;
    use crate::session::verify_password;
    use crate::sync::{T_GRADES, T_STUDENTS};
    use std::rc::Rc;

    #[test]
    fn create_then_rename_keeps_other_fields() {
        let book = Gradebook::for_tests(None);
        let created = book
            .create_student(NewStudent::sample("Ana", "ana@escola.br", SchoolClass::Second2B))
            .unwrap();
        assert_eq!(created.push, PushOutcome::Skipped);
        let s = created.value;
        assert_eq!(s.biological_level, BiologicalLevel::Organelle);
        assert_eq!(s.bimester_grades.len(), 4);
        assert!(s.bimester_grades.values().all(|acts| acts.len() == 3));
        assert!(verify_password("senha123", s.credential.as_deref()));

        let updated = book
            .update_student(
                &s.id,
                StudentPatch {
                    name: Some("Ana Clara".into()),
                    ..StudentPatch::default()
                },
            )
            .unwrap()
            .value;
        let stored = book.store().student(&s.id).unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(stored.name, "Ana Clara");
        assert_eq!(stored.email, "ana@escola.br");
        assert_eq!(stored.school_class, SchoolClass::Second2B);
        assert_eq!(stored.bimester_grades, s.bimester_grades);
    }

    #[test]
    fn duplicate_email_leaves_roster_unchanged() {
        let book = Gradebook::for_tests(None);
        book.create_student(NewStudent::sample("Ana", "ana@escola.br", SchoolClass::First1A))
            .unwrap();
        let err = book
            .create_student(NewStudent::sample("Outra", "ana@escola.br", SchoolClass::Third3A))
            .unwrap_err();
        assert!(matches!(err, GradebookError::DuplicateEmail(_)));
        assert_eq!(book.store().students().unwrap().len(), 1);

        let bia = book
            .create_student(NewStudent::sample("Bia", "bia@escola.br", SchoolClass::First1A))
            .unwrap()
            .value;
        let err = book
            .update_student(
                &bia.id,
                StudentPatch {
                    email: Some("ana@escola.br".into()),
                    ..StudentPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, GradebookError::DuplicateEmail(_)));
    }

    #[test]
    fn unknown_student_is_not_found() {
        let book = Gradebook::for_tests(None);
        assert!(matches!(
            book.update_student("nope", StudentPatch::default()),
            Err(GradebookError::NotFound(_))
        ));
        assert!(matches!(
            book.delete_student("nope"),
            Err(GradebookError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_signed_in_student_clears_session() {
        let book = Gradebook::for_tests(None);
        let s = book
            .create_student(NewStudent::sample("Ana", "ana@escola.br", SchoolClass::First1A))
            .unwrap()
            .value;
        book.set_session(&Session {
            id: "teacher".into(),
            name: "Prof".into(),
            role: UserRole::Teacher,
            permissions: MonitorPermissions::all(),
            student_data: None,
        })
        .unwrap();
        book.delete_student(&s.id).unwrap();
        assert!(book.session().unwrap().is_some());

        let s = book
            .create_student(NewStudent::sample("Bia", "bia@escola.br", SchoolClass::First1A))
            .unwrap()
            .value;
        book.set_session(&Session {
            id: s.id.clone(),
            name: s.name.clone(),
            role: UserRole::Student,
            permissions: MonitorPermissions::login_only(),
            student_data: Some(s.clone()),
        })
        .unwrap();
        book.delete_student(&s.id).unwrap();
        assert!(book.session().unwrap().is_none());
    }

    #[test]
    fn push_mirrors_student_and_grade_rows() {
        let remote = Rc::new(MemoryRemote::default());
        let book = Gradebook::for_tests(Some(Box::new(remote.clone())));
        let created = book
            .create_student(NewStudent::sample("Ana", "ana@escola.br", SchoolClass::First1A))
            .unwrap();
        assert_eq!(created.push, PushOutcome::Synced);
        assert_eq!(remote.identities.borrow().len(), 1);
        assert_eq!(remote.rows(T_STUDENTS).len(), 1);
        assert_eq!(remote.rows(T_GRADES).len(), 12);
        assert!(remote.rows(T_STUDENTS)[0].get("password").is_none());

        remote.fail.set(true);
        let updated = book
            .update_student(
                &created.value.id,
                StudentPatch {
                    password: Some("nova".into()),
                    ..StudentPatch::default()
                },
            )
            .unwrap();
        assert!(updated.push.is_failed());
        let stored = book.store().student(&created.value.id).unwrap().unwrap();
        assert!(verify_password("nova", stored.credential.as_deref()));
        assert!(!verify_password("senha123", stored.credential.as_deref()));

        remote.fail.set(false);
        book.delete_student(&stored.id).unwrap();
        assert!(remote.rows(T_STUDENTS).is_empty());
        assert!(remote.rows(T_GRADES).is_empty());
    }

    #[test]
    fn personal_items_notify_the_student() {
        let book = Gradebook::for_tests(None);
        let s = book
            .create_student(NewStudent::sample("Ana", "ana@escola.br", SchoolClass::First1A))
            .unwrap()
            .value;
        let r = book
            .add_personal_reminder(&s.id, "Trazer jaleco", Some("2026-03-10".into()))
            .unwrap()
            .value;
        book.add_personal_material(
            &s.id,
            NewMaterial {
                name: "resumo.pdf".into(),
                size: "1 MB".into(),
                kind: AttachmentKind::Pdf,
                url: "https://files.example/resumo.pdf".into(),
            },
        )
        .unwrap();
        let notes = book.store().notifications().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].kind, NotificationType::Material);
        assert_eq!(notes[1].target_section, Some(TargetSection::Calendar));

        assert!(book.remove_personal_reminder(&s.id, &r.id).unwrap().value);
        assert!(!book.remove_personal_reminder(&s.id, &r.id).unwrap().value);
        let stored = book.store().student(&s.id).unwrap().unwrap();
        assert!(stored.personal_reminders.is_empty());
        assert_eq!(stored.personal_materials.len(), 1);
    }

    #[test]
    fn level_shift_is_clamped_and_session_follows() {
        let book = Gradebook::for_tests(None);
        let s = book
            .create_student(NewStudent::sample("Ana", "ana@escola.br", SchoolClass::First1A))
            .unwrap()
            .value;
        let up = book.shift_level(&s.id, 10).unwrap().value;
        assert_eq!(up.biological_level, BiologicalLevel::Organism);
        let down = book.shift_level(&s.id, -1).unwrap().value;
        assert_eq!(down.biological_level, BiologicalLevel::System);

        book.set_session(&Session {
            id: s.id.clone(),
            name: s.name.clone(),
            role: UserRole::Student,
            permissions: MonitorPermissions::login_only(),
            student_data: Some(down.clone()),
        })
        .unwrap();
        book.update_student(
            &s.id,
            StudentPatch {
                avatar_url: Some("https://img.example/a.png".into()),
                ..StudentPatch::default()
            },
        )
        .unwrap();
        let session = book.session().unwrap().unwrap();
        let cached = session.student_data.expect("student data");
        assert_eq!(cached.avatar_url.as_deref(), Some("https://img.example/a.png"));
        assert_eq!(cached.activities(Bimester::First).len(), 3);
    }
}
