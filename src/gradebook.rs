use crate::error::{GradebookError, Result};
use crate::model::{MonitorPermissions, Session, Student, UserRole};
use crate::remote::{RemoteError, RemoteStore};
use crate::store::{Store, KV_MONITOR_PERMISSIONS, KV_SESSION};
use serde::Serialize;
use tracing::{debug, warn};

/// Result of mirroring one mutation to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PushOutcome {
    Synced,
    /// No remote store configured.
    Skipped,
    Failed { message: String },
}

impl PushOutcome {
    /// Keeps the first failure; otherwise the later outcome.
    pub fn and(self, next: PushOutcome) -> PushOutcome {
        match self {
            PushOutcome::Failed { .. } => self,
            _ => next,
        }
    }

    #[cfg(test)]
    pub fn is_failed(&self) -> bool {
        matches!(self, PushOutcome::Failed { .. })
    }
}

/// A committed local mutation plus what happened to its remote mirror.
#[derive(Debug, Clone, Serialize)]
pub struct Synced<T> {
    pub value: T,
    pub push: PushOutcome,
}

impl<T> Synced<T> {
    pub fn new(value: T, push: PushOutcome) -> Self {
        Self { value, push }
    }
}

/// Actions gated by the signed-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Roster, templates, settings, permissions and import.
    Admin,
    EditGrades,
    ManageContent,
    ManageMaterials,
    ManageMural,
}

impl Capability {
    fn label(self) -> &'static str {
        match self {
            Capability::Admin => "teacher only",
            Capability::EditGrades => "canEditGrades required",
            Capability::ManageContent => "canManageContent required",
            Capability::ManageMaterials => "canManageMaterials required",
            Capability::ManageMural => "canManageMural required",
        }
    }

    fn granted_by(self, p: &MonitorPermissions) -> bool {
        match self {
            Capability::Admin => false,
            Capability::EditGrades => p.can_edit_grades,
            Capability::ManageContent => p.can_manage_content,
            Capability::ManageMaterials => p.can_manage_materials,
            Capability::ManageMural => p.can_manage_mural,
        }
    }
}

/// The gradebook service for one workspace: local store plus optional remote mirror.
pub struct Gradebook {
    store: Store,
    remote: Option<Box<dyn RemoteStore>>,
    password_cost: u32,
}

impl Gradebook {
    pub fn new(store: Store, remote: Option<Box<dyn RemoteStore>>) -> Self {
        Self {
            store,
            remote,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    /// bcrypt hash kept in the local `credential` column.
    pub(crate) fn hash_password(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.password_cost)?)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub(crate) fn remote(&self) -> Option<&dyn RemoteStore> {
        self.remote.as_deref()
    }

    /// Runs `op` against the remote store, if any. Failures are logged and reported, never retried.
    pub(crate) fn push<F>(&self, what: &str, op: F) -> PushOutcome
    where
        F: FnOnce(&dyn RemoteStore) -> std::result::Result<(), RemoteError>,
    {
        let Some(remote) = self.remote.as_deref() else {
            return PushOutcome::Skipped;
        };
        match op(remote) {
            Ok(()) => {
                debug!(what, "remote push ok");
                PushOutcome::Synced
            }
            Err(e) => {
                warn!(what, error = %e, "remote push failed");
                PushOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    // --- session --------------------------------------------------------

    pub fn session(&self) -> Result<Option<Session>> {
        self.store.kv_get(KV_SESSION)
    }

    pub(crate) fn set_session(&self, session: &Session) -> Result<()> {
        self.store.kv_set(KV_SESSION, session)
    }

    pub(crate) fn clear_session(&self) -> Result<()> {
        self.store.kv_delete(KV_SESSION)
    }

    pub fn monitor_permissions(&self) -> Result<MonitorPermissions> {
        Ok(self
            .store
            .kv_get(KV_MONITOR_PERMISSIONS)?
            .unwrap_or_default())
    }

    /// No session or a teacher session may do anything; monitors need the
    /// delegated capability; students are denied.
    pub fn require(&self, capability: Capability) -> Result<()> {
        let Some(session) = self.session()? else {
            return Ok(());
        };
        let allowed = match session.role {
            UserRole::Teacher => true,
            UserRole::Student => false,
            UserRole::Monitor => capability.granted_by(&self.monitor_permissions()?),
        };
        if allowed {
            Ok(())
        } else {
            Err(GradebookError::PermissionDenied(capability.label().to_string()))
        }
    }

    /// Keeps a cached student/monitor session in step with the stored record.
    pub(crate) fn refresh_session_for(&self, student: &Student) -> Result<()> {
        let Some(mut session) = self.session()? else {
            return Ok(());
        };
        if session.role == UserRole::Teacher || session.id != student.id {
            return Ok(());
        }
        session.name = student.name.clone();
        session.student_data = Some(student.clone());
        self.set_session(&session)
    }

    pub(crate) fn student_or_not_found(&self, id: &str) -> Result<Student> {
        self.store
            .student(id)?
            .ok_or_else(|| GradebookError::NotFound(format!("student {}", id)))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(remote: Option<Box<dyn RemoteStore>>) -> Self {
        let store = Store::in_memory().expect("in-memory store");
        Self::new(store, remote).with_password_cost(4)
    }
}
