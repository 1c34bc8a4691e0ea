use crate::error::{GradebookError, Result};
use crate::gradebook::{Capability, Gradebook, Synced};
use crate::model::{new_id, MonitorPermissions, Session, Student, Teacher, UserRole};
use crate::remote::{NewIdentity, RemoteAccount};
use crate::store::KV_MONITOR_PERMISSIONS;
use tracing::{info, warn};

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// A malformed stored hash counts as a mismatch.
pub(crate) fn verify_password(password: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(hash) => bcrypt::verify(password, hash).unwrap_or(false),
        None => false,
    }
}

impl Gradebook {
    pub fn teachers(&self) -> Result<Vec<Teacher>> {
        self.store().teachers()
    }

    /// Only one teacher account may exist, locally or on the remote store.
    pub fn register_teacher(&self, name: &str, email: &str, password: &str) -> Result<Synced<Teacher>> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(GradebookError::validation("name, email and password are required"));
        }
        if !self.store().teachers()?.is_empty() {
            return Err(GradebookError::validation("only one teacher is allowed"));
        }
        if let Some(remote) = self.remote() {
            let exists = remote
                .teacher_exists()
                .map_err(|e| GradebookError::RemoteSync(e.to_string()))?;
            if exists {
                return Err(GradebookError::validation("only one teacher is allowed"));
            }
        }
        if self.store().student_by_email(email)?.is_some() {
            return Err(GradebookError::DuplicateEmail(email.to_string()));
        }
        let teacher = Teacher {
            id: new_id(),
            name: name.to_string(),
            email: email.to_string(),
            credential: Some(self.hash_password(password)?),
        };
        self.store().put_teacher(&teacher)?;
        info!(teacher = %teacher.id, "teacher registered");

        let identity = NewIdentity {
            id: teacher.id.clone(),
            email: teacher.email.clone(),
            password: password.to_string(),
            name: teacher.name.clone(),
            role: "teacher",
        };
        let push = self.push("teacher identity", |r| r.create_identity(&identity));
        Ok(Synced::new(teacher, push))
    }

    /// Verifies the password against the local hash, falling back to the
    /// remote identity subsystem, and persists the session.
    pub fn login(&self, email: &str, password: &str, role: UserRole) -> Result<Session> {
        let email = email.trim();
        let session = match role {
            UserRole::Teacher => {
                let Some(t) = self.authenticate_teacher(email, password)? else {
                    return Err(self.deny_login(email, role));
                };
                Session {
                    id: t.id,
                    name: t.name,
                    role,
                    permissions: MonitorPermissions::all(),
                    student_data: None,
                }
            }
            UserRole::Student | UserRole::Monitor => {
                let Some(mut s) = self.authenticate_student(email, password)? else {
                    return Err(self.deny_login(email, role));
                };
                let permissions = if role == UserRole::Monitor {
                    let delegated = self.monitor_permissions()?;
                    if !s.is_monitor || !delegated.can_login {
                        return Err(GradebookError::PermissionDenied(
                            "monitor access is not enabled for this account".to_string(),
                        ));
                    }
                    delegated
                } else {
                    MonitorPermissions::login_only()
                };
                s.credential = None;
                Session {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    role,
                    permissions,
                    student_data: Some(s),
                }
            }
        };
        self.set_session(&session)?;
        info!(user = %session.id, role = ?session.role, "signed in");
        Ok(session)
    }

    fn authenticate_teacher(&self, email: &str, password: &str) -> Result<Option<Teacher>> {
        let local = self.store().teachers()?.into_iter().find(|t| t.email == email);
        if let Some(t) = &local {
            if verify_password(password, t.credential.as_deref()) {
                return Ok(local);
            }
        }
        let Some(account) = self.remote_sign_in(email, password)? else {
            return Ok(None);
        };
        if account.role != "teacher" {
            return Ok(None);
        }
        let credential = Some(self.hash_password(password)?);
        // A known local teacher keeps its id so only one row ever exists.
        let teacher = match local {
            Some(t) => Teacher { credential, ..t },
            None => Teacher {
                id: account.id,
                name: account.name,
                email: email.to_string(),
                credential,
            },
        };
        self.store().put_teacher(&teacher)?;
        info!(teacher = %teacher.id, "cached remote teacher credential");
        Ok(Some(teacher))
    }

    /// Pulled students carry no local hash; the first remote sign-in caches one.
    fn authenticate_student(&self, email: &str, password: &str) -> Result<Option<Student>> {
        let Some(mut s) = self.store().student_by_email(email)? else {
            return Ok(None);
        };
        if verify_password(password, s.credential.as_deref()) {
            return Ok(Some(s));
        }
        match self.remote_sign_in(email, password)? {
            Some(account) if account.id == s.id && account.role != "teacher" => {
                s.credential = Some(self.hash_password(password)?);
                self.store().put_student(&s)?;
                info!(student = %s.id, "cached remote student credential");
                Ok(Some(s))
            }
            _ => Ok(None),
        }
    }

    fn remote_sign_in(&self, email: &str, password: &str) -> Result<Option<RemoteAccount>> {
        let Some(remote) = self.remote() else {
            return Ok(None);
        };
        remote.sign_in(email, password).map_err(|e| {
            warn!(email, error = %e, "remote sign-in failed");
            GradebookError::RemoteSync(e.to_string())
        })
    }

    fn deny_login(&self, email: &str, role: UserRole) -> GradebookError {
        warn!(email, role = ?role, "login rejected");
        GradebookError::PermissionDenied(INVALID_CREDENTIALS.to_string())
    }

    pub fn logout(&self) -> Result<()> {
        self.clear_session()
    }

    pub fn update_monitor_permissions(&self, permissions: MonitorPermissions) -> Result<MonitorPermissions> {
        self.require(Capability::Admin)?;
        self.store().kv_set(KV_MONITOR_PERMISSIONS, &permissions)?;
        Ok(permissions)
    }
}
