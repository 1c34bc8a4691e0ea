use crate::config::RemoteConfig;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Account to create in the remote identity subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct NewIdentity {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: &'static str,
}

/// Changed identity fields; `None` means unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl IdentityChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// Profile of an account the identity subsystem accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteAccount {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `teacher` or `student`.
    #[serde(default)]
    pub role: String,
}

/// Opaque relational backend: select/upsert/delete by table, plus identity admin.
pub trait RemoteStore {
    fn select(&self, table: &str, columns: &str) -> Result<Vec<Value>, RemoteError>;
    fn upsert(&self, table: &str, rows: Vec<Value>) -> Result<(), RemoteError>;
    /// Deletes every row whose `column` equals `value`.
    fn delete(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError>;
    fn create_identity(&self, identity: &NewIdentity) -> Result<(), RemoteError>;
    fn update_identity(&self, id: &str, changes: &IdentityChanges) -> Result<(), RemoteError>;
    /// Checks a password with the identity subsystem. `Ok(None)` means rejected.
    fn sign_in(&self, email: &str, password: &str) -> Result<Option<RemoteAccount>, RemoteError>;
    fn teacher_exists(&self) -> Result<bool, RemoteError>;
}

/// PostgREST/GoTrue style HTTP backend.
pub struct RestRemote {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl RestRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config
                .service_key
                .clone()
                .unwrap_or_else(|| config.anon_key.clone()),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn with_key(&self, rb: RequestBuilder, key: &str) -> RequestBuilder {
        rb.header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
    }

    fn profiles(&self, filter: (&str, &str)) -> Result<Vec<RemoteAccount>, RemoteError> {
        let rb = self
            .client
            .get(self.table_url("profiles"))
            .query(&[("select", "id,name,role"), filter]);
        let resp = Self::check(self.with_key(rb, &self.anon_key).send()?)?;
        Ok(resp.json::<Vec<RemoteAccount>>()?)
    }

    fn check(resp: Response) -> Result<Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl RemoteStore for RestRemote {
    fn select(&self, table: &str, columns: &str) -> Result<Vec<Value>, RemoteError> {
        let rb = self
            .client
            .get(self.table_url(table))
            .query(&[("select", columns)]);
        let resp = Self::check(self.with_key(rb, &self.anon_key).send()?)?;
        match resp.json::<Value>()? {
            Value::Array(rows) => Ok(rows),
            other => Err(RemoteError::Unexpected(format!(
                "expected array from {}, got {}",
                table, other
            ))),
        }
    }

    fn upsert(&self, table: &str, rows: Vec<Value>) -> Result<(), RemoteError> {
        if rows.is_empty() {
            return Ok(());
        }
        let rb = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows);
        Self::check(self.with_key(rb, &self.anon_key).send()?)?;
        Ok(())
    }

    fn delete(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError> {
        let filter = format!("eq.{}", value);
        let rb = self
            .client
            .delete(self.table_url(table))
            .query(&[(column, filter.as_str())]);
        Self::check(self.with_key(rb, &self.anon_key).send()?)?;
        Ok(())
    }

    fn create_identity(&self, identity: &NewIdentity) -> Result<(), RemoteError> {
        let rb = self
            .client
            .post(format!("{}/auth/v1/admin/users", self.base_url))
            .json(&json!({
                "id": identity.id,
                "email": identity.email,
                "password": identity.password,
                "email_confirm": true,
                "user_metadata": { "name": identity.name, "role": identity.role },
            }));
        Self::check(self.with_key(rb, &self.service_key).send()?)?;
        self.upsert(
            "profiles",
            vec![json!({
                "id": identity.id,
                "name": identity.name,
                "email": identity.email,
                "role": identity.role,
            })],
        )
    }

    fn update_identity(&self, id: &str, changes: &IdentityChanges) -> Result<(), RemoteError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut auth = serde_json::Map::new();
        if let Some(p) = &changes.password {
            auth.insert("password".into(), json!(p));
        }
        if let Some(e) = &changes.email {
            auth.insert("email".into(), json!(e));
        }
        if let Some(n) = &changes.name {
            auth.insert("user_metadata".into(), json!({ "name": n }));
        }
        let rb = self
            .client
            .put(format!("{}/auth/v1/admin/users/{}", self.base_url, id))
            .json(&Value::Object(auth));
        Self::check(self.with_key(rb, &self.service_key).send()?)?;

        if changes.name.is_none() && changes.email.is_none() {
            return Ok(());
        }
        let mut profile = serde_json::Map::new();
        if let Some(n) = &changes.name {
            profile.insert("name".into(), json!(n));
        }
        if let Some(e) = &changes.email {
            profile.insert("email".into(), json!(e));
        }
        let filter = format!("eq.{}", id);
        let rb = self
            .client
            .patch(self.table_url("profiles"))
            .query(&[("id", filter.as_str())])
            .json(&Value::Object(profile));
        Self::check(self.with_key(rb, &self.anon_key).send()?)?;
        Ok(())
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Option<RemoteAccount>, RemoteError> {
        let rb = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let resp = self.with_key(rb, &self.anon_key).send()?;
        if matches!(resp.status().as_u16(), 400 | 401) {
            return Ok(None);
        }
        let body = Self::check(resp)?.json::<Value>()?;
        let Some(id) = body.pointer("/user/id").and_then(Value::as_str) else {
            return Err(RemoteError::Unexpected("sign-in response without user id".into()));
        };
        let filter = format!("eq.{}", id);
        match self.profiles(("id", filter.as_str()))?.into_iter().next() {
            Some(account) => Ok(Some(account)),
            None => Err(RemoteError::Unexpected(format!("no profile for {}", id))),
        }
    }

    fn teacher_exists(&self) -> Result<bool, RemoteError> {
        Ok(!self.profiles(("role", "eq.teacher"))?.is_empty())
    }
}
