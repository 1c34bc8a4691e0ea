use crate::db;
use crate::error::{GradebookError, Result};
use crate::model::{now_iso, Bimester, ForumPost, Notification, SchoolClass, Student, Teacher};
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Documents stored once per (class, bimester).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassBucket {
    Content,
    ActivityConfigs,
    ClassSettings,
    ForumSettings,
}

impl ClassBucket {
    fn key(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::ActivityConfigs => "activity_configs",
            Self::ClassSettings => "class_settings",
            Self::ForumSettings => "forum_settings",
        }
    }
}

pub const KV_MONITOR_PERMISSIONS: &str = "monitor_permissions";
pub const KV_SESSION: &str = "session";
pub const KV_LAST_PULL: &str = "sync.last_pull";

/// Everything a pull replaces, already reshaped into local entities.
#[derive(Debug, Default)]
pub struct StoreSnapshot {
    pub students: Vec<Student>,
    pub class_docs: Vec<(ClassBucket, SchoolClass, Bimester, serde_json::Value)>,
    pub forum_posts: Vec<ForumPost>,
    /// Newest first.
    pub notifications: Vec<Notification>,
}

/// Local record store: typed read/write access to every persisted collection.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(db::open_db(workspace)?))
    }

    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(db::open_in_memory()?))
    }

    // --- students -------------------------------------------------------

    pub fn students(&self) -> Result<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data, credential FROM students ORDER BY sort_order")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(data, credential)| decode_student(&data, credential))
            .collect()
    }

    pub fn students_in_class(&self, school_class: SchoolClass) -> Result<Vec<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT data, credential FROM students WHERE school_class = ? ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([school_class.code()], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(data, credential)| decode_student(&data, credential))
            .collect()
    }

    pub fn student(&self, id: &str) -> Result<Option<Student>> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT data, credential FROM students WHERE id = ?",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        row.map(|(data, credential)| decode_student(&data, credential))
            .transpose()
    }

    pub fn student_by_email(&self, email: &str) -> Result<Option<Student>> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT data, credential FROM students WHERE email = ? ORDER BY sort_order LIMIT 1",
                [email],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        row.map(|(data, credential)| decode_student(&data, credential))
            .transpose()
    }

    /// Insert or replace one student; new students go to the end of the roster.
    pub fn put_student(&self, student: &Student) -> Result<()> {
        upsert_student(&self.conn, student)
    }

    /// Writes several students in one transaction.
    pub fn put_students(&self, students: &[Student]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for s in students {
            upsert_student(&tx, s)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete_student(&self, id: &str) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM students WHERE id = ?", [id])?;
        Ok(n > 0)
    }

    // --- teachers -------------------------------------------------------

    pub fn teachers(&self) -> Result<Vec<Teacher>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data, credential FROM teachers ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(data, credential)| -> Result<Teacher> {
                let mut t: Teacher = serde_json::from_str(&data)?;
                t.credential = credential;
                Ok(t)
            })
            .collect()
    }

    pub fn put_teacher(&self, teacher: &Teacher) -> Result<()> {
        self.conn.execute(
            "INSERT INTO teachers(id, email, credential, data) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               email = excluded.email,
               credential = excluded.credential,
               data = excluded.data",
            (
                &teacher.id,
                &teacher.email,
                teacher.credential.as_deref(),
                serde_json::to_string(teacher)?,
            ),
        )?;
        Ok(())
    }

    // --- per class/bimester documents ----------------------------------

    pub fn class_doc<T: DeserializeOwned>(
        &self,
        bucket: ClassBucket,
        school_class: SchoolClass,
        bimester: Bimester,
    ) -> Result<Option<T>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM class_buckets WHERE bucket = ? AND school_class = ? AND bimester = ?",
                (bucket.key(), school_class.code(), bimester.label()),
                |r| r.get(0),
            )
            .optional()?;
        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    pub fn put_class_doc<T: Serialize>(
        &self,
        bucket: ClassBucket,
        school_class: SchoolClass,
        bimester: Bimester,
        doc: &T,
    ) -> Result<()> {
        put_class_doc_raw(
            &self.conn,
            bucket,
            school_class,
            bimester,
            &serde_json::to_string(doc)?,
        )
    }

    // --- forum ----------------------------------------------------------

    /// Posts of one class/bimester, newest first.
    pub fn forum_posts(&self, school_class: SchoolClass, bimester: Bimester) -> Result<Vec<ForumPost>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM forum_posts WHERE school_class = ? AND bimester = ?
             ORDER BY posted_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map((school_class.code(), bimester.label()), |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|d| serde_json::from_str(d).map_err(GradebookError::from))
            .collect()
    }

    pub fn put_forum_post(&self, post: &ForumPost) -> Result<()> {
        insert_forum_post(&self.conn, post)
    }

    pub fn delete_forum_post(&self, id: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM forum_posts WHERE trim(id) = ?", [id.trim()])?;
        Ok(n > 0)
    }

    // --- notifications --------------------------------------------------

    /// Newest first.
    pub fn notifications(&self) -> Result<Vec<Notification>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM notifications ORDER BY seq DESC")?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|d| serde_json::from_str(d).map_err(GradebookError::from))
            .collect()
    }

    /// Replaces the whole log; `list` is newest first.
    pub fn replace_notifications(&self, list: &[Notification]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        write_notifications(&tx, list)?;
        tx.commit()?;
        Ok(())
    }

    // --- key/value ------------------------------------------------------

    pub fn kv_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
            .optional()?;
        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    pub fn kv_set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv(key, value) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, serde_json::to_string(value)?),
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }

    // --- pull -----------------------------------------------------------

    /// Overwrites students, class documents, forum posts and notifications
    /// in one transaction. Teachers and key/value entries are kept.
    pub fn replace_snapshot(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM students", [])?;
        for s in &snapshot.students {
            upsert_student(&tx, s)?;
        }

        tx.execute("DELETE FROM class_buckets", [])?;
        for (bucket, class, bim, doc) in &snapshot.class_docs {
            put_class_doc_raw(&tx, *bucket, *class, *bim, &serde_json::to_string(doc)?)?;
        }

        tx.execute("DELETE FROM forum_posts", [])?;
        for p in &snapshot.forum_posts {
            insert_forum_post(&tx, p)?;
        }

        write_notifications(&tx, &snapshot.notifications)?;

        tx.commit()?;
        Ok(())
    }
}

fn decode_student(data: &str, credential: Option<String>) -> Result<Student> {
    let mut s: Student = serde_json::from_str(data)?;
    s.credential = credential;
    Ok(s)
}

fn upsert_student(conn: &Connection, student: &Student) -> Result<()> {
    conn.execute(
        "INSERT INTO students(id, email, school_class, credential, sort_order, data, updated_at)
         VALUES(?, ?, ?, ?, (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students), ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           email = excluded.email,
           school_class = excluded.school_class,
           credential = excluded.credential,
           data = excluded.data,
           updated_at = excluded.updated_at",
        (
            &student.id,
            &student.email,
            student.school_class.code(),
            student.credential.as_deref(),
            serde_json::to_string(student)?,
            now_iso(),
        ),
    )?;
    Ok(())
}

fn put_class_doc_raw(
    conn: &Connection,
    bucket: ClassBucket,
    school_class: SchoolClass,
    bimester: Bimester,
    data: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO class_buckets(bucket, school_class, bimester, data, updated_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(bucket, school_class, bimester) DO UPDATE SET
           data = excluded.data,
           updated_at = excluded.updated_at",
        (
            bucket.key(),
            school_class.code(),
            bimester.label(),
            data,
            now_iso(),
        ),
    )?;
    Ok(())
}

fn insert_forum_post(conn: &Connection, post: &ForumPost) -> Result<()> {
    conn.execute(
        "INSERT INTO forum_posts(id, school_class, bimester, posted_at, data)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           school_class = excluded.school_class,
           bimester = excluded.bimester,
           posted_at = excluded.posted_at,
           data = excluded.data",
        (
            &post.id,
            post.school_class.code(),
            post.bimester.label(),
            &post.timestamp,
            serde_json::to_string(post)?,
        ),
    )?;
    Ok(())
}

fn write_notifications(conn: &Connection, list: &[Notification]) -> Result<()> {
    conn.execute("DELETE FROM notifications", [])?;
    let total = list.len() as i64;
    for (i, n) in list.iter().enumerate() {
        conn.execute(
            "INSERT INTO notifications(id, seq, ref_id, data) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            (
                &n.id,
                total - i as i64,
                n.ref_id.as_deref(),
                serde_json::to_string(n)?,
            ),
        )?;
    }
    Ok(())
}
