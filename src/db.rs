use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "simbio.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            school_class TEXT NOT NULL,
            credential TEXT,
            sort_order INTEGER NOT NULL,
            data TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(school_class)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_email ON students(email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            credential TEXT,
            data TEXT NOT NULL
        )",
        [],
    )?;

    // One JSON document per (bucket, class, bimester): content, activity
    // templates, class settings and forum settings.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_buckets(
            bucket TEXT NOT NULL,
            school_class TEXT NOT NULL,
            bimester TEXT NOT NULL,
            data TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(bucket, school_class, bimester)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS forum_posts(
            id TEXT PRIMARY KEY,
            school_class TEXT NOT NULL,
            bimester TEXT NOT NULL,
            posted_at TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_forum_posts_scope ON forum_posts(school_class, bimester)",
        [],
    )?;

    // seq grows with insertion; the newest notification has the highest seq.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            ref_id TEXT,
            data TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_seq ON notifications(seq)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}
