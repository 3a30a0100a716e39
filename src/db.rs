use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "attendance.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_accounts(
            email TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            email TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            student_id TEXT NOT NULL,
            department TEXT NOT NULL,
            field_name TEXT NOT NULL,
            year TEXT NOT NULL,
            phone_number TEXT,
            profile_image_url TEXT NOT NULL DEFAULT '',
            active INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_field ON students(field_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(full_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            email TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            employee_id TEXT NOT NULL,
            department TEXT NOT NULL,
            phone_number TEXT,
            profile_image_url TEXT NOT NULL DEFAULT '',
            active INTEGER NOT NULL,
            notification_preferences TEXT NOT NULL,
            assigned_course_ids TEXT NOT NULL,
            assigned_field_ids TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_login_at TEXT,
            last_updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_name ON teachers(full_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            email TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            department TEXT NOT NULL,
            phone_number TEXT,
            profile_image_url TEXT NOT NULL DEFAULT '',
            active INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fields(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            weekly_schedule TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fields_name ON fields(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            field_name TEXT NOT NULL,
            target_years TEXT NOT NULL,
            teacher_email TEXT,
            teacher_name TEXT,
            schedule_entry TEXT,
            active INTEGER NOT NULL,
            statistics TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_field ON courses(field_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_teacher ON courses(teacher_email)",
        [],
    )?;

    // Workspaces created before profile images existed lack the column.
    ensure_profile_image_columns(&conn)?;

    Ok(conn)
}

fn ensure_profile_image_columns(conn: &Connection) -> anyhow::Result<()> {
    for table in ["students", "teachers", "admins"] {
        if !table_has_column(conn, table, "profile_image_url")? {
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN profile_image_url TEXT NOT NULL DEFAULT ''",
                    table
                ),
                [],
            )?;
        }
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
