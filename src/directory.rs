use chrono::{SecondsFormat, Utc};
use log::warn;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::models::{
    Admin, Course, Field, NotificationPreferences, ScheduleEntry, Student, Teacher, UserRecord,
    YearLabel,
};

/// A store-level failure, carried up to the IPC layer as {code, message}.
#[derive(Debug)]
pub struct StoreError {
    pub code: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn not_found(message: impl Into<String>) -> StoreError {
        StoreError {
            code: "not_found",
            message: message.into(),
        }
    }

    fn query(e: rusqlite::Error) -> StoreError {
        StoreError {
            code: "db_query_failed",
            message: e.to_string(),
        }
    }

    fn insert(e: rusqlite::Error) -> StoreError {
        StoreError {
            code: "db_insert_failed",
            message: e.to_string(),
        }
    }

    fn update(e: rusqlite::Error) -> StoreError {
        StoreError {
            code: "db_update_failed",
            message: e.to_string(),
        }
    }

    fn delete(e: rusqlite::Error) -> StoreError {
        StoreError {
            code: "db_delete_failed",
            message: e.to_string(),
        }
    }

    fn tx(e: rusqlite::Error) -> StoreError {
        StoreError {
            code: "db_tx_failed",
            message: e.to_string(),
        }
    }

    fn commit(e: rusqlite::Error) -> StoreError {
        StoreError {
            code: "db_commit_failed",
            message: e.to_string(),
        }
    }

    fn corrupt(what: &str, e: serde_json::Error) -> StoreError {
        StoreError {
            code: "corrupt_record",
            message: format!("failed to decode {}: {}", what, e),
        }
    }
}

/// Which collection a user record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKind {
    Student,
    Teacher,
    Admin,
}

impl UserKind {
    pub fn parse(s: &str) -> Option<UserKind> {
        match s {
            "student" => Some(UserKind::Student),
            "teacher" => Some(UserKind::Teacher),
            "admin" => Some(UserKind::Admin),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UserKind::Student => "student",
            UserKind::Teacher => "teacher",
            UserKind::Admin => "admin",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            UserKind::Student => "students",
            UserKind::Teacher => "teachers",
            UserKind::Admin => "admins",
        }
    }
}

/// A list load that tolerated corrupt rows.
pub struct ListOutcome<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn encode<T: Serialize>(what: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError {
        code: "db_update_failed",
        message: format!("failed to encode {}: {}", what, e),
    })
}

// =================== STUDENTS ===================

fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        email: row.get(0)?,
        full_name: row.get(1)?,
        student_id: row.get(2)?,
        department: row.get(3)?,
        field: row.get(4)?,
        year: row.get(5)?,
        phone_number: row.get(6)?,
        profile_image_url: row.get(7)?,
        is_active: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
        last_updated_at: row.get(10)?,
    })
}

const STUDENT_COLUMNS: &str = "email, full_name, student_id, department, field_name, year, \
     phone_number, profile_image_url, active, created_at, last_updated_at";

pub fn get_student(conn: &Connection, email: &str) -> Result<Option<Student>, StoreError> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE email = ?", STUDENT_COLUMNS),
        [email],
        student_from_row,
    )
    .optional()
    .map_err(StoreError::query)
}

pub fn list_students(conn: &Connection) -> Result<Vec<Student>, StoreError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM students ORDER BY full_name",
            STUDENT_COLUMNS
        ))
        .map_err(StoreError::query)?;
    stmt.query_map([], student_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

pub fn save_student(conn: &Connection, student: &Student) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO students(email, full_name, student_id, department, field_name, year,
            phone_number, profile_image_url, active, created_at, last_updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET
           full_name = excluded.full_name,
           student_id = excluded.student_id,
           department = excluded.department,
           field_name = excluded.field_name,
           year = excluded.year,
           phone_number = excluded.phone_number,
           active = excluded.active,
           last_updated_at = excluded.last_updated_at",
        (
            &student.email,
            &student.full_name,
            &student.student_id,
            &student.department,
            &student.field,
            &student.year,
            &student.phone_number,
            &student.profile_image_url,
            student.is_active as i64,
            &student.created_at,
            &student.last_updated_at,
        ),
    )
    .map_err(StoreError::insert)?;
    Ok(())
}

// =================== TEACHERS ===================

struct TeacherRow {
    email: String,
    full_name: String,
    employee_id: String,
    department: String,
    phone_number: Option<String>,
    profile_image_url: String,
    active: bool,
    notification_preferences: String,
    assigned_course_ids: String,
    assigned_field_ids: String,
    created_at: String,
    last_login_at: Option<String>,
    last_updated_at: String,
}

const TEACHER_COLUMNS: &str = "email, full_name, employee_id, department, phone_number, \
     profile_image_url, active, notification_preferences, assigned_course_ids, \
     assigned_field_ids, created_at, last_login_at, last_updated_at";

fn teacher_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TeacherRow> {
    Ok(TeacherRow {
        email: row.get(0)?,
        full_name: row.get(1)?,
        employee_id: row.get(2)?,
        department: row.get(3)?,
        phone_number: row.get(4)?,
        profile_image_url: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
        notification_preferences: row.get(7)?,
        assigned_course_ids: row.get(8)?,
        assigned_field_ids: row.get(9)?,
        created_at: row.get(10)?,
        last_login_at: row.get(11)?,
        last_updated_at: row.get(12)?,
    })
}

fn teacher_from_row(row: TeacherRow) -> Result<Teacher, StoreError> {
    let notification_preferences: NotificationPreferences =
        serde_json::from_str(&row.notification_preferences)
            .map_err(|e| StoreError::corrupt("teacher notification preferences", e))?;
    let assigned_course_ids: Vec<String> = serde_json::from_str(&row.assigned_course_ids)
        .map_err(|e| StoreError::corrupt("teacher assigned course ids", e))?;
    let assigned_field_ids: Vec<String> = serde_json::from_str(&row.assigned_field_ids)
        .map_err(|e| StoreError::corrupt("teacher assigned field ids", e))?;
    Ok(Teacher {
        email: row.email,
        full_name: row.full_name,
        employee_id: row.employee_id,
        department: row.department,
        phone_number: row.phone_number,
        profile_image_url: row.profile_image_url,
        is_active: row.active,
        notification_preferences,
        assigned_course_ids,
        assigned_field_ids,
        created_at: row.created_at,
        last_login_at: row.last_login_at,
        last_updated_at: row.last_updated_at,
    })
}

pub fn get_teacher(conn: &Connection, email: &str) -> Result<Option<Teacher>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM teachers WHERE email = ?", TEACHER_COLUMNS),
            [email],
            teacher_row,
        )
        .optional()
        .map_err(StoreError::query)?;
    match row {
        Some(row) => teacher_from_row(row).map(Some),
        None => Ok(None),
    }
}

pub fn list_teachers(conn: &Connection) -> Result<ListOutcome<Teacher>, StoreError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM teachers ORDER BY full_name",
            TEACHER_COLUMNS
        ))
        .map_err(StoreError::query)?;
    let rows = stmt
        .query_map([], teacher_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        let email = row.email.clone();
        match teacher_from_row(row) {
            Ok(teacher) => records.push(teacher),
            Err(e) => {
                warn!("skipping corrupt teacher record {}: {}", email, e.message);
                skipped += 1;
            }
        }
    }
    Ok(ListOutcome { records, skipped })
}

pub fn save_teacher(conn: &Connection, teacher: &Teacher) -> Result<(), StoreError> {
    let prefs = encode("notification preferences", &teacher.notification_preferences)?;
    let course_ids = encode("assigned course ids", &teacher.assigned_course_ids)?;
    let field_ids = encode("assigned field ids", &teacher.assigned_field_ids)?;
    conn.execute(
        "INSERT INTO teachers(email, full_name, employee_id, department, phone_number,
            profile_image_url, active, notification_preferences, assigned_course_ids,
            assigned_field_ids, created_at, last_login_at, last_updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET
           full_name = excluded.full_name,
           employee_id = excluded.employee_id,
           department = excluded.department,
           phone_number = excluded.phone_number,
           active = excluded.active,
           notification_preferences = excluded.notification_preferences,
           last_updated_at = excluded.last_updated_at",
        (
            &teacher.email,
            &teacher.full_name,
            &teacher.employee_id,
            &teacher.department,
            &teacher.phone_number,
            &teacher.profile_image_url,
            teacher.is_active as i64,
            &prefs,
            &course_ids,
            &field_ids,
            &teacher.created_at,
            &teacher.last_login_at,
            &teacher.last_updated_at,
        ),
    )
    .map_err(StoreError::insert)?;
    Ok(())
}

pub fn touch_teacher_last_login(conn: &Connection, email: &str) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE teachers SET last_login_at = ? WHERE email = ?",
        (now_utc(), email),
    )
    .map_err(StoreError::update)?;
    Ok(())
}

// =================== ADMINS ===================

fn admin_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Admin> {
    Ok(Admin {
        email: row.get(0)?,
        full_name: row.get(1)?,
        department: row.get(2)?,
        phone_number: row.get(3)?,
        profile_image_url: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        last_updated_at: row.get(7)?,
    })
}

const ADMIN_COLUMNS: &str =
    "email, full_name, department, phone_number, profile_image_url, active, created_at, \
     last_updated_at";

pub fn get_admin(conn: &Connection, email: &str) -> Result<Option<Admin>, StoreError> {
    conn.query_row(
        &format!("SELECT {} FROM admins WHERE email = ?", ADMIN_COLUMNS),
        [email],
        admin_from_row,
    )
    .optional()
    .map_err(StoreError::query)
}

pub fn save_admin(conn: &Connection, admin: &Admin) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO admins(email, full_name, department, phone_number, profile_image_url,
            active, created_at, last_updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(email) DO UPDATE SET
           full_name = excluded.full_name,
           department = excluded.department,
           phone_number = excluded.phone_number,
           active = excluded.active,
           last_updated_at = excluded.last_updated_at",
        (
            &admin.email,
            &admin.full_name,
            &admin.department,
            &admin.phone_number,
            &admin.profile_image_url,
            admin.is_active as i64,
            &admin.created_at,
            &admin.last_updated_at,
        ),
    )
    .map_err(StoreError::insert)?;
    Ok(())
}

// =================== USER-TYPE RESOLUTION ===================

/// Probe students, then teachers, then admins by primary key. The first hit
/// wins and later collections are never touched. A failed probe counts as a
/// miss so a transient error on an early collection does not mask a user
/// stored in a later one.
pub fn resolve_user(conn: &Connection, email: &str) -> Result<UserRecord, StoreError> {
    match get_student(conn, email) {
        Ok(Some(student)) => return Ok(UserRecord::Student(student)),
        Ok(None) => {}
        Err(e) => warn!("student probe failed for {}: {}", email, e.message),
    }
    match get_teacher(conn, email) {
        Ok(Some(teacher)) => return Ok(UserRecord::Teacher(teacher)),
        Ok(None) => {}
        Err(e) => warn!("teacher probe failed for {}: {}", email, e.message),
    }
    match get_admin(conn, email) {
        Ok(Some(admin)) => return Ok(UserRecord::Admin(admin)),
        Ok(None) => {}
        Err(e) => warn!("admin probe failed for {}: {}", email, e.message),
    }
    Err(StoreError::not_found("user not found in any collection"))
}

pub fn delete_user(conn: &Connection, kind: UserKind, email: &str) -> Result<bool, StoreError> {
    let changed = conn
        .execute(
            &format!("DELETE FROM {} WHERE email = ?", kind.table()),
            [email],
        )
        .map_err(StoreError::delete)?;
    Ok(changed > 0)
}

pub fn set_user_active(
    conn: &Connection,
    kind: UserKind,
    email: &str,
    active: bool,
) -> Result<bool, StoreError> {
    let changed = conn
        .execute(
            &format!(
                "UPDATE {} SET active = ?, last_updated_at = ? WHERE email = ?",
                kind.table()
            ),
            (active as i64, now_utc(), email),
        )
        .map_err(StoreError::update)?;
    Ok(changed > 0)
}

pub fn get_profile_image_url(
    conn: &Connection,
    kind: UserKind,
    email: &str,
) -> Result<Option<String>, StoreError> {
    conn.query_row(
        &format!(
            "SELECT profile_image_url FROM {} WHERE email = ?",
            kind.table()
        ),
        [email],
        |r| r.get(0),
    )
    .optional()
    .map_err(StoreError::query)
}

pub fn set_profile_image_url(
    conn: &Connection,
    kind: UserKind,
    email: &str,
    url: &str,
) -> Result<bool, StoreError> {
    let changed = conn
        .execute(
            &format!(
                "UPDATE {} SET profile_image_url = ?, last_updated_at = ? WHERE email = ?",
                kind.table()
            ),
            (url, now_utc(), email),
        )
        .map_err(StoreError::update)?;
    Ok(changed > 0)
}

// =================== FIELDS ===================

struct FieldRow {
    id: String,
    name: String,
    department: String,
    description: String,
    weekly_schedule: String,
    created_at: String,
    last_updated_at: String,
}

const FIELD_COLUMNS: &str =
    "id, name, department, description, weekly_schedule, created_at, last_updated_at";

fn field_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FieldRow> {
    Ok(FieldRow {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        description: row.get(3)?,
        weekly_schedule: row.get(4)?,
        created_at: row.get(5)?,
        last_updated_at: row.get(6)?,
    })
}

fn field_from_row(row: FieldRow) -> Result<Field, StoreError> {
    let weekly_schedule: Vec<ScheduleEntry> = serde_json::from_str(&row.weekly_schedule)
        .map_err(|e| StoreError::corrupt("field weekly schedule", e))?;
    Ok(Field {
        field_id: row.id,
        field_name: row.name,
        department: row.department,
        description: row.description,
        weekly_schedule,
        created_at: row.created_at,
        last_updated_at: row.last_updated_at,
    })
}

pub fn get_field(conn: &Connection, field_id: &str) -> Result<Option<Field>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM fields WHERE id = ?", FIELD_COLUMNS),
            [field_id],
            field_row,
        )
        .optional()
        .map_err(StoreError::query)?;
    match row {
        Some(row) => field_from_row(row).map(Some),
        None => Ok(None),
    }
}

/// Courses reference their owning field by display name, so the schedule
/// catalog lookup is name-based as well.
pub fn get_field_by_name(conn: &Connection, name: &str) -> Result<Option<Field>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM fields WHERE name = ?", FIELD_COLUMNS),
            [name],
            field_row,
        )
        .optional()
        .map_err(StoreError::query)?;
    match row {
        Some(row) => field_from_row(row).map(Some),
        None => Ok(None),
    }
}

pub fn list_fields(conn: &Connection) -> Result<ListOutcome<Field>, StoreError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {} FROM fields ORDER BY name", FIELD_COLUMNS))
        .map_err(StoreError::query)?;
    let rows = stmt
        .query_map([], field_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        let id = row.id.clone();
        match field_from_row(row) {
            Ok(field) => records.push(field),
            Err(e) => {
                warn!("skipping corrupt field record {}: {}", id, e.message);
                skipped += 1;
            }
        }
    }
    Ok(ListOutcome { records, skipped })
}

pub fn insert_field(conn: &Connection, field: &Field) -> Result<(), StoreError> {
    let schedule = encode("weekly schedule", &field.weekly_schedule)?;
    conn.execute(
        "INSERT INTO fields(id, name, department, description, weekly_schedule,
            created_at, last_updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &field.field_id,
            &field.field_name,
            &field.department,
            &field.description,
            &schedule,
            &field.created_at,
            &field.last_updated_at,
        ),
    )
    .map_err(StoreError::insert)?;
    Ok(())
}

/// Replaces the whole document, schedule list included. No diffing against
/// the previous schedule; the id never changes.
pub fn update_field(conn: &Connection, field: &Field) -> Result<bool, StoreError> {
    let schedule = encode("weekly schedule", &field.weekly_schedule)?;
    let changed = conn
        .execute(
            "UPDATE fields SET name = ?, department = ?, description = ?,
                weekly_schedule = ?, last_updated_at = ?
             WHERE id = ?",
            (
                &field.field_name,
                &field.department,
                &field.description,
                &schedule,
                &field.last_updated_at,
                &field.field_id,
            ),
        )
        .map_err(StoreError::update)?;
    Ok(changed > 0)
}

pub fn delete_field(conn: &Connection, field_id: &str) -> Result<bool, StoreError> {
    // Courses that reference this field by name are left untouched.
    let changed = conn
        .execute("DELETE FROM fields WHERE id = ?", [field_id])
        .map_err(StoreError::delete)?;
    Ok(changed > 0)
}

// =================== COURSES ===================

struct CourseRow {
    id: String,
    name: String,
    department: String,
    field_name: String,
    target_years: String,
    teacher_email: Option<String>,
    teacher_name: Option<String>,
    schedule_entry: Option<String>,
    active: bool,
    statistics: String,
    created_at: String,
}

const COURSE_COLUMNS: &str = "id, name, department, field_name, target_years, teacher_email, \
     teacher_name, schedule_entry, active, statistics, created_at";

fn course_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok(CourseRow {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        field_name: row.get(3)?,
        target_years: row.get(4)?,
        teacher_email: row.get(5)?,
        teacher_name: row.get(6)?,
        schedule_entry: row.get(7)?,
        active: row.get::<_, i64>(8)? != 0,
        statistics: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn course_from_row(row: CourseRow) -> Result<Course, StoreError> {
    let target_years: Vec<YearLabel> = serde_json::from_str(&row.target_years)
        .map_err(|e| StoreError::corrupt("course target years", e))?;
    let course_schedule_entry: Option<ScheduleEntry> = match row.schedule_entry {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| StoreError::corrupt("course schedule entry", e))?,
        ),
        None => None,
    };
    let statistics: serde_json::Value = serde_json::from_str(&row.statistics)
        .map_err(|e| StoreError::corrupt("course statistics", e))?;
    Ok(Course {
        course_id: row.id,
        course_name: row.name,
        department: row.department,
        field: row.field_name,
        target_years,
        teacher_email: row.teacher_email,
        teacher_name: row.teacher_name,
        course_schedule_entry,
        is_active: row.active,
        created_at: row.created_at,
        statistics,
    })
}

pub fn get_course(conn: &Connection, course_id: &str) -> Result<Option<Course>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS),
            [course_id],
            course_row,
        )
        .optional()
        .map_err(StoreError::query)?;
    match row {
        Some(row) => course_from_row(row).map(Some),
        None => Ok(None),
    }
}

pub fn list_courses(conn: &Connection) -> Result<ListOutcome<Course>, StoreError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM courses ORDER BY name",
            COURSE_COLUMNS
        ))
        .map_err(StoreError::query)?;
    let rows = stmt
        .query_map([], course_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)?;

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        let id = row.id.clone();
        match course_from_row(row) {
            Ok(course) => records.push(course),
            Err(e) => {
                warn!("skipping corrupt course record {}: {}", id, e.message);
                skipped += 1;
            }
        }
    }
    Ok(ListOutcome { records, skipped })
}

pub fn insert_course(conn: &Connection, course: &Course) -> Result<(), StoreError> {
    let years = encode("target years", &course.target_years)?;
    let entry = match &course.course_schedule_entry {
        Some(entry) => Some(encode("schedule entry", entry)?),
        None => None,
    };
    let statistics = encode("statistics", &course.statistics)?;
    conn.execute(
        "INSERT INTO courses(id, name, department, field_name, target_years, teacher_email,
            teacher_name, schedule_entry, active, statistics, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &course.course_id,
            &course.course_name,
            &course.department,
            &course.field,
            &years,
            &course.teacher_email,
            &course.teacher_name,
            &entry,
            course.is_active as i64,
            &statistics,
            &course.created_at,
        ),
    )
    .map_err(StoreError::insert)?;
    Ok(())
}

/// Editor update: everything the course editor owns. Assignment fields and
/// statistics are deliberately untouched.
pub fn update_course(conn: &Connection, course: &Course) -> Result<bool, StoreError> {
    let years = encode("target years", &course.target_years)?;
    let entry = match &course.course_schedule_entry {
        Some(entry) => Some(encode("schedule entry", entry)?),
        None => None,
    };
    let changed = conn
        .execute(
            "UPDATE courses SET name = ?, department = ?, field_name = ?, target_years = ?,
                schedule_entry = ?, active = ?
             WHERE id = ?",
            (
                &course.course_name,
                &course.department,
                &course.field,
                &years,
                &entry,
                course.is_active as i64,
                &course.course_id,
            ),
        )
        .map_err(StoreError::update)?;
    Ok(changed > 0)
}

pub fn update_course_statistics(
    conn: &Connection,
    course_id: &str,
    statistics: &serde_json::Value,
) -> Result<bool, StoreError> {
    let encoded = encode("statistics", statistics)?;
    let changed = conn
        .execute(
            "UPDATE courses SET statistics = ? WHERE id = ?",
            (&encoded, course_id),
        )
        .map_err(StoreError::update)?;
    Ok(changed > 0)
}

pub fn delete_course(conn: &Connection, course_id: &str) -> Result<bool, StoreError> {
    // No cascade into attendance or session data owned by other services.
    let changed = conn
        .execute("DELETE FROM courses WHERE id = ?", [course_id])
        .map_err(StoreError::delete)?;
    Ok(changed > 0)
}

// =================== ASSIGNMENT COORDINATION ===================

fn read_assigned_ids(
    tx: &rusqlite::Transaction<'_>,
    column: &str,
    teacher_email: &str,
) -> Result<Option<Vec<String>>, StoreError> {
    let raw: Option<String> = tx
        .query_row(
            &format!("SELECT {} FROM teachers WHERE email = ?", column),
            [teacher_email],
            |r| r.get(0),
        )
        .optional()
        .map_err(StoreError::query)?;
    match raw {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::corrupt("teacher assigned ids", e)),
        None => Ok(None),
    }
}

/// Atomically links a course to a teacher: the course id joins the teacher's
/// assigned set (idempotent), and the course takes the supplied teacher
/// email/name and department. Either both documents change or neither does.
///
/// A course that already carries another teacher is overwritten without
/// cleaning that teacher's assigned list; this mirrors the upstream system.
pub fn assign_course_to_teacher(
    conn: &Connection,
    teacher_email: &str,
    course_id: &str,
    teacher_name: &str,
    department: &str,
) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;

    let Some(mut assigned) = read_assigned_ids(&tx, "assigned_course_ids", teacher_email)? else {
        return Err(StoreError::not_found("teacher not found"));
    };
    let course_exists = tx
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(StoreError::query)?
        .is_some();
    if !course_exists {
        return Err(StoreError::not_found("course not found"));
    }

    if !assigned.iter().any(|id| id == course_id) {
        assigned.push(course_id.to_string());
    }
    let encoded = encode("assigned course ids", &assigned)?;
    tx.execute(
        "UPDATE teachers SET assigned_course_ids = ?, last_updated_at = ? WHERE email = ?",
        (&encoded, now_utc(), teacher_email),
    )
    .map_err(StoreError::update)?;
    tx.execute(
        "UPDATE courses SET teacher_email = ?, teacher_name = ?, department = ? WHERE id = ?",
        (teacher_email, teacher_name, department, course_id),
    )
    .map_err(StoreError::update)?;

    tx.commit().map_err(StoreError::commit)
}

/// Atomically severs the course↔teacher link. Fails with
/// `no_teacher_assigned` before any write when the course has no teacher.
pub fn unassign_course_from_teacher(
    conn: &Connection,
    teacher_email: &str,
    course_id: &str,
) -> Result<(), StoreError> {
    let current: Option<Option<String>> = conn
        .query_row(
            "SELECT teacher_email FROM courses WHERE id = ?",
            [course_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(StoreError::query)?;
    let Some(current) = current else {
        return Err(StoreError::not_found("course not found"));
    };
    if current.is_none() {
        return Err(StoreError {
            code: "no_teacher_assigned",
            message: "nothing to unassign: course has no teacher".to_string(),
        });
    }

    let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;
    let Some(mut assigned) = read_assigned_ids(&tx, "assigned_course_ids", teacher_email)? else {
        return Err(StoreError::not_found("teacher not found"));
    };
    assigned.retain(|id| id != course_id);
    let encoded = encode("assigned course ids", &assigned)?;
    tx.execute(
        "UPDATE teachers SET assigned_course_ids = ?, last_updated_at = ? WHERE email = ?",
        (&encoded, now_utc(), teacher_email),
    )
    .map_err(StoreError::update)?;
    tx.execute(
        "UPDATE courses SET teacher_email = NULL, teacher_name = NULL WHERE id = ?",
        [course_id],
    )
    .map_err(StoreError::update)?;

    tx.commit().map_err(StoreError::commit)
}

/// Field membership is a single-document edit on the teacher side only.
pub fn assign_field_to_teacher(
    conn: &Connection,
    teacher_email: &str,
    field_id: &str,
) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;
    let Some(mut assigned) = read_assigned_ids(&tx, "assigned_field_ids", teacher_email)? else {
        return Err(StoreError::not_found("teacher not found"));
    };
    if !assigned.iter().any(|id| id == field_id) {
        assigned.push(field_id.to_string());
    }
    let encoded = encode("assigned field ids", &assigned)?;
    tx.execute(
        "UPDATE teachers SET assigned_field_ids = ?, last_updated_at = ? WHERE email = ?",
        (&encoded, now_utc(), teacher_email),
    )
    .map_err(StoreError::update)?;
    tx.commit().map_err(StoreError::commit)
}

pub fn unassign_field_from_teacher(
    conn: &Connection,
    teacher_email: &str,
    field_id: &str,
) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;
    let Some(mut assigned) = read_assigned_ids(&tx, "assigned_field_ids", teacher_email)? else {
        return Err(StoreError::not_found("teacher not found"));
    };
    assigned.retain(|id| id != field_id);
    let encoded = encode("assigned field ids", &assigned)?;
    tx.execute(
        "UPDATE teachers SET assigned_field_ids = ?, last_updated_at = ? WHERE email = ?",
        (&encoded, now_utc(), teacher_email),
    )
    .map_err(StoreError::update)?;
    tx.commit().map_err(StoreError::commit)
}
