use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Day labels as they appear in stored schedule entries and in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    #[serde(rename = "Lundi")]
    Monday,
    #[serde(rename = "Mardi")]
    Tuesday,
    #[serde(rename = "Mercredi")]
    Wednesday,
    #[serde(rename = "Jeudi")]
    Thursday,
    #[serde(rename = "Vendredi")]
    Friday,
    #[serde(rename = "Samedi")]
    Saturday,
    #[serde(rename = "Dimanche")]
    Sunday,
}

impl DayOfWeek {
    pub fn parse(s: &str) -> Option<DayOfWeek> {
        match s {
            "Lundi" => Some(DayOfWeek::Monday),
            "Mardi" => Some(DayOfWeek::Tuesday),
            "Mercredi" => Some(DayOfWeek::Wednesday),
            "Jeudi" => Some(DayOfWeek::Thursday),
            "Vendredi" => Some(DayOfWeek::Friday),
            "Samedi" => Some(DayOfWeek::Saturday),
            "Dimanche" => Some(DayOfWeek::Sunday),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Lundi",
            DayOfWeek::Tuesday => "Mardi",
            DayOfWeek::Wednesday => "Mercredi",
            DayOfWeek::Thursday => "Jeudi",
            DayOfWeek::Friday => "Vendredi",
            DayOfWeek::Saturday => "Samedi",
            DayOfWeek::Sunday => "Dimanche",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five target-year labels a course can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YearLabel {
    #[serde(rename = "1ère Année")]
    First,
    #[serde(rename = "2ème Année")]
    Second,
    #[serde(rename = "3ème Année")]
    Third,
    #[serde(rename = "4ème Année")]
    Fourth,
    #[serde(rename = "5ème Année")]
    Fifth,
}

impl YearLabel {
    pub fn parse(s: &str) -> Option<YearLabel> {
        match s {
            "1ère Année" => Some(YearLabel::First),
            "2ème Année" => Some(YearLabel::Second),
            "3ème Année" => Some(YearLabel::Third),
            "4ème Année" => Some(YearLabel::Fourth),
            "5ème Année" => Some(YearLabel::Fifth),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            YearLabel::First => "1ère Année",
            YearLabel::Second => "2ème Année",
            YearLabel::Third => "3ème Année",
            YearLabel::Fourth => "4ème Année",
            YearLabel::Fifth => "5ème Année",
        }
    }
}

fn default_recurring() -> bool {
    true
}

/// A weekly day/time/room slot. Identity is {day, start, end, room};
/// `isRecurring` is metadata and excluded from equality so a course's stored
/// entry can be re-located inside a field's schedule by content.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default = "default_recurring")]
    pub is_recurring: bool,
}

impl ScheduleEntry {
    pub fn display_string(&self) -> String {
        format!(
            "{} {} - {} ({})",
            self.day_of_week,
            self.start_time,
            self.end_time,
            self.room.as_deref().unwrap_or("N/A")
        )
    }
}

impl PartialEq for ScheduleEntry {
    fn eq(&self, other: &ScheduleEntry) -> bool {
        self.day_of_week == other.day_of_week
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.room == other.room
    }
}

impl Hash for ScheduleEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.day_of_week.hash(state);
        self.start_time.hash(state);
        self.end_time.hash(state);
        self.room.hash(state);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email_enabled: bool,
    pub push_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> NotificationPreferences {
        NotificationPreferences {
            email_enabled: true,
            push_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub email: String,
    pub full_name: String,
    pub student_id: String,
    pub department: String,
    /// Owning field, referenced by display name.
    pub field: String,
    pub year: String,
    pub phone_number: Option<String>,
    pub profile_image_url: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub email: String,
    pub full_name: String,
    pub employee_id: String,
    pub department: String,
    pub phone_number: Option<String>,
    pub profile_image_url: String,
    pub is_active: bool,
    pub notification_preferences: NotificationPreferences,
    // Mutated only by the assignment operations, never by profile edits.
    pub assigned_course_ids: Vec<String>,
    pub assigned_field_ids: Vec<String>,
    pub created_at: String,
    pub last_login_at: Option<String>,
    pub last_updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub email: String,
    pub full_name: String,
    pub department: String,
    pub phone_number: Option<String>,
    pub profile_image_url: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_updated_at: String,
}

/// A directory record tagged by which collection it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role")]
pub enum UserRecord {
    #[serde(rename = "student")]
    Student(Student),
    #[serde(rename = "teacher")]
    Teacher(Teacher),
    #[serde(rename = "admin")]
    Admin(Admin),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub field_id: String,
    pub field_name: String,
    pub department: String,
    pub description: String,
    pub weekly_schedule: Vec<ScheduleEntry>,
    pub created_at: String,
    pub last_updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub department: String,
    /// Owning field, referenced by display name rather than id.
    pub field: String,
    pub target_years: Vec<YearLabel>,
    pub teacher_email: Option<String>,
    pub teacher_name: Option<String>,
    pub course_schedule_entry: Option<ScheduleEntry>,
    pub is_active: bool,
    pub created_at: String,
    pub statistics: serde_json::Value,
}

/// Session/attendance counters kept on a course. The counters come from
/// processes outside this daemon; only the ratio is derived here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_sessions: i64,
    pub attended_sessions: i64,
    pub average_attendance_rate: f64,
}

impl AttendanceStats {
    pub fn new(total_sessions: i64, attended_sessions: i64) -> AttendanceStats {
        let average_attendance_rate = if total_sessions > 0 {
            attended_sessions as f64 / total_sessions as f64 * 100.0
        } else {
            0.0
        };
        AttendanceStats {
            total_sessions,
            attended_sessions,
            average_attendance_rate,
        }
    }
}
