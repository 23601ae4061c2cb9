//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Implements `as_str`, `Display` and `FromStr` for a text-backed enum column
macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        concat!("Unknown ", $label, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
    Parent,
}

text_enum!(Role, "role", {
    Teacher => "teacher",
    Student => "student",
    Parent => "parent",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A registered student, the subject of attendance tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    /// External identifier printed on the student card (e.g. "STU002")
    pub student_code: String,
    pub user_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub grade: String,
    pub section: String,
    /// Guardian user; notifications go here
    pub parent_id: Option<i64>,
    pub profile_image: Option<String>,
    /// Opaque biometric template produced by the recognizer
    #[serde(skip)]
    pub face_template: Option<Vec<u8>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_face_template(&self) -> bool {
        self.face_template.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub teacher_id: i64,
    pub grade: String,
    pub section: String,
    /// Free-form JSON schedule, stored as text
    pub schedule: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

text_enum!(AttendanceStatus, "attendance status", {
    Present => "present",
    Absent => "absent",
    Late => "late",
});

impl AttendanceStatus {
    /// Present and late both count as attended
    pub fn counts_as_attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

/// How an attendance entry was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkMethod {
    Manual,
    FacialRecognition,
}

text_enum!(MarkMethod, "mark method", {
    Manual => "manual",
    FacialRecognition => "facial_recognition",
});

/// One (student, class, day) status record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    pub attendance_date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_at: DateTime<Utc>,
    pub recognition_confidence: Option<f64>,
    pub notes: Option<String>,
    pub marked_by: Option<i64>,
    pub method: MarkMethod,
    pub created_at: DateTime<Utc>,
}

/// Attendance record prepared for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub student_id: i64,
    pub class_id: i64,
    pub attendance_date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_at: DateTime<Utc>,
    pub recognition_confidence: Option<f64>,
    pub notes: Option<String>,
    pub marked_by: Option<i64>,
    pub method: MarkMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Attendance,
    Late,
    Absent,
}

text_enum!(NotificationKind, "notification kind", {
    Attendance => "attendance",
    Late => "late",
    Absent => "absent",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    /// Recipient (guardian) user
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub student_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub student_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        for status in [AttendanceStatus::Present, AttendanceStatus::Absent, AttendanceStatus::Late] {
            assert_eq!(status.as_str().parse::<AttendanceStatus>().unwrap(), status);
        }
        assert!("excused".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn test_attended_statuses() {
        assert!(AttendanceStatus::Present.counts_as_attended());
        assert!(AttendanceStatus::Late.counts_as_attended());
        assert!(!AttendanceStatus::Absent.counts_as_attended());
    }

    #[test]
    fn test_mark_method_serializes_snake_case() {
        let json = serde_json::to_string(&MarkMethod::FacialRecognition).unwrap();
        assert_eq!(json, "\"facial_recognition\"");
        assert_eq!(MarkMethod::FacialRecognition.to_string(), "facial_recognition");
    }

    #[test]
    fn test_student_template_not_serialized() {
        let student = Student {
            id: 2,
            student_code: "STU002".to_string(),
            user_id: None,
            first_name: "Sarah".to_string(),
            last_name: "Chen".to_string(),
            grade: "10".to_string(),
            section: "A".to_string(),
            parent_id: Some(7),
            profile_image: None,
            face_template: Some(vec![1, 2, 3]),
            is_active: true,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&student).unwrap();
        assert!(json.get("faceTemplate").is_none());
        assert_eq!(json["studentCode"], "STU002");
        assert_eq!(json["parentId"], 7);
        assert_eq!(student.full_name(), "Sarah Chen");
        assert!(student.has_face_template());
    }
}
