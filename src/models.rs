use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
    Teacher,
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Tutor => "tutor",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "tutor" => Ok(Role::Tutor),
            "teacher" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Unanswered,
    Answered,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Unanswered => "unanswered",
            QuestionStatus::Answered => "answered",
        }
    }
}

impl std::str::FromStr for QuestionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unanswered" => Ok(QuestionStatus::Unanswered),
            "answered" => Ok(QuestionStatus::Answered),
            other => Err(format!("unknown question status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Image,
    Other,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Image => "image",
            FileType::Other => "other",
        }
    }

    /// Classify a sniffed MIME type the way the mobile client used to.
    pub fn from_mime(mime: &str) -> Self {
        if mime == "application/pdf" {
            FileType::Pdf
        } else if mime.starts_with("image/") {
            FileType::Image
        } else {
            FileType::Other
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(FileType::Pdf),
            "image" => Ok(FileType::Image),
            "other" => Ok(FileType::Other),
            other => Err(format!("unknown file type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Answer,
    Upvote,
    Resource,
    Achievement,
    Kudos,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Answer => "answer",
            NotificationKind::Upvote => "upvote",
            NotificationKind::Resource => "resource",
            NotificationKind::Achievement => "achievement",
            NotificationKind::Kudos => "kudos",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "answer" => Ok(NotificationKind::Answer),
            "upvote" => Ok(NotificationKind::Upvote),
            "resource" => Ok(NotificationKind::Resource),
            "achievement" => Ok(NotificationKind::Achievement),
            "kudos" => Ok(NotificationKind::Kudos),
            other => Err(format!("unknown notification kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// A registered account. Exactly one of `grade`, `subject` and
/// `student_email` is populated, determined by `role`; a promoted tutor
/// keeps the grade it had as a student.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Id,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub grade: Option<String>,
    pub subject: Option<String>,
    pub student_email: Option<String>,
    pub points: i64,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewUser {
    pub display_name: String,
    pub email: String,
    pub role: Option<Role>, // defaults to student
    pub grade: Option<String>,
    pub subject: Option<String>,
    pub student_email: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub topic: Option<String>,
    pub classroom: String, // grade string "6".."11"
    pub asked_by: String,
    pub asked_by_name: String,
    pub image_hash: Option<String>,
    pub upvotes: i64,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewQuestion {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub topic: Option<String>,
    pub classroom: String,
    pub image_hash: Option<String>,
}

/// An answer row. Stable ids replace the positional embedded array the
/// mobile client used, so ratings address an answer unambiguously.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Answer {
    pub id: Id,
    pub question_id: Id,
    pub text: String,
    pub answered_by: String,
    pub answered_by_name: String,
    pub image_hash: Option<String>,
    pub upvotes: i64,
    pub is_accepted: bool,
    pub rating: Option<i64>,
    pub rated_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewAnswer {
    pub text: String,
    pub image_hash: Option<String>,
}

/// A question together with its answer rows; the response shape of the
/// answer-submission and question-detail endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionWithAnswers {
    pub question: Question,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Resource {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub file_hash: Option<String>,
    pub file_type: FileType,
    pub subject: String,
    pub topic: Option<String>,
    pub classroom: String,
    pub uploaded_by: String,
    pub uploaded_by_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewResource {
    pub title: String,
    pub description: String,
    pub file_hash: Option<String>,
    pub file_type: FileType,
    pub subject: String,
    pub topic: Option<String>,
    pub classroom: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Id,
    pub user_email: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub question_id: Option<Id>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewNotification {
    pub user_email: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub question_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudyTask {
    pub id: Id,
    pub owner_email: String,
    pub title: String,
    pub subject: String,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub estimated_minutes: i64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewStudyTask {
    pub title: String,
    pub subject: String,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub estimated_minutes: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateStudyTask {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_minutes: Option<i64>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudySession {
    pub id: Id,
    pub owner_email: String,
    pub subject: String,
    pub planned_minutes: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub actual_minutes: Option<i64>,
    pub paused_seconds: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewStudySession {
    pub subject: String,
    pub planned_minutes: i64,
    pub started_at: Option<DateTime<Utc>>, // defaults to now
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateStudySession {
    pub ended_at: Option<DateTime<Utc>>,
    pub actual_minutes: Option<i64>,
    pub paused_seconds: Option<i64>,
    pub completed: Option<bool>,
}

/// Client-side provenance log entry linking a user to a locally cached
/// resource file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Download {
    pub id: Id,
    pub user_email: String,
    pub resource_id: Id,
    pub local_path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewDownload {
    pub resource_id: Id,
    pub local_path: String,
}
