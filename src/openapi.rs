use utoipa::OpenApi;

use crate::models::{
    Answer, Download, FileType, NewAnswer, NewDownload, NewNotification, NewQuestion, NewResource,
    NewStudySession, NewStudyTask, NewUser, Notification, NotificationKind, Question,
    QuestionStatus, QuestionWithAnswers, Resource, Role, StudySession, StudyTask, TaskPriority,
    UpdateStudySession, UpdateStudyTask, User,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::register,
        crate::routes::login,
        crate::routes::auth_me,
        crate::routes::list_classrooms,
        crate::routes::question_feed,
        crate::routes::create_question,
        crate::routes::get_question,
        crate::routes::submit_answer,
        crate::routes::upvote,
        crate::routes::rate_answer,
        crate::routes::create_resource,
        crate::routes::list_notifications,
        crate::routes::parent_dashboard,
        crate::routes::send_kudos,
        crate::routes::upload_file,
    ),
    components(schemas(
        User, NewUser, Role,
        Question, NewQuestion, QuestionStatus, QuestionWithAnswers,
        Answer, NewAnswer,
        Resource, NewResource, FileType,
        Notification, NewNotification, NotificationKind,
        StudyTask, NewStudyTask, UpdateStudyTask, TaskPriority,
        StudySession, NewStudySession, UpdateStudySession,
        Download, NewDownload,
        crate::routes::LoginRequest, crate::routes::LoginResponse,
        crate::routes::UpvoteRequest, crate::routes::RateRequest,
        crate::routes::KudosRequest,
        crate::routes::ChildStats, crate::routes::ClassAverage, crate::routes::ParentDashboard,
        crate::routes::FileUploadResponse,
    )),
    tags(
        (name = "users", description = "Registration and sessions"),
        (name = "questions", description = "Question and answer operations"),
        (name = "resources", description = "Study material operations"),
        (name = "parent", description = "Parent dashboard and kudos"),
    )
)]
pub struct ApiDoc;
