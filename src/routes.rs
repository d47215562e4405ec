use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;
use sha2::{Digest, Sha256};

use crate::auth::{create_jwt, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::policy;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::Repo;
use crate::require_role;
use crate::storage::{FileStore, FileStoreError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/users").route(web::post().to(register)))
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(web::resource("/auth/refresh").route(web::post().to(refresh_token)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(web::resource("/classrooms").route(web::get().to(list_classrooms)))
            .service(
                web::resource("/classrooms/{grade}/questions")
                    .route(web::get().to(list_classroom_questions)),
            )
            .service(
                web::resource("/classrooms/{grade}/resources")
                    .route(web::get().to(list_classroom_resources)),
            )
            .service(web::resource("/feed/questions").route(web::get().to(question_feed)))
            .service(web::resource("/feed/resources").route(web::get().to(resource_feed)))
            .service(web::resource("/questions").route(web::post().to(create_question)))
            .service(web::resource("/questions/{id}").route(web::get().to(get_question)))
            .service(
                web::resource("/questions/{id}/answers").route(web::post().to(submit_answer)),
            )
            .service(web::resource("/questions/{id}/upvote").route(web::post().to(upvote)))
            .service(
                web::resource("/questions/{qid}/answers/{aid}/rate")
                    .route(web::post().to(rate_answer)),
            )
            .service(web::resource("/resources").route(web::post().to(create_resource)))
            .service(web::resource("/notifications").route(web::get().to(list_notifications)))
            .service(
                web::resource("/notifications/{id}/read")
                    .route(web::post().to(mark_notification_read)),
            )
            .service(
                web::resource("/notifications/{id}")
                    .route(web::delete().to(delete_notification)),
            )
            .service(web::resource("/parent/dashboard").route(web::get().to(parent_dashboard)))
            .service(web::resource("/parent/kudos").route(web::post().to(send_kudos)))
            .service(
                web::resource("/planner/tasks")
                    .route(web::get().to(list_tasks))
                    .route(web::post().to(create_task)),
            )
            .service(
                web::resource("/planner/tasks/{id}")
                    .route(web::patch().to(update_task))
                    .route(web::delete().to(delete_task)),
            )
            .service(
                web::resource("/planner/sessions")
                    .route(web::get().to(list_sessions))
                    .route(web::post().to(create_session)),
            )
            .service(
                web::resource("/planner/sessions/{id}")
                    .route(web::patch().to(update_session))
                    .route(web::delete().to(delete_session)),
            )
            .service(
                web::resource("/downloads")
                    .route(web::get().to(list_downloads))
                    .route(web::post().to(record_download)),
            )
            .service(web::resource("/files").route(web::post().to(upload_file))),
    );
    // public fetch route (no /api/v1 prefix so <img src="/files/{hash}"> works)
    cfg.route("/files/{hash}", web::get().to(get_file));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub file_store: Arc<dyn FileStore>,
    pub rate_limiter: Option<RateLimiterFacade>,
}

// ---------------- shared helpers ----------------

/// Resolve the session to a fresh user record. The JWT's role claim is
/// never trusted for policy decisions.
async fn current_user(data: &AppState, auth: &Auth) -> Result<User, ApiError> {
    data.repo
        .get_user(&auth.0.sub)
        .await
        .map_err(|_| ApiError::Unauthorized)
}

/// One of the two places the promotion threshold is checked (the other
/// being the points-mutating workflows, which call this too).
async fn apply_promotion(data: &AppState, user: User) -> Result<User, ApiError> {
    if !policy::promotes(&user.role, user.points) {
        return Ok(user);
    }
    let promoted = data.repo.set_role(&user.email, Role::Tutor).await?;
    metrics::increment_counter!("edulink_tutor_promotions_total");
    notify_best_effort(
        data,
        NewNotification {
            user_email: promoted.email.clone(),
            kind: NotificationKind::Achievement,
            title: "You are now a tutor".into(),
            message: format!(
                "You reached {} points and can now help lower grades.",
                policy::TUTOR_THRESHOLD
            ),
            question_id: None,
        },
    )
    .await;
    Ok(promoted)
}

/// Best-effort notification write: failures are logged and counted,
/// never surfaced to the caller.
async fn notify_best_effort(data: &AppState, new: NewNotification) {
    if let Err(e) = data.repo.create_notification(new).await {
        log::warn!("notification write failed (ignored): {e}");
        metrics::increment_counter!("edulink_notifications_failed_total");
    }
}

fn rate_limited(data: &AppState, allowed: impl Fn(&RateLimiterFacade) -> bool) -> bool {
    data.rate_limiter.as_ref().map(|rl| !allowed(rl)).unwrap_or(false)
}

async fn question_with_answers(data: &AppState, id: Id) -> Result<QuestionWithAnswers, ApiError> {
    let question = data.repo.get_question(id).await?;
    let answers = data.repo.list_answers(id).await?;
    Ok(QuestionWithAnswers { question, answers })
}

// ---------------- registration & session ----------------

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 200, description = "Email already registered; stored profile returned", body = User),
        (status = 400, description = "Validation error")
    )
)]
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    let mut new = payload.into_inner();
    new.email = new.email.trim().to_lowercase();
    new.display_name = new.display_name.trim().to_string();
    if new.display_name.is_empty() {
        return Err(ApiError::Validation("display_name is required".into()));
    }
    if new.email.is_empty() || !new.email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".into()));
    }

    // missing role defaults to student
    let role = new.role.clone().unwrap_or(Role::Student);
    new.role = Some(role.clone());
    // exactly one of grade/subject/student_email survives, per role
    match role {
        Role::Student | Role::Tutor => {
            let grade = new.grade.as_deref().map(str::trim).unwrap_or("");
            if policy::parse_grade(grade).is_none() {
                return Err(ApiError::Validation(format!(
                    "grade is required for students and must be between {} and {}",
                    policy::GRADE_MIN,
                    policy::GRADE_MAX
                )));
            }
            new.grade = Some(grade.to_string());
            new.subject = None;
            new.student_email = None;
        }
        Role::Teacher => {
            let subject = new.subject.as_deref().map(str::trim).unwrap_or("");
            if subject.is_empty() {
                return Err(ApiError::Validation("subject is required for teachers".into()));
            }
            new.subject = Some(subject.to_string());
            new.grade = None;
            new.student_email = None;
        }
        Role::Parent => {
            let linked = new
                .student_email
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .to_lowercase();
            if linked.is_empty() || !linked.contains('@') {
                return Err(ApiError::Validation(
                    "student_email is required for parents".into(),
                ));
            }
            new.student_email = Some(linked);
            new.grade = None;
            new.subject = None;
        }
    }

    // re-registering an existing email returns the stored profile
    if let Some(existing) = data.repo.find_user(&new.email).await? {
        return Ok(HttpResponse::Ok().json(existing));
    }
    let user = data.repo.create_user(new).await?;
    metrics::increment_counter!("edulink_users_registered_total");
    Ok(HttpResponse::Created().json(user))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued", body = LoginResponse),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let user = data
        .repo
        .get_user(&email)
        .await
        .map_err(|_| ApiError::NotFound)?;
    // login-time role fetch must detect a pending promotion
    let user = apply_promotion(&data, user).await?;
    let token =
        create_jwt(&user.email, &user.display_name, user.role.clone()).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(LoginResponse { token, user }))
}

pub async fn refresh_token(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let token =
        create_jwt(&user.email, &user.display_name, user.role).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": token })))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user profile", body = User),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    // clients hit this at startup; it doubles as the role fetch
    let user = apply_promotion(&data, user).await?;
    Ok(HttpResponse::Ok().json(user))
}

// ---------------- classrooms & feeds ----------------

#[utoipa::path(
    get,
    path = "/api/v1/classrooms",
    responses(
        (status = 200, description = "Grades visible to the caller", body = [String])
    )
)]
pub async fn list_classrooms(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let grades: Vec<String> = policy::visible_grades(&user.role, policy::effective_grade(&user))
        .into_iter()
        .map(|g| g.to_string())
        .collect();
    Ok(HttpResponse::Ok().json(grades))
}

pub async fn list_classroom_questions(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let classroom = path.into_inner();
    if policy::parse_grade(&classroom).is_none() {
        return Err(ApiError::Validation(format!(
            "classroom must be a grade between {} and {}",
            policy::GRADE_MIN,
            policy::GRADE_MAX
        )));
    }
    let questions = data.repo.list_questions_by_classroom(classroom.trim()).await?;
    Ok(HttpResponse::Ok().json(questions))
}

pub async fn list_classroom_resources(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let classroom = path.into_inner();
    if policy::parse_grade(&classroom).is_none() {
        return Err(ApiError::Validation(format!(
            "classroom must be a grade between {} and {}",
            policy::GRADE_MIN,
            policy::GRADE_MAX
        )));
    }
    let resources = data.repo.list_resources_by_classroom(classroom.trim()).await?;
    Ok(HttpResponse::Ok().json(resources))
}

#[utoipa::path(
    get,
    path = "/api/v1/feed/questions",
    responses(
        (status = 200, description = "Answerable questions for the caller", body = [Question]),
        (status = 403, description = "Parents have no question feed")
    )
)]
pub async fn question_feed(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    if matches!(user.role, Role::Parent) {
        return Err(ApiError::Forbidden);
    }
    let questions: Vec<Question> = data
        .repo
        .list_questions()
        .await?
        .into_iter()
        .filter(|q| policy::answerable(&user, q))
        .collect();
    Ok(HttpResponse::Ok().json(questions))
}

pub async fn resource_feed(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    if matches!(user.role, Role::Parent) {
        return Err(ApiError::Forbidden);
    }
    let own_grade = policy::effective_grade(&user);
    let resources: Vec<Resource> = data
        .repo
        .list_resources()
        .await?
        .into_iter()
        .filter(|r| policy::can_view(&user.role, own_grade, &r.classroom))
        .collect();
    Ok(HttpResponse::Ok().json(resources))
}

// ---------------- questions & answers ----------------

#[utoipa::path(
    post,
    path = "/api/v1/questions",
    request_body = NewQuestion,
    responses(
        (status = 201, description = "Question created", body = Question),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Parents cannot ask questions"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn create_question(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewQuestion>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    require_role!(user, Role::Student | Role::Tutor | Role::Teacher);
    if rate_limited(&data, |rl| rl.allow_question(&user.email)) {
        return Err(ApiError::RateLimited);
    }
    let mut new = payload.into_inner();
    new.title = new.title.trim().to_string();
    if new.title.is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if new.description.trim().is_empty() {
        return Err(ApiError::Validation("description is required".into()));
    }
    if new.subject.trim().is_empty() {
        return Err(ApiError::Validation("subject is required".into()));
    }
    if policy::parse_grade(&new.classroom).is_none() {
        return Err(ApiError::Validation(format!(
            "classroom must be a grade between {} and {}",
            policy::GRADE_MIN,
            policy::GRADE_MAX
        )));
    }
    new.classroom = new.classroom.trim().to_string();
    let question = data
        .repo
        .create_question(new, &user.email, &user.display_name)
        .await?;
    metrics::increment_counter!("edulink_questions_created_total");
    Ok(HttpResponse::Created().json(question))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}",
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question with answers", body = QuestionWithAnswers),
        (status = 404, description = "Question not found")
    )
)]
pub async fn get_question(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let detail = question_with_answers(&data, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/answers",
    request_body = NewAnswer,
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Updated question with answers", body = QuestionWithAnswers),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Answering your own question is rejected"),
        (status = 404, description = "Question not found"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn submit_answer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewAnswer>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    require_role!(user, Role::Student | Role::Tutor | Role::Teacher);
    if rate_limited(&data, |rl| rl.allow_answer(&user.email)) {
        return Err(ApiError::RateLimited);
    }
    let mut new = payload.into_inner();
    policy::validate_answer_text(&new.text).map_err(ApiError::Validation)?;
    new.text = new.text.trim().to_string();

    let question_id = path.into_inner();
    let question = data.repo.get_question(question_id).await?;
    if question.asked_by.eq_ignore_ascii_case(&user.email) {
        return Err(ApiError::OwnQuestion);
    }

    // The steps below are sequential across aggregates, not transactional.
    // Answer + status flip are one repo call; the points award and the
    // notification can individually fail and leave the earlier steps in
    // place, matching the source's accepted consistency gap.
    data.repo
        .create_answer(question_id, new, &user.email, &user.display_name)
        .await?;
    metrics::increment_counter!("edulink_answers_submitted_total");

    let answerer = data.repo.add_points(&user.email, policy::ANSWER_POINTS).await?;
    apply_promotion(&data, answerer).await?;

    notify_best_effort(
        &data,
        NewNotification {
            user_email: question.asked_by.clone(),
            kind: NotificationKind::Answer,
            title: "Your question has an answer".into(),
            message: format!("{} answered \"{}\"", user.display_name, question.title),
            question_id: Some(question_id),
        },
    )
    .await;

    let detail = question_with_answers(&data, question_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct UpvoteRequest {
    pub answer_id: Option<Id>,
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/upvote",
    request_body = UpvoteRequest,
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Updated question with answers", body = QuestionWithAnswers),
        (status = 404, description = "Question or answer not found")
    )
)]
pub async fn upvote(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpvoteRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let question_id = path.into_inner();
    match payload.answer_id {
        Some(answer_id) => {
            let answer = data.repo.get_answer(answer_id).await?;
            if answer.question_id != question_id {
                return Err(ApiError::NotFound);
            }
            let answer = data.repo.upvote_answer(answer_id).await?;
            if !answer.answered_by.eq_ignore_ascii_case(&user.email) {
                notify_best_effort(
                    &data,
                    NewNotification {
                        user_email: answer.answered_by.clone(),
                        kind: NotificationKind::Upvote,
                        title: "Your answer got an upvote".into(),
                        message: format!("{} upvoted your answer", user.display_name),
                        question_id: Some(question_id),
                    },
                )
                .await;
            }
        }
        None => {
            data.repo.upvote_question(question_id).await?;
        }
    }
    let detail = question_with_answers(&data, question_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct RateRequest {
    pub value: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{qid}/answers/{aid}/rate",
    request_body = RateRequest,
    params(
        ("qid" = Id, Path, description = "Question id"),
        ("aid" = Id, Path, description = "Answer id")
    ),
    responses(
        (status = 200, description = "Rated answer", body = Answer),
        (status = 400, description = "Invalid rating value"),
        (status = 403, description = "Only the question author can rate"),
        (status = 404, description = "Question or answer not found"),
        (status = 409, description = "Answer already rated")
    )
)]
pub async fn rate_answer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
    payload: web::Json<RateRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let (question_id, answer_id) = path.into_inner();
    if !policy::valid_rating(payload.value) {
        return Err(ApiError::Validation(
            "rating must be one of 5, 10, 15, 20, 25".into(),
        ));
    }
    let question = data.repo.get_question(question_id).await?;
    if !question.asked_by.eq_ignore_ascii_case(&user.email) {
        return Err(ApiError::Forbidden);
    }
    let answer = data.repo.get_answer(answer_id).await?;
    if answer.question_id != question_id {
        return Err(ApiError::NotFound);
    }

    let rated = data
        .repo
        .rate_answer(answer_id, payload.value, &user.email)
        .await?;
    metrics::increment_counter!("edulink_ratings_total");

    // same non-transactional tail as answer submission
    let answerer = data.repo.add_points(&rated.answered_by, payload.value).await?;
    apply_promotion(&data, answerer).await?;

    notify_best_effort(
        &data,
        NewNotification {
            user_email: rated.answered_by.clone(),
            kind: NotificationKind::Achievement,
            title: "Your answer was rated".into(),
            message: format!(
                "{} rated your answer +{} points",
                user.display_name, payload.value
            ),
            question_id: Some(question_id),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(rated))
}

// ---------------- resources ----------------

#[utoipa::path(
    post,
    path = "/api/v1/resources",
    request_body = NewResource,
    responses(
        (status = 201, description = "Resource created", body = Resource),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Parents cannot upload resources")
    )
)]
pub async fn create_resource(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewResource>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    require_role!(user, Role::Student | Role::Tutor | Role::Teacher);
    let mut new = payload.into_inner();
    new.title = new.title.trim().to_string();
    if new.title.is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if new.subject.trim().is_empty() {
        return Err(ApiError::Validation("subject is required".into()));
    }
    if policy::parse_grade(&new.classroom).is_none() {
        return Err(ApiError::Validation(format!(
            "classroom must be a grade between {} and {}",
            policy::GRADE_MIN,
            policy::GRADE_MAX
        )));
    }
    new.classroom = new.classroom.trim().to_string();
    let resource = data
        .repo
        .create_resource(new, &user.email, &user.display_name)
        .await?;
    metrics::increment_counter!("edulink_resources_created_total");

    // fan out to the classroom, best-effort
    let students = data
        .repo
        .list_students_in_grade(&resource.classroom)
        .await
        .unwrap_or_default();
    for student in students {
        if student.email.eq_ignore_ascii_case(&user.email) {
            continue;
        }
        notify_best_effort(
            &data,
            NewNotification {
                user_email: student.email.clone(),
                kind: NotificationKind::Resource,
                title: "New study material".into(),
                message: format!(
                    "{} shared \"{}\" for grade {}",
                    resource.uploaded_by_name, resource.title, resource.classroom
                ),
                question_id: None,
            },
        )
        .await;
    }

    Ok(HttpResponse::Created().json(resource))
}

// ---------------- notifications ----------------

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    responses(
        (status = 200, description = "Caller's notifications, newest first", body = [Notification])
    )
)]
pub async fn list_notifications(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let notifications = data.repo.list_notifications(&user.email).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

pub async fn mark_notification_read(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let notification = data
        .repo
        .mark_notification_read(path.into_inner(), &user.email)
        .await?;
    Ok(HttpResponse::Ok().json(notification))
}

pub async fn delete_notification(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    data.repo
        .delete_notification(path.into_inner(), &user.email)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- parent dashboard & kudos ----------------

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ChildStats {
    pub display_name: String,
    pub email: String,
    pub grade: String,
    pub role: Role,
    pub points: i64,
    pub questions_asked: i64,
    pub answers_given: i64,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ClassAverage {
    pub questions: i64,
    pub answers: i64,
    pub points: i64,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ParentDashboard {
    pub child: ChildStats,
    pub class_average: ClassAverage,
}

#[utoipa::path(
    get,
    path = "/api/v1/parent/dashboard",
    responses(
        (status = 200, description = "Linked child statistics and class averages", body = ParentDashboard),
        (status = 403, description = "Caller is not a parent"),
        (status = 404, description = "Linked student not found")
    )
)]
pub async fn parent_dashboard(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    require_role!(user, Role::Parent);
    let linked_email = user.student_email.as_deref().unwrap_or("");
    let child = data
        .repo
        .find_student(linked_email)
        .await?
        .ok_or(ApiError::StudentNotFound)?;

    let grade = child
        .grade
        .clone()
        .unwrap_or_else(|| policy::GRADE_MIN.to_string());
    let questions_asked = data.repo.count_questions_by(&child.email).await?;
    let answers_given = data.repo.count_answers_by(&child.email).await?;

    // Class averages over the child's classmates. Full scans, like the
    // source; fine at this data volume.
    let mut classmates = data.repo.list_students_in_grade(&grade).await?;
    classmates.retain(|s| !s.email.eq_ignore_ascii_case(&child.email));
    let all_questions = data.repo.list_questions().await?;
    let mut total_questions: i64 = 0;
    let mut total_answers: i64 = 0;
    let mut total_points: i64 = 0;
    for classmate in &classmates {
        total_questions += all_questions
            .iter()
            .filter(|q| q.asked_by.eq_ignore_ascii_case(&classmate.email))
            .count() as i64;
        total_answers += data.repo.count_answers_by(&classmate.email).await?;
        total_points += classmate.points;
    }
    let class_average = ClassAverage {
        questions: policy::floored_average(total_questions, classmates.len()),
        answers: policy::floored_average(total_answers, classmates.len()),
        points: policy::floored_average(total_points, classmates.len()),
    };

    Ok(HttpResponse::Ok().json(ParentDashboard {
        child: ChildStats {
            display_name: child.display_name,
            email: child.email,
            grade,
            role: child.role,
            points: child.points,
            questions_asked,
            answers_given,
        },
        class_average,
    }))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct KudosRequest {
    pub message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/parent/kudos",
    request_body = KudosRequest,
    responses(
        (status = 201, description = "Kudos sent", body = Notification),
        (status = 403, description = "Caller is not a parent"),
        (status = 404, description = "Linked student not found"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn send_kudos(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<KudosRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    require_role!(user, Role::Parent);
    if rate_limited(&data, |rl| rl.allow_kudos(&user.email)) {
        return Err(ApiError::RateLimited);
    }
    let linked_email = user.student_email.as_deref().unwrap_or("");
    let child = data
        .repo
        .find_student(linked_email)
        .await?
        .ok_or(ApiError::StudentNotFound)?;

    let message = payload
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("Your parent sent you encouragement. Keep it up!")
        .to_string();
    // The kudos IS the notification, so failures surface here.
    let notification = data
        .repo
        .create_notification(NewNotification {
            user_email: child.email,
            kind: NotificationKind::Kudos,
            title: format!("Kudos from {}", user.display_name),
            message,
            question_id: None,
        })
        .await?;
    metrics::increment_counter!("edulink_kudos_total");
    Ok(HttpResponse::Created().json(notification))
}

// ---------------- study planner ----------------

pub async fn list_tasks(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let tasks = data.repo.list_tasks(&user.email).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

pub async fn create_task(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewStudyTask>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let new = payload.into_inner();
    if new.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    let task = data.repo.create_task(&user.email, new).await?;
    Ok(HttpResponse::Created().json(task))
}

pub async fn update_task(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateStudyTask>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let task = data
        .repo
        .update_task(path.into_inner(), &user.email, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

pub async fn delete_task(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    data.repo.delete_task(path.into_inner(), &user.email).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn list_sessions(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let sessions = data.repo.list_sessions(&user.email).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn create_session(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewStudySession>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let new = payload.into_inner();
    if new.subject.trim().is_empty() {
        return Err(ApiError::Validation("subject is required".into()));
    }
    let session = data.repo.create_session(&user.email, new).await?;
    Ok(HttpResponse::Created().json(session))
}

pub async fn update_session(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateStudySession>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let session = data
        .repo
        .update_session(path.into_inner(), &user.email, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn delete_session(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    data.repo
        .delete_session(path.into_inner(), &user.email)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- downloads ----------------

pub async fn list_downloads(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let downloads = data.repo.list_downloads(&user.email).await?;
    Ok(HttpResponse::Ok().json(downloads))
}

pub async fn record_download(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewDownload>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&data, &auth).await?;
    let download = data
        .repo
        .record_download(&user.email, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(download))
}

// ---------------- attachments ----------------

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct FileUploadResponse {
    pub hash: String,
    pub mime: String,
    pub size: usize,
    pub file_type: FileType,
    pub duplicate: bool, // true when the upload already existed (idempotent)
}

const FILE_SIZE_LIMIT: usize = 20 * 1024 * 1024; // 20 MB

const ALLOWED_MIME: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "video/mp4",
];

#[utoipa::path(
    post,
    path = "/api/v1/files",
    responses(
        (status = 201, description = "File stored (new)", body = FileUploadResponse),
        (status = 200, description = "File already existed (idempotent)", body = FileUploadResponse),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn upload_file(
    auth: Auth,
    data: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    use actix_web::http::StatusCode;
    let user = current_user(&data, &auth).await?;
    if rate_limited(&data, |rl| rl.allow_upload(&user.email)) {
        return Err(ApiError::RateLimited);
    }
    let mut bytes: Vec<u8> = Vec::new();
    while let Some(field) = payload.try_next().await.map_err(|e| {
        log::error!("multipart error: {e}");
        ApiError::Internal
    })? {
        if let Some(name) = field.content_disposition().get_name() {
            if name != "file" {
                continue;
            }
        } else {
            continue;
        }
        let mut field_stream = field;
        let mut hasher = Sha256::new();
        while let Some(chunk) = field_stream.try_next().await.map_err(|e| {
            log::error!("stream read error: {e}");
            ApiError::Internal
        })? {
            if bytes.len() + chunk.len() > FILE_SIZE_LIMIT {
                return Ok(HttpResponse::build(StatusCode::PAYLOAD_TOO_LARGE).finish());
            }
            hasher.update(&chunk);
            bytes.extend_from_slice(&chunk);
        }
        let hash = format!("{:x}", hasher.finalize());
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        if !ALLOWED_MIME.contains(&mime.as_str()) {
            return Ok(HttpResponse::UnsupportedMediaType().finish());
        }
        // idempotent: re-uploading the same bytes is a 200, not an error
        let (status_code, duplicate) = match data.file_store.save(&hash, &mime, &bytes).await {
            Ok(()) => (StatusCode::CREATED, false),
            Err(FileStoreError::Duplicate) => (StatusCode::OK, true),
            Err(e) => {
                log::error!("file_store save error: {e}");
                return Err(ApiError::Internal);
            }
        };
        let resp = FileUploadResponse {
            file_type: FileType::from_mime(&mime),
            hash,
            mime,
            size: bytes.len(),
            duplicate,
        };
        return Ok(HttpResponse::build(status_code).json(resp));
    }
    Ok(HttpResponse::BadRequest().finish())
}

/// Serve stored file bytes by hash.
pub async fn get_file(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let hash = path.into_inner();
    if hash.len() < 2 {
        return Err(ApiError::NotFound);
    }
    match data.file_store.load(&hash).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok()
            .insert_header(("Content-Type", mime))
            .body(bytes)),
        Err(FileStoreError::NotFound) => Err(ApiError::NotFound),
        Err(e) => {
            log::error!("file_store load error: {e}");
            Err(ApiError::Internal)
        }
    }
}
