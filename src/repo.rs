use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("internal: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn get_user(&self, email: &str) -> RepoResult<User>;
    async fn find_user(&self, email: &str) -> RepoResult<Option<User>>;
    /// Resolve a parent's linked child: matching email with role student or tutor.
    async fn find_student(&self, email: &str) -> RepoResult<Option<User>>;
    async fn add_points(&self, email: &str, delta: i64) -> RepoResult<User>;
    async fn set_role(&self, email: &str, role: Role) -> RepoResult<User>;
    async fn list_students_in_grade(&self, grade: &str) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait QuestionRepo: Send + Sync {
    async fn create_question(
        &self,
        new: NewQuestion,
        asked_by: &str,
        asked_by_name: &str,
    ) -> RepoResult<Question>;
    async fn get_question(&self, id: Id) -> RepoResult<Question>;
    /// Newest first.
    async fn list_questions_by_classroom(&self, classroom: &str) -> RepoResult<Vec<Question>>;
    /// Newest first, across all classrooms.
    async fn list_questions(&self) -> RepoResult<Vec<Question>>;
    async fn upvote_question(&self, id: Id) -> RepoResult<Question>;
    async fn count_questions_by(&self, email: &str) -> RepoResult<i64>;
}

#[async_trait]
pub trait AnswerRepo: Send + Sync {
    /// Creates the answer row and flips the question to answered in the
    /// same lock/transaction.
    async fn create_answer(
        &self,
        question_id: Id,
        new: NewAnswer,
        answered_by: &str,
        answered_by_name: &str,
    ) -> RepoResult<Answer>;
    /// Oldest first.
    async fn list_answers(&self, question_id: Id) -> RepoResult<Vec<Answer>>;
    async fn get_answer(&self, id: Id) -> RepoResult<Answer>;
    async fn upvote_answer(&self, id: Id) -> RepoResult<Answer>;
    /// Conflict if the answer already carries a rating.
    async fn rate_answer(&self, id: Id, value: i64, rated_by: &str) -> RepoResult<Answer>;
    async fn count_answers_by(&self, email: &str) -> RepoResult<i64>;
}

#[async_trait]
pub trait ResourceRepo: Send + Sync {
    async fn create_resource(
        &self,
        new: NewResource,
        uploaded_by: &str,
        uploaded_by_name: &str,
    ) -> RepoResult<Resource>;
    async fn get_resource(&self, id: Id) -> RepoResult<Resource>;
    async fn list_resources_by_classroom(&self, classroom: &str) -> RepoResult<Vec<Resource>>;
    async fn list_resources(&self) -> RepoResult<Vec<Resource>>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn create_notification(&self, new: NewNotification) -> RepoResult<Notification>;
    /// Newest first, recipient only.
    async fn list_notifications(&self, user_email: &str) -> RepoResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: Id, user_email: &str) -> RepoResult<Notification>;
    async fn delete_notification(&self, id: Id, user_email: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait PlannerRepo: Send + Sync {
    async fn create_task(&self, owner_email: &str, new: NewStudyTask) -> RepoResult<StudyTask>;
    /// Due date ascending.
    async fn list_tasks(&self, owner_email: &str) -> RepoResult<Vec<StudyTask>>;
    async fn update_task(
        &self,
        id: Id,
        owner_email: &str,
        upd: UpdateStudyTask,
    ) -> RepoResult<StudyTask>;
    async fn delete_task(&self, id: Id, owner_email: &str) -> RepoResult<()>;

    async fn create_session(
        &self,
        owner_email: &str,
        new: NewStudySession,
    ) -> RepoResult<StudySession>;
    /// Start time descending.
    async fn list_sessions(&self, owner_email: &str) -> RepoResult<Vec<StudySession>>;
    async fn update_session(
        &self,
        id: Id,
        owner_email: &str,
        upd: UpdateStudySession,
    ) -> RepoResult<StudySession>;
    async fn delete_session(&self, id: Id, owner_email: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait DownloadRepo: Send + Sync {
    /// NotFound when the referenced resource does not exist.
    async fn record_download(&self, user_email: &str, new: NewDownload) -> RepoResult<Download>;
    async fn list_downloads(&self, user_email: &str) -> RepoResult<Vec<Download>>;
}

pub trait Repo:
    UserRepo + QuestionRepo + AnswerRepo + ResourceRepo + NotificationRepo + PlannerRepo + DownloadRepo
{
}

impl<T> Repo for T where
    T: UserRepo
        + QuestionRepo
        + AnswerRepo
        + ResourceRepo
        + NotificationRepo
        + PlannerRepo
        + DownloadRepo
{
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        users: HashMap<Id, User>,
        questions: HashMap<Id, Question>,
        answers: HashMap<Id, Answer>,
        resources: HashMap<Id, Resource>,
        notifications: HashMap<Id, Notification>,
        tasks: HashMap<Id, StudyTask>,
        sessions: HashMap<Id, StudySession>,
        downloads: HashMap<Id, Download>,
        next_id: Id,
    }

    impl State {
        fn user_mut_by_email(&mut self, email: &str) -> Option<&mut User> {
            self.users
                .values_mut()
                .find(|u| u.email.eq_ignore_ascii_case(email))
        }
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        fn snapshot_path() -> PathBuf {
            match std::env::var("EDULINK_DATA_DIR") {
                Ok(dir) => {
                    let mut p = PathBuf::from(dir);
                    p.push("state.json");
                    p
                }
                Err(_) => PathBuf::from(SNAPSHOT_PATH),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        eprintln!("[inmem] Loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        eprintln!(
                            "[inmem] Failed to parse snapshot '{}': {e}. Starting empty.",
                            path.display()
                        );
                        State::default()
                    }
                },
                Err(_) => State::default(),
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            if let Ok(s) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, s) {
                    eprintln!("[inmem] Failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            }
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let mut s = self.state.write().unwrap();
            if s.users
                .values()
                .any(|u| u.email.eq_ignore_ascii_case(&new.email))
            {
                return Err(RepoError::Conflict);
            }
            let id = Self::next_id(&mut s);
            let user = User {
                id,
                display_name: new.display_name,
                email: new.email,
                role: new.role.unwrap_or(Role::Student),
                grade: new.grade,
                subject: new.subject,
                student_email: new.student_email,
                points: 0,
                profile_image: new.profile_image,
                created_at: Utc::now(),
            };
            s.users.insert(id, user.clone());
            drop(s); // release lock before persisting
            self.persist();
            Ok(user)
        }

        async fn get_user(&self, email: &str) -> RepoResult<User> {
            self.find_user(email).await?.ok_or(RepoError::NotFound)
        }

        async fn find_user(&self, email: &str) -> RepoResult<Option<User>> {
            let s = self.state.read().unwrap();
            Ok(s.users
                .values()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn find_student(&self, email: &str) -> RepoResult<Option<User>> {
            let s = self.state.read().unwrap();
            Ok(s.users
                .values()
                .find(|u| {
                    u.email.eq_ignore_ascii_case(email)
                        && matches!(u.role, Role::Student | Role::Tutor)
                })
                .cloned())
        }

        async fn add_points(&self, email: &str, delta: i64) -> RepoResult<User> {
            let mut s = self.state.write().unwrap();
            let user = s.user_mut_by_email(email).ok_or(RepoError::NotFound)?;
            user.points += delta;
            let updated = user.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn set_role(&self, email: &str, role: Role) -> RepoResult<User> {
            let mut s = self.state.write().unwrap();
            let user = s.user_mut_by_email(email).ok_or(RepoError::NotFound)?;
            user.role = role;
            let updated = user.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn list_students_in_grade(&self, grade: &str) -> RepoResult<Vec<User>> {
            let s = self.state.read().unwrap();
            Ok(s.users
                .values()
                .filter(|u| {
                    matches!(u.role, Role::Student | Role::Tutor)
                        && u.grade.as_deref().map(str::trim) == Some(grade.trim())
                })
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl QuestionRepo for InMemRepo {
        async fn create_question(
            &self,
            new: NewQuestion,
            asked_by: &str,
            asked_by_name: &str,
        ) -> RepoResult<Question> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let question = Question {
                id,
                title: new.title,
                description: new.description,
                subject: new.subject,
                topic: new.topic,
                classroom: new.classroom,
                asked_by: asked_by.to_string(),
                asked_by_name: asked_by_name.to_string(),
                image_hash: new.image_hash,
                upvotes: 0,
                status: QuestionStatus::Unanswered,
                created_at: Utc::now(),
            };
            s.questions.insert(id, question.clone());
            drop(s);
            self.persist();
            Ok(question)
        }

        async fn get_question(&self, id: Id) -> RepoResult<Question> {
            let s = self.state.read().unwrap();
            s.questions.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_questions_by_classroom(&self, classroom: &str) -> RepoResult<Vec<Question>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .questions
                .values()
                .filter(|q| q.classroom == classroom)
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn list_questions(&self) -> RepoResult<Vec<Question>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s.questions.values().cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn upvote_question(&self, id: Id) -> RepoResult<Question> {
            let mut s = self.state.write().unwrap();
            let q = s.questions.get_mut(&id).ok_or(RepoError::NotFound)?;
            q.upvotes += 1;
            let updated = q.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn count_questions_by(&self, email: &str) -> RepoResult<i64> {
            let s = self.state.read().unwrap();
            Ok(s.questions
                .values()
                .filter(|q| q.asked_by.eq_ignore_ascii_case(email))
                .count() as i64)
        }
    }

    #[async_trait]
    impl AnswerRepo for InMemRepo {
        async fn create_answer(
            &self,
            question_id: Id,
            new: NewAnswer,
            answered_by: &str,
            answered_by_name: &str,
        ) -> RepoResult<Answer> {
            let mut s = self.state.write().unwrap();
            if !s.questions.contains_key(&question_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let answer = Answer {
                id,
                question_id,
                text: new.text,
                answered_by: answered_by.to_string(),
                answered_by_name: answered_by_name.to_string(),
                image_hash: new.image_hash,
                upvotes: 0,
                is_accepted: false,
                rating: None,
                rated_by: None,
                created_at: Utc::now(),
            };
            s.answers.insert(id, answer.clone());
            // status flips under the same lock as the insert
            if let Some(q) = s.questions.get_mut(&question_id) {
                q.status = QuestionStatus::Answered;
            }
            drop(s);
            self.persist();
            Ok(answer)
        }

        async fn list_answers(&self, question_id: Id) -> RepoResult<Vec<Answer>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .answers
                .values()
                .filter(|a| a.question_id == question_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(v)
        }

        async fn get_answer(&self, id: Id) -> RepoResult<Answer> {
            let s = self.state.read().unwrap();
            s.answers.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn upvote_answer(&self, id: Id) -> RepoResult<Answer> {
            let mut s = self.state.write().unwrap();
            let a = s.answers.get_mut(&id).ok_or(RepoError::NotFound)?;
            a.upvotes += 1;
            let updated = a.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn rate_answer(&self, id: Id, value: i64, rated_by: &str) -> RepoResult<Answer> {
            let mut s = self.state.write().unwrap();
            let a = s.answers.get_mut(&id).ok_or(RepoError::NotFound)?;
            if a.rating.is_some() {
                return Err(RepoError::Conflict);
            }
            a.rating = Some(value);
            a.rated_by = Some(rated_by.to_string());
            let updated = a.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn count_answers_by(&self, email: &str) -> RepoResult<i64> {
            let s = self.state.read().unwrap();
            Ok(s.answers
                .values()
                .filter(|a| a.answered_by.eq_ignore_ascii_case(email))
                .count() as i64)
        }
    }

    #[async_trait]
    impl ResourceRepo for InMemRepo {
        async fn create_resource(
            &self,
            new: NewResource,
            uploaded_by: &str,
            uploaded_by_name: &str,
        ) -> RepoResult<Resource> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let resource = Resource {
                id,
                title: new.title,
                description: new.description,
                file_hash: new.file_hash,
                file_type: new.file_type,
                subject: new.subject,
                topic: new.topic,
                classroom: new.classroom,
                uploaded_by: uploaded_by.to_string(),
                uploaded_by_name: uploaded_by_name.to_string(),
                created_at: Utc::now(),
            };
            s.resources.insert(id, resource.clone());
            drop(s);
            self.persist();
            Ok(resource)
        }

        async fn get_resource(&self, id: Id) -> RepoResult<Resource> {
            let s = self.state.read().unwrap();
            s.resources.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_resources_by_classroom(&self, classroom: &str) -> RepoResult<Vec<Resource>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .resources
                .values()
                .filter(|r| r.classroom == classroom)
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn list_resources(&self) -> RepoResult<Vec<Resource>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s.resources.values().cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }
    }

    #[async_trait]
    impl NotificationRepo for InMemRepo {
        async fn create_notification(&self, new: NewNotification) -> RepoResult<Notification> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let notification = Notification {
                id,
                user_email: new.user_email,
                kind: new.kind,
                title: new.title,
                message: new.message,
                question_id: new.question_id,
                read: false,
                created_at: Utc::now(),
            };
            s.notifications.insert(id, notification.clone());
            drop(s);
            self.persist();
            Ok(notification)
        }

        async fn list_notifications(&self, user_email: &str) -> RepoResult<Vec<Notification>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .notifications
                .values()
                .filter(|n| n.user_email.eq_ignore_ascii_case(user_email))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn mark_notification_read(
            &self,
            id: Id,
            user_email: &str,
        ) -> RepoResult<Notification> {
            let mut s = self.state.write().unwrap();
            let n = s.notifications.get_mut(&id).ok_or(RepoError::NotFound)?;
            if !n.user_email.eq_ignore_ascii_case(user_email) {
                return Err(RepoError::NotFound); // no existence leak across users
            }
            n.read = true;
            let updated = n.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_notification(&self, id: Id, user_email: &str) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let owned = s
                .notifications
                .get(&id)
                .map(|n| n.user_email.eq_ignore_ascii_case(user_email))
                .unwrap_or(false);
            if !owned {
                return Err(RepoError::NotFound);
            }
            s.notifications.remove(&id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl PlannerRepo for InMemRepo {
        async fn create_task(&self, owner_email: &str, new: NewStudyTask) -> RepoResult<StudyTask> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let task = StudyTask {
                id,
                owner_email: owner_email.to_string(),
                title: new.title,
                subject: new.subject,
                priority: new.priority,
                due_date: new.due_date,
                estimated_minutes: new.estimated_minutes,
                completed: false,
                created_at: Utc::now(),
            };
            s.tasks.insert(id, task.clone());
            drop(s);
            self.persist();
            Ok(task)
        }

        async fn list_tasks(&self, owner_email: &str) -> RepoResult<Vec<StudyTask>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .tasks
                .values()
                .filter(|t| t.owner_email.eq_ignore_ascii_case(owner_email))
                .cloned()
                .collect();
            v.sort_by(|a, b| a.due_date.cmp(&b.due_date));
            Ok(v)
        }

        async fn update_task(
            &self,
            id: Id,
            owner_email: &str,
            upd: UpdateStudyTask,
        ) -> RepoResult<StudyTask> {
            let mut s = self.state.write().unwrap();
            let t = s.tasks.get_mut(&id).ok_or(RepoError::NotFound)?;
            if !t.owner_email.eq_ignore_ascii_case(owner_email) {
                return Err(RepoError::NotFound);
            }
            if let Some(title) = upd.title {
                t.title = title;
            }
            if let Some(subject) = upd.subject {
                t.subject = subject;
            }
            if let Some(priority) = upd.priority {
                t.priority = priority;
            }
            if let Some(due_date) = upd.due_date {
                t.due_date = due_date;
            }
            if let Some(estimated_minutes) = upd.estimated_minutes {
                t.estimated_minutes = estimated_minutes;
            }
            if let Some(completed) = upd.completed {
                t.completed = completed;
            }
            let updated = t.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_task(&self, id: Id, owner_email: &str) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let owned = s
                .tasks
                .get(&id)
                .map(|t| t.owner_email.eq_ignore_ascii_case(owner_email))
                .unwrap_or(false);
            if !owned {
                return Err(RepoError::NotFound);
            }
            s.tasks.remove(&id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn create_session(
            &self,
            owner_email: &str,
            new: NewStudySession,
        ) -> RepoResult<StudySession> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            let session = StudySession {
                id,
                owner_email: owner_email.to_string(),
                subject: new.subject,
                planned_minutes: new.planned_minutes,
                started_at: new.started_at.unwrap_or_else(Utc::now),
                ended_at: None,
                actual_minutes: None,
                paused_seconds: 0,
                completed: false,
            };
            s.sessions.insert(id, session.clone());
            drop(s);
            self.persist();
            Ok(session)
        }

        async fn list_sessions(&self, owner_email: &str) -> RepoResult<Vec<StudySession>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .sessions
                .values()
                .filter(|x| x.owner_email.eq_ignore_ascii_case(owner_email))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            Ok(v)
        }

        async fn update_session(
            &self,
            id: Id,
            owner_email: &str,
            upd: UpdateStudySession,
        ) -> RepoResult<StudySession> {
            let mut s = self.state.write().unwrap();
            let x = s.sessions.get_mut(&id).ok_or(RepoError::NotFound)?;
            if !x.owner_email.eq_ignore_ascii_case(owner_email) {
                return Err(RepoError::NotFound);
            }
            if let Some(ended_at) = upd.ended_at {
                x.ended_at = Some(ended_at);
            }
            if let Some(actual_minutes) = upd.actual_minutes {
                x.actual_minutes = Some(actual_minutes);
            }
            if let Some(paused_seconds) = upd.paused_seconds {
                x.paused_seconds = paused_seconds;
            }
            if let Some(completed) = upd.completed {
                x.completed = completed;
            }
            let updated = x.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_session(&self, id: Id, owner_email: &str) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let owned = s
                .sessions
                .get(&id)
                .map(|x| x.owner_email.eq_ignore_ascii_case(owner_email))
                .unwrap_or(false);
            if !owned {
                return Err(RepoError::NotFound);
            }
            s.sessions.remove(&id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl DownloadRepo for InMemRepo {
        async fn record_download(
            &self,
            user_email: &str,
            new: NewDownload,
        ) -> RepoResult<Download> {
            let mut s = self.state.write().unwrap();
            if !s.resources.contains_key(&new.resource_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let download = Download {
                id,
                user_email: user_email.to_string(),
                resource_id: new.resource_id,
                local_path: new.local_path,
                created_at: Utc::now(),
            };
            s.downloads.insert(id, download.clone());
            drop(s);
            self.persist();
            Ok(download)
        }

        async fn list_downloads(&self, user_email: &str) -> RepoResult<Vec<Download>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .downloads
                .values()
                .filter(|d| d.user_email.eq_ignore_ascii_case(user_email))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use chrono::{DateTime, Utc};
    use sqlx::postgres::PgRow;
    use sqlx::{Pool, Postgres, Row};

    impl From<sqlx::Error> for RepoError {
        fn from(e: sqlx::Error) -> Self {
            match &e {
                sqlx::Error::RowNotFound => RepoError::NotFound,
                sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
                _ => RepoError::Internal(e.to_string()),
            }
        }
    }

    fn parse_col<T: std::str::FromStr<Err = String>>(raw: String) -> RepoResult<T> {
        raw.parse().map_err(RepoError::Internal)
    }

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    fn user_from_row(row: &PgRow) -> RepoResult<User> {
        Ok(User {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            role: parse_col(row.try_get::<String, _>("role")?)?,
            grade: row.try_get("grade")?,
            subject: row.try_get("subject")?,
            student_email: row.try_get("student_email")?,
            points: row.try_get("points")?,
            profile_image: row.try_get("profile_image")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn question_from_row(row: &PgRow) -> RepoResult<Question> {
        Ok(Question {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            subject: row.try_get("subject")?,
            topic: row.try_get("topic")?,
            classroom: row.try_get("classroom")?,
            asked_by: row.try_get("asked_by")?,
            asked_by_name: row.try_get("asked_by_name")?,
            image_hash: row.try_get("image_hash")?,
            upvotes: row.try_get("upvotes")?,
            status: parse_col(row.try_get::<String, _>("status")?)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn answer_from_row(row: &PgRow) -> RepoResult<Answer> {
        Ok(Answer {
            id: row.try_get("id")?,
            question_id: row.try_get("question_id")?,
            text: row.try_get("text")?,
            answered_by: row.try_get("answered_by")?,
            answered_by_name: row.try_get("answered_by_name")?,
            image_hash: row.try_get("image_hash")?,
            upvotes: row.try_get("upvotes")?,
            is_accepted: row.try_get("is_accepted")?,
            rating: row.try_get("rating")?,
            rated_by: row.try_get("rated_by")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn resource_from_row(row: &PgRow) -> RepoResult<Resource> {
        Ok(Resource {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            file_hash: row.try_get("file_hash")?,
            file_type: parse_col(row.try_get::<String, _>("file_type")?)?,
            subject: row.try_get("subject")?,
            topic: row.try_get("topic")?,
            classroom: row.try_get("classroom")?,
            uploaded_by: row.try_get("uploaded_by")?,
            uploaded_by_name: row.try_get("uploaded_by_name")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn notification_from_row(row: &PgRow) -> RepoResult<Notification> {
        Ok(Notification {
            id: row.try_get("id")?,
            user_email: row.try_get("user_email")?,
            kind: parse_col(row.try_get::<String, _>("kind")?)?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            question_id: row.try_get("question_id")?,
            read: row.try_get("read")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn task_from_row(row: &PgRow) -> RepoResult<StudyTask> {
        Ok(StudyTask {
            id: row.try_get("id")?,
            owner_email: row.try_get("owner_email")?,
            title: row.try_get("title")?,
            subject: row.try_get("subject")?,
            priority: parse_col(row.try_get::<String, _>("priority")?)?,
            due_date: row.try_get::<DateTime<Utc>, _>("due_date")?,
            estimated_minutes: row.try_get("estimated_minutes")?,
            completed: row.try_get("completed")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn session_from_row(row: &PgRow) -> RepoResult<StudySession> {
        Ok(StudySession {
            id: row.try_get("id")?,
            owner_email: row.try_get("owner_email")?,
            subject: row.try_get("subject")?,
            planned_minutes: row.try_get("planned_minutes")?,
            started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
            ended_at: row.try_get("ended_at")?,
            actual_minutes: row.try_get("actual_minutes")?,
            paused_seconds: row.try_get("paused_seconds")?,
            completed: row.try_get("completed")?,
        })
    }

    fn download_from_row(row: &PgRow) -> RepoResult<Download> {
        Ok(Download {
            id: row.try_get("id")?,
            user_email: row.try_get("user_email")?,
            resource_id: row.try_get("resource_id")?,
            local_path: row.try_get("local_path")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    const USER_COLS: &str =
        "id, display_name, email, role, grade, subject, student_email, points, profile_image, created_at";
    const QUESTION_COLS: &str =
        "id, title, description, subject, topic, classroom, asked_by, asked_by_name, image_hash, upvotes, status, created_at";
    const ANSWER_COLS: &str =
        "id, question_id, text, answered_by, answered_by_name, image_hash, upvotes, is_accepted, rating, rated_by, created_at";
    const RESOURCE_COLS: &str =
        "id, title, description, file_hash, file_type, subject, topic, classroom, uploaded_by, uploaded_by_name, created_at";

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let role = new.role.unwrap_or(Role::Student);
            let row = sqlx::query(&format!(
                "INSERT INTO users (display_name, email, role, grade, subject, student_email, profile_image)
                 VALUES ($1, lower($2), $3, $4, $5, $6, $7) RETURNING {USER_COLS}"
            ))
            .bind(&new.display_name)
            .bind(&new.email)
            .bind(role.as_str())
            .bind(&new.grade)
            .bind(&new.subject)
            .bind(&new.student_email)
            .bind(&new.profile_image)
            .fetch_one(&self.pool)
            .await?;
            user_from_row(&row)
        }

        async fn get_user(&self, email: &str) -> RepoResult<User> {
            let row = sqlx::query(&format!(
                "SELECT {USER_COLS} FROM users WHERE email = lower($1)"
            ))
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
            user_from_row(&row)
        }

        async fn find_user(&self, email: &str) -> RepoResult<Option<User>> {
            let row = sqlx::query(&format!(
                "SELECT {USER_COLS} FROM users WHERE email = lower($1)"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(user_from_row).transpose()
        }

        async fn find_student(&self, email: &str) -> RepoResult<Option<User>> {
            let row = sqlx::query(&format!(
                "SELECT {USER_COLS} FROM users WHERE email = lower($1) AND role IN ('student','tutor')"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(user_from_row).transpose()
        }

        async fn add_points(&self, email: &str, delta: i64) -> RepoResult<User> {
            let row = sqlx::query(&format!(
                "UPDATE users SET points = points + $2 WHERE email = lower($1) RETURNING {USER_COLS}"
            ))
            .bind(email)
            .bind(delta)
            .fetch_one(&self.pool)
            .await?;
            user_from_row(&row)
        }

        async fn set_role(&self, email: &str, role: Role) -> RepoResult<User> {
            let row = sqlx::query(&format!(
                "UPDATE users SET role = $2 WHERE email = lower($1) RETURNING {USER_COLS}"
            ))
            .bind(email)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
            user_from_row(&row)
        }

        async fn list_students_in_grade(&self, grade: &str) -> RepoResult<Vec<User>> {
            let rows = sqlx::query(&format!(
                "SELECT {USER_COLS} FROM users WHERE role IN ('student','tutor') AND grade = $1"
            ))
            .bind(grade)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(user_from_row).collect()
        }
    }

    #[async_trait]
    impl QuestionRepo for PgRepo {
        async fn create_question(
            &self,
            new: NewQuestion,
            asked_by: &str,
            asked_by_name: &str,
        ) -> RepoResult<Question> {
            let row = sqlx::query(&format!(
                "INSERT INTO questions (title, description, subject, topic, classroom, asked_by, asked_by_name, image_hash)
                 VALUES ($1, $2, $3, $4, $5, lower($6), $7, $8) RETURNING {QUESTION_COLS}"
            ))
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.subject)
            .bind(&new.topic)
            .bind(&new.classroom)
            .bind(asked_by)
            .bind(asked_by_name)
            .bind(&new.image_hash)
            .fetch_one(&self.pool)
            .await?;
            question_from_row(&row)
        }

        async fn get_question(&self, id: Id) -> RepoResult<Question> {
            let row = sqlx::query(&format!("SELECT {QUESTION_COLS} FROM questions WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            question_from_row(&row)
        }

        async fn list_questions_by_classroom(&self, classroom: &str) -> RepoResult<Vec<Question>> {
            let rows = sqlx::query(&format!(
                "SELECT {QUESTION_COLS} FROM questions WHERE classroom = $1 ORDER BY created_at DESC"
            ))
            .bind(classroom)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(question_from_row).collect()
        }

        async fn list_questions(&self) -> RepoResult<Vec<Question>> {
            let rows = sqlx::query(&format!(
                "SELECT {QUESTION_COLS} FROM questions ORDER BY created_at DESC"
            ))
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(question_from_row).collect()
        }

        async fn upvote_question(&self, id: Id) -> RepoResult<Question> {
            let row = sqlx::query(&format!(
                "UPDATE questions SET upvotes = upvotes + 1 WHERE id = $1 RETURNING {QUESTION_COLS}"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
            question_from_row(&row)
        }

        async fn count_questions_by(&self, email: &str) -> RepoResult<i64> {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM questions WHERE asked_by = lower($1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
            Ok(row.try_get("n")?)
        }
    }

    #[async_trait]
    impl AnswerRepo for PgRepo {
        async fn create_answer(
            &self,
            question_id: Id,
            new: NewAnswer,
            answered_by: &str,
            answered_by_name: &str,
        ) -> RepoResult<Answer> {
            let mut tx = self.pool.begin().await?;
            let exists = sqlx::query("SELECT 1 FROM questions WHERE id = $1")
                .bind(question_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(RepoError::NotFound);
            }
            let row = sqlx::query(&format!(
                "INSERT INTO answers (question_id, text, answered_by, answered_by_name, image_hash)
                 VALUES ($1, $2, lower($3), $4, $5) RETURNING {ANSWER_COLS}"
            ))
            .bind(question_id)
            .bind(&new.text)
            .bind(answered_by)
            .bind(answered_by_name)
            .bind(&new.image_hash)
            .fetch_one(&mut *tx)
            .await?;
            sqlx::query("UPDATE questions SET status = 'answered' WHERE id = $1")
                .bind(question_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            answer_from_row(&row)
        }

        async fn list_answers(&self, question_id: Id) -> RepoResult<Vec<Answer>> {
            let rows = sqlx::query(&format!(
                "SELECT {ANSWER_COLS} FROM answers WHERE question_id = $1 ORDER BY created_at ASC"
            ))
            .bind(question_id)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(answer_from_row).collect()
        }

        async fn get_answer(&self, id: Id) -> RepoResult<Answer> {
            let row = sqlx::query(&format!("SELECT {ANSWER_COLS} FROM answers WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            answer_from_row(&row)
        }

        async fn upvote_answer(&self, id: Id) -> RepoResult<Answer> {
            let row = sqlx::query(&format!(
                "UPDATE answers SET upvotes = upvotes + 1 WHERE id = $1 RETURNING {ANSWER_COLS}"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
            answer_from_row(&row)
        }

        async fn rate_answer(&self, id: Id, value: i64, rated_by: &str) -> RepoResult<Answer> {
            let row = sqlx::query(&format!(
                "UPDATE answers SET rating = $2, rated_by = lower($3)
                 WHERE id = $1 AND rating IS NULL RETURNING {ANSWER_COLS}"
            ))
            .bind(id)
            .bind(value)
            .bind(rated_by)
            .fetch_optional(&self.pool)
            .await?;
            match row {
                Some(r) => answer_from_row(&r),
                None => {
                    // distinguish missing answer from already-rated
                    let exists = sqlx::query("SELECT 1 FROM answers WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                    if exists.is_some() {
                        Err(RepoError::Conflict)
                    } else {
                        Err(RepoError::NotFound)
                    }
                }
            }
        }

        async fn count_answers_by(&self, email: &str) -> RepoResult<i64> {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM answers WHERE answered_by = lower($1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
            Ok(row.try_get("n")?)
        }
    }

    #[async_trait]
    impl ResourceRepo for PgRepo {
        async fn create_resource(
            &self,
            new: NewResource,
            uploaded_by: &str,
            uploaded_by_name: &str,
        ) -> RepoResult<Resource> {
            let row = sqlx::query(&format!(
                "INSERT INTO resources (title, description, file_hash, file_type, subject, topic, classroom, uploaded_by, uploaded_by_name)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, lower($8), $9) RETURNING {RESOURCE_COLS}"
            ))
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.file_hash)
            .bind(new.file_type.as_str())
            .bind(&new.subject)
            .bind(&new.topic)
            .bind(&new.classroom)
            .bind(uploaded_by)
            .bind(uploaded_by_name)
            .fetch_one(&self.pool)
            .await?;
            resource_from_row(&row)
        }

        async fn get_resource(&self, id: Id) -> RepoResult<Resource> {
            let row = sqlx::query(&format!("SELECT {RESOURCE_COLS} FROM resources WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            resource_from_row(&row)
        }

        async fn list_resources_by_classroom(&self, classroom: &str) -> RepoResult<Vec<Resource>> {
            let rows = sqlx::query(&format!(
                "SELECT {RESOURCE_COLS} FROM resources WHERE classroom = $1 ORDER BY created_at DESC"
            ))
            .bind(classroom)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(resource_from_row).collect()
        }

        async fn list_resources(&self) -> RepoResult<Vec<Resource>> {
            let rows = sqlx::query(&format!(
                "SELECT {RESOURCE_COLS} FROM resources ORDER BY created_at DESC"
            ))
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(resource_from_row).collect()
        }
    }

    #[async_trait]
    impl NotificationRepo for PgRepo {
        async fn create_notification(&self, new: NewNotification) -> RepoResult<Notification> {
            let row = sqlx::query(
                "INSERT INTO notifications (user_email, kind, title, message, question_id)
                 VALUES (lower($1), $2, $3, $4, $5)
                 RETURNING id, user_email, kind, title, message, question_id, read, created_at",
            )
            .bind(&new.user_email)
            .bind(new.kind.as_str())
            .bind(&new.title)
            .bind(&new.message)
            .bind(new.question_id)
            .fetch_one(&self.pool)
            .await?;
            notification_from_row(&row)
        }

        async fn list_notifications(&self, user_email: &str) -> RepoResult<Vec<Notification>> {
            let rows = sqlx::query(
                "SELECT id, user_email, kind, title, message, question_id, read, created_at
                 FROM notifications WHERE user_email = lower($1) ORDER BY created_at DESC",
            )
            .bind(user_email)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(notification_from_row).collect()
        }

        async fn mark_notification_read(
            &self,
            id: Id,
            user_email: &str,
        ) -> RepoResult<Notification> {
            let row = sqlx::query(
                "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_email = lower($2)
                 RETURNING id, user_email, kind, title, message, question_id, read, created_at",
            )
            .bind(id)
            .bind(user_email)
            .fetch_optional(&self.pool)
            .await?;
            match row {
                Some(r) => notification_from_row(&r),
                None => Err(RepoError::NotFound),
            }
        }

        async fn delete_notification(&self, id: Id, user_email: &str) -> RepoResult<()> {
            let res = sqlx::query(
                "DELETE FROM notifications WHERE id = $1 AND user_email = lower($2)",
            )
            .bind(id)
            .bind(user_email)
            .execute(&self.pool)
            .await?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PlannerRepo for PgRepo {
        async fn create_task(&self, owner_email: &str, new: NewStudyTask) -> RepoResult<StudyTask> {
            let row = sqlx::query(
                "INSERT INTO study_tasks (owner_email, title, subject, priority, due_date, estimated_minutes)
                 VALUES (lower($1), $2, $3, $4, $5, $6)
                 RETURNING id, owner_email, title, subject, priority, due_date, estimated_minutes, completed, created_at",
            )
            .bind(owner_email)
            .bind(&new.title)
            .bind(&new.subject)
            .bind(new.priority.as_str())
            .bind(new.due_date)
            .bind(new.estimated_minutes)
            .fetch_one(&self.pool)
            .await?;
            task_from_row(&row)
        }

        async fn list_tasks(&self, owner_email: &str) -> RepoResult<Vec<StudyTask>> {
            let rows = sqlx::query(
                "SELECT id, owner_email, title, subject, priority, due_date, estimated_minutes, completed, created_at
                 FROM study_tasks WHERE owner_email = lower($1) ORDER BY due_date ASC",
            )
            .bind(owner_email)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(task_from_row).collect()
        }

        async fn update_task(
            &self,
            id: Id,
            owner_email: &str,
            upd: UpdateStudyTask,
        ) -> RepoResult<StudyTask> {
            let row = sqlx::query(
                "UPDATE study_tasks SET
                   title = COALESCE($3, title),
                   subject = COALESCE($4, subject),
                   priority = COALESCE($5, priority),
                   due_date = COALESCE($6, due_date),
                   estimated_minutes = COALESCE($7, estimated_minutes),
                   completed = COALESCE($8, completed)
                 WHERE id = $1 AND owner_email = lower($2)
                 RETURNING id, owner_email, title, subject, priority, due_date, estimated_minutes, completed, created_at",
            )
            .bind(id)
            .bind(owner_email)
            .bind(upd.title)
            .bind(upd.subject)
            .bind(upd.priority.map(|p| p.as_str().to_string()))
            .bind(upd.due_date)
            .bind(upd.estimated_minutes)
            .bind(upd.completed)
            .fetch_optional(&self.pool)
            .await?;
            match row {
                Some(r) => task_from_row(&r),
                None => Err(RepoError::NotFound),
            }
        }

        async fn delete_task(&self, id: Id, owner_email: &str) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM study_tasks WHERE id = $1 AND owner_email = lower($2)")
                .bind(id)
                .bind(owner_email)
                .execute(&self.pool)
                .await?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn create_session(
            &self,
            owner_email: &str,
            new: NewStudySession,
        ) -> RepoResult<StudySession> {
            let row = sqlx::query(
                "INSERT INTO study_sessions (owner_email, subject, planned_minutes, started_at)
                 VALUES (lower($1), $2, $3, COALESCE($4, now()))
                 RETURNING id, owner_email, subject, planned_minutes, started_at, ended_at, actual_minutes, paused_seconds, completed",
            )
            .bind(owner_email)
            .bind(&new.subject)
            .bind(new.planned_minutes)
            .bind(new.started_at)
            .fetch_one(&self.pool)
            .await?;
            session_from_row(&row)
        }

        async fn list_sessions(&self, owner_email: &str) -> RepoResult<Vec<StudySession>> {
            let rows = sqlx::query(
                "SELECT id, owner_email, subject, planned_minutes, started_at, ended_at, actual_minutes, paused_seconds, completed
                 FROM study_sessions WHERE owner_email = lower($1) ORDER BY started_at DESC",
            )
            .bind(owner_email)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(session_from_row).collect()
        }

        async fn update_session(
            &self,
            id: Id,
            owner_email: &str,
            upd: UpdateStudySession,
        ) -> RepoResult<StudySession> {
            let row = sqlx::query(
                "UPDATE study_sessions SET
                   ended_at = COALESCE($3, ended_at),
                   actual_minutes = COALESCE($4, actual_minutes),
                   paused_seconds = COALESCE($5, paused_seconds),
                   completed = COALESCE($6, completed)
                 WHERE id = $1 AND owner_email = lower($2)
                 RETURNING id, owner_email, subject, planned_minutes, started_at, ended_at, actual_minutes, paused_seconds, completed",
            )
            .bind(id)
            .bind(owner_email)
            .bind(upd.ended_at)
            .bind(upd.actual_minutes)
            .bind(upd.paused_seconds)
            .bind(upd.completed)
            .fetch_optional(&self.pool)
            .await?;
            match row {
                Some(r) => session_from_row(&r),
                None => Err(RepoError::NotFound),
            }
        }

        async fn delete_session(&self, id: Id, owner_email: &str) -> RepoResult<()> {
            let res =
                sqlx::query("DELETE FROM study_sessions WHERE id = $1 AND owner_email = lower($2)")
                    .bind(id)
                    .bind(owner_email)
                    .execute(&self.pool)
                    .await?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DownloadRepo for PgRepo {
        async fn record_download(
            &self,
            user_email: &str,
            new: NewDownload,
        ) -> RepoResult<Download> {
            let exists = sqlx::query("SELECT 1 FROM resources WHERE id = $1")
                .bind(new.resource_id)
                .fetch_optional(&self.pool)
                .await?;
            if exists.is_none() {
                return Err(RepoError::NotFound);
            }
            let row = sqlx::query(
                "INSERT INTO downloads (user_email, resource_id, local_path)
                 VALUES (lower($1), $2, $3)
                 RETURNING id, user_email, resource_id, local_path, created_at",
            )
            .bind(user_email)
            .bind(new.resource_id)
            .bind(&new.local_path)
            .fetch_one(&self.pool)
            .await?;
            download_from_row(&row)
        }

        async fn list_downloads(&self, user_email: &str) -> RepoResult<Vec<Download>> {
            let rows = sqlx::query(
                "SELECT id, user_email, resource_id, local_path, created_at
                 FROM downloads WHERE user_email = lower($1) ORDER BY created_at DESC",
            )
            .bind(user_email)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(download_from_row).collect()
        }
    }
}
