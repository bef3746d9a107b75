//! Action dispatch
//!
//! [`CourseEngine::handle`] checks the caller's access level, runs the action
//! against the access store and progress tracker and describes the answer as
//! an [`Outcome`]. Domain errors are turned into replies here; only
//! `AccessDenied` reaches the transport.

use super::action::{AccessLevel, Action, PendingInput};
use super::reply::{Button, Effect, Keyboard, Outcome, Reply, ReplyBody};
use super::unauthorized_cache::UnauthorizedCache;
use super::views::admin::{self, AdminView, DefaultAdminView};
use super::views::course::{self as views, callbacks, CourseView, DefaultCourseView};
use crate::access::AccessStore;
use crate::config::Features;
use crate::course::{Course, CourseError, ProgressTracker, QuizResult, QuizStep};
use crate::status::{RuntimeStats, StatusSnapshot};
use crate::storage::ProgressStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default number of granted users per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// The user an action comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    /// Telegram user id
    pub id: i64,
    /// Display name
    pub name: String,
    /// `@username` without the `@`
    pub username: Option<String>,
}

impl UserRef {
    /// User without a username
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            username: None,
        }
    }
}

/// Course bot logic, independent of Telegram
pub struct CourseEngine {
    course: Arc<Course>,
    access: Arc<AccessStore>,
    tracker: ProgressTracker,
    features: Features,
    stats: Arc<RuntimeStats>,
    denials: Option<Arc<UnauthorizedCache>>,
    page_size: usize,
}

impl CourseEngine {
    /// Engine over `course` with all capabilities enabled
    #[must_use]
    pub fn new(
        course: Arc<Course>,
        access: Arc<AccessStore>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            tracker: ProgressTracker::new(course.clone(), progress),
            course,
            access,
            features: Features::default(),
            stats: Arc::new(RuntimeStats::new()),
            denials: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Switch capabilities
    #[must_use]
    pub const fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Share runtime counters with the runner
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<RuntimeStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Report silenced denials from this cache in the status page
    #[must_use]
    pub fn with_denial_cache(mut self, cache: Arc<UnauthorizedCache>) -> Self {
        self.denials = Some(cache);
        self
    }

    /// Granted users per page, at least one
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The course
    #[must_use]
    pub fn course(&self) -> &Course {
        &self.course
    }

    /// The access store
    #[must_use]
    pub fn access(&self) -> &AccessStore {
        &self.access
    }

    /// The progress tracker
    #[must_use]
    pub const fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Enabled capabilities
    #[must_use]
    pub const fn features(&self) -> Features {
        self.features
    }

    /// Runtime counters
    #[must_use]
    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// What a user without access is told
    #[must_use]
    pub fn denied(&self) -> Outcome {
        Outcome::reply(
            Reply::text(DefaultCourseView::access_denied())
                .with_keyboard(views::request_access_keyboard()),
        )
    }

    /// Handle one action from `user`.
    ///
    /// # Errors
    ///
    /// `AccessDenied` when the user may not perform the action. Every other
    /// failure is answered with a reply.
    pub async fn handle(&self, user: &UserRef, action: Action) -> Result<Outcome, CourseError> {
        match action.access_level() {
            AccessLevel::Open => {}
            AccessLevel::Learner => {
                if !self.access.has_access(user.id).await {
                    return Err(CourseError::AccessDenied(user.id));
                }
            }
            AccessLevel::Admin => {
                if !self.features.admin_panel {
                    return Ok(self.help(user).await);
                }
                if !self.access.is_admin(user.id).await {
                    if self.access.has_access(user.id).await {
                        return self.recover(CourseError::AdminOnly(user.id));
                    }
                    return Err(CourseError::AccessDenied(user.id));
                }
            }
        }

        match self.dispatch(user, action).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => self.recover(e),
        }
    }

    fn recover(&self, err: CourseError) -> Result<Outcome, CourseError> {
        let text = match err {
            CourseError::AccessDenied(_) => return Err(err),
            CourseError::AdminOnly(_) => DefaultAdminView::admin_only().to_string(),
            CourseError::LastAdmin => DefaultAdminView::last_admin().to_string(),
            CourseError::OutOfRange { index, count } => {
                let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
                DefaultCourseView::module_not_found(number, count)
            }
            CourseError::QuizNotStarted => {
                return Ok(Outcome::reply(
                    Reply::text(DefaultCourseView::quiz_not_started()).with_keyboard(
                        Keyboard::Inline(vec![vec![Button::new(
                            "▶️ Начать тест",
                            callbacks::QUIZ_FORCE,
                        )]]),
                    ),
                ));
            }
            CourseError::InvalidAnswer(letter) => DefaultCourseView::quiz_invalid_answer(&letter),
            CourseError::Persistence(e) => {
                error!("Storage failure while handling an action: {e}");
                DefaultCourseView::internal_error().to_string()
            }
        };
        Ok(Outcome::reply(Reply::text(text)))
    }

    async fn dispatch(&self, user: &UserRef, action: Action) -> Result<Outcome, CourseError> {
        let text = |t: &str| -> Result<Outcome, CourseError> {
            Ok(Outcome::reply(Reply::text(t)))
        };
        match action {
            Action::Start => self.start(user).await,
            Action::Help | Action::Unknown => Ok(self.help(user).await),
            Action::Menu => self.menu(user).await,
            Action::Progress => self.progress(user).await,
            Action::OpenModule(index) => self.show_module(user, index).await,
            Action::ModuleByNumber(number) => match usize::try_from(number) {
                Ok(n) if (1..=self.course.module_count()).contains(&n) => {
                    self.show_module(user, n - 1).await
                }
                _ => text(&DefaultCourseView::module_not_found(
                    number,
                    self.course.module_count(),
                )),
            },
            Action::NextModule(from) => self.navigate(user, from, true).await,
            Action::PreviousModule(from) => self.navigate(user, from, false).await,
            Action::CompleteModule(index) => self.complete(user, index).await,
            Action::CompleteAll => {
                self.tracker.mark_all_complete(user.id).await?;
                Ok(Outcome::reply(
                    Reply::text(DefaultCourseView::all_completed())
                        .with_keyboard(self.menu_keyboard(user).await?),
                ))
            }
            Action::ListenAudio(index) => self.audio(user, index).await,
            Action::StartQuiz
            | Action::StartQuizAnyway
            | Action::AnswerQuiz(_)
            | Action::SkipQuestion
            | Action::FinishQuiz => self.quiz(user, action).await,
            Action::UsefulLinks => text(&DefaultCourseView::links_page(&self.course)),
            Action::Contacts => text(&DefaultCourseView::contacts_page(&self.course)),
            Action::About => text(&DefaultCourseView::about_page(&self.course)),
            Action::LeaveFeedback => Ok(Outcome::reply(
                Reply::text(DefaultCourseView::feedback_prompt())
                    .with_keyboard(views::cancel_keyboard()),
            )
            .with_effect(Effect::AwaitInput(PendingInput::Feedback))),
            Action::SubmitFeedback(feedback) => {
                info!("Feedback from {} (ID: {}): {}", user.name, user.id, feedback);
                self.stats.record_feedback();
                Ok(Outcome::reply(
                    Reply::text(DefaultCourseView::feedback_thanks())
                        .with_keyboard(self.main_keyboard(user.id).await),
                ))
            }
            Action::RequestAccess => Ok(self.request_access(user).await),
            Action::MyId => text(&DefaultCourseView::my_id(user.id)),
            Action::Cancel => Ok(Outcome::reply(
                Reply::text(DefaultCourseView::cancelled())
                    .with_keyboard(self.main_keyboard(user.id).await),
            )),
            Action::Usage(hint) => text(DefaultCourseView::usage(hint)),
            Action::Healthcheck => text("OK"),
            admin_action => self.admin(user, admin_action).await,
        }
    }

    /// Reply keyboard matching the user's role
    pub async fn main_keyboard(&self, user_id: i64) -> Keyboard {
        views::main_keyboard(self.access.is_admin(user_id).await, self.features)
    }

    async fn menu_keyboard(&self, user: &UserRef) -> Result<Keyboard, CourseError> {
        let progress = self.tracker.progress(user.id).await?;
        Ok(views::menu_keyboard(
            &self.course,
            progress.as_ref(),
            self.features,
        ))
    }

    async fn start(&self, user: &UserRef) -> Result<Outcome, CourseError> {
        let welcome = DefaultCourseView::welcome(&user.name, &self.course);
        if !self.access.has_access(user.id).await {
            info!("User {} ({}) opened the bot without access", user.id, user.name);
            let mut outcome = self.denied();
            outcome.replies.insert(0, Reply::text(welcome));
            return Ok(outcome);
        }

        self.tracker.start_or_resume(user.id, Some(&user.name)).await?;
        Ok(Outcome::replies(vec![
            Reply::text(welcome).with_keyboard(self.main_keyboard(user.id).await),
            Reply::text(DefaultCourseView::menu_header())
                .with_keyboard(self.menu_keyboard(user).await?),
        ]))
    }

    async fn help(&self, user: &UserRef) -> Outcome {
        let is_admin = self.access.is_admin(user.id).await;
        let text = DefaultCourseView::help(&self.course, self.features, is_admin);
        let reply = if self.access.has_access(user.id).await {
            Reply::text(text).with_keyboard(views::main_keyboard(is_admin, self.features))
        } else {
            Reply::text(text)
        };
        Outcome::reply(reply)
    }

    async fn menu(&self, user: &UserRef) -> Result<Outcome, CourseError> {
        Ok(Outcome::reply(
            Reply::text(DefaultCourseView::menu_header())
                .with_keyboard(self.menu_keyboard(user).await?),
        ))
    }

    async fn progress(&self, user: &UserRef) -> Result<Outcome, CourseError> {
        let progress = self.tracker.start_or_resume(user.id, Some(&user.name)).await?;
        let summary = self.tracker.summary(user.id).await?;

        let mut rows = vec![vec![Button::new("📋 Меню курса", callbacks::MENU)]];
        if self.features.quiz && self.course.question_count() > 0 {
            rows.push(vec![Button::new("📝 Итоговый тест", callbacks::QUIZ_START)]);
        }
        Ok(Outcome::reply(
            Reply::text(DefaultCourseView::progress_page(
                &self.course,
                &progress,
                &summary,
            ))
            .with_keyboard(Keyboard::Inline(rows)),
        ))
    }

    async fn module_reply(&self, user_id: i64, index: usize) -> Result<Reply, CourseError> {
        let module = self.course.module(index).ok_or(CourseError::OutOfRange {
            index,
            count: self.course.module_count(),
        })?;
        let completed = self
            .tracker
            .progress(user_id)
            .await?
            .is_some_and(|p| p.is_completed(index));
        Ok(
            Reply::text(DefaultCourseView::module_page(module)).with_keyboard(
                views::navigation_keyboard(
                    module,
                    self.course.module_count(),
                    completed,
                    self.features,
                ),
            ),
        )
    }

    async fn show_module(&self, user: &UserRef, index: usize) -> Result<Outcome, CourseError> {
        let module = self.tracker.view_module(user.id, index).await?;
        Ok(Outcome::reply(self.module_reply(user.id, module.index).await?))
    }

    async fn navigate(
        &self,
        user: &UserRef,
        from: usize,
        forward: bool,
    ) -> Result<Outcome, CourseError> {
        let nav = if forward {
            self.tracker.next_module(user.id, from).await?
        } else {
            self.tracker.previous_module(user.id, from).await?
        };

        let mut reply = self.module_reply(user.id, nav.module.index).await?;
        if let Some(boundary) = nav.boundary {
            reply.body = ReplyBody::Text(
                DefaultCourseView::boundary_notice(boundary).to_string(),
            );
        }
        Ok(Outcome::reply(reply))
    }

    async fn complete(&self, user: &UserRef, index: usize) -> Result<Outcome, CourseError> {
        let result = self.tracker.complete_module(user.id, index).await?;
        let number = index + 1;
        let text = if result.newly_completed {
            DefaultCourseView::module_completed(number, result.course_complete)
        } else {
            DefaultCourseView::module_already_completed(number)
        };

        let keyboard = if result.course_complete
            && self.features.quiz
            && self.course.question_count() > 0
        {
            Keyboard::Inline(vec![
                vec![Button::new("📝 Итоговый тест", callbacks::QUIZ_START)],
                vec![Button::new("📋 Меню курса", callbacks::MENU)],
            ])
        } else {
            match self.course.module(index) {
                Some(module) => views::navigation_keyboard(
                    module,
                    self.course.module_count(),
                    true,
                    self.features,
                ),
                None => self.menu_keyboard(user).await?,
            }
        };
        Ok(Outcome::reply(Reply::text(text).with_keyboard(keyboard)))
    }

    async fn audio(&self, user: &UserRef, index: usize) -> Result<Outcome, CourseError> {
        if !self.features.audio {
            return Ok(self.help(user).await);
        }
        let reply = match self.tracker.listen_audio(user.id, index).await? {
            Some(reference) => {
                let caption = self
                    .course
                    .module(index)
                    .map(DefaultCourseView::audio_caption)
                    .unwrap_or_default();
                Reply::audio(reference, caption)
            }
            None => Reply::text(DefaultCourseView::no_audio()),
        };
        Ok(Outcome::reply(reply))
    }

    async fn quiz(&self, user: &UserRef, action: Action) -> Result<Outcome, CourseError> {
        if !self.features.quiz {
            return Ok(self.help(user).await);
        }
        if self.course.question_count() == 0 {
            return Ok(Outcome::reply(Reply::text(DefaultCourseView::quiz_empty())));
        }

        let step = match action {
            Action::StartQuiz if !self.tracker.all_completed(user.id).await? => {
                let summary = self.tracker.summary(user.id).await?;
                return Ok(Outcome::reply(
                    Reply::text(DefaultCourseView::quiz_gate(summary.completed, summary.total))
                        .with_keyboard(views::quiz_gate_keyboard()),
                ));
            }
            Action::StartQuiz | Action::StartQuizAnyway => QuizStep::Next {
                question_index: self.tracker.start_quiz(user.id).await?,
            },
            Action::AnswerQuiz(letter) => self.tracker.answer_current(user.id, &letter).await?,
            Action::SkipQuestion => self.tracker.skip_current(user.id).await?,
            _ => QuizStep::Finished(self.tracker.finish_early(user.id).await?),
        };

        match step {
            QuizStep::Next { question_index } => match self.course.question(question_index) {
                Some(question) => Ok(Outcome::reply(
                    Reply::text(DefaultCourseView::quiz_question(
                        question,
                        question_index,
                        self.course.question_count(),
                    ))
                    .with_keyboard(views::quiz_question_keyboard(question)),
                )),
                None => {
                    warn!("Question {question_index} is gone, scoring the run now");
                    let result = self.tracker.finish_early(user.id).await?;
                    Ok(self.quiz_result(&result))
                }
            },
            QuizStep::Finished(result) => Ok(self.quiz_result(&result)),
        }
    }

    fn quiz_result(&self, result: &QuizResult) -> Outcome {
        Outcome::reply(
            Reply::text(DefaultCourseView::quiz_result(&self.course.questions, result))
                .with_keyboard(views::quiz_result_keyboard()),
        )
    }

    async fn request_access(&self, user: &UserRef) -> Outcome {
        if self.access.has_access(user.id).await {
            return Outcome::reply(Reply::text(DefaultCourseView::access_already_granted()));
        }

        let admins = self.access.list_admins().await;
        info!("User {} ({}) requested access", user.id, user.name);
        let outcome = Outcome::reply(Reply::text(DefaultCourseView::access_requested()));
        if admins.is_empty() {
            warn!("Access request from {} but no administrators are configured", user.id);
            return outcome;
        }

        outcome.with_effect(Effect::Notify {
            recipients: admins,
            reply: Reply::text(DefaultAdminView::access_request(
                user.id,
                &user.name,
                user.username.as_deref(),
            ))
            .with_keyboard(admin::access_request_keyboard(user.id)),
        })
    }

    async fn admin(&self, user: &UserRef, action: Action) -> Result<Outcome, CourseError> {
        let text = |t: String| -> Result<Outcome, CourseError> {
            Ok(Outcome::reply(Reply::text(t)))
        };
        match action {
            Action::AdminPanel => {
                let (granted, admins) = self.access.counts().await;
                Ok(Outcome::reply(
                    Reply::text(DefaultAdminView::panel(granted, admins))
                        .with_keyboard(admin::panel_keyboard()),
                ))
            }
            Action::ListUsers(page) => Ok(self.users_page(page).await),
            Action::Grant { user: target, note } => {
                let newly = self.access.grant(target, user.id, &note).await;
                let outcome = Outcome::reply(Reply::text(DefaultAdminView::granted(target, newly)));
                if !newly {
                    return Ok(outcome);
                }
                Ok(outcome.with_effect(Effect::Notify {
                    recipients: vec![target],
                    reply: Reply::text(DefaultAdminView::access_opened()),
                }))
            }
            Action::Revoke(target) => {
                text(DefaultAdminView::revoked(target, self.access.revoke(target).await))
            }
            Action::AddAdmin(target) => {
                text(DefaultAdminView::admin_added(target, self.access.add_admin(target).await))
            }
            Action::RemoveAdmin(target) => {
                let removed = self.access.remove_admin(target).await?;
                text(DefaultAdminView::admin_removed(target, removed))
            }
            Action::BroadcastPrompt => Ok(Outcome::reply(
                Reply::text(DefaultAdminView::broadcast_prompt())
                    .with_keyboard(views::cancel_keyboard()),
            )
            .with_effect(Effect::AwaitInput(PendingInput::Broadcast))),
            Action::Broadcast(message) => {
                let recipients = self.access.granted_ids().await;
                info!("Admin {} broadcasts to {} users", user.id, recipients.len());
                let outcome = Outcome::reply(
                    Reply::text(DefaultAdminView::broadcast_queued(recipients.len()))
                        .with_keyboard(self.main_keyboard(user.id).await),
                );
                if recipients.is_empty() {
                    return Ok(outcome);
                }
                Ok(outcome.with_effect(Effect::Broadcast {
                    recipients,
                    text: DefaultAdminView::broadcast_message(&message),
                }))
            }
            Action::Status => text(DefaultAdminView::status(&self.status().await?)),
            other => {
                warn!("Unhandled admin action {other:?}");
                Ok(self.help(user).await)
            }
        }
    }

    async fn users_page(&self, page: usize) -> Outcome {
        let all = self.access.list_granted().await;
        let pages = all.len().div_ceil(self.page_size).max(1);
        let page = page.min(pages - 1);
        let slice: Vec<_> = all
            .iter()
            .skip(page * self.page_size)
            .take(self.page_size)
            .cloned()
            .collect();

        Outcome::reply(
            Reply::text(DefaultAdminView::users_page(&slice, page, pages, all.len()))
                .with_keyboard(admin::users_keyboard(&slice, page, pages)),
        )
    }

    /// Current runtime status
    ///
    /// # Errors
    ///
    /// Returns an error if the progress store cannot be read.
    pub async fn status(&self) -> Result<StatusSnapshot, CourseError> {
        let (granted, admins) = self.access.counts().await;
        Ok(StatusSnapshot {
            granted,
            admins,
            modules: self.course.module_count(),
            questions: self.course.question_count(),
            learners: self.tracker.learner_count().await?,
            restarts: self.stats.restarts(),
            feedback: self.stats.feedback(),
            silenced_denials: self.denials.as_ref().map_or(0, |c| c.silenced_count()),
            access_control: self.access.is_enforced(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryProgressStore, MemoryAccessBackend};

    const ADMIN: i64 = 1;
    const LEARNER: i64 = 42;
    const STRANGER: i64 = 99;

    async fn engine() -> CourseEngine {
        let access =
            AccessStore::open(Arc::new(MemoryAccessBackend::default()), &[ADMIN], true).await;
        access.grant(LEARNER, ADMIN, "alice").await;
        CourseEngine::new(
            Arc::new(Course::builtin()),
            Arc::new(access),
            Arc::new(InMemoryProgressStore::new()),
        )
    }

    fn user(id: i64) -> UserRef {
        UserRef::new(id, "Test")
    }

    fn inline_tokens(outcome: &Outcome) -> Vec<String> {
        outcome
            .replies
            .iter()
            .filter_map(|r| r.keyboard.as_ref())
            .flat_map(|k| k.callback_data().into_iter().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_learner_actions_need_access() {
        let engine = engine().await;
        let err = engine.handle(&user(STRANGER), Action::OpenModule(0)).await;
        assert!(matches!(err, Err(CourseError::AccessDenied(STRANGER))));
    }

    #[tokio::test]
    async fn test_open_actions_work_without_access() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine.handle(&user(STRANGER), Action::MyId).await?;
        assert!(out.first_text().is_some_and(|t| t.contains("99")));

        let out = engine.handle(&user(STRANGER), Action::Healthcheck).await?;
        assert_eq!(out.first_text(), Some("OK"));

        let start = engine.handle(&user(STRANGER), Action::Start).await?;
        assert!(inline_tokens(&start).contains(&callbacks::REQUEST_ACCESS.to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_actions_for_learner_are_refused_politely() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine.handle(&user(LEARNER), Action::Status).await?;
        assert_eq!(out.first_text(), Some(DefaultAdminView::admin_only()));
        assert!(matches!(
            engine.handle(&user(STRANGER), Action::Status).await,
            Err(CourseError::AccessDenied(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_module_by_number_out_of_range() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine.handle(&user(LEARNER), Action::ModuleByNumber(9)).await?;
        assert_eq!(
            out.first_text(),
            Some(DefaultCourseView::module_not_found(9, 5).as_str())
        );
        let out = engine.handle(&user(LEARNER), Action::ModuleByNumber(2)).await?;
        assert!(inline_tokens(&out).contains(&"complete_1".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_next_at_last_module_reports_boundary() -> Result<(), CourseError> {
        let engine = engine().await;
        engine.handle(&user(LEARNER), Action::OpenModule(4)).await?;
        let out = engine.handle(&user(LEARNER), Action::NextModule(4)).await?;
        assert_eq!(
            out.first_text(),
            Some(DefaultCourseView::boundary_notice(crate::course::Boundary::Last))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_quiz_gate_is_advisory() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine.handle(&user(LEARNER), Action::StartQuiz).await?;
        assert!(inline_tokens(&out).contains(&callbacks::QUIZ_FORCE.to_string()));

        let out = engine.handle(&user(LEARNER), Action::StartQuizAnyway).await?;
        assert!(out.first_text().is_some_and(|t| t.contains("Вопрос 1 из 5")));
        Ok(())
    }

    #[tokio::test]
    async fn test_answer_without_quiz_offers_start() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine
            .handle(&user(LEARNER), Action::AnswerQuiz("а".into()))
            .await?;
        assert_eq!(out.first_text(), Some(DefaultCourseView::quiz_not_started()));
        assert!(inline_tokens(&out).contains(&callbacks::QUIZ_FORCE.to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_feedback_flow() -> Result<(), CourseError> {
        let engine = engine().await;
        let prompt = engine.handle(&user(LEARNER), Action::LeaveFeedback).await?;
        assert_eq!(
            prompt.effect,
            Some(Effect::AwaitInput(PendingInput::Feedback))
        );

        let thanks = engine
            .handle(&user(LEARNER), Action::SubmitFeedback("Спасибо!".into()))
            .await?;
        assert_eq!(thanks.first_text(), Some(DefaultCourseView::feedback_thanks()));
        assert_eq!(engine.stats().feedback(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_request_access_notifies_admins() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine.handle(&user(STRANGER), Action::RequestAccess).await?;
        let Some(Effect::Notify { recipients, reply }) = out.effect else {
            panic!("expected a notification");
        };
        assert_eq!(recipients, vec![ADMIN]);
        assert_eq!(
            reply.keyboard.map(|k| k.callback_data().iter().map(|s| s.to_string()).collect::<Vec<_>>()),
            Some(vec![format!("grant_{STRANGER}")])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_grant_notifies_learner_once() -> Result<(), CourseError> {
        let engine = engine().await;
        let grant = Action::Grant {
            user: STRANGER,
            note: String::new(),
        };
        let first = engine.handle(&user(ADMIN), grant.clone()).await?;
        assert!(matches!(first.effect, Some(Effect::Notify { ref recipients, .. }) if recipients == &vec![STRANGER]));
        assert!(engine.access().has_access(STRANGER).await);

        let second = engine.handle(&user(ADMIN), grant).await?;
        assert!(second.effect.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_removing_last_admin_is_refused() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine.handle(&user(ADMIN), Action::RemoveAdmin(ADMIN)).await?;
        assert_eq!(out.first_text(), Some(DefaultAdminView::last_admin()));
        assert!(engine.access().is_admin(ADMIN).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_broadcast_targets_granted_users() -> Result<(), CourseError> {
        let engine = engine().await;
        let out = engine
            .handle(&user(ADMIN), Action::Broadcast("Вебинар в 19:00".into()))
            .await?;
        let Some(Effect::Broadcast { recipients, text }) = out.effect else {
            panic!("expected a broadcast");
        };
        assert_eq!(recipients, vec![LEARNER]);
        assert!(text.contains("Вебинар в 19:00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_disabled_features_fall_back_to_help() -> Result<(), CourseError> {
        let engine = engine().await.with_features(Features {
            audio: false,
            quiz: false,
            admin_panel: false,
        });
        let help = engine.handle(&user(LEARNER), Action::Help).await?;
        for action in [Action::StartQuiz, Action::ListenAudio(0)] {
            assert_eq!(engine.handle(&user(LEARNER), action).await?, help);
        }
        let admin_help = engine.handle(&user(ADMIN), Action::Help).await?;
        assert_eq!(engine.handle(&user(ADMIN), Action::Status).await?, admin_help);
        Ok(())
    }

    #[tokio::test]
    async fn test_users_page_is_capped() -> Result<(), CourseError> {
        let engine = engine().await.with_page_size(2);
        for id in 100..105 {
            engine.access().grant(id, ADMIN, "").await;
        }
        let out = engine.handle(&user(ADMIN), Action::ListUsers(0)).await?;
        let revokes = inline_tokens(&out)
            .into_iter()
            .filter(|t| t.starts_with("revoke_"))
            .count();
        assert_eq!(revokes, 2);
        assert!(inline_tokens(&out).contains(&"admin_users_1".to_string()));

        // Past the end clamps to the last page
        let last = engine.handle(&user(ADMIN), Action::ListUsers(99)).await?;
        assert!(last.first_text().is_some_and(|t| t.contains("стр. 3/3")));
        Ok(())
    }

    #[tokio::test]
    async fn test_status_counts() -> Result<(), CourseError> {
        let engine = engine().await;
        engine.handle(&user(LEARNER), Action::Start).await?;
        let status = engine.status().await?;
        assert_eq!((status.granted, status.admins), (1, 1));
        assert_eq!((status.modules, status.questions), (5, 5));
        assert_eq!(status.learners, 1);
        assert!(status.access_control);
        Ok(())
    }
}
