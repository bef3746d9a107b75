//! Per-user progress tracking and course navigation
//!
//! Every operation is load → mutate → upsert against the injected
//! [`ProgressStore`]. Records are created lazily on first touch.

use super::catalog::{Course, Module};
use super::error::CourseError;
use super::progress::{QuizResult, UserProgress};
use super::quiz::QuizStep;
use crate::storage::ProgressStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Navigation bound that was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Already at the first module
    First,
    /// Already at the last module
    Last,
}

/// Result of a relative navigation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Module the user is on after the step
    pub module: Module,
    /// Set when the step was clamped
    pub boundary: Option<Boundary>,
}

/// Result of marking a module complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionResult {
    /// False when the module was already completed
    pub newly_completed: bool,
    /// True when every module is now completed
    pub course_complete: bool,
}

/// Aggregate numbers for the progress page
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    /// Completed modules
    pub completed: usize,
    /// Modules in the course
    pub total: usize,
    /// `completed / total * 100`
    pub percentage: f64,
    /// Number of archived quiz attempts
    pub quiz_attempts: usize,
    /// Best attempt so far
    pub best_quiz: Option<QuizResult>,
}

/// Tracks learners over a progress store
pub struct ProgressTracker {
    course: Arc<Course>,
    store: Arc<dyn ProgressStore>,
}

impl ProgressTracker {
    /// Create a tracker for `course`
    #[must_use]
    pub fn new(course: Arc<Course>, store: Arc<dyn ProgressStore>) -> Self {
        Self { course, store }
    }

    /// The course being tracked
    #[must_use]
    pub fn course(&self) -> &Course {
        &self.course
    }

    async fn load(&self, user_id: i64) -> Result<UserProgress, CourseError> {
        Ok(self
            .store
            .get(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::new(user_id, None)))
    }

    async fn save(&self, progress: UserProgress) {
        let user_id = progress.user_id;
        if let Err(e) = self.store.upsert(progress).await {
            // The store keeps its in-memory copy; only durability is lost
            warn!("Failed to persist progress for user {user_id}: {e}");
        }
    }

    fn module_at(&self, index: usize) -> Result<&Module, CourseError> {
        self.course.module(index).ok_or(CourseError::OutOfRange {
            index,
            count: self.course.module_count(),
        })
    }

    /// Existing record, or a fresh one started now
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn start_or_resume(
        &self,
        user_id: i64,
        name: Option<&str>,
    ) -> Result<UserProgress, CourseError> {
        if let Some(existing) = self.store.get(user_id).await? {
            return Ok(existing);
        }
        info!("Starting course for user {user_id}");
        let progress = UserProgress::new(user_id, name.map(str::to_string));
        self.save(progress.clone()).await;
        Ok(progress)
    }

    /// Stored record without creating one
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn progress(&self, user_id: i64) -> Result<Option<UserProgress>, CourseError> {
        Ok(self.store.get(user_id).await?)
    }

    /// Show the module at 0-based `index` and remember it as the last viewed
    ///
    /// # Errors
    ///
    /// `OutOfRange` when `index` is not a module.
    pub async fn view_module(&self, user_id: i64, index: usize) -> Result<Module, CourseError> {
        let module = self.module_at(index)?.clone();
        let mut progress = self.load(user_id).await?;
        progress.last_module = index;
        self.save(progress).await;
        debug!("User {user_id} viewing module {}", module.number());
        Ok(module)
    }

    /// Step one module forward from the module at 0-based `from`, saturating
    /// at the last one. The step is relative to `from`, not to the module the
    /// user viewed last, so a button under an older message stays correct.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn next_module(&self, user_id: i64, from: usize) -> Result<Navigation, CourseError> {
        self.step(user_id, from, true).await
    }

    /// Step one module back from the module at 0-based `from`, saturating at
    /// the first one
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn previous_module(
        &self,
        user_id: i64,
        from: usize,
    ) -> Result<Navigation, CourseError> {
        self.step(user_id, from, false).await
    }

    async fn step(
        &self,
        user_id: i64,
        from: usize,
        forward: bool,
    ) -> Result<Navigation, CourseError> {
        let mut progress = self.load(user_id).await?;
        let last = self.course.module_count().saturating_sub(1);
        let current = from.min(last);

        let (index, boundary) = match (forward, current) {
            (true, c) if c >= last => (last, Some(Boundary::Last)),
            (true, c) => (c + 1, None),
            (false, 0) => (0, Some(Boundary::First)),
            (false, c) => (c - 1, None),
        };

        progress.last_module = index;
        self.save(progress).await;

        Ok(Navigation {
            module: self.module_at(index)?.clone(),
            boundary,
        })
    }

    /// Mark the module at 0-based `index` completed. Idempotent.
    ///
    /// # Errors
    ///
    /// `OutOfRange` when `index` is not a module.
    pub async fn complete_module(
        &self,
        user_id: i64,
        index: usize,
    ) -> Result<CompletionResult, CourseError> {
        self.module_at(index)?;
        let mut progress = self.load(user_id).await?;
        let newly_completed = progress.completed_modules.insert(index + 1);
        let course_complete =
            progress.completed_count(self.course.module_count()) == self.course.module_count();

        if newly_completed {
            info!("User {user_id} completed module {}", index + 1);
            self.save(progress).await;
        }

        Ok(CompletionResult {
            newly_completed,
            course_complete,
        })
    }

    /// Mark every module completed
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn mark_all_complete(&self, user_id: i64) -> Result<(), CourseError> {
        let mut progress = self.load(user_id).await?;
        progress.completed_modules = (1..=self.course.module_count()).collect();
        info!("User {user_id} marked all modules completed");
        self.save(progress).await;
        Ok(())
    }

    /// Record that the audio of module `index` was played and return its reference
    ///
    /// # Errors
    ///
    /// `OutOfRange` when `index` is not a module.
    pub async fn listen_audio(
        &self,
        user_id: i64,
        index: usize,
    ) -> Result<Option<String>, CourseError> {
        let Some(audio) = self.module_at(index)?.audio.clone() else {
            return Ok(None);
        };
        let mut progress = self.load(user_id).await?;
        if progress.audio_listened.insert(index + 1) {
            self.save(progress).await;
        }
        Ok(Some(audio))
    }

    /// Numbers for the progress page
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn summary(&self, user_id: i64) -> Result<ProgressSummary, CourseError> {
        let progress = self.load(user_id).await?;
        let total = self.course.module_count();
        let completed = progress.completed_count(total);
        #[allow(clippy::cast_precision_loss)]
        let percentage = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Ok(ProgressSummary {
            completed,
            total,
            percentage,
            quiz_attempts: progress.quiz_attempts.len(),
            best_quiz: progress.best_attempt().cloned(),
        })
    }

    /// Whether every module is completed
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn all_completed(&self, user_id: i64) -> Result<bool, CourseError> {
        let total = self.course.module_count();
        Ok(self.load(user_id).await?.completed_count(total) == total)
    }

    /// Begin a fresh quiz run; returns the first question index
    ///
    /// # Errors
    ///
    /// `OutOfRange` when the course has no questions.
    pub async fn start_quiz(&self, user_id: i64) -> Result<usize, CourseError> {
        if self.course.question_count() == 0 {
            return Err(CourseError::OutOfRange { index: 0, count: 0 });
        }
        let mut progress = self.load(user_id).await?;
        progress.quiz.start();
        info!("User {user_id} started the quiz");
        self.save(progress).await;
        Ok(0)
    }

    /// Question the user is on, if a run is active
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn current_question(&self, user_id: i64) -> Result<Option<usize>, CourseError> {
        Ok(self.load(user_id).await?.quiz.current_question())
    }

    /// Answer the current question with `letter`
    ///
    /// # Errors
    ///
    /// `QuizNotStarted` or `InvalidAnswer`.
    pub async fn answer_current(&self, user_id: i64, letter: &str) -> Result<QuizStep, CourseError> {
        self.advance(user_id, Some(letter)).await
    }

    /// Skip the current question
    ///
    /// # Errors
    ///
    /// `QuizNotStarted`.
    pub async fn skip_current(&self, user_id: i64) -> Result<QuizStep, CourseError> {
        self.advance(user_id, None).await
    }

    async fn advance(&self, user_id: i64, letter: Option<&str>) -> Result<QuizStep, CourseError> {
        let mut progress = self.load(user_id).await?;
        let step = progress.quiz.answer(&self.course.questions, letter)?;
        if let QuizStep::Finished(result) = &step {
            info!(
                "User {user_id} finished the quiz: {}/{}",
                result.correct_count, result.total_count
            );
            progress.quiz_attempts.push(result.clone());
        }
        self.save(progress).await;
        Ok(step)
    }

    /// Score the active run now; unanswered questions count as incorrect
    ///
    /// # Errors
    ///
    /// `QuizNotStarted`.
    pub async fn finish_early(&self, user_id: i64) -> Result<QuizResult, CourseError> {
        let mut progress = self.load(user_id).await?;
        let result = progress.quiz.finish(&self.course.questions)?;
        info!(
            "User {user_id} finished the quiz early: {}/{}",
            result.correct_count, result.total_count
        );
        progress.quiz_attempts.push(result.clone());
        self.save(progress).await;
        Ok(result)
    }

    /// Number of tracked learners
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn learner_count(&self) -> Result<usize, CourseError> {
        Ok(self.store.count().await?)
    }
}
