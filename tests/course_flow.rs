use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tender_course_bot::access::AccessStore;
use tender_course_bot::bot::action::{Action, PendingInput};
use tender_course_bot::bot::reply::{Effect, Outcome};
use tender_course_bot::bot::views::course::callbacks;
use tender_course_bot::bot::{CourseEngine, UserRef};
use tender_course_bot::course::{Course, CourseError};
use tender_course_bot::storage::{JsonFileAccessBackend, JsonFileProgressStore};
use uuid::Uuid;

const ADMIN: i64 = 100;
const LEARNER: i64 = 555;

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("tender-course-flow-{}", Uuid::new_v4().as_simple()))
}

async fn engine_in(dir: &PathBuf) -> CourseEngine {
    let access = AccessStore::open(Arc::new(JsonFileAccessBackend::new(dir)), &[ADMIN], true).await;
    CourseEngine::new(
        Arc::new(Course::builtin()),
        Arc::new(access),
        Arc::new(JsonFileProgressStore::open(dir).await),
    )
}

fn learner() -> UserRef {
    UserRef {
        id: LEARNER,
        name: "Мария".to_string(),
        username: Some("maria".to_string()),
    }
}

fn admin() -> UserRef {
    UserRef::new(ADMIN, "Admin")
}

fn buttons(outcome: &Outcome) -> Vec<String> {
    outcome
        .replies
        .iter()
        .filter_map(|r| r.keyboard.as_ref())
        .flat_map(|k| k.callback_data())
        .map(str::to_string)
        .collect()
}

async fn press(engine: &CourseEngine, user: &UserRef, data: &str) -> Result<Outcome, CourseError> {
    engine.handle(user, Action::from_callback(data)).await
}

#[tokio::test]
async fn access_request_grant_and_revoke() -> Result<()> {
    let dir = scratch_dir();
    let engine = engine_in(&dir).await;

    assert!(matches!(
        press(&engine, &learner(), &callbacks::module(0)).await,
        Err(CourseError::AccessDenied(LEARNER))
    ));

    let request = press(&engine, &learner(), callbacks::REQUEST_ACCESS).await?;
    let Some(Effect::Notify { recipients, reply }) = request.effect else {
        panic!("admins were not notified");
    };
    assert_eq!(recipients, vec![ADMIN]);
    let grant_button = reply
        .keyboard
        .as_ref()
        .and_then(|k| k.callback_data().first().map(|s| (*s).to_string()))
        .unwrap_or_default();
    assert!(reply.as_text().is_some_and(|t| t.contains("@maria")));

    // The admin presses the button attached to the request
    let granted = press(&engine, &admin(), &grant_button).await?;
    assert!(matches!(granted.effect, Some(Effect::Notify { .. })));

    let module = press(&engine, &learner(), &callbacks::module(0)).await?;
    assert!(buttons(&module).contains(&callbacks::complete(0)));

    press(&engine, &admin(), &callbacks::revoke(LEARNER)).await?;
    assert!(matches!(
        press(&engine, &learner(), &callbacks::next(0)).await,
        Err(CourseError::AccessDenied(LEARNER))
    ));

    // Grants survive a restart
    engine.access().grant(LEARNER, ADMIN, "курс").await;
    let reopened = engine_in(&dir).await;
    assert!(reopened.access().has_access(LEARNER).await);
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[tokio::test]
async fn full_course_then_quiz() -> Result<()> {
    let dir = scratch_dir();
    let engine = engine_in(&dir).await;
    engine.access().grant(LEARNER, ADMIN, "").await;
    let user = learner();

    let start = engine.handle(&user, Action::Start).await?;
    assert_eq!(start.replies.len(), 2);
    assert!(buttons(&start).contains(&callbacks::module(4)));

    let count = engine.course().module_count();
    let mut last = Outcome::default();
    for index in 0..count {
        press(&engine, &user, &callbacks::module(index)).await?;
        last = press(&engine, &user, &callbacks::complete(index)).await?;
    }
    assert!(buttons(&last).contains(&callbacks::QUIZ_START.to_string()));

    // All modules done: the quiz opens without the warning
    let mut step = press(&engine, &user, callbacks::QUIZ_START).await?;
    let answers: Vec<String> = engine
        .course()
        .questions
        .iter()
        .map(|q| q.correct.clone())
        .collect();
    for letter in &answers {
        assert!(buttons(&step).contains(&callbacks::quiz_answer(letter)));
        step = press(&engine, &user, &callbacks::quiz_answer(letter)).await?;
    }
    assert!(buttons(&step).contains(&callbacks::QUIZ_FORCE.to_string()));

    let summary = engine.tracker().summary(LEARNER).await?;
    assert_eq!(summary.completed, count);
    assert_eq!(summary.quiz_attempts, 1);
    assert_eq!(
        summary.best_quiz.map(|r| r.correct_count),
        Some(answers.len())
    );

    // Progress is read back from disk by a fresh engine
    let reopened = engine_in(&dir).await;
    assert!(reopened.tracker().all_completed(LEARNER).await?);
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[tokio::test]
async fn feedback_is_captured_from_the_next_message() -> Result<()> {
    let dir = scratch_dir();
    let engine = engine_in(&dir).await;
    engine.access().grant(LEARNER, ADMIN, "").await;

    let prompt = press(&engine, &learner(), callbacks::FEEDBACK).await?;
    let Some(Effect::AwaitInput(pending)) = prompt.effect else {
        panic!("feedback prompt should wait for input");
    };
    assert_eq!(pending, PendingInput::Feedback);

    let action = Action::from_text("Очень полезный курс", Some(pending));
    engine.handle(&learner(), action).await?;
    assert_eq!(engine.stats().feedback(), 1);

    // Without pending input the same text is not feedback
    let action = Action::from_text("Очень полезный курс", None);
    assert_eq!(action, Action::Unknown);
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[tokio::test]
async fn admin_broadcast_reaches_granted_users_only() -> Result<()> {
    let dir = scratch_dir();
    let engine = engine_in(&dir).await;
    for id in [1, 2, 3] {
        engine.access().grant(id, ADMIN, "").await;
    }
    engine.access().revoke(2).await;

    let prompt = press(&engine, &admin(), callbacks::ADMIN_BROADCAST).await?;
    assert_eq!(
        prompt.effect,
        Some(Effect::AwaitInput(PendingInput::Broadcast))
    );

    let action = Action::from_text("Завтра вебинар", Some(PendingInput::Broadcast));
    let out = engine.handle(&admin(), action).await?;
    let Some(Effect::Broadcast { recipients, .. }) = out.effect else {
        panic!("expected a broadcast effect");
    };
    assert_eq!(recipients, vec![1, 3]);
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[tokio::test]
async fn older_next_button_steps_from_its_own_module() -> Result<()> {
    let dir = scratch_dir();
    let engine = engine_in(&dir).await;
    engine.access().grant(LEARNER, ADMIN, "").await;
    let user = learner();

    let first = press(&engine, &user, &callbacks::module(0)).await?;
    let next_under_first = buttons(&first)
        .into_iter()
        .find(|data| data.starts_with("next_"))
        .unwrap_or_default();
    assert_eq!(next_under_first, callbacks::next(0));

    press(&engine, &user, &callbacks::module(3)).await?;

    // Scrolling back up the chat and pressing the first message's button
    let stepped = press(&engine, &user, &next_under_first).await?;
    assert!(buttons(&stepped).contains(&callbacks::complete(1)));
    assert!(stepped
        .first_text()
        .is_some_and(|t| t.contains("День 2")));
    let progress = engine.tracker().progress(LEARNER).await?;
    assert_eq!(progress.map(|p| p.last_module), Some(1));

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
