//! Learner-facing texts and keyboards
//!
//! Contains callback tokens, reply-keyboard labels, page texts and button
//! layouts for the course itself.

use crate::bot::action::CommandHint;
use crate::bot::reply::{Button, Keyboard};
use crate::config::Features;
use crate::course::{
    Boundary, Course, Module, ProgressSummary, QuizQuestion, QuizResult, UserProgress,
};
use crate::utils::{escape_html, truncate_str};
use std::fmt::Write;

// ─────────────────────────────────────────────────────────────────────────────
// Callback and label constants
// ─────────────────────────────────────────────────────────────────────────────

/// Inline-button callback data
pub mod callbacks {
    /// Module menu
    pub const MENU: &str = "menu";
    /// Progress page
    pub const PROGRESS: &str = "progress";
    /// Mark every module complete
    pub const COMPLETE_ALL: &str = "complete_all";
    /// Start the quiz
    pub const QUIZ_START: &str = "quiz_start";
    /// Start the quiz despite unfinished modules
    pub const QUIZ_FORCE: &str = "quiz_force";
    /// Skip the current question
    pub const QUIZ_SKIP: &str = "quiz_skip";
    /// Score the quiz now
    pub const QUIZ_FINISH: &str = "quiz_finish";
    /// Links page
    pub const LINKS: &str = "links";
    /// Contacts page
    pub const CONTACTS: &str = "contacts";
    /// About page
    pub const ABOUT: &str = "about";
    /// Help page
    pub const HELP: &str = "help";
    /// Leave feedback
    pub const FEEDBACK: &str = "feedback";
    /// Ask admins for access
    pub const REQUEST_ACCESS: &str = "request_access";
    /// Admin panel
    pub const ADMIN: &str = "admin";
    /// First page of granted users
    pub const ADMIN_USERS: &str = "admin_users";
    /// Broadcast prompt
    pub const ADMIN_BROADCAST: &str = "admin_broadcast";
    /// Status page
    pub const ADMIN_STATUS: &str = "admin_status";
    /// Abandon pending input
    pub const CANCEL: &str = "cancel";

    /// Open module at 0-based `index`
    #[must_use]
    pub fn module(index: usize) -> String {
        format!("module_{index}")
    }

    /// Step forward from the module at 0-based `index`
    #[must_use]
    pub fn next(index: usize) -> String {
        format!("next_{index}")
    }

    /// Step back from the module at 0-based `index`
    #[must_use]
    pub fn prev(index: usize) -> String {
        format!("prev_{index}")
    }

    /// Complete module at 0-based `index`
    #[must_use]
    pub fn complete(index: usize) -> String {
        format!("complete_{index}")
    }

    /// Audio of module at 0-based `index`
    #[must_use]
    pub fn audio(index: usize) -> String {
        format!("audio_{index}")
    }

    /// Answer the current question with `letter`
    #[must_use]
    pub fn quiz_answer(letter: &str) -> String {
        format!("quiz_answer_{letter}")
    }

    /// Page of granted users
    #[must_use]
    pub fn users_page(page: usize) -> String {
        format!("admin_users_{page}")
    }

    /// Grant access to `user_id`
    #[must_use]
    pub fn grant(user_id: i64) -> String {
        format!("grant_{user_id}")
    }

    /// Revoke access of `user_id`
    #[must_use]
    pub fn revoke(user_id: i64) -> String {
        format!("revoke_{user_id}")
    }
}

/// Reply-keyboard labels
pub mod labels {
    /// Module menu
    pub const COURSE: &str = "📚 Курс";
    /// Progress page
    pub const PROGRESS: &str = "📊 Мой прогресс";
    /// Start the quiz
    pub const QUIZ: &str = "📝 Тест";
    /// Links page
    pub const LINKS: &str = "🔗 Ссылки";
    /// Contacts page
    pub const CONTACTS: &str = "📞 Контакты";
    /// Help page
    pub const HELP: &str = "🆘 Помощь";
    /// Admin panel
    pub const ADMIN: &str = "🛠 Админ-панель";
    /// Abandon pending input
    pub const CANCEL: &str = "❌ Отмена";
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Texts shown to learners
pub trait CourseView {
    /// Greeting on /start
    fn welcome(name: &str, course: &Course) -> String;
    /// Command list and support contacts
    fn help(course: &Course, features: Features, is_admin: bool) -> String;
    /// Header above the module menu
    fn menu_header() -> &'static str;
    /// Module page
    fn module_page(module: &Module) -> String;
    /// Prefix when navigation hit a bound
    fn boundary_notice(boundary: Boundary) -> &'static str;
    /// Reply to `/module N` outside the course
    fn module_not_found(number: u32, count: usize) -> String;
    /// Module marked complete
    fn module_completed(number: usize, course_complete: bool) -> String;
    /// Module was already complete
    fn module_already_completed(number: usize) -> String;
    /// Every module marked complete
    fn all_completed() -> &'static str;
    /// Progress page
    fn progress_page(course: &Course, progress: &UserProgress, summary: &ProgressSummary)
        -> String;
    /// Caption of a module's audio
    fn audio_caption(module: &Module) -> String;
    /// Module has no audio
    fn no_audio() -> &'static str;
    /// Links page
    fn links_page(course: &Course) -> String;
    /// Contacts page
    fn contacts_page(course: &Course) -> String;
    /// About page
    fn about_page(course: &Course) -> String;
    /// Feedback prompt
    fn feedback_prompt() -> &'static str;
    /// Feedback received
    fn feedback_thanks() -> &'static str;
    /// Warning before the quiz when modules are unfinished
    fn quiz_gate(completed: usize, total: usize) -> String;
    /// Question page
    fn quiz_question(question: &QuizQuestion, index: usize, total: usize) -> String;
    /// Scored attempt
    fn quiz_result(questions: &[QuizQuestion], result: &QuizResult) -> String;
    /// Answer or skip without an active run
    fn quiz_not_started() -> &'static str;
    /// Letter not among the options
    fn quiz_invalid_answer(letter: &str) -> String;
    /// Course has no questions
    fn quiz_empty() -> &'static str;
    /// Denial text for users without access
    fn access_denied() -> &'static str;
    /// Access request forwarded
    fn access_requested() -> &'static str;
    /// Request from someone who already has access
    fn access_already_granted() -> &'static str;
    /// User's own id
    fn my_id(user_id: i64) -> String;
    /// Pending input abandoned
    fn cancelled() -> &'static str;
    /// Malformed command argument
    fn usage(hint: CommandHint) -> &'static str;
    /// Unexpected internal failure
    fn internal_error() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default Russian-language implementation of `CourseView`
pub struct DefaultCourseView;

impl CourseView for DefaultCourseView {
    fn welcome(name: &str, course: &Course) -> String {
        format!(
            "<b>👋 Привет, {}!</b>\n\n\
             Добро пожаловать на <b>Экспресс-курс: \"{}\"</b>!\n\n\
             📅 <b>Формат:</b> {} модулей, 1 модуль в день + практические задания\n\
             👥 <b>Уровень:</b> Начинающий → Практик\n\n\
             <b>Выберите действие:</b>",
            escape_html(name),
            escape_html(&course.title),
            course.module_count()
        )
    }

    fn help(course: &Course, features: Features, is_admin: bool) -> String {
        let mut text = String::from(
            "<b>🆘 Помощь по использованию бота:</b>\n\n\
             <b>Основные команды:</b>\n\
             /start - Начать работу с ботом\n\
             /help - Получить справку\n\
             /menu - Открыть главное меню\n\
             /progress - Посмотреть свой прогресс\n\
             /module [номер] - Перейти к конкретному модулю\n",
        );
        if features.quiz {
            text.push_str("/quiz - Пройти итоговый тест\n");
        }
        text.push_str(
            "/feedback - Оставить отзыв\n\
             /myid - Узнать свой ID\n\
             /request - Запросить доступ к курсу\n",
        );
        if is_admin && features.admin_panel {
            text.push_str(
                "\n<b>Администрирование:</b>\n\
                 /admin - Админ-панель\n\
                 /grant ID [имя] - Выдать доступ\n\
                 /revoke ID - Отозвать доступ\n\
                 /users - Список пользователей\n\
                 /broadcast текст - Рассылка\n\
                 /status - Состояние бота\n",
            );
        }
        let _ = write!(
            text,
            "\n<b>Навигация:</b>\n\
             • Кнопки \"Вперед\"/\"Назад\" переключают модули\n\
             • \"Меню курса\" - выбор любого модуля\n\
             • \"Отметить пройденным\" - завершить текущий модуль\n\n\
             <b>Техническая поддержка:</b>\n\
             По всем вопросам пишите на: {}\n\
             Или звоните: {}",
            course.contacts.email, course.contacts.phone
        );
        text
    }

    fn menu_header() -> &'static str {
        "<b>📋 Выберите модуль для изучения:</b>"
    }

    fn module_page(module: &Module) -> String {
        format!(
            "{} <b>День {}: {}</b>\n\n{}\n\n<b>📝 Практическое задание:</b> {}",
            module.emoji, module.day, module.title, module.body, module.task
        )
    }

    fn boundary_notice(boundary: Boundary) -> &'static str {
        match boundary {
            Boundary::First => "ℹ️ Это первый модуль курса.",
            Boundary::Last => "ℹ️ Это последний модуль курса.",
        }
    }

    fn module_not_found(number: u32, count: usize) -> String {
        format!("❌ Модуль {number} не найден. Доступные модули: 1-{count}")
    }

    fn module_completed(number: usize, course_complete: bool) -> String {
        if course_complete {
            format!(
                "✅ Модуль {number} отмечен как пройденный!\n\n\
                 🎓 <b>Все модули пройдены!</b> Самое время проверить знания в итоговом тесте."
            )
        } else {
            format!("✅ Модуль {number} отмечен как пройденный!")
        }
    }

    fn module_already_completed(number: usize) -> String {
        format!("ℹ️ Модуль {number} уже пройден")
    }

    fn all_completed() -> &'static str {
        "✅ Все модули отмечены как пройденные."
    }

    fn progress_page(
        course: &Course,
        progress: &UserProgress,
        summary: &ProgressSummary,
    ) -> String {
        let mut text = format!(
            "<b>📊 Ваш прогресс:</b>\n\n\
             🎓 <b>Пройдено модулей:</b> {}/{} ({:.1}%)\n\
             📅 <b>Дата начала:</b> {}\n\
             👤 <b>Имя:</b> {}\n\n<b>Модули:</b>\n",
            summary.completed,
            summary.total,
            summary.percentage,
            progress.started_at.format("%Y-%m-%d"),
            progress
                .name
                .as_deref()
                .map_or_else(|| "Не указано".to_string(), escape_html),
        );

        for module in &course.modules {
            let status = if progress.is_completed(module.index) {
                "✅"
            } else {
                "⏳"
            };
            let audio = if progress.audio_listened.contains(&module.number()) {
                " 🎧"
            } else {
                ""
            };
            let _ = writeln!(
                text,
                "{status} День {}: {}{audio}",
                module.day, module.title
            );
        }

        if let Some(best) = &summary.best_quiz {
            let _ = write!(
                text,
                "\n<b>📝 Итоговый тест:</b> лучший результат {}/{} ({:.0}%), попыток: {}\n",
                best.correct_count, best.total_count, best.percentage, summary.quiz_attempts
            );
        }

        text.push_str("\n<b>Продолжайте в том же духе! 💪</b>");
        text
    }

    fn audio_caption(module: &Module) -> String {
        format!("🎧 День {}: {}", module.day, module.title)
    }

    fn no_audio() -> &'static str {
        "ℹ️ Для этого модуля аудиоверсия пока не записана."
    }

    fn links_page(course: &Course) -> String {
        let mut text = String::from("<b>🔗 Полезные ссылки:</b>\n\n");
        for link in &course.links {
            let _ = writeln!(
                text,
                "• <a href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(&link.url),
                escape_html(&link.name)
            );
        }
        text
    }

    fn contacts_page(course: &Course) -> String {
        let c = &course.contacts;
        let mut text = format!(
            "<b>📞 Контакты для связи:</b>\n\n\
             📧 <b>Email:</b> {}\n\
             📱 <b>Телефон:</b> {}\n",
            c.email, c.phone
        );
        if !c.mobile.is_empty() {
            let _ = writeln!(text, "📲 <b>Мобильный:</b> {}", c.mobile);
        }
        if !c.site.is_empty() {
            let _ = writeln!(text, "\n🌐 <b>Сайт:</b> {}", c.site);
        }
        text.push_str(
            "\n<b>📅 Часы работы поддержки:</b>\n\
             Пн-Пт: 9:00-18:00\n\
             Сб-Вс: выходной",
        );
        text
    }

    fn about_page(course: &Course) -> String {
        format!(
            "<b>ℹ️ О курсе \"{}\":</b>\n\n{}",
            escape_html(&course.title),
            course.about
        )
    }

    fn feedback_prompt() -> &'static str {
        "📝 Пожалуйста, напишите ваш отзыв о курсе:\n\n\
         • Что понравилось?\n\
         • Что можно улучшить?\n\
         • Ваши пожелания\n\n\
         <i>Отзыв будет отправлен разработчикам курса</i>"
    }

    fn feedback_thanks() -> &'static str {
        "✅ Спасибо за ваш отзыв! Он очень важен для нас.\n\n\
         Мы учтем ваши пожелания для улучшения курса!"
    }

    fn quiz_gate(completed: usize, total: usize) -> String {
        format!(
            "⚠️ Вы прошли {completed} из {total} модулей.\n\n\
             Рекомендуем завершить курс перед итоговым тестом, \
             но вы можете начать его и сейчас."
        )
    }

    fn quiz_question(question: &QuizQuestion, index: usize, total: usize) -> String {
        let mut text = format!(
            "<b>❓ Вопрос {} из {}</b>\n\n{}\n\n",
            index + 1,
            total,
            escape_html(&question.prompt)
        );
        for option in &question.options {
            let _ = writeln!(
                text,
                "<b>{})</b> {}",
                escape_html(&option.letter),
                escape_html(&option.text)
            );
        }
        text
    }

    fn quiz_result(questions: &[QuizQuestion], result: &QuizResult) -> String {
        let mut text = format!(
            "<b>🏁 Тест завершён</b>\n\n\
             Правильных ответов: <b>{} из {}</b> ({:.0}%)\n",
            result.correct_count, result.total_count, result.percentage
        );
        let unanswered = result.unanswered_count();
        if unanswered > 0 {
            let _ = writeln!(text, "Без ответа: {unanswered}");
        }
        text.push('\n');

        for (i, q) in questions.iter().enumerate() {
            let chosen = result.answers.get(&q.id).cloned().flatten();
            let mark = match chosen.as_deref() {
                Some(letter) if letter == q.correct => "✅",
                Some(_) => "❌",
                None => "⏭",
            };
            let _ = writeln!(
                text,
                "{mark} Вопрос {}: правильный ответ {}",
                i + 1,
                escape_html(&q.correct)
            );
        }

        let verdict = if result.percentage >= 80.0 {
            "🎉 Отличный результат!"
        } else if result.percentage >= 50.0 {
            "👍 Неплохо! Повторите модули, где были ошибки."
        } else {
            "📚 Рекомендуем ещё раз пройти модули курса."
        };
        let _ = write!(text, "\n{verdict}");
        text
    }

    fn quiz_not_started() -> &'static str {
        "ℹ️ Тест сейчас не запущен. Начните его заново."
    }

    fn quiz_invalid_answer(letter: &str) -> String {
        format!(
            "❌ Вариант «{}» не найден. Выберите ответ кнопкой ниже.",
            escape_html(letter)
        )
    }

    fn quiz_empty() -> &'static str {
        "ℹ️ В этом курсе нет итогового теста."
    }

    fn access_denied() -> &'static str {
        "⛔️ <b>Доступ к курсу закрыт.</b>\n\n\
         Нажмите кнопку ниже или отправьте /request, чтобы запросить доступ у администратора."
    }

    fn access_requested() -> &'static str {
        "📨 Запрос отправлен администраторам. Мы сообщим, когда доступ будет открыт."
    }

    fn access_already_granted() -> &'static str {
        "✅ У вас уже есть доступ к курсу. Откройте меню: /menu"
    }

    fn my_id(user_id: i64) -> String {
        format!("🆔 Ваш Telegram ID: <code>{user_id}</code>")
    }

    fn cancelled() -> &'static str {
        "❌ Отменено."
    }

    fn usage(hint: CommandHint) -> &'static str {
        match hint {
            CommandHint::Module => "❌ Неверный формат номера модуля. Используйте: /module 1",
            CommandHint::Grant => "❌ Используйте: /grant ID [имя]",
            CommandHint::Revoke => "❌ Используйте: /revoke ID",
            CommandHint::AddAdmin => "❌ Используйте: /addadmin ID",
            CommandHint::RemoveAdmin => "❌ Используйте: /removeadmin ID",
        }
    }

    fn internal_error() -> &'static str {
        "⚠️ Что-то пошло не так. Попробуйте ещё раз чуть позже."
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// Persistent keyboard under the input field
#[must_use]
pub fn main_keyboard(is_admin: bool, features: Features) -> Keyboard {
    let mut rows = vec![vec![labels::COURSE.to_string(), labels::PROGRESS.to_string()]];
    if features.quiz {
        rows.push(vec![labels::QUIZ.to_string(), labels::HELP.to_string()]);
    } else {
        rows.push(vec![labels::HELP.to_string()]);
    }
    rows.push(vec![labels::LINKS.to_string(), labels::CONTACTS.to_string()]);
    if is_admin && features.admin_panel {
        rows.push(vec![labels::ADMIN.to_string()]);
    }
    Keyboard::Reply(rows)
}

/// Keyboard shown while free-text input is pending
#[must_use]
pub fn cancel_keyboard() -> Keyboard {
    Keyboard::Reply(vec![vec![labels::CANCEL.to_string()]])
}

/// One button per module plus the shortcut rows
#[must_use]
pub fn menu_keyboard(
    course: &Course,
    progress: Option<&UserProgress>,
    features: Features,
) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = course
        .modules
        .iter()
        .map(|m| {
            let done = progress.is_some_and(|p| p.is_completed(m.index));
            let label = format!(
                "{} День {}: {}{}",
                if done { "✅" } else { m.emoji.as_str() },
                m.day,
                truncate_str(&m.title, 20),
                if m.title.chars().count() > 20 { "..." } else { "" }
            );
            vec![Button::new(label, callbacks::module(m.index))]
        })
        .collect();

    rows.push(vec![
        Button::new("📊 Мой прогресс", callbacks::PROGRESS),
        Button::new("⭐ Оставить отзыв", callbacks::FEEDBACK),
    ]);
    if features.quiz && course.question_count() > 0 {
        rows.push(vec![Button::new("📝 Итоговый тест", callbacks::QUIZ_START)]);
    }
    rows.push(vec![
        Button::new("🆘 Помощь", callbacks::HELP),
        Button::new("ℹ️ О курсе", callbacks::ABOUT),
    ]);
    Keyboard::Inline(rows)
}

/// Buttons under a module page
#[must_use]
pub fn navigation_keyboard(
    module: &Module,
    module_count: usize,
    completed: bool,
    features: Features,
) -> Keyboard {
    let mut nav = Vec::with_capacity(3);
    if module.index > 0 {
        nav.push(Button::new("⬅️ Назад", callbacks::prev(module.index)));
    }
    nav.push(Button::new(
        format!(
            "{} {}/{}",
            if completed { "✅" } else { "📖" },
            module.number(),
            module_count
        ),
        callbacks::PROGRESS,
    ));
    if module.number() < module_count {
        nav.push(Button::new("Вперед ➡️", callbacks::next(module.index)));
    }

    let mut rows = vec![
        nav,
        vec![
            Button::new("📋 Меню курса", callbacks::MENU),
            Button::new("✅ Отметить пройденным", callbacks::complete(module.index)),
        ],
    ];
    if features.audio && module.audio.is_some() {
        rows.push(vec![Button::new("🎧 Аудиоверсия", callbacks::audio(module.index))]);
    }
    rows.push(vec![
        Button::new("🔗 Полезные ссылки", callbacks::LINKS),
        Button::new("📞 Контакты", callbacks::CONTACTS),
    ]);
    Keyboard::Inline(rows)
}

/// Answer buttons for a question
#[must_use]
pub fn quiz_question_keyboard(question: &QuizQuestion) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = question
        .options
        .iter()
        .map(|o| {
            vec![Button::new(
                format!("{}) {}", o.letter, truncate_str(&o.text, 40)),
                callbacks::quiz_answer(&o.letter),
            )]
        })
        .collect();
    rows.push(vec![
        Button::new("⏭ Пропустить", callbacks::QUIZ_SKIP),
        Button::new("🏁 Завершить", callbacks::QUIZ_FINISH),
    ]);
    Keyboard::Inline(rows)
}

/// Choice shown by the quiz completion warning
#[must_use]
pub fn quiz_gate_keyboard() -> Keyboard {
    Keyboard::Inline(vec![
        vec![Button::new("▶️ Начать всё равно", callbacks::QUIZ_FORCE)],
        vec![Button::new("📋 Вернуться к модулям", callbacks::MENU)],
    ])
}

/// Buttons under a quiz result
#[must_use]
pub fn quiz_result_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![
        Button::new("🔄 Пройти ещё раз", callbacks::QUIZ_FORCE),
        Button::new("📋 Меню курса", callbacks::MENU),
    ]])
}

/// Button under the denial text
#[must_use]
pub fn request_access_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![Button::new(
        "📨 Запросить доступ",
        callbacks::REQUEST_ACCESS,
    )]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::action::Action;

    fn every_token_classifies(keyboard: &Keyboard) {
        for data in keyboard.callback_data() {
            assert!(data.len() <= 64, "callback too long: {data}");
            assert_ne!(Action::from_callback(data), Action::Unknown, "token {data}");
        }
    }

    #[test]
    fn test_keyboards_emit_known_tokens() {
        let course = Course::builtin();
        let features = Features::default();
        every_token_classifies(&menu_keyboard(&course, None, features));
        for module in &course.modules {
            every_token_classifies(&navigation_keyboard(module, course.module_count(), false, features));
        }
        for question in &course.questions {
            every_token_classifies(&quiz_question_keyboard(question));
        }
        every_token_classifies(&quiz_gate_keyboard());
        every_token_classifies(&quiz_result_keyboard());
        every_token_classifies(&request_access_keyboard());
    }

    #[test]
    fn test_navigation_hides_buttons_at_bounds() {
        let course = Course::builtin();
        let features = Features::default();
        let first = navigation_keyboard(&course.modules[0], 5, false, features);
        let last = navigation_keyboard(&course.modules[4], 5, true, features);

        let first = first.callback_data();
        let last = last.callback_data();
        assert!(!first.iter().any(|t| t.starts_with("prev_")));
        assert!(first.contains(&callbacks::next(0).as_str()));
        assert!(last.contains(&callbacks::prev(4).as_str()));
        assert!(!last.iter().any(|t| t.starts_with("next_")));
    }

    #[test]
    fn test_main_keyboard_labels_classify() {
        let Keyboard::Reply(rows) = main_keyboard(true, Features::default()) else {
            panic!("expected a reply keyboard");
        };
        for label in rows.iter().flatten() {
            assert_ne!(Action::from_text(label, None), Action::Unknown, "label {label}");
        }
    }

    #[test]
    fn test_main_keyboard_hides_admin_row_for_learners() {
        let Keyboard::Reply(rows) = main_keyboard(false, Features::default()) else {
            panic!("expected a reply keyboard");
        };
        assert!(!rows.iter().flatten().any(|l| l == labels::ADMIN));
    }

    #[test]
    fn test_welcome_escapes_name() {
        let text = DefaultCourseView::welcome("<script>", &Course::builtin());
        assert!(text.contains("&lt;script&gt;"));
    }
}
