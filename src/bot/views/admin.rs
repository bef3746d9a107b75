//! Admin panel texts and keyboards

use super::course::callbacks;
use crate::access::AccessRecord;
use crate::bot::broadcast::DeliveryReport;
use crate::bot::reply::{Button, Keyboard};
use crate::status::StatusSnapshot;
use crate::utils::escape_html;
use std::fmt::Write;

/// Texts shown to administrators
pub trait AdminView {
    /// Panel header
    fn panel(granted: usize, admins: usize) -> String;
    /// One page of granted users
    fn users_page(records: &[AccessRecord], page: usize, pages: usize, total: usize) -> String;
    /// Result of a grant
    fn granted(user_id: i64, newly: bool) -> String;
    /// Result of a revoke
    fn revoked(user_id: i64, existed: bool) -> String;
    /// Result of a promotion
    fn admin_added(user_id: i64, newly: bool) -> String;
    /// Result of a demotion
    fn admin_removed(user_id: i64, existed: bool) -> String;
    /// Refusal to remove the last admin
    fn last_admin() -> &'static str;
    /// Non-admin tried an admin action
    fn admin_only() -> &'static str;
    /// Runtime status
    fn status(snapshot: &StatusSnapshot) -> String;
    /// Broadcast text prompt
    fn broadcast_prompt() -> &'static str;
    /// Broadcast accepted
    fn broadcast_queued(recipients: usize) -> String;
    /// Broadcast finished
    fn broadcast_report(report: &DeliveryReport) -> String;
    /// Broadcast text as learners see it
    fn broadcast_message(text: &str) -> String;
    /// Access request forwarded to admins
    fn access_request(user_id: i64, name: &str, username: Option<&str>) -> String;
    /// Grant notice for the learner
    fn access_opened() -> &'static str;
}

/// Default Russian-language implementation of `AdminView`
pub struct DefaultAdminView;

impl AdminView for DefaultAdminView {
    fn panel(granted: usize, admins: usize) -> String {
        format!(
            "<b>🛠 Админ-панель</b>\n\n\
             👥 Пользователей с доступом: {granted}\n\
             👑 Администраторов: {admins}\n\n\
             <b>Команды:</b>\n\
             /grant ID [имя] - Выдать доступ\n\
             /revoke ID - Отозвать доступ\n\
             /addadmin ID - Назначить администратора\n\
             /removeadmin ID - Снять администратора\n\
             /broadcast текст - Рассылка всем пользователям"
        )
    }

    fn users_page(records: &[AccessRecord], page: usize, pages: usize, total: usize) -> String {
        if total == 0 {
            return "👥 Пока ни у кого нет доступа.".to_string();
        }
        let mut text = format!(
            "<b>👥 Пользователи с доступом</b> ({total}), стр. {}/{}\n\n",
            page + 1,
            pages
        );
        for r in records {
            let note = if r.note.is_empty() {
                String::new()
            } else {
                format!(" - {}", escape_html(&r.note))
            };
            let _ = writeln!(
                text,
                "• <code>{}</code>{note} ({})",
                r.user_id,
                r.granted_at.format("%Y-%m-%d")
            );
        }
        text
    }

    fn granted(user_id: i64, newly: bool) -> String {
        if newly {
            format!("✅ Доступ выдан пользователю <code>{user_id}</code>")
        } else {
            format!("ℹ️ У пользователя <code>{user_id}</code> уже есть доступ")
        }
    }

    fn revoked(user_id: i64, existed: bool) -> String {
        if existed {
            format!("🚫 Доступ пользователя <code>{user_id}</code> отозван")
        } else {
            format!("ℹ️ У пользователя <code>{user_id}</code> не было доступа")
        }
    }

    fn admin_added(user_id: i64, newly: bool) -> String {
        if newly {
            format!("👑 <code>{user_id}</code> назначен администратором")
        } else {
            format!("ℹ️ <code>{user_id}</code> уже администратор")
        }
    }

    fn admin_removed(user_id: i64, existed: bool) -> String {
        if existed {
            format!("✅ <code>{user_id}</code> больше не администратор")
        } else {
            format!("ℹ️ <code>{user_id}</code> не является администратором")
        }
    }

    fn last_admin() -> &'static str {
        "⚠️ Нельзя снять последнего администратора."
    }

    fn admin_only() -> &'static str {
        "⛔️ Эта функция доступна только администраторам."
    }

    fn status(s: &StatusSnapshot) -> String {
        format!(
            "<b>📈 Состояние бота</b>\n\n\
             👥 Пользователей с доступом: {}\n\
             👑 Администраторов: {}\n\
             🎓 Учащихся: {}\n\
             📚 Модулей: {}\n\
             ❓ Вопросов в тесте: {}\n\
             ⭐ Отзывов: {}\n\
             🔒 Контроль доступа: {}\n\
             🔇 Заглушено отказов: {}\n\
             🔁 Перезапусков: {}",
            s.granted,
            s.admins,
            s.learners,
            s.modules,
            s.questions,
            s.feedback,
            if s.access_control { "включён" } else { "выключен" },
            s.silenced_denials,
            s.restarts
        )
    }

    fn broadcast_prompt() -> &'static str {
        "📣 Отправьте текст рассылки одним сообщением или нажмите «Отмена»."
    }

    fn broadcast_queued(recipients: usize) -> String {
        format!("📣 Рассылка запущена, получателей: {recipients}")
    }

    fn broadcast_report(report: &DeliveryReport) -> String {
        format!(
            "📣 Рассылка завершена\n\n✅ Доставлено: {}\n❌ Ошибок: {}",
            report.delivered, report.failed
        )
    }

    fn broadcast_message(text: &str) -> String {
        format!("📣 <b>Сообщение от администратора</b>\n\n{}", escape_html(text))
    }

    fn access_request(user_id: i64, name: &str, username: Option<&str>) -> String {
        let handle = username.map_or_else(String::new, |u| format!(" (@{})", escape_html(u)));
        format!(
            "📨 <b>Запрос доступа</b>\n\n\
             👤 {}{handle}\n\
             🆔 <code>{user_id}</code>",
            escape_html(name)
        )
    }

    fn access_opened() -> &'static str {
        "🎉 Вам открыт доступ к курсу! Нажмите /start, чтобы начать."
    }
}

/// Buttons of the admin panel
#[must_use]
pub fn panel_keyboard() -> Keyboard {
    Keyboard::Inline(vec![
        vec![
            Button::new("👥 Пользователи", callbacks::ADMIN_USERS),
            Button::new("📈 Статус", callbacks::ADMIN_STATUS),
        ],
        vec![Button::new("📣 Рассылка", callbacks::ADMIN_BROADCAST)],
    ])
}

/// Revoke buttons for a page plus paging controls
#[must_use]
pub fn users_keyboard(records: &[AccessRecord], page: usize, pages: usize) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = records
        .iter()
        .map(|r| {
            vec![Button::new(
                format!("🚫 Отозвать {}", r.user_id),
                callbacks::revoke(r.user_id),
            )]
        })
        .collect();

    let mut paging = Vec::new();
    if page > 0 {
        paging.push(Button::new("⬅️", callbacks::users_page(page - 1)));
    }
    if page + 1 < pages {
        paging.push(Button::new("➡️", callbacks::users_page(page + 1)));
    }
    if !paging.is_empty() {
        rows.push(paging);
    }
    rows.push(vec![Button::new("🛠 Админ-панель", callbacks::ADMIN)]);
    Keyboard::Inline(rows)
}

/// Grant button under an access request
#[must_use]
pub fn access_request_keyboard(user_id: i64) -> Keyboard {
    Keyboard::Inline(vec![vec![Button::new(
        "✅ Выдать доступ",
        callbacks::grant(user_id),
    )]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::action::Action;
    use chrono::Utc;

    fn record(user_id: i64) -> AccessRecord {
        AccessRecord {
            user_id,
            granted_at: Utc::now(),
            granted_by: 1,
            note: String::new(),
        }
    }

    #[test]
    fn test_users_keyboard_paging() {
        let records = vec![record(10), record(11)];
        let middle = users_keyboard(&records, 1, 3);
        let data = middle.callback_data();
        assert!(data.contains(&"admin_users_0"));
        assert!(data.contains(&"admin_users_2"));
        assert!(data.contains(&"revoke_10"));

        let last = users_keyboard(&records, 2, 3);
        assert!(!last.callback_data().contains(&"admin_users_3"));
    }

    #[test]
    fn test_access_request_button_grants() {
        let keyboard = access_request_keyboard(77);
        assert_eq!(
            keyboard.callback_data().first().map(|d| Action::from_callback(d)),
            Some(Action::Grant {
                user: 77,
                note: String::new()
            })
        );
    }

    #[test]
    fn test_access_request_escapes_name() {
        let text = DefaultAdminView::access_request(5, "<b>x</b>", Some("nick"));
        assert!(text.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(text.contains("@nick"));
    }
}
