use insta::assert_snapshot;
use tender_course_bot::bot::views::{AdminView, DefaultAdminView};
use tender_course_bot::status::StatusSnapshot;

#[test]
fn test_status_page_snapshot() {
    let snapshot = StatusSnapshot {
        granted: 3,
        admins: 1,
        modules: 5,
        questions: 5,
        learners: 2,
        restarts: 1,
        feedback: 4,
        silenced_denials: 7,
        access_control: true,
    };
    assert_snapshot!(DefaultAdminView::status(&snapshot), @r"
    <b>📈 Состояние бота</b>

    👥 Пользователей с доступом: 3
    👑 Администраторов: 1
    🎓 Учащихся: 2
    📚 Модулей: 5
    ❓ Вопросов в тесте: 5
    ⭐ Отзывов: 4
    🔒 Контроль доступа: включён
    🔇 Заглушено отказов: 7
    🔁 Перезапусков: 1
    ");
}

#[test]
fn test_admin_panel_snapshot() {
    assert_snapshot!(DefaultAdminView::panel(12, 2), @r"
    <b>🛠 Админ-панель</b>

    👥 Пользователей с доступом: 12
    👑 Администраторов: 2

    <b>Команды:</b>
    /grant ID [имя] - Выдать доступ
    /revoke ID - Отозвать доступ
    /addadmin ID - Назначить администратора
    /removeadmin ID - Снять администратора
    /broadcast текст - Рассылка всем пользователям
    ");
}
