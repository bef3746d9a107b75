//! Rendering of [`Keyboard`] layouts as Telegram markup

use super::reply::Keyboard;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

/// Telegram markup for `keyboard`
#[must_use]
pub fn to_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(rows) => InlineKeyboardMarkup::new(rows.iter().map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
                .collect::<Vec<_>>()
        }))
        .into(),
        Keyboard::Reply(rows) => KeyboardMarkup::new(rows.iter().map(|row| {
            row.iter()
                .map(|label| KeyboardButton::new(label.clone()))
                .collect::<Vec<_>>()
        }))
        .resize_keyboard()
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::reply::Button;

    #[test]
    fn test_inline_layout_is_preserved() {
        let keyboard = Keyboard::Inline(vec![
            vec![Button::new("A", "menu"), Button::new("B", "help")],
            vec![Button::new("C", "about")],
        ]);
        let ReplyMarkup::InlineKeyboard(markup) = to_markup(&keyboard) else {
            panic!("expected an inline keyboard");
        };
        let widths: Vec<usize> = markup.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![2, 1]);
    }

    #[test]
    fn test_reply_keyboard_is_resized() {
        let keyboard = Keyboard::Reply(vec![vec!["📚 Курс".to_string()]]);
        let ReplyMarkup::Keyboard(markup) = to_markup(&keyboard) else {
            panic!("expected a reply keyboard");
        };
        assert!(markup.resize_keyboard);
        assert_eq!(markup.keyboard[0][0].text, "📚 Курс");
    }
}
