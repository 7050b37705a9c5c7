use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup,
    WebAppInfo,
};

use crate::reply::{ChoiceSet, InlineChoice, InlineTarget};

pub fn into_reply_markup(choices: ChoiceSet) -> Option<ReplyMarkup> {
    match choices {
        ChoiceSet::None => None,
        ChoiceSet::Keyboard(rows) => {
            let keyboard = rows
                .into_iter()
                .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>());

            Some(ReplyMarkup::Keyboard(
                KeyboardMarkup::new(keyboard).resize_keyboard().one_time_keyboard(),
            ))
        }
        ChoiceSet::RemoveKeyboard => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        ChoiceSet::Inline(rows) => {
            let keyboard = rows
                .into_iter()
                .map(|row| row.into_iter().map(inline_button).collect::<Vec<_>>());

            Some(ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(keyboard)))
        }
    }
}

fn inline_button(choice: InlineChoice) -> InlineKeyboardButton {
    match choice.target {
        InlineTarget::Action(payload) => InlineKeyboardButton::callback(choice.label, payload),
        InlineTarget::WebApp(url) => InlineKeyboardButton::web_app(choice.label, WebAppInfo { url }),
    }
}
