use teloxide::{
    dispatching::UpdateHandler,
    prelude::*,
    types::{CallbackQuery, ChatId},
};

use crate::{context::UserContext, controller::InboundEvent, error::HandlerResult, state::AppState};

use super::send_replies;

async fn handle_callback(bot: Bot, q: CallbackQuery, state: AppState) -> HandlerResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.clone() else {
        debug!("Callback without data from user {}", q.from.id);
        return Ok(());
    };

    let user = UserContext::from(&q.from);
    let replies = state.controller.handle(&user, InboundEvent::Action(data)).await;

    send_replies(&bot, ChatId::from(q.from.id), replies).await
}

pub fn get_callback_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_callback_query().endpoint(handle_callback)
}
