mod payment;

pub use payment::get_payment_handler;

use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    prelude::Requester,
    types::{Message, Update},
    Bot,
};

use crate::{context::UserContext, controller::InboundEvent, error::HandlerResult, state::AppState};

use super::send_replies;

pub fn get_message_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_message().endpoint(handle_message_text)
}

async fn handle_message_text(bot: Bot, msg: Message, state: AppState) -> HandlerResult<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        debug!("Ignoring non-text message in chat {}", msg.chat.id);
        return Ok(());
    };

    // Known commands were taken by the command branch.
    if text.starts_with('/') {
        bot.send_message(msg.chat.id, t!("commands.unknown_command")).await?;
        return Ok(());
    }

    let user = UserContext::from(from);
    let replies = state
        .controller
        .handle(&user, InboundEvent::Text(text.to_string()))
        .await;

    send_replies(&bot, msg.chat.id, replies).await
}
