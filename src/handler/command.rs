use teloxide::{
    dispatching::{HandlerExt, UpdateHandler},
    prelude::*,
    types::Message,
    Bot,
};

use crate::{
    command::Command, context::UserContext, controller::InboundEvent, error::HandlerResult, state::AppState,
};

use super::send_replies;

async fn handle_command(bot: Bot, msg: Message, cmd: Command, state: AppState) -> HandlerResult<()> {
    let Some(user) = msg.from.as_ref().map(UserContext::from) else {
        warn!("Ignoring /{:?} without a sender in chat {}", cmd, msg.chat.id);
        return Ok(());
    };

    let replies = state.controller.handle(&user, InboundEvent::Command(cmd)).await;
    send_replies(&bot, msg.chat.id, replies).await
}

pub fn get_command_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(handle_command)
}
