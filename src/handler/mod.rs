mod callback;
mod command;
mod keyboard;
mod message;

use callback::get_callback_handler;
use command::get_command_handler;
use message::{get_message_handler, get_payment_handler};
use teloxide::{
    dispatching::UpdateHandler,
    dptree,
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{ChatId, LabeledPrice},
    Bot,
};

use crate::{
    error::HandlerResult,
    reply::{Invoice, Reply},
};

use keyboard::into_reply_markup;

/// One static tree for the whole process. Branch order is the dispatch precedence:
/// commands, payments, then plain messages and button presses.
pub fn get_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(get_command_handler())
        .branch(get_payment_handler())
        .branch(get_message_handler())
        .branch(get_callback_handler())
}

async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<Reply>) -> HandlerResult<()> {
    for reply in replies {
        let request = bot.send_message(chat_id, reply.text);

        match into_reply_markup(reply.choices) {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };

        if let Some(invoice) = reply.invoice {
            send_invoice(bot, chat_id, invoice).await?;
        }
    }

    Ok(())
}

async fn send_invoice(bot: &Bot, chat_id: ChatId, invoice: Invoice) -> HandlerResult<()> {
    debug!("Sending invoice {:?} to chat {}", invoice, chat_id);

    let price = LabeledPrice::new(invoice.title.clone(), invoice.amount.try_into()?);
    bot.send_invoice(
        chat_id,
        invoice.title,
        invoice.description,
        invoice.payload,
        invoice.provider_token,
        invoice.currency,
        vec![price],
    )
    .await?;

    Ok(())
}
