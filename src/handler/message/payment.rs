use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    dptree,
    payloads::AnswerPreCheckoutQuerySetters,
    prelude::Requester,
    types::{Message, PreCheckoutQuery, Update},
    Bot,
};

use crate::{context::UserContext, controller::InboundEvent, error::HandlerResult, state::AppState};

use super::super::send_replies;

/// Telegram checkout: the pre-checkout gate and the `successful_payment` confirmation.
pub fn get_payment_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    dptree::entry()
        .branch(Update::filter_pre_checkout_query().endpoint(handle_pre_checkout))
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.successful_payment().is_some())
                .endpoint(handle_successful_payment),
        )
}

async fn handle_pre_checkout(bot: Bot, query: PreCheckoutQuery, state: AppState) -> HandlerResult<()> {
    let user = UserContext::from(&query.from);
    let ok = state.controller.accepts_payment(&user, &query.invoice_payload).await;

    if ok {
        bot.answer_pre_checkout_query(query.id.clone(), true).await?;
    } else {
        warn!(
            "Rejecting checkout {} for user {}: no such pending payment",
            query.invoice_payload, user.user_id
        );
        bot.answer_pre_checkout_query(query.id.clone(), false)
            .error_message(t!("errors.payment"))
            .await?;
    }

    Ok(())
}

async fn handle_successful_payment(bot: Bot, msg: Message, state: AppState) -> HandlerResult<()> {
    let (Some(payment), Some(from)) = (msg.successful_payment(), msg.from.as_ref()) else {
        return Ok(());
    };

    info!(
        "Telegram payment {} received from user {}: amount={}",
        payment.invoice_payload, from.id, payment.total_amount
    );

    let user = UserContext::from(from);
    let replies = state
        .controller
        .handle(&user, InboundEvent::PaymentConfirmed(payment.invoice_payload.clone()))
        .await;

    send_replies(&bot, msg.chat.id, replies).await
}
