use teloxide::{macros::BotCommands, prelude::Requester, types::BotCommand, Bot};

use crate::error::BotResult;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Deep links append a payload, it is accepted and otherwise unused.
    Start(String),
    Continue,
    Cancel,
    Help,
}

impl Command {
    pub fn user_commands() -> Vec<BotCommand> {
        vec![
            BotCommand::new("start", t!("commands.description.start")),
            BotCommand::new("continue", t!("commands.description.continue")),
            BotCommand::new("cancel", t!("commands.description.cancel")),
            BotCommand::new("help", t!("commands.description.help")),
        ]
    }
}

pub async fn setup_user_commands(bot: &Bot) -> BotResult<()> {
    bot.delete_my_commands().await?;
    bot.set_my_commands(Command::user_commands()).await?;
    Ok(())
}
