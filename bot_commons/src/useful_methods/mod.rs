mod split_msg;
pub use split_msg::*;

use std::future::Future;
use std::time::Duration;

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    types::{ChatId, Message},
    Bot, RequestError,
};

pub trait BotStuff {
    /// Opinionated method to send a message with HTML markup.
    /// Splits the text into several messages if it's longer than the
    /// character limit, and retries each send on flood waits.
    fn send_html<'a>(
        &'a self,
        to_where: ChatId,
        text: &'a str,
    ) -> impl Future<Output = Result<Vec<Message>, RequestError>> + Send;

    fn typing(&self, to_where: ChatId) -> impl Future<Output = Result<(), RequestError>> + Send;
}

impl BotStuff for Bot {
    async fn send_html<'a>(
        &'a self,
        to_where: ChatId,
        text: &'a str,
    ) -> Result<Vec<Message>, RequestError> {
        let mut sent_messages = Vec::new();

        for chunk in split_to_fit(text, TELEGRAM_MESSAGE_LIMIT) {
            // Try up to 3 times.
            let mut looped: u8 = 0;
            let result = loop {
                looped += 1;
                let result = self
                    .send_message(to_where, chunk)
                    .parse_mode(teloxide::types::ParseMode::Html)
                    .await;

                if let Err(RequestError::RetryAfter(seconds)) = result {
                    tokio::time::sleep(seconds.duration()).await;
                } else {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }

                if result.is_ok() || looped >= 3 {
                    break result;
                }
            };

            match result {
                Ok(message) => sent_messages.push(message),
                Err(e) => return Err(e),
            }
        }

        Ok(sent_messages)
    }

    async fn typing(&self, to_where: ChatId) -> Result<(), RequestError> {
        self.send_chat_action(to_where, teloxide::types::ChatAction::Typing)
            .await?;
        Ok(())
    }
}
