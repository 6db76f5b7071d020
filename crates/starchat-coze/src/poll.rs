//! Poll-until-complete handling for non-streaming chats.

use tracing::{debug, info, warn};

use crate::api::CozeClient;
use crate::error::CozeError;
use crate::types::{ChatObject, ChatStatus};

impl CozeClient {
    /// Poll `chat` until it reaches a terminal status.
    ///
    /// Sleeps the configured interval before every retrieve and gives up
    /// after the configured number of attempts. Returns the completed chat,
    /// or an error for any other terminal status.
    pub async fn wait_for_completion(&self, chat: ChatObject) -> Result<ChatObject, CozeError> {
        if chat.status.is_terminal() {
            return settle(chat);
        }

        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let current = self.retrieve_chat(&chat.conversation_id, &chat.id).await?;
            debug!(chat_id = %chat.id, attempt, status = ?current.status, "polled chat status");

            if current.status.is_terminal() {
                info!(chat_id = %chat.id, attempts = attempt, status = ?current.status, "chat settled");
                return settle(current);
            }
        }

        warn!(chat_id = %chat.id, attempts = self.poll_attempts, "chat did not complete in time");
        Err(CozeError::PollExhausted {
            attempts: self.poll_attempts,
        })
    }
}

fn settle(chat: ChatObject) -> Result<ChatObject, CozeError> {
    match chat.status {
        ChatStatus::Completed => Ok(chat),
        ChatStatus::Canceled => Err(CozeError::ChatFailed("chat was canceled".into())),
        ChatStatus::RequiresAction => Err(CozeError::ChatFailed(
            "bot requested a tool call, which is not supported".into(),
        )),
        _ => Err(CozeError::ChatFailed(chat.failure_message())),
    }
}
