use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use teloxide::{
    payloads::EditMessageTextSetters,
    requests::Requester,
    types::{ChatId, MessageId},
    ApiError, Bot, RequestError,
};
use tokio::{task::JoinHandle, time::sleep};

const TICK: Duration = Duration::from_millis(300);
const MAX_DOTS: usize = 5;

/// Animates a "checking..." message while a batch runs, showing a
/// `completed/total` counter and a cycling dots spinner.
pub struct ProgressReporter {
    completed: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Start editing the given message on a fixed interval.
    pub fn start(bot: Bot, chat_id: ChatId, message_id: MessageId, total: usize) -> Self {
        let completed = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let handle = tokio::spawn(animate(
            bot,
            chat_id,
            message_id,
            total,
            Arc::clone(&completed),
            Arc::clone(&running),
        ));

        Self {
            completed,
            running,
            handle,
        }
    }

    /// Counter the batch increments; shown on the next tick.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }

    pub fn update_progress(&self, done: usize) {
        self.completed.store(done, Ordering::SeqCst);
    }

    /// Halt further edits. The final text is up to the caller.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.handle.abort();
    }
}

async fn animate(
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
    total: usize,
    completed: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
) {
    let mut dots = 0;
    let mut last_text = String::new();

    while running.load(Ordering::SeqCst) {
        sleep(TICK).await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        dots = dots % MAX_DOTS + 1;
        let current = completed.load(Ordering::SeqCst).clamp(1, total.max(1));

        let mut text = format!("{current}/{total} Number is Checking");
        for _ in 0..dots {
            text.push_str(" ․");
        }

        if text == last_text {
            continue;
        }
        last_text.clone_from(&text);

        let edit_result = bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(teloxide::types::ParseMode::Html)
            .await;

        match edit_result {
            Ok(_) => {}
            // The message already shows exactly this text; keep animating.
            Err(RequestError::Api(ApiError::MessageNotModified)) => {}
            Err(e) => {
                log::error!("Error editing progress message: {e}");
                break;
            }
        }
    }
}
