use std::sync::Arc;

use bot_commons::useful_methods::*;
use teloxide::{
    payloads::{EditMessageTextSetters, SendMessageSetters},
    prelude::*,
    types::{BotCommand, ChatId, Me, User},
    RequestError,
};

use crate::{
    database::{Database, QuotaInfo},
    lookup::{batch, progress::ProgressReporter, sent_dm, LookupEngine},
    ADMIN_IDS,
};

pub fn generate_bot_commands() -> Vec<BotCommand> {
    vec![BotCommand::new(
        "status",
        "Show your daily usage and remaining checks.",
    )]
}

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    database: Arc<Database>,
    engine: Arc<LookupEngine>,
) -> Result<(), RequestError> {
    let Some(user) = message.from.clone() else {
        // Channel posts and the like; nothing to meter a quota against.
        return Ok(());
    };
    if user.id == me.id {
        return Ok(());
    }
    let Some(text) = message.text() else {
        return Ok(());
    };
    let input = text.trim();
    let chat_id = message.chat.id;
    let user_id = user.id.to_string();

    log::debug!("Processing message from user {user_id}");

    if let Err(e) = database.upsert_user(&user).await {
        log::error!("Error saving user {user_id}: {e}");
    }

    let blocked = database.is_user_blocked(&user_id).await.unwrap_or_else(|e| {
        log::error!("Error checking blocked status: {e}");
        false
    });
    if blocked {
        log::debug!("Blocked user attempted to use bot: {user_id}");
        bot.send_message(
            chat_id,
            "⚠️ You have been blocked from using this bot. Please contact the administrator.",
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
        return Ok(());
    }

    let status = database.bot_status().await.unwrap_or_else(|e| {
        log::error!("Error getting bot status: {e}");
        "active".to_string()
    });
    if status != "active" {
        bot.send_message(
            chat_id,
            "⚠️ Bot is currently offline for maintenance. Please try again later.",
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
        return Ok(());
    }

    if input.starts_with('/') {
        return handle_command(&bot, &me, &message, &user, input, &database, &engine).await;
    }

    // One phone number per line.
    let numbers: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if numbers.is_empty() {
        bot.send_message(
            chat_id,
            concat!(
                "⚠️ No valid phone numbers found. ",
                "Please send one or more phone numbers separated by line breaks."
            ),
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
        return Ok(());
    }

    if numbers.len() > batch::MAX_BATCH_SIZE {
        bot.send_message(
            chat_id,
            concat!(
                "⚠️ <b>Too Many Numbers</b>\n\n",
                "You can check a maximum of 30 phone numbers in a single request. ",
                "Please send fewer numbers."
            ),
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
        return Ok(());
    }

    let quota = database
        .check_and_consume_quota(&user_id, numbers.len() as i64)
        .await
        .unwrap_or_else(|e| {
            log::error!("Error checking user limit: {e}");
            QuotaInfo::default_allow()
        });
    if !quota.can_check {
        bot.send_message(
            chat_id,
            format!(
                "⚠️ <b>Daily Limit Reached</b>\n\nYou have reached your daily limit of {} checks. Please try again tomorrow or send fewer numbers.",
                quota.limit
            ),
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
        return Ok(());
    }

    let _ = bot.typing(chat_id).await;

    let total = numbers.len();
    let loading_message = bot
        .send_message(
            chat_id,
            format!("Processing {total} numbers in optimized batches..."),
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;

    let reporter = ProgressReporter::start(bot.clone(), chat_id, loading_message.id, total);
    let results = Arc::clone(&engine)
        .run_batch(numbers, &user_id, reporter.counter())
        .await;
    reporter.update_progress(results.len());
    reporter.stop();

    let mut reply = results
        .iter()
        .map(|result| result.message.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    reply.push_str(&format!(
        "\n📊 Daily Limit: {}/{} checks used",
        quota.used, quota.limit
    ));

    // The consolidated reply replaces the progress message; anything
    // beyond the message length limit follows as separate messages.
    let mut chunks = split_to_fit(&reply, TELEGRAM_MESSAGE_LIMIT).into_iter();
    if let Some(first) = chunks.next() {
        bot.edit_message_text(chat_id, loading_message.id, first)
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
    }
    for chunk in chunks {
        bot.send_html(chat_id, chunk).await?;
    }

    Ok(())
}

/// Handle a `/command` message.
async fn handle_command(
    bot: &Bot,
    me: &Me,
    message: &Message,
    user: &User,
    text: &str,
    database: &Database,
    engine: &LookupEngine,
) -> Result<(), RequestError> {
    let chat_id = message.chat.id;
    let user_id = user.id.to_string();

    // First word is the command; trim an @BotName suffix if present.
    let command = text.split_whitespace().next().unwrap_or(text);
    let username_suffix = format!("@{}", me.username());
    let command = command.trim_end_matches(username_suffix.as_str()).to_lowercase();

    let is_admin = ADMIN_IDS.contains(&user.id);

    match command.as_str() {
        "/status" => {
            // A zero-count check reports standing without consuming.
            let quota = database
                .check_and_consume_quota(&user_id, 0)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error checking user limit: {e}");
                    QuotaInfo::default_allow()
                });
            bot.send_message(
                chat_id,
                format!(
                    "📊 <b>Your Usage Status</b>\n\n<b>Daily Limit:</b> {} checks\n<b>Used Today:</b> {} checks\n<b>Remaining:</b> {} checks",
                    quota.limit, quota.used, quota.remaining
                ),
            )
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        }
        "/resetalllimits" if is_admin => {
            match database.reset_all_limits().await {
                Ok(()) => {
                    bot.send_message(
                        chat_id,
                        concat!(
                            "✅ All users have been reset to 1000 daily limit ",
                            "and their daily counts have been reset to 0."
                        ),
                    )
                    .parse_mode(teloxide::types::ParseMode::Html)
                    .await?;
                }
                Err(e) => {
                    log::error!("Error resetting limits: {e}");
                    bot.send_message(chat_id, "⚠️ Failed to reset limits.")
                        .await?;
                }
            }
        }
        "/syncproxies" if is_admin => {
            sync_proxies(bot, chat_id, database, engine).await?;
        }
        _ => {
            bot.send_message(
                chat_id,
                concat!(
                    "👋 Welcome! Please send one or more phone numbers ",
                    "(separated by line breaks) to locate. ",
                    "Use /status to check your daily usage."
                ),
            )
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        }
    }

    Ok(())
}

/// Probe every enrolled proxy, persist the verdicts, and swap the
/// working set into the rotation. Lookups already in flight keep the
/// proxy they picked; only later picks see the new list.
async fn sync_proxies(
    bot: &Bot,
    chat_id: ChatId,
    database: &Database,
    engine: &LookupEngine,
) -> Result<(), RequestError> {
    let enrolled = match database.enrolled_proxies().await {
        Ok(proxies) => proxies,
        Err(e) => {
            log::error!("Error loading proxies from database: {e}");
            bot.send_message(chat_id, "⚠️ Failed to load proxies from the database.")
                .await?;
            return Ok(());
        }
    };

    let mut working = Vec::new();
    let mut failed = 0usize;
    for proxy in enrolled {
        match sent_dm::test_proxy(&proxy).await {
            Ok(()) => {
                if let Err(e) = database.set_proxy_status(&proxy, "working").await {
                    log::error!("Error updating proxy status: {e}");
                }
                working.push(proxy);
            }
            Err(e) => {
                log::warn!("Proxy {}:{} failed its probe: {e}", proxy.host, proxy.port);
                if let Err(e) = database.set_proxy_status(&proxy, "failed").await {
                    log::error!("Error updating proxy status: {e}");
                }
                failed += 1;
            }
        }
    }

    let count = working.len();
    engine.proxies.replace_all(working);

    bot.send_message(
        chat_id,
        format!("✅ Proxy sync complete: {count} working, {failed} failed."),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;

    Ok(())
}
