//! Source code for the Phone Locator bot, a Telegram bot that verifies
//! phone numbers and reports their country, region and carrier.

/// Various types used throughout.
mod types;

/// The database.
mod database;

/// The lookup pipeline: parsing, upstream APIs, caching, batching.
mod lookup;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

use teloxide::types::UserId;

/// Users allowed to run maintenance commands.
pub static ADMIN_IDS: [UserId; 2] = [UserId(123456789), UserId(5651879548)];
