use std::{fs, sync::Arc};
use teloxide::{dptree::deps, prelude::*};

use crate::{
    database::Database,
    handlers::{self, generate_bot_commands},
    lookup::LookupEngine,
};

/// # Panics
///
/// Panics if there's no key file
pub async fn entry() {
    let key = fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .expect("Could not load bot key file!");

    let bot = Bot::new(key.trim());

    bot.set_my_commands(generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    let database: Arc<Database> = Database::new().await.expect("Failed to create database!");

    let engine = Arc::new(LookupEngine::new(Arc::clone(&database)));

    // Seed the rotation with whatever proxies last passed their probe.
    match database.active_proxies().await {
        Ok(proxies) if !proxies.is_empty() => {
            log::info!(
                "Found {} active proxies in database, initializing rotation...",
                proxies.len()
            );
            engine.proxies.replace_all(proxies);
        }
        Ok(_) => log::info!("No active proxies found in database"),
        Err(e) => log::error!("Error initializing proxies from database: {e}"),
    }

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![database, engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
