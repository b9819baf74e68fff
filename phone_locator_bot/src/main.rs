use bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "WARN,phone_locator_bot=debug");
    }
    start_everything(phone_locator_bot::entry());
}
