//! Report output.
//!
//! Matches are printed to the console (colored, quiet or JSON) and can also
//! be pushed to a Telegram chat.

pub mod console;
pub mod telegram;

pub use console::ConsoleOutput;
pub use telegram::TelegramNotifier;
