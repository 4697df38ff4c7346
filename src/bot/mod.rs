pub mod cashfree;
pub mod docx;
pub mod engine;
pub mod intake;
pub mod openai;
pub mod pdf;
pub mod session;
pub mod store;
pub mod telegram;
pub mod text;

pub use engine::Engine;
pub use store::Store;
pub use telegram::TelegramClient;
