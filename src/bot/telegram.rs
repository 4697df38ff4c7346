//! Telegram client using teloxide.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, FileId, InputFile, MessageId, ParseMode, ReplyParameters};
use tracing::{info, warn};

/// Thin wrapper over the teloxide `Bot` so the engine never touches raw API
/// types.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send an HTML-formatted message, optionally as a reply. Returns the new
    /// message id (needed for later edits).
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<i64, String> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);

        if let Some(msg_id) = reply_to_message_id {
            request = request.reply_parameters(ReplyParameters::new(MessageId(msg_id as i32)));
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send message: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Edit a previously sent message in place (progress updates).
    pub async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), String> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to edit message: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Send a message with an inline keyboard. Buttons are (label, callback
    /// data) pairs, one per row.
    pub async fn send_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[(&str, &str)],
    ) -> Result<i64, String> {
        use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

        let rows: Vec<Vec<InlineKeyboardButton>> = buttons
            .iter()
            .map(|(label, data)| {
                vec![InlineKeyboardButton::callback(label.to_string(), data.to_string())]
            })
            .collect();

        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .reply_markup(InlineKeyboardMarkup::new(rows))
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send message with buttons: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Acknowledge a callback query so the client stops its spinner.
    pub async fn answer_callback(&self, callback_id: &str) -> Result<(), String> {
        self.bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to answer callback: {e}"))
    }

    /// Send a document from in-memory bytes.
    pub async fn send_document(
        &self,
        chat_id: i64,
        data: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<i64, String> {
        info!("Sending document {} to chat {} ({} bytes)", filename, chat_id, data.len());

        let input_file = InputFile::memory(data).file_name(filename.to_string());
        let mut request = self
            .bot
            .send_document(ChatId(chat_id), input_file)
            .parse_mode(ParseMode::Html);

        if let Some(cap) = caption {
            request = request.caption(cap.to_string());
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send document: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Download an uploaded document by file_id.
    pub async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, String> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| format!("Failed to get file info: {e}"))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| format!("Failed to download file: {e}"))?;

        info!("Downloaded document ({} bytes)", data.len());
        Ok(data)
    }
}
