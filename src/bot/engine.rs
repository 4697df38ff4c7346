//! Orchestration: one user turn per inbound Telegram update.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use regex::Regex;

use crate::bot::cashfree::{CashfreeClient, UpiPayment, new_order_id};
use crate::bot::openai::{OpenAiClient, match_score};
use crate::bot::pdf;
use crate::bot::session::{Session, Step};
use crate::bot::store::{PaymentStatus, Store};
use crate::bot::telegram::TelegramClient;
use crate::bot::{intake, text};
use crate::config::{Config, RATE_LIMIT_MESSAGES, RATE_LIMIT_WINDOW_SECS};

/// Preview length shown before payment.
const PREVIEW_CHARS: usize = 500;

/// Telegram message size headroom for the full-preview chunks.
const CHUNK_CHARS: usize = 3500;

/// How often and how many times the gateway is polled after a UTR arrives.
const VERIFY_ATTEMPTS: usize = 3;
const VERIFY_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum job description length, same bar as resume text.
const MIN_JOB_DESCRIPTION_CHARS: usize = 100;

pub struct Engine {
    config: Config,
    telegram: Arc<TelegramClient>,
    store: Store,
    openai: OpenAiClient,
    cashfree: CashfreeClient,
    recent: Mutex<HashMap<i64, VecDeque<Instant>>>,
    utr_pattern: Regex,
}

impl Engine {
    pub fn new(config: Config, telegram: Arc<TelegramClient>, store: Store) -> Self {
        let openai = OpenAiClient::new(config.openai_api_key.clone());
        let cashfree = CashfreeClient::new(&config);
        Self {
            config,
            telegram,
            store,
            openai,
            cashfree,
            recent: Mutex::new(HashMap::new()),
            utr_pattern: Regex::new(r"^\d{12}$").expect("static regex"),
        }
    }

    /// Rolling-window rate limit; true when the message may be handled.
    async fn allow_message(&self, user_id: i64) -> bool {
        let mut recent = self.recent.lock().await;
        let timestamps = recent.entry(user_id).or_default();
        note_message(timestamps, Instant::now())
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.telegram.send_message(chat_id, text, None).await {
            warn!("Reply to {} failed: {}", chat_id, e);
        }
    }

    /// A text message or command from a private chat.
    pub async fn handle_text(
        &self,
        chat_id: i64,
        user_id: i64,
        username: Option<&str>,
        first_name: &str,
        body: &str,
    ) {
        if !self.allow_message(user_id).await {
            self.reply(chat_id, &text::rate_limited()).await;
            return;
        }
        if let Err(e) = self.store.touch_user(user_id, username, first_name) {
            warn!("User upsert failed: {e}");
        }

        let body = body.trim();
        // Commands may arrive as /start@botname
        let command = body.split_whitespace().next().and_then(|w| w.split('@').next());
        match command {
            Some("/start") => return self.start(chat_id, user_id, first_name).await,
            Some("/help") => {
                return self
                    .reply(chat_id, &text::help(self.config.payment_amount, &self.config.upi_id))
                    .await;
            }
            Some("/status") => return self.status(chat_id, user_id).await,
            _ => {}
        }

        let session = match self.load_session(chat_id, user_id).await {
            Some(s) => s,
            None => return,
        };

        match session.step {
            Step::AwaitingJobDescription => {
                self.process_job_description(chat_id, session, body).await
            }
            Step::AwaitingPayment => self.verify_payment(chat_id, session, body).await,
            step => self.reply(chat_id, &text::wrong_step(step)).await,
        }
    }

    /// A document upload from a private chat.
    pub async fn handle_document(
        &self,
        chat_id: i64,
        user_id: i64,
        username: Option<&str>,
        first_name: &str,
        file_id: &str,
        file_size: u32,
        filename: &str,
    ) {
        if !self.allow_message(user_id).await {
            self.reply(chat_id, &text::rate_limited()).await;
            return;
        }
        if let Err(e) = self.store.touch_user(user_id, username, first_name) {
            warn!("User upsert failed: {e}");
        }

        let mut session = match self.load_session(chat_id, user_id).await {
            Some(s) => s,
            None => return,
        };
        if session.step != Step::AwaitingResume {
            self.reply(chat_id, &text::wrong_step(session.step)).await;
            return;
        }

        if let Err(e) = intake::check_size(file_size) {
            self.reply(chat_id, &format!("❌ {}", text::html_escape(&e.to_string()))).await;
            return;
        }

        let progress = self
            .telegram
            .send_message(chat_id, "🔄 Processing your resume...", None)
            .await
            .ok();

        let result = match self.telegram.download_document(file_id).await {
            Ok(data) => intake::extract_text(&data, filename),
            Err(e) => {
                warn!("Download failed for user {}: {}", user_id, e);
                self.edit_or_send(chat_id, progress, &text::generic_error()).await;
                return;
            }
        };

        match result {
            Ok(resume_text) => {
                let chars = resume_text.chars().count();
                let format = intake::extension(filename).unwrap_or_default().to_uppercase();
                session.resume_text = Some(resume_text);
                session.step = Step::AwaitingJobDescription;
                if let Err(e) = self.store.save_session(&session) {
                    warn!("Session save failed: {e}");
                    self.edit_or_send(chat_id, progress, &text::generic_error()).await;
                    return;
                }
                info!("Resume accepted for user {} ({} chars)", user_id, chars);
                self.edit_or_send(chat_id, progress, &text::resume_received(chars, &format))
                    .await;
            }
            Err(e) => {
                info!("Intake rejected for user {}: {}", user_id, e);
                let body = format!("❌ {}", text::html_escape(&e.to_string()));
                self.edit_or_send(chat_id, progress, &body).await;
            }
        }
    }

    /// An inline keyboard callback.
    pub async fn handle_callback(&self, callback_id: &str, chat_id: i64, user_id: i64, data: &str) {
        if let Err(e) = self.telegram.answer_callback(callback_id).await {
            warn!("{e}");
        }

        let session = match self.load_session(chat_id, user_id).await {
            Some(s) => s,
            None => return,
        };

        match data {
            "pay" => self.initiate_payment(chat_id, session).await,
            "restart" => self.restart_with_new_job(chat_id, session).await,
            "preview" => self.send_full_preview(chat_id, session).await,
            other => warn!("Unknown callback data: {other}"),
        }
    }

    async fn start(&self, chat_id: i64, user_id: i64, first_name: &str) {
        let session = Session::new(user_id, first_name);
        if let Err(e) = self.store.save_session(&session) {
            warn!("Session reset failed: {e}");
            self.reply(chat_id, &text::generic_error()).await;
            return;
        }
        info!("User {} ({}) started a session", user_id, first_name);
        self.reply(chat_id, &text::welcome(first_name, self.config.payment_amount)).await;
    }

    async fn status(&self, chat_id: i64, user_id: i64) {
        match self.store.session(user_id) {
            Ok(Some(session)) => {
                self.reply(
                    chat_id,
                    &text::status(session.step, session.elapsed_minutes(), &session.user_name),
                )
                .await;
            }
            Ok(None) => self.reply(chat_id, &text::no_session()).await,
            Err(e) => {
                warn!("Status lookup failed: {e}");
                self.reply(chat_id, &text::generic_error()).await;
            }
        }
    }

    async fn load_session(&self, chat_id: i64, user_id: i64) -> Option<Session> {
        match self.store.session(user_id) {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                self.reply(chat_id, &text::no_session()).await;
                None
            }
            Err(e) => {
                warn!("Session lookup failed: {e}");
                self.reply(chat_id, &text::generic_error()).await;
                None
            }
        }
    }

    async fn process_job_description(&self, chat_id: i64, mut session: Session, body: &str) {
        let len = body.chars().count();
        if len < MIN_JOB_DESCRIPTION_CHARS {
            self.reply(chat_id, &text::job_description_too_short(len)).await;
            return;
        }
        let resume_text = match session.resume_text.clone() {
            Some(t) => t,
            None => {
                // Step says we have a resume but the row disagrees; restart.
                warn!("Session for {} lost its resume text", session.telegram_id);
                self.reply(chat_id, &text::no_session()).await;
                return;
            }
        };

        self.reply(chat_id, &text::optimizing()).await;

        let optimized = self.openai.optimize_resume(&resume_text, body).await;
        let score = match_score(&optimized, body);

        session.job_description = Some(body.to_string());
        session.optimized_resume = Some(optimized.clone());
        session.step = Step::ReadyForPayment;
        if let Err(e) = self.store.save_session(&session) {
            warn!("Session save failed: {e}");
            self.reply(chat_id, &text::generic_error()).await;
            return;
        }
        info!("Resume optimized for user {} (match {}%)", session.telegram_id, score);

        let preview = preview_of(&optimized, PREVIEW_CHARS);
        let message = text::optimization_ready(&preview, score, self.config.payment_amount);
        let buttons = [
            ("💳 Pay & get the PDF", "pay"),
            ("📝 Try another job description", "restart"),
            ("📄 Full preview", "preview"),
        ];
        if let Err(e) = self.telegram.send_with_buttons(chat_id, &message, &buttons).await {
            warn!("{e}");
        }
    }

    async fn initiate_payment(&self, chat_id: i64, mut session: Session) {
        if session.step != Step::ReadyForPayment && session.step != Step::AwaitingPayment {
            self.reply(chat_id, &text::wrong_step(session.step)).await;
            return;
        }

        let order_id = new_order_id(session.telegram_id);
        let amount = self.config.payment_amount;

        if let Err(e) = self.store.create_payment(&order_id, session.telegram_id, amount) {
            warn!("Payment insert failed: {e}");
            self.reply(chat_id, &text::generic_error()).await;
            return;
        }
        if let Err(e) = self.cashfree.create_order(session.telegram_id, &order_id, amount).await {
            warn!("Order creation failed: {e}");
            self.reply(chat_id, &text::generic_error()).await;
            return;
        }

        let message = match self.cashfree.create_upi_link(&order_id).await {
            UpiPayment::Link(url) => text::payment_link(amount, &order_id, &url),
            UpiPayment::Manual { upi_id } => text::payment_manual(amount, &order_id, &upi_id),
        };

        session.order_id = Some(order_id);
        session.step = Step::AwaitingPayment;
        if let Err(e) = self.store.save_session(&session) {
            warn!("Session save failed: {e}");
            self.reply(chat_id, &text::generic_error()).await;
            return;
        }
        self.reply(chat_id, &message).await;
    }

    async fn verify_payment(&self, chat_id: i64, mut session: Session, utr: &str) {
        if !self.utr_pattern.is_match(utr) {
            self.reply(chat_id, &text::invalid_utr(utr)).await;
            return;
        }
        let order_id = match session.order_id.clone() {
            Some(id) => id,
            None => {
                warn!("Session for {} awaits payment without an order", session.telegram_id);
                self.reply(chat_id, &text::no_session()).await;
                return;
            }
        };

        let progress =
            self.telegram.send_message(chat_id, &text::verifying_payment(utr), None).await.ok();

        let mut last_status = "UNKNOWN".to_string();
        for attempt in 0..VERIFY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(VERIFY_INTERVAL).await;
            }
            match self.cashfree.order_status(&order_id).await {
                Ok(status) => {
                    last_status = status;
                    if last_status == "PAID" {
                        break;
                    }
                }
                Err(e) => warn!("Status poll failed: {e}"),
            }
        }

        if last_status != "PAID" {
            if let Err(e) = self.store.resolve_payment(&order_id, Some(utr), PaymentStatus::Pending)
            {
                warn!("Payment update failed: {e}");
            }
            self.edit_or_send(chat_id, progress, &text::payment_not_confirmed(&last_status)).await;
            return;
        }

        if let Err(e) = self.store.resolve_payment(&order_id, Some(utr), PaymentStatus::Verified) {
            warn!("Payment update failed: {e}");
        }
        info!("Payment verified for order {}", order_id);
        self.edit_or_send(chat_id, progress, "✅ Payment verified! Generating your PDF...").await;

        self.deliver(chat_id, &mut session).await;
    }

    async fn deliver(&self, chat_id: i64, session: &mut Session) {
        let optimized = match session.optimized_resume.clone() {
            Some(t) => t,
            None => {
                warn!("Paid session for {} has no optimized resume", session.telegram_id);
                self.reply(chat_id, &text::generic_error()).await;
                return;
            }
        };

        let document = pdf::render_resume_pdf(&optimized, &session.user_name);
        let filename = format!(
            "ATS_Resume_{}_{}.pdf",
            sanitize_for_filename(&session.user_name),
            chrono::Utc::now().format("%Y%m%d_%H%M")
        );

        let caption = text::delivery_caption(&session.user_name);
        if let Err(e) =
            self.telegram.send_document(chat_id, document, &filename, Some(&caption)).await
        {
            warn!("Delivery failed: {e}");
            self.refund_failed_delivery(session).await;
            self.reply(chat_id, &text::delivery_failed_refunded()).await;
            return;
        }

        session.step = Step::Completed;
        if let Err(e) = self.store.save_session(session) {
            warn!("Session save failed: {e}");
        }
        if let Err(e) = self.store.count_delivery(session.telegram_id) {
            warn!("Delivery count failed: {e}");
        }
        info!("Resume delivered to user {}", session.telegram_id);

        self.reply(chat_id, &text::delivery_tips()).await;
    }

    /// A payment was taken but the PDF could not be sent; give the money back.
    async fn refund_failed_delivery(&self, session: &Session) {
        let order_id = match session.order_id.as_deref() {
            Some(id) => id,
            None => return,
        };
        let amount = match self.store.payment(order_id) {
            Ok(Some(payment)) => payment.amount,
            Ok(None) => self.config.payment_amount,
            Err(e) => {
                warn!("Payment lookup failed: {e}");
                self.config.payment_amount
            }
        };
        if let Err(e) = self.cashfree.refund(order_id, amount, "Resume delivery failed").await {
            warn!("Refund for {} failed: {}", order_id, e);
            return;
        }
        if let Err(e) = self.store.resolve_payment(order_id, None, PaymentStatus::Failed) {
            warn!("Payment update failed: {e}");
        }
        info!("Refunded order {} after failed delivery", order_id);
    }

    async fn restart_with_new_job(&self, chat_id: i64, mut session: Session) {
        if session.resume_text.is_none() {
            self.reply(chat_id, &text::no_session()).await;
            return;
        }
        session.step = Step::AwaitingJobDescription;
        session.job_description = None;
        session.optimized_resume = None;
        session.order_id = None;
        if let Err(e) = self.store.save_session(&session) {
            warn!("Session save failed: {e}");
            self.reply(chat_id, &text::generic_error()).await;
            return;
        }
        self.reply(
            chat_id,
            "🔄 Your resume is still saved. Send a new job description to \
             optimize against a different position.",
        )
        .await;
    }

    async fn send_full_preview(&self, chat_id: i64, session: Session) {
        let optimized = match session.optimized_resume {
            Some(t) => t,
            None => {
                self.reply(chat_id, &text::no_session()).await;
                return;
            }
        };
        for chunk in chunk_text(&optimized, CHUNK_CHARS) {
            let body = format!("<pre>{}</pre>", text::html_escape(&chunk));
            self.reply(chat_id, &body).await;
        }
    }

    async fn edit_or_send(&self, chat_id: i64, message_id: Option<i64>, body: &str) {
        let edited = match message_id {
            Some(id) => self.telegram.edit_message(chat_id, id, body).await.is_ok(),
            None => false,
        };
        if !edited {
            self.reply(chat_id, body).await;
        }
    }
}

/// Record a message timestamp and report whether it fits the rolling window.
fn note_message(timestamps: &mut VecDeque<Instant>, now: Instant) -> bool {
    let window = Duration::from_secs(RATE_LIMIT_WINDOW_SECS);
    while let Some(front) = timestamps.front() {
        if now.duration_since(*front) > window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
    if timestamps.len() >= RATE_LIMIT_MESSAGES {
        return false;
    }
    timestamps.push_back(now);
    true
}

/// First `max_chars` of the text with an ellipsis when truncated.
fn preview_of(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

/// Split text into chunks of at most `max_chars` characters, on char
/// boundaries.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
}

fn sanitize_for_filename(name: &str) -> String {
    let cleaned: String =
        name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
    if cleaned.is_empty() { "Professional".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_allows_up_to_cap() {
        let mut timestamps = VecDeque::new();
        let now = Instant::now();
        for _ in 0..RATE_LIMIT_MESSAGES {
            assert!(note_message(&mut timestamps, now));
        }
        assert!(!note_message(&mut timestamps, now));
    }

    #[test]
    fn test_rate_limit_window_expires() {
        let mut timestamps = VecDeque::new();
        let start = Instant::now();
        for _ in 0..RATE_LIMIT_MESSAGES {
            assert!(note_message(&mut timestamps, start));
        }
        let later = start + Duration::from_secs(RATE_LIMIT_WINDOW_SECS + 1);
        assert!(note_message(&mut timestamps, later));
    }

    #[test]
    fn test_preview_truncation() {
        assert_eq!(preview_of("short", 10), "short");
        assert_eq!(preview_of("0123456789ab", 10), "0123456789...");
    }

    #[test]
    fn test_chunking() {
        let chunks = chunk_text(&"x".repeat(8000), 3500);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 3500);
        assert_eq!(chunks[2].len(), 1000);
        assert!(chunk_text("", 3500).is_empty());
    }

    #[test]
    fn test_filename_sanitization() {
        assert_eq!(sanitize_for_filename("Alice"), "Alice");
        assert_eq!(sanitize_for_filename("Юля ❤"), "Professional");
        assert_eq!(sanitize_for_filename("Jo Ann-Marie"), "JoAnnMarie");
    }

    #[test]
    fn test_utr_pattern() {
        let re = Regex::new(r"^\d{12}$").unwrap();
        assert!(re.is_match("123456789012"));
        assert!(!re.is_match("12345678901"));
        assert!(!re.is_match("1234567890123"));
        assert!(!re.is_match("12345678901a"));
        assert!(!re.is_match(" 123456789012"));
    }
}
