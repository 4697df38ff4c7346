//! Per-user session state for the optimization flow.

/// Where a user is in the flow. Advances strictly forward except for
/// `/start` (full reset) and "new job description" (back to
/// `AwaitingJobDescription`, keeping the uploaded resume).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AwaitingResume,
    AwaitingJobDescription,
    ReadyForPayment,
    AwaitingPayment,
    Completed,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::AwaitingResume => "awaiting_resume",
            Step::AwaitingJobDescription => "awaiting_job_description",
            Step::ReadyForPayment => "ready_for_payment",
            Step::AwaitingPayment => "awaiting_payment",
            Step::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "awaiting_job_description" => Step::AwaitingJobDescription,
            "ready_for_payment" => Step::ReadyForPayment,
            "awaiting_payment" => Step::AwaitingPayment,
            "completed" => Step::Completed,
            _ => Step::AwaitingResume,
        }
    }

    /// Short progress line for /status.
    pub fn describe(&self) -> &'static str {
        match self {
            Step::AwaitingResume => "waiting for your resume upload",
            Step::AwaitingJobDescription => "resume received, waiting for the job description",
            Step::ReadyForPayment => "resume optimized, ready for payment",
            Step::AwaitingPayment => "waiting for payment confirmation",
            Step::Completed => "completed",
        }
    }

    /// What the user should do next, for /status.
    pub fn next_action(&self) -> &'static str {
        match self {
            Step::AwaitingResume => "Upload your resume as a PDF, TXT or DOCX file.",
            Step::AwaitingJobDescription => "Send the full job description as text.",
            Step::ReadyForPayment => "Tap the payment button to get your optimized resume.",
            Step::AwaitingPayment => "Complete the UPI payment and send the 12-digit UTR number.",
            Step::Completed => "All done. Send /start to optimize another resume.",
        }
    }
}

/// One user's session row.
#[derive(Debug, Clone)]
pub struct Session {
    pub telegram_id: i64,
    pub step: Step,
    pub user_name: String,
    pub resume_text: Option<String>,
    pub job_description: Option<String>,
    pub optimized_resume: Option<String>,
    /// Cashfree order id once payment was initiated.
    pub order_id: Option<String>,
    pub created_at: String,
}

impl Session {
    pub fn new(telegram_id: i64, user_name: &str) -> Self {
        Self {
            telegram_id,
            step: Step::AwaitingResume,
            user_name: user_name.to_string(),
            resume_text: None,
            job_description: None,
            optimized_resume: None,
            order_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Minutes since the session started, for /status.
    pub fn elapsed_minutes(&self) -> i64 {
        chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map(|t| (chrono::Utc::now() - t.with_timezone(&chrono::Utc)).num_minutes())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_string_roundtrip() {
        for step in [
            Step::AwaitingResume,
            Step::AwaitingJobDescription,
            Step::ReadyForPayment,
            Step::AwaitingPayment,
            Step::Completed,
        ] {
            assert_eq!(Step::from_str(step.as_str()), step);
        }
    }

    #[test]
    fn test_unknown_step_falls_back_to_start() {
        assert_eq!(Step::from_str("garbage"), Step::AwaitingResume);
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new(42, "Alice");
        assert_eq!(session.step, Step::AwaitingResume);
        assert!(session.resume_text.is_none());
        assert!(session.order_id.is_none());
        assert_eq!(session.elapsed_minutes(), 0);
    }
}
