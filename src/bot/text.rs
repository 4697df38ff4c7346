//! User-facing message templates (HTML parse mode).

use crate::bot::session::Step;

/// Escape user-provided values before splicing them into HTML messages.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn welcome(user_name: &str, amount: u32) -> String {
    format!(
        "🎯 <b>Welcome to the ATS Resume Optimizer, {}!</b>\n\n\
         I turn your resume into an ATS-friendly version targeted at a \
         specific job posting.\n\n\
         <b>How it works:</b>\n\
         1. Upload your resume (PDF, TXT or DOCX, up to 10 MB)\n\
         2. Send the job description you are targeting\n\
         3. Pay ₹{} via UPI\n\
         4. Receive your optimized resume as a PDF\n\n\
         📎 Upload your resume to begin.",
        html_escape(user_name),
        amount
    )
}

pub fn help(amount: u32, upi_id: &str) -> String {
    format!(
        "📚 <b>ATS Resume Bot - Guide</b>\n\n\
         <b>Commands:</b>\n\
         /start - begin a new optimization\n\
         /help - show this guide\n\
         /status - check your progress\n\n\
         <b>Process:</b>\n\
         1. <b>Upload resume</b> - PDF, TXT or DOCX, max 10 MB, text-based \
         (scanned images cannot be read)\n\
         2. <b>Job description</b> - paste the complete posting, including \
         requirements and qualifications; more detail gives better results\n\
         3. <b>Payment</b> - ₹{} via UPI to <code>{}</code>\n\
         4. <b>Delivery</b> - optimized resume as a professional PDF\n\n\
         Your files are processed in memory and only the extracted text is kept \
         for your session.",
        amount,
        html_escape(upi_id)
    )
}

pub fn status(step: Step, elapsed_minutes: i64, user_name: &str) -> String {
    format!(
        "📊 <b>Your current status</b>\n\n\
         Progress: {}\n\
         Session time: {} minute(s)\n\
         User: {}\n\n\
         <b>Next step:</b> {}",
        step.describe(),
        elapsed_minutes,
        html_escape(user_name),
        step.next_action()
    )
}

pub fn no_session() -> String {
    "No active session found. Send /start to begin.".to_string()
}

pub fn resume_received(chars: usize, format: &str) -> String {
    format!(
        "✅ <b>Resume received.</b>\n\n\
         Extracted {} characters from your {} file.\n\n\
         📝 Now send the job description for the position you are targeting. \
         Paste the complete posting for the best results.",
        chars,
        html_escape(format)
    )
}

pub fn job_description_too_short(len: usize) -> String {
    format!(
        "The job description is too short ({len} characters, need at least 100).\n\n\
         Please paste the complete posting including responsibilities, \
         qualifications and required skills."
    )
}

pub fn optimizing() -> String {
    "🚀 <b>Optimizing your resume...</b>\n\n\
     Analyzing the job requirements and matching keywords. This usually takes \
     30-90 seconds."
        .to_string()
}

pub fn optimization_ready(preview: &str, score: f64, amount: u32) -> String {
    format!(
        "🎉 <b>Your optimized resume is ready!</b>\n\n\
         Keyword match with the job description: <b>{score}%</b>\n\n\
         <b>Preview:</b>\n<pre>{}</pre>\n\n\
         Pay ₹{} to receive the full resume as a PDF.",
        html_escape(preview),
        amount
    )
}

pub fn payment_link(amount: u32, order_id: &str, url: &str) -> String {
    format!(
        "💳 <b>Complete your payment</b>\n\n\
         Amount: ₹{amount}\n\
         Order ID: <code>{}</code>\n\n\
         Pay here: {}\n\n\
         After paying, send the 12-digit UTR number from your payment \
         confirmation and I will verify the transaction.",
        html_escape(order_id),
        html_escape(url)
    )
}

pub fn payment_manual(amount: u32, order_id: &str, upi_id: &str) -> String {
    format!(
        "💳 <b>Complete your payment</b>\n\n\
         Amount: ₹{amount}\n\
         UPI ID: <code>{}</code>\n\
         Order ID: <code>{}</code>\n\n\
         1. Open any UPI app (PhonePe, Google Pay, Paytm, your bank)\n\
         2. Send ₹{amount} to the UPI ID above\n\
         3. Put the order ID in the payment remark\n\
         4. Send me the 12-digit UTR number from the confirmation\n\n\
         ℹ️ The UTR (Unique Transaction Reference) is a 12-digit number shown \
         in your payment confirmation, e.g. 123456789012.\n\n\
         ⏰ The order expires in 30 minutes.",
        html_escape(upi_id),
        html_escape(order_id)
    )
}

pub fn invalid_utr(input: &str) -> String {
    format!(
        "That does not look like a UTR number.\n\n\
         A UTR is exactly 12 digits, e.g. <code>123456789012</code>.\n\
         You sent: <code>{}</code>\n\n\
         Check your payment confirmation and try again.",
        html_escape(input)
    )
}

pub fn verifying_payment(utr: &str) -> String {
    format!(
        "🔍 Verifying your payment...\n\nUTR: <code>{}</code>\n\
         This usually takes a few seconds.",
        html_escape(utr)
    )
}

pub fn payment_not_confirmed(status: &str) -> String {
    format!(
        "❌ <b>Payment not confirmed yet</b> (gateway status: {}).\n\n\
         If you just paid, wait a minute and send the UTR again. Make sure the \
         payment went to the right UPI ID with the order ID in the remark.",
        html_escape(status)
    )
}

pub fn delivery_caption(user_name: &str) -> String {
    format!(
        "🎯 <b>Your ATS-optimized resume, {}!</b>\n\n\
         ✅ Keyword-targeted for your job posting\n\
         ✅ Clean, scannable formatting\n\
         ✅ Standard section headers\n\n\
         Good luck with your applications!",
        html_escape(user_name)
    )
}

pub fn delivery_tips() -> String {
    "🏆 <b>Tips for best results:</b>\n\n\
     • Apply within 24-48 hours of a posting going live\n\
     • Upload the PDF as-is; ATS systems read it best\n\
     • Reuse the optimized keywords in your cover letter\n\
     • Tweak the resume slightly for each application\n\n\
     Send /start any time to optimize another resume."
        .to_string()
}

pub fn delivery_failed_refunded() -> String {
    "❌ Your payment went through but the PDF could not be delivered, so a \
     refund has been issued. It should reach your account within a few days. \
     Send /start to try again."
        .to_string()
}

pub fn wrong_step(step: Step) -> String {
    format!(
        "Please follow the process step by step.\n\n\
         Currently: {}\n{}",
        step.describe(),
        step.next_action()
    )
}

pub fn rate_limited() -> String {
    "You are sending messages too quickly. Please wait a minute and try again."
        .to_string()
}

pub fn generic_error() -> String {
    "❌ Something went wrong on our side. Please try again, or send /start for \
     a fresh session."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&c"), "a&lt;b&gt;&amp;c");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn test_welcome_escapes_name() {
        let text = welcome("<script>", 5);
        assert!(text.contains("&lt;script&gt;"));
        assert!(!text.contains("<script>"));
        assert!(text.contains("₹5"));
    }

    #[test]
    fn test_payment_messages_carry_order_id() {
        let manual = payment_manual(5, "ATS_1_2", "pay@upi");
        assert!(manual.contains("ATS_1_2"));
        assert!(manual.contains("pay@upi"));
        let link = payment_link(5, "ATS_1_2", "https://pay.example/x");
        assert!(link.contains("ATS_1_2"));
        assert!(link.contains("https://pay.example/x"));
    }

    #[test]
    fn test_preview_is_escaped() {
        let text = optimization_ready("<resume>", 97.5, 5);
        assert!(text.contains("&lt;resume&gt;"));
        assert!(text.contains("97.5%"));
    }
}
