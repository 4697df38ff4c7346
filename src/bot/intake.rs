//! Document intake: turn an uploaded resume file into plain text.

use std::fmt;

use crate::bot::docx;
use crate::config::{ALLOWED_EXTENSIONS, MAX_FILE_SIZE};

/// Resumes shorter than this are almost certainly scans or broken extractions.
const MIN_TEXT_CHARS: usize = 100;

#[derive(Debug)]
pub enum IntakeError {
    /// Extension is not one of pdf/txt/docx.
    UnsupportedFormat(String),
    /// Declared file size exceeds the upload limit.
    TooLarge { size: u32 },
    /// The file could not be decoded at all.
    Unreadable(String),
    /// Decoded fine but there is not enough text to optimize.
    TooShort { chars: usize },
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(ext) => {
                write!(f, "unsupported file format '.{ext}' (accepted: pdf, txt, docx)")
            }
            Self::TooLarge { size } => write!(
                f,
                "file is {} MB, limit is {} MB",
                size / (1024 * 1024),
                MAX_FILE_SIZE / (1024 * 1024)
            ),
            Self::Unreadable(reason) => write!(f, "could not read file: {reason}"),
            Self::TooShort { chars } => write!(
                f,
                "extracted only {chars} characters, need at least {MIN_TEXT_CHARS}"
            ),
        }
    }
}

impl std::error::Error for IntakeError {}

/// Lowercased extension of a filename, if any.
pub fn extension(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Check the declared size before downloading anything.
pub fn check_size(size: u32) -> Result<(), IntakeError> {
    if size > MAX_FILE_SIZE {
        return Err(IntakeError::TooLarge { size });
    }
    Ok(())
}

/// Extract resume text from uploaded bytes, dispatching on the filename
/// extension.
pub fn extract_text(data: &[u8], filename: &str) -> Result<String, IntakeError> {
    let ext = extension(filename)
        .ok_or_else(|| IntakeError::UnsupportedFormat("(none)".to_string()))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(IntakeError::UnsupportedFormat(ext));
    }

    let text = match ext.as_str() {
        "pdf" => pdf_extract::extract_text_from_mem(data)
            .map_err(|e| IntakeError::Unreadable(e.to_string()))?,
        "txt" => String::from_utf8_lossy(data).into_owned(),
        "docx" => docx::extract_text(data).map_err(IntakeError::Unreadable)?,
        _ => unreachable!("extension already validated"),
    };

    let text = text.trim().to_string();
    let chars = text.chars().count();
    if chars < MIN_TEXT_CHARS {
        return Err(IntakeError::TooShort { chars });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text() -> String {
        "Software engineer with ten years of experience building distributed \
         systems, leading teams and shipping production services."
            .to_string()
    }

    #[test]
    fn test_extension_lowercases() {
        assert_eq!(extension("Resume.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension("cv.tar.docx").as_deref(), Some("docx"));
        assert_eq!(extension("noext"), None);
    }

    #[test]
    fn test_txt_roundtrip() {
        let body = long_text();
        let text = extract_text(body.as_bytes(), "resume.txt").expect("should extract");
        assert_eq!(text, body);
    }

    #[test]
    fn test_txt_invalid_utf8_is_lossy() {
        let mut body = long_text().into_bytes();
        body.push(0xFF);
        let text = extract_text(&body, "resume.txt").expect("should extract");
        assert!(text.contains("distributed"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_text(b"x", "resume.rtf").unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedFormat(ext) if ext == "rtf"));
    }

    #[test]
    fn test_missing_extension() {
        let err = extract_text(b"x", "resume").unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_short_text_rejected() {
        let err = extract_text(b"too short", "resume.txt").unwrap_err();
        assert!(matches!(err, IntakeError::TooShort { chars: 9 }));
    }

    #[test]
    fn test_corrupt_docx_unreadable() {
        let body = vec![0u8; 2048];
        let err = extract_text(&body, "resume.docx").unwrap_err();
        assert!(matches!(err, IntakeError::Unreadable(_)));
    }

    #[test]
    fn test_size_check() {
        assert!(check_size(MAX_FILE_SIZE).is_ok());
        assert!(matches!(
            check_size(MAX_FILE_SIZE + 1),
            Err(IntakeError::TooLarge { .. })
        ));
    }
}
