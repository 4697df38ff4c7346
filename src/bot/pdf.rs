//! Minimal PDF writer for delivered resumes.
//!
//! Emits plain PDF 1.4 with the two built-in Helvetica fonts, so no font
//! embedding is needed. Layout follows the delivered-resume format: branding
//! header, bold section headers, bullet lines, dated footer.

const PAGE_WIDTH: f32 = 595.28; // A4 in points
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 54.0; // 0.75 inch

const BODY_SIZE: f32 = 11.0;
const HEADER_SIZE: f32 = 13.0;
const SMALL_SIZE: f32 = 9.0;

const BODY_LEADING: f32 = 14.0;
const HEADER_LEADING: f32 = 20.0;
const BLANK_LEADING: f32 = 7.0;

/// Average glyph width as a fraction of font size; Helvetica body text.
/// Close enough for wrapping — long words still fit because of the margins.
const AVG_CHAR_WIDTH: f32 = 0.52;

/// Section headers recognized in optimized output (uppercased comparison).
const SECTION_KEYWORDS: [&str; 16] = [
    "SUMMARY",
    "PROFILE",
    "OBJECTIVE",
    "EXPERIENCE",
    "EMPLOYMENT",
    "WORK EXPERIENCE",
    "PROFESSIONAL EXPERIENCE",
    "EDUCATION",
    "SKILLS",
    "TECHNICAL SKILLS",
    "ADDITIONAL SKILLS",
    "CORE COMPETENCIES",
    "CERTIFICATIONS",
    "ACHIEVEMENTS",
    "PROJECTS",
    "CONTACT",
];

/// Render optimized resume text into PDF bytes.
pub fn render_resume_pdf(content: &str, user_name: &str) -> Vec<u8> {
    let mut pages = Paginator::new();

    pages.line(
        &format!("ATS-Optimized Professional Resume - {user_name}"),
        Font::Italicish,
        SMALL_SIZE,
        BODY_LEADING,
        MARGIN,
    );
    pages.gap(BLANK_LEADING);

    for raw in content.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            pages.gap(BLANK_LEADING);
            continue;
        }

        if is_section_header(trimmed) {
            pages.gap(BLANK_LEADING);
            pages.line(&trimmed.to_uppercase(), Font::Bold, HEADER_SIZE, HEADER_LEADING, MARGIN);
        } else if let Some(rest) = bullet_text(trimmed) {
            for (i, part) in wrap(&format!("- {rest}"), BODY_SIZE, MARGIN + 12.0).iter().enumerate()
            {
                // Continuation lines of a wrapped bullet indent a bit further
                let indent = if i == 0 { MARGIN + 12.0 } else { MARGIN + 20.0 };
                pages.line(part, Font::Regular, BODY_SIZE, BODY_LEADING, indent);
            }
        } else {
            for part in wrap(trimmed, BODY_SIZE, MARGIN) {
                pages.line(&part, Font::Regular, BODY_SIZE, BODY_LEADING, MARGIN);
            }
        }
    }

    pages.gap(BLANK_LEADING * 2.0);
    let footer = format!(
        "Generated on {} - ATS Resume Bot",
        chrono::Utc::now().format("%B %d, %Y")
    );
    pages.line(&footer, Font::Italicish, SMALL_SIZE, BODY_LEADING, MARGIN);

    assemble(pages.finish())
}

fn is_section_header(line: &str) -> bool {
    let upper = line.to_uppercase();
    let upper = upper.trim_end_matches(':');
    if SECTION_KEYWORDS.contains(&upper) {
        return true;
    }
    upper.len() <= 30 && SECTION_KEYWORDS.iter().any(|k| upper.contains(k))
}

fn bullet_text(line: &str) -> Option<&str> {
    for prefix in ["•", "-", "*"] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Some(rest.trim_start());
        }
    }
    None
}

/// Greedy word wrap against the usable width at the given indent.
fn wrap(text: &str, font_size: f32, indent: f32) -> Vec<String> {
    let usable = PAGE_WIDTH - indent - MARGIN;
    let max_chars = (usable / (font_size * AVG_CHAR_WIDTH)).max(10.0) as usize;

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Clone, Copy, PartialEq)]
enum Font {
    Regular,
    Bold,
    /// Rendered in the regular face at small size; kept separate so header
    /// and footer lines are easy to spot in the layout code.
    Italicish,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Bold => "/F2",
            _ => "/F1",
        }
    }
}

/// Accumulates content-stream text operations, breaking pages on overflow.
struct Paginator {
    pages: Vec<String>,
    current: String,
    y: f32,
}

impl Paginator {
    fn new() -> Self {
        Self { pages: Vec::new(), current: String::new(), y: PAGE_HEIGHT - MARGIN }
    }

    fn line(&mut self, text: &str, font: Font, size: f32, leading: f32, x: f32) {
        if self.y - leading < MARGIN {
            self.break_page();
        }
        self.y -= leading;
        self.current.push_str(&format!(
            "BT {} {size} Tf 1 0 0 1 {x:.2} {y:.2} Tm ({text}) Tj ET\n",
            font.resource(),
            y = self.y,
            text = escape_pdf_text(text),
        ));
    }

    fn gap(&mut self, leading: f32) {
        // A gap never forces a page break on its own
        if self.y - leading >= MARGIN {
            self.y -= leading;
        }
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// Escape text for a PDF literal string, folding everything to ASCII since
/// the built-in fonts are used without an embedded encoding.
fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' => out.push_str(r"\("),
            ')' => out.push_str(r"\)"),
            '\\' => out.push_str(r"\\"),
            '•' => out.push('-'),
            '–' | '—' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '₹' => out.push_str("Rs."),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            '\t' => out.push_str("    "),
            _ => out.push('?'),
        }
    }
    out
}

/// Assemble page content streams into a complete PDF file.
fn assemble(page_streams: Vec<String>) -> Vec<u8> {
    let page_count = page_streams.len();
    // Objects: 1 catalog, 2 pages, 3+4 fonts, then [page, content] per page.
    let page_obj_id = |i: usize| 5 + 2 * i;
    let content_obj_id = |i: usize| 6 + 2 * i;

    let kids: Vec<String> =
        (0..page_count).map(|i| format!("{} 0 R", page_obj_id(i))).collect();

    let mut objects: Vec<(usize, String)> = vec![
        (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (
            2,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_count
            ),
        ),
        (3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string()),
        (4, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold >>".to_string()),
    ];

    for (i, stream) in page_streams.iter().enumerate() {
        objects.push((
            page_obj_id(i),
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                content_obj_id(i)
            ),
        ));
        objects.push((
            content_obj_id(i),
            format!("<< /Length {} >>\nstream\n{}endstream", stream.len(), stream),
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = vec![0usize; objects.len() + 1];
    for (id, body) in &objects {
        offsets[*id] = out.len();
        out.push_str(&format!("{id} 0 obj\n{body}\nendobj\n"));
    }

    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    out.push_str("0000000000 65535 f \n");
    for id in 1..=objects.len() {
        out.push_str(&format!("{:010} 00000 n \n", offsets[id]));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_a_pdf() {
        let pdf = render_resume_pdf("SUMMARY\nGood engineer.\n\nSKILLS\n• Rust", "Alice");
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("/Type /Catalog"));
        assert!(text.contains("/BaseFont /Helvetica"));
        assert!(text.contains("startxref"));
    }

    #[test]
    fn test_content_appears_escaped() {
        let pdf = render_resume_pdf(
            &format!("SUMMARY\n{}", "Shipped (many) projects at Acme".repeat(1)),
            "Bob",
        );
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.contains(r"Shipped \(many\) projects at Acme"));
    }

    #[test]
    fn test_section_headers_use_bold_font() {
        let pdf = render_resume_pdf("EXPERIENCE\nDid things well enough.", "Bob");
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.contains("/F2 13 Tf"));
        assert!(text.contains("(EXPERIENCE) Tj"));
    }

    #[test]
    fn test_long_content_spans_pages() {
        let body: String =
            (0..200).map(|i| format!("Line number {i} with some filler text.\n")).collect();
        let pdf = render_resume_pdf(&body, "Bob");
        let text = String::from_utf8(pdf).unwrap();
        let page_objects = text.matches("/Type /Page /Parent").count();
        assert!(page_objects >= 2, "expected multiple pages, got {page_objects}");
        assert!(text.contains(&format!("/Count {page_objects}")));
    }

    #[test]
    fn test_is_section_header() {
        assert!(is_section_header("EXPERIENCE"));
        assert!(is_section_header("Technical Skills"));
        assert!(is_section_header("EDUCATION:"));
        assert!(!is_section_header("I gained experience working with very long sentences here"));
        assert!(!is_section_header("just a normal line"));
    }

    #[test]
    fn test_bullet_variants() {
        assert_eq!(bullet_text("• Rust"), Some("Rust"));
        assert_eq!(bullet_text("- Go"), Some("Go"));
        assert_eq!(bullet_text("* C"), Some("C"));
        assert_eq!(bullet_text("plain"), None);
    }

    #[test]
    fn test_wrap_respects_width() {
        let long = "word ".repeat(60);
        let lines = wrap(&long, BODY_SIZE, MARGIN);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= 90);
        }
    }

    #[test]
    fn test_escape_folds_unicode() {
        assert_eq!(escape_pdf_text("a—b • ₹5 (x)"), r"a-b - Rs.5 \(x\)");
        assert_eq!(escape_pdf_text("naïve"), "na?ve");
    }
}
