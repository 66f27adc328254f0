//! Minimal PDF 1.4 writer for the printable simulation report.
//!
//! Output is a title on the first page followed by monospaced body lines,
//! broken across as many pages as needed. Lines are never wrapped. The byte
//! stream depends only on the inputs: no creation date, no document ID.

/// Page geometry in PDF points (1/72 inch). Defaults to A4 portrait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub title_size: u32,
    pub body_size: u32,
    pub leading: u32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: 595,
            height: 842,
            margin: 57,
            title_size: 12,
            body_size: 10,
            leading: 12,
        }
    }
}

impl PageLayout {
    fn title_baseline(&self) -> u32 {
        self.height.saturating_sub(self.margin / 2)
    }

    fn body_top(&self) -> u32 {
        self.height.saturating_sub(self.margin)
    }

    pub fn lines_per_page(&self) -> usize {
        let usable = self.body_top().saturating_sub(self.margin);
        (usable / self.leading.max(1)) as usize + 1
    }
}

// Escape a line for a PDF literal string. Non-ASCII has no glyph in the
// standard fonts and is replaced.
fn pdf_literal(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 2);
    out.push('(');
    for ch in line.chars() {
        match ch {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(ch);
            }
            '\t' => out.push(' '),
            ' '..='~' => out.push(ch),
            _ => out.push('?'),
        }
    }
    out.push(')');
    out
}

fn page_content(title: Option<&str>, lines: &[&str], layout: &PageLayout) -> String {
    let mut content = String::new();

    if let Some(title) = title {
        content.push_str("BT\n");
        content.push_str(&format!("/F1 {} Tf\n", layout.title_size));
        content.push_str(&format!("{} {} Td\n", layout.margin, layout.title_baseline()));
        content.push_str(&format!("{} Tj\n", pdf_literal(title)));
        content.push_str("ET\n");
    }

    if !lines.is_empty() {
        content.push_str("BT\n");
        content.push_str(&format!("/F2 {} Tf\n", layout.body_size));
        content.push_str(&format!("{} TL\n", layout.leading));
        content.push_str(&format!("{} {} Td\n", layout.margin, layout.body_top()));
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                content.push_str("T*\n");
            }
            content.push_str(&format!("{} Tj\n", pdf_literal(line)));
        }
        content.push_str("ET\n");
    }

    content
}

struct PdfWriter {
    buf: String,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        Self {
            buf: String::from("%PDF-1.4\n"),
            offsets: Vec::new(),
        }
    }

    // Objects must be written in id order starting at 1.
    fn object(&mut self, body: &str) {
        self.offsets.push(self.buf.len());
        let id = self.offsets.len();
        self.buf.push_str(&format!("{} 0 obj\n{}\nendobj\n", id, body));
    }

    fn stream(&mut self, data: &str) {
        let body = format!("<< /Length {} >>\nstream\n{}endstream", data.len(), data);
        self.object(&body);
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_at = self.buf.len();
        let size = self.offsets.len() + 1;
        self.buf.push_str(&format!("xref\n0 {}\n", size));
        self.buf.push_str("0000000000 65535 f \n");
        for offset in &self.offsets {
            self.buf.push_str(&format!("{:010} 00000 n \n", offset));
        }
        self.buf.push_str(&format!("trailer\n<< /Size {} /Root 1 0 R >>\n", size));
        self.buf.push_str(&format!("startxref\n{}\n%%EOF\n", xref_at));
        self.buf.into_bytes()
    }
}

/// Render `title` and `body` into a complete PDF file.
pub fn render_pdf(title: &str, body: &str, layout: &PageLayout) -> Vec<u8> {
    let lines: Vec<&str> = body.lines().collect();
    let pages: Vec<&[&str]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(layout.lines_per_page()).collect()
    };

    // 1 catalog, 2 page tree, 3-4 fonts, then a (page, content) pair per page
    let page_id = |index: usize| 5 + index * 2;
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", page_id(i))).collect();

    let mut pdf = PdfWriter::new();
    pdf.object("<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(&format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    ));
    pdf.object("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    pdf.object("<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>");

    for (index, page_lines) in pages.iter().enumerate() {
        pdf.object(&format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            layout.width,
            layout.height,
            page_id(index) + 1
        ));
        let title = if index == 0 { Some(title) } else { None };
        pdf.stream(&page_content(title, page_lines, layout));
    }

    pdf.finish()
}
