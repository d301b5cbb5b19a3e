// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::io::{self, Write};

use consolink_buffer::document::Document;
use consolink_console::{folding::FoldRegion, highlights::HighlightTracker};

/// 1-based character column of `offset` on `line`.
fn column(document: &Document, line: usize, offset: usize) -> usize {
    let start = document.line_start_offset(line).unwrap_or(0);
    document
        .text()
        .get(start..offset)
        .map_or(0, |prefix| prefix.chars().count())
        + 1
}

/// Write the committed text, then one `line:col-col kind target` line per
/// hyperlink and one `line-line fold placeholder` line per fold region. Lines
/// and columns are 1-based and inclusive.
///
/// # Errors
/// Will return an error if writing fails.
pub fn write_report(
    out: &mut impl Write,
    document: &Document,
    highlights: &HighlightTracker,
    folds: &[FoldRegion],
) -> io::Result<()> {
    let text = document.text();
    out.write_all(text.as_bytes())?;
    if !text.is_empty() && !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }

    for link in highlights.hyperlinks() {
        let Some(action) = &link.action else {
            continue;
        };

        let line = document.line_number(link.range.start);
        let first = column(document, line, link.range.start);
        let last = column(document, line, link.range.end).saturating_sub(1).max(first);

        writeln!(
            out,
            "{}:{first}-{last} {} {}",
            line + 1,
            action.kind(),
            action.target()
        )?;
    }

    for region in folds {
        writeln!(
            out,
            "{}-{} fold {}",
            region.first_line(document) + 1,
            region.last_line(document) + 1,
            region.placeholder
        )?;
    }

    out.flush()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use consolink_common::action::{ActionHandle, FileLocation, UrlTarget};
    use consolink_console::{folding::FoldTracker, highlights::HighlightSink};

    use super::*;

    #[test]
    fn text_then_links() {
        let mut document = Document::new();
        document
            .append("build ok\nsee https://x.io\nat é.rs:3")
            .unwrap();

        let url: ActionHandle = Arc::new(UrlTarget::new("https://x.io"));
        let file: ActionHandle = Arc::new(FileLocation::new("é.rs", Some(3), None));

        let mut highlights = HighlightTracker::new();
        highlights.apply_highlight(13, 25, Some(url), None);
        highlights.add_manual_hyperlink(29..36, file);

        let mut out = Vec::new();
        write_report(&mut out, &document, &highlights, &[]).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "build ok\nsee https://x.io\nat é.rs:3\n2:5-16 url https://x.io\n3:4-9 file é.rs:3\n"
        );
    }

    #[test]
    fn folds_follow_links() {
        let mut document = Document::new();
        document
            .append("boom\n\tat java.util.A.a(A.java:1)\n\tat java.util.B.b(B.java:2)\nend\n")
            .unwrap();

        let mut folds = FoldTracker::new();
        let foldings = crate::filters::builtin_foldings().unwrap();
        folds.update(&document, &foldings, 0, document.line_count() - 1);

        let mut out = Vec::new();
        write_report(&mut out, &document, &HighlightTracker::new(), folds.regions()).unwrap();

        let report = String::from_utf8(out).unwrap();
        assert!(report.ends_with("end\n2-3 fold <2 internal calls>\n"));
    }
}
