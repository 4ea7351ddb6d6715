//! Digest email rendering.
//!
//! Builds the subject, HTML body and plain-text body from a selection and its
//! generated content. Rendering is pure: the same inputs always give
//! byte-identical output.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::types::{Concept, DigestContent, PreprintServer, RenderedDigest, SelectionResult};

/// Run metadata shown in the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderMeta {
    pub run_date: NaiveDate,
    /// Human-readable generation time, e.g. `2024-05-10 07:00 EDT`.
    pub generated_at: String,
    pub server: PreprintServer,
    /// General concept topic of the day.
    pub topic: String,
}

/// Renders digest emails.
pub struct DigestRenderer;

impl DigestRenderer {
    /// Subject line, e.g. `bioRxiv digest: (2024-05-10)`.
    pub fn subject(server: PreprintServer, run_date: NaiveDate) -> String {
        format!(
            "{} digest: ({})",
            server.display_name(),
            run_date.format("%Y-%m-%d")
        )
    }

    /// Render subject and both bodies.
    pub fn render(
        selection: &SelectionResult,
        content: &DigestContent,
        meta: &RenderMeta,
    ) -> RenderedDigest {
        RenderedDigest {
            subject: Self::subject(meta.server, meta.run_date),
            html_body: Self::render_html(selection, content, meta),
            text_body: Self::render_text(selection, content, meta),
        }
    }

    /// Generate the HTML body.
    pub fn render_html(
        selection: &SelectionResult,
        content: &DigestContent,
        meta: &RenderMeta,
    ) -> String {
        let mut papers_html = String::new();
        for (idx, selected) in selection.selected.iter().enumerate() {
            let paper = &selected.paper;
            let summary = content.summary_for(&paper.id).unwrap_or_default();

            let _ = write!(
                papers_html,
                r#"
        <div class="paper">
            <h3>{number}. <a href="{link}">{title}</a></h3>
            <div class="meta">
                <div><b>Authors:</b> {authors}</div>
                <div><b>Category:</b> {category} &nbsp; <b>Date:</b> {date} &nbsp; <b>DOI:</b> {doi}</div>
            </div>
            <p><b>AI Summary:</b> {summary}</p>
"#,
                number = idx + 1,
                link = html_escape(&paper.link()),
                title = html_escape(&paper.title),
                authors = html_escape(&paper.authors_display()),
                category = html_escape(&paper.category),
                date = paper.date.format("%Y-%m-%d"),
                doi = html_escape(&paper.versioned_doi()),
                summary = html_escape(summary),
            );

            if !selected.reason.is_empty() {
                let _ = writeln!(
                    papers_html,
                    r#"            <p class="reason"><b>Why it was picked:</b> {}</p>"#,
                    html_escape(&selected.reason)
                );
            }

            let _ = write!(
                papers_html,
                r"            <p><b>Abstract:</b><br/>{abstract_text}</p>
        </div>
",
                abstract_text = html_escape(&paper.abstract_text),
            );
        }

        let rationale_html = if selection.rationale.is_empty() {
            String::new()
        } else {
            format!(
                r#"<p class="rationale">{}</p>"#,
                html_escape(&selection.rationale)
            )
        };

        let idea_html = html_list(&content.idea);
        let general_html = html_list(&content.general_concept.points);
        let interest_html = html_list(&content.interest_concept.points);

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.35; color: #111; }}
        h2 {{ margin: 0 0 8px 0; }}
        h3 {{ margin: 0 0 6px 0; }}
        ul {{ margin: 0; padding-left: 18px; }}
        hr {{ margin: 22px 0; }}
        .generated {{ color: #555; font-size: 12px; margin-bottom: 16px; }}
        .rationale {{ font-style: italic; color: #333; }}
        .paper {{ margin: 0 0 18px 0; }}
        .paper p {{ margin: 8px 0 6px 0; }}
        .meta {{ font-size: 13px; color: #333; }}
        .reason {{ font-size: 13px; color: #555; }}
        .footer {{ margin-top: 18px; color: #777; font-size: 12px; }}
    </style>
</head>
<body>
    <h2>{server} daily digest: {date}</h2>
    <div class="generated">Generated at {generated_at}</div>
    {rationale_html}
{papers_html}
    <hr />
    <h3>General Trends</h3>
    <ul>
{idea_html}    </ul>

    <hr />
    <h3>General Concept: {topic}</h3>
    <ul>
{general_html}    </ul>

    <hr />
    <h3>Specific Concept: {interest_title}</h3>
    <ul>
{interest_html}    </ul>

    <div class="footer">Generated from the {server} API with Gemini.</div>
</body>
</html>"#,
            server = meta.server.display_name(),
            date = meta.run_date.format("%Y-%m-%d"),
            generated_at = html_escape(&meta.generated_at),
            rationale_html = rationale_html,
            papers_html = papers_html,
            idea_html = idea_html,
            topic = html_escape(&meta.topic),
            general_html = general_html,
            interest_title = html_escape(&content.interest_concept.title),
            interest_html = interest_html,
        )
    }

    /// Generate the plain-text body.
    pub fn render_text(
        selection: &SelectionResult,
        content: &DigestContent,
        meta: &RenderMeta,
    ) -> String {
        let mut text = format!(
            "{server} daily digest: {date}\nGenerated at {generated_at}\n\n",
            server = meta.server.display_name(),
            date = meta.run_date.format("%Y-%m-%d"),
            generated_at = meta.generated_at,
        );

        if !selection.rationale.is_empty() {
            text.push_str(&selection.rationale);
            text.push_str("\n\n");
        }

        text.push_str(&"=".repeat(72));
        text.push('\n');

        for (idx, selected) in selection.selected.iter().enumerate() {
            let paper = &selected.paper;
            let _ = write!(
                text,
                "\n{number}. {title}\n{link}\nAuthors: {authors}\nCategory: {category} | Date: {date} | DOI: {doi}\n\nAI Summary: {summary}\n",
                number = idx + 1,
                title = paper.title,
                link = paper.link(),
                authors = paper.authors_display(),
                category = paper.category,
                date = paper.date.format("%Y-%m-%d"),
                doi = paper.versioned_doi(),
                summary = content.summary_for(&paper.id).unwrap_or_default(),
            );
            if !selected.reason.is_empty() {
                let _ = writeln!(text, "Why it was picked: {}", selected.reason);
            }
            let _ = writeln!(text, "\nAbstract:\n{}\n", paper.abstract_text);
            text.push_str(&"-".repeat(72));
            text.push('\n');
        }

        push_text_block(&mut text, "GENERAL TRENDS", &content.idea);
        push_text_block(
            &mut text,
            &format!("GENERAL CONCEPT: {}", meta.topic),
            &content.general_concept.points,
        );
        push_concept(&mut text, "SPECIFIC CONCEPT", &content.interest_concept);

        let _ = writeln!(
            text,
            "\n---\nGenerated from the {} API with Gemini.",
            meta.server.display_name()
        );

        text
    }
}

fn html_list(points: &[String]) -> String {
    points
        .iter()
        .fold(String::new(), |mut out, point| {
            let _ = writeln!(out, "        <li>{}</li>", html_escape(point));
            out
        })
}

fn push_text_block(text: &mut String, heading: &str, points: &[String]) {
    let _ = writeln!(text, "\n{heading}");
    for point in points {
        let _ = writeln!(text, "• {point}");
    }
}

fn push_concept(text: &mut String, heading: &str, concept: &Concept) {
    push_text_block(text, &format!("{heading}: {}", concept.title), &concept.points);
}

/// Simple HTML escaping for model and feed content.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
