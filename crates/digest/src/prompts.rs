//! Prompt template management.

use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use serde::Serialize;

use crate::error::DigestResult;
use crate::types::Paper;

/// Template names.
pub const RANK_TEMPLATE_NAME: &str = "rank";
pub const GENERATE_TEMPLATE_NAME: &str = "generate";

const TITLE_LIMIT: usize = 220;
const CATEGORY_LIMIT: usize = 60;
const ABSTRACT_LIMIT: usize = 900;

/// Manages Handlebars prompt templates.
pub struct PromptManager {
    handlebars: Handlebars<'static>,
}

impl PromptManager {
    /// Create a new prompt manager with embedded templates.
    pub fn new() -> DigestResult<Self> {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text; HTML escaping would corrupt abstracts.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);

        handlebars.register_template_string(RANK_TEMPLATE_NAME, RANK_TEMPLATE)?;
        handlebars.register_template_string(GENERATE_TEMPLATE_NAME, GENERATE_TEMPLATE)?;

        Ok(Self { handlebars })
    }

    /// Render a template with the given data.
    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> DigestResult<String> {
        Ok(self.handlebars.render(template, data)?)
    }
}

/// Paper fields as they appear in prompts.
#[derive(Debug, Serialize)]
pub struct PromptPaper {
    pub id: String,
    pub title: String,
    pub category: String,
    pub date: String,
    pub doi: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl From<&Paper> for PromptPaper {
    fn from(paper: &Paper) -> Self {
        Self {
            id: paper.id.clone(),
            title: clip(&paper.title, TITLE_LIMIT),
            category: clip(&paper.category, CATEGORY_LIMIT),
            date: paper.date.format("%Y-%m-%d").to_string(),
            doi: paper.doi.clone(),
            abstract_text: clip(&paper.abstract_text, ABSTRACT_LIMIT),
        }
    }
}

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Collapse whitespace and cut to `limit` characters, marking the cut with `…`.
pub fn clip(text: &str, limit: usize) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let collapsed = collapsed.trim();

    if collapsed.chars().count() <= limit {
        collapsed.to_string()
    } else {
        let truncated: String = collapsed.chars().take(limit).collect();
        format!("{truncated}…")
    }
}

/// Ranking prompt template.
const RANK_TEMPLATE: &str = r#"You are a research assistant ranking {{server}} preprints for a daily email digest.

USER_INTERESTS:
{{interests}}

TASK:
- Select the {{selection_size}} papers most relevant to USER_INTERESTS.
- Favour papers which target major problems in their field, make novel contributions, and show solid methodological rigor relative to the other papers in the list.
- Only use ids from the PAPERS list. Never invent papers and never repeat an id.
- For each selected paper give a one-sentence reason covering relevance, impact and rigor.
- Give a two-sentence overall rationale for the selection.

OUTPUT: Return ONLY valid JSON with this schema, best paper first:
{
  "selected": [
    {"id": "P01", "reason": "..."}
  ],
  "rationale": "..."
}

PAPERS:
{{#each papers}}
- [{{this.id}}] Title: {{this.title}} | Category: {{this.category}} | Date: {{this.date}} | DOI: {{this.doi}}
  Abstract: {{this.abstract}}
{{/each}}"#;

/// Content generation prompt template.
const GENERATE_TEMPLATE: &str = r#"You are writing the body of a daily {{server}} digest email.

USER_INTERESTS:
{{interests}}

SELECTED PAPERS:
{{#each papers}}
- [{{this.id}}] Title: {{this.title}} | Category: {{this.category}} | DOI: {{this.doi}}
  Abstract: {{this.abstract}}
{{/each}}

TASK:
- "summaries": for EVERY selected paper, a three sentence summary understandable to a second year undergraduate student in the field.
- "idea": 3-6 points describing which existing paradigms and opinions change given these results. Think beyond the first-order conclusions to their consequences, without speculating too much.
- "general_concept": 3-4 points explaining {{general_topic}}. The first point immediately begins explaining the concept; no title or naming-only point. Emphasize structure, mechanisms, formal insights or non-obvious implications rather than introductory definitions, for a well-educated reader who wants nontrivial insight rather than a textbook overview.
- "specific_concept": choose exactly ONE advanced, graduate-level concept from USER_INTERESTS that is non-introductory and non-textbook (avoid canonical topics such as allostery, basic Bayesian inference or classic signaling pathways). It does not need to relate to the papers. Give its name and 3-4 points on mechanism, formal structure or nuanced implications; the first point immediately begins explaining it.
- Plain text only in every string: no markdown, headings, bold or italics.

OUTPUT: Return ONLY valid JSON with this schema:
{
  "summaries": [
    {"id": "P01", "summary": "..."}
  ],
  "idea": ["...", "..."],
  "general_concept": ["...", "..."],
  "specific_concept": {"name": "...", "points": ["...", "..."]}
}"#;
