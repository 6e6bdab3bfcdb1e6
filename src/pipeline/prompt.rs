use super::references::ReferenceSnippet;
use super::types::ValidatedRequest;
use crate::llm::ChatMessage;
use crate::store::StyleProfile;
use crate::utils::text::{char_len, clip_chars};
use anyhow::{Context as _, Result};
use tera::{Context, Tera};

const GENERATE_SYSTEM: &str = "generate_system";
const GENERATE_USER: &str = "generate_user";
const ADJUST_SYSTEM: &str = "adjust_system";
const ADJUST_USER: &str = "adjust_user";

const GENERATE_SYSTEM_TEMPLATE: &str = r#"You are a writing assistant that writes new articles in the author's own voice. Follow the style summary strictly: tone, structure, subheading density, common phrasing, paragraph rhythm, and the usual opening and closing patterns.

Output format: reply with exactly one JSON object and nothing else. Do not wrap it in a markdown code block.
{"title":"Article title","article":"Body text, using \n for line breaks"}

Rules:
- The title is concise and matches the tone of the style summary.
- The body length, counted in characters, must stay within ±{{ tolerance_percent }}% of the target length.
- Write in the language of the outline.
{%- if has_optional_sections %}
- Honor every additional section the user supplies (persona, constraints, concrete cases, reference excerpts).
{%- endif %}
- Follow the subheading instruction exactly."#;

const GENERATE_USER_TEMPLATE: &str = r#"Target length (characters): {{ target_length }}

Outline:
{{ outline }}

Key points:
{{ key_points }}

Style summary:
{{ style_summary }}
{%- if author_persona %}

Author persona:
{{ author_persona }}
{%- endif %}
{%- if constraint_conditions %}

Constraints:
{{ constraint_conditions }}
{%- endif %}
{%- if concrete_cases %}

Concrete cases to include:
{{ concrete_cases }}
{%- endif %}
{%- if references %}

Reference excerpts (background material; do not copy verbatim):
{%- for reference in references %}

[{{ loop.index }}] {{ reference.source_url }}
{{ reference.text }}
{%- endfor %}
{%- endif %}

Subheadings: {% if include_subheadings %}use subheadings to structure the body.{% else %}no subheadings; write continuous paragraphs.{% endif %}

Reply with the JSON object only: {"title":"...","article":"..."}"#;

const ADJUST_SYSTEM_TEMPLATE: &str = r#"Reply with exactly one JSON object {"title":"...","article":"..."} and nothing else. No markdown code blocks."#;

const ADJUST_USER_TEMPLATE: &str = r#"The current body has about {{ current_chars }} characters; the target is {{ target_length }}.
{% if action == "expand" %}Expand{% else %}Compress and tighten{% endif %} the body below so its length comes as close to {{ target_length }} characters as possible (within ±{{ tolerance_percent }}%), keeping the style unchanged.
Keep the title exactly as: {{ title }}
The output format is unchanged: only the JSON object {"title":"...","article":"..."}, with \n for line breaks in the body.
{%- if author_persona %}

Author persona to keep:
{{ author_persona }}
{%- endif %}
{%- if constraint_conditions %}

Constraints that still apply:
{{ constraint_conditions }}
{%- endif %}
{%- if concrete_cases %}

Concrete cases that must remain:
{{ concrete_cases }}
{%- endif %}

Subheadings: {% if include_subheadings %}keep using subheadings.{% else %}no subheadings.{% endif %}

Current body:
{{ body }}"#;

/// Direction of a length adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustAction {
    Expand,
    Compress,
}

impl AdjustAction {
    /// `expand` when the body is short of the target, otherwise `compress`.
    pub fn for_lengths(current_chars: usize, target_length: u32) -> Self {
        if current_chars < target_length as usize {
            Self::Expand
        } else {
            Self::Compress
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expand => "expand",
            Self::Compress => "compress",
        }
    }
}

/// Inputs of one length-adjustment prompt.
#[derive(Debug, Clone, Copy)]
pub struct AdjustmentPrompt<'a> {
    pub action: AdjustAction,
    pub title: &'a str,
    pub body: &'a str,
    pub current_chars: usize,
    pub request: &'a ValidatedRequest,
}

/// Style text for the prompt: the summary, else the structured document, else `{}`.
pub fn style_summary_text(style: Option<&StyleProfile>) -> String {
    match style {
        Some(profile) if !profile.summary.trim().is_empty() => profile.summary.trim().to_string(),
        Some(profile) if !profile.structured.is_null() => profile.structured.to_string(),
        _ => "{}".to_string(),
    }
}

/// Renders generation and adjustment prompts from built-in templates.
pub struct PromptComposer {
    tera: Tera,
    tolerance_percent: u32,
    adjust_body_cap: usize,
}

impl PromptComposer {
    pub fn new(tolerance: f64, adjust_body_cap: usize) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (GENERATE_SYSTEM, GENERATE_SYSTEM_TEMPLATE),
            (GENERATE_USER, GENERATE_USER_TEMPLATE),
            (ADJUST_SYSTEM, ADJUST_SYSTEM_TEMPLATE),
            (ADJUST_USER, ADJUST_USER_TEMPLATE),
        ])
        .context("Failed to register prompt templates")?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let tolerance_percent = (tolerance * 100.0).round().max(0.0) as u32;

        Ok(Self {
            tera,
            tolerance_percent,
            adjust_body_cap,
        })
    }

    /// System + user messages for the initial generation.
    pub fn compose(
        &self,
        request: &ValidatedRequest,
        style: Option<&StyleProfile>,
        references: &[ReferenceSnippet],
    ) -> Result<Vec<ChatMessage>> {
        let mut ctx = Context::new();
        ctx.insert("tolerance_percent", &self.tolerance_percent);
        ctx.insert(
            "has_optional_sections",
            &(request.author_persona.is_some()
                || request.constraint_conditions.is_some()
                || request.concrete_cases.is_some()
                || !references.is_empty()),
        );
        ctx.insert("target_length", &request.target_length);
        ctx.insert("outline", &request.content_outline);
        ctx.insert("key_points", &request.key_points);
        ctx.insert("style_summary", &style_summary_text(style));
        insert_optional_sections(&mut ctx, request);
        ctx.insert("references", references);

        let system = self.tera.render(GENERATE_SYSTEM, &ctx)?;
        let user = self.tera.render(GENERATE_USER, &ctx)?;
        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    /// Narrower prompt asking the model to resize an existing body.
    pub fn compose_adjustment(&self, prompt: &AdjustmentPrompt<'_>) -> Result<Vec<ChatMessage>> {
        let body = clip_chars(prompt.body, self.adjust_body_cap);
        if char_len(body) < prompt.current_chars {
            tracing::debug!(
                cap = self.adjust_body_cap,
                "Adjustment body clipped before sending"
            );
        }

        let mut ctx = Context::new();
        ctx.insert("tolerance_percent", &self.tolerance_percent);
        ctx.insert("action", prompt.action.as_str());
        ctx.insert("current_chars", &prompt.current_chars);
        ctx.insert("target_length", &prompt.request.target_length);
        ctx.insert("title", prompt.title);
        ctx.insert("body", body);
        insert_optional_sections(&mut ctx, prompt.request);

        let system = self.tera.render(ADJUST_SYSTEM, &ctx)?;
        let user = self.tera.render(ADJUST_USER, &ctx)?;
        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

fn insert_optional_sections(ctx: &mut Context, request: &ValidatedRequest) {
    ctx.insert("author_persona", &request.author_persona);
    ctx.insert("constraint_conditions", &request.constraint_conditions);
    ctx.insert("concrete_cases", &request.concrete_cases);
    ctx.insert("include_subheadings", &request.include_subheadings);
}
