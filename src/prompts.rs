//! Prompt templates for brainstorming, generation and judging.
//!
//! Pure rendering; provider-agnostic.

use crate::gateway::Message;
use crate::types::{Angle, InspirationWord};

// =============================================================================
// Prompt templates
// =============================================================================

/// Rendered prompt ready for LLM.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Escape XML special characters to prevent prompt injection via tag breaking.
pub(crate) fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// A prompt template with `{name}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Substitute each `{key}` with its escaped value. Unknown placeholders are left as-is.
    pub fn render(&self, vars: &[(&str, &str)]) -> PromptInstance {
        let fill = |text: &str| {
            vars.iter().fold(text.to_string(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), &escape_xml_chars(value.trim()))
            })
        };

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: fill(self.system).trim().to_string(),
            user: fill(self.user).trim().to_string(),
        }
    }
}

// =============================================================================
// Standard prompts
// =============================================================================

pub const BRAINSTORM_PROMPT: PromptTemplate = PromptTemplate {
    slug: "brainstorm_v1",
    system: r#"You are the gag writer for a SimCity 2000 style city newspaper. You find the comedic angles hiding in ordinary news: puns, absurd escalation, bureaucratic deadpan, mock outrage, wordplay.

Output only valid JSON: {"angles": [{"name": "...", "setup": "..."}]}. `name` is a short label for the comedic strategy; `setup` is one sentence describing how a headline would use it."#,
    user: r#"<headline>
{headline}
</headline>

<inspiration_words>
{words}
</inspiration_words>

Brainstorm {count} distinct comedic angles for rewriting this headline. Each angle should take a different approach; the inspiration words are optional seasoning, use them where they help.

json:"#,
};

pub const GENERATE_PROMPT: PromptTemplate = PromptTemplate {
    slug: "generate_v1",
    system: r#"You are a copywriter who writes short headlines in a pithy, succinct, funny, satirical style like the New York Post.

Output only valid JSON: {"headlines": ["...", "..."]}. No quotes around headlines, no trailing period."#,
    user: r#"<headline>
{headline}
</headline>

<angle name="{angle}">
{setup}
</angle>

Write {count} rewrites of this headline using the angle above. Each rewrite should stand alone as a headline.

json:"#,
};

pub const JUDGE_PROMPT: PromptTemplate = PromptTemplate {
    slug: "judge_v1",
    system: r#"You judge satirical newspaper headlines. Value CRAFT as much as humor:
- Clever alliteration or assonance
- Puns that actually work phonetically
- Unexpected wordplay or double meanings
- Rhythm and flow when read aloud
- How well the joke plays off the original headline

A straightforward joke that lands is good, but a headline with clever linguistic craft is equally valuable."#,
    user: r#"Which satirical headline is better? Consider the original news and the comedic approach.

<headline_A>
{entry_A}
</headline_A>

<headline_B>
{entry_B}
</headline_B>

Reply with ONLY the letter A or B, nothing else."#,
};

pub fn brainstorm_prompt(headline: &str, words: &[InspirationWord], count: usize) -> PromptInstance {
    let words = words
        .iter()
        .map(|w| format!("- {} ({})", w.text, w.category))
        .collect::<Vec<_>>()
        .join("\n");
    let count = count.to_string();
    BRAINSTORM_PROMPT.render(&[("headline", headline), ("words", &words), ("count", &count)])
}

pub fn generate_prompt(headline: &str, angle: &Angle, count: usize) -> PromptInstance {
    let count = count.to_string();
    GENERATE_PROMPT.render(&[
        ("headline", headline),
        ("angle", &angle.name),
        ("setup", &angle.setup),
        ("count", &count),
    ])
}

/// One side of a judge prompt: the candidate headline plus what it is riffing on.
pub fn judge_entry(headline: &str, original: &str, angle: &Angle) -> String {
    format!(
        "Headline: {headline}\nOriginal: {original}\nComedic angle: {}\nApproach: {}",
        angle.name, angle.setup
    )
}

pub fn judge_prompt(entry_a: &str, entry_b: &str) -> PromptInstance {
    JUDGE_PROMPT.render(&[("entry_A", entry_a), ("entry_B", entry_b)])
}

// =============================================================================
// TESTS
// =============================================================================
