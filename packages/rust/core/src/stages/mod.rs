//! Model-driven pipeline stages.
//!
//! Each stage builds one prompt from upstream artifacts, calls a
//! [`TextGenerator`], and parses the answer. Stages with a safe default
//! (insights, budget) absorb unparsable answers; the others return the error
//! for the driver to attach to the stage.

mod brief;
mod budget;
mod insights;
mod keyword;
mod writer;

use serde::de::DeserializeOwned;

use seoforge_llm::{Prompt, TextGenerator};
use seoforge_shared::{Result, StructuredError, parse_structured};

pub use brief::BriefBuilder;
pub use budget::{BudgetAllocator, fallback_budget};
pub use insights::InsightMiner;
pub use keyword::KeywordSelector;
pub use writer::{ArticleWriter, WritingInput, keyword_occurrences};

/// Outcome of a structured request: generation failures are already errors,
/// parse failures are left to the stage.
pub(crate) async fn ask_structured<T: DeserializeOwned>(
    generator: &dyn TextGenerator,
    prompt: &Prompt,
) -> Result<std::result::Result<T, StructuredError>> {
    let raw = generator.generate(prompt).await?;
    Ok(parse_structured(&raw))
}

/// Bulleted list, or a placeholder when empty.
pub(crate) fn bullets(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
