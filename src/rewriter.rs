use tracing::debug;

use crate::detector::is_candidate;
use crate::document::Paragraph;
use crate::protocol::{Translation, translate};
use crate::providers::{Provider, ProviderUsage};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Blank or no parenthesis pair; the oracle was not called.
    Skipped,
    /// The oracle was called but the paragraph kept its text.
    Unchanged,
    Rewritten,
}

#[derive(Debug)]
pub struct Rewrite {
    pub outcome: RewriteOutcome,
    pub usage: Option<ProviderUsage>,
    /// The oracle failed and the original text was kept.
    pub fell_back: bool,
}

pub async fn rewrite<P: Provider>(
    provider: &P,
    paragraph: &mut Paragraph,
    settings: &Settings,
) -> Rewrite {
    if paragraph.is_blank() || !is_candidate(paragraph.text()) {
        return Rewrite {
            outcome: RewriteOutcome::Skipped,
            usage: None,
            fell_back: false,
        };
    }

    let Translation {
        text,
        usage,
        fallback,
        ..
    } = translate(provider, paragraph.text(), settings).await;
    let outcome = if text.is_empty() || text == paragraph.text() {
        RewriteOutcome::Unchanged
    } else {
        paragraph.set_text(&text);
        RewriteOutcome::Rewritten
    };
    debug!(?outcome, chars = text.chars().count(), "paragraph processed");
    Rewrite {
        outcome,
        usage,
        fell_back: fallback.is_some(),
    }
}
