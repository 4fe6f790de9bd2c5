//! Render option negotiation against a loaded page, followed by the two page-modifier passes.

use std::{sync::Arc, time::Instant};

use tracing::{debug, warn};

use crate::{
    domain::options::{PageDirectives, RenderOptions},
    infra::browser::PageHandle,
};

use super::{error::RenderError, plugins::PageModifier, registry::PluginHookSet};

pub const HEADER_SELECTOR: &str = "#page-header";
pub const FOOTER_SELECTOR: &str = "#page-footer";

/// Page-modifier phases. Every first-pass hook finishes before any second-pass hook starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierPass {
    First,
    Second,
}

impl ModifierPass {
    pub fn as_str(self) -> &'static str {
        match self {
            ModifierPass::First => "first",
            ModifierPass::Second => "second",
        }
    }
}

/// Derive render options from a loaded page, then run both modifier passes.
pub async fn extract_options(
    page: &dyn PageHandle,
    hooks: &PluginHookSet,
) -> Result<RenderOptions, RenderError> {
    let started_at = Instant::now();

    let header = page.inner_html(HEADER_SELECTOR).await?;
    let footer = page.inner_html(FOOTER_SELECTOR).await?;
    let mut options = RenderOptions::with_header_footer(header, footer);

    let content = page.content().await?;
    options.apply_directives(PageDirectives::scan(&content));

    run_pass(ModifierPass::First, &hooks.page_modifiers, page).await?;
    run_pass(ModifierPass::Second, &hooks.second_pass_modifiers, page).await?;

    debug!(
        target = "application::extractor",
        op = "extractor::extract_options",
        result = "ok",
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        display_header_footer = options.display_header_footer,
        width = ?options.width,
        height = ?options.height,
        page_size = ?options.page_size,
        "Render options extracted"
    );

    Ok(options)
}

async fn run_pass(
    pass: ModifierPass,
    modifiers: &[Arc<dyn PageModifier>],
    page: &dyn PageHandle,
) -> Result<(), RenderError> {
    for modifier in modifiers {
        modifier.modify(page).await.map_err(|err| {
            warn!(
                target = "application::extractor",
                op = "extractor::run_pass",
                result = "error",
                pass = pass.as_str(),
                modifier = modifier.name(),
                error = %err,
                "Page modifier failed"
            );
            err
        })?;
    }
    Ok(())
}
