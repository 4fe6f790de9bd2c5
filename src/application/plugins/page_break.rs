use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{PageModifier, PluginError, PluginFactory, PluginHooks};
use crate::{application::error::RenderError, infra::browser::PageHandle};

/// Inline partial so templates can write `{{> page-break}}`.
const PAGE_BREAK_PARTIAL: &str =
    r#"{{#*inline "page-break"}}<div class="page-break"></div>{{/inline}}"#;

const APPLY_PAGE_BREAKS: &str = r#"(() => {
  const breaks = document.querySelectorAll('.page-break');
  breaks.forEach((el) => { el.style.breakAfter = 'page'; });
  return breaks.length;
})()"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct PageBreakPlugin;

#[async_trait]
impl PluginFactory for PageBreakPlugin {
    fn name(&self) -> &'static str {
        "page-break"
    }

    async fn construct(&self) -> Result<PluginHooks, PluginError> {
        Ok(PluginHooks::default()
            .with_header(PAGE_BREAK_PARTIAL)
            .with_second_pass_modifier(Arc::new(ApplyPageBreaks)))
    }
}

struct ApplyPageBreaks;

#[async_trait]
impl PageModifier for ApplyPageBreaks {
    fn name(&self) -> &'static str {
        "page-break"
    }

    async fn modify(&self, page: &dyn PageHandle) -> Result<(), RenderError> {
        let applied = page.evaluate(APPLY_PAGE_BREAKS).await?;
        debug!(
            target = "application::plugins::page_break",
            op = "page_break::modify",
            result = "ok",
            breaks = applied.as_u64().unwrap_or(0),
            "Page breaks applied"
        );
        Ok(())
    }
}
