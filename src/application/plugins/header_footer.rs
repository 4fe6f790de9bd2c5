use std::sync::Arc;

use async_trait::async_trait;

use super::{PageModifier, PluginError, PluginFactory, PluginHooks};
use crate::{application::error::RenderError, infra::browser::PageHandle};

/// Header and footer markup is printed in the page margins, so the source
/// elements are removed from the body once their markup has been captured.
const REMOVE_HEADER_FOOTER: &str = r#"(() => {
  for (const id of ['page-header', 'page-footer']) {
    const el = document.getElementById(id);
    if (el !== null) { el.remove(); }
  }
  return true;
})()"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderFooterPlugin;

#[async_trait]
impl PluginFactory for HeaderFooterPlugin {
    fn name(&self) -> &'static str {
        "header-footer"
    }

    async fn construct(&self) -> Result<PluginHooks, PluginError> {
        Ok(PluginHooks::default().with_page_modifier(Arc::new(RemoveHeaderFooter)))
    }
}

struct RemoveHeaderFooter;

#[async_trait]
impl PageModifier for RemoveHeaderFooter {
    fn name(&self) -> &'static str {
        "header-footer"
    }

    async fn modify(&self, page: &dyn PageHandle) -> Result<(), RenderError> {
        page.evaluate(REMOVE_HEADER_FOOTER).await?;
        Ok(())
    }
}
