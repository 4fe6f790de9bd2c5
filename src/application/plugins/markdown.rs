use std::sync::Arc;

use async_trait::async_trait;
use comrak::{markdown_to_html, options::Options};

use super::{PluginError, PluginFactory, PluginHooks, TemplateFilter};

/// Contributes the `markdown` template filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownPlugin;

#[async_trait]
impl PluginFactory for MarkdownPlugin {
    fn name(&self) -> &'static str {
        "markdown"
    }

    async fn construct(&self) -> Result<PluginHooks, PluginError> {
        let filter = MarkdownFilter {
            options: markdown_options(),
        };
        Ok(PluginHooks::default().with_filter("markdown", Arc::new(filter)))
    }
}

struct MarkdownFilter {
    options: Options<'static>,
}

impl TemplateFilter for MarkdownFilter {
    fn apply(&self, input: &str) -> Result<String, String> {
        Ok(markdown_to_html(input, &self.options))
    }
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;

    // Templates are trusted input; raw HTML passes through.
    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = true;

    options
}
