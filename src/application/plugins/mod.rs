//! Plugin contract and the built-in plugin set.
//!
//! A plugin is an async factory that contributes entries to four hook kinds:
//! template headers, named template filters, first-pass page modifiers, and
//! second-pass page modifiers.

mod header_footer;
mod highlight;
mod markdown;
mod page_break;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{application::error::RenderError, infra::browser::PageHandle};

pub use header_footer::HeaderFooterPlugin;
pub use highlight::HighlightPlugin;
pub use markdown::MarkdownPlugin;
pub use page_break::PageBreakPlugin;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to load {asset}: {message}")]
    Asset {
        asset: &'static str,
        message: String,
    },
    #[error("{0}")]
    Other(String),
}

impl PluginError {
    pub fn asset(asset: &'static str, message: impl Into<String>) -> Self {
        Self::Asset {
            asset,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait PluginFactory: Send + Sync {
    fn name(&self) -> &'static str;

    async fn construct(&self) -> Result<PluginHooks, PluginError>;
}

/// Named text transform exposed to templates.
pub trait TemplateFilter: Send + Sync {
    fn apply(&self, input: &str) -> Result<String, String>;
}

impl<F> TemplateFilter for F
where
    F: Fn(&str) -> Result<String, String> + Send + Sync,
{
    fn apply(&self, input: &str) -> Result<String, String> {
        self(input)
    }
}

/// Mutates a loaded page before it is printed.
#[async_trait]
pub trait PageModifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn modify(&self, page: &dyn PageHandle) -> Result<(), RenderError>;
}

/// Hook contributions of a single plugin.
#[derive(Default, Clone)]
pub struct PluginHooks {
    pub template_headers: Vec<String>,
    pub template_filters: Vec<(String, Arc<dyn TemplateFilter>)>,
    pub page_modifiers: Vec<Arc<dyn PageModifier>>,
    pub second_pass_modifiers: Vec<Arc<dyn PageModifier>>,
}

impl std::fmt::Debug for PluginHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHooks")
            .field("template_headers", &self.template_headers)
            .field(
                "template_filters",
                &self.template_filters.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field(
                "page_modifiers",
                &self.page_modifiers.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field(
                "second_pass_modifiers",
                &self.second_pass_modifiers.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PluginHooks {
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.template_headers.push(header.into());
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, filter: Arc<dyn TemplateFilter>) -> Self {
        self.template_filters.push((name.into(), filter));
        self
    }

    pub fn with_page_modifier(mut self, modifier: Arc<dyn PageModifier>) -> Self {
        self.page_modifiers.push(modifier);
        self
    }

    pub fn with_second_pass_modifier(mut self, modifier: Arc<dyn PageModifier>) -> Self {
        self.second_pass_modifiers.push(modifier);
        self
    }
}

/// Built-in plugins in declaration order.
pub fn builtin_factories() -> Vec<Arc<dyn PluginFactory>> {
    vec![
        Arc::new(MarkdownPlugin),
        Arc::new(HighlightPlugin::default()),
        Arc::new(PageBreakPlugin),
        Arc::new(HeaderFooterPlugin),
    ]
}
