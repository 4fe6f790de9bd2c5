//! Template preprocessing.
//!
//! Sources are Handlebars templates. Every plugin header is prepended to the
//! source, plugin filters are exposed as helpers (usable inline as
//! `{{markdown body}}` or as blocks), and a few environment helpers are bound:
//! `read_file` (relative to `basedir`), `join_path`, and `perf_now`.

use std::{
    collections::HashMap,
    env, fs,
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderErrorReason, Renderable, no_escape,
};
use once_cell::sync::OnceCell;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    error::RenderError,
    plugins::TemplateFilter,
    registry::{PluginRegistry, RegistryState},
};

pub struct TemplatePreprocessor {
    registry: Arc<PluginRegistry>,
    engine: OnceCell<TemplateEngine>,
}

struct TemplateEngine {
    handlebars: Handlebars<'static>,
    header: String,
    data: Value,
}

impl TemplatePreprocessor {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            engine: OnceCell::new(),
        }
    }

    /// Expand a template source into final markup.
    pub async fn expand(&self, source: &str) -> Result<String, RenderError> {
        let state = self.registry.ensure_initialized().await?;
        let engine = self.engine.get_or_init(|| TemplateEngine::build(&state));
        let started_at = Instant::now();

        let combined = format!("{}\n{source}", engine.header);
        let html = engine
            .handlebars
            .render_template(&combined, &engine.data)
            .map_err(|err| {
                warn!(
                    target = "application::template",
                    op = "template::expand",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "Template rendering failed"
                );
                RenderError::Template(err.to_string())
            })?;

        debug!(
            target = "application::template",
            op = "template::expand",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            source_bytes = source.len(),
            html_bytes = html.len(),
            "Template expanded"
        );
        Ok(html)
    }
}

impl TemplateEngine {
    fn build(state: &RegistryState) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Output is markup handed to the browser, not user-facing text.
        handlebars.register_escape_fn(no_escape);

        let mut filters: HashMap<&str, &Arc<dyn TemplateFilter>> = HashMap::new();
        for (name, filter) in &state.hooks.template_filters {
            filters.insert(name.as_str(), filter);
        }
        for (name, filter) in filters {
            handlebars.register_helper(
                name,
                Box::new(FilterHelper {
                    name: name.to_string(),
                    filter: Arc::clone(filter),
                }),
            );
        }

        let basedir = state.config.basedir.clone();
        handlebars.register_helper(
            "read_file",
            Box::new(ReadFileHelper {
                basedir: basedir.clone(),
            }),
        );
        handlebars.register_helper("join_path", Box::new(JoinPathHelper));
        handlebars.register_helper(
            "perf_now",
            Box::new(PerfNowHelper {
                started_at: Instant::now(),
            }),
        );

        let data = json!({
            "__root__": install_root(),
            "basedir": basedir.display().to_string(),
        });

        Self {
            handlebars,
            header: state.hooks.template_headers.join("\n\n"),
            data,
        }
    }
}

/// Directory containing the running binary.
fn install_root() -> String {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.display().to_string()))
        .unwrap_or_default()
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

struct FilterHelper {
    name: String,
    filter: Arc<dyn TemplateFilter>,
}

impl HelperDef for FilterHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let input = match h.template() {
            Some(block) => block.renders(r, ctx, rc)?,
            None => h
                .param(0)
                .map(|param| param_text(param.value()))
                .unwrap_or_default(),
        };

        let rendered = self.filter.apply(&input).map_err(|message| {
            RenderErrorReason::Other(format!("filter `{}` failed: {message}", self.name))
        })?;
        out.write(&rendered)?;
        Ok(())
    }
}

struct ReadFileHelper {
    basedir: PathBuf,
}

impl HelperDef for ReadFileHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let relative = h
            .param(0)
            .map(|param| param_text(param.value()))
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("read_file", 0))?;
        let path = self.basedir.join(&relative);
        let contents = fs::read_to_string(&path).map_err(|err| {
            RenderErrorReason::Other(format!("failed to read `{}`: {err}", path.display()))
        })?;
        out.write(&contents)?;
        Ok(())
    }
}

struct JoinPathHelper;

impl HelperDef for JoinPathHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let joined: PathBuf = h
            .params()
            .iter()
            .map(|param| param_text(param.value()))
            .collect();
        out.write(&joined.display().to_string())?;
        Ok(())
    }
}

struct PerfNowHelper {
    started_at: Instant,
}

impl HelperDef for PerfNowHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        _: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let elapsed_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        out.write(&format!("{elapsed_ms:.3}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        application::plugins::{
            PageBreakPlugin, PluginError, PluginFactory, PluginHooks,
        },
        config::{BrowserSettings, RenderSettings},
    };

    struct StaticPlugin {
        name: &'static str,
        hooks: PluginHooks,
    }

    #[async_trait]
    impl PluginFactory for StaticPlugin {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn construct(&self) -> Result<PluginHooks, PluginError> {
            Ok(self.hooks.clone())
        }
    }

    fn shout(input: &str) -> Result<String, String> {
        Ok(input.to_uppercase())
    }

    fn whisper(input: &str) -> Result<String, String> {
        Ok(input.to_lowercase())
    }

    fn refuse(_: &str) -> Result<String, String> {
        Err("refused".to_string())
    }

    fn preprocessor(basedir: &Path, factories: Vec<Arc<dyn PluginFactory>>) -> TemplatePreprocessor {
        let render = RenderSettings {
            basedir: basedir.to_path_buf(),
            ..RenderSettings::default()
        };
        let registry = PluginRegistry::with_factories(factories, BrowserSettings::default(), render);
        TemplatePreprocessor::new(Arc::new(registry))
    }

    fn static_plugin(name: &'static str, hooks: PluginHooks) -> Arc<dyn PluginFactory> {
        Arc::new(StaticPlugin { name, hooks })
    }

    #[tokio::test]
    async fn headers_are_prepended_with_blank_line_separation() {
        let dir = TempDir::new().expect("temp dir");
        let preprocessor = preprocessor(
            dir.path(),
            vec![
                static_plugin("a", PluginHooks::default().with_header("<style>a</style>")),
                static_plugin("b", PluginHooks::default().with_header("<style>b</style>")),
            ],
        );

        let html = preprocessor.expand("<p>body</p>").await.expect("expand");
        assert_eq!(html, "<style>a</style>\n\n<style>b</style>\n<p>body</p>");
    }

    #[tokio::test]
    async fn later_filters_override_earlier_ones() {
        let dir = TempDir::new().expect("temp dir");
        let preprocessor = preprocessor(
            dir.path(),
            vec![
                static_plugin("loud", PluginHooks::default().with_filter("tone", Arc::new(shout))),
                static_plugin("quiet", PluginHooks::default().with_filter("tone", Arc::new(whisper))),
            ],
        );

        let html = preprocessor
            .expand("{{tone \"MiXeD\"}}|{{#tone}}BlOcK{{/tone}}")
            .await
            .expect("expand");
        assert_eq!(html, "\nmixed|block");
    }

    #[tokio::test]
    async fn environment_helpers_resolve_against_basedir() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("snippet.html"), "<em>included</em>").expect("write");
        let preprocessor = preprocessor(dir.path(), Vec::new());

        let html = preprocessor
            .expand("{{read_file \"snippet.html\"}} {{join_path \"a\" \"b\" \"c.css\"}} {{basedir}}")
            .await
            .expect("expand");

        let expected_join = Path::new("a").join("b").join("c.css");
        assert_eq!(
            html,
            format!(
                "\n<em>included</em> {} {}",
                expected_join.display(),
                dir.path().display()
            )
        );

        let timing = preprocessor.expand("{{perf_now}}").await.expect("expand");
        let elapsed: f64 = timing.trim().parse().expect("numeric");
        assert!(elapsed >= 0.0);

        let root = preprocessor.expand("{{__root__}}").await.expect("expand");
        assert!(!root.trim().is_empty());
    }

    #[tokio::test]
    async fn rendering_errors_are_typed() {
        let dir = TempDir::new().expect("temp dir");
        let preprocessor = preprocessor(
            dir.path(),
            vec![static_plugin("strict", PluginHooks::default().with_filter("strict", Arc::new(refuse)))],
        );

        let unclosed = preprocessor.expand("{{#if}}").await.expect_err("syntax error");
        assert!(matches!(unclosed, RenderError::Template(_)));

        let failed = preprocessor.expand("{{strict \"x\"}}").await.expect_err("filter error");
        assert!(failed.to_string().contains("filter `strict` failed: refused"));

        let missing = preprocessor
            .expand("{{read_file \"absent.html\"}}")
            .await
            .expect_err("missing file");
        assert!(matches!(missing, RenderError::Template(_)));
    }

    #[tokio::test]
    async fn page_break_partial_is_available() {
        let dir = TempDir::new().expect("temp dir");
        let preprocessor = preprocessor(dir.path(), vec![Arc::new(PageBreakPlugin)]);

        let html = preprocessor
            .expand("<p>one</p>{{> page-break}}<p>two</p>")
            .await
            .expect("expand");
        assert!(html.ends_with("<p>one</p><div class=\"page-break\"></div><p>two</p>"));
    }
}
