use std::sync::Arc;

use async_trait::async_trait;
use syntect::{
    highlighting::ThemeSet,
    html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};
use tracing::info;

use super::{PluginError, PluginFactory, PluginHooks, TemplateFilter};

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "syntax-" };
const DEFAULT_THEME: &str = "InspiredGitHub";

/// Contributes the `highlight` filter and the stylesheet its markup needs.
#[derive(Debug, Clone)]
pub struct HighlightPlugin {
    theme: String,
}

impl Default for HighlightPlugin {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl HighlightPlugin {
    pub fn with_theme(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
        }
    }
}

#[async_trait]
impl PluginFactory for HighlightPlugin {
    fn name(&self) -> &'static str {
        "highlight"
    }

    async fn construct(&self) -> Result<PluginHooks, PluginError> {
        let started_at = std::time::Instant::now();
        let (syntax_set, themes) = tokio::task::spawn_blocking(|| {
            (SyntaxSet::load_defaults_newlines(), ThemeSet::load_defaults())
        })
        .await
        .map_err(|err| PluginError::asset("syntax definitions", err.to_string()))?;

        let theme = themes
            .themes
            .get(&self.theme)
            .ok_or_else(|| PluginError::asset("highlight theme", format!("unknown theme `{}`", self.theme)))?;
        let css = css_for_theme_with_class_style(theme, CLASS_STYLE)
            .map_err(|err| PluginError::asset("highlight theme", err.to_string()))?;

        info!(
            target = "application::plugins::highlight",
            op = "highlight::construct",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            syntaxes = syntax_set.syntaxes().len(),
            theme = %self.theme,
            "Syntax highlighting assets loaded"
        );

        Ok(PluginHooks::default()
            .with_header(format!("<style>\n{css}</style>"))
            .with_filter("highlight", Arc::new(HighlightFilter { syntax_set })))
    }
}

struct HighlightFilter {
    syntax_set: SyntaxSet,
}

impl TemplateFilter for HighlightFilter {
    /// Input may be wrapped in a fence (```` ```rust ````) naming the language.
    fn apply(&self, input: &str) -> Result<String, String> {
        let (language, code) = split_fence(input);
        highlight_code(language, code, &self.syntax_set)
    }
}

fn split_fence(input: &str) -> (Option<&str>, &str) {
    let trimmed = input.trim_matches('\n');
    let Some(rest) = trimmed.strip_prefix("```") else {
        return (None, trimmed);
    };
    let (info, body) = rest.split_once('\n').unwrap_or((rest, ""));
    let body = body
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim_end_matches('\n');
    let language = info.split_whitespace().next();
    (language, body)
}

fn highlight_code(
    language: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
) -> Result<String, String> {
    let syntax = match language {
        Some(token) => find_syntax(syntax_set, token),
        None => code
            .lines()
            .next()
            .and_then(|line| syntax_set.find_syntax_by_first_line(line)),
    }
    .unwrap_or_else(|| syntax_set.find_syntax_plain_text());
    let lang_token = language.unwrap_or("text").to_ascii_lowercase();

    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, CLASS_STYLE);
    for line in LinesWithEndings::from(code_with_newline.as_str()) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| format!("failed to highlight `{lang_token}`: {err}"))?;
    }

    Ok(format!(
        "<pre class=\"syntax-highlight syntax-lang-{lang_token}\" data-language=\"{lang_token}\"><code class=\"language-{lang_token} syntax-code\">{}</code></pre>",
        generator.finalize()
    ))
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}
