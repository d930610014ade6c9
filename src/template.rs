//! Placeholder rendering for YAML configs
//!
//! Config files may reference the environment so credentials stay out of
//! the file: `{{ env.DB_PASSWORD }}`. A fallback can follow a pipe,
//! `{{ env.AWS_REGION | us-west-2 }}`, and is used when the name is unset.
//! Names without a `env.` or `vars.` prefix look in `vars` first.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// `{{ path }}` or `{{ path | fallback }}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*(?:\|\s*([^}]*?)\s*)?\}\}",
    )
    .expect("placeholder regex is valid")
});

/// Values placeholders resolve against
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Environment variables
    pub env: Value,
    /// Extra values supplied by the caller
    pub vars: Value,
}

impl TemplateContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context holding the current process environment
    pub fn from_env() -> Self {
        let env: Map<String, Value> = std::env::vars()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Self {
            env: Value::Object(env),
            vars: Value::Null,
        }
    }

    pub fn set_env(&mut self, env: Value) -> &mut Self {
        self.env = env;
        self
    }

    pub fn set_vars(&mut self, vars: Value) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Resolve a dotted path such as `env.DB_PASSWORD` or `vars.s3.bucket`
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = path.split('.').collect();
        match segments.split_first() {
            Some((&"env", rest)) => walk(&self.env, rest),
            Some((&"vars", rest)) => walk(&self.vars, rest),
            _ => walk(&self.vars, &segments).or_else(|| walk(&self.env, &segments)),
        }
    }
}

fn walk<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(*segment))
        .filter(|value| !value.is_null())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Substitute every placeholder in `text`
///
/// All unresolved names (without a fallback) are reported together.
pub fn render(text: &str, ctx: &TemplateContext) -> Result<String> {
    let mut unresolved = Vec::new();

    let rendered = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let path = &caps[1];
        match (ctx.lookup(path), caps.get(2)) {
            (Some(value), _) => scalar_text(value),
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => {
                unresolved.push(path.to_string());
                caps[0].to_string()
            }
        }
    });

    if unresolved.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(unresolved.join(", ")))
    }
}
