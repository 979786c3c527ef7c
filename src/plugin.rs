//! Host-independent plugin contract and the QueryLens plugin.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::LensEngine;

/// Query parameter that turns a request into a streaming session.
pub const STREAM_PARAM: &str = "lens";

/// Query parameter carrying comma separated relevant document ids.
pub const RELEVANT_PARAM: &str = "relevant";

/// Who may use a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Public,
    User,
    Admin,
}

/// Descriptive metadata shown by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDetails {
    pub title: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub project_url: String,
}

/// An incoming HTTP request, reduced to what plugins look at.
#[derive(Debug, Clone, Default)]
pub struct PluginRequest {
    /// URL query parameters.
    pub params: HashMap<String, String>,
    /// Posted form fields.
    pub form: HashMap<String, String>,
}

impl PluginRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// What the host should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginResponse {
    /// Upgrade to a streaming session judging `relevant` documents.
    Stream { relevant: Vec<String> },
    /// Serve an HTML page.
    Page(String),
}

/// A capability the host can mount.
pub trait Plugin: Send + Sync {
    fn handle(&self, request: &PluginRequest) -> PluginResponse;

    fn required_permission(&self) -> Permission;

    fn details(&self) -> PluginDetails;
}

/// Query refinement and exploration.
#[derive(Debug, Clone)]
pub struct QueryLensPlugin {
    engine: Arc<LensEngine>,
}

impl QueryLensPlugin {
    pub fn new(engine: Arc<LensEngine>) -> Self {
        QueryLensPlugin { engine }
    }

    pub fn engine(&self) -> &Arc<LensEngine> {
        &self.engine
    }
}

impl Plugin for QueryLensPlugin {
    fn handle(&self, request: &PluginRequest) -> PluginResponse {
        if request.param(STREAM_PARAM) == Some("y") {
            let relevant = request
                .param(RELEVANT_PARAM)
                .map(parse_relevant)
                .unwrap_or_default();
            return PluginResponse::Stream { relevant };
        }

        let field = |name: &str| {
            request
                .form
                .get(name)
                .or_else(|| request.params.get(name))
                .map(String::as_str)
                .unwrap_or("")
        };
        PluginResponse::Page(render_form(
            field("query"),
            field("lang"),
            self.engine.dialects().tags(),
        ))
    }

    fn required_permission(&self) -> Permission {
        Permission::User
    }

    fn details(&self) -> PluginDetails {
        PluginDetails {
            title: "QueryLens".to_string(),
            description: "(Semi)-Automatic query refinement and exploration.".to_string(),
            author: "Harry Scells".to_string(),
            version: crate::VERSION.to_string(),
            project_url: "https://github.com/hscells/querylens".to_string(),
        }
    }
}

/// Split a comma separated id list, dropping blanks.
pub fn parse_relevant(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The static entry page. `query` and `lang` only prefill the form.
pub fn render_form(query: &str, lang: &str, dialects: Vec<&str>) -> String {
    let options: String = dialects
        .iter()
        .map(|tag| {
            let selected = if tag.eq_ignore_ascii_case(lang) { " selected" } else { "" };
            format!(
                "<option value=\"{0}\"{1}>{0}</option>",
                escape_html(tag),
                selected
            )
        })
        .collect();
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>QueryLens</title></head>\n\
         <body>\n\
         <h1>QueryLens</h1>\n\
         <form method=\"post\">\n\
         <textarea name=\"query\" rows=\"10\" cols=\"80\">{}</textarea>\n\
         <select name=\"lang\">{}</select>\n\
         <button type=\"submit\">Refine</button>\n\
         </form>\n\
         </body>\n\
         </html>\n",
        escape_html(query),
        options
    )
}
