use crate::model::{ParamLocation, ParameterSpec, ToolDescriptor};
use crate::services::secrets::SecretService;
use crate::utils::redact::ENV_PLACEHOLDER;
use crate::utils::shell;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

// Everything but the characters encodeURIComponent leaves alone.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitutes caller parameters into configured templates. Placeholders
/// without a matching parameter stay verbatim; the downstream service
/// rejects or tolerates them on its own terms.
pub struct ParameterBinder {
    secrets: Arc<SecretService>,
}

impl ParameterBinder {
    pub fn new(secrets: Arc<SecretService>) -> Self {
        Self { secrets }
    }

    /// Fills in declared defaults for parameters the caller omitted.
    pub fn apply_defaults(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut bound = params.clone();
        for spec in &tool.parameters {
            if !bound.contains_key(&spec.name) {
                if let Some(default) = &spec.default {
                    bound.insert(spec.name.clone(), default.clone());
                }
            }
        }
        bound
    }

    /// Every URL substitution is percent-encoded, whether the
    /// parameter is path-located or caught by the second pass.
    pub fn interpolate_url(
        &self,
        template: &str,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> String {
        let mut url = template.to_string();
        for spec in located(tool, ParamLocation::Path) {
            if let Some(value) = params.get(&spec.name) {
                let encoded =
                    utf8_percent_encode(&value_as_text(value), URL_COMPONENT).to_string();
                url = url.replace(&placeholder(&spec.name), &encoded);
            }
        }
        for (name, value) in params {
            let encoded = utf8_percent_encode(&value_as_text(value), URL_COMPONENT).to_string();
            url = url.replace(&placeholder(name), &encoded);
        }
        url
    }

    /// Appends query-located parameters, keeping any query string the
    /// template already carries.
    pub fn build_query(
        &self,
        url: &str,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> String {
        let pairs: Vec<(String, String)> = located(tool, ParamLocation::Query)
            .filter_map(|spec| {
                params
                    .get(&spec.name)
                    .map(|value| (spec.name.clone(), value_as_text(value)))
            })
            .collect();
        if pairs.is_empty() {
            return url.to_string();
        }
        let query = match serde_urlencoded::to_string(&pairs) {
            Ok(query) => query,
            Err(_) => return url.to_string(),
        };
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{query}")
    }

    /// Body templates take JSON-typed substitution: string values are
    /// inserted as-is (the template supplies any quoting), everything
    /// else as its JSON text.
    pub fn interpolate_body(&self, template: &str, params: &Map<String, Value>) -> String {
        let mut body = template.to_string();
        for (name, value) in params {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            body = body.replace(&placeholder(name), &rendered);
        }
        body
    }

    /// Every substituted value is shell-escaped, whatever its declared
    /// location, so caller input cannot break out of the command line.
    pub fn interpolate_command(&self, template: &str, params: &Map<String, Value>) -> String {
        let mut command = template.to_string();
        for (name, value) in params {
            let escaped = shell::escape_arg(&value_as_text(value));
            command = command.replace(&placeholder(name), &escaped);
        }
        command
    }

    /// Env-located parameters become environment variables. Values are
    /// probed against the vault; the masked view shows the placeholder
    /// instead of the resolved value.
    pub fn param_env(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        let mut resolved = BTreeMap::new();
        let mut masked = BTreeMap::new();
        for spec in located(tool, ParamLocation::Env) {
            if let Some(value) = params.get(&spec.name) {
                let name = shell::env_key(&spec.name);
                let text = value_as_text(value);
                resolved.insert(name.clone(), self.secrets.resolve_or_literal(&text));
                masked.insert(name, ENV_PLACEHOLDER.to_string());
            }
        }
        (resolved, masked)
    }

    /// Configured env values are probed against the vault; references
    /// mask to the placeholder, plain values pass through unmasked.
    pub fn resolve_env(
        &self,
        configured: &BTreeMap<String, String>,
    ) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        let mut resolved = BTreeMap::new();
        let mut masked = BTreeMap::new();
        for (name, value) in configured {
            if self.secrets.is_reference(value) {
                resolved.insert(name.clone(), self.secrets.resolve_or_literal(value));
                masked.insert(name.clone(), ENV_PLACEHOLDER.to_string());
            } else {
                resolved.insert(name.clone(), value.clone());
                masked.insert(name.clone(), value.clone());
            }
        }
        (resolved, masked)
    }

    /// Header-located parameters, keyed by their literal names.
    pub fn param_headers(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> BTreeMap<String, String> {
        located(tool, ParamLocation::Header)
            .filter_map(|spec| {
                params
                    .get(&spec.name)
                    .map(|value| (spec.name.clone(), value_as_text(value)))
            })
            .collect()
    }
}

fn placeholder(name: &str) -> String {
    format!("{{{name}}}")
}

fn located<'a>(
    tool: &'a ToolDescriptor,
    location: ParamLocation,
) -> impl Iterator<Item = &'a ParameterSpec> {
    tool.parameters
        .iter()
        .filter(move |spec| spec.location == location)
}
