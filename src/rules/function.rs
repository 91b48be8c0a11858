//! Function dispatcher: route templates mapped to remote function ids.
//!
//! A template such as `/preview/:id` binds one concrete segment per `:name`
//! segment. Matching is segment-wise and strict: the segment counts must be
//! equal and every literal segment must be identical, so `/preview/42/`
//! (three segments) does not match `/preview/:id`. Parameters never bind
//! empty, `.` or `..` segments.

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::routing::decision::RoutingDecision;
use crate::rules::table::{Keyed, RuleTable};
use crate::rules::RuleError;

const PARAM_MARKER: char = ':';

/// Bytes escaped when a bound value goes into a URL function id.
const URL_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parameters bound while matching a template, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn split_path(path: &str) -> Option<std::str::Split<'_, char>> {
    path.strip_prefix('/').map(|rest| rest.split('/'))
}

/// A parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, RuleError> {
        let invalid = |reason: &str| RuleError::Template {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let parts = split_path(template).ok_or_else(|| invalid("must start with '/'"))?;

        let mut segments = Vec::new();
        for part in parts {
            match part.strip_prefix(PARAM_MARKER) {
                Some(name) if is_param_name(name) => {
                    if segments.contains(&Segment::Param(name.to_string())) {
                        return Err(invalid("parameter names must be unique"));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                Some(_) => return Err(invalid("parameter names must match [A-Za-z0-9._-]+")),
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Bind `path` against this template.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let mut parts = split_path(path)?;
        let mut params = Vec::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if matches!(part, "" | "." | "..") => return None,
                Segment::Param(name) => params.push((name.clone(), part.to_string())),
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(PathParams(params))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRule {
    template: RouteTemplate,
    function_id: String,
}

impl FunctionRule {
    pub fn new(template: &str, function_id: impl Into<String>) -> Result<Self, RuleError> {
        let function_id = function_id.into();
        if function_id.trim().is_empty() {
            return Err(RuleError::EmptyFunctionId(template.to_string()));
        }
        Ok(Self {
            template: RouteTemplate::parse(template)?,
            function_id,
        })
    }

    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    /// The function id with `{name}` placeholders filled from `params`.
    /// Values are percent-encoded when the id is an `http(s)://` URL.
    pub fn resolve_function_id(&self, params: &PathParams) -> String {
        let is_url =
            self.function_id.starts_with("http://") || self.function_id.starts_with("https://");

        params.iter().fold(self.function_id.clone(), |id, (name, value)| {
            let value: Cow<'_, str> = if is_url {
                utf8_percent_encode(value, URL_VALUE).into()
            } else {
                Cow::Borrowed(value)
            };
            id.replace(&format!("{{{}}}", name), &value)
        })
    }
}

impl Keyed for FunctionRule {
    fn key(&self) -> &str {
        self.template.as_str()
    }
}

/// Consults the function-dispatch table for each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionDispatcher {
    rules: RuleTable<FunctionRule>,
}

impl FunctionDispatcher {
    pub fn new(rules: RuleTable<FunctionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable<FunctionRule> {
        &self.rules
    }

    pub fn dispatch(&self, path: &str) -> RoutingDecision {
        self.rules
            .find_map(|rule| {
                rule.template()
                    .match_path(path)
                    .map(|params| RoutingDecision::Dispatch {
                        function_id: rule.resolve_function_id(&params),
                        params,
                    })
            })
            .unwrap_or(RoutingDecision::PassThrough)
    }
}
