//! Control document loading.
//!
//! # Responsibilities
//! - Fetch the four control documents from the object store
//! - Parse them into ordered rule tables, one feature at a time
//! - Report what was loaded, missing, malformed or rejected
//!
//! # Design Decisions
//! - Documents are fetched concurrently, each under the storage deadline
//! - JSON object order is the table order; duplicate keys are kept until
//!   table insertion so the "last definition wins" case can be logged
//! - Loading never fails as a whole: the worst case is an empty `RuleSet`
//! - On reload, a document that cannot be fetched keeps its previous rules;
//!   missing or malformed documents still disable their feature

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::config::{AuthConfig, EdgeConfig, RedirectConfig};
use crate::observability::metrics;
use crate::resilience::{with_timeout, TimedOut};
use crate::rules::auth::{AuthGate, AuthRule, AuthEntry};
use crate::rules::function::{FunctionDispatcher, FunctionRule};
use crate::rules::redirect::{RedirectResolver, RedirectRule, RedirectEntry, TargetHost};
use crate::rules::table::{Keyed, RuleTable};
use crate::rules::{RuleError, RuleSet};
use crate::storage::{ObjectStore, StorageError};

/// The control documents, by feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Authorizations,
    Redirects,
    Functions,
    Locales,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorizations => "authorizations",
            Self::Redirects => "redirects",
            Self::Functions => "functions",
            Self::Locales => "locales",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A control document that could not be used at all.
#[derive(Debug, Error)]
pub enum ControlDocumentError {
    #[error("failed to fetch '{key}': {source}")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("malformed control document '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of one load, per feature.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Documents that were parsed, with the number of rules kept.
    pub loaded: Vec<(DocumentKind, usize)>,
    /// Documents that do not exist (feature disabled).
    pub missing: Vec<DocumentKind>,
    /// Documents that were unreadable or malformed (feature disabled).
    pub failures: Vec<(DocumentKind, ControlDocumentError)>,
    /// Individual entries skipped inside otherwise valid documents.
    pub rejected: Vec<(DocumentKind, RuleError)>,
    /// Unreachable documents whose previous rules stayed in force.
    pub retained: Vec<DocumentKind>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.rejected.is_empty()
    }

    pub fn failed(&self, kind: DocumentKind) -> bool {
        self.failures.iter().any(|(k, _)| *k == kind)
    }

    pub fn loaded_count(&self, kind: DocumentKind) -> Option<usize> {
        self.loaded.iter().find(|(k, _)| *k == kind).map(|(_, n)| *n)
    }

    pub fn retained(&self, kind: DocumentKind) -> bool {
        self.retained.contains(&kind)
    }

    fn fetch_failed(&self, kind: DocumentKind) -> bool {
        self.failures
            .iter()
            .any(|(k, e)| *k == kind && matches!(e, ControlDocumentError::Fetch { .. }))
    }

    /// Fresh rules when the document loaded; the previous ones when it could
    /// not be fetched; otherwise nothing.
    fn carry_over<T: Clone + Default>(
        &mut self,
        kind: DocumentKind,
        fresh: Option<T>,
        previous: Option<&T>,
    ) -> T {
        match (fresh, previous) {
            (Some(fresh), _) => fresh,
            (None, Some(previous)) if self.fetch_failed(kind) => {
                tracing::warn!(document = %kind, "Control document unreachable, keeping previous rules");
                self.retained.push(kind);
                previous.clone()
            }
            _ => T::default(),
        }
    }

    fn ingest<T>(
        &mut self,
        kind: DocumentKind,
        key: &str,
        fetched: Result<Option<Bytes>, ControlDocumentError>,
        parse: impl FnOnce(&[u8]) -> Result<Parsed<T>, serde_json::Error>,
    ) -> Option<T> {
        let bytes = match fetched {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::info!(document = %kind, key, "Control document not present, feature disabled");
                self.missing.push(kind);
                return None;
            }
            Err(error) => {
                tracing::error!(document = %kind, error = %error, "Control document unavailable, feature disabled");
                metrics::record_document_error(kind.as_str());
                self.failures.push((kind, error));
                return None;
            }
        };

        match parse(&bytes) {
            Ok(parsed) => {
                tracing::info!(document = %kind, key, rules = parsed.count, "Control document loaded");
                metrics::record_rules_loaded(kind.as_str(), parsed.count);
                self.loaded.push((kind, parsed.count));
                self.rejected
                    .extend(parsed.rejected.into_iter().map(|e| (kind, e)));
                Some(parsed.value)
            }
            Err(source) => {
                let error = ControlDocumentError::Malformed {
                    key: key.to_string(),
                    source,
                };
                tracing::error!(document = %kind, error = %error, "Control document malformed, feature disabled");
                metrics::record_document_error(kind.as_str());
                self.failures.push((kind, error));
                None
            }
        }
    }
}

/// A parsed document: the value, how many rules it holds, and what was skipped.
#[derive(Debug)]
pub struct Parsed<T> {
    pub value: T,
    pub count: usize,
    pub rejected: Vec<RuleError>,
}

/// Top-level JSON object entries in document order, duplicates included.
struct OrderedEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object mapping paths to rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

fn parse_table<T, S>(
    kind: DocumentKind,
    bytes: &[u8],
    build: impl Fn(&str, S) -> Result<T, RuleError>,
) -> Result<Parsed<RuleTable<T>>, serde_json::Error>
where
    T: Keyed,
    S: DeserializeOwned,
{
    let OrderedEntries(entries) = serde_json::from_slice(bytes)?;

    let mut table = RuleTable::new();
    let mut rejected = Vec::new();

    for (pattern, value) in entries {
        let rule = serde_json::from_value::<S>(value)
            .map_err(|source| RuleError::Shape {
                pattern: pattern.clone(),
                source,
            })
            .and_then(|entry| build(&pattern, entry));

        match rule {
            Ok(rule) => {
                if table.insert(rule).is_some() {
                    tracing::warn!(document = %kind, pattern = %pattern, "Duplicate rule, last definition wins");
                }
            }
            Err(error) => {
                tracing::warn!(document = %kind, error = %error, "Skipping invalid rule");
                rejected.push(error);
            }
        }
    }

    Ok(Parsed {
        count: table.len(),
        value: table,
        rejected,
    })
}

/// Parse `authorizations.json`.
pub fn parse_auth_rules(
    bytes: &[u8],
    config: &AuthConfig,
) -> Result<Parsed<RuleTable<AuthRule>>, serde_json::Error> {
    parse_table(DocumentKind::Authorizations, bytes, |pattern, entry: AuthEntry| {
        AuthRule::from_entry(pattern, entry, &config.default_realm)
    })
}

/// Parse `redirects.json`.
pub fn parse_redirect_rules(
    bytes: &[u8],
    config: &RedirectConfig,
) -> Result<Parsed<RuleTable<RedirectRule>>, serde_json::Error> {
    parse_table(DocumentKind::Redirects, bytes, |pattern, entry: RedirectEntry| {
        RedirectRule::from_entry(pattern, entry, config)
    })
}

/// Parse the function-dispatch document (`11ty-serverless.json`).
pub fn parse_function_rules(bytes: &[u8]) -> Result<Parsed<RuleTable<FunctionRule>>, serde_json::Error> {
    parse_table(DocumentKind::Functions, bytes, |template, function_id: String| {
        FunctionRule::new(template, function_id)
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocaleDocument {
    List(Vec<String>),
    Single(String),
}

/// Parse `locales.json`: a list of prefixes (or one bare string).
pub fn parse_locales(bytes: &[u8]) -> Result<Parsed<Vec<String>>, serde_json::Error> {
    let raw = match serde_json::from_slice::<LocaleDocument>(bytes)? {
        LocaleDocument::List(list) => list,
        LocaleDocument::Single(single) => vec![single],
    };

    let mut locales: Vec<String> = Vec::with_capacity(raw.len());
    for locale in raw {
        let locale = locale.trim().trim_matches('/');
        if !locale.is_empty() && !locales.iter().any(|l| l == locale) {
            locales.push(locale.to_string());
        }
    }

    Ok(Parsed {
        count: locales.len(),
        value: locales,
        rejected: Vec::new(),
    })
}

async fn fetch_document(
    store: &dyn ObjectStore,
    key: &str,
    deadline: Duration,
) -> Result<Option<Bytes>, ControlDocumentError> {
    if key.is_empty() {
        return Ok(None);
    }

    match with_timeout(deadline, store.get(key)).await {
        Ok(Ok(object)) => Ok(Some(object.body)),
        Ok(Err(StorageError::NotFound(_))) => Ok(None),
        Ok(Err(source)) => Err(ControlDocumentError::Fetch {
            key: key.to_string(),
            source,
        }),
        Err(TimedOut(elapsed)) => Err(ControlDocumentError::Fetch {
            key: key.to_string(),
            source: StorageError::Timeout(elapsed),
        }),
    }
}

/// Fetch and parse every control document into a fresh `RuleSet`.
/// Fetch and parse every control document.
///
/// `previous` is the rule set in force, if any; its tables stand in for
/// documents that could not be fetched this time.
pub async fn load_rule_set(
    store: &dyn ObjectStore,
    config: &EdgeConfig,
    previous: Option<&RuleSet>,
) -> (RuleSet, LoadReport) {
    let deadline = Duration::from_secs(config.storage.fetch_timeout_secs);
    let keys = &config.control;

    let (auth_doc, redirect_doc, function_doc, locale_doc) = tokio::join!(
        fetch_document(store, &keys.authorizations, deadline),
        fetch_document(store, &keys.redirects, deadline),
        fetch_document(store, &keys.functions, deadline),
        fetch_document(store, &keys.locales, deadline),
    );

    let mut report = LoadReport::default();

    let auth_rules = report.ingest(DocumentKind::Authorizations, &keys.authorizations, auth_doc, |b| {
        parse_auth_rules(b, &config.auth)
    });
    let auth_rules = report.carry_over(
        DocumentKind::Authorizations,
        auth_rules,
        previous.map(|p| p.auth.rules()),
    );

    let redirect_rules = report.ingest(DocumentKind::Redirects, &keys.redirects, redirect_doc, |b| {
        parse_redirect_rules(b, &config.redirects)
    });
    let redirect_rules = report.carry_over(
        DocumentKind::Redirects,
        redirect_rules,
        previous.map(|p| p.redirects.rules()),
    );

    let function_rules =
        report.ingest(DocumentKind::Functions, &keys.functions, function_doc, parse_function_rules);
    let function_rules = report.carry_over(
        DocumentKind::Functions,
        function_rules,
        previous.map(|p| p.functions.rules()),
    );

    let locales = report.ingest(DocumentKind::Locales, &keys.locales, locale_doc, parse_locales);
    let locales = report.carry_over(DocumentKind::Locales, locales, previous.map(|p| &p.locales));

    let target_host = config.redirects.target_host.as_deref().and_then(|host| {
        TargetHost::parse(host)
            .map_err(|e| tracing::warn!(host, error = %e, "Ignoring invalid redirect target host"))
            .ok()
    });

    let rules = RuleSet {
        auth: AuthGate::new(auth_rules, &config.auth),
        redirects: RedirectResolver::new(redirect_rules, target_host),
        functions: FunctionDispatcher::new(function_rules),
        locales,
    };

    (rules, report)
}
