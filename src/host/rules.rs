//! URL rule tables, error handler tables and router assembly.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use matchit::InsertError;

use crate::host::dispatch;
use crate::host::{ErrorKey, HostError, RouteOptions};
use crate::view::{ErrorKind, View, ViewError};

/// A registered URL rule.
#[derive(Debug, Clone)]
pub(crate) struct UrlRule {
    pub rule: String,
    pub endpoint: String,
    pub methods: Vec<Method>,
    pub view: View,
}

/// Rules registered on one host, in registration order.
#[derive(Debug, Default)]
pub(crate) struct RuleTable {
    rules: Vec<UrlRule>,
}

impl RuleTable {
    pub fn add(
        &mut self,
        rule: &str,
        view: View,
        options: RouteOptions,
        endpoint_prefix: Option<&str>,
    ) -> Result<(), HostError> {
        if !rule.starts_with('/') {
            return Err(HostError::InvalidRule {
                rule: rule.to_string(),
            });
        }

        check_paths(self.rules.iter().map(|r| r.rule.as_str()).chain([rule]))?;

        let methods = if options.methods.is_empty() {
            vec![Method::GET]
        } else {
            options.methods
        };
        method_filter(&methods)?;

        for existing in self.rules.iter().filter(|r| r.rule == rule) {
            if let Some(method) = methods.iter().find(|m| existing.methods.contains(m)) {
                return Err(HostError::DuplicateRoute {
                    rule: rule.to_string(),
                    method: method.clone(),
                });
            }
        }

        let endpoint = options.endpoint.unwrap_or_else(|| view.name().to_string());
        let endpoint = match endpoint_prefix {
            Some(prefix) => format!("{prefix}.{endpoint}"),
            None => endpoint,
        };

        tracing::debug!(rule = %rule, endpoint = %endpoint, methods = ?methods, "Added URL rule");
        self.rules.push(UrlRule {
            rule: rule.to_string(),
            endpoint,
            methods,
            view,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Route entries with `prefix` prepended to every rule.
    pub fn entries(&self, prefix: Option<&str>, handlers: &Arc<ErrorHandlers>) -> Vec<RouteEntry> {
        self.rules
            .iter()
            .map(|rule| RouteEntry {
                path: join_prefix(prefix, &rule.rule),
                endpoint: rule.endpoint.clone(),
                methods: rule.methods.clone(),
                view: rule.view.clone(),
                handlers: handlers.clone(),
            })
            .collect()
    }
}

fn join_prefix(prefix: Option<&str>, rule: &str) -> String {
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{rule}"),
        _ => rule.to_string(),
    }
}

/// Path the static folder is mounted at for `url_path`.
pub(crate) fn static_rule(url_path: &str) -> String {
    format!("{}/{{*filename}}", url_path.trim_end_matches('/'))
}

/// First `:name` or `*name` segment in `path`. axum only accepts `{name}` and `{*name}`.
pub(crate) fn legacy_segment(path: &str) -> Option<&str> {
    path.split('/')
        .find(|segment| segment.starts_with(':') || segment.starts_with('*'))
}

/// Reject paths axum would refuse to mount: legacy capture syntax, malformed captures, and
/// distinct paths that match the same requests. Identical paths are left to the method check.
pub(crate) fn check_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Result<(), HostError> {
    let mut matcher = matchit::Router::new();
    let mut seen = HashSet::new();

    for path in paths {
        if !seen.insert(path) {
            continue;
        }
        if let Some(segment) = legacy_segment(path) {
            return Err(HostError::MalformedRule {
                rule: path.to_string(),
                reason: format!("segment '{segment}' must use {{name}} or {{*name}} captures"),
            });
        }
        matcher.insert(path, ()).map_err(|e| match e {
            InsertError::Conflict { with } => HostError::ConflictingRoute {
                rule: path.to_string(),
                with,
            },
            other => HostError::MalformedRule {
                rule: path.to_string(),
                reason: other.to_string(),
            },
        })?;
    }
    Ok(())
}

fn method_filter(methods: &[Method]) -> Result<MethodFilter, HostError> {
    let mut filters = methods.iter().map(|method| {
        MethodFilter::try_from(method.clone()).map_err(|_| HostError::UnsupportedMethod {
            method: method.to_string(),
        })
    });
    let first = filters.next().unwrap_or(Ok(MethodFilter::GET))?;
    filters.try_fold(first, |acc, filter| Ok(acc.or(filter?)))
}

/// Error handlers of one host, falling back to the parent host's.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorHandlers {
    by_kind: HashMap<ErrorKind, View>,
    by_status: HashMap<StatusCode, View>,
    parent: Option<Arc<ErrorHandlers>>,
}

impl ErrorHandlers {
    pub fn insert(&mut self, key: ErrorKey, view: View) {
        tracing::debug!(key = ?key, view = %view.name(), "Registered error handler");
        match key {
            ErrorKey::Kind(kind) => self.by_kind.insert(kind, view),
            ErrorKey::Status(status) => self.by_status.insert(status, view),
        };
    }

    pub fn with_parent(mut self, parent: Arc<ErrorHandlers>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Most specific handler: kind before status, own before parent.
    pub fn find(&self, error: &ViewError) -> Option<&View> {
        self.by_kind
            .get(&error.kind())
            .or_else(|| self.by_status.get(&error.status()))
            .or_else(|| self.parent.as_deref().and_then(|parent| parent.find(error)))
    }

    pub fn len(&self) -> usize {
        self.by_kind.len() + self.by_status.len()
    }
}

/// A fully prefixed route ready to be mounted.
#[derive(Debug, Clone)]
pub(crate) struct RouteEntry {
    pub path: String,
    pub endpoint: String,
    pub methods: Vec<Method>,
    pub view: View,
    pub handlers: Arc<ErrorHandlers>,
}

/// Assemble the axum router. Unmatched requests go through `fallback` handlers as 404s.
pub(crate) fn build_router(
    entries: Vec<RouteEntry>,
    fallback: Arc<ErrorHandlers>,
) -> Result<Router, HostError> {
    check_paths(entries.iter().map(|entry| entry.path.as_str()))?;

    let mut grouped: BTreeMap<String, (MethodRouter, HashSet<Method>)> = BTreeMap::new();

    for entry in entries {
        let filter = method_filter(&entry.methods)?;
        let slot = grouped
            .entry(entry.path.clone())
            .or_insert_with(|| (MethodRouter::new(), HashSet::new()));

        for method in &entry.methods {
            if !slot.1.insert(method.clone()) {
                return Err(HostError::DuplicateRoute {
                    rule: entry.path,
                    method: method.clone(),
                });
            }
        }

        tracing::trace!(path = %entry.path, endpoint = %entry.endpoint, "Mounting route");
        let view = entry.view;
        let handlers = entry.handlers;
        let method_router = std::mem::replace(&mut slot.0, MethodRouter::new());
        slot.0 = method_router.on(filter, move |request: Request| {
            let view = view.clone();
            let handlers = handlers.clone();
            async move { dispatch::handle(&view, &handlers, request).await }
        });
    }

    let mut router = Router::new();
    for (path, (method_router, _)) in grouped {
        router = router.route(&path, method_router);
    }

    Ok(router.fallback(move |request: Request| {
        let handlers = fallback.clone();
        async move { dispatch::not_found(&handlers, request).await }
    }))
}
