//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate rules, methods and status codes before anything is registered
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LazyViewsConfig → Result<(), Vec<ValidationError>>
//! - View paths are not resolved here; `lazy-views check` does that

use std::collections::HashSet;

use axum::http::{Method, StatusCode};
use axum::routing::MethodFilter;
use matchit::InsertError;
use thiserror::Error;

use crate::config::schema::LazyViewsConfig;
use crate::host::rules::{legacy_segment, static_rule};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{section}[{index}]: rule '{rule}' must start with '/'")]
    RelativeRule {
        section: &'static str,
        index: usize,
        rule: String,
    },

    #[error("{section}[{index}]: segment '{segment}' in '{rule}' must use {{name}} or {{*name}}")]
    LegacySegment {
        section: &'static str,
        index: usize,
        rule: String,
        segment: String,
    },

    #[error("rule '{rule}' is malformed: {reason}")]
    MalformedRule { rule: String, reason: String },

    #[error("rule '{rule}' overlaps '{with}'")]
    ConflictingRule { rule: String, with: String },

    #[error("{section}[{index}]: view path is empty")]
    EmptyView { section: &'static str, index: usize },

    #[error("routes[{index}]: unknown method '{method}'")]
    UnknownMethod { index: usize, method: String },

    #[error("static_routes[{index}]: rule '{rule}' must capture {{filename}} or {{*filename}}")]
    MissingFilename { index: usize, rule: String },

    #[error("error_handlers[{index}]: status {status} is not a 4xx or 5xx code")]
    InvalidStatus { index: usize, status: u16 },

    #[error("error_handlers[{index}]: exactly one of 'status' or 'kind' must be set")]
    AmbiguousHandler { index: usize },

    #[error("app.static_url_path '{path}' must start with '/'")]
    RelativeStaticUrl { path: String },

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

/// Parse a configured method name.
pub fn parse_method(name: &str) -> Option<Method> {
    let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes()).ok()?;
    MethodFilter::try_from(method.clone()).ok()?;
    Some(method)
}

/// Parse a configured handler status; only error statuses are accepted.
pub fn parse_error_status(code: u16) -> Option<StatusCode> {
    StatusCode::from_u16(code)
        .ok()
        .filter(|status| status.is_client_error() || status.is_server_error())
}

pub fn validate_config(config: &LazyViewsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, route) in config.routes.iter().enumerate() {
        if !route.rule.starts_with('/') {
            errors.push(ValidationError::RelativeRule {
                section: "routes",
                index,
                rule: route.rule.clone(),
            });
        }
        if route.view.trim().is_empty() {
            errors.push(ValidationError::EmptyView {
                section: "routes",
                index,
            });
        }
        for method in &route.methods {
            if parse_method(method).is_none() {
                errors.push(ValidationError::UnknownMethod {
                    index,
                    method: method.clone(),
                });
            }
        }
    }

    for (index, route) in config.static_routes.iter().enumerate() {
        if !route.rule.starts_with('/') {
            errors.push(ValidationError::RelativeRule {
                section: "static_routes",
                index,
                rule: route.rule.clone(),
            });
        }
        if !route.rule.contains("{filename}") && !route.rule.contains("{*filename}") {
            errors.push(ValidationError::MissingFilename {
                index,
                rule: route.rule.clone(),
            });
        }
    }

    for (index, handler) in config.error_handlers.iter().enumerate() {
        match (handler.status, handler.kind) {
            (Some(status), None) => {
                if parse_error_status(status).is_none() {
                    errors.push(ValidationError::InvalidStatus { index, status });
                }
            }
            (None, Some(_)) => {}
            _ => errors.push(ValidationError::AmbiguousHandler { index }),
        }
        if handler.view.trim().is_empty() {
            errors.push(ValidationError::EmptyView {
                section: "error_handlers",
                index,
            });
        }
    }

    for (index, admin_view) in config.admin_views.iter().enumerate() {
        if admin_view.view.trim().is_empty() {
            errors.push(ValidationError::EmptyView {
                section: "admin_views",
                index,
            });
        }
    }

    if let Some(path) = &config.app.static_url_path {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativeStaticUrl { path: path.clone() });
        }
    }

    for (section, index, rule) in rules(config) {
        if let Some(segment) = legacy_segment(rule) {
            errors.push(ValidationError::LegacySegment {
                section,
                index,
                rule: rule.to_string(),
                segment: segment.to_string(),
            });
        }
    }
    check_overlaps(config, &mut errors);

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Every configured rule with the section and index it came from.
fn rules(config: &LazyViewsConfig) -> impl Iterator<Item = (&'static str, usize, &str)> {
    let routes = config
        .routes
        .iter()
        .enumerate()
        .map(|(index, route)| ("routes", index, route.rule.as_str()));
    let static_routes = config
        .static_routes
        .iter()
        .enumerate()
        .map(|(index, route)| ("static_routes", index, route.rule.as_str()));
    routes.chain(static_routes)
}

/// Report rules that match the same requests as an earlier, different rule, or that repeat the
/// automatic static mount. Rules already reported as relative or legacy are skipped.
fn check_overlaps(config: &LazyViewsConfig, errors: &mut Vec<ValidationError>) {
    let mut matcher = matchit::Router::new();
    let mut seen = HashSet::new();

    let static_mount = config
        .app
        .static_url_path
        .as_deref()
        .filter(|path| path.starts_with('/'))
        .map(static_rule);
    if let Some(mount) = &static_mount {
        let _ = matcher.insert(mount.as_str(), ());
    }

    let candidates = rules(config)
        .map(|(_, _, rule)| rule)
        .filter(|rule| rule.starts_with('/') && legacy_segment(rule).is_none());

    for rule in candidates {
        if static_mount.as_deref() == Some(rule) {
            errors.push(ValidationError::ConflictingRule {
                rule: rule.to_string(),
                with: rule.to_string(),
            });
            continue;
        }
        if !seen.insert(rule) {
            continue;
        }
        match matcher.insert(rule, ()) {
            Ok(()) => {}
            Err(InsertError::Conflict { with }) => errors.push(ValidationError::ConflictingRule {
                rule: rule.to_string(),
                with,
            }),
            Err(other) => errors.push(ValidationError::MalformedRule {
                rule: rule.to_string(),
                reason: other.to_string(),
            }),
        }
    }
}
