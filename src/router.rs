//! Pattern route table with typed path captures.
//!
//! Routes are registered once at startup and the table is immutable and
//! shared afterwards. A pattern is literal path text with `<arg>`
//! placeholders; each placeholder binds positionally to a declared
//! [`ArgKind`] which decides how the captured text is converted. Dispatch
//! walks the rules in registration order and the first rule whose method
//! mask and pattern both match wins.
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

use crate::log::*;
use crate::method::Methods;
use crate::request::Request;
use crate::response::Response;

const PLACEHOLDER: &str = "<arg>";

/// Declared type of one `<arg>` placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Any non-empty text within one path segment.
    Segment,
    /// Decimal integer, possibly negative.
    Int,
    /// UUID in its canonical hyphenated form.
    Uuid,
    /// A converter registered under this name via
    /// [`Router::add_converter`].
    Custom(String),
}

/// A converted path capture handed to the handler.
#[derive(Clone, Debug, PartialEq)]
pub enum Capture {
    Str(String),
    Int(i64),
    Uuid(Uuid),
}

impl Capture {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Capture::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Capture::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Capture::Uuid(id) => Some(*id),
            _ => None,
        }
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Option<Response>> + Send>>;

type Handler = Box<dyn Fn(Vec<Capture>, Arc<Request>) -> HandlerFuture + Send + Sync>;

type Converter = Box<dyn Fn(&str) -> Option<Capture> + Send + Sync>;

/// One compiled path segment of a rule.
enum Segment {
    Literal(String),
    /// `prefix<arg>suffix` within a single segment.
    Capture { prefix: String, suffix: String },
}

struct RouteRule {
    pattern: String,
    methods: Methods,
    segments: Vec<Segment>,
    kinds: Vec<ArgKind>,
    handler: Handler,
}

/// The route table.
#[derive(Default)]
pub struct Router {
    rules: Vec<RouteRule>,
    converters: HashMap<String, Converter>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named converter usable through [`ArgKind::Custom`].
    ///
    /// The converter receives the captured segment text and returns the
    /// converted capture, or `None` to reject the match.
    pub fn add_converter(
        &mut self,
        name: impl Into<String>,
        convert: impl Fn(&str) -> Option<Capture> + Send + Sync + 'static,
    ) {
        self.converters.insert(name.into(), Box::new(convert));
    }

    /// Register a route.
    ///
    /// Fails fast when the number of `<arg>` placeholders disagrees with
    /// `kinds`, when a segment holds more than one placeholder, or when a
    /// custom kind names an unregistered converter.
    pub fn register<F, Fut>(
        &mut self,
        pattern: &str,
        methods: Methods,
        kinds: Vec<ArgKind>,
        handler: F,
    ) -> Result<(), RouterError>
    where
        F: Fn(Vec<Capture>, Arc<Request>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Response>> + Send + 'static,
    {
        let segments = compile(pattern)?;
        let placeholders = segments
            .iter()
            .filter(|s| matches!(s, Segment::Capture { .. }))
            .count();
        if placeholders != kinds.len() {
            return Err(RouterError::ArityMismatch { placeholders, kinds: kinds.len() });
        }
        for kind in &kinds {
            if let ArgKind::Custom(name) = kind
                && !self.converters.contains_key(name)
            {
                return Err(RouterError::UnknownConverter(name.clone()));
            }
        }

        debug!("route registered: {methods:?} {pattern}");
        self.rules.push(RouteRule {
            pattern: pattern.to_owned(),
            methods,
            segments,
            kinds,
            handler: Box::new(move |captures, request| {
                Box::pin(handler(captures, request))
            }),
        });
        Ok(())
    }

    /// Run the first matching rule's handler.
    ///
    /// `None` means either no rule matched or the handler declined; the
    /// caller answers 404 in both cases.
    pub async fn dispatch(&self, request: Arc<Request>) -> Option<Response> {
        for rule in &self.rules {
            if !rule.methods.contains(*request.method()) {
                continue;
            }
            if let Some(captures) = self.match_rule(rule, request.url().path()) {
                debug!("dispatch {} -> {}", request.url().path(), rule.pattern);
                return (rule.handler)(captures, Arc::clone(&request)).await;
            }
        }
        None
    }

    /// Anchored full-path match; every segment must line up and every
    /// capture must convert under its declared kind.
    fn match_rule(&self, rule: &RouteRule, path: &str) -> Option<Vec<Capture>> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let mut parts = path.split('/');
        let mut captures = Vec::with_capacity(rule.kinds.len());
        let mut kinds = rule.kinds.iter();

        for segment in &rule.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if part != lit {
                        return None;
                    }
                }
                Segment::Capture { prefix, suffix } => {
                    let text = part
                        .strip_prefix(prefix.as_str())?
                        .strip_suffix(suffix.as_str())?;
                    if text.is_empty() {
                        return None;
                    }
                    captures.push(self.convert(kinds.next()?, text)?);
                }
            }
        }
        // a longer path must not match a shorter pattern
        if parts.next().is_some() {
            return None;
        }
        Some(captures)
    }

    fn convert(&self, kind: &ArgKind, text: &str) -> Option<Capture> {
        match kind {
            ArgKind::Segment => Some(Capture::Str(text.to_owned())),
            ArgKind::Int => text.parse::<i64>().ok().map(Capture::Int),
            ArgKind::Uuid => Uuid::parse_str(text).ok().map(Capture::Uuid),
            ArgKind::Custom(name) => self.converters.get(name)?(text),
        }
    }
}

fn compile(pattern: &str) -> Result<Vec<Segment>, RouterError> {
    let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
    pattern
        .split('/')
        .map(|part| match part.match_indices(PLACEHOLDER).count() {
            0 => Ok(Segment::Literal(part.to_owned())),
            1 => {
                let at = part.find(PLACEHOLDER).unwrap_or_default();
                Ok(Segment::Capture {
                    prefix: part[..at].to_owned(),
                    suffix: part[at + PLACEHOLDER.len()..].to_owned(),
                })
            }
            _ => Err(RouterError::BadSegment),
        })
        .collect()
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| &rule.pattern))
            .finish()
    }
}

// ===== Error =====

/// Route registration error.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("pattern declares {placeholders} placeholders but {kinds} argument kinds")]
    ArityMismatch { placeholders: usize, kinds: usize },
    #[error("no converter registered under {0:?}")]
    UnknownConverter(String),
    #[error("multiple placeholders in one path segment")]
    BadSegment,
}
