//! A connector that exposes the local log level as a property.
//!
//! Bind it to an object with an enumerated-character property whose legal
//! set is [`LEVELS`]; assigning `=<path>D` on either end then changes how
//! much that end logs.

use std::sync::{Arc, Mutex, PoisonError};

use omsync_core::{Connector, ObjectRef, Property, PropertyDef, Value};
use tracing::level_filters::LevelFilter;

/// Legal values, from quietest to loudest: none, fatal, error, warning,
/// info, debug, verbose.
pub const LEVELS: &str = "NFEWIDV";

/// Map a level character to a filter.
pub fn filter_for(level: char) -> Option<LevelFilter> {
    Some(match level {
        'N' => LevelFilter::OFF,
        'F' | 'E' => LevelFilter::ERROR,
        'W' => LevelFilter::WARN,
        'I' => LevelFilter::INFO,
        'D' => LevelFilter::DEBUG,
        'V' => LevelFilter::TRACE,
        _ => return None,
    })
}

/// A property definition suited to [`LogLevel`].
pub fn level_property(id: char, name: &str) -> PropertyDef {
    PropertyDef::chars(id, name, LEVELS).default_value("I").local()
}

/// The log level connector.
///
/// Holds the current level character. The hook, if set, is called with the
/// new filter on every push; wire it to a `tracing_subscriber` reload
/// handle to make the change take effect.
#[derive(Clone)]
pub struct LogLevel {
    level: Arc<Mutex<char>>,
    hook: Option<Arc<dyn Fn(LevelFilter) + Send + Sync>>,
}

impl LogLevel {
    pub fn new(initial: char) -> Self {
        Self {
            level: Arc::new(Mutex::new(initial)),
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: impl Fn(LevelFilter) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn level(&self) -> char {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn filter(&self) -> LevelFilter {
        filter_for(self.level()).unwrap_or(LevelFilter::INFO)
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::new('I')
    }
}

impl Connector for LogLevel {
    fn push(&self, object: ObjectRef<'_>, property: &Property) {
        let Some(level) = property.as_char() else {
            return;
        };
        let Some(filter) = filter_for(level) else {
            tracing::warn!("{}: unknown log level '{}'", object.path, level);
            return;
        };
        *self.level.lock().unwrap_or_else(PoisonError::into_inner) = level;
        tracing::info!("log level set to {}", filter);
        if let Some(hook) = &self.hook {
            hook(filter);
        }
    }

    fn pull(&self, _object: ObjectRef<'_>, property: &Property) -> Option<Value> {
        property.as_char().map(|_| Value::Char(self.level()))
    }
}

impl std::fmt::Debug for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLevel")
            .field("level", &self.level())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
