//! Pattern handlers.
//!
//! A handler pairs a compiled pattern with an async callback. Patterns must
//! match the *whole* content: `"foo"` matches `"foo"` but not `"foobar"`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use regex::Regex;

use crate::error::{RouterError, RouterResult};
use crate::message::Message;

/// A type-erased handler callback.
pub type HandlerFn = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Erases an async closure into a [`HandlerFn`].
pub fn into_handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |msg| Box::pin(f(msg)))
}

/// Which envelopes a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Only messages directed at the bot by name, alias or mention.
    Addressed,
    /// Only messages overheard in a conversation.
    Unaddressed,
}

impl AddressMode {
    /// Whether an envelope with the given flag is accepted.
    pub fn accepts(self, addressed: bool) -> bool {
        match self {
            Self::Addressed => addressed,
            Self::Unaddressed => !addressed,
        }
    }

    fn symbol(self) -> char {
        match self {
            Self::Addressed => '@',
            Self::Unaddressed => '*',
        }
    }
}

/// Public description of a registered handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    /// Address mode.
    pub mode: AddressMode,
    /// The pattern as registered.
    pub pattern: String,
    /// Optional human-readable description.
    pub description: Option<String>,
}

impl fmt::Display for HandlerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.description.as_deref().unwrap_or(&self.pattern);
        write!(f, "{} {}", self.mode.symbol(), text)
    }
}

pub(crate) struct PatternHandler {
    pub(crate) id: u64,
    pub(crate) mode: AddressMode,
    regex: Regex,
    pattern: String,
    description: Option<String>,
    pub(crate) callback: HandlerFn,
}

impl PatternHandler {
    pub(crate) fn compile(
        id: u64,
        mode: AddressMode,
        pattern: &str,
        description: Option<String>,
        callback: HandlerFn,
    ) -> RouterResult<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| RouterError::invalid_pattern(pattern, e))?;
        Ok(Self {
            id,
            mode,
            regex,
            pattern: pattern.to_string(),
            description,
            callback,
        })
    }

    /// Returns the capture groups (group 1 first) when `content` matches
    /// in full under this handler's address mode.
    pub(crate) fn captures(&self, addressed: bool, content: &str) -> Option<Vec<Option<String>>> {
        if !self.mode.accepts(addressed) {
            return None;
        }
        let caps = self.regex.captures(content)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
        )
    }

    pub(crate) fn info(&self) -> HandlerInfo {
        HandlerInfo {
            mode: self.mode,
            pattern: self.pattern.clone(),
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for PatternHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternHandler")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("pattern", &self.pattern)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(mode: AddressMode, pattern: &str) -> PatternHandler {
        PatternHandler::compile(1, mode, pattern, None, into_handler(|_| async {})).unwrap()
    }

    #[test]
    fn test_full_match_only() {
        let h = handler(AddressMode::Unaddressed, "foo");
        assert!(h.captures(false, "foo").is_some());
        assert!(h.captures(false, "foobar").is_none());
        assert!(h.captures(false, "xfoo").is_none());
    }

    #[test]
    fn test_address_mode() {
        let h = handler(AddressMode::Addressed, "ping");
        assert!(h.captures(true, "ping").is_some());
        assert!(h.captures(false, "ping").is_none());
    }

    #[test]
    fn test_anchored_pattern_captures() {
        let h = handler(AddressMode::Addressed, r"^echo\s+(.+)");
        let groups = h.captures(true, "echo hello world").unwrap();
        assert_eq!(groups, vec![Some("hello world".to_string())]);
    }

    #[test]
    fn test_optional_group() {
        let h = handler(AddressMode::Addressed, "(a)?(b)");
        assert_eq!(h.captures(true, "b").unwrap(), vec![None, Some("b".into())]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatternHandler::compile(
            1,
            AddressMode::Addressed,
            "(",
            None,
            into_handler(|_| async {}),
        )
        .unwrap_err();
        assert!(matches!(err, RouterError::InvalidPattern { .. }));
    }

    #[test]
    fn test_info_display() {
        let h = handler(AddressMode::Addressed, "ping");
        assert_eq!(h.info().to_string(), "@ ping");
    }
}
