use std::borrow::Cow;
use std::error::Error;
use std::fmt;

/// What a code fragment is about to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Evaluate,
    Execute,
}

pub type Preprocess = Box<dyn Fn(&str, Mode) -> String + Send + Sync>;

/// Returns fallback text for a failed expression, or `None` to fail the copy.
pub type ErrorHandler = Box<dyn Fn(&str, &(dyn Error + 'static)) -> Option<String> + Send + Sync>;

/// Optional caller hooks. Both default to pass-through behaviour.
#[derive(Default)]
pub struct Hooks {
    pub preprocess: Option<Preprocess>,
    pub handle: Option<ErrorHandler>,
}

impl Hooks {
    pub fn preprocess<'t>(&self, text: &'t str, mode: Mode) -> Cow<'t, str> {
        match &self.preprocess {
            Some(f) => Cow::Owned(f(text, mode)),
            None => Cow::Borrowed(text),
        }
    }

    pub fn handle(&self, expression: &str, error: &(dyn Error + 'static)) -> Option<String> {
        self.handle.as_ref().and_then(|f| f(expression, error))
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("preprocess", &self.preprocess.is_some())
            .field("handle", &self.handle.is_some())
            .finish()
    }
}
