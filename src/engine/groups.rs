/*! Begin/end group matching.

The matching rule is asymmetric: a plain end-group character closes any
open brace group but never a math group, while a math shift character
closes only a math group of the same inline/display flavor -- the same
glyph toggles math mode on and off, whereas a brace always closes a brace.
*/

use crate::tex::tokens::GroupKind;
use crate::utils::errors::{TeXError, TeXResult};

/// A close delimiter as encountered in the input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CloseKind {
    /// A plain end-group character.
    Brace(char),
    /// A math shift character, doubled for display math.
    Math { delim: char, display: bool },
}

impl CloseKind {
    pub fn describe(&self) -> String {
        match self {
            CloseKind::Brace(c) => c.to_string(),
            CloseKind::Math { delim, display: false } => delim.to_string(),
            CloseKind::Math { delim, display: true } => {
                let mut s = delim.to_string();
                s.push(*delim);
                s
            }
        }
    }
}

/// Whether `close` may close a group opened as `open`.
pub fn closes(open: GroupKind, close: &CloseKind) -> bool {
    match (open, close) {
        (GroupKind::Brace { .. }, CloseKind::Brace(_)) => true,
        (GroupKind::Brace { .. }, CloseKind::Math { .. }) => false,
        (GroupKind::Math { .. }, CloseKind::Brace(_)) => false,
        (GroupKind::Math { display: od, .. }, CloseKind::Math { display: cd, .. }) => od == *cd,
    }
}

/// Tracks the currently open groups and validates close delimiters.
#[derive(Default, Debug)]
pub struct GroupMatcher {
    open: Vec<GroupKind>,
}

impl GroupMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn current(&self) -> Option<&GroupKind> {
        self.open.last()
    }

    pub fn open(&mut self, kind: GroupKind) {
        self.open.push(kind);
    }

    /// Validate and pop. An end token with no matching open group is fatal.
    pub fn close(&mut self, close: CloseKind) -> TeXResult<GroupKind> {
        match self.open.last() {
            Some(k) if closes(*k, &close) => Ok(self.open.pop().unwrap()),
            _ => Err(TeXError::UnexpectedEndGroup(close.describe())),
        }
    }

    /// End-of-input check: any group still open is fatal.
    pub fn finish(&self) -> TeXResult<()> {
        match self.open.last() {
            Some(k) => Err(TeXError::UnterminatedGroup(k.describe())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRACE: GroupKind = GroupKind::Brace {
        open: '{',
        close: '}',
    };
    const INLINE: GroupKind = GroupKind::Math {
        delim: '$',
        display: false,
    };
    const DISPLAY: GroupKind = GroupKind::Math {
        delim: '$',
        display: true,
    };

    #[test]
    fn brace_closes_brace_only() {
        assert!(closes(BRACE, &CloseKind::Brace('}')));
        assert!(!closes(INLINE, &CloseKind::Brace('}')));
        assert!(!closes(DISPLAY, &CloseKind::Brace('}')));
    }

    #[test]
    fn math_close_requires_same_flavor() {
        let inline_close = CloseKind::Math {
            delim: '$',
            display: false,
        };
        let display_close = CloseKind::Math {
            delim: '$',
            display: true,
        };
        assert!(closes(INLINE, &inline_close));
        assert!(!closes(INLINE, &display_close));
        assert!(closes(DISPLAY, &display_close));
        assert!(!closes(DISPLAY, &inline_close));
        assert!(!closes(BRACE, &inline_close));
    }

    #[test]
    fn matcher_reports_unexpected_end() {
        let mut m = GroupMatcher::new();
        m.open(INLINE);
        let err = m.close(CloseKind::Brace('}')).unwrap_err();
        assert_eq!(err, TeXError::UnexpectedEndGroup("}".into()));
        // the math group is still open
        assert_eq!(m.depth(), 1);
        m.close(CloseKind::Math {
            delim: '$',
            display: false,
        })
        .unwrap();
        assert!(m.finish().is_ok());
    }

    #[test]
    fn matcher_reports_unterminated() {
        let mut m = GroupMatcher::new();
        m.open(BRACE);
        assert_eq!(
            m.finish().unwrap_err(),
            TeXError::UnterminatedGroup("{".into())
        );
    }
}
