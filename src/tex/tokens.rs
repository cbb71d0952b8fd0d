/*! The closed set of token variants and their uniform contract.

Everything the tokenizer produces and the expansion engine consumes is a
[`Token`]: plain characters tagged with their [`CategoryCode`], whitespace,
comments, control sequence references, balanced [`Group`]s, opaque data
payloads ([`Value`]) and internal markers. Tokens are immutable by
convention: mutation always goes through a clone, and a macro expansion is
a freshly owned sequence that never aliases the stored definition.

The uniform contract of every token consists of
[`process`](Token::process), [`expand_once`](Token::expand_once),
[`expand_fully`](Token::expand_fully), the two string projections
([`display_fmt`](Token::display_fmt) and [`source_fmt`](Token::source_fmt))
and the capability flags ([`can_expand`](Token::can_expand),
[`is_ignoreable`](Token::is_ignoreable),
[`is_data_object`](Token::is_data_object),
[`is_single_token`](Token::is_single_token),
[`is_expansion_blocker`](Token::is_expansion_blocker)).
*/

pub mod token_lists;

use crate::engine::expansion::TokenStack;
use crate::engine::memory::{CsInterner, CsName};
use crate::engine::{EngineTypes, Interpreter};
use crate::tex::catcodes::{CategoryCode, CategoryCodeScheme};
use crate::tex::units::{Dimension, Glue};
use crate::utils::errors::TeXResult;
use crate::utils::Ptr;
use self::token_lists::TokenList;
use std::fmt::Write;

/// How a group was opened, and therefore what may close it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GroupKind {
    /// `{ ... }` with the concrete delimiter characters that formed it.
    Brace { open: char, close: char },
    /// `$ ... $` (inline) or `$$ ... $$` (display).
    Math { delim: char, display: bool },
}

impl GroupKind {
    /// The source text that opened this group.
    pub fn open_fmt<W: Write>(&self, f: &mut W) -> std::fmt::Result {
        match self {
            GroupKind::Brace { open, .. } => f.write_char(*open),
            GroupKind::Math { delim, display } => {
                f.write_char(*delim)?;
                if *display {
                    f.write_char(*delim)?;
                }
                Ok(())
            }
        }
    }

    /// The source text that closes this group.
    pub fn close_fmt<W: Write>(&self, f: &mut W) -> std::fmt::Result {
        match self {
            GroupKind::Brace { close, .. } => f.write_char(*close),
            k @ GroupKind::Math { .. } => k.open_fmt(f),
        }
    }

    pub fn describe(&self) -> String {
        let mut s = String::new();
        let _ = self.open_fmt(&mut s);
        s
    }
}

/// A balanced token span. The children are exclusively owned.
#[derive(Clone, PartialEq, Debug)]
pub struct Group {
    pub kind: GroupKind,
    pub tokens: Vec<Token>,
}

impl Group {
    /// An empty `{}` group, as injected by error recovery.
    pub fn empty_brace() -> Self {
        Group {
            kind: GroupKind::Brace {
                open: '{',
                close: '}',
            },
            tokens: Vec::new(),
        }
    }

    pub fn math(delim: char, display: bool, tokens: Vec<Token>) -> Self {
        Group {
            kind: GroupKind::Math { delim, display },
            tokens,
        }
    }

    pub fn is_math(&self) -> bool {
        matches!(self.kind, GroupKind::Math { .. })
    }
}

/// Opaque data payloads carried on the stack. Not reprocessable input.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Dim(Dimension),
    Glue(Glue),
    Text(Ptr<str>),
    Tokens(TokenList),
}

impl Value {
    /// Numeric reading of this payload, if it has one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }
}

/// Internal stack markers; dropped by expansion without being visited.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Marker {
    /// Shields the following token from one round of expansion.
    Noexpand,
}

/** A single lexical unit.

A [`Token`] is -- conceptually -- either a control sequence reference, or a
character paired with its [`CategoryCode`], plus the handful of composite
and internal variants the engine works with. [`Token::Space`] stands in for
every space-category character, so two space tokens always compare equal.
*/
#[derive(Clone, PartialEq, Debug)]
pub enum Token {
    /// A character with its category as tokenized. Never `Space` category.
    Character(char, CategoryCode),
    /// Collapsed whitespace.
    Space,
    /// A paragraph break (blank input line).
    Par,
    /// A comment through end of line, preserved for downstream consumers.
    Comment(Ptr<str>),
    /// A macro parameter reference `#1`..`#9`.
    Param(u8),
    /// A control sequence reference by name.
    ControlSequence(CsName),
    /// A balanced group.
    Group(Group),
    /// An opaque data payload.
    Value(Value),
    /// One character of a control sequence name split into characters,
    /// remembering the multi-character token it came from.
    CsChar { cs: CsName, ch: char },
    /// Internal marker.
    Marker(Marker),
}

impl Token {
    /// Character token constructor; space-category characters collapse to
    /// [`Token::Space`].
    pub fn from_char_cat(c: char, cat: CategoryCode) -> Self {
        match cat {
            CategoryCode::Space => Token::Space,
            _ => Token::Character(c, cat),
        }
    }

    /// The category of this token, where it has one.
    pub fn catcode(&self) -> Option<CategoryCode> {
        match self {
            Token::Character(_, cat) => Some(*cat),
            Token::Space => Some(CategoryCode::Space),
            Token::Param(_) => Some(CategoryCode::Parameter),
            Token::ControlSequence(_) => Some(CategoryCode::Escape),
            _ => None,
        }
    }

    /// The character of this token, if it is a character token.
    pub fn char_value(&self) -> Option<char> {
        match self {
            Token::Character(c, _) => Some(*c),
            Token::CsChar { ch, .. } => Some(*ch),
            Token::Space => Some(' '),
            _ => None,
        }
    }

    pub fn is_begin_group(&self) -> bool {
        matches!(self, Token::Character(_, CategoryCode::BeginGroup))
    }

    pub fn is_end_group(&self) -> bool {
        matches!(self, Token::Character(_, CategoryCode::EndGroup))
    }

    pub fn is_math_shift(&self) -> bool {
        matches!(self, Token::Character(_, CategoryCode::MathShift))
    }

    pub fn is_space(&self) -> bool {
        matches!(self, Token::Space)
    }

    pub fn is_cs(&self, name: CsName) -> bool {
        matches!(self, Token::ControlSequence(cs) if *cs == name)
    }

    /// Dropped from expansion results without being visited: comments and
    /// internal markers.
    pub fn is_ignoreable(&self) -> bool {
        matches!(self, Token::Comment(_) | Token::Marker(_))
    }

    /// An opaque, non-reprocessable payload.
    pub fn is_data_object(&self) -> bool {
        matches!(self, Token::Value(_))
    }

    /// Whether this token occupies exactly one lexical slot, which is what
    /// lookahead rules such as double-superscript detection inspect.
    pub fn is_single_token(&self) -> bool {
        !matches!(self, Token::Group(_))
    }

    /// Capability check: can this token expand at all in the current state?
    /// Distinct from an expansion that produces no tokens.
    pub fn can_expand<ET: EngineTypes>(&self, ip: &Interpreter<ET>) -> bool {
        ip.can_expand(self)
    }

    /// Whether this token must not be transparently flattened into a
    /// surrounding list (e.g. protected content).
    pub fn is_expansion_blocker<ET: EngineTypes>(&self, ip: &Interpreter<ET>) -> bool {
        ip.is_expansion_blocker(self)
    }

    /// Perform this token's side effect. Trailing arguments are sought on
    /// `local` first when one is supplied, falling back to the main stream.
    pub fn process<ET: EngineTypes>(
        &self,
        ip: &mut Interpreter<ET>,
        local: Option<&mut TokenStack>,
    ) -> TeXResult<()> {
        ip.process_token(self.clone(), local)
    }

    /// One-step expansion. `None` means this token is not expandable;
    /// `Some` with an empty sequence means it expanded to nothing.
    pub fn expand_once<ET: EngineTypes>(
        &self,
        ip: &mut Interpreter<ET>,
        local: Option<&mut TokenStack>,
    ) -> TeXResult<Option<Vec<Token>>> {
        ip.expand_once(self, local)
    }

    /// Expand to a fixed point: the result contains no expandable tokens,
    /// with each expansion's output fully expanded before its right
    /// siblings are touched.
    pub fn expand_fully<ET: EngineTypes>(
        &self,
        ip: &mut Interpreter<ET>,
        local: Option<&mut TokenStack>,
    ) -> TeXResult<Vec<Token>> {
        match ip.expand_once(self, local)? {
            Some(exp) => ip.expand_fully(exp),
            None => Ok(if self.is_ignoreable() {
                Vec::new()
            } else {
                vec![self.clone()]
            }),
        }
    }

    /// Diagnostic display projection.
    pub fn display_fmt<W: Write>(
        &self,
        int: &CsInterner,
        cc: &CategoryCodeScheme,
        esc: Option<char>,
        f: &mut W,
    ) -> std::fmt::Result {
        match self {
            Token::Space => f.write_char(' '),
            Token::Par => f.write_str("\n\n"),
            Token::Character(c, _) => f.write_char(*c),
            Token::CsChar { ch, .. } => f.write_char(*ch),
            Token::Comment(text) => write!(f, "%{}", text),
            Token::Param(i) => write!(f, "#{}", i),
            Token::ControlSequence(cs) => cs_fmt(*cs, int, cc, esc, f),
            Token::Group(g) => {
                g.kind.open_fmt(f)?;
                for t in &g.tokens {
                    t.display_fmt(int, cc, esc, f)?;
                }
                g.kind.close_fmt(f)
            }
            Token::Value(v) => value_fmt(v, int, cc, esc, f),
            Token::Marker(_) => Ok(()),
        }
    }

    /// Source projection: text that re-tokenizes to a token equal to this
    /// one under the scheme that produced it.
    pub fn source_fmt<W: Write>(
        &self,
        int: &CsInterner,
        cc: &CategoryCodeScheme,
        esc: Option<char>,
        f: &mut W,
    ) -> std::fmt::Result {
        match self {
            // a parameter character re-tokenizes only when doubled
            Token::Character(c, CategoryCode::Parameter) => {
                f.write_char(*c)?;
                f.write_char(*c)
            }
            Token::Comment(text) => write!(f, "%{}\n", text),
            Token::Group(g) => {
                g.kind.open_fmt(f)?;
                for t in &g.tokens {
                    t.source_fmt(int, cc, esc, f)?;
                }
                g.kind.close_fmt(f)
            }
            _ => self.display_fmt(int, cc, esc, f),
        }
    }

    pub fn display_string(
        &self,
        int: &CsInterner,
        cc: &CategoryCodeScheme,
        esc: Option<char>,
    ) -> String {
        let mut s = String::new();
        let _ = self.display_fmt(int, cc, esc, &mut s);
        s
    }

    pub fn source_string(
        &self,
        int: &CsInterner,
        cc: &CategoryCodeScheme,
        esc: Option<char>,
    ) -> String {
        let mut s = String::new();
        let _ = self.source_fmt(int, cc, esc, &mut s);
        s
    }
}

/// `\foo ` with a trailing space where re-tokenization needs one to
/// terminate the name: after a multi-letter name, or a single-letter one.
fn cs_fmt<W: Write>(
    cs: CsName,
    int: &CsInterner,
    cc: &CategoryCodeScheme,
    esc: Option<char>,
    f: &mut W,
) -> std::fmt::Result {
    if let Some(e) = esc {
        f.write_char(e)?;
    }
    let name = int.resolve(cs);
    f.write_str(name)?;
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => match cc.get(c) {
            CategoryCode::Letter => f.write_char(' '),
            _ => Ok(()),
        },
        _ => f.write_char(' '),
    }
}

fn value_fmt<W: Write>(
    v: &Value,
    int: &CsInterner,
    cc: &CategoryCodeScheme,
    esc: Option<char>,
    f: &mut W,
) -> std::fmt::Result {
    match v {
        Value::Int(i) => write!(f, "{}", i),
        Value::Float(x) => write!(f, "{}", x),
        Value::Dim(d) => write!(f, "{}", d),
        Value::Glue(g) => write!(f, "{}", g),
        Value::Text(s) => f.write_str(s),
        Value::Tokens(ts) => {
            for t in ts.iter() {
                t.display_fmt(int, cc, esc, f)?;
            }
            Ok(())
        }
    }
}
