/*! The expansion engine: a state machine over stacks of pending tokens.

The interpreter owns one *main* stack; argument fetching and group
processing work against transient *local* stacks. Every operation here
takes an `Option<&mut TokenStack>` and pulls from the local stack first
when one is supplied and non-empty, falling back to the main stream, so
local-stack behavior is observably identical to main-stack behavior.

Full expansion splices each one-step expansion back onto the *front* of
the stack, so an expansion's own output is fully expanded before any
sibling further back is touched (leftmost-first, depth-first, to a fixed
point). Ignoreable tokens are dropped without being visited; expansion
blockers pass through unexpanded.
*/

use crate::commands::{Command, MacroDef, RegisterDef, RegisterKind};
use crate::engine::groups::{self, CloseKind};
use crate::engine::memory::CsName;
use crate::engine::{EngineTypes, Interpreter, Listener};
use crate::tex::catcodes::CategoryCode;
use crate::tex::tokens::token_lists::TokenList;
use crate::tex::tokens::{Group, GroupKind, Marker, Token, Value};
use crate::tex::units::{Dimension, Unit};
use crate::utils::errors::{TeXError, TeXResult};
use either::Either;
use log::trace;
use std::collections::VecDeque;

/// A stack of pending tokens; the front is the next token consumed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenStack {
    tokens: VecDeque<Token>,
}

impl TokenStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn pop(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    /// Push a single token back onto the front.
    pub fn requeue(&mut self, t: Token) {
        self.tokens.push_front(t);
    }

    /// Append to the back.
    pub fn push(&mut self, t: Token) {
        self.tokens.push_back(t);
    }

    /// Splice a sequence onto the front, preserving its order.
    pub fn splice_front(&mut self, toks: Vec<Token>) {
        for t in toks.into_iter().rev() {
            self.tokens.push_front(t);
        }
    }

    pub fn to_vec(&self) -> Vec<Token> {
        self.tokens.iter().cloned().collect()
    }
}

impl From<Vec<Token>> for TokenStack {
    fn from(value: Vec<Token>) -> Self {
        TokenStack {
            tokens: value.into(),
        }
    }
}

impl<ET: EngineTypes> Interpreter<ET> {
    /// The next pending token: local stack first, then the main stack,
    /// then the mouth.
    pub fn next_token(&mut self, local: Option<&mut TokenStack>) -> TeXResult<Option<Token>> {
        if let Some(l) = local {
            if let Some(t) = l.pop() {
                return Ok(Some(t));
            }
        }
        if let Some(t) = self.stack.pop() {
            return Ok(Some(t));
        }
        self.next_from_mouth()
    }

    fn next_from_mouth(&mut self) -> TeXResult<Option<Token>> {
        let Some(m) = self.mouth.as_mut() else {
            return Ok(None);
        };
        match m.get_next(self.state.catcode_scheme(), &mut self.interner) {
            Ok(t) => Ok(t),
            Err(e) => Err(self.fatal(e)),
        }
    }

    /// Push a token back onto the front of the current source.
    pub fn requeue(&mut self, local: Option<&mut TokenStack>, t: Token) {
        match local {
            Some(l) => l.requeue(t),
            None => self.stack.requeue(t),
        }
    }

    /// Splice a sequence onto the front of the current source.
    pub fn splice(&mut self, local: Option<&mut TokenStack>, toks: Vec<Token>) {
        match local {
            Some(l) => l.splice_front(toks),
            None => self.stack.splice_front(toks),
        }
    }

    /// Capability check: `false` both for inherently unexpandable tokens
    /// and for names with no expandable binding.
    pub fn can_expand(&self, t: &Token) -> bool {
        match t {
            Token::ControlSequence(cs) => self
                .state
                .get_command(*cs)
                .map_or(false, |c| c.can_expand()),
            Token::Character(c, CategoryCode::Active) => self
                .state
                .get_active(*c)
                .map_or(false, |c| c.can_expand()),
            _ => false,
        }
    }

    /// Whether full expansion must leave `t` in place (protected content).
    pub fn is_expansion_blocker(&self, t: &Token) -> bool {
        match t {
            Token::ControlSequence(cs) => self
                .state
                .get_command(*cs)
                .map_or(false, |c| c.is_expansion_blocker()),
            Token::Character(c, CategoryCode::Active) => self
                .state
                .get_active(*c)
                .map_or(false, |c| c.is_expansion_blocker()),
            _ => false,
        }
    }

    /// One-step expansion. `None` means not expandable (which includes
    /// undefined names; those only error when processed); `Some(empty)`
    /// means the token expanded to nothing.
    pub fn expand_once(
        &mut self,
        t: &Token,
        local: Option<&mut TokenStack>,
    ) -> TeXResult<Option<Vec<Token>>> {
        let (origin, cmd) = match t {
            Token::ControlSequence(cs) => match self.state.get_command(*cs) {
                Some(c) => (Some(*cs), c.clone()),
                None => return Ok(None),
            },
            Token::Character(c, CategoryCode::Active) => match self.state.get_active(*c) {
                Some(cmd) => (None, cmd.clone()),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        self.expand_command(origin, &cmd, local)
    }

    pub(crate) fn expand_command(
        &mut self,
        origin: Option<CsName>,
        cmd: &Command<ET>,
        local: Option<&mut TokenStack>,
    ) -> TeXResult<Option<Vec<Token>>> {
        match cmd {
            Command::Macro(def) => Ok(Some(self.expand_macro(origin, def, local)?)),
            Command::Content(v) => {
                self.charge_expansion()?;
                let v = v.clone();
                Ok(Some(self.value_to_tokens(&v)))
            }
            Command::Custom(c) => {
                self.charge_expansion()?;
                c.clone().expand_once(self, local)
            }
            _ => Ok(None),
        }
    }

    /// Fetch the macro's arguments and substitute them into a clone of the
    /// template.
    pub(crate) fn expand_macro(
        &mut self,
        origin: Option<CsName>,
        def: &MacroDef,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Vec<Token>> {
        self.charge_expansion()?;
        let mut args: Vec<Vec<Token>> = Vec::with_capacity(def.arity() as usize);
        for _ in 0..def.arity() {
            args.push(self.pop_arg_checked(def.long, origin, local.as_deref_mut())?);
        }
        if let Some(cs) = origin {
            trace!("expanding \\{}", self.interner.resolve(cs));
        }
        Ok(def.substitute(&args))
    }

    fn charge_expansion(&mut self) -> TeXResult<()> {
        self.expansions += 1;
        if let Some(budget) = self.settings.expansion_budget {
            if self.expansions > budget {
                return Err(self.fatal(TeXError::ExpansionBudgetExhausted(budget)));
            }
        }
        Ok(())
    }

    /// An undelimited macro argument as a flattened token sequence: spaces
    /// skipped, a braced group contributes its contents, anything else is
    /// a single token.
    pub fn pop_arg(&mut self, local: Option<&mut TokenStack>) -> TeXResult<Vec<Token>> {
        self.pop_arg_checked(true, None, local)
    }

    fn pop_arg_checked(
        &mut self,
        long: bool,
        origin: Option<CsName>,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Vec<Token>> {
        match self.pop_next_arg_checked(long, origin, local.as_deref_mut())? {
            Token::Group(g) => Ok(g.tokens),
            t => Ok(vec![t]),
        }
    }

    /// Like [`pop_arg`](Self::pop_arg), but a braced argument stays
    /// wrapped as a single group token.
    pub fn pop_next_arg(&mut self, local: Option<&mut TokenStack>) -> TeXResult<Token> {
        self.pop_next_arg_checked(true, None, local)
    }

    fn pop_next_arg_checked(
        &mut self,
        long: bool,
        origin: Option<CsName>,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Token> {
        loop {
            match self.next_token(local.as_deref_mut())? {
                None => {
                    let pos = self.position();
                    return Err(self.fatal(TeXError::UnexpectedEof.at(pos)));
                }
                Some(Token::Space) => continue,
                Some(t) if t.is_ignoreable() => continue,
                Some(Token::Par) if !long => {
                    let name = origin
                        .map(|cs| self.interner.resolve(cs).to_string())
                        .unwrap_or_default();
                    return Err(self.fatal(TeXError::RunawayArgument(name)));
                }
                Some(Token::Character(c, CategoryCode::BeginGroup)) => {
                    let g = self.read_group(c, local.as_deref_mut())?;
                    return Ok(Token::Group(g));
                }
                Some(t) => return Ok(t),
            }
        }
    }

    /// Pop where a *value* is required: expandable tokens are expanded in
    /// place until something unexpandable surfaces; spaces and ignoreables
    /// are skipped; a noexpand marker shields its successor.
    pub fn pop_value_token(
        &mut self,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Option<Token>> {
        loop {
            let Some(t) = self.next_token(local.as_deref_mut())? else {
                return Ok(None);
            };
            match t {
                Token::Marker(Marker::Noexpand) => return self.next_token(local),
                t if t.is_ignoreable() => continue,
                Token::Space => continue,
                t => {
                    if self.can_expand(&t) && !self.is_expansion_blocker(&t) {
                        if let Some(exp) = self.expand_once(&t, local.as_deref_mut())? {
                            self.splice(local.as_deref_mut(), exp);
                            continue;
                        }
                    }
                    return Ok(Some(t));
                }
            }
        }
    }

    /// Fixed-point expansion of an owned sequence; trailing macro
    /// arguments resolve through the main stream.
    pub fn expand_fully(&mut self, tokens: Vec<Token>) -> TeXResult<Vec<Token>> {
        let mut stack = TokenStack::from(tokens);
        self.expand_fully_stack(&mut stack)
    }

    /// Fixed-point expansion draining `stack`.
    pub fn expand_fully_stack(&mut self, stack: &mut TokenStack) -> TeXResult<Vec<Token>> {
        let mut out = Vec::new();
        while let Some(t) = stack.pop() {
            if let Token::Marker(Marker::Noexpand) = t {
                if let Some(next) = stack.pop() {
                    out.push(next);
                }
                continue;
            }
            if t.is_ignoreable() {
                continue;
            }
            if self.is_expansion_blocker(&t) {
                out.push(t);
                continue;
            }
            match self.expand_once(&t, Some(stack))? {
                Some(exp) => stack.splice_front(exp),
                None => out.push(t),
            }
        }
        Ok(out)
    }

    /// Collect a balanced group after its begin character. Fatal if the
    /// input ends first.
    pub fn read_group(
        &mut self,
        open: char,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Group> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token(local.as_deref_mut())? {
                None => {
                    let pos = self.position();
                    return Err(
                        self.fatal(TeXError::UnterminatedGroup(open.to_string()).at(pos))
                    );
                }
                Some(Token::Character(c, CategoryCode::EndGroup)) => {
                    return Ok(Group {
                        kind: GroupKind::Brace { open, close: c },
                        tokens,
                    });
                }
                Some(Token::Character(c, CategoryCode::BeginGroup)) => {
                    let inner = self.read_group(c, local.as_deref_mut())?;
                    tokens.push(Token::Group(inner));
                }
                Some(Token::Character(c, CategoryCode::MathShift)) => {
                    let display = self.peek_math_shift(local.as_deref_mut())?;
                    let inner = self.read_math(c, display, local.as_deref_mut())?;
                    tokens.push(Token::Group(inner));
                }
                Some(t) => tokens.push(t),
            }
        }
    }

    /// Whether the next token is another math shift character (display
    /// math); consumes it if so.
    pub(crate) fn peek_math_shift(
        &mut self,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<bool> {
        match self.next_token(local.as_deref_mut())? {
            Some(Token::Character(_, CategoryCode::MathShift)) => Ok(true),
            Some(t) => {
                self.requeue(local, t);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Collect a math group after its opening shift character(s).
    ///
    /// The same glyph closes the group, doubled for display math; a plain
    /// end-group character never does. `$$ ... $` is fatal, as is running
    /// out of input.
    pub fn read_math(
        &mut self,
        delim: char,
        display: bool,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Group> {
        let kind = GroupKind::Math { delim, display };
        let mut tokens = Vec::new();
        loop {
            match self.next_token(local.as_deref_mut())? {
                None => {
                    let pos = self.position();
                    return Err(self.fatal(TeXError::MissingEndMath.at(pos)));
                }
                Some(Token::Character(_, CategoryCode::MathShift)) => {
                    if !display {
                        return Ok(Group::math(delim, false, tokens));
                    }
                    match self.next_token(local.as_deref_mut())? {
                        Some(Token::Character(_, CategoryCode::MathShift)) => {
                            return Ok(Group::math(delim, true, tokens));
                        }
                        _ => {
                            let pos = self.position();
                            return Err(self.fatal(TeXError::DisplayMathEndedInline.at(pos)));
                        }
                    }
                }
                Some(Token::Character(c, CategoryCode::EndGroup)) => {
                    debug_assert!(!groups::closes(kind, &CloseKind::Brace(c)));
                    let pos = self.position();
                    return Err(
                        self.fatal(TeXError::UnexpectedEndGroup(c.to_string()).at(pos))
                    );
                }
                Some(Token::Character(c, CategoryCode::BeginGroup)) => {
                    let inner = self.read_group(c, local.as_deref_mut())?;
                    tokens.push(Token::Group(inner));
                }
                Some(t) => tokens.push(t),
            }
        }
    }

    /// The argument of a superscript or subscript token, with recovery:
    /// another script token right away is reported as a recoverable error
    /// and an empty placeholder group is substituted, as if an empty
    /// argument had been supplied.
    pub fn read_script_arg(
        &mut self,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Token> {
        loop {
            match self.next_token(local.as_deref_mut())? {
                None => {
                    let pos = self.position();
                    return Err(self.fatal(TeXError::UnexpectedEof.at(pos)));
                }
                Some(Token::Space) => continue,
                Some(t) if t.is_ignoreable() => continue,
                Some(
                    t @ Token::Character(
                        _,
                        CategoryCode::Superscript | CategoryCode::Subscript,
                    ),
                ) => {
                    let err = match t.catcode() {
                        Some(CategoryCode::Superscript) => TeXError::DoubleSuperscript,
                        _ => TeXError::DoubleSubscript,
                    };
                    self.recover(err)?;
                    self.requeue(local.as_deref_mut(), t);
                    // the placeholder comes from the listener's constructor
                    let placeholder = self.listener.group();
                    return Ok(Token::Group(placeholder));
                }
                Some(Token::Character(c, CategoryCode::BeginGroup)) => {
                    let g = self.read_group(c, local.as_deref_mut())?;
                    return Ok(Token::Group(g));
                }
                Some(t) => return Ok(t),
            }
        }
    }

    /// An optional `+`/`-` sign run; `true` for an odd number of minuses.
    fn scan_sign(&mut self, mut local: Option<&mut TokenStack>) -> TeXResult<bool> {
        let mut negative = false;
        loop {
            match self.pop_value_token(local.as_deref_mut())? {
                Some(Token::Character('+', CategoryCode::Other)) => {}
                Some(Token::Character('-', CategoryCode::Other)) => negative = !negative,
                Some(t) => {
                    self.requeue(local.as_deref_mut(), t);
                    return Ok(negative);
                }
                None => return Ok(negative),
            }
        }
    }

    /// Digits with an optional decimal fraction. A trailing space is
    /// consumed; any other terminator is pushed back.
    fn scan_decimal(
        &mut self,
        first: char,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<(f64, bool)> {
        let mut text = String::new();
        let mut fraction = false;
        if first == '.' || first == ',' {
            fraction = true;
            text.push_str("0.");
        } else {
            text.push(first);
        }
        loop {
            match self.next_token(local.as_deref_mut())? {
                None => break,
                Some(Token::Space) => break,
                Some(Token::Character(c, _)) if c.is_ascii_digit() => text.push(c),
                Some(Token::Character(c, _)) if !fraction && (c == '.' || c == ',') => {
                    fraction = true;
                    text.push('.');
                }
                Some(t) => {
                    self.requeue(local.as_deref_mut(), t);
                    break;
                }
            }
        }
        Ok((text.parse::<f64>().unwrap_or(0.0), fraction))
    }

    /// Greedy longest-match scan of a unit keyword; consumed tokens are
    /// restored when no keyword matches.
    fn try_scan_unit(&mut self, mut local: Option<&mut TokenStack>) -> TeXResult<Option<Unit>> {
        let mut pending: Vec<Token> = Vec::new();
        let mut s = String::new();
        loop {
            let Some(t) = self.next_token(local.as_deref_mut())? else {
                break;
            };
            if s.is_empty() && t.is_space() {
                continue;
            }
            let c = match t.char_value() {
                Some(c) if c.is_ascii_alphabetic() => c,
                _ => {
                    self.requeue(local.as_deref_mut(), t);
                    break;
                }
            };
            s.push(c);
            if !Unit::keywords().any(|(k, _)| k.starts_with(s.as_str())) {
                s.pop();
                self.requeue(local.as_deref_mut(), t);
                break;
            }
            pending.push(t);
            let complete = Unit::from_name(&s).is_some();
            let extendable = Unit::keywords().any(|(k, _)| k.len() > s.len() && k.starts_with(s.as_str()));
            if complete && !extendable {
                break;
            }
        }
        match Unit::from_name(&s) {
            Some(u) => Ok(Some(u)),
            None => {
                for t in pending.into_iter().rev() {
                    self.requeue(local.as_deref_mut(), t);
                }
                Ok(None)
            }
        }
    }

    /// An integer. No unit keywords are consumed; dimensions that surface
    /// anyway (register contents, payloads) are converted to points and
    /// rounded.
    pub fn pop_number(&mut self, local: Option<&mut TokenStack>) -> TeXResult<i64> {
        match self.pop_numeric_inner(false, local)? {
            Either::Left(i) => Ok(i),
            Either::Right(d) => Ok(d.to_pt(&self.listener).round() as i64),
        }
    }

    /// A number or a dimension, whichever the input provides. Resolves
    /// through the numeric capability of registers and data payloads, and
    /// falls back to textual coercion before giving up.
    pub fn pop_numeric(
        &mut self,
        local: Option<&mut TokenStack>,
    ) -> TeXResult<Either<i64, Dimension>> {
        self.pop_numeric_inner(true, local)
    }

    fn pop_numeric_inner(
        &mut self,
        scan_units: bool,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Either<i64, Dimension>> {
        let negative = self.scan_sign(local.as_deref_mut())?;
        let t = match self.pop_value_token(local.as_deref_mut())? {
            None => {
                let pos = self.position();
                return Err(self.fatal(TeXError::NumberExpected("end of input".into()).at(pos)));
            }
            Some(t) => t,
        };
        let value = match &t {
            Token::Value(Value::Int(i)) => Either::Left(*i),
            Token::Value(Value::Float(f)) => Either::Left(*f as i64),
            Token::Value(Value::Dim(d)) => Either::Right(*d),
            Token::Value(Value::Glue(g)) => Either::Right(g.base),
            Token::ControlSequence(cs) => match self.state.get_command(*cs).cloned() {
                Some(Command::Register(def)) => self.register_numeric(def)?,
                _ => self.coerce_numeric_token(&t)?,
            },
            Token::Character(c, _) if c.is_ascii_digit() || *c == '.' || *c == ',' => {
                let first = *c;
                let (v, fraction) = self.scan_decimal(first, local.as_deref_mut())?;
                let unit = if scan_units {
                    self.try_scan_unit(local.as_deref_mut())?
                } else {
                    None
                };
                match unit {
                    Some(u) => Either::Right(Dimension::new(v as f32, u)),
                    None if fraction => Either::Left(v.round() as i64),
                    None => Either::Left(v as i64),
                }
            }
            Token::Character(c, CategoryCode::BeginGroup) => {
                // a braced value is coerced from its flattened contents
                let open = *c;
                let g = self.read_group(open, local.as_deref_mut())?;
                self.coerce_numeric_token(&Token::Group(g))?
            }
            _ => self.coerce_numeric_token(&t)?,
        };
        Ok(apply_sign(negative, value))
    }

    /// A dimension: a dimension payload, a register's contents, or a
    /// decimal constant followed by a unit keyword.
    pub fn pop_dimension(
        &mut self,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<Dimension> {
        let negative = self.scan_sign(local.as_deref_mut())?;
        let t = match self.pop_value_token(local.as_deref_mut())? {
            None => {
                let pos = self.position();
                return Err(
                    self.fatal(TeXError::DimensionExpected("end of input".into()).at(pos))
                );
            }
            Some(t) => t,
        };
        let dim = match &t {
            Token::Value(Value::Dim(d)) => *d,
            Token::Value(Value::Glue(g)) => g.base,
            Token::Value(Value::Int(i)) => {
                let v = *i as f32;
                self.require_unit(v, local.as_deref_mut())?
            }
            Token::Value(Value::Float(f)) => {
                let v = *f as f32;
                self.require_unit(v, local.as_deref_mut())?
            }
            Token::ControlSequence(cs) => match self.state.get_command(*cs).cloned() {
                Some(Command::Register(def)) => match self.register_numeric(def)? {
                    Either::Right(d) => d,
                    Either::Left(i) => self.require_unit(i as f32, local.as_deref_mut())?,
                },
                _ => self.coerce_dimension_token(&t)?,
            },
            Token::Character(c, _) if c.is_ascii_digit() || *c == '.' || *c == ',' => {
                let first = *c;
                let (v, _) = self.scan_decimal(first, local.as_deref_mut())?;
                self.require_unit(v as f32, local.as_deref_mut())?
            }
            Token::Character(c, CategoryCode::BeginGroup) => {
                let open = *c;
                let g = self.read_group(open, local.as_deref_mut())?;
                self.coerce_dimension_token(&Token::Group(g))?
            }
            _ => self.coerce_dimension_token(&t)?,
        };
        Ok(if negative {
            Dimension::new(-dim.value, dim.unit)
        } else {
            dim
        })
    }

    fn require_unit(
        &mut self,
        value: f32,
        local: Option<&mut TokenStack>,
    ) -> TeXResult<Dimension> {
        match self.try_scan_unit(local)? {
            Some(u) => Ok(Dimension::new(value, u)),
            None => {
                let pos = self.position();
                Err(self.fatal(TeXError::DimensionExpected(value.to_string()).at(pos)))
            }
        }
    }

    /// The numeric reading of a register cell.
    fn register_numeric(&mut self, def: RegisterDef) -> TeXResult<Either<i64, Dimension>> {
        match def.kind {
            RegisterKind::Int => Ok(Either::Left(
                self.numeric_register_value(def).as_int().unwrap_or(0),
            )),
            RegisterKind::Dim => match self.numeric_register_value(def) {
                Value::Dim(d) => Ok(Either::Right(d)),
                v => Ok(Either::Left(v.as_int().unwrap_or(0))),
            },
            RegisterKind::Tokens => {
                // textual coercion of the list's source form
                let list = self.token_register_value(def);
                let src: String = list
                    .iter()
                    .map(|t| self.flat_source(t))
                    .collect();
                self.coerce_numeric_str(&src)
            }
        }
    }

    /// Source form with group braces stripped, for coercion.
    fn flat_source(&self, t: &Token) -> String {
        match t {
            Token::Group(g) => g.tokens.iter().map(|c| self.flat_source(c)).collect(),
            t => self.source_token(t),
        }
    }

    /// Last-resort coercion of a non-numeric token where a number is
    /// required: parse its textual form, fatal if that fails too.
    fn coerce_numeric_token(&mut self, t: &Token) -> TeXResult<Either<i64, Dimension>> {
        let src = self.flat_source(t);
        self.coerce_numeric_str(&src)
    }

    fn coerce_numeric_str(&mut self, src: &str) -> TeXResult<Either<i64, Dimension>> {
        let trimmed = src.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Either::Left(i));
        }
        if let Some(d) = parse_dimension_str(trimmed) {
            return Ok(Either::Right(d));
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Ok(Either::Left(f.round() as i64));
        }
        let pos = self.position();
        Err(self.fatal(TeXError::NumberExpected(src.to_string()).at(pos)))
    }

    fn coerce_dimension_token(&mut self, t: &Token) -> TeXResult<Dimension> {
        let src = self.flat_source(t);
        let trimmed = src.trim();
        if let Some(d) = parse_dimension_str(trimmed) {
            return Ok(d);
        }
        let pos = self.position();
        Err(self.fatal(TeXError::DimensionExpected(src.to_string()).at(pos)))
    }

    /// A register's assignment behavior: an optional `=`, then either a
    /// clone of another register's contents or a freshly scanned value of
    /// the register's kind. A plain value assigned to a token register is
    /// coerced into a one-element list.
    pub(crate) fn assign_register(
        &mut self,
        def: RegisterDef,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<()> {
        let globally = self.take_global_prefix();
        // optional `=`
        match self.pop_value_token(local.as_deref_mut())? {
            None => {
                let pos = self.position();
                return Err(self.fatal(TeXError::UnexpectedEof.at(pos)));
            }
            Some(Token::Character('=', CategoryCode::Other)) => {}
            Some(t) => self.requeue(local.as_deref_mut(), t),
        }
        // a reference to another register clones its current contents
        let next = self.pop_value_token(local.as_deref_mut())?;
        if let Some(Token::ControlSequence(cs)) = &next {
            if let Some(Command::Register(src)) = self.state.get_command(*cs).cloned() {
                return self.assign_from_register(def, src, globally);
            }
        }
        if let Some(t) = next {
            self.requeue(local.as_deref_mut(), t);
        }
        match def.kind {
            RegisterKind::Int => {
                let v = self.pop_number(local)?;
                self.state
                    .set_numeric_register(def.name, Value::Int(v), globally);
            }
            RegisterKind::Dim => {
                let d = self.pop_dimension(local)?;
                self.state
                    .set_numeric_register(def.name, Value::Dim(d), globally);
            }
            RegisterKind::Tokens => {
                let list = match self.pop_next_arg(local)? {
                    Token::Group(g) => TokenList::from(g.tokens),
                    single => TokenList::from(vec![single]),
                };
                self.state.set_token_register(def.name, list, globally);
            }
        }
        Ok(())
    }

    fn assign_from_register(
        &mut self,
        def: RegisterDef,
        src: RegisterDef,
        globally: bool,
    ) -> TeXResult<()> {
        match (def.kind, src.kind) {
            (RegisterKind::Tokens, RegisterKind::Tokens) => {
                let v = self.token_register_value(src);
                self.state.set_token_register(def.name, v, globally);
            }
            (RegisterKind::Tokens, _) => {
                // wrap the plain value into a one-element list
                let v = self.numeric_register_value(src);
                let list = TokenList::from(vec![Token::Value(v)]);
                self.state.set_token_register(def.name, list, globally);
            }
            (_, RegisterKind::Tokens) => {
                let v = self.register_numeric(src)?;
                let v = match (def.kind, v) {
                    (RegisterKind::Int, Either::Left(i)) => Value::Int(i),
                    (RegisterKind::Int, Either::Right(d)) => {
                        Value::Int(d.to_pt(&self.listener).round() as i64)
                    }
                    (_, Either::Right(d)) => Value::Dim(d),
                    (_, Either::Left(i)) => Value::Dim(Dimension::new(i as f32, Unit::Pt)),
                };
                self.state.set_numeric_register(def.name, v, globally);
            }
            _ => {
                let v = self.numeric_register_value(src);
                let v = self.coerce_value_to_kind(v, def.kind);
                self.state.set_numeric_register(def.name, v, globally);
            }
        }
        Ok(())
    }

    fn coerce_value_to_kind(&self, v: Value, kind: RegisterKind) -> Value {
        match (kind, v) {
            (RegisterKind::Int, Value::Int(i)) => Value::Int(i),
            (RegisterKind::Int, Value::Dim(d)) => {
                Value::Int(d.to_pt(&self.listener).round() as i64)
            }
            (RegisterKind::Int, Value::Float(f)) => Value::Int(f.round() as i64),
            (RegisterKind::Dim, Value::Dim(d)) => Value::Dim(d),
            (RegisterKind::Dim, Value::Int(i)) => {
                Value::Dim(Dimension::new(i as f32, Unit::Pt))
            }
            (RegisterKind::Dim, Value::Float(f)) => {
                Value::Dim(Dimension::new(f as f32, Unit::Pt))
            }
            (_, v) => v,
        }
    }

    /// Advance a numeric register by an integer or dimension operand.
    pub fn advance_register(
        &mut self,
        def: RegisterDef,
        by: Either<i64, Dimension>,
        globally: bool,
    ) -> TeXResult<()> {
        match def.kind {
            RegisterKind::Tokens => {
                let name = self.interner.resolve(def.name).to_string();
                Err(self.fatal(TeXError::RegisterKindMismatch("numeric", name)))
            }
            RegisterKind::Int => {
                let cur = self.numeric_register_value(def).as_int().unwrap_or(0);
                let delta = match by {
                    Either::Left(i) => i,
                    Either::Right(d) => d.to_pt(&self.listener).round() as i64,
                };
                self.state
                    .set_numeric_register(def.name, Value::Int(cur + delta), globally);
                Ok(())
            }
            RegisterKind::Dim => {
                let cur = match self.numeric_register_value(def) {
                    Value::Dim(d) => d,
                    Value::Int(i) => Dimension::new(i as f32, Unit::Pt),
                    _ => Dimension::new(0.0, Unit::Pt),
                };
                let delta_pt = match by {
                    Either::Left(i) => i as f32,
                    Either::Right(d) => d.to_pt(&self.listener),
                };
                let sum = cur.to_pt(&self.listener) + delta_pt;
                let value = cur.unit.from_pt(sum, &self.listener);
                self.state.set_numeric_register(
                    def.name,
                    Value::Dim(Dimension::new(value, cur.unit)),
                    globally,
                );
                Ok(())
            }
        }
    }

    /// Multiply a numeric register by an integer factor.
    pub fn multiply_register(
        &mut self,
        def: RegisterDef,
        factor: i64,
        globally: bool,
    ) -> TeXResult<()> {
        self.scale_register(def, factor, false, globally)
    }

    /// Divide a numeric register by an integer divisor (truncating).
    pub fn divide_register(
        &mut self,
        def: RegisterDef,
        divisor: i64,
        globally: bool,
    ) -> TeXResult<()> {
        if divisor == 0 {
            return Err(self.fatal(TeXError::DivisionByZero));
        }
        self.scale_register(def, divisor, true, globally)
    }

    fn scale_register(
        &mut self,
        def: RegisterDef,
        factor: i64,
        divide: bool,
        globally: bool,
    ) -> TeXResult<()> {
        match def.kind {
            RegisterKind::Tokens => {
                let name = self.interner.resolve(def.name).to_string();
                Err(self.fatal(TeXError::RegisterKindMismatch("numeric", name)))
            }
            RegisterKind::Int => {
                let cur = self.numeric_register_value(def).as_int().unwrap_or(0);
                let v = if divide { cur / factor } else { cur * factor };
                self.state
                    .set_numeric_register(def.name, Value::Int(v), globally);
                Ok(())
            }
            RegisterKind::Dim => {
                let cur = match self.numeric_register_value(def) {
                    Value::Dim(d) => d,
                    Value::Int(i) => Dimension::new(i as f32, Unit::Pt),
                    _ => Dimension::new(0.0, Unit::Pt),
                };
                let value = if divide {
                    cur.value / factor as f32
                } else {
                    cur.value * factor as f32
                };
                self.state.set_numeric_register(
                    def.name,
                    Value::Dim(Dimension::new(value, cur.unit)),
                    globally,
                );
                Ok(())
            }
        }
    }
}

fn apply_sign(negative: bool, v: Either<i64, Dimension>) -> Either<i64, Dimension> {
    if !negative {
        return v;
    }
    match v {
        Either::Left(i) => Either::Left(-i),
        Either::Right(d) => Either::Right(Dimension::new(-d.value, d.unit)),
    }
}

/// Parse `"<float><unit>"`, e.g. `"1.5pt"`, used by textual coercion.
fn parse_dimension_str(s: &str) -> Option<Dimension> {
    let split = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i)?;
    let (num, unit) = s.split_at(split);
    let value: f32 = num.trim().parse().ok()?;
    let unit = Unit::from_name(unit.trim())?;
    Some(Dimension::new(value, unit))
}
