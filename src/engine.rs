/*! Engine components: the [`Mouth`](mouth::Mouth), the scoped
[`State`](state::State), the [expansion machinery](expansion) and the
[`Interpreter`] tying them together.

The interpreter is the single explicit context value threaded through every
call: it owns the main token stack, the mouth, the scoped state, the
interner and the two collaborator contracts ([`Listener`] and
[`Diagnostics`](crate::utils::errors::Diagnostics)). It is constructed once
per parsing run and torn down at run end; there is no process-wide state.
*/

use crate::commands::{Command, MacroDef, RegisterDef, RegisterKind};
use crate::engine::expansion::TokenStack;
use crate::engine::groups::{CloseKind, GroupMatcher};
use crate::engine::memory::{CsInterner, CsName};
use crate::engine::mouth::Mouth;
use crate::engine::state::{Mode, State};
use crate::tex::catcodes::CategoryCode;
use crate::tex::characters::{StringLineSource, TextLineSource};
use crate::tex::tokens::token_lists::TokenList;
use crate::tex::tokens::{Group, GroupKind, Token, Value};
use crate::tex::units::{Dimension, UnitContext};
use crate::utils::errors::{Diagnostics, SourcePos, TeXError, TeXResult};
use log::trace;

pub mod expansion;
pub mod groups;
pub mod memory;
pub mod mouth;
pub mod state;

/// Bundles the collaborator types of an interpreter run.
pub trait EngineTypes: Sized + 'static {
    type Listener: Listener;
    type Diagnostics: Diagnostics;
}

/** The output contract.

The listener receives every fully processed token, supplies the
context-dependent measurements the unit system needs, and provides the
constructors for primitive tokens, so the core never hard-codes how a
collaborator wants its tokens built.
*/
pub trait Listener: UnitContext {
    /// Receive one fully processed token.
    fn absorb(&mut self, token: Token);

    /// A scope opened while processing; purely informational.
    fn begin_group(&mut self, _kind: GroupKind) {}
    /// The matching scope close.
    fn end_group(&mut self, _kind: GroupKind) {}

    fn space(&self) -> Token {
        Token::Space
    }
    fn par(&self) -> Token {
        Token::Par
    }
    fn letter(&self, c: char) -> Token {
        Token::Character(c, CategoryCode::Letter)
    }
    fn other(&self, c: char) -> Token {
        Token::Character(c, CategoryCode::Other)
    }
    fn group(&self) -> Group {
        Group::empty_brace()
    }
    fn math_group(&self, delim: char, display: bool) -> Group {
        Group::math(delim, display, Vec::new())
    }
}

/// A [`Listener`] that buffers everything it absorbs, with fixed metrics.
pub struct BufferListener {
    pub tokens: Vec<Token>,
    pub em: f32,
    pub ex: f32,
}

impl Default for BufferListener {
    fn default() -> Self {
        BufferListener {
            tokens: Vec::new(),
            em: 10.0,
            ex: 4.3,
        }
    }
}

impl UnitContext for BufferListener {
    fn em_width(&self) -> f32 {
        self.em
    }
    fn ex_height(&self) -> f32 {
        self.ex
    }
}

impl Listener for BufferListener {
    fn absorb(&mut self, token: Token) {
        self.tokens.push(token);
    }
}

/// Per-run configuration, constructed once and threaded with the context.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// The initial escape character used in display and source projections.
    pub escape_char: Option<char>,
    /// Abort after this many one-step expansions; `None` leaves runaway
    /// macro recursion to the host stack, like the original.
    pub expansion_budget: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            escape_char: Some('\\'),
            expansion_budget: None,
        }
    }
}

/// The interpreter: the explicit context for one parsing run.
pub struct Interpreter<ET: EngineTypes> {
    pub state: State<ET>,
    /// The main stack of pending tokens. Collaborators may push recovery
    /// tokens onto its front at any time.
    pub stack: TokenStack,
    pub listener: ET::Listener,
    pub diagnostics: ET::Diagnostics,
    pub interner: CsInterner,
    pub settings: EngineSettings,
    pub(crate) mouth: Option<Mouth<Box<dyn TextLineSource>>>,
    pub(crate) matcher: GroupMatcher,
    pub(crate) expansions: usize,
    pending_global: bool,
}

impl<ET: EngineTypes> Interpreter<ET> {
    pub fn new(listener: ET::Listener, diagnostics: ET::Diagnostics) -> Self {
        Self::with_settings(listener, diagnostics, EngineSettings::default())
    }

    pub fn with_settings(
        listener: ET::Listener,
        diagnostics: ET::Diagnostics,
        settings: EngineSettings,
    ) -> Self {
        let mut state = State::new();
        state.set_escape_char(settings.escape_char, true);
        Interpreter {
            state,
            stack: TokenStack::default(),
            listener,
            diagnostics,
            interner: CsInterner::new(),
            settings,
            mouth: None,
            matcher: GroupMatcher::new(),
            expansions: 0,
            pending_global: false,
        }
    }

    /// Feed a new input source to the mouth.
    pub fn input(&mut self, source: impl TextLineSource + 'static) {
        self.mouth = Some(Mouth::new(Box::new(source)));
    }

    pub fn input_str(&mut self, s: &str) {
        self.input(StringLineSource::from(s));
    }

    /// The current input position, if input is attached.
    pub fn position(&self) -> SourcePos {
        self.mouth
            .as_ref()
            .map(|m| m.position())
            .unwrap_or_default()
    }

    /// Process tokens until the input is exhausted, then check that every
    /// streamed scope was closed.
    pub fn run(&mut self) -> TeXResult<()> {
        self.expansions = 0;
        while let Some(t) = self.next_token(None)? {
            self.process_token(t, None)?;
        }
        match self.matcher.finish() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fatal(e)),
        }
    }

    pub fn run_str(&mut self, s: &str) -> TeXResult<()> {
        self.input_str(s);
        self.run()
    }

    /// Surface a fatal error to the diagnostics contract; the error still
    /// propagates.
    pub(crate) fn fatal(&mut self, e: TeXError) -> TeXError {
        self.diagnostics.fatal(&e);
        e
    }

    /// Surface a recoverable error; `Ok` means continue with a substitute.
    pub(crate) fn recover(&mut self, e: TeXError) -> TeXResult<()> {
        self.diagnostics.recoverable(e)
    }

    /// Arm the global-assignment prefix for the next assignment.
    pub fn set_global_prefix(&mut self) {
        self.pending_global = true;
    }

    pub fn take_global_prefix(&mut self) -> bool {
        std::mem::take(&mut self.pending_global)
    }

    /// Open a scope that is closed by a later end token in the stream
    /// rather than an eagerly read group.
    pub fn open_scope(&mut self, kind: GroupKind) {
        self.matcher.open(kind);
        self.state.push_frame();
        if let GroupKind::Math { display, .. } = kind {
            self.state.set_mode(
                if display {
                    Mode::DisplayMath
                } else {
                    Mode::InlineMath
                },
                false,
            );
        }
        self.listener.begin_group(kind);
    }

    /// Close a streamed scope; the close delimiter must match.
    pub fn close_scope(&mut self, close: CloseKind) -> TeXResult<()> {
        match self.matcher.close(close) {
            Ok(kind) => {
                self.state.pop_frame();
                self.listener.end_group(kind);
                Ok(())
            }
            Err(e) => {
                let pos = self.position();
                Err(self.fatal(e.at(pos)))
            }
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.state.depth()
    }

    /// Bind `name` to a command value through the scope stack.
    pub fn define_command(&mut self, name: &str, cmd: Command<ET>, globally: bool) -> CsName {
        let cs = self.interner.intern(name);
        self.state.set_command(cs, cmd, globally);
        cs
    }

    pub fn define_macro(&mut self, name: &str, def: MacroDef, globally: bool) -> CsName {
        self.define_command(name, Command::Macro(crate::utils::Ptr::new(def)), globally)
    }

    /// Allocate a register under `name`. Allocation happens once; a second
    /// definition under the same name rebinds the same cell name.
    pub fn define_register(&mut self, name: &str, kind: RegisterKind, globally: bool) -> RegisterDef {
        let cs = self.interner.intern(name);
        let def = RegisterDef { name: cs, kind };
        self.state.set_command(cs, Command::Register(def), globally);
        def
    }

    /// The current contents of a numeric register cell.
    pub fn numeric_register_value(&self, def: RegisterDef) -> Value {
        match self.state.get_numeric_register(def.name) {
            Some(v) => v.clone(),
            None => match def.kind {
                RegisterKind::Dim => Value::Dim(Dimension::new(0.0, crate::tex::units::Unit::Pt)),
                _ => Value::Int(0),
            },
        }
    }

    /// The current contents of a token register cell.
    pub fn token_register_value(&self, def: RegisterDef) -> TokenList {
        self.state
            .get_token_register(def.name)
            .cloned()
            .unwrap_or_else(TokenList::empty)
    }

    /// Process one token: perform its side effect against the current
    /// state, fetching any trailing arguments from `local` first.
    pub fn process_token(
        &mut self,
        t: Token,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<()> {
        match t {
            Token::Character(c, CategoryCode::BeginGroup) => {
                let g = self.read_group(c, local.as_deref_mut())?;
                self.process_group(g, local)
            }
            Token::Character(c, CategoryCode::EndGroup) => self.close_scope(CloseKind::Brace(c)),
            Token::Character(c, CategoryCode::MathShift) => {
                let display = self.peek_math_shift(local.as_deref_mut())?;
                let g = self.read_math(c, display, local.as_deref_mut())?;
                self.process_group(g, local)
            }
            Token::Character(c, cat @ (CategoryCode::Superscript | CategoryCode::Subscript)) => {
                let arg = self.read_script_arg(local.as_deref_mut())?;
                self.listener.absorb(Token::Character(c, cat));
                self.process_token(arg, local)
            }
            Token::Character(c, CategoryCode::Active) => self.process_active(c, local),
            Token::ControlSequence(cs) => self.process_cs(cs, local),
            Token::Group(g) => self.process_group(g, local),
            Token::Marker(_) => Ok(()),
            t => {
                self.listener.absorb(t);
                Ok(())
            }
        }
    }

    fn process_cs(&mut self, cs: CsName, local: Option<&mut TokenStack>) -> TeXResult<()> {
        let Some(cmd) = self.state.get_command(cs).cloned() else {
            let name = self.interner.resolve(cs).to_string();
            let pos = self.position();
            return Err(self.fatal(TeXError::UndefinedControlSequence(name).at(pos)));
        };
        self.process_command(Some(cs), cmd, local)
    }

    fn process_active(&mut self, c: char, local: Option<&mut TokenStack>) -> TeXResult<()> {
        let Some(cmd) = self.state.get_active(c).cloned() else {
            let pos = self.position();
            return Err(self.fatal(TeXError::UndefinedActiveCharacter(c).at(pos)));
        };
        self.process_command(None, cmd, local)
    }

    pub(crate) fn process_command(
        &mut self,
        origin: Option<CsName>,
        cmd: Command<ET>,
        mut local: Option<&mut TokenStack>,
    ) -> TeXResult<()> {
        match cmd {
            Command::Macro(def) => {
                let exp = self.expand_macro(origin, &def, local.as_deref_mut())?;
                self.splice(local, exp);
                Ok(())
            }
            Command::Register(def) => self.assign_register(def, local),
            Command::Content(v) => {
                self.listener.absorb(Token::Value(v));
                Ok(())
            }
            Command::Relax => Ok(()),
            Command::Custom(c) => c.process(self, local),
        }
    }

    /// Process a balanced group: a fresh scope around its children, with
    /// the mode switched for math groups.
    pub fn process_group(
        &mut self,
        g: Group,
        _local: Option<&mut TokenStack>,
    ) -> TeXResult<()> {
        trace!("processing group {}", g.kind.describe());
        self.state.push_frame();
        if let GroupKind::Math { display, .. } = g.kind {
            self.state.set_mode(
                if display {
                    Mode::DisplayMath
                } else {
                    Mode::InlineMath
                },
                false,
            );
        }
        self.listener.begin_group(g.kind);
        // children run against their own local stack, so argument
        // lookahead stays inside the group
        let mut inner = TokenStack::from(g.tokens);
        let mut result = Ok(());
        while let Some(t) = inner.pop() {
            match self.process_token(t, Some(&mut inner)) {
                Ok(()) => {}
                e @ Err(_) => {
                    result = e;
                    break;
                }
            }
        }
        // the scope unwinds even on error
        self.state.pop_frame();
        self.listener.end_group(g.kind);
        result
    }

    /// Convert a payload into plain character tokens.
    pub fn value_to_tokens(&self, v: &Value) -> Vec<Token> {
        match v {
            Value::Tokens(list) => list.to_vec(),
            Value::Text(s) => self.string_to_tokens(s),
            Value::Int(i) => self.string_to_tokens(&i.to_string()),
            Value::Float(x) => self.string_to_tokens(&x.to_string()),
            Value::Dim(d) => self.string_to_tokens(&d.to_string()),
            Value::Glue(g) => self.string_to_tokens(&g.to_string()),
        }
    }

    /// Characters of `s` as letter/other/space tokens under the current
    /// scheme.
    pub fn string_to_tokens(&self, s: &str) -> Vec<Token> {
        s.chars()
            .map(|c| match self.state.get_catcode(c) {
                CategoryCode::Space => Token::Space,
                CategoryCode::Letter => Token::Character(c, CategoryCode::Letter),
                _ => Token::Character(c, CategoryCode::Other),
            })
            .collect()
    }

    /// Split a token into its source characters. The characters of a
    /// control sequence name keep a back-reference to the name they came
    /// from.
    pub fn stringify(&self, t: &Token) -> Vec<Token> {
        match t {
            Token::ControlSequence(cs) => {
                let mut out = Vec::new();
                if let Some(e) = self.state.escape_char() {
                    out.push(Token::Character(e, CategoryCode::Other));
                }
                for ch in self.interner.resolve(*cs).chars() {
                    out.push(Token::CsChar { cs: *cs, ch });
                }
                out
            }
            t => {
                let src =
                    t.source_string(&self.interner, self.state.catcode_scheme(), self.state.escape_char());
                self.string_to_tokens(&src)
            }
        }
    }

    /// Display projection of a token in the current state.
    pub fn display_token(&self, t: &Token) -> String {
        t.display_string(&self.interner, self.state.catcode_scheme(), self.state.escape_char())
    }

    /// Source projection of a token in the current state.
    pub fn source_token(&self, t: &Token) -> String {
        t.source_string(&self.interner, self.state.catcode_scheme(), self.state.escape_char())
    }
}
