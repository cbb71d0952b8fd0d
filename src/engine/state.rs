/*! The interpreter state: nested scopes over commands, registers, category
codes and modes.

A scope frame is created on group begin and destroyed on the matching group
end. Local assignments revert when their frame is destroyed, revealing
whatever binding (or absence) the enclosing scope had; global assignments
overwrite the binding in every currently open frame and therefore survive
group closure. Reads resolve innermost-first and fall back to the initial
table.
*/

use crate::commands::Command;
use crate::engine::memory::CsName;
use crate::engine::state::fields::{
    CatcodeField, KeyValueField, SingleValueField, StateField,
};
use crate::engine::EngineTypes;
use crate::tex::catcodes::{CategoryCode, CategoryCodeScheme, DEFAULT_SCHEME};
use crate::tex::tokens::token_lists::TokenList;
use crate::tex::tokens::Value;
use log::debug;

pub mod fields;

/// The processing mode of a scope.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Mode {
    #[default]
    Text,
    InlineMath,
    DisplayMath,
}

impl Mode {
    pub fn is_math(self) -> bool {
        self != Mode::Text
    }
}

/// The scoped state of an interpreter run.
pub struct State<ET: EngineTypes> {
    commands: KeyValueField<CsName, Command<ET>>,
    active: KeyValueField<char, Command<ET>>,
    numeric_registers: KeyValueField<CsName, Value>,
    token_registers: KeyValueField<CsName, TokenList>,
    catcodes: CatcodeField,
    mode: SingleValueField<Mode>,
    escape_char: SingleValueField<Option<char>>,
    depth: usize,
}

impl<ET: EngineTypes> State<ET> {
    pub fn new() -> Self {
        Self::with_scheme(DEFAULT_SCHEME.clone())
    }

    pub fn with_scheme(scheme: CategoryCodeScheme) -> Self {
        State {
            commands: KeyValueField::default(),
            active: KeyValueField::default(),
            numeric_registers: KeyValueField::default(),
            token_registers: KeyValueField::default(),
            catcodes: CatcodeField::new(scheme),
            mode: SingleValueField::new(Mode::Text),
            escape_char: SingleValueField::new(Some('\\')),
            depth: 0,
        }
    }

    /// Open a scope frame.
    pub fn push_frame(&mut self) {
        self.depth += 1;
        debug!("entering group level {}", self.depth);
        self.commands.push_frame();
        self.active.push_frame();
        self.numeric_registers.push_frame();
        self.token_registers.push_frame();
        self.catcodes.push_frame();
        self.mode.push_frame();
        self.escape_char.push_frame();
    }

    /// Close the innermost scope frame, rolling back its local changes.
    pub fn pop_frame(&mut self) {
        debug!("leaving group level {}", self.depth);
        self.depth = self.depth.saturating_sub(1);
        self.commands.pop_frame();
        self.active.pop_frame();
        self.numeric_registers.pop_frame();
        self.token_registers.pop_frame();
        self.catcodes.pop_frame();
        self.mode.pop_frame();
        self.escape_char.pop_frame();
    }

    /// Current scope nesting depth; 0 at top level.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn mode(&self) -> Mode {
        *self.mode.get()
    }

    pub fn set_mode(&mut self, mode: Mode, globally: bool) {
        if globally {
            self.mode.set_globally(mode)
        } else {
            self.mode.set_locally(mode)
        }
    }

    pub fn escape_char(&self) -> Option<char> {
        *self.escape_char.get()
    }

    pub fn set_escape_char(&mut self, c: Option<char>, globally: bool) {
        if globally {
            self.escape_char.set_globally(c)
        } else {
            self.escape_char.set_locally(c)
        }
    }

    pub fn catcode_scheme(&self) -> &CategoryCodeScheme {
        self.catcodes.scheme()
    }

    pub fn get_catcode(&self, c: char) -> CategoryCode {
        self.catcodes.get(c)
    }

    /// Takes effect only for characters tokenized after the change.
    pub fn set_catcode(&mut self, c: char, cc: CategoryCode, globally: bool) {
        if globally {
            self.catcodes.set_globally(c, cc)
        } else {
            self.catcodes.set_locally(c, cc)
        }
    }

    pub fn get_command(&self, name: CsName) -> Option<&Command<ET>> {
        self.commands.get(&name)
    }

    pub fn set_command(&mut self, name: CsName, cmd: Command<ET>, globally: bool) {
        if globally {
            self.commands.set_globally(name, cmd)
        } else {
            self.commands.set_locally(name, cmd)
        }
    }

    pub fn get_active(&self, c: char) -> Option<&Command<ET>> {
        self.active.get(&c)
    }

    pub fn set_active(&mut self, c: char, cmd: Command<ET>, globally: bool) {
        if globally {
            self.active.set_globally(c, cmd)
        } else {
            self.active.set_locally(c, cmd)
        }
    }

    pub fn get_numeric_register(&self, name: CsName) -> Option<&Value> {
        self.numeric_registers.get(&name)
    }

    pub fn set_numeric_register(&mut self, name: CsName, v: Value, globally: bool) {
        if globally {
            self.numeric_registers.set_globally(name, v)
        } else {
            self.numeric_registers.set_locally(name, v)
        }
    }

    pub fn get_token_register(&self, name: CsName) -> Option<&TokenList> {
        self.token_registers.get(&name)
    }

    pub fn set_token_register(&mut self, name: CsName, v: TokenList, globally: bool) {
        if globally {
            self.token_registers.set_globally(name, v)
        } else {
            self.token_registers.set_locally(name, v)
        }
    }
}

impl<ET: EngineTypes> Default for State<ET> {
    fn default() -> Self {
        Self::new()
    }
}
