/*! Shared token lists; conceptually a wrapper around `Rc<[Token]>`.

Macro replacement templates and token registers are stored as
[`TokenList`]s: cheap to clone, impossible to mutate in place. Expansion
clones tokens *out* of the list, so a definition is never aliased by the
sequences its expansions produce.
*/

use super::Token;
use crate::engine::memory::CsInterner;
use crate::tex::catcodes::CategoryCodeScheme;
use std::fmt::{Display, Formatter};

/// An immutable, shared list of [`Token`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenList(pub shared_vector::SharedVector<Token>);

impl TokenList {
    pub fn empty() -> Self {
        TokenList(shared_vector::SharedVector::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The `i`th token. Panics if out of bounds.
    pub fn get(&self, i: usize) -> &Token {
        &(*self.0)[i]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    /// A freshly owned copy of the contents.
    pub fn to_vec(&self) -> Vec<Token> {
        self.0.iter().cloned().collect()
    }

    /// A helper implementing [`Display`] using the source projection of
    /// each token.
    pub fn displayable<'a>(
        &'a self,
        int: &'a CsInterner,
        cc: &'a CategoryCodeScheme,
        esc: Option<char>,
    ) -> TokenListDisplay<'a> {
        TokenListDisplay {
            ls: self,
            int,
            cc,
            esc,
        }
    }
}

impl From<Vec<Token>> for TokenList {
    fn from(value: Vec<Token>) -> Self {
        let mut v = shared_vector::Vector::new();
        for t in value {
            v.push(t);
        }
        TokenList(v.into())
    }
}

impl FromIterator<Token> for TokenList {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        let mut v = shared_vector::Vector::new();
        for t in iter {
            v.push(t);
        }
        TokenList(v.into())
    }
}

pub struct TokenListDisplay<'a> {
    ls: &'a TokenList,
    int: &'a CsInterner,
    cc: &'a CategoryCodeScheme,
    esc: Option<char>,
}

impl Display for TokenListDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for t in self.ls.iter() {
            t.source_fmt(self.int, self.cc, self.esc, f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tex::catcodes::{CategoryCode, DEFAULT_SCHEME};

    #[test]
    fn shared_list_round_trip() {
        let toks = vec![
            Token::Character('h', CategoryCode::Letter),
            Token::Space,
            Token::Character('!', CategoryCode::Other),
        ];
        let list: TokenList = toks.clone().into();
        assert_eq!(list.len(), 3);
        assert!(!list.is_empty());
        assert_eq!(list.to_vec(), toks);
        // cloning the list shares storage, cloning out of it does not
        let second = list.clone();
        assert_eq!(second, list);
    }

    #[test]
    fn displayable_uses_source_form() {
        let mut int = CsInterner::new();
        let list: TokenList = vec![
            Token::ControlSequence(int.intern("it")),
            Token::Character('x', CategoryCode::Letter),
        ]
        .into();
        assert_eq!(
            list.displayable(&int, &DEFAULT_SCHEME, Some('\\')).to_string(),
            "\\it x"
        );
    }
}
