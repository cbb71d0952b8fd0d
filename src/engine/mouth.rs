/*! The mouth: lazily turns input characters into [`Token`]s under the
current category code scheme.

Tokenization is line based. Within a line the mouth is in one of three
[`MouthState`]s, which is what makes spaces collapse, blank lines produce
paragraph breaks, and spaces after control sequence names disappear.
Category code changes take effect for characters tokenized afterwards;
tokens already produced are immutable.
*/

use crate::engine::memory::CsInterner;
use crate::tex::catcodes::{CategoryCode, CategoryCodeScheme};
use crate::tex::characters::{TextLine, TextLineSource};
use crate::tex::tokens::Token;
use crate::utils::errors::{SourcePos, TeXError, TeXResult};
use log::trace;

/// A [`Mouth`] is in one of three states
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MouthState {
    /// Beginning of line
    NewLine,
    /// After a space (or control sequence)
    SkipBlank,
    /// In the middle of a line
    MidLine,
}

/// Takes a [`TextLineSource`] and lazily turns it into [`Token`]s.
#[derive(Clone, Debug)]
pub struct Mouth<S: TextLineSource> {
    state: MouthState,
    line: usize,
    col: usize,
    current: TextLine,
    source: S,
    eof: bool,
}

impl<S: TextLineSource> Mouth<S> {
    pub fn new(mut source: S) -> Self {
        let (current, eof) = match source.get_line() {
            Some(l) => (l, false),
            None => (TextLine::default(), true),
        };
        Mouth {
            state: MouthState::NewLine,
            line: 1,
            col: 0,
            current,
            source,
            eof,
        }
    }

    /// The current position, 1-based.
    pub fn position(&self) -> SourcePos {
        SourcePos {
            line: self.line,
            column: self.col + 1,
        }
    }

    /// Whether the end of input has been reached.
    pub fn eof(&self) -> bool {
        self.eof
    }

    fn get_char(&mut self) -> Option<char> {
        if self.col >= self.current.len() {
            None
        } else {
            let next = self.current[self.col];
            self.col += 1;
            Some(next)
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.current.get(self.col).copied()
    }

    fn next_line(&mut self) {
        match self.source.get_line() {
            Some(l) => {
                self.current = l;
                self.line += 1;
                self.col = 0;
                self.state = MouthState::NewLine;
            }
            None => {
                self.current = TextLine::default();
                self.col = 0;
                self.eof = true;
            }
        }
    }

    fn line_is_blank(&self, cc: &CategoryCodeScheme) -> bool {
        self.current.iter().all(|&c| {
            matches!(
                cc.get(c),
                CategoryCode::Space | CategoryCode::Ignored | CategoryCode::EOL
            )
        })
    }

    /// The next token under `cc`, or `None` at the end of input.
    pub fn get_next(
        &mut self,
        cc: &CategoryCodeScheme,
        int: &mut CsInterner,
    ) -> TeXResult<Option<Token>> {
        loop {
            let Some(c) = self.get_char() else {
                if self.eof {
                    return Ok(None);
                }
                // implicit end of line
                let was = self.state;
                self.next_line();
                match was {
                    MouthState::MidLine => return Ok(Some(Token::Space)),
                    MouthState::SkipBlank => continue,
                    MouthState::NewLine => {
                        // blank line: paragraph break; swallow the rest of the run
                        while !self.eof && self.line_is_blank(cc) {
                            self.next_line();
                        }
                        return Ok(Some(Token::Par));
                    }
                }
            };
            match cc.get(c) {
                CategoryCode::Escape => return Ok(Some(self.read_control_sequence(cc, int))),
                CategoryCode::Comment => return Ok(Some(self.read_comment())),
                CategoryCode::Parameter => return self.read_parameter(cc).map(Some),
                CategoryCode::Space => {
                    if self.state == MouthState::MidLine {
                        self.state = MouthState::SkipBlank;
                        return Ok(Some(Token::Space));
                    }
                }
                CategoryCode::EOL => {
                    // an end-of-line character discards the rest of the line
                    self.col = self.current.len();
                }
                CategoryCode::Ignored => {}
                cat => {
                    self.state = MouthState::MidLine;
                    return Ok(Some(Token::Character(c, cat)));
                }
            }
        }
    }

    /// A letter run forms a multi-character name and swallows following
    /// spaces; any other single character is a name by itself.
    fn read_control_sequence(&mut self, cc: &CategoryCodeScheme, int: &mut CsInterner) -> Token {
        match self.get_char() {
            None => {
                // escape character at end of line
                self.state = MouthState::MidLine;
                Token::ControlSequence(int.empty)
            }
            Some(c) if cc.get(c) == CategoryCode::Letter => {
                let mut name = String::new();
                name.push(c);
                while let Some(n) = self.peek_char() {
                    if cc.get(n) == CategoryCode::Letter {
                        name.push(n);
                        self.col += 1;
                    } else {
                        break;
                    }
                }
                self.state = MouthState::SkipBlank;
                trace!("control sequence \\{}", name);
                Token::ControlSequence(int.intern(&name))
            }
            Some(c) => {
                self.state = if cc.get(c) == CategoryCode::Space {
                    MouthState::SkipBlank
                } else {
                    MouthState::MidLine
                };
                let mut name = String::new();
                name.push(c);
                Token::ControlSequence(int.intern(&name))
            }
        }
    }

    fn read_comment(&mut self) -> Token {
        let text: String = self.current[self.col..].iter().collect();
        self.col = self.current.len();
        // the comment swallows its end of line
        self.state = MouthState::SkipBlank;
        Token::Comment(text.into())
    }

    /// `#1`..`#9` is a parameter token, `##` a literal parameter
    /// character; anything else after `#` is malformed.
    fn read_parameter(&mut self, cc: &CategoryCodeScheme) -> TeXResult<Token> {
        match self.get_char() {
            None => Err(TeXError::BadParameter("end of line".into()).at(self.position())),
            Some(d) if ('1'..='9').contains(&d) => {
                self.state = MouthState::MidLine;
                Ok(Token::Param(d as u8 - b'0'))
            }
            Some(p) if cc.get(p) == CategoryCode::Parameter => {
                self.state = MouthState::MidLine;
                Ok(Token::Character(p, CategoryCode::Parameter))
            }
            Some(c) => Err(TeXError::BadParameter(c.to_string()).at(self.position())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tex::catcodes::DEFAULT_SCHEME;
    use crate::tex::characters::StringLineSource;

    fn tokenize(s: &str) -> (Vec<Token>, CsInterner) {
        let mut int = CsInterner::new();
        let src: StringLineSource = s.into();
        let mut mouth = Mouth::new(src);
        let mut out = Vec::new();
        while let Some(t) = mouth.get_next(&DEFAULT_SCHEME, &mut int).unwrap() {
            out.push(t);
        }
        (out, int)
    }

    #[test]
    fn basic_stream() {
        let (toks, mut int) = tokenize("\\foo   \n  \n   {a}{!}");
        let foo = Token::ControlSequence(int.intern("foo"));
        assert_eq!(
            toks,
            vec![
                foo,
                Token::Par,
                Token::Character('{', CategoryCode::BeginGroup),
                Token::Character('a', CategoryCode::Letter),
                Token::Character('}', CategoryCode::EndGroup),
                Token::Character('{', CategoryCode::BeginGroup),
                Token::Character('!', CategoryCode::Other),
                Token::Character('}', CategoryCode::EndGroup),
                Token::Space,
            ]
        );
    }

    #[test]
    fn spaces_collapse_and_lines_end_in_space() {
        let (toks, _) = tokenize("a  b\nc");
        assert_eq!(
            toks,
            vec![
                Token::Character('a', CategoryCode::Letter),
                Token::Space,
                Token::Character('b', CategoryCode::Letter),
                Token::Space,
                Token::Character('c', CategoryCode::Letter),
                Token::Space,
            ]
        );
    }

    #[test]
    fn blank_lines_collapse_to_one_par() {
        let (toks, _) = tokenize("a\n\n\n\nb");
        assert_eq!(
            toks,
            vec![
                Token::Character('a', CategoryCode::Letter),
                Token::Space,
                Token::Par,
                Token::Character('b', CategoryCode::Letter),
                Token::Space,
            ]
        );
    }

    #[test]
    fn single_char_control_sequences() {
        let (toks, mut int) = tokenize("\\& \\{x");
        assert_eq!(toks[0], Token::ControlSequence(int.intern("&")));
        // no space skipping after a non-letter name
        assert_eq!(toks[1], Token::Space);
        assert_eq!(toks[2], Token::ControlSequence(int.intern("{")));
        assert_eq!(toks[3], Token::Character('x', CategoryCode::Letter));
    }

    #[test]
    fn comments_swallow_their_line_end() {
        let (toks, _) = tokenize("a% rest\nb");
        assert_eq!(
            toks,
            vec![
                Token::Character('a', CategoryCode::Letter),
                Token::Comment(" rest".into()),
                Token::Character('b', CategoryCode::Letter),
                Token::Space,
            ]
        );
    }

    #[test]
    fn comment_before_blank_line_keeps_the_par() {
        let (toks, _) = tokenize("a%x\n\nb");
        assert_eq!(
            toks,
            vec![
                Token::Character('a', CategoryCode::Letter),
                Token::Comment("x".into()),
                Token::Par,
                Token::Character('b', CategoryCode::Letter),
                Token::Space,
            ]
        );
    }

    #[test]
    fn parameters() {
        let (toks, _) = tokenize("#1##2");
        assert_eq!(
            toks,
            vec![
                Token::Param(1),
                Token::Character('#', CategoryCode::Parameter),
                Token::Character('2', CategoryCode::Other),
                Token::Space,
            ]
        );
        let mut int = CsInterner::new();
        let src: StringLineSource = "#x".into();
        let mut mouth = Mouth::new(src);
        assert!(matches!(
            mouth.get_next(&DEFAULT_SCHEME, &mut int),
            Err(TeXError::At { .. })
        ));
    }

    #[test]
    fn catcode_changes_affect_later_tokens_only() {
        let mut int = CsInterner::new();
        let mut scheme = DEFAULT_SCHEME.clone();
        let src: StringLineSource = "@@".into();
        let mut mouth = Mouth::new(src);
        let first = mouth.get_next(&scheme, &mut int).unwrap().unwrap();
        assert_eq!(first, Token::Character('@', CategoryCode::Other));
        scheme.set('@', CategoryCode::Letter);
        let second = mouth.get_next(&scheme, &mut int).unwrap().unwrap();
        assert_eq!(second, Token::Character('@', CategoryCode::Letter));
    }
}
