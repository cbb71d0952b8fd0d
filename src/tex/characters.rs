/*! Input text handling: lines of characters fed to the tokenizer. */

/// A single line of input, stripped of its line terminator and of
/// trailing spaces (the way TeX preprocesses input lines).
pub type TextLine = Box<[char]>;

/// A source of input lines.
pub trait TextLineSource {
    /// The next line, or `None` at end of input.
    fn get_line(&mut self) -> Option<TextLine>;
}

impl TextLineSource for Box<dyn TextLineSource> {
    fn get_line(&mut self) -> Option<TextLine> {
        (**self).get_line()
    }
}

/// A [`TextLineSource`] over an in-memory string.
#[derive(Clone, Debug)]
pub struct StringLineSource {
    lines: std::vec::IntoIter<TextLine>,
}

impl<'a> From<&'a str> for StringLineSource {
    fn from(s: &'a str) -> Self {
        let mut lines: Vec<TextLine> = s
            .split('\n')
            .map(|l| l.trim_end_matches(['\r', ' ']).chars().collect())
            .collect();
        // a trailing newline terminates the last line, it does not open a new one
        if s.ends_with('\n') {
            lines.pop();
        }
        StringLineSource {
            lines: lines.into_iter(),
        }
    }
}

impl TextLineSource for StringLineSource {
    fn get_line(&mut self) -> Option<TextLine> {
        self.lines.next()
    }
}
