/*!
    Category codes for characters, implemented as the enum [`CategoryCode`].
    A [`CategoryCodeScheme`] maps every character to a [`CategoryCode`].
*/

use crate::utils::HMap;
use lazy_static::lazy_static;
use std::fmt::Formatter;

/** The category code of a character.

To convert between [`CategoryCode`]s and their numerical values (as [`u8`]),
use [`CategoryCode::try_from`] and [`CategoryCode::into`], respectively.

# Example
```rust
use tex_parser::tex::catcodes::CategoryCode;

let cat = CategoryCode::BeginGroup;
let num: u8 = cat.into();
assert_eq!(num, 1);
let cat2 = CategoryCode::try_from(1).unwrap();
assert_eq!(cat2, cat);
```
*/
#[derive(Copy, PartialEq, Eq, Clone, Hash)]
pub enum CategoryCode {
    /// Escape character (0); usually `\`
    Escape,
    /// Begin group character (1); usually `{`
    BeginGroup,
    /// End group character (2); usually `}`
    EndGroup,
    /// Math shift character (3); usually `$`
    MathShift,
    /// Alignment tab character (4); usually `&`
    AlignmentTab,
    /// End of line character (5)
    EOL,
    /// Parameter character (6); usually `#`
    Parameter,
    /// Superscript character (7); usually `^`
    Superscript,
    /// Subscript character (8); usually `_`
    Subscript,
    /// Ignored character (9)
    Ignored,
    /// Space character (10); usually ` `
    Space,
    /// Letter character (11), usually a-z and A-Z
    Letter,
    /// Other character (12), usually e.g. `@`, `!`, `?`, etc.
    Other,
    /// Active character (13); usually `~`
    Active,
    /// Comment character (14); usually `%`
    Comment,
}

impl Default for CategoryCode {
    fn default() -> Self {
        CategoryCode::Other
    }
}

impl std::fmt::Debug for CategoryCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
impl std::fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use CategoryCode::*;
        write!(
            f,
            "{}",
            match self {
                Escape => "Escape",
                BeginGroup => "BeginGroup",
                EndGroup => "EndGroup",
                MathShift => "MathShift",
                AlignmentTab => "AlignmentTab",
                EOL => "EOL",
                Parameter => "Parameter",
                Superscript => "Superscript",
                Subscript => "Subscript",
                Ignored => "Ignored",
                Space => "Space",
                Letter => "Letter",
                Other => "Other",
                Active => "Active",
                Comment => "Comment",
            }
        )
    }
}

impl From<CategoryCode> for u8 {
    fn from(value: CategoryCode) -> u8 {
        use CategoryCode::*;
        match value {
            Escape => 0,
            BeginGroup => 1,
            EndGroup => 2,
            MathShift => 3,
            AlignmentTab => 4,
            EOL => 5,
            Parameter => 6,
            Superscript => 7,
            Subscript => 8,
            Ignored => 9,
            Space => 10,
            Letter => 11,
            Other => 12,
            Active => 13,
            Comment => 14,
        }
    }
}

impl TryFrom<u8> for CategoryCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use CategoryCode::*;
        Ok(match value {
            0 => Escape,
            1 => BeginGroup,
            2 => EndGroup,
            3 => MathShift,
            4 => AlignmentTab,
            5 => EOL,
            6 => Parameter,
            7 => Superscript,
            8 => Subscript,
            9 => Ignored,
            10 => Space,
            11 => Letter,
            12 => Other,
            13 => Active,
            14 => Comment,
            _ => return Err(()),
        })
    }
}

/** Assigns a [`CategoryCode`] to every character.

Every character has exactly one category at any instant; characters never
assigned one explicitly are [`CategoryCode::Other`]. ASCII lives in a flat
table, everything else in an overflow map.
*/
#[derive(Clone, Debug)]
pub struct CategoryCodeScheme {
    ascii: [CategoryCode; 128],
    other: HMap<char, CategoryCode>,
}

impl CategoryCodeScheme {
    /// A scheme mapping every character to [`CategoryCode::Other`].
    pub fn empty() -> Self {
        CategoryCodeScheme {
            ascii: [CategoryCode::Other; 128],
            other: HMap::default(),
        }
    }

    pub fn get(&self, c: char) -> CategoryCode {
        let i = c as u32;
        if i < 128 {
            self.ascii[i as usize]
        } else {
            self.other.get(&c).copied().unwrap_or_default()
        }
    }

    /// Set the category of `c`, returning the previous one.
    pub fn set(&mut self, c: char, cc: CategoryCode) -> CategoryCode {
        let i = c as u32;
        if i < 128 {
            std::mem::replace(&mut self.ascii[i as usize], cc)
        } else if cc == CategoryCode::Other {
            self.other.remove(&c).unwrap_or_default()
        } else {
            self.other.insert(c, cc).unwrap_or_default()
        }
    }
}

impl Default for CategoryCodeScheme {
    fn default() -> Self {
        DEFAULT_SCHEME.clone()
    }
}

lazy_static! {
    /** The [`CategoryCodeScheme`] where all characters are
        [`CategoryCode::Other`] except for the space character, which is
        [`CategoryCode::Space`].
    */
    pub static ref OTHER_SCHEME: CategoryCodeScheme = {
        let mut catcodes = CategoryCodeScheme::empty();
        catcodes.set(' ', CategoryCode::Space);
        catcodes
    };
    /**
    The default [`CategoryCodeScheme`].

    All characters are [`CategoryCode::Other`] except for:

    | Character    | Category Code   |
    |--------------|-----------------
    | ` `          | [`Space`](CategoryCode::Space)|
    | a-z, A-Z     | [`Letter`](CategoryCode::Letter) |
    | `\`          | [`Escape`](CategoryCode::Escape)  |
    | `\n`, `\r`   | [`EOL`](CategoryCode::EOL)       |
    | `%`          | [`Comment`](CategoryCode::Comment)|
    | `~`          | [`Active`](CategoryCode::Active)  |
    | `#`          | [`Parameter`](CategoryCode::Parameter)|
    | `^`          | [`Superscript`](CategoryCode::Superscript)|
    | `_`          | [`Subscript`](CategoryCode::Subscript)|
    | `{`          | [`BeginGroup`](CategoryCode::BeginGroup)|
    | `}`          | [`EndGroup`](CategoryCode::EndGroup)|
    | `$`          | [`MathShift`](CategoryCode::MathShift)|
    | `&`          | [`AlignmentTab`](CategoryCode::AlignmentTab)|
    */
    pub static ref DEFAULT_SCHEME: CategoryCodeScheme = {
        let mut catcodes = CategoryCodeScheme::empty();
        catcodes.set('{', CategoryCode::BeginGroup);
        catcodes.set('}', CategoryCode::EndGroup);
        catcodes.set('$', CategoryCode::MathShift);
        catcodes.set('&', CategoryCode::AlignmentTab);
        catcodes.set('#', CategoryCode::Parameter);
        catcodes.set('^', CategoryCode::Superscript);
        catcodes.set('_', CategoryCode::Subscript);
        catcodes.set('~', CategoryCode::Active);
        catcodes.set('\\', CategoryCode::Escape);
        catcodes.set(' ', CategoryCode::Space);
        catcodes.set('\n', CategoryCode::EOL);
        catcodes.set('\r', CategoryCode::EOL);
        catcodes.set('%', CategoryCode::Comment);
        for c in 'a'..='z' {
            catcodes.set(c, CategoryCode::Letter);
        }
        for c in 'A'..='Z' {
            catcodes.set(c, CategoryCode::Letter);
        }
        catcodes
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_round_trip() {
        for i in 0u8..15 {
            let cc = CategoryCode::try_from(i).unwrap();
            let back: u8 = cc.into();
            assert_eq!(back, i);
        }
        assert!(CategoryCode::try_from(15).is_err());
    }

    #[test]
    fn scheme_defaults_to_other() {
        let scheme = CategoryCodeScheme::empty();
        assert_eq!(scheme.get('x'), CategoryCode::Other);
        assert_eq!(scheme.get('素'), CategoryCode::Other);
    }

    #[test]
    fn scheme_set_returns_old() {
        let mut scheme = DEFAULT_SCHEME.clone();
        assert_eq!(scheme.get('\\'), CategoryCode::Escape);
        let old = scheme.set('\\', CategoryCode::Other);
        assert_eq!(old, CategoryCode::Escape);
        assert_eq!(scheme.get('\\'), CategoryCode::Other);
        // non-ASCII goes through the overflow map
        let old = scheme.set('ß', CategoryCode::Letter);
        assert_eq!(old, CategoryCode::Other);
        assert_eq!(scheme.get('ß'), CategoryCode::Letter);
        assert_eq!(scheme.set('ß', CategoryCode::Other), CategoryCode::Letter);
        assert_eq!(scheme.get('ß'), CategoryCode::Other);
    }
}
