/*! Units, dimensions and glue.

All unit kinds convert to and from an absolute canonical unit (the point);
`em`, `ex` and `mu` conversion is parameterized by context-dependent
quantities supplied through [`UnitContext`]. The infinite stretch units
`fil`/`fill`/`filll` are dimensionless multipliers ordered by strength;
their conversions are the identity.
*/

use crate::utils::errors::{TeXError, TeXResult};
use std::fmt::{Display, Formatter};

/// Context-dependent quantities needed to convert `em`, `ex` and `mu`.
pub trait UnitContext {
    /// Width of `1em` in points.
    fn em_width(&self) -> f32;
    /// Height of `1ex` in points.
    fn ex_height(&self) -> f32;
}

/// Strength of an infinite stretch unit, ordered `fil < fill < filll`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum FillStrength {
    Fil = 1,
    Fill = 2,
    Filll = 3,
}

impl FillStrength {
    /// Strengths outside `1..=3` are rejected here, at construction time.
    pub fn new(strength: u8) -> TeXResult<Self> {
        match strength {
            1 => Ok(FillStrength::Fil),
            2 => Ok(FillStrength::Fill),
            3 => Ok(FillStrength::Filll),
            s => Err(TeXError::InvalidFillStrength(s)),
        }
    }

    pub fn strength(self) -> u8 {
        self as u8
    }

    pub fn keyword(self) -> &'static str {
        match self {
            FillStrength::Fil => "fil",
            FillStrength::Fill => "fill",
            FillStrength::Filll => "filll",
        }
    }
}

/// The closed set of unit kinds.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Unit {
    /// Point, the canonical absolute unit.
    Pt,
    /// Pica; 1pc = 12pt
    Pc,
    /// Inch; 1in = 72.27pt
    In,
    /// Big point; 72bp = 72.27pt
    Bp,
    /// Centimeter
    Cm,
    /// Millimeter
    Mm,
    /// Didot point
    Dd,
    /// Cicero; 1cc = 12dd
    Cc,
    /// Scaled point; 65536sp = 1pt
    Sp,
    /// Current em width
    Em,
    /// Current ex height
    Ex,
    /// Math unit; 18mu = 1em
    Mu,
    /// Infinite stretch
    Fill(FillStrength),
}

const UNIT_NAMES: &[(&str, Unit)] = &[
    ("pt", Unit::Pt),
    ("pc", Unit::Pc),
    ("in", Unit::In),
    ("bp", Unit::Bp),
    ("cm", Unit::Cm),
    ("mm", Unit::Mm),
    ("dd", Unit::Dd),
    ("cc", Unit::Cc),
    ("sp", Unit::Sp),
    ("em", Unit::Em),
    ("ex", Unit::Ex),
    ("mu", Unit::Mu),
    // longest match first
    ("filll", Unit::Fill(FillStrength::Filll)),
    ("fill", Unit::Fill(FillStrength::Fill)),
    ("fil", Unit::Fill(FillStrength::Fil)),
];

impl Unit {
    pub fn from_name(name: &str) -> Option<Unit> {
        UNIT_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, u)| *u)
    }

    /// All unit keywords, longest-match first where one is a prefix of another.
    pub fn keywords() -> impl Iterator<Item = (&'static str, Unit)> {
        UNIT_NAMES.iter().copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Unit::Pt => "pt",
            Unit::Pc => "pc",
            Unit::In => "in",
            Unit::Bp => "bp",
            Unit::Cm => "cm",
            Unit::Mm => "mm",
            Unit::Dd => "dd",
            Unit::Cc => "cc",
            Unit::Sp => "sp",
            Unit::Em => "em",
            Unit::Ex => "ex",
            Unit::Mu => "mu",
            Unit::Fill(s) => s.keyword(),
        }
    }

    pub fn is_stretch(self) -> bool {
        matches!(self, Unit::Fill(_))
    }

    /// Convert `value` in this unit to points. Stretch units are the identity.
    pub fn to_pt(self, value: f32, ctx: &dyn UnitContext) -> f32 {
        match self {
            Unit::Pt => value,
            Unit::Pc => value * 12.0,
            Unit::In => value * 72.27,
            Unit::Bp => value * 72.27 / 72.0,
            Unit::Cm => value * 72.27 / 2.54,
            Unit::Mm => value * 72.27 / 25.4,
            Unit::Dd => value * 1238.0 / 1157.0,
            Unit::Cc => value * 14856.0 / 1157.0,
            Unit::Sp => value / 65536.0,
            Unit::Em => value * ctx.em_width(),
            Unit::Ex => value * ctx.ex_height(),
            Unit::Mu => value * ctx.em_width() / 18.0,
            Unit::Fill(_) => value,
        }
    }

    /// Convert `value` in points to this unit. Stretch units are the identity.
    pub fn from_pt(self, value: f32, ctx: &dyn UnitContext) -> f32 {
        match self {
            Unit::Pt => value,
            Unit::Pc => value / 12.0,
            Unit::In => value / 72.27,
            Unit::Bp => value * 72.0 / 72.27,
            Unit::Cm => value * 2.54 / 72.27,
            Unit::Mm => value * 25.4 / 72.27,
            Unit::Dd => value * 1157.0 / 1238.0,
            Unit::Cc => value * 1157.0 / 14856.0,
            Unit::Sp => value * 65536.0,
            Unit::Em => value / ctx.em_width(),
            Unit::Ex => value / ctx.ex_height(),
            Unit::Mu => value * 18.0 / ctx.em_width(),
            Unit::Fill(_) => value,
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A numeric value paired with a unit.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Dimension {
    pub value: f32,
    pub unit: Unit,
}

impl Dimension {
    pub fn new(value: f32, unit: Unit) -> Self {
        Dimension { value, unit }
    }

    pub fn to_pt(&self, ctx: &dyn UnitContext) -> f32 {
        self.unit.to_pt(self.value, ctx)
    }

    /// The same length expressed in `unit`.
    pub fn convert_to(&self, unit: Unit, ctx: &dyn UnitContext) -> Dimension {
        Dimension {
            value: unit.from_pt(self.to_pt(ctx), ctx),
            unit,
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.value == self.value.trunc() && self.value.abs() < 1e10 {
            write!(f, "{:.1}{}", self.value, self.unit)
        } else {
            write!(f, "{}{}", self.value, self.unit)
        }
    }
}

/// A natural size with optional stretch and shrink components.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Glue {
    pub base: Dimension,
    pub stretch: Option<Dimension>,
    pub shrink: Option<Dimension>,
}

impl Glue {
    pub fn fixed(base: Dimension) -> Self {
        Glue {
            base,
            stretch: None,
            shrink: None,
        }
    }
}

impl Display for Glue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(s) = &self.stretch {
            write!(f, " plus {}", s)?;
        }
        if let Some(s) = &self.shrink {
            write!(f, " minus {}", s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCtx;
    impl UnitContext for FixedCtx {
        fn em_width(&self) -> f32 {
            10.0
        }
        fn ex_height(&self) -> f32 {
            4.3
        }
    }

    #[test]
    fn conversion_inverse() {
        let ctx = FixedCtx;
        for (_, unit) in Unit::keywords() {
            for v in [0.0f32, 1.0, -2.5, 17.25] {
                let there = unit.to_pt(v, &ctx);
                let back = unit.from_pt(there, &ctx);
                assert!(
                    (back - v).abs() < 1e-4,
                    "{} failed the round trip: {} -> {} -> {}",
                    unit,
                    v,
                    there,
                    back
                );
            }
        }
    }

    #[test]
    fn stretch_units_are_identity() {
        let ctx = FixedCtx;
        for s in [FillStrength::Fil, FillStrength::Fill, FillStrength::Filll] {
            assert_eq!(Unit::Fill(s).to_pt(3.5, &ctx), 3.5);
            assert_eq!(Unit::Fill(s).from_pt(3.5, &ctx), 3.5);
        }
    }

    #[test]
    fn stretch_strength_ordering() {
        assert!(FillStrength::Fil < FillStrength::Fill);
        assert!(FillStrength::Fill < FillStrength::Filll);
        assert_eq!(FillStrength::new(2).unwrap(), FillStrength::Fill);
        assert_eq!(
            FillStrength::new(0),
            Err(TeXError::InvalidFillStrength(0))
        );
        assert_eq!(
            FillStrength::new(4),
            Err(TeXError::InvalidFillStrength(4))
        );
    }

    #[test]
    fn keyword_lookup() {
        assert_eq!(Unit::from_name("pt"), Some(Unit::Pt));
        assert_eq!(
            Unit::from_name("filll"),
            Some(Unit::Fill(FillStrength::Filll))
        );
        assert_eq!(Unit::from_name("px"), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Dimension::new(1.5, Unit::Pt).to_string(), "1.5pt");
        assert_eq!(Dimension::new(2.0, Unit::Em).to_string(), "2.0em");
        let g = Glue {
            base: Dimension::new(1.0, Unit::Pt),
            stretch: Some(Dimension::new(1.0, Unit::Fill(FillStrength::Fil))),
            shrink: None,
        };
        assert_eq!(g.to_string(), "1.0pt plus 1.0fil");
    }

    #[test]
    fn em_dependent_conversion() {
        let ctx = FixedCtx;
        assert_eq!(Unit::Em.to_pt(2.0, &ctx), 20.0);
        assert_eq!(Unit::Mu.to_pt(18.0, &ctx), 10.0);
        let d = Dimension::new(1.0, Unit::In).convert_to(Unit::Pt, &ctx);
        assert!((d.value - 72.27).abs() < 1e-4);
    }
}
