//! Color spaces and color values.
//!
//! A [`ColorSpace`] knows how many components its colors carry, which is
//! what the color operators validate against.

use std::collections::HashMap;
use std::sync::LazyLock;

use smallvec::{SmallVec, smallvec};

use crate::model::object::{Name, Value};

/// Nesting bound for spaces defined in terms of other spaces.
const MAX_BASE_DEPTH: usize = 4;

/// A color value, shaped by the space it was set in.
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
    /// Components in any other space (indexed, separation, Lab, ICC ...).
    Components(SmallVec<[f64; 4]>),
    /// Colored tiling pattern or shading pattern.
    PatternColored(Name),
    /// Uncolored tiling pattern with its tint in the base space.
    PatternUncolored(Box<Color>, Name),
}

impl Color {
    /// Component values, empty for pattern colors.
    pub fn components(&self) -> SmallVec<[f64; 4]> {
        match self {
            Self::Gray(g) => smallvec![*g],
            Self::Rgb(r, g, b) => smallvec![*r, *g, *b],
            Self::Cmyk(c, m, y, k) => smallvec![*c, *m, *y, *k],
            Self::Components(values) => values.clone(),
            Self::PatternColored(_) | Self::PatternUncolored(..) => SmallVec::new(),
        }
    }
}

/// A resolved color space.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray,
    CalRgb,
    Lab,
    IccBased { components: usize },
    Indexed { base: Box<ColorSpace>, hival: u32 },
    Separation { colorant: Name },
    DeviceN { colorants: usize },
    Pattern { base: Option<Box<ColorSpace>> },
}

/// Spaces that are legal as a bare name operand of `CS`/`cs`.
pub static PREDEFINED_COLORSPACE: LazyLock<HashMap<&'static str, ColorSpace>> =
    LazyLock::new(|| {
        HashMap::from([
            ("DeviceGray", ColorSpace::DeviceGray),
            ("DeviceRGB", ColorSpace::DeviceRgb),
            ("DeviceCMYK", ColorSpace::DeviceCmyk),
            ("CalGray", ColorSpace::CalGray),
            ("CalRGB", ColorSpace::CalRgb),
            ("Lab", ColorSpace::Lab),
            ("Pattern", ColorSpace::Pattern { base: None }),
        ])
    });

/// Abbreviations allowed inside inline image dictionaries.
pub static INLINE_COLORSPACE_ABBREV: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("G", "DeviceGray"),
            ("RGB", "DeviceRGB"),
            ("CMYK", "DeviceCMYK"),
            ("I", "Indexed"),
        ])
    });

impl ColorSpace {
    /// Family name as written in a document.
    pub const fn family(&self) -> &'static str {
        match self {
            Self::DeviceGray => "DeviceGray",
            Self::DeviceRgb => "DeviceRGB",
            Self::DeviceCmyk => "DeviceCMYK",
            Self::CalGray => "CalGray",
            Self::CalRgb => "CalRGB",
            Self::Lab => "Lab",
            Self::IccBased { .. } => "ICCBased",
            Self::Indexed { .. } => "Indexed",
            Self::Separation { .. } => "Separation",
            Self::DeviceN { .. } => "DeviceN",
            Self::Pattern { .. } => "Pattern",
        }
    }

    /// Number of numeric operands `SC`/`SCN` expect. For a pattern space
    /// this is the base space's count (0 for colored patterns).
    pub fn ncomponents(&self) -> usize {
        match self {
            Self::DeviceGray | Self::CalGray => 1,
            Self::DeviceRgb | Self::CalRgb | Self::Lab => 3,
            Self::DeviceCmyk => 4,
            Self::IccBased { components } => *components,
            Self::Indexed { .. } | Self::Separation { .. } => 1,
            Self::DeviceN { colorants } => *colorants,
            Self::Pattern { base } => base.as_ref().map_or(0, |b| b.ncomponents()),
        }
    }

    pub const fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }

    /// The color a space starts with when selected by `CS`/`cs`.
    pub fn initial_color(&self) -> Color {
        match self {
            Self::DeviceGray | Self::CalGray => Color::Gray(0.0),
            Self::DeviceRgb | Self::CalRgb => Color::Rgb(0.0, 0.0, 0.0),
            Self::DeviceCmyk => Color::Cmyk(0.0, 0.0, 0.0, 1.0),
            Self::Lab | Self::IccBased { .. } | Self::Indexed { .. } => {
                Color::Components(smallvec![0.0; self.ncomponents()])
            }
            Self::Separation { .. } | Self::DeviceN { .. } => {
                Color::Components(smallvec![1.0; self.ncomponents()])
            }
            Self::Pattern { .. } => Color::Components(SmallVec::new()),
        }
    }

    /// Builds a color from operands already checked against `ncomponents`.
    pub fn color_from(&self, values: &[f64]) -> Color {
        match (self, values) {
            (Self::DeviceGray | Self::CalGray, [g]) => Color::Gray(*g),
            (Self::DeviceRgb | Self::CalRgb, [r, g, b]) => Color::Rgb(*r, *g, *b),
            (Self::DeviceCmyk, [c, m, y, k]) => Color::Cmyk(*c, *m, *y, *k),
            (Self::IccBased { .. }, [g]) => Color::Gray(*g),
            (Self::IccBased { .. }, [r, g, b]) => Color::Rgb(*r, *g, *b),
            (Self::IccBased { .. }, [c, m, y, k]) => Color::Cmyk(*c, *m, *y, *k),
            _ => Color::Components(values.iter().copied().collect()),
        }
    }

    /// Looks up a bare name: predefined families and inline abbreviations.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = INLINE_COLORSPACE_ABBREV.get(name).copied().unwrap_or(name);
        PREDEFINED_COLORSPACE.get(name).cloned()
    }

    /// Resolves a color space definition: a name or a family array.
    ///
    /// `resolve` dereferences indirect values; it is handed the raw
    /// entries so callers decide how references are followed.
    pub fn from_value(value: &Value, resolve: &dyn Fn(&Value) -> Value) -> Option<Self> {
        Self::from_value_bounded(value, resolve, 0)
    }

    fn from_value_bounded(
        value: &Value,
        resolve: &dyn Fn(&Value) -> Value,
        depth: usize,
    ) -> Option<Self> {
        if depth > MAX_BASE_DEPTH {
            return None;
        }
        let value = resolve(value);
        let items = match &value {
            Value::Name(name) => return Self::from_name(name),
            Value::Array(items) => items,
            _ => return None,
        };
        let family = resolve(items.first()?);
        let family = family.as_name().ok()?;
        let family = INLINE_COLORSPACE_ABBREV.get(family).copied().unwrap_or(family);
        let base = |index: usize| {
            items
                .get(index)
                .and_then(|b| Self::from_value_bounded(b, resolve, depth + 1))
        };

        match family {
            "ICCBased" => {
                let profile = resolve(items.get(1)?);
                let dict = profile.as_dict().ok()?;
                let components = match dict.get("N").map(resolve) {
                    Some(Value::Int(n)) if (1..=32).contains(&n) => n as usize,
                    _ => match dict.get("Alternate") {
                        Some(alt) => Self::from_value_bounded(alt, resolve, depth + 1)?
                            .ncomponents(),
                        None => 3,
                    },
                };
                Some(Self::IccBased { components })
            }
            "Indexed" => {
                let hival = match items.get(2).map(resolve) {
                    Some(Value::Int(n)) => n.clamp(0, 255) as u32,
                    _ => 0,
                };
                Some(Self::Indexed {
                    base: Box::new(base(1)?),
                    hival,
                })
            }
            "Separation" => {
                let colorant = match items.get(1).map(resolve) {
                    Some(Value::Name(name)) => name,
                    _ => Name::new_static("All"),
                };
                Some(Self::Separation { colorant })
            }
            "DeviceN" => {
                let colorants = resolve(items.get(1)?).as_array().ok()?.len();
                (colorants > 0).then_some(Self::DeviceN { colorants })
            }
            "Pattern" => Some(Self::Pattern {
                base: base(1).map(Box::new),
            }),
            // [/CalRGB <<...>>] and the like carry only rendering parameters
            other => PREDEFINED_COLORSPACE.get(other).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::{Dictionary, Stream};

    fn no_refs(v: &Value) -> Value {
        v.clone()
    }

    #[test]
    fn test_predefined_components() {
        assert_eq!(ColorSpace::from_name("DeviceRGB").unwrap().ncomponents(), 3);
        assert_eq!(ColorSpace::from_name("CMYK").unwrap().ncomponents(), 4);
        assert_eq!(ColorSpace::from_name("G").unwrap(), ColorSpace::DeviceGray);
        assert!(ColorSpace::from_name("CS0").is_none());
    }

    #[test]
    fn test_icc_based_reads_n() {
        let mut dict = Dictionary::new();
        dict.insert("N".into(), Value::Int(4));
        let profile = Value::Stream(Box::new(Stream::new(dict, Vec::new())));
        let cs = ColorSpace::from_value(
            &Value::Array(vec![Value::name("ICCBased"), profile]),
            &no_refs,
        )
        .unwrap();
        assert_eq!(cs, ColorSpace::IccBased { components: 4 });
        assert_eq!(cs.color_from(&[0.0, 0.0, 0.0, 1.0]), Color::Cmyk(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_indexed_and_pattern() {
        let indexed = ColorSpace::from_value(
            &Value::Array(vec![
                Value::name("Indexed"),
                Value::name("DeviceRGB"),
                Value::Int(255),
                Value::String(vec![0; 768]),
            ]),
            &no_refs,
        )
        .unwrap();
        assert_eq!(indexed.ncomponents(), 1);
        assert_eq!(indexed.initial_color(), Color::Components(smallvec![0.0]));

        let pattern = ColorSpace::from_value(
            &Value::Array(vec![Value::name("Pattern"), Value::name("DeviceGray")]),
            &no_refs,
        )
        .unwrap();
        assert_eq!(pattern.ncomponents(), 1);
        assert_eq!(ColorSpace::from_name("Pattern").unwrap().ncomponents(), 0);
    }

    #[test]
    fn test_separation_and_devicen() {
        let sep = ColorSpace::from_value(
            &Value::Array(vec![
                Value::name("Separation"),
                Value::name("Spot"),
                Value::name("DeviceCMYK"),
                Value::Null,
            ]),
            &no_refs,
        )
        .unwrap();
        assert_eq!(sep.initial_color(), Color::Components(smallvec![1.0]));

        let devn = ColorSpace::from_value(
            &Value::Array(vec![
                Value::name("DeviceN"),
                Value::Array(vec![Value::name("Cyan"), Value::name("Spot")]),
                Value::name("DeviceCMYK"),
            ]),
            &no_refs,
        )
        .unwrap();
        assert_eq!(devn.ncomponents(), 2);
    }

    #[test]
    fn test_cmyk_initial_is_black() {
        assert_eq!(
            ColorSpace::DeviceCmyk.initial_color(),
            Color::Cmyk(0.0, 0.0, 0.0, 1.0)
        );
    }
}
