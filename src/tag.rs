//! The closed set of trice type tags and their parameter-space rules.
//!
//! The identifier list names the parameter schema with a string tag; the
//! dispatcher parses it once into [`TypeTag`] so every schema decision is
//! an exhaustive `match` instead of a string-keyed table walk.

/// Individual parameter width of a numeric trice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitWidth {
    B8,
    B16,
    B32,
    B64,
}

impl BitWidth {
    /// Width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            BitWidth::B8 => 1,
            BitWidth::B16 => 2,
            BitWidth::B32 => 4,
            BitWidth::B64 => 8,
        }
    }
}

/// How a framing pads the parameter region on the wire. The two
/// encodings use distinct rules and are kept distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// COBS packets: parameter space is a multiple of 4, minimum 4.
    Word,
    /// ESC frames: parameter space is the next power of two.
    Pow2,
}

/// Parsed type tag of an identifier entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// `TRICE_S`: one dynamic string parameter.
    Str,
    /// `TRICE0` / `TRICE`: format template only, no parameters.
    Zero,
    /// `TRICE{8,16,32,64}_{1..12}`: `count` parameters of `width` each.
    Numeric { width: BitWidth, count: u8 },
}

impl TypeTag {
    /// Parses a type tag string, applying the dispatch normalizations:
    /// lowercase `trice…` is uppercased, bare `TRICE` means `TRICE0`,
    /// and a bare width tag (`TRICE16`) takes its arity from the
    /// template's format-specifier count. Returns `None` for tags
    /// outside the closed set.
    pub fn parse(tag: &str, specifier_count: usize) -> Option<TypeTag> {
        let tag = tag.to_ascii_uppercase();
        match tag.as_str() {
            "TRICE_S" => return Some(TypeTag::Str),
            "TRICE" | "TRICE0" => return Some(TypeTag::Zero),
            _ => {}
        }

        let rest = tag.strip_prefix("TRICE")?;
        let (width, rest) = if let Some(r) = rest.strip_prefix("8") {
            (BitWidth::B8, r)
        } else if let Some(r) = rest.strip_prefix("16") {
            (BitWidth::B16, r)
        } else if let Some(r) = rest.strip_prefix("32") {
            (BitWidth::B32, r)
        } else if let Some(r) = rest.strip_prefix("64") {
            (BitWidth::B64, r)
        } else {
            return None;
        };

        let count = match rest.strip_prefix('_') {
            // Bare width tag: the template determines the arity.
            None if rest.is_empty() => specifier_count,
            Some(k) => k.parse::<usize>().ok()?,
            None => return None,
        };
        match count {
            0 => Some(TypeTag::Zero),
            1..=12 => Some(TypeTag::Numeric {
                width,
                count: count as u8,
            }),
            _ => None,
        }
    }

    /// The parameter space this tag occupies on the wire under the given
    /// padding rule. `None` for [`TypeTag::Str`], whose space depends on
    /// the payload itself.
    pub fn param_space(self, padding: Padding) -> Option<usize> {
        match self {
            TypeTag::Str => None,
            TypeTag::Zero => Some(0),
            TypeTag::Numeric { width, count } => {
                let raw = width.bytes() * count as usize;
                Some(match padding {
                    Padding::Word => (raw + 3) & !3,
                    Padding::Pow2 => raw.next_power_of_two(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_closed_set() {
        assert_eq!(TypeTag::parse("TRICE_S", 1), Some(TypeTag::Str));
        assert_eq!(TypeTag::parse("TRICE0", 0), Some(TypeTag::Zero));
        assert_eq!(TypeTag::parse("TRICE", 0), Some(TypeTag::Zero));
        assert_eq!(TypeTag::parse("TRICE32_0", 0), Some(TypeTag::Zero));
        assert_eq!(
            TypeTag::parse("TRICE8_12", 12),
            Some(TypeTag::Numeric {
                width: BitWidth::B8,
                count: 12
            })
        );
        assert_eq!(TypeTag::parse("TRICE16_13", 13), None);
        assert_eq!(TypeTag::parse("TRICE7_1", 1), None);
        assert_eq!(TypeTag::parse("BARE_1", 1), None);
    }

    #[test]
    fn lowercase_tags_normalize() {
        assert_eq!(
            TypeTag::parse("trice64_2", 2),
            Some(TypeTag::Numeric {
                width: BitWidth::B64,
                count: 2
            })
        );
        assert_eq!(TypeTag::parse("trice0", 0), Some(TypeTag::Zero));
    }

    #[test]
    fn bare_width_takes_arity_from_template() {
        assert_eq!(
            TypeTag::parse("TRICE16", 3),
            Some(TypeTag::Numeric {
                width: BitWidth::B16,
                count: 3
            })
        );
        assert_eq!(TypeTag::parse("TRICE16", 0), Some(TypeTag::Zero));
    }

    #[test]
    fn word_padding_matches_the_packet_table() {
        // (width, count, space) rows of the packed encoding.
        let rows: &[(BitWidth, u8, usize)] = &[
            (BitWidth::B8, 1, 4),
            (BitWidth::B8, 4, 4),
            (BitWidth::B8, 5, 8),
            (BitWidth::B8, 8, 8),
            (BitWidth::B8, 9, 12),
            (BitWidth::B8, 12, 12),
            (BitWidth::B16, 2, 4),
            (BitWidth::B16, 3, 8),
            (BitWidth::B16, 12, 24),
            (BitWidth::B32, 1, 4),
            (BitWidth::B32, 12, 48),
            (BitWidth::B64, 1, 8),
            (BitWidth::B64, 12, 96),
        ];
        for &(width, count, space) in rows {
            assert_eq!(
                TypeTag::Numeric { width, count }.param_space(Padding::Word),
                Some(space),
                "{:?}_{}",
                width,
                count
            );
        }
    }

    #[test]
    fn pow2_padding_matches_the_length_classes() {
        let rows: &[(BitWidth, u8, usize)] = &[
            (BitWidth::B8, 1, 1),
            (BitWidth::B8, 2, 2),
            (BitWidth::B8, 3, 4),
            (BitWidth::B8, 5, 8),
            (BitWidth::B16, 3, 8),
            (BitWidth::B32, 3, 16),
            (BitWidth::B64, 2, 16),
        ];
        for &(width, count, space) in rows {
            assert_eq!(
                TypeTag::Numeric { width, count }.param_space(Padding::Pow2),
                Some(space)
            );
        }
        assert_eq!(TypeTag::Zero.param_space(Padding::Pow2), Some(0));
        assert_eq!(TypeTag::Str.param_space(Padding::Pow2), None);
    }
}
