//! Format templates: parsing printf-style specifiers and rendering the
//! extracted parameters.
//!
//! Templates use `%u` for unsigned output and `%d`/`%x`/`%o`/`%b` for
//! signed-or-radix output. The parser records per specifier whether the
//! value is to be read unsigned (`%u`) and renders it decimally; all
//! other numeric conversions present the two's-complement signed value,
//! so a negative parameter prints as `-6f` under `%x`.
//!
//! Zero padding follows the firmware tooling's formatter: the pad width
//! accounts for a leading sign but not for the `#` alternate-form prefix
//! (`0x`, `0X`, `0b`, `0`), which is prepended outside the padded digits.

/// One parsed format specifier: `% [flags] [width] [.precision] conv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    sharp: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conv: Conv,
    /// The specifier was written `%u`; the value is unsigned.
    unsigned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conv {
    Dec,
    Hex,
    HexUpper,
    Oct,
    Bin,
    Char,
    Str,
}

impl Default for Conv {
    fn default() -> Self {
        Conv::Dec
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Spec(Spec),
}

/// A rendered parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Val {
    Int(i64),
    Uint(u64),
    Str(String),
}

/// A parsed format template, ready to render against a parameter tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    tokens: Vec<Token>,
}

impl Template {
    /// Parses `template`, treating `%%` as a literal percent sign and
    /// keeping malformed specifiers verbatim.
    pub fn parse(template: &str) -> Template {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut it = template.chars().peekable();

        'outer: while let Some(c) = it.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if it.peek() == Some(&'%') {
                it.next();
                literal.push('%');
                continue;
            }

            // Scan one specifier, keeping the raw text so a malformed
            // one can be replayed as literal output.
            let mut raw = String::from("%");
            let mut spec = Spec::default();
            while let Some(&f) = it.peek() {
                match f {
                    '-' => spec.minus = true,
                    '+' => spec.plus = true,
                    ' ' => spec.space = true,
                    '#' => spec.sharp = true,
                    '0' => spec.zero = true,
                    _ => break,
                }
                raw.push(f);
                it.next();
            }
            let mut digits = String::new();
            while let Some(&d) = it.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                digits.push(d);
                raw.push(d);
                it.next();
            }
            if !digits.is_empty() {
                spec.width = digits.parse().ok();
            }
            if it.peek() == Some(&'.') {
                raw.push('.');
                it.next();
                let mut digits = String::new();
                while let Some(&d) = it.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    raw.push(d);
                    it.next();
                }
                spec.precision = Some(digits.parse().unwrap_or(0));
            }
            // C length modifiers carry no information for the decoder.
            while let Some(&l) = it.peek() {
                if !matches!(l, 'h' | 'l' | 'j' | 'z' | 't' | 'q' | 'L') {
                    break;
                }
                raw.push(l);
                it.next();
            }

            match it.next() {
                Some(conv) => {
                    spec.conv = match conv {
                        'd' => Conv::Dec,
                        'u' => {
                            spec.unsigned = true;
                            Conv::Dec
                        }
                        'x' => Conv::Hex,
                        'X' => Conv::HexUpper,
                        'o' => Conv::Oct,
                        'b' => Conv::Bin,
                        'c' => Conv::Char,
                        's' => Conv::Str,
                        other => {
                            raw.push(other);
                            literal.push_str(&raw);
                            continue 'outer;
                        }
                    };
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::Spec(spec));
                }
                None => {
                    literal.push_str(&raw);
                    break;
                }
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Template { tokens }
    }

    /// Number of format specifiers (`%%` excluded).
    pub fn specifier_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, Token::Spec(_)))
            .count()
    }

    /// Per-specifier unsigned flags, in template order.
    pub fn unsigned_flags(&self) -> Vec<bool> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Spec(s) => Some(s.unsigned),
                Token::Literal(_) => None,
            })
            .collect()
    }

    /// Renders the template with `args` substituted in specifier order.
    pub fn render(&self, args: &[Val]) -> String {
        let mut out = String::new();
        let mut args = args.iter();
        for token in &self.tokens {
            match token {
                Token::Literal(l) => out.push_str(l),
                Token::Spec(spec) => match args.next() {
                    Some(val) => out.push_str(&format_val(spec, val)),
                    None => out.push_str("%!(MISSING)"),
                },
            }
        }
        out
    }
}

fn format_val(spec: &Spec, val: &Val) -> String {
    match (spec.conv, val) {
        (Conv::Str, Val::Str(s)) => {
            let s = match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.clone(),
            };
            pad(s, spec)
        }
        (Conv::Char, val) => {
            let code = match val {
                Val::Int(i) => *i as u32,
                Val::Uint(u) => *u as u32,
                Val::Str(_) => return pad(String::from('\u{FFFD}'), spec),
            };
            pad(
                std::char::from_u32(code).unwrap_or('\u{FFFD}').to_string(),
                spec,
            )
        }
        (_, Val::Int(i)) => format_integer(spec, *i < 0, i.unsigned_abs()),
        (_, Val::Uint(u)) => format_integer(spec, false, *u),
        // A string meeting a numeric specifier: print it anyway rather
        // than losing payload.
        (_, Val::Str(s)) => pad(s.clone(), spec),
    }
}

fn format_integer(spec: &Spec, negative: bool, magnitude: u64) -> String {
    let digits = match spec.conv {
        Conv::Hex => format!("{:x}", magnitude),
        Conv::HexUpper => format!("{:X}", magnitude),
        Conv::Oct => format!("{:o}", magnitude),
        Conv::Bin => format!("{:b}", magnitude),
        // Dec, and a number meeting a string specifier.
        _ => format!("{}", magnitude),
    };

    // The zero flag turns the field width into a digit count, minus one
    // column when a sign is printed. An explicit precision wins.
    let mut precision = spec.precision;
    if precision.is_none() && spec.zero && !spec.minus {
        if let Some(w) = spec.width {
            let sign_room = (negative || spec.plus || spec.space) as usize;
            precision = Some(w.saturating_sub(sign_room));
        }
    }
    let digits = match precision {
        Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    };

    let prefix = if spec.sharp {
        match spec.conv {
            Conv::Hex => "0x",
            Conv::HexUpper => "0X",
            Conv::Bin => "0b",
            Conv::Oct => "0",
            _ => "",
        }
    } else {
        ""
    };
    let sign = if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };

    pad(format!("{}{}{}", sign, prefix, digits), spec)
}

fn pad(s: String, spec: &Spec) -> String {
    let len = s.chars().count();
    match spec.width {
        Some(w) if len < w => {
            let fill = " ".repeat(w - len);
            if spec.minus {
                s + &fill
            } else {
                fill + &s
            }
        }
        _ => s,
    }
}
