use fex::Value;

/// Locale controlled characters of the number syntax.
#[derive(Clone, Debug)]
pub struct NumFormat {
    pub dec_sep: char,
    pub thousands_sep: Option<char>,
}

impl Default for NumFormat {
    fn default() -> NumFormat {
        NumFormat {
            dec_sep: '.',
            thousands_sep: None,
        }
    }
}

/// A value recognizer callback.
///
/// Receives the remaining input and the active number format; returns the
/// number of bytes consumed and the recognized value, or `None` when the
/// input does not start with a literal this recognizer understands.
pub type ValIdent = fn(&str, &NumFormat) -> Option<(usize, Value)>;

/// Recognizes unsigned hexadecimal integer literals with a `0x` prefix.
pub fn is_hex_val(input: &str, _fmt: &NumFormat) -> Option<(usize, Value)> {
    let rest = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X"))?;

    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_hexdigit()).len();
    if digits == 0 {
        return None;
    }

    u32::from_str_radix(&rest[..digits], 16)
        .ok()
        .map(|v| (2 + digits, v as Value))
}

/// Recognizes decimal float literals using the locale's decimal and
/// thousands separators. Signs are not consumed; they are handled by the
/// infix and binary operator rules.
pub fn is_dec_val(input: &str, fmt: &NumFormat) -> Option<(usize, Value)> {
    let mut cleaned = String::new();
    let mut chars = input.char_indices().peekable();
    let mut consumed = 0;
    let mut int_digits = false;
    let mut frac_digits = false;

    // integer part, with optional thousands separators between digits
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() {
            cleaned.push(c);
            int_digits = true;
            chars.next();
            consumed = i + c.len_utf8();
        } else if Some(c) == fmt.thousands_sep && int_digits {
            let mut ahead = chars.clone();
            ahead.next();
            match ahead.peek() {
                Some(&(_, d)) if d.is_ascii_digit() => {
                    chars.next();
                }
                _ => break,
            }
        } else {
            break;
        }
    }

    // fraction part
    if let Some(&(i, c)) = chars.peek() {
        if c == fmt.dec_sep {
            let mut ahead = chars.clone();
            ahead.next();
            let digit_follows = match ahead.peek() {
                Some(&(_, d)) => d.is_ascii_digit(),
                None => false,
            };
            if digit_follows || int_digits {
                cleaned.push('.');
                chars.next();
                consumed = i + c.len_utf8();
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        cleaned.push(d);
                        frac_digits = true;
                        chars.next();
                        consumed = j + d.len_utf8();
                    } else {
                        break;
                    }
                }
            }
        }
    }

    if !int_digits && !frac_digits {
        return None;
    }

    // exponent
    if let Some(&(i, c)) = chars.peek() {
        if c == 'e' || c == 'E' {
            let mut ahead = chars.clone();
            ahead.next();
            let mut exp = String::new();
            let mut exp_end = i + 1;
            if let Some(&(_, s)) = ahead.peek() {
                if s == '+' || s == '-' {
                    exp.push(s);
                    exp_end += 1;
                    ahead.next();
                }
            }
            let mut exp_digits = false;
            while let Some(&(j, d)) = ahead.peek() {
                if d.is_ascii_digit() {
                    exp.push(d);
                    exp_digits = true;
                    exp_end = j + 1;
                    ahead.next();
                } else {
                    break;
                }
            }
            if exp_digits {
                cleaned.push('e');
                cleaned.push_str(&exp);
                consumed = exp_end;
            }
        }
    }

    cleaned.parse::<Value>().ok().map(|v| (consumed, v))
}
