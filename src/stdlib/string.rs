//! The `string` library
//!
//! Positions are 1-based character indices; negative positions count from
//! the end. Pattern matching is not supported: `find` searches for plain
//! text and `match`/`gmatch` raise.

use crate::interpreter::value::format_general;
use crate::interpreter::{Interpreter, Table, Value};
use crate::stdlib::{arg, arg_error, check_integer, check_string, opt_integer, opt_string, Builtin};
use crate::utils::RuntimeError;

type Result = std::result::Result<Vec<Value>, RuntimeError>;

pub(super) const FUNCTIONS: &[(&str, Builtin)] = &[
    ("byte", byte),
    ("char", from_codes),
    ("find", find),
    ("format", format),
    ("gmatch", unsupported_pattern),
    ("len", len),
    ("lower", lower),
    ("match", unsupported_pattern),
    ("rep", rep),
    ("reverse", reverse),
    ("split", split),
    ("sub", sub),
    ("upper", upper),
];

/// Longest string `rep` will build, in bytes
const MAX_STRING_SIZE: u64 = 1 << 28;

/// Resolve a possibly negative 1-based position against `len`
fn relative(position: i64, len: usize) -> i64 {
    if position >= 0 {
        position
    } else if position.unsigned_abs() > len as u64 {
        0
    } else {
        len as i64 + position + 1
    }
}

/// Clamp `[i, j]` to the characters of the string, as a zero-based range
fn char_range(i: i64, j: i64, len: usize) -> Option<(usize, usize)> {
    let start = relative(i, len).max(1);
    let end = relative(j, len).min(len as i64);
    (start <= end).then(|| (start as usize - 1, end as usize))
}

fn byte(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "byte")?;
    let chars: Vec<char> = s.chars().collect();
    let i = opt_integer(interpreter, &args, 1, "byte", 1)?;
    let j = opt_integer(interpreter, &args, 2, "byte", i)?;
    Ok(match char_range(i, j, chars.len()) {
        Some((start, end)) => chars[start..end]
            .iter()
            .map(|c| Value::Number(*c as u32 as f64))
            .collect(),
        None => vec![],
    })
}

fn from_codes(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let mut text = String::with_capacity(args.len());
    for index in 0..args.len() {
        let code = check_integer(interpreter, &args, index, "char")?;
        let c = u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| arg_error(interpreter, index, "char", "value out of range"))?;
        text.push(c);
    }
    Ok(vec![Value::string(text)])
}

fn find(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "find")?;
    let needle = check_string(interpreter, &args, 1, "find")?;
    let chars: Vec<char> = s.chars().collect();
    let init = relative(opt_integer(interpreter, &args, 2, "find", 1)?, chars.len()).max(1) as usize;
    if init > chars.len() + 1 {
        return Ok(vec![Value::Nil]);
    }

    let haystack: String = chars[init - 1..].iter().collect();
    Ok(match haystack.find(&*needle) {
        Some(byte_offset) => {
            let start = init + haystack[..byte_offset].chars().count();
            let end = start + needle.chars().count() - 1;
            vec![Value::Number(start as f64), Value::Number(end as f64)]
        }
        None => vec![Value::Nil],
    })
}

fn len(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "len")?;
    Ok(vec![Value::Number(s.chars().count() as f64)])
}

fn lower(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "lower")?;
    Ok(vec![Value::string(s.to_lowercase())])
}

fn upper(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "upper")?;
    Ok(vec![Value::string(s.to_uppercase())])
}

fn rep(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "rep")?;
    let n = check_integer(interpreter, &args, 1, "rep")?;
    let separator = opt_string(interpreter, &args, 2, "rep", "")?;
    if n <= 0 || (s.is_empty() && separator.is_empty()) {
        return Ok(vec![Value::string("")]);
    }
    let total = (s.len() as u64 + separator.len() as u64).saturating_mul(n as u64);
    if total > MAX_STRING_SIZE {
        return Err(interpreter.error("resulting string too large"));
    }
    let mut text = String::with_capacity(total as usize);
    for i in 0..n {
        if i > 0 {
            text.push_str(&separator);
        }
        text.push_str(&s);
    }
    Ok(vec![Value::string(text)])
}

fn reverse(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "reverse")?;
    Ok(vec![Value::string(s.chars().rev().collect::<String>())])
}

fn sub(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "sub")?;
    let chars: Vec<char> = s.chars().collect();
    let i = opt_integer(interpreter, &args, 1, "sub", 1)?;
    let j = opt_integer(interpreter, &args, 2, "sub", -1)?;
    let text: String = match char_range(i, j, chars.len()) {
        Some((start, end)) => chars[start..end].iter().collect(),
        None => String::new(),
    };
    Ok(vec![Value::string(text)])
}

/// `split(s [, sep])`: plain-text split into an array; an empty separator
/// splits into characters.
fn split(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let s = check_string(interpreter, &args, 0, "split")?;
    let separator = opt_string(interpreter, &args, 1, "split", " ")?;
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        s.split(&*separator).map(Value::string).collect()
    };
    Ok(vec![Value::table(Table::from_values(parts))])
}

fn unsupported_pattern(interpreter: &mut Interpreter, _args: Vec<Value>) -> Result {
    Err(interpreter.error("Lua patterns are not implemented"))
}

// ==================== format ====================

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
}

fn format(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let template = check_string(interpreter, &args, 0, "format")?;
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_arg = 1;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }
        spec.width = read_count(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(read_count(&mut chars));
        }

        let Some(conversion) = chars.next() else {
            return Err(interpreter.error("invalid conversion '%' to 'format'"));
        };
        let index = next_arg;
        next_arg += 1;
        if index >= args.len() && conversion != '%' {
            return Err(arg_error(interpreter, index, "format", "no value"));
        }

        let piece = match conversion {
            'd' | 'i' => {
                let n = check_integer(interpreter, &args, index, "format")?;
                let mut digits = n.unsigned_abs().to_string();
                if let Some(precision) = spec.precision {
                    digits = format!("{:0>width$}", digits, width = precision);
                }
                pad_number(&spec, n < 0, digits)
            }
            'x' | 'X' => {
                let n = check_integer(interpreter, &args, index, "format")?;
                let mut digits = if conversion == 'x' {
                    format!("{:x}", n)
                } else {
                    format!("{:X}", n)
                };
                if spec.alternate && n != 0 {
                    digits.insert_str(0, if conversion == 'x' { "0x" } else { "0X" });
                }
                pad_number(&spec, false, digits)
            }
            'c' => {
                let code = check_integer(interpreter, &args, index, "format")?;
                let c = u32::try_from(code).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
                pad_text(&spec, c.to_string())
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let n = float_arg(interpreter, &args, index)?;
                let digits = format_float(&spec, conversion, n.abs());
                pad_number(&spec, n.is_sign_negative() && !n.is_nan(), digits)
            }
            's' => {
                let mut text = interpreter.tostring(&arg(&args, index))?;
                if let Some(precision) = spec.precision {
                    text = text.chars().take(precision).collect();
                }
                pad_text(&spec, text)
            }
            'q' => quote(&check_string(interpreter, &args, index, "format")?),
            other => {
                return Err(interpreter.error(format!("invalid conversion '%{}' to 'format'", other)))
            }
        };
        out.push_str(&piece);
    }

    Ok(vec![Value::string(out)])
}

fn read_count(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> usize {
    let mut count = 0usize;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        count = count.saturating_mul(10).saturating_add(digit as usize);
        chars.next();
    }
    count.min(99)
}

fn float_arg(interpreter: &Interpreter, args: &[Value], index: usize) -> std::result::Result<f64, RuntimeError> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(arg_error(
            interpreter,
            index,
            "format",
            format!("number expected, got {}", other.type_name()),
        )),
        None => Err(arg_error(interpreter, index, "format", "number expected, got no value")),
    }
}

/// Digits of a non-negative float for `%f`, `%e` and `%g`
fn format_float(spec: &Spec, conversion: char, n: f64) -> String {
    if n.is_infinite() {
        return if conversion.is_uppercase() { "INF" } else { "inf" }.to_string();
    }
    if n.is_nan() {
        return if conversion.is_uppercase() { "NAN" } else { "nan" }.to_string();
    }
    let precision = spec.precision.unwrap_or(6);
    let text = match conversion.to_ascii_lowercase() {
        'f' => format!("{:.*}", precision, n),
        'e' => exponent_form(n, precision),
        _ => format_general(n, precision.max(1)),
    };
    if conversion.is_uppercase() {
        text.to_uppercase()
    } else {
        text
    }
}

/// `1.500000e+02` rather than Rust's `1.5e2`
fn exponent_form(n: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, n);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => text,
    }
}

fn pad_number(spec: &Spec, negative: bool, digits: String) -> String {
    let sign = if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    let length = sign.len() + digits.chars().count();
    if length >= spec.width {
        return format!("{}{}", sign, digits);
    }
    let fill = spec.width - length;
    if spec.left {
        format!("{}{}{}", sign, digits, " ".repeat(fill))
    } else if spec.zero {
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}{}", " ".repeat(fill), sign, digits)
    }
}

fn pad_text(spec: &Spec, text: String) -> String {
    let length = text.chars().count();
    if length >= spec.width {
        return text;
    }
    let fill = " ".repeat(spec.width - length);
    if spec.left {
        text + &fill
    } else {
        fill + &text
    }
}

/// A double-quoted literal that reads back as the same string
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Vec<String> {
        let mut interpreter = Interpreter::new();
        interpreter
            .run(source)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    fn eval_err(source: &str) -> String {
        let mut interpreter = Interpreter::new();
        interpreter.run(source).unwrap_err().to_string()
    }

    #[test]
    fn test_sub() {
        assert_eq!(
            eval("local s = 'hello' return s:sub(2, 4), s:sub(-3), s:sub(0), s:sub(4, 2), s:sub(2, 100)"),
            vec!["ell", "llo", "hello", "", "ello"]
        );
    }

    #[test]
    fn test_huge_positions_are_clamped() {
        assert_eq!(
            eval("local s = 'abc' return s:sub(-1e19), s:sub(1e19), s:sub(1, 1e19), s:sub(-1e19, -1e19)"),
            vec!["abc", "", "abc", ""]
        );
        assert_eq!(eval("return string.byte('abc', -1e19, 1e19)"), vec!["97", "98", "99"]);
        assert_eq!(eval("return string.find('abc', 'c', -1e19), string.find('abc', 'a', 1e19)"), vec!["3", "nil"]);
    }

    #[test]
    fn test_byte_and_char() {
        assert_eq!(eval("return string.byte('A'), string.byte('abc', -1)"), vec!["65", "99"]);
        assert_eq!(eval("return string.char(72, 105)"), vec!["Hi"]);
        assert_eq!(
            eval_err("string.char(-1)"),
            "bad argument #1 to 'char' (value out of range)"
        );
    }

    #[test]
    fn test_find_is_plain() {
        assert_eq!(eval("return string.find('a.b.c', '.b')"), vec!["2", "3"]);
        assert_eq!(eval("return string.find('abcabc', 'c', 4)"), vec!["6", "6"]);
        assert_eq!(eval("return string.find('abc', 'z')"), vec!["nil"]);
    }

    #[test]
    fn test_case_rep_reverse_len() {
        assert_eq!(
            eval("return ('MiXeD'):lower(), ('up'):upper(), ('ab'):rep(3, '-'), ('abc'):reverse(), ('abc'):len()"),
            vec!["mixed", "UP", "ab-ab-ab", "cba", "3"]
        );
        assert_eq!(eval("return ('x'):rep(0)"), vec![""]);
    }

    #[test]
    fn test_split() {
        assert_eq!(
            eval("local parts = ('a,b,,c'):split(',') return #parts, parts[1], parts[3], parts[4]"),
            vec!["4", "a", "", "c"]
        );
        assert_eq!(eval("return #('xyz'):split('')"), vec!["3"]);
    }

    #[test]
    fn test_rep_limits() {
        assert_eq!(eval("return #string.rep('', 1e18), string.rep('', 3, '')"), vec!["0", ""]);
        assert_eq!(eval("return string.rep('ab', 3, ','), string.rep('x', -5)"), vec!["ab,ab,ab", ""]);
        assert_eq!(eval("return string.rep('', 3, '-')"), vec!["--"]);
        assert_eq!(eval_err("string.rep('x', 1e18)"), "resulting string too large");
        assert_eq!(eval_err("string.rep('', 1e18, '-')"), "resulting string too large");
    }

    #[test]
    fn test_patterns_raise() {
        assert_eq!(eval_err("string.match('abc', 'a')"), "Lua patterns are not implemented");
        assert_eq!(eval_err("('abc'):gmatch('.')"), "Lua patterns are not implemented");
    }

    #[test]
    fn test_format() {
        assert_eq!(
            eval(r#"return string.format("%d|%5d|%-5d|%05d|%+d", 42, 42, 42, -42, 7)"#),
            vec!["42|   42|42   |-0042|+7"]
        );
        assert_eq!(
            eval(r#"return string.format("%.2f|%8.3f|%e|%g|%g", 3.14159, 2.5, 1500, 0.0001, 100000000)"#),
            vec!["3.14|   2.500|1.500000e+03|0.0001|1e+08"]
        );
        assert_eq!(
            eval(r#"return string.format("%x|%X|%#x|%c|%s|%.2s|%q|%%", 255, 255, 255, 65, nil, "abc", 'a"b')"#),
            vec![r#"ff|FF|0xff|A|nil|ab|"a\"b"|%"#]
        );
    }

    #[test]
    fn test_format_errors() {
        assert_eq!(
            eval_err("string.format('%d', 1.5)"),
            "bad argument #2 to 'format' (number has no integer representation)"
        );
        assert_eq!(
            eval_err("string.format('%d')"),
            "bad argument #2 to 'format' (no value)"
        );
        assert_eq!(eval_err("string.format('%y', 1)"), "invalid conversion '%y' to 'format'");
    }

    #[test]
    fn test_relative_positions() {
        assert_eq!(relative(-1, 5), 5);
        assert_eq!(relative(-10, 5), 0);
        assert_eq!(char_range(2, -2, 5), Some((1, 4)));
        assert_eq!(char_range(4, 2, 5), None);
    }
}
