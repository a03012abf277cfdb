//! Text builtins: `txt*` family.

use crate::value::Value;

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn arg_str(args: &[Value], i: usize) -> String {
    arg(args, i).as_string()
}

fn arg_int(args: &[Value], i: usize) -> i64 {
    arg(args, i).as_int()
}

pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    Some(match name {
        "txt" => Value::string(arg_str(args, 0)),
        "txt1" => Value::string(arg_str(args, 0).chars().take(1).collect::<String>()),
        "txt2" => Value::string(arg_str(args, 0).chars().take(2).collect::<String>()),
        "txtlen" | "len" | "length" => Value::Integer(arg_str(args, 0).chars().count() as i64),
        "txtsub" | "substr" => {
            let s = arg_str(args, 0);
            let start = arg_int(args, 1).max(0) as usize;
            let len = args.get(2).map(|v| v.as_int()).unwrap_or(i64::MAX);
            let chars: Vec<char> = s.chars().collect();
            let end = if len < 0 {
                chars.len()
            } else {
                (start.saturating_add(len as usize)).min(chars.len())
            };
            if start >= chars.len() {
                Value::string("")
            } else {
                Value::string(chars[start..end].iter().collect::<String>())
            }
        }
        "txtmai" | "upper" => Value::string(arg_str(args, 0).to_uppercase()),
        "txtmin" | "lower" => Value::string(arg_str(args, 0).to_lowercase()),
        "txttrim" => Value::string(arg_str(args, 0).trim().to_string()),
        "ltrim" => Value::string(arg_str(args, 0).trim_start().to_string()),
        "rtrim" => Value::string(arg_str(args, 0).trim_end().to_string()),
        "txtpos" | "indexof" => {
            let haystack = arg_str(args, 0);
            let needle = arg_str(args, 1);
            match haystack.find(&needle) {
                Some(byte_idx) => Value::Integer(haystack[..byte_idx].chars().count() as i64),
                None => Value::Integer(-1),
            }
        }
        "txtreplace" => Value::string(arg_str(args, 0).replace(&arg_str(args, 1), &arg_str(args, 2))),
        "txtproc" => Value::Boolean(arg_str(args, 0).contains(&arg_str(args, 1))),
        "txtsplit" => {
            let s = arg_str(args, 0);
            let sep = arg_str(args, 1);
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::string(c.to_string())).collect()
            } else {
                s.split(&sep as &str).map(Value::string).collect()
            };
            Value::array(parts)
        }
        "txtjoin" => {
            let sep = arg_str(args, 1);
            match arg(args, 0) {
                Value::Array(a) => Value::string(
                    a.borrow()
                        .iter()
                        .map(Value::as_string)
                        .collect::<Vec<_>>()
                        .join(&sep),
                ),
                other => Value::string(other.as_string()),
            }
        }
        "txtrepeat" => {
            let s = arg_str(args, 0);
            let n = arg_int(args, 1).max(0) as usize;
            Value::string(s.repeat(n))
        }
        "txtreverse" => Value::string(arg_str(args, 0).chars().rev().collect::<String>()),
        "txtpadleft" => pad(args, true),
        "txtpadright" => pad(args, false),
        "txtchar" | "chr" => {
            let n = arg_int(args, 0);
            Value::string(char::from_u32(n as u32).map(String::from).unwrap_or_default())
        }
        "txtord" | "asc" => Value::Integer(arg_str(args, 0).chars().next().map(|c| c as i64).unwrap_or(0)),
        "txthex" => Value::string(format!("{:x}", arg_int(args, 0))),
        "txtdec" => Value::Integer(i64::from_str_radix(arg_str(args, 0).trim_start_matches("0x"), 16).unwrap_or(0)),
        "txtcod" | "txtchr" => Value::string(
            arg_str(args, 0)
                .bytes()
                .map(|b| format!("{:02x}", b))
                .collect::<String>(),
        ),
        "txtbit" => Value::string(format!("{:b}", arg_int(args, 0))),
        "txtbith" => Value::string(format!("{:08b}", arg_int(args, 0) & 0xff)),
        "txtmaiini" => capitalize_first(&arg_str(args, 0)),
        "txtmaimin" => Value::string(title_case(&arg_str(args, 0))),
        "txtconv" => Value::string(arg_str(args, 0)),
        "txtremove" => Value::string(arg_str(args, 0).replace(&arg_str(args, 1), "")),
        "txtnulo" => Value::Boolean(arg_str(args, 0).is_empty()),
        _ => return None,
    })
}

fn pad(args: &[Value], left: bool) -> Value {
    let s = arg_str(args, 0);
    let width = arg_int(args, 1).max(0) as usize;
    let fill = args.get(2).map(Value::as_string).filter(|s| !s.is_empty()).unwrap_or_else(|| " ".to_string());
    let fill_char = fill.chars().next().unwrap_or(' ');
    let current = s.chars().count();
    if current >= width {
        return Value::string(s);
    }
    let padding: String = std::iter::repeat(fill_char).take(width - current).collect();
    Value::string(if left { format!("{padding}{s}") } else { format!("{s}{padding}") })
}

fn capitalize_first(s: &str) -> Value {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => Value::string(format!("{}{}", first.to_uppercase(), chars.as_str())),
        None => Value::string(""),
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str().to_lowercase()),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txtlen_counts_chars_not_bytes() {
        let result = call("txtlen", &[Value::string("abc")]).unwrap();
        assert_eq!(result.as_int(), 3);
    }

    #[test]
    fn txtsub_extracts_by_char_offset() {
        let result = call("txtsub", &[Value::string("abcdef"), Value::Integer(2), Value::Integer(3)]).unwrap();
        assert_eq!(result.as_string(), "cde");
    }

    #[test]
    fn txtpos_returns_negative_one_when_not_found() {
        let result = call("txtpos", &[Value::string("abc"), Value::string("z")]).unwrap();
        assert_eq!(result.as_int(), -1);
    }

    #[test]
    fn txtsplit_and_txtjoin_round_trip() {
        let split = call("txtsplit", &[Value::string("a,b,c"), Value::string(",")]).unwrap();
        let joined = call("txtjoin", &[split, Value::string("-")]).unwrap();
        assert_eq!(joined.as_string(), "a-b-c");
    }

    #[test]
    fn unknown_name_returns_none() {
        assert!(call("naoexiste", &[]).is_none());
    }
}
