//! Numeric/math builtins: `num`, `real`, `int*`, `mat*`.

use crate::value::Value;

fn arg_f(args: &[Value], i: usize) -> f64 {
    args.get(i).map(Value::as_double).unwrap_or(0.0)
}

fn arg_i(args: &[Value], i: usize) -> i64 {
    args.get(i).map(Value::as_int).unwrap_or(0)
}

pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    Some(match name {
        "num" => Value::Integer(arg_i(args, 0)),
        "real" => Value::Double(arg_f(args, 0)),
        "intabs" | "abs" => Value::Integer(arg_i(args, 0).abs()),
        "intmax" => Value::Integer(arg_i(args, 0).max(arg_i(args, 1))),
        "intmin" => Value::Integer(arg_i(args, 0).min(arg_i(args, 1))),
        "intdiv" => {
            let b = arg_i(args, 1);
            Value::Integer(if b == 0 { 0 } else { arg_i(args, 0) / b })
        }
        "intmod" => {
            let b = arg_i(args, 1);
            Value::Integer(if b == 0 { 0 } else { arg_i(args, 0) % b })
        }
        "intmedia" => {
            if args.is_empty() {
                Value::Integer(0)
            } else {
                let sum: i64 = args.iter().map(Value::as_int).sum();
                Value::Integer(sum / args.len() as i64)
            }
        }
        "intsoma" => Value::Integer(args.iter().map(Value::as_int).sum()),
        "matsin" => Value::Double(arg_f(args, 0).sin()),
        "matcos" => Value::Double(arg_f(args, 0).cos()),
        "mattan" => Value::Double(arg_f(args, 0).tan()),
        "matasin" => Value::Double(arg_f(args, 0).asin()),
        "matacos" => Value::Double(arg_f(args, 0).acos()),
        "matatan" => Value::Double(arg_f(args, 0).atan()),
        "matatan2" => Value::Double(arg_f(args, 0).atan2(arg_f(args, 1))),
        "matsqrt" => Value::Double(arg_f(args, 0).sqrt()),
        "matpow" => Value::Double(arg_f(args, 0).powf(arg_f(args, 1))),
        "matlog" => Value::Double(arg_f(args, 0).ln()),
        "matlog10" => Value::Double(arg_f(args, 0).log10()),
        "matexp" => Value::Double(arg_f(args, 0).exp()),
        "matfloor" => Value::Double(arg_f(args, 0).floor()),
        "matceil" => Value::Double(arg_f(args, 0).ceil()),
        "matround" => Value::Double(arg_f(args, 0).round()),
        "matrad" => Value::Double(arg_f(args, 0).to_radians()),
        "matdeg" => Value::Double(arg_f(args, 0).to_degrees()),
        "matpi" => Value::Double(std::f64::consts::PI),
        "mate" => Value::Double(std::f64::consts::E),
        "matrand" | "rand" => Value::Double(fastrand::f64()),
        "matrandint" | "randint" => {
            let lo = arg_i(args, 0);
            let hi = arg_i(args, 1);
            if hi <= lo {
                Value::Integer(lo)
            } else {
                Value::Integer(fastrand::i64(lo..=hi))
            }
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intdiv_by_zero_yields_zero() {
        let result = call("intdiv", &[Value::Integer(10), Value::Integer(0)]).unwrap();
        assert_eq!(result.as_int(), 0);
    }

    #[test]
    fn intmedia_averages_truncating() {
        let result = call(
            "intmedia",
            &[Value::Integer(1), Value::Integer(2), Value::Integer(4)],
        )
        .unwrap();
        assert_eq!(result.as_int(), 2);
    }

    #[test]
    fn matrandint_stays_in_inclusive_bounds() {
        let result = call("matrandint", &[Value::Integer(3), Value::Integer(3)]).unwrap();
        assert_eq!(result.as_int(), 3);
    }

    #[test]
    fn matpi_matches_std_constant() {
        let result = call("matpi", &[]).unwrap();
        assert!((result.as_double() - std::f64::consts::PI).abs() < 1e-12);
    }
}
