//! Time builtins, backed by `chrono`'s local-clock reading.

use crate::value::Value;
use chrono::{Datelike, Local, Timelike};

pub fn call(name: &str, _args: &[Value]) -> Option<Value> {
    let now = Local::now();
    Some(match name {
        "tempo" => Value::Integer(now.timestamp()),
        "tempoms" => Value::Integer(now.timestamp_millis()),
        "data" => Value::string(now.format("%Y-%m-%d").to_string()),
        "hora" => Value::Integer(now.hour() as i64),
        "minuto" => Value::Integer(now.minute() as i64),
        "segundo" => Value::Integer(now.second() as i64),
        "dia" => Value::Integer(now.day() as i64),
        "mes" => Value::Integer(now.month() as i64),
        "ano" => Value::Integer(now.year() as i64),
        "diasemana" => Value::Integer(now.weekday().num_days_from_sunday() as i64),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hora_is_within_a_valid_range() {
        let result = call("hora", &[]).unwrap();
        assert!((0..24).contains(&result.as_int()));
    }

    #[test]
    fn unknown_name_returns_none() {
        assert!(call("naoexiste", &[]).is_none());
    }
}
