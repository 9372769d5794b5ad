//! Condition evaluation shared by `condition` nodes and connection guards.
//!
//! Comparisons follow loose scripting-language rules so definitions built in
//! the designer behave the same here:
//! - `equals` / `not_equals`: strict equality; a missing field never equals a literal
//! - `contains`: both sides stringified, then substring match
//! - `greater_than` / `less_than`: both sides coerced to numbers, NaN compares false
//! - `is_empty` / `is_not_empty`: missing, null and `""` are empty
//! - unknown operators are false

use serde::Serialize;
use serde_json::{Map, Value};

use lobbyflow_core::workflow::{Condition, ConditionLogic, ConditionOperator};

/// Per-condition result, recorded in the condition node's output.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionResult {
    pub field: String,
    pub operator: ConditionOperator,
    pub passed: bool,
}

/// Combined result of a condition node.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionOutcome {
    pub passed: bool,
    pub results: Vec<ConditionResult>,
}

/// Evaluate one condition against a field map.
pub fn evaluate(condition: &Condition, scope: &Map<String, Value>) -> bool {
    let actual = scope.get(&condition.field);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Equals => strict_equals(actual, expected),
        ConditionOperator::NotEquals => !strict_equals(actual, expected),
        ConditionOperator::Contains => {
            to_js_string(actual).contains(&to_js_string(Some(expected)))
        }
        ConditionOperator::GreaterThan => to_number(actual) > to_number(Some(expected)),
        ConditionOperator::LessThan => to_number(actual) < to_number(Some(expected)),
        ConditionOperator::IsEmpty => is_empty(actual),
        ConditionOperator::IsNotEmpty => !is_empty(actual),
        ConditionOperator::Unknown => false,
    }
}

/// Evaluate every condition and combine with `logic`.
///
/// An empty list passes under `and` and fails under `or`.
pub fn evaluate_all(
    conditions: &[Condition],
    logic: ConditionLogic,
    scope: &Map<String, Value>,
) -> ConditionOutcome {
    let results: Vec<ConditionResult> = conditions
        .iter()
        .map(|c| ConditionResult {
            field: c.field.clone(),
            operator: c.operator,
            passed: evaluate(c, scope),
        })
        .collect();

    let passed = match logic {
        ConditionLogic::And => results.iter().all(|r| r.passed),
        ConditionLogic::Or => results.iter().any(|r| r.passed),
    };

    ConditionOutcome { passed, results }
}

pub(crate) fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn strict_equals(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::String(a), Value::String(b)) => a == b,
        // Arrays and objects compare by identity, and a literal is never the same object.
        _ => false,
    }
}

fn to_js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => {
            if n.is_f64() {
                format_float(n.as_f64().unwrap_or(f64::NAN))
            } else {
                n.to_string()
            }
        }
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => to_js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let s = if f > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{}", f as i128)
    } else {
        format!("{}", f)
    }
}

fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => parse_number(&to_js_string(Some(single))),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match t.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&t[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }

    // Rust accepts spellings like "inf" and "nan" that are not numbers here.
    if t.chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')))
    {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("scope must be an object"),
        }
    }

    fn check(field: &str, op: ConditionOperator, value: Value, ctx: &Map<String, Value>) -> bool {
        evaluate(&Condition::new(field, op, value), ctx)
    }

    #[test]
    fn test_equals_is_strict() {
        let ctx = scope(json!({"count": 5, "name": "Alice", "flag": true, "ratio": 1.0}));
        assert!(check("name", ConditionOperator::Equals, json!("Alice"), &ctx));
        assert!(check("count", ConditionOperator::Equals, json!(5), &ctx));
        assert!(check("ratio", ConditionOperator::Equals, json!(1), &ctx));
        assert!(!check("count", ConditionOperator::Equals, json!("5"), &ctx));
        assert!(!check("flag", ConditionOperator::Equals, json!("true"), &ctx));
        assert!(!check("missing", ConditionOperator::Equals, json!(null), &ctx));
    }

    #[test]
    fn test_not_equals() {
        let ctx = scope(json!({"status": "vip"}));
        assert!(check("status", ConditionOperator::NotEquals, json!("regular"), &ctx));
        assert!(!check("status", ConditionOperator::NotEquals, json!("vip"), &ctx));
        assert!(check("missing", ConditionOperator::NotEquals, json!("vip"), &ctx));
    }

    #[test]
    fn test_contains_stringifies() {
        let ctx = scope(json!({"company": "Acme Corp", "badge": 12345, "tags": ["a", "b"]}));
        assert!(check("company", ConditionOperator::Contains, json!("Acme"), &ctx));
        assert!(!check("company", ConditionOperator::Contains, json!("acme"), &ctx));
        assert!(check("badge", ConditionOperator::Contains, json!(234), &ctx));
        assert!(check("tags", ConditionOperator::Contains, json!("a,b"), &ctx));
        assert!(check("missing", ConditionOperator::Contains, json!("undef"), &ctx));
    }

    #[test]
    fn test_numeric_coercion() {
        let ctx = scope(json!({"age": "42", "visits": 3, "blank": "", "word": "many"}));
        assert!(check("age", ConditionOperator::GreaterThan, json!(40), &ctx));
        assert!(check("age", ConditionOperator::LessThan, json!("100"), &ctx));
        assert!(check("visits", ConditionOperator::GreaterThan, json!("2.5"), &ctx));
        assert!(check("blank", ConditionOperator::LessThan, json!(1), &ctx));
        assert!(!check("word", ConditionOperator::GreaterThan, json!(0), &ctx));
        assert!(!check("word", ConditionOperator::LessThan, json!(0), &ctx));
        assert!(!check("missing", ConditionOperator::GreaterThan, json!(-1), &ctx));
    }

    #[test]
    fn test_emptiness() {
        let ctx = scope(json!({"empty": "", "nothing": null, "zero": 0, "name": "x"}));
        for field in ["empty", "nothing", "missing"] {
            assert!(check(field, ConditionOperator::IsEmpty, Value::Null, &ctx), "{field}");
            assert!(!check(field, ConditionOperator::IsNotEmpty, Value::Null, &ctx));
        }
        assert!(check("zero", ConditionOperator::IsNotEmpty, Value::Null, &ctx));
        assert!(check("name", ConditionOperator::IsNotEmpty, Value::Null, &ctx));
    }

    #[test]
    fn test_unknown_operator_is_false() {
        let ctx = scope(json!({"a": 1}));
        assert!(!check("a", ConditionOperator::Unknown, json!(1), &ctx));
    }

    #[test]
    fn test_evaluation_has_no_hidden_state() {
        let ctx = scope(json!({"host": "Bob"}));
        let cond = Condition::new("host", ConditionOperator::Contains, json!("Bo"));
        let first = evaluate(&cond, &ctx);
        let second = evaluate(&cond, &ctx);
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn test_evaluate_all_logic() {
        let ctx = scope(json!({"type": "vip", "floor": 3}));
        let conds = vec![
            Condition::new("type", ConditionOperator::Equals, json!("vip")),
            Condition::new("floor", ConditionOperator::GreaterThan, json!(5)),
        ];

        let and = evaluate_all(&conds, ConditionLogic::And, &ctx);
        assert!(!and.passed);
        assert_eq!(and.results.len(), 2);
        assert!(and.results[0].passed);
        assert!(!and.results[1].passed);

        let or = evaluate_all(&conds, ConditionLogic::Or, &ctx);
        assert!(or.passed);
    }

    #[test]
    fn test_evaluate_all_empty() {
        let ctx = Map::new();
        assert!(evaluate_all(&[], ConditionLogic::And, &ctx).passed);
        assert!(!evaluate_all(&[], ConditionLogic::Or, &ctx).passed);
    }

    #[test]
    fn test_parse_number_edge_cases() {
        assert_eq!(parse_number(" 12 "), 12.0);
        assert_eq!(parse_number("0x1A"), 26.0);
        assert_eq!(parse_number("1e3"), 1000.0);
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("nan").is_nan());
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn test_js_string_numbers() {
        assert_eq!(to_js_string(Some(&json!(2.0))), "2");
        assert_eq!(to_js_string(Some(&json!(2.5))), "2.5");
        assert_eq!(to_js_string(Some(&json!(-7))), "-7");
        assert_eq!(to_js_string(Some(&json!({"a": 1}))), "[object Object]");
    }
}
