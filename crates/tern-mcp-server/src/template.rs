//! Static prompt template interpolation
//!
//! Supports `{name}` substitution and `{cond ? 'a' : 'b'}` conditionals.
//! Falsy condition values: absent, null, false, 0, and the empty string.
//! Placeholders naming no declared argument are left as written.

use std::collections::HashMap;

use serde_json::Value;

/// Render a template against the supplied arguments.
///
/// `declared` restricts which placeholder names interpolate; unknown names
/// render as-is so braces in prose survive.
pub fn render_template(
    template: &str,
    args: &HashMap<String, Value>,
    declared: &[String],
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let expr = &after_open[..close];
        match eval_expr(expr, args, declared) {
            Some(rendered) => out.push_str(&rendered),
            None => {
                out.push('{');
                out.push_str(expr);
                out.push('}');
            }
        }
        rest = &after_open[close + 1..];
    }
    out.push_str(rest);
    out
}

fn eval_expr(expr: &str, args: &HashMap<String, Value>, declared: &[String]) -> Option<String> {
    if let Some((cond, arms)) = expr.split_once('?') {
        let cond = cond.trim();
        let (then_arm, else_arm) = split_arms(arms)?;
        if !declared.iter().any(|d| d == cond) {
            return None;
        }
        let truthy = args.get(cond).map(is_truthy).unwrap_or(false);
        return Some(if truthy { then_arm } else { else_arm });
    }

    let name = expr.trim();
    if !declared.iter().any(|d| d == name) {
        return None;
    }
    Some(match args.get(name) {
        Some(value) => value_to_text(value),
        None => String::new(),
    })
}

/// Split `'a' : 'b'` into its arms, honoring single quotes around colons
fn split_arms(arms: &str) -> Option<(String, String)> {
    let mut in_quote = false;
    for (i, ch) in arms.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            ':' if !in_quote => {
                let then_arm = unquote(arms[..i].trim());
                let else_arm = unquote(arms[i + 1..].trim());
                return Some((then_arm, else_arm));
            }
            _ => {}
        }
    }
    None
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declared() -> Vec<String> {
        vec!["location".to_string(), "includeExtended".to_string()]
    }

    #[test]
    fn test_placeholder_substitution() {
        let args = HashMap::from([("location".to_string(), json!("Tokyo"))]);
        assert_eq!(
            render_template("Report for {location}.", &args, &declared()),
            "Report for Tokyo."
        );
    }

    #[test]
    fn test_conditional_arms() {
        let template = "Report for {location}. {includeExtended ? 'Extended.' : '3-day.'}";
        let args = HashMap::from([
            ("location".to_string(), json!("Tokyo")),
            ("includeExtended".to_string(), json!(true)),
        ]);
        assert_eq!(
            render_template(template, &args, &declared()),
            "Report for Tokyo. Extended."
        );

        let args = HashMap::from([("location".to_string(), json!("Tokyo"))]);
        assert_eq!(
            render_template(template, &args, &declared()),
            "Report for Tokyo. 3-day."
        );
    }

    #[test]
    fn test_falsy_values() {
        let template = "{includeExtended ? 'yes' : 'no'}";
        for falsy in [json!(false), json!(0), json!(""), json!(null)] {
            let args = HashMap::from([("includeExtended".to_string(), falsy)]);
            assert_eq!(render_template(template, &args, &declared()), "no");
        }
    }

    #[test]
    fn test_unknown_placeholder_left_as_written() {
        let args = HashMap::new();
        assert_eq!(
            render_template("set {notAnArg} here", &args, &declared()),
            "set {notAnArg} here"
        );
    }

    #[test]
    fn test_absent_optional_renders_empty() {
        let args = HashMap::new();
        assert_eq!(render_template("loc: {location}", &args, &declared()), "loc: ");
    }

    #[test]
    fn test_numbers_render_plain() {
        let declared = vec!["count".to_string()];
        let args = HashMap::from([("count".to_string(), json!(3))]);
        assert_eq!(render_template("{count} items", &args, &declared), "3 items");
    }

    #[test]
    fn test_deterministic_output() {
        let args = HashMap::from([
            ("location".to_string(), json!("Tokyo")),
            ("includeExtended".to_string(), json!(true)),
        ]);
        let template = "Report for {location}. {includeExtended ? 'Extended.' : '3-day.'}";
        let first = render_template(template, &args, &declared());
        let second = render_template(template, &args, &declared());
        assert_eq!(first, second);
    }
}
