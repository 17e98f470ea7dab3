use serde_json::Value;

use crate::catalog::Category;
use crate::model::UnitModel;
use crate::{Error, Result};

/// String form of a wire value, so `3`, `3.0` and `"3"` all compare equal.
pub fn wire_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) => Some(f.to_string()),
            _ => Some(n.to_string()),
        },
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

pub fn wire_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Map a wire code back to its token. Unknown codes come back as
/// `unknown (<code>)`, never as an error.
pub fn decode(model: &UnitModel, category: Category, wire: &Value) -> String {
    let Some(code) = wire_string(wire) else {
        return format!("unknown ({wire})");
    };
    model
        .category(category)
        .and_then(|c| c.entries.iter().find(|(_, v)| codes_match(v, &code)))
        .map(|(token, _)| token.to_string())
        .unwrap_or_else(|| format!("unknown ({code})"))
}

pub fn encode(model: &UnitModel, category: Category, token: &str) -> Result<&'static str> {
    model
        .category(category)
        .and_then(|c| c.code(token))
        .ok_or_else(|| Error::Unsupported {
            category,
            value: token.to_string(),
        })
}

pub(crate) fn codes_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use serde_json::json;

    fn model() -> UnitModel {
        UnitModel::resolve(&Capabilities {
            fanstage: Some(5),
            hasautofan: Some(1),
            hasautomode: Some(1),
            hasdrymode: Some(1),
            hasairdir: Some(1),
            hasswing: Some(1),
            hasairauto: Some(1),
            hasairdirh: Some(2),
            ..Default::default()
        })
    }

    #[test]
    fn decode_tolerates_number_and_string() {
        let m = model();
        assert_eq!(decode(&m, Category::Mode, &json!(3)), "cool");
        assert_eq!(decode(&m, Category::Mode, &json!("3")), "cool");
        assert_eq!(decode(&m, Category::Mode, &json!(3.0)), "cool");
        assert_eq!(decode(&m, Category::Power, &json!(true)), "on");
    }

    #[test]
    fn unknown_code_yields_sentinel() {
        let m = model();
        assert_eq!(decode(&m, Category::Mode, &json!(42)), "unknown (42)");
        assert_eq!(decode(&m, Category::Fan, &json!("x")), "unknown (x)");
        assert_eq!(decode(&m, Category::Mode, &Value::Null), "unknown (null)");
    }

    #[test]
    fn decode_in_missing_category_is_unknown() {
        let bare = UnitModel::resolve(&Capabilities::default());
        assert_eq!(decode(&bare, Category::Fan, &json!(0)), "unknown (0)");
    }

    #[test]
    fn every_token_round_trips() {
        let m = model();
        for category in Category::ALL {
            for token in m.tokens(category) {
                let code = encode(&m, category, token).unwrap();
                assert_eq!(decode(&m, category, &json!(code)), token, "{category}");
            }
        }
    }

    #[test]
    fn encode_rejects_unsupported_token() {
        let bare = UnitModel::resolve(&Capabilities::default());
        let err = encode(&bare, Category::Mode, "auto").unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported { category: Category::Mode, ref value } if value == "auto"
        ));
    }

    #[test]
    fn wire_f64_parses_strings() {
        assert_eq!(wire_f64(&json!("21.5")), Some(21.5));
        assert_eq!(wire_f64(&json!(22)), Some(22.0));
        assert_eq!(wire_f64(&json!("n/a")), None);
    }
}
