// Tier 2: Oracle Response Validation
//
// Concept: Single boundary where untrusted oracle JSON becomes typed data
// Synchronization: serde_json::Value in, AiJudgment / ParsedChoice out
//
// Every field is checked. Nothing past this module ever sees raw oracle JSON.

use crate::resolution::types::{
    AiJudgment, AiMatchType, ChoiceJudgment, OracleError, OutOfRangeSelection,
};
use serde_json::{Map, Value};

/// Choice reply whose index has not yet been range-checked
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedChoice {
    pub index: i64,
    pub confidence: f64,
    pub reasoning: String,
}

impl ParsedChoice {
    /// Range-check the index against the number of options offered
    pub fn into_judgment(self, len: usize) -> Result<ChoiceJudgment, OutOfRangeSelection> {
        match usize::try_from(self.index) {
            Ok(index) if index < len => Ok(ChoiceJudgment {
                selected_index: index,
                confidence: self.confidence,
                reasoning: self.reasoning,
            }),
            _ => Err(OutOfRangeSelection {
                index: self.index,
                len,
            }),
        }
    }
}

/// Validate a `judge_match` reply
pub fn parse_judgment(body: &Value) -> Result<AiJudgment, OracleError> {
    let object = as_object(body)?;

    let confidence = confidence_field(object)?;

    let token = object
        .get("match_type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("match_type must be a string"))?;
    let match_type = AiMatchType::parse(token)
        .ok_or_else(|| malformed(format!("unknown match_type '{}'", token)))?;

    let reasoning = reasoning_field(object)?;

    let suggested_canonical_name = match object.get("suggested_canonical_name") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) if name.trim().is_empty() => None,
        Some(Value::String(name)) => Some(name.trim().to_string()),
        Some(_) => return Err(malformed("suggested_canonical_name must be a string")),
    };

    Ok(AiJudgment {
        confidence,
        match_type,
        reasoning,
        suggested_canonical_name,
        fallback: false,
    })
}

/// Validate a `choose_candidate` reply (index range is checked by the caller)
pub fn parse_choice(body: &Value) -> Result<ParsedChoice, OracleError> {
    let object = as_object(body)?;

    let index = object
        .get("selected_index")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("selected_index must be an integer"))?;

    Ok(ParsedChoice {
        index,
        confidence: confidence_field(object)?,
        reasoning: reasoning_field(object)?,
    })
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, OracleError> {
    body.as_object()
        .ok_or_else(|| malformed("response body is not a JSON object"))
}

fn confidence_field(object: &Map<String, Value>) -> Result<f64, OracleError> {
    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed("confidence must be a number"))?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(malformed(format!(
            "confidence {} outside [0.0, 1.0]",
            confidence
        )));
    }
    Ok(confidence)
}

fn reasoning_field(object: &Map<String, Value>) -> Result<String, OracleError> {
    object
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed("reasoning must be a string"))
}

fn malformed(message: impl Into<String>) -> OracleError {
    OracleError::Malformed(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_judgment() {
        let judgment = parse_judgment(&json!({
            "confidence": 0.92,
            "match_type": "Abbreviation",
            "reasoning": "J&J is the common short form",
            "suggested_canonical_name": "Johnson & Johnson"
        }))
        .unwrap();

        assert_eq!(judgment.confidence, 0.92);
        assert_eq!(judgment.match_type, AiMatchType::Abbreviation);
        assert_eq!(
            judgment.suggested_canonical_name.as_deref(),
            Some("Johnson & Johnson")
        );
        assert!(!judgment.fallback);
    }

    #[test]
    fn test_integer_confidence_accepted() {
        let judgment = parse_judgment(&json!({
            "confidence": 1,
            "match_type": "exact",
            "reasoning": ""
        }))
        .unwrap();
        assert_eq!(judgment.confidence, 1.0);
        assert_eq!(judgment.suggested_canonical_name, None);
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        for confidence in [json!(1.2), json!(-0.1), json!("0.9"), Value::Null] {
            let result = parse_judgment(&json!({
                "confidence": confidence,
                "match_type": "exact",
                "reasoning": "x"
            }));
            assert!(matches!(result, Err(OracleError::Malformed(_))));
        }
    }

    #[test]
    fn test_rejects_unknown_match_type_and_missing_reasoning() {
        let result = parse_judgment(&json!({
            "confidence": 0.5,
            "match_type": "probably",
            "reasoning": "x"
        }));
        assert!(matches!(result, Err(OracleError::Malformed(_))));

        let result = parse_judgment(&json!({"confidence": 0.5, "match_type": "exact"}));
        assert!(matches!(result, Err(OracleError::Malformed(_))));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(parse_judgment(&json!(["exact"])).is_err());
        assert!(parse_choice(&json!("1")).is_err());
    }

    #[test]
    fn test_choice_index_range_checked() {
        let parsed = parse_choice(&json!({
            "selected_index": 1,
            "confidence": 0.8,
            "reasoning": "regional subsidiary"
        }))
        .unwrap();
        assert_eq!(parsed.clone().into_judgment(2).unwrap().selected_index, 1);

        let err = parsed.into_judgment(1).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.len, 1);

        let negative = parse_choice(&json!({
            "selected_index": -1,
            "confidence": 0.8,
            "reasoning": ""
        }))
        .unwrap();
        assert!(negative.into_judgment(3).is_err());
    }

    #[test]
    fn test_choice_index_must_be_integer() {
        let result = parse_choice(&json!({
            "selected_index": 0.5,
            "confidence": 0.8,
            "reasoning": ""
        }));
        assert!(matches!(result, Err(OracleError::Malformed(_))));
    }
}
