//! Function-call diffing for a single turn.

use serde::{Deserialize, Serialize};
use simeval_core::{ExpectedFunction, FunctionCall};
use std::collections::HashSet;

/// Set diff between the functions a step expected and the functions the
/// agent actually invoked. Names are compared lower-cased; call arguments
/// are not diffed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionCallReport {
    pub expected_functions: Vec<String>,
    pub actual_functions: Vec<String>,
    pub missing_functions: Vec<String>,
    pub incorrect_functions: Vec<String>,
    pub all_correct: bool,
}

/// Diff actual calls against expectations.
pub fn evaluate_function_calls(
    actual: &[FunctionCall],
    expected: &[ExpectedFunction],
) -> FunctionCallReport {
    let expected_names: Vec<String> =
        expected.iter().map(|f| f.function_name.to_lowercase()).collect();
    let actual_names: Vec<String> =
        actual.iter().map(|f| f.function_name.to_lowercase()).collect();

    let expected_set: HashSet<&String> = expected_names.iter().collect();
    let actual_set: HashSet<&String> = actual_names.iter().collect();

    let missing: Vec<String> =
        expected_names.iter().filter(|n| !actual_set.contains(n)).cloned().collect();
    let incorrect: Vec<String> =
        actual_names.iter().filter(|n| !expected_set.contains(n)).cloned().collect();

    let all_correct = missing.is_empty() && incorrect.is_empty();
    FunctionCallReport {
        expected_functions: expected_names,
        actual_functions: actual_names,
        missing_functions: missing,
        incorrect_functions: incorrect,
        all_correct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_case_insensitive() {
        let actual = vec![FunctionCall::new("Get_Billing_Statements")];
        let expected = vec![ExpectedFunction::new("get_billing_statements")];

        let report = evaluate_function_calls(&actual, &expected);
        assert!(report.all_correct);
        assert!(report.missing_functions.is_empty());
        assert!(report.incorrect_functions.is_empty());
    }

    #[test]
    fn test_missing_and_incorrect() {
        let actual = vec![FunctionCall::new("send_email")];
        let expected = vec![
            ExpectedFunction::new("get_billing_statements"),
            ExpectedFunction::new("send_email"),
        ];

        let report = evaluate_function_calls(&actual, &expected);
        assert!(!report.all_correct);
        assert_eq!(report.missing_functions, vec!["get_billing_statements"]);
        assert!(report.incorrect_functions.is_empty());

        let report = evaluate_function_calls(&actual, &[]);
        assert!(!report.all_correct);
        assert_eq!(report.incorrect_functions, vec!["send_email"]);
    }

    #[test]
    fn test_empty_both_sides_is_correct() {
        let report = evaluate_function_calls(&[], &[]);
        assert!(report.all_correct);
    }
}
