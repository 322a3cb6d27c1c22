//! Matching of collected results against expectations.

use thiserror::Error;

use crate::result::OpResult;

/// No collected result matched the expectation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("did not find result {} in {} results: [{}]", .want, .got.len(), .got.join(", "))]
pub struct ChkError {
    pub want: String,
    pub got: Vec<String>,
}

/// Returns true when every field set in `want` equals the same field of
/// `got`. Timestamps and details are never compared.
pub fn matches(got: &OpResult, want: &OpResult) -> bool {
    fn field<T: PartialEq>(got: &Option<T>, want: &Option<T>) -> bool {
        want.as_ref().map_or(true, |w| got.as_ref() == Some(w))
    }

    field(&got.operation_id, &want.operation_id)
        && field(&got.op_type, &want.op_type)
        && field(&got.key, &want.key)
        && field(&got.programming_result, &want.programming_result)
        && field(&got.session_params, &want.session_params)
        && field(&got.current_election_id, &want.current_election_id)
}

/// Checks that some result in `results` matches `want`.
pub fn has_result(results: &[OpResult], want: &OpResult) -> Result<(), ChkError> {
    if results.iter().any(|r| matches(r, want)) {
        return Ok(());
    }
    Err(ChkError {
        want: want.to_string(),
        got: results.iter().map(ToString::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::operation_result;
    use gribi_common::{AftResult, EntryKey, OperationType, ProgrammingResult};

    fn results() -> Vec<OpResult> {
        vec![
            OpResult::from(&AftResult::installed(
                1,
                OperationType::Add,
                EntryKey::NextHop(42),
                ProgrammingResult::InstalledInFib,
            )),
            OpResult::from(&AftResult::installed(
                2,
                OperationType::Add,
                EntryKey::NextHopGroup(10),
                ProgrammingResult::InstalledInFib,
            )),
        ]
    }

    #[test]
    fn test_has_result_ignores_unset_fields() {
        let want = operation_result()
            .with_operation_id(2)
            .with_next_hop_group_operation(10)
            .with_programming_result(ProgrammingResult::InstalledInFib)
            .as_result();
        assert!(has_result(&results(), &want).is_ok());
    }

    #[test]
    fn test_has_result_reports_mismatch() {
        let want = operation_result()
            .with_operation_id(2)
            .with_programming_result(ProgrammingResult::InstalledInRib)
            .as_result();
        let err = has_result(&results(), &want).unwrap_err();
        assert_eq!(err.got.len(), 2);
        assert!(err.to_string().contains("result=RIB_PROGRAMMED"));
    }

    #[test]
    fn test_key_must_match() {
        let want = operation_result()
            .with_operation_id(1)
            .with_next_hop_group_operation(42)
            .as_result();
        assert!(has_result(&results(), &want).is_err());
    }
}
