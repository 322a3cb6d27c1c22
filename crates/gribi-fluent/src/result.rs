//! Results collected by the client, and a builder for expected results.

use gribi_common::{
    AftResult, ElectionId, EntryKey, OperationType, ProgrammingResult, SessionParamsResult,
};
use gribi_types::IpPrefix;
use serde::Serialize;
use std::fmt;

/// One response item seen on the `Modify` stream.
///
/// Session-level responses (parameters result, election id) and per-operation
/// acknowledgments share this type; fields that do not apply are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpResult {
    pub timestamp_ns: i64,
    pub operation_id: Option<u64>,
    pub op_type: Option<OperationType>,
    pub key: Option<EntryKey>,
    pub programming_result: Option<ProgrammingResult>,
    pub session_params: Option<SessionParamsResult>,
    pub current_election_id: Option<ElectionId>,
    pub details: Option<String>,
}

impl From<&AftResult> for OpResult {
    fn from(res: &AftResult) -> Self {
        Self {
            timestamp_ns: res.timestamp_ns,
            operation_id: Some(res.id),
            op_type: Some(res.op),
            key: Some(res.key),
            programming_result: Some(res.result),
            details: res.error.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = self.operation_id {
            parts.push(format!("id={}", id));
        }
        if let Some(op) = self.op_type {
            parts.push(format!("op={}", op));
        }
        if let Some(key) = self.key {
            parts.push(format!("entry={}", key));
        }
        if let Some(res) = self.programming_result {
            parts.push(format!("result={}", res));
        }
        if let Some(ref p) = self.session_params {
            parts.push(format!("params={:?}", p));
        }
        if let Some(e) = self.current_election_id {
            parts.push(format!("election_id={}", e));
        }
        if let Some(ref d) = self.details {
            parts.push(format!("details={}", d));
        }
        write!(f, "<{}>", parts.join(", "))
    }
}

/// Starts an expected-result description for [`chk::has_result`](crate::chk::has_result).
pub fn operation_result() -> OperationResultBuilder {
    OperationResultBuilder::default()
}

#[derive(Debug, Clone, Default)]
pub struct OperationResultBuilder {
    inner: OpResult,
}

impl OperationResultBuilder {
    pub fn with_operation_id(mut self, id: u64) -> Self {
        self.inner.operation_id = Some(id);
        self
    }

    pub fn with_operation_type(mut self, op: OperationType) -> Self {
        self.inner.op_type = Some(op);
        self
    }

    pub fn with_next_hop_operation(mut self, index: u64) -> Self {
        self.inner.key = Some(EntryKey::NextHop(index));
        self
    }

    pub fn with_next_hop_group_operation(mut self, id: u64) -> Self {
        self.inner.key = Some(EntryKey::NextHopGroup(id));
        self
    }

    pub fn with_ipv4_operation(mut self, prefix: IpPrefix) -> Self {
        self.inner.key = Some(EntryKey::Ipv4(prefix));
        self
    }

    pub fn with_programming_result(mut self, result: ProgrammingResult) -> Self {
        self.inner.programming_result = Some(result);
        self
    }

    pub fn with_session_params_ok(mut self) -> Self {
        self.inner.session_params = Some(SessionParamsResult::Ok);
        self
    }

    pub fn with_current_election_id(mut self, low: u64, high: u64) -> Self {
        self.inner.current_election_id = Some(ElectionId::new(low, high));
        self
    }

    pub fn as_result(self) -> OpResult {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_set_fields() {
        let want = operation_result()
            .with_operation_id(2)
            .with_operation_type(OperationType::Add)
            .with_ipv4_operation("203.0.113.0/24".parse().unwrap())
            .with_programming_result(ProgrammingResult::Failed)
            .as_result();
        assert_eq!(
            want.to_string(),
            "<id=2, op=ADD, entry=ipv4-entry 203.0.113.0/24, result=FAILED>"
        );
    }

    #[test]
    fn test_from_ack_copies_reason() {
        let ack = AftResult {
            id: 4,
            op: OperationType::Delete,
            key: EntryKey::NextHop(42),
            result: ProgrammingResult::Failed,
            timestamp_ns: 7,
            error: Some("next-hop 42 is still referenced by 1 entries".to_string()),
        };
        let res = OpResult::from(&ack);
        assert_eq!(res.operation_id, Some(4));
        assert_eq!(res.timestamp_ns, 7);
        assert!(res.details.unwrap().contains("still referenced"));
    }
}
