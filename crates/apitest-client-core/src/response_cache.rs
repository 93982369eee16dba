//! Last execution result per test case, kept in the session store so the
//! console can redisplay a response without re-running the case.

use serde::{Deserialize, Serialize};

use crate::ClientCache;
use crate::storage::StorageError;

/// What a single test-case execution left behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResponse {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub status_code: u16,
}

impl ClientCache {
    /// The cached result for `id`, or `None` when the case has not been run
    /// this session. Entries are keyed by the raw case id; ids are
    /// UUID-like by contract, so no namespace prefix is applied.
    #[must_use]
    pub fn test_case_response(&self, id: &str) -> Option<TestCaseResponse> {
        Self::read_json(self.session(), id)
    }

    pub fn set_test_case_response(
        &self,
        id: &str,
        response: &TestCaseResponse,
    ) -> Result<(), StorageError> {
        Self::write_json(self.session(), id, response)
    }
}
