//! Wire types for the test-running server. Field names match the
//! grpc-gateway JSON shapes exactly; the odd PascalCase blocks are the
//! server's, not ours.

use serde::{Deserialize, Serialize};

use apitest_client_core::StoreDescriptor;

/// Seed for a new test suite. The target store travels as a header, not in
/// the body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestSuiteRequest {
    pub name: String,
    pub api: String,
    pub kind: String,
}

/// A suite to import from an external URL into a store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSource {
    #[serde(skip)]
    pub store: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSuiteRequest {
    pub source_suite_name: String,
    pub target_suite_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCaseRequest {
    pub source_suite_name: String,
    pub target_suite_name: String,
    pub source_case_name: String,
    pub target_case_name: String,
}

/// Seed for a new test case inside a suite.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestCaseRequest {
    pub suite_name: String,
    pub data: TestCaseSeed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseSeed {
    pub name: String,
    pub request: CaseRequestSeed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRequestSeed {
    pub api: String,
    pub method: String,
}

/// Run one case, with optional parameter overrides.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestCaseRequest {
    pub suite: String,
    pub testcase: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub parameters: serde_json::Value,
}

/// Run a whole suite; results stream back one JSON chunk per case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestSuiteRequest {
    pub suite_name: String,
}

/// The server's code-generation endpoints take PascalCase keys.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenerateCodeRequest {
    pub test_suite: String,
    pub test_case: String,
    pub generator: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConvertSuiteRequest {
    pub generator: String,
    pub test_suite: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MockConfigRequest {
    pub config: String,
}

/// A named secret the server substitutes into suites at run time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The store list the server reports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreListResponse {
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    pub data: Vec<StoreDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_code_request_uses_pascal_case_keys() {
        let request = GenerateCodeRequest {
            test_suite: "smoke".to_string(),
            test_case: "login".to_string(),
            generator: "golang".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({"TestSuite": "smoke", "TestCase": "login", "Generator": "golang"})
        );
    }

    #[test]
    fn run_test_case_request_omits_null_parameters() {
        let request = RunTestCaseRequest {
            suite: "smoke".to_string(),
            testcase: "login".to_string(),
            parameters: serde_json::Value::Null,
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({"suite": "smoke", "testcase": "login"})
        );
    }

    #[test]
    fn import_source_keeps_the_store_out_of_the_body() {
        let source = ImportSource {
            store: "git-main".to_string(),
            url: "https://example.com/suite.yaml".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&source).expect("serialize"),
            json!({"url": "https://example.com/suite.yaml"})
        );
    }

    #[test]
    fn store_list_response_tolerates_missing_fields() {
        let parsed: StoreListResponse = serde_json::from_value(json!({})).expect("deserialize");
        assert_eq!(parsed.current, "");
        assert!(parsed.data.is_empty());
    }
}
