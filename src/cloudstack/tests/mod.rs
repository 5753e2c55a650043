//! Unit tests for the CloudStack driver internals.


use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use crate::config::MemoryConfig;
use crate::provider::ApiParams;

use super::response::{ListVolumesResponse, Volume, VolumeKind};
use super::{AsyncJobRecord, CloudStackError, CloudStackIaas, JobStatus};

fn driver_with(pairs: &[(&str, &str)]) -> CloudStackIaas {
    let config = MemoryConfig::from_pairs(pairs.iter().copied());
    CloudStackIaas::new(Arc::new(config))
}

fn params_with(names: &[&str]) -> ApiParams {
    names
        .iter()
        .map(|name| ((*name).to_owned(), String::from("val")))
        .collect()
}

#[test]
fn job_status_mapping_follows_wire_encoding() {
    assert_eq!(JobStatus::from_wire(0), JobStatus::InProgress);
    assert_eq!(JobStatus::from_wire(1), JobStatus::Succeeded);
    assert_eq!(JobStatus::from_wire(2), JobStatus::Failed);
    // Unknown codes are terminal; the poller must not spin on them.
    assert_eq!(JobStatus::from_wire(3), JobStatus::Succeeded);
    assert_eq!(JobStatus::from_wire(-1), JobStatus::Succeeded);
}

#[test]
fn job_result_text_keeps_plain_strings_verbatim() {
    let record = AsyncJobRecord {
        jobstatus: 2,
        jobresult: serde_json::Value::String(String::from("my weird error")),
        ..AsyncJobRecord::default()
    };
    assert_eq!(record.result_text(), "my weird error");
}

#[test]
fn job_result_text_renders_structured_payloads() {
    let record = AsyncJobRecord {
        jobstatus: 2,
        jobresult: serde_json::json!({"errorcode": 431, "errortext": "boom"}),
        ..AsyncJobRecord::default()
    };
    let text = record.result_text();
    assert!(text.contains("431"), "unexpected rendering: {text}");
    assert!(text.contains("boom"), "unexpected rendering: {text}");
}

#[rstest]
#[case::empty(&[], "networkids")]
#[case::only_name(&["name"], "networkids")]
#[case::missing_network(&["serviceofferingid", "templateid", "zoneid"], "networkids")]
#[case::missing_offering(&["networkids", "templateid", "zoneid"], "serviceofferingid")]
#[case::missing_template(&["networkids", "serviceofferingid", "zoneid"], "templateid")]
#[case::missing_zone(&["networkids", "serviceofferingid", "templateid"], "zoneid")]
#[tokio::test]
async fn create_machine_reports_first_missing_mandatory_param(
    #[case] present: &[&str],
    #[case] expected: &str,
) {
    // No configuration on purpose: validation must run before any config
    // read or I/O.
    let driver = driver_with(&[]);
    let result = driver.create_machine(&params_with(present)).await;
    match &result {
        Err(CloudStackError::MissingParam { name }) => assert_eq!(name, expected),
        other => panic!("expected missing-param error, got {other:?}"),
    }
    assert_eq!(
        result.err().map(|err| err.to_string()),
        Some(format!("param \"{expected}\" is mandatory"))
    );
}

#[test]
fn with_name_copies_and_leaves_the_original_untouched() {
    let driver = driver_with(&[("iaas:cloudstack:url", "http://base")]);
    let clone = driver.with_name("cs-east");
    assert_eq!(driver.iaas_name(), "cloudstack");
    assert_eq!(clone.iaas_name(), "cs-east");
}

#[test]
fn clone_name_config_overrides_then_falls_back_to_base() {
    let driver = driver_with(&[
        ("iaas:cloudstack:url", "http://base"),
        ("iaas:cloudstack:api-key", "base-key"),
        ("iaas:cs-east:api-key", "east-key"),
    ]);
    let clone = driver.with_name("cs-east");
    assert_eq!(
        clone.config_string("api-key").ok(),
        Some(String::from("east-key"))
    );
    assert_eq!(
        clone.config_string("url").ok(),
        Some(String::from("http://base"))
    );
    assert!(clone.config_string("secret-key").is_err());
}

#[rstest]
#[case::unset(None, 300)]
// An explicit 0 is a zero budget, not the default.
#[case::zero(Some("0"), 0)]
#[case::garbage(Some("soon"), 300)]
#[case::configured(Some("120"), 120)]
#[case::padded(Some(" 1 "), 1)]
fn wait_timeout_parsing(#[case] raw: Option<&str>, #[case] expected: u64) {
    let driver = match raw {
        Some(value) => driver_with(&[("iaas:cloudstack:wait-timeout", value)]),
        None => driver_with(&[]),
    };
    assert_eq!(driver.wait_timeout_secs(), expected);
}

#[test]
fn volume_kind_decodes_known_and_unknown_roles() {
    let body = r#"{"listvolumesresponse": {"volume": [
        {"id": "v1", "type": "ROOT"},
        {"id": "v2", "type": "DATADISK"},
        {"id": "v3", "type": "SNAPSHOT"}
    ]}}"#;
    let decoded: ListVolumesResponse =
        serde_json::from_str(body).unwrap_or_else(|err| panic!("decode: {err}"));
    let kinds: Vec<VolumeKind> = decoded
        .list
        .volume
        .iter()
        .map(|volume: &Volume| volume.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![VolumeKind::Root, VolumeKind::DataDisk, VolumeKind::Other]
    );
}

#[test]
fn error_messages_match_operator_log_patterns() {
    let status = CloudStackError::UnexpectedStatus {
        command: String::from("deployVirtualMachine"),
        code: 531,
        body: String::from("my error"),
    };
    assert_eq!(
        status.to_string(),
        "Unexpected response code for deployVirtualMachine 531: my error"
    );

    let body = CloudStackError::UnexpectedBody {
        command: String::from("listZones"),
        message: String::from("expected value"),
        body: String::from("<html>"),
    };
    assert_eq!(
        body.to_string(),
        "Unexpected result data for listZones: expected value - Body: <html>"
    );

    let failed = CloudStackError::JobFailed {
        job_id: String::from("job1"),
        result: String::from("my weird error"),
    };
    assert_eq!(failed.to_string(), "Job failed to complete: my weird error");

    let timeout = CloudStackError::JobTimeout {
        job_id: String::from("test"),
        waited: Duration::from_secs(1),
    };
    assert_eq!(
        timeout.to_string(),
        "cloudstack: time out after 1s waiting for job \"test\""
    );

    let zones = CloudStackError::NotEnoughZones {
        iaas: String::from("cs-east"),
        count: 0,
    };
    assert_eq!(
        zones.to_string(),
        "\"cs-east\" - not enough zones available, want at least 1, got 0"
    );
}
