mod support;

use std::sync::Arc;

use tabhyper_core::runner::{RunOutcome, EXIT_SCRIPT_NOT_REGISTERED};
use tabhyper_core::scripts::{DispatchOutcome, ScriptArgs, ScriptName, ScriptRegistry};

use support::{
    session_addr, test_config, RecordingEngine, RecordingScript, RecordingSession, SessionLog,
};

#[test]
fn standard_registry_wires_only_create_extract() {
    let registry = ScriptRegistry::standard(Arc::new(RecordingEngine::default()));

    assert!(registry.contains(ScriptName::HyperApiCreateExtract));
    assert!(!registry.contains(ScriptName::HyperApiCreateHyper));
    assert!(!registry.contains(ScriptName::HyperApiPublishHyper));
    assert_eq!(
        registry.registered().collect::<Vec<_>>(),
        vec![ScriptName::HyperApiCreateExtract]
    );
}

#[tokio::test]
async fn unregistered_selector_reports_and_returns_code_two() {
    let registry = ScriptRegistry::standard(Arc::new(RecordingEngine::default()));
    let session = RecordingSession::new(SessionLog::default());
    let config = test_config();

    for selector in ScriptName::ALL
        .into_iter()
        .filter(|name| !registry.contains(*name))
    {
        let mut diagnostics: Vec<u8> = Vec::new();
        let outcome = registry
            .dispatch_to(selector, &session, &config, &ScriptArgs::default(), &mut diagnostics)
            .await
            .expect("unregistered selector is not an error");

        assert_eq!(outcome, DispatchOutcome::NotRegistered(selector));
        assert_eq!(RunOutcome::from(outcome).exit_code(), EXIT_SCRIPT_NOT_REGISTERED);
        assert_eq!(
            String::from_utf8(diagnostics).expect("utf8"),
            format!("No script found: {selector}\n")
        );
    }
}

#[tokio::test]
async fn registered_script_runs_once_with_shared_session() {
    let script = RecordingScript::default();
    let other = RecordingScript::default();
    let registry = ScriptRegistry::new()
        .with(ScriptName::HyperApiCreateHyper, script.clone())
        .with(ScriptName::HyperApiPublishHyper, other.clone());
    let session = RecordingSession::new(SessionLog::default());
    let config = test_config();

    let mut diagnostics: Vec<u8> = Vec::new();
    let outcome = registry
        .dispatch_to(
            ScriptName::HyperApiCreateHyper,
            &session,
            &config,
            &ScriptArgs::default(),
            &mut diagnostics,
        )
        .await
        .expect("script succeeds");

    assert_eq!(outcome, DispatchOutcome::Completed);
    assert_eq!(script.calls(), vec![session_addr(&session)]);
    assert!(other.calls().is_empty());
    assert!(diagnostics.is_empty());
}

#[tokio::test]
async fn script_error_propagates_unchanged() {
    let registry = ScriptRegistry::new().with(
        ScriptName::HyperApiCreateExtract,
        RecordingScript::failing("bad SQL near FORMAT"),
    );
    let session = RecordingSession::new(SessionLog::default());

    let err = registry
        .dispatch(
            ScriptName::HyperApiCreateExtract,
            &session,
            &test_config(),
            &ScriptArgs::default(),
        )
        .await
        .expect_err("script failure surfaces");
    assert_eq!(err.to_string(), "bad SQL near FORMAT");
    assert_eq!(format!("{err:#}"), "bad SQL near FORMAT");
}
