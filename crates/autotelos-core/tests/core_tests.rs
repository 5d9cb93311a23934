//! Tests for autotelos-core: domain types, protocol, errors

use autotelos_core::*;

// ===========================================================================
// Goal
// ===========================================================================

#[test]
fn goal_new_clamps_intensity() {
    assert_eq!(Goal::new("a", 1.7, None).intensity, 1.0);
    assert_eq!(Goal::new("a", -0.3, None).intensity, 0.0);
    assert_eq!(Goal::new("a", f64::NAN, None).intensity, 0.0);
    assert_eq!(Goal::new("a", 0.42, None).intensity, 0.42);
}

#[test]
fn goal_new_drops_blank_domain() {
    let goal = Goal::new("Implement stable sort", 0.8, Some("   ".into()));
    assert!(goal.domain.is_none());
    let goal = Goal::new("Implement stable sort", 0.8, Some("code".into()));
    assert_eq!(goal.domain.as_deref(), Some("code"));
}

#[test]
fn goal_starts_unverified() {
    let goal = Goal::new("x", 0.5, None);
    assert!(!goal.verified);
    assert!(goal.verified().verified);
}

#[test]
fn goal_serde_skips_missing_domain() {
    let goal = Goal::new("x", 0.5, None);
    let json = serde_json::to_value(&goal).unwrap();
    assert!(json.get("domain").is_none());
    let back: Goal = serde_json::from_value(json).unwrap();
    assert_eq!(back, goal);
}

// ===========================================================================
// Attempt / Principle / CycleRecord
// ===========================================================================

#[test]
fn attempt_new_defaults_to_failure() {
    let goal = Goal::new("x", 0.5, Some("code".into()));
    let attempt = Attempt::new(goal.id, "code");
    assert_eq!(attempt.goal_id, goal.id);
    assert!(!attempt.success);
    assert!(!attempt.is_bootstrap);
    assert_eq!(attempt.attempts_used, 0);
    assert!(attempt.error.is_none());
}

#[test]
fn principle_new_clamps_confidence() {
    let p = Principle::new("code", "Prefer small functions", 12, 1.4);
    assert_eq!(p.confidence, 1.0);
    assert_eq!(p.usage_count, 0);
    assert_eq!(p.source_count, 12);
}

#[test]
fn cycle_record_complete_requires_no_error() {
    let mut record = CycleRecord::new("reflector-1", AgentKind::Reflector);
    assert!(!record.is_complete());
    record.phase_reached = PHASE_COMPLETE.to_string();
    assert!(record.is_complete());
    record.error = Some("boom".into());
    assert!(!record.is_complete());
}

// ===========================================================================
// AgentKind / DomainPhase
// ===========================================================================

#[test]
fn agent_kind_parses_and_displays() {
    for kind in [AgentKind::Reflector, AgentKind::Practitioner, AgentKind::Crystallizer] {
        let parsed: AgentKind = kind.as_str().parse().unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(kind.to_string(), kind.as_str());
    }
    assert!("oracle".parse::<AgentKind>().is_err());
}

#[test]
fn agent_kind_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&AgentKind::Crystallizer).unwrap(), r#""crystallizer""#);
}

#[test]
fn domain_phase_defaults_to_bootstrap() {
    assert_eq!(DomainPhase::default(), DomainPhase::Bootstrap);
    assert!(DomainPhase::Bootstrap.is_bootstrap());
    assert!(!DomainPhase::Mature.is_bootstrap());
    assert_eq!("mature".parse::<DomainPhase>().unwrap(), DomainPhase::Mature);
    assert!(matches!("ripe".parse::<DomainPhase>(), Err(Error::UnknownPhase(_))));
}

#[test]
fn agent_status_new_is_idle() {
    let status = AgentStatus::new("practitioner-code", AgentKind::Practitioner);
    assert!(!status.running);
    assert_eq!(status.cycles_run, 0);
    assert_eq!(status.current_phase, PHASE_IDLE);
}

// ===========================================================================
// Metrics types
// ===========================================================================

#[test]
fn metrics_flattens_counts() {
    let metrics = Metrics {
        counts: AggregateCounts {
            total_attempts: 4,
            successful_attempts: 3,
            ..Default::default()
        },
        activation_rate: 0.0,
        attempt_success_rate: 0.75,
    };
    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["total_attempts"], 4);
    assert_eq!(json["attempt_success_rate"], 0.75);
}

#[test]
fn phase_gate_report_lists_failing_criteria() {
    let mut report = PhaseGateReport::default();
    report.criteria.insert("a".into(), true);
    report.criteria.insert("b".into(), false);
    assert_eq!(report.failing(), vec!["b"]);
}

// ===========================================================================
// RPC protocol
// ===========================================================================

#[test]
fn rpc_request_parse_with_params() {
    let json = r#"{"id":"req-1","method":"goals.pending","params":{"limit":5}}"#;
    let req: RpcRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.id, "req-1");
    assert_eq!(req.method, "goals.pending");
    assert_eq!(req.params["limit"], 5);
}

#[test]
fn rpc_request_parse_no_params() {
    let json = r#"{"id":"req-2","method":"metrics.get"}"#;
    let req: RpcRequest = serde_json::from_str(json).unwrap();
    assert!(req.params.is_null());
}

#[test]
fn rpc_response_ok() {
    let resp = RpcResponse::ok("req-1", serde_json::json!({"ok": true}));
    let json = serde_json::to_string(&resp).unwrap();
    assert!(json.contains(r#""id":"req-1""#));
    assert!(json.contains(r#""ok":true"#));
    assert!(!json.contains(r#""error""#));
}

#[test]
fn rpc_response_error_skips_result() {
    let resp = RpcResponse::err("req-1", NOT_FOUND, "goal not found");
    let parsed: serde_json::Value = serde_json::to_value(&resp).unwrap();
    assert!(parsed.get("result").is_none());
    assert_eq!(parsed["error"]["code"], NOT_FOUND);
}

#[test]
fn rpc_response_method_not_found() {
    let resp = RpcResponse::method_not_found("req-1", "foo.bar");
    let err = resp.error.unwrap();
    assert_eq!(err.code, METHOD_NOT_FOUND);
    assert!(err.message.contains("foo.bar"));
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn unknown_names_are_rejected() {
    assert_eq!(
        "dreamer".parse::<AgentKind>(),
        Err(Error::UnknownAgentKind("dreamer".into()))
    );
    let e = "adolescent".parse::<DomainPhase>().unwrap_err();
    assert_eq!(e.to_string(), "unknown phase: adolescent");
}
