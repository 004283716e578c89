use lk_protocol::*;
use std::path::PathBuf;

#[test]
fn test_build_pipeline_deserialization_from_yaml() {
    let yaml_str = r#"
requirements:
  - name: Node.js
    command: node
    args: ["--version"]
  - name: Python
    command: python3
    args: ["--version"]
clean:
  - dist
  - ../backend/dist
steps:
  - name: install-frontend
    description: Frontend dependency installation
    phase: install
    group: frontend
    command: npm
    args: ["ci"]
  - name: compile-backend
    phase: compile
    group: backend
    command: pyinstaller
    args: ["--onefile", "app.py"]
    working-dir: ../backend
    timeout-secs: 600
  - name: trial-license
    phase: package
    command: python3
    required: false
    env:
      ELECTRON: "true"
artifacts:
  - dist/index.html
"#;

    let pipeline: BuildPipelineConfig =
        serde_yaml::from_str(yaml_str).expect("Failed to deserialize BuildPipelineConfig");

    assert_eq!(pipeline.requirements.len(), 2);
    assert_eq!(pipeline.clean.len(), 2);
    assert_eq!(pipeline.steps.len(), 3);
    assert_eq!(pipeline.artifacts, vec![PathBuf::from("dist/index.html")]);

    let install = &pipeline.steps[0];
    assert_eq!(install.phase, BuildPhase::Install);
    assert_eq!(install.group.as_deref(), Some("frontend"));
    assert!(install.required, "steps are required unless stated otherwise");

    let backend = &pipeline.steps[1];
    assert_eq!(backend.working_dir, Some(PathBuf::from("../backend")));
    assert_eq!(backend.timeout_secs, Some(600));

    let license = &pipeline.steps[2];
    assert!(!license.required);
    assert_eq!(license.env.get("ELECTRON").map(String::as_str), Some("true"));
}

#[test]
fn test_supervisor_config_deserialization_from_toml() {
    let toml_str = r#"
[supervisor]
grace-period-ms = 3000

[[roles]]
name = "devserver"
command = "npm"
args = ["run", "dev", "--", "--port", "{port}"]
working-dir = "frontend"
modes = ["development"]
env = { FORCE_COLOR = "1" }

[roles.port]
preferred = 3000
env = "LK_DEV_PORT"

[roles.health]
path = "/"
max-attempts = 30

[[roles]]
name = "shell"
command = "electron"
args = ["."]
primary = true
grace-period-ms = 5000
"#;

    let config: SupervisorConfig = toml::from_str(toml_str).expect("Failed to parse config");

    assert_eq!(config.supervisor.grace_period_ms, 3000);
    assert_eq!(config.supervisor.output_buffer_lines, 200);
    assert_eq!(config.roles.len(), 2);

    let devserver = &config.roles[0];
    assert_eq!(devserver.modes, vec![Mode::Development]);
    let port = devserver.port.as_ref().expect("port section");
    assert_eq!(port.preferred, 3000);
    assert_eq!(port.host, "127.0.0.1");
    assert_eq!(port.env.as_deref(), Some("LK_DEV_PORT"));
    let health = devserver.health.as_ref().expect("health section");
    assert_eq!(health.expected_status, 200);
    assert_eq!(health.interval_ms, 1000);

    let shell = &config.roles[1];
    assert!(shell.primary);
    assert!(!shell.optional);
    assert_eq!(shell.grace_period_ms, Some(5000));
    assert!(shell.runs_in(Mode::Production));
}

#[test]
fn test_attach_only_role() {
    let toml_str = r#"
[[roles]]
name = "backend"
optional = true

[roles.health]
port = 5000
path = "/api/health"
"#;

    let config: SupervisorConfig = toml::from_str(toml_str).expect("Failed to parse config");
    let backend = &config.roles[0];
    assert!(backend.is_attach_only());
    assert!(backend.optional);
}

#[test]
fn test_event_serialization_uses_tagged_format() {
    let event = Event::ProcessStateChanged {
        role: "backend".to_string(),
        from: ProcessState::Starting,
        to: ProcessState::Ready,
    };

    let json = serde_json::to_value(&event).expect("serialize event");
    assert_eq!(json["type"], "processStateChanged");
    assert_eq!(json["payload"]["role"], "backend");
    assert_eq!(json["payload"]["to"], "READY");

    let back: Event = serde_json::from_value(json).expect("deserialize event");
    assert_eq!(back.role(), Some("backend"));
}

#[test]
fn test_shutdown_trigger_serialization() {
    let trigger = ShutdownTrigger::Signal {
        name: "SIGTERM".to_string(),
    };
    let json = serde_json::to_string(&trigger).expect("serialize trigger");
    assert!(json.contains(r#""kind":"signal""#));
    assert_eq!(trigger.to_string(), "received SIGTERM");
}

#[test]
fn test_build_summary_success() {
    let summary = BuildSummary {
        started_at: chrono::Utc::now(),
        elapsed_ms: 10,
        steps: vec![StepReport {
            name: "compile".to_string(),
            status: StepStatus::Warning,
            exit: Some(ExitInfo::from_code(1)),
            duration_ms: 5,
            message: None,
        }],
        warnings: vec!["compile exited with exit code 1".to_string()],
        artifacts: vec![],
        missing_artifacts: vec![],
        failure: None,
    };
    assert!(summary.is_success());
    assert_eq!(summary.steps_with(StepStatus::Warning).count(), 1);

    let failed = BuildSummary {
        missing_artifacts: vec![PathBuf::from("dist/index.html")],
        ..summary
    };
    assert!(!failed.is_success());
}
