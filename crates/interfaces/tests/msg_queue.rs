//! End-to-end compile passes over the message queue interface.

use interfaces::security::apparmor::AppArmor;
use interfaces::security::seccomp::Seccomp;
use interfaces::{ConnectMode, ConnectionDecisionEngine, Error, Registry, Repository};
use snap::{Info, PlugRef, SlotRef};
use std::sync::Arc;

const SYSCALLS: &str = "mq_getsetattr\nmq_notify\nmq_open\nmq_timedreceive\nmq_timedreceive_time64\nmq_timedsend\nmq_timedsend_time64\nmq_unlink\n";

const PROVIDER_YAML: &str = r#"
name: queue-server
slots:
  jobs:
    interface: msg-queue
    name: /sp-server
  fanout:
    interface: msg-queue
    name: /sp*-cl*-*
apps:
  server:
    slots: [jobs, fanout]
  admin:
    daemon: simple
hooks:
  configure: {}
"#;

const CONSUMER_YAML: &str = r#"
name: queue-client
plugs:
  jobs:
    interface: msg-queue
    name: /sp-server
apps:
  worker:
    plugs: [jobs]
  cli: {}
"#;

const GLOB_CONSUMER_YAML: &str = r#"
name: glob-client
plugs:
  fanout:
    interface: msg-queue
    name: /sp*-cl*-*
apps:
  listener: {}
"#;

fn repository() -> Repository {
    let mut repo = Repository::new(Arc::new(Registry::builtin().unwrap()));
    repo.add_snap(Info::from_yaml(PROVIDER_YAML).unwrap()).unwrap();
    repo.add_snap(Info::from_yaml(CONSUMER_YAML).unwrap()).unwrap();
    repo.add_snap(Info::from_yaml(GLOB_CONSUMER_YAML).unwrap()).unwrap();
    repo
}

fn connected_repository() -> Repository {
    let mut repo = repository();
    repo.auto_connect("queue-client").unwrap();
    repo.auto_connect("glob-client").unwrap();
    repo
}

#[test]
fn test_auto_connect_pairs_equal_names() {
    let repo = connected_repository();
    let connections: Vec<String> = repo.connections().map(|(c, _)| c.to_string()).collect();
    assert_eq!(
        connections,
        vec![
            "glob-client:fanout queue-server:fanout",
            "queue-client:jobs queue-server:jobs",
        ]
    );
}

#[test]
fn test_manual_connect_is_refused() {
    let mut repo = repository();
    let err = repo
        .connect(
            &"queue-client:jobs".parse::<PlugRef>().unwrap(),
            &"queue-server:jobs".parse::<SlotRef>().unwrap(),
            ConnectMode::Manual,
        )
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionRefused { .. }));
}

#[test]
fn test_mismatched_auto_connect_is_denied() {
    let repo = repository();
    let engine = ConnectionDecisionEngine::new(repo.registry());
    let plug = repo
        .plug(&PlugRef::new("glob-client", "fanout"))
        .unwrap();
    let slot = repo.slot(&SlotRef::new("queue-server", "jobs")).unwrap();
    assert!(!engine.decide(plug, slot, ConnectMode::Auto).is_approved());
}

#[test]
fn test_apparmor_compile_pass() {
    let repo = connected_repository();
    let spec = repo.specification::<AppArmor>().unwrap();

    assert_eq!(
        spec.security_tags(),
        vec![
            "snap.glob-client.listener",
            "snap.queue-client.worker",
            "snap.queue-server.server",
        ]
    );
    assert_eq!(
        spec.snippet_for_tag("snap.queue-server.server"),
        "/sp*-cl*-* rw,\n/sp-server rw,\n"
    );
    assert_eq!(
        spec.snippet_for_tag("snap.queue-client.worker"),
        "/sp-server rw,\n"
    );
    assert_eq!(
        spec.snippet_for_tag("snap.glob-client.listener"),
        "/sp*-cl*-* rw,\n"
    );
    // unbound apps and hooks get nothing
    assert_eq!(spec.snippet_for_tag("snap.queue-client.cli"), "");
    assert_eq!(spec.snippet_for_tag("snap.queue-server.hook.configure"), "");
}

#[test]
fn test_seccomp_compile_pass_collapses_duplicates() {
    let repo = connected_repository();
    let spec = repo.specification::<Seccomp>().unwrap();

    let server = spec.snippet_for_tag("snap.queue-server.server");
    assert!(server.contains(SYSCALLS));
    assert_eq!(server.matches("mq_open").count(), 1);
    assert_eq!(spec.snippets_for_tag("snap.queue-server.server").len(), 1);
    assert!(spec.snippet_for_tag("snap.queue-client.worker").contains(SYSCALLS));
}

#[test]
fn test_compile_pass_is_reproducible() {
    let repo = connected_repository();
    let first = repo.specification::<AppArmor>().unwrap();
    let second = repo.specification::<AppArmor>().unwrap();

    assert_eq!(first.security_tags(), second.security_tags());
    for tag in first.security_tags() {
        assert_eq!(first.snippet_for_tag(&tag), second.snippet_for_tag(&tag));
    }
}

#[test]
fn test_disconnect_removes_connected_snippets() {
    let mut repo = connected_repository();
    repo.disconnect(
        &PlugRef::new("queue-client", "jobs"),
        &SlotRef::new("queue-server", "jobs"),
    )
    .unwrap();

    let spec = repo.specification::<AppArmor>().unwrap();
    assert_eq!(spec.snippet_for_tag("snap.queue-client.worker"), "");
    // permanent slot snippets stay
    assert!(
        spec.snippet_for_tag("snap.queue-server.server")
            .contains("/sp-server rw,\n")
    );
}

#[test]
fn test_invalid_queue_name_blocks_install() {
    let mut repo = Repository::new(Arc::new(Registry::builtin().unwrap()));
    let info = Info::from_yaml(
        "name: bad\nplugs:\n  q:\n    interface: msg-queue\n    name: /\napps:\n  a: {}\n",
    )
    .unwrap();
    let err = repo.add_snap(info).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(err.to_string().contains("bad:q"));
}
