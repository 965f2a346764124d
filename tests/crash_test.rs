/*!
 * Crash Path Tests
 *
 * Each scenario re-runs this test binary as a child that installs the bridge
 * and raises a signal against itself; the parent inspects how the child died
 * and what it left behind.
 */

use nix::sys::signal as nix_signal;
use signal_bridge::*;
use std::fs::{self, File};
use std::os::fd::AsRawFd;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

const SCENARIO_ENV: &str = "SIGBRIDGE_TEST_SCENARIO";
const DIR_ENV: &str = "SIGBRIDGE_TEST_DIR";

/// Child side; a no-op when run by the normal harness
#[test]
fn crash_child() {
    let Ok(scenario) = std::env::var(SCENARIO_ENV) else {
        return;
    };
    let dir = PathBuf::from(std::env::var(DIR_ENV).unwrap());

    // keep crash runs from leaving core files behind
    let no_core = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    unsafe { libc::setrlimit(libc::RLIMIT_CORE, &no_core) };

    let notify = File::create(dir.join("notify.bin")).unwrap();
    let dump = File::create(dir.join("dump.txt")).unwrap();
    set_notification_fd(notify.as_raw_fd()).unwrap();
    set_backtrace_dump_fd(dump.as_raw_fd());

    let signal = match scenario.as_str() {
        "abort-dump" => {
            set_backtrace_dump_enabled(true);
            Signal::SIGABRT
        }
        "abort-quiet" => {
            set_backtrace_dump_enabled(false);
            Signal::SIGABRT
        }
        "segv-dump" => {
            set_backtrace_dump_enabled(true);
            Signal::SIGSEGV
        }
        "term-reraise" => {
            set_backtrace_dump_enabled(true);
            set_termination_policy(TerminationPolicy::Reraise);
            Signal::SIGTERM
        }
        "term-notify" => {
            set_termination_policy(TerminationPolicy::Notify);
            Signal::SIGTERM
        }
        other => panic!("unknown scenario {other}"),
    };

    install_signal_action(signal.number()).unwrap();
    nix_signal::raise(nix_signal::Signal::try_from(signal.number()).unwrap()).unwrap();

    drop(notify);
    drop(dump);
}

struct ChildOutcome {
    status: ExitStatus,
    notify: Vec<u8>,
    dump: String,
}

fn run_child(scenario: &str) -> ChildOutcome {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(std::env::current_exe().unwrap())
        .args(["crash_child", "--exact", "--test-threads=1", "--nocapture"])
        .env(SCENARIO_ENV, scenario)
        .env(DIR_ENV, dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();

    ChildOutcome {
        status,
        notify: read_or_empty(&dir.path().join("notify.bin")),
        dump: String::from_utf8_lossy(&read_or_empty(&dir.path().join("dump.txt"))).into_owned(),
    }
}

fn read_or_empty(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_default()
}

fn single_record(bytes: &[u8]) -> NotificationRecord {
    assert_eq!(bytes.len(), NotificationRecord::SIZE, "expected exactly one record");
    let mut raw = [0u8; NotificationRecord::SIZE];
    raw.copy_from_slice(bytes);
    NotificationRecord::decode(raw)
}

#[test]
fn test_abort_writes_dump_then_dies() {
    let outcome = run_child("abort-dump");

    assert_eq!(outcome.status.signal(), Some(libc::SIGABRT));
    assert_eq!(single_record(&outcome.notify).signal(), Some(Signal::SIGABRT));

    assert!(outcome.dump.contains(DUMP_HEADER));
    assert!(outcome.dump.contains("(SIGABRT)"));
    assert!(outcome.dump.contains("  #00 0x"));
    assert!(outcome.dump.contains("*** end of backtrace"));
}

#[test]
fn test_abort_without_dump_leaves_no_artifact() {
    let outcome = run_child("abort-quiet");

    assert_eq!(outcome.status.signal(), Some(libc::SIGABRT));
    assert_eq!(single_record(&outcome.notify).signal(), Some(Signal::SIGABRT));
    assert!(outcome.dump.is_empty());
}

#[test]
fn test_segv_writes_dump_then_dies() {
    let outcome = run_child("segv-dump");

    assert_eq!(outcome.status.signal(), Some(libc::SIGSEGV));
    assert!(outcome.dump.contains("(SIGSEGV)"));
}

#[test]
fn test_shutdown_reraise_policy_terminates() {
    let outcome = run_child("term-reraise");

    assert_eq!(outcome.status.signal(), Some(libc::SIGTERM));
    assert_eq!(single_record(&outcome.notify).signal(), Some(Signal::SIGTERM));
    // shutdown requests never dump
    assert!(outcome.dump.is_empty());
}

#[test]
fn test_shutdown_notify_policy_survives() {
    let outcome = run_child("term-notify");

    assert!(outcome.status.success(), "child exited with {:?}", outcome.status);
    assert_eq!(single_record(&outcome.notify).signal(), Some(Signal::SIGTERM));
}
