/*!
 * Installer Tests
 * Install, raise, restore and write-end swapping against the real OS
 */

use nix::sys::signal::{self as nix_signal, SaFlags, SigAction, SigHandler, SigSet};
use pretty_assertions::assert_eq;
use serial_test::serial;
use signal_bridge::*;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicUsize, Ordering};

// libc directly: nix has no variant for real-time signals
fn raise(signal: Signal) {
    assert_eq!(unsafe { libc::raise(signal.number()) }, 0);
}

fn fresh_channel() -> NotificationReceiver {
    let (sender, receiver) = NotificationChannel::open().unwrap();
    set_notification_sender(sender).unwrap();
    receiver
}

#[test]
#[serial]
fn test_install_then_raise_delivers_one_record() {
    let mut receiver = fresh_channel();

    assert_eq!(install_signal_action(libc::SIGUSR1).unwrap(), InstallStatus::Installed);
    assert_eq!(install_state(Signal::SIGUSR1), InstallState::Installed);
    assert_eq!(query_signal_action(libc::SIGUSR1).unwrap(), SignalDisposition::Bridge);
    assert!(installed_signals().contains(&Signal::SIGUSR1));

    raise(Signal::SIGUSR1);

    let records = receiver.drain().unwrap();
    assert_eq!(records, vec![NotificationRecord::new(libc::SIGUSR1)]);
    assert_eq!(records[0].signal(), Some(Signal::SIGUSR1));

    uninstall_signal_action(Signal::SIGUSR1).unwrap();
    assert_eq!(install_state(Signal::SIGUSR1), InstallState::NotInstalled);
}

#[test]
#[serial]
fn test_invalid_and_uncatchable_leave_state_untouched() {
    for number in [0, -1, 1000, i32::MAX] {
        let err = install_signal_action(number).unwrap_err();
        assert_eq!(err, BridgeError::InvalidSignal(number));
        assert!(query_signal_action(number).is_err());
    }

    for signal in [Signal::SIGKILL, Signal::SIGSTOP] {
        let err = install_signal_action(signal.number()).unwrap_err();
        assert_eq!(err, BridgeError::Uncatchable(signal));
        assert_eq!(install_state(signal), InstallState::NotInstalled);
        assert_eq!(
            query_signal_action(signal.number()).unwrap(),
            SignalDisposition::Default
        );
    }

    assert!(!installed_signals().contains(&Signal::SIGKILL));
}

static FOREIGN_HITS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn foreign_handler(_: libc::c_int) {
    FOREIGN_HITS.fetch_add(1, Ordering::SeqCst);
}

#[test]
#[serial]
fn test_reinstall_keeps_original_restorable() {
    let mut receiver = fresh_channel();
    let foreign = SigAction::new(
        SigHandler::Handler(foreign_handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe { nix_signal::sigaction(nix_signal::Signal::SIGUSR2, &foreign).unwrap() };
    assert_eq!(query_signal_action(libc::SIGUSR2).unwrap(), SignalDisposition::Foreign);

    assert_eq!(install_signal_action(libc::SIGUSR2).unwrap(), InstallStatus::Installed);
    assert_eq!(
        install_signal_action(libc::SIGUSR2).unwrap(),
        InstallStatus::AlreadyInstalled
    );

    raise(Signal::SIGUSR2);
    assert_eq!(FOREIGN_HITS.load(Ordering::SeqCst), 0);
    assert_eq!(receiver.drain().unwrap().len(), 1);

    uninstall_signal_action(Signal::SIGUSR2).unwrap();
    assert_eq!(query_signal_action(libc::SIGUSR2).unwrap(), SignalDisposition::Foreign);

    raise(Signal::SIGUSR2);
    assert_eq!(FOREIGN_HITS.load(Ordering::SeqCst), 1);
    assert!(receiver.drain().unwrap().is_empty());

    assert_eq!(
        uninstall_signal_action(Signal::SIGUSR2),
        Err(BridgeError::NotInstalled(Signal::SIGUSR2))
    );
}

#[test]
#[serial]
fn test_write_end_swaps_between_channels() {
    let mut first = fresh_channel();
    install_signal_action(libc::SIGWINCH).unwrap();

    raise(Signal::SIGWINCH);
    assert_eq!(first.drain().unwrap().len(), 1);

    let mut second = fresh_channel();
    raise(Signal::SIGWINCH);
    assert!(first.drain().unwrap().is_empty());
    assert_eq!(second.drain().unwrap().len(), 1);

    // caller-owned descriptor: the bridge borrows it
    let (sender, mut third) = NotificationChannel::open().unwrap();
    set_notification_fd(sender.as_raw_fd()).unwrap();
    raise(Signal::SIGWINCH);
    assert_eq!(third.drain().unwrap(), vec![NotificationRecord::new(libc::SIGWINCH)]);
    assert!(second.drain().unwrap().is_empty());

    // detached: the record is dropped and counted
    clear_notification_fd();
    let dropped = stats().records_dropped;
    raise(Signal::SIGWINCH);
    assert_eq!(stats().records_dropped, dropped + 1);
    assert!(third.drain().unwrap().is_empty());

    drop(sender);
    uninstall_signal_action(Signal::SIGWINCH).unwrap();

    // replaced bridge-owned ends stay parked, bounded
    let retired = registry().retired_endpoints();
    assert!(retired >= 2 && retired <= 16);
}

#[test]
#[serial]
fn test_shutdown_request_returns_under_notify_policy() {
    let mut receiver = fresh_channel();
    set_termination_policy(TerminationPolicy::Notify);

    install_signal_action(libc::SIGTERM).unwrap();
    let before = stats().delivered_for(Signal::SIGTERM);

    raise(Signal::SIGTERM);

    // still alive: the consumer owns shutdown
    assert_eq!(receiver.drain().unwrap(), vec![NotificationRecord::new(libc::SIGTERM)]);
    assert_eq!(stats().delivered_for(Signal::SIGTERM), before + 1);

    uninstall_signal_action(Signal::SIGTERM).unwrap();
    assert_eq!(query_signal_action(libc::SIGTERM).unwrap(), SignalDisposition::Default);
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
#[serial]
fn test_realtime_signal_round_trip() {
    let mut receiver = fresh_channel();
    let signal = Signal::realtime(2).unwrap();
    assert_eq!(signal.number(), libc::SIGRTMIN() + 2);

    assert_eq!(install_signal_action(signal.number()).unwrap(), InstallStatus::Installed);
    assert_eq!(install_state(signal), InstallState::Installed);
    assert_eq!(query_signal_action(signal.number()).unwrap(), SignalDisposition::Bridge);
    let before = stats().delivered_for(signal);

    raise(signal);

    // not a crash or shutdown request: the process keeps running
    let records = receiver.drain().unwrap();
    assert_eq!(records, vec![NotificationRecord::new(signal.number())]);
    assert_eq!(records[0].signal(), Some(signal));
    assert_eq!(stats().delivered_for(signal), before + 1);

    uninstall_signal_action(signal).unwrap();
    assert_eq!(query_signal_action(signal.number()).unwrap(), SignalDisposition::Default);
}

#[cfg(target_os = "linux")]
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
#[test]
#[serial]
fn test_stack_fault_round_trip() {
    let mut receiver = fresh_channel();

    assert_eq!(install_signal_action(libc::SIGSTKFLT).unwrap(), InstallStatus::Installed);
    raise(Signal::SIGSTKFLT);
    assert_eq!(receiver.drain().unwrap(), vec![NotificationRecord::new(libc::SIGSTKFLT)]);

    uninstall_signal_action(Signal::SIGSTKFLT).unwrap();
}

#[test]
#[serial]
fn test_rejects_closed_descriptor() {
    let (sender, _receiver) = NotificationChannel::open().unwrap();
    let fd = sender.as_raw_fd();
    drop(sender);

    // nothing in this test opens descriptors in between
    assert_eq!(set_notification_fd(fd), Err(BridgeError::InvalidDescriptor(fd)));
}
