//! Signal delivery to a process by PID.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::info;

use crate::error::KillError;

/// Parses a user-supplied PID. Only positive integers are accepted: zero and
/// negative values address process groups.
pub fn parse_target(target: &str) -> Result<i32, KillError> {
    match target.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(KillError::InvalidTarget(target.to_string())),
    }
}

/// Sends SIGTERM to the process.
pub fn kill_process(target: &str) -> Result<(), KillError> {
    kill_with_signal(target, Signal::SIGTERM)
}

pub fn kill_with_signal(target: &str, sig: Signal) -> Result<(), KillError> {
    let pid = send(target, Some(sig))?;
    info!("Sent {} to process {}", sig, pid);
    Ok(())
}

/// `None` only checks that the process exists and may be signalled.
fn send(target: &str, sig: Option<Signal>) -> Result<i32, KillError> {
    let pid = parse_target(target)?;
    signal::kill(Pid::from_raw(pid), sig).map_err(|errno| match errno {
        Errno::EPERM => KillError::PermissionDenied(pid),
        Errno::ESRCH => KillError::NoSuchProcess(pid),
        errno => KillError::Signal { pid, errno },
    })?;
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Duration;

    #[test]
    fn test_invalid_targets() {
        for target in ["abc", "", "0", "-1", "12abc", "99999999999"] {
            assert_eq!(
                kill_process(target),
                Err(KillError::InvalidTarget(target.to_string())),
                "target {:?}",
                target
            );
        }
        assert_eq!(parse_target(" 42 "), Ok(42));
    }

    #[test]
    fn test_missing_process() {
        // above any possible pid_max
        assert_eq!(
            send("2147483647", None),
            Err(KillError::NoSuchProcess(i32::MAX))
        );
    }

    #[test]
    fn test_permission_denied_is_typed() {
        if nix::unistd::geteuid().is_root() {
            return;
        }
        // existence check only, nothing is delivered
        assert_eq!(send("1", None), Err(KillError::PermissionDenied(1)));
    }

    #[test]
    fn test_kill_spawned_child() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("Failed to spawn sleep");
        let pid = child.id().to_string();

        kill_process(&pid).expect("SIGTERM to own child failed");

        let mut exited = false;
        for _ in 0..50 {
            if child.try_wait().expect("try_wait failed").is_some() {
                exited = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        if !exited {
            let _ = child.kill();
        }
        assert!(exited, "child did not exit after SIGTERM");
    }
}
