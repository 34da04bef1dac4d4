//! Process liveness probing for stale-lock reclamation

/// Answers whether a process id still belongs to a running process
pub trait ProcessProbe: Send + Sync {
	fn is_process_alive(&self, pid: u32) -> bool;
}

/// Probe backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessProbe;

#[cfg(unix)]
impl ProcessProbe for SystemProcessProbe {
	fn is_process_alive(&self, pid: u32) -> bool {
		if pid == 0 || pid > i32::MAX as u32 {
			return false;
		}
		// Signal 0 only checks existence and permission
		let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
		if rc == 0 {
			return true;
		}
		// EPERM: the process exists but belongs to someone else
		std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
	}
}

#[cfg(not(unix))]
impl ProcessProbe for SystemProcessProbe {
	fn is_process_alive(&self, pid: u32) -> bool {
		use sysinfo::{Pid, ProcessesToUpdate, System};

		if pid == 0 {
			return false;
		}
		let pid = Pid::from_u32(pid);
		let mut sys = System::new();
		sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
		sys.process(pid).is_some()
	}
}


// vim: ts=4
