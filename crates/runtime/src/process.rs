//! Process liveness helpers and the state-directory ownership file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		if PathBuf::from("/proc").join(pid.to_string()).exists() {
			return true;
		}

		std::process::Command::new("kill")
			.arg("-0")
			.arg(pid.to_string())
			.status()
			.map(|status| status.success())
			.unwrap_or(pid == std::process::id())
	}

	#[cfg(windows)]
	{
		let filter = format!("PID eq {pid}");
		if let Ok(output) = std::process::Command::new("tasklist").args(["/FI", &filter, "/FO", "CSV", "/NH"]).output() {
			if output.status.success() {
				let stdout = String::from_utf8_lossy(&output.stdout);
				return tasklist_has_pid(stdout.as_ref(), pid);
			}
		}

		pid == std::process::id()
	}

	#[cfg(not(any(unix, windows)))]
	{
		pid == std::process::id()
	}
}

#[cfg(any(test, windows))]
fn tasklist_has_pid(output: &str, pid: u32) -> bool {
	let pid_str = pid.to_string();
	output.lines().any(|line| {
		let line = line.trim();
		if !line.starts_with('"') {
			return false;
		}

		line.trim_matches('"')
			.split("\",\"")
			.nth(1)
			.is_some_and(|field| field.trim() == pid_str.as_str())
	})
}

/// Reads the pid recorded in `path`, if the file exists and parses.
pub fn read_pid_file(path: &Path) -> Option<u32> {
	fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Exclusive ownership of a state directory, held for the life of the value.
///
/// The file is removed again on drop, but only if it still records our pid.
#[derive(Debug)]
pub struct PidFile {
	path: PathBuf,
	pid: u32,
}

impl PidFile {
	/// Writes the current pid to `path`.
	///
	/// Fails with [`Error::StateDirLocked`] when the file names another live
	/// process. A file left behind by a dead process is taken over.
	pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let pid = std::process::id();

		if let Some(owner) = read_pid_file(&path) {
			if owner != pid && pid_is_alive(owner) {
				return Err(Error::StateDirLocked { path, pid: owner });
			}
			debug!(target = "walink.process", path = %path.display(), stale_pid = owner, "taking over stale pid file");
		}

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let mut file = fs::File::create(&path)?;
		writeln!(file, "{pid}")?;
		file.sync_all()?;

		Ok(Self { path, pid })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn pid(&self) -> u32 {
		self.pid
	}
}

impl Drop for PidFile {
	fn drop(&mut self) {
		if read_pid_file(&self.path) != Some(self.pid) {
			return;
		}
		if let Err(err) = fs::remove_file(&self.path) {
			warn!(target = "walink.process", path = %self.path.display(), error = %err, "failed to remove pid file");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tasklist_parser_matches_csv_line() {
		let output = "\"walink-driver.exe\",\"1234\",\"Console\",\"1\",\"250,000 K\"\r\n";
		assert!(tasklist_has_pid(output, 1234));
		assert!(!tasklist_has_pid(output, 9999));
	}

	#[test]
	fn tasklist_parser_ignores_non_csv_lines() {
		let output = "INFO: No tasks are running which match the specified criteria.\r\n";
		assert!(!tasklist_has_pid(output, 1234));
	}

	#[cfg(unix)]
	#[test]
	fn current_process_is_alive() {
		assert!(pid_is_alive(std::process::id()));
	}

	#[cfg(unix)]
	#[test]
	fn pid_zero_is_never_alive() {
		assert!(!pid_is_alive(0));
	}

	#[test]
	fn pid_file_is_written_and_removed_on_drop() {
		let temp = tempfile::TempDir::new().unwrap();
		let path = temp.path().join("walinkd.pid");

		let lock = PidFile::acquire(&path).unwrap();
		assert_eq!(read_pid_file(&path), Some(std::process::id()));
		assert_eq!(lock.pid(), std::process::id());

		drop(lock);
		assert!(!path.exists());
	}

	#[test]
	fn stale_pid_file_is_taken_over() {
		let temp = tempfile::TempDir::new().unwrap();
		let path = temp.path().join("walinkd.pid");
		// pid 0 is never considered alive.
		fs::write(&path, "0\n").unwrap();

		let lock = PidFile::acquire(&path).unwrap();
		assert_eq!(read_pid_file(lock.path()), Some(std::process::id()));
	}

	#[cfg(unix)]
	#[test]
	fn live_owner_blocks_acquire() {
		let temp = tempfile::TempDir::new().unwrap();
		let path = temp.path().join("walinkd.pid");
		let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
		fs::write(&path, format!("{}\n", child.id())).unwrap();

		let err = PidFile::acquire(&path).unwrap_err();
		let _ = child.kill();
		let _ = child.wait();

		match err {
			Error::StateDirLocked { pid, .. } => assert_eq!(pid, child.id()),
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn drop_leaves_foreign_pid_file_alone() {
		let temp = tempfile::TempDir::new().unwrap();
		let path = temp.path().join("walinkd.pid");

		let lock = PidFile::acquire(&path).unwrap();
		fs::write(&path, "0\n").unwrap();
		drop(lock);

		assert!(path.exists());
	}
}
