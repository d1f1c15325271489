//! Platform shell used to run gateway commands.

use std::ffi::OsString;
use std::process::Stdio;

use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub binary: OsString,
    /// Arguments placed before the script (`-c` or `/C`).
    pub args: Vec<&'static str>,
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary.to_string_lossy())
    }
}

impl Shell {
    #[cfg(windows)]
    #[must_use]
    pub fn platform() -> Self {
        let binary = std::env::var_os("COMSPEC").unwrap_or_else(|| OsString::from("cmd.exe"));
        Self {
            binary,
            args: vec!["/C"],
        }
    }

    #[cfg(not(windows))]
    #[must_use]
    pub fn platform() -> Self {
        Self {
            binary: OsString::from("/bin/sh"),
            args: vec!["-c"],
        }
    }

    /// Build a command that runs `script` with piped output and no stdin.
    #[must_use]
    pub fn command(&self, script: &str) -> Command {
        let mut cmd = self.std_command(script);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        Command::from(cmd)
    }

    /// Build a command for a process that must outlive the host. On Unix it
    /// gets its own process group so signals sent to the host's group miss it.
    #[must_use]
    pub fn detached(&self, script: &str) -> std::process::Command {
        let mut cmd = self.std_command(script);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn std_command(&self, script: &str) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.binary);
        cmd.args(&self.args).arg(script).stdin(Stdio::null());
        cmd
    }
}
