//! Process inspection and launching helpers.

use crate::error::AppError;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use sysinfo::{Pid, ProcessRefreshKind, System};

/// Maps an OS process id to the executable that owns it.
pub trait ExecutableResolver: Send + Sync {
    fn resolve(&self, pid: u32) -> Option<PathBuf>;
}

pub struct SysinfoResolver;

impl ExecutableResolver for SysinfoResolver {
    fn resolve(&self, pid: u32) -> Option<PathBuf> {
        let mut sys = System::new();
        let sys_pid = Pid::from(pid as usize);
        sys.refresh_process_specifics(sys_pid, ProcessRefreshKind::new());
        sys.process(sys_pid)
            .and_then(|process| process.exe().map(PathBuf::from))
    }
}

/// Fire-and-forget process launching; the caller never waits for exit.
pub trait Launcher: Send + Sync {
    fn launch(&self, program: &str, args: &[String]) -> Result<(), AppError>;
}

pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn launch(&self, program: &str, args: &[String]) -> Result<(), AppError> {
        Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| AppError::Launch(format!("{}: {}", program, e)))
    }
}
