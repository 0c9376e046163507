//! Process termination policy: the host's process-group signal, or a clean exit.

/// Chosen by the process-wide `--exit-instead-of-kill` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationMode {
    /// Send the process group the host's termination signal (SIGTERM)
    #[default]
    Signal,
    /// Exit cleanly via `std::process::exit`
    CleanExit,
}

/// Terminate the current process per `mode`. Called when an
/// `exit_on_close=true` channel hits EOF or a fatal write error.
pub fn terminate(mode: TerminationMode, exit_code: i32) -> ! {
    match mode {
        TerminationMode::CleanExit => std::process::exit(exit_code),
        TerminationMode::Signal => {
            #[cfg(unix)]
            {
                use nix::sys::signal::{self, Signal};
                use nix::unistd::Pid;
                let _ = signal::kill(Pid::from_raw(0), Signal::SIGTERM);
            }
            std::process::exit(exit_code)
        }
    }
}
