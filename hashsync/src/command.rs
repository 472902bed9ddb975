use std::{
    io::{BufRead, BufReader, Lines},
    process::{Child, ChildStdout, Command, ExitStatus, Stdio},
};

use hashsync_core::{channel::OutputLines, error::Error};

/// Raise `CommandFailed` if the process did not exit normally with status 0
pub fn check_process_status(description: &str, status: ExitStatus) -> Result<(), Error> {
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(Error::command_failed(
            description,
            format!("exit status = {}", code),
        )),
        None => Err(Error::command_failed(
            description,
            "process did not exit normally",
        )),
    }
}

fn program_and_args(command: &[String]) -> Result<(&String, &[String]), Error> {
    command
        .split_first()
        .ok_or_else(|| Error::command_failed("", "empty command"))
}

/// Spawn `command` and read its standard output line by line. Status is
/// checked once all lines are read.
pub fn command_output(command: &[String]) -> Result<OutputLines, Error> {
    Ok(Box::new(process_lines(command)?))
}

fn process_lines(command: &[String]) -> Result<ProcessLines, Error> {
    let description = command.join(" ");
    log::debug!("Spawn {:?}", description);
    let (program, args) = program_and_args(command)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|error| Error::command_failed(&description, error.to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::command_failed(&description, "no stdout"))?;

    Ok(ProcessLines {
        description,
        child,
        lines: Some(BufReader::new(stdout).lines()),
    })
}

/// Execute `command` (or just show it if `dry_run`), failing if its exit status is not 0
pub fn execute_command(command: &[String], dry_run: bool) -> Result<(), Error> {
    let description = command.join(" ");
    log::info!("EXECUTE: {}", description);
    if dry_run {
        return Ok(());
    }

    let (program, args) = program_and_args(command)?;
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|error| Error::command_failed(&description, error.to_string()))?;
    check_process_status(&description, status)
}

pub struct ProcessLines {
    description: String,
    child: Child,
    lines: Option<Lines<BufReader<ChildStdout>>>,
}

impl Iterator for ProcessLines {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        match lines.next() {
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(error)) => {
                // Closed stdout stops the process, then it can be reaped
                self.lines = None;
                if let Err(wait_error) = self.child.wait() {
                    log::error!("Error when wait for {} : {}", self.description, wait_error)
                }
                Some(Err(Error::command_failed(
                    &self.description,
                    format!("read output: {}", error),
                )))
            }
            None => {
                self.lines = None;
                match self.child.wait() {
                    Ok(status) => check_process_status(&self.description, status)
                        .err()
                        .map(Err),
                    Err(error) => Some(Err(Error::Io(error))),
                }
            }
        }
    }
}

impl Drop for ProcessLines {
    fn drop(&mut self) {
        if self.lines.take().is_some() {
            // Output not fully read : closed stdout stops the process
            if let Err(error) = self.child.wait() {
                log::error!("Error when wait for {} : {}", self.description, error)
            }
        }
    }
}
