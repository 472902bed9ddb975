use std::{
    cell::RefCell,
    fs::File,
    io::{self, Read},
    net::TcpStream,
    path::Path,
};

use hashsync_core::{
    channel::{CommandChannel, OutputLines},
    error::Error,
    utils::{normalised_dir, shell_quote},
};
use ssh2::Session;
use walkdir::WalkDir;

use super::UserAtHost;

pub const SSH_PORT: u16 = 22;
const SCP_FILE_MODE: i32 = 0o644;

/// Execute commands through one SSH session, opened at first use and kept
/// until `close`. Not to be shared between concurrent operations.
pub struct InternalChannel {
    user_at_host: UserAtHost,
    session: RefCell<Option<Session>>,
}

impl InternalChannel {
    pub fn new(user_at_host: UserAtHost) -> Self {
        Self {
            user_at_host,
            session: RefCell::new(None),
        }
    }

    fn session_error(&self, action: &str, error: impl ToString) -> Error {
        Error::command_failed(
            format!("{} ({})", action, self.user_at_host),
            error.to_string(),
        )
    }

    fn open_session(&self) -> Result<Session, Error> {
        log::info!("Opening SSH session to {} ...", self.user_at_host);
        let tcp = TcpStream::connect((self.user_at_host.host(), SSH_PORT))
            .map_err(|error| self.session_error("connect", error))?;
        let mut session = Session::new().map_err(|error| self.session_error("session", error))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|error| self.session_error("handshake", error))?;

        if let Err(error) = session.userauth_agent(self.user_at_host.user()) {
            log::warn!(
                "SSH agent authentication for {} failed ({}), ask for password",
                self.user_at_host,
                error
            );
            let password =
                rpassword::prompt_password(format!("Password for {} ? ", self.user_at_host))?;
            session
                .userauth_password(self.user_at_host.user(), &password)
                .map_err(|error| self.session_error("authenticate", error))?;
        }
        if !session.authenticated() {
            return Err(self.session_error("authenticate", "not authenticated"));
        }

        Ok(session)
    }

    /// Call `f` with the session, opening it if there is not one yet
    fn with_session<T>(&self, f: impl FnOnce(&Session) -> Result<T, Error>) -> Result<T, Error> {
        let mut session = self.session.borrow_mut();
        if session.is_none() {
            *session = Some(self.open_session()?);
        }
        match session.as_ref() {
            Some(session) => f(session),
            None => Err(self.session_error("session", "no session")),
        }
    }

    fn exec(&self, session: &Session, command: &str) -> Result<Vec<String>, Error> {
        let failed = |error: ssh2::Error| Error::command_failed(command, error.to_string());
        let mut channel = session.channel_session().map_err(failed)?;
        channel.exec(command).map_err(failed)?;
        let mut output = String::new();
        channel.read_to_string(&mut output)?;
        let mut error_output = String::new();
        channel.stderr().read_to_string(&mut error_output)?;
        channel.wait_close().map_err(failed)?;

        let exit_status = channel.exit_status().map_err(failed)?;
        if exit_status != 0 {
            return Err(Error::command_failed(
                command,
                failure_status(exit_status, &error_output),
            ));
        }
        Ok(output.lines().map(|line| line.to_string()).collect())
    }

    fn send_file(&self, session: &Session, local_path: &Path, remote_path: &str) -> Result<(), Error> {
        let failed = |error: ssh2::Error| {
            Error::command_failed(
                format!("scp {} {}", local_path.display(), remote_path),
                error.to_string(),
            )
        };
        let mut file = File::open(local_path)?;
        let size = file.metadata()?.len();
        let mut remote_file = session
            .scp_send(Path::new(remote_path), SCP_FILE_MODE, size, None)
            .map_err(failed)?;
        io::copy(&mut file, &mut remote_file)?;
        remote_file.send_eof().map_err(failed)?;
        remote_file.wait_eof().map_err(failed)?;
        remote_file.close().map_err(failed)?;
        remote_file.wait_close().map_err(failed)?;
        Ok(())
    }
}

fn failure_status(exit_status: i32, error_output: &str) -> String {
    let error_output = error_output.trim();
    if error_output.is_empty() {
        format!("exit status = {}", exit_status)
    } else {
        format!("exit status = {}, stderr: {}", exit_status, error_output)
    }
}

fn remote_file_path(local_path: &Path, remote_dir: &str) -> Result<String, Error> {
    let file_name = local_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::InvalidPath(local_path.display().to_string()))?;
    Ok(format!("{}{}", normalised_dir(remote_dir), file_name))
}

impl CommandChannel for InternalChannel {
    fn describe(&self) -> String {
        format!("{} (internal)", self.user_at_host)
    }

    fn run(&self, command: &str, dry_run: bool) -> Result<OutputLines, Error> {
        log::info!("SSH {}: executing {}", self.user_at_host, command);
        if dry_run {
            return Ok(Box::new(std::iter::empty::<Result<String, Error>>()));
        }
        let lines = self.with_session(|session| self.exec(session, command))?;
        Ok(Box::new(lines.into_iter().map(Ok)))
    }

    fn upload_file(&self, local_path: &Path, remote_dir: &str, dry_run: bool) -> Result<(), Error> {
        let remote_path = remote_file_path(local_path, remote_dir)?;
        log::info!(
            "SCP: copy file {} to {}:{}",
            local_path.display(),
            self.user_at_host,
            remote_path
        );
        if dry_run {
            return Ok(());
        }
        self.with_session(|session| self.send_file(session, local_path, &remote_path))
    }

    fn upload_directory(
        &self,
        local_path: &Path,
        remote_dir: &str,
        dry_run: bool,
    ) -> Result<(), Error> {
        let remote_path = remote_file_path(local_path, remote_dir)?;
        log::info!(
            "SCP: copy directory {} to {}:{}",
            local_path.display(),
            self.user_at_host,
            remote_path
        );
        if dry_run {
            return Ok(());
        }

        for entry in WalkDir::new(local_path) {
            let entry = entry.map_err(|error| Error::Io(error.into()))?;
            let relative_path = entry
                .path()
                .strip_prefix(local_path)
                .ok()
                .and_then(|path| path.to_str())
                .ok_or_else(|| Error::InvalidPath(entry.path().display().to_string()))?
                .replace('\\', "/");
            let target_path = if relative_path.is_empty() {
                remote_path.clone()
            } else {
                format!("{}/{}", remote_path, relative_path)
            };

            if entry.file_type().is_dir() {
                let mkdir = format!("mkdir -p {}", shell_quote(&target_path));
                log::debug!("SSH {}: executing {}", self.user_at_host, mkdir);
                self.with_session(|session| self.exec(session, &mkdir))?;
            } else {
                self.with_session(|session| self.send_file(session, entry.path(), &target_path))?;
            }
        }
        Ok(())
    }

    fn close(&self) {
        if let Some(session) = self.session.borrow_mut().take() {
            log::info!("Closing SSH session to {} ...", self.user_at_host);
            if let Err(error) = session.disconnect(None, "", None) {
                log::error!(
                    "Error when closing SSH session to {} : {}",
                    self.user_at_host,
                    error
                )
            }
        }
    }
}

impl Drop for InternalChannel {
    fn drop(&mut self) {
        self.close()
    }
}
