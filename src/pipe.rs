use std::{
    fs::Permissions,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Error};
use log::{debug, info, warn};
use nix::{
    sys::stat::Mode,
    unistd::{self, Gid, Group, Uid, User},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::unix::pipe,
    time::sleep,
};

/// Pause after a failed or empty read before trying the fifo again
pub const READ_BACKOFF: Duration = Duration::from_millis(100);

/// Who the command fifo belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner {
    pub uid: Uid,
    pub gid: Gid,
}

impl Owner {
    /// The identity of this process
    pub fn current() -> Self {
        Self {
            uid: Uid::current(),
            gid: Gid::current(),
        }
    }

    /// Parse `user:group`. A bare `user` selects that user's primary group.
    pub fn parse(owner: &str) -> Result<Self, Error> {
        let (user_name, group_name) = match owner.split_once(':') {
            Some((user, group)) => (user, Some(group)),
            None => (owner, None),
        };

        let user =
            User::from_name(user_name)?.ok_or_else(|| anyhow!("no such user '{}'", user_name))?;
        let gid = match group_name {
            Some(name) => {
                Group::from_name(name)?
                    .ok_or_else(|| anyhow!("no such group '{}'", name))?
                    .gid
            }
            None => user.gid,
        };

        Ok(Self { uid: user.uid, gid })
    }

    /// The owner named on the command line, or this process if there is none
    /// or it can't be resolved.
    pub fn from_arg(owner: Option<&str>) -> Self {
        match owner.map(Owner::parse) {
            Some(Ok(owner)) => owner,
            Some(Err(e)) => {
                warn!("Invalid owner: {:#}, using the current user instead", e);
                Owner::current()
            }
            None => Owner::current(),
        }
    }
}

/// The read end of the command fifo. Lines written by any number of clients
/// come out of [`CommandPipe::next_line`] one at a time.
pub struct CommandPipe {
    path: PathBuf,
    reader: BufReader<pipe::Receiver>,
    buf: Vec<u8>,
}

impl CommandPipe {
    /// Replace anything at `path` with a fresh fifo owned by `owner`, and
    /// open it for reading.
    pub fn create(path: &Path, mode: u32, owner: Owner) -> Result<Self, Error> {
        if path.symlink_metadata().is_ok() {
            info!("Clearing stale socket at {}", path.display());
            std::fs::remove_file(path)
                .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
        }

        info!("Creating new listener socket {}", path.display());
        unistd::mkfifo(path, Mode::from_bits_truncate(mode as _))
            .with_context(|| format!("failed to create fifo {}", path.display()))?;

        // mkfifo is subject to the umask
        std::fs::set_permissions(path, Permissions::from_mode(mode))?;
        unistd::chown(path, Some(owner.uid), Some(owner.gid)).with_context(|| {
            format!(
                "failed to chown {} to {}:{}",
                path.display(),
                owner.uid,
                owner.gid
            )
        })?;

        Self::open(path)
    }

    /// Open an existing fifo. It is opened read-write so that the last writer
    /// closing its end does not leave us spinning on end-of-file.
    pub fn open(path: &Path) -> Result<Self, Error> {
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(open_receiver(path)?),
            buf: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next non-empty line, trimmed. Read errors are logged and
    /// retried after [`READ_BACKOFF`]; only failing to reopen the fifo is an
    /// error.
    ///
    /// Partially read lines are kept across calls, so dropping this future in
    /// a `select!` loses nothing.
    pub async fn next_line(&mut self) -> Result<String, Error> {
        loop {
            match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(0) => {
                    debug!("End of file on {}, reopening", self.path.display());
                    sleep(READ_BACKOFF).await;
                    self.reader = BufReader::new(open_receiver(&self.path)?);
                }
                Ok(_) if !self.buf.ends_with(b"\n") => {
                    // The rest of the line is still to come
                    continue;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf).trim().to_string();
                    self.buf.clear();
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(line);
                }
                Err(e) => {
                    warn!("Failed to read from {}: {}", self.path.display(), e);
                    self.buf.clear();
                    sleep(READ_BACKOFF).await;
                }
            }
        }
    }

    /// Close the fifo and delete it from the filesystem.
    pub fn remove(self) -> Result<(), Error> {
        info!("Removing socket {}", self.path.display());
        std::fs::remove_file(&self.path)
            .with_context(|| format!("failed to remove {}", self.path.display()))
    }
}

fn open_receiver(path: &Path) -> Result<pipe::Receiver, Error> {
    pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(path)
        .with_context(|| format!("failed to open fifo {}", path.display()))
}

/// Write a single command line to the daemon's fifo. Fails if nobody is
/// listening on it.
pub async fn send_command(path: &Path, command: &str) -> Result<(), Error> {
    let mut sender = pipe::OpenOptions::new()
        .open_sender(path)
        .with_context(|| format!("failed to open socket {}", path.display()))?;

    sender.write_all(format!("{}\n", command.trim()).as_bytes()).await?;
    sender.flush().await?;
    Ok(())
}
