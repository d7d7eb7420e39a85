use std::os::fd::AsFd;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

/// Waits for POLLIN on one fd. `None` blocks forever.
/// Ok(false) means the timeout ran out with nothing ready.
pub fn poll_readable<F: AsFd>(fd: &F, timeout_ms: Option<u64>) -> nix::Result<bool> {
    let timeout = match timeout_ms {
        None => PollTimeout::NONE,
        Some(ms) => PollTimeout::try_from(ms).unwrap_or(PollTimeout::MAX),
    };

    let pollfd = PollFd::new(fd.as_fd(), PollFlags::POLLIN);
    let n = poll(&mut [pollfd], timeout)?;
    Ok(n > 0)
}
