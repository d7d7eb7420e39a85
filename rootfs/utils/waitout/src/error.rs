use nix::errno::Errno;

pub type WaitResult<T> = Result<T, WaitError>;

#[derive(thiserror::Error, Debug)]
pub enum WaitError {
    // bad target argument: nothing was touched
    #[error("invalid target path: {}", .0)]
    InvalidTarget(String),

    // couldn't open the notification channel or register the watch
    #[error("{}: {}", .op, .source)]
    Arm { op: &'static str, source: Errno },

    // poll/read/clock failed with something other than EINTR/EAGAIN
    #[error("{}: {}", .op, .source)]
    Io { op: &'static str, source: Errno },
}

impl WaitError {
    pub(crate) fn arm(op: &'static str) -> impl FnOnce(Errno) -> Self {
        move |source| Self::Arm { op, source }
    }

    pub(crate) fn io(op: &'static str) -> impl FnOnce(Errno) -> Self {
        move |source| Self::Io { op, source }
    }
}
