use std::{fmt, io};

use crossbeam_channel as chan;
use signals_receipts::channel_notify_facility::{
    self, InstallError, SendError, SignalsChannel as _,
};
use signals_receipts::SignalNumber;

use crate::channel_notify_facility_premade::SignalsChannel;

/// Operating system signal that ends a helper session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signal {
    /// `SIGINT`, eg. the user hit Ctrl-C while git was fetching.
    Interrupt,
    /// `SIGTERM`.
    Terminate,
    /// `SIGHUP`.
    Hangup,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Hangup => f.write_str("SIGHUP"),
        }
    }
}

impl TryFrom<SignalNumber> for Signal {
    type Error = SignalNumber;

    fn try_from(value: SignalNumber) -> Result<Self, Self::Error> {
        match value {
            libc::SIGINT => Ok(Self::Interrupt),
            libc::SIGTERM => Ok(Self::Terminate),
            libc::SIGHUP => Ok(Self::Hangup),
            _ => Err(value),
        }
    }
}

// The signals of interest to handle.
signals_receipts::channel_notify_facility! {
    SIGINT
    SIGTERM
    SIGHUP
}

/// Install global signal handlers, with notifications sent to the given
/// `notify` channel.
pub fn install(notify: chan::Sender<Signal>) -> io::Result<()> {
    #[derive(Debug)]
    struct ChanSender(chan::Sender<Signal>);

    impl channel_notify_facility::Sender for ChanSender {
        fn send(&self, sig_num: SignalNumber) -> Result<(), SendError> {
            match Signal::try_from(sig_num) {
                Ok(sig) => self.0.send(sig).or(Err(SendError::Disconnected)),
                // Only registered signal numbers are delivered here.
                Err(_) => Err(SendError::Ignored),
            }
        }
    }

    SignalsChannel::install_with_outside_channel(ChanSender(notify)).map_err(|e| match e {
        InstallError::AlreadyInstalled { unused_notify: _ } => io::Error::new(
            io::ErrorKind::AlreadyExists,
            "signal handling is already installed",
        ),
        _ => io::Error::other(e), // The error type is non-exhaustive.
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_signal_numbers() {
        assert_eq!(Signal::try_from(libc::SIGINT), Ok(Signal::Interrupt));
        assert_eq!(Signal::try_from(libc::SIGTERM), Ok(Signal::Terminate));
        assert_eq!(Signal::try_from(libc::SIGHUP), Ok(Signal::Hangup));
        assert_eq!(Signal::try_from(libc::SIGWINCH), Err(libc::SIGWINCH));
    }

    #[test]
    fn test_install_twice() {
        let (tx, rx) = chan::unbounded();
        install(tx.clone()).unwrap();

        let err = install(tx).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        drop(rx);
    }
}
