//! Single-slot completion signal shared by the units of work of a session.
//!
//! The first unit to report decides how the process ends. Later reports are
//! dropped.
use crossbeam_channel as chan;

use crate::Error;

/// Waits for the first report.
pub struct Coordinator {
    sender: chan::Sender<Result<(), Error>>,
    receiver: chan::Receiver<Result<(), Error>>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        let (sender, receiver) = chan::bounded(1);

        Self { sender, receiver }
    }

    /// Handle for one unit of work to report its outcome with.
    pub fn reporter(&self) -> Reporter {
        Reporter {
            sender: Some(self.sender.clone()),
        }
    }

    /// Block until the first outcome is reported.
    pub fn wait(self) -> Result<(), Error> {
        let Self { sender, receiver } = self;
        drop(sender);

        receiver.recv().unwrap_or(Err(Error::Abandoned))
    }
}

/// Reports the outcome of a unit of work, exactly once.
///
/// A reporter dropped without reporting, eg. because its thread panicked,
/// reports [`Error::Abandoned`].
pub struct Reporter {
    sender: Option<chan::Sender<Result<(), Error>>>,
}

impl Reporter {
    pub fn report(mut self, outcome: Result<(), Error>) {
        if let Some(sender) = self.sender.take() {
            Self::send(sender, outcome);
        }
    }

    fn send(sender: chan::Sender<Result<(), Error>>, outcome: Result<(), Error>) {
        if let Err(chan::TrySendError::Full(outcome) | chan::TrySendError::Disconnected(outcome)) =
            sender.try_send(outcome)
        {
            log::debug!(target: "remote-helper", "Dropping late outcome: {outcome:?}");
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            Self::send(sender, Err(Error::Abandoned));
        }
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;

    #[test]
    fn test_first_report_wins() {
        let coordinator = Coordinator::new();
        let first = coordinator.reporter();
        let second = coordinator.reporter();

        first.report(Err(Error::InvalidCommand("bogus".to_owned())));
        second.report(Ok(()));

        assert!(matches!(
            coordinator.wait(),
            Err(Error::InvalidCommand(cmd)) if cmd == "bogus"
        ));
    }

    #[test]
    fn test_success() {
        let coordinator = Coordinator::new();
        let reporter = coordinator.reporter();

        thread::spawn(move || reporter.report(Ok(()))).join().unwrap();

        assert!(coordinator.wait().is_ok());
    }

    #[test]
    fn test_abandoned() {
        let coordinator = Coordinator::new();
        let reporter = coordinator.reporter();

        let result = thread::spawn(move || {
            let _reporter = reporter;
            panic!("protocol loop crashed");
        })
        .join();

        assert!(result.is_err());
        assert!(matches!(coordinator.wait(), Err(Error::Abandoned)));
    }

    #[test]
    fn test_pending_reporter_blocks_until_report() {
        let coordinator = Coordinator::new();
        let idle = coordinator.reporter();
        let worker = coordinator.reporter();

        let handle = thread::spawn(move || worker.report(Ok(())));

        assert!(coordinator.wait().is_ok());
        handle.join().unwrap();
        drop(idle);
    }
}
