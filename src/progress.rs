use anyhow::{Result, anyhow};
use tokio::sync::mpsc::UnboundedSender;

/// Receives completion percentages while a run is in progress. Called
/// synchronously from the task that drives the run; errors are logged by the
/// caller and otherwise ignored.
pub trait ProgressSink {
    fn report(&mut self, percent: u8) -> Result<()>;
}

impl<F> ProgressSink for F
where
    F: FnMut(u8),
{
    fn report(&mut self, percent: u8) -> Result<()> {
        self(percent);
        Ok(())
    }
}

/// Forwards progress to another task or thread, e.g. a UI event loop.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: UnboundedSender<u8>,
}

impl ChannelProgress {
    pub fn new(sender: UnboundedSender<u8>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&mut self, percent: u8) -> Result<()> {
        self.sender
            .send(percent)
            .map_err(|_| anyhow!("progress receiver dropped"))
    }
}

/// `floor(100 * done / total)`, clamped to 100. An empty run is complete.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let value = (done.min(total) as u128 * 100) / total as u128;
    value as u8
}
