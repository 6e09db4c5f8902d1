use std::io::{self, Write};

/// Sink for the human readable status lines emitted while testing and warming.
pub trait ProgressReporter {
    fn report(&mut self, message: &str) -> io::Result<()>;
}

impl<F> ProgressReporter for F
where
    F: FnMut(&str) -> io::Result<()>,
{
    fn report(&mut self, message: &str) -> io::Result<()> {
        self(message)
    }
}

pub struct StdoutReporter;

impl ProgressReporter for StdoutReporter {
    fn report(&mut self, message: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", message)?;
        out.flush()
    }
}
