use std::{
    io,
    sync::{Arc, Mutex},
};
use tracing::Subscriber;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Collects formatted log lines in memory.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Subscriber writing the events enabled by `filter` to this capture.
    pub fn subscriber(&self, filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
        let writer = self.clone();
        tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(move || writer.clone())
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter),
        )
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
