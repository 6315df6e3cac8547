use std::io::{self, Write};
use std::sync::Arc;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Collects one formatted event and writes it out on drop, with every line
/// prefixed by the instance tag. The whole event goes out in a single
/// `write_all`, so events from concurrent tasks never interleave mid-line.
pub struct InstanceTagWriter<W: Write> {
    inner: W,
    tag: Arc<[u8]>,
    event: Vec<u8>,
}

impl<W: Write> InstanceTagWriter<W> {
    fn new(inner: W, tag: Arc<[u8]>) -> Self {
        Self {
            inner,
            tag,
            event: Vec::new(),
        }
    }

    fn write_tagged(&mut self) -> io::Result<()> {
        let lines = self.event.split_inclusive(|&b| b == b'\n');
        let mut out = Vec::with_capacity(self.event.len() + self.tag.len() * 2);
        for line in lines {
            out.extend_from_slice(&self.tag);
            out.extend_from_slice(line);
        }
        self.event.clear();
        self.inner.write_all(&out)?;
        self.inner.flush()
    }
}

impl<W: Write> Write for InstanceTagWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.event.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.event.is_empty() {
            return self.inner.flush();
        }
        self.write_tagged()
    }
}

impl<W: Write> Drop for InstanceTagWriter<W> {
    fn drop(&mut self) {
        if !self.event.is_empty() {
            // A failed log write has nowhere left to be reported.
            drop(self.write_tagged());
        }
    }
}

/// Hands out an [`InstanceTagWriter`] per event, tagged with
/// ` service=<slug> instance=<id> ` so lines from every fleet member can be
/// told apart once they are aggregated.
pub struct InstanceTagMakeWriter {
    tag: Arc<[u8]>,
}

impl InstanceTagMakeWriter {
    pub fn new(service: &str, instance_id: &str) -> Self {
        Self {
            tag: format!(" service={service} instance={instance_id} ")
                .into_bytes()
                .into(),
        }
    }
}

impl<'a> MakeWriter<'a> for InstanceTagMakeWriter {
    type Writer = InstanceTagWriter<io::Stdout>;

    fn make_writer(&'a self) -> Self::Writer {
        InstanceTagWriter::new(io::stdout(), self.tag.clone())
    }
}

/// stdout logging, level configured by the RUST_LOG envvar (default=INFO).
pub fn init(service: &str, instance_id: &str) -> Result<(), TryInitError> {
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(InstanceTagMakeWriter::new(service, instance_id))
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        );

    tracing_subscriber::registry().with(log_layer).try_init()
}
