use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;

/// Appends log lines to a file and trims the oldest lines once the file
/// grows past `max_lines`.
#[derive(Clone)]
pub struct BoundedFileWriter {
    path: String,
    max_lines: u32,
    pending: Arc<Mutex<u32>>,
}

impl BoundedFileWriter {
    pub fn new(path: String, max_lines: u32) -> Self {
        Self {
            path,
            max_lines: max_lines.max(1),
            pending: Arc::new(Mutex::new(0)),
        }
    }

    fn trim(&self) -> io::Result<()> {
        if !Path::new(&self.path).exists() {
            return Ok(());
        }

        let lines: Vec<String> = BufReader::new(File::open(&self.path)?)
            .lines()
            .collect::<Result<_, _>>()?;

        let keep = self.max_lines as usize;
        if lines.len() > keep {
            let mut file = File::create(&self.path)?;
            for line in &lines[lines.len() - keep..] {
                writeln!(file, "{line}")?;
            }
        }
        Ok(())
    }
}

impl io::Write for BoundedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(buf)?;

        let mut pending = self.pending.lock();
        *pending += buf.iter().filter(|&&b| b == b'\n').count() as u32;

        // Trimming rewrites the file, so batch it.
        if *pending >= (self.max_lines / 10).max(50) {
            if let Err(e) = self.trim() {
                eprintln!("Failed to trim log file {}: {e}", self.path);
            }
            *pending = 0;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for BoundedFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
