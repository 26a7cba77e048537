//! Reading and writing sorted run files, plain or gzip.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::cell::Cell;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::{Count, RunFormat};

use super::record::format_record;

thread_local! {
    static OPEN_READERS: Cell<usize> = const { Cell::new(0) };
}

/// Line reader over one run file. Format is chosen from the file extension.
pub struct RunReader {
    inner: Box<dyn BufRead + Send>,
    path: PathBuf,
    line_no: usize,
    buf: String,
}

impl RunReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open run file {}", path.display()))?;
        let inner: Box<dyn BufRead + Send> = match RunFormat::for_path(path) {
            RunFormat::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
            RunFormat::Text => Box::new(BufReader::new(file)),
        };
        OPEN_READERS.with(|n| n.set(n.get() + 1));
        Ok(Self {
            inner,
            path: path.to_path_buf(),
            line_no: 0,
            buf: String::new(),
        })
    }

    /// Run readers currently open on the calling thread.
    pub fn open_on_thread() -> usize {
        OPEN_READERS.with(|n| n.get())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1-based number of the line last returned.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Next non-empty line without its terminator, or `None` at end of file.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let n = self
                .inner
                .read_line(&mut self.buf)
                .with_context(|| format!("read run file {}", self.path.display()))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }
}

impl Drop for RunReader {
    fn drop(&mut self) {
        OPEN_READERS.with(|n| n.set(n.get().saturating_sub(1)));
    }
}

enum Sink {
    Text(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

/// Writer for one run file. Call [`Self::finish`] to flush (and close the gzip stream).
pub struct RunWriter {
    sink: Sink,
    path: PathBuf,
    records: u64,
}

impl RunWriter {
    pub fn create(path: &Path, format: RunFormat) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("create run file {}", path.display()))?;
        let out = BufWriter::new(file);
        let sink = match format {
            RunFormat::Text => Sink::Text(out),
            RunFormat::Gzip => Sink::Gzip(GzEncoder::new(out, Compression::default())),
        };
        Ok(Self {
            sink,
            path: path.to_path_buf(),
            records: 0,
        })
    }

    pub fn write_record(&mut self, key: &str, count: Count) -> Result<()> {
        let line = format_record(key, count);
        let w: &mut dyn Write = match &mut self.sink {
            Sink::Text(w) => w,
            Sink::Gzip(w) => w,
        };
        writeln!(w, "{}", line).with_context(|| format!("write {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<u64> {
        let flushed = match self.sink {
            Sink::Text(mut w) => w.flush(),
            Sink::Gzip(enc) => enc.finish().and_then(|mut w| w.flush()),
        };
        flushed.with_context(|| format!("flush run file {}", self.path.display()))?;
        Ok(self.records)
    }
}

/// Write `(key, count)` pairs, which must already be sorted by key, as one run file.
pub fn write_sorted_run<'a, I>(path: &Path, format: RunFormat, records: I) -> Result<u64>
where
    I: IntoIterator<Item = (&'a str, Count)>,
{
    let mut writer = RunWriter::create(path, format)?;
    for (key, count) in records {
        writer.write_record(key, count)?;
    }
    writer.finish()
}

/// Read every record of a run file (tests and small files only).
pub fn read_run(path: &Path) -> Result<Vec<(String, Count)>> {
    let mut reader = RunReader::open(path)?;
    let mut out = Vec::new();
    while let Some(line) = reader.next_line()? {
        let (key, count) = super::record::parse_record(&line, path, reader.line_no())?;
        out.push((key.to_string(), count));
    }
    Ok(out)
}
