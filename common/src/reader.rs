use crate::{
    distribution::ChunkDescriptor,
    record::{parse_row, Dialect, FieldLimits, Record},
    Result,
};
use eyre::{eyre, WrapErr};
use log::{debug, warn};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    mem,
    path::{Path, PathBuf},
};

#[derive(Debug, Default)]
pub struct Chunk {
    pub records: Vec<Record>,
    pub malformed: u64,
    pub truncated: u64,
}

impl Chunk {
    pub fn actual_count(&self) -> usize {
        self.records.len()
    }

    /// Logical rows consumed, malformed ones included.
    pub fn rows(&self) -> u64 {
        self.records.len() as u64 + self.malformed
    }
}

/// Splits a byte stream into logical rows. A quoted-comma row keeps going
/// across line breaks while a quote is open.
struct Rows<R> {
    inner: R,
    dialect: Dialect,
    buf: Vec<u8>,
}

impl<R: BufRead> Rows<R> {
    fn new(inner: R, dialect: Dialect) -> Self {
        Self {
            inner,
            dialect,
            buf: Vec::new(),
        }
    }

    fn next_row(&mut self) -> io::Result<Option<String>> {
        let mut row = String::new();
        let mut quotes = Quotes::default();
        loop {
            self.buf.clear();
            if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(if row.is_empty() { None } else { Some(row) });
            }

            let line = String::from_utf8_lossy(&self.buf);
            if self.dialect == Dialect::QuotedComma {
                quotes.scan(&line);
            }
            row.push_str(&line);

            if !quotes.open {
                return Ok(Some(row));
            }
        }
    }
}

/// Quote state of a quoted-comma row across its physical lines. A quote only
/// opens at the start of a field; anywhere else it is a literal character.
/// Commas after the third separator belong to the lyrics.
#[derive(Debug, Default)]
struct Quotes {
    open: bool,
    just_closed: bool,
    in_field: bool,
    separators: u8,
}

impl Quotes {
    fn scan(&mut self, line: &str) {
        for c in line.chars() {
            let just_closed = mem::take(&mut self.just_closed);
            match c {
                '"' if self.open => {
                    self.open = false;
                    self.just_closed = true;
                }
                // `""` escape
                '"' if just_closed => self.open = true,
                '"' if !self.in_field => {
                    self.open = true;
                    self.in_field = true;
                }
                ',' if !self.open && self.separators < 3 => {
                    self.separators += 1;
                    self.in_field = false;
                }
                ' ' | '\t' => {}
                _ if !self.open => self.in_field = true,
                _ => {}
            }
        }
    }
}

/// Reads arbitrary-offset slices of the dataset. The header row is skipped
/// once on open; row indices count data rows only.
pub struct ChunkReader {
    path: PathBuf,
    dialect: Dialect,
    limits: FieldLimits,
    rows: Rows<BufReader<File>>,
    position: u64,
}

impl ChunkReader {
    pub fn open(path: impl AsRef<Path>, dialect: Dialect) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows = Self::open_rows(&path, dialect)?;
        Ok(Self {
            path,
            dialect,
            limits: FieldLimits::default(),
            rows,
            position: 0,
        })
    }

    pub fn with_limits(mut self, limits: FieldLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_rows(path: &Path, dialect: Dialect) -> Result<Rows<BufReader<File>>> {
        let file = File::open(path)
            .wrap_err_with(|| format!("cannot open dataset {}", path.display()))?;
        let mut rows = Rows::new(BufReader::new(file), dialect);
        let header = rows
            .next_row()
            .wrap_err_with(|| format!("cannot read header of {}", path.display()))?;
        match header {
            Some(_) => Ok(rows),
            None => Err(eyre!("dataset {} is empty, no header line", path.display())),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.rows = Self::open_rows(&self.path, self.dialect)?;
        self.position = 0;
        Ok(())
    }

    fn next_row(&mut self) -> Result<Option<String>> {
        let row = self
            .rows
            .next_row()
            .wrap_err_with(|| format!("failed reading {} at row {}", self.path.display(), self.position))?;
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    /// Reads up to `chunk.count` rows starting at data row `chunk.start`.
    /// Malformed rows are consumed but not returned.
    pub fn read_chunk(&mut self, chunk: ChunkDescriptor) -> Result<Chunk> {
        if chunk.start < self.position {
            self.rewind()?;
        }
        while self.position < chunk.start {
            if self.next_row()?.is_none() {
                return Ok(Chunk::default());
            }
        }

        let mut out = Chunk::default();
        for _ in 0..chunk.count {
            let index = self.position;
            let row = match self.next_row()? {
                Some(row) => row,
                None => break,
            };
            match parse_row(&row, self.dialect) {
                Some(mut record) => {
                    if self.limits.apply(&mut record) {
                        debug!("row {} of {} truncated", index, self.path.display());
                        out.truncated += 1;
                    }
                    out.records.push(record);
                }
                None => out.malformed += 1,
            }
        }

        if out.malformed > 0 {
            warn!(
                "skipped {} malformed rows in {} [{}, {})",
                out.malformed,
                self.path.display(),
                chunk.start,
                chunk.end()
            );
        }
        Ok(out)
    }

    pub fn count_records(&mut self) -> Result<u64> {
        self.rewind()?;
        while self.next_row()?.is_some() {}
        Ok(self.position)
    }
}
