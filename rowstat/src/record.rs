use crate::datum::Datum;
use crate::error::Result;

const DEFAULT_CHUNK_ROWS: usize = 1024;

/// A batch of rows pulled from a record source.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    rows: Vec<Vec<Datum>>,
}

impl Chunk {
    pub fn with_capacity(rows: usize) -> Self {
        Chunk {
            rows: Vec::with_capacity(rows),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Datum>] {
        &self.rows
    }

    pub fn push_row(&mut self, row: Vec<Datum>) {
        self.rows.push(row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Pull-based row source the collector drains chunk by chunk.
///
/// `next` refills the chunk; an empty chunk signals end of stream. Read
/// failures surface as [`crate::Error::SampleRead`].
pub trait RecordSet {
    fn next(&mut self, chunk: &mut Chunk) -> Result<()>;

    fn num_fields(&self) -> usize;

    fn new_chunk(&self) -> Chunk {
        Chunk::with_capacity(DEFAULT_CHUNK_ROWS)
    }
}

/// In-memory record set over pre-materialized rows.
#[derive(Debug, Clone)]
pub struct VecRecordSet {
    rows: Vec<Vec<Datum>>,
    num_fields: usize,
    pos: usize,
    chunk_rows: usize,
}

impl VecRecordSet {
    pub fn new(rows: Vec<Vec<Datum>>, num_fields: usize) -> Self {
        VecRecordSet {
            rows,
            num_fields,
            pos: 0,
            chunk_rows: DEFAULT_CHUNK_ROWS,
        }
    }

    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }
}

impl RecordSet for VecRecordSet {
    fn next(&mut self, chunk: &mut Chunk) -> Result<()> {
        chunk.clear();
        let end = (self.pos + self.chunk_rows).min(self.rows.len());
        for row in &self.rows[self.pos..end] {
            chunk.push_row(row.clone());
        }
        self.pos = end;
        Ok(())
    }

    fn num_fields(&self) -> usize {
        self.num_fields
    }
}
