//! Storage - report sinks for qualified candidates
//!
//! `CsvSink` writes a delimited file in a fixed column order; `SqliteSink`
//! keeps one row per candidate per run, tagged with a run id and the
//! caller's label/ASN/city metadata.

mod csv_sink;
mod sqlite;

pub use csv_sink::{csv_row, write_records, CsvSink, CSV_HEADER};
pub use sqlite::{RunMetadata, SqliteSink};
