//! Streaming encode/decode of [`Record`]s and [`StoreUpdate`]s to and from
//! the filesystem. The encoding itself is opaque — any self-delimiting
//! scheme round-trips exactly — so this uses `bincode` over
//! `serde`-derived types, each value length-framed implicitly by
//! bincode's own encoding of the `Vec<u8>` fields.
//!
//! Readers are plain iterators over an open file handle; `std::fs::File`
//! closes its descriptor on `Drop`, so a lazy sequence that is abandoned
//! partway through (the consumer stops pulling, or the iterator itself is
//! dropped) still releases the handle without any extra bookkeeping.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::record::{Record, StoreUpdate};

/// Writes the full set of records for a snapshot file in one pass.
pub fn write_all_records(path: &Path, records: impl Iterator<Item = Record>) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for record in records {
        bincode::serialize_into(&mut writer, &record).map_err(bincode_to_io)?;
    }

    writer.flush()
}

/// An open handle onto a delta file, used by [`crate::session::UpdateSession`]
/// to append one event at a time as mutations are staged.
pub struct EventWriter {
    writer: BufWriter<File>,
}

impl EventWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_event(&mut self, event: &StoreUpdate) -> io::Result<()> {
        bincode::serialize_into(&mut self.writer, event).map_err(bincode_to_io)
    }

    /// Flushes and closes the underlying file, surfacing any error instead
    /// of swallowing it on drop.
    pub fn finish(mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// A lazy sequence of [`Record`]s read from a snapshot file in file order.
pub struct RecordReader {
    reader: BufReader<File>,
    done: bool,
}

impl RecordReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            done: false,
        })
    }
}

impl Iterator for RecordReader {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        next_value(&mut self.reader, &mut self.done)
    }
}

/// A lazy sequence of [`StoreUpdate`]s read from a delta file in file order.
pub struct EventReader {
    reader: BufReader<File>,
    done: bool,
}

impl EventReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            done: false,
        })
    }
}

impl Iterator for EventReader {
    type Item = io::Result<StoreUpdate>;

    fn next(&mut self) -> Option<Self::Item> {
        next_value(&mut self.reader, &mut self.done)
    }
}

fn next_value<T>(reader: &mut BufReader<File>, done: &mut bool) -> Option<io::Result<T>>
where
    T: serde::de::DeserializeOwned,
{
    if *done {
        return None;
    }

    match bincode::deserialize_from(reader) {
        Ok(value) => Some(Ok(value)),
        Err(err) => {
            *done = true;
            match *err {
                bincode::ErrorKind::Io(ref io_err)
                    if io_err.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    None
                }
                _ => Some(Err(bincode_to_io(err))),
            }
        }
    }
}

fn bincode_to_io(err: Box<bincode::ErrorKind>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn snapshot_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let records = vec![
            Record::new(b"a".to_vec(), b"1".to_vec()),
            Record::new(b"b".to_vec(), b"2".to_vec()),
        ];

        write_all_records(file.path(), records.clone().into_iter()).unwrap();

        let read_back: Vec<Record> = RecordReader::open(file.path())
            .unwrap()
            .collect::<io::Result<_>>()
            .unwrap();

        assert_eq!(read_back, records);
    }

    #[test]
    fn empty_snapshot_round_trips_to_nothing() {
        let file = NamedTempFile::new().unwrap();
        write_all_records(file.path(), std::iter::empty()).unwrap();
        let read_back: Vec<Record> = RecordReader::open(file.path())
            .unwrap()
            .collect::<io::Result<_>>()
            .unwrap();
        assert!(read_back.is_empty());
    }

    #[test]
    fn delta_event_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventWriter::create(file.path()).unwrap();
        writer
            .write_event(&StoreUpdate::ValueUpdated {
                key: b"a".to_vec(),
                value: b"1".to_vec(),
            })
            .unwrap();
        writer
            .write_event(&StoreUpdate::KeyRemoved { key: b"b".to_vec() })
            .unwrap();
        writer.finish().unwrap();

        let events: Vec<StoreUpdate> = EventReader::open(file.path())
            .unwrap()
            .collect::<io::Result<_>>()
            .unwrap();

        assert_eq!(
            events,
            vec![
                StoreUpdate::ValueUpdated {
                    key: b"a".to_vec(),
                    value: b"1".to_vec()
                },
                StoreUpdate::KeyRemoved { key: b"b".to_vec() },
            ]
        );
    }
}
