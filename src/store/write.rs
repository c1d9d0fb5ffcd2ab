use std::fs::File;
use std::path::Path;

use arrow::ipc::reader::FileReader as IpcFileReader;
use arrow::ipc::writer::{FileWriter as IpcFileWriter, IpcWriteOptions};
use arrow::ipc::CompressionType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use crate::error::{CorpusError, Result};
use crate::store::Frame;

/// Parquet compression codec for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Bulk data: episode/turn partitions, catalogs.
    Zstd,
    /// Secondary indexes, optimized for read speed.
    Snappy,
}

impl Codec {
    fn compression(self) -> Compression {
        match self {
            Codec::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Codec::Snappy => Compression::SNAPPY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Zstd => "zstd",
            Codec::Snappy => "snappy",
        }
    }
}

/// Write a single batch as a parquet file, creating parent directories.
pub fn write_parquet(path: &Path, batch: &RecordBatch, codec: Codec) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let props = WriterProperties::builder()
        .set_compression(codec.compression())
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Concatenate `batch` onto an existing parquet file, or create it.
/// Used by the turn pass, which may flush the same podcast repeatedly.
pub fn append_parquet(path: &Path, batch: &RecordBatch, codec: Codec) -> Result<()> {
    if !path.exists() {
        return write_parquet(path, batch, codec);
    }
    let existing = read_parquet(path)?;
    let schema = existing.schema();
    let props = WriterProperties::builder()
        .set_compression(codec.compression())
        .build();
    let tmp = path.with_extension("parquet.part");
    {
        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(existing.batch())?;
        writer.write(batch)?;
        writer.close()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a whole parquet file into a single in-memory frame.
pub fn read_parquet(path: &Path) -> Result<Frame> {
    let file = File::open(path).map_err(|e| {
        CorpusError::DatasetAccess(format!("cannot open {}: {e}", path.display()))
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, _>>()?;
    Frame::from_batches(schema, &batches)
}

/// Write a frame as an LZ4-compressed Arrow IPC file (catalog cache).
pub fn write_ipc(path: &Path, frame: &Frame) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let options =
        IpcWriteOptions::default().try_with_compression(Some(CompressionType::LZ4_FRAME))?;
    let file = File::create(path)?;
    let mut writer = IpcFileWriter::try_new_with_options(file, &frame.schema(), options)?;
    writer.write(frame.batch())?;
    writer.finish()?;
    Ok(())
}

/// Read an Arrow IPC file back into a frame.
pub fn read_ipc(path: &Path) -> Result<Frame> {
    let file = File::open(path)?;
    let reader = IpcFileReader::try_new(file, None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, _>>()?;
    Frame::from_batches(schema, &batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{turn_text_batch, TurnTextRow};

    fn row(eid: &str, start: f64) -> TurnTextRow {
        TurnTextRow {
            episode_id: eid.to_string(),
            podcast_id: "p1".into(),
            mp3_url: "http://x/1.mp3".into(),
            speaker: vec!["SPEAKER_00".into()],
            turn_text: "hello".into(),
            start_time: start,
            end_time: start + 1.0,
            duration: 1.0,
            turn_count: 0,
            inferred_speaker_role: "host".into(),
            inferred_speaker_name: String::new(),
        }
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.parquet");
        let batch = turn_text_batch(&[row("e1", 0.0), row("e2", 5.0)]).unwrap();
        write_parquet(&path, &batch, Codec::Zstd).unwrap();
        let frame = read_parquet(&path).unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.str_value("episode_id", 1).unwrap(), "e2");
    }

    #[test]
    fn append_concatenates_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.parquet");
        let first = turn_text_batch(&[row("e1", 0.0)]).unwrap();
        let second = turn_text_batch(&[row("e1", 2.0), row("e1", 4.0)]).unwrap();
        append_parquet(&path, &first, Codec::Zstd).unwrap();
        append_parquet(&path, &second, Codec::Zstd).unwrap();
        let frame = read_parquet(&path).unwrap();
        assert_eq!(frame.num_rows(), 3);
    }

    #[test]
    fn ipc_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_cache.arrow");
        let frame = Frame::new(turn_text_batch(&[row("e1", 0.0)]).unwrap());
        write_ipc(&path, &frame).unwrap();
        let back = read_ipc(&path).unwrap();
        assert_eq!(back.num_rows(), 1);
        assert_eq!(back.str_value("turn_text", 0).unwrap(), "hello");
    }
}
