use crate::pipeline::config::OutputFormat;
use crate::pipeline::error::PipelineError;
use crate::utils::{ensure_dir_exists, parent_dir, write_atomically};
use log::info;
use polars::prelude::*;
use std::path::Path;

/// Encodes `frame` and moves it into place at `path` in one rename, so
/// readers never see a partially written table.
pub fn write_table(
    frame: &mut DataFrame,
    path: &Path,
    format: OutputFormat,
) -> Result<(), PipelineError> {
    let dir = parent_dir(path);
    ensure_dir_exists(dir).map_err(|e| PipelineError::OutputDirCreation(dir.to_path_buf(), e))?;

    let mut buffer: Vec<u8> = Vec::new();
    match format {
        OutputFormat::Csv => CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(frame),
        OutputFormat::Parquet => ParquetWriter::new(&mut buffer)
            .with_compression(ParquetCompression::Snappy)
            .finish(frame)
            .map(|_| ()),
    }
    .map_err(|e| PipelineError::OutputWritePolars(path.to_path_buf(), e))?;

    write_atomically(path, &buffer)
        .map_err(|e| PipelineError::OutputWriteIo(path.to_path_buf(), e))?;
    info!(
        "Wrote {} rows x {} columns to {}",
        frame.height(),
        frame.width(),
        path.display()
    );
    Ok(())
}
