use crate::raster::error::RasterError;
use crate::raster::field::RasterField;
use crate::types::time_bucket::{TimeBucket, TimeSlice};
use chrono::{NaiveDateTime, NaiveTime};
use log::debug;

/// Keeps only the time steps inside `window`.
pub fn slice_time(field: &RasterField, window: &TimeSlice) -> Result<RasterField, RasterError> {
    let layers = field
        .layers()
        .filter(|(time, _)| window.contains(time))
        .map(|(time, layer)| (time, layer.to_vec()))
        .collect();
    RasterField::from_layers(field.grid().clone(), layers)
}

/// Averages time steps per `bucket`, cell by cell.
///
/// `NaN` values are left out of the mean; a cell that is `NaN` at every step of
/// a bucket stays `NaN`. Each output step is stamped with the bucket's label
/// date at midnight.
pub fn resample_mean(field: &RasterField, bucket: TimeBucket) -> Result<RasterField, RasterError> {
    let cells = field.grid().cell_count();
    let mut layers: Vec<(NaiveDateTime, Vec<f32>)> = Vec::new();
    let mut sums = vec![0.0f64; cells];
    let mut counts = vec![0u32; cells];
    let mut current: Option<NaiveDateTime> = None;

    let flush = |label: NaiveDateTime, sums: &mut [f64], counts: &mut [u32]| {
        let layer = sums
            .iter_mut()
            .zip(counts.iter_mut())
            .map(|(sum, count)| {
                let mean = if *count == 0 {
                    f32::NAN
                } else {
                    (*sum / *count as f64) as f32
                };
                *sum = 0.0;
                *count = 0;
                mean
            })
            .collect();
        (label, layer)
    };

    for (time, layer) in field.layers() {
        let label = bucket.label(time).and_time(NaiveTime::MIN);
        if let Some(open) = current.filter(|open| *open != label) {
            layers.push(flush(open, &mut sums, &mut counts));
        }
        current = Some(label);
        for ((sum, count), &value) in sums.iter_mut().zip(counts.iter_mut()).zip(layer) {
            if !value.is_nan() {
                *sum += value as f64;
                *count += 1;
            }
        }
    }
    if let Some(open) = current {
        layers.push(flush(open, &mut sums, &mut counts));
    }

    debug!(
        "Resampled {} time steps into {} {} buckets",
        field.time_len(),
        layers.len(),
        bucket.adjective().to_lowercase()
    );
    RasterField::from_layers(field.grid().clone(), layers)
}
