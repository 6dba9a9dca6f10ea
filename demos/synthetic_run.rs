//! Runs the full pipeline on a small synthetic country and prints the tables.
//!
//! Two regions split a 6x4 grid; concentrations rise from west to east and
//! every cell holds 250 people.

use chrono::NaiveDate;
use pm25_exposure::{
    compute_table, write_field, write_surface, AdminLevel, Axis, Crs, DatasetSource,
    ExposureError, GridSpec, PipelineConfig, RasterField, Surface, TimeBucket,
};
use serde_json::json;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    configure_polars_display();
    let dir = tempfile::tempdir()?;

    let grid = GridSpec::new(
        Crs::wgs84(),
        Axis::regular("x", 4.05, 0.1, 6)?,
        Axis::regular("y", 52.35, -0.1, 4)?,
    );
    let day = NaiveDate::from_ymd_opt(2022, 3, 14).unwrap();
    let times = (0..48)
        .map(|h| day.and_hms_opt(0, 0, 0).unwrap() + chrono::Duration::hours(h))
        .collect::<Vec<_>>();
    let values = (0..times.len() * grid.cell_count())
        .map(|i| 4.0 + (i % 6) as f32 * 4.5 + (i / grid.cell_count()) as f32 * 0.1)
        .collect();
    write_field(&RasterField::new(grid.clone(), times, values)?, &dir.path().join("pm.grid"))?;
    write_surface(&Surface::filled(grid, 250.0), &dir.path().join("pop.grid"))?;

    let region = |id: &str, name: &str, x0: f64, x1: f64| {
        json!({
            "type": "Feature",
            "properties": {"NUTS_ID": id, "LEVL_CODE": 3, "NAME_LATN": name},
            "geometry": {"type": "Polygon", "coordinates": [[[x0, 52.0], [x1, 52.0], [x1, 52.4], [x0, 52.4], [x0, 52.0]]]},
        })
    };
    let boundaries = json!({
        "type": "FeatureCollection",
        "features": [region("XX001", "Westmark", 4.0, 4.3), region("XX002", "Oostmark", 4.3, 4.6)],
    });
    std::fs::write(dir.path().join("nuts.geojson"), serde_json::to_vec(&boundaries)?)?;

    for bucket in [TimeBucket::Year, TimeBucket::Day] {
        let config = PipelineConfig::builder()
            .source(DatasetSource::Reanalysis)
            .concentration(dir.path().join("pm.grid"))
            .population(dir.path().join("pop.grid"))
            .boundaries(dir.path().join("nuts.geojson"))
            .output_dir(dir.path().join("out"))
            .level(AdminLevel::FINEST)
            .bucket(bucket)
            .rescale_factor(1.0)
            .build();
        let table = compute_table(&config).map_err(ExposureError::from)?;
        println!("{}:\n{table}", config.output_path().display());
    }
    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
