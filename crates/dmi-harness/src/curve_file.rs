//! Bandwidth-vs-ratio tables recorded by sweeping static interleave ratios.
//!
//! The file is CSV with a header row. The ratio column is `DRAM Ratio`
//! (integer percent of data in local DRAM); the bandwidth column defaults to
//! `BW` and can be overridden for sweeps that record several metrics.

use std::io::Read;
use std::path::Path;

use dmi_core::{BandwidthCurve, DmiError, MAX_RATIO};

use crate::error::HarnessError;
use crate::fixtures::CurveFixture;

pub const RATIO_COLUMN: &str = "DRAM Ratio";
pub const DEFAULT_BANDWIDTH_COLUMN: &str = "BW";

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, HarnessError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| HarnessError::MissingColumn(name.to_string()))
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    row: usize,
    column: &str,
) -> Result<&'r str, HarnessError> {
    record.get(idx).ok_or_else(|| HarnessError::InvalidField {
        row,
        column: column.to_string(),
        value: String::new(),
    })
}

/// Build a curve from CSV data.
pub fn curve_from_reader<R: Read>(
    reader: R,
    bandwidth_column: &str,
) -> Result<BandwidthCurve, HarnessError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let ratio_idx = column_index(&headers, RATIO_COLUMN)?;
    let bw_idx = column_index(&headers, bandwidth_column)?;

    let mut points = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Row numbers count the header as row 1.
        let row = i + 2;
        let raw_ratio = field(&record, ratio_idx, row, RATIO_COLUMN)?;
        let ratio: u32 = raw_ratio.parse().map_err(|_| HarnessError::InvalidField {
            row,
            column: RATIO_COLUMN.to_string(),
            value: raw_ratio.to_string(),
        })?;
        let ratio = u8::try_from(ratio)
            .ok()
            .filter(|r| *r <= MAX_RATIO)
            .ok_or(DmiError::RatioOutOfRange {
                ratio,
                min: 0,
                max: MAX_RATIO,
            })?;

        let raw_bw = field(&record, bw_idx, row, bandwidth_column)?;
        let bw: f64 = raw_bw.parse().map_err(|_| HarnessError::InvalidField {
            row,
            column: bandwidth_column.to_string(),
            value: raw_bw.to_string(),
        })?;

        points.push((ratio, bw));
    }

    Ok(BandwidthCurve::from_points(points)?)
}

/// Load a curve file.
pub fn load_curve(path: &Path, bandwidth_column: &str) -> Result<BandwidthCurve, HarnessError> {
    let file = std::fs::File::open(path)?;
    curve_from_reader(std::io::BufReader::new(file), bandwidth_column)
}

/// Load a curve from either a CSV table or a JSON curve fixture, picked by
/// file extension.
pub fn load_curve_any(path: &Path, bandwidth_column: &str) -> Result<BandwidthCurve, HarnessError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        return load_curve(path, bandwidth_column);
    }
    let content = std::fs::read_to_string(path)?;
    let fixture = CurveFixture::from_json(&content)?;
    Ok(fixture.to_curve()?)
}
