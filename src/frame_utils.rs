//! # frame_utils
//!
//! DataFrame utilities.

use ndarray::Array2;
use polars::prelude::{DataFrame, DataType, Float32Type, IndexOrder, Series};

use crate::error::{EvalError, Result};

/// Look up a column by name.
pub fn get_column<'a>(frame: &'a DataFrame, column_name: &str) -> Result<&'a Series> {
    frame
        .column(column_name)
        .map_err(|_| EvalError::MissingColumn(column_name.to_string()))
}

/// Check whether a column is present.
pub fn has_column(frame: &DataFrame, column_name: &str) -> bool {
    frame.get_column_names().contains(&column_name)
}

/// Cast a column to `dtype`. Values that cannot be converted are an error.
fn cast_column(series: &Series, dtype: &DataType) -> Result<Series> {
    series.strict_cast(dtype).map_err(|source| EvalError::ColumnType {
        column: series.name().to_string(),
        source,
    })
}

/// Cast a column to `dtype`, rejecting null values.
fn cast_required_column(frame: &DataFrame, column_name: &str, dtype: &DataType) -> Result<Series> {
    let series = cast_column(get_column(frame, column_name)?, dtype)?;
    if series.null_count() > 0 {
        return Err(EvalError::NullValue(column_name.to_string()));
    }
    Ok(series)
}

/// Extract an `f32` column.
pub fn extract_f32_column(frame: &DataFrame, column_name: &str) -> Result<Vec<f32>> {
    let series = cast_required_column(frame, column_name, &DataType::Float32)?;
    Ok(series.f32()?.into_no_null_iter().collect())
}

/// Extract a `u64` column.
pub fn extract_u64_column(frame: &DataFrame, column_name: &str) -> Result<Vec<u64>> {
    let series = cast_required_column(frame, column_name, &DataType::UInt64)?;
    Ok(series.u64()?.into_no_null_iter().collect())
}

/// Extract a string column.
pub fn extract_utf8_column(frame: &DataFrame, column_name: &str) -> Result<Vec<String>> {
    let series = cast_required_column(frame, column_name, &DataType::Utf8)?;
    Ok(series
        .utf8()?
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect())
}

/// Extract a boolean column. A missing column yields `default` for every row.
pub fn extract_bool_column_or(
    frame: &DataFrame,
    column_name: &str,
    default: bool,
) -> Result<Vec<bool>> {
    if !has_column(frame, column_name) {
        return Ok(vec![default; frame.height()]);
    }
    let series = cast_required_column(frame, column_name, &DataType::Boolean)?;
    Ok(series.bool()?.into_no_null_iter().collect())
}

/// Extract a nullable `u64` column. A missing column yields `None` for every row.
pub fn extract_optional_u64_column(
    frame: &DataFrame,
    column_name: &str,
) -> Result<Vec<Option<u64>>> {
    if !has_column(frame, column_name) {
        return Ok(vec![None; frame.height()]);
    }
    let series = cast_column(get_column(frame, column_name)?, &DataType::UInt64)?;
    Ok(series.u64()?.into_iter().collect())
}

/// Extract a nullable string column. A missing column yields `None` for every row.
pub fn extract_optional_utf8_column(
    frame: &DataFrame,
    column_name: &str,
) -> Result<Vec<Option<String>>> {
    if !has_column(frame, column_name) {
        return Ok(vec![None; frame.height()]);
    }
    let series = cast_column(get_column(frame, column_name)?, &DataType::Utf8)?;
    Ok(series
        .utf8()?
        .into_iter()
        .map(|s| s.map(|s| s.to_string()))
        .collect())
}

/// Convert the selected columns to an (N,K) `f32` matrix.
pub fn convert_columns_to_nd(frame: &DataFrame, column_names: &[&str]) -> Result<Array2<f32>> {
    for column_name in column_names {
        cast_required_column(frame, column_name, &DataType::Float32)?;
    }
    Ok(frame
        .select(column_names.iter().copied())?
        .to_ndarray::<Float32Type>(IndexOrder::C)?
        .as_standard_layout()
        .to_owned())
}
