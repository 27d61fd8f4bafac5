//! Precision normalization of fractional columns

use crate::engine::{ExecutionEngine, PinSet};
use crate::error::Result;
use crate::schema::Schema;

/// Control and target after rounding
#[derive(Debug, Clone)]
pub struct Normalized<D> {
    pub control: D,
    pub target: D,
    /// Columns that were rounded; empty when normalization was a no-op
    pub rounded_columns: Vec<String>,
}

/// Round every fractional column of both datasets to `precision` places.
///
/// Both sides are rounded with the same column list taken from the (already
/// validated) shared schema. Without a precision, or without fractional
/// columns, the inputs pass through untouched.
pub fn normalize<E: ExecutionEngine>(
    engine: &E,
    scope: &mut PinSet<'_, E>,
    control: &E::Dataset,
    target: &E::Dataset,
    schema: &Schema,
    precision: Option<u32>,
) -> Result<Normalized<E::Dataset>> {
    let columns = match precision {
        Some(_) => schema.fractional_columns(),
        None => Vec::new(),
    };

    let precision = match precision {
        Some(p) if !columns.is_empty() => p,
        _ => {
            return Ok(Normalized {
                control: control.clone(),
                target: target.clone(),
                rounded_columns: Vec::new(),
            })
        }
    };

    log::debug!("Rounding {} to {} decimal places", columns.join(", "), precision);
    let control = scope.track(engine.round_columns(control, &columns, precision)?);
    let target = scope.track(engine.round_columns(target, &columns, precision)?);

    Ok(Normalized {
        control,
        target,
        rounded_columns: columns,
    })
}
