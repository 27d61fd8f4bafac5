//! Set and duplicate-aware reconciliation
//!
//! Both reconcilers reduce to the same primitive: subtract each side from
//! the other and count what is left. The duplicate-aware variant first
//! collapses each side into (row, multiplicity) pairs.

use crate::engine::{ExecutionEngine, PinSet, RowPreview, Subtraction};
use crate::error::{CompareError, Result};
use serde::{Deserialize, Serialize};

/// Which representation the winning subtraction compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtractStrategy {
    /// Columns compared with their native types
    Typed,
    /// Every column cast to text first
    TextFallback,
}

/// Rows present on only one side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetDiff {
    /// Rows in target absent from control
    pub new_row_count: u64,
    /// Rows in control absent from target
    pub missing_row_count: u64,
    pub new_rows: RowPreview,
    pub missing_rows: RowPreview,
}

impl SetDiff {
    pub fn changed_rows(&self) -> u64 {
        self.new_row_count + self.missing_row_count
    }

    pub fn is_empty(&self) -> bool {
        self.changed_rows() == 0
    }
}

/// Output of the set reconciler
#[derive(Debug, Clone)]
pub struct Reconciled<D> {
    pub strategy: SubtractStrategy,
    /// Control as compared by the winning strategy
    pub control: D,
    /// Target as compared by the winning strategy
    pub target: D,
    pub diff: SetDiff,
}

/// Multiplicity differences found when raw row counts disagree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateDiff {
    /// Name of the appended per-row count column
    pub count_column: String,
    /// (row, count) pairs in target absent from control
    pub new_row_count: u64,
    /// (row, count) pairs in control absent from target
    pub missing_row_count: u64,
    pub new_rows: RowPreview,
    pub missing_rows: RowPreview,
}

impl DuplicateDiff {
    pub fn changed_rows(&self) -> u64 {
        self.new_row_count + self.missing_row_count
    }
}

/// `changed > tolerance * control_count`, evaluated against the control count only
pub fn exceeds_tolerance(changed: u64, control_count: u64, tolerance: f64) -> bool {
    changed as f64 > tolerance * control_count as f64
}

/// Compute `control - target` and `target - control`, degrading to text on unsupported schemas
pub fn reconcile_sets<E: ExecutionEngine>(
    engine: &E,
    scope: &mut PinSet<'_, E>,
    control: &E::Dataset,
    target: &E::Dataset,
    preview_rows: usize,
) -> Result<Reconciled<E::Dataset>> {
    let typed_reason = match subtract_both(engine, scope, control, target)? {
        Subtraction::Supported((missing, new)) => {
            let diff = measure(engine, &missing, &new, preview_rows)?;
            return Ok(Reconciled {
                strategy: SubtractStrategy::Typed,
                control: control.clone(),
                target: target.clone(),
                diff,
            });
        }
        Subtraction::Unsupported { reason } => reason,
    };

    log::warn!("Converting all columns to strings: {}", typed_reason);
    let fallback = |e: CompareError| CompareError::UnsupportedSubtraction {
        typed: typed_reason.clone(),
        fallback: e.to_string(),
    };

    let control_text = scope.track(engine.cast_to_text(control).map_err(fallback)?);
    let target_text = scope.track(engine.cast_to_text(target).map_err(fallback)?);
    let control_text = scope.pin(&control_text).map_err(fallback)?;
    let target_text = scope.pin(&target_text).map_err(fallback)?;

    match subtract_both(engine, scope, &control_text, &target_text).map_err(fallback)? {
        Subtraction::Supported((missing, new)) => {
            let diff = measure(engine, &missing, &new, preview_rows)?;
            Ok(Reconciled {
                strategy: SubtractStrategy::TextFallback,
                control: control_text,
                target: target_text,
                diff,
            })
        }
        Subtraction::Unsupported { reason } => Err(CompareError::UnsupportedSubtraction {
            typed: typed_reason,
            fallback: reason,
        }),
    }
}

/// Re-run the subtraction over (row, count) pairs to expose multiplicity differences
pub fn reconcile_duplicates<E: ExecutionEngine>(
    engine: &E,
    scope: &mut PinSet<'_, E>,
    control: &E::Dataset,
    target: &E::Dataset,
    preview_rows: usize,
) -> Result<DuplicateDiff> {
    grouped_diff(engine, scope, control, target, preview_rows)
        .map_err(CompareError::grouping_unsupported)
}

fn grouped_diff<E: ExecutionEngine>(
    engine: &E,
    scope: &mut PinSet<'_, E>,
    control: &E::Dataset,
    target: &E::Dataset,
    preview_rows: usize,
) -> Result<DuplicateDiff> {
    let counted_control = scope.track(engine.group_count(control)?);
    let counted_target = scope.track(engine.group_count(target)?);
    let counted_control = scope.pin(&counted_control)?;
    let counted_target = scope.pin(&counted_target)?;

    let count_column = engine
        .schema(&counted_control)?
        .columns
        .last()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| crate::COUNT_COLUMN.to_string());

    let (missing, new) = match subtract_both(engine, scope, &counted_control, &counted_target)? {
        Subtraction::Supported(pair) => pair,
        Subtraction::Unsupported { reason } => return Err(CompareError::engine(reason)),
    };
    let diff = measure(engine, &missing, &new, preview_rows)?;

    Ok(DuplicateDiff {
        count_column,
        new_row_count: diff.new_row_count,
        missing_row_count: diff.missing_row_count,
        new_rows: diff.new_rows,
        missing_rows: diff.missing_rows,
    })
}

/// Returns `(control - target, target - control)`
fn subtract_both<E: ExecutionEngine>(
    engine: &E,
    scope: &mut PinSet<'_, E>,
    control: &E::Dataset,
    target: &E::Dataset,
) -> Result<Subtraction<(E::Dataset, E::Dataset)>> {
    let missing = match engine.subtract(control, target)? {
        Subtraction::Supported(d) => scope.track(d),
        Subtraction::Unsupported { reason } => return Ok(Subtraction::Unsupported { reason }),
    };
    let new = match engine.subtract(target, control)? {
        Subtraction::Supported(d) => scope.track(d),
        Subtraction::Unsupported { reason } => return Ok(Subtraction::Unsupported { reason }),
    };
    Ok(Subtraction::Supported((missing, new)))
}

fn measure<E: ExecutionEngine>(
    engine: &E,
    missing: &E::Dataset,
    new: &E::Dataset,
    preview_rows: usize,
) -> Result<SetDiff> {
    let new_row_count = engine.count(new)?;
    let new_rows = if new_row_count > 0 {
        log::info!("Found {} rows that were not in the control", new_row_count);
        engine.preview(new, preview_rows)?
    } else {
        RowPreview::default()
    };

    let missing_row_count = engine.count(missing)?;
    let missing_rows = if missing_row_count > 0 {
        log::info!("Found {} rows missing from the target", missing_row_count);
        engine.preview(missing, preview_rows)?
    } else {
        RowPreview::default()
    };
    log::debug!("New rows: {:?}", new_rows.rows);
    log::debug!("Missing rows: {:?}", missing_rows.rows);

    Ok(SetDiff {
        new_row_count,
        missing_row_count,
        new_rows,
        missing_rows,
    })
}
