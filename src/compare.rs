//! Comparison pipeline: schema check, normalization, set diff, count reconciliation

use crate::config::ComparisonConfig;
use crate::engine::{DatasetLoader, ExecutionEngine, PinSet, RowPreview};
use crate::error::{CompareError, Result};
use crate::normalize::normalize;
use crate::progress::StageObserver;
use crate::reconcile::{
    exceeds_tolerance, reconcile_duplicates, reconcile_sets, DuplicateDiff, SubtractStrategy,
};
use crate::schema::validate_schemas;
use crate::source::TablePair;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps of a single comparison, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SchemaCheck,
    Normalize,
    SetDiff,
    CountCheck,
    DuplicateReconcile,
}

impl Stage {
    pub fn description(&self) -> &'static str {
        match self {
            Self::SchemaCheck => "Comparing schemas...",
            Self::Normalize => "Normalizing fractional columns...",
            Self::SetDiff => "Computing set differences...",
            Self::CountCheck => "Checking row counts...",
            Self::DuplicateReconcile => "Reconciling duplicate rows...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SchemaCheck => "schema check",
            Self::Normalize => "normalize",
            Self::SetDiff => "set diff",
            Self::CountCheck => "count check",
            Self::DuplicateReconcile => "duplicate reconcile",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of comparing one control/target pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Rows in target absent from control
    pub new_row_count: u64,
    /// Rows in control absent from target
    pub missing_row_count: u64,
    pub control_count: u64,
    pub target_count: u64,
    pub passed: bool,
    pub strategy: SubtractStrategy,
    pub rounded_columns: Vec<String>,
    pub new_rows: RowPreview,
    pub missing_rows: RowPreview,
    /// Present when raw counts differed and duplicates were reconciled
    pub duplicate_diff: Option<DuplicateDiff>,
}

impl DiffResult {
    pub fn changed_rows(&self) -> u64 {
        self.new_row_count + self.missing_row_count
    }

    pub fn counts_match(&self) -> bool {
        self.control_count == self.target_count
    }

    /// Passed, but only after the duplicate-aware path ran
    pub fn has_warnings(&self) -> bool {
        self.passed && self.duplicate_diff.is_some()
    }
}

/// Runs comparisons against one execution engine
pub struct Comparator<'e, E: ExecutionEngine> {
    engine: &'e E,
    observer: Option<&'e dyn StageObserver>,
}

impl<'e, E: ExecutionEngine> Comparator<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self {
            engine,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'e dyn StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Compare `target` against `control`.
    ///
    /// Every dataset cached or derived during the call is released before
    /// this returns, whatever the outcome.
    pub fn compare(
        &self,
        control: &E::Dataset,
        target: &E::Dataset,
        config: &ComparisonConfig,
    ) -> Result<DiffResult> {
        config.validate()?;
        let result = self.run(control, target, config);
        if let Some(observer) = self.observer {
            observer.on_finish(result.is_ok());
        }
        result
    }

    fn enter(&self, stage: Stage) {
        log::debug!("Entering stage: {}", stage);
        if let Some(observer) = self.observer {
            observer.on_stage(stage);
        }
    }

    fn run(
        &self,
        control: &E::Dataset,
        target: &E::Dataset,
        config: &ComparisonConfig,
    ) -> Result<DiffResult> {
        let engine = self.engine;

        self.enter(Stage::SchemaCheck);
        let control_schema = engine.schema(control)?;
        let target_schema = engine.schema(target)?;
        validate_schemas(&control_schema, &target_schema)?;

        let mut scope = PinSet::new(engine);

        self.enter(Stage::Normalize);
        let normalized = normalize(
            engine,
            &mut scope,
            control,
            target,
            &control_schema,
            config.precision,
        )?;
        let control = scope.pin(&normalized.control)?;
        let target = scope.pin(&normalized.target)?;
        let control_count = engine.count(&control)?;
        let target_count = engine.count(&target)?;

        self.enter(Stage::SetDiff);
        let reconciled = reconcile_sets(engine, &mut scope, &control, &target, config.preview_rows)?;
        let mut result = DiffResult {
            new_row_count: reconciled.diff.new_row_count,
            missing_row_count: reconciled.diff.missing_row_count,
            control_count,
            target_count,
            passed: true,
            strategy: reconciled.strategy,
            rounded_columns: normalized.rounded_columns,
            new_rows: reconciled.diff.new_rows,
            missing_rows: reconciled.diff.missing_rows,
            duplicate_diff: None,
        };

        let changed = result.changed_rows();
        if exceeds_tolerance(changed, control_count, config.row_diff_tolerance) {
            result.passed = false;
            return Err(CompareError::ToleranceExceeded {
                changed,
                control_count,
                tolerance: config.row_diff_tolerance,
                diff: Box::new(result),
            });
        }

        self.enter(Stage::CountCheck);
        if control_count != target_count {
            log::warn!("Counts do not match! {} {}", control_count, target_count);
            self.enter(Stage::DuplicateReconcile);
            result.duplicate_diff = Some(reconcile_duplicates(
                engine,
                &mut scope,
                &reconciled.control,
                &reconciled.target,
                config.preview_rows,
            )?);
        }

        Ok(result)
    }
}

/// Compare two datasets with no progress reporting
pub fn compare<E: ExecutionEngine>(
    engine: &E,
    control: &E::Dataset,
    target: &E::Dataset,
    config: &ComparisonConfig,
) -> Result<DiffResult> {
    Comparator::new(engine).compare(control, target, config)
}

/// What happened to one pair of a batch
#[derive(Debug)]
pub enum PairStatus {
    Passed(DiffResult),
    Failed(CompareError),
    /// Not attempted because an earlier pair failed in fail-fast mode
    Skipped,
}

#[derive(Debug)]
pub struct PairOutcome {
    pub pair: TablePair,
    pub status: PairStatus,
}

impl PairOutcome {
    pub fn passed(&self) -> bool {
        matches!(self.status, PairStatus::Passed(_))
    }

    pub fn result(&self) -> Option<&DiffResult> {
        match &self.status {
            PairStatus::Passed(result) => Some(result),
            PairStatus::Failed(err) => err.diff_result(),
            PairStatus::Skipped => None,
        }
    }

    pub fn error(&self) -> Option<&CompareError> {
        match &self.status {
            PairStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Load and compare each pair in order.
///
/// A failing pair is reported with both table identifiers and does not stop
/// later pairs unless `fail_fast` is set.
pub fn compare_pairs<E: DatasetLoader>(
    engine: &E,
    pairs: &[TablePair],
    config: &ComparisonConfig,
    fail_fast: bool,
    observer: Option<&dyn StageObserver>,
) -> Vec<PairOutcome> {
    let mut outcomes = Vec::with_capacity(pairs.len());
    let mut stop = false;

    for pair in pairs {
        if stop {
            outcomes.push(PairOutcome {
                pair: pair.clone(),
                status: PairStatus::Skipped,
            });
            continue;
        }

        if let Some(observer) = observer {
            observer.on_start(&pair.to_string());
        }
        let status = match compare_pair(engine, pair, config, observer) {
            Ok(result) => {
                log::info!("{}: passed", pair);
                PairStatus::Passed(result)
            }
            Err(e) => {
                let e = e.for_pair(pair.control.to_string(), pair.target.to_string());
                log::error!("{}", e);
                stop = fail_fast;
                PairStatus::Failed(e)
            }
        };
        outcomes.push(PairOutcome {
            pair: pair.clone(),
            status,
        });
    }

    outcomes
}

fn compare_pair<E: DatasetLoader>(
    engine: &E,
    pair: &TablePair,
    config: &ComparisonConfig,
    observer: Option<&dyn StageObserver>,
) -> Result<DiffResult> {
    let mut scope = PinSet::new(engine);
    let control = scope.track(engine.load(&pair.control)?);
    let target = scope.track(engine.load(&pair.target)?);

    let mut comparator = Comparator::new(engine);
    if let Some(observer) = observer {
        comparator = comparator.with_observer(observer);
    }
    comparator.compare(&control, &target, config)
}
