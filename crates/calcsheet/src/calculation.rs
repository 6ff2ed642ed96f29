//! Sheet calculation engine
//!
//! Provides full and incremental evaluation of a field list with dependency
//! tracking and circular reference detection.
//!
//! # Example
//!
//! ```rust
//! use calcsheet::prelude::*;
//!
//! let fields = vec![
//!     FieldDefinition::number("hours", Some(40.0)),
//!     FieldDefinition::number("rate", Some(12.5)),
//!     FieldDefinition::formula("pay", "hours * rate"),
//! ];
//! let sheet = Sheet::new(&fields);
//!
//! let calc = sheet.evaluate(&Context::new());
//! assert_eq!(calc.context.value("pay"), Some(&Value::Number(500.0)));
//!
//! // Change one input and recompute only what reads it
//! let calc = sheet.update("hours", 20.0, &calc.context);
//! assert_eq!(calc.context.value("pay"), Some(&Value::Number(250.0)));
//! ```

use ahash::AHashMap;
use calcsheet_core::{Context, ErrorCode, FieldDefinition, Value};
use calcsheet_formula::{
    bind_fields, cyclic_references, detect_cycle, evaluate, topological_order, BoundField,
    DependencyGraph, EvaluationContext, Expr, FormulaError, FunctionRegistry, DEFAULT_MAX_DEPTH,
};
use std::collections::BTreeSet;

/// Options for sheet calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationOptions {
    /// Deepest expression nesting evaluated before yielding the generic error
    pub max_depth: usize,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formula fields
    pub formula_count: usize,
    /// Number of formula fields evaluated in this run
    pub cells_calculated: usize,
    /// Number of references on a dependency cycle
    pub circular_references: usize,
    /// Number of formulas that failed to parse
    pub parse_errors: usize,
    /// Number of formula results that are error codes
    pub errors: usize,
}

/// Output of one full or incremental pass
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    /// Every reference mapped to its value or error code
    pub context: Context,
    /// What the pass did
    pub stats: CalculationStats,
}

/// What a reference name is bound to
#[derive(Debug, Clone)]
enum Cell {
    Formula(Expr),
    Unparseable(FormulaError),
    Value(Option<Value>),
}

/// A compiled field list
///
/// Formulas are parsed once, and the dependency graph, the cycle set and
/// the evaluation order are computed up front. A `Sheet` is immutable; each
/// pass works on its own copy of the context it is given.
#[derive(Debug, Clone)]
pub struct Sheet {
    cells: AHashMap<String, Cell>,
    graph: DependencyGraph,
    cyclic: BTreeSet<String>,
    order: Vec<String>,
    options: CalculationOptions,
}

impl Sheet {
    /// Compile a field list
    ///
    /// Nested frames are flattened. When two fields share a reference name
    /// the first one wins.
    pub fn new(fields: &[FieldDefinition]) -> Self {
        let (graph, bound) = bind_fields(fields);

        let mut cells: AHashMap<String, Cell> = AHashMap::with_capacity(bound.len());
        for BoundField {
            reference,
            field,
            formula,
        } in bound
        {
            let cell = match formula {
                Some(Ok(expr)) => Cell::Formula(expr),
                Some(Err(e)) => {
                    log::warn!("Failed to parse formula for '{}': {}", reference, e);
                    Cell::Unparseable(e)
                }
                None => Cell::Value(field.default_value()),
            };
            cells.insert(reference.to_string(), cell);
        }

        let (cyclic, order) = match topological_order(&graph) {
            Some(order) => (BTreeSet::new(), order),
            None => {
                let cyclic = cyclic_references(&graph);
                if let Some(path) = detect_cycle(&graph) {
                    log::warn!(
                        "Circular reference through {} ({} references on cycles)",
                        path.join(" -> "),
                        cyclic.len()
                    );
                }
                // Cycle members are poisoned up front; the rest is acyclic
                let order = topological_order(&graph.without(&cyclic)).unwrap_or_default();
                (cyclic, order)
            }
        };

        Self {
            cells,
            graph,
            cyclic,
            order,
            options: CalculationOptions::default(),
        }
    }

    /// Replace the calculation options
    pub fn with_options(mut self, options: CalculationOptions) -> Self {
        self.options = options;
        self
    }

    /// Calculation options in effect
    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    /// The dependency graph
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Evaluation order of every reference outside a cycle
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// References lying on a dependency cycle
    pub fn cyclic_references(&self) -> &BTreeSet<String> {
        &self.cyclic
    }

    /// Check whether `reference` is bound to a formula field
    pub fn is_formula(&self, reference: &str) -> bool {
        matches!(
            self.cells.get(reference),
            Some(Cell::Formula(_) | Cell::Unparseable(_))
        )
    }

    /// Formulas that failed to parse, sorted by reference
    pub fn parse_errors(&self) -> Vec<(&str, &FormulaError)> {
        let mut errors: Vec<(&str, &FormulaError)> = self
            .cells
            .iter()
            .filter_map(|(reference, cell)| match cell {
                Cell::Unparseable(e) => Some((reference.as_str(), e)),
                _ => None,
            })
            .collect();
        errors.sort_unstable_by_key(|(reference, _)| *reference);
        errors
    }

    /// References recomputed when `changed` changes, in evaluation order
    ///
    /// `changed` itself is included when it is part of the sheet. Cycle
    /// members come first.
    pub fn affected(&self, changed: &str) -> Vec<&str> {
        let dependents = self.graph.transitive_dependents(changed);
        let is_affected = |r: &str| r == changed || dependents.contains(r);

        let cyclic = self
            .cyclic
            .iter()
            .map(String::as_str)
            .filter(|r| is_affected(r));
        let ordered = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|r| is_affected(r));
        cyclic.chain(ordered).collect()
    }

    /// Full evaluation with the built-in functions
    pub fn evaluate(&self, seed: &Context) -> Calculation {
        self.evaluate_with(seed, &FunctionRegistry::builtin())
    }

    /// Full evaluation
    ///
    /// Starts from a copy of `seed`. Value fields without an entry get their
    /// declared default, and every formula field is (re)computed.
    pub fn evaluate_with(&self, seed: &Context, functions: &FunctionRegistry) -> Calculation {
        let mut context = seed.clone();
        let mut stats = self.base_stats();

        for reference in &self.cyclic {
            self.poison(reference, &mut context, &mut stats);
        }
        for reference in &self.order {
            self.compute(reference, &mut context, functions, &mut stats);
        }

        log::debug!(
            "Full evaluation: {} of {} formulas calculated, {} errors, {} circular",
            stats.cells_calculated,
            stats.formula_count,
            stats.errors,
            stats.circular_references
        );

        Calculation { context, stats }
    }

    /// Incremental recalculation with the built-in functions
    pub fn recalculate(&self, changed: &str, context: &Context) -> Calculation {
        self.recalculate_with(changed, context, &FunctionRegistry::builtin())
    }

    /// Incremental recalculation
    ///
    /// Recomputes `changed` (if it is a formula) and everything that reads
    /// it directly or indirectly, in evaluation order. Other entries are left
    /// as they are in `context`.
    pub fn recalculate_with(
        &self,
        changed: &str,
        context: &Context,
        functions: &FunctionRegistry,
    ) -> Calculation {
        let mut context = context.clone();
        let mut stats = self.base_stats();
        let affected = self.affected(changed);

        for reference in &affected {
            if self.cyclic.contains(*reference) {
                self.poison(reference, &mut context, &mut stats);
            } else {
                self.compute(reference, &mut context, functions, &mut stats);
            }
        }

        log::debug!(
            "Recalculated '{}': {} references affected, {} formulas calculated",
            changed,
            affected.len(),
            stats.cells_calculated
        );

        Calculation { context, stats }
    }

    /// Write `value` to `changed` and recalculate with the built-in functions
    pub fn update(&self, changed: &str, value: impl Into<Value>, context: &Context) -> Calculation {
        let mut context = context.clone();
        context.set(changed, value);
        self.recalculate(changed, &context)
    }

    fn base_stats(&self) -> CalculationStats {
        let mut stats = CalculationStats {
            circular_references: self.cyclic.len(),
            ..Default::default()
        };
        for cell in self.cells.values() {
            match cell {
                Cell::Formula(_) => stats.formula_count += 1,
                Cell::Unparseable(_) => {
                    stats.formula_count += 1;
                    stats.parse_errors += 1;
                }
                Cell::Value(_) => {}
            }
        }
        stats
    }

    fn poison(&self, reference: &str, context: &mut Context, stats: &mut CalculationStats) {
        context.insert(reference, Err(ErrorCode::DependencyCycle));
        stats.cells_calculated += 1;
        stats.errors += 1;
    }

    fn compute(
        &self,
        reference: &str,
        context: &mut Context,
        functions: &FunctionRegistry,
        stats: &mut CalculationStats,
    ) {
        let result = match self.cells.get(reference) {
            Some(Cell::Formula(expr)) => {
                let ctx = EvaluationContext::new(context, functions)
                    .with_max_depth(self.options.max_depth);
                evaluate(expr, &ctx)
            }
            Some(Cell::Unparseable(_)) => Err(ErrorCode::Generic),
            Some(Cell::Value(default)) => {
                if !context.contains(reference) {
                    if let Some(value) = default {
                        context.insert(reference, Ok(value.clone()));
                    }
                }
                return;
            }
            // Dangling: read but never declared
            None => return,
        };

        stats.cells_calculated += 1;
        if result.is_err() {
            stats.errors += 1;
        }
        context.insert(reference, result);
    }
}

/// Evaluate a field list against a seed context with the built-in functions
pub fn calculate(fields: &[FieldDefinition], seed: &Context) -> Calculation {
    Sheet::new(fields).evaluate(seed)
}

/// Recalculate after `changed` changed, with the built-in functions
pub fn recalculate(fields: &[FieldDefinition], changed: &str, context: &Context) -> Calculation {
    Sheet::new(fields).recalculate(changed, context)
}
