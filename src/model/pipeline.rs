//! Lowering a parsed model into a staged simulation and driving it.
//!
//! A model without `#update` blocks is a single-stage pipeline. Every
//! `#update` block opens one more stage: it starts where the previous stage
//! ended, carries the previous stage's final state, applies the block's
//! assignments against the shared workspace, and runs for `duration` (which
//! the block may redefine). `#loop` repeats the whole stage sequence with
//! `_count` exposed as the zero-based iteration index. Per-stage solutions
//! are concatenated verbatim: the boundary argument appears once per
//! adjacent stage, bit-exact on components the update did not touch.

use crate::error::{ModelError, SolveError};
use crate::methods::tableau::Method;
use crate::model::compile::CompiledModel;
use crate::model::expr::Expr;
use crate::model::parse::{Assign, AssignOp, Model};
use crate::solve::{solve_with, Solution, SolveOptions};
use crate::Float;

/// One bound update assignment.
#[derive(Debug, Clone)]
struct BoundAssign {
    slot: usize,
    op: AssignOp,
    expr: Expr,
}

/// One segment of the staged simulation.
struct Stage {
    name: String,
    /// Applied against the workspace at entry; empty for the first stage.
    assigns: Vec<BoundAssign>,
}

/// A compiled model plus its stage sequence.
pub struct Pipeline {
    pub compiled: CompiledModel,
    stages: Vec<Stage>,
    loop_count: Option<Expr>,
    loop_assigns: Vec<BoundAssign>,
}

fn bind_assigns(
    assigns: &[Assign],
    compiled: &CompiledModel,
    context: &str,
) -> Result<Vec<BoundAssign>, ModelError> {
    let binding = &compiled.binding;
    assigns
        .iter()
        .map(|a| {
            let slot = match binding.slot(&a.name) {
                Some(slot) => slot,
                // `step` names the output grid step of the next stage
                None if a.name == "step" => binding.h,
                None => {
                    return Err(ModelError::UnknownName {
                        name: a.name.clone(),
                        context: context.to_string(),
                    })
                }
            };
            let mut expr = a.expr.clone();
            expr.bind(&|name| binding.slot(name))
                .map_err(|name| ModelError::UnknownName {
                    name,
                    context: context.to_string(),
                })?;
            Ok(BoundAssign {
                slot,
                op: a.op,
                expr,
            })
        })
        .collect()
}

/// Lower a parsed model into a runnable pipeline.
pub fn build_pipeline(model: Model) -> Result<Pipeline, ModelError> {
    let compiled = CompiledModel::compile(model)?;
    let model = &compiled.model;

    let mut stages = vec![Stage {
        name: model
            .arg
            .stage_label
            .clone()
            .unwrap_or_else(|| "stage 1".to_string()),
        assigns: Vec::new(),
    }];
    for (i, block) in model.updates.iter().enumerate() {
        stages.push(Stage {
            name: block
                .label
                .clone()
                .unwrap_or_else(|| format!("stage {}", i + 2)),
            assigns: bind_assigns(&block.assigns, &compiled, "update")?,
        });
    }

    let (loop_count, loop_assigns) = match &model.loop_block {
        Some(block) => {
            let mut count = block.count.clone();
            count
                .bind(&|name| compiled.binding.slot(name))
                .map_err(|name| ModelError::UnknownName {
                    name,
                    context: "loop".to_string(),
                })?;
            (
                Some(count),
                bind_assigns(&block.assigns, &compiled, "loop")?,
            )
        }
        None => (None, Vec::new()),
    };

    Ok(Pipeline {
        compiled,
        stages,
        loop_count,
        loop_assigns,
    })
}

impl Pipeline {
    /// Number of stages per iteration.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run the pipeline with the model's declared inputs.
    pub fn apply(&self, method: Method) -> Result<Solution, SolveError> {
        self.apply_full(None, method, &SolveOptions::default())
    }

    /// Run the pipeline with a positional input vector (see
    /// [`crate::model::input_vector`]); NaN entries keep declared defaults.
    pub fn apply_with(&self, inputs: &[Float], method: Method) -> Result<Solution, SolveError> {
        self.apply_full(Some(inputs), method, &SolveOptions::default())
    }

    pub fn apply_full(
        &self,
        inputs: Option<&[Float]>,
        method: Method,
        options: &SolveOptions,
    ) -> Result<Solution, SolveError> {
        let cm = &self.compiled;
        let b = &cm.binding;

        if let Some(inputs) = inputs {
            let expected = 3 + b.n_states + cm.model.parameters.len();
            if inputs.len() != expected {
                return Err(SolveError::config(format!(
                    "input vector has {} entries, model takes {}",
                    inputs.len(),
                    expected
                )));
            }
        }
        cm.reseed(inputs);

        let (first_duration, count) = {
            let ws = cm.workspace.borrow();
            let count = match &self.loop_count {
                Some(expr) => {
                    let v = expr.eval(&ws);
                    if !(v.is_finite() && v >= 1.0) {
                        return Err(SolveError::config(format!(
                            "loop count evaluated to {v}"
                        )));
                    }
                    v.round() as usize
                }
                None => 1,
            };
            (ws[b.t1] - ws[b.t0], count)
        };

        let mut total: Option<Solution> = None;
        for iteration in 0..count {
            cm.workspace.borrow_mut()[b.count] = iteration as Float;
            if iteration > 0 {
                self.advance(&self.loop_assigns, first_duration);
            }
            for stage in &self.stages {
                if total.is_some() && !std::ptr::eq(stage, &self.stages[0]) {
                    let prev_len = {
                        let ws = cm.workspace.borrow();
                        ws[b.t1] - ws[b.t0]
                    };
                    self.advance(&stage.assigns, prev_len);
                }
                log::debug!("pipeline {}: entering {}", cm.model.name, stage.name);
                let ivp = cm.ivp(&stage.name);
                let sol = solve_with(&ivp, cm, method, options)
                    .map_err(|e| e.in_stage(&stage.name))?;
                cm.write_states(&sol.last());
                match &mut total {
                    None => total = Some(sol),
                    Some(t) => t.extend(sol),
                }
            }
        }
        let total = total.expect("at least one stage ran");
        Ok(self.project_outputs(total))
    }

    /// Apply one update/loop boundary: expose the outgoing stage's length as
    /// `duration`, run the assignments, then advance the bounds so the next
    /// stage starts at the previous end and runs for `duration`.
    fn advance(&self, assigns: &[BoundAssign], default_duration: Float) {
        let cm = &self.compiled;
        let b = &cm.binding;
        let ws = &mut *cm.workspace.borrow_mut();
        ws[b.duration] = default_duration;
        for a in assigns {
            let value = a.expr.eval(ws);
            let cell = &mut ws[a.slot];
            match a.op {
                AssignOp::Set => *cell = value,
                AssignOp::Add => *cell += value,
                AssignOp::Sub => *cell -= value,
                AssignOp::Mul => *cell *= value,
                AssignOp::Div => *cell /= value,
            }
        }
        let start = ws[b.t1];
        ws[b.t0] = start;
        ws[b.t1] = start + ws[b.duration];
    }

    /// Restrict the solution to the `#output` section, recomputing columns
    /// that name auxiliary expressions. Without `#output` the states are
    /// returned as-is.
    fn project_outputs(&self, sol: Solution) -> Solution {
        let model = &self.compiled.model;
        if model.outputs.is_empty() {
            return sol;
        }
        let mut names = Vec::with_capacity(model.outputs.len());
        let mut columns = Vec::with_capacity(model.outputs.len());
        for (out, _) in &model.outputs {
            names.push(out.clone());
            if let Some(col) = sol.column(out) {
                columns.push(col.to_vec());
                continue;
            }
            let slot = self
                .compiled
                .binding
                .slot(out)
                .expect("outputs validated at parse time");
            let mut col = Vec::with_capacity(sol.len());
            let mut y = vec![0.0; sol.y.len()];
            for k in 0..sol.len() {
                for (i, component) in sol.y.iter().enumerate() {
                    y[i] = component[k];
                }
                col.push(self.compiled.eval_slot_at(slot, sol.t[k], &y));
            }
            columns.push(col);
        }
        Solution {
            names,
            t: sol.t,
            y: columns,
            stats: sol.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse::parse;

    const TWO_STAGE: &str = "\
#name: Fed batch
#equations:
  dS/dt = -r * S
#argument: t, 1-st stage
  start = 0
  finish = 60
  step = 10
#update: 2-nd stage
  duration = overall - _t1
  S += 70
#inits:
  S = 150
#parameters:
  r = 0.01
  overall = 100
#tolerance: 1e-9
";

    #[test]
    fn stage_bounds_and_feed() {
        let pipe = build_pipeline(parse(TWO_STAGE).unwrap()).unwrap();
        assert_eq!(pipe.stage_count(), 2);
        let sol = pipe.apply(Method::Ros34PRw).unwrap();
        // Stage 1: 7 samples on [0, 60]; stage 2: 5 samples on [60, 100]
        assert_eq!(sol.len(), 12);
        assert_eq!(sol.t[0], 0.0);
        assert_eq!(sol.t[6], 60.0);
        assert_eq!(sol.t[7], 60.0);
        assert_eq!(*sol.t.last().unwrap(), 100.0);
        let s = sol.column("S").unwrap();
        // The feed adds exactly 70 across the boundary
        assert_eq!(s[7], s[6] + 70.0);
    }

    #[test]
    fn single_stage_models_run_unchanged() {
        let src = TWO_STAGE
            .replace("#update: 2-nd stage\n  duration = overall - _t1\n  S += 70\n", "");
        let pipe = build_pipeline(parse(&src).unwrap()).unwrap();
        assert_eq!(pipe.stage_count(), 1);
        let sol = pipe.apply(Method::Mrt).unwrap();
        assert_eq!(sol.len(), 7);
        let s = sol.column("S").unwrap();
        let expected = 150.0 * (-0.01f64 * 60.0).exp();
        assert!((s[6] - expected).abs() < 1e-6 * expected);
    }

    #[test]
    fn loop_repeats_stages_with_count() {
        let src = "\
#name: Pulsed
#equations:
  dx/dt = -x
#argument: t
  start = 0
  finish = 1
  step = 0.5
#loop:
  count = 3
  x += 1
#inits:
  x = 1
#tolerance: 1e-8
";
        let pipe = build_pipeline(parse(src).unwrap()).unwrap();
        let sol = pipe.apply(Method::Ros3PRw).unwrap();
        // Three iterations of [k, k+1], three samples each
        assert_eq!(sol.len(), 9);
        assert_eq!(*sol.t.last().unwrap(), 3.0);
        let x = sol.column("x").unwrap();
        // Each wrap adds one: x jumps by exactly 1 across iterations
        assert_eq!(x[3], x[2] + 1.0);
        assert_eq!(x[6], x[5] + 1.0);
    }

    #[test]
    fn input_vector_overrides_defaults() {
        let pipe = build_pipeline(parse(TWO_STAGE).unwrap()).unwrap();
        let nan = f64::NAN;
        // [start, finish, step, S, r, overall]
        let inputs = [nan, nan, nan, 300.0, nan, nan];
        let sol = pipe.apply_with(&inputs, Method::Ros34PRw).unwrap();
        let s = sol.column("S").unwrap();
        assert_eq!(s[0], 300.0);
    }

    #[test]
    fn stage_failures_name_the_stage() {
        let src = TWO_STAGE.replace("duration = overall - _t1", "duration = 0 - 5");
        let pipe = build_pipeline(parse(&src).unwrap()).unwrap();
        let err = pipe.apply(Method::Mrt).unwrap_err();
        match err {
            SolveError::Stage { stage, .. } => assert_eq!(stage, "2-nd stage"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
