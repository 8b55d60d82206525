//! Lowering a parsed model into a runnable right-hand side.
//!
//! Every identifier is bound to a slot in one flat scalar workspace:
//!
//! ```text
//! [ arg | states... | expressions... | parameters... | constants... | _t0 _t1 _h _count duration ]
//! ```
//!
//! States and expressions sit in adjacent bands so the generated evaluators
//! address everything through one linear scheme. Reserved names `_t0`, `_t1`,
//! `_h` and `_count` are readable from any expression; update blocks may
//! reassign the first three. `duration` resolves to the model's own
//! parameter when one is declared, otherwise to a hidden slot.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::expr::Expr;
use crate::model::parse::Model;
use crate::solve::{ArgRange, Ivp, OdeSystem};
use crate::Float;

/// Reserved workspace names.
pub const RESERVED: [&str; 4] = ["_t0", "_t1", "_h", "_count"];

/// The flat name-to-slot binding shared by every expression of one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    map: HashMap<String, usize>,
    pub arg: usize,
    pub state_base: usize,
    pub n_states: usize,
    pub expr_base: usize,
    pub n_exprs: usize,
    pub t0: usize,
    pub t1: usize,
    pub h: usize,
    pub count: usize,
    pub duration: usize,
    pub size: usize,
}

impl Binding {
    fn build(model: &Model) -> Self {
        fn claim(map: &mut HashMap<String, usize>, next: &mut usize, name: &str) -> usize {
            let slot = *next;
            map.insert(name.to_string(), slot);
            *next += 1;
            slot
        }

        let mut map = HashMap::new();
        let mut next = 0usize;
        let arg = claim(&mut map, &mut next, &model.arg.name);
        let state_base = next;
        for eq in &model.equations {
            claim(&mut map, &mut next, &eq.state);
        }
        let expr_base = next;
        for d in &model.expressions {
            claim(&mut map, &mut next, &d.name);
        }
        for d in model.parameters.iter().chain(&model.constants) {
            claim(&mut map, &mut next, &d.name);
        }
        let t0 = claim(&mut map, &mut next, "_t0");
        let t1 = claim(&mut map, &mut next, "_t1");
        let h = claim(&mut map, &mut next, "_h");
        let count = claim(&mut map, &mut next, "_count");
        let duration = match map.get("duration") {
            Some(&slot) => slot,
            None => claim(&mut map, &mut next, "duration"),
        };

        Binding {
            arg,
            state_base,
            n_states: model.equations.len(),
            expr_base,
            n_exprs: model.expressions.len(),
            t0,
            t1,
            h,
            count,
            duration,
            size: next,
            map,
        }
    }

    /// Slot of `name`, if bound.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.map.get(name).copied()
    }
}

fn bind_expr(expr: &mut Expr, binding: &Binding, context: &str) -> Result<(), ModelError> {
    expr.bind(&|name| binding.slot(name))
        .map_err(|name| ModelError::UnknownName {
            name,
            context: context.to_string(),
        })
}

/// A model lowered to slot-addressed evaluators plus a seeded workspace.
///
/// The compiled model is the `func(t, y, out)` of the problem: it implements
/// [`OdeSystem`] by copying `t` and `y` into their slots, evaluating
/// `#expressions` in declaration order, then writing each equation's value
/// into `out`.
#[derive(Debug)]
pub struct CompiledModel {
    pub model: Model,
    pub binding: Binding,
    /// Bound equation right-hand sides, one per state.
    equations: Vec<Expr>,
    /// Bound auxiliary expressions, evaluated top to bottom.
    expressions: Vec<(usize, Expr)>,
    /// Bound seed expressions: constants, then parameters, then inits, each
    /// written to its own slot in order; plus the argument bounds.
    seeds: Vec<(usize, Expr)>,
    arg_bounds: [Expr; 3],
    n_param_inputs: usize,
    /// The shared scalar workspace.
    pub(crate) workspace: RefCell<Vec<Float>>,
}

impl CompiledModel {
    /// Bind and lower a parsed model.
    pub fn compile(model: Model) -> Result<Self, ModelError> {
        let binding = Binding::build(&model);

        // Constants fold first (they may reference earlier constants), then
        // parameters over constants, then the argument bounds and inits.
        let mut seeds = Vec::new();
        for (decl, section) in model
            .constants
            .iter()
            .map(|d| (d, "constants"))
            .chain(model.parameters.iter().map(|d| (d, "parameters")))
            .chain(model.inits.iter().map(|d| (d, "inits")))
        {
            let mut e = decl.expr.clone();
            bind_expr(&mut e, &binding, section)?;
            seeds.push((binding.slot(&decl.name).unwrap(), e));
        }
        let mut arg_bounds = [
            model.arg.start.clone(),
            model.arg.finish.clone(),
            model.arg.step.clone(),
        ];
        for e in &mut arg_bounds {
            bind_expr(e, &binding, "argument")?;
        }

        let mut expressions = Vec::with_capacity(model.expressions.len());
        for decl in &model.expressions {
            let mut e = decl.expr.clone();
            bind_expr(&mut e, &binding, "expressions")?;
            expressions.push((binding.slot(&decl.name).unwrap(), e));
        }
        let mut equations = Vec::with_capacity(model.equations.len());
        for eq in &model.equations {
            let mut e = eq.rhs.clone();
            bind_expr(&mut e, &binding, "equations")?;
            equations.push(e);
        }

        let compiled = CompiledModel {
            n_param_inputs: model.parameters.len(),
            workspace: RefCell::new(vec![0.0; binding.size]),
            model,
            binding,
            equations,
            expressions,
            seeds,
            arg_bounds,
        };
        compiled.reseed(None);
        Ok(compiled)
    }

    /// Reset the workspace to the model's declared values, optionally
    /// overridden by a positional input vector in [`input_order`] order
    /// (NaN entries keep the declared default).
    ///
    /// Constants and parameters seed before the argument bounds and inits,
    /// so bounds and inits written as expressions see overridden parameters.
    pub(crate) fn reseed(&self, inputs: Option<&[Float]>) {
        let ws = &mut *self.workspace.borrow_mut();
        ws.fill(0.0);
        let b = &self.binding;

        let n_consts = self.seeds.len() - self.n_param_inputs - b.n_states;
        let n_params = self.n_param_inputs;
        let override_at = |k: usize| -> Option<Float> {
            let v = *inputs?.get(k)?;
            if v.is_nan() {
                None
            } else {
                Some(v)
            }
        };

        // constants, then parameters (inputs 3.., after the three bounds)
        for (i, (slot, expr)) in self.seeds[..n_consts + n_params].iter().enumerate() {
            let mut value = expr.eval(ws);
            if i >= n_consts {
                let param_index = i - n_consts;
                if let Some(v) = override_at(3 + b.n_states + param_index) {
                    value = v;
                }
            }
            ws[*slot] = value;
        }
        // argument bounds
        for (k, (slot, expr)) in [
            (b.t0, &self.arg_bounds[0]),
            (b.t1, &self.arg_bounds[1]),
            (b.h, &self.arg_bounds[2]),
        ]
        .into_iter()
        .enumerate()
        {
            let value = override_at(k).unwrap_or_else(|| expr.eval(ws));
            ws[slot] = value;
        }
        // inits
        for (i, (slot, expr)) in self.seeds[n_consts + n_params..].iter().enumerate() {
            let value = override_at(3 + i).unwrap_or_else(|| expr.eval(ws));
            ws[*slot] = value;
        }
    }

    pub(crate) fn bound_equations(&self) -> &[Expr] {
        &self.equations
    }

    pub(crate) fn bound_expressions(&self) -> &[(usize, Expr)] {
        &self.expressions
    }

    /// Current initial state, read from the workspace state band.
    pub fn state_snapshot(&self) -> Vec<Float> {
        let ws = self.workspace.borrow();
        ws[self.binding.state_base..self.binding.state_base + self.binding.n_states].to_vec()
    }

    pub(crate) fn write_states(&self, y: &[Float]) {
        let mut ws = self.workspace.borrow_mut();
        ws[self.binding.state_base..self.binding.state_base + self.binding.n_states]
            .copy_from_slice(y);
    }

    /// An [`Ivp`] descriptor for the current workspace bounds and state.
    pub fn ivp(&self, stage_name: &str) -> Ivp {
        let ws = self.workspace.borrow();
        Ivp::builder()
            .name(format!("{}: {}", self.model.name, stage_name))
            .arg(ArgRange::new(
                &self.model.arg.name,
                ws[self.binding.t0],
                ws[self.binding.t1],
                ws[self.binding.h],
            ))
            .initial(
                ws[self.binding.state_base..self.binding.state_base + self.binding.n_states]
                    .to_vec(),
            )
            .names(self.model.state_names())
            .tolerance(self.model.tolerance.unwrap_or(1e-7))
            .build()
    }

    /// Evaluate the auxiliary expressions for a given `(t, y)` and read one
    /// slot. Used to reconstruct `#output` columns for expression names.
    pub(crate) fn eval_slot_at(&self, slot: usize, t: Float, y: &[Float]) -> Float {
        let ws = &mut *self.workspace.borrow_mut();
        ws[self.binding.arg] = t;
        ws[self.binding.state_base..self.binding.state_base + self.binding.n_states]
            .copy_from_slice(y);
        for (target, expr) in &self.expressions {
            let value = expr.eval(ws);
            ws[*target] = value;
        }
        ws[slot]
    }
}

impl OdeSystem for CompiledModel {
    fn rhs(&self, t: Float, y: &[Float], dydt: &mut [Float]) {
        let ws = &mut *self.workspace.borrow_mut();
        ws[self.binding.arg] = t;
        ws[self.binding.state_base..self.binding.state_base + self.binding.n_states]
            .copy_from_slice(y);
        for (target, expr) in &self.expressions {
            let value = expr.eval(ws);
            ws[*target] = value;
        }
        for (i, eq) in self.equations.iter().enumerate() {
            dydt[i] = eq.eval(ws);
        }
    }
}

/// The order of the positional input vector of a model:
/// `start`, `finish`, `step`, the inits (declaration order), then the
/// parameters (declaration order).
pub fn input_order(model: &Model) -> Vec<String> {
    let mut order = vec!["start".to_string(), "finish".to_string(), "step".to_string()];
    order.extend(model.inits.iter().map(|d| d.name.clone()));
    order.extend(model.parameters.iter().map(|d| d.name.clone()));
    order
}

/// Project a keyed input map onto the positional order of [`input_order`].
/// Keys missing from the map keep the model's declared defaults (NaN marks
/// "use default" in the returned vector); unknown keys are an error.
pub fn input_vector(
    inputs: &HashMap<String, Float>,
    model: &Model,
) -> Result<Vec<Float>, ModelError> {
    let order = input_order(model);
    for key in inputs.keys() {
        if !order.iter().any(|name| name == key) {
            return Err(ModelError::UnknownName {
                name: key.clone(),
                context: "input map".to_string(),
            });
        }
    }
    Ok(order
        .iter()
        .map(|name| inputs.get(name).copied().unwrap_or(Float::NAN))
        .collect())
}
