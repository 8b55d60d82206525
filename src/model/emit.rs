//! Rendering a parsed model back to source text, and the self-contained
//! descriptor used across a worker boundary.
//!
//! `emit` is a pure serialisation: reparsing its output yields a model
//! structurally equal to the original. The [`Descriptor`] is the closure-free
//! variant of a compiled model — slot-bound operator trees plus a numeric
//! workspace snapshot — for transports that can only ship plain data.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::model::compile::{Binding, CompiledModel};
use crate::model::expr::{format_number, Expr};
use crate::model::parse::{Annotation, Assign, Model, ScalarDecl};
use crate::solve::{ArgRange, Ivp, OdeSystem};
use crate::Float;

fn push_annotation(out: &mut String, anno: &Annotation) {
    if let Some(meta) = &anno.meta {
        out.push_str(" {");
        out.push_str(meta);
        out.push('}');
    }
    if let Some(note) = &anno.note {
        out.push_str(" [");
        out.push_str(note);
        out.push(']');
    }
}

fn push_decls(out: &mut String, header: &str, decls: &[ScalarDecl]) {
    if decls.is_empty() {
        return;
    }
    out.push_str(header);
    out.push('\n');
    for d in decls {
        out.push_str("  ");
        out.push_str(&d.name);
        out.push_str(" = ");
        out.push_str(&d.expr.to_string());
        push_annotation(out, &d.anno);
        out.push('\n');
    }
}

fn push_assigns(out: &mut String, assigns: &[Assign]) {
    for a in assigns {
        out.push_str("  ");
        out.push_str(&a.name);
        out.push(' ');
        out.push_str(a.op.symbol());
        out.push(' ');
        out.push_str(&a.expr.to_string());
        push_annotation(out, &a.anno);
        out.push('\n');
    }
}

/// Render a parsed model as model-format source text.
pub fn emit(model: &Model) -> String {
    let mut out = String::new();
    out.push_str("#name: ");
    out.push_str(&model.name);
    out.push('\n');
    if let Some(tags) = &model.tags {
        out.push_str("#tags: ");
        out.push_str(tags);
        out.push('\n');
    }
    if let Some(desc) = &model.description {
        let mut lines = desc.lines();
        out.push_str("#description: ");
        out.push_str(lines.next().unwrap_or(""));
        out.push('\n');
        for line in lines {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    if !model.meta.is_empty() {
        out.push_str("#meta:\n");
        for line in &model.meta {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }

    out.push_str("#equations:\n");
    for eq in &model.equations {
        out.push_str("  d");
        out.push_str(&eq.state);
        out.push_str("/d");
        out.push_str(&eq.arg);
        out.push_str(" = ");
        out.push_str(&eq.rhs.to_string());
        push_annotation(&mut out, &eq.anno);
        out.push('\n');
    }
    push_decls(&mut out, "#expressions:", &model.expressions);

    out.push_str("#argument: ");
    out.push_str(&model.arg.name);
    if let Some(label) = &model.arg.stage_label {
        out.push_str(", ");
        out.push_str(label);
    }
    out.push('\n');
    out.push_str("  start = ");
    out.push_str(&model.arg.start.to_string());
    out.push_str("\n  finish = ");
    out.push_str(&model.arg.finish.to_string());
    out.push_str("\n  step = ");
    out.push_str(&model.arg.step.to_string());
    out.push('\n');

    push_decls(&mut out, "#inits:", &model.inits);
    push_decls(&mut out, "#parameters:", &model.parameters);
    push_decls(&mut out, "#constants:", &model.constants);

    for block in &model.updates {
        out.push_str("#update:");
        if let Some(label) = &block.label {
            out.push(' ');
            out.push_str(label);
        }
        out.push('\n');
        push_assigns(&mut out, &block.assigns);
    }
    if let Some(block) = &model.loop_block {
        out.push_str("#loop:\n  count = ");
        out.push_str(&block.count.to_string());
        out.push('\n');
        push_assigns(&mut out, &block.assigns);
    }
    if !model.outputs.is_empty() {
        out.push_str("#output:\n");
        for (name, anno) in &model.outputs {
            out.push_str("  ");
            out.push_str(name);
            push_annotation(&mut out, anno);
            out.push('\n');
        }
    }
    if let Some(tol) = model.tolerance {
        out.push_str("#tolerance: ");
        out.push_str(&format_number(tol));
        out.push('\n');
    }
    out
}

/// A compiled model flattened into plain data: the binding, the slot-bound
/// operator trees, and a numeric snapshot of the workspace. Everything a
/// worker needs to run the problem without receiving closures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub arg_name: String,
    pub start: Float,
    pub finish: Float,
    pub step: Float,
    pub tolerance: Float,
    pub state_names: Vec<String>,
    pub binding: Binding,
    pub workspace: Vec<Float>,
    pub equations: Vec<Expr>,
    pub expressions: Vec<(usize, Expr)>,
    /// Evaluation scratch, sized from `workspace` on first use so `rhs` stays
    /// allocation-free across calls. Not part of the wire format.
    #[serde(skip)]
    scratch: RefCell<Vec<Float>>,
}

impl CompiledModel {
    /// Snapshot this model as a [`Descriptor`].
    pub fn descriptor(&self) -> Descriptor {
        let ws = self.workspace.borrow();
        Descriptor {
            name: self.model.name.clone(),
            arg_name: self.model.arg.name.clone(),
            start: ws[self.binding.t0],
            finish: ws[self.binding.t1],
            step: ws[self.binding.h],
            tolerance: self.model.tolerance.unwrap_or(1e-7),
            state_names: self.model.state_names(),
            binding: self.binding.clone(),
            workspace: ws.clone(),
            equations: self.bound_equations().to_vec(),
            expressions: self.bound_expressions().to_vec(),
            scratch: RefCell::new(Vec::new()),
        }
    }
}

impl Descriptor {
    /// Reconstruct a runnable problem: the descriptor itself is the
    /// right-hand side.
    pub fn ivp(&self) -> Ivp {
        Ivp::builder()
            .name(self.name.clone())
            .arg(ArgRange::new(
                &self.arg_name,
                self.start,
                self.finish,
                self.step,
            ))
            .initial(
                self.workspace
                    [self.binding.state_base..self.binding.state_base + self.binding.n_states]
                    .to_vec(),
            )
            .names(self.state_names.clone())
            .tolerance(self.tolerance)
            .build()
    }
}

impl OdeSystem for Descriptor {
    fn rhs(&self, t: Float, y: &[Float], dydt: &mut [Float]) {
        let mut scratch = self.scratch.borrow_mut();
        if scratch.len() != self.workspace.len() {
            // First call (or a freshly deserialized descriptor): take the
            // snapshot once. Only the argument, state, and expression slots
            // are rewritten below, so the copy never needs refreshing.
            *scratch = self.workspace.clone();
        }
        let ws = &mut *scratch;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse::parse;

    const MODEL: &str = "\
#name: Round trip
#tags: model
#description: first line
  second line
#equations:
  dx/dt = -k * x {caption: velocity}
#expressions:
  twice = 2 * x
#argument: t, main
  start = 0
  finish = 1.5
  step = 0.25
#inits:
  x = 10 {min: 0; max: 100}
#parameters:
  k = 1.3e-2 [rate]
#update: feed
  duration = 2
  x += 5
#loop:
  count = 2
#output:
  x {caption: position}
  twice
#tolerance: 5e-7
";

    #[test]
    fn parse_emit_parse_is_idempotent() {
        let m1 = parse(MODEL).unwrap();
        let text = emit(&m1);
        let m2 = parse(&text).unwrap();
        assert_eq!(m1, m2, "emitted:\n{text}");
        // And a second round is textually stable
        assert_eq!(text, emit(&m2));
    }

    #[test]
    fn descriptor_is_a_runnable_rhs() {
        let cm = CompiledModel::compile(parse(MODEL).unwrap()).unwrap();
        let d = cm.descriptor();
        let ivp = d.ivp();
        assert_eq!(ivp.arg.finish, 1.5);
        assert_eq!(ivp.initial, vec![10.0]);
        let mut out = [0.0];
        d.rhs(0.0, &[10.0], &mut out);
        assert!((out[0] - (-1.3e-2 * 10.0)).abs() < 1e-12);
    }
}
