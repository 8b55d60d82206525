//! Line-oriented parser for the declarative model format.
//!
//! A line beginning with `#<section>:` opens a section; its body is the
//! following non-blank lines until the next directive or end of input.
//! `name`, `tags`, `description` and `tolerance` take their payload inline
//! after the colon; `argument` and `update` carry an inline label; the rest
//! use body lines. `// ...` comments and the whole `#comment` section are
//! ignored. Trailing `{...}` metadata and `[...]` descriptions are preserved
//! verbatim but never interpreted.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::expr::{parse_expr, Expr};
use crate::Float;

/// UI metadata (`{...}`) and free-text note (`[...]`) attached to a line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub meta: Option<String>,
    pub note: Option<String>,
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        self.meta.is_none() && self.note.is_none()
    }
}

/// One differential equation `d<state>/d<arg> = rhs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equation {
    pub state: String,
    pub rhs: Expr,
    pub anno: Annotation,
    pub(crate) line: usize,
    pub(crate) arg: String,
}

/// A named scalar declaration (`expressions`, `inits`, `parameters`,
/// `constants` all share this shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarDecl {
    pub name: String,
    pub expr: Expr,
    pub anno: Annotation,
    pub(crate) line: usize,
}

/// Assignment operators available inside `#update` and `#loop` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
        }
    }
}

/// One `name <op> expr` line of an update or loop block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assign {
    pub name: String,
    pub op: AssignOp,
    pub expr: Expr,
    pub anno: Annotation,
    pub(crate) line: usize,
}

/// The `#argument` section: name, optional stage label, and the bounds of
/// the first stage. Bounds are expressions over parameters and constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgDecl {
    pub name: String,
    pub stage_label: Option<String>,
    pub start: Expr,
    pub finish: Expr,
    pub step: Expr,
    pub(crate) line: usize,
}

/// One `#update` block: an additional pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBlock {
    pub label: Option<String>,
    pub assigns: Vec<Assign>,
    pub(crate) line: usize,
}

/// The `#loop` block: iteration count plus assignments applied between
/// iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopBlock {
    pub count: Expr,
    pub assigns: Vec<Assign>,
    pub(crate) line: usize,
}

// Structural equality ignores source line numbers, so a reparse of emitted
// text compares equal to the original parse.
impl PartialEq for Equation {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.rhs == other.rhs
            && self.anno == other.anno
            && self.arg == other.arg
    }
}

impl PartialEq for ScalarDecl {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.expr == other.expr && self.anno == other.anno
    }
}

impl PartialEq for Assign {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.op == other.op
            && self.expr == other.expr
            && self.anno == other.anno
    }
}

impl PartialEq for ArgDecl {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.stage_label == other.stage_label
            && self.start == other.start
            && self.finish == other.finish
            && self.step == other.step
    }
}

impl PartialEq for UpdateBlock {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.assigns == other.assigns
    }
}

impl PartialEq for LoopBlock {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.assigns == other.assigns
    }
}

/// A parsed model: the section table of the declarative format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub meta: Vec<String>,
    pub equations: Vec<Equation>,
    pub expressions: Vec<ScalarDecl>,
    pub arg: ArgDecl,
    pub inits: Vec<ScalarDecl>,
    pub parameters: Vec<ScalarDecl>,
    pub constants: Vec<ScalarDecl>,
    pub updates: Vec<UpdateBlock>,
    pub loop_block: Option<LoopBlock>,
    pub outputs: Vec<(String, Annotation)>,
    pub tolerance: Option<Float>,
}

impl Model {
    /// Names of the state components, in declaration order.
    pub fn state_names(&self) -> Vec<String> {
        self.equations.iter().map(|e| e.state.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Name,
    Tags,
    Description,
    Equations,
    Expressions,
    Argument,
    Inits,
    Parameters,
    Constants,
    Update,
    Output,
    Tolerance,
    Comment,
    Meta,
    Loop,
}

impl Section {
    fn label(self) -> &'static str {
        match self {
            Section::None => "model",
            Section::Name => "name",
            Section::Tags => "tags",
            Section::Description => "description",
            Section::Equations => "equations",
            Section::Expressions => "expressions",
            Section::Argument => "argument",
            Section::Inits => "inits",
            Section::Parameters => "parameters",
            Section::Constants => "constants",
            Section::Update => "update",
            Section::Output => "output",
            Section::Tolerance => "tolerance",
            Section::Comment => "comment",
            Section::Meta => "meta",
            Section::Loop => "loop",
        }
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip an inline `// ...` comment.
fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Peel trailing `{...}` and `[...]` annotations off the end of a line.
fn take_annotation(text: &str) -> (String, Annotation) {
    let mut rest = text.trim().to_string();
    let mut anno = Annotation::default();
    loop {
        if rest.ends_with('}') && anno.meta.is_none() {
            if let Some(open) = rest.rfind('{') {
                anno.meta = Some(rest[open + 1..rest.len() - 1].trim().to_string());
                rest.truncate(open);
                rest = rest.trim_end().to_string();
                continue;
            }
        }
        if rest.ends_with(']') && anno.note.is_none() {
            if let Some(open) = rest.rfind('[') {
                anno.note = Some(rest[open + 1..rest.len() - 1].trim().to_string());
                rest.truncate(open);
                rest = rest.trim_end().to_string();
                continue;
            }
        }
        break;
    }
    (rest, anno)
}

/// Split `name <op> expr`, recognizing the compound assignment operators.
fn split_assign(line: &str) -> Option<(&str, AssignOp, &str)> {
    let eq = line.find('=')?;
    let (head, op) = if eq > 0 {
        match line.as_bytes()[eq - 1] {
            b'+' => (&line[..eq - 1], AssignOp::Add),
            b'-' => (&line[..eq - 1], AssignOp::Sub),
            b'*' => (&line[..eq - 1], AssignOp::Mul),
            b'/' => (&line[..eq - 1], AssignOp::Div),
            _ => (&line[..eq], AssignOp::Set),
        }
    } else {
        (&line[..eq], AssignOp::Set)
    };
    Some((head.trim(), op, line[eq + 1..].trim()))
}

struct ParseState {
    name: Option<String>,
    tags: Option<String>,
    description: Vec<String>,
    meta: Vec<String>,
    equations: Vec<Equation>,
    expressions: Vec<ScalarDecl>,
    arg: Option<PartialArg>,
    inits: Vec<ScalarDecl>,
    parameters: Vec<ScalarDecl>,
    constants: Vec<ScalarDecl>,
    updates: Vec<UpdateBlock>,
    loop_block: Option<LoopBlock>,
    outputs: Vec<(String, Annotation)>,
    tolerance: Option<Float>,
}

struct PartialArg {
    name: String,
    stage_label: Option<String>,
    start: Option<Expr>,
    finish: Option<Expr>,
    step: Option<Expr>,
    line: usize,
}

/// Parse a declarative model from source text.
pub fn parse(source: &str) -> Result<Model, ModelError> {
    let mut st = ParseState {
        name: None,
        tags: None,
        description: Vec::new(),
        meta: Vec::new(),
        equations: Vec::new(),
        expressions: Vec::new(),
        arg: None,
        inits: Vec::new(),
        parameters: Vec::new(),
        constants: Vec::new(),
        updates: Vec::new(),
        loop_block: None,
        outputs: Vec::new(),
        tolerance: None,
    };
    let mut section = Section::None;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(directive) = line.strip_prefix('#') {
            let (head, payload) = match directive.find(':') {
                Some(pos) => (directive[..pos].trim(), directive[pos + 1..].trim()),
                None => (directive.trim(), ""),
            };
            section = match head {
                "name" => Section::Name,
                "tags" => Section::Tags,
                "description" => Section::Description,
                "equations" => Section::Equations,
                "expressions" => Section::Expressions,
                "argument" => Section::Argument,
                "inits" => Section::Inits,
                "parameters" => Section::Parameters,
                "constants" => Section::Constants,
                "update" => Section::Update,
                "output" => Section::Output,
                "tolerance" => Section::Tolerance,
                "comment" => Section::Comment,
                "meta" => Section::Meta,
                "loop" => Section::Loop,
                other => {
                    return Err(ModelError::parse(
                        line_no,
                        other,
                        format!("unknown section `#{other}:`"),
                    ))
                }
            };
            match section {
                Section::Name => st.name = Some(payload.to_string()),
                Section::Tags => st.tags = Some(payload.to_string()),
                Section::Description if !payload.is_empty() => {
                    st.description.push(payload.to_string())
                }
                Section::Meta if !payload.is_empty() => st.meta.push(payload.to_string()),
                Section::Tolerance => {
                    let value: Float = payload.parse().map_err(|_| {
                        ModelError::parse(
                            line_no,
                            "tolerance",
                            format!("malformed tolerance `{payload}`"),
                        )
                    })?;
                    st.tolerance = Some(value);
                }
                Section::Argument => {
                    let (name_part, label) = match payload.split_once(',') {
                        Some((n, l)) => (n.trim(), Some(l.trim().to_string())),
                        None => (payload, None),
                    };
                    if !is_ident(name_part) {
                        return Err(ModelError::parse(
                            line_no,
                            "argument",
                            format!("`{name_part}` is not a valid argument name"),
                        ));
                    }
                    st.arg = Some(PartialArg {
                        name: name_part.to_string(),
                        stage_label: label,
                        start: None,
                        finish: None,
                        step: None,
                        line: line_no,
                    });
                }
                Section::Update => st.updates.push(UpdateBlock {
                    label: if payload.is_empty() {
                        None
                    } else {
                        Some(payload.to_string())
                    },
                    assigns: Vec::new(),
                    line: line_no,
                }),
                Section::Loop => {
                    st.loop_block = Some(LoopBlock {
                        count: Expr::Num(1.0),
                        assigns: Vec::new(),
                        line: line_no,
                    });
                    // `#loop: 3` is shorthand for a body-line `count = 3`
                    if !payload.is_empty() {
                        let count = parse_expr(payload)
                            .map_err(|e| ModelError::parse(line_no, "loop", e))?;
                        st.loop_block.as_mut().unwrap().count = count;
                    }
                }
                _ => {}
            }
            continue;
        }

        // Body line of the current section
        match section {
            Section::None => {
                return Err(ModelError::parse(
                    line_no,
                    "model",
                    format!("`{line}` appears before any section"),
                ))
            }
            Section::Comment => {}
            Section::Description => st.description.push(line.to_string()),
            Section::Meta => st.meta.push(line.to_string()),
            Section::Tags => {
                return Err(ModelError::parse(line_no, "tags", "tags must be inline"))
            }
            Section::Name => {
                return Err(ModelError::parse(line_no, "name", "name must be inline"))
            }
            Section::Tolerance => {
                return Err(ModelError::parse(
                    line_no,
                    "tolerance",
                    "tolerance must be inline",
                ))
            }
            Section::Equations => {
                let (text, anno) = take_annotation(line);
                let eq = parse_equation(&text, line_no)?;
                st.equations.push(Equation { anno, ..eq });
            }
            Section::Expressions | Section::Inits | Section::Parameters | Section::Constants => {
                let decl = parse_scalar_line(line, section, line_no)?;
                match section {
                    Section::Expressions => st.expressions.push(decl),
                    Section::Inits => st.inits.push(decl),
                    Section::Parameters => st.parameters.push(decl),
                    Section::Constants => st.constants.push(decl),
                    _ => unreachable!(),
                }
            }
            Section::Argument => {
                let arg = st.arg.as_mut().expect("argument header seen");
                let (text, _anno) = take_annotation(line);
                let (key, op, rhs) = split_assign(&text).ok_or_else(|| {
                    ModelError::parse(line_no, "argument", format!("`{text}` is not `key = value`"))
                })?;
                if op != AssignOp::Set {
                    return Err(ModelError::parse(
                        line_no,
                        "argument",
                        format!("`{}` is only allowed in #update blocks", op.symbol()),
                    ));
                }
                let value = parse_expr(rhs).map_err(|e| ModelError::parse(line_no, "argument", e))?;
                match key {
                    "start" | "initial" | "t0" => arg.start = Some(value),
                    "finish" | "final" | "t1" => arg.finish = Some(value),
                    "step" | "h" => {
                        if let Expr::Num(v) = value {
                            if v <= 0.0 {
                                return Err(ModelError::parse(
                                    line_no,
                                    "argument",
                                    format!("step must be positive, got {v}"),
                                ));
                            }
                        }
                        arg.step = Some(value);
                    }
                    other => {
                        return Err(ModelError::parse(
                            line_no,
                            "argument",
                            format!("unknown argument key `{other}`"),
                        ))
                    }
                }
            }
            Section::Update => {
                let assign = parse_assign_line(line, "update", line_no)?;
                st.updates.last_mut().unwrap().assigns.push(assign);
            }
            Section::Loop => {
                let assign = parse_assign_line(line, "loop", line_no)?;
                let block = st.loop_block.as_mut().unwrap();
                if assign.name == "count" && assign.op == AssignOp::Set {
                    block.count = assign.expr;
                } else {
                    block.assigns.push(assign);
                }
            }
            Section::Output => {
                let (text, anno) = take_annotation(line);
                if !is_ident(&text) {
                    return Err(ModelError::parse(
                        line_no,
                        "output",
                        format!("`{text}` is not a valid output name"),
                    ));
                }
                st.outputs.push((text, anno));
            }
        }
    }

    finish(st)
}

fn parse_equation(text: &str, line_no: usize) -> Result<Equation, ModelError> {
    let bad = |msg: String| ModelError::parse(line_no, "equations", msg);
    let (lhs, op, rhs) = split_assign(text)
        .ok_or_else(|| bad(format!("`{text}` is not of the form d<state>/d<arg> = <expr>")))?;
    if op != AssignOp::Set {
        return Err(bad(format!(
            "`{}` is only allowed in #update blocks",
            op.symbol()
        )));
    }
    let (num, den) = lhs
        .split_once('/')
        .ok_or_else(|| bad(format!("`{lhs}` is not of the form d<state>/d<arg>")))?;
    let num = num.trim();
    let den = den.trim();
    let state = num
        .strip_prefix('d')
        .filter(|s| is_ident(s))
        .ok_or_else(|| bad(format!("`{num}` should be d<state>")))?;
    let arg = den
        .strip_prefix('d')
        .filter(|s| is_ident(s))
        .ok_or_else(|| bad(format!("`{den}` should be d<arg>")))?;
    let rhs = parse_expr(rhs).map_err(|e| ModelError::parse(line_no, "equations", e))?;
    Ok(Equation {
        state: state.to_string(),
        rhs,
        anno: Annotation::default(),
        line: line_no,
        arg: arg.to_string(),
    })
}

fn parse_scalar_line(
    line: &str,
    section: Section,
    line_no: usize,
) -> Result<ScalarDecl, ModelError> {
    let sec = section.label();
    let (text, anno) = take_annotation(line);
    let (name, op, rhs) = split_assign(&text)
        .ok_or_else(|| ModelError::parse(line_no, sec, format!("`{text}` is not `name = expr`")))?;
    if op != AssignOp::Set {
        return Err(ModelError::parse(
            line_no,
            sec,
            format!("`{}` is only allowed in #update blocks", op.symbol()),
        ));
    }
    if !is_ident(name) {
        return Err(ModelError::parse(
            line_no,
            sec,
            format!("`{name}` is not a valid identifier"),
        ));
    }
    let expr = parse_expr(rhs).map_err(|e| ModelError::parse(line_no, sec, e))?;
    Ok(ScalarDecl {
        name: name.to_string(),
        expr,
        anno,
        line: line_no,
    })
}

fn parse_assign_line(line: &str, sec: &str, line_no: usize) -> Result<Assign, ModelError> {
    let (text, anno) = take_annotation(line);
    let (name, op, rhs) = split_assign(&text)
        .ok_or_else(|| ModelError::parse(line_no, sec, format!("`{text}` is not an assignment")))?;
    if !is_ident(name) {
        return Err(ModelError::parse(
            line_no,
            sec,
            format!("`{name}` is not a valid identifier"),
        ));
    }
    let expr = parse_expr(rhs).map_err(|e| ModelError::parse(line_no, sec, e))?;
    Ok(Assign {
        name: name.to_string(),
        op,
        expr,
        anno,
        line: line_no,
    })
}

fn finish(st: ParseState) -> Result<Model, ModelError> {
    let name = match st.name {
        Some(n) if !n.is_empty() => n,
        _ => return Err(ModelError::parse(1, "name", "missing #name section")),
    };
    if st.equations.is_empty() {
        return Err(ModelError::parse(1, "equations", "no equations declared"));
    }
    let partial = st
        .arg
        .ok_or_else(|| ModelError::parse(1, "argument", "missing #argument section"))?;
    let arg = ArgDecl {
        start: partial.start.ok_or_else(|| {
            ModelError::parse(partial.line, "argument", "missing `start` value")
        })?,
        finish: partial.finish.ok_or_else(|| {
            ModelError::parse(partial.line, "argument", "missing `finish` value")
        })?,
        step: partial
            .step
            .ok_or_else(|| ModelError::parse(partial.line, "argument", "missing `step` value"))?,
        name: partial.name,
        stage_label: partial.stage_label,
        line: partial.line,
    };

    // Duplicate state declarations
    for (i, eq) in st.equations.iter().enumerate() {
        if st.equations[..i].iter().any(|e| e.state == eq.state) {
            return Err(ModelError::parse(
                eq.line,
                "equations",
                format!("state `{}` declared twice", eq.state),
            ));
        }
    }
    // Every equation differentiates by the declared argument
    for eq in &st.equations {
        if eq.arg != arg.name {
            return Err(ModelError::parse(
                eq.line,
                "equations",
                format!(
                    "d{}/d{} differentiates by `{}`, but the argument is `{}`",
                    eq.state, eq.arg, eq.arg, arg.name
                ),
            ));
        }
    }
    // Inits must refer to states, once each, and every state needs one
    for (i, init) in st.inits.iter().enumerate() {
        if !st.equations.iter().any(|e| e.state == init.name) {
            return Err(ModelError::parse(
                init.line,
                "inits",
                format!("`{}` is not a state", init.name),
            ));
        }
        if st.inits[..i].iter().any(|other| other.name == init.name) {
            return Err(ModelError::parse(
                init.line,
                "inits",
                format!("`{}` initialized twice", init.name),
            ));
        }
    }
    for eq in &st.equations {
        if !st.inits.iter().any(|i| i.name == eq.state) {
            return Err(ModelError::parse(
                eq.line,
                "inits",
                format!("state `{}` has no initial value", eq.state),
            ));
        }
    }
    // One flat namespace: no identifier may be declared in two categories
    {
        let mut seen: Vec<(&str, usize)> = st
            .equations
            .iter()
            .map(|e| (e.state.as_str(), e.line))
            .collect();
        for d in st
            .expressions
            .iter()
            .chain(&st.parameters)
            .chain(&st.constants)
        {
            seen.push((d.name.as_str(), d.line));
        }
        seen.sort();
        for pair in seen.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ModelError::parse(
                    pair[1].1.max(pair[0].1),
                    "model",
                    format!("`{}` is declared more than once", pair[0].0),
                ));
            }
        }
    }
    // Outputs must name states or expressions
    for (out, _) in &st.outputs {
        let known = st.equations.iter().any(|e| e.state == *out)
            || st.expressions.iter().any(|d| d.name == *out);
        if !known {
            return Err(ModelError::parse(
                1,
                "output",
                format!("`{out}` is neither a state nor an expression"),
            ));
        }
    }

    Ok(Model {
        name,
        tags: st.tags,
        description: if st.description.is_empty() {
            None
        } else {
            Some(st.description.join("\n"))
        },
        meta: st.meta,
        equations: st.equations,
        expressions: st.expressions,
        arg,
        inits: st.inits,
        parameters: st.parameters,
        constants: st.constants,
        updates: st.updates,
        loop_block: st.loop_block,
        outputs: st.outputs,
        tolerance: st.tolerance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECAY: &str = "\
#name: Decay
#equations:
  dx/dt = -k * x
#argument: t
  start = 0
  finish = 1
  step = 0.1
#inits:
  x = 1
#parameters:
  k = 2.5 {category: Rates} [decay rate]
";

    #[test]
    fn parses_a_minimal_model() {
        let m = parse(DECAY).unwrap();
        assert_eq!(m.name, "Decay");
        assert_eq!(m.state_names(), vec!["x"]);
        assert_eq!(m.arg.name, "t");
        assert_eq!(m.parameters.len(), 1);
        assert_eq!(m.parameters[0].anno.meta.as_deref(), Some("category: Rates"));
        assert_eq!(m.parameters[0].anno.note.as_deref(), Some("decay rate"));
        assert!(m.updates.is_empty());
    }

    #[test]
    fn rejects_unknown_section() {
        let src = DECAY.to_string() + "#frobnicate:\n  x = 1\n";
        let err = parse(&src).unwrap_err();
        match err {
            ModelError::Parse { section, .. } => assert_eq!(section, "frobnicate"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_derivative_argument() {
        let src = DECAY.replace("dx/dt", "dx/dz");
        let err = parse(&src).unwrap_err();
        match err {
            ModelError::Parse { line, section, message } => {
                assert_eq!(line, 3);
                assert_eq!(section, "equations");
                assert!(message.contains("`z`"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_state() {
        let src = DECAY.replace(
            "  dx/dt = -k * x\n",
            "  dx/dt = -k * x\n  dx/dt = x\n",
        );
        assert!(parse(&src).is_err());
    }

    #[test]
    fn rejects_compound_assign_outside_update() {
        let src = DECAY.replace("k = 2.5", "k += 2.5");
        let err = parse(&src).unwrap_err();
        match err {
            ModelError::Parse { section, message, .. } => {
                assert_eq!(section, "parameters");
                assert!(message.contains("#update"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_nonpositive_step() {
        let src = DECAY.replace("step = 0.1", "step = 0");
        assert!(parse(&src).is_err());
    }

    #[test]
    fn rejects_init_for_non_state() {
        let src = DECAY.replace("  x = 1\n", "  x = 1\n  w = 2\n");
        let err = parse(&src).unwrap_err();
        match err {
            ModelError::Parse { section, .. } => assert_eq!(section, "inits"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stage_labels_and_updates() {
        let src = "\
#name: Staged
#equations:
  dx/dt = -x
#argument: t, 1-st stage
  start = 0
  finish = 10
  step = 1
#update: 2-nd stage
  duration = 5
  x += 70
#inits:
  x = 1
";
        let m = parse(src).unwrap();
        assert_eq!(m.arg.stage_label.as_deref(), Some("1-st stage"));
        assert_eq!(m.updates.len(), 1);
        let u = &m.updates[0];
        assert_eq!(u.label.as_deref(), Some("2-nd stage"));
        assert_eq!(u.assigns.len(), 2);
        assert_eq!(u.assigns[1].op, AssignOp::Add);
    }

    #[test]
    fn comments_are_ignored() {
        let src = DECAY.to_string() + "#comment:\n  anything dx/dz = at all\n";
        assert!(parse(&src).is_ok());
        let src2 = DECAY.replace("finish = 1", "finish = 1 // end of run");
        assert!(parse(&src2).is_ok());
    }
}
