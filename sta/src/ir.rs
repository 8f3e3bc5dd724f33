// ir.rs — Arena graph IR: regions, instructions, values
//
// The graph is a tree of regions. Each region holds an ordered list of
// instructions (a doubly linked list threaded through the instruction arena),
// its own parameters, and its returned values. Instructions may own nested
// regions (control-flow bodies). Values are defined by exactly one
// instruction result or region parameter and record every use.
//
// Identifiers are stable: removing an instruction leaves a tombstone in the
// arena, so ids held elsewhere never alias a different instruction.
//
// Preconditions: ids passed in were produced by this graph.
// Postconditions: use lists always mirror instruction operands and region
//   returns; region order is only changed by insert/append/remove.
// Failure modes: `IrError` for removing a used or already removed
//   instruction, duplicate names, and out-of-range operand indices.
//   Deserialized graphs must pass `check_structure` before any other call.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kind::ScalarKind;
use crate::literal::TensorLiteral;
use crate::op::OpKind;

// ── Identifiers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    #[error("instruction {0} has already been removed")]
    Removed(InstId),

    #[error("instruction {inst} still has {uses} use(s) of its results")]
    StillUsed { inst: InstId, uses: usize },

    #[error("value name '%{0}' is already defined")]
    DuplicateName(String),

    #[error("operand index {index} is out of range for instruction {inst}")]
    OperandOutOfRange { inst: InstId, index: usize },

    #[error("malformed graph: {0}")]
    Malformed(String),
}

// ── Attributes ──────────────────────────────────────────────────────────────

/// Literal payload attached to an instruction by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attr {
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Tensor(TensorLiteral),
}

impl Attr {
    pub fn as_tensor(&self) -> Option<&TensorLiteral> {
        match self {
            Attr::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Attr::Int(i) => Some(*i),
            _ => None,
        }
    }
}

// ── Values ──────────────────────────────────────────────────────────────────

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueDef {
    /// The `index`-th result of an instruction.
    Result { inst: InstId, index: usize },
    /// The `index`-th parameter of a region.
    Param { region: RegionId, index: usize },
}

/// One consumer of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Use {
    Operand { inst: InstId, index: usize },
    Return { region: RegionId, index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueData {
    name: String,
    kind: Option<ScalarKind>,
    def: ValueDef,
    uses: Vec<Use>,
}

impl ValueData {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scalar-kind annotation, if one was recorded.
    pub fn kind(&self) -> Option<ScalarKind> {
        self.kind
    }

    pub fn def(&self) -> ValueDef {
        self.def
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

// ── Instructions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    op: OpKind,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
    attrs: BTreeMap<String, Attr>,
    regions: Vec<RegionId>,
    parent: RegionId,
    prev: Option<InstId>,
    next: Option<InstId>,
    removed: bool,
}

impl Instruction {
    pub fn op(&self) -> &OpKind {
        &self.op
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn attrs(&self) -> &BTreeMap<String, Attr> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.get(name)
    }

    /// Nested regions owned by this instruction.
    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    /// Region this instruction lives in.
    pub fn parent(&self) -> RegionId {
        self.parent
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

// ── Regions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    owner: Option<InstId>,
    params: Vec<ValueId>,
    returns: Vec<ValueId>,
    first: Option<InstId>,
    last: Option<InstId>,
}

impl Region {
    fn new(owner: Option<InstId>) -> Self {
        Region {
            owner,
            params: Vec::new(),
            returns: Vec::new(),
            first: None,
            last: None,
        }
    }

    /// Instruction owning this region; `None` for the root.
    pub fn owner(&self) -> Option<InstId> {
        self.owner
    }

    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    pub fn returns(&self) -> &[ValueId] {
        &self.returns
    }
}

// ── Graph ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    insts: Vec<Instruction>,
    values: Vec<ValueData>,
    regions: Vec<Region>,
    names: BTreeSet<String>,
    next_name: u32,
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

impl Graph {
    /// Create a graph holding only an empty root region.
    pub fn new() -> Self {
        Graph {
            insts: Vec::new(),
            values: Vec::new(),
            regions: vec![Region::new(None)],
            names: BTreeSet::new(),
            next_name: 0,
        }
    }

    pub fn root(&self) -> RegionId {
        RegionId(0)
    }

    // ── Lookup ──

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.0 as usize]
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0 as usize]
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn kind(&self, value: ValueId) -> Option<ScalarKind> {
        self.value(value).kind
    }

    pub fn name(&self, value: ValueId) -> &str {
        &self.value(value).name
    }

    /// Instruction producing `value`, or `None` for region parameters.
    pub fn producer(&self, value: ValueId) -> Option<InstId> {
        match self.value(value).def {
            ValueDef::Result { inst, .. } => Some(inst),
            ValueDef::Param { .. } => None,
        }
    }

    pub fn users(&self, value: ValueId) -> &[Use] {
        &self.value(value).uses
    }

    /// Number of uses across all results of `inst`.
    pub fn result_uses(&self, inst: InstId) -> usize {
        self.inst(inst)
            .outputs
            .iter()
            .map(|&v| self.value(v).uses.len())
            .sum()
    }

    /// Instructions of `region` in order.
    pub fn insts_of(&self, region: RegionId) -> Vec<InstId> {
        let mut out = Vec::new();
        let mut cursor = self.region(region).first;
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.inst(id).next;
        }
        out
    }

    /// Every live instruction, in arena (creation) order.
    pub fn live_insts(&self) -> impl Iterator<Item = InstId> + '_ {
        self.insts
            .iter()
            .enumerate()
            .filter(|(_, inst)| !inst.removed)
            .map(|(i, _)| InstId(i as u32))
    }

    pub fn inst_count(&self) -> usize {
        self.insts.iter().filter(|inst| !inst.removed).count()
    }

    // ── Names and annotations ──

    /// Reserve a value name not used anywhere in the graph.
    ///
    /// With a hint, tries `hint`, then `hint.1`, `hint.2`, ... (a trailing
    /// numeric suffix on the hint is dropped first). Without one, allocates
    /// the next free number.
    pub fn fresh_name(&mut self, hint: Option<&str>) -> String {
        if let Some(hint) = hint {
            let base = match hint.rsplit_once('.') {
                Some((prefix, suffix))
                    if !prefix.is_empty()
                        && !suffix.is_empty()
                        && suffix.bytes().all(|b| b.is_ascii_digit()) =>
                {
                    prefix
                }
                _ => hint,
            };
            let mut candidate = base.to_string();
            let mut n = 1;
            while self.names.contains(&candidate) {
                candidate = format!("{base}.{n}");
                n += 1;
            }
            self.names.insert(candidate.clone());
            return candidate;
        }
        loop {
            let candidate = self.next_name.to_string();
            self.next_name += 1;
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    pub fn rename(&mut self, value: ValueId, name: &str) -> Result<(), IrError> {
        if self.value(value).name == name {
            return Ok(());
        }
        if !self.names.insert(name.to_string()) {
            return Err(IrError::DuplicateName(name.to_string()));
        }
        let old = std::mem::replace(&mut self.values[value.0 as usize].name, name.to_string());
        self.names.remove(&old);
        Ok(())
    }

    /// Give `value` a fresh name derived from `hint`, releasing its old one.
    pub fn rename_fresh(&mut self, value: ValueId, hint: &str) {
        let name = self.fresh_name(Some(hint));
        let old = std::mem::replace(&mut self.values[value.0 as usize].name, name);
        self.names.remove(&old);
    }

    /// Rename several values at once. All old names are released before any
    /// new name is claimed, so values may trade names among themselves.
    pub fn rename_all(&mut self, renames: &[(ValueId, &str)]) -> Result<(), IrError> {
        let mut wanted = BTreeSet::new();
        for &(_, name) in renames {
            if !wanted.insert(name) {
                return Err(IrError::DuplicateName(name.to_string()));
            }
        }
        let released: BTreeSet<&str> = renames.iter().map(|&(v, _)| self.name(v)).collect();
        if let Some(&(_, taken)) = renames
            .iter()
            .find(|&&(_, name)| self.names.contains(name) && !released.contains(name))
        {
            return Err(IrError::DuplicateName(taken.to_string()));
        }
        for &(value, _) in renames {
            let old = std::mem::take(&mut self.values[value.0 as usize].name);
            self.names.remove(&old);
        }
        for &(value, name) in renames {
            self.names.insert(name.to_string());
            self.values[value.0 as usize].name = name.to_string();
        }
        Ok(())
    }

    /// Short human-readable reference to an instruction for diagnostics.
    pub fn describe(&self, inst: InstId) -> String {
        let i = self.inst(inst);
        match i.outputs.first() {
            Some(&v) => format!("{} (%{})", i.op, self.name(v)),
            None => i.op.to_string(),
        }
    }

    pub fn set_kind(&mut self, value: ValueId, kind: ScalarKind) {
        self.values[value.0 as usize].kind = Some(kind);
    }

    pub fn set_attr(&mut self, inst: InstId, name: &str, attr: Attr) {
        self.insts[inst.0 as usize]
            .attrs
            .insert(name.to_string(), attr);
    }

    // ── Construction ──

    // ── Structure ──

    /// Check the arena invariants every accessor relies on: a root region,
    /// every id in range, instruction lists acyclic and each instruction and
    /// region linked exactly once below the root, definitions pointing back
    /// at their values, unique names, and valid literal payloads.
    ///
    /// Graphs built through this API always pass. Deserialized ones may not.
    pub fn check_structure(&self) -> Result<(), IrError> {
        let malformed = |msg: String| Err(IrError::Malformed(msg));
        let root = match self.regions.first() {
            Some(root) => root,
            None => return malformed("graph has no root region".to_string()),
        };
        if root.owner.is_some() {
            return malformed("root region has an owner".to_string());
        }

        let inst_ok = |id: InstId| (id.0 as usize) < self.insts.len();
        let value_ok = |id: ValueId| (id.0 as usize) < self.values.len();
        let region_ok = |id: RegionId| (id.0 as usize) < self.regions.len();

        for (i, inst) in self.insts.iter().enumerate() {
            let id = InstId(i as u32);
            let values_in_range = inst.inputs.iter().chain(&inst.outputs).all(|&v| value_ok(v));
            let links_in_range = inst.prev.into_iter().chain(inst.next).all(inst_ok);
            if !values_in_range
                || !links_in_range
                || !region_ok(inst.parent)
                || !inst.regions.iter().all(|&r| region_ok(r))
            {
                return malformed(format!("instruction {} refers to a missing id", id));
            }
            for (name, attr) in &inst.attrs {
                if let Attr::Tensor(t) = attr {
                    if let Err(err) = TensorLiteral::new(t.kind(), t.dims().to_vec(), t.data().clone()) {
                        return malformed(format!("attribute '{}' of instruction {}: {}", name, id, err));
                    }
                }
            }
        }

        let mut seen_names = BTreeSet::new();
        for (i, value) in self.values.iter().enumerate() {
            let id = ValueId(i as u32);
            let defined = match value.def {
                ValueDef::Result { inst, index } => {
                    inst_ok(inst) && self.insts[inst.0 as usize].outputs.get(index) == Some(&id)
                }
                ValueDef::Param { region, index } => {
                    region_ok(region) && self.regions[region.0 as usize].params.get(index) == Some(&id)
                }
            };
            if !defined {
                return malformed(format!("value '%{}' has no matching definition", value.name));
            }
            let uses_in_range = value.uses.iter().all(|u| match *u {
                Use::Operand { inst, .. } => inst_ok(inst),
                Use::Return { region, .. } => region_ok(region),
            });
            if !uses_in_range {
                return malformed(format!("value '%{}' records a use outside the graph", value.name));
            }
            if !seen_names.insert(value.name.as_str()) || !self.names.contains(&value.name) {
                return malformed(format!("value name '%{}' is duplicated or unreserved", value.name));
            }
        }

        for (i, region) in self.regions.iter().enumerate() {
            let values_in_range = region.params.iter().chain(&region.returns).all(|&v| value_ok(v));
            let links_in_range = region
                .owner
                .into_iter()
                .chain(region.first)
                .chain(region.last)
                .all(inst_ok);
            if !values_in_range || !links_in_range {
                return malformed(format!("region {} refers to a missing id", i));
            }
        }

        // Walk the region tree from the root; every list must end within
        // the arena size and nothing may be reached twice.
        let mut linked = vec![false; self.insts.len()];
        let mut reached = vec![false; self.regions.len()];
        let mut pending = vec![RegionId(0)];
        reached[0] = true;
        while let Some(region) = pending.pop() {
            let mut prev = None;
            let mut cursor = self.regions[region.0 as usize].first;
            while let Some(id) = cursor {
                let inst = &self.insts[id.0 as usize];
                if linked[id.0 as usize] {
                    return malformed(format!("instruction {} is linked more than once", id));
                }
                linked[id.0 as usize] = true;
                if inst.removed || inst.parent != region || inst.prev != prev {
                    return malformed(format!("instruction {} is linked inconsistently", id));
                }
                for &nested in &inst.regions {
                    let r = nested.0 as usize;
                    if reached[r] || self.regions[r].owner != Some(id) {
                        return malformed(format!("region {} is owned inconsistently", r));
                    }
                    reached[r] = true;
                    pending.push(nested);
                }
                prev = Some(id);
                cursor = inst.next;
            }
            if self.regions[region.0 as usize].last != prev {
                return malformed(format!("region {} has a stale last instruction", region.0));
            }
        }
        if let Some(i) = (0..self.insts.len()).find(|&i| !self.insts[i].removed && !linked[i]) {
            return malformed(format!("instruction #{} is not linked into any region", i));
        }
        // Bodies of removed instructions stay in the arena, empty.
        let orphan = self.regions.iter().enumerate().find(|&(r, region)| {
            let dead_body = region
                .owner
                .is_some_and(|owner| self.insts[owner.0 as usize].removed && region.first.is_none());
            !reached[r] && !dead_body
        });
        if let Some((r, _)) = orphan {
            return malformed(format!("region {} is not reachable from the root", r));
        }
        Ok(())
    }

    fn add_value(&mut self, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        let name = self.fresh_name(None);
        self.values.push(ValueData {
            name,
            kind: None,
            def,
            uses: Vec::new(),
        });
        id
    }

    /// Append a parameter to `region`.
    pub fn add_param(&mut self, region: RegionId, kind: Option<ScalarKind>) -> ValueId {
        let index = self.region(region).params.len();
        let value = self.add_value(ValueDef::Param { region, index });
        self.values[value.0 as usize].kind = kind;
        self.regions[region.0 as usize].params.push(value);
        value
    }

    fn create(&mut self, op: OpKind, inputs: &[ValueId], outputs: usize, parent: RegionId) -> InstId {
        let id = InstId(self.insts.len() as u32);
        for (index, &v) in inputs.iter().enumerate() {
            self.values[v.0 as usize]
                .uses
                .push(Use::Operand { inst: id, index });
        }
        self.insts.push(Instruction {
            op,
            inputs: inputs.to_vec(),
            outputs: Vec::new(),
            attrs: BTreeMap::new(),
            regions: Vec::new(),
            parent,
            prev: None,
            next: None,
            removed: false,
        });
        for index in 0..outputs {
            let value = self.add_value(ValueDef::Result { inst: id, index });
            self.insts[id.0 as usize].outputs.push(value);
        }
        id
    }

    /// Create an instruction at the end of `region`.
    pub fn append(&mut self, region: RegionId, op: OpKind, inputs: &[ValueId], outputs: usize) -> InstId {
        let id = self.create(op, inputs, outputs, region);
        let last = self.region(region).last;
        self.insts[id.0 as usize].prev = last;
        match last {
            Some(prev) => self.insts[prev.0 as usize].next = Some(id),
            None => self.regions[region.0 as usize].first = Some(id),
        }
        self.regions[region.0 as usize].last = Some(id);
        id
    }

    /// Create an instruction immediately before `anchor`, in its region.
    pub fn insert_before(&mut self, anchor: InstId, op: OpKind, inputs: &[ValueId], outputs: usize) -> InstId {
        let region = self.inst(anchor).parent;
        let id = self.create(op, inputs, outputs, region);
        let prev = self.inst(anchor).prev;
        self.insts[id.0 as usize].prev = prev;
        self.insts[id.0 as usize].next = Some(anchor);
        self.insts[anchor.0 as usize].prev = Some(id);
        match prev {
            Some(p) => self.insts[p.0 as usize].next = Some(id),
            None => self.regions[region.0 as usize].first = Some(id),
        }
        id
    }

    /// Create an empty nested region owned by `owner`.
    pub fn add_region(&mut self, owner: InstId) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(Region::new(Some(owner)));
        self.insts[owner.0 as usize].regions.push(id);
        id
    }

    pub fn set_returns(&mut self, region: RegionId, values: &[ValueId]) {
        let old = std::mem::take(&mut self.regions[region.0 as usize].returns);
        for (index, v) in old.into_iter().enumerate() {
            self.drop_use(v, Use::Return { region, index });
        }
        for (index, &v) in values.iter().enumerate() {
            self.values[v.0 as usize]
                .uses
                .push(Use::Return { region, index });
        }
        self.regions[region.0 as usize].returns = values.to_vec();
    }

    // ── Mutation ──

    /// Make operand `index` of `inst` read `new`.
    pub fn replace_input(&mut self, inst: InstId, index: usize, new: ValueId) -> Result<(), IrError> {
        let old = match self.inst(inst).inputs.get(index) {
            Some(&v) => v,
            None => return Err(IrError::OperandOutOfRange { inst, index }),
        };
        if old == new {
            return Ok(());
        }
        self.drop_use(old, Use::Operand { inst, index });
        self.values[new.0 as usize]
            .uses
            .push(Use::Operand { inst, index });
        self.insts[inst.0 as usize].inputs[index] = new;
        Ok(())
    }

    /// Remove an instruction whose results are unused, together with its
    /// nested regions.
    pub fn remove(&mut self, inst: InstId) -> Result<(), IrError> {
        if self.inst(inst).removed {
            return Err(IrError::Removed(inst));
        }
        let uses = self.result_uses(inst);
        if uses > 0 {
            return Err(IrError::StillUsed { inst, uses });
        }
        self.destroy(inst);
        Ok(())
    }

    fn destroy(&mut self, inst: InstId) {
        for region in self.inst(inst).regions.clone() {
            self.set_returns(region, &[]);
            for nested in self.insts_of(region).into_iter().rev() {
                self.destroy(nested);
            }
        }
        for (index, v) in self.inst(inst).inputs.clone().into_iter().enumerate() {
            self.drop_use(v, Use::Operand { inst, index });
        }
        self.unlink(inst);
        self.insts[inst.0 as usize].removed = true;
    }

    fn unlink(&mut self, inst: InstId) {
        let (prev, next, region) = {
            let i = self.inst(inst);
            (i.prev, i.next, i.parent)
        };
        match prev {
            Some(p) => self.insts[p.0 as usize].next = next,
            None => self.regions[region.0 as usize].first = next,
        }
        match next {
            Some(n) => self.insts[n.0 as usize].prev = prev,
            None => self.regions[region.0 as usize].last = prev,
        }
        let i = &mut self.insts[inst.0 as usize];
        i.prev = None;
        i.next = None;
    }

    fn drop_use(&mut self, value: ValueId, u: Use) {
        let uses = &mut self.values[value.0 as usize].uses;
        if let Some(pos) = uses.iter().position(|x| *x == u) {
            uses.remove(pos);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
