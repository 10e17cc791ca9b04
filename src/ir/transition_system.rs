// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{Context, ExprRef, Sort, StringRef};
use crate::error::{Error, Result};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct StateVariable {
    pub name: StringRef,
    pub sort: Sort,
}

/// Ordered, name-unique list of state variables.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct StateSignature {
    vars: Vec<StateVariable>,
}

impl StateSignature {
    /// Builds a signature for the system `id`. Fails on duplicate names.
    pub fn new(ctx: &mut Context, id: &str, vars: &[(&str, Sort)]) -> Result<Self> {
        let mut sig = StateSignature::default();
        for (name, sort) in vars.iter() {
            let name_ref = ctx.string((*name).into());
            sig.push(ctx, id, StateVariable {
                name: name_ref,
                sort: *sort,
            })?;
        }
        Ok(sig)
    }

    pub(crate) fn push(&mut self, ctx: &Context, id: &str, var: StateVariable) -> Result<()> {
        if self.find(var.name).is_some() {
            return Err(Error::declaration(
                id,
                format!("state variable `{}` is declared twice", ctx.get_str(var.name)),
            ));
        }
        self.vars.push(var);
        Ok(())
    }

    pub fn find(&self, name: StringRef) -> Option<(usize, &StateVariable)> {
        self.vars.iter().enumerate().find(|(_, v)| v.name == name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateVariable> + '_ {
        self.vars.iter()
    }

    pub fn as_slice(&self) -> &[StateVariable] {
        &self.vars
    }
}

/// Binds the signature of `system` positionally. Each formal receives one actual term for the
/// current and one for the next state.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubsystemInstance {
    pub system: String,
    pub args: Vec<(ExprRef, ExprRef)>,
}

impl SubsystemInstance {
    pub fn new(system: impl ToString, args: Vec<(ExprRef, ExprRef)>) -> Self {
        Self {
            system: system.to_string(),
            args,
        }
    }

    /// Path component used to qualify the internal variables of this instance.
    pub fn label(&self, position: usize) -> String {
        format!("{}#{position}", self.system)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TransitionSystem {
    pub name: String,
    /// Interface variables, bound positionally by every instance.
    pub signature: StateSignature,
    /// Internal state. Never bound by an instance, renamed when flattened into a parent.
    pub locals: StateSignature,
    /// Constrains the current state only.
    pub init: ExprRef,
    /// Relates the current and the next state.
    pub trans: ExprRef,
    pub composition: Vec<SubsystemInstance>,
}

impl TransitionSystem {
    pub fn new(
        name: impl ToString,
        signature: StateSignature,
        init: ExprRef,
        trans: ExprRef,
    ) -> Self {
        TransitionSystem {
            name: name.to_string(),
            signature,
            locals: StateSignature::default(),
            init,
            trans,
            composition: vec![],
        }
    }

    pub fn with_locals(mut self, locals: StateSignature) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_instance(mut self, instance: SubsystemInstance) -> Self {
        self.composition.push(instance);
        self
    }

    /// Looks up an interface or local variable.
    pub fn find_var(&self, name: StringRef) -> Option<&StateVariable> {
        self.signature
            .find(name)
            .or_else(|| self.locals.find(name))
            .map(|(_, v)| v)
    }

    /// Interface variables followed by local variables.
    pub fn variables(&self) -> impl Iterator<Item = &StateVariable> + '_ {
        self.signature.iter().chain(self.locals.iter())
    }

    pub fn subsystems(&self) -> impl Iterator<Item = &str> + '_ {
        self.composition.iter().map(|i| i.system.as_str())
    }
}
