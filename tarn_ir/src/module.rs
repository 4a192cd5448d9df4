//! Module container owning every compiled function

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::IrError;
use crate::function::{FuncId, Function};

/// The function arena for one analyzed program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    funcs: Vec<Function>,
    by_name: IndexMap<String, FuncId>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function and return its id.
    pub fn add_function(&mut self, name: impl Into<String>) -> FuncId {
        let name = name.into();
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(Function::new(name.clone()));
        self.by_name.insert(name, id);
        id
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.0 as usize]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.0 as usize]
    }

    /// Look a function up by name. With shadowed names (nested subprograms
    /// may reuse one), the most recently added wins.
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.by_name.get(name).map(|&id| self.func(id))
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.funcs
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId(i as u32), f))
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Validate every function's CFG.
    pub fn validate(&self) -> Result<(), IrError> {
        for func in &self.funcs {
            func.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.funcs {
            writeln!(f, "{}", func)?;
        }
        Ok(())
    }
}
