//! Builtin registry and dispatch
//!
//! Names resolve in two steps: an exact-name lookup, then an ordered list of
//! prefixes where the first registered match wins. Prefix entries cover
//! families whose names carry a width or rounding suffix (`vload4`,
//! `convert_int_sat_rtz`, `llvm.memcpy.p0i8.p0i8.i64`).
//!
//! The registry is built once by [`BuiltinRegistry::new`] and only read
//! afterwards, so it can be shared between threads by reference.

use super::call::Call;
use super::elementwise;
use super::operands::Operands;
use crate::error::{Result, SimError};
use crate::value::TypedValue;
use crate::workitem::WorkItemEnv;
use spirsim_tracing::timed_block;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error};

/// Signature shared by every non-elementwise builtin.
pub type Handler = fn(&mut Call<'_>, &mut TypedValue) -> Result<()>;

/// A registered builtin implementation.
#[derive(Clone, Copy)]
pub enum Builtin {
    /// Handler with full access to the call.
    Call(Handler),
    F1(fn(f64) -> f64),
    F2(fn(f64, f64) -> f64),
    F3(fn(f64, f64, f64) -> f64),
    U1(fn(u64) -> u64),
    U2(fn(u64, u64) -> u64),
    U3(fn(u64, u64, u64) -> u64),
    S1(fn(i64) -> i64),
    S2(fn(i64, i64) -> i64),
    S3(fn(i64, i64, i64) -> i64),
    /// Float predicate, `-1`/`1` per true lane.
    Rel1(fn(f64) -> bool),
    Rel2(fn(f64, f64) -> bool),
}

impl Builtin {
    fn kind(&self) -> &'static str {
        match self {
            Self::Call(_) => "call",
            Self::F1(_) => "f1",
            Self::F2(_) => "f2",
            Self::F3(_) => "f3",
            Self::U1(_) => "u1",
            Self::U2(_) => "u2",
            Self::U3(_) => "u3",
            Self::S1(_) => "s1",
            Self::S2(_) => "s2",
            Self::S3(_) => "s3",
            Self::Rel1(_) => "rel1",
            Self::Rel2(_) => "rel2",
        }
    }

    pub fn invoke(self, call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
        match self {
            Self::Call(handler) => handler(call, result),
            Self::F1(f) => elementwise::f1(call, result, f),
            Self::F2(f) => elementwise::f2(call, result, f),
            Self::F3(f) => elementwise::f3(call, result, f),
            Self::U1(f) => elementwise::u1(call, result, f),
            Self::U2(f) => elementwise::u2(call, result, f),
            Self::U3(f) => elementwise::u3(call, result, f),
            Self::S1(f) => elementwise::s1(call, result, f),
            Self::S2(f) => elementwise::s2(call, result, f),
            Self::S3(f) => elementwise::s3(call, result, f),
            Self::Rel1(f) => elementwise::rel1(call, result, f),
            Self::Rel2(f) => elementwise::rel2(call, result, f),
        }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin::{}", self.kind())
    }
}

/// Name to implementation table.
pub struct BuiltinRegistry {
    exact: HashMap<&'static str, Builtin>,
    prefixes: Vec<(&'static str, Builtin)>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinRegistry {
    /// Registry with every builtin family installed.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        super::atomic::register(&mut registry);
        super::common::register(&mut registry);
        super::geometric::register(&mut registry);
        super::image::register(&mut registry);
        super::integer::register(&mut registry);
        super::math::register(&mut registry);
        super::printf::register(&mut registry);
        super::relational::register(&mut registry);
        super::sync::register(&mut registry);
        super::workitem::register(&mut registry);

        // Prefix order matters: longer names before the names they extend.
        super::vector::register(&mut registry);
        super::conversion::register(&mut registry);
        super::llvm::register(&mut registry);

        debug!(
            exact = registry.exact.len(),
            prefixes = registry.prefixes.len(),
            "builtin registry ready"
        );
        registry
    }

    /// Registry with nothing installed.
    pub fn empty() -> Self {
        Self {
            exact: HashMap::new(),
            prefixes: Vec::new(),
        }
    }

    /// Register `builtin` under an exact name, replacing any previous entry.
    pub fn add(&mut self, name: &'static str, builtin: Builtin) {
        self.exact.insert(name, builtin);
    }

    /// Register `builtin` for every name starting with `prefix`.
    pub fn add_prefix(&mut self, prefix: &'static str, builtin: Builtin) {
        self.prefixes.push((prefix, builtin));
    }

    /// Implementation for `name`: exact match first, then the first prefix.
    pub fn resolve(&self, name: &str) -> Option<Builtin> {
        self.exact.get(name).copied().or_else(|| {
            self.prefixes
                .iter()
                .find(|(prefix, _)| name.starts_with(prefix))
                .map(|(_, builtin)| *builtin)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Run builtin `name` with the given overload suffix and arguments.
    ///
    /// Memory errors raised inside the builtin have already been logged by
    /// [`Memory`](crate::memory::Memory) and do not abort the call; every
    /// other error is returned.
    pub fn dispatch<'a>(
        &self,
        name: &'a str,
        overload: &'a str,
        operands: &'a dyn Operands,
        env: &'a mut dyn WorkItemEnv,
        result: &mut TypedValue,
    ) -> Result<()> {
        let Some(builtin) = self.resolve(name) else {
            error!(builtin = name, overload, "unresolved builtin");
            return Err(SimError::UnresolvedBuiltin(name.to_string()));
        };

        let mut call = Call::new(name, overload, operands, env);
        let (outcome, _) = timed_block!(name, { builtin.invoke(&mut call, result) });
        match outcome {
            Err(err) if err.is_fatal() => {
                error!(builtin = name, overload, error = %err, "builtin failed");
                Err(err)
            }
            Err(err) => {
                debug!(builtin = name, overload, error = %err, "builtin continued after memory error");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

impl fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("exact", &self.exact.len())
            .field("prefixes", &self.prefixes.len())
            .finish()
    }
}
