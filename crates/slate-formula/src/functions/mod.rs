//! Built-in formula functions
//!
//! Every callable name lives in this registry; a call to anything else is an
//! unknown-function fault. That allow-list, together with the closed grammar,
//! is what makes formula evaluation safe against hostile cell content.

pub mod date;
pub mod logical;
pub mod math;
pub mod statistical;

use crate::ast::Expr;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, Value};
use ahash::AHashMap;
use once_cell::sync::Lazy;

/// Eager function: arguments are evaluated (and ranges expanded) up front
pub type EagerFn = fn(&[Value], &EvaluationContext) -> FormulaResult<Value>;

/// Lazy function: receives raw argument expressions and controls their
/// evaluation itself (IF only evaluates the taken branch; AND/OR swallow
/// argument faults)
pub type LazyFn = fn(&[Expr], &EvaluationContext) -> FormulaResult<Value>;

/// Function implementation
pub enum FunctionImpl {
    Eager(EagerFn),
    Lazy(LazyFn),
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (result depends on the clock)
    pub volatile: bool,
}

impl FunctionDef {
    /// Human-readable arity for error messages
    pub fn arity_description(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("{}", max),
            Some(max) => format!("{}..={}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// Access the global function registry
pub fn registry() -> &'static FunctionRegistry {
    &FUNCTION_REGISTRY
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_statistical_functions();
        registry.register_logical_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Whether the named function is volatile
    pub fn is_volatile(&self, name: &str) -> bool {
        self.get(name).map_or(false, |def| def.volatile)
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    fn register_math_functions(&mut self) {
        // ABS
        self.register(FunctionDef {
            name: "ABS",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_abs),
            volatile: false,
        });

        // ROUND
        self.register(FunctionDef {
            name: "ROUND",
            min_args: 1,
            max_args: Some(2),
            implementation: FunctionImpl::Eager(math::fn_round),
            volatile: false,
        });

        // FLOOR
        self.register(FunctionDef {
            name: "FLOOR",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_floor),
            volatile: false,
        });

        // CEIL / CEILING
        self.register(FunctionDef {
            name: "CEIL",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_ceil),
            volatile: false,
        });
        self.register(FunctionDef {
            name: "CEILING",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_ceil),
            volatile: false,
        });

        // TRUNC
        self.register(FunctionDef {
            name: "TRUNC",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_trunc),
            volatile: false,
        });

        // SQRT
        self.register(FunctionDef {
            name: "SQRT",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_sqrt),
            volatile: false,
        });

        // POW / POWER
        self.register(FunctionDef {
            name: "POW",
            min_args: 2,
            max_args: Some(2),
            implementation: FunctionImpl::Eager(math::fn_power),
            volatile: false,
        });
        self.register(FunctionDef {
            name: "POWER",
            min_args: 2,
            max_args: Some(2),
            implementation: FunctionImpl::Eager(math::fn_power),
            volatile: false,
        });

        // EXP
        self.register(FunctionDef {
            name: "EXP",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_exp),
            volatile: false,
        });

        // LOG (natural, or with explicit base)
        self.register(FunctionDef {
            name: "LOG",
            min_args: 1,
            max_args: Some(2),
            implementation: FunctionImpl::Eager(math::fn_log),
            volatile: false,
        });

        // LOG10
        self.register(FunctionDef {
            name: "LOG10",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_log10),
            volatile: false,
        });

        // SIN
        self.register(FunctionDef {
            name: "SIN",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_sin),
            volatile: false,
        });

        // COS
        self.register(FunctionDef {
            name: "COS",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_cos),
            volatile: false,
        });

        // TAN
        self.register(FunctionDef {
            name: "TAN",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_tan),
            volatile: false,
        });

        // ASIN
        self.register(FunctionDef {
            name: "ASIN",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_asin),
            volatile: false,
        });

        // ACOS
        self.register(FunctionDef {
            name: "ACOS",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_acos),
            volatile: false,
        });

        // ATAN
        self.register(FunctionDef {
            name: "ATAN",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_atan),
            volatile: false,
        });

        // DEGREES
        self.register(FunctionDef {
            name: "DEGREES",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_degrees),
            volatile: false,
        });

        // RADIANS
        self.register(FunctionDef {
            name: "RADIANS",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(math::fn_radians),
            volatile: false,
        });

        // MOD
        self.register(FunctionDef {
            name: "MOD",
            min_args: 2,
            max_args: Some(2),
            implementation: FunctionImpl::Eager(math::fn_mod),
            volatile: false,
        });

        // MIN
        self.register(FunctionDef {
            name: "MIN",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Eager(math::fn_min),
            volatile: false,
        });

        // MAX
        self.register(FunctionDef {
            name: "MAX",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Eager(math::fn_max),
            volatile: false,
        });

        // PI
        self.register(FunctionDef {
            name: "PI",
            min_args: 0,
            max_args: Some(0),
            implementation: FunctionImpl::Eager(math::fn_pi),
            volatile: false,
        });

        // E
        self.register(FunctionDef {
            name: "E",
            min_args: 0,
            max_args: Some(0),
            implementation: FunctionImpl::Eager(math::fn_e),
            volatile: false,
        });
    }

    fn register_statistical_functions(&mut self) {
        // SUM
        self.register(FunctionDef {
            name: "SUM",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Eager(statistical::fn_sum),
            volatile: false,
        });

        // AVERAGE
        self.register(FunctionDef {
            name: "AVERAGE",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Eager(statistical::fn_average),
            volatile: false,
        });

        // COUNT
        self.register(FunctionDef {
            name: "COUNT",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Eager(statistical::fn_count),
            volatile: false,
        });

        // MEDIAN
        self.register(FunctionDef {
            name: "MEDIAN",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Eager(statistical::fn_median),
            volatile: false,
        });
    }

    fn register_logical_functions(&mut self) {
        // IF (lazy: only the taken branch is evaluated)
        self.register(FunctionDef {
            name: "IF",
            min_args: 2,
            max_args: Some(3),
            implementation: FunctionImpl::Lazy(logical::fn_if),
            volatile: false,
        });

        // AND
        self.register(FunctionDef {
            name: "AND",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Lazy(logical::fn_and),
            volatile: false,
        });

        // OR
        self.register(FunctionDef {
            name: "OR",
            min_args: 1,
            max_args: None,
            implementation: FunctionImpl::Lazy(logical::fn_or),
            volatile: false,
        });

        // NOT
        self.register(FunctionDef {
            name: "NOT",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Lazy(logical::fn_not),
            volatile: false,
        });
    }

    fn register_date_functions(&mut self) {
        // DATE (lazy: malformed input degrades to an error string)
        self.register(FunctionDef {
            name: "DATE",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Lazy(date::fn_date),
            volatile: false,
        });

        // TIME
        self.register(FunctionDef {
            name: "TIME",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Lazy(date::fn_time),
            volatile: false,
        });

        // TODAY (volatile)
        self.register(FunctionDef {
            name: "TODAY",
            min_args: 0,
            max_args: Some(0),
            implementation: FunctionImpl::Eager(date::fn_today),
            volatile: true,
        });

        // NOW (volatile)
        self.register(FunctionDef {
            name: "NOW",
            min_args: 0,
            max_args: Some(0),
            implementation: FunctionImpl::Eager(date::fn_now),
            volatile: true,
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("SUM").is_some());
        assert!(registry.get("sum").is_some());
        assert!(registry.get("Sum").is_some());
        assert!(registry.get("NOPE").is_none());
    }

    #[test]
    fn test_volatile_flags() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_volatile("TODAY"));
        assert!(registry.is_volatile("NOW"));
        assert!(!registry.is_volatile("SUM"));
        assert!(!registry.is_volatile("MISSING"));
    }

    #[test]
    fn test_arity_description() {
        let registry = FunctionRegistry::new();
        assert_eq!(registry.get("ABS").unwrap().arity_description(), "1");
        assert_eq!(registry.get("IF").unwrap().arity_description(), "2..=3");
        assert_eq!(
            registry.get("SUM").unwrap().arity_description(),
            "at least 1"
        );
    }
}
