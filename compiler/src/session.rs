use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::passes::PassManager;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::values::FunctionValue;
use inkwell::OptimizationLevel;

use crate::ast::{Expr, FunctionDef, Prototype, TopLevel};
use crate::codegen::Compiler;
use crate::error::{Error, SessionError};

/// Reserved name for the synthetic zero-argument function wrapping a
/// top-level expression. Never visible to user programs and removed from
/// the prototype table after every evaluation.
pub const ANON_FN_NAME: &str = "__anon_expr";

type AnonEntry = unsafe extern "C" fn() -> f64;

// Host-native functions resolvable from JITed code.
fn native_symbols() -> [(&'static str, usize); 1] {
    [("putchard", finch_runtime::putchard as usize)]
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Defined(String),
    Declared(String),
    Value(f64),
}

/// One incremental compile-and-execute session.
///
/// Each top-level unit is lowered into its own module. A definition's module
/// becomes the live compilation unit for that function name (replacing, and
/// thereby unloading, any earlier unit of the same name, so redefinition is
/// newest-wins). An expression's module is executed and discarded. The
/// prototype table outlives all modules and is what makes forward references
/// and cross-unit calls resolve.
pub struct Session<'ctx> {
    context: &'ctx Context,
    builder: Builder<'ctx>,
    module: Module<'ctx>,
    fpm: PassManager<FunctionValue<'ctx>>,
    protos: HashMap<String, Prototype>,
    defined: HashMap<String, Module<'ctx>>,
    unit_counter: usize,
}

impl<'ctx> Session<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<Self, Error> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(SessionError::TargetInit)?;

        let builder = context.create_builder();
        let (module, fpm) = Self::fresh_unit(context, 0);

        Ok(Self {
            context,
            builder,
            module,
            fpm,
            protos: HashMap::new(),
            defined: HashMap::new(),
            unit_counter: 0,
        })
    }

    pub fn handle_unit(&mut self, unit: TopLevel) -> Result<UnitOutcome, Error> {
        match unit {
            TopLevel::Definition(def) => {
                let name = self.handle_definition(def)?;
                Ok(UnitOutcome::Defined(name))
            }
            TopLevel::Extern(proto) => {
                let name = self.handle_extern(proto)?;
                Ok(UnitOutcome::Declared(name))
            }
            TopLevel::Expression(expr) => {
                let value = self.handle_expression(expr)?;
                Ok(UnitOutcome::Value(value))
            }
        }
    }

    /// Declares a signature without a body and records it for later
    /// forward-reference resolution. The latest declaration wins.
    pub fn handle_extern(&mut self, proto: Prototype) -> Result<String, Error> {
        let mut compiler = Compiler::new(
            self.context,
            &self.builder,
            &self.module,
            &self.fpm,
            &mut self.protos,
        );
        compiler.lower_prototype(&proto)?;

        let name = proto.name.clone();
        self.protos.insert(name.clone(), proto);
        Ok(name)
    }

    /// Lowers a definition into the current module and promotes that module
    /// to the live compilation unit for the function's name.
    pub fn handle_definition(&mut self, def: FunctionDef) -> Result<String, Error> {
        let name = def.proto.name.clone();

        let mut compiler = Compiler::new(
            self.context,
            &self.builder,
            &self.module,
            &self.fpm,
            &mut self.protos,
        );
        if let Err(err) = compiler.lower_function(&def) {
            self.discard_module();
            return Err(err.into());
        }

        let unit = self.rotate_module();
        // a superseded definition's code is unloaded with its module
        self.defined.insert(name.clone(), unit);
        Ok(name)
    }

    /// Wraps the expression in an anonymous function, executes it, and
    /// unloads the transient unit once the call has returned.
    pub fn handle_expression(&mut self, expr: Expr) -> Result<f64, Error> {
        let def = FunctionDef {
            proto: Prototype {
                name: ANON_FN_NAME.to_string(),
                params: Vec::new(),
            },
            body: expr,
        };

        let mut compiler = Compiler::new(
            self.context,
            &self.builder,
            &self.module,
            &self.fpm,
            &mut self.protos,
        );
        let lowered = compiler.lower_function(&def);
        // the reserved name must never persist across units
        self.protos.remove(ANON_FN_NAME);
        if let Err(err) = lowered {
            self.discard_module();
            return Err(err.into());
        }

        let unit = self.rotate_module();
        self.execute_anonymous(&unit)
        // `unit` is dropped here, discarding the anonymous code
    }

    fn fresh_unit(
        context: &'ctx Context,
        n: usize,
    ) -> (Module<'ctx>, PassManager<FunctionValue<'ctx>>) {
        let module = context.create_module(&format!("unit{}", n));
        let fpm = PassManager::create(&module);
        fpm.add_instruction_combining_pass();
        fpm.add_reassociate_pass();
        fpm.add_gvn_pass();
        fpm.add_cfg_simplification_pass();
        fpm.initialize();
        (module, fpm)
    }

    /// Starts a clean module for the next unit and returns the finished one.
    fn rotate_module(&mut self) -> Module<'ctx> {
        self.unit_counter += 1;
        let (module, fpm) = Self::fresh_unit(self.context, self.unit_counter);
        self.fpm = fpm;
        std::mem::replace(&mut self.module, module)
    }

    fn discard_module(&mut self) {
        let _ = self.rotate_module();
    }

    // Assembles an engine over the anonymous unit plus every live defined
    // unit, runs the anonymous entry point, and detaches all modules so the
    // defined units stay reusable by the next execution.
    fn execute_anonymous(&self, anon: &Module<'ctx>) -> Result<f64, Error> {
        let engine = anon
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| SessionError::Engine(e.to_string()))?;

        for (name, module) in &self.defined {
            if engine.add_module(module).is_err() {
                self.release_modules(&engine, anon);
                return Err(SessionError::ModuleAttach { name: name.clone() }.into());
            }
        }

        self.map_native_symbols(&engine, anon);

        let outcome = match unsafe { engine.get_function::<AnonEntry>(ANON_FN_NAME) } {
            Ok(entry) => Ok(unsafe { entry.call() }),
            Err(err) => Err(SessionError::SymbolNotFound {
                name: ANON_FN_NAME.to_string(),
                detail: err.to_string(),
            }),
        };

        self.release_modules(&engine, anon);
        outcome.map_err(Error::from)
    }

    fn release_modules(&self, engine: &ExecutionEngine<'ctx>, anon: &Module<'ctx>) {
        for module in self.defined.values() {
            let _ = engine.remove_module(module);
        }
        let _ = engine.remove_module(anon);
    }

    // External declarations of host-native functions are pointed at their
    // in-process addresses before execution.
    fn map_native_symbols(&self, engine: &ExecutionEngine<'ctx>, anon: &Module<'ctx>) {
        for (name, addr) in native_symbols() {
            for module in self.defined.values().chain(std::iter::once(anon)) {
                if let Some(decl) = module.get_function(name) {
                    if decl.count_basic_blocks() == 0 {
                        engine.add_global_mapping(&decl, addr);
                    }
                }
            }
        }
    }
}
