use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::passes::PassManager;
use inkwell::types::BasicMetadataTypeEnum;
use inkwell::values::{BasicMetadataValueEnum, FloatValue, FunctionValue, IntValue};
use inkwell::FloatPredicate;

use crate::ast::{BinaryOp, Expr, FunctionDef, Prototype};
use crate::error::CodegenError;

/// Lowers AST nodes into the current module. Every value in the language is
/// an `f64`; comparisons produce 0.0/1.0.
///
/// `env` maps variable names to their SSA values and lives for exactly one
/// function's lowering. `protos` is the session's long-lived prototype table
/// and is how calls resolve to functions compiled in earlier units.
pub struct Compiler<'a, 'ctx> {
    context: &'ctx Context,
    builder: &'a Builder<'ctx>,
    module: &'a Module<'ctx>,
    fpm: &'a PassManager<FunctionValue<'ctx>>,
    protos: &'a mut HashMap<String, Prototype>,
    env: HashMap<String, FloatValue<'ctx>>,
    fn_value: Option<FunctionValue<'ctx>>,
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    pub fn new(
        context: &'ctx Context,
        builder: &'a Builder<'ctx>,
        module: &'a Module<'ctx>,
        fpm: &'a PassManager<FunctionValue<'ctx>>,
        protos: &'a mut HashMap<String, Prototype>,
    ) -> Self {
        Self {
            context,
            builder,
            module,
            fpm,
            protos,
            env: HashMap::new(),
            fn_value: None,
        }
    }

    fn cur_fn(&self) -> Result<FunctionValue<'ctx>, CodegenError> {
        self.fn_value.ok_or(CodegenError::MissingInsertBlock)
    }

    /// Declares `proto` in the current module as `double(double, ...)`.
    /// An existing declaration is reused so a body can attach to a
    /// forward-declared signature.
    pub fn lower_prototype(&mut self, proto: &Prototype) -> Result<FunctionValue<'ctx>, CodegenError> {
        if let Some(existing) = self.module.get_function(&proto.name) {
            if existing.count_params() as usize != proto.params.len() {
                return Err(CodegenError::PrototypeMismatch {
                    name: proto.name.clone(),
                });
            }
            return Ok(existing);
        }

        let f64_type = self.context.f64_type();
        let param_types: Vec<BasicMetadataTypeEnum<'ctx>> =
            vec![f64_type.into(); proto.params.len()];
        let fn_type = f64_type.fn_type(&param_types, false);
        let function = self.module.add_function(&proto.name, fn_type, None);

        for (param, name) in function.get_param_iter().zip(&proto.params) {
            param.into_float_value().set_name(name);
        }

        Ok(function)
    }

    /// Lowers a full definition: registers the prototype (latest wins),
    /// declares the function, seeds the environment from its parameters and
    /// emits the body as the return value. A failed body leaves no trace of
    /// the function in the module.
    pub fn lower_function(&mut self, def: &FunctionDef) -> Result<FunctionValue<'ctx>, CodegenError> {
        let proto = &def.proto;
        self.protos.insert(proto.name.clone(), proto.clone());

        let function = self.lower_prototype(proto)?;
        if function.count_basic_blocks() > 0 {
            return Err(CodegenError::Redefinition {
                name: proto.name.clone(),
            });
        }

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.fn_value = Some(function);

        self.env.clear();
        for (param, name) in function.get_param_iter().zip(&proto.params) {
            self.env.insert(name.clone(), param.into_float_value());
        }

        if let Err(err) = self.lower_body(def) {
            unsafe { function.delete() };
            return Err(err);
        }

        if !function.verify(true) {
            unsafe { function.delete() };
            return Err(CodegenError::InvalidFunction {
                name: proto.name.clone(),
            });
        }

        self.fpm.run_on(&function);
        Ok(function)
    }

    fn lower_body(&mut self, def: &FunctionDef) -> Result<(), CodegenError> {
        let ret_val = self.lower_expr(&def.body)?;
        self.builder.build_return(Some(&ret_val))?;
        Ok(())
    }

    pub fn lower_expr(&mut self, expr: &Expr) -> Result<FloatValue<'ctx>, CodegenError> {
        match expr {
            Expr::Number(value) => Ok(self.context.f64_type().const_float(*value)),

            Expr::Variable(name) => {
                self.env
                    .get(name)
                    .copied()
                    .ok_or_else(|| CodegenError::UndefinedVariable { name: name.clone() })
            }

            Expr::Binary { op, left, right } => {
                let lhs = self.lower_expr(left)?;
                let rhs = self.lower_expr(right)?;
                self.lower_binary(*op, lhs, rhs)
            }

            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch),

            Expr::For {
                var,
                start,
                end,
                step,
                body,
            } => self.lower_for(var, start, end, step.as_deref(), body),

            Expr::Call { callee, args } => self.lower_call(callee, args),
        }
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: FloatValue<'ctx>,
        rhs: FloatValue<'ctx>,
    ) -> Result<FloatValue<'ctx>, CodegenError> {
        let value = match op {
            BinaryOp::Add => self.builder.build_float_add(lhs, rhs, "addtmp")?,
            BinaryOp::Sub => self.builder.build_float_sub(lhs, rhs, "subtmp")?,
            BinaryOp::Mul => self.builder.build_float_mul(lhs, rhs, "multmp")?,
            BinaryOp::Div => self.builder.build_float_div(lhs, rhs, "divtmp")?,
            BinaryOp::Lt => {
                let cmp =
                    self.builder
                        .build_float_compare(FloatPredicate::ULT, lhs, rhs, "cmptmp")?;
                self.builder.build_unsigned_int_to_float(
                    cmp,
                    self.context.f64_type(),
                    "booltmp",
                )?
            }
        };
        Ok(value)
    }

    // Both arms are lowered in their own blocks and joined with a phi in the
    // merge block; any nonzero condition counts as true.
    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: &Expr,
    ) -> Result<FloatValue<'ctx>, CodegenError> {
        let cond_val = self.lower_expr(cond)?;
        let zero = self.context.f64_type().const_zero();
        let cond_bit =
            self.builder
                .build_float_compare(FloatPredicate::ONE, cond_val, zero, "ifcond")?;

        let function = self.cur_fn()?;
        let then_bb = self.context.append_basic_block(function, "then");
        let else_bb = self.context.append_basic_block(function, "else");
        let merge_bb = self.context.append_basic_block(function, "ifcont");
        self.builder.build_conditional_branch(cond_bit, then_bb, else_bb)?;

        self.builder.position_at_end(then_bb);
        let then_val = self.lower_expr(then_branch)?;
        self.builder.build_unconditional_branch(merge_bb)?;
        // arm lowering may have moved the insertion point to a new block
        let then_end = self
            .builder
            .get_insert_block()
            .ok_or(CodegenError::MissingInsertBlock)?;

        self.builder.position_at_end(else_bb);
        let else_val = self.lower_expr(else_branch)?;
        self.builder.build_unconditional_branch(merge_bb)?;
        let else_end = self
            .builder
            .get_insert_block()
            .ok_or(CodegenError::MissingInsertBlock)?;

        self.builder.position_at_end(merge_bb);
        let phi = self.builder.build_phi(self.context.f64_type(), "iftmp")?;
        phi.add_incoming(&[(&then_val, then_end), (&else_val, else_end)]);
        Ok(phi.as_basic_value().into_float_value())
    }

    // The induction variable is a phi in the loop header: its value comes
    // from the preheader on entry and from the incremented value on the back
    // edge. The loop itself evaluates to 0.0.
    fn lower_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Result<FloatValue<'ctx>, CodegenError> {
        let start_val = self.lower_expr(start)?;

        let function = self.cur_fn()?;
        let preheader_bb = self
            .builder
            .get_insert_block()
            .ok_or(CodegenError::MissingInsertBlock)?;
        let loop_bb = self.context.append_basic_block(function, "loop");
        self.builder.build_unconditional_branch(loop_bb)?;

        self.builder.position_at_end(loop_bb);
        let phi = self.builder.build_phi(self.context.f64_type(), var)?;
        phi.add_incoming(&[(&start_val, preheader_bb)]);
        let induction = phi.as_basic_value().into_float_value();

        // Shadow any outer binding for the induction variable while the loop
        // interior is lowered; restore or erase it on every exit path.
        let shadowed = self.env.insert(var.to_string(), induction);
        let tail = self.lower_loop_tail(induction, end, step, body);
        match shadowed {
            Some(old) => {
                self.env.insert(var.to_string(), old);
            }
            None => {
                self.env.remove(var);
            }
        }
        let (next_val, end_cond) = tail?;

        let loop_end_bb = self
            .builder
            .get_insert_block()
            .ok_or(CodegenError::MissingInsertBlock)?;
        let after_bb = self.context.append_basic_block(function, "afterloop");
        self.builder
            .build_conditional_branch(end_cond, loop_bb, after_bb)?;
        phi.add_incoming(&[(&next_val, loop_end_bb)]);

        self.builder.position_at_end(after_bb);
        Ok(self.context.f64_type().const_zero())
    }

    // Body (value discarded), increment, then the continuation test against
    // the current iteration's variable.
    fn lower_loop_tail(
        &mut self,
        induction: FloatValue<'ctx>,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Result<(FloatValue<'ctx>, IntValue<'ctx>), CodegenError> {
        self.lower_expr(body)?;

        let step_val = match step {
            Some(expr) => self.lower_expr(expr)?,
            None => self.context.f64_type().const_float(1.0),
        };
        let next_val = self
            .builder
            .build_float_add(induction, step_val, "nextvar")?;

        let end_val = self.lower_expr(end)?;
        let zero = self.context.f64_type().const_zero();
        let end_cond =
            self.builder
                .build_float_compare(FloatPredicate::ONE, end_val, zero, "loopcond")?;

        Ok((next_val, end_cond))
    }

    fn lower_call(&mut self, callee: &str, args: &[Expr]) -> Result<FloatValue<'ctx>, CodegenError> {
        let function = self.get_function(callee)?;

        let expected = function.count_params() as usize;
        if expected != args.len() {
            return Err(CodegenError::ArityMismatch {
                name: callee.to_string(),
                expected,
                found: args.len(),
            });
        }

        let mut lowered: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(args.len());
        for arg in args {
            lowered.push(self.lower_expr(arg)?.into());
        }

        let call = self.builder.build_call(function, &lowered, "calltmp")?;
        call.try_as_basic_value()
            .left()
            .map(|value| value.into_float_value())
            .ok_or_else(|| CodegenError::VoidCall {
                name: callee.to_string(),
            })
    }

    // Callees resolve against the current module first, then against the
    // session's prototype table (declared on demand). Functions compiled in
    // earlier units are reached through the declaration this emits.
    fn get_function(&mut self, name: &str) -> Result<FunctionValue<'ctx>, CodegenError> {
        if let Some(function) = self.module.get_function(name) {
            return Ok(function);
        }

        match self.protos.get(name).cloned() {
            Some(proto) => self.lower_prototype(&proto),
            None => Err(CodegenError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }
}
