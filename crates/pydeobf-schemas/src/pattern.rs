//! Shape helpers shared by the schema matchers.

use pydeobf_syntax::ast::{Constant, Expr};

/// Whether `expr` is `__import__('<module>')`.
pub(crate) fn is_import_of(expr: &Expr, module: &str) -> bool {
    let Expr::Call { func, args, .. } = expr else {
        return false;
    };
    func.as_name() == Some("__import__")
        && matches!(args.as_slice(), [Expr::Constant(Constant::Str(name))] if name == module)
}

/// Arguments of `__import__('<module>').<function>(...)`.
pub(crate) fn module_call<'a>(expr: &'a Expr, module: &str, function: &str) -> Option<&'a [Expr]> {
    let Expr::Call { func, args, .. } = expr else {
        return None;
    };
    let Expr::Attribute { value, attr } = func.as_ref() else {
        return None;
    };
    (attr == function && is_import_of(value, module)).then_some(args.as_slice())
}

/// The only positional argument of a call to the builtin `name`.
pub(crate) fn builtin_call<'a>(expr: &'a Expr, name: &str) -> Option<&'a Expr> {
    let Expr::Call { func, args, .. } = expr else {
        return None;
    };
    match args.as_slice() {
        [arg] if func.as_name() == Some(name) => Some(arg),
        _ => None,
    }
}
