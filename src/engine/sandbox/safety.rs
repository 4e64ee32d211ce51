use log::debug;
use rhai::{ASTNode, Engine, Expr, Stmt};
use serde::{Deserialize, Serialize};

/// Call names a candidate may never invoke: dynamic evaluation, filesystem,
/// process spawning, environment access, and network verbs. The set is
/// deliberately broad; none of these are registered inside the sandbox, but
/// rejecting them statically keeps vetted code meaningful on its own.
const DENIED_CALLS: &[&str] = &[
    // dynamic evaluation / indirect dispatch
    "eval",
    "Fn",
    "call",
    "curry",
    // filesystem
    "open",
    "read_file",
    "write_file",
    "append_file",
    "remove_file",
    "create_dir",
    "remove_dir",
    "read_dir",
    "copy_file",
    "rename_file",
    // process / environment
    "system",
    "command",
    "spawn",
    "exec",
    "shell",
    "popen",
    "exit",
    "getenv",
    "set_env",
    "env",
    // network
    "connect",
    "download",
    "fetch",
    "request",
    "http_get",
    "http_post",
    "socket",
];

/// Static accept/reject decision on a code candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub is_safe: bool,
    /// Populated only on rejection
    pub reason: Option<String>,
}

impl SafetyVerdict {
    fn safe() -> Self {
        Self {
            is_safe: true,
            reason: None,
        }
    }

    fn rejected<S: Into<String>>(reason: S) -> Self {
        Self {
            is_safe: false,
            reason: Some(reason.into()),
        }
    }
}

/// Statically inspects a code candidate and accepts or rejects it
///
/// The check compiles the candidate to an AST without executing it and
/// rejects on: imports outside the allow-list, namespace-qualified calls,
/// denylisted call names, and dunder identifiers. The check is purely
/// static; rejected code never runs.
pub struct SafetyValidator {
    engine: Engine,
    allowed_modules: Vec<String>,
}

impl SafetyValidator {
    pub fn new(allowed_modules: Vec<String>) -> Self {
        Self {
            // Permissive engine used only for compilation; the restricted
            // engine lives in the sandbox executor.
            engine: Engine::new(),
            allowed_modules,
        }
    }

    /// Vet one candidate. Returns `(is_safe, reason)`; `reason` is set only
    /// on rejection.
    pub fn check(&self, code: &str) -> SafetyVerdict {
        // Dunder identifiers are the classic namespace-escape vector;
        // screen for them before parsing so mangled variants are caught too.
        if code.contains("__") {
            return SafetyVerdict::rejected("access to dunder identifiers is not allowed");
        }

        let ast = match self.engine.compile(code) {
            Ok(ast) => ast,
            Err(e) => return SafetyVerdict::rejected(format!("syntax error: {e}")),
        };

        let mut rejection: Option<String> = None;
        ast.walk(&mut |nodes: &[ASTNode]| {
            let Some(node) = nodes.last() else {
                return true;
            };
            match node {
                ASTNode::Stmt(Stmt::Import(import, _)) => {
                    let (path_expr, _alias) = import.as_ref();
                    let allowed = match path_expr {
                        Expr::StringConstant(path, _) => self
                            .allowed_modules
                            .iter()
                            .any(|module| module == path.as_str()),
                        // Non-literal import paths are never allowed
                        _ => false,
                    };
                    if !allowed {
                        rejection = Some("import of a disallowed module".to_string());
                    }
                }
                // Calls appear as expressions and, when bare, as statements;
                // both positions get the same namespace and denylist checks.
                ASTNode::Expr(Expr::FnCall(call, _))
                | ASTNode::Expr(Expr::MethodCall(call, _))
                | ASTNode::Stmt(Stmt::FnCall(call, _)) => {
                    if !call.namespace.is_empty() {
                        rejection = Some(format!(
                            "module-qualified call '{}' is not allowed",
                            call.name
                        ));
                    } else if DENIED_CALLS.contains(&call.name.as_str()) {
                        rejection = Some(format!("call to '{}' is not allowed", call.name));
                    }
                }
                _ => {}
            }
            rejection.is_none()
        });

        match rejection {
            Some(reason) => {
                debug!("code candidate rejected: {reason}");
                SafetyVerdict::rejected(reason)
            }
            None => SafetyVerdict::safe(),
        }
    }
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_expression_is_safe() {
        let validator = SafetyValidator::default();
        let verdict = validator.check("let result = 1 + 1;");
        assert!(verdict.is_safe);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_dataset_access_is_safe() {
        let validator = SafetyValidator::default();
        let verdict = validator.check(r#"let result = df["sales"].sum();"#);
        assert!(verdict.is_safe);
    }

    #[test]
    fn test_import_is_rejected() {
        let validator = SafetyValidator::default();
        let verdict = validator.check(r#"import "os" as os; os::system("ls");"#);
        assert!(!verdict.is_safe);
        assert!(verdict.reason.is_some());
    }

    #[test]
    fn test_allow_listed_import_passes() {
        let validator = SafetyValidator::new(vec!["stats".to_string()]);
        let verdict = validator.check(r#"import "stats" as stats;"#);
        assert!(verdict.is_safe);
    }

    #[test]
    fn test_eval_is_rejected() {
        let validator = SafetyValidator::default();
        let verdict = validator.check(r#"let result = eval("1 + 1");"#);
        assert!(!verdict.is_safe);
        assert!(verdict.reason.unwrap().contains("eval"));
    }

    #[test]
    fn test_statement_position_call_is_rejected() {
        let validator = SafetyValidator::default();
        let verdict = validator.check(r#"eval("1 + 1");"#);
        assert!(!verdict.is_safe);
        assert!(verdict.reason.unwrap().contains("eval"));

        let verdict = validator.check(r#"remove_file("/tmp/x");"#);
        assert!(!verdict.is_safe);
        assert!(verdict.reason.unwrap().contains("remove_file"));
    }

    #[test]
    fn test_filesystem_call_is_rejected() {
        let validator = SafetyValidator::default();
        let verdict = validator.check(r#"let data = open("/etc/passwd");"#);
        assert!(!verdict.is_safe);
    }

    #[test]
    fn test_dunder_access_is_rejected() {
        let validator = SafetyValidator::default();
        let verdict = validator.check("let x = df.__class__;");
        assert!(!verdict.is_safe);
        assert!(verdict.reason.unwrap().contains("dunder"));
    }

    #[test]
    fn test_syntax_error_is_rejected() {
        let validator = SafetyValidator::default();
        let verdict = validator.check("let result = ;");
        assert!(!verdict.is_safe);
        assert!(verdict.reason.unwrap().contains("syntax"));
    }

    #[test]
    fn test_method_call_denylist_applies() {
        let validator = SafetyValidator::default();
        let verdict = validator.check(r#"let out = "path".read_file();"#);
        assert!(!verdict.is_safe);
    }
}
