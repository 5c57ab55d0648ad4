//! Codegen error types covering all lowering failure modes.

use asthra_ast::Span;

/// Errors that can occur while lowering a typed AST to LLVM IR.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Unsupported or unresolvable type during LLVM type mapping.
    #[error("{span}: type mapping error: {message}")]
    TypeMapping { span: Span, message: String },

    /// A required type annotation was missing on an AST node.
    #[error("{span}: missing type information: {message}")]
    MissingType { span: Span, message: String },

    /// Identifier could not be resolved (not a local, param, global fn/var,
    /// or predeclared runtime builtin).
    #[error("{span}: unresolved identifier '{name}'")]
    UnresolvedIdentifier { span: Span, name: String },

    /// `break`/`continue` outside of any enclosing loop.
    #[error("{span}: '{keyword}' outside of loop")]
    OutsideLoop { span: Span, keyword: &'static str },

    /// Taking the address of a parameter, or other invariant violations.
    #[error("{span}: invariant violation: {message}")]
    InvariantViolation { span: Span, message: String },

    /// A construct reserved for a future lowering pass (struct/tuple
    /// patterns, dynamic slice length in `for`, address-of field/index).
    #[error("{span}: not yet implemented: {message}")]
    NotYetImplemented { span: Span, message: String },

    /// A `const` initializer could not be folded to a constant.
    #[error("{span}: non-foldable const initializer: {message}")]
    NonFoldableConst { span: Span, message: String },

    /// No entry function found when generating the `main` wrapper.
    #[error("no entry function found")]
    NoEntryFunction,

    /// LLVM API failure (module/function verification, builder errors).
    #[error("LLVM error: {0}")]
    LlvmError(String),
}

impl CodegenError {
    pub fn span(&self) -> Option<&Span> {
        match self {
            CodegenError::TypeMapping { span, .. }
            | CodegenError::MissingType { span, .. }
            | CodegenError::UnresolvedIdentifier { span, .. }
            | CodegenError::OutsideLoop { span, .. }
            | CodegenError::InvariantViolation { span, .. }
            | CodegenError::NotYetImplemented { span, .. }
            | CodegenError::NonFoldableConst { span, .. } => Some(span),
            CodegenError::NoEntryFunction | CodegenError::LlvmError(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_loop_message() {
        let err = CodegenError::OutsideLoop {
            span: Span::synthetic(),
            keyword: "break",
        };
        assert!(format!("{err}").contains("'break' outside of loop"));
    }

    #[test]
    fn span_accessor_present_for_located_errors() {
        let err = CodegenError::NotYetImplemented {
            span: Span::synthetic(),
            message: "struct pattern".to_string(),
        };
        assert!(err.span().is_some());
        assert!(CodegenError::NoEntryFunction.span().is_none());
    }
}
