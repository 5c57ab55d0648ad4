//! Operator vocabulary, grouped by kind so each lowering site can match
//! exhaustively on a small enum rather than a single flat operator type.
//!
//! Grouping and doc-comment style follow `lmlang-core`'s `ops.rs`
//! (`ArithOp`/`CmpOp`/`LogicOp`/`ShiftOp`): signedness is resolved at
//! lowering time rather than carried on the operator itself.

use serde::{Deserialize, Serialize};

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Deref,
    AddrOf,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Short-circuit logic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOp {
    And,
    Or,
}

/// Bitwise binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

/// Bit-shift operators; direction (arithmetic vs logical) for `>>` is
/// resolved at lowering time from operand signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftOp {
    Shl,
    Shr,
}

/// The full binary-operator surface an AST `Binary` node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Arith(ArithOp),
    Cmp(CmpOp),
    Logic(LogicOp),
    Bit(BitOp),
    Shift(ShiftOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binop_wraps_each_group() {
        let ops = [
            BinOp::Arith(ArithOp::Add),
            BinOp::Cmp(CmpOp::Lt),
            BinOp::Logic(LogicOp::And),
            BinOp::Bit(BitOp::Xor),
            BinOp::Shift(ShiftOp::Shl),
        ];
        assert_eq!(ops.len(), 5);
    }

    #[test]
    fn serde_roundtrip() {
        let op = BinOp::Arith(ArithOp::Mul);
        let json = serde_json::to_string(&op).unwrap();
        let back: BinOp = serde_json::from_str(&json).unwrap();
        assert_eq!(json, serde_json::to_string(&back).unwrap());
    }
}
