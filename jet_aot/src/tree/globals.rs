use crate::tree::language_types::{GlobalType, InitExpression};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Global {
    pub constraints: GlobalType,
    pub value: InitExpression,
}
