use crate::tree::language_types::InitExpression;

/// Initialises a run of table slots with function indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub index: u32,
    pub offset: InitExpression,
    pub elements: Vec<u32>,
}
