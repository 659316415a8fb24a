use crate::tree::language_types::InitExpression;

/// Initialises a run of linear memory bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub index: u32,
    pub offset: InitExpression,
    pub data: Vec<u8>,
}
