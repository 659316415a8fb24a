use crate::tree::language_types::ExternalKind;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub field: String,
    pub kind: ExternalKind,
}
