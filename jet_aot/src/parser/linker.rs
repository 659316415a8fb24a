//! Links structured control flow while a body is decoded.
//!
//! Decoding recurses once per nested block. Each level receives the label
//! stack of the blocks enclosing it as an immutable value, so leaving a block
//! needs no explicit pop: the caller simply keeps using its own stack.

use log::debug;

use crate::parser::instructions::{read_operator, Operator};
use crate::parser::{ParseError, Reader};
use crate::tree::instructions::{Block, Branch, Control, FunctionBody, InstrId, Instruction, LabelId};
use crate::tree::language_types::BlockType;

const ELSE: u8 = 0x05;
const MAX_NESTING: usize = 1024;

/// Openers of the blocks currently enclosing the decode position, outermost
/// first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStack {
    labels: Vec<InstrId>,
}

impl LabelStack {
    pub fn new() -> LabelStack {
        LabelStack::default()
    }

    /// A new stack with `opener` as the innermost label.
    pub fn with(&self, opener: InstrId) -> LabelStack {
        let mut labels = self.labels.clone();
        labels.push(opener);
        LabelStack { labels }
    }

    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    pub fn innermost(&self) -> Option<InstrId> {
        self.labels.last().copied()
    }

    /// The opener `depth` levels out from the innermost block.
    pub fn resolve(&self, depth: u32) -> Option<InstrId> {
        let depth = depth as usize;
        if depth < self.labels.len() {
            Some(self.labels[self.labels.len() - 1 - depth])
        } else {
            None
        }
    }
}

/// How a nested instruction sequence was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Else(InstrId),
    End(InstrId),
}

pub struct FunctionDecoder<'r, 'a> {
    reader: &'r mut Reader<'a>,
    body: FunctionBody,
    next_label: u32,
}

impl<'r, 'a> FunctionDecoder<'r, 'a> {
    pub fn new(reader: &'r mut Reader<'a>) -> FunctionDecoder<'r, 'a> {
        FunctionDecoder {
            reader,
            body: FunctionBody::default(),
            next_label: 0,
        }
    }

    /// Decodes instructions up to and including the `end` closing the body.
    pub fn decode(mut self) -> Result<FunctionBody, ParseError> {
        let start = self.reader.position();
        match self.decode_sequence(&LabelStack::new())? {
            Terminator::End(_) => {}
            Terminator::Else(stray) => return Err(self.unexpected_else(stray)),
        }
        self.body.label_count = self.next_label;
        debug!(
            "Decoded body at offset {}: {} instructions, {} labels",
            start,
            self.body.len(),
            self.body.label_count
        );
        Ok(self.body)
    }

    fn push(&mut self, offset: usize, instruction: Instruction) -> InstrId {
        let id = InstrId(self.body.instructions.len() as u32);
        self.body.instructions.push(instruction);
        self.body.offsets.push(offset);
        id
    }

    fn label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    fn unexpected_else(&self, id: InstrId) -> ParseError {
        ParseError::UnexpectedElse {
            offset: self.body.offset(id),
        }
    }

    fn decode_sequence(&mut self, labels: &LabelStack) -> Result<Terminator, ParseError> {
        loop {
            let decoded = read_operator(self.reader)?;
            let offset = decoded.offset;
            match decoded.operator {
                Operator::Plain(instruction) => {
                    self.push(offset, instruction);
                }
                Operator::Block(block_type) => self.decode_block(offset, block_type, false, labels)?,
                Operator::Loop(block_type) => self.decode_block(offset, block_type, true, labels)?,
                Operator::If(block_type) => self.decode_if(offset, block_type, labels)?,
                Operator::Else => {
                    let dest = labels.innermost().ok_or(ParseError::UnexpectedElse { offset })?;
                    let label = self.label();
                    let id = self.push(offset, Instruction::Control(Control::Else { label, dest }));
                    return Ok(Terminator::Else(id));
                }
                Operator::End => {
                    let dest = labels.innermost();
                    let id = self.push(offset, Instruction::Control(Control::End { dest }));
                    return Ok(Terminator::End(id));
                }
                Operator::Br(depth) => {
                    let branch = resolve(labels, depth, offset)?;
                    self.push(offset, Instruction::Control(Control::Br(branch)));
                }
                Operator::BrIf(depth) => {
                    let branch = resolve(labels, depth, offset)?;
                    self.push(offset, Instruction::Control(Control::BrIf(branch)));
                }
                Operator::BrTable { targets, default } => {
                    let targets = targets
                        .into_iter()
                        .map(|depth| resolve(labels, depth, offset))
                        .collect::<Result<Vec<_>, _>>()?;
                    let default = resolve(labels, default, offset)?;
                    self.push(offset, Instruction::Control(Control::BrTable { targets, default }));
                }
            }
        }
    }

    fn open(&mut self, labels: &LabelStack, offset: usize) -> Result<(), ParseError> {
        if labels.depth() >= MAX_NESTING {
            return Err(ParseError::NestingTooDeep { offset });
        }
        Ok(())
    }

    fn decode_block(
        &mut self,
        offset: usize,
        block_type: BlockType,
        is_loop: bool,
        labels: &LabelStack,
    ) -> Result<(), ParseError> {
        self.open(labels, offset)?;
        let block = Block {
            block_type,
            label: self.label(),
            end: None,
        };
        let control = if is_loop { Control::Loop(block) } else { Control::Block(block) };
        let id = self.push(offset, Instruction::Control(control));
        match self.decode_sequence(&labels.with(id))? {
            Terminator::End(end) => {
                self.close(id, end);
                Ok(())
            }
            Terminator::Else(stray) => Err(self.unexpected_else(stray)),
        }
    }

    fn decode_if(&mut self, offset: usize, block_type: BlockType, labels: &LabelStack) -> Result<(), ParseError> {
        self.open(labels, offset)?;
        let block = Block {
            block_type,
            label: self.label(),
            end: None,
        };
        let id = self.push(offset, Instruction::Control(Control::If { block, else_arm: None }));
        let end = match self.decode_sequence(&labels.with(id))? {
            Terminator::End(end) => end,
            Terminator::Else(else_id) => {
                if let Instruction::Control(Control::If { ref mut else_arm, .. }) = self.body.instructions[id.index()] {
                    *else_arm = Some(else_id);
                }
                match self.decode_sequence(&labels.with(else_id))? {
                    Terminator::End(end) => end,
                    Terminator::Else(stray) => {
                        return Err(ParseError::MalformedIfBlock {
                            offset: self.body.offset(stray),
                            opcode: ELSE,
                        })
                    }
                }
            }
        };
        self.close(id, end);
        Ok(())
    }

    /// Links an opener and the `end` that closes it in both directions.
    fn close(&mut self, opener: InstrId, end: InstrId) {
        match self.body.instructions[opener.index()] {
            Instruction::Control(Control::Block(ref mut block))
            | Instruction::Control(Control::Loop(ref mut block))
            | Instruction::Control(Control::If { ref mut block, .. }) => block.end = Some(end),
            _ => {}
        }
        if let Instruction::Control(Control::End { ref mut dest }) = self.body.instructions[end.index()] {
            *dest = Some(opener);
        }
    }
}

fn resolve(labels: &LabelStack, depth: u32, offset: usize) -> Result<Branch, ParseError> {
    match labels.resolve(depth) {
        Some(dest) => Ok(Branch { depth, dest }),
        None => Err(ParseError::InvalidBranchTarget {
            offset,
            depth,
            open: labels.depth(),
        }),
    }
}
