//! Structured control-flow recovery.
//!
//! Latte programs express loops and conditionals with `LOOP_START`/`LOOP_END` pairs, predicate
//! setting ALU instructions, `JUMP`/`ELSE` targets and `LOOP_BREAK`/`LOOP_CONTINUE`. This pass
//! matches those into labels over the flat instruction list, then walks the list once more to
//! build the [`Block`] tree.

use std::cmp::Ordering;

use crate::error::ShaderError;
use crate::ir::{Block, InstrId, Instruction, Shader};
use crate::opcodes::CfOpcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelKind {
    LoopStart,
    LoopEnd,
    ConditionalStart,
    ConditionalElse,
    ConditionalEnd,
    Eliminated,
}

#[derive(Debug, Clone, Copy)]
struct Label {
    /// Creation order; `link` refers to this.
    id: usize,
    kind: LabelKind,
    /// Position of the anchor instruction in the flat list.
    anchor: usize,
    /// Anchor position of the paired label.
    linked_anchor: Option<usize>,
    link: Option<usize>,
}

impl Label {
    /// Labels whose pair lies earlier in the program close a block.
    fn closes(&self) -> bool {
        matches!(self.linked_anchor, Some(linked) if linked < self.anchor)
    }
}

#[derive(Default)]
struct Labels {
    labels: Vec<Label>,
}

impl Labels {
    fn add(&mut self, kind: LabelKind, anchor: usize) -> usize {
        let id = self.labels.len();
        self.labels.push(Label {
            id,
            kind,
            anchor,
            linked_anchor: None,
            link: None,
        });
        id
    }

    fn link(&mut self, a: usize, b: usize) {
        let (anchor_a, anchor_b) = (self.labels[a].anchor, self.labels[b].anchor);
        self.labels[a].link = Some(b);
        self.labels[a].linked_anchor = Some(anchor_b);
        self.labels[b].link = Some(a);
        self.labels[b].linked_anchor = Some(anchor_a);
    }

    /// Points `from` at `to` without making the link mutual.
    fn link_one_way(&mut self, from: usize, to: usize) {
        self.labels[from].link = Some(to);
        self.labels[from].linked_anchor = Some(self.labels[to].anchor);
    }
}

/// Builds `shader.blocks` from the flat instruction list.
///
/// Instructions are never modified. Every instruction except eliminated `JUMP`s, loop markers and
/// branch markers ends up in exactly one [`Block::Code`], and every predicate-setting instruction
/// consumed by a branch becomes a [`Block::Conditional`] condition.
pub fn blockify(shader: &mut Shader) -> Result<(), ShaderError> {
    let labels = labelify(shader)?;
    shader.blocks = build_blocks(shader, &labels)?;
    Ok(())
}

fn labelify(shader: &Shader) -> Result<Vec<Label>, ShaderError> {
    let code = &shader.code;
    let mut labels = Labels::default();
    let mut loop_starts: Vec<usize> = Vec::new();
    let mut pred_sets: Vec<usize> = Vec::new();
    let mut pushes = 0usize;

    for (pos, ins) in code.iter().enumerate() {
        if ins.is_pred_set() {
            pred_sets.push(pos);
            continue;
        }

        let Instruction::ControlFlow(cf) = ins else {
            continue;
        };

        match cf.opcode {
            op if op.is_loop_start() => loop_starts.push(pos),
            CfOpcode::LoopEnd => {
                let start = loop_starts.pop().ok_or_else(|| {
                    ShaderError::structure(format!("LOOP_END at cf {} has no LOOP_START", cf.cf_pc))
                })?;
                let start = labels.add(LabelKind::LoopStart, start);
                let end = labels.add(LabelKind::LoopEnd, pos);
                labels.link(start, end);
            }
            CfOpcode::LoopBreak | CfOpcode::LoopContinue => {
                if loop_starts.is_empty() {
                    return Err(ShaderError::structure(format!(
                        "{} at cf {} outside of a loop",
                        cf.opcode, cf.cf_pc
                    )));
                }
                let pred = pred_sets.pop().ok_or_else(|| {
                    ShaderError::structure(format!(
                        "{} at cf {} has no predicate",
                        cf.opcode, cf.cf_pc
                    ))
                })?;
                if pos + 1 >= code.len() {
                    return Err(ShaderError::structure(format!(
                        "{} at cf {} is the last instruction",
                        cf.opcode, cf.cf_pc
                    )));
                }
                let start = labels.add(LabelKind::ConditionalStart, pred);
                let end = labels.add(LabelKind::ConditionalEnd, pos + 1);
                labels.link(start, end);
            }
            CfOpcode::Jump => {
                if pushes == 0 {
                    return Err(ShaderError::structure(format!(
                        "JUMP at cf {} without a PUSH",
                        cf.cf_pc
                    )));
                }
                let pred = pred_sets.pop().ok_or_else(|| {
                    ShaderError::structure(format!("JUMP at cf {} has no predicate", cf.cf_pc))
                })?;

                let mut end = find_cf_pc(code, pos + 1, cf.addr).ok_or_else(|| {
                    ShaderError::structure(format!(
                        "JUMP at cf {} targets missing cf {}",
                        cf.cf_pc, cf.addr
                    ))
                })?;

                let mut else_pos = None;
                if let Instruction::ControlFlow(target) = &code[end] {
                    if target.opcode == CfOpcode::Else {
                        else_pos = Some(end);
                        end = find_cf_pc(code, end + 1, target.addr).ok_or_else(|| {
                            ShaderError::structure(format!(
                                "ELSE at cf {} targets missing cf {}",
                                target.cf_pc, target.addr
                            ))
                        })?;
                    }
                }

                let start = labels.add(LabelKind::ConditionalStart, pred);
                if let Some(else_pos) = else_pos {
                    let else_label = labels.add(LabelKind::ConditionalElse, else_pos);
                    labels.link_one_way(else_label, start);
                }
                let end = labels.add(LabelKind::ConditionalEnd, end);
                labels.link(start, end);
                labels.add(LabelKind::Eliminated, pos);
            }
            CfOpcode::Push => pushes += 1,
            _ => {}
        }
    }

    if let Some(&start) = loop_starts.last() {
        return Err(ShaderError::structure(format!(
            "{} at cf {} is never closed",
            code[start].name(),
            code[start].cf_pc()
        )));
    }
    if let Some(&pred) = pred_sets.last() {
        return Err(ShaderError::structure(format!(
            "{} at cf {} is not consumed by any branch",
            code[pred].name(),
            code[pred].cf_pc()
        )));
    }

    let mut labels = labels.labels;
    labels.sort_by(compare_labels);
    Ok(labels)
}

fn find_cf_pc(code: &[Instruction], from: usize, cf_pc: u32) -> Option<usize> {
    (from..code.len()).find(|&i| code[i].cf_pc() == cf_pc)
}

/// Orders labels by anchor. At a shared anchor, closing labels come first (innermost block
/// first), then opening labels (outermost block first).
fn compare_labels(lhs: &Label, rhs: &Label) -> Ordering {
    lhs.anchor.cmp(&rhs.anchor).then_with(|| match (lhs.closes(), rhs.closes()) {
        (true, true) => rhs.linked_anchor.cmp(&lhs.linked_anchor),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => rhs.linked_anchor.cmp(&lhs.linked_anchor),
    })
}

enum Frame {
    Root(Vec<Block>),
    Loop {
        label: usize,
        inner: Vec<Block>,
    },
    Conditional {
        label: usize,
        condition: InstrId,
        inner: Vec<Block>,
        inner_else: Vec<Block>,
        in_else: bool,
    },
}

impl Frame {
    fn blocks_mut(&mut self) -> &mut Vec<Block> {
        match self {
            Frame::Root(blocks) => blocks,
            Frame::Loop { inner, .. } => inner,
            Frame::Conditional {
                inner,
                inner_else,
                in_else,
                ..
            } => {
                if *in_else {
                    inner_else
                } else {
                    inner
                }
            }
        }
    }

    fn into_block(self) -> Result<Block, ShaderError> {
        match self {
            Frame::Root(_) => Err(ShaderError::structure("closed the root block list")),
            Frame::Loop { inner, .. } => Ok(Block::Loop { inner }),
            Frame::Conditional {
                condition,
                inner,
                inner_else,
                ..
            } => Ok(Block::Conditional {
                condition,
                inner,
                inner_else,
            }),
        }
    }
}

fn push_instruction(stack: &mut [Frame], id: InstrId) -> Result<(), ShaderError> {
    let frame = stack
        .last_mut()
        .ok_or_else(|| ShaderError::structure("block stack underflow"))?;
    let blocks = frame.blocks_mut();
    match blocks.last_mut() {
        Some(Block::Code(code)) => code.push(id),
        _ => blocks.push(Block::Code(vec![id])),
    }
    Ok(())
}

fn close_frame(stack: &mut Vec<Frame>, label: &Label) -> Result<(), ShaderError> {
    let expected = label.link;
    let frame = match stack.pop() {
        Some(frame @ (Frame::Loop { .. } | Frame::Conditional { .. })) => frame,
        Some(root @ Frame::Root(_)) => {
            stack.push(root);
            return Err(ShaderError::structure(format!(
                "{:?} label at instruction {} closes nothing",
                label.kind, label.anchor
            )));
        }
        None => return Err(ShaderError::structure("block stack underflow")),
    };

    let opened_by = match &frame {
        Frame::Loop { label, .. } | Frame::Conditional { label, .. } => Some(*label),
        Frame::Root(_) => None,
    };
    if opened_by != expected {
        return Err(ShaderError::structure(format!(
            "{:?} label at instruction {} crosses another block",
            label.kind, label.anchor
        )));
    }

    let block = frame.into_block()?;
    let parent = stack
        .last_mut()
        .ok_or_else(|| ShaderError::structure("block stack underflow"))?;
    parent.blocks_mut().push(block);
    Ok(())
}

fn build_blocks(shader: &Shader, labels: &[Label]) -> Result<Vec<Block>, ShaderError> {
    let mut stack = vec![Frame::Root(Vec::new())];
    let mut next = 0usize;

    for pos in 0..shader.code.len() {
        let mut insert = true;

        while let Some(label) = labels.get(next).filter(|l| l.anchor == pos) {
            insert = false;
            match label.kind {
                LabelKind::LoopStart => stack.push(Frame::Loop {
                    label: label.id,
                    inner: Vec::new(),
                }),
                LabelKind::ConditionalStart => stack.push(Frame::Conditional {
                    label: label.id,
                    condition: InstrId(pos),
                    inner: Vec::new(),
                    inner_else: Vec::new(),
                    in_else: false,
                }),
                LabelKind::ConditionalElse => match stack.last_mut() {
                    Some(Frame::Conditional {
                        label: start,
                        in_else,
                        ..
                    }) if Some(*start) == label.link => *in_else = true,
                    _ => {
                        return Err(ShaderError::structure(format!(
                            "ELSE at instruction {pos} is not inside its conditional"
                        )))
                    }
                },
                LabelKind::LoopEnd => close_frame(&mut stack, label)?,
                LabelKind::ConditionalEnd => {
                    close_frame(&mut stack, label)?;
                    insert = true;
                }
                LabelKind::Eliminated => {}
            }
            next += 1;
        }

        if insert {
            push_instruction(&mut stack, InstrId(pos))?;
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(Frame::Root(blocks)), true) => Ok(blocks),
        _ => Err(ShaderError::structure("blocks left open at end of program")),
    }
}
