//! Reference translator
//!
//! A lane-serial interpreter behind the [`Translator`] seam. It exists so
//! the scheduler, barrier protocol, and cache can be exercised and tested
//! without an external code-generation backend, and it doubles as the
//! executable definition of op and terminator semantics: each lane runs the
//! hyperblock body in order, then the terminator is lowered to exactly one
//! exit classification.

use std::sync::Arc;

use warprun_ir::{Hyperblock, Op, SpecialReg, Terminator};

use crate::context::{ThreadContext, ThreadExit};
use crate::cta::CtaMemory;
use crate::error::ExecResult;
use crate::translation::{TranslatedBlock, Translator, WarpFn};

/// Diagnostic code for a `Return` executed with an empty call stack
pub const RETURN_UNDERFLOW_CODE: u32 = u32::MAX;

/// Interpreter-backed translator
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceTranslator;

impl Translator for ReferenceTranslator {
    fn compile(&self, hyperblock: &Hyperblock, warp_width: u32) -> Result<TranslatedBlock, String> {
        let body = hyperblock.clone();
        let code: WarpFn = Arc::new(move |lanes, memory| {
            let mut exits = Vec::with_capacity(lanes.len());
            for lane in lanes.iter_mut() {
                for op in &body.ops {
                    step(lane, memory, op)?;
                }
                exits.push(lower_terminator(lane, &body.terminator)?);
            }
            Ok(exits)
        });
        Ok(TranslatedBlock::new(hyperblock.id, warp_width, code))
    }
}

fn step(lane: &mut ThreadContext, memory: &mut CtaMemory, op: &Op) -> ExecResult<()> {
    match *op {
        Op::MovImm { dst, value } => lane.registers.write(dst, value),
        Op::Add { dst, src1, src2 } => {
            let value = lane.registers.read(src1)?.wrapping_add(lane.registers.read(src2)?);
            lane.registers.write(dst, value)
        }
        Op::Mul { dst, src1, src2 } => {
            let value = lane.registers.read(src1)?.wrapping_mul(lane.registers.read(src2)?);
            lane.registers.write(dst, value)
        }
        Op::LoadArg { dst, offset } => {
            let value = memory.argument_u64(offset as usize)?;
            lane.registers.write(dst, value)
        }
        Op::LoadShared { dst, offset } => {
            let value = memory.shared_u64(offset as usize)?;
            lane.registers.write(dst, value)
        }
        Op::StoreShared { offset, src } => {
            let value = lane.registers.read(src)?;
            memory.store_shared_u64(offset as usize, value)
        }
        Op::LoadSpecial { dst, sr } => {
            let value = match sr {
                SpecialReg::ThreadIdx => lane.thread as u64,
                SpecialReg::CtaId => lane.cta,
                SpecialReg::CtaSize => lane.cta_threads as u64,
            };
            lane.registers.write(dst, value)
        }
    }
}

fn lower_terminator(lane: &mut ThreadContext, terminator: &Terminator) -> ExecResult<ThreadExit> {
    Ok(match *terminator {
        Terminator::Fallthrough { next } => ThreadExit::Fallthrough { next },
        Terminator::Branch { pred, taken, not_taken } => {
            let next = if lane.registers.read(pred)? != 0 { taken } else { not_taken };
            ThreadExit::Branch { next }
        }
        Terminator::Call { target, return_to } => {
            lane.call_stack.push(return_to);
            ThreadExit::Call { next: target }
        }
        Terminator::Return => match lane.call_stack.pop() {
            Some(next) => ThreadExit::Tailcall { next },
            None => ThreadExit::ExitOther { code: RETURN_UNDERFLOW_CODE },
        },
        Terminator::Barrier { resume } => ThreadExit::Barrier { resume },
        Terminator::Exit => ThreadExit::Exit,
        Terminator::Trap { code } => ThreadExit::ExitOther { code },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warprun_ir::{HyperblockId, Reg};

    fn empty_memory() -> CtaMemory {
        CtaMemory {
            local: Vec::new(),
            shared: vec![0; 32],
            constant: Vec::new(),
            parameter: Vec::new(),
            argument: 100u64
                .to_le_bytes()
                .iter()
                .chain(7u64.to_le_bytes().iter())
                .copied()
                .collect(),
        }
    }

    fn lanes(count: u32) -> Vec<ThreadContext> {
        (0..count)
            .map(|t| ThreadContext::new(2, t, count, HyperblockId::new(0)))
            .collect()
    }

    fn run(hyperblock: &Hyperblock, lanes: &mut [ThreadContext], memory: &mut CtaMemory) -> Vec<ThreadExit> {
        let translation = ReferenceTranslator
            .compile(hyperblock, lanes.len() as u32)
            .unwrap();
        translation.run(lanes, memory).unwrap()
    }

    #[test]
    fn test_arithmetic_and_arguments() {
        // r0 = arg[0]; r1 = arg[8]; r2 = r0 + r1; r3 = r2 * r2
        let hb = Hyperblock::new(
            HyperblockId::new(0),
            vec![
                Op::LoadArg { dst: Reg::new(0), offset: 0 },
                Op::LoadArg { dst: Reg::new(1), offset: 8 },
                Op::Add { dst: Reg::new(2), src1: Reg::new(0), src2: Reg::new(1) },
                Op::Mul { dst: Reg::new(3), src1: Reg::new(2), src2: Reg::new(2) },
            ],
            Terminator::Exit,
        );
        let mut memory = empty_memory();
        let mut warp = lanes(2);
        let exits = run(&hb, &mut warp, &mut memory);

        assert_eq!(exits, vec![ThreadExit::Exit; 2]);
        for lane in &warp {
            assert_eq!(lane.registers.read(Reg::new(2)).unwrap(), 107);
            assert_eq!(lane.registers.read(Reg::new(3)).unwrap(), 107 * 107);
        }
    }

    #[test]
    fn test_special_registers() {
        let hb = Hyperblock::new(
            HyperblockId::new(0),
            vec![
                Op::LoadSpecial { dst: Reg::new(0), sr: SpecialReg::ThreadIdx },
                Op::LoadSpecial { dst: Reg::new(1), sr: SpecialReg::CtaId },
                Op::LoadSpecial { dst: Reg::new(2), sr: SpecialReg::CtaSize },
            ],
            Terminator::Exit,
        );
        let mut memory = empty_memory();
        let mut warp = lanes(4);
        run(&hb, &mut warp, &mut memory);

        for (idx, lane) in warp.iter().enumerate() {
            assert_eq!(lane.registers.read(Reg::new(0)).unwrap(), idx as u64);
            assert_eq!(lane.registers.read(Reg::new(1)).unwrap(), 2);
            assert_eq!(lane.registers.read(Reg::new(2)).unwrap(), 4);
        }
    }

    #[test]
    fn test_shared_memory_traffic() {
        let hb = Hyperblock::new(
            HyperblockId::new(0),
            vec![
                Op::MovImm { dst: Reg::new(0), value: 41 },
                Op::StoreShared { offset: 16, src: Reg::new(0) },
                Op::LoadShared { dst: Reg::new(1), offset: 16 },
            ],
            Terminator::Exit,
        );
        let mut memory = empty_memory();
        let mut warp = lanes(1);
        run(&hb, &mut warp, &mut memory);

        assert_eq!(memory.shared_u64(16).unwrap(), 41);
        assert_eq!(warp[0].registers.read(Reg::new(1)).unwrap(), 41);
    }

    #[test]
    fn test_branch_divergence() {
        // pred = thread idx: lane 0 falls through, others take the branch.
        let hb = Hyperblock::new(
            HyperblockId::new(0),
            vec![Op::LoadSpecial { dst: Reg::new(0), sr: SpecialReg::ThreadIdx }],
            Terminator::Branch {
                pred: Reg::new(0),
                taken: HyperblockId::new(1),
                not_taken: HyperblockId::new(2),
            },
        );
        let mut memory = empty_memory();
        let mut warp = lanes(3);
        let exits = run(&hb, &mut warp, &mut memory);

        assert_eq!(exits[0], ThreadExit::Branch { next: HyperblockId::new(2) });
        assert_eq!(exits[1], ThreadExit::Branch { next: HyperblockId::new(1) });
        assert_eq!(exits[2], ThreadExit::Branch { next: HyperblockId::new(1) });
    }

    #[test]
    fn test_call_and_return() {
        let call = Hyperblock::empty(
            HyperblockId::new(0),
            Terminator::Call {
                target: HyperblockId::new(1),
                return_to: HyperblockId::new(2),
            },
        );
        let ret = Hyperblock::empty(HyperblockId::new(1), Terminator::Return);

        let mut memory = empty_memory();
        let mut warp = lanes(1);

        let exits = run(&call, &mut warp, &mut memory);
        assert_eq!(exits[0], ThreadExit::Call { next: HyperblockId::new(1) });
        assert_eq!(warp[0].call_stack, vec![HyperblockId::new(2)]);

        let exits = run(&ret, &mut warp, &mut memory);
        assert_eq!(exits[0], ThreadExit::Tailcall { next: HyperblockId::new(2) });
        assert!(warp[0].call_stack.is_empty());
    }

    #[test]
    fn test_return_underflow_terminates() {
        let ret = Hyperblock::empty(HyperblockId::new(0), Terminator::Return);
        let mut memory = empty_memory();
        let mut warp = lanes(1);
        let exits = run(&ret, &mut warp, &mut memory);
        assert_eq!(exits[0], ThreadExit::ExitOther { code: RETURN_UNDERFLOW_CODE });
    }

    #[test]
    fn test_trap_and_barrier() {
        let trap = Hyperblock::empty(HyperblockId::new(0), Terminator::Trap { code: 13 });
        let barrier = Hyperblock::empty(
            HyperblockId::new(1),
            Terminator::Barrier { resume: HyperblockId::new(2) },
        );
        let mut memory = empty_memory();
        let mut warp = lanes(1);

        assert_eq!(
            run(&trap, &mut warp, &mut memory)[0],
            ThreadExit::ExitOther { code: 13 }
        );
        assert_eq!(
            run(&barrier, &mut warp, &mut memory)[0],
            ThreadExit::Barrier { resume: HyperblockId::new(2) }
        );
    }

    #[test]
    fn test_out_of_bounds_load_fails() {
        let hb = Hyperblock::new(
            HyperblockId::new(0),
            vec![Op::LoadShared { dst: Reg::new(0), offset: 1000 }],
            Terminator::Exit,
        );
        let translation = ReferenceTranslator.compile(&hb, 1).unwrap();
        let mut memory = empty_memory();
        let mut warp = lanes(1);
        assert!(translation.run(&mut warp, &mut memory).is_err());
    }
}
