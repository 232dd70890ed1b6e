pub mod op;

mod builder;
mod decoder;
mod instruction;

pub use builder::{BytecodeBuilder, Label};
pub use decoder::{BytecodeDecoder, DecodeError};
pub use instruction::Instruction;

#[cfg(test)]
mod tests {
    use super::op::{self, ext};
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes)
            .collect::<Result<Vec<_>, _>>()
            .expect("well-formed bytecode")
    }

    #[test]
    fn native_call_arity_is_encoded_in_the_opcode() {
        // The evaluator derives the claimed slot count (symbol + args)
        // directly from the extended opcode byte.
        assert_eq!(ext::NATIVE_CALL0, 1);
        for argc in 0..=5u8 {
            assert_eq!(ext::NATIVE_CALL0 + argc, argc + 1);
        }
    }

    #[test]
    fn ext_width_table() {
        assert_eq!(op::EXT_WIDTH[ext::STOP as usize], 2);
        for argc in 0..=5u8 {
            assert_eq!(op::EXT_WIDTH[(ext::NATIVE_CALL0 + argc) as usize], 2);
        }
        assert_eq!(op::EXT_WIDTH[ext::NATIVE_CALL_B as usize], 3);
        assert_eq!(op::EXT_WIDTH[ext::NATIVE_CALL_W as usize], 4);
        // Everything else is unassigned.
        for b in (ext::NATIVE_CALL_W + 1)..=u8::MAX {
            assert_eq!(op::EXT_WIDTH[b as usize], 0, "0x{b:02x}");
        }
    }

    #[test]
    fn stop_trailer_bytes() {
        assert_eq!(op::STOP_TRAILER, [op::EXT, ext::STOP]);
        let mut b = BytecodeBuilder::new();
        b.stop();
        assert_eq!(b.as_bytes(), &op::STOP_TRAILER);
    }

    #[test]
    fn round_trip_stack_ops() {
        let mut b = BytecodeBuilder::new();
        b.dup();
        b.discard();
        b.discard_n(3);
        b.stack_ref(2);
        b.stack_ref(9);
        b.stack_ref(300);
        b.stack_set(4);
        b.stack_set(700);
        b.stop();

        assert_eq!(
            decode_all(&b.into_bytes()),
            vec![
                Instruction::Dup,
                Instruction::Discard,
                Instruction::DiscardN { n: 3 },
                Instruction::StackRef { n: 2 },
                Instruction::StackRef { n: 9 },
                Instruction::StackRef { n: 300 },
                Instruction::StackSet { n: 4 },
                Instruction::StackSet { n: 700 },
                Instruction::Stop,
            ]
        );
    }

    #[test]
    fn round_trip_constants_and_constructors() {
        let mut b = BytecodeBuilder::new();
        b.constant(0);
        b.constant(63);
        b.constant(64);
        b.constant(1000);
        b.cons();
        b.list(4);
        b.concat(2);
        b.add1();

        assert_eq!(
            decode_all(&b.into_bytes()),
            vec![
                Instruction::Constant { idx: 0 },
                Instruction::Constant { idx: 63 },
                Instruction::Constant { idx: 64 },
                Instruction::Constant { idx: 1000 },
                Instruction::Cons,
                Instruction::List { n: 4 },
                Instruction::Concat { n: 2 },
                Instruction::Add1,
            ]
        );
    }

    #[test]
    fn round_trip_calls() {
        let mut b = BytecodeBuilder::new();
        b.call(0);
        b.call(5);
        b.call(6);
        b.call(300);
        b.return_();
        b.native_call(0);
        b.native_call(5);
        b.native_call(6);
        b.native_call(300);

        assert_eq!(
            decode_all(&b.into_bytes()),
            vec![
                Instruction::Call { argc: 0 },
                Instruction::Call { argc: 5 },
                Instruction::Call { argc: 6 },
                Instruction::Call { argc: 300 },
                Instruction::Return,
                Instruction::NativeCall { argc: 0 },
                Instruction::NativeCall { argc: 5 },
                Instruction::NativeCall { argc: 6 },
                Instruction::NativeCall { argc: 300 },
            ]
        );
    }

    #[test]
    fn round_trip_reserved_variable_family() {
        let mut b = BytecodeBuilder::new();
        b.var_ref(1);
        b.var_ref(600);
        b.var_set(2);
        b.var_set(900);
        b.var_bind(7);
        b.unbind(1);
        b.unbind(400);

        assert_eq!(
            decode_all(&b.into_bytes()),
            vec![
                Instruction::VarRef { idx: 1 },
                Instruction::VarRef { idx: 600 },
                Instruction::VarSet { idx: 2 },
                Instruction::VarSet { idx: 900 },
                Instruction::VarBind { idx: 7 },
                Instruction::Unbind { n: 1 },
                Instruction::Unbind { n: 400 },
            ]
        );
    }

    #[test]
    fn forward_branch() {
        let mut b = BytecodeBuilder::new();
        b.constant(0);
        let skip = b.goto_if_nil();
        b.constant(1);
        b.bind(skip);
        b.stop();

        // Constant0 is 1 byte, the branch 3; the target lands on offset 5.
        assert_eq!(
            decode_all(&b.into_bytes()),
            vec![
                Instruction::Constant { idx: 0 },
                Instruction::GotoIfNil { target: 5 },
                Instruction::Constant { idx: 1 },
                Instruction::Stop,
            ]
        );
    }

    #[test]
    fn forward_branch_variants() {
        for (emit, want) in [
            (
                (|b: &mut BytecodeBuilder| b.goto())
                    as fn(&mut BytecodeBuilder) -> Label,
                Instruction::Goto { target: 4 },
            ),
            (
                |b: &mut BytecodeBuilder| b.goto_if_non_nil(),
                Instruction::GotoIfNonNil { target: 4 },
            ),
            (
                |b: &mut BytecodeBuilder| b.goto_if_nil_else_pop(),
                Instruction::GotoIfNilElsePop { target: 4 },
            ),
            (
                |b: &mut BytecodeBuilder| b.goto_if_non_nil_else_pop(),
                Instruction::GotoIfNonNilElsePop { target: 4 },
            ),
        ] {
            let mut b = BytecodeBuilder::new();
            b.dup();
            let label = emit(&mut b);
            b.bind(label);
            assert_eq!(decode_all(&b.into_bytes()), vec![Instruction::Dup, want]);
        }
    }

    #[test]
    fn backward_branches() {
        let mut b = BytecodeBuilder::new();
        let top = b.current_offset();
        b.add1();
        b.rgoto_if_non_nil_back(top);
        b.goto_back(top);

        // The relative branch spans its own 2 bytes plus Add1.
        assert_eq!(
            decode_all(&b.into_bytes()),
            vec![
                Instruction::Add1,
                Instruction::RGotoIfNonNil { offset: -3 },
                Instruction::Goto { target: 0 },
            ]
        );
    }

    #[test]
    fn relative_branch_target_arithmetic() {
        let mut b = BytecodeBuilder::new();
        b.dup();
        b.dup();
        let top = b.current_offset();
        b.discard();
        b.rgoto_back(top);
        // Instruction at offset 3 ends at 5, so target = 5 + offset = 2.
        assert_eq!(b.as_bytes()[4] as i8, -3);
    }

    #[test]
    fn display_instructions() {
        assert_eq!(Instruction::StackRef { n: 3 }.to_string(), "StackRef 3");
        assert_eq!(Instruction::Constant { idx: 5 }.to_string(), "Constant #5");
        assert_eq!(Instruction::Goto { target: 12 }.to_string(), "Goto @12");
        assert_eq!(Instruction::RGoto { offset: -7 }.to_string(), "RGoto -7");
        assert_eq!(Instruction::RGoto { offset: 7 }.to_string(), "RGoto +7");
        assert_eq!(Instruction::Call { argc: 2 }.to_string(), "Call 2");
        assert_eq!(
            Instruction::NativeCall { argc: 1 }.to_string(),
            "NativeCall 1"
        );
        assert_eq!(Instruction::Stop.to_string(), "Stop");
        assert_eq!(Instruction::VarBind { idx: 3 }.to_string(), "VarBind #3");
    }

    #[test]
    fn narrow_forms_have_no_operand_bytes() {
        let mut b = BytecodeBuilder::new();
        b.stack_ref(5);
        assert_eq!(b.as_bytes(), &[op::STACK_REF5]);

        let mut b = BytecodeBuilder::new();
        b.constant(63);
        assert_eq!(b.as_bytes(), &[op::CONSTANT0 | 63]);

        let mut b = BytecodeBuilder::new();
        b.call(3);
        assert_eq!(b.as_bytes(), &[op::CALL3]);
    }

    #[test]
    fn wide_forms_spill_to_b_and_w() {
        let mut b = BytecodeBuilder::new();
        b.stack_ref(6);
        assert_eq!(b.as_bytes(), &[op::STACK_REF_B, 6]);

        let mut b = BytecodeBuilder::new();
        b.stack_ref(256);
        assert_eq!(b.as_bytes(), &[op::STACK_REF_W, 0x00, 0x01]);

        let mut b = BytecodeBuilder::new();
        b.constant(64);
        assert_eq!(b.as_bytes(), &[op::CONSTANT_W, 64, 0]);
    }

    #[test]
    fn decode_errors() {
        assert_eq!(
            BytecodeDecoder::new(&[0x10]).decode_next(),
            Some(Err(DecodeError::UnknownOpcode { offset: 0, op: 0x10 }))
        );
        assert_eq!(
            BytecodeDecoder::new(&[op::EXT, 0x40]).decode_next(),
            Some(Err(DecodeError::UnknownExtOpcode { offset: 1, op: 0x40 }))
        );
        assert_eq!(
            BytecodeDecoder::new(&[op::CONSTANT_W, 1]).decode_next(),
            Some(Err(DecodeError::Truncated { offset: 2 }))
        );

        // The decoder fuses after the first error.
        let mut decoder = BytecodeDecoder::new(&[0x10, op::DUP]);
        assert!(matches!(decoder.decode_next(), Some(Err(_))));
        assert_eq!(decoder.decode_next(), None);
    }

    #[test]
    fn decoder_tracks_offsets() {
        let mut b = BytecodeBuilder::new();
        b.constant(0);
        b.stack_ref(300);
        b.stop();
        let bytes = b.into_bytes();

        let mut decoder = BytecodeDecoder::new(&bytes);
        assert_eq!(decoder.offset(), 0);
        decoder.decode_next();
        assert_eq!(decoder.offset(), 1);
        decoder.decode_next();
        assert_eq!(decoder.offset(), 4);
        decoder.decode_next();
        assert_eq!(decoder.offset(), 6);
        assert!(decoder.is_at_end());
    }
}
