//! Latte ISA opcode tables.
//!
//! Every table maps the raw encoded value to a typed opcode plus the mnemonic used by the
//! disassembler and the generator's `// Unimplemented` markers. ALU opcodes additionally carry
//! their source operand count and [`AluFlags`].

use bitflags::bitflags;

bitflags! {
    /// Per-opcode ALU properties.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AluFlags: u32 {
        /// Only issues on the four vector units (slot is the destination channel).
        const VECTOR = 1 << 0;
        /// Only issues on the transcendental unit.
        const TRANSCENDENTAL = 1 << 1;
        /// Combines all four vector lanes of a group into one result.
        const REDUCTION = 1 << 2;
        /// Updates predicate / execute-mask state.
        const PRED_SET = 1 << 3;
        const INT_IN = 1 << 4;
        const INT_OUT = 1 << 5;
        const UINT_IN = 1 << 6;
        const UINT_OUT = 1 << 7;
        /// Double-precision operation (pairs of 32-bit channels).
        const DOUBLE = 1 << 8;
    }
}

macro_rules! opcode_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $raw:literal => $text:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $($raw => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn raw(self) -> u32 {
                match self {
                    $(Self::$variant => $raw,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

macro_rules! alu_opcode_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $raw:literal => $text:literal ($srcs:literal $(, $flag:ident)*),)*
        }
    ) => {
        opcode_table! {
            $(#[$meta])*
            pub enum $name {
                $($variant = $raw => $text,)*
            }
        }

        impl $name {
            /// Number of source operands read by the opcode.
            pub fn src_count(self) -> usize {
                match self {
                    $(Self::$variant => $srcs,)*
                }
            }

            pub fn flags(self) -> AluFlags {
                match self {
                    $(Self::$variant => AluFlags::empty() $(| AluFlags::$flag)*,)*
                }
            }
        }
    };
}

opcode_table! {
    /// `CF_INST` of a normal (type 0) control-flow word.
    pub enum CfOpcode {
        Nop = 0 => "NOP",
        Tex = 1 => "TEX",
        Vtx = 2 => "VTX",
        VtxTc = 3 => "VTX_TC",
        LoopStart = 4 => "LOOP_START",
        LoopEnd = 5 => "LOOP_END",
        LoopStartDx10 = 6 => "LOOP_START_DX10",
        LoopStartNoAl = 7 => "LOOP_START_NO_AL",
        LoopContinue = 8 => "LOOP_CONTINUE",
        LoopBreak = 9 => "LOOP_BREAK",
        Jump = 10 => "JUMP",
        Push = 11 => "PUSH",
        PushElse = 12 => "PUSH_ELSE",
        Else = 13 => "ELSE",
        Pop = 14 => "POP",
        PopJump = 15 => "POP_JUMP",
        PopPush = 16 => "POP_PUSH",
        PopPushElse = 17 => "POP_PUSH_ELSE",
        Call = 18 => "CALL",
        CallFs = 19 => "CALL_FS",
        Return = 20 => "RETURN",
        EmitVertex = 21 => "EMIT_VERTEX",
        EmitCutVertex = 22 => "EMIT_CUT_VERTEX",
        CutVertex = 23 => "CUT_VERTEX",
        Kill = 24 => "KILL",
        EndProgram = 25 => "END_PROGRAM",
        WaitAck = 26 => "WAIT_ACK",
        TexAck = 27 => "TEX_ACK",
        VtxAck = 28 => "VTX_ACK",
        VtxTcAck = 29 => "VTX_TC_ACK",
    }
}

impl CfOpcode {
    pub fn is_loop_start(self) -> bool {
        matches!(
            self,
            CfOpcode::LoopStart | CfOpcode::LoopStartDx10 | CfOpcode::LoopStartNoAl
        )
    }
}

opcode_table! {
    /// `CF_INST` of an ALU clause (type 2/3) control-flow word.
    pub enum AluCfOpcode {
        Alu = 8 => "ALU",
        AluPushBefore = 9 => "ALU_PUSH_BEFORE",
        AluPopAfter = 10 => "ALU_POP_AFTER",
        AluPop2After = 11 => "ALU_POP2_AFTER",
        AluExt = 12 => "ALU_EXT",
        AluContinue = 13 => "ALU_CONTINUE",
        AluBreak = 14 => "ALU_BREAK",
        AluElseAfter = 15 => "ALU_ELSE_AFTER",
    }
}

opcode_table! {
    /// `CF_INST` of an export / memory-write (type 1) control-flow word.
    pub enum ExpOpcode {
        MemStream0 = 32 => "MEM_STREAM0",
        MemStream1 = 33 => "MEM_STREAM1",
        MemStream2 = 34 => "MEM_STREAM2",
        MemStream3 = 35 => "MEM_STREAM3",
        MemScratch = 36 => "MEM_SCRATCH",
        MemReduction = 37 => "MEM_REDUCTION",
        MemRing = 38 => "MEM_RING",
        Exp = 39 => "EXP",
        ExpDone = 40 => "EXP_DONE",
        MemExport = 58 => "MEM_EXPORT",
    }
}

alu_opcode_table! {
    /// Two-source ALU encoding (`ALU_WORD1_OP2`).
    pub enum Op2 {
        Add = 0 => "ADD" (2),
        Mul = 1 => "MUL" (2),
        MulIeee = 2 => "MUL_IEEE" (2),
        Max = 3 => "MAX" (2),
        Min = 4 => "MIN" (2),
        MaxDx10 = 5 => "MAX_DX10" (2),
        MinDx10 = 6 => "MIN_DX10" (2),
        Frexp64 = 7 => "FREXP_64" (1, DOUBLE),
        Sete = 8 => "SETE" (2),
        Setgt = 9 => "SETGT" (2),
        Setge = 10 => "SETGE" (2),
        Setne = 11 => "SETNE" (2),
        SeteDx10 = 12 => "SETE_DX10" (2, INT_OUT),
        SetgtDx10 = 13 => "SETGT_DX10" (2, INT_OUT),
        SetgeDx10 = 14 => "SETGE_DX10" (2, INT_OUT),
        SetneDx10 = 15 => "SETNE_DX10" (2, INT_OUT),
        Fract = 16 => "FRACT" (1),
        Trunc = 17 => "TRUNC" (1),
        Ceil = 18 => "CEIL" (1),
        Rndne = 19 => "RNDNE" (1),
        Floor = 20 => "FLOOR" (1),
        Mova = 21 => "MOVA" (1),
        MovaFloor = 22 => "MOVA_FLOOR" (1),
        Add64 = 23 => "ADD_64" (2, DOUBLE),
        MovaInt = 24 => "MOVA_INT" (1, INT_IN),
        Mov = 25 => "MOV" (1),
        Nop = 26 => "NOP" (0),
        Mul64 = 27 => "MUL_64" (2, DOUBLE),
        Flt64ToFlt32 = 28 => "FLT64_TO_FLT32" (1, DOUBLE),
        Flt32ToFlt64 = 29 => "FLT32_TO_FLT64" (1, DOUBLE),
        PredSetgtUint = 30 => "PRED_SETGT_UINT" (2, PRED_SET, UINT_IN),
        PredSetgeUint = 31 => "PRED_SETGE_UINT" (2, PRED_SET, UINT_IN),
        PredSete = 32 => "PRED_SETE" (2, PRED_SET),
        PredSetgt = 33 => "PRED_SETGT" (2, PRED_SET),
        PredSetge = 34 => "PRED_SETGE" (2, PRED_SET),
        PredSetne = 35 => "PRED_SETNE" (2, PRED_SET),
        PredSetInv = 36 => "PRED_SET_INV" (1, PRED_SET),
        PredSetPop = 37 => "PRED_SET_POP" (2, PRED_SET),
        PredSetClr = 38 => "PRED_SET_CLR" (0, PRED_SET),
        PredSetRestore = 39 => "PRED_SET_RESTORE" (1, PRED_SET),
        PredSetePush = 40 => "PRED_SETE_PUSH" (2, PRED_SET),
        PredSetgtPush = 41 => "PRED_SETGT_PUSH" (2, PRED_SET),
        PredSetgePush = 42 => "PRED_SETGE_PUSH" (2, PRED_SET),
        PredSetnePush = 43 => "PRED_SETNE_PUSH" (2, PRED_SET),
        Kille = 44 => "KILLE" (2),
        Killgt = 45 => "KILLGT" (2),
        Killge = 46 => "KILLGE" (2),
        Killne = 47 => "KILLNE" (2),
        AndInt = 48 => "AND_INT" (2, INT_IN, INT_OUT),
        OrInt = 49 => "OR_INT" (2, INT_IN, INT_OUT),
        XorInt = 50 => "XOR_INT" (2, INT_IN, INT_OUT),
        NotInt = 51 => "NOT_INT" (1, INT_IN, INT_OUT),
        AddInt = 52 => "ADD_INT" (2, INT_IN, INT_OUT),
        SubInt = 53 => "SUB_INT" (2, INT_IN, INT_OUT),
        MaxInt = 54 => "MAX_INT" (2, INT_IN, INT_OUT),
        MinInt = 55 => "MIN_INT" (2, INT_IN, INT_OUT),
        MaxUint = 56 => "MAX_UINT" (2, UINT_IN, UINT_OUT),
        MinUint = 57 => "MIN_UINT" (2, UINT_IN, UINT_OUT),
        SeteInt = 58 => "SETE_INT" (2, INT_IN, INT_OUT),
        SetgtInt = 59 => "SETGT_INT" (2, INT_IN, INT_OUT),
        SetgeInt = 60 => "SETGE_INT" (2, INT_IN, INT_OUT),
        SetneInt = 61 => "SETNE_INT" (2, INT_IN, INT_OUT),
        SetgtUint = 62 => "SETGT_UINT" (2, UINT_IN, UINT_OUT),
        SetgeUint = 63 => "SETGE_UINT" (2, UINT_IN, UINT_OUT),
        KillgtUint = 64 => "KILLGT_UINT" (2, UINT_IN),
        KillgeUint = 65 => "KILLGE_UINT" (2, UINT_IN),
        PredSeteInt = 66 => "PRED_SETE_INT" (2, PRED_SET, INT_IN),
        PredSetgtInt = 67 => "PRED_SETGT_INT" (2, PRED_SET, INT_IN),
        PredSetgeInt = 68 => "PRED_SETGE_INT" (2, PRED_SET, INT_IN),
        PredSetneInt = 69 => "PRED_SETNE_INT" (2, PRED_SET, INT_IN),
        KilleInt = 70 => "KILLE_INT" (2, INT_IN),
        KillgtInt = 71 => "KILLGT_INT" (2, INT_IN),
        KillgeInt = 72 => "KILLGE_INT" (2, INT_IN),
        KillneInt = 73 => "KILLNE_INT" (2, INT_IN),
        PredSetePushInt = 74 => "PRED_SETE_PUSH_INT" (2, PRED_SET, INT_IN),
        PredSetgtPushInt = 75 => "PRED_SETGT_PUSH_INT" (2, PRED_SET, INT_IN),
        PredSetgePushInt = 76 => "PRED_SETGE_PUSH_INT" (2, PRED_SET, INT_IN),
        PredSetnePushInt = 77 => "PRED_SETNE_PUSH_INT" (2, PRED_SET, INT_IN),
        PredSetltPushInt = 78 => "PRED_SETLT_PUSH_INT" (2, PRED_SET, INT_IN),
        PredSetlePushInt = 79 => "PRED_SETLE_PUSH_INT" (2, PRED_SET, INT_IN),
        Dot4 = 80 => "DOT4" (2, VECTOR, REDUCTION),
        Dot4Ieee = 81 => "DOT4_IEEE" (2, VECTOR, REDUCTION),
        Cube = 82 => "CUBE" (2, VECTOR, REDUCTION),
        Max4 = 83 => "MAX4" (1, VECTOR, REDUCTION),
        MovaGprInt = 96 => "MOVA_GPR_INT" (1, TRANSCENDENTAL, INT_IN, INT_OUT),
        ExpIeee = 97 => "EXP_IEEE" (1, TRANSCENDENTAL),
        LogClamped = 98 => "LOG_CLAMPED" (1, TRANSCENDENTAL),
        LogIeee = 99 => "LOG_IEEE" (1, TRANSCENDENTAL),
        RecipClamped = 100 => "RECIP_CLAMPED" (1, TRANSCENDENTAL),
        RecipFf = 101 => "RECIP_FF" (1, TRANSCENDENTAL),
        RecipIeee = 102 => "RECIP_IEEE" (1, TRANSCENDENTAL),
        RecipsqrtClamped = 103 => "RECIPSQRT_CLAMPED" (1, TRANSCENDENTAL),
        RecipsqrtFf = 104 => "RECIPSQRT_FF" (1, TRANSCENDENTAL),
        RecipsqrtIeee = 105 => "RECIPSQRT_IEEE" (1, TRANSCENDENTAL),
        SqrtIeee = 106 => "SQRT_IEEE" (1, TRANSCENDENTAL),
        FltToInt = 107 => "FLT_TO_INT" (1, TRANSCENDENTAL, INT_OUT),
        IntToFlt = 108 => "INT_TO_FLT" (1, TRANSCENDENTAL, INT_IN),
        UintToFlt = 109 => "UINT_TO_FLT" (1, TRANSCENDENTAL, UINT_IN),
        Sin = 110 => "SIN" (1, TRANSCENDENTAL),
        Cos = 111 => "COS" (1, TRANSCENDENTAL),
        AshrInt = 112 => "ASHR_INT" (2, INT_IN, INT_OUT),
        LshrInt = 113 => "LSHR_INT" (2, UINT_IN, UINT_OUT),
        LshlInt = 114 => "LSHL_INT" (2, INT_IN, INT_OUT),
        MulloInt = 115 => "MULLO_INT" (2, TRANSCENDENTAL, INT_IN, INT_OUT),
        MulhiInt = 116 => "MULHI_INT" (2, TRANSCENDENTAL, INT_IN, INT_OUT),
        MulloUint = 117 => "MULLO_UINT" (2, TRANSCENDENTAL, UINT_IN, UINT_OUT),
        MulhiUint = 118 => "MULHI_UINT" (2, TRANSCENDENTAL, UINT_IN, UINT_OUT),
        RecipInt = 119 => "RECIP_INT" (1, TRANSCENDENTAL, INT_IN, INT_OUT),
        RecipUint = 120 => "RECIP_UINT" (1, TRANSCENDENTAL, UINT_IN, UINT_OUT),
        FltToUint = 121 => "FLT_TO_UINT" (1, TRANSCENDENTAL, UINT_OUT),
        Ldexp64 = 122 => "LDEXP_64" (2, DOUBLE),
        Fract64 = 123 => "FRACT_64" (1, DOUBLE),
        PredSetgt64 = 124 => "PRED_SETGT_64" (2, PRED_SET, DOUBLE),
        PredSete64 = 125 => "PRED_SETE_64" (2, PRED_SET, DOUBLE),
        PredSetge64 = 126 => "PRED_SETGE_64" (2, PRED_SET, DOUBLE),
    }
}

alu_opcode_table! {
    /// Three-source ALU encoding (`ALU_WORD1_OP3`).
    pub enum Op3 {
        Muladd64 = 8 => "MULADD_64" (3, DOUBLE),
        Muladd64M2 = 9 => "MULADD_64_M2" (3, DOUBLE),
        Muladd64M4 = 10 => "MULADD_64_M4" (3, DOUBLE),
        Muladd64D2 = 11 => "MULADD_64_D2" (3, DOUBLE),
        MulLit = 12 => "MUL_LIT" (3),
        MulLitM2 = 13 => "MUL_LIT_M2" (3),
        MulLitM4 = 14 => "MUL_LIT_M4" (3),
        MulLitD2 = 15 => "MUL_LIT_D2" (3),
        Muladd = 16 => "MULADD" (3),
        MuladdM2 = 17 => "MULADD_M2" (3),
        MuladdM4 = 18 => "MULADD_M4" (3),
        MuladdD2 = 19 => "MULADD_D2" (3),
        MuladdIeee = 20 => "MULADD_IEEE" (3),
        MuladdIeeeM2 = 21 => "MULADD_IEEE_M2" (3),
        MuladdIeeeM4 = 22 => "MULADD_IEEE_M4" (3),
        MuladdIeeeD2 = 23 => "MULADD_IEEE_D2" (3),
        Cnde = 24 => "CNDE" (3),
        Cndgt = 25 => "CNDGT" (3),
        Cndge = 26 => "CNDGE" (3),
        CndeInt = 28 => "CNDE_INT" (3, INT_IN),
        CndgtInt = 29 => "CNDGT_INT" (3, INT_IN),
        CndgeInt = 30 => "CNDGE_INT" (3, INT_IN),
    }
}

opcode_table! {
    /// `TEX_INST` of a texture-fetch clause record.
    pub enum TexOpcode {
        VtxFetch = 0 => "VTX_FETCH",
        VtxSemantic = 1 => "VTX_SEMANTIC",
        Mem = 2 => "MEM",
        Ld = 3 => "LD",
        GetTextureInfo = 4 => "GET_TEXTURE_INFO",
        GetNumberOfSamples = 5 => "GET_NUMBER_OF_SAMPLES",
        GetLod = 6 => "GET_LOD",
        GetGradientsH = 7 => "GET_GRADIENTS_H",
        GetGradientsV = 8 => "GET_GRADIENTS_V",
        SetTextureOffsets = 9 => "SET_TEXTURE_OFFSETS",
        KeepGradients = 10 => "KEEP_GRADIENTS",
        SetGradientsH = 11 => "SET_GRADIENTS_H",
        SetGradientsV = 12 => "SET_GRADIENTS_V",
        Pass = 13 => "PASS",
        SetCubemapIndex = 14 => "SET_CUBEMAP_INDEX",
        Fetch4 = 15 => "FETCH4",
        Sample = 16 => "SAMPLE",
        SampleL = 17 => "SAMPLE_L",
        SampleLb = 18 => "SAMPLE_LB",
        SampleLz = 19 => "SAMPLE_LZ",
        SampleG = 20 => "SAMPLE_G",
        SampleGL = 21 => "SAMPLE_G_L",
        SampleGLb = 22 => "SAMPLE_G_LB",
        SampleGLz = 23 => "SAMPLE_G_LZ",
        SampleC = 24 => "SAMPLE_C",
        SampleCL = 25 => "SAMPLE_C_L",
        SampleCLb = 26 => "SAMPLE_C_LB",
        SampleCLz = 27 => "SAMPLE_C_LZ",
        SampleCG = 28 => "SAMPLE_C_G",
        SampleCGL = 29 => "SAMPLE_C_G_L",
        SampleCGLb = 30 => "SAMPLE_C_G_LB",
        SampleCGLz = 31 => "SAMPLE_C_G_LZ",
    }
}

opcode_table! {
    /// `VTX_INST` of a vertex-fetch clause record.
    pub enum VtxOpcode {
        Fetch = 0 => "FETCH",
        Semantic = 1 => "SEMANTIC",
    }
}
