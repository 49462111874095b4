//! End-to-end scenarios drawn from the architected test corpus: a program
//! is poked into a test machine's flat RAM at address 0 and stepped, then
//! the register file/flags/memory are checked against the documented
//! outcome.

use we32100_core::cpu::StepOutcome;
use we32100_core::machine::Machine;
use we32100_core::mau::extended::ExtendedFloat;
use we32100_core::mau::{ops, CommandWord, Mau, MauOp, OperandSpec, MAU_COPROCESSOR_ID};
use we32100_core::memory::{Bus, Ram, Width};
use we32100_core::mmu::gen1::MmuGen1;
use we32100_core::mmu::{AccessRequest, Mmu};
use we32100_core::psw::{Level, PswFlags};

fn mau_command(opcode: MauOp, src1: OperandSpec, src2: OperandSpec, dst: OperandSpec) -> CommandWord {
    CommandWord { coprocessor_id: MAU_COPROCESSOR_ID, opcode, src1, src2, dst }
}

fn load(machine: &mut Machine, bytes: &[u8]) {
    for (i, b) in bytes.iter().enumerate() {
        machine.cpu.bus.write(i as u32, Width::Byte, *b as u32).unwrap();
    }
}

fn step_ok(machine: &mut Machine) -> StepOutcome {
    match machine.cpu.step() {
        Ok(outcome) => outcome,
        Err(reason) => panic!("unexpected stop: {reason:?}"),
    }
}

/// Scenario A: MOVW #1,R6 / MOVW R6,R7 / INCW R8 / TSTW R8.
#[test]
fn scenario_a_arithmetic_and_flags() {
    let mut machine = Machine::for_test(4096);
    load(&mut machine, &[0x84, 0x01, 0x46, 0x84, 0x46, 0x47, 0x90, 0x48, 0x28, 0x48]);
    machine.cpu.regs.set_pc(0);

    for _ in 0..4 {
        assert!(matches!(step_ok(&mut machine), StepOutcome::Retired { .. }));
    }

    assert_eq!(machine.cpu.regs.get(6), 1);
    assert_eq!(machine.cpu.regs.get(7), 1);
    assert_eq!(machine.cpu.regs.get(8), 1);

    let psw = machine.cpu.regs.psw();
    assert!(!psw.flag(PswFlags::Z));
    assert!(!psw.flag(PswFlags::N));
    assert!(!psw.flag(PswFlags::C));
    assert!(!psw.flag(PswFlags::V));
}

/// Scenario B: following scenario A, BLEB +2 is not taken (Z=0,N=0,V=0
/// makes Leq false), then BRB -4 loops back to the BLEB instruction.
#[test]
fn scenario_b_branch_on_flag() {
    let mut machine = Machine::for_test(4096);
    load(
        &mut machine,
        &[0x84, 0x01, 0x46, 0x84, 0x46, 0x47, 0x90, 0x48, 0x28, 0x48, 0x4f, 0x02, 0x7b, 0xfc],
    );
    machine.cpu.regs.set_pc(0);

    for _ in 0..4 {
        step_ok(&mut machine);
    }
    let bleb_pc = machine.cpu.regs.pc();
    assert_eq!(bleb_pc, 10);

    step_ok(&mut machine);
    assert_eq!(machine.cpu.regs.pc(), bleb_pc + 2);

    step_ok(&mut machine);
    assert_eq!(machine.cpu.regs.pc(), bleb_pc);
}

/// Boundary: ADDW2 #1,R0 with R0=0x7FFFFFFF sets V and N, clears Z.
#[test]
fn addw2_signed_overflow_sets_v_and_n() {
    let mut machine = Machine::for_test(4096);
    // ADDW2: opcode 0x9c, src=#1 (word immediate, descriptor 0x4f + word), dst=R0 (0x40).
    let mut program = vec![0x9c, 0x4f];
    program.extend_from_slice(&1u32.to_le_bytes());
    program.push(0x40);
    load(&mut machine, &program);
    machine.cpu.regs.set_pc(0);
    machine.cpu.regs.set(0, 0x7fff_ffff);

    step_ok(&mut machine);

    assert_eq!(machine.cpu.regs.get(0), 0x8000_0000);
    let psw = machine.cpu.regs.psw();
    assert!(psw.flag(PswFlags::V));
    assert!(psw.flag(PswFlags::N));
    assert!(!psw.flag(PswFlags::Z));
}

/// Boundary: SUBW2 #1,R0 with R0=0x80000000 sets V, clears N, result wraps
/// to 0x7FFFFFFF.
#[test]
fn subw2_signed_underflow_sets_v() {
    let mut machine = Machine::for_test(4096);
    let mut program = vec![0xbc, 0x4f];
    program.extend_from_slice(&1u32.to_le_bytes());
    program.push(0x40);
    load(&mut machine, &program);
    machine.cpu.regs.set_pc(0);
    machine.cpu.regs.set(0, 0x8000_0000);

    step_ok(&mut machine);

    assert_eq!(machine.cpu.regs.get(0), 0x7fff_ffff);
    let psw = machine.cpu.regs.psw();
    assert!(psw.flag(PswFlags::V));
    assert!(!psw.flag(PswFlags::N));
}

/// Boundary: DIVW2 by zero raises integer-zero-divide instead of mutating
/// the destination (delivered as an architected exception, not propagated).
#[test]
fn divw2_by_zero_is_resolved_into_exception_delivery() {
    let mut machine = Machine::for_test(65536);
    // DIVW2: opcode 0xac, src=#0 (word immediate), dst=R0.
    let mut program = vec![0xac, 0x4f];
    program.extend_from_slice(&0u32.to_le_bytes());
    program.push(0x40);
    load(&mut machine, &program);
    machine.cpu.regs.set_pc(0);
    machine.cpu.regs.set(0, 42);

    let outcome = machine.cpu.step();
    assert!(matches!(outcome, Ok(StepOutcome::ExceptionDelivered(_))));
    assert_eq!(machine.cpu.regs.get(0), 42, "destination must be unchanged on fault");
}

/// Boundary: DIVW2 0xFFFFFFFF (-1) into 0x80000000 (i32::MIN) sets V and
/// saturates the destination rather than panicking on overflow.
#[test]
fn divw2_min_by_minus_one_sets_v_and_saturates() {
    let mut machine = Machine::for_test(4096);
    let mut program = vec![0xac, 0x4f];
    program.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
    program.push(0x40);
    load(&mut machine, &program);
    machine.cpu.regs.set_pc(0);
    machine.cpu.regs.set(0, 0x8000_0000);

    step_ok(&mut machine);

    assert_eq!(machine.cpu.regs.get(0), 0x8000_0000);
    assert!(machine.cpu.regs.psw().flag(PswFlags::V));
}

/// Round-trip law: SAVE followed by RESTORE over the same range leaves the
/// register file (and FP) unchanged.
#[test]
fn save_restore_round_trips_registers() {
    let mut machine = Machine::for_test(4096);
    // SAVE 3 / RESTORE 3: opcodes 0x10/0x18, range operand = short literal 3.
    load(&mut machine, &[0x10, 0x03, 0x18, 0x03]);
    machine.cpu.regs.set_pc(0);
    machine.cpu.regs.set_sp(0x1000);
    machine.cpu.regs.set_fp(0x2000);
    for r in 0..=3u32 {
        machine.cpu.regs.set(r as usize, 0xa0 + r);
    }

    step_ok(&mut machine); // SAVE
    for r in 0..=3u32 {
        machine.cpu.regs.set(r as usize, 0);
    }

    step_ok(&mut machine); // RESTORE

    for r in 0..=3u32 {
        assert_eq!(machine.cpu.regs.get(r as usize), 0xa0 + r);
    }
    assert_eq!(machine.cpu.regs.fp(), 0x2000);
    assert_eq!(machine.cpu.regs.sp(), 0x1000);
}

/// Scenario D (translation): a paged, present segment walk resolves a VA
/// to the expected physical address and is idempotent on repeated calls
/// (spec §8 "translate(VA, access) returns the same physical address on
/// repeated calls").
#[test]
fn mmu_gen1_paged_walk_resolves_and_is_repeatable() {
    let mut bus = Bus::new();
    bus.attach(0, 0x10000, Box::new(Ram::new(0x10000)));

    let mut mmu = MmuGen1::new();
    mmu.section_table_base[1] = 0x1000;
    mmu.page_size = we32100_core::mmu::PageSize::Size4K;

    // Segment descriptor at section_table_base[1] + ssl(0)*8: word0=page
    // table base, word1=present|paged|access(RW for all levels)|max_offset.
    bus.write(0x1000, Width::Word, 0x2000).unwrap();
    bus.write(0x1004, Width::Word, 0xc300_00ff).unwrap();

    // Page descriptor for page index 3 at page-table-base + 3*4.
    let pd_addr = 0x2000u32 + 3 * 4;
    bus.write(pd_addr, Width::Word, 0x8000_5000).unwrap();

    // VA: section=1, ssl=0, page index=3, in-page offset=0x10.
    let va = (1u32 << 30) | (3 << 12) | 0x10;

    let pa1 = mmu.translate(va, AccessRequest::OperandFetch, Level::Kernel, &mut bus).unwrap();
    assert_eq!(pa1, 0x5010);

    let pa2 = mmu.translate(va, AccessRequest::OperandFetch, Level::Kernel, &mut bus).unwrap();
    assert_eq!(pa2, pa1, "repeated translate must be idempotent absent cache-invalidating writes");
}

/// Scenario D variant: an unpaged segment denies user-level write access
/// while kernel level succeeds, per the access-control field's per-level
/// bits (spec §8 "Page access with R/W masked off at user level but
/// allowed at kernel level succeeds in kernel, faults in user").
#[test]
fn mmu_gen1_denies_user_write_allows_kernel() {
    let mut bus = Bus::new();
    bus.attach(0, 0x10000, Box::new(Ram::new(0x10000)));

    let mut mmu = MmuGen1::new();
    mmu.section_table_base[1] = 0x1000;

    // word1 = 0x8300_00ff: present=1, paged=0, access_control byte=0x83
    // (kernel field bits0-1=0b11=ReadWrite, user field bits6-7=0b10=
    // ReadExecute, which denies writes), max_offset=0xff.
    bus.write(0x1000, Width::Word, 0x5000).unwrap();
    bus.write(0x1004, Width::Word, 0x8300_00ff).unwrap();

    let va = (1u32 << 30) | 0x10;

    let user_result = mmu.translate(va, AccessRequest::Write, Level::User, &mut bus);
    assert!(user_result.is_err());

    let kernel_result = mmu.translate(va, AccessRequest::OperandFetch, Level::Kernel, &mut bus);
    assert_eq!(kernel_result.unwrap(), 0x5010);
}

fn scratch_bus() -> Bus {
    let mut bus = Bus::new();
    bus.attach(0, 4096, Box::new(Ram::new(4096)));
    bus
}

/// Round-trip law: ITOF followed by FTOI is the identity on representable
/// signed 32-bit integers.
#[test]
fn mau_itof_ftoi_round_trips_representable_integers() {
    for value in [0i32, 1, -1, 12345, -999999, i32::MAX, i32::MIN] {
        let mut mau = Mau::new();
        let mut bus = scratch_bus();
        bus.write(0, Width::Word, value as u32).unwrap();

        let itof = mau_command(MauOp::Itof, OperandSpec::Register(0), OperandSpec::Register(0), OperandSpec::Register(1));
        ops::execute(&mut mau, itof, Some(0), None, &mut bus).unwrap();
        assert!(mau.registers[1].equals(ExtendedFloat::from_i64(value as i64)));

        let ftoi = mau_command(MauOp::Ftoi, OperandSpec::Register(1), OperandSpec::Register(1), OperandSpec::Register(2));
        let result = ops::execute(&mut mau, ftoi, None, None, &mut bus).unwrap();
        let back = result.result_word.unwrap() as i32;
        assert_eq!(back, value, "itof/ftoi should round-trip {value}");
    }
}

/// Scenario F (NaN propagation): MUL with one operand a trapping NaN
/// produces a quiet NaN result and sets the invalid sticky flag.
#[test]
fn mau_mul_with_signaling_nan_sets_invalid_and_quiets() {
    let mut mau = Mau::new();
    mau.registers[0] = ExtendedFloat::signaling_nan();
    mau.registers[1] = ExtendedFloat::from_single_bits(3.14f32.to_bits());
    let mut bus = scratch_bus();

    let cmd = mau_command(MauOp::Mul, OperandSpec::Register(0), OperandSpec::Register(1), OperandSpec::Register(2));
    let result = ops::execute(&mut mau, cmd, None, None, &mut bus).unwrap();

    assert!(mau.sticky.invalid);
    assert!(mau.registers[2].is_nan());
    assert!(!mau.registers[2].nan_is_signaling, "result NaN must be quieted");
    assert!(!result.io, "ECP must not fire while the invalid mask is clear");
}

/// Scenario E (divide by zero): DIV with source-1=1.0, source-2=+0.0 and
/// the divide-by-zero mask clear produces signed infinity, not ECP.
#[test]
fn mau_div_by_zero_unmasked_produces_infinity_without_ecp() {
    let mut mau = Mau::new();
    mau.registers[0] = ExtendedFloat::from_i64(1);
    mau.registers[1] = ExtendedFloat::ZERO;
    let mut bus = scratch_bus();

    let cmd = mau_command(MauOp::Div, OperandSpec::Register(0), OperandSpec::Register(1), OperandSpec::Register(2));
    let result = ops::execute(&mut mau, cmd, None, None, &mut bus).unwrap();

    assert!(mau.registers[2].is_infinite());
    assert!(!mau.registers[2].is_negative());
    assert!(mau.sticky.divide_by_zero);
    assert!(!mau.masks.divide_by_zero);
    assert!(result.ps);
    assert!(!result.io, "ECP (io) must not be asserted when the mask is clear");
}
