//! End-to-end tests driving the public API: compile a source string,
//! schedule it, and simulate it cycle by cycle.

use netlist::program::{Program, Reg, Value};
use netlist::report::{Code, ReportContext};
use netlist::scheduler;
use netlist::simulator::Simulator;

fn compile(source: &str) -> Program {
    let ctx = ReportContext::new("<test>");
    netlist::compile(&ctx, source).expect("the program should compile")
}

fn simulator<'p>(program: &'p Program, images: &[(String, Vec<Value>)]) -> Simulator<'p> {
    let ctx = ReportContext::new("<test>");
    let schedule = scheduler::schedule(&ctx, program).expect("the program should schedule");
    Simulator::new(&ctx, program, schedule, images).expect("the simulation should start")
}

fn output_reg(program: &Program, name: &str) -> Reg {
    program
        .outputs()
        .find(|&reg| program.register_name(reg) == name)
        .expect("unknown output")
}

/// Runs the program over the given per-cycle input values and returns the
/// value of each output after each cycle.
fn trace(source: &str, inputs: &[&[Value]]) -> Vec<Vec<Value>> {
    let program = compile(source);
    let mut sim = simulator(&program, &[]);
    let outputs: Vec<Reg> = program.outputs().collect();

    inputs
        .iter()
        .map(|cycle_inputs| {
            sim.cycle(cycle_inputs);
            outputs.iter().map(|&reg| sim.get_register(reg)).collect()
        })
        .collect()
}

#[test]
fn identity_register_delays_its_input_by_one_cycle() {
    let observed = trace(
        "INPUT a OUTPUT o VAR a, o IN o = REG a",
        &[&[1], &[0], &[1], &[1]],
    );
    assert_eq!(observed, vec![vec![0], vec![1], vec![0], vec![1]]);
}

#[test]
fn nand_built_from_and_and_not() {
    let source = "INPUT x, y OUTPUT z VAR x, y, z, t IN t = AND x y z = NOT t";
    for (x, y, expected) in [(0, 0, 1), (0, 1, 1), (1, 0, 1), (1, 1, 0)] {
        assert_eq!(trace(source, &[&[x, y]]), vec![vec![expected]]);
    }
}

#[test]
fn xor_truth_table() {
    let source = "INPUT a, b OUTPUT s VAR a:1, b:1, s:1 IN s = XOR a b";
    for (a, b, expected) in [(0, 0, 0), (0, 1, 1), (1, 0, 1), (1, 1, 0)] {
        assert_eq!(trace(source, &[&[a, b]]), vec![vec![expected]]);
    }
}

#[test]
fn rom_reads_the_word_at_the_current_address() {
    let program = compile("INPUT addr OUTPUT d VAR addr:1, d:4 IN d = ROM 1 4 addr");
    let images = vec![("d".to_string(), vec![0b1010, 0b0101])];
    let mut sim = simulator(&program, &images);
    let d = output_reg(&program, "d");

    sim.cycle(&[0]);
    assert_eq!(sim.get_register(d), 10);
    sim.cycle(&[1]);
    assert_eq!(sim.get_register(d), 5);
}

#[test]
fn ram_reads_before_it_writes() {
    let program = compile(
        "INPUT ra, we, wa, wd OUTPUT r \
         VAR ra:1, we:1, wa:1, wd:4, r:4 IN r = RAM 1 4 ra we wa wd",
    );
    let mut sim = simulator(&program, &[]);
    let r = output_reg(&program, "r");

    // Writing 0b1111 to address 0 while reading address 0: the read
    // observes the old contents.
    sim.cycle(&[0, 1, 0, 0b1111]);
    assert_eq!(sim.get_register(r), 0);

    // The write landed: the next cycle reads it back.
    sim.cycle(&[0, 0, 0, 0]);
    assert_eq!(sim.get_register(r), 15);
}

#[test]
fn combinational_cycles_are_rejected_naming_the_variables() {
    let ctx = ReportContext::new("<test>");
    let program = netlist::compile(&ctx, "INPUT OUTPUT VAR a, b IN a = NOT b b = NOT a").unwrap();
    let err = scheduler::schedule(&ctx, &program).unwrap_err();
    assert_eq!(err.code(), Code::CombinationalCycle);
    assert!(err.message().contains("a -> b") || err.message().contains("b -> a"));
}

#[test]
fn values_are_masked_to_their_bus_width() {
    // Feeding x and x + k * 2^w must produce identical traces.
    let source = "INPUT a, b OUTPUT o, n VAR a:3, b:3, o:3, n:3 IN o = XOR a b n = NOT a";
    let clean = trace(source, &[&[0b101, 0b011]]);
    let dirty = trace(source, &[&[0b101 + (7 << 3), 0b011 + (1 << 3)]]);
    assert_eq!(clean, dirty);
    assert_eq!(clean, vec![vec![0b110, 0b010]]);
}

#[test]
fn reg_observes_the_previous_cycle_even_through_feedback() {
    // A one-bit counter: the register feeds its own inverse back.
    let source = "INPUT OUTPUT o VAR o, t IN o = REG t t = NOT o";
    let observed = trace(source, &[&[], &[], &[], &[]]);
    assert_eq!(observed, vec![vec![0], vec![1], vec![0], vec![1]]);
}

#[test]
fn equation_order_does_not_change_the_trace() {
    let forward = "INPUT x OUTPUT o VAR x, o, u, v IN u = NOT x v = XOR u x o = REG v";
    let shuffled = "INPUT x OUTPUT o VAR x, o, u, v IN o = REG v v = XOR u x u = NOT x";
    let inputs: &[&[Value]] = &[&[0], &[1], &[1], &[0]];
    assert_eq!(trace(forward, inputs), trace(shuffled, inputs));
}

#[test]
fn printing_round_trips_to_an_equivalent_program() {
    let source = "INPUT c, x OUTPUT s, hi \
                  VAR c, x:4, s:4, hi:2, t:4, w:8 IN \
                  t = MUX c x 0b1001:4 \
                  w = CONCAT x t \
                  hi = SLICE 6 7 w \
                  s = XNOR t 0d3:4";
    let program = compile(source);

    let mut printed = Vec::new();
    netlist::printer::print_program(&program, &mut printed).unwrap();
    let printed = String::from_utf8(printed).unwrap();
    let reparsed = compile(&printed);

    assert_eq!(program.instructions, reparsed.instructions);
    assert_eq!(program.memories, reparsed.memories);
    assert_eq!(
        program
            .registers
            .iter()
            .map(|info| (info.bus_size, info.is_input, info.is_output))
            .collect::<Vec<_>>(),
        reparsed
            .registers
            .iter()
            .map(|info| (info.bus_size, info.is_input, info.is_output))
            .collect::<Vec<_>>()
    );

    // And the two programs behave identically.
    let inputs: &[&[Value]] = &[&[1, 0b1100], &[0, 0b0011]];
    let mut first = simulator(&program, &[]);
    let mut second = simulator(&reparsed, &[]);
    for cycle_inputs in inputs {
        first.cycle(cycle_inputs);
        second.cycle(cycle_inputs);
        for (a, b) in program.outputs().zip(reparsed.outputs()) {
            assert_eq!(first.get_register(a), second.get_register(b));
        }
    }
}

#[test]
fn an_unbound_rom_stops_the_simulation_from_starting() {
    let ctx = ReportContext::new("<test>");
    let program = compile("INPUT addr OUTPUT d VAR addr:1, d:4 IN d = ROM 1 4 addr");
    let schedule = scheduler::schedule(&ctx, &program).unwrap();
    let err = Simulator::new(&ctx, &program, schedule, &[]).unwrap_err();
    assert_eq!(err.code(), Code::UninitialisedMemory);
}

#[test]
fn a_memory_image_of_the_wrong_size_is_rejected() {
    let ctx = ReportContext::new("<test>");
    let program = compile("INPUT addr OUTPUT d VAR addr:2, d:4 IN d = ROM 2 4 addr");
    let schedule = scheduler::schedule(&ctx, &program).unwrap();
    let images = vec![("d".to_string(), vec![1, 2, 3])];
    let err = Simulator::new(&ctx, &program, schedule, &images).unwrap_err();
    assert_eq!(err.code(), Code::MemorySizeMismatch);
}

#[test]
fn an_unbound_ram_starts_zeroed() {
    let program = compile(
        "INPUT ra OUTPUT r VAR ra:2, r:8, zero IN \
         zero = 0 r = RAM 2 8 ra zero 00 0x00",
    );
    let mut sim = simulator(&program, &[]);
    let r = output_reg(&program, "r");
    for addr in 0..4 {
        sim.cycle(&[addr]);
        assert_eq!(sim.get_register(r), 0);
    }
}

#[test]
fn mux_selects_its_first_branch_when_the_choice_is_one() {
    let source = "INPUT c, t, f OUTPUT o VAR c, t:4, f:4, o:4 IN o = MUX c t f";
    assert_eq!(trace(source, &[&[1, 0b1010, 0b0101]]), vec![vec![0b1010]]);
    assert_eq!(trace(source, &[&[0, 0b1010, 0b0101]]), vec![vec![0b0101]]);
}

#[test]
fn select_and_slice_extract_bits() {
    let source = "INPUT x OUTPUT b, m VAR x:8, b, m:3 IN \
                  b = SELECT 7 x m = SLICE 2 4 x";
    let observed = trace(source, &[&[0b1001_1100]]);
    assert_eq!(observed, vec![vec![1, 0b111]]);
}

#[test]
fn concat_is_low_bits_first() {
    let source = "INPUT lo, hi OUTPUT o VAR lo:2, hi:2, o:4 IN o = CONCAT lo hi";
    assert_eq!(trace(source, &[&[0b01, 0b10]]), vec![vec![0b1001]]);
}

#[test]
fn sixty_four_bit_buses_are_supported() {
    let source = "INPUT a OUTPUT o VAR a:64, o:64 IN o = NOT a";
    assert_eq!(trace(source, &[&[0]]), vec![vec![u64::MAX]]);
    assert_eq!(trace(source, &[&[u64::MAX]]), vec![vec![0]]);
}

#[test]
fn a_register_chain_delays_by_two_cycles() {
    let source = "INPUT a OUTPUT o VAR a, o, t IN t = REG a o = REG t";
    let observed = trace(source, &[&[1], &[0], &[0], &[0]]);
    assert_eq!(observed, vec![vec![0], vec![0], vec![1], vec![0]]);
}

#[test]
fn ram_write_respects_the_write_address() {
    let program = compile(
        "INPUT ra, we, wa, wd OUTPUT r \
         VAR ra:2, we:1, wa:2, wd:4, r:4 IN r = RAM 2 4 ra we wa wd",
    );
    let mut sim = simulator(&program, &[]);
    let r = output_reg(&program, "r");

    // Fill addresses 0..4 with distinct values.
    for addr in 0..4u64 {
        sim.cycle(&[0, 1, addr, addr + 1]);
    }
    // Read them back with writes disabled.
    for addr in 0..4u64 {
        sim.cycle(&[addr, 0, 0, 0]);
        assert_eq!(sim.get_register(r), addr + 1);
    }
}
