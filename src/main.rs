use clap::{App, Arg};

use std::fs;
use std::io;

use netlist::input::InputManager;
use netlist::program::Reg;
use netlist::report::{Code, Report, ReportContext, Severity};
use netlist::{dot, printer, scheduler, simulator::Simulator};

fn main() {
    if let Err(report) = run() {
        report.print();
        std::process::exit(1);
    }
}

fn read_file(ctx: &ReportContext, path: &str) -> Result<String, Report> {
    fs::read_to_string(path).map_err(|error| {
        ctx.report(Severity::Error)
            .with_code(Code::FileError)
            .with_message(format!("error reading {}: {}", path, error))
            .build()
    })
}

fn run() -> Result<(), Report> {
    let matches = App::new("netlist")
        .version("0.1.0")
        .about("Compiles and simulates netlist descriptions of synchronous circuits.")
        .arg(
            Arg::with_name("netlist")
                .help("The netlist file to process.")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("cycles")
                .short("n")
                .long("cycles")
                .takes_value(true)
                .help("Number of cycles to simulate."),
        )
        .arg(
            Arg::with_name("input")
                .short("i")
                .long("input")
                .takes_value(true)
                .help("Binding file with input sequences and memory images."),
        )
        .arg(
            Arg::with_name("print")
                .long("print")
                .help("Print the compiled program back as a netlist and exit."),
        )
        .arg(
            Arg::with_name("dot")
                .long("dot")
                .help("Export the dependency graph in DOT format and exit."),
        )
        .arg(
            Arg::with_name("schedule")
                .long("schedule")
                .help("Print the evaluation order and exit."),
        )
        .get_matches();

    let file_name = matches.value_of("netlist").unwrap();
    let ctx = ReportContext::new(file_name);
    let source = read_file(&ctx, file_name)?;
    let program = netlist::compile(&ctx, &source)?;

    if matches.is_present("print") {
        return printer::print_program(&program, &mut io::stdout())
            .map_err(|error| io_report(&ctx, error));
    }

    if matches.is_present("dot") {
        return dot::export(&program, &mut io::stdout()).map_err(|error| io_report(&ctx, error));
    }

    let schedule = scheduler::schedule(&ctx, &program)?;

    if matches.is_present("schedule") {
        let names: Vec<String> = schedule
            .order()
            .iter()
            .map(|&i| program.register_name(program.instructions[i].output()))
            .collect();
        println!("{}", names.join(" -> "));
        return Ok(());
    }

    let mut manager = match matches.value_of("input") {
        Some(path) => {
            let binding_ctx = ReportContext::new(path);
            let contents = read_file(&binding_ctx, path)?;
            InputManager::from_file(&binding_ctx, &contents)?
        }
        None => InputManager::interactive(),
    };
    manager.bind(&program)?;

    let mut sim = Simulator::new(&ctx, &program, schedule, manager.memory_images())?;

    let cycles: Option<usize> = match matches.value_of("cycles") {
        Some(text) => Some(text.parse().map_err(|_| {
            ctx.report(Severity::Error)
                .with_code(Code::InvalidCommandLine)
                .with_message(format!("'{}' is not a valid cycle count", text))
                .build()
        })?),
        None => None,
    };

    let total = cycles.or_else(|| manager.cycle_count());
    if total.is_none() && !manager.is_interactive() {
        return Err(ctx
            .report(Severity::Error)
            .with_code(Code::InvalidCommandLine)
            .with_message("the number of cycles to simulate must be given with --cycles")
            .build());
    }

    let outputs: Vec<Reg> = program.outputs().collect();
    let mut step = 0usize;
    loop {
        if let Some(total) = total {
            if step >= total {
                break;
            }
        }
        let inputs = match manager.next_inputs(&program, step)? {
            Some(inputs) => inputs,
            None => break,
        };

        sim.cycle(&inputs);
        step += 1;

        println!("Step {}:", step);
        for &reg in &outputs {
            let info = program.register(reg);
            println!(
                "  {} = 0b{:0width$b}",
                program.register_name(reg),
                sim.get_register(reg),
                width = info.bus_size as usize
            );
        }
    }

    Ok(())
}

fn io_report(ctx: &ReportContext, error: io::Error) -> Report {
    ctx.report(Severity::Error)
        .with_code(Code::FileError)
        .with_message(format!("error writing output: {}", error))
        .build()
}
