use std::fs;
use std::process;

#[macro_use]
extern crate clap;
use clap::{Arg, App};

use realmode86::asm::Assembler;
use realmode86::config::MachineConfig;
use realmode86::machine::Machine;

fn main() {
    env_logger::init();

    let matches = App::new("realmode86-asm")
        .version("0.1")
        .arg(Arg::with_name("INPUT")
            .help("Sets the source file to assemble")
            .required(true)
            .index(1))
        .arg(Arg::with_name("OUTPUT")
            .help("Writes the assembled binary to file")
            .takes_value(true)
            .short("o")
            .long("output"))
        .arg(Arg::with_name("ORIGIN")
            .help("Offset of the first byte (default 256)")
            .takes_value(true)
            .long("origin"))
        .arg(Arg::with_name("QUIET")
            .help("Don't print the listing")
            .short("q")
            .long("quiet"))
        .arg(Arg::with_name("RUN")
            .help("Runs the assembled program until it halts")
            .long("run"))
        .arg(Arg::with_name("CONFIG")
            .help("Machine settings for --run, in toml format")
            .takes_value(true)
            .long("config"))
        .arg(Arg::with_name("DETERMINISTIC")
            .help("Disables the wall clock timer for --run")
            .long("deterministic"))
        .get_matches();

    let filename = matches.value_of("INPUT").unwrap();
    let src = match fs::read_to_string(filename) {
        Ok(s) => s,
        Err(e) => fail(&format!("failed to read {}: {}", filename, e)),
    };

    let mut asm = Assembler::new();
    if matches.is_present("ORIGIN") {
        asm = asm.with_origin(value_t!(matches, "ORIGIN", u16).unwrap_or_else(|e| e.exit()));
    }

    let listing = match asm.assemble_listing(&src) {
        Ok(l) => l,
        Err(e) => fail(&format!("{}: {}", filename, e)),
    };
    if !matches.is_present("QUIET") {
        print!("{}", listing);
    }

    let code = listing.bytes();
    if let Some(out) = matches.value_of("OUTPUT") {
        if let Err(e) = fs::write(out, &code) {
            fail(&format!("failed to write {}: {}", out, e));
        }
        println!("wrote {} bytes to {}", code.len(), out);
    }

    if !matches.is_present("RUN") {
        return;
    }

    let mut config = match matches.value_of("CONFIG") {
        Some(path) => match MachineConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => fail(&format!("{}: {}", path, e)),
        },
        None => MachineConfig::default(),
    };
    if matches.is_present("DETERMINISTIC") {
        config.deterministic = true;
    }

    // the code is only valid at the offset it was assembled for
    config.code_offset = listing.origin;
    let segment = config.code_segment;
    let mut machine = Machine::with_config(config);
    machine.load_executable(&code, segment);
    machine.run();

    println!("{}", machine.register_snapshot());
    println!("executed {} instructions", machine.cpu.instruction_count);
}

fn fail(msg: &str) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}
