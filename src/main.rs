//! Lox command-line driver.

use std::env;
use std::fs;
use std::process;

use loxlang::repl::Repl;
use loxlang::{InterpretResult, RunOptions, Vm};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes, following sysexits.h.
const EXIT_USAGE: i32 = 64;
const EXIT_COMPILE_ERROR: i32 = 65;
const EXIT_RUNTIME_ERROR: i32 = 70;
const EXIT_IO_ERROR: i32 = 74;

/// Log filter variable; defaults to `warn`.
const LOG_ENV: &str = "LOX_LOG";

/// CLI commands.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    run: RunOptions,
}

fn print_usage() {
    eprintln!("Lox {} - bytecode compiler and virtual machine", VERSION);
    eprintln!();
    eprintln!("Usage: lox [options] [script.lox]");
    eprintln!("       lox [options] -e <code>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>        Evaluate code directly");
    eprintln!("  --disassemble    Print the compiled bytecode before running");
    eprintln!("  --trace          Log every executed instruction (trace level)");
    eprintln!("  --version, -V    Show version");
    eprintln!("  --help, -h       Show this help message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}=<filter>   Log filter, e.g. debug (default: warn)", LOG_ENV);
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  lox                      Start interactive REPL");
    eprintln!("  lox script.lox           Run a script file");
    eprintln!("  lox -e 'print 1 + 2;'    Evaluate code directly");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_usage();
    process::exit(EXIT_USAGE);
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        run: RunOptions::default(),
    };

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--version" | "-V" => {
                println!("lox {}", VERSION);
                process::exit(0);
            }
            "--disassemble" => options.run.disassemble = true,
            "--trace" => options.run.trace = true,
            "-e" => {
                i += 1;
                if i >= args.len() {
                    usage_error("-e requires a code argument");
                }
                if !matches!(options.command, Command::Repl) {
                    usage_error("-e cannot be combined with a script file");
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            _ if arg.starts_with('-') => {
                usage_error(&format!("Unknown option: {}", arg));
            }
            _ => {
                if !matches!(options.command, Command::Repl) {
                    usage_error("Only one script file can be specified");
                }
                options.command = Command::Run { file: arg.clone() };
            }
        }
        i += 1;
    }

    options
}

fn init_logging(options: &RunOptions) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_ENV, "warn"));
    if options.trace {
        builder.filter_module("loxlang", log::LevelFilter::Trace);
    }
    let _ = builder.try_init();
}

fn main() {
    let options = parse_args();
    init_logging(&options.run);

    match &options.command {
        Command::Repl => run_repl(&options),
        Command::Run { file } => run_file(file, &options),
        Command::Eval { code } => run_source(code, &options),
    }
}

fn run_file(path: &str, options: &Options) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read file \"{}\": {}", path, e);
            process::exit(EXIT_IO_ERROR);
        }
    };
    log::debug!("running {} ({} bytes)", path, source.len());
    run_source(&source, options);
}

fn run_source(source: &str, options: &Options) {
    let mut vm = Vm::new();
    vm.set_options(options.run);

    if let Some(code) = exit_code(vm.interpret(source)) {
        process::exit(code);
    }
}

/// Process exit status for a finished run; `None` on success.
fn exit_code(result: InterpretResult) -> Option<i32> {
    match result {
        InterpretResult::Ok => None,
        InterpretResult::CompileError => Some(EXIT_COMPILE_ERROR),
        InterpretResult::RuntimeError => Some(EXIT_RUNTIME_ERROR),
    }
}

fn run_repl(options: &Options) {
    let mut repl = Repl::new(options.run);
    if let Err(e) = repl.run() {
        eprintln!("Error: {}", e);
        process::exit(EXIT_IO_ERROR);
    }
}
