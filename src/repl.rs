//! Interactive prompt.
//!
//! Reads one line at a time from stdin. A line that leaves braces unbalanced
//! starts a multi-line block, which runs once every brace is closed. All input
//! shares one VM, so globals survive from line to line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use colored::Colorize;

use crate::vm::{RunOptions, Vm};

const HISTORY_FILE: &str = ".lox_history";
const MAX_HISTORY: usize = 1000;

pub struct Repl {
    vm: Vm,
    history: Vec<String>,
    history_file: PathBuf,
    multiline_buffer: String,
    brace_balance: i32,
}

impl Repl {
    pub fn new(options: RunOptions) -> Self {
        let mut vm = Vm::new();
        vm.set_options(options);
        let mut repl = Self {
            vm,
            history: Vec::new(),
            history_file: history_path(),
            multiline_buffer: String::new(),
            brace_balance: 0,
        };
        repl.load_history();
        repl
    }

    fn load_history(&mut self) {
        if let Ok(content) = std::fs::read_to_string(&self.history_file) {
            self.history = content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    fn save_history(&self) {
        let start = self.history.len().saturating_sub(MAX_HISTORY);
        let content = self.history[start..].join("\n");
        if let Err(err) = std::fs::write(&self.history_file, content) {
            log::warn!(
                "could not save history to {}: {}",
                self.history_file.display(),
                err
            );
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        println!("{}", format!("Lox {}", env!("CARGO_PKG_VERSION")).bold());
        println!("Type {} for available commands.\n", ".help".cyan());

        let stdin = io::stdin();
        let mut input = stdin.lock();

        loop {
            print!("{}", self.prompt());
            io::stdout().flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                println!();
                break;
            }
            let line = line.trim_end();

            if self.multiline_buffer.is_empty() {
                if line.trim().is_empty() {
                    continue;
                }
                if is_exit_command(line) {
                    break;
                }
                self.history.push(line.to_string());
                if line.starts_with('.') {
                    self.handle_command(line);
                    continue;
                }
            } else if line == ".break" {
                self.cancel_multiline();
                continue;
            }

            self.feed(line);
        }

        self.save_history();
        Ok(())
    }

    fn prompt(&self) -> String {
        if self.multiline_buffer.is_empty() {
            format!("{} ", ">".green().bold())
        } else {
            format!("{} ", "...".green())
        }
    }

    /// Add a line to the pending input and run it once braces balance.
    fn feed(&mut self, line: &str) {
        if !self.multiline_buffer.is_empty() {
            self.multiline_buffer.push('\n');
        }
        self.multiline_buffer.push_str(line);
        self.brace_balance += count_brace_balance(line);

        if self.brace_balance > 0 {
            return;
        }

        let code = std::mem::take(&mut self.multiline_buffer);
        self.brace_balance = 0;
        self.eval(&code);
    }

    fn eval(&mut self, code: &str) {
        let source = prepare_source(code);
        if let Err(err) = self.vm.run_source(&source) {
            for line in err.to_string().lines() {
                eprintln!("{} {}", "error:".red().bold(), line);
            }
        }
    }

    fn cancel_multiline(&mut self) {
        self.multiline_buffer.clear();
        self.brace_balance = 0;
        println!("{}", "(cancelled)".dimmed());
    }

    fn handle_command(&mut self, line: &str) {
        match line {
            ".help" => {
                println!("  {}     show this help", ".help".cyan());
                println!("  {}  list previous input", ".history".cyan());
                println!("  {}    forget all globals", ".clear".cyan());
                println!("  {}    abandon a multi-line block", ".break".cyan());
                println!("  {}     leave the prompt", ".exit".cyan());
            }
            ".history" => {
                for (i, entry) in self.history.iter().enumerate() {
                    println!("{:4}  {}", i + 1, entry);
                }
            }
            ".clear" => {
                self.vm.free();
                println!("{}", "(globals cleared)".dimmed());
            }
            _ => {
                eprintln!(
                    "{} unknown command {}",
                    "error:".red().bold(),
                    line.yellow()
                );
            }
        }
    }
}

fn history_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(HISTORY_FILE),
        None => PathBuf::from(HISTORY_FILE),
    }
}

pub fn is_exit_command(line: &str) -> bool {
    matches!(line.trim(), "exit" | ".exit" | "quit" | ".quit")
}

/// Net count of `{` minus `}` outside string literals and line comments.
pub fn count_brace_balance(s: &str) -> i32 {
    let mut balance = 0;
    let mut in_string = false;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => balance += 1,
            '}' => balance -= 1,
            '/' if chars.peek() == Some(&'/') => break,
            _ => {}
        }
    }
    balance
}

/// Let a bare expression be typed without `print` or a trailing `;`.
pub fn prepare_source(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.ends_with(';') || trimmed.ends_with('}') {
        return code.to_string();
    }

    let starts_statement = ["var ", "print ", "if ", "if(", "while ", "while(", "for ", "for("]
        .iter()
        .any(|keyword| trimmed.starts_with(keyword));
    if starts_statement {
        format!("{};", trimmed)
    } else {
        format!("print {};", trimmed)
    }
}
