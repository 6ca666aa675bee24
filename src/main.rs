// ABOUTME: Thin CLI driver: flags -> CompilerConfig -> pipeline::compile -> artifacts on disk

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use clap::Parser;

use minic::config::{CompilerConfig, OptLevel, Target};
use minic::diagnostics;
use minic::pipeline;

const COMPILE_TIMEOUT: Duration = Duration::from_secs(10);
const RUN_TIMEOUT: Duration = Duration::from_secs(5);

/// A compiler for Mini-C, a small C-like imperative language
#[derive(Parser, Debug)]
#[command(name = "minic")]
#[command(version = minic::config::VERSION)]
#[command(about = minic::config::BANNER)]
struct CliArgs {
    /// Source file to compile
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Optimization level: -O0, -O1, -O2 (default -O2)
    #[arg(short = 'O', default_value = "2")]
    opt_level: String,

    /// Output target: x86 or c (default x86)
    #[arg(long = "target", default_value = "x86")]
    target: String,

    /// Dump the parsed AST
    #[arg(long = "ast")]
    dump_ast: bool,

    /// Dump the unoptimized IR
    #[arg(long = "ir")]
    dump_ir: bool,

    /// Dump every phase's artifact plus the generated code
    #[arg(long = "all")]
    dump_all: bool,

    /// Pipe the emitted C through the host toolchain and execute it
    /// (only meaningful with --target=c)
    #[arg(long = "run")]
    run: bool,

    /// Explicitly opt out of --run (the default)
    #[arg(long = "no-run")]
    no_run: bool,
}

fn main() {
    let args = CliArgs::parse();
    std::process::exit(run(args));
}

fn run(args: CliArgs) -> i32 {
    let optimization: OptLevel = match args.opt_level.parse() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Fatal: {}", e);
            return 1;
        }
    };
    let target: Target = match args.target.parse() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Fatal: {}", e);
            return 1;
        }
    };

    let source_text = match fs::read_to_string(&args.source) {
        Ok(text) => text,
        Err(e) => {
            eprintln!(
                "Fatal: cannot read source file {}: {}",
                args.source.display(),
                e
            );
            return 1;
        }
    };

    let config = CompilerConfig {
        source: args.source.clone(),
        optimization,
        target,
        dump_ast: args.dump_ast,
        dump_ir: args.dump_ir,
        dump_all: args.dump_all,
        run_after_compile: args.run && !args.no_run,
    };

    let artifacts = match pipeline::compile(&source_text, config.optimization, config.target) {
        Ok(artifacts) => artifacts,
        Err(diagnostics) => {
            print!("{}", diagnostics::render(&diagnostics));
            return 1;
        }
    };

    if config.wants_ast_dump() {
        println!(">>> AST\n{:#?}\n", artifacts.ast);
    }
    if config.wants_ir_dump() {
        println!(">>> IR (unoptimized)\n{}", pipeline::render_ir(&artifacts.ir_unoptimized));
        println!(">>> IR (optimized)\n{}", pipeline::render_ir(&artifacts.ir_optimized));
        println!(
            ">>> optimizer counters: {} constants folded, {} dead temporaries removed, {} strength reductions",
            artifacts.opt_counters.constants_folded,
            artifacts.opt_counters.dead_temps_removed,
            artifacts.opt_counters.strength_reductions
        );
    }
    if config.dump_all {
        println!(">>> generated code\n{}", artifacts.generated_code);
    }

    if let Err(e) = write_side_files(&config, &artifacts) {
        eprintln!("Fatal: cannot write side artifacts: {}", e);
        return 1;
    }

    let output_path = config.output_path();
    if let Err(e) = fs::write(&output_path, &artifacts.generated_code) {
        eprintln!("Fatal: cannot write {}: {}", output_path.display(), e);
        return 1;
    }

    if config.target == Target::C && config.run_after_compile {
        return compile_and_run_c(&output_path);
    }

    0
}

fn write_side_files(
    config: &CompilerConfig,
    artifacts: &pipeline::CompileArtifacts,
) -> std::io::Result<()> {
    let dir = config.source.parent().unwrap_or_else(|| std::path::Path::new("."));
    let base = config
        .source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "out".to_string());

    fs::write(dir.join("tokens.txt"), pipeline::render_tokens(&artifacts.tokens))?;
    fs::write(
        dir.join("symbol_table.txt"),
        pipeline::render_symbols(&artifacts.symbols),
    )?;

    let mut ir_dump = String::new();
    ir_dump.push_str(">>> unoptimized\n");
    ir_dump.push_str(&pipeline::render_ir(&artifacts.ir_unoptimized));
    ir_dump.push_str("\n>>> optimized\n");
    ir_dump.push_str(&pipeline::render_ir(&artifacts.ir_optimized));
    fs::write(dir.join(format!("{}_ir.txt", base)), ir_dump)?;

    Ok(())
}

/// Invokes the host C toolchain on the emitted C file and runs the
/// resulting binary (10s compile / 5s run timeout). This is an external
/// collaborator kept out of the pipeline proper; it only exists here so
/// `--run` is actually usable.
fn compile_and_run_c(c_path: &PathBuf) -> i32 {
    let bin_path = c_path.with_extension("out");

    let mut compile_cmd = match Command::new("cc")
        .arg(c_path)
        .arg("-o")
        .arg(&bin_path)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            eprintln!("Fatal: could not invoke host C toolchain: {}", e);
            return 1;
        }
    };

    match wait_with_timeout(&mut compile_cmd, COMPILE_TIMEOUT) {
        Some(status) if status.success() => {}
        Some(status) => {
            eprintln!("Fatal: host C toolchain failed with {}", status);
            return status.code().unwrap_or(1);
        }
        None => {
            let _ = compile_cmd.kill();
            eprintln!("Fatal: host C toolchain exceeded the 10s compile timeout");
            return 1;
        }
    }

    let mut run_cmd = match Command::new(&bin_path)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            eprintln!("Fatal: could not execute compiled program: {}", e);
            return 1;
        }
    };

    match wait_with_timeout(&mut run_cmd, RUN_TIMEOUT) {
        Some(status) => status.code().unwrap_or(1),
        None => {
            let _ = run_cmd.kill();
            eprintln!("Fatal: program exceeded the 5s run timeout");
            1
        }
    }
}

/// Polls a spawned child until it exits or `timeout` elapses. Returns
/// `None` on timeout (caller is responsible for killing the child).
fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> Option<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        if start.elapsed() >= timeout {
            return None;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(source: &str, extra: &[&str]) -> CliArgs {
        let mut raw = vec!["minic", source];
        raw.extend_from_slice(extra);
        CliArgs::parse_from(raw)
    }

    #[test]
    fn defaults_to_o2_and_x86() {
        let a = args("prog.mc", &[]);
        assert_eq!(a.opt_level, "2");
        assert_eq!(a.target, "x86");
        assert!(!a.run);
    }

    #[test]
    fn accepts_glued_opt_level_flag() {
        let a = args("prog.mc", &["-O0"]);
        assert_eq!(a.opt_level, "0");
    }

    #[test]
    fn parses_target_flag() {
        let a = args("prog.mc", &["--target=c"]);
        assert_eq!(a.target, "c");
    }

    #[test]
    fn no_run_suppresses_run() {
        let a = args("prog.mc", &["--target=c", "--run", "--no-run"]);
        assert!(a.run && a.no_run);
    }
}
