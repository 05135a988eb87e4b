//! Workspace dev-tooling entry point (the `cargo xtask` convention): thin
//! wrappers around `cargo` invocations that a contributor would otherwise
//! have to remember to chain by hand.

use std::process::{Command, ExitStatus};

use anyhow::{bail, Context, Result};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let task = args.next().unwrap_or_else(|| "help".to_string());
    let rest: Vec<String> = args.collect();

    match task.as_str() {
        "check" => check(&rest),
        "test" => test(&rest),
        "fmt" => fmt(&rest),
        "ci" => ci(),
        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => bail!("unknown xtask '{other}' (try `cargo xtask help`)"),
    }
}

fn print_help() {
    println!("cargo xtask <command>");
    println!();
    println!("commands:");
    println!("  check   cargo check --workspace --all-targets");
    println!("  test    cargo test --workspace");
    println!("  fmt     cargo fmt --all -- --check");
    println!("  ci      check + fmt + test, in that order");
}

fn check(extra: &[String]) -> Result<()> {
    run_cargo(["check", "--workspace", "--all-targets"], extra)
}

fn test(extra: &[String]) -> Result<()> {
    run_cargo(["test", "--workspace"], extra)
}

fn fmt(extra: &[String]) -> Result<()> {
    run_cargo(["fmt", "--all", "--", "--check"], extra)
}

fn ci() -> Result<()> {
    check(&[])?;
    fmt(&[])?;
    test(&[])?;
    Ok(())
}

fn run_cargo<'a>(base_args: impl IntoIterator<Item = &'a str>, extra: &[String]) -> Result<()> {
    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut command = Command::new(&cargo);
    command.args(base_args);
    command.args(extra);

    let status = command
        .status()
        .with_context(|| format!("failed to spawn `{cargo}`"))?;
    ensure_success(status)
}

fn ensure_success(status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        bail!("subcommand exited with {status}");
    }
}
