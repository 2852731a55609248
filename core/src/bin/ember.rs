/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of the Ark Sovereign Compiler.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

use ember_core::parser::parse_source;
use ember_core::{host_write, Interpreter, Output, RuntimeConfig};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

const USAGE: &str = "Usage: ember <file> [--name NAME] [--config FILE] [--dump-ast]";

struct Options {
    file: String,
    name: Option<String>,
    config: Option<String>,
    dump_ast: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut file = None;
    let mut name = None;
    let mut config = None;
    let mut dump_ast = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--name" => name = Some(iter.next().ok_or("--name requires a value")?.clone()),
            "--config" => config = Some(iter.next().ok_or("--config requires a value")?.clone()),
            "--dump-ast" => dump_ast = true,
            flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
            path if file.is_none() => file = Some(path.to_string()),
            extra => return Err(format!("Unexpected argument: {}", extra)),
        }
    }

    Ok(Options {
        file: file.ok_or_else(|| USAGE.to_string())?,
        name,
        config,
        dump_ast,
    })
}

fn load_config(path: Option<&str>) -> Result<RuntimeConfig, String> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
            RuntimeConfig::from_json(&json).map_err(|e| format!("{}: {}", path, e))
        }
        None => Ok(RuntimeConfig::default()),
    }
}

fn run(options: Options) -> Result<bool, String> {
    let source =
        fs::read_to_string(&options.file).map_err(|e| format!("{}: {}", options.file, e))?;

    if options.dump_ast {
        let program = parse_source(&source, &options.file).map_err(|e| e.to_string())?;
        let json = serde_json::to_string_pretty(&program).map_err(|e| e.to_string())?;
        println!("{}", json);
        return Ok(true);
    }

    let config = load_config(options.config.as_deref())?;
    let name = options.name.unwrap_or_else(|| {
        Path::new(&options.file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "__main__".to_string())
    });

    let mut interp = Interpreter::builder().config(config).build();
    match interp.try_load_module(&source, &name) {
        Ok(_) => Ok(true),
        Err(e) => {
            interp.report_error(&e);
            Ok(false)
        }
    }
}

fn report(out: &Output, msg: &str) {
    let stream = out.stderr();
    host_write!(out, stream, "{}\n", msg);
    out.flush(stream);
}

fn main() {
    let out = Output::default();
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(o) => o,
        Err(msg) => {
            report(&out, &msg);
            process::exit(2);
        }
    };

    match run(options) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(msg) => {
            report(&out, &format!("Error: {}", msg));
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{BufferHost, Stream};
    use std::rc::Rc;

    #[test]
    fn test_errors_go_through_host_stderr() {
        let host = Rc::new(BufferHost::new());
        let out = Output::new(host.clone());

        let msg = parse_args(&["--bogus".to_string()]).err().unwrap();
        report(&out, &msg);
        report(&out, &format!("Error: {}", "missing.em: not found"));

        assert_eq!(host.contents(Stream::Stdout), "");
        assert_eq!(
            host.contents(Stream::Stderr),
            "Unknown option: --bogus\nError: missing.em: not found\n"
        );
    }

    #[test]
    fn test_missing_file_is_usage_error() {
        assert_eq!(parse_args(&[]).err().unwrap(), USAGE);
    }
}
