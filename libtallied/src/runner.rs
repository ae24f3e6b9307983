use crate::{
    cache::{CacheKey, FileWatch, QueryCache},
    ledger::Ledger,
    parser::{parse_version, Version},
    LedgerError, Result,
};

use tracing::{info, instrument};

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Captured streams of a finished, successful invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Runs the `ledger` executable with the given arguments. A non-zero exit is
/// an error carrying whatever the tool wrote to stderr.
pub trait Runner {
    fn run(&self, args: &[String]) -> Result<Output>;
}

/// Spawns the real executable.
#[derive(Clone, Debug)]
pub struct LedgerCli {
    program: PathBuf,
}

impl LedgerCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for LedgerCli {
    fn default() -> Self {
        Self::new("ledger")
    }
}

impl Runner for LedgerCli {
    fn run(&self, args: &[String]) -> Result<Output> {
        let program = self.program.display().to_string();
        info!("spawning {} {:?}", program, args);

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| LedgerError::Spawn {
                program: program.clone(),
                source,
            })?;

        let code = output.status.code();
        info!("{} {:?} finished with {:?}", program, args, code);

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(LedgerError::Process {
                program,
                args: args.to_vec(),
                code,
                stderr,
            });
        }

        Ok(Output { stdout, stderr })
    }
}

/// Ask the tool for its version.
pub fn version<R: Runner + ?Sized>(runner: &R) -> Result<Version> {
    let output = runner.run(&["--version".to_string()])?;
    parse_version(&output.stdout)
}

/// Run `-f <file> xml <args…>` and fold the report, bypassing any cache.
#[instrument(name = "ledger.query", skip(runner, file), fields(file = %file.display()), err)]
pub fn run_query<R: Runner + ?Sized>(runner: &R, file: &Path, args: &[String]) -> Result<Ledger> {
    let mut params = vec![
        "-f".to_string(),
        file.display().to_string(),
        "xml".to_string(),
    ];
    params.extend(args.iter().cloned());

    let output = runner.run(&params)?;
    Ledger::from_xml(&output.stdout)
}

/// Query a ledger file. With a cache, repeated queries with the same
/// arguments are served from memory until the file changes; without one
/// every call runs the tool.
pub fn query<R: Runner + ?Sized, W: FileWatch>(
    runner: &R,
    file: &Path,
    args: &[String],
    cache: Option<&mut QueryCache<W>>,
) -> Result<Arc<Ledger>> {
    match cache {
        Some(cache) => cache.get_or_run(CacheKey::new(file, args), |key| {
            run_query(runner, &key.file, &key.args)
        }),
        None => run_query(runner, file, args).map(Arc::new),
    }
}
