//! AST provider backed by the `solc` standard-JSON interface.

use crate::ast::SourceAst;
use crate::result::{Error, Result};
use crate::scan;
use crate::source::SourceBuffer;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name the unit is compiled under inside the standard-JSON input.
pub const UNIT_NAME: &str = "input.sol";

/// Turns source text into an AST whose offsets index that exact text.
pub trait AstProvider: Send + Sync {
    fn compile(&self, source: &SourceBuffer) -> Result<SourceAst>;
}

/// Runs an external `solc` binary.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    pub binary: PathBuf,
    pub timeout: Duration,
}

impl Default for SolcCompiler {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("solc"),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Versions already read, per binary. Failures are not kept, so a later call retries.
static INSTALLED_VERSIONS: OnceLock<Mutex<HashMap<PathBuf, String>>> = OnceLock::new();

impl SolcCompiler {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Version reported by the compiler binary.
    ///
    /// Read once per binary path and shared by every pipeline in the process.
    pub fn installed_version(&self) -> Result<String> {
        let cache = INSTALLED_VERSIONS.get_or_init(Default::default);
        if let Some(version) = cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&self.binary)
        {
            return Ok(version.clone());
        }

        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| Error::CompileUnavailable(format!("{}: {e}", self.binary.display())))?;
        let text = String::from_utf8_lossy(&output.stdout);
        let version = text
            .lines()
            .find_map(|l| l.strip_prefix("Version: "))
            .map(|v| v.trim().to_string())
            .ok_or_else(|| {
                Error::CompileUnavailable(format!(
                    "no version line in `{} --version`",
                    self.binary.display()
                ))
            })?;

        cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(self.binary.clone(), version.clone());
        Ok(version)
    }

    fn standard_json_input(source: &SourceBuffer) -> Value {
        json!({
            "language": "Solidity",
            "sources": { UNIT_NAME: { "content": source.as_str() } },
            "settings": { "outputSelection": { "*": { "": ["ast"] } } }
        })
    }

    fn run(&self, input: Vec<u8>) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.binary)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::CompileUnavailable(format!("{}: {e}", self.binary.display())))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::CompileUnavailable("stdin not captured".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::CompileUnavailable("stdout not captured".into()))?;

        let writer = thread::spawn(move || stdin.write_all(&input));
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!("solc exceeded {:?}, killed", self.timeout);
                    return Err(Error::CompilerTimeout(self.timeout));
                }
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(e) => return Err(Error::CompileUnavailable(e.to_string())),
            }
        }

        let _ = writer.join();
        reader
            .join()
            .map_err(|_| Error::CompileUnavailable("reader thread panicked".into()))?
            .map_err(|e| Error::CompileUnavailable(e.to_string()))
    }
}

impl AstProvider for SolcCompiler {
    fn compile(&self, source: &SourceBuffer) -> Result<SourceAst> {
        let installed = self.installed_version()?;
        if let Some(wanted) = scan::pragma_version(source.as_str()) {
            if !version_satisfies(&installed, &wanted) {
                warn!("pragma `{wanted}` may not accept installed solc {installed}");
            }
        }

        let input = serde_json::to_vec(&Self::standard_json_input(source))?;
        let started = Instant::now();
        let raw = self.run(input)?;
        let output: Value = serde_json::from_slice(&raw)?;
        debug!("solc finished in {:?}", started.elapsed());

        let errors: Vec<String> = output
            .get("errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter(|e| e.get("severity").and_then(Value::as_str) == Some("error"))
                    .filter_map(|e| {
                        e.get("formattedMessage")
                            .or_else(|| e.get("message"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();
        if !errors.is_empty() {
            return Err(Error::CompileUnavailable(errors.join("\n")));
        }

        let ast = output
            .pointer(&format!("/sources/{UNIT_NAME}/ast"))
            .ok_or_else(|| Error::CompileUnavailable("no ast in compiler output".into()))?;
        SourceAst::from_solc_json(ast, source)
    }
}

fn parse_version(text: &str) -> Option<(u64, u64, u64)> {
    let core = text
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()?;
    let mut parts = core.split('.').map(|p| p.parse::<u64>().ok());
    Some((parts.next()??, parts.next()??, parts.next().flatten().unwrap_or(0)))
}

/// Loose check of an installed version against a pragma constraint.
///
/// Understands `^x.y.z`, `=x.y.z`, bare `x.y.z` and `>=`/`<`/`<=`/`>` bounds joined by spaces.
/// Anything it cannot parse is treated as satisfied.
pub fn version_satisfies(installed: &str, constraint: &str) -> bool {
    let Some(have) = parse_version(installed) else {
        return true;
    };
    constraint
        .split("||")
        .any(|alternative| {
            alternative.split_whitespace().all(|term| {
                let (op, rest) = match term {
                    t if t.starts_with(">=") => (">=", &t[2..]),
                    t if t.starts_with("<=") => ("<=", &t[2..]),
                    t if t.starts_with('>') => (">", &t[1..]),
                    t if t.starts_with('<') => ("<", &t[1..]),
                    t if t.starts_with('^') => ("^", &t[1..]),
                    t if t.starts_with('=') => ("=", &t[1..]),
                    t => ("=", t),
                };
                let Some(want) = parse_version(rest) else {
                    return true;
                };
                match op {
                    ">=" => have >= want,
                    "<=" => have <= want,
                    ">" => have > want,
                    "<" => have < want,
                    "^" => have >= want && have.0 == want.0 && (want.0 > 0 || have.1 == want.1),
                    _ => have == want,
                }
            })
        })
}
