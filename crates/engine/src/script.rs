//! Script execution
//!
//! A rendered script is written to a private temporary file and run through
//! the interpreter named by its shebang line, falling back to one inferred
//! from the file extension. Scripts run in the destination root.

use crate::error::{Error, Result};
use hearth_core::path::{AbsPath, RelPath};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Runs scripts with a fixed working directory
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    working_dir: AbsPath,
}

impl ScriptRunner {
    /// Run scripts in `working_dir`
    pub fn new(working_dir: AbsPath) -> Self {
        Self { working_dir }
    }

    /// Run the script identified by `target` with body `content`
    ///
    /// A non-zero exit status is reported as [`Error::ScriptExecution`].
    pub fn run(&self, target: &RelPath, content: &[u8]) -> Result<()> {
        let failed = |status: String| Error::ScriptExecution {
            path: target.clone(),
            status,
        };

        let suffix = Path::new(target.file_name())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut temp = tempfile::Builder::new()
            .prefix("hearth-script-")
            .suffix(&suffix)
            .tempfile()?;
        temp.write_all(content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o700))?;
        }

        let script_path = temp.into_temp_path();
        let (interpreter, mut args) = interpreter_for(content, &script_path);
        args.push(script_path.to_string_lossy().into_owned());
        debug!(script = %target, %interpreter, ?args, "Running script");

        let output = duct::cmd(&interpreter, &args)
            .dir(self.working_dir.as_path())
            .unchecked()
            .run()
            .map_err(|e| failed(format!("failed to start {interpreter}: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(failed(output.status.to_string()))
        }
    }
}

/// Interpreter and leading arguments for a script
///
/// - `#!/bin/bash -e` gives `bash -e`
/// - `#!/usr/bin/env python3` gives `python3`
/// - no shebang: by extension, `sh` otherwise
fn interpreter_for(content: &[u8], script_path: &Path) -> (String, Vec<String>) {
    let first_line = content
        .split(|&b| b == b'\n')
        .next()
        .and_then(|line| std::str::from_utf8(line).ok())
        .unwrap_or_default();

    if let Some(shebang) = first_line.strip_prefix("#!") {
        let mut parts = shebang.split_whitespace();
        if let Some(program) = parts.next() {
            let rest: Vec<String> = parts.map(str::to_string).collect();
            let name = Path::new(program)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(program);
            if name == "env"
                && let Some((interpreter, args)) = rest.split_first()
            {
                return (interpreter.clone(), args.to_vec());
            }
            return (program.to_string(), rest);
        }
    }

    let interpreter = match script_path.extension().and_then(|e| e.to_str()) {
        Some("bash") => "bash",
        Some("zsh") => "zsh",
        Some("py") => "python3",
        Some("rb") => "ruby",
        Some("pl") => "perl",
        Some("js") => "node",
        _ => "sh",
    };
    (interpreter.to_string(), Vec::new())
}
