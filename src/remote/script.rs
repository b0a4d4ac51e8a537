//! # 作业脚本文件
//!
//! 根据首行 shebang 选择扩展名，统一换行符后写入项目目录。
//!
//! ## 依赖关系
//! - 被 `remote/session.rs`, `commands/profile.rs` 使用

use crate::error::{QeRemoteError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_EXTENSION: &str = ".sh";

/// shell -> 扩展名
const SHELL_EXTENSIONS: &[(&str, &str)] = &[
    ("sh", ".sh"),
    ("bash", ".bash"),
    ("csh", ".csh"),
    ("tcsh", ".tcsh"),
    ("zsh", ".zsh"),
];

/// 由首行 shebang 决定扩展名
///
/// 识别 `#!/bin/<shell>` 与 `#!/usr/bin/env <shell>`，其余一律 `.sh`。
pub fn script_extension(script: &str) -> &'static str {
    let first_line = script.lines().next().unwrap_or("").trim();
    let Some(interpreter) = first_line.strip_prefix("#!") else {
        return DEFAULT_EXTENSION;
    };

    let mut words = interpreter.split_whitespace();
    let shell = match words.next() {
        Some("/usr/bin/env") => words.next(),
        Some(path) => path.strip_prefix("/bin/"),
        None => None,
    };

    shell
        .and_then(|shell| {
            SHELL_EXTENSIONS
                .iter()
                .find(|(name, _)| *name == shell)
                .map(|(_, ext)| *ext)
        })
        .unwrap_or(DEFAULT_EXTENSION)
}

/// `\r\n` 与单独的 `\r` 统一为 `\n`；空行保留
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// 作业脚本文件名 `<prefix><ext>`
pub fn job_script_name(prefix: &str, content: &str) -> String {
    format!("{}{}", prefix.trim(), script_extension(content))
}

/// 写出作业脚本，返回路径
pub fn write_job_script(directory: &Path, prefix: &str, content: &str) -> Result<PathBuf> {
    let path = directory.join(job_script_name(prefix, content));

    fs::write(&path, normalize_line_endings(content)).map_err(|e| {
        QeRemoteError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        }
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(&path, fs::Permissions::from_mode(0o755)) {
            warn!(file = %path.display(), error = %e, "failed to mark job script executable");
        }
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_extension() {
        assert_eq!(script_extension("#!/bin/sh\necho"), ".sh");
        assert_eq!(script_extension("#!/bin/bash\n#PBS"), ".bash");
        assert_eq!(script_extension("#!/bin/csh -f\n"), ".csh");
        assert_eq!(script_extension("#!/bin/tcsh"), ".tcsh");
        assert_eq!(script_extension("#!/bin/zsh\n"), ".zsh");
        assert_eq!(script_extension("#!/usr/bin/env bash\n"), ".bash");
        assert_eq!(script_extension("#!/usr/bin/python3\n"), ".sh");
        assert_eq!(script_extension("echo hello\n"), ".sh");
        assert_eq!(script_extension(""), ".sh");
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n\nd"), "a\nb\nc\n\nd");
    }

    #[test]
    fn test_write_job_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_job_script(dir.path(), " si ", "#!/bin/bash\r\necho ok\r\n").unwrap();

        assert_eq!(path.file_name().unwrap(), "si.bash");
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/bash\necho ok\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_job_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = write_job_script(dir.path(), "si", "#!/bin/sh\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
