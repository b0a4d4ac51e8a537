//! # init 命令实现
//!
//! 新建项目目录：写入 project.json，并把给定的 QE 输入文件
//! 解析后保存为各计算类型的基础输入。
//!
//! ## 依赖关系
//! - 使用 `cli/init.rs` 定义的参数
//! - 使用 `models/project.rs`, `parsers/pwscf.rs`, `utils/output.rs`

use crate::cli::init::InitArgs;
use crate::error::{QeRemoteError, Result};
use crate::models::project::{ProjectManifest, MANIFEST_FILE};
use crate::models::{DirectoryProject, Project, RunKind};
use crate::parsers::pwscf;
use crate::utils::output;

use std::path::PathBuf;
use tracing::debug;

/// 执行 init 命令
pub fn execute(args: InitArgs) -> Result<()> {
    let project = init_project(args)?;
    output::print_success(&format!(
        "Created project '{}' (prefix '{}') in '{}'",
        project.name(),
        project.prefix(),
        project.directory().display()
    ));

    let mut found = false;
    for run in RunKind::ALL {
        if project.base_input(run).is_some() {
            output::print_info(&format!("{} input saved", run));
            found = true;
        }
    }
    if !found {
        output::print_warning("No base inputs given; add them under inputs/ before submitting");
    }
    Ok(())
}

fn init_project(args: InitArgs) -> Result<DirectoryProject> {
    let directory = args.directory;
    if directory.join(MANIFEST_FILE).exists() {
        return Err(QeRemoteError::InvalidArgument(format!(
            "'{}' is already a project",
            directory.display()
        )));
    }

    let prefix = args.prefix.trim();
    if prefix.is_empty() {
        return Err(QeRemoteError::InvalidArgument("Prefix must not be blank".to_string()));
    }

    // 先解析全部输入，失败时不留下半成品目录
    let sources: [(RunKind, Option<PathBuf>); 5] = [
        (RunKind::SingleEnergy, args.scf),
        (RunKind::Relax, args.relax),
        (RunKind::MolecularDynamics, args.md),
        (RunKind::DensityOfStates, args.dos),
        (RunKind::BandStructure, args.band),
    ];
    let mut inputs = Vec::new();
    for (run, path) in sources {
        if let Some(path) = path {
            debug!(run = %run, file = %path.display(), "reading base input");
            inputs.push((run, pwscf::parse_qe_input_file(&path)?));
        }
    }

    let name = args
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            directory
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "project".to_string());

    let manifest = ProjectManifest {
        name,
        prefix: prefix.to_string(),
    };
    let mut project = DirectoryProject::init(&directory, &manifest)?;
    for (run, input) in inputs {
        project.set_base_input(run, input)?;
    }
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn args(directory: &Path) -> InitArgs {
        InitArgs {
            directory: directory.to_path_buf(),
            name: None,
            prefix: "si".to_string(),
            scf: None,
            relax: None,
            md: None,
            dos: None,
            band: None,
        }
    }

    #[test]
    fn test_init_with_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("si.scf.in");
        fs::write(&source, "&CONTROL\n calculation='scf'\n/\n&SYSTEM\n ibrav=2\n/\n").unwrap();

        let dir = tmp.path().join("silicon");
        let mut init = args(&dir);
        init.scf = Some(source.clone());
        init.band = Some(source);
        init_project(init).unwrap();

        let project = DirectoryProject::open(&dir).unwrap();
        assert_eq!(project.name(), "silicon");
        assert_eq!(project.prefix(), "si");
        assert!(project.base_input(RunKind::SingleEnergy).is_some());
        assert!(project.base_input(RunKind::BandStructure).is_some());
        assert!(project.base_input(RunKind::Relax).is_none());
    }

    #[test]
    fn test_existing_project_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        init_project(args(tmp.path())).unwrap();

        let result = init_project(args(tmp.path()));
        assert!(matches!(result, Err(QeRemoteError::InvalidArgument(_))));
    }

    #[test]
    fn test_unreadable_input_leaves_no_project() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("broken");
        let mut init = args(&dir);
        init.scf = Some(tmp.path().join("missing.in"));

        assert!(init_project(init).is_err());
        assert!(!dir.exists());
    }
}
