//! # 项目数据模型
//!
//! 项目是一次计算的工作目录：基础输入文件、前缀名、运行状态与能带路径。
//!
//! `Project` trait 是流水线与提交会话访问项目的唯一接口；
//! `DirectoryProject` 是基于目录的实现：
//!
//! ```text
//! <dir>/project.json        名称与前缀
//! <dir>/inputs/scf.in       各计算类型的基础输入
//! <dir>/status.json         运行状态计数
//! <dir>/bandpaths.json      能带路径标签
//! ```
//!
//! 状态与能带路径在同一把锁下修改并落盘，多个会话可并发更新同一项目。
//!
//! ## 依赖关系
//! - 被 `pipeline/`, `remote/session.rs`, `commands/` 使用
//! - 使用 `parsers/pwscf.rs`

use crate::error::{QeRemoteError, Result};
use crate::models::input::QeInput;
use crate::models::run_kind::RunKind;
use crate::parsers::pwscf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const MANIFEST_FILE: &str = "project.json";
pub const STATUS_FILE: &str = "status.json";
const BAND_PATHS_FILE: &str = "bandpaths.json";
const INPUTS_DIR: &str = "inputs";
const DEFAULT_PREFIX: &str = "espresso";

/// 子任务文件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFile {
    Input,
    Log,
    Error,
}

impl StageFile {
    fn extension(&self) -> &'static str {
        match self {
            StageFile::Input => "in",
            StageFile::Log => "log",
            StageFile::Error => "err",
        }
    }
}

/// 运行状态计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectStatus {
    pub scf_count: u32,
    pub opt_done: bool,
    pub md_count: u32,
    pub dos_count: u32,
    pub band_done: bool,
}

impl ProjectStatus {
    pub fn is_scf_done(&self) -> bool {
        self.scf_count > 0
    }

    pub fn is_opt_done(&self) -> bool {
        self.opt_done
    }

    /// 已有 SCF 或结构优化结果
    pub fn has_ground_state(&self) -> bool {
        self.is_scf_done() || self.is_opt_done()
    }

    /// 记录一次提交；每种计算类型对应独立的计数或标记
    pub fn record(&mut self, run: RunKind) {
        match run {
            RunKind::SingleEnergy => self.scf_count += 1,
            RunKind::Relax => self.opt_done = true,
            RunKind::MolecularDynamics => self.md_count += 1,
            RunKind::DensityOfStates => self.dos_count += 1,
            RunKind::BandStructure => self.band_done = true,
        }
    }
}

/// 能带路径上的一个点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPathPoint {
    pub coord: [f64; 3],
    #[serde(default)]
    pub label: Option<String>,
}

/// 能带路径记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandPaths {
    pub points: Vec<BandPathPoint>,
}

impl BandPaths {
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.points.get(index).and_then(|p| p.label.as_deref())
    }

    /// 越界时忽略
    pub fn set_label(&mut self, index: usize, label: &str) {
        if let Some(point) = self.points.get_mut(index) {
            point.label = Some(label.to_string());
        }
    }
}

/// 需要互斥修改的项目状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectProperty {
    pub status: ProjectStatus,
    pub band_paths: BandPaths,
}

/// 项目访问接口
pub trait Project: Send + Sync {
    /// 项目目录
    fn directory(&self) -> &Path;

    /// 项目名称，写入输入文件 title
    fn name(&self) -> &str;

    /// QE 前缀名，同时作为作业脚本的文件名
    fn prefix(&self) -> &str;

    /// 某计算类型的基础输入（副本）
    fn base_input(&self, run: RunKind) -> Option<QeInput>;

    /// 当前状态快照
    fn property(&self) -> ProjectProperty;

    fn status(&self) -> ProjectStatus {
        self.property().status
    }

    fn band_paths(&self) -> BandPaths {
        self.property().band_paths
    }

    /// 在临界区内修改状态并持久化
    fn update_property(&self, update: &mut dyn FnMut(&mut ProjectProperty)) -> Result<()>;

    /// QE 的停止标记文件
    fn exit_file_name(&self) -> String {
        format!("{}.EXIT", self.prefix())
    }

    /// 子任务文件名：`<prefix>.<tag>.<in|log|err>`
    fn stage_file_name(&self, tag: &str, file: StageFile) -> String {
        format!("{}.{}.{}", self.prefix(), tag, file.extension())
    }
}

/// project.json 内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub name: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// 基于目录的项目
#[derive(Debug)]
pub struct DirectoryProject {
    directory: PathBuf,
    manifest: ProjectManifest,
    inputs: HashMap<RunKind, QeInput>,
    property: Mutex<ProjectProperty>,
}

impl DirectoryProject {
    /// 打开项目目录
    pub fn open(directory: &Path) -> Result<Self> {
        if !directory.is_dir() {
            return Err(QeRemoteError::DirectoryNotFound {
                path: directory.display().to_string(),
            });
        }

        let manifest_path = directory.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            read_json::<ProjectManifest>(&manifest_path)?
        } else {
            ProjectManifest {
                name: directory
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("project")
                    .to_string(),
                prefix: default_prefix(),
            }
        };

        let mut inputs = HashMap::new();
        for run in RunKind::ALL {
            let path = directory
                .join(INPUTS_DIR)
                .join(format!("{}.in", run.input_stem()));
            if path.is_file() {
                inputs.insert(run, pwscf::parse_qe_input_file(&path)?);
            }
        }

        let status_path = directory.join(STATUS_FILE);
        let status = if status_path.exists() {
            read_json::<ProjectStatus>(&status_path)?
        } else {
            ProjectStatus::default()
        };

        let band_path = directory.join(BAND_PATHS_FILE);
        let band_paths = if band_path.exists() {
            read_json::<BandPaths>(&band_path)?
        } else {
            BandPaths::default()
        };

        Ok(DirectoryProject {
            directory: directory.to_path_buf(),
            manifest,
            inputs,
            property: Mutex::new(ProjectProperty { status, band_paths }),
        })
    }

    /// 新建项目目录并写入 project.json
    pub fn init(directory: &Path, manifest: &ProjectManifest) -> Result<Self> {
        fs::create_dir_all(directory.join(INPUTS_DIR)).map_err(|e| {
            QeRemoteError::FileWriteError {
                path: directory.display().to_string(),
                source: e,
            }
        })?;
        write_json(&directory.join(MANIFEST_FILE), manifest)?;
        Self::open(directory)
    }

    /// 写入某计算类型的基础输入
    pub fn set_base_input(&mut self, run: RunKind, input: QeInput) -> Result<()> {
        let path = self
            .directory
            .join(INPUTS_DIR)
            .join(format!("{}.in", run.input_stem()));
        fs::write(&path, pwscf::to_input_string(&input)).map_err(|e| {
            QeRemoteError::FileWriteError {
                path: path.display().to_string(),
                source: e,
            }
        })?;
        self.inputs.insert(run, input);
        Ok(())
    }

    fn persist(&self, property: &ProjectProperty) -> Result<()> {
        write_json(&self.directory.join(STATUS_FILE), &property.status)?;
        write_json(&self.directory.join(BAND_PATHS_FILE), &property.band_paths)
    }
}

impl Project for DirectoryProject {
    fn directory(&self) -> &Path {
        &self.directory
    }

    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn prefix(&self) -> &str {
        &self.manifest.prefix
    }

    fn base_input(&self, run: RunKind) -> Option<QeInput> {
        self.inputs.get(&run).cloned()
    }

    fn property(&self) -> ProjectProperty {
        self.property
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update_property(&self, update: &mut dyn FnMut(&mut ProjectProperty)) -> Result<()> {
        let mut guard = self
            .property
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // 先在副本上修改，保存成功后再替换
        let mut next = guard.clone();
        update(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| QeRemoteError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).map_err(|e| QeRemoteError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
