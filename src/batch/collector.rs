//! # 项目收集器
//!
//! 把命令行给出的路径或 glob 模式展开成项目目录列表。
//! 含有 `project.json` 的目录才算项目。
//!
//! ## 功能
//! - glob 模式展开
//! - 递归搜索子目录中的项目
//! - 去重并保持输入顺序
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 调用
//! - 使用 `glob` 展开模式，`walkdir` 遍历目录

use crate::error::{QeRemoteError, Result};
use crate::models::project::MANIFEST_FILE;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// 项目收集器
pub struct ProjectCollector {
    /// 输入路径或模式
    inputs: Vec<String>,
    /// 是否递归
    recursive: bool,
}

impl ProjectCollector {
    pub fn new(inputs: Vec<String>) -> Self {
        Self {
            inputs,
            recursive: false,
        }
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有项目目录
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut projects = Vec::new();

        for input in &self.inputs {
            for candidate in self.expand(input)? {
                for dir in self.projects_under(&candidate) {
                    if seen.insert(dir.clone()) {
                        projects.push(dir);
                    }
                }
            }
        }

        Ok(projects)
    }

    /// 展开 glob 模式；普通路径原样返回
    fn expand(&self, input: &str) -> Result<Vec<PathBuf>> {
        if !input.contains(['*', '?', '[']) {
            return Ok(vec![PathBuf::from(input)]);
        }

        let paths = glob::glob(input).map_err(|e| {
            QeRemoteError::InvalidArgument(format!("Invalid pattern '{}': {}", input, e))
        })?;

        let mut matched: Vec<PathBuf> = paths.filter_map(|p| p.ok()).collect();
        matched.sort();
        debug!(pattern = %input, matches = matched.len(), "pattern expanded");
        Ok(matched)
    }

    fn projects_under(&self, path: &Path) -> Vec<PathBuf> {
        if !path.is_dir() {
            return Vec::new();
        }
        if is_project(path) {
            return vec![path.to_path_buf()];
        }
        if !self.recursive {
            return Vec::new();
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == MANIFEST_FILE)
            .filter_map(|e| e.path().parent().map(|p| p.to_path_buf()))
            .collect();
        found.sort();
        found
    }
}

/// 目录中是否有 project.json
pub fn is_project(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file()
}
