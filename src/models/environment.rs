//! # 运行环境
//!
//! 一次提交共用的本地环境参数：赝势目录与并行规模。
//!
//! ## 依赖关系
//! - 被 `pipeline/`, `remote/session.rs`, `commands/` 使用

use std::path::{Path, PathBuf};

/// 运行环境
#[derive(Debug, Clone)]
pub struct RunEnvironment {
    /// 本地赝势目录，用于定位需要上传的赝势文件
    pub pseudo_dir: PathBuf,
    /// 写入输入文件 `pseudo_dir` 的路径；未设置时使用本地目录
    pub pseudo_search_path: Option<String>,
    /// MPI 进程数
    pub num_processes: i64,
    /// OpenMP 线程数
    pub num_threads: i64,
}

impl RunEnvironment {
    pub fn new(pseudo_dir: impl Into<PathBuf>) -> Self {
        RunEnvironment {
            pseudo_dir: pseudo_dir.into(),
            pseudo_search_path: None,
            num_processes: 1,
            num_threads: 1,
        }
    }

    pub fn with_parallelism(mut self, num_processes: i64, num_threads: i64) -> Self {
        if num_processes > 0 {
            self.num_processes = num_processes;
        }
        if num_threads > 0 {
            self.num_threads = num_threads;
        }
        self
    }

    pub fn pseudo_search_path(&self) -> String {
        match &self.pseudo_search_path {
            Some(path) if !path.trim().is_empty() => path.trim().to_string(),
            _ => self.pseudo_dir.display().to_string(),
        }
    }

    /// 赝势文件的本地路径
    pub fn pseudo_file(&self, file_name: &str) -> PathBuf {
        let path = Path::new(file_name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.pseudo_dir.join(path)
        }
    }
}
