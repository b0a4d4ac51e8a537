//! # 远程计算配置
//!
//! 一个远程配置描述一台计算主机：连接信息、工作目录、环境加载命令，
//! 以及提交命令模板与作业脚本模板。
//!
//! 配置以 title 为唯一标识，相等性与哈希只取决于 title。
//! `ProfileRegistry` 负责从 JSON 文件读写配置列表。
//!
//! ## 依赖关系
//! - 被 `remote/session.rs`, `commands/` 使用
//! - 使用 `remote/template.rs`, `utils/scheduler.rs`

use crate::error::{QeRemoteError, Result};
use crate::remote::template::{self, Bindings, Placeholder};
use crate::utils::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

pub const DEFAULT_PORT: u16 = 22;

/// 远程计算配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    title: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub work_directory: Option<String>,
    #[serde(default)]
    pub module_commands: Option<String>,
    #[serde(default = "default_job_command")]
    pub job_command: String,
    #[serde(default = "default_job_script")]
    pub job_script: String,
}

fn default_port() -> Option<String> {
    Some(DEFAULT_PORT.to_string())
}

fn default_job_command() -> String {
    Scheduler::Pbs.job_command()
}

fn default_job_script() -> String {
    Scheduler::Pbs.job_script()
}

impl RemoteProfile {
    /// 新建配置；title 不能为空
    pub fn with_scheduler(title: &str, scheduler: Scheduler) -> Result<Self> {
        if title.trim().is_empty() {
            return Err(QeRemoteError::EmptyProfileTitle);
        }

        Ok(RemoteProfile {
            title: title.to_string(),
            host: None,
            port: default_port(),
            user: None,
            password: None,
            key_path: None,
            work_directory: None,
            module_commands: None,
            job_command: scheduler.job_command(),
            job_script: scheduler.job_script(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// 端口号；无法解析时回退到 22
    pub fn port_number(&self) -> u16 {
        self.port
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// 渲染提交命令，替换 `JOB_SCRIPT`
    pub fn render_job_command(&self, script_name: &str) -> String {
        let bindings = Bindings::new().bind_nonblank(Placeholder::JOB_SCRIPT, script_name);
        template::substitute(&self.job_command, &bindings)
    }

    /// 渲染作业脚本
    ///
    /// 每条命令占一行；进程数、线程数与总核数仅在 >= 1 时替换，
    /// `MODULE_COMMANDS` 总是替换（未设置时为空串）。
    pub fn render_job_script(&self, commands: &[String], num_mpi: i64, num_omp: i64) -> String {
        let joined: String = commands.iter().map(|c| format!("{}\n", c)).collect();
        let module_commands = self.module_commands.as_deref().unwrap_or("").trim();

        let bindings = Bindings::new()
            .bind_nonblank(Placeholder::QE_COMMAND, &joined)
            .bind_count(Placeholder::NUM_MPIS, num_mpi)
            .bind_count(Placeholder::NUM_OMPS, num_omp)
            .bind_count(Placeholder::NUM_CPUS, template::total_cpus(num_mpi, num_omp))
            .bind(Placeholder::MODULE_COMMANDS, module_commands);

        template::substitute(&self.job_script, &bindings)
    }
}

impl PartialEq for RemoteProfile {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
    }
}

impl Eq for RemoteProfile {}

impl Hash for RemoteProfile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.title.hash(state);
    }
}

impl std::fmt::Display for RemoteProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

/// 配置列表文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRegistry {
    #[serde(default)]
    profiles: Vec<RemoteProfile>,
}

impl ProfileRegistry {
    /// 读取配置文件；文件不存在时返回空列表
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| QeRemoteError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let registry: ProfileRegistry = serde_json::from_str(&content)?;

        let mut seen = std::collections::HashSet::new();
        for profile in &registry.profiles {
            if profile.title.trim().is_empty() {
                return Err(QeRemoteError::EmptyProfileTitle);
            }
            if !seen.insert(profile) {
                return Err(QeRemoteError::DuplicateProfile {
                    title: profile.title.clone(),
                });
            }
        }

        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| QeRemoteError::FileWriteError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| QeRemoteError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn profiles(&self) -> &[RemoteProfile] {
        &self.profiles
    }

    pub fn get(&self, title: &str) -> Result<&RemoteProfile> {
        self.profiles
            .iter()
            .find(|p| p.title == title)
            .ok_or_else(|| QeRemoteError::ProfileNotFound {
                title: title.to_string(),
            })
    }

    pub fn add(&mut self, profile: RemoteProfile) -> Result<()> {
        if self.profiles.contains(&profile) {
            return Err(QeRemoteError::DuplicateProfile {
                title: profile.title,
            });
        }
        self.profiles.push(profile);
        Ok(())
    }

    pub fn remove(&mut self, title: &str) -> Result<RemoteProfile> {
        let pos = self
            .profiles
            .iter()
            .position(|p| p.title == title)
            .ok_or_else(|| QeRemoteError::ProfileNotFound {
                title: title.to_string(),
            })?;
        Ok(self.profiles.remove(pos))
    }
}
