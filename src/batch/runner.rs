//! # 批量执行器
//!
//! 并行执行批量提交任务。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代
//! - 进度条显示
//! - 错误收集与汇总报告
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::utils::progress;

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// 单个任务处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    /// 处理成功
    Success(String),
    /// 跳过（如 dry-run）
    Skipped(String),
    /// 处理失败
    Failed(String, String), // (项目, 错误信息)
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    /// 成功数量
    pub success: usize,
    /// 跳过数量
    pub skipped: usize,
    /// 失败数量
    pub failed: usize,
    /// 失败详情
    pub failures: Vec<(String, String)>,
}

impl BatchResult {
    /// 合并处理结果
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Success(_) => self.success += 1,
            ProcessResult::Skipped(_) => self.skipped += 1,
            ProcessResult::Failed(item, err) => {
                self.failed += 1;
                self.failures.push((item, err));
            }
        }
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
    /// 是否显示进度条
    show_progress: bool,
}

impl BatchRunner {
    /// 创建新的批量执行器；jobs = 0 时使用 CPU 核数
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self {
            jobs,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理任务列表
    pub fn run<T, F>(&self, items: &[T], processor: F) -> BatchResult
    where
        T: Sync,
        F: Fn(&T) -> ProcessResult + Sync + Send,
    {
        let total = items.len();
        let pb = if self.show_progress {
            progress::create_progress_bar(total as u64, "Submitting")
        } else {
            indicatif::ProgressBar::hidden()
        };

        let failed_count = AtomicUsize::new(0);

        let work = || -> Vec<ProcessResult> {
            items
                .par_iter()
                .map(|item| {
                    let result = processor(item);
                    if matches!(result, ProcessResult::Failed(_, _)) {
                        failed_count.fetch_add(1, Ordering::Relaxed);
                        pb.set_message(format!(
                            "Submitting ({} failed)",
                            failed_count.load(Ordering::Relaxed)
                        ));
                    }
                    pb.inc(1);
                    result
                })
                .collect()
        };

        // 配置 rayon 线程池；失败时退回全局线程池
        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                warn!(error = %e, "failed to build thread pool, using global pool");
                work()
            }
        };

        pb.finish_and_clear();

        // 汇总结果
        let mut batch_result = BatchResult::default();
        for result in results {
            batch_result.merge(result);
        }

        batch_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_collects_results() {
        let runner = BatchRunner::new(2).with_progress(false);
        let items = vec![1, 2, 3, 4, 5];

        let result = runner.run(&items, |n| match n % 3 {
            0 => ProcessResult::Failed(n.to_string(), "divisible by 3".to_string()),
            1 => ProcessResult::Success(n.to_string()),
            _ => ProcessResult::Skipped(n.to_string()),
        });

        assert_eq!(result.total(), 5);
        assert_eq!(result.success, 2);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failures[0].0, "3");
    }

    #[test]
    fn test_zero_jobs_uses_cpu_count() {
        assert!(BatchRunner::new(0).jobs() >= 1);
    }
}
