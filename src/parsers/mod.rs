//! # 解析器模块
//!
//! Quantum ESPRESSO 输入文件的读写。
//!
//! ## 依赖关系
//! - 被 `models/project.rs`, `pipeline/`, `remote/session.rs` 使用
//! - 使用 `models/input.rs` 数据模型
//! - 子模块: pwscf

pub mod pwscf;
