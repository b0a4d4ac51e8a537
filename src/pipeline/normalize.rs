//! # 输入规范化
//!
//! 每份输入在写出前统一修改一次：
//! - `&CONTROL`：title、prefix、`wf_collect`、删除 `verbosity`、
//!   `outdir`/`wfcdir` 指向提交目录、`pseudo_dir` 指向赝势目录
//! - `&SYSTEM`：`ibrav = 0` 时删除与显式晶格矢量冲突的晶格参数
//! - `&DOS` / `&PROJWFC` / `&BANDS`：前缀与输出文件名
//!
//! ## 依赖关系
//! - 被 `pipeline/stage.rs`, `pipeline/definition.rs` 使用
//! - 使用 `models/`

use crate::models::input::{
    QeInput, QeValue, CARD_CELL_PARAMETERS, NAMELIST_BANDS, NAMELIST_CONTROL, NAMELIST_DOS,
    NAMELIST_PROJWFC, NAMELIST_SYSTEM,
};
use crate::models::{Project, RunEnvironment, RunKind};

/// ibrav = 0 时总是删除的派生晶格参数
const DERIVED_LATTICE_KEYS: &[&str] = &[
    "b",
    "c",
    "cosab",
    "cosac",
    "cosbc",
    "celldm(2)",
    "celldm(3)",
    "celldm(4)",
    "celldm(5)",
    "celldm(6)",
];

const OUTPUT_DIR: &str = "./";

/// 取某计算类型的基础输入副本并规范化
pub fn prepare_input(
    project: &dyn Project,
    source: RunKind,
    run: RunKind,
    env: &RunEnvironment,
) -> Option<QeInput> {
    let mut input = project.base_input(source)?;
    normalize_input(&mut input, project, run, env);
    Some(input)
}

/// 规范化输入；`run` 决定 title 中的标签
pub fn normalize_input(
    input: &mut QeInput,
    project: &dyn Project,
    run: RunKind,
    env: &RunEnvironment,
) {
    let name = project.name().trim();
    let prefix = project.prefix().trim();

    if let Some(control) = input.namelist_mut(NAMELIST_CONTROL) {
        if !name.is_empty() {
            control.set(
                "title",
                QeValue::character(&format!("{}({})", name, run.label())),
            );
        }
        if !prefix.is_empty() {
            control.set("prefix", QeValue::character(prefix));
        }
        if !control.contains("wf_collect") {
            control.set("wf_collect", QeValue::logical(true));
        }
        control.remove("verbosity");
        control.set("outdir", QeValue::character(OUTPUT_DIR));
        control.set("wfcdir", QeValue::character(OUTPUT_DIR));
        control.set("pseudo_dir", QeValue::character(&env.pseudo_search_path()));
    }

    let explicit_cell = input
        .card(CARD_CELL_PARAMETERS)
        .map(|card| card.is_bohr() || card.is_angstrom())
        .unwrap_or(false);

    if let Some(system) = input.namelist_mut(NAMELIST_SYSTEM) {
        let ibrav = system.get("ibrav").and_then(|v| v.as_integer());
        if ibrav == Some(0) {
            // 晶格矢量带单位时 a / celldm(1) 与之冲突
            if explicit_cell {
                system.remove("a");
                system.remove("celldm(1)");
            }
            for key in DERIVED_LATTICE_KEYS {
                system.remove(key);
            }
        }
    }

    if let Some(dos) = input.namelist_mut(NAMELIST_DOS) {
        if !prefix.is_empty() {
            dos.set("prefix", QeValue::character(prefix));
            dos.set("fildos", QeValue::character(&format!("{}.dos", prefix)));
        }
        dos.set("outdir", QeValue::character(OUTPUT_DIR));
    }

    if let Some(projwfc) = input.namelist_mut(NAMELIST_PROJWFC) {
        if !prefix.is_empty() {
            projwfc.set("prefix", QeValue::character(prefix));
            projwfc.set("filpdos", QeValue::character(prefix));
        }
        projwfc.set("outdir", QeValue::character(OUTPUT_DIR));
    }

    if let Some(bands) = input.namelist_mut(NAMELIST_BANDS) {
        if !prefix.is_empty() {
            bands.set("prefix", QeValue::character(prefix));
            bands.set("filband", QeValue::character(&format!("{}.band1", prefix)));
            bands.set("spin_component", QeValue::integer(1));
        }
        bands.set("outdir", QeValue::character(OUTPUT_DIR));
    }
}
