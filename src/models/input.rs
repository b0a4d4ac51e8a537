//! # Quantum ESPRESSO 输入文件数据模型
//!
//! pw.x / dos.x / projwfc.x / bands.x 共用的输入表示：
//! 有序的 namelist（`&CONTROL ... /`）加上有序的 card（`K_POINTS {crystal_b}` 等）。
//!
//! namelist 的键不区分大小写，统一存为小写；值保持 Fortran 字面量原文。
//!
//! ## 依赖关系
//! - 被 `parsers/pwscf.rs` 构造与序列化
//! - 被 `pipeline/` 读取与修改

use serde::{Deserialize, Serialize};

pub const NAMELIST_CONTROL: &str = "CONTROL";
pub const NAMELIST_SYSTEM: &str = "SYSTEM";
pub const NAMELIST_DOS: &str = "DOS";
pub const NAMELIST_PROJWFC: &str = "PROJWFC";
pub const NAMELIST_BANDS: &str = "BANDS";

pub const CARD_ATOMIC_SPECIES: &str = "ATOMIC_SPECIES";
pub const CARD_K_POINTS: &str = "K_POINTS";
pub const CARD_CELL_PARAMETERS: &str = "CELL_PARAMETERS";

/// Fortran 字面量值（原文保存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QeValue(String);

impl QeValue {
    /// 原样保存的字面量
    pub fn raw(text: impl Into<String>) -> Self {
        QeValue(text.into().trim().to_string())
    }

    /// 字符串值，自动加单引号
    pub fn character(text: &str) -> Self {
        QeValue(format!("'{}'", text.replace('\'', "")))
    }

    pub fn integer(value: i64) -> Self {
        QeValue(value.to_string())
    }

    pub fn logical(value: bool) -> Self {
        QeValue(if value { ".TRUE." } else { ".FALSE." }.to_string())
    }

    /// 去掉引号后的字符串值
    pub fn as_character(&self) -> String {
        let text = self.0.trim();
        let stripped = text
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')));
        stripped.unwrap_or(text).to_string()
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }
}

impl std::fmt::Display for QeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一个 namelist 块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namelist {
    name: String,
    entries: Vec<(String, QeValue)>,
}

impl Namelist {
    pub fn new(name: &str) -> Self {
        Namelist {
            name: name.trim().to_ascii_uppercase(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[(String, QeValue)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&QeValue> {
        let key = normalize_key(key);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// 设置键值；已存在则原位替换，保持顺序
    pub fn set(&mut self, key: &str, value: QeValue) {
        let key = normalize_key(key);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<QeValue> {
        let key = normalize_key(key);
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// 一个 card 块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    pub option: Option<String>,
    pub lines: Vec<String>,
}

/// ATOMIC_SPECIES 中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub label: String,
    pub mass: Option<f64>,
    pub pseudo_file: String,
}

/// K_POINTS 中的一个点
#[derive(Debug, Clone, PartialEq)]
pub struct KPoint {
    pub coord: [f64; 3],
    pub weight: f64,
    /// 行尾 `!label` 注释给出的高对称点字母
    pub letter: Option<String>,
}

impl Card {
    pub fn new(name: &str, option: Option<&str>) -> Self {
        Card {
            name: name.trim().to_ascii_uppercase(),
            option: option.map(|o| o.trim().to_string()).filter(|o| !o.is_empty()),
            lines: Vec::new(),
        }
    }

    fn option_is(&self, expected: &str) -> bool {
        self.option
            .as_deref()
            .map(|o| o.eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    }

    pub fn is_bohr(&self) -> bool {
        self.option_is("bohr")
    }

    pub fn is_angstrom(&self) -> bool {
        self.option_is("angstrom")
    }

    /// 解析 ATOMIC_SPECIES 行：`label mass pseudo_file`
    pub fn atomic_species(&self) -> Vec<Species> {
        self.lines
            .iter()
            .filter_map(|line| {
                let body = strip_comment(line);
                let parts: Vec<&str> = body.split_whitespace().collect();
                if parts.len() < 3 {
                    return None;
                }
                Some(Species {
                    label: parts[0].to_string(),
                    mass: parts[1].parse().ok(),
                    pseudo_file: parts[2].to_string(),
                })
            })
            .collect()
    }

    /// 解析 K_POINTS 列表（automatic / gamma 形式返回空）
    pub fn k_points(&self) -> Vec<KPoint> {
        if self.option_is("automatic") || self.option_is("gamma") {
            return Vec::new();
        }

        let mut points = Vec::new();
        // 第一行是点数
        for line in self.lines.iter().skip(1) {
            let (body, comment) = match line.find('!') {
                Some(pos) => (&line[..pos], Some(line[pos + 1..].trim())),
                None => (line.as_str(), None),
            };
            let values: Vec<f64> = body
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            if values.len() < 3 {
                continue;
            }
            points.push(KPoint {
                coord: [values[0], values[1], values[2]],
                weight: values.get(3).copied().unwrap_or(1.0),
                letter: comment
                    .and_then(|c| c.split_whitespace().next())
                    .map(|c| c.to_string()),
            });
        }
        points
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(['!', '#']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// 完整输入文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QeInput {
    pub namelists: Vec<Namelist>,
    pub cards: Vec<Card>,
}

impl QeInput {
    pub fn namelist(&self, name: &str) -> Option<&Namelist> {
        self.namelists
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(name))
    }

    pub fn namelist_mut(&mut self, name: &str) -> Option<&mut Namelist> {
        self.namelists
            .iter_mut()
            .find(|n| n.name.eq_ignore_ascii_case(name))
    }

    pub fn card(&self, name: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// 便捷读取：`namelist.key`
    pub fn value(&self, namelist: &str, key: &str) -> Option<&QeValue> {
        self.namelist(namelist).and_then(|n| n.get(key))
    }

    pub fn atomic_species(&self) -> Vec<Species> {
        self.card(CARD_ATOMIC_SPECIES)
            .map(|c| c.atomic_species())
            .unwrap_or_default()
    }

    pub fn k_points(&self) -> Vec<KPoint> {
        self.card(CARD_K_POINTS)
            .map(|c| c.k_points())
            .unwrap_or_default()
    }
}
