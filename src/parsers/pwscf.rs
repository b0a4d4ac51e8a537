//! # Quantum ESPRESSO 输入格式解析器
//!
//! 解析与输出 pw.x 风格的输入文件。
//!
//! ## 格式说明
//! ```text
//! &CONTROL
//!   calculation = 'scf', prefix = 'si'
//! /
//! &SYSTEM
//!   ibrav = 2, celldm(1) = 10.2
//! /
//! ATOMIC_SPECIES
//! Si 28.086 Si.pbe-n-kjpaw_psl.1.0.0.UPF
//! K_POINTS {automatic}
//! 4 4 4 0 0 0
//! ```
//!
//! ## 依赖关系
//! - 被 `models/project.rs`, `remote/session.rs` 使用
//! - 使用 `models/input.rs`

use crate::error::{QeRemoteError, Result};
use crate::models::input::{Card, Namelist, QeInput, QeValue};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// 已知的 card 名称
const CARD_NAMES: &[&str] = &[
    "ATOMIC_SPECIES",
    "ATOMIC_POSITIONS",
    "K_POINTS",
    "ADDITIONAL_K_POINTS",
    "CELL_PARAMETERS",
    "OCCUPATIONS",
    "CONSTRAINTS",
    "ATOMIC_FORCES",
    "ATOMIC_VELOCITIES",
    "SOLVENTS",
    "HUBBARD",
];

fn card_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_]+)\s*(?:[\{\(]\s*([^\}\)]*?)\s*[\}\)]|(\S+))?\s*$")
            .expect("card header regex is valid")
    })
}

/// 解析输入文件
pub fn parse_qe_input_file(path: &Path) -> Result<QeInput> {
    let content = fs::read_to_string(path).map_err(|e| QeRemoteError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_qe_input(&content).map_err(|e| match e {
        QeRemoteError::ParseError { format, reason, .. } => QeRemoteError::ParseError {
            format,
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// 从字符串内容解析
pub fn parse_qe_input(content: &str) -> Result<QeInput> {
    let mut input = QeInput::default();
    let mut current_namelist: Option<Namelist> = None;
    let mut current_card: Option<Card> = None;

    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        // namelist 内部
        if let Some(nml) = current_namelist.as_mut() {
            if feed_namelist_line(nml, trimmed, lineno)? {
                input.namelists.extend(current_namelist.take());
            }
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('!') || trimmed.starts_with('#') {
            continue;
        }

        // namelist 起始，同一行可能带有赋值
        if let Some(header) = trimmed.strip_prefix('&') {
            input.cards.extend(current_card.take());
            let (name, rest) = header
                .split_once(char::is_whitespace)
                .unwrap_or((header, ""));
            let mut nml = Namelist::new(name);
            if feed_namelist_line(&mut nml, rest.trim(), lineno)? {
                input.namelists.push(nml);
            } else {
                current_namelist = Some(nml);
            }
            continue;
        }

        // card 起始
        if let Some(card) = parse_card_header(trimmed) {
            input.cards.extend(current_card.take());
            current_card = Some(card);
            continue;
        }

        match current_card.as_mut() {
            Some(card) => card.lines.push(trimmed.to_string()),
            None => {
                return Err(parse_error(
                    lineno,
                    &format!("unexpected line outside of namelist or card: '{}'", trimmed),
                ))
            }
        }
    }

    if let Some(nml) = current_namelist {
        return Err(parse_error(
            content.lines().count(),
            &format!("namelist &{} is not terminated by '/'", nml.name()),
        ));
    }
    input.cards.extend(current_card);

    Ok(input)
}

fn parse_error(lineno: usize, reason: &str) -> QeRemoteError {
    QeRemoteError::ParseError {
        format: "pw.x".to_string(),
        path: "<memory>".to_string(),
        reason: format!("line {}: {}", lineno + 1, reason),
    }
}

/// 处理 namelist 内的一行，返回该行是否结束了 namelist
fn feed_namelist_line(nml: &mut Namelist, line: &str, lineno: usize) -> Result<bool> {
    if line.eq_ignore_ascii_case("&end") {
        return Ok(true);
    }

    let code = strip_inline_comment(line).trim_end();
    // 行尾的 `/`（不在引号内）结束 namelist
    let closes = code.ends_with('/') && !in_quotes_at_end(code);
    let body = if closes { &code[..code.len() - 1] } else { code };

    for assignment in split_assignments(body) {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            parse_error(
                lineno,
                &format!("expected 'key = value' in &{}", nml.name()),
            )
        })?;
        nml.set(key, QeValue::raw(value));
    }

    Ok(closes)
}

fn in_quotes_at_end(text: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '\'' || c == '"' => quote = Some(c),
            _ => {}
        }
    }
    quote.is_some()
}

/// 去掉引号外的 `!` 注释
fn strip_inline_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '!' => return &line[..i],
            None => {}
        }
    }
    line
}

/// 按引号外的逗号切分赋值语句
fn split_assignments(line: &str) -> Vec<String> {
    let code = strip_inline_comment(line);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in code.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == ',' => {
                parts.push(std::mem::take(&mut current));
            }
            None => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_card_header(line: &str) -> Option<Card> {
    let caps = card_header_regex().captures(line)?;
    let name = caps.get(1)?.as_str().to_ascii_uppercase();
    if !CARD_NAMES.contains(&name.as_str()) {
        return None;
    }
    let option = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
    Some(Card::new(&name, option))
}

/// 将输入序列化为文本
pub fn to_input_string(input: &QeInput) -> String {
    let mut result = String::new();

    for nml in &input.namelists {
        result.push_str(&format!("&{}\n", nml.name()));
        for (key, value) in nml.entries() {
            result.push_str(&format!("    {} = {}\n", key, value));
        }
        result.push_str("/\n");
    }

    for card in &input.cards {
        match &card.option {
            Some(option) => result.push_str(&format!("{} {{{}}}\n", card.name, option)),
            None => result.push_str(&format!("{}\n", card.name)),
        }
        for line in &card.lines {
            result.push_str(line);
            result.push('\n');
        }
    }

    result
}
