//! # 模板替换
//!
//! 作业脚本与提交命令模板中的占位符替换。同一名称支持三种写法：
//! `$NAME`、`$(NAME)`、`${NAME}`。
//!
//! 替换是单遍的：替换进来的值不会再被扫描，值中出现的 `$XXX` 原样保留。
//! 未绑定的占位符原样保留（例如 `${PBS_O_WORKDIR}` 交给远端 shell 展开）。
//!
//! ## 依赖关系
//! - 被 `models/profile.rs` 使用
//! - 无外部模块依赖

use std::collections::BTreeMap;

/// 占位符名称
pub struct Placeholder;

impl Placeholder {
    pub const JOB_SCRIPT: &'static str = "JOB_SCRIPT";
    pub const QE_COMMAND: &'static str = "QUANTUM_ESPRESSO_COMMAND";
    pub const NUM_CPUS: &'static str = "NCPU";
    pub const NUM_MPIS: &'static str = "NMPI";
    pub const NUM_OMPS: &'static str = "NOMP";
    pub const MODULE_COMMANDS: &'static str = "MODULE_COMMANDS";
}

/// 占位符绑定表
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// 仅当值非空白时绑定
    pub fn bind_nonblank(self, name: &str, value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            self
        } else {
            self.bind(name, value)
        }
    }

    /// 仅当计数 >= 1 时绑定
    pub fn bind_count(self, name: &str, count: i64) -> Self {
        if count >= 1 {
            self.bind(name, count.to_string())
        } else {
            self
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }
}

/// 总核数 = max(0, mpi) * max(0, omp)
pub fn total_cpus(num_mpi: i64, num_omp: i64) -> i64 {
    num_mpi.max(0).saturating_mul(num_omp.max(0))
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// 替换文本中的占位符
pub fn substitute(text: &str, bindings: &Bindings) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        match match_placeholder(after, bindings) {
            Some((value, consumed)) => {
                result.push_str(value);
                rest = &after[consumed..];
            }
            None => {
                result.push('$');
                rest = after;
            }
        }
    }
    result.push_str(rest);

    result
}

/// 匹配 `$` 之后的占位符，返回替换值与消耗的字节数
fn match_placeholder<'b>(after: &str, bindings: &'b Bindings) -> Option<(&'b str, usize)> {
    let mut chars = after.chars();
    let first = chars.next()?;

    let closer = match first {
        '(' => Some(')'),
        '{' => Some('}'),
        _ => None,
    };

    match closer {
        Some(closer) => {
            let inner = &after[1..];
            let end = inner.find(closer)?;
            let name = &inner[..end];
            if name.is_empty() || !name.chars().all(is_name_char) {
                return None;
            }
            bindings.get(name).map(|value| (value, end + 2))
        }
        None if is_name_start(first) => {
            let end = after
                .find(|c: char| !is_name_char(c))
                .unwrap_or(after.len());
            bindings.get(&after[..end]).map(|value| (value, end))
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_placeholder_forms() {
        let bindings = Bindings::new().bind("NCPU", "4");
        assert_eq!(substitute("$(NCPU) ${NCPU} $NCPU", &bindings), "4 4 4");
    }

    #[test]
    fn test_substituted_value_is_not_rescanned() {
        let bindings = Bindings::new()
            .bind("QUANTUM_ESPRESSO_COMMAND", "echo ${NCPU} $(NMPI)")
            .bind("NCPU", "8")
            .bind("NMPI", "2");
        assert_eq!(
            substitute("${QUANTUM_ESPRESSO_COMMAND} # $NCPU", &bindings),
            "echo ${NCPU} $(NMPI) # 8"
        );
    }

    #[test]
    fn test_regex_metacharacters_in_values_are_literal() {
        let bindings = Bindings::new().bind("JOB_SCRIPT", "a$1\\b.(sh)");
        assert_eq!(substitute("qsub $JOB_SCRIPT", &bindings), "qsub a$1\\b.(sh)");
    }

    #[test]
    fn test_unbound_placeholders_are_kept() {
        let bindings = Bindings::new().bind("NCPU", "4");
        let text = "cd ${PBS_O_WORKDIR} && echo $HOME $(date) $ ${} $NCPUS";
        assert_eq!(substitute(text, &bindings), text);
    }

    #[test]
    fn test_unterminated_bracket_is_kept() {
        let bindings = Bindings::new().bind("NCPU", "4");
        assert_eq!(substitute("${NCPU", &bindings), "${NCPU");
        assert_eq!(substitute("x$", &bindings), "x$");
    }

    #[test]
    fn test_bind_helpers() {
        let bindings = Bindings::new()
            .bind_count("NMPI", 0)
            .bind_count("NOMP", 2)
            .bind_nonblank("JOB_SCRIPT", "   ")
            .bind("MODULE_COMMANDS", "");
        assert_eq!(bindings.get("NMPI"), None);
        assert_eq!(bindings.get("NOMP"), Some("2"));
        assert_eq!(bindings.get("JOB_SCRIPT"), None);
        assert_eq!(substitute("[${MODULE_COMMANDS}]", &bindings), "[]");
    }

    #[test]
    fn test_total_cpus() {
        assert_eq!(total_cpus(4, 2), 8);
        assert_eq!(total_cpus(-1, 2), 0);
        assert_eq!(total_cpus(3, 0), 0);
    }
}
