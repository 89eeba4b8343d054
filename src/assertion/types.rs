use std::fmt;

/// 消息中展示期望值/实际值的最大长度
pub const MAX_DISPLAY_LEN: usize = 200;

/// 单个字段不匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 出错的字段，如 `status`、`headers.content-type`、`body.user.id`
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    pub fn new(
        field: impl Into<String>,
        expected: impl AsRef<str>,
        actual: impl AsRef<str>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: truncate(expected.as_ref(), MAX_DISPLAY_LEN),
            actual: truncate(actual.as_ref(), MAX_DISPLAY_LEN),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

/// 期望求值结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub mismatches: Vec<Mismatch>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// 所有不匹配项，用 `; ` 连接；通过时为空串
    pub fn message(&self) -> String {
        self.mismatches
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// 按字符截断，超出部分用 `...` 表示
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}
