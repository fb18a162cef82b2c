//! # 通配符白名单匹配
//!
//! 白名单条目中的 `*` 匹配任意（包括空）子串，其余字符按字面匹配，
//! 且必须匹配整个值：`GET /a*c` 等价于正则 `^GET /a.*c$`。

use regex::Regex;

/// 把单个通配符模式翻译成锚定的正则表达式源码
fn wildcard_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}

/// 编译好的一组通配符模式
///
/// 配置加载时编译一次，之后每个请求只做匹配。
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

impl PatternSet {
    /// 编译一组模式
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|pattern| Regex::new(&wildcard_to_regex(pattern.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            compiled,
        })
    }

    /// 任一模式完整匹配 `value` 即返回 true；空集合永不匹配
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.compiled.iter().any(|regex| regex.is_match(value))
    }

    /// 原始模式文本
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// 不预编译的一次性匹配
///
/// 无法编译的模式视为不匹配。
#[must_use]
pub fn match_any<S: AsRef<str>>(patterns: &[S], value: &str) -> bool {
    patterns.iter().any(|pattern| {
        Regex::new(&wildcard_to_regex(pattern.as_ref()))
            .is_ok_and(|regex| regex.is_match(value))
    })
}
